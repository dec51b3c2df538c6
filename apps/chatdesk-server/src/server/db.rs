use chatdesk_core::{MessageSource, ProfileId, RoleName};
use ulid::Ulid;

use super::{auth::now_unix_ms, core::AppState, errors::ApiFailure};

pub(crate) async fn ensure_db_schema(state: &AppState) -> Result<(), ApiFailure> {
    const SCHEMA_INIT_LOCK_ID: i64 = 0x4348_4154_4445_534b;
    let Some(pool) = &state.db_pool else {
        return Ok(());
    };
    let bootstrap = state.bootstrap.clone();

    state
        .db_init
        .get_or_try_init(|| async move {
            let mut tx = pool.begin().await?;
            sqlx::query("SELECT pg_advisory_xact_lock($1)")
                .bind(SCHEMA_INIT_LOCK_ID)
                .execute(&mut *tx)
                .await?;

            sqlx::query(
                "CREATE TABLE IF NOT EXISTS profiles (
                    profile_id TEXT PRIMARY KEY,
                    email TEXT UNIQUE NOT NULL,
                    name TEXT NOT NULL,
                    password_hash TEXT NOT NULL,
                    created_at_unix_ms BIGINT NOT NULL
                )",
            )
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "CREATE TABLE IF NOT EXISTS roles (
                    role_id TEXT PRIMARY KEY,
                    name TEXT UNIQUE NOT NULL
                )",
            )
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "CREATE TABLE IF NOT EXISTS role_assignments (
                    profile_id TEXT PRIMARY KEY REFERENCES profiles(profile_id) ON DELETE CASCADE,
                    role_id TEXT NOT NULL REFERENCES roles(role_id)
                )",
            )
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "CREATE TABLE IF NOT EXISTS conversations (
                    conversation_id TEXT PRIMARY KEY,
                    external_participant_identifier TEXT NOT NULL,
                    operator_id TEXT NULL REFERENCES profiles(profile_id) ON DELETE SET NULL,
                    created_at_unix_ms BIGINT NOT NULL
                )",
            )
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "CREATE TABLE IF NOT EXISTS messages (
                    message_id TEXT PRIMARY KEY,
                    conversation_id TEXT NOT NULL
                        REFERENCES conversations(conversation_id) ON DELETE CASCADE,
                    source SMALLINT NOT NULL,
                    content TEXT NOT NULL,
                    created_at_unix_ms BIGINT NOT NULL
                )",
            )
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "CREATE INDEX IF NOT EXISTS idx_conversations_operator
                    ON conversations(operator_id)",
            )
            .execute(&mut *tx)
            .await?;
            sqlx::query(
                "CREATE INDEX IF NOT EXISTS idx_conversations_created
                    ON conversations(created_at_unix_ms DESC)",
            )
            .execute(&mut *tx)
            .await?;
            sqlx::query(
                "CREATE INDEX IF NOT EXISTS idx_messages_conversation_created
                    ON messages(conversation_id, created_at_unix_ms)",
            )
            .execute(&mut *tx)
            .await?;

            for role in RoleName::ALL {
                sqlx::query(
                    "INSERT INTO roles (role_id, name) VALUES ($1, $2)
                     ON CONFLICT (name) DO NOTHING",
                )
                .bind(Ulid::new().to_string())
                .bind(role.as_str())
                .execute(&mut *tx)
                .await?;
            }

            if let Some(admin) = bootstrap {
                sqlx::query(
                    "INSERT INTO profiles (profile_id, email, name, password_hash, created_at_unix_ms)
                     VALUES ($1, $2, $3, $4, $5)
                     ON CONFLICT (email) DO NOTHING",
                )
                .bind(ProfileId::new().to_string())
                .bind(&admin.email)
                .bind(&admin.name)
                .bind(&admin.password_hash)
                .bind(now_unix_ms())
                .execute(&mut *tx)
                .await?;
                sqlx::query(
                    "INSERT INTO role_assignments (profile_id, role_id)
                     SELECT p.profile_id, r.role_id
                     FROM profiles p, roles r
                     WHERE p.email = $1 AND r.name = $2
                     ON CONFLICT (profile_id) DO NOTHING",
                )
                .bind(&admin.email)
                .bind(RoleName::Admin.as_str())
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;

            Ok::<(), sqlx::Error>(())
        })
        .await
        .map_err(|e| {
            tracing::error!(event = "db.init", error = %e);
            ApiFailure::Internal
        })?;

    Ok(())
}

#[cfg(test)]
pub(crate) fn source_to_i16(source: MessageSource) -> i16 {
    match source {
        MessageSource::External => 0,
        MessageSource::Operator => 1,
    }
}

pub(crate) fn source_from_i16(value: i16) -> Option<MessageSource> {
    match value {
        0 => Some(MessageSource::External),
        1 => Some(MessageSource::Operator),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use chatdesk_core::MessageSource;

    use super::{ensure_db_schema, source_from_i16, source_to_i16};
    use crate::server::core::{AppConfig, AppState};

    #[tokio::test]
    async fn schema_init_is_noop_and_idempotent_without_database_pool() {
        let state = AppState::new(&AppConfig::default()).expect("app state should initialize");
        ensure_db_schema(&state)
            .await
            .expect("schema init without database should succeed");
        ensure_db_schema(&state)
            .await
            .expect("schema init should be idempotent");
    }

    #[test]
    fn source_column_mapping_rejects_unknown_values() {
        assert_eq!(source_to_i16(MessageSource::External), 0);
        assert_eq!(source_to_i16(MessageSource::Operator), 1);
        assert_eq!(source_from_i16(1), Some(MessageSource::Operator));
        assert_eq!(source_from_i16(7), None);
    }
}
