use std::collections::HashSet;

use chatdesk_core::{ProfileId, RoleName};
use sqlx::Row;

use super::{core::AppState, errors::ApiFailure};

/// Roles currently granted to a profile. A profile carries at most one
/// assignment, but callers reason over a set.
pub(crate) async fn resolve_roles(
    state: &AppState,
    profile_id: ProfileId,
) -> Result<HashSet<RoleName>, ApiFailure> {
    if let Some(pool) = &state.db_pool {
        let rows = sqlx::query(
            "SELECT r.name FROM role_assignments ra \
             JOIN roles r ON r.role_id = ra.role_id \
             WHERE ra.profile_id = $1",
        )
        .bind(profile_id.to_string())
        .fetch_all(pool)
        .await?;
        let mut roles = HashSet::new();
        for row in rows {
            let name: String = row.try_get("name").map_err(ApiFailure::from)?;
            let role = RoleName::try_from(name).map_err(|_| ApiFailure::Internal)?;
            roles.insert(role);
        }
        return Ok(roles);
    }
    let assignments = state.role_assignments.read().await;
    Ok(assignments
        .get(&profile_id.to_string())
        .copied()
        .into_iter()
        .collect())
}

pub(crate) async fn assigned_role(
    state: &AppState,
    profile_id: ProfileId,
) -> Result<Option<RoleName>, ApiFailure> {
    Ok(resolve_roles(state, profile_id).await?.into_iter().next())
}

/// Swaps a profile's assignment in one statement so no reader observes a
/// role-less profile in between.
pub(crate) async fn replace_role_db(
    executor: impl sqlx::PgExecutor<'_>,
    profile_id: ProfileId,
    role: RoleName,
) -> Result<(), ApiFailure> {
    let result = sqlx::query(
        "INSERT INTO role_assignments (profile_id, role_id) \
         SELECT $1, role_id FROM roles WHERE name = $2 \
         ON CONFLICT (profile_id) DO UPDATE SET role_id = EXCLUDED.role_id",
    )
    .bind(profile_id.to_string())
    .bind(role.as_str())
    .execute(executor)
    .await?;
    if result.rows_affected() == 0 {
        tracing::error!(event = "roles.missing_seed", role = role.as_str());
        return Err(ApiFailure::Internal);
    }
    Ok(())
}
