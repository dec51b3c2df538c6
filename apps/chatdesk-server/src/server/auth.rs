use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::anyhow;
use argon2::{
    password_hash::rand_core::OsRng,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::http::{header::AUTHORIZATION, HeaderMap};
use chatdesk_core::ProfileId;
use pasetors::{
    claims::{Claims, ClaimsValidationRules},
    local,
    token::UntrustedToken,
    version4::V4,
    Local,
};
use sqlx::Row;

use super::{
    core::{AppState, Identity, ProfileRecord, ACCESS_TOKEN_TTL_SECS},
    errors::ApiFailure,
    roles,
};

pub(crate) fn validate_password(value: &str) -> Result<(), ApiFailure> {
    let len = value.len();
    if (8..=128).contains(&len) {
        Ok(())
    } else {
        Err(ApiFailure::InvalidRequest)
    }
}

pub(crate) fn validate_email(value: &str) -> Result<(), ApiFailure> {
    let len = value.len();
    if !(3..=254).contains(&len) {
        return Err(ApiFailure::InvalidRequest);
    }
    if !value.contains('@') || value.chars().any(char::is_whitespace) {
        return Err(ApiFailure::InvalidRequest);
    }
    Ok(())
}

pub(crate) fn validate_display_name(value: &str) -> Result<(), ApiFailure> {
    let len = value.len();
    if !(1..=120).contains(&len) {
        return Err(ApiFailure::InvalidRequest);
    }
    if value.chars().any(char::is_control) {
        return Err(ApiFailure::InvalidRequest);
    }
    Ok(())
}

pub(crate) fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("password hash failed: {e}"))?
        .to_string();
    Ok(hash)
}

pub(crate) fn verify_password(stored_hash: &str, supplied_password: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(supplied_password.as_bytes(), &parsed)
        .is_ok()
}

pub(crate) fn issue_access_token(state: &AppState, profile_id: ProfileId) -> anyhow::Result<String> {
    let mut claims = Claims::new_expires_in(&Duration::from_secs(ACCESS_TOKEN_TTL_SECS as u64))
        .map_err(|e| anyhow!("claims init failed: {e}"))?;
    claims
        .subject(&profile_id.to_string())
        .map_err(|e| anyhow!("claim sub failed: {e}"))?;

    local::encrypt(&state.token_key, &claims, None, None)
        .map_err(|e| anyhow!("access token mint failed: {e}"))
}

pub(crate) fn verify_access_token(state: &AppState, token: &str) -> anyhow::Result<Claims> {
    let untrusted = UntrustedToken::<Local, V4>::try_from(token).map_err(|e| anyhow!("{e}"))?;
    let validation_rules = ClaimsValidationRules::new();
    let trusted = local::decrypt(&state.token_key, &untrusted, &validation_rules, None, None)
        .map_err(|e| anyhow!("token decrypt failed: {e}"))?;
    trusted
        .payload_claims()
        .cloned()
        .ok_or_else(|| anyhow!("token claims missing"))
}

pub(crate) async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Identity, ApiFailure> {
    let access_token = bearer_token(headers).ok_or(ApiFailure::Unauthorized)?;
    let claims =
        verify_access_token(state, access_token).map_err(|_| ApiFailure::Unauthorized)?;
    let subject = claims
        .get_claim("sub")
        .and_then(serde_json::Value::as_str)
        .ok_or(ApiFailure::Unauthorized)?;
    let profile_id =
        ProfileId::try_from(subject.to_owned()).map_err(|_| ApiFailure::Unauthorized)?;
    let profile = find_profile_by_id(state, profile_id)
        .await?
        .ok_or(ApiFailure::Unauthorized)?;
    let roles = roles::resolve_roles(state, profile_id).await?;
    Ok(Identity {
        profile_id,
        email: profile.email,
        name: profile.name,
        roles,
    })
}

pub(crate) async fn find_profile_by_id(
    state: &AppState,
    profile_id: ProfileId,
) -> Result<Option<ProfileRecord>, ApiFailure> {
    if let Some(pool) = &state.db_pool {
        let row = sqlx::query(
            "SELECT email, name, password_hash, created_at_unix_ms \
             FROM profiles WHERE profile_id = $1",
        )
        .bind(profile_id.to_string())
        .fetch_optional(pool)
        .await?;
        return row
            .map(|row| -> Result<ProfileRecord, sqlx::Error> {
                Ok(ProfileRecord {
                    id: profile_id,
                    email: row.try_get("email")?,
                    name: row.try_get("name")?,
                    password_hash: row.try_get("password_hash")?,
                    created_at_unix_ms: row.try_get("created_at_unix_ms")?,
                })
            })
            .transpose()
            .map_err(ApiFailure::from);
    }
    Ok(state
        .profiles
        .read()
        .await
        .get(&profile_id.to_string())
        .cloned())
}

pub(crate) async fn find_profile_by_email(
    state: &AppState,
    email: &str,
) -> Result<Option<ProfileRecord>, ApiFailure> {
    if let Some(pool) = &state.db_pool {
        let row = sqlx::query(
            "SELECT profile_id, email, name, password_hash, created_at_unix_ms \
             FROM profiles WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(pool)
        .await?;
        return row
            .map(|row| -> Result<ProfileRecord, sqlx::Error> {
                let raw_id: String = row.try_get("profile_id")?;
                let id = ProfileId::try_from(raw_id)
                    .map_err(|_| sqlx::Error::Decode("malformed profile id".into()))?;
                Ok(ProfileRecord {
                    id,
                    email: row.try_get("email")?,
                    name: row.try_get("name")?,
                    password_hash: row.try_get("password_hash")?,
                    created_at_unix_ms: row.try_get("created_at_unix_ms")?,
                })
            })
            .transpose()
            .map_err(ApiFailure::from);
    }
    let emails = state.profile_emails.read().await;
    let Some(profile_id) = emails.get(email) else {
        return Ok(None);
    };
    Ok(state.profiles.read().await.get(profile_id).cloned())
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(AUTHORIZATION)?;
    let header = header.to_str().ok()?;
    header.strip_prefix("Bearer ")
}

pub(crate) fn now_unix_ms() -> i64 {
    let now = SystemTime::now();
    let millis = now
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_millis();
    i64::try_from(millis).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::{validate_display_name, validate_email, validate_password};

    #[test]
    fn password_length_bounds_are_inclusive() {
        assert!(validate_password("12345678").is_ok());
        assert!(validate_password(&"x".repeat(128)).is_ok());
        assert!(validate_password("1234567").is_err());
        assert!(validate_password(&"x".repeat(129)).is_err());
    }

    #[test]
    fn email_requires_at_sign_and_rejects_whitespace() {
        assert!(validate_email("ana@example.com").is_ok());
        assert!(validate_email("ana example.com").is_err());
        assert!(validate_email("ana@ example.com").is_err());
        assert!(validate_email("a@").is_err());
    }

    #[test]
    fn display_name_rejects_control_characters() {
        assert!(validate_display_name("Ana Souza").is_ok());
        assert!(validate_display_name("").is_err());
        assert!(validate_display_name("Ana\nSouza").is_err());
    }
}
