use axum::{extract::State, http::HeaderMap, Json};
use chatdesk_core::RoleName;

use crate::server::{
    auth::{
        authenticate, find_profile_by_email, issue_access_token, validate_email,
        validate_password, verify_password,
    },
    core::{AppState, ACCESS_TOKEN_TTL_SECS},
    db::ensure_db_schema,
    errors::ApiFailure,
    types::{AuthResponse, LoginRequest, MeResponse},
};

pub(crate) async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiFailure> {
    ensure_db_schema(&state).await?;
    validate_email(&payload.email).map_err(|_| ApiFailure::Unauthorized)?;
    validate_password(&payload.password).map_err(|_| ApiFailure::Unauthorized)?;

    let profile = find_profile_by_email(&state, &payload.email).await?;
    let Some(profile) = profile else {
        // Unknown emails take the same verification time as bad passwords.
        let _ = verify_password(&state.dummy_password_hash, &payload.password);
        tracing::info!(event = "auth.login", outcome = "unknown_email");
        return Err(ApiFailure::Unauthorized);
    };
    if !verify_password(&profile.password_hash, &payload.password) {
        tracing::info!(event = "auth.login", outcome = "bad_password", profile_id = %profile.id);
        return Err(ApiFailure::Unauthorized);
    }

    let access_token =
        issue_access_token(&state, profile.id).map_err(|_| ApiFailure::Internal)?;
    tracing::info!(event = "auth.login", outcome = "ok", profile_id = %profile.id);
    Ok(Json(AuthResponse {
        access_token,
        expires_in_secs: ACCESS_TOKEN_TTL_SECS,
    }))
}

pub(crate) async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MeResponse>, ApiFailure> {
    ensure_db_schema(&state).await?;
    let identity = authenticate(&state, &headers).await?;
    let mut roles: Vec<RoleName> = identity.roles.iter().copied().collect();
    roles.sort_by_key(|role| role.as_str());
    Ok(Json(MeResponse {
        profile_id: identity.profile_id.to_string(),
        email: identity.email,
        name: identity.name,
        roles,
    }))
}
