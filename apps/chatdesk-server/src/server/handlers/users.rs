use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chatdesk_core::{check_profile_mutation, ProfileChange, ProfileId, RoleName};
use sqlx::Row;

use crate::server::{
    auth::{
        authenticate, find_profile_by_id, hash_password, now_unix_ms, validate_display_name,
        validate_email, validate_password,
    },
    core::{AppState, ProfileRecord},
    db::ensure_db_schema,
    errors::{unique_conflict, ApiFailure},
    guard::{require_any_role, USER_ADMIN_ROLES, USER_DELETE_ROLES},
    roles::{assigned_role, replace_role_db, resolve_roles},
    types::{CreateUserRequest, ProfileResponse, UpdateUserRequest, UserPath},
};

fn profile_response(profile: &ProfileRecord, role: Option<RoleName>) -> ProfileResponse {
    ProfileResponse {
        profile_id: profile.id.to_string(),
        email: profile.email.clone(),
        name: profile.name.clone(),
        role,
        created_at_unix_ms: profile.created_at_unix_ms,
    }
}

pub(crate) async fn create_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ProfileResponse>), ApiFailure> {
    ensure_db_schema(&state).await?;
    let identity = authenticate(&state, &headers).await?;
    require_any_role(&identity, USER_ADMIN_ROLES)?;

    validate_email(&payload.email)?;
    validate_display_name(&payload.name)?;
    validate_password(&payload.password)?;
    let role = RoleName::try_from(payload.role).map_err(|_| ApiFailure::InvalidRequest)?;
    let password_hash = hash_password(&payload.password).map_err(|_| ApiFailure::Internal)?;

    let profile = ProfileRecord {
        id: ProfileId::new(),
        email: payload.email,
        name: payload.name,
        password_hash,
        created_at_unix_ms: now_unix_ms(),
    };

    if let Some(pool) = &state.db_pool {
        let mut tx = pool.begin().await?;
        let existing = sqlx::query("SELECT 1 FROM profiles WHERE email = $1")
            .bind(&profile.email)
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            return Err(ApiFailure::Conflict);
        }
        sqlx::query(
            "INSERT INTO profiles (profile_id, email, name, password_hash, created_at_unix_ms) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(profile.id.to_string())
        .bind(&profile.email)
        .bind(&profile.name)
        .bind(&profile.password_hash)
        .bind(profile.created_at_unix_ms)
        .execute(&mut *tx)
        .await
        .map_err(unique_conflict)?;
        replace_role_db(&mut *tx, profile.id, role).await?;
        tx.commit().await?;
    } else {
        let mut profiles = state.profiles.write().await;
        let mut emails = state.profile_emails.write().await;
        if emails.contains_key(&profile.email) {
            return Err(ApiFailure::Conflict);
        }
        emails.insert(profile.email.clone(), profile.id.to_string());
        profiles.insert(profile.id.to_string(), profile.clone());
        state
            .role_assignments
            .write()
            .await
            .insert(profile.id.to_string(), role);
    }

    tracing::info!(
        event = "users.create",
        profile_id = %profile.id,
        role = role.as_str(),
        actor = %identity.profile_id
    );
    Ok((
        StatusCode::CREATED,
        Json(profile_response(&profile, Some(role))),
    ))
}

pub(crate) async fn list_users(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ProfileResponse>>, ApiFailure> {
    ensure_db_schema(&state).await?;
    let identity = authenticate(&state, &headers).await?;
    require_any_role(&identity, USER_ADMIN_ROLES)?;

    if let Some(pool) = &state.db_pool {
        let rows = sqlx::query(
            "SELECT p.profile_id, p.email, p.name, p.created_at_unix_ms, r.name AS role \
             FROM profiles p \
             LEFT JOIN role_assignments ra ON ra.profile_id = p.profile_id \
             LEFT JOIN roles r ON r.role_id = ra.role_id \
             ORDER BY p.created_at_unix_ms ASC, p.profile_id ASC",
        )
        .fetch_all(pool)
        .await?;
        let mut users = Vec::with_capacity(rows.len());
        for row in rows {
            let role: Option<String> = row.try_get("role").map_err(ApiFailure::from)?;
            let role = role.and_then(|name| RoleName::try_from(name).ok());
            users.push(ProfileResponse {
                profile_id: row.try_get("profile_id").map_err(ApiFailure::from)?,
                email: row.try_get("email").map_err(ApiFailure::from)?,
                name: row.try_get("name").map_err(ApiFailure::from)?,
                role,
                created_at_unix_ms: row
                    .try_get("created_at_unix_ms")
                    .map_err(ApiFailure::from)?,
            });
        }
        return Ok(Json(users));
    }

    let profiles = state.profiles.read().await;
    let assignments = state.role_assignments.read().await;
    let mut users: Vec<ProfileResponse> = profiles
        .values()
        .map(|profile| {
            profile_response(profile, assignments.get(&profile.id.to_string()).copied())
        })
        .collect();
    users.sort_by(|a, b| {
        a.created_at_unix_ms
            .cmp(&b.created_at_unix_ms)
            .then_with(|| a.profile_id.cmp(&b.profile_id))
    });
    Ok(Json(users))
}

pub(crate) async fn get_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<UserPath>,
) -> Result<Json<ProfileResponse>, ApiFailure> {
    ensure_db_schema(&state).await?;
    authenticate(&state, &headers).await?;

    let profile_id =
        ProfileId::try_from(path.user_id).map_err(|_| ApiFailure::InvalidRequest)?;
    let profile = find_profile_by_id(&state, profile_id)
        .await?
        .ok_or(ApiFailure::NotFound)?;
    let role = assigned_role(&state, profile_id).await?;
    Ok(Json(profile_response(&profile, role)))
}

pub(crate) async fn update_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<UserPath>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<ProfileResponse>, ApiFailure> {
    ensure_db_schema(&state).await?;
    let identity = authenticate(&state, &headers).await?;

    let target_id =
        ProfileId::try_from(path.user_id).map_err(|_| ApiFailure::InvalidRequest)?;

    // Every field is validated before anything is written, so a bad role or
    // malformed email leaves the profile exactly as it was.
    let new_role = payload
        .role
        .map(RoleName::try_from)
        .transpose()
        .map_err(|_| ApiFailure::InvalidRequest)?;
    if let Some(email) = &payload.email {
        validate_email(email)?;
    }
    if let Some(name) = &payload.name {
        validate_display_name(name)?;
    }
    let new_password_hash = match &payload.password {
        Some(password) => {
            validate_password(password)?;
            Some(hash_password(password).map_err(|_| ApiFailure::Internal)?)
        }
        None => None,
    };

    let target = find_profile_by_id(&state, target_id)
        .await?
        .ok_or(ApiFailure::NotFound)?;
    let target_roles = resolve_roles(&state, target_id).await?;
    let change = if new_role.is_some() {
        ProfileChange::FieldsAndRole
    } else {
        ProfileChange::Fields
    };
    check_profile_mutation(
        identity.profile_id,
        &identity.roles,
        target_id,
        &target_roles,
        change,
    )
    .map_err(|denied| {
        tracing::warn!(
            event = "users.update.denied",
            actor = %identity.profile_id,
            target = %target_id,
            reason = ?denied
        );
        ApiFailure::Forbidden
    })?;

    if let Some(pool) = &state.db_pool {
        let mut tx = pool.begin().await?;
        if let Some(email) = &payload.email {
            let row = sqlx::query("SELECT profile_id FROM profiles WHERE email = $1")
                .bind(email)
                .fetch_optional(&mut *tx)
                .await?;
            if let Some(row) = row {
                let holder: String = row.try_get("profile_id").map_err(ApiFailure::from)?;
                if holder != target_id.to_string() {
                    return Err(ApiFailure::Conflict);
                }
            }
        }
        sqlx::query(
            "UPDATE profiles SET \
                 name = COALESCE($2, name), \
                 email = COALESCE($3, email), \
                 password_hash = COALESCE($4, password_hash) \
             WHERE profile_id = $1",
        )
        .bind(target_id.to_string())
        .bind(&payload.name)
        .bind(&payload.email)
        .bind(&new_password_hash)
        .execute(&mut *tx)
        .await
        .map_err(unique_conflict)?;
        if let Some(role) = new_role {
            replace_role_db(&mut *tx, target_id, role).await?;
        }
        tx.commit().await?;
    } else {
        let target_key = target_id.to_string();
        let mut profiles = state.profiles.write().await;
        let mut emails = state.profile_emails.write().await;
        if let Some(email) = &payload.email {
            if let Some(holder) = emails.get(email) {
                if holder != &target_key {
                    return Err(ApiFailure::Conflict);
                }
            }
        }
        let record = profiles.get_mut(&target_key).ok_or(ApiFailure::NotFound)?;
        if let Some(email) = payload.email {
            emails.remove(&record.email);
            emails.insert(email.clone(), target_key.clone());
            record.email = email;
        }
        if let Some(name) = payload.name {
            record.name = name;
        }
        if let Some(hash) = new_password_hash {
            record.password_hash = hash;
        }
        drop(emails);
        drop(profiles);
        if let Some(role) = new_role {
            state
                .role_assignments
                .write()
                .await
                .insert(target_key, role);
        }
    }

    tracing::info!(
        event = "users.update",
        actor = %identity.profile_id,
        target = %target_id,
        role_changed = new_role.is_some()
    );
    let updated = find_profile_by_id(&state, target_id)
        .await?
        .unwrap_or(target);
    let role = assigned_role(&state, target_id).await?;
    Ok(Json(profile_response(&updated, role)))
}

pub(crate) async fn delete_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<UserPath>,
) -> Result<StatusCode, ApiFailure> {
    ensure_db_schema(&state).await?;
    let identity = authenticate(&state, &headers).await?;
    require_any_role(&identity, USER_DELETE_ROLES)?;

    let target_id =
        ProfileId::try_from(path.user_id).map_err(|_| ApiFailure::InvalidRequest)?;
    find_profile_by_id(&state, target_id)
        .await?
        .ok_or(ApiFailure::NotFound)?;
    let target_roles = resolve_roles(&state, target_id).await?;
    check_profile_mutation(
        identity.profile_id,
        &identity.roles,
        target_id,
        &target_roles,
        ProfileChange::Fields,
    )
    .map_err(|denied| {
        tracing::warn!(
            event = "users.delete.denied",
            actor = %identity.profile_id,
            target = %target_id,
            reason = ?denied
        );
        ApiFailure::Forbidden
    })?;

    if let Some(pool) = &state.db_pool {
        // Role assignments cascade; conversations fall back to unassigned.
        sqlx::query("DELETE FROM profiles WHERE profile_id = $1")
            .bind(target_id.to_string())
            .execute(pool)
            .await?;
    } else {
        let target_key = target_id.to_string();
        let mut profiles = state.profiles.write().await;
        let mut emails = state.profile_emails.write().await;
        if let Some(record) = profiles.remove(&target_key) {
            emails.remove(&record.email);
        }
        drop(emails);
        drop(profiles);
        state.role_assignments.write().await.remove(&target_key);
        let mut conversations = state.conversations.write().await;
        for conversation in conversations.values_mut() {
            if conversation.operator_id == Some(target_id) {
                conversation.operator_id = None;
            }
        }
    }

    tracing::info!(
        event = "users.delete",
        actor = %identity.profile_id,
        target = %target_id
    );
    Ok(StatusCode::NO_CONTENT)
}
