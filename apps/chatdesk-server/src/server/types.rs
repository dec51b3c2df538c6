use axum::Json;
use chatdesk_core::{MessageSource, RoleName};
use serde::{Deserialize, Serialize};

pub(crate) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: chatdesk_core::project_name(),
    })
}

#[derive(Debug, Serialize)]
pub(crate) struct ApiError {
    pub(crate) error: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) status: &'static str,
    pub(crate) service: &'static str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    pub(crate) email: String,
    pub(crate) password: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct AuthResponse {
    pub(crate) access_token: String,
    pub(crate) expires_in_secs: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct MeResponse {
    pub(crate) profile_id: String,
    pub(crate) email: String,
    pub(crate) name: String,
    pub(crate) roles: Vec<RoleName>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ProfileResponse {
    pub(crate) profile_id: String,
    pub(crate) email: String,
    pub(crate) name: String,
    pub(crate) role: Option<RoleName>,
    pub(crate) created_at_unix_ms: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateUserRequest {
    pub(crate) email: String,
    pub(crate) name: String,
    pub(crate) password: String,
    pub(crate) role: String,
}

/// Partial update; absent fields stay untouched. Unknown keys are rejected
/// so a misspelled field never silently no-ops.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct UpdateUserRequest {
    pub(crate) name: Option<String>,
    pub(crate) email: Option<String>,
    pub(crate) password: Option<String>,
    pub(crate) role: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ConversationSummaryResponse {
    pub(crate) conversation_id: String,
    pub(crate) contact_name: String,
    pub(crate) contact_phone: String,
    pub(crate) operator_name: String,
    pub(crate) last_message: String,
    pub(crate) last_message_at_unix_ms: i64,
    pub(crate) message_count: i64,
    pub(crate) status: &'static str,
    pub(crate) created_at_unix_ms: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct MessageResponse {
    pub(crate) message_id: String,
    pub(crate) source: MessageSource,
    pub(crate) content: String,
    pub(crate) created_at_unix_ms: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct MetricsResponse {
    pub(crate) total_conversations: i64,
    pub(crate) conversations_today: i64,
    pub(crate) conversation_trend: f64,
    pub(crate) messages_today: i64,
    pub(crate) message_trend: f64,
    pub(crate) average_response_time_minutes: f64,
    pub(crate) response_time_trend: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct TimeSeriesEntry {
    pub(crate) date: String,
    pub(crate) conversations: i64,
    pub(crate) messages: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TimeSeriesQuery {
    pub(crate) period: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserPath {
    pub(crate) user_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConversationPath {
    pub(crate) conversation_id: String,
}
