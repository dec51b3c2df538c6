use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use chatdesk_core::ConversationScope;

use crate::server::{
    analytics::{metrics_snapshot, time_series},
    auth::authenticate,
    core::{AppState, BOARD_CONVERSATION_LIMIT},
    db::ensure_db_schema,
    domain::{conversation_summaries, scoped_conversations},
    errors::ApiFailure,
    guard::{require_any_role, DASHBOARD_ROLES},
    types::{ConversationSummaryResponse, MetricsResponse, TimeSeriesEntry, TimeSeriesQuery},
};

pub(crate) async fn dashboard_metrics(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MetricsResponse>, ApiFailure> {
    ensure_db_schema(&state).await?;
    let identity = authenticate(&state, &headers).await?;
    require_any_role(&identity, DASHBOARD_ROLES)?;
    let scope = ConversationScope::for_roles(identity.profile_id, &identity.roles);
    let snapshot = metrics_snapshot(&state, scope).await?;
    Ok(Json(snapshot))
}

pub(crate) async fn dashboard_timeseries(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TimeSeriesQuery>,
) -> Result<Json<Vec<TimeSeriesEntry>>, ApiFailure> {
    ensure_db_schema(&state).await?;
    let identity = authenticate(&state, &headers).await?;
    require_any_role(&identity, DASHBOARD_ROLES)?;
    let scope = ConversationScope::for_roles(identity.profile_id, &identity.roles);
    let entries = time_series(&state, scope, query.period.as_deref()).await?;
    Ok(Json(entries))
}

/// Most recent conversations with contact and last-message projections,
/// capped at [`BOARD_CONVERSATION_LIMIT`] rows.
pub(crate) async fn dashboard_board(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ConversationSummaryResponse>>, ApiFailure> {
    ensure_db_schema(&state).await?;
    let identity = authenticate(&state, &headers).await?;
    require_any_role(&identity, DASHBOARD_ROLES)?;
    let scope = ConversationScope::for_roles(identity.profile_id, &identity.roles);
    let conversations =
        scoped_conversations(&state, scope, Some(BOARD_CONVERSATION_LIMIT)).await?;
    let summaries = conversation_summaries(&state, conversations).await?;
    Ok(Json(summaries))
}
