use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use chatdesk_core::ConversationScope;

use crate::server::{
    auth::authenticate,
    core::AppState,
    db::ensure_db_schema,
    domain::{
        conversation_by_id, conversation_summaries, messages_for_conversation,
        scoped_conversations,
    },
    errors::ApiFailure,
    types::{ConversationPath, ConversationSummaryResponse, MessageResponse},
};

pub(crate) async fn list_conversations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ConversationSummaryResponse>>, ApiFailure> {
    ensure_db_schema(&state).await?;
    let identity = authenticate(&state, &headers).await?;
    let scope = ConversationScope::for_roles(identity.profile_id, &identity.roles);
    let conversations = scoped_conversations(&state, scope, None).await?;
    let summaries = conversation_summaries(&state, conversations).await?;
    Ok(Json(summaries))
}

pub(crate) async fn get_conversation_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(path): Path<ConversationPath>,
) -> Result<Json<Vec<MessageResponse>>, ApiFailure> {
    ensure_db_schema(&state).await?;
    let identity = authenticate(&state, &headers).await?;
    let scope = ConversationScope::for_roles(identity.profile_id, &identity.roles);

    let conversation = conversation_by_id(&state, &path.conversation_id)
        .await?
        .ok_or(ApiFailure::NotFound)?;
    if !scope.allows(conversation.operator_id) {
        return Err(ApiFailure::Forbidden);
    }

    let messages = messages_for_conversation(&state, &conversation.id).await?;
    let responses = messages
        .into_iter()
        .map(|message| MessageResponse {
            message_id: message.id,
            source: message.source,
            content: message.content,
            created_at_unix_ms: message.created_at_unix_ms,
        })
        .collect();
    Ok(Json(responses))
}
