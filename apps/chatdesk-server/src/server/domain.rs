use std::collections::{HashMap, HashSet};

use chatdesk_core::{
    format_brazilian_phone, parse_participant_identifier, ConversationScope, ProfileId,
};
use sqlx::{postgres::PgRow, Row};

use super::{
    core::{AppState, ConversationRecord, MessageRecord},
    db::source_from_i16,
    errors::ApiFailure,
    types::ConversationSummaryResponse,
};

pub(crate) const NO_MESSAGE_SENTINEL: &str = "Nenhuma mensagem";
pub(crate) const UNASSIGNED_OPERATOR_SENTINEL: &str = "Não atribuído";

fn conversation_from_row(row: &PgRow) -> Result<ConversationRecord, ApiFailure> {
    let operator_id: Option<String> = row.try_get("operator_id").map_err(ApiFailure::from)?;
    let operator_id = operator_id
        .map(ProfileId::try_from)
        .transpose()
        .map_err(|_| ApiFailure::Internal)?;
    Ok(ConversationRecord {
        id: row.try_get("conversation_id").map_err(ApiFailure::from)?,
        external_participant_identifier: row
            .try_get("external_participant_identifier")
            .map_err(ApiFailure::from)?,
        operator_id,
        created_at_unix_ms: row
            .try_get("created_at_unix_ms")
            .map_err(ApiFailure::from)?,
    })
}

/// Conversations visible under `scope`, newest first. Operators only see
/// rows assigned to them; unassigned conversations stay hidden from them.
pub(crate) async fn scoped_conversations(
    state: &AppState,
    scope: ConversationScope,
    limit: Option<i64>,
) -> Result<Vec<ConversationRecord>, ApiFailure> {
    if let Some(pool) = &state.db_pool {
        let owner = scope.owner_filter().map(|id| id.to_string());
        let rows = sqlx::query(
            "SELECT conversation_id, external_participant_identifier, operator_id, created_at_unix_ms \
             FROM conversations \
             WHERE ($1::text IS NULL OR operator_id = $1) \
             ORDER BY created_at_unix_ms DESC \
             LIMIT $2",
        )
        .bind(owner)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        let mut conversations = Vec::with_capacity(rows.len());
        for row in rows {
            conversations.push(conversation_from_row(&row)?);
        }
        return Ok(conversations);
    }

    let conversations = state.conversations.read().await;
    let mut visible: Vec<ConversationRecord> = conversations
        .values()
        .filter(|conversation| scope.allows(conversation.operator_id))
        .cloned()
        .collect();
    visible.sort_by(|a, b| {
        b.created_at_unix_ms
            .cmp(&a.created_at_unix_ms)
            .then_with(|| b.id.cmp(&a.id))
    });
    if let Some(limit) = limit {
        visible.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    }
    Ok(visible)
}

pub(crate) async fn conversation_by_id(
    state: &AppState,
    conversation_id: &str,
) -> Result<Option<ConversationRecord>, ApiFailure> {
    if let Some(pool) = &state.db_pool {
        let row = sqlx::query(
            "SELECT conversation_id, external_participant_identifier, operator_id, created_at_unix_ms \
             FROM conversations WHERE conversation_id = $1",
        )
        .bind(conversation_id)
        .fetch_optional(pool)
        .await?;
        return row.map(|row| conversation_from_row(&row)).transpose();
    }
    Ok(state.conversations.read().await.get(conversation_id).cloned())
}

pub(crate) async fn messages_for_conversation(
    state: &AppState,
    conversation_id: &str,
) -> Result<Vec<MessageRecord>, ApiFailure> {
    if let Some(pool) = &state.db_pool {
        let rows = sqlx::query(
            "SELECT message_id, source, content, created_at_unix_ms \
             FROM messages WHERE conversation_id = $1 \
             ORDER BY created_at_unix_ms ASC, message_id ASC",
        )
        .bind(conversation_id)
        .fetch_all(pool)
        .await?;
        let mut messages = Vec::with_capacity(rows.len());
        for row in rows {
            let source: i16 = row.try_get("source").map_err(ApiFailure::from)?;
            let source = source_from_i16(source).ok_or(ApiFailure::Internal)?;
            messages.push(MessageRecord {
                id: row.try_get("message_id").map_err(ApiFailure::from)?,
                source,
                content: row.try_get("content").map_err(ApiFailure::from)?,
                created_at_unix_ms: row
                    .try_get("created_at_unix_ms")
                    .map_err(ApiFailure::from)?,
            });
        }
        return Ok(messages);
    }

    let messages = state.messages.read().await;
    let mut messages = messages.get(conversation_id).cloned().unwrap_or_default();
    messages.sort_by(|a, b| {
        a.created_at_unix_ms
            .cmp(&b.created_at_unix_ms)
            .then_with(|| a.id.cmp(&b.id))
    });
    Ok(messages)
}

struct MessageRollup {
    count: i64,
    last_content: String,
    last_at_unix_ms: i64,
}

async fn message_rollups(
    state: &AppState,
    conversation_ids: &[String],
) -> Result<HashMap<String, MessageRollup>, ApiFailure> {
    if conversation_ids.is_empty() {
        return Ok(HashMap::new());
    }
    if let Some(pool) = &state.db_pool {
        let rows = sqlx::query(
            "SELECT DISTINCT ON (m.conversation_id) \
                 m.conversation_id, m.content, m.created_at_unix_ms, c.message_count \
             FROM messages m \
             JOIN (SELECT conversation_id, COUNT(*) AS message_count \
                   FROM messages WHERE conversation_id = ANY($1) \
                   GROUP BY conversation_id) c \
               ON c.conversation_id = m.conversation_id \
             WHERE m.conversation_id = ANY($1) \
             ORDER BY m.conversation_id, m.created_at_unix_ms DESC, m.message_id DESC",
        )
        .bind(conversation_ids)
        .fetch_all(pool)
        .await?;
        let mut rollups = HashMap::with_capacity(rows.len());
        for row in rows {
            let conversation_id: String =
                row.try_get("conversation_id").map_err(ApiFailure::from)?;
            rollups.insert(
                conversation_id,
                MessageRollup {
                    count: row.try_get("message_count").map_err(ApiFailure::from)?,
                    last_content: row.try_get("content").map_err(ApiFailure::from)?,
                    last_at_unix_ms: row
                        .try_get("created_at_unix_ms")
                        .map_err(ApiFailure::from)?,
                },
            );
        }
        return Ok(rollups);
    }

    let messages = state.messages.read().await;
    let mut rollups = HashMap::new();
    for conversation_id in conversation_ids {
        let Some(entries) = messages.get(conversation_id) else {
            continue;
        };
        let Some(last) = entries.iter().max_by(|a, b| {
            a.created_at_unix_ms
                .cmp(&b.created_at_unix_ms)
                .then_with(|| a.id.cmp(&b.id))
        }) else {
            continue;
        };
        rollups.insert(
            conversation_id.clone(),
            MessageRollup {
                count: i64::try_from(entries.len()).unwrap_or(i64::MAX),
                last_content: last.content.clone(),
                last_at_unix_ms: last.created_at_unix_ms,
            },
        );
    }
    Ok(rollups)
}

async fn operator_names(
    state: &AppState,
    operator_ids: &HashSet<ProfileId>,
) -> Result<HashMap<String, String>, ApiFailure> {
    if operator_ids.is_empty() {
        return Ok(HashMap::new());
    }
    if let Some(pool) = &state.db_pool {
        let ids: Vec<String> = operator_ids.iter().map(ToString::to_string).collect();
        let rows = sqlx::query("SELECT profile_id, name FROM profiles WHERE profile_id = ANY($1)")
            .bind(&ids)
            .fetch_all(pool)
            .await?;
        let mut names = HashMap::with_capacity(rows.len());
        for row in rows {
            let profile_id: String = row.try_get("profile_id").map_err(ApiFailure::from)?;
            let name: String = row.try_get("name").map_err(ApiFailure::from)?;
            names.insert(profile_id, name);
        }
        return Ok(names);
    }

    let profiles = state.profiles.read().await;
    Ok(operator_ids
        .iter()
        .filter_map(|id| {
            profiles
                .get(&id.to_string())
                .map(|profile| (id.to_string(), profile.name.clone()))
        })
        .collect())
}

/// Projects raw conversation rows into the listing shape: parsed contact,
/// formatted phone, operator display name, and last-message rollup. Missing
/// data degrades to fixed sentinel strings rather than nulls.
pub(crate) async fn conversation_summaries(
    state: &AppState,
    conversations: Vec<ConversationRecord>,
) -> Result<Vec<ConversationSummaryResponse>, ApiFailure> {
    let conversation_ids: Vec<String> = conversations
        .iter()
        .map(|conversation| conversation.id.clone())
        .collect();
    let operator_ids: HashSet<ProfileId> = conversations
        .iter()
        .filter_map(|conversation| conversation.operator_id)
        .collect();

    let mut rollups = message_rollups(state, &conversation_ids).await?;
    let names = operator_names(state, &operator_ids).await?;

    let mut summaries = Vec::with_capacity(conversations.len());
    for conversation in conversations {
        let participant =
            parse_participant_identifier(&conversation.external_participant_identifier);
        let operator_name = conversation
            .operator_id
            .and_then(|id| names.get(&id.to_string()).cloned())
            .unwrap_or_else(|| String::from(UNASSIGNED_OPERATOR_SENTINEL));
        let rollup = rollups.remove(&conversation.id);
        let (last_message, last_message_at_unix_ms, message_count, status) = match rollup {
            Some(rollup) => (
                rollup.last_content,
                rollup.last_at_unix_ms,
                rollup.count,
                "active",
            ),
            None => (
                String::from(NO_MESSAGE_SENTINEL),
                conversation.created_at_unix_ms,
                0,
                "inactive",
            ),
        };
        summaries.push(ConversationSummaryResponse {
            conversation_id: conversation.id,
            contact_name: participant.name,
            contact_phone: format_brazilian_phone(&participant.phone),
            operator_name,
            last_message,
            last_message_at_unix_ms,
            message_count,
            status,
            created_at_unix_ms: conversation.created_at_unix_ms,
        });
    }
    Ok(summaries)
}
