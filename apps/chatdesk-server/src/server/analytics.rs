use chatdesk_core::{trend, ConversationScope, MessageSource, ReplyLatency};
use chrono::{Days, Local, LocalResult, NaiveDate, NaiveTime, TimeZone};
use sqlx::Row;

use super::{
    core::AppState,
    db::source_from_i16,
    errors::ApiFailure,
    types::{MetricsResponse, TimeSeriesEntry},
};

/// Midnight of `date` in the server's local timezone, as unix milliseconds.
/// A DST gap that swallows midnight falls back to the naive UTC reading.
fn local_day_start_ms(date: NaiveDate) -> i64 {
    let naive = date.and_time(NaiveTime::MIN);
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.timestamp_millis(),
        LocalResult::None => naive.and_utc().timestamp_millis(),
    }
}

/// Half-open `[start, end)` bounds of the local calendar day `days_ago`
/// days before today.
fn day_bounds_ms(days_ago: u64) -> (i64, i64) {
    let today = Local::now().date_naive();
    let day = today
        .checked_sub_days(Days::new(days_ago))
        .unwrap_or(today);
    let next = day.checked_add_days(Days::new(1)).unwrap_or(day);
    (local_day_start_ms(day), local_day_start_ms(next))
}

fn parse_period_days(period: Option<&str>) -> u64 {
    match period {
        Some("7d") => 7,
        Some("90d") => 90,
        _ => 30,
    }
}

async fn count_conversations(
    state: &AppState,
    scope: ConversationScope,
    range: Option<(i64, i64)>,
) -> Result<i64, ApiFailure> {
    if let Some(pool) = &state.db_pool {
        let owner = scope.owner_filter().map(|id| id.to_string());
        let (start, end) = range.unwrap_or((i64::MIN, i64::MAX));
        let row = sqlx::query(
            "SELECT COUNT(*) AS total FROM conversations \
             WHERE ($1::text IS NULL OR operator_id = $1) \
               AND created_at_unix_ms >= $2 AND created_at_unix_ms < $3",
        )
        .bind(owner)
        .bind(start)
        .bind(end)
        .fetch_one(pool)
        .await?;
        return row.try_get("total").map_err(ApiFailure::from);
    }

    let conversations = state.conversations.read().await;
    let count = conversations
        .values()
        .filter(|conversation| scope.allows(conversation.operator_id))
        .filter(|conversation| {
            range.is_none_or(|(start, end)| {
                conversation.created_at_unix_ms >= start && conversation.created_at_unix_ms < end
            })
        })
        .count();
    Ok(i64::try_from(count).unwrap_or(i64::MAX))
}

async fn count_messages(
    state: &AppState,
    scope: ConversationScope,
    range: (i64, i64),
) -> Result<i64, ApiFailure> {
    let (start, end) = range;
    if let Some(pool) = &state.db_pool {
        let owner = scope.owner_filter().map(|id| id.to_string());
        let row = sqlx::query(
            "SELECT COUNT(*) AS total FROM messages m \
             JOIN conversations c ON c.conversation_id = m.conversation_id \
             WHERE ($1::text IS NULL OR c.operator_id = $1) \
               AND m.created_at_unix_ms >= $2 AND m.created_at_unix_ms < $3",
        )
        .bind(owner)
        .bind(start)
        .bind(end)
        .fetch_one(pool)
        .await?;
        return row.try_get("total").map_err(ApiFailure::from);
    }

    let conversations = state.conversations.read().await;
    let messages = state.messages.read().await;
    let mut count: i64 = 0;
    for conversation in conversations.values() {
        if !scope.allows(conversation.operator_id) {
            continue;
        }
        let Some(entries) = messages.get(&conversation.id) else {
            continue;
        };
        let in_range = entries
            .iter()
            .filter(|message| message.created_at_unix_ms >= start && message.created_at_unix_ms < end)
            .count();
        count = count.saturating_add(i64::try_from(in_range).unwrap_or(i64::MAX));
    }
    Ok(count)
}

/// Mean customer-to-staff reply latency across every visible conversation.
/// Each EXTERNAL message immediately followed by an OPERATOR message
/// contributes one sample.
async fn reply_latency(
    state: &AppState,
    scope: ConversationScope,
) -> Result<ReplyLatency, ApiFailure> {
    let mut latency = ReplyLatency::default();
    if let Some(pool) = &state.db_pool {
        let owner = scope.owner_filter().map(|id| id.to_string());
        let rows = sqlx::query(
            "SELECT m.conversation_id, m.source, m.created_at_unix_ms FROM messages m \
             JOIN conversations c ON c.conversation_id = m.conversation_id \
             WHERE ($1::text IS NULL OR c.operator_id = $1) \
             ORDER BY m.conversation_id, m.created_at_unix_ms ASC, m.message_id ASC",
        )
        .bind(owner)
        .fetch_all(pool)
        .await?;

        let mut current_conversation: Option<String> = None;
        let mut timeline: Vec<(MessageSource, i64)> = Vec::new();
        for row in rows {
            let conversation_id: String =
                row.try_get("conversation_id").map_err(ApiFailure::from)?;
            let source: i16 = row.try_get("source").map_err(ApiFailure::from)?;
            let source = source_from_i16(source).ok_or(ApiFailure::Internal)?;
            let at: i64 = row.try_get("created_at_unix_ms").map_err(ApiFailure::from)?;
            if current_conversation.as_deref() != Some(conversation_id.as_str()) {
                latency.observe_conversation(&timeline);
                timeline.clear();
                current_conversation = Some(conversation_id);
            }
            timeline.push((source, at));
        }
        latency.observe_conversation(&timeline);
        return Ok(latency);
    }

    let conversations = state.conversations.read().await;
    let messages = state.messages.read().await;
    for conversation in conversations.values() {
        if !scope.allows(conversation.operator_id) {
            continue;
        }
        let Some(entries) = messages.get(&conversation.id) else {
            continue;
        };
        let mut timeline: Vec<(MessageSource, i64)> = entries
            .iter()
            .map(|message| (message.source, message.created_at_unix_ms))
            .collect();
        timeline.sort_by_key(|(_, at)| *at);
        latency.observe_conversation(&timeline);
    }
    Ok(latency)
}

pub(crate) async fn metrics_snapshot(
    state: &AppState,
    scope: ConversationScope,
) -> Result<MetricsResponse, ApiFailure> {
    let today = day_bounds_ms(0);
    let yesterday = day_bounds_ms(1);

    let total_conversations = count_conversations(state, scope, None).await?;
    let conversations_today = count_conversations(state, scope, Some(today)).await?;
    let conversations_yesterday = count_conversations(state, scope, Some(yesterday)).await?;
    let messages_today = count_messages(state, scope, today).await?;
    let messages_yesterday = count_messages(state, scope, yesterday).await?;
    let latency = reply_latency(state, scope).await?;

    Ok(MetricsResponse {
        total_conversations,
        conversations_today,
        conversation_trend: trend(conversations_today, conversations_yesterday),
        messages_today,
        message_trend: trend(messages_today, messages_yesterday),
        average_response_time_minutes: latency.average_minutes(),
        // No historical latency baseline is stored yet, so the trend is flat.
        response_time_trend: 0.0,
    })
}

/// Daily conversation and message counts for the requested window, oldest
/// day first, ending with today. Days without activity appear as zeros.
pub(crate) async fn time_series(
    state: &AppState,
    scope: ConversationScope,
    period: Option<&str>,
) -> Result<Vec<TimeSeriesEntry>, ApiFailure> {
    let days = parse_period_days(period);
    let today = Local::now().date_naive();

    let mut entries = Vec::with_capacity(usize::try_from(days).unwrap_or(0) + 1);
    for days_ago in (0..=days).rev() {
        let (start, end) = day_bounds_ms(days_ago);
        let date = today
            .checked_sub_days(Days::new(days_ago))
            .unwrap_or(today);
        let conversations = count_conversations(state, scope, Some((start, end))).await?;
        let messages = count_messages(state, scope, (start, end)).await?;
        entries.push(TimeSeriesEntry {
            date: date.format("%Y-%m-%d").to_string(),
            conversations,
            messages,
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::{day_bounds_ms, parse_period_days};

    #[test]
    fn period_parsing_defaults_to_thirty_days() {
        assert_eq!(parse_period_days(Some("7d")), 7);
        assert_eq!(parse_period_days(Some("90d")), 90);
        assert_eq!(parse_period_days(Some("14d")), 30);
        assert_eq!(parse_period_days(None), 30);
    }

    #[test]
    fn day_bounds_are_half_open_and_contiguous() {
        let (today_start, today_end) = day_bounds_ms(0);
        let (yesterday_start, yesterday_end) = day_bounds_ms(1);
        assert!(today_start < today_end);
        assert_eq!(yesterday_end, today_start);
        assert!(yesterday_start < yesterday_end);
    }
}
