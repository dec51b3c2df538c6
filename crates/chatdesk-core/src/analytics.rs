use crate::MessageSource;

/// Percentage change between two period counts, rounded to one decimal.
/// A zero previous period reads as +100% when anything happened at all.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn trend(current: i64, previous: i64) -> f64 {
    if previous == 0 {
        return if current > 0 { 100.0 } else { 0.0 };
    }
    round_one(((current - previous) as f64 / previous as f64) * 100.0)
}

/// Accumulator for customer-to-operator reply latency.
///
/// Walks each conversation's messages in ascending creation order and
/// records the delta for every adjacent EXTERNAL→OPERATOR pair. Adjacent
/// pairs with matching sources carry no signal and are skipped, so an
/// operator double-reply or a customer follow-up never counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplyLatency {
    total_ms: i64,
    samples: u32,
}

impl ReplyLatency {
    /// Feeds one conversation's messages as `(source, created_at_unix_ms)`
    /// tuples, already sorted oldest-first.
    pub fn observe_conversation(&mut self, messages: &[(MessageSource, i64)]) {
        for pair in messages.windows(2) {
            if pair[0].0 == MessageSource::External && pair[1].0 == MessageSource::Operator {
                self.total_ms = self.total_ms.saturating_add(pair[1].1.saturating_sub(pair[0].1));
                self.samples += 1;
            }
        }
    }

    #[must_use]
    pub const fn samples(self) -> u32 {
        self.samples
    }

    /// Mean delta across every recorded pair, in minutes rounded to one
    /// decimal; 0 when no pair was observed anywhere.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_minutes(self) -> f64 {
        if self.samples == 0 {
            return 0.0;
        }
        let average_ms = self.total_ms as f64 / f64::from(self.samples);
        round_one(average_ms / 60_000.0)
    }
}

fn round_one(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::{trend, ReplyLatency};
    use crate::MessageSource::{External, Operator};

    const MINUTE_MS: i64 = 60_000;

    #[test]
    fn trend_handles_zero_previous_edge_cases() {
        assert_eq!(trend(0, 0), 0.0);
        assert_eq!(trend(5, 0), 100.0);
        assert_eq!(trend(10, 5), 100.0);
        assert_eq!(trend(5, 10), -50.0);
    }

    #[test]
    fn trend_rounds_to_one_decimal() {
        // 1/3 -> 33.333...% -> 33.3
        assert_eq!(trend(4, 3), 33.3);
        assert_eq!(trend(2, 3), -33.3);
    }

    #[test]
    fn reply_latency_pairs_external_then_operator_only() {
        let t0 = 1_700_000_000_000;
        let mut latency = ReplyLatency::default();
        latency.observe_conversation(&[
            (External, t0),
            (Operator, t0 + 5 * MINUTE_MS),
            (External, t0 + 10 * MINUTE_MS),
            (Operator, t0 + 40 * MINUTE_MS),
        ]);
        assert_eq!(latency.samples(), 2);
        assert_eq!(latency.average_minutes(), 17.5);
    }

    #[test]
    fn reply_latency_ignores_same_source_runs() {
        let t0 = 1_700_000_000_000;
        let mut latency = ReplyLatency::default();
        latency.observe_conversation(&[(External, t0), (External, t0 + MINUTE_MS)]);
        latency.observe_conversation(&[(Operator, t0), (Operator, t0 + MINUTE_MS)]);
        assert_eq!(latency.samples(), 0);
        assert_eq!(latency.average_minutes(), 0.0);
    }

    #[test]
    fn reply_latency_aggregates_across_conversations() {
        let t0 = 1_700_000_000_000;
        let mut latency = ReplyLatency::default();
        latency.observe_conversation(&[(External, t0), (Operator, t0 + 2 * MINUTE_MS)]);
        latency.observe_conversation(&[(External, t0), (Operator, t0 + 4 * MINUTE_MS)]);
        assert_eq!(latency.samples(), 2);
        assert_eq!(latency.average_minutes(), 3.0);
    }

    #[test]
    fn reply_latency_only_counts_immediate_adjacency() {
        let t0 = 1_700_000_000_000;
        let mut latency = ReplyLatency::default();
        // EXTERNAL, EXTERNAL, OPERATOR: only the second external pairs.
        latency.observe_conversation(&[
            (External, t0),
            (External, t0 + MINUTE_MS),
            (Operator, t0 + 3 * MINUTE_MS),
        ]);
        assert_eq!(latency.samples(), 1);
        assert_eq!(latency.average_minutes(), 2.0);
    }
}
