//! Per-target outcomes and batch timing

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::extractor::ExtractionRecord;

/// Result of one target. Exactly one variant per target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success {
        target: String,
        record: ExtractionRecord,
        /// Navigation start to extraction end
        duration_ms: u64,
    },
    Failure {
        target: String,
        error: String,
    },
}

impl Outcome {
    pub fn target(&self) -> &str {
        match self {
            Outcome::Success { target, .. } | Outcome::Failure { target, .. } => target,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn record(&self) -> Option<&ExtractionRecord> {
        match self {
            Outcome::Success { record, .. } => Some(record),
            Outcome::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Failure { error, .. } => Some(error),
        }
    }
}

/// Ordered outcomes of a finished batch
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub batch_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// In input order
    pub outcomes: Vec<Outcome>,
    /// First navigation start to session close
    pub total_duration_ms: u64,
    pub total_duration_secs: String,
    /// Set when the batch stopped early on request
    pub cancelled: bool,
}

impl BatchResult {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Accumulates outcomes for one batch; hands them out once, on `finish`.
pub struct BatchAggregator {
    batch_id: Uuid,
    started_at: DateTime<Utc>,
    clock: Option<Instant>,
    outcomes: Vec<Outcome>,
}

impl BatchAggregator {
    pub fn new(batch_id: Uuid, expected: usize) -> Self {
        Self {
            batch_id,
            started_at: Utc::now(),
            clock: None,
            outcomes: Vec::with_capacity(expected),
        }
    }

    /// Start the batch clock. Only the first call has an effect.
    pub fn mark_started(&mut self) {
        if self.clock.is_none() {
            self.started_at = Utc::now();
            self.clock = Some(Instant::now());
        }
    }

    pub fn record_success(&mut self, target: &str, record: ExtractionRecord, elapsed: Duration) {
        self.outcomes.push(Outcome::Success {
            target: target.to_string(),
            record,
            duration_ms: elapsed.as_millis() as u64,
        });
    }

    pub fn record_failure(&mut self, target: &str, error: impl ToString) {
        self.outcomes.push(Outcome::Failure {
            target: target.to_string(),
            error: error.to_string(),
        });
    }

    pub fn completed(&self) -> usize {
        self.outcomes.len()
    }

    /// Close the books. Call after the session is closed.
    pub fn finish(self, cancelled: bool) -> BatchResult {
        let total = self.clock.map(|c| c.elapsed()).unwrap_or_default();
        BatchResult {
            batch_id: self.batch_id,
            started_at: self.started_at,
            outcomes: self.outcomes,
            total_duration_ms: total.as_millis() as u64,
            total_duration_secs: format!("{:.2}", total.as_secs_f64()),
            cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_keep_insertion_order() {
        let mut aggregator = BatchAggregator::new(Uuid::new_v4(), 3);
        aggregator.mark_started();
        aggregator.record_failure("A", "activation target not found");
        aggregator.record_success("B", ExtractionRecord::default(), Duration::from_millis(1500));
        aggregator.record_failure("A", "navigation failed: boom");

        let result = aggregator.finish(false);
        let targets: Vec<_> = result.outcomes.iter().map(Outcome::target).collect();
        assert_eq!(targets, ["A", "B", "A"]);
        assert_eq!(result.succeeded(), 1);
        assert_eq!(result.failed(), 2);
        assert!(!result.cancelled);
    }

    #[test]
    fn unstarted_batch_has_zero_duration() {
        let result = BatchAggregator::new(Uuid::new_v4(), 0).finish(false);
        assert!(result.is_empty());
        assert_eq!(result.total_duration_ms, 0);
        assert_eq!(result.total_duration_secs, "0.00");
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let failure = Outcome::Failure {
            target: "A".into(),
            error: "activation target not found".into(),
        };
        assert_eq!(
            serde_json::to_value(&failure).unwrap(),
            serde_json::json!({
                "status": "failure",
                "target": "A",
                "error": "activation target not found"
            })
        );

        let success = Outcome::Success {
            target: "B".into(),
            record: ExtractionRecord::default(),
            duration_ms: 12,
        };
        let json = serde_json::to_value(&success).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["duration_ms"], 12);
        assert_eq!(json["record"], serde_json::json!({}));
    }
}
