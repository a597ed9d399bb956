//! Time-driven order progression.
//!
//! Orders move forward purely based on how long ago they were placed. The
//! schedule is data so the updater and tests can evaluate it at any `now`.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::OrderStatus;

/// One bulk transition: every order in `from` placed at or before `cutoff`
/// moves to `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressionStep {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub cutoff: DateTime<Utc>,
}

/// Age thresholds, measured from `sale_date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoProgression {
    pub processing_after: Duration,
    pub completed_after: Duration,
}

impl Default for AutoProgression {
    fn default() -> Self {
        Self {
            processing_after: Duration::from_secs(15),
            completed_after: Duration::from_secs(25),
        }
    }
}

impl AutoProgression {
    #[must_use]
    pub const fn new(processing_after: Duration, completed_after: Duration) -> Self {
        Self {
            processing_after,
            completed_after,
        }
    }

    /// The transitions due at `now`, in the order they should run.
    ///
    /// Running `Created -> Processing` first means an order old enough for
    /// both thresholds reaches `Completed` in a single pass.
    #[must_use]
    pub fn steps(&self, now: DateTime<Utc>) -> [ProgressionStep; 2] {
        [
            ProgressionStep {
                from: OrderStatus::Created,
                to: OrderStatus::Processing,
                cutoff: cutoff(now, self.processing_after),
            },
            ProgressionStep {
                from: OrderStatus::Processing,
                to: OrderStatus::Completed,
                cutoff: cutoff(now, self.completed_after),
            },
        ]
    }

    /// Where an order placed at `placed_at` should be at `now`, ignoring
    /// cancellation.
    #[must_use]
    pub fn expected_status(&self, placed_at: DateTime<Utc>, now: DateTime<Utc>) -> OrderStatus {
        let [to_processing, to_completed] = self.steps(now);
        if placed_at <= to_completed.cutoff {
            OrderStatus::Completed
        } else if placed_at <= to_processing.cutoff {
            OrderStatus::Processing
        } else {
            OrderStatus::Created
        }
    }
}

fn cutoff(now: DateTime<Utc>, age: Duration) -> DateTime<Utc> {
    chrono::TimeDelta::from_std(age)
        .ok()
        .and_then(|age| now.checked_sub_signed(age))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
