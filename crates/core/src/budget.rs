//! Execution budget monitor.
//!
//! Tracks the wall-clock window of one invocation. The batch controller polls
//! [`ExecutionBudget::should_stop`] before every symbol; operations that cannot
//! poll use [`ExecutionBudget::ensure_time`] and propagate [`BudgetExpired`].

use std::time::Duration;

use tokio::time::Instant;

use quotewarden_market_data::AttemptGate;

use crate::errors::BudgetExpired;

#[derive(Clone, Debug)]
pub struct ExecutionBudget {
    started: Instant,
    hard_limit: Duration,
    safety_buffer: Duration,
}

impl ExecutionBudget {
    /// Start a budget now.
    pub fn start(hard_limit: Duration, safety_buffer: Duration) -> Self {
        Self {
            started: Instant::now(),
            hard_limit,
            safety_buffer,
        }
    }

    /// Negative values clamp to zero, values too large for a `Duration` to `Duration::MAX`.
    pub fn from_secs(hard_limit_secs: f64, safety_buffer_secs: f64) -> Self {
        Self::start(
            clamped_duration(hard_limit_secs),
            clamped_duration(safety_buffer_secs),
        )
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn remaining(&self) -> Duration {
        self.hard_limit.saturating_sub(self.started.elapsed())
    }

    /// Seconds left before the hard limit; never negative.
    pub fn remaining_seconds(&self) -> f64 {
        self.remaining().as_secs_f64()
    }

    pub fn safety_buffer_seconds(&self) -> f64 {
        self.safety_buffer.as_secs_f64()
    }

    /// True once only the safety buffer is left.
    pub fn should_stop(&self) -> bool {
        self.remaining() <= self.safety_buffer
    }

    pub fn is_expiring(&self) -> bool {
        self.should_stop()
    }

    /// Time usable before the safety buffer starts.
    pub fn usable(&self) -> Duration {
        self.remaining().saturating_sub(self.safety_buffer)
    }

    /// Escape hatch for long operations: fails with [`BudgetExpired`] once `should_stop()` holds.
    pub fn ensure_time(&self) -> Result<(), BudgetExpired> {
        if self.should_stop() {
            Err(BudgetExpired {
                remaining_seconds: self.remaining_seconds(),
            })
        } else {
            Ok(())
        }
    }
}

fn clamped_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX)
}

impl AttemptGate for ExecutionBudget {
    fn may_attempt(&self) -> bool {
        !self.should_stop()
    }

    fn call_timeout(&self, max: Duration) -> Duration {
        max.min(self.usable())
    }
}
