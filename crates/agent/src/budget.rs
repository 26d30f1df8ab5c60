//! Iteration, wall-clock, and spend budgets.
//!
//! The tracker is consulted before every model call and updated with the
//! measured (never estimated) cost after each iteration; wall-clock time is
//! read from the tracker's own start instant.

use souschef_config::BudgetConfig;
use souschef_telemetry::TerminationReason;
use std::time::{Duration, Instant};

/// Which ceiling was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BudgetExceeded {
    #[error("iteration limit reached")]
    IterationLimit,
    #[error("time limit reached")]
    TimeLimit,
    #[error("cost limit reached")]
    CostLimit,
}

impl From<BudgetExceeded> for TerminationReason {
    fn from(e: BudgetExceeded) -> Self {
        match e {
            BudgetExceeded::IterationLimit => TerminationReason::IterationLimit,
            BudgetExceeded::TimeLimit => TerminationReason::TimeLimit,
            BudgetExceeded::CostLimit => TerminationReason::CostLimit,
        }
    }
}

pub struct BudgetTracker {
    limits: BudgetConfig,
    iterations: u32,
    started_at: Instant,
    spent_usd: f64,
}

impl BudgetTracker {
    pub fn new(limits: BudgetConfig) -> Self {
        Self {
            limits,
            iterations: 0,
            started_at: Instant::now(),
            spent_usd: 0.0,
        }
    }

    /// Gate for the next model call. Iteration count is checked first so a
    /// `max_iterations = 1` configuration collapses the loop into a single
    /// non-agentic pass.
    pub fn check(&self) -> Result<(), BudgetExceeded> {
        if self.iterations >= self.limits.max_iterations {
            return Err(BudgetExceeded::IterationLimit);
        }
        if self.started_at.elapsed() >= Duration::from_secs(self.limits.max_time_seconds) {
            return Err(BudgetExceeded::TimeLimit);
        }
        if self.spent_usd >= self.limits.cost_limit_usd {
            return Err(BudgetExceeded::CostLimit);
        }
        Ok(())
    }

    /// Record a completed iteration with its measured spend.
    pub fn record(&mut self, cost_usd: f64) {
        self.iterations += 1;
        self.spent_usd += cost_usd;
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn spent_usd(&self) -> f64 {
        self.spent_usd
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(max_iterations: u32, max_time_seconds: u64, cost_limit_usd: f64) -> BudgetConfig {
        BudgetConfig {
            max_iterations,
            max_time_seconds,
            max_tokens_per_call: 4096,
            cost_limit_usd,
        }
    }

    #[test]
    fn fresh_tracker_passes() {
        let tracker = BudgetTracker::new(limits(20, 60, 0.5));
        assert!(tracker.check().is_ok());
    }

    #[test]
    fn iteration_ceiling_enforced() {
        let mut tracker = BudgetTracker::new(limits(2, 60, 0.5));
        tracker.record(0.0);
        assert!(tracker.check().is_ok());
        tracker.record(0.0);
        assert_eq!(tracker.check(), Err(BudgetExceeded::IterationLimit));
    }

    #[test]
    fn single_iteration_budget_allows_exactly_one_call() {
        let mut tracker = BudgetTracker::new(limits(1, 60, 0.5));
        assert!(tracker.check().is_ok());
        tracker.record(0.001);
        assert_eq!(tracker.check(), Err(BudgetExceeded::IterationLimit));
    }

    #[test]
    fn time_ceiling_enforced() {
        // A zero-second allowance is already elapsed at the first gate.
        let tracker = BudgetTracker::new(limits(20, 0, 0.5));
        assert_eq!(tracker.check(), Err(BudgetExceeded::TimeLimit));
    }

    #[test]
    fn cost_ceiling_enforced() {
        let mut tracker = BudgetTracker::new(limits(20, 60, 0.05));
        tracker.record(0.06);
        assert_eq!(tracker.check(), Err(BudgetExceeded::CostLimit));
    }

    #[test]
    fn iteration_limit_reported_before_cost_limit() {
        let mut tracker = BudgetTracker::new(limits(1, 60, 0.01));
        tracker.record(1.0);
        assert_eq!(tracker.check(), Err(BudgetExceeded::IterationLimit));
    }

    #[test]
    fn exceeded_maps_to_termination_reason() {
        assert_eq!(
            TerminationReason::from(BudgetExceeded::TimeLimit),
            TerminationReason::TimeLimit
        );
        assert_eq!(
            TerminationReason::from(BudgetExceeded::CostLimit),
            TerminationReason::CostLimit
        );
    }
}
