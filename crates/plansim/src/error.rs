//! Error types.

use thiserror::Error;

/// Errors surfaced before or during a simulation run.
#[derive(Debug, Error)]
pub enum Error {
    /// The allocation plan is malformed: phases are not contiguous or sorted,
    /// or the plan contains non-positive capacities or rates.
    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    /// The simulation configuration is invalid or inconsistent with the plan.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A component queried simulated time beyond the plan horizon.
    ///
    /// This is an internal invariant violation: the scheduler must stop
    /// before the plan runs out of phases. It is never expected in correct
    /// operation and is not user-recoverable.
    #[error("time {0} is beyond the plan horizon")]
    OutOfHorizon(f64),
}
