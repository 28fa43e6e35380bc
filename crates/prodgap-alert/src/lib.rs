//! Threshold evaluation for KPI measurements.
//!
//! The evaluator keeps one state machine per (entity, threshold) pair:
//!
//! ```text
//! Clear --breach--> Breaching --held for minimum duration--> Alerted
//!   ^                   |                                       |
//!   +---back in bounds--+                                       |
//!   +----------------back inside limits by hysteresis band------+
//! ```
//!
//! Raising an alert produces a [`PerformanceAlert`](prodgap_common::types::PerformanceAlert)
//! for the caller to persist; clearing reports the id of the open alert so
//! that it can be resolved.

pub mod engine;
pub mod state;

#[cfg(test)]
mod tests;

pub use engine::{
    AlertTransition, EvaluationOutcome, SkippedThreshold, ThresholdEvaluator, TransitionKind,
};
pub use state::{PairPhase, PairState, Step};
