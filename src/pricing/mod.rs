//! Deterministic schedule valuation and per-path payoff evaluation.

pub mod autocallable;
pub mod valuation;

pub use autocallable::{AutocallablePathPricer, PathOutcome, Trigger, simulation_horizon};
pub use valuation::{EventValuation, value_schedule};
