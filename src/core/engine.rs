//! Module `core::engine`.
//!
//! Implements the library-wide result payload and error taxonomy shared by every
//! pricing, calibration, and simulation entry point.
//!
//! Key types and purpose: `PricingResult`, `Diagnostics`, `DiagKey`, `PricingError`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Compact key set for engine diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagKey {
    NumPaths,
    NumTimeSteps,
    NumThreads,
    ObservationCount,
    UpfrontCouponPv,
    VarianceEstimate,
}

impl DiagKey {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NumPaths => "num_paths",
            Self::NumTimeSteps => "num_time_steps",
            Self::NumThreads => "num_threads",
            Self::ObservationCount => "observation_count",
            Self::UpfrontCouponPv => "upfront_coupon_pv",
            Self::VarianceEstimate => "variance_estimate",
        }
    }
}

impl std::str::FromStr for DiagKey {
    type Err = ();

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        match key {
            "num_paths" => Ok(Self::NumPaths),
            "num_time_steps" => Ok(Self::NumTimeSteps),
            "num_threads" => Ok(Self::NumThreads),
            "observation_count" => Ok(Self::ObservationCount),
            "upfront_coupon_pv" => Ok(Self::UpfrontCouponPv),
            "variance_estimate" => Ok(Self::VarianceEstimate),
            _ => Err(()),
        }
    }
}

/// Inline diagnostics storage used in [`PricingResult`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    entries: Vec<(DiagKey, f64)>,
}

impl Diagnostics {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts or overwrites a value, returning the previous one.
    #[inline]
    pub fn insert_key(&mut self, key: DiagKey, value: f64) -> Option<f64> {
        for (entry_key, existing) in &mut self.entries {
            if *entry_key == key {
                let prev = *existing;
                *existing = value;
                return Some(prev);
            }
        }
        self.entries.push((key, value));
        None
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&f64> {
        let key: DiagKey = key.parse().ok()?;
        self.get_key(key)
    }

    #[inline]
    pub fn get_key(&self, key: DiagKey) -> Option<&f64> {
        self.entries
            .iter()
            .find_map(|(entry_key, value)| (*entry_key == key).then_some(value))
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &f64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Unified engine result payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingResult {
    /// Present value.
    pub price: f64,
    /// Standard error (Monte Carlo only).
    pub stderr: Option<f64>,
    /// Engine-specific scalar diagnostics.
    pub diagnostics: Diagnostics,
}

/// Engine and model errors surfaced by the API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    /// Input validation error.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Non-convergence in an iterative algorithm.
    #[error("convergence failure: {0}")]
    ConvergenceFailure(String),
    /// Required market datum is unavailable.
    #[error("market data missing: {0}")]
    MarketDataMissing(String),
    /// Numerical issue (overflow, invalid state, etc.).
    #[error("numerical error: {0}")]
    NumericalError(String),
    /// Run configuration rejected before pricing.
    #[error("configuration error: {0}")]
    Config(String),
    /// Filesystem failure while loading inputs.
    #[error("io error: {0}")]
    Io(String),
    /// Malformed JSON payload.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for PricingError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for PricingError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
