//! `autocall_mc` prices averaging autocallable notes by Monte Carlo simulation under a
//! Black-Scholes-Merton or a calibrated Heston diffusion.
//!
//! A run values every redemption event off the collateral and issuer curves, builds
//! the selected diffusion, simulates trajectories on a uniform grid and accumulates
//! the discounted payoff of each path into an online mean and standard error.
//!
//! References used across modules include:
//! - Glasserman (2004) for Monte Carlo estimators.
//! - Heston (1993) and Gatheral (2006) for the stochastic-volatility model.
//! - Madsen, Nielsen and Tingleff (2004) for Levenberg-Marquardt.
//!
//! Numerical considerations:
//! - Observation dates map to the nearest grid node; more time steps reduce that snapping.
//! - The Heston scheme is log-Euler with full truncation, so it carries discretization bias.
//! - Calibration never fails hard on non-convergence; check the returned fit quality.
//!
//! # Feature Flags
//! - `parallel`: distributes sample blocks and calibration residuals over Rayon workers.
//!
//! # Quick Start
//! Standard error of a constant sample is zero:
//! ```rust
//! use autocall_mc::mc::RunningStatistics;
//!
//! let stats: RunningStatistics = std::iter::repeat_n(1031.0, 16).collect();
//! assert_eq!(stats.mean(), 1031.0);
//! assert_eq!(stats.error_estimate(), 0.0);
//! ```
//!
//! Work with day-count conventions:
//! ```rust
//! use chrono::NaiveDate;
//! use autocall_mc::rates::{DayCountConvention, year_fraction};
//!
//! let start = NaiveDate::from_ymd_opt(2017, 3, 31).unwrap();
//! let end = NaiveDate::from_ymd_opt(2018, 3, 31).unwrap();
//! let yf = year_fraction(start, end, DayCountConvention::Act365Fixed);
//! assert!((yf - 1.0).abs() < 1.0e-12);
//! ```
//!
//! Invert implied volatility:
//! ```rust
//! use autocall_mc::core::OptionType;
//! use autocall_mc::engines::analytic::bs_price;
//! use autocall_mc::vol::implied_vol;
//!
//! let price = bs_price(OptionType::Call, 15.35, 16.0, 0.002, 0.03, 0.22, 2.0);
//! let vol = implied_vol(OptionType::Call, 15.35, 16.0, 0.002, 0.03, 2.0, price, 1.0e-12, 64)
//!     .unwrap();
//! assert!((vol - 0.22).abs() < 1.0e-8);
//! ```

pub mod calibration;
pub mod config;
pub mod core;
pub mod engines;
pub mod instruments;
pub mod market;
pub mod math;
pub mod mc;
pub mod models;
pub mod pricing;
pub mod rates;
pub mod vol;

/// Common imports for ergonomic usage.
pub mod prelude {
    pub use crate::calibration::{CalibrationResult, HestonCalibrator, LmOptions};
    pub use crate::config::{ModelSelector, PricingConfig, RunConfig};
    pub use crate::core::*;
    pub use crate::instruments::*;
    pub use crate::market::*;
    pub use crate::mc::{AutocallableSimulation, SimulationReport};
    pub use crate::models::{Diffusion, HestonParams, StochasticProcess};
    pub use crate::pricing::*;
    pub use crate::rates::*;
}
