//! Market data snapshot used across valuation, simulation and calibration.

pub mod market;

pub use market::{Market, MarketBuilder};
