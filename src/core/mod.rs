//! Core domain types and library-wide result/error structures.

pub mod engine;
pub mod types;

pub use engine::{DiagKey, Diagnostics, PricingError, PricingResult};
pub use types::*;
