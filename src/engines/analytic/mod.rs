//! Closed-form and semi-analytic pricing engines.

pub mod black_scholes;
pub mod heston;

pub use black_scholes::{bs_price, bs_vega};
pub use heston::HestonEngine;
