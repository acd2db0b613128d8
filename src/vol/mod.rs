//! Volatility term structures and implied-volatility inversion.

pub mod implied;
pub mod surface;

pub use implied::implied_vol;
pub use surface::{BlackConstantVol, BlackVarianceSurface, BlackVolTermStructure};
