//! Stochastic models simulated by the Monte Carlo engine.

pub mod heston;
pub mod process;

pub use heston::HestonParams;
pub use process::{
    BlackScholesProcess, Diffusion, HestonProcess, StepCoefficients, StochasticProcess,
};
