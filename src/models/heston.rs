//! Heston stochastic-volatility parameter set.
//!
//! Dynamics under the pricing measure:
//! `dS/S = (r - q) dt + sqrt(v) dW_s`, `dv = kappa (theta - v) dt + sigma sqrt(v) dW_v`,
//! `d<W_s, W_v> = rho dt`.

use serde::{Deserialize, Serialize};

use crate::core::PricingError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HestonParams {
    /// Initial variance.
    pub v0: f64,
    /// Mean reversion speed.
    pub kappa: f64,
    /// Long-run variance.
    pub theta: f64,
    /// Volatility of variance.
    pub sigma: f64,
    /// Correlation between spot and variance Brownian motions.
    pub rho: f64,
}

impl HestonParams {
    pub const DIMENSION: usize = 5;

    pub fn new(v0: f64, kappa: f64, theta: f64, sigma: f64, rho: f64) -> Self {
        Self {
            v0,
            kappa,
            theta,
            sigma,
            rho,
        }
    }

    pub fn validate(&self) -> Result<(), PricingError> {
        if !(self.v0.is_finite()
            && self.kappa.is_finite()
            && self.theta.is_finite()
            && self.sigma.is_finite()
            && self.rho.is_finite())
        {
            return Err(PricingError::InvalidInput(
                "heston parameters must be finite".to_string(),
            ));
        }
        if self.v0 < 0.0 {
            return Err(PricingError::InvalidInput(
                "heston v0 must be >= 0".to_string(),
            ));
        }
        if self.kappa <= 0.0 {
            return Err(PricingError::InvalidInput(
                "heston kappa must be > 0".to_string(),
            ));
        }
        if self.theta < 0.0 {
            return Err(PricingError::InvalidInput(
                "heston theta must be >= 0".to_string(),
            ));
        }
        if self.sigma <= 0.0 {
            return Err(PricingError::InvalidInput(
                "heston sigma must be > 0".to_string(),
            ));
        }
        if self.rho <= -1.0 || self.rho >= 1.0 {
            return Err(PricingError::InvalidInput(
                "heston rho must be in (-1, 1)".to_string(),
            ));
        }
        Ok(())
    }

    /// `2 kappa theta >= sigma^2`: variance stays strictly positive.
    pub fn feller_satisfied(&self) -> bool {
        2.0 * self.kappa * self.theta >= self.sigma * self.sigma
    }

    pub fn to_vec(self) -> Vec<f64> {
        vec![self.v0, self.kappa, self.theta, self.sigma, self.rho]
    }

    pub fn from_slice(x: &[f64]) -> Result<Self, PricingError> {
        if x.len() != Self::DIMENSION {
            return Err(PricingError::InvalidInput(
                "heston parameter vector must have length 5".to_string(),
            ));
        }
        Ok(Self::new(x[0], x[1], x[2], x[3], x[4]))
    }
}
