//! Module `engines::analytic::heston`.
//!
//! Semi-analytic Heston prices for European options, used by calibration to compare
//! model and market implied volatilities.
//!
//! Numerical considerations: the Gatheral log formulation of the characteristic
//! function avoids the branch-cut discontinuity of the original Heston form. The Lewis
//! integral runs over composite Gauss-Legendre panels that widen geometrically until
//! the integrand has decayed, so short expiries, whose integrand decays on a scale of
//! `1 / sqrt(v T)`, are integrated as far out as they need.
use std::f64::consts::PI;
use std::sync::LazyLock;

use num_complex::Complex64;

use crate::core::{OptionType, PricingError};
use crate::math::gauss_legendre_nodes_weights;
use crate::models::HestonParams;

const PANEL_NODES: usize = 16;
const FIRST_PANEL_WIDTH: f64 = 0.5;
/// Panels stay narrow enough to resolve the `exp(i u ln(F/K))` oscillation.
const MAX_PANEL_WIDTH: f64 = 16.0;
/// Absolute panel mass below which the integrand counts as decayed.
const TAIL_TOLERANCE: f64 = 1e-15;
const MAX_INTEGRATION_BOUND: f64 = 1e4;

static PANEL_RULE: LazyLock<(Vec<f64>, Vec<f64>)> =
    LazyLock::new(|| gauss_legendre_nodes_weights(PANEL_NODES));

/// Analytic Heston engine for European options under flat rate and dividend yield.
#[derive(Debug, Clone, Copy)]
pub struct HestonEngine {
    params: HestonParams,
}

impl HestonEngine {
    pub fn new(params: HestonParams) -> Result<Self, PricingError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> HestonParams {
        self.params
    }

    // Gatheral log-formulation characteristic function for log spot.
    fn characteristic_fn(
        &self,
        u: Complex64,
        ln_spot: f64,
        t: f64,
        rate: f64,
        dividend_yield: f64,
    ) -> Complex64 {
        let p = &self.params;
        let i = Complex64::new(0.0, 1.0);
        let one = Complex64::new(1.0, 0.0);

        let sigma2 = p.sigma * p.sigma;
        let inv_sigma2 = 1.0 / sigma2;
        let iu = i * u;
        let beta = Complex64::new(p.kappa, 0.0) - p.rho * p.sigma * iu;

        let mut d = (beta * beta + sigma2 * (u * u + iu)).sqrt();
        if d.re < 0.0 {
            d = -d;
        }

        let g = (beta - d) / (beta + d);
        let exp_neg_dt = (-d * t).exp();
        let log_term = ((one - g * exp_neg_dt) / (one - g)).ln();

        let a_term = Complex64::new(p.kappa * p.theta * inv_sigma2, 0.0);
        let c = iu * (ln_spot + (rate - dividend_yield) * t)
            + a_term * ((beta - d) * t - 2.0 * log_term);
        let d_term = ((beta - d) * inv_sigma2) * ((one - exp_neg_dt) / (one - g * exp_neg_dt));

        (c + d_term * p.v0).exp()
    }

    /// `int_0^inf Re[e^{iu ln(F/K)} psi(u - i/2)] / (u^2 + 1/4) du` with `psi` the
    /// characteristic function of `ln(S_T / F)`.
    fn lewis_integral(
        &self,
        spot: f64,
        forward: f64,
        strike: f64,
        t: f64,
        rate: f64,
        dividend_yield: f64,
    ) -> Result<f64, PricingError> {
        let i = Complex64::new(0.0, 1.0);
        let ln_spot = spot.ln();
        let ln_forward = forward.ln();
        let log_moneyness = (forward / strike).ln();

        let integrand = |u: f64| {
            let shifted = Complex64::new(u, -0.5);
            let phi = self.characteristic_fn(shifted, ln_spot, t, rate, dividend_yield);
            let psi = phi * (-i * shifted * ln_forward).exp();
            ((i * u * log_moneyness).exp() * psi).re / (u * u + 0.25)
        };

        let (nodes, weights) = &*PANEL_RULE;
        let mut integral = 0.0;
        let mut lower = 0.0;
        let mut width = FIRST_PANEL_WIDTH;
        while lower < MAX_INTEGRATION_BOUND {
            let half = 0.5 * width;
            let mid = lower + half;
            let (sum, mass) = nodes
                .iter()
                .zip(weights)
                .fold((0.0, 0.0), |(sum, mass), (&x, &w)| {
                    let f = integrand(mid + half * x);
                    (sum + w * f, mass + w * f.abs())
                });
            if !sum.is_finite() {
                return Err(PricingError::NumericalError(format!(
                    "heston integrand is non-finite on [{lower}, {}]",
                    lower + width
                )));
            }
            integral += half * sum;
            if half * mass < TAIL_TOLERANCE {
                return Ok(integral);
            }
            lower += width;
            width = (2.0 * width).min(MAX_PANEL_WIDTH);
        }

        Err(PricingError::NumericalError(format!(
            "heston integrand has not decayed by u = {MAX_INTEGRATION_BOUND}"
        )))
    }

    fn call_price(
        &self,
        spot: f64,
        strike: f64,
        t: f64,
        rate: f64,
        dividend_yield: f64,
    ) -> Result<f64, PricingError> {
        let df_r = (-rate * t).exp();
        let forward = spot * ((rate - dividend_yield) * t).exp();

        // C = e^{-rT} (F - sqrt(FK) / pi * I)
        let integral = self.lewis_integral(spot, forward, strike, t, rate, dividend_yield)?;
        let call = df_r * (forward - (forward * strike).sqrt() * integral / PI);
        if !call.is_finite() {
            return Err(PricingError::NumericalError(
                "heston call integral returned non-finite value".to_string(),
            ));
        }
        Ok(call)
    }

    /// European option price with continuously compounded `rate` and `dividend_yield`.
    pub fn price(
        &self,
        option_type: OptionType,
        spot: f64,
        strike: f64,
        expiry: f64,
        rate: f64,
        dividend_yield: f64,
    ) -> Result<f64, PricingError> {
        if !spot.is_finite() || spot <= 0.0 {
            return Err(PricingError::InvalidInput(
                "heston spot must be > 0".to_string(),
            ));
        }
        if !strike.is_finite() || strike <= 0.0 {
            return Err(PricingError::InvalidInput(
                "heston strike must be > 0".to_string(),
            ));
        }
        if expiry <= 0.0 {
            return Ok(match option_type {
                OptionType::Call => (spot - strike).max(0.0),
                OptionType::Put => (strike - spot).max(0.0),
            });
        }

        let call = self.call_price(spot, strike, expiry, rate, dividend_yield)?;
        let price = match option_type {
            OptionType::Call => call,
            OptionType::Put => {
                call - spot * (-dividend_yield * expiry).exp() + strike * (-rate * expiry).exp()
            }
        };
        if !price.is_finite() {
            return Err(PricingError::NumericalError(
                "heston option price is non-finite".to_string(),
            ));
        }
        // Quadrature noise can push deep OTM prices marginally negative.
        Ok(price.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::analytic::black_scholes::bs_price;
    use crate::vol::implied_vol;
    use approx::assert_relative_eq;

    #[test]
    fn vanishing_vol_of_vol_recovers_black_scholes() {
        let engine = HestonEngine::new(HestonParams::new(0.04, 1.0, 0.04, 1e-4, 0.0)).unwrap();
        let heston = engine
            .price(OptionType::Call, 15.35, 16.0, 1.5, 0.01, 0.02)
            .unwrap();
        let bs = bs_price(OptionType::Call, 15.35, 16.0, 0.01, 0.02, 0.2, 1.5);
        assert_relative_eq!(heston, bs, epsilon = 1e-3);
    }

    #[test]
    fn short_expiry_wings_match_black_scholes_with_vanishing_vol_of_vol() {
        let engine = HestonEngine::new(HestonParams::new(0.04, 1.0, 0.04, 0.01, 0.0)).unwrap();
        let (spot, r, q) = (15.35, 0.001, 0.035);
        let one_week = 7.0 / 365.0;
        for (option_type, strike, t) in [
            (OptionType::Call, 17.0, one_week),
            (OptionType::Put, 14.0, one_week),
            (OptionType::Call, 17.5, 0.0493),
            (OptionType::Call, 20.0, 0.2301),
        ] {
            let heston = engine.price(option_type, spot, strike, t, r, q).unwrap();
            let bs = bs_price(option_type, spot, strike, r, q, 0.2, t);
            assert!(heston > 0.0, "K={strike} T={t} priced at zero");
            assert_relative_eq!(heston, bs, max_relative = 1e-2);

            let iv = implied_vol(option_type, spot, strike, r, q, t, heston, 1e-14, 100).unwrap();
            assert!((iv - 0.2).abs() < 5e-4, "K={strike} T={t} iv={iv}");
        }
    }

    #[test]
    fn put_call_parity_holds() {
        let engine = HestonEngine::new(HestonParams::new(0.0292, 1.13, 0.0986, 0.534, -0.585))
            .unwrap();
        let (s, k, t, r, q) = (15.35, 14.5, 2.0, 0.005, 0.03);
        let call = engine.price(OptionType::Call, s, k, t, r, q).unwrap();
        let put = engine.price(OptionType::Put, s, k, t, r, q).unwrap();
        let parity = s * (-q * t).exp() - k * (-r * t).exp();
        assert_relative_eq!(call - put, parity, epsilon = 1e-8);
    }

    #[test]
    fn expired_option_returns_intrinsic() {
        let engine = HestonEngine::new(HestonParams::new(0.04, 1.5, 0.04, 0.5, -0.7)).unwrap();
        assert_eq!(engine.price(OptionType::Put, 15.0, 16.0, 0.0, 0.0, 0.0).unwrap(), 1.0);
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert!(HestonEngine::new(HestonParams::new(0.04, 1.5, 0.04, 0.5, 1.2)).is_err());
    }
}
