//! Module `models::process`.
//!
//! Implements the one-asset diffusions the Monte Carlo engine can simulate: a
//! Black-Scholes-Merton process driven by curves plus a Black vol term structure, and
//! a Heston process driven by calibrated parameters.
//!
//! Key types and purpose: `StochasticProcess` (uniform `factors` / trajectory
//! evolution capability), `StepCoefficients` (deterministic per-step inputs cached
//! once per grid), `Diffusion` (tagged variant selected by configuration).
//!
//! Numerical considerations: the lognormal step is exact given deterministic forward
//! variance; the Heston step is log-Euler with full truncation, so discretization bias
//! shrinks with the step count.
//!
//! The lognormal process reads forward variance off the surface at one reference
//! strike (the note strike) and ignores the smile along the path. It is not a Dupire
//! local-vol diffusion, so prices differ from a local-vol engine on a skewed surface
//! by the value of the smile dynamics.
use std::sync::Arc;

use crate::core::PricingError;
use crate::mc::TimeGrid;
use crate::models::HestonParams;
use crate::rates::YieldTermStructure;
use crate::vol::BlackVolTermStructure;

/// Deterministic inputs of one grid step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepCoefficients {
    pub dt: f64,
    /// Integrated `r - q` over the step.
    pub carry: f64,
    /// Black forward variance over the step (lognormal only).
    pub variance: f64,
}

/// Single-asset diffusion.
pub trait StochasticProcess: std::fmt::Debug + Send + Sync {
    /// Normals consumed per time step.
    fn factors(&self) -> usize;

    fn initial_value(&self) -> f64;

    /// Evaluates curve and volatility lookups once for every step of `grid`.
    fn discretize(&self, grid: &TimeGrid) -> Vec<StepCoefficients>;

    /// Fills `path[0..=steps.len()]` from `factors() * steps.len()` normals laid out
    /// step-major.
    fn evolve(&self, steps: &[StepCoefficients], normals: &[f64], path: &mut [f64]);
}

fn carry(
    risk_free: &dyn YieldTermStructure,
    dividend: &dyn YieldTermStructure,
    t0: f64,
    t1: f64,
) -> f64 {
    (risk_free.discount_t(t0) / risk_free.discount_t(t1)).ln()
        - (dividend.discount_t(t0) / dividend.discount_t(t1)).ln()
}

fn validate_spot(s0: f64) -> Result<(), PricingError> {
    if !s0.is_finite() || s0 <= 0.0 {
        return Err(PricingError::InvalidInput(
            "process spot must be > 0".to_string(),
        ));
    }
    Ok(())
}

/// Lognormal diffusion with curve-implied drift and surface-implied variance.
#[derive(Debug, Clone)]
pub struct BlackScholesProcess {
    s0: f64,
    risk_free: Arc<dyn YieldTermStructure>,
    dividend: Arc<dyn YieldTermStructure>,
    volatility: Arc<dyn BlackVolTermStructure>,
    /// Strike at which the surface is read to build the variance term structure.
    reference_strike: f64,
}

impl BlackScholesProcess {
    pub fn new(
        s0: f64,
        risk_free: Arc<dyn YieldTermStructure>,
        dividend: Arc<dyn YieldTermStructure>,
        volatility: Arc<dyn BlackVolTermStructure>,
        reference_strike: f64,
    ) -> Result<Self, PricingError> {
        validate_spot(s0)?;
        if !reference_strike.is_finite() || reference_strike <= 0.0 {
            return Err(PricingError::InvalidInput(
                "process reference strike must be > 0".to_string(),
            ));
        }
        let probe = volatility.black_vol_t(1.0, reference_strike);
        if !probe.is_finite() || probe <= 0.0 {
            return Err(PricingError::InvalidInput(format!(
                "black volatility at reference strike must be > 0, got {probe}"
            )));
        }
        Ok(Self {
            s0,
            risk_free,
            dividend,
            volatility,
            reference_strike,
        })
    }
}

impl StochasticProcess for BlackScholesProcess {
    fn factors(&self) -> usize {
        1
    }

    fn initial_value(&self) -> f64 {
        self.s0
    }

    fn discretize(&self, grid: &TimeGrid) -> Vec<StepCoefficients> {
        grid.times()
            .windows(2)
            .map(|w| StepCoefficients {
                dt: w[1] - w[0],
                carry: carry(self.risk_free.as_ref(), self.dividend.as_ref(), w[0], w[1]),
                variance: self
                    .volatility
                    .black_forward_variance(w[0], w[1], self.reference_strike),
            })
            .collect()
    }

    fn evolve(&self, steps: &[StepCoefficients], normals: &[f64], path: &mut [f64]) {
        let mut s = self.s0;
        path[0] = s;
        for (j, (step, &z)) in steps.iter().zip(normals.iter()).enumerate() {
            let drift = step.carry - 0.5 * step.variance;
            s *= step.variance.sqrt().mul_add(z, drift).exp();
            path[j + 1] = s;
        }
    }
}

/// Heston diffusion with curve-implied drift.
#[derive(Debug, Clone)]
pub struct HestonProcess {
    s0: f64,
    risk_free: Arc<dyn YieldTermStructure>,
    dividend: Arc<dyn YieldTermStructure>,
    params: HestonParams,
}

impl HestonProcess {
    pub fn new(
        s0: f64,
        risk_free: Arc<dyn YieldTermStructure>,
        dividend: Arc<dyn YieldTermStructure>,
        params: HestonParams,
    ) -> Result<Self, PricingError> {
        validate_spot(s0)?;
        params.validate()?;
        Ok(Self {
            s0,
            risk_free,
            dividend,
            params,
        })
    }

    pub fn params(&self) -> HestonParams {
        self.params
    }

    /// One log-Euler step with full truncation; returns `(s_next, v_next)`.
    #[inline]
    pub fn step(&self, s: f64, v: f64, step: &StepCoefficients, z1: f64, z2: f64) -> (f64, f64) {
        let p = &self.params;
        let v_pos = v.max(0.0);
        let sqrt_v_dt = (v_pos * step.dt).sqrt();

        // Correlated Brownian increments.
        let zv = z1;
        let zs = p.rho * z1 + (1.0 - p.rho * p.rho).sqrt() * z2;

        let v_next = (v + p.kappa * (p.theta - v_pos) * step.dt + p.sigma * sqrt_v_dt * zv).max(0.0);
        let s_next = s * (step.carry - 0.5 * v_pos * step.dt + sqrt_v_dt * zs).exp();

        (s_next, v_next)
    }
}

impl StochasticProcess for HestonProcess {
    fn factors(&self) -> usize {
        2
    }

    fn initial_value(&self) -> f64 {
        self.s0
    }

    fn discretize(&self, grid: &TimeGrid) -> Vec<StepCoefficients> {
        grid.times()
            .windows(2)
            .map(|w| StepCoefficients {
                dt: w[1] - w[0],
                carry: carry(self.risk_free.as_ref(), self.dividend.as_ref(), w[0], w[1]),
                variance: 0.0,
            })
            .collect()
    }

    fn evolve(&self, steps: &[StepCoefficients], normals: &[f64], path: &mut [f64]) {
        let mut s = self.s0;
        let mut v = self.params.v0;
        path[0] = s;
        for (j, (step, z)) in steps.iter().zip(normals.chunks_exact(2)).enumerate() {
            let (s_next, v_next) = self.step(s, v, step, z[0], z[1]);
            s = s_next.max(1e-12);
            v = v_next;
            path[j + 1] = s;
        }
    }
}

/// Model variants the simulation can run.
#[derive(Debug, Clone)]
pub enum Diffusion {
    Lognormal(BlackScholesProcess),
    StochasticVolatility(HestonProcess),
}

impl Diffusion {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Lognormal(_) => "black_scholes",
            Self::StochasticVolatility(_) => "heston",
        }
    }

    fn as_process(&self) -> &dyn StochasticProcess {
        match self {
            Self::Lognormal(p) => p,
            Self::StochasticVolatility(p) => p,
        }
    }
}

impl StochasticProcess for Diffusion {
    fn factors(&self) -> usize {
        self.as_process().factors()
    }

    fn initial_value(&self) -> f64 {
        self.as_process().initial_value()
    }

    fn discretize(&self, grid: &TimeGrid) -> Vec<StepCoefficients> {
        self.as_process().discretize(grid)
    }

    fn evolve(&self, steps: &[StepCoefficients], normals: &[f64], path: &mut [f64]) {
        self.as_process().evolve(steps, normals, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::{DayCountConvention, FlatForward};
    use crate::vol::BlackConstantVol;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn settlement() -> NaiveDate {
        NaiveDate::from_ymd_opt(2017, 3, 31).unwrap()
    }

    fn flat(rate: f64) -> Arc<dyn YieldTermStructure> {
        Arc::new(FlatForward::new(settlement(), rate, DayCountConvention::Act365Fixed))
    }

    fn bs_process(vol: f64) -> BlackScholesProcess {
        let vol = Arc::new(
            BlackConstantVol::new(settlement(), vol, DayCountConvention::Act365Fixed).unwrap(),
        );
        BlackScholesProcess::new(15.35, flat(0.02), flat(0.03), vol, 15.35).unwrap()
    }

    #[test]
    fn lognormal_zero_noise_path_grows_at_forward_carry() {
        let process = bs_process(0.25);
        let grid = TimeGrid::new(2.0, 4).unwrap();
        let steps = process.discretize(&grid);
        let mut path = vec![0.0; grid.len()];
        process.evolve(&steps, &[0.0; 4], &mut path);

        assert_eq!(process.factors(), 1);
        assert_relative_eq!(steps[0].variance, 0.25 * 0.25 * 0.5, epsilon = 1e-12);
        let expected = 15.35 * ((0.02 - 0.03 - 0.5 * 0.0625) * 2.0_f64).exp();
        assert_relative_eq!(path[4], expected, epsilon = 1e-10);
    }

    #[test]
    fn lognormal_rejects_non_positive_spot() {
        let vol = Arc::new(
            BlackConstantVol::new(settlement(), 0.2, DayCountConvention::Act365Fixed).unwrap(),
        );
        let err = BlackScholesProcess::new(0.0, flat(0.0), flat(0.0), vol, 15.0).unwrap_err();
        assert!(matches!(err, PricingError::InvalidInput(_)));
    }

    #[test]
    fn heston_path_stays_positive_with_two_factors() {
        let params = HestonParams::new(0.04, 1.5, 0.04, 0.9, -0.7);
        let process = HestonProcess::new(15.35, flat(0.01), flat(0.0), params).unwrap();
        let grid = TimeGrid::new(1.0, 40).unwrap();
        let steps = process.discretize(&grid);
        let normals: Vec<f64> = (0..80).map(|i| if i % 3 == 0 { -2.5 } else { 0.4 }).collect();
        let mut path = vec![0.0; grid.len()];
        process.evolve(&steps, &normals, &mut path);

        assert_eq!(process.factors(), 2);
        assert!(path.iter().all(|s| *s > 0.0 && s.is_finite()));
    }

    #[test]
    fn heston_construction_fails_on_invalid_params() {
        let params = HestonParams::new(0.04, -1.0, 0.04, 0.5, -0.7);
        assert!(HestonProcess::new(15.35, flat(0.01), flat(0.0), params).is_err());
    }

    #[test]
    fn diffusion_delegates_to_variant() {
        let diffusion = Diffusion::Lognormal(bs_process(0.2));
        assert_eq!(diffusion.factors(), 1);
        assert_eq!(diffusion.name(), "black_scholes");
        assert_eq!(diffusion.initial_value(), 15.35);
    }
}
