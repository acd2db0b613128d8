//! Heston calibration via semi-analytic pricing and constrained LM.
//!
//! Residuals are implied-vol errors, one per helper. Helpers whose model price at the
//! starting point is below `1e-7 * spot` cannot be inverted reliably; they are left
//! out of the fit and listed in the result. Non-convergence is a soft failure: the
//! last iterate is returned together with convergence metadata and warning flags,
//! and callers decide whether the fit is good enough.
//!
//! References:
//! - Heston (1993), closed-form characteristic-function model.
//! - Gatheral (2006), parameter admissibility and smile behavior.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::{info, warn};

use crate::calibration::core::{
    BoxConstraints, CalibrationResult, CalibrationWarningFlag, InstrumentError, finite_metric, matrix_condition_number,
    matrix_to_rows, sanitize_convergence,
};
use crate::calibration::diagnostics::diagnostics;
use crate::calibration::instruments::HestonHelper;
use crate::calibration::optimizers::{LmOptions, levenberg_marquardt};
use crate::core::PricingError;
use crate::engines::analytic::HestonEngine;
use crate::models::HestonParams;

/// Residual assigned to every helper when a trial point cannot be priced.
const PENALTY_RESIDUAL: f64 = 1e6;

/// Smallest model price, as a fraction of spot, a helper needs to enter the fit.
const MIN_RESOLVABLE_PRICE_RATIO: f64 = 1e-7;

/// Admissible region in `(v0, kappa, theta, sigma, rho)` order.
pub fn default_heston_bounds() -> Result<BoxConstraints, PricingError> {
    BoxConstraints::new(
        vec![1e-4, 1e-3, 1e-4, 1e-3, -0.999],
        vec![2.0, 20.0, 2.0, 5.0, 0.999],
    )
}

#[derive(Debug, Clone)]
pub struct HestonCalibrator {
    /// Reference spot the helpers are priced off.
    pub spot: f64,
    pub bounds: BoxConstraints,
    pub lm_options: LmOptions,
}

impl HestonCalibrator {
    pub fn new(spot: f64, lm_options: LmOptions) -> Result<Self, PricingError> {
        if !spot.is_finite() || spot <= 0.0 {
            return Err(PricingError::InvalidInput(
                "calibration spot must be > 0".to_string(),
            ));
        }
        Ok(Self {
            spot,
            bounds: default_heston_bounds()?,
            lm_options,
        })
    }

    fn model_vol(&self, engine: &HestonEngine, helper: &HestonHelper) -> Option<f64> {
        helper.model_implied_vol(engine, self.spot).ok()
    }

    fn is_resolvable(&self, engine: &HestonEngine, helper: &HestonHelper) -> bool {
        helper
            .model_price(engine, self.spot)
            .is_ok_and(|price| price >= MIN_RESOLVABLE_PRICE_RATIO * self.spot)
            && self.model_vol(engine, helper).is_some()
    }

    fn model_vols(&self, x: &[f64], helpers: &[HestonHelper]) -> Option<Vec<f64>> {
        let params = HestonParams::from_slice(x).ok()?;
        let engine = HestonEngine::new(params).ok()?;

        #[cfg(feature = "parallel")]
        let vols: Option<Vec<f64>> = helpers
            .par_iter()
            .map(|h| self.model_vol(&engine, h))
            .collect();
        #[cfg(not(feature = "parallel"))]
        let vols: Option<Vec<f64>> = helpers.iter().map(|h| self.model_vol(&engine, h)).collect();

        vols
    }

    fn residuals(&self, x: &[f64], helpers: &[HestonHelper]) -> Vec<f64> {
        match self.model_vols(x, helpers) {
            Some(vols) => vols
                .iter()
                .zip(helpers)
                .map(|(model, h)| model - h.market_vol)
                .collect(),
            None => vec![PENALTY_RESIDUAL; helpers.len()],
        }
    }

    /// Fits `(v0, kappa, theta, sigma, rho)` starting from `initial`.
    pub fn calibrate(
        &self,
        initial: HestonParams,
        helpers: &[HestonHelper],
    ) -> Result<CalibrationResult<HestonParams>, PricingError> {
        if helpers.is_empty() {
            return Err(PricingError::InvalidInput(
                "heston calibration requires non-empty helper set".to_string(),
            ));
        }
        if helpers.iter().any(|h| {
            !h.strike.is_finite()
                || h.strike <= 0.0
                || !h.expiry.is_finite()
                || h.expiry <= 0.0
                || !h.market_vol.is_finite()
                || h.market_vol <= 0.0
        }) {
            return Err(PricingError::InvalidInput(
                "invalid Heston helper set".to_string(),
            ));
        }
        let start = HestonEngine::new(initial)?;
        let (fitted, excluded): (Vec<&HestonHelper>, Vec<&HestonHelper>) =
            helpers.iter().partition(|h| self.is_resolvable(&start, h));
        if fitted.is_empty() {
            return Err(PricingError::NumericalError(
                "no calibration helper can be priced at the initial guess".to_string(),
            ));
        }
        let excluded: Vec<String> = excluded.into_iter().map(|h| h.id.clone()).collect();
        if !excluded.is_empty() {
            warn!(
                excluded = excluded.len(),
                first = %excluded[0],
                "excluding helpers whose model price is too small to invert"
            );
        }
        let helpers: Vec<HestonHelper> = fitted.into_iter().cloned().collect();

        info!(helpers = helpers.len(), "calibrating heston model");
        let opt = levenberg_marquardt(&initial.to_vec(), &self.bounds, self.lm_options, |x| {
            self.residuals(x, &helpers)
        })?;

        let params = HestonParams::from_slice(&opt.x)?;
        let model_vols = self.model_vols(&opt.x, &helpers).ok_or_else(|| {
            PricingError::NumericalError(
                "failed to evaluate calibrated Heston model vols".to_string(),
            )
        })?;

        let errors: Vec<InstrumentError> = helpers
            .iter()
            .zip(&model_vols)
            .map(|(h, m)| InstrumentError::new(h.id.clone(), h.strike, h.expiry, h.market_vol, *m))
            .collect();

        let condition_number = finite_metric(matrix_condition_number(&opt.jacobian));
        let convergence = sanitize_convergence(opt.convergence);
        let mut diagnostics = diagnostics(
            &errors,
            &convergence,
            condition_number,
            Some(&self.bounds),
            Some(&opt.x),
        );

        info!(
            theta = params.theta,
            kappa = params.kappa,
            sigma = params.sigma,
            rho = params.rho,
            v0 = params.v0,
            rmse = diagnostics.fit_quality.rmse,
            iterations = convergence.iterations,
            "heston calibration finished"
        );
        if !excluded.is_empty() {
            diagnostics
                .warning_flags
                .push(CalibrationWarningFlag::ExcludedInstruments);
        }
        if !params.feller_satisfied() {
            warn!(
                two_kappa_theta = 2.0 * params.kappa * params.theta,
                sigma_squared = params.sigma * params.sigma,
                "calibrated heston parameters violate the Feller condition"
            );
        }
        if !diagnostics.warning_flags.is_empty() {
            warn!(
                flags = ?diagnostics.warning_flags,
                reason = ?convergence.reason,
                "heston calibration diagnostics raised warnings"
            );
        }

        Ok(CalibrationResult {
            params,
            objective: opt.objective,
            per_instrument_error: errors,
            excluded_instruments: excluded,
            jacobian: matrix_to_rows(&opt.jacobian),
            condition_number,
            convergence,
            diagnostics,
        })
    }
}
