//! Calibration result contracts shared by the optimizer and the Heston calibrator.
//!
//! References:
//! - Nocedal and Wright, *Numerical Optimization* (2nd ed.), Ch. 10.
//! - More (1978), Levenberg-Marquardt implementation and convergence behavior.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::core::PricingError;

/// Box constraints `lower <= x <= upper` applied to every trial point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxConstraints {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl BoxConstraints {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Result<Self, PricingError> {
        if lower.is_empty() || lower.len() != upper.len() {
            return Err(PricingError::InvalidInput(
                "constraints require same non-zero lower/upper dimensions".to_string(),
            ));
        }
        for (i, (lo, hi)) in lower.iter().zip(&upper).enumerate() {
            if !lo.is_finite() || !hi.is_finite() || lo > hi {
                return Err(PricingError::InvalidInput(format!(
                    "invalid bound at index {i}: [{lo}, {hi}]"
                )));
            }
        }
        Ok(Self { lower, upper })
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.lower.len()
    }

    pub fn clamp(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .enumerate()
            .map(|(i, v)| v.clamp(self.lower[i], self.upper[i]))
            .collect()
    }

    pub fn hits_boundary(&self, x: &[f64], eps: f64) -> bool {
        let eps = eps.max(1e-12);
        x.iter()
            .enumerate()
            .any(|(i, &v)| (v - self.lower[i]).abs() <= eps || (self.upper[i] - v).abs() <= eps)
    }
}

/// Model-versus-market record for one calibration helper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentError {
    pub id: String,
    pub strike: f64,
    pub maturity: f64,
    pub market_vol: f64,
    pub model_vol: f64,
    pub signed_error: f64,
    pub abs_error: f64,
}

impl InstrumentError {
    pub fn new(id: impl Into<String>, strike: f64, maturity: f64, market_vol: f64, model_vol: f64) -> Self {
        let signed_error = model_vol - market_vol;
        Self {
            id: id.into(),
            strike,
            maturity,
            market_vol,
            model_vol,
            signed_error,
            abs_error: signed_error.abs(),
        }
    }
}

/// Optimizer termination reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    GradientTolerance,
    StepTolerance,
    ObjectiveTolerance,
    Stagnation,
    MaxIterations,
    NumericalFailure,
}

/// Convergence metadata for optimization runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceInfo {
    pub iterations: usize,
    pub objective_evaluations: usize,
    pub gradient_norm: f64,
    pub step_norm: f64,
    pub converged: bool,
    pub reason: TerminationReason,
}

/// Aggregate fit-quality metrics in vol units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitQuality {
    pub rmse: f64,
    pub mae: f64,
    pub max_abs_error: f64,
}

/// Warning flags derived from fit and convergence diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalibrationWarningFlag {
    IllConditioned,
    HitBoundary,
    PoorFit,
    NonConvergent,
    /// Helpers whose model price was too small to invert were left out of the fit.
    ExcludedInstruments,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationDiagnostics {
    pub fit_quality: FitQuality,
    pub warning_flags: Vec<CalibrationWarningFlag>,
}

/// Calibrated parameters plus everything needed to judge whether to trust them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult<P> {
    pub params: P,
    pub objective: f64,
    pub per_instrument_error: Vec<InstrumentError>,
    /// Ids of helpers left out of the fit.
    #[serde(default)]
    pub excluded_instruments: Vec<String>,
    /// Row-major Jacobian: one row per fitted helper residual.
    pub jacobian: Vec<Vec<f64>>,
    pub condition_number: f64,
    pub convergence: ConvergenceInfo,
    pub diagnostics: CalibrationDiagnostics,
}

impl<P> CalibrationResult<P> {
    pub fn has_warning(&self, flag: CalibrationWarningFlag) -> bool {
        self.diagnostics.warning_flags.contains(&flag)
    }

    /// Residual threshold check callers should apply before trusting the fit.
    pub fn is_acceptable(&self, max_rmse: f64) -> bool {
        self.diagnostics.fit_quality.rmse <= max_rmse
    }
}

pub fn matrix_to_rows(m: &DMatrix<f64>) -> Vec<Vec<f64>> {
    m.row_iter().map(|row| row.iter().copied().collect()).collect()
}

/// Condition number `sigma_max / sigma_min` from SVD singular values.
pub fn matrix_condition_number(jacobian: &DMatrix<f64>) -> f64 {
    if jacobian.nrows() == 0 || jacobian.ncols() == 0 {
        return 1.0;
    }

    let svd = jacobian.clone().svd(false, false);
    let mut sigma_max: f64 = 0.0;
    let mut sigma_min = f64::INFINITY;

    for s in svd.singular_values.iter() {
        sigma_max = sigma_max.max(*s);
        if *s > 1e-14 {
            sigma_min = sigma_min.min(*s);
        }
    }

    if sigma_min.is_finite() && sigma_min > 0.0 {
        sigma_max / sigma_min
    } else {
        f64::INFINITY
    }
}

#[inline]
pub fn finite_metric(x: f64) -> f64 {
    if x.is_finite() { x } else { f64::MAX }
}

pub fn sanitize_convergence(mut c: ConvergenceInfo) -> ConvergenceInfo {
    c.gradient_norm = finite_metric(c.gradient_norm);
    c.step_norm = finite_metric(c.step_norm);
    c
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn constraints_clamp_and_detect_boundary() {
        let b = BoxConstraints::new(vec![0.0, -1.0], vec![1.0, 1.0]).unwrap();
        assert_eq!(b.clamp(&[2.0, -3.0]), vec![1.0, -1.0]);
        assert!(b.hits_boundary(&[1.0, 0.0], 1e-9));
        assert!(!b.hits_boundary(&[0.5, 0.0], 1e-9));
        assert!(BoxConstraints::new(vec![1.0], vec![0.0]).is_err());
    }

    #[test]
    fn condition_number_of_diagonal_matrix() {
        let m = DMatrix::from_row_slice(2, 2, &[4.0, 0.0, 0.0, 0.5]);
        assert_relative_eq!(matrix_condition_number(&m), 8.0, epsilon = 1e-12);
        assert_eq!(matrix_to_rows(&m), vec![vec![4.0, 0.0], vec![0.0, 0.5]]);
    }

    #[test]
    fn instrument_error_signs_model_minus_market() {
        let e = InstrumentError::new("K15", 15.0, 1.0, 0.25, 0.24);
        assert_relative_eq!(e.signed_error, -0.01, epsilon = 1e-15);
        assert_relative_eq!(e.abs_error, 0.01, epsilon = 1e-15);
    }
}
