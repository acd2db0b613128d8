//! Calibration diagnostics and warning synthesis.

use crate::calibration::core::{
    BoxConstraints, CalibrationDiagnostics, CalibrationWarningFlag, ConvergenceInfo, FitQuality,
    InstrumentError,
};

/// Implied-vol RMSE above which a fit is flagged as poor.
pub const POOR_FIT_RMSE: f64 = 0.005;

/// Jacobian condition number above which a fit is flagged as ill-conditioned.
pub const ILL_CONDITIONED: f64 = 1e8;

pub fn fit_quality(errors: &[InstrumentError]) -> FitQuality {
    if errors.is_empty() {
        return FitQuality {
            rmse: 0.0,
            mae: 0.0,
            max_abs_error: 0.0,
        };
    }

    let n = errors.len() as f64;
    let rmse = (errors
        .iter()
        .map(|e| e.signed_error * e.signed_error)
        .sum::<f64>()
        / n)
        .sqrt();
    let mae = errors.iter().map(|e| e.abs_error).sum::<f64>() / n;
    let max_abs_error = errors.iter().map(|e| e.abs_error).fold(0.0_f64, f64::max);

    FitQuality {
        rmse,
        mae,
        max_abs_error,
    }
}

pub fn warning_flags(
    convergence: &ConvergenceInfo,
    condition_number: f64,
    fit: &FitQuality,
    bounds: Option<&BoxConstraints>,
    params: Option<&[f64]>,
) -> Vec<CalibrationWarningFlag> {
    let mut out = Vec::new();

    if !convergence.converged {
        out.push(CalibrationWarningFlag::NonConvergent);
    }

    if !condition_number.is_finite() || condition_number > ILL_CONDITIONED {
        out.push(CalibrationWarningFlag::IllConditioned);
    }

    if !fit.rmse.is_finite() || fit.rmse > POOR_FIT_RMSE {
        out.push(CalibrationWarningFlag::PoorFit);
    }

    if let (Some(b), Some(x)) = (bounds, params)
        && b.hits_boundary(x, 1e-6)
    {
        out.push(CalibrationWarningFlag::HitBoundary);
    }

    out
}

pub fn diagnostics(
    errors: &[InstrumentError],
    convergence: &ConvergenceInfo,
    condition_number: f64,
    bounds: Option<&BoxConstraints>,
    params: Option<&[f64]>,
) -> CalibrationDiagnostics {
    let fit = fit_quality(errors);
    let flags = warning_flags(convergence, condition_number, &fit, bounds, params);

    CalibrationDiagnostics {
        fit_quality: fit,
        warning_flags: flags,
    }
}
