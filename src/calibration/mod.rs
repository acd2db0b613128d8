//! Heston model calibration to a dated implied-volatility surface.
//!
//! - helper construction on a strike x tenor grid,
//! - box-constrained Levenberg-Marquardt on implied-vol residuals,
//! - fit diagnostics and warning flags returned with the parameters.

pub mod core;
pub mod diagnostics;
pub mod heston;
pub mod instruments;
pub mod optimizers;

pub use self::core::{
    BoxConstraints, CalibrationDiagnostics, CalibrationResult, CalibrationWarningFlag,
    ConvergenceInfo, FitQuality, InstrumentError, TerminationReason,
};
pub use diagnostics::{diagnostics, fit_quality, warning_flags};
pub use heston::{HestonCalibrator, default_heston_bounds};
pub use instruments::{HestonHelper, build_helpers};
pub use optimizers::{LmOptions, OptimisationResult, levenberg_marquardt};
