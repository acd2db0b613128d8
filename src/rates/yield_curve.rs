//! Module `rates::yield_curve`.
//!
//! Implements discount curves with log-linear interpolation and the dated
//! `YieldTermStructure` interface consumed by valuation, diffusion, and calibration code.
//!
//! Key types and purpose: `YieldCurve` (tenor-indexed nodes), `YieldTermStructure`
//! (date-aware discounting), `FlatForward`, `InterpolatedDiscountCurve`.
//!
//! Numerical considerations: discount factors are interpolated log-linearly, so
//! instantaneous forwards are piecewise flat between nodes and flat beyond the last node.
use chrono::NaiveDate;

use crate::core::PricingError;
use crate::rates::{DayCountConvention, year_fraction};

/// Dated discounting interface.
///
/// Implementors only need `reference_date`, `day_count`, and `discount_t`; date
/// lookups and rate conversions are derived.
pub trait YieldTermStructure: std::fmt::Debug + Send + Sync {
    /// Valuation date at which `discount == 1`.
    fn reference_date(&self) -> NaiveDate;

    /// Convention mapping dates onto curve time.
    fn day_count(&self) -> DayCountConvention;

    /// Discount factor at curve time `t` (years).
    fn discount_t(&self, t: f64) -> f64;

    /// Curve time of `date`.
    fn time_from_reference(&self, date: NaiveDate) -> f64 {
        year_fraction(self.reference_date(), date, self.day_count())
    }

    /// Discount factor for a calendar date.
    fn discount(&self, date: NaiveDate) -> f64 {
        self.discount_t(self.time_from_reference(date))
    }

    /// Continuously-compounded zero rate at time `t`.
    fn zero_rate(&self, t: f64) -> f64 {
        if t <= 1.0e-12 {
            return self.forward_rate(0.0, 1.0e-4);
        }
        -self.discount_t(t).ln() / t
    }

    /// Continuously-compounded forward rate between `t1` and `t2`.
    fn forward_rate(&self, t1: f64, t2: f64) -> f64 {
        if t2 - t1 <= 1.0e-12 {
            return self.forward_rate(t1, t1 + 1.0e-4);
        }
        (self.discount_t(t1) / self.discount_t(t2)).ln() / (t2 - t1)
    }
}

/// Discount-factor term structure keyed by maturity tenor in years.
#[derive(Debug, Clone, PartialEq)]
pub struct YieldCurve {
    /// Curve nodes as `(tenor, discount_factor)`.
    pub tenors: Vec<(f64, f64)>,
}

impl YieldCurve {
    /// Creates a curve from unsorted discount-factor nodes.
    pub fn new(mut tenors: Vec<(f64, f64)>) -> Self {
        tenors.retain(|(t, df)| *t > 0.0 && *df > 0.0);
        tenors.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { tenors }
    }

    /// Builds a curve from continuously-compounded zero rates `(tenor, rate)`.
    pub fn from_zero_rates(zero_rates: &[(f64, f64)]) -> Self {
        Self::new(
            zero_rates
                .iter()
                .map(|(t, r)| (*t, (-r * t).exp()))
                .collect(),
        )
    }

    /// Returns discount factor at tenor `t` using log-linear interpolation.
    pub fn discount_factor(&self, t: f64) -> f64 {
        discount_factor_from_points(&self.tenors, t)
    }

    /// Returns continuously-compounded zero rate at tenor `t`.
    pub fn zero_rate(&self, t: f64) -> f64 {
        if t <= 0.0 {
            return 0.0;
        }
        -self.discount_factor(t).ln() / t
    }
}

/// Flat continuously-compounded curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatForward {
    pub reference_date: NaiveDate,
    pub rate: f64,
    pub day_count: DayCountConvention,
}

impl FlatForward {
    pub fn new(reference_date: NaiveDate, rate: f64, day_count: DayCountConvention) -> Self {
        Self {
            reference_date,
            rate,
            day_count,
        }
    }
}

impl YieldTermStructure for FlatForward {
    fn reference_date(&self) -> NaiveDate {
        self.reference_date
    }

    fn day_count(&self) -> DayCountConvention {
        self.day_count
    }

    fn discount_t(&self, t: f64) -> f64 {
        (-self.rate * t).exp()
    }
}

/// Dated wrapper around a [`YieldCurve`] built from zero-rate pillars.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolatedDiscountCurve {
    reference_date: NaiveDate,
    day_count: DayCountConvention,
    curve: YieldCurve,
}

impl InterpolatedDiscountCurve {
    /// Builds a curve from `(pillar date, continuously-compounded zero rate)` nodes.
    pub fn from_zero_rates(
        reference_date: NaiveDate,
        nodes: &[(NaiveDate, f64)],
        day_count: DayCountConvention,
    ) -> Result<Self, PricingError> {
        if nodes.is_empty() {
            return Err(PricingError::MarketDataMissing(
                "zero-rate curve requires at least one pillar".to_string(),
            ));
        }
        let mut points = Vec::with_capacity(nodes.len());
        for (date, rate) in nodes {
            if !rate.is_finite() {
                return Err(PricingError::InvalidInput(format!(
                    "zero rate at {date} must be finite"
                )));
            }
            let t = year_fraction(reference_date, *date, day_count);
            if t <= 0.0 {
                return Err(PricingError::InvalidInput(format!(
                    "curve pillar {date} must be after reference date {reference_date}"
                )));
            }
            points.push((t, *rate));
        }
        if points.windows(2).any(|w| w[1].0 <= w[0].0) {
            return Err(PricingError::InvalidInput(
                "curve pillars must be strictly increasing".to_string(),
            ));
        }

        Ok(Self {
            reference_date,
            day_count,
            curve: YieldCurve::from_zero_rates(&points),
        })
    }

    pub fn curve(&self) -> &YieldCurve {
        &self.curve
    }
}

impl YieldTermStructure for InterpolatedDiscountCurve {
    fn reference_date(&self) -> NaiveDate {
        self.reference_date
    }

    fn day_count(&self) -> DayCountConvention {
        self.day_count
    }

    fn discount_t(&self, t: f64) -> f64 {
        self.curve.discount_factor(t)
    }
}

fn discount_factor_from_points(points: &[(f64, f64)], t: f64) -> f64 {
    if t <= 0.0 || points.is_empty() {
        return 1.0;
    }

    let first = points[0];
    if t <= first.0 {
        return log_linear_df(0.0, 1.0, first.0, first.1, t);
    }

    for window in points.windows(2) {
        let left = window[0];
        let right = window[1];
        if t <= right.0 {
            return log_linear_df(left.0, left.1, right.0, right.1, t);
        }
    }

    // Flat forward extrapolation from the last two nodes (or the last zero rate).
    let n = points.len();
    let last = points[n - 1];
    let fwd = if n >= 2 {
        let prev = points[n - 2];
        (prev.1 / last.1).ln() / (last.0 - prev.0)
    } else {
        -last.1.ln() / last.0
    };
    last.1 * (-fwd * (t - last.0)).exp()
}

#[inline]
fn log_linear_df(t0: f64, df0: f64, t1: f64, df1: f64, t: f64) -> f64 {
    let w = (t - t0) / (t1 - t0);
    (df0.ln() * (1.0 - w) + df1.ln() * w).exp()
}
