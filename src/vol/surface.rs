//! Module `vol::surface`.
//!
//! Implements Black volatility term structures queried by the lognormal diffusion and
//! by the Heston calibrator.
//!
//! Key types and purpose: `BlackVolTermStructure` (date/strike lookups), `BlackConstantVol`,
//! `BlackVarianceSurface` (date x strike grid of market vols).
//!
//! Numerical considerations: interpolation runs on total variance `w = sigma^2 t`,
//! bilinear in `(t, K)`. Strikes outside the grid are clamped (flat smile), expiries past
//! the last column keep the last vol constant, expiries before the first column interpolate
//! from `w(0) = 0`.
use chrono::NaiveDate;

use crate::core::PricingError;
use crate::rates::{DayCountConvention, year_fraction};

/// Dated Black volatility lookups.
pub trait BlackVolTermStructure: std::fmt::Debug + Send + Sync {
    fn reference_date(&self) -> NaiveDate;

    fn day_count(&self) -> DayCountConvention;

    /// Total Black variance `sigma^2 t` at time `t` and `strike`.
    fn black_variance_t(&self, t: f64, strike: f64) -> f64;

    fn time_from_reference(&self, date: NaiveDate) -> f64 {
        year_fraction(self.reference_date(), date, self.day_count())
    }

    /// Black volatility at time `t`; short-end queries use a one-day expiry.
    fn black_vol_t(&self, t: f64, strike: f64) -> f64 {
        let t = t.max(1.0 / 365.0);
        (self.black_variance_t(t, strike).max(0.0) / t).sqrt()
    }

    fn black_vol(&self, date: NaiveDate, strike: f64) -> f64 {
        self.black_vol_t(self.time_from_reference(date), strike)
    }

    fn black_variance(&self, date: NaiveDate, strike: f64) -> f64 {
        self.black_variance_t(self.time_from_reference(date), strike)
    }

    /// Variance accrued over `[t1, t2]`, floored at zero.
    fn black_forward_variance(&self, t1: f64, t2: f64, strike: f64) -> f64 {
        (self.black_variance_t(t2, strike) - self.black_variance_t(t1, strike)).max(0.0)
    }
}

/// Flat Black volatility.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlackConstantVol {
    reference_date: NaiveDate,
    vol: f64,
    day_count: DayCountConvention,
}

impl BlackConstantVol {
    pub fn new(
        reference_date: NaiveDate,
        vol: f64,
        day_count: DayCountConvention,
    ) -> Result<Self, PricingError> {
        if !vol.is_finite() || vol <= 0.0 {
            return Err(PricingError::InvalidInput(
                "constant volatility must be > 0".to_string(),
            ));
        }
        Ok(Self {
            reference_date,
            vol,
            day_count,
        })
    }

    pub fn vol(&self) -> f64 {
        self.vol
    }
}

impl BlackVolTermStructure for BlackConstantVol {
    fn reference_date(&self) -> NaiveDate {
        self.reference_date
    }

    fn day_count(&self) -> DayCountConvention {
        self.day_count
    }

    fn black_variance_t(&self, t: f64, _strike: f64) -> f64 {
        self.vol * self.vol * t.max(0.0)
    }
}

/// Market vol grid interpolated in total variance.
#[derive(Debug, Clone, PartialEq)]
pub struct BlackVarianceSurface {
    reference_date: NaiveDate,
    day_count: DayCountConvention,
    dates: Vec<NaiveDate>,
    /// Expiry times with a leading zero column.
    times: Vec<f64>,
    strikes: Vec<f64>,
    /// `variances[i][j]` for strike `i`, time `j` (column 0 is zero variance).
    variances: Vec<Vec<f64>>,
}

impl BlackVarianceSurface {
    /// Builds a surface from `vols[i][j]` quoted for `strikes[i]` and `dates[j]`.
    pub fn new(
        reference_date: NaiveDate,
        dates: Vec<NaiveDate>,
        strikes: Vec<f64>,
        vols: Vec<Vec<f64>>,
        day_count: DayCountConvention,
    ) -> Result<Self, PricingError> {
        if dates.is_empty() || strikes.is_empty() {
            return Err(PricingError::MarketDataMissing(
                "vol surface requires at least one date and one strike".to_string(),
            ));
        }
        if vols.len() != strikes.len() || vols.iter().any(|row| row.len() != dates.len()) {
            return Err(PricingError::InvalidInput(format!(
                "vol matrix must be {} strikes x {} dates",
                strikes.len(),
                dates.len()
            )));
        }
        if strikes.windows(2).any(|w| w[1] <= w[0]) || strikes.iter().any(|k| *k <= 0.0) {
            return Err(PricingError::InvalidInput(
                "surface strikes must be positive and strictly increasing".to_string(),
            ));
        }
        if dates.windows(2).any(|w| w[1] <= w[0]) || dates[0] <= reference_date {
            return Err(PricingError::InvalidInput(
                "surface dates must be strictly increasing and after the reference date"
                    .to_string(),
            ));
        }

        let mut times = Vec::with_capacity(dates.len() + 1);
        times.push(0.0);
        times.extend(dates.iter().map(|d| year_fraction(reference_date, *d, day_count)));

        let mut variances = Vec::with_capacity(strikes.len());
        for (i, row) in vols.iter().enumerate() {
            let mut var_row = Vec::with_capacity(times.len());
            var_row.push(0.0);
            for (j, vol) in row.iter().enumerate() {
                if !vol.is_finite() || *vol <= 0.0 {
                    return Err(PricingError::InvalidInput(format!(
                        "surface vol at strike {} date {} must be > 0",
                        strikes[i], dates[j]
                    )));
                }
                var_row.push(vol * vol * times[j + 1]);
            }
            variances.push(var_row);
        }

        Ok(Self {
            reference_date,
            day_count,
            dates,
            times,
            strikes,
            variances,
        })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn strikes(&self) -> &[f64] {
        &self.strikes
    }

    fn variance_on_grid(&self, t: f64, strike: f64) -> f64 {
        let k = strike.clamp(self.strikes[0], self.strikes[self.strikes.len() - 1]);
        let (i0, i1, wk) = bracket(&self.strikes, k);
        let (j0, j1, wt) = bracket(&self.times, t);

        let v00 = self.variances[i0][j0];
        let v01 = self.variances[i0][j1];
        let v10 = self.variances[i1][j0];
        let v11 = self.variances[i1][j1];
        let low = v00 + (v01 - v00) * wt;
        let high = v10 + (v11 - v10) * wt;
        low + (high - low) * wk
    }
}

impl BlackVolTermStructure for BlackVarianceSurface {
    fn reference_date(&self) -> NaiveDate {
        self.reference_date
    }

    fn day_count(&self) -> DayCountConvention {
        self.day_count
    }

    fn black_variance_t(&self, t: f64, strike: f64) -> f64 {
        if t <= 0.0 {
            return 0.0;
        }
        let t_max = self.times[self.times.len() - 1];
        if t <= t_max {
            self.variance_on_grid(t, strike)
        } else {
            self.variance_on_grid(t_max, strike) * t / t_max
        }
    }
}

/// Returns `(lo, hi, weight)` with `x = axis[lo] + weight * (axis[hi] - axis[lo])`.
fn bracket(axis: &[f64], x: f64) -> (usize, usize, f64) {
    let n = axis.len();
    if n == 1 || x <= axis[0] {
        return (0, 0, 0.0);
    }
    if x >= axis[n - 1] {
        return (n - 1, n - 1, 0.0);
    }
    let hi = axis.partition_point(|v| *v <= x).min(n - 1);
    let lo = hi - 1;
    (lo, hi, (x - axis[lo]) / (axis[hi] - axis[lo]))
}
