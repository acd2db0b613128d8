//! Module `rates::day_count`.
//!
//! Implements day count workflows with concrete routines such as `year_fraction`.
//!
//! Key types and purpose: `DayCountConvention` defines the accrual conventions used by
//! curves, the simulation time grid, and calibration helper maturities.
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Supported day-count conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayCountConvention {
    /// Actual day count over a 360-day year.
    Act360,
    /// Actual day count over a 365-day year.
    Act365Fixed,
    /// ISDA actual/actual convention.
    ActActISDA,
}

/// Computes year fraction between two dates under a day-count convention.
///
/// Edge cases:
/// - If `start == end`, returns `0.0`.
/// - If `start > end`, the result is negative and antisymmetric.
///
/// # Examples
/// ```rust
/// use chrono::NaiveDate;
/// use autocall_mc::rates::{DayCountConvention, year_fraction};
///
/// let s = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
/// let e = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
/// assert_eq!(
///     year_fraction(s, e, DayCountConvention::Act365Fixed),
///     -year_fraction(e, s, DayCountConvention::Act365Fixed)
/// );
/// ```
pub fn year_fraction(start: NaiveDate, end: NaiveDate, convention: DayCountConvention) -> f64 {
    if start == end {
        return 0.0;
    }
    if start > end {
        return -year_fraction(end, start, convention);
    }

    match convention {
        DayCountConvention::Act360 => (end - start).num_days() as f64 / 360.0,
        DayCountConvention::Act365Fixed => (end - start).num_days() as f64 / 365.0,
        DayCountConvention::ActActISDA => year_fraction_act_act_isda(start, end),
    }
}

fn year_fraction_act_act_isda(start: NaiveDate, end: NaiveDate) -> f64 {
    if start.year() == end.year() {
        return (end - start).num_days() as f64 / days_in_year(start.year());
    }

    // Stub to the end of the start year, whole years between, stub into the end year.
    let head = (days_in_year(start.year()) - start.ordinal0() as f64) / days_in_year(start.year());
    let whole = (end.year() - start.year() - 1) as f64;
    let tail = end.ordinal0() as f64 / days_in_year(end.year());
    head + whole + tail
}

fn days_in_year(year: i32) -> f64 {
    if is_leap_year(year) { 366.0 } else { 365.0 }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}
