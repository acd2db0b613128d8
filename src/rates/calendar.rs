//! Module `rates::calendar`.
//!
//! Implements calendar workflows with concrete routines such as `adjust_business_day`
//! and `add_business_days`.
//!
//! Key types and purpose: `Calendar`, `BusinessDayConvention` define how payment and
//! option-expiry dates roll off weekends and TARGET holidays.
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Business-day adjustment rule.
///
/// Let `d` be an unadjusted date:
///
/// - `Following`: first business day `>= d`
/// - `ModifiedFollowing`: following unless month changes, then preceding
/// - `Preceding`: last business day `<= d`
/// - `Unadjusted`: leave `d` unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusinessDayConvention {
    Following,
    ModifiedFollowing,
    Preceding,
    Unadjusted,
}

/// Holiday calendars used for payment and expiry rolling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Calendar {
    /// Saturday/Sunday weekends only.
    WeekendsOnly,
    /// Trans-European Automated Real-time Gross settlement Express Transfer calendar.
    #[default]
    Target,
}

impl Calendar {
    /// Returns true if `date` is a business day.
    pub fn is_business_day(&self, date: NaiveDate) -> bool {
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        match self {
            Self::WeekendsOnly => true,
            Self::Target => !is_target_holiday(date),
        }
    }

    /// Returns true if `date` is not a business day.
    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        !self.is_business_day(date)
    }
}

/// Rolls `date` onto a business day according to `convention`.
///
/// # Examples
/// ```rust
/// use chrono::NaiveDate;
/// use autocall_mc::rates::{BusinessDayConvention, Calendar, adjust_business_day};
///
/// // Good Friday 2018 is a TARGET holiday.
/// let good_friday = NaiveDate::from_ymd_opt(2018, 3, 30).unwrap();
/// let adjusted = adjust_business_day(good_friday, BusinessDayConvention::Following, &Calendar::Target);
/// assert_eq!(adjusted, NaiveDate::from_ymd_opt(2018, 4, 3).unwrap());
/// ```
pub fn adjust_business_day(
    date: NaiveDate,
    convention: BusinessDayConvention,
    calendar: &Calendar,
) -> NaiveDate {
    match convention {
        BusinessDayConvention::Unadjusted => date,
        BusinessDayConvention::Following => next_business_day(date, calendar),
        BusinessDayConvention::Preceding => previous_business_day(date, calendar),
        BusinessDayConvention::ModifiedFollowing => {
            let following = next_business_day(date, calendar);
            if following.month() != date.month() {
                previous_business_day(date, calendar)
            } else {
                following
            }
        }
    }
}

/// Adds business days to a date.
///
/// Negative `days` moves backward.
pub fn add_business_days(date: NaiveDate, days: i32, calendar: &Calendar) -> NaiveDate {
    if days == 0 {
        return date;
    }

    let step = if days > 0 { 1_i64 } else { -1_i64 };
    let mut left = days.abs();
    let mut current = date;

    while left > 0 {
        current += Duration::days(step);
        if calendar.is_business_day(current) {
            left -= 1;
        }
    }

    current
}

/// Advances `date` by whole weeks and rolls the result with `convention`.
pub fn advance_weeks(
    date: NaiveDate,
    weeks: i64,
    convention: BusinessDayConvention,
    calendar: &Calendar,
) -> NaiveDate {
    adjust_business_day(date + Duration::weeks(weeks), convention, calendar)
}

fn next_business_day(date: NaiveDate, calendar: &Calendar) -> NaiveDate {
    let mut d = date;
    while !calendar.is_business_day(d) {
        d += Duration::days(1);
    }
    d
}

fn previous_business_day(date: NaiveDate, calendar: &Calendar) -> NaiveDate {
    let mut d = date;
    while !calendar.is_business_day(d) {
        d -= Duration::days(1);
    }
    d
}

fn is_target_holiday(date: NaiveDate) -> bool {
    if matches!(
        (date.month(), date.day()),
        (1, 1) | (5, 1) | (12, 25) | (12, 26)
    ) {
        return true;
    }
    // Good Friday and Easter Monday, as day-of-year offsets from Easter Sunday.
    let easter = easter_sunday_ordinal(date.year());
    let ordinal = date.ordinal() as i32;
    ordinal == easter - 2 || ordinal == easter + 1
}

/// Day-of-year of Easter Sunday in the Gregorian calendar (Meeus/Jones/Butcher).
fn easter_sunday_ordinal(year: i32) -> i32 {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = ((h + l - 7 * m + 114) % 31) + 1;

    // Easter falls in March or April.
    let leap = i32::from((year % 4 == 0 && year % 100 != 0) || year % 400 == 0);
    let days_before_month = if month == 3 { 59 + leap } else { 90 + leap };
    days_before_month + day
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn target_recognises_easter_and_fixed_holidays() {
        let target = Calendar::Target;
        // Easter 2017 was 16 April.
        assert!(target.is_holiday(d(2017, 4, 14)));
        assert!(target.is_holiday(d(2017, 4, 17)));
        // Easter 2024 was 31 March.
        assert!(target.is_holiday(d(2024, 3, 29)));
        assert!(target.is_holiday(d(2024, 4, 1)));
        assert!(target.is_holiday(d(2019, 5, 1)));
        assert!(target.is_holiday(d(2020, 12, 25)));
        assert!(target.is_holiday(d(2020, 12, 26)));
        assert!(target.is_business_day(d(2021, 3, 3)));
        assert!(Calendar::WeekendsOnly.is_business_day(d(2017, 4, 14)));
    }

    #[test]
    fn business_day_adjustments_cover_conventions() {
        let calendar = Calendar::WeekendsOnly;
        let saturday = d(2026, 1, 31);

        assert_eq!(
            adjust_business_day(saturday, BusinessDayConvention::Following, &calendar),
            d(2026, 2, 2)
        );
        assert_eq!(
            adjust_business_day(saturday, BusinessDayConvention::ModifiedFollowing, &calendar),
            d(2026, 1, 30)
        );
        assert_eq!(
            adjust_business_day(saturday, BusinessDayConvention::Preceding, &calendar),
            d(2026, 1, 30)
        );
        assert_eq!(
            adjust_business_day(saturday, BusinessDayConvention::Unadjusted, &calendar),
            saturday
        );
    }

    #[test]
    fn add_business_days_skips_holidays() {
        // Thursday before Easter 2018, two TARGET business days later is the Tuesday.
        assert_eq!(add_business_days(d(2018, 3, 29), 2, &Calendar::Target), d(2018, 4, 4));
        assert_eq!(add_business_days(d(2018, 4, 4), -2, &Calendar::Target), d(2018, 3, 29));
    }

    #[test]
    fn advance_weeks_rolls_on_holiday() {
        // 2017-03-31 + 2 weeks = Good Friday 2017.
        assert_eq!(
            advance_weeks(d(2017, 3, 31), 2, BusinessDayConvention::Following, &Calendar::Target),
            d(2017, 4, 18)
        );
    }
}
