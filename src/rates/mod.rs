//! Fixed-income primitives: day counts, holiday calendars, discount curves, and
//! zero-coupon bond valuation.

pub mod bond;
pub mod calendar;
pub mod day_count;
pub mod yield_curve;

pub use bond::ZeroCouponBond;
pub use calendar::{
    BusinessDayConvention, Calendar, add_business_days, adjust_business_day, advance_weeks,
};
pub use day_count::{DayCountConvention, year_fraction};
pub use yield_curve::{FlatForward, InterpolatedDiscountCurve, YieldCurve, YieldTermStructure};
