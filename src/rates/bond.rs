//! Module `rates::bond`.
//!
//! Implements the zero-coupon bond used to value each redemption's principal leg
//! off the issuer (risky) curve.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::PricingError;
use crate::rates::{
    BusinessDayConvention, Calendar, YieldTermStructure, add_business_days, adjust_business_day,
};

/// Bullet bond paying `face_amount` on the adjusted maturity date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZeroCouponBond {
    /// Settlement lag in business days.
    pub settlement_days: u32,
    pub calendar: Calendar,
    pub face_amount: f64,
    pub maturity_date: NaiveDate,
    pub payment_convention: BusinessDayConvention,
}

impl ZeroCouponBond {
    /// Creates a bond with `Following` payment adjustment.
    pub fn new(
        settlement_days: u32,
        calendar: Calendar,
        face_amount: f64,
        maturity_date: NaiveDate,
    ) -> Self {
        Self {
            settlement_days,
            calendar,
            face_amount,
            maturity_date,
            payment_convention: BusinessDayConvention::Following,
        }
    }

    /// Business-day adjusted redemption date.
    pub fn payment_date(&self) -> NaiveDate {
        adjust_business_day(self.maturity_date, self.payment_convention, &self.calendar)
    }

    /// Settlement date of a trade struck on `trade_date`.
    pub fn settlement_date(&self, trade_date: NaiveDate) -> NaiveDate {
        let lag = i32::try_from(self.settlement_days).unwrap_or(i32::MAX);
        add_business_days(trade_date, lag, &self.calendar)
    }

    /// Present value at the curve reference date.
    ///
    /// # Errors
    /// [`PricingError::InvalidInput`] for a non-finite face amount or a bond that pays
    /// on or before its settlement date off the curve reference date.
    pub fn npv(&self, curve: &dyn YieldTermStructure) -> Result<f64, PricingError> {
        if !self.face_amount.is_finite() {
            return Err(PricingError::InvalidInput(
                "bond face amount must be finite".to_string(),
            ));
        }
        let payment = self.payment_date();
        let settlement = self.settlement_date(curve.reference_date());
        if payment <= settlement {
            return Err(PricingError::InvalidInput(format!(
                "bond payment date {payment} must be after settlement {settlement}"
            )));
        }
        Ok(self.face_amount * curve.discount(payment))
    }
}
