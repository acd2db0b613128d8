//! Module `pricing::valuation`.
//!
//! Path-independent present value of every redemption event: principal off the
//! issuer curve through a zero-coupon bond, coupon off the collateral curve. Runs once
//! per pricing run, before any trajectory is simulated.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::PricingError;
use crate::instruments::RedemptionSchedule;
use crate::rates::{Calendar, YieldTermStructure, ZeroCouponBond};

/// Settlement lag of the principal zero-coupon bond.
pub const BOND_SETTLEMENT_DAYS: u32 = 2;

/// Valuation breakdown of one redemption event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventValuation {
    pub payment_date: NaiveDate,
    pub principal_pv: f64,
    pub coupon_pv: f64,
    pub value: f64,
}

/// Values each event and writes `value` back into the schedule.
pub fn value_schedule(
    schedule: &mut RedemptionSchedule,
    settlement_date: NaiveDate,
    risk_free: &dyn YieldTermStructure,
    risky: &dyn YieldTermStructure,
    calendar: Calendar,
) -> Result<Vec<EventValuation>, PricingError> {
    let mut report = Vec::with_capacity(schedule.len());
    for event in schedule.events() {
        if event.payment_date <= settlement_date {
            return Err(PricingError::InvalidInput(format!(
                "redemption payment date {} must be after settlement {settlement_date}",
                event.payment_date
            )));
        }
        let bond = ZeroCouponBond::new(
            BOND_SETTLEMENT_DAYS,
            calendar,
            event.face_amount,
            event.payment_date,
        );
        let principal_pv = bond.npv(risky)?;
        let coupon_pv = event.coupon * risk_free.discount(event.payment_date);
        let value = principal_pv + coupon_pv;
        if !value.is_finite() {
            return Err(PricingError::NumericalError(format!(
                "non-finite value for redemption paid on {}",
                event.payment_date
            )));
        }
        debug!(
            payment_date = %event.payment_date,
            principal_pv,
            coupon_pv,
            value,
            "valued redemption event"
        );
        report.push(EventValuation {
            payment_date: event.payment_date,
            principal_pv,
            coupon_pv,
            value,
        });
    }

    let values: Vec<f64> = report.iter().map(|v| v.value).collect();
    schedule.set_values(&values)?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruments::RedemptionEvent;
    use crate::rates::{DayCountConvention, FlatForward};
    use approx::assert_relative_eq;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn schedule() -> RedemptionSchedule {
        RedemptionSchedule::new(vec![
            RedemptionEvent::new(1000.0, 0.0, vec![d(2018, 2, 21)], 15.08, d(2018, 3, 5)),
            RedemptionEvent::new(1000.0, 58.0, vec![d(2019, 2, 20)], 15.08, d(2019, 3, 4)),
            RedemptionEvent::new(1000.0, 116.0, vec![d(2020, 2, 20)], 15.08, d(2020, 3, 4)),
        ])
        .unwrap()
    }

    #[test]
    fn unit_discounting_returns_face_plus_coupon() {
        let settlement = d(2017, 3, 31);
        let flat = FlatForward::new(settlement, 0.0, DayCountConvention::Act365Fixed);
        let mut s = schedule();
        let report = value_schedule(&mut s, settlement, &flat, &flat, Calendar::Target).unwrap();

        assert!(s.is_valued());
        for (event, valuation) in s.events().iter().zip(&report) {
            assert_relative_eq!(event.value, event.face_amount + event.coupon, epsilon = 1e-12);
            assert_relative_eq!(valuation.value, event.value, epsilon = 1e-12);
        }
    }

    #[test]
    fn principal_uses_risky_curve_and_coupon_risk_free() {
        let settlement = d(2017, 3, 31);
        let risk_free = FlatForward::new(settlement, 0.01, DayCountConvention::Act365Fixed);
        let risky = FlatForward::new(settlement, 0.04, DayCountConvention::Act365Fixed);
        let mut s = schedule();
        let report =
            value_schedule(&mut s, settlement, &risk_free, &risky, Calendar::Target).unwrap();

        let second = report[1];
        assert_relative_eq!(second.coupon_pv, 58.0 * risk_free.discount(d(2019, 3, 4)), epsilon = 1e-10);
        assert_relative_eq!(second.principal_pv, 1000.0 * risky.discount(d(2019, 3, 4)), epsilon = 1e-10);
        assert!(report[0].principal_pv > report[2].principal_pv);
    }

    #[test]
    fn payment_on_or_before_settlement_is_rejected() {
        let settlement = d(2018, 3, 5);
        let flat = FlatForward::new(settlement, 0.0, DayCountConvention::Act365Fixed);
        let mut s = schedule();
        assert!(value_schedule(&mut s, settlement, &flat, &flat, Calendar::Target).is_err());
        assert!(!s.is_valued());
    }
}
