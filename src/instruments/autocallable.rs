//! Contract terms of an averaging autocallable note.
//!
//! [`RedemptionSchedule`] holds the ordered [`RedemptionEvent`]s; each event is observed
//! over an arithmetic-average window and, once triggered, redeems face plus its
//! (memory) coupon on the payment date. The last event is the maturity fallback and is
//! the only one exposed to the [`CapitalBarrier`].
//! Validation enforces a non-empty schedule, strictly increasing payment dates after
//! settlement, and sorted observation windows, so path evaluation never has to recover
//! from malformed terms.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::PricingError;

/// One scheduled redemption opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedemptionEvent {
    pub face_amount: f64,
    /// Cash coupon paid alongside face if this event redeems.
    pub coupon: f64,
    /// Present value of face plus coupon; zero until the schedule is valued.
    #[serde(default)]
    pub value: f64,
    /// Averaging window deciding the trigger.
    pub evaluation_dates: Vec<NaiveDate>,
    pub exercise_level: f64,
    pub payment_date: NaiveDate,
}

impl RedemptionEvent {
    pub fn new(
        face_amount: f64,
        coupon: f64,
        evaluation_dates: Vec<NaiveDate>,
        exercise_level: f64,
        payment_date: NaiveDate,
    ) -> Self {
        Self {
            face_amount,
            coupon,
            value: 0.0,
            evaluation_dates,
            exercise_level,
            payment_date,
        }
    }

    pub fn validate(&self) -> Result<(), PricingError> {
        if !self.face_amount.is_finite() || self.face_amount <= 0.0 {
            return Err(PricingError::InvalidInput(
                "redemption face_amount must be > 0".to_string(),
            ));
        }
        if !self.coupon.is_finite() || self.coupon < 0.0 {
            return Err(PricingError::InvalidInput(
                "redemption coupon must be >= 0".to_string(),
            ));
        }
        if !self.exercise_level.is_finite() {
            return Err(PricingError::InvalidInput(
                "redemption exercise_level must be finite".to_string(),
            ));
        }
        if self.evaluation_dates.is_empty() {
            return Err(PricingError::InvalidInput(format!(
                "redemption paid on {} has no evaluation dates",
                self.payment_date
            )));
        }
        if self.evaluation_dates.windows(2).any(|w| w[1] <= w[0]) {
            return Err(PricingError::InvalidInput(format!(
                "evaluation dates of redemption paid on {} must be strictly increasing",
                self.payment_date
            )));
        }
        Ok(())
    }
}

/// Chronologically ordered redemption events; the last one is the maturity event.
#[derive(Debug, Clone, PartialEq)]
pub struct RedemptionSchedule {
    events: Vec<RedemptionEvent>,
    valued: bool,
}

impl RedemptionSchedule {
    pub fn new(events: Vec<RedemptionEvent>) -> Result<Self, PricingError> {
        if events.is_empty() {
            return Err(PricingError::InvalidInput(
                "redemption schedule cannot be empty".to_string(),
            ));
        }
        for event in &events {
            event.validate()?;
        }
        if events
            .windows(2)
            .any(|w| w[1].payment_date <= w[0].payment_date)
        {
            return Err(PricingError::InvalidInput(
                "redemption payment dates must be strictly increasing".to_string(),
            ));
        }
        Ok(Self {
            events,
            valued: false,
        })
    }

    #[inline]
    pub fn events(&self) -> &[RedemptionEvent] {
        &self.events
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[inline]
    pub fn maturity_index(&self) -> usize {
        self.events.len() - 1
    }

    pub fn maturity_event(&self) -> &RedemptionEvent {
        &self.events[self.maturity_index()]
    }

    pub fn first_payment_date(&self) -> NaiveDate {
        self.events[0].payment_date
    }

    pub fn maturity_date(&self) -> NaiveDate {
        self.maturity_event().payment_date
    }

    /// Whether event values have been populated.
    pub fn is_valued(&self) -> bool {
        self.valued
    }

    /// Writes present values into the events, in schedule order.
    pub(crate) fn set_values(&mut self, values: &[f64]) -> Result<(), PricingError> {
        if values.len() != self.events.len() {
            return Err(PricingError::InvalidInput(format!(
                "expected {} event values, got {}",
                self.events.len(),
                values.len()
            )));
        }
        for (event, &value) in self.events.iter_mut().zip(values) {
            event.value = value;
        }
        self.valued = true;
        Ok(())
    }
}

/// Capital-protection barrier observed once.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapitalBarrier {
    pub level: f64,
    pub observation_date: NaiveDate,
}

/// Fixed coupon paid regardless of the path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UpfrontCoupon {
    pub amount: f64,
    pub payment_date: NaiveDate,
}

/// Averaging autocallable note with a capital barrier at maturity.
#[derive(Debug, Clone, PartialEq)]
pub struct AutocallableNote {
    pub settlement_date: NaiveDate,
    pub schedule: RedemptionSchedule,
    /// Initial reference level for the capital-loss performance.
    pub strike: f64,
    pub barrier: CapitalBarrier,
    pub upfront_coupon: UpfrontCoupon,
}

impl AutocallableNote {
    pub fn new(
        settlement_date: NaiveDate,
        schedule: RedemptionSchedule,
        strike: f64,
        barrier: CapitalBarrier,
        upfront_coupon: UpfrontCoupon,
    ) -> Result<Self, PricingError> {
        let note = Self {
            settlement_date,
            schedule,
            strike,
            barrier,
            upfront_coupon,
        };
        note.validate()?;
        Ok(note)
    }

    pub fn validate(&self) -> Result<(), PricingError> {
        if !self.strike.is_finite() || self.strike <= 0.0 {
            return Err(PricingError::InvalidInput(
                "autocallable strike must be > 0".to_string(),
            ));
        }
        if !self.barrier.level.is_finite() || self.barrier.level <= 0.0 {
            return Err(PricingError::InvalidInput(
                "autocallable barrier level must be > 0".to_string(),
            ));
        }
        if !self.upfront_coupon.amount.is_finite() {
            return Err(PricingError::InvalidInput(
                "autocallable upfront coupon must be finite".to_string(),
            ));
        }
        if self.schedule.first_payment_date() <= self.settlement_date {
            return Err(PricingError::InvalidInput(format!(
                "redemption payment date {} must be after settlement {}",
                self.schedule.first_payment_date(),
                self.settlement_date
            )));
        }
        if self.upfront_coupon.payment_date < self.settlement_date {
            return Err(PricingError::InvalidInput(
                "upfront coupon cannot be paid before settlement".to_string(),
            ));
        }
        if self.barrier.observation_date <= self.settlement_date {
            return Err(PricingError::InvalidInput(
                "barrier observation date must be after settlement".to_string(),
            ));
        }
        Ok(())
    }

    pub fn maturity_date(&self) -> NaiveDate {
        self.schedule.maturity_date()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn event(coupon: f64, eval: NaiveDate, pay: NaiveDate) -> RedemptionEvent {
        RedemptionEvent::new(1000.0, coupon, vec![eval], 15.08, pay)
    }

    fn schedule() -> RedemptionSchedule {
        RedemptionSchedule::new(vec![
            event(0.0, d(2018, 2, 21), d(2018, 3, 5)),
            event(58.0, d(2019, 2, 20), d(2019, 3, 4)),
        ])
        .unwrap()
    }

    #[test]
    fn schedule_rejects_empty_and_unordered_events() {
        assert!(RedemptionSchedule::new(vec![]).is_err());
        let err = RedemptionSchedule::new(vec![
            event(58.0, d(2019, 2, 20), d(2019, 3, 4)),
            event(0.0, d(2018, 2, 21), d(2018, 3, 5)),
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn event_requires_sorted_window() {
        let bad = RedemptionEvent::new(
            1000.0,
            0.0,
            vec![d(2018, 2, 22), d(2018, 2, 21)],
            15.0,
            d(2018, 3, 5),
        );
        assert!(bad.validate().is_err());
        let empty = RedemptionEvent::new(1000.0, 0.0, vec![], 15.0, d(2018, 3, 5));
        assert!(empty.validate().is_err());
    }

    #[test]
    fn set_values_marks_schedule_valued() {
        let mut s = schedule();
        assert!(!s.is_valued());
        assert!(s.set_values(&[1.0]).is_err());
        s.set_values(&[990.0, 1010.0]).unwrap();
        assert!(s.is_valued());
        assert_eq!(s.maturity_event().value, 1010.0);
        assert_eq!(s.maturity_index(), 1);
    }

    #[test]
    fn note_validation_fails_fast() {
        let barrier = CapitalBarrier {
            level: 9.0504,
            observation_date: d(2019, 2, 20),
        };
        let upfront = UpfrontCoupon {
            amount: 58.0,
            payment_date: d(2018, 3, 5),
        };
        assert!(AutocallableNote::new(d(2017, 3, 31), schedule(), 15.08, barrier, upfront).is_ok());
        assert!(AutocallableNote::new(d(2017, 3, 31), schedule(), 0.0, barrier, upfront).is_err());
        assert!(AutocallableNote::new(d(2018, 6, 1), schedule(), 15.08, barrier, upfront).is_err());
    }
}
