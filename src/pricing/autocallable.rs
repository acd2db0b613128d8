//! Module `pricing::autocallable`.
//!
//! Implements the per-trajectory payoff of an averaging autocallable note: scan the
//! redemption schedule for the first averaging window at or above its exercise level,
//! fall back to the maturity event, and apply the capital-loss adjustment when the
//! maturity redemption coincides with a barrier breach.
//!
//! Key types and purpose: `AutocallablePathPricer` caches grid indices and discounted
//! amounts once per run so each path evaluation is a handful of array reads;
//! `Trigger` and `PathOutcome` expose the decision for inspection and tests.
//!
//! Numerical considerations: observation dates map to the nearest simulation node by
//! Act/Act (ISDA) elapsed time, bounded to the grid; the capital adjustment is applied
//! as written even when performance exceeds strike, where it adds value.
use chrono::NaiveDate;

use crate::core::PricingError;
use crate::instruments::AutocallableNote;
use crate::mc::TimeGrid;
use crate::rates::{DayCountConvention, YieldTermStructure, year_fraction};

/// Convention mapping observation dates onto the simulation grid.
pub const PATH_DAY_COUNT: DayCountConvention = DayCountConvention::ActActISDA;

/// Redemption reached on a trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Event at this schedule index redeemed before maturity.
    Early(usize),
    /// Maturity event, either by its own trigger or by fallback.
    Maturity,
}

/// Payoff of one trajectory with the decisions that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathOutcome {
    pub payoff: f64,
    pub trigger: Trigger,
    pub barrier_breached: bool,
    /// Capital loss subtracted from the payoff (negative when it adds value).
    pub capital_adjustment: f64,
}

#[derive(Debug, Clone)]
struct ObservationWindow {
    nodes: Vec<usize>,
    exercise_level: f64,
    value: f64,
}

impl ObservationWindow {
    #[inline]
    fn average(&self, path: &[f64]) -> f64 {
        self.nodes.iter().map(|&i| path[i]).sum::<f64>() / self.nodes.len() as f64
    }
}

/// Discounted payoff evaluator for one autocallable note on a fixed grid.
#[derive(Debug, Clone)]
pub struct AutocallablePathPricer {
    windows: Vec<ObservationWindow>,
    upfront_pv: f64,
    maturity_coupon_pv: f64,
    barrier_node: usize,
    barrier_level: f64,
    strike: f64,
    path_len: usize,
}

impl AutocallablePathPricer {
    /// Requires a schedule already valued by [`crate::pricing::value_schedule`].
    pub fn new(
        note: &AutocallableNote,
        risk_free: &dyn YieldTermStructure,
        grid: &TimeGrid,
    ) -> Result<Self, PricingError> {
        note.validate()?;
        if !note.schedule.is_valued() {
            return Err(PricingError::InvalidInput(
                "redemption schedule must be valued before path evaluation".to_string(),
            ));
        }

        let settlement = note.settlement_date;
        let node = |date: NaiveDate| grid.closest_index(year_fraction(settlement, date, PATH_DAY_COUNT));

        let windows = note
            .schedule
            .events()
            .iter()
            .map(|event| ObservationWindow {
                nodes: event.evaluation_dates.iter().map(|&d| node(d)).collect(),
                exercise_level: event.exercise_level,
                value: event.value,
            })
            .collect();

        let maturity = note.schedule.maturity_event();
        Ok(Self {
            windows,
            upfront_pv: note.upfront_coupon.amount
                * risk_free.discount(note.upfront_coupon.payment_date),
            maturity_coupon_pv: maturity.coupon * risk_free.discount(maturity.payment_date),
            barrier_node: node(note.barrier.observation_date),
            barrier_level: note.barrier.level,
            strike: note.strike,
            path_len: grid.len(),
        })
    }

    /// Present value of the upfront coupon, common to every path.
    pub fn upfront_pv(&self) -> f64 {
        self.upfront_pv
    }

    /// Trajectory length expected by [`Self::evaluate`].
    pub fn path_len(&self) -> usize {
        self.path_len
    }

    /// First event whose window average reaches its exercise level, else maturity.
    pub fn trigger(&self, path: &[f64]) -> Trigger {
        let last = self.windows.len() - 1;
        for (i, window) in self.windows[..last].iter().enumerate() {
            if window.average(path) >= window.exercise_level {
                return Trigger::Early(i);
            }
        }
        Trigger::Maturity
    }

    pub fn evaluate_detailed(&self, path: &[f64]) -> PathOutcome {
        let trigger = self.trigger(path);
        let mut payoff = self.upfront_pv;

        match trigger {
            Trigger::Early(i) => {
                payoff += self.windows[i].value;
                PathOutcome {
                    payoff,
                    trigger,
                    barrier_breached: false,
                    capital_adjustment: 0.0,
                }
            }
            Trigger::Maturity => {
                let maturity = &self.windows[self.windows.len() - 1];
                payoff += maturity.value;

                let barrier_breached = path[self.barrier_node] < self.barrier_level;
                let mut capital_adjustment = 0.0;
                if barrier_breached {
                    payoff -= self.maturity_coupon_pv;
                    let face_npv = maturity.value - self.maturity_coupon_pv;
                    let performance = maturity.average(path);
                    capital_adjustment = face_npv * (1.0 - performance / self.strike);
                    payoff -= capital_adjustment;
                }
                PathOutcome {
                    payoff,
                    trigger,
                    barrier_breached,
                    capital_adjustment,
                }
            }
        }
    }

    /// Discounted payoff of one trajectory sampled on the pricer's grid.
    #[inline]
    pub fn evaluate(&self, path: &[f64]) -> f64 {
        self.evaluate_detailed(path).payoff
    }
}

/// Act/Act (ISDA) horizon from settlement to the last redemption payment.
pub fn simulation_horizon(note: &AutocallableNote) -> f64 {
    year_fraction(note.settlement_date, note.maturity_date(), PATH_DAY_COUNT)
}
