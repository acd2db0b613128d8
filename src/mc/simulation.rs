//! Module `mc::simulation`.
//!
//! Drives a Monte Carlo pricing run of an autocallable note: values the redemption
//! schedule, builds the selected diffusion (calibrating Heston first when asked),
//! generates trajectories on a uniform grid and folds each discounted payoff into
//! running statistics.
//!
//! Key types and purpose: `AutocallableSimulation` owns the valued note and market for
//! one run; `SimulationReport` is the serializable outcome including the comparison
//! with a quoted reference price.
//!
//! Numerical considerations: the sequential run consumes a single stream seeded with
//! the run seed, so identical inputs reproduce bit-identical prices. Block runs draw
//! block `i` from `stream_seed(seed, i)` and merge block statistics in block order,
//! which makes them independent of the worker count.
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::calibration::{
    CalibrationResult, CalibrationWarningFlag, HestonCalibrator, build_helpers,
};
use crate::config::{CalibrationConfig, ModelSelector, PricingConfig, RunConfig};
use crate::core::{DiagKey, Diagnostics, PricingError, PricingResult};
use crate::instruments::AutocallableNote;
use crate::market::Market;
use crate::math::stream_seed;
use crate::mc::{PathGenerator, RunningStatistics, TimeGrid};
use crate::models::{
    BlackScholesProcess, Diffusion, HestonParams, HestonProcess, StepCoefficients,
    StochasticProcess,
};
use crate::pricing::{AutocallablePathPricer, EventValuation, simulation_horizon, value_schedule};

/// Samples per independently seeded block in block runs.
pub const SAMPLES_PER_BLOCK: usize = 4_096;

/// Outcome of [`AutocallableSimulation::compute`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub model: String,
    pub price: f64,
    pub error_estimate: f64,
    pub n_samples: usize,
    pub n_time_steps: usize,
    pub seed: u64,
    pub reference_price: Option<f64>,
    /// `|1 - price / reference_price|`.
    pub relative_error: Option<f64>,
    pub heston_params: Option<HestonParams>,
    pub calibration_rmse: Option<f64>,
    #[serde(default)]
    pub calibration_warnings: Vec<CalibrationWarningFlag>,
    pub upfront_coupon_pv: f64,
    pub valuation: Vec<EventValuation>,
    pub diagnostics: Diagnostics,
}

/// Diffusion ready to simulate, with the fit that produced it.
#[derive(Debug, Clone)]
pub struct CalibratedDiffusion {
    pub diffusion: Diffusion,
    pub calibration: Option<CalibrationResult<HestonParams>>,
}

/// One pricing run of an autocallable note against a market snapshot.
#[derive(Debug, Clone)]
pub struct AutocallableSimulation {
    market: Market,
    note: AutocallableNote,
    valuation: Vec<EventValuation>,
    maturity: f64,
    reference_price: Option<f64>,
    calibration: CalibrationConfig,
}

impl AutocallableSimulation {
    /// Values the schedule off the market curves.
    ///
    /// `maturity` is the simulated horizon in years; when `None` it runs to the last
    /// payment date.
    pub fn new(
        market: Market,
        mut note: AutocallableNote,
        maturity: Option<f64>,
    ) -> Result<Self, PricingError> {
        if note.settlement_date != market.settlement_date {
            return Err(PricingError::InvalidInput(format!(
                "note settles {} but market is dated {}",
                note.settlement_date, market.settlement_date
            )));
        }
        let maturity = maturity.unwrap_or_else(|| simulation_horizon(&note));
        if !maturity.is_finite() || maturity <= 0.0 {
            return Err(PricingError::InvalidInput(
                "simulation maturity must be > 0".to_string(),
            ));
        }
        let valuation = value_schedule(
            &mut note.schedule,
            market.settlement_date,
            market.risk_free.as_ref(),
            market.risky.as_ref(),
            market.calendar,
        )?;

        Ok(Self {
            market,
            note,
            valuation,
            maturity,
            reference_price: None,
            calibration: CalibrationConfig::default(),
        })
    }

    pub fn from_config(config: &PricingConfig) -> Result<Self, PricingError> {
        config.validate()?;
        let market = config.market.build()?;
        let note = config.product.build_note(market.settlement_date)?;
        let mut simulation = Self::new(market, note, config.product.maturity)?
            .with_calibration(config.calibration.clone());
        if let Some(reference) = config.product.reference_price {
            simulation = simulation.with_reference_price(reference);
        }
        Ok(simulation)
    }

    pub fn with_reference_price(mut self, reference_price: f64) -> Self {
        self.reference_price = Some(reference_price);
        self
    }

    pub fn with_calibration(mut self, calibration: CalibrationConfig) -> Self {
        self.calibration = calibration;
        self
    }

    #[inline]
    pub fn market(&self) -> &Market {
        &self.market
    }

    /// Note with its schedule valued.
    #[inline]
    pub fn note(&self) -> &AutocallableNote {
        &self.note
    }

    #[inline]
    pub fn valuation(&self) -> &[EventValuation] {
        &self.valuation
    }

    #[inline]
    pub fn maturity(&self) -> f64 {
        self.maturity
    }

    /// Fits Heston to the market surface on the configured strike x tenor grid.
    pub fn calibrate_heston(&self) -> Result<CalibrationResult<HestonParams>, PricingError> {
        let cfg = &self.calibration;
        let helpers = build_helpers(
            self.market.settlement_date,
            cfg.reference_spot,
            &cfg.strikes,
            &cfg.tenors,
            self.market.volatility.as_ref(),
            self.market.risk_free.as_ref(),
            self.market.dividend.as_ref(),
            self.market.calendar,
        )?;
        HestonCalibrator::new(cfg.reference_spot, cfg.lm)?.calibrate(cfg.initial_guess, &helpers)
    }

    /// Builds the diffusion for `model`; construction failures abort the run.
    pub fn build_diffusion(&self, model: ModelSelector) -> Result<CalibratedDiffusion, PricingError> {
        let market = &self.market;
        match model {
            ModelSelector::Lognormal => Ok(CalibratedDiffusion {
                diffusion: Diffusion::Lognormal(BlackScholesProcess::new(
                    market.spot,
                    market.risk_free.clone(),
                    market.dividend.clone(),
                    market.volatility.clone(),
                    self.note.strike,
                )?),
                calibration: None,
            }),
            ModelSelector::StochasticVolatility => {
                let calibration = self.calibrate_heston()?;
                let process = HestonProcess::new(
                    market.spot,
                    market.risk_free.clone(),
                    market.dividend.clone(),
                    calibration.params,
                )?;
                Ok(CalibratedDiffusion {
                    diffusion: Diffusion::StochasticVolatility(process),
                    calibration: Some(calibration),
                })
            }
        }
    }

    /// Prices the note under an already built diffusion.
    pub fn run(&self, diffusion: &Diffusion, run: &RunConfig) -> Result<PricingResult, PricingError> {
        if run.n_samples == 0 {
            return Err(PricingError::InvalidInput(
                "n_samples must be > 0".to_string(),
            ));
        }
        let grid = TimeGrid::new(self.maturity, run.n_time_steps)?;
        let pricer = AutocallablePathPricer::new(&self.note, self.market.risk_free.as_ref(), &grid)?;
        let steps = diffusion.discretize(&grid);

        info!(
            model = diffusion.name(),
            samples = run.n_samples,
            steps = run.n_time_steps,
            seed = run.seed,
            "starting monte carlo run"
        );

        let (stats, threads) = if run.parallel {
            self.run_blocks(diffusion, &pricer, &steps, run)
        } else {
            let mut generator =
                PathGenerator::with_steps(diffusion, steps, run.rng, run.seed);
            let mut stats = RunningStatistics::new();
            for _ in 0..run.n_samples {
                stats.add(pricer.evaluate(generator.next_path()));
            }
            (stats, 1)
        };

        let price = stats.mean();
        let stderr = stats.error_estimate();
        if !price.is_finite() || !stderr.is_finite() {
            return Err(PricingError::NumericalError(format!(
                "monte carlo estimate is not finite: price {price}, error {stderr}"
            )));
        }

        let mut diagnostics = Diagnostics::new();
        diagnostics.insert_key(DiagKey::NumPaths, stats.samples() as f64);
        diagnostics.insert_key(DiagKey::NumTimeSteps, run.n_time_steps as f64);
        diagnostics.insert_key(DiagKey::NumThreads, threads as f64);
        diagnostics.insert_key(
            DiagKey::ObservationCount,
            self.note
                .schedule
                .events()
                .iter()
                .map(|e| e.evaluation_dates.len())
                .sum::<usize>() as f64,
        );
        diagnostics.insert_key(DiagKey::UpfrontCouponPv, pricer.upfront_pv());
        diagnostics.insert_key(DiagKey::VarianceEstimate, stats.variance());

        info!(price, stderr, samples = stats.samples(), "monte carlo run finished");
        Ok(PricingResult {
            price,
            stderr: Some(stderr),
            diagnostics,
        })
    }

    fn run_blocks(
        &self,
        diffusion: &Diffusion,
        pricer: &AutocallablePathPricer,
        steps: &[StepCoefficients],
        run: &RunConfig,
    ) -> (RunningStatistics, usize) {
        let n_blocks = run.n_samples.div_ceil(SAMPLES_PER_BLOCK);
        let block = |i: usize| {
            let start = i * SAMPLES_PER_BLOCK;
            let len = SAMPLES_PER_BLOCK.min(run.n_samples - start);
            let mut generator = PathGenerator::with_steps(
                diffusion,
                steps.to_vec(),
                run.rng,
                stream_seed(run.seed, i),
            );
            let mut stats = RunningStatistics::new();
            for _ in 0..len {
                stats.add(pricer.evaluate(generator.next_path()));
            }
            stats
        };

        #[cfg(feature = "parallel")]
        let (blocks, threads): (Vec<RunningStatistics>, usize) = (
            (0..n_blocks).into_par_iter().map(block).collect(),
            rayon::current_num_threads(),
        );
        #[cfg(not(feature = "parallel"))]
        let (blocks, threads): (Vec<RunningStatistics>, usize) = {
            tracing::warn!(
                "parallel run requested without the `parallel` feature; running blocks on one thread"
            );
            ((0..n_blocks).map(block).collect(), 1)
        };

        let stats = blocks
            .iter()
            .fold(RunningStatistics::new(), |acc, b| acc.merge(b));
        (stats, threads)
    }

    /// Builds the diffusion for `run.model`, prices, and compares to the reference quote.
    pub fn compute(&self, run: &RunConfig) -> Result<SimulationReport, PricingError> {
        run.validate()?;
        let CalibratedDiffusion {
            diffusion,
            calibration,
        } = self.build_diffusion(run.model)?;
        let result = self.run(&diffusion, run)?;

        let error_estimate = result.stderr.unwrap_or(0.0);
        let relative_error = self
            .reference_price
            .filter(|r| *r != 0.0)
            .map(|r| (1.0 - result.price / r).abs());
        if let Some(relative_error) = relative_error {
            info!(
                reference = self.reference_price,
                relative_error, "compared with reference price"
            );
        }

        Ok(SimulationReport {
            model: diffusion.name().to_string(),
            price: result.price,
            error_estimate,
            n_samples: run.n_samples,
            n_time_steps: run.n_time_steps,
            seed: run.seed,
            reference_price: self.reference_price,
            relative_error,
            heston_params: calibration.as_ref().map(|c| c.params),
            calibration_rmse: calibration.as_ref().map(|c| c.diagnostics.fit_quality.rmse),
            calibration_warnings: calibration
                .map(|c| c.diagnostics.warning_flags)
                .unwrap_or_default(),
            upfront_coupon_pv: result
                .diagnostics
                .get_key(DiagKey::UpfrontCouponPv)
                .copied()
                .unwrap_or(0.0),
            valuation: self.valuation.clone(),
            diagnostics: result.diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruments::{
        CapitalBarrier, RedemptionEvent, RedemptionSchedule, UpfrontCoupon,
    };
    use crate::rates::{DayCountConvention, FlatForward, YieldTermStructure};
    use crate::vol::BlackConstantVol;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn market(vol: f64) -> Market {
        let settlement = d(2017, 3, 31);
        let flat = |r: f64| -> Arc<dyn YieldTermStructure> {
            Arc::new(FlatForward::new(settlement, r, DayCountConvention::Act365Fixed))
        };
        Market::builder()
            .settlement_date(settlement)
            .spot(15.35)
            .risk_free_curve(flat(0.002))
            .risky_curve(flat(0.012))
            .dividend_curve(flat(0.03))
            .volatility(Arc::new(
                BlackConstantVol::new(settlement, vol, DayCountConvention::Act365Fixed).unwrap(),
            ))
            .build()
            .unwrap()
    }

    fn note() -> AutocallableNote {
        let window = |y: i32| (23..=27).map(|day| d(y, 2, day)).collect::<Vec<_>>();
        let events = vec![
            RedemptionEvent::new(1000.0, 0.0, window(2018), 15.08, d(2018, 3, 5)),
            RedemptionEvent::new(1000.0, 58.0, window(2019), 15.08, d(2019, 3, 4)),
            RedemptionEvent::new(1000.0, 116.0, window(2020), 15.08, d(2020, 3, 4)),
        ];
        AutocallableNote::new(
            d(2017, 3, 31),
            RedemptionSchedule::new(events).unwrap(),
            15.08,
            CapitalBarrier {
                level: 9.0504,
                observation_date: d(2020, 3, 2),
            },
            UpfrontCoupon {
                amount: 58.0,
                payment_date: d(2018, 3, 5),
            },
        )
        .unwrap()
    }

    #[test]
    fn new_values_schedule_before_simulation() {
        let sim = AutocallableSimulation::new(market(0.25), note(), None).unwrap();
        assert!(sim.note().schedule.is_valued());
        assert_eq!(sim.valuation().len(), 3);
        assert_relative_eq!(
            sim.note().schedule.events()[1].value,
            sim.valuation()[1].value,
            epsilon = 1e-12
        );
        assert!(sim.maturity() > 2.9 && sim.maturity() < 3.0);
    }

    #[test]
    fn zero_samples_are_rejected_before_simulation() {
        let sim = AutocallableSimulation::new(market(0.25), note(), None).unwrap();
        let diffusion = sim.build_diffusion(ModelSelector::Lognormal).unwrap().diffusion;
        let run = RunConfig::new(50, 0, ModelSelector::Lognormal);
        assert!(matches!(
            sim.run(&diffusion, &run),
            Err(PricingError::InvalidInput(_))
        ));
    }

    #[test]
    fn price_lies_between_worst_and_best_redemption() {
        let sim = AutocallableSimulation::new(market(0.25), note(), None).unwrap();
        let report = sim
            .compute(&RunConfig::new(36, 4_000, ModelSelector::Lognormal))
            .unwrap();
        let upfront = report.upfront_coupon_pv;
        let best = sim
            .valuation()
            .iter()
            .map(|v| v.value)
            .fold(f64::MIN, f64::max);

        assert_eq!(report.model, "black_scholes");
        assert!(report.price > upfront);
        assert!(report.price < best + upfront);
        assert!(report.error_estimate > 0.0);
        assert_eq!(
            report.diagnostics.get_key(DiagKey::NumPaths).copied(),
            Some(4_000.0)
        );
        assert_eq!(
            report.diagnostics.get_key(DiagKey::ObservationCount).copied(),
            Some(15.0)
        );
        assert!(report.heston_params.is_none());
    }

    #[test]
    fn block_runs_are_reproducible_and_consistent() {
        let sim = AutocallableSimulation::new(market(0.25), note(), None).unwrap();
        let diffusion = sim.build_diffusion(ModelSelector::Lognormal).unwrap().diffusion;
        let mut run = RunConfig::new(36, 10_000, ModelSelector::Lognormal);
        let sequential = sim.run(&diffusion, &run).unwrap();
        run.parallel = true;
        let a = sim.run(&diffusion, &run).unwrap();
        let b = sim.run(&diffusion, &run).unwrap();

        assert_eq!(a.price, b.price);
        assert_eq!(a.stderr, b.stderr);
        assert_eq!(a.diagnostics.get_key(DiagKey::NumPaths).copied(), Some(10_000.0));
        let tolerance = 4.0 * (a.stderr.unwrap() + sequential.stderr.unwrap());
        assert!((a.price - sequential.price).abs() < tolerance);
    }

    #[test]
    fn mismatched_settlement_is_rejected() {
        let mut n = note();
        n.settlement_date = d(2017, 4, 3);
        assert!(AutocallableSimulation::new(market(0.25), n, None).is_err());
    }

    #[test]
    fn relative_error_uses_reference_quote() {
        let sim = AutocallableSimulation::new(market(0.25), note(), None)
            .unwrap()
            .with_reference_price(973.55);
        let report = sim
            .compute(&RunConfig::new(12, 500, ModelSelector::Lognormal))
            .unwrap();
        assert_relative_eq!(
            report.relative_error.unwrap(),
            (1.0 - report.price / 973.55).abs(),
            epsilon = 1e-15
        );
    }
}
