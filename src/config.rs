//! JSON run configuration.
//!
//! A [`PricingConfig`] carries everything a pricing run needs: run controls, the
//! market snapshot, the contractual terms of the note and the Heston calibration grid.
//! Literal market data and contract terms live here rather than in the engine.

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calibration::LmOptions;
use crate::core::PricingError;
use crate::instruments::{
    AutocallableNote, CapitalBarrier, RedemptionEvent, RedemptionSchedule, UpfrontCoupon,
};
use crate::market::Market;
use crate::math::FastRngKind;
use crate::models::HestonParams;
use crate::rates::{
    Calendar, DayCountConvention, FlatForward, InterpolatedDiscountCurve, YieldTermStructure,
};
use crate::vol::{BlackConstantVol, BlackVarianceSurface, BlackVolTermStructure};

/// Day count of configured curves and vol surfaces.
pub const MARKET_DAY_COUNT: DayCountConvention = DayCountConvention::Act365Fixed;

/// Seed used when a run does not name one.
pub const DEFAULT_SEED: u64 = 1234;

/// Diffusion the simulation runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSelector {
    /// Black-Scholes-Merton driven by the configured vol term structure.
    #[default]
    Lognormal,
    /// Heston calibrated to the configured vol surface.
    StochasticVolatility,
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub n_time_steps: usize,
    pub n_samples: usize,
    #[serde(default)]
    pub model: ModelSelector,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub rng: FastRngKind,
    /// Distribute samples over worker threads (needs the `parallel` feature).
    #[serde(default)]
    pub parallel: bool,
}

impl RunConfig {
    pub fn new(n_time_steps: usize, n_samples: usize, model: ModelSelector) -> Self {
        Self {
            n_time_steps,
            n_samples,
            model,
            seed: DEFAULT_SEED,
            rng: FastRngKind::default(),
            parallel: false,
        }
    }

    pub fn validate(&self) -> Result<(), PricingError> {
        if self.n_time_steps == 0 {
            return Err(PricingError::Config(
                "run.n_time_steps must be > 0".to_string(),
            ));
        }
        if self.n_samples == 0 {
            return Err(PricingError::Config("run.n_samples must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Discount curve definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CurveConfig {
    /// Flat continuously compounded rate.
    Flat { rate: f64 },
    /// Continuously compounded zero rates at pillar dates.
    ZeroRates { nodes: Vec<(NaiveDate, f64)> },
}

impl CurveConfig {
    pub fn build(
        &self,
        reference_date: NaiveDate,
    ) -> Result<Arc<dyn YieldTermStructure>, PricingError> {
        match self {
            Self::Flat { rate } => {
                if !rate.is_finite() {
                    return Err(PricingError::Config("flat rate must be finite".to_string()));
                }
                Ok(Arc::new(FlatForward::new(
                    reference_date,
                    *rate,
                    MARKET_DAY_COUNT,
                )))
            }
            Self::ZeroRates { nodes } => Ok(Arc::new(InterpolatedDiscountCurve::from_zero_rates(
                reference_date,
                nodes,
                MARKET_DAY_COUNT,
            )?)),
        }
    }
}

/// Black volatility definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VolConfig {
    Constant {
        vol: f64,
    },
    /// `vols[i][j]` quoted for `strikes[i]` and `dates[j]`.
    Surface {
        dates: Vec<NaiveDate>,
        strikes: Vec<f64>,
        vols: Vec<Vec<f64>>,
    },
}

impl VolConfig {
    pub fn build(
        &self,
        reference_date: NaiveDate,
    ) -> Result<Arc<dyn BlackVolTermStructure>, PricingError> {
        match self {
            Self::Constant { vol } => Ok(Arc::new(BlackConstantVol::new(
                reference_date,
                *vol,
                MARKET_DAY_COUNT,
            )?)),
            Self::Surface {
                dates,
                strikes,
                vols,
            } => Ok(Arc::new(BlackVarianceSurface::new(
                reference_date,
                dates.clone(),
                strikes.clone(),
                vols.clone(),
                MARKET_DAY_COUNT,
            )?)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketConfig {
    pub settlement_date: NaiveDate,
    pub spot: f64,
    /// Collateral (OIS) curve.
    pub risk_free: CurveConfig,
    /// Issuer curve; the risk-free curve when absent.
    #[serde(default)]
    pub risky: Option<CurveConfig>,
    /// Dividend yield curve; zero when absent.
    #[serde(default)]
    pub dividend: Option<CurveConfig>,
    pub volatility: VolConfig,
    #[serde(default)]
    pub calendar: Calendar,
}

impl MarketConfig {
    pub fn build(&self) -> Result<Market, PricingError> {
        let settlement = self.settlement_date;
        let mut builder = Market::builder()
            .settlement_date(settlement)
            .spot(self.spot)
            .risk_free_curve(self.risk_free.build(settlement)?)
            .volatility(self.volatility.build(settlement)?)
            .calendar(self.calendar);
        if let Some(risky) = &self.risky {
            builder = builder.risky_curve(risky.build(settlement)?);
        }
        if let Some(dividend) = &self.dividend {
            builder = builder.dividend_curve(dividend.build(settlement)?);
        }
        builder.build()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductConfig {
    pub events: Vec<RedemptionEvent>,
    /// Initial reference level.
    pub strike: f64,
    pub barrier: CapitalBarrier,
    pub upfront_coupon: UpfrontCoupon,
    /// Simulation horizon in years; Act/Act to the last payment date when absent.
    #[serde(default)]
    pub maturity: Option<f64>,
    /// Quoted price the model is compared against.
    #[serde(default)]
    pub reference_price: Option<f64>,
}

impl ProductConfig {
    pub fn build_note(&self, settlement_date: NaiveDate) -> Result<AutocallableNote, PricingError> {
        if let Some(maturity) = self.maturity
            && (!maturity.is_finite() || maturity <= 0.0)
        {
            return Err(PricingError::Config(
                "product.maturity must be > 0".to_string(),
            ));
        }
        let schedule = RedemptionSchedule::new(self.events.clone())?;
        AutocallableNote::new(
            settlement_date,
            schedule,
            self.strike,
            self.barrier,
            self.upfront_coupon,
        )
    }
}

const fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    match NaiveDate::from_ymd_opt(year, month, day) {
        Some(date) => date,
        None => panic!("invalid calendar date in calibration tenor table"),
    }
}

/// Tenor dates of the listed option surface, settlement row first. Checked at
/// compile time.
const CALIBRATION_TENORS: [NaiveDate; 30] = [
    ymd(2017, 3, 31),
    ymd(2017, 4, 6),
    ymd(2017, 4, 7),
    ymd(2017, 4, 13),
    ymd(2017, 4, 20),
    ymd(2017, 4, 21),
    ymd(2017, 4, 27),
    ymd(2017, 5, 18),
    ymd(2017, 5, 19),
    ymd(2017, 6, 15),
    ymd(2017, 6, 16),
    ymd(2017, 6, 29),
    ymd(2017, 9, 14),
    ymd(2017, 9, 15),
    ymd(2017, 12, 14),
    ymd(2017, 12, 15),
    ymd(2018, 3, 15),
    ymd(2018, 3, 16),
    ymd(2018, 6, 14),
    ymd(2018, 6, 15),
    ymd(2018, 12, 20),
    ymd(2018, 12, 21),
    ymd(2019, 6, 20),
    ymd(2019, 6, 21),
    ymd(2019, 12, 19),
    ymd(2019, 12, 20),
    ymd(2020, 12, 17),
    ymd(2021, 12, 16),
    ymd(2021, 12, 31),
    ymd(2022, 12, 30),
];

pub fn default_calibration_tenors() -> Vec<NaiveDate> {
    CALIBRATION_TENORS.to_vec()
}

pub fn default_calibration_strikes() -> Vec<f64> {
    vec![
        14.00, 14.25, 14.50, 14.75, 15.00, 15.25, 15.50, 15.75, 16.00, 16.25, 16.50, 16.75,
        17.00, 17.25, 17.50, 17.75, 18.00, 18.50, 19.00, 20.00,
    ]
}

/// Fixed starting point of the Heston fit.
pub fn default_initial_guess() -> HestonParams {
    const EPSILON: f64 = 0.718_598_576_122_673;
    HestonParams::new(
        0.0292,
        1.13,
        0.191 * EPSILON * EPSILON,
        0.743_552_54 * EPSILON,
        -0.584_861_21,
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub strikes: Vec<f64>,
    /// Surface dates; tenors on or before settlement are ignored.
    pub tenors: Vec<NaiveDate>,
    /// Spot the helpers are priced off.
    pub reference_spot: f64,
    pub initial_guess: HestonParams,
    pub lm: LmOptions,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            strikes: default_calibration_strikes(),
            tenors: default_calibration_tenors(),
            reference_spot: 15.35,
            initial_guess: default_initial_guess(),
            lm: LmOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    pub run: RunConfig,
    pub market: MarketConfig,
    pub product: ProductConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
}

impl PricingConfig {
    pub fn from_json_str(json: &str) -> Result<Self, PricingError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PricingError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json_pretty(&self) -> Result<String, PricingError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), PricingError> {
        self.run.validate()?;
        if !self.market.spot.is_finite() || self.market.spot <= 0.0 {
            return Err(PricingError::Config("market.spot must be > 0".to_string()));
        }
        if self.product.events.is_empty() {
            return Err(PricingError::Config(
                "product.events cannot be empty".to_string(),
            ));
        }
        if self.run.model == ModelSelector::StochasticVolatility
            && (self.calibration.strikes.is_empty() || self.calibration.tenors.is_empty())
        {
            return Err(PricingError::Config(
                "stochastic volatility runs need a calibration grid".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    const MINIMAL: &str = r#"{
        "run": { "n_time_steps": 50, "n_samples": 1000 },
        "market": {
            "settlement_date": "2017-03-31",
            "spot": 15.35,
            "risk_free": { "type": "flat", "rate": 0.0 },
            "volatility": { "type": "constant", "vol": 0.25 }
        },
        "product": {
            "events": [{
                "face_amount": 1000.0,
                "coupon": 58.0,
                "evaluation_dates": ["2018-02-26", "2018-02-27"],
                "exercise_level": 15.08,
                "payment_date": "2018-03-05"
            }],
            "strike": 15.08,
            "barrier": { "level": 9.0504, "observation_date": "2018-03-01" },
            "upfront_coupon": { "amount": 58.0, "payment_date": "2018-03-05" }
        }
    }"#;

    #[test]
    fn minimal_config_fills_defaults() {
        let config = PricingConfig::from_json_str(MINIMAL).unwrap();
        assert_eq!(config.run.seed, DEFAULT_SEED);
        assert_eq!(config.run.model, ModelSelector::Lognormal);
        assert!(!config.run.parallel);
        assert_eq!(config.calibration.strikes.len(), 20);
        assert_eq!(config.calibration.tenors.len(), 30);
        assert_eq!(config.calibration.lm.max_iterations, 500);

        let market = config.market.build().unwrap();
        assert_eq!(market.calendar, Calendar::Target);
        let note = config.product.build_note(market.settlement_date).unwrap();
        assert_eq!(note.schedule.len(), 1);
        assert!(!note.schedule.is_valued());
    }

    #[test]
    fn default_tenors_are_real_ordered_dates() {
        let tenors = default_calibration_tenors();
        assert_eq!(tenors[0], NaiveDate::from_ymd_opt(2017, 3, 31).unwrap());
        assert_eq!(tenors[29], NaiveDate::from_ymd_opt(2022, 12, 30).unwrap());
        assert!(tenors.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn zero_sample_runs_are_rejected() {
        let json = MINIMAL.replace("\"n_samples\": 1000", "\"n_samples\": 0");
        assert!(matches!(
            PricingConfig::from_json_str(&json),
            Err(PricingError::Config(_))
        ));
    }

    #[test]
    fn malformed_json_is_a_serialization_error() {
        assert!(matches!(
            PricingConfig::from_json_str("{ \"run\": "),
            Err(PricingError::Serialization(_))
        ));
    }

    #[test]
    fn default_initial_guess_matches_documented_seed() {
        let guess = default_initial_guess();
        assert_relative_eq!(guess.theta, 0.098_629_33, epsilon = 1e-7);
        assert_relative_eq!(guess.sigma, 0.534_315_80, epsilon = 1e-7);
        assert_eq!(guess.v0, 0.0292);
    }

    #[test]
    fn curve_configs_build_term_structures() {
        let settlement = d(2017, 3, 31);
        let zero = CurveConfig::ZeroRates {
            nodes: vec![(d(2018, 3, 31), 0.01), (d(2021, 3, 31), 0.02)],
        };
        let curve = zero.build(settlement).unwrap();
        assert_relative_eq!(curve.discount_t(1.0), (-0.01f64).exp(), epsilon = 1e-4);

        let json = serde_json::to_string(&zero).unwrap();
        assert!(json.contains("\"type\":\"zero_rates\""));
        let back: CurveConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, zero);
    }
}
