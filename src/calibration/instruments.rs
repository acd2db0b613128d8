//! Heston calibration helpers built from a dated implied-volatility surface.
//!
//! One helper per (strike, tenor) node. The helper expires a whole number of weeks
//! after settlement (rounded down, then business-day adjusted) while its target vol is
//! read at the exact tenor date. Each helper is quoted out of the money: a call when
//! `K * DF_r(T) >= S0 * DF_q(T)`, a put otherwise.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{OptionType, PricingError};
use crate::engines::analytic::{HestonEngine, bs_price};
use crate::rates::{BusinessDayConvention, Calendar, YieldTermStructure, advance_weeks};
use crate::vol::{BlackVolTermStructure, implied_vol};

/// Price tolerance of the vol inversion, relative to the price being inverted.
const IMPLIED_VOL_REL_TOLERANCE: f64 = 1e-10;
const IMPLIED_VOL_ABS_TOLERANCE: f64 = 1e-15;
const IMPLIED_VOL_MAX_ITER: usize = 100;

/// European option quote the model is fitted to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HestonHelper {
    pub id: String,
    pub strike: f64,
    /// Surface date the target vol is read at.
    pub tenor_date: NaiveDate,
    pub maturity_date: NaiveDate,
    /// Year fraction to `maturity_date` on the risk-free curve's day count.
    pub expiry: f64,
    pub market_vol: f64,
    pub option_type: OptionType,
    /// Continuously compounded zero rates to expiry.
    pub rate: f64,
    pub dividend_yield: f64,
}

impl HestonHelper {
    /// Black-Scholes value of the quote at the market vol.
    pub fn market_price(&self, spot: f64) -> f64 {
        bs_price(
            self.option_type,
            spot,
            self.strike,
            self.rate,
            self.dividend_yield,
            self.market_vol,
            self.expiry,
        )
    }

    pub fn model_price(&self, engine: &HestonEngine, spot: f64) -> Result<f64, PricingError> {
        engine.price(
            self.option_type,
            spot,
            self.strike,
            self.expiry,
            self.rate,
            self.dividend_yield,
        )
    }

    /// Black vol implied by the Heston price.
    ///
    /// # Errors
    /// [`PricingError::NumericalError`] when the model price carries no time value,
    /// which leaves the vol undefined.
    pub fn model_implied_vol(&self, engine: &HestonEngine, spot: f64) -> Result<f64, PricingError> {
        let price = self.model_price(engine, spot)?;
        let vol = implied_vol(
            self.option_type,
            spot,
            self.strike,
            self.rate,
            self.dividend_yield,
            self.expiry,
            price,
            (IMPLIED_VOL_REL_TOLERANCE * price).max(IMPLIED_VOL_ABS_TOLERANCE),
            IMPLIED_VOL_MAX_ITER,
        )?;
        if vol <= 0.0 {
            return Err(PricingError::NumericalError(format!(
                "model price {price:e} of helper {} has no time value",
                self.id
            )));
        }
        Ok(vol)
    }

    /// Implied-vol error: model implied vol minus market vol.
    pub fn calibration_error(&self, engine: &HestonEngine, spot: f64) -> Result<f64, PricingError> {
        Ok(self.model_implied_vol(engine, spot)? - self.market_vol)
    }
}

/// Builds one helper per strike and tenor, skipping tenors that expire within the
/// first week after settlement.
#[allow(clippy::too_many_arguments)]
pub fn build_helpers(
    settlement_date: NaiveDate,
    spot: f64,
    strikes: &[f64],
    tenors: &[NaiveDate],
    volatility: &dyn BlackVolTermStructure,
    risk_free: &dyn YieldTermStructure,
    dividend: &dyn YieldTermStructure,
    calendar: Calendar,
) -> Result<Vec<HestonHelper>, PricingError> {
    if !spot.is_finite() || spot <= 0.0 {
        return Err(PricingError::InvalidInput(
            "calibration reference spot must be > 0".to_string(),
        ));
    }
    if strikes.iter().any(|k| !k.is_finite() || *k <= 0.0) {
        return Err(PricingError::InvalidInput(
            "calibration strikes must be > 0".to_string(),
        ));
    }

    let mut helpers = Vec::with_capacity(strikes.len() * tenors.len());
    for &strike in strikes {
        for &tenor in tenors {
            if tenor <= settlement_date {
                continue;
            }
            let weeks = (tenor - settlement_date).num_days() / 7;
            if weeks == 0 {
                debug!(%tenor, "skipping sub-week calibration tenor");
                continue;
            }
            let maturity_date = advance_weeks(
                settlement_date,
                weeks,
                BusinessDayConvention::Following,
                &calendar,
            );
            let expiry = risk_free.time_from_reference(maturity_date);
            if expiry <= 0.0 {
                continue;
            }

            let df_r = risk_free.discount(maturity_date);
            let df_q = dividend.discount(maturity_date);
            let option_type = if strike * df_r >= spot * df_q {
                OptionType::Call
            } else {
                OptionType::Put
            };

            let market_vol = volatility.black_vol(tenor, strike);
            if !market_vol.is_finite() || market_vol <= 0.0 {
                return Err(PricingError::MarketDataMissing(format!(
                    "no positive vol at {tenor} / {strike}"
                )));
            }

            helpers.push(HestonHelper {
                id: format!("{tenor}_K{strike:.2}"),
                strike,
                tenor_date: tenor,
                maturity_date,
                expiry,
                market_vol,
                option_type,
                rate: -df_r.ln() / expiry,
                dividend_yield: -df_q.ln() / expiry,
            });
        }
    }

    if helpers.is_empty() {
        return Err(PricingError::InvalidInput(
            "calibration grid produced no helpers".to_string(),
        ));
    }
    Ok(helpers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HestonParams;
    use crate::rates::{DayCountConvention, FlatForward};
    use crate::vol::BlackConstantVol;
    use approx::assert_relative_eq;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn helpers_skip_settlement_and_sub_week_tenors() {
        let settlement = d(2017, 3, 31);
        let r = FlatForward::new(settlement, 0.01, DayCountConvention::Act365Fixed);
        let q = FlatForward::new(settlement, 0.03, DayCountConvention::Act365Fixed);
        let vol = BlackConstantVol::new(settlement, 0.25, DayCountConvention::Act365Fixed).unwrap();
        let tenors = [settlement, d(2017, 4, 6), d(2017, 4, 7), d(2018, 3, 16)];
        let helpers = build_helpers(
            settlement,
            15.35,
            &[14.0, 17.0],
            &tenors,
            &vol,
            &r,
            &q,
            Calendar::Target,
        )
        .unwrap();

        assert_eq!(helpers.len(), 4);
        assert_eq!(helpers[0].maturity_date, d(2017, 4, 7));
        // 50 whole weeks from settlement.
        assert_eq!(helpers[1].maturity_date, d(2018, 3, 16));
        assert_eq!(helpers[1].tenor_date, d(2018, 3, 16));
        assert_relative_eq!(helpers[0].rate, 0.01, epsilon = 1e-12);
        assert_relative_eq!(helpers[0].dividend_yield, 0.03, epsilon = 1e-12);
    }

    #[test]
    fn helpers_are_quoted_out_of_the_money() {
        let settlement = d(2017, 3, 31);
        let flat = FlatForward::new(settlement, 0.0, DayCountConvention::Act365Fixed);
        let vol = BlackConstantVol::new(settlement, 0.25, DayCountConvention::Act365Fixed).unwrap();
        let helpers = build_helpers(
            settlement,
            15.35,
            &[14.0, 15.35, 17.0],
            &[d(2018, 3, 16)],
            &vol,
            &flat,
            &flat,
            Calendar::Target,
        )
        .unwrap();

        assert_eq!(helpers[0].option_type, OptionType::Put);
        assert_eq!(helpers[1].option_type, OptionType::Call);
        assert_eq!(helpers[2].option_type, OptionType::Call);
    }

    #[test]
    fn calibration_error_is_zero_when_market_is_the_model() {
        let engine = HestonEngine::new(HestonParams::new(0.04, 1.5, 0.05, 0.4, -0.6)).unwrap();
        let mut helper = HestonHelper {
            id: "h".to_string(),
            strike: 16.0,
            tenor_date: d(2018, 3, 16),
            maturity_date: d(2018, 3, 16),
            expiry: 0.96,
            market_vol: 0.2,
            option_type: OptionType::Call,
            rate: 0.01,
            dividend_yield: 0.02,
        };
        helper.market_vol = helper.model_implied_vol(&engine, 15.35).unwrap();
        assert!(helper.calibration_error(&engine, 15.35).unwrap().abs() < 1e-8);
        assert_relative_eq!(
            helper.market_price(15.35),
            helper.model_price(&engine, 15.35).unwrap(),
            epsilon = 1e-7
        );
    }

    #[test]
    fn worthless_model_price_has_no_implied_vol() {
        let engine = HestonEngine::new(HestonParams::new(0.03, 1.1, 0.1, 0.5, -0.6)).unwrap();
        let helper = HestonHelper {
            id: "2017-04-07_K30.00".to_string(),
            strike: 30.0,
            tenor_date: d(2017, 4, 7),
            maturity_date: d(2017, 4, 7),
            expiry: 7.0 / 365.0,
            market_vol: 0.2,
            option_type: OptionType::Call,
            rate: 0.001,
            dividend_yield: 0.035,
        };
        assert!(matches!(
            helper.model_implied_vol(&engine, 15.35),
            Err(PricingError::NumericalError(_))
        ));
    }
}
