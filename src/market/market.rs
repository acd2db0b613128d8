//! Module `market::market`.
//!
//! Dated market snapshot consumed by schedule valuation, diffusion construction and
//! calibration: settlement date, spot quote, collateral (risk-free), issuer (risky) and
//! dividend curves, a Black volatility term structure and the business-day calendar.
use std::sync::Arc;

use chrono::NaiveDate;

use crate::core::PricingError;
use crate::rates::{Calendar, DayCountConvention, FlatForward, YieldTermStructure};
use crate::vol::BlackVolTermStructure;

#[derive(Debug, Clone)]
pub struct Market {
    pub settlement_date: NaiveDate,
    pub spot: f64,
    /// Collateral curve discounting coupons and driving the drift.
    pub risk_free: Arc<dyn YieldTermStructure>,
    /// Issuer curve discounting principal.
    pub risky: Arc<dyn YieldTermStructure>,
    pub dividend: Arc<dyn YieldTermStructure>,
    pub volatility: Arc<dyn BlackVolTermStructure>,
    pub calendar: Calendar,
}

impl Market {
    #[inline]
    pub fn builder() -> MarketBuilder {
        MarketBuilder::default()
    }

    #[inline]
    pub fn spot(&self) -> f64 {
        self.spot
    }

    /// Same snapshot with a different spot quote.
    pub fn with_spot(&self, spot: f64) -> Result<Self, PricingError> {
        validate_spot(spot)?;
        Ok(Self {
            spot,
            ..self.clone()
        })
    }
}

fn validate_spot(spot: f64) -> Result<(), PricingError> {
    if !spot.is_finite() || spot <= 0.0 {
        return Err(PricingError::InvalidInput(
            "market spot must be > 0".to_string(),
        ));
    }
    Ok(())
}

/// Builder for [`Market`].
#[derive(Debug, Clone, Default)]
pub struct MarketBuilder {
    settlement_date: Option<NaiveDate>,
    spot: Option<f64>,
    risk_free: Option<Arc<dyn YieldTermStructure>>,
    risky: Option<Arc<dyn YieldTermStructure>>,
    dividend: Option<Arc<dyn YieldTermStructure>>,
    volatility: Option<Arc<dyn BlackVolTermStructure>>,
    calendar: Calendar,
}

impl MarketBuilder {
    #[inline]
    pub fn settlement_date(mut self, date: NaiveDate) -> Self {
        self.settlement_date = Some(date);
        self
    }

    #[inline]
    pub fn spot(mut self, spot: f64) -> Self {
        self.spot = Some(spot);
        self
    }

    pub fn risk_free_curve(mut self, curve: Arc<dyn YieldTermStructure>) -> Self {
        self.risk_free = Some(curve);
        self
    }

    /// Issuer curve; defaults to the risk-free curve when unset.
    pub fn risky_curve(mut self, curve: Arc<dyn YieldTermStructure>) -> Self {
        self.risky = Some(curve);
        self
    }

    /// Dividend curve; defaults to a zero yield when unset.
    pub fn dividend_curve(mut self, curve: Arc<dyn YieldTermStructure>) -> Self {
        self.dividend = Some(curve);
        self
    }

    pub fn volatility(mut self, volatility: Arc<dyn BlackVolTermStructure>) -> Self {
        self.volatility = Some(volatility);
        self
    }

    #[inline]
    pub fn calendar(mut self, calendar: Calendar) -> Self {
        self.calendar = calendar;
        self
    }

    /// Validates and builds a [`Market`].
    ///
    /// # Errors
    /// [`PricingError::InvalidInput`] for a missing or non-positive spot,
    /// [`PricingError::MarketDataMissing`] for a missing curve or vol structure or for
    /// term structures referenced to a different date than settlement.
    pub fn build(self) -> Result<Market, PricingError> {
        let settlement_date = self.settlement_date.ok_or_else(|| {
            PricingError::InvalidInput("market settlement date is required".to_string())
        })?;
        let spot = self
            .spot
            .ok_or_else(|| PricingError::InvalidInput("market spot is required".to_string()))?;
        validate_spot(spot)?;

        let risk_free = self.risk_free.ok_or_else(|| {
            PricingError::MarketDataMissing("risk-free curve is required".to_string())
        })?;
        let risky = self.risky.unwrap_or_else(|| risk_free.clone());
        let dividend = self.dividend.unwrap_or_else(|| {
            Arc::new(FlatForward::new(
                settlement_date,
                0.0,
                DayCountConvention::Act365Fixed,
            ))
        });
        let volatility = self.volatility.ok_or_else(|| {
            PricingError::MarketDataMissing("volatility term structure is required".to_string())
        })?;

        for (name, reference) in [
            ("risk-free curve", risk_free.reference_date()),
            ("risky curve", risky.reference_date()),
            ("dividend curve", dividend.reference_date()),
            ("volatility", volatility.reference_date()),
        ] {
            if reference != settlement_date {
                return Err(PricingError::MarketDataMissing(format!(
                    "{name} is referenced to {reference}, expected settlement {settlement_date}"
                )));
            }
        }

        Ok(Market {
            settlement_date,
            spot,
            risk_free,
            risky,
            dividend,
            volatility,
            calendar: self.calendar,
        })
    }
}
