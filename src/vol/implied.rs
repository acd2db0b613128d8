//! Black-Scholes-Merton implied-volatility inversion.
//!
//! Newton on vega from a moneyness-aware initial guess, with a bisection fallback
//! when vega collapses (deep ITM/OTM short-dated options).

use std::f64::consts::PI;

use crate::core::{OptionType, PricingError};
use crate::engines::analytic::black_scholes::{bs_price, bs_vega};

const VOL_FLOOR: f64 = 1e-6;
const VOL_CAP: f64 = 5.0;

/// Heuristic initial guess shaped by time value and log-moneyness.
///
/// # Numerical notes
/// The output is clamped to `[1e-4, 5.0]`.
pub fn initial_vol_guess(
    option_type: OptionType,
    spot: f64,
    strike: f64,
    rate: f64,
    dividend_yield: f64,
    expiry: f64,
    market_price: f64,
) -> f64 {
    if expiry <= 0.0 {
        return 1e-4;
    }

    let fwd_spot = spot * (-dividend_yield * expiry).exp();
    let pv_strike = strike * (-rate * expiry).exp();
    let intrinsic = match option_type {
        OptionType::Call => (fwd_spot - pv_strike).max(0.0),
        OptionType::Put => (pv_strike - fwd_spot).max(0.0),
    };

    let time_value = (market_price - intrinsic).max(1e-10);
    let atm_guess = ((2.0 * PI) / expiry).sqrt() * (time_value / fwd_spot.max(1e-10));
    let m = (fwd_spot / pv_strike).ln().abs();

    (atm_guess * (1.0 + 0.5 * m + 0.125 * m * m)).clamp(1e-4, VOL_CAP)
}

#[allow(clippy::too_many_arguments)]
/// Computes the Black-Scholes-Merton implied volatility of `market_price`.
///
/// # Errors
/// Returns `InvalidInput` for non-finite or non-positive state, and for prices
/// outside the no-arbitrage band `[intrinsic, upper bound]`. Returns
/// `ConvergenceFailure` when no vol in `[1e-6, 5]` reproduces the price.
///
/// # Examples
/// ```
/// use autocall_mc::core::OptionType;
/// use autocall_mc::engines::analytic::bs_price;
/// use autocall_mc::vol::implied::implied_vol;
///
/// let price = bs_price(OptionType::Put, 15.35, 16.0, 0.01, 0.02, 0.28, 1.5);
/// let iv = implied_vol(OptionType::Put, 15.35, 16.0, 0.01, 0.02, 1.5, price, 1e-12, 64).unwrap();
/// assert!((iv - 0.28).abs() < 1e-8);
/// ```
pub fn implied_vol(
    option_type: OptionType,
    spot: f64,
    strike: f64,
    rate: f64,
    dividend_yield: f64,
    expiry: f64,
    market_price: f64,
    tol: f64,
    max_iter: usize,
) -> Result<f64, PricingError> {
    if !spot.is_finite()
        || !strike.is_finite()
        || !rate.is_finite()
        || !dividend_yield.is_finite()
        || !expiry.is_finite()
        || !market_price.is_finite()
    {
        return Err(PricingError::InvalidInput(
            "implied vol inputs must be finite".to_string(),
        ));
    }
    if spot <= 0.0 || strike <= 0.0 {
        return Err(PricingError::InvalidInput(
            "spot and strike must be > 0".to_string(),
        ));
    }
    if expiry <= 0.0 {
        return Err(PricingError::InvalidInput("expiry must be > 0".to_string()));
    }

    let fwd_spot = spot * (-dividend_yield * expiry).exp();
    let pv_strike = strike * (-rate * expiry).exp();
    let (intrinsic, upper) = match option_type {
        OptionType::Call => ((fwd_spot - pv_strike).max(0.0), fwd_spot),
        OptionType::Put => ((pv_strike - fwd_spot).max(0.0), pv_strike),
    };
    let price_tol = 32.0 * f64::EPSILON * (1.0 + upper.abs());
    if market_price < intrinsic - price_tol || market_price > upper + price_tol {
        return Err(PricingError::InvalidInput(format!(
            "price out of no-arbitrage bounds: price={market_price}, intrinsic={intrinsic}, upper={upper}"
        )));
    }
    if market_price <= intrinsic + price_tol {
        return Ok(0.0);
    }

    let price_at = |vol: f64| bs_price(option_type, spot, strike, rate, dividend_yield, vol, expiry);

    let mut sigma = initial_vol_guess(
        option_type,
        spot,
        strike,
        rate,
        dividend_yield,
        expiry,
        market_price,
    );
    for _ in 0..max_iter {
        let diff = price_at(sigma) - market_price;
        if diff.abs() < tol {
            return Ok(sigma);
        }
        let vega = bs_vega(spot, strike, rate, dividend_yield, sigma, expiry);
        if vega.abs() < 1e-10 {
            break;
        }
        sigma = (sigma - diff / vega).clamp(VOL_FLOOR, VOL_CAP);
    }

    let mut lo = VOL_FLOOR;
    let mut hi = VOL_CAP;
    let mut flo = price_at(lo) - market_price;
    let fhi = price_at(hi) - market_price;
    if flo * fhi > 0.0 {
        return Err(PricingError::ConvergenceFailure(format!(
            "price {market_price} is not attained for vols in [{VOL_FLOOR}, {VOL_CAP}]"
        )));
    }
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        let fm = price_at(mid) - market_price;
        if fm.abs() < tol || hi - lo < 1e-14 {
            return Ok(mid);
        }
        if flo * fm <= 0.0 {
            hi = mid;
        } else {
            lo = mid;
            flo = fm;
        }
    }

    Ok(0.5 * (lo + hi))
}
