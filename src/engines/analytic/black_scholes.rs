//! Module `engines::analytic::black_scholes`.
//!
//! Black-Scholes-Merton closed forms with a continuous dividend yield, used to turn
//! Heston model prices back into implied volatilities during calibration.
use crate::core::OptionType;
use crate::math::{normal_cdf, normal_pdf};

#[inline]
fn intrinsic(option_type: OptionType, spot: f64, strike: f64) -> f64 {
    match option_type {
        OptionType::Call => (spot - strike).max(0.0),
        OptionType::Put => (strike - spot).max(0.0),
    }
}

#[inline]
fn d1_d2(spot: f64, strike: f64, rate: f64, dividend_yield: f64, vol: f64, expiry: f64) -> (f64, f64) {
    let sqrt_t = expiry.sqrt();
    let sig_sqrt_t = vol * sqrt_t;
    let d1 = ((spot / strike).ln() + (rate - dividend_yield + 0.5 * vol * vol) * expiry) / sig_sqrt_t;
    (d1, d1 - sig_sqrt_t)
}

/// Black-Scholes-Merton price of a European option.
///
/// Degenerate inputs collapse to intrinsic (`expiry <= 0`) or discounted forward
/// intrinsic (`vol <= 0`).
pub fn bs_price(
    option_type: OptionType,
    spot: f64,
    strike: f64,
    rate: f64,
    dividend_yield: f64,
    vol: f64,
    expiry: f64,
) -> f64 {
    if expiry <= 0.0 {
        return intrinsic(option_type, spot, strike);
    }
    let df_r = (-rate * expiry).exp();
    let df_q = (-dividend_yield * expiry).exp();
    if vol <= 0.0 {
        return match option_type {
            OptionType::Call => (spot * df_q - strike * df_r).max(0.0),
            OptionType::Put => (strike * df_r - spot * df_q).max(0.0),
        };
    }

    let (d1, d2) = d1_d2(spot, strike, rate, dividend_yield, vol, expiry);
    match option_type {
        OptionType::Call => spot * df_q * normal_cdf(d1) - strike * df_r * normal_cdf(d2),
        OptionType::Put => strike * df_r * normal_cdf(-d2) - spot * df_q * normal_cdf(-d1),
    }
}

/// Sensitivity of [`bs_price`] to volatility (identical for calls and puts).
pub fn bs_vega(spot: f64, strike: f64, rate: f64, dividend_yield: f64, vol: f64, expiry: f64) -> f64 {
    if expiry <= 0.0 || vol <= 0.0 {
        return 0.0;
    }
    let (d1, _) = d1_d2(spot, strike, rate, dividend_yield, vol, expiry);
    spot * (-dividend_yield * expiry).exp() * normal_pdf(d1) * expiry.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn call_matches_hull_reference() {
        // Hull example 15.6: S=42, K=40, r=10%, sigma=20%, T=0.5.
        let call = bs_price(OptionType::Call, 42.0, 40.0, 0.10, 0.0, 0.20, 0.5);
        let put = bs_price(OptionType::Put, 42.0, 40.0, 0.10, 0.0, 0.20, 0.5);
        assert_relative_eq!(call, 4.759_422_392_871_532, epsilon = 1e-9);
        assert_relative_eq!(put, 0.808_599_372_900_092, epsilon = 1e-9);
    }

    #[test]
    fn put_call_parity_with_dividends() {
        let (s, k, r, q, v, t) = (15.35, 16.0, 0.01, 0.03, 0.3, 2.0);
        let call = bs_price(OptionType::Call, s, k, r, q, v, t);
        let put = bs_price(OptionType::Put, s, k, r, q, v, t);
        assert_relative_eq!(
            call - put,
            s * (-q * t).exp() - k * (-r * t).exp(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn vega_matches_finite_difference() {
        let (s, k, r, q, v, t) = (100.0, 105.0, 0.02, 0.01, 0.25, 1.5);
        let h = 1e-5;
        let fd = (bs_price(OptionType::Call, s, k, r, q, v + h, t)
            - bs_price(OptionType::Call, s, k, r, q, v - h, t))
            / (2.0 * h);
        assert_relative_eq!(bs_vega(s, k, r, q, v, t), fd, epsilon = 1e-6);
    }
}
