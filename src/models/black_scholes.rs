//! Black-Scholes Model
//!
//! Closed-form European value for a non-dividend-paying underlying.
//!
//! The formula is undefined at zero volatility or non-positive time to
//! maturity (d1 divides by sigma * sqrt(T)). `price` rejects those inputs
//! with `DegenerateInput`; `price_with_policy` can substitute the intrinsic
//! value instead.

use std::f64::consts::SQRT_2;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc;

use crate::core::{MarketSnapshot, OptionType, ScanError, ScanResult};

/// Standard normal CDF
///
/// Evaluated through the complementary error function so both tails keep
/// full relative precision.
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / SQRT_2)
}

/// Black-Scholes d1 parameter
pub fn d1(spot: f64, strike: f64, time: f64, rate: f64, vol: f64) -> f64 {
    ((spot / strike).ln() + (rate + 0.5 * vol * vol) * time) / (vol * time.sqrt())
}

/// Black-Scholes d2 parameter
pub fn d2(spot: f64, strike: f64, time: f64, rate: f64, vol: f64) -> f64 {
    d1(spot, strike, time, rate, vol) - vol * time.sqrt()
}

/// What to do when the closed form is undefined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DegeneratePolicy {
    /// Return `ScanError::DegenerateInput`
    #[default]
    FailFast,
    /// Return max(S - K, 0) for calls, max(K - S, 0) for puts
    Intrinsic,
}

impl fmt::Display for DegeneratePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegeneratePolicy::FailFast => f.write_str("fail-fast"),
            DegeneratePolicy::Intrinsic => f.write_str("intrinsic"),
        }
    }
}

impl FromStr for DegeneratePolicy {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fail-fast" | "fail_fast" | "error" => Ok(DegeneratePolicy::FailFast),
            "intrinsic" => Ok(DegeneratePolicy::Intrinsic),
            _ => Err(ScanError::invalid_input(format!(
                "unknown degenerate policy '{}', expected fail-fast or intrinsic",
                s
            ))),
        }
    }
}

fn check_inputs(spot: f64, strike: f64, time: f64, rate: f64, vol: f64) -> ScanResult<()> {
    if !(spot.is_finite() && spot > 0.0) {
        return Err(ScanError::invalid_input(format!("spot must be positive, got {}", spot)));
    }
    if !(strike.is_finite() && strike > 0.0) {
        return Err(ScanError::invalid_input(format!("strike must be positive, got {}", strike)));
    }
    if !(vol.is_finite() && vol >= 0.0) {
        return Err(ScanError::invalid_input(format!(
            "volatility must be non-negative, got {}",
            vol
        )));
    }
    if !time.is_finite() || !rate.is_finite() {
        return Err(ScanError::invalid_input("time and rate must be finite"));
    }
    Ok(())
}

/// Black-Scholes European option price
///
/// Fails with `DegenerateInput` when `time <= 0` or `vol == 0`.
pub fn price(
    spot: f64,
    strike: f64,
    time: f64,
    rate: f64,
    vol: f64,
    option_type: OptionType,
) -> ScanResult<f64> {
    check_inputs(spot, strike, time, rate, vol)?;

    if time <= 0.0 {
        return Err(ScanError::degenerate(format!(
            "time to maturity must be positive, got {}",
            time
        )));
    }
    if vol == 0.0 {
        return Err(ScanError::degenerate("volatility is zero"));
    }

    // phi * (S N(phi d1) - K e^{-rT} N(phi d2)) covers both calls and puts
    let phi = option_type.phi();
    let d1 = d1(spot, strike, time, rate, vol);
    let d2 = d2(spot, strike, time, rate, vol);
    let df = (-rate * time).exp();

    Ok(phi * (spot * norm_cdf(phi * d1) - strike * df * norm_cdf(phi * d2)))
}

/// Price with an explicit fallback for degenerate inputs
pub fn price_with_policy(
    spot: f64,
    strike: f64,
    time: f64,
    rate: f64,
    vol: f64,
    option_type: OptionType,
    policy: DegeneratePolicy,
) -> ScanResult<f64> {
    match price(spot, strike, time, rate, vol, option_type) {
        Err(ScanError::DegenerateInput(_)) if policy == DegeneratePolicy::Intrinsic => {
            Ok(option_type.intrinsic(spot, strike))
        }
        other => other,
    }
}

/// Price a strike against a market snapshot
pub fn price_snapshot(
    snapshot: &MarketSnapshot,
    strike: f64,
    option_type: OptionType,
    policy: DegeneratePolicy,
) -> ScanResult<f64> {
    price_with_policy(
        snapshot.spot,
        strike,
        snapshot.time_to_maturity,
        snapshot.rate,
        snapshot.volatility,
        option_type,
        policy,
    )
}
