//! Date and strike selection

use chrono::{Duration, NaiveDate};

use crate::core::OptionChain;

/// Calendar days per year for time to maturity
pub const DAYS_PER_YEAR: f64 = 365.0;

/// Days counted per month of horizon
pub const DAYS_PER_MONTH: i64 = 30;

/// Last date inside the lookahead horizon
pub fn horizon_end(today: NaiveDate, horizon_months: u32) -> NaiveDate {
    today + Duration::days(i64::from(horizon_months) * DAYS_PER_MONTH)
}

/// Expirations inside [today, today + horizon], in input order
pub fn filter_expirations(
    expirations: &[NaiveDate],
    today: NaiveDate,
    horizon_months: u32,
) -> Vec<NaiveDate> {
    let last = horizon_end(today, horizon_months);
    expirations
        .iter()
        .copied()
        .filter(|d| *d >= today && *d <= last)
        .collect()
}

/// [spot * (1 - band/100), spot * (1 + band/100)]
pub fn strike_bounds(spot: f64, band_percent: f64) -> (f64, f64) {
    (
        spot * (1.0 - band_percent / 100.0),
        spot * (1.0 + band_percent / 100.0),
    )
}

/// Sorted, de-duplicated chain strikes within the band around spot
pub fn filter_strikes(chain: &OptionChain, spot: f64, band_percent: f64) -> Vec<f64> {
    let (low, high) = strike_bounds(spot, band_percent);
    chain
        .strikes()
        .into_iter()
        .filter(|k| *k >= low && *k <= high)
        .collect()
}

/// Years between `today` and `expiration` (negative once expired)
pub fn time_to_maturity(expiration: NaiveDate, today: NaiveDate) -> f64 {
    (expiration - today).num_days() as f64 / DAYS_PER_YEAR
}
