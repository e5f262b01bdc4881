//! Historical volatility from daily closes

/// Trading sessions per year used for annualization
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Log returns ln(c_i / c_{i-1}) of consecutive closes
pub fn log_returns(closes: &[f64]) -> Vec<f64> {
    closes.windows(2).map(|w| (w[1] / w[0]).ln()).collect()
}

/// Sample standard deviation (n - 1 denominator)
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(var.sqrt())
}

/// Annualized volatility of daily closes.
///
/// Needs at least three closes. Two closes give a single return, and
/// the n - 1 sample deviation of one value is undefined, so `None` is
/// returned for anything shorter.
pub fn annualized_volatility(closes: &[f64]) -> Option<f64> {
    let returns = log_returns(closes);
    sample_std_dev(&returns).map(|sd| sd * TRADING_DAYS_PER_YEAR.sqrt())
}
