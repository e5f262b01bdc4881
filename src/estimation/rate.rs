//! Risk-free rate resolution

use crate::core::{ScanError, ScanResult};
use crate::data::RiskFreeRateProvider;

/// Latest observation of `series_id` as a decimal fraction.
///
/// Providers report percentage points (4.25 means 4.25%).
pub fn risk_free_rate(provider: &dyn RiskFreeRateProvider, series_id: &str) -> ScanResult<f64> {
    let percent = match provider.latest_rate(series_id) {
        Ok(Some(value)) => value,
        Ok(None) => {
            return Err(ScanError::rate_unavailable(format!(
                "series {} has no observations",
                series_id
            )))
        }
        Err(e) => {
            return Err(ScanError::rate_unavailable(format!(
                "series {}: {}",
                series_id, e
            )))
        }
    };

    if !percent.is_finite() {
        return Err(ScanError::rate_unavailable(format!(
            "series {} returned a non-finite value",
            series_id
        )));
    }

    Ok(percent / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedRate(Option<f64>);

    impl RiskFreeRateProvider for FixedRate {
        fn latest_rate(&self, _series_id: &str) -> ScanResult<Option<f64>> {
            Ok(self.0)
        }
    }

    struct Offline;

    impl RiskFreeRateProvider for Offline {
        fn latest_rate(&self, _series_id: &str) -> ScanResult<Option<f64>> {
            Err(ScanError::provider("connection refused"))
        }
    }

    #[test]
    fn test_converts_percent_to_decimal() {
        let rate = risk_free_rate(&FixedRate(Some(4.25)), "DGS10").unwrap();
        assert!((rate - 0.0425).abs() < 1e-15);
    }

    #[test]
    fn test_no_observations() {
        let err = risk_free_rate(&FixedRate(None), "DGS10").unwrap_err();
        assert!(matches!(err, ScanError::RateUnavailable(_)));
        assert!(err.to_string().contains("DGS10"));
    }

    #[test]
    fn test_provider_failure_becomes_rate_unavailable() {
        let err = risk_free_rate(&Offline, "DGS3MO").unwrap_err();
        assert!(matches!(err, ScanError::RateUnavailable(_)));
    }
}
