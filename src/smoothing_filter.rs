//! A scalar steady-state Kalman filter, one instance per spatial axis.

use serde::{Deserialize, Serialize};

/// Noise parameters shared by the three axis filters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FilterSettings {
    /// How much the tag is expected to wander between reports
    pub process_variance: f64,
    /// How noisy a single UWB report is
    pub measurement_variance: f64,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            process_variance: 1e-4,
            measurement_variance: 0.1_f64.powi(4),
        }
    }
}

/// A 1-D recursive estimator with fixed noise parameters.
///
/// A `measurement_variance` of zero makes the filter a pass-through: every
/// observation becomes the estimate. The caller is responsible for keeping
/// NaN and infinities out of [`SmoothingFilter::observe`].
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothingFilter {
    process_variance: f64,
    measurement_variance: f64,
    estimate: f64,
    error_estimate: f64,
}

impl SmoothingFilter {
    pub fn new(process_variance: f64, measurement_variance: f64) -> Self {
        Self {
            process_variance,
            measurement_variance,
            estimate: 0.0,
            error_estimate: 1.0,
        }
    }

    pub fn from_settings(settings: &FilterSettings) -> Self {
        Self::new(settings.process_variance, settings.measurement_variance)
    }

    /// Blends a new measurement into the running estimate.
    pub fn observe(&mut self, measurement: f64) {
        let predicted_error = self.error_estimate + self.process_variance;
        let gain = predicted_error / (predicted_error + self.measurement_variance);
        self.estimate += gain * (measurement - self.estimate);
        self.error_estimate = (1.0 - gain) * predicted_error;
    }

    pub fn current_estimate(&self) -> f64 {
        self.estimate
    }

    pub fn error_estimate(&self) -> f64 {
        self.error_estimate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero_with_unit_error() {
        let kf = SmoothingFilter::new(1.0, 1.0);
        assert_eq!(kf.current_estimate(), 0.0);
        assert_eq!(kf.error_estimate(), 1.0);
    }

    #[test]
    fn zero_measurement_variance_passes_through() {
        let mut kf = SmoothingFilter::new(1.0, 0.0);
        kf.observe(5.0);
        assert_eq!(kf.current_estimate(), 5.0);
        kf.observe(-3.25);
        assert_eq!(kf.current_estimate(), -3.25);
    }

    #[test]
    fn zero_process_variance_still_moves() {
        let mut kf = SmoothingFilter::new(0.0, 1.0);
        kf.observe(5.0);
        assert!(kf.current_estimate() != 0.0);
    }

    #[test]
    fn high_process_variance_stays_below_measurement() {
        let mut kf = SmoothingFilter::new(1e6, 1.0);
        kf.observe(5.0);
        assert!(kf.current_estimate() < 5.0);
        assert!(kf.current_estimate() > 4.99);
    }

    #[test]
    fn high_measurement_variance_barely_moves() {
        let mut kf = SmoothingFilter::new(1.0, 1e6);
        kf.observe(5.0);
        assert!(kf.current_estimate() > 0.0);
        assert!(kf.current_estimate() < 0.01);
    }

    #[test]
    fn sign_follows_measurement() {
        let mut kf = SmoothingFilter::new(1.0, 1.0);
        kf.observe(-5.0);
        assert!(kf.current_estimate() < 0.0);

        let mut kf = SmoothingFilter::new(1.0, 1.0);
        kf.observe(1e6);
        assert!(kf.current_estimate() > 0.0);
    }

    #[test]
    fn converges_monotonically_on_constant_input() {
        let settings = [(1e-4, 1e-8), (1e-4, 0.1), (1.0, 1.0), (0.5, 10.0)];
        for (pv, mv) in settings {
            let mut kf = SmoothingFilter::new(pv, mv);
            let target = 2.5;
            let mut last_gap = (target - kf.current_estimate()).abs();
            let mut last_error = kf.error_estimate();
            for _ in 0..200 {
                kf.observe(target);
                let gap = (target - kf.current_estimate()).abs();
                assert!(gap <= last_gap, "estimate moved away with pv={pv} mv={mv}");
                assert!(kf.error_estimate() > 0.0);
                assert!(kf.error_estimate() <= last_error + pv);
                last_gap = gap;
                last_error = kf.error_estimate();
            }
            assert!(last_gap < 1e-2);
        }
    }

    #[test]
    fn error_estimate_stays_within_unit_interval_for_small_process_variance() {
        let mut kf = SmoothingFilter::new(1e-4, 0.1);
        for i in 0..500 {
            kf.observe(i as f64 * 0.01);
            assert!(kf.error_estimate() > 0.0);
            assert!(kf.error_estimate() <= 1.0);
        }
    }

    #[test]
    fn error_estimate_settles_above_one_for_large_process_variance() {
        // steady state P = (P + q) r / (P + q + r) is 2.0 for q = 0.5, r = 10
        let mut kf = SmoothingFilter::new(0.5, 10.0);
        for _ in 0..100 {
            kf.observe(2.5);
        }
        assert!((kf.error_estimate() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn error_estimate_is_non_increasing() {
        let mut kf = SmoothingFilter::new(1e-4, 0.1);
        let mut last = kf.error_estimate();
        for _ in 0..100 {
            kf.observe(1.0);
            assert!(kf.error_estimate() <= last);
            last = kf.error_estimate();
        }
    }
}
