//! Startup configuration, read from a [RON](https://github.com/ron-rs/ron)
//! file. Every field is optional; anything left out takes the default
//! shown below.
//!
//! ```text
//! (
//!     fixture: Sparky,
//!     reference: (x: 1.0, y: 1.0, z: 1.0),
//!     calibration: (pan_scale: 1.0, pan_offset: 0.0, tilt_scale: 1.0, tilt_offset: 0.0),
//!     filter: (process_variance: 0.0001, measurement_variance: 0.0001),
//!     link: (settle_delay: (secs: 1, nanos: 0), read_timeout: None),
//! )
//! ```
//!
//! A `custom_profile: Some((...))` entry replaces the named fixture's
//! profile entirely.

use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::device_link::LinkSettings;
use crate::error::TrackerError;
use crate::pan_tilt::{Calibration, Fixture, FixtureProfile};
use crate::smoothing_filter::FilterSettings;
use crate::Point3;

/// Everything the tracking loop needs to know up front. Built once and
/// never changed while tracking.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Which light is being driven
    pub fixture: Fixture,
    /// Overrides the profile of `fixture` when present
    pub custom_profile: Option<FixtureProfile>,
    /// Where the light hangs, in anchor coordinates
    pub reference: Point3,
    /// Operator correction of the raw angles
    pub calibration: Calibration,
    /// Noise parameters of the position filter
    pub filter: FilterSettings,
    /// Timing of the UWB serial session
    pub link: LinkSettings,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            fixture: Fixture::default(),
            custom_profile: None,
            reference: Point3::new(1.0, 1.0, 1.0),
            calibration: Calibration::default(),
            filter: FilterSettings::default(),
            link: LinkSettings::default(),
        }
    }
}

impl TrackerConfig {
    /// Reads and validates a configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TrackerError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            TrackerError::Config(format!("could not read {}: {}", path.display(), e))
        })?;
        Self::from_ron(&text)
    }

    /// Parses and validates a configuration from RON text.
    pub fn from_ron(text: &str) -> Result<Self, TrackerError> {
        let config: Self = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the parts that would otherwise only fail mid-flight.
    pub fn validate(&self) -> Result<(), TrackerError> {
        self.profile().validate()?;
        let FilterSettings {
            process_variance,
            measurement_variance,
        } = self.filter;
        if !(process_variance >= 0.0 && measurement_variance >= 0.0) {
            return Err(TrackerError::Config(format!(
                "filter variances must be non-negative, got {} and {}",
                process_variance, measurement_variance
            )));
        }
        if !self.reference.is_finite() {
            return Err(TrackerError::Config("reference point is not finite".to_owned()));
        }
        Ok(())
    }

    /// The profile of the light being driven.
    pub fn profile(&self) -> FixtureProfile {
        self.custom_profile
            .unwrap_or_else(|| self.fixture.profile())
    }
}
