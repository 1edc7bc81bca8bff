//! Converts a tag position into pan/tilt actuator values for a moving-head
//! fixture.
//!
//! Angles are taken from the reference point (where the light hangs) to the
//! tag, clamped into the fixture's mechanical range, and then split into a
//! coarse/fine channel pair.

use log::debug;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::TrackerError;
use crate::lighting_frame::MAX_CHANNEL;
use crate::Point3;

pub type Degree = f64;

/// An inclusive `(min, max)` angular range in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct AngleRange {
    pub min: Degree,
    pub max: Degree,
}

impl AngleRange {
    pub const fn new(min: Degree, max: Degree) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, angle: Degree) -> Degree {
        angle.max(self.min).min(self.max)
    }
}

/// Static description of one light model.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct FixtureProfile {
    pub pan_range: AngleRange,
    pub tilt_range: AngleRange,
    pub pan_dmx_span: u32,
    pub tilt_dmx_span: u32,
    pub pan_channel: u16,
    pub pan_fine_channel: u16,
    pub tilt_channel: u16,
    pub tilt_fine_channel: u16,
}

impl FixtureProfile {
    /// Rejects profiles the mapper cannot divide by or address.
    pub fn validate(&self) -> Result<(), TrackerError> {
        for (name, range) in [("pan", self.pan_range), ("tilt", self.tilt_range)] {
            if !(range.min.is_finite() && range.max.is_finite()) {
                return Err(TrackerError::InvalidProfile(format!(
                    "{} range is not finite",
                    name
                )));
            }
            if range.max <= range.min || range.max <= 0.0 {
                return Err(TrackerError::InvalidProfile(format!(
                    "{} range ({}, {}) must have max > min and max > 0",
                    name, range.min, range.max
                )));
            }
        }
        let channels = [
            self.pan_channel,
            self.pan_fine_channel,
            self.tilt_channel,
            self.tilt_fine_channel,
        ];
        if let Some(c) = channels
            .iter()
            .find(|&&c| c == 0 || c as i64 > MAX_CHANNEL)
        {
            return Err(TrackerError::InvalidProfile(format!(
                "channel {} is outside 1..=512",
                c
            )));
        }
        Ok(())
    }
}

/// The fixtures this rig knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Fixture {
    BadBoy,
    Sparky,
}

impl Fixture {
    pub const NAMES: [&'static str; 2] = ["BadBoy", "Sparky"];

    pub fn profile(&self) -> FixtureProfile {
        match self {
            Fixture::BadBoy => FixtureProfile {
                pan_range: AngleRange::new(0.0, 615.0),
                tilt_range: AngleRange::new(0.0, 260.0),
                pan_dmx_span: 65535,
                tilt_dmx_span: 65535,
                pan_channel: 2,
                pan_fine_channel: 3,
                tilt_channel: 4,
                tilt_fine_channel: 5,
            },
            Fixture::Sparky => FixtureProfile {
                pan_range: AngleRange::new(0.0, 540.0),
                tilt_range: AngleRange::new(0.0, 250.0),
                pan_dmx_span: 65535,
                tilt_dmx_span: 65535,
                pan_channel: 10,
                pan_fine_channel: 11,
                tilt_channel: 12,
                tilt_fine_channel: 13,
            },
        }
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Fixture::BadBoy
    }
}

impl fmt::Display for Fixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl FromStr for Fixture {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "badboy" => Ok(Fixture::BadBoy),
            "sparky" => Ok(Fixture::Sparky),
            _ => Err(TrackerError::UnknownFixture(s.to_owned())),
        }
    }
}

/// Linear correction applied to the raw angles, set by an operator during
/// calibration.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Calibration {
    pub pan_scale: f64,
    pub pan_offset: Degree,
    pub tilt_scale: f64,
    pub tilt_offset: Degree,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            pan_scale: 1.0,
            pan_offset: 0.0,
            tilt_scale: 1.0,
            tilt_offset: 0.0,
        }
    }
}

/// Pan and tilt after calibration and clamping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanTilt {
    pub pan: Degree,
    pub tilt: Degree,
}

/// The four actuator values for one position.
///
/// Coarse values are kept at the width the formula produces, bounded by the
/// profile's DMX span; the lighting frame narrows them to a byte when they
/// are written. Fine values are always within `[0, 255]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorValues {
    pub pan_coarse: i64,
    pub pan_fine: i64,
    pub tilt_coarse: i64,
    pub tilt_fine: i64,
}

/// Raw angles, before calibration. Pan is measured in the floor plane from
/// the x axis, tilt is the elevation above the floor plane.
pub fn angles(relative: Point3) -> (Degree, Degree) {
    let Point3 { x, y, z } = relative;
    let distance = (x * x + y * y + z * z).sqrt();
    let pan = y.atan2(x).to_degrees();
    let tilt = z.atan2(distance).to_degrees();
    (pan, tilt)
}

/// Applies calibration and clamps into the fixture's ranges.
pub fn pan_tilt(relative: Point3, calibration: &Calibration, profile: &FixtureProfile) -> PanTilt {
    let (pan, tilt) = angles(relative);
    let pan = pan * calibration.pan_scale + calibration.pan_offset;
    let tilt = tilt * calibration.tilt_scale + calibration.tilt_offset;
    PanTilt {
        pan: profile.pan_range.clamp(pan),
        tilt: profile.tilt_range.clamp(tilt),
    }
}

/// Splits an angle into a coarse value and a fine remainder scaled to a
/// byte.
pub fn coarse_fine(angle: Degree, range: &AngleRange, dmx_span: u32) -> (i64, i64) {
    let scaled = angle * dmx_span as f64 / range.max;
    let coarse = scaled.floor();
    let fine = ((scaled - coarse) * 256.0).floor();
    let coarse = (coarse as i64).clamp(0, dmx_span as i64);
    let fine = (fine as i64).clamp(0, u8::MAX as i64);
    (coarse, fine)
}

/// Maps angles that are already calibrated and clamped into actuator
/// values.
pub fn actuator_values(angles: PanTilt, profile: &FixtureProfile) -> ActuatorValues {
    let (pan_coarse, pan_fine) = coarse_fine(angles.pan, &profile.pan_range, profile.pan_dmx_span);
    let (tilt_coarse, tilt_fine) =
        coarse_fine(angles.tilt, &profile.tilt_range, profile.tilt_dmx_span);
    ActuatorValues {
        pan_coarse,
        pan_fine,
        tilt_coarse,
        tilt_fine,
    }
}

/// Maps a reference-relative position to actuator values.
pub fn map_position(
    relative: Point3,
    calibration: &Calibration,
    profile: &FixtureProfile,
) -> ActuatorValues {
    let angles = pan_tilt(relative, calibration, profile);
    debug!("pan: {}, tilt: {}", angles.pan, angles.tilt);
    actuator_values(angles, profile)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sparky() -> FixtureProfile {
        Fixture::Sparky.profile()
    }

    #[test]
    fn fixture_lookup() {
        assert_eq!("Sparky".parse::<Fixture>().unwrap(), Fixture::Sparky);
        assert_eq!("badboy".parse::<Fixture>().unwrap(), Fixture::BadBoy);
        assert!(matches!(
            "Fogger".parse::<Fixture>(),
            Err(TrackerError::UnknownFixture(_))
        ));
    }

    #[test]
    fn builtin_profiles_validate() {
        assert!(Fixture::BadBoy.profile().validate().is_ok());
        assert!(Fixture::Sparky.profile().validate().is_ok());
    }

    #[test]
    fn bad_profiles_are_rejected() {
        let mut p = sparky();
        p.pan_range = AngleRange::new(0.0, 0.0);
        assert!(p.validate().is_err());

        let mut p = sparky();
        p.tilt_channel = 600;
        assert!(p.validate().is_err());

        let mut p = sparky();
        p.pan_fine_channel = 0;
        assert!(p.validate().is_err());
    }

    #[test]
    fn angles_on_axes() {
        let (pan, tilt) = angles(Point3 { x: 1.0, y: 0.0, z: 0.0 });
        assert_eq!(pan, 0.0);
        assert_eq!(tilt, 0.0);

        let (pan, _) = angles(Point3 { x: 0.0, y: 2.0, z: 0.0 });
        assert!((pan - 90.0).abs() < 1e-9);

        let (_, tilt) = angles(Point3 { x: 0.0, y: 0.0, z: 1.0 });
        assert!((tilt - 45.0).abs() < 1e-9);
    }

    #[test]
    fn negative_angles_clamp_to_min() {
        let angles = pan_tilt(
            Point3 { x: 0.0, y: -1.0, z: -1.0 },
            &Calibration::default(),
            &sparky(),
        );
        assert_eq!(angles.pan, 0.0);
        assert_eq!(angles.tilt, 0.0);
    }

    #[test]
    fn calibration_scales_and_offsets() {
        let calibration = Calibration {
            pan_scale: 2.0,
            pan_offset: 10.0,
            tilt_scale: 1.0,
            tilt_offset: 5.0,
        };
        let angles = pan_tilt(Point3 { x: 0.0, y: 1.0, z: 0.0 }, &calibration, &sparky());
        assert!((angles.pan - 190.0).abs() < 1e-9);
        assert!((angles.tilt - 5.0).abs() < 1e-9);
    }

    #[test]
    fn calibration_past_range_clamps_to_max() {
        let calibration = Calibration {
            pan_offset: 1000.0,
            ..Calibration::default()
        };
        let angles = pan_tilt(Point3 { x: 1.0, y: 0.0, z: 0.0 }, &calibration, &sparky());
        assert_eq!(angles.pan, 540.0);
    }

    #[test]
    fn range_max_gives_full_span_and_zero_fine() {
        let range = AngleRange::new(0.0, 540.0);
        let (coarse, fine) = coarse_fine(540.0, &range, 65535);
        assert_eq!(coarse, 65535);
        assert_eq!(fine, 0);
    }

    #[test]
    fn range_min_is_zero() {
        let range = AngleRange::new(0.0, 250.0);
        assert_eq!(coarse_fine(0.0, &range, 65535), (0, 0));
    }

    #[test]
    fn fine_is_scaled_remainder() {
        let range = AngleRange::new(0.0, 100.0);
        // 10.5 degrees of 100 over a span of 100 is 10.5 units
        let (coarse, fine) = coarse_fine(10.5, &range, 100);
        assert_eq!(coarse, 10);
        assert_eq!(fine, 128);
    }

    #[test]
    fn fine_always_fits_a_byte() {
        let profile = sparky();
        for i in 0..=5400 {
            let angle = i as f64 / 10.0;
            let (coarse, fine) = coarse_fine(angle, &profile.pan_range, profile.pan_dmx_span);
            assert!((0..=255).contains(&fine), "fine {} at {}", fine, angle);
            assert!((0..=65535).contains(&coarse));
        }
    }

    #[test]
    fn map_position_uses_profile() {
        let values = map_position(
            Point3 { x: 0.0, y: 0.0, z: 1.0 },
            &Calibration::default(),
            &sparky(),
        );
        assert_eq!(values.pan_coarse, 0);
        assert_eq!(values.pan_fine, 0);
        // 45 degrees of a 250 degree range over 65535
        assert_eq!(values.tilt_coarse, 11796);
        assert!((0..=255).contains(&values.tilt_fine));
    }
}
