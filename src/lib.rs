//! FollowSpot points a motorized stage light at a performer carrying an
//! ultra-wideband (UWB) tag. A UWB positioning module reports the tag's
//! position relative to a set of fixed anchors; each report is smoothed,
//! turned into pan and tilt angles from where the light hangs, and sent to
//! the fixture as coarse/fine DMX channel pairs over a USB lighting
//! interface.
//!
//! The pipeline, leaves first:
//!
//! - [`device_link`] runs the serial handshake with the UWB module and
//!   yields raw report lines.
//! - [`report_parser`] turns those lines into anchor and tag positions.
//! - [`smoothing_filter`] smooths each axis of the tag position.
//! - [`pan_tilt`] maps a position onto a fixture's actuator values.
//! - [`lighting_frame`] encodes the DMX frame and writes it to the bus.
//! - [`tracking_loop`] wires all of it together, and publishes positions
//!   to a [`visualizer`] running on another thread.

#![warn(missing_docs)]
pub mod args;
pub mod config;
pub mod device_link;
pub mod dummy_uwb;
pub mod error;
pub mod gui;
#[allow(missing_docs)]
pub mod lighting_frame;
#[allow(missing_docs)]
pub mod pan_tilt;
pub mod report_parser;
#[allow(missing_docs)]
pub mod smoothing_filter;
pub mod tracking_loop;
pub mod visualizer;

use serde::{Deserialize, Serialize};
use std::{fmt::Display, ops::Sub};

/// A point in the anchors' coordinate system, in metres.
#[derive(Debug, Default, PartialEq, Clone, Copy, Deserialize, Serialize)]
pub struct Point3 {
    /// Floor-plane x
    pub x: f64,
    /// Floor-plane y
    pub y: f64,
    /// Height
    pub z: f64,
}

impl Point3 {
    /// Builds a point from its coordinates.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// True when no coordinate is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Sub for Point3 {
    type Output = Point3;

    fn sub(self, rhs: Self) -> Self::Output {
        Point3 {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
            z: self.z - rhs.z,
        }
    }
}

impl Display for Point3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}
