//! The control loop: report line in, DMX frame out.
//!
//! ```text
//! DeviceLink -> parse_tag_line -> SmoothingFilter (x, y, z) -> map_position -> LightingBus
//!                                          |
//!                                          +-> Visualizer
//! ```
//!
//! A failed iteration is logged and forgotten; the loop itself only ends
//! when asked to.

use log::{info, warn};
use std::{
    io::{self, Read, Write},
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use crate::config::TrackerConfig;
use crate::device_link::{DeviceLink, LinkState};
use crate::error::TrackerError;
use crate::lighting_frame::LightingBus;
use crate::pan_tilt::{
    actuator_values, map_position, ActuatorValues, Calibration, FixtureProfile, PanTilt,
};
use crate::report_parser::{parse_anchor_roster, parse_tag_line};
use crate::smoothing_filter::SmoothingFilter;
use crate::visualizer::Visualizer;
use crate::Point3;

/// Pause after a failed read, so an unplugged module does not spin the loop.
const READ_RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Counters kept by the loop, mostly for the log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Reports that moved the light
    pub applied: u64,
    /// Lines that were not valid reports
    pub dropped: u64,
    /// Iterations that ended in an error
    pub failed: u64,
}

/// Writes the four actuator values into their channels.
pub fn apply_actuator_values<W: Write>(
    bus: &mut LightingBus<W>,
    profile: &FixtureProfile,
    values: &ActuatorValues,
) {
    bus.set_channel(profile.pan_channel as i64, values.pan_coarse);
    bus.set_channel(profile.pan_fine_channel as i64, values.pan_fine);
    bus.set_channel(profile.tilt_channel as i64, values.tilt_coarse);
    bus.set_channel(profile.tilt_fine_channel as i64, values.tilt_fine);
}

/// Points the fixture at pan 0°, tilt 0° (clamped into its ranges) and
/// sends a single frame. Used to check the wiring to a light.
pub fn send_test_pattern<W: Write>(
    bus: &mut LightingBus<W>,
    profile: &FixtureProfile,
) -> io::Result<ActuatorValues> {
    let angles = PanTilt {
        pan: profile.pan_range.clamp(0.0),
        tilt: profile.tilt_range.clamp(0.0),
    };
    let values = actuator_values(angles, profile);
    info!(
        "sending test values: {}: pan coarse {}, {}: pan fine {}, {}: tilt coarse {}, {}: tilt fine {}",
        profile.pan_channel,
        values.pan_coarse,
        profile.pan_fine_channel,
        values.pan_fine,
        profile.tilt_channel,
        values.tilt_coarse,
        profile.tilt_fine_channel,
        values.tilt_fine
    );
    apply_actuator_values(bus, profile, &values);
    bus.render()?;
    Ok(values)
}

/// Owns every piece of the pipeline. Only this loop touches the filters and
/// the channel frame.
pub struct TrackingLoop<P: Read + Write, W: Write, V: Visualizer> {
    link: DeviceLink<P>,
    bus: LightingBus<W>,
    visualizer: V,
    filters: [SmoothingFilter; 3],
    reference: Point3,
    calibration: Calibration,
    profile: FixtureProfile,
    stats: LoopStats,
}

impl<P: Read + Write, W: Write, V: Visualizer> TrackingLoop<P, W, V> {
    /// Runs the handshake on `link`, publishes the anchor roster, then opens
    /// the lighting bus with `open_bus`. The link is left streaming.
    pub fn start<F>(
        mut link: DeviceLink<P>,
        open_bus: F,
        mut visualizer: V,
        config: &TrackerConfig,
    ) -> Result<Self, TrackerError>
    where
        F: FnOnce() -> Result<LightingBus<W>, TrackerError>,
    {
        config.validate()?;

        if link.state() == LinkState::Connecting {
            link.connect()?;
        }
        let anchors = parse_anchor_roster(link.enumerate_anchors()?);
        info!("found {} anchors", anchors.len());
        for (i, anchor) in anchors.iter().enumerate() {
            info!("anchor {}: {}", i, anchor);
        }
        visualizer.publish_anchor_roster(&anchors);
        link.start_streaming()?;

        let bus = open_bus()?;
        let filters = [
            SmoothingFilter::from_settings(&config.filter),
            SmoothingFilter::from_settings(&config.filter),
            SmoothingFilter::from_settings(&config.filter),
        ];

        Ok(Self {
            link,
            bus,
            visualizer,
            filters,
            reference: config.reference,
            calibration: config.calibration,
            profile: config.profile(),
            stats: LoopStats::default(),
        })
    }

    /// Feeds all three axes from the same report.
    fn filter(&mut self, report: Point3) -> Point3 {
        let [fx, fy, fz] = &mut self.filters;
        fx.observe(report.x);
        fy.observe(report.y);
        fz.observe(report.z);
        Point3::new(
            fx.current_estimate(),
            fy.current_estimate(),
            fz.current_estimate(),
        )
    }

    /// One pass of the loop. `Ok(None)` means the line was not a usable
    /// report and nothing was changed.
    pub fn step(&mut self) -> Result<Option<ActuatorValues>, TrackerError> {
        self.visualizer.flush();
        let line = self.link.next_report_line()?;
        let Some(report) = parse_tag_line(&line) else {
            self.stats.dropped += 1;
            return Ok(None);
        };

        let filtered = self.filter(report);
        self.visualizer.publish_position(filtered);

        let relative = filtered - self.reference;
        let values = map_position(relative, &self.calibration, &self.profile);
        apply_actuator_values(&mut self.bus, &self.profile, &values);
        self.bus.render()?;

        self.stats.applied += 1;
        Ok(Some(values))
    }

    /// Steps until `stop` is raised. Errors are logged and the next report
    /// is read; nothing that happens inside an iteration ends the loop.
    ///
    /// `stop` is only looked at between reports, so a silent module keeps
    /// the loop waiting unless the link has a read timeout.
    pub fn run(&mut self, stop: &AtomicBool) {
        info!("tracking");
        while !stop.load(Ordering::Relaxed) {
            if let Err(e) = self.step() {
                self.stats.failed += 1;
                warn!("report skipped: {}", e);
                if matches!(e, TrackerError::Io(_) | TrackerError::Disconnected) {
                    spin_sleep::sleep(READ_RETRY_BACKOFF);
                }
            }
        }
        info!(
            "tracking stopped: {} applied, {} dropped, {} failed",
            self.stats.applied, self.stats.dropped, self.stats.failed
        );
    }

    /// Counters so far.
    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// The lighting bus the loop writes to.
    pub fn bus(&self) -> &LightingBus<W> {
        &self.bus
    }

    /// The visualizer positions are published to.
    pub fn visualizer(&self) -> &V {
        &self.visualizer
    }

    /// Stops the module's output and hands back the lighting bus.
    pub fn close(mut self) -> Result<LightingBus<W>, TrackerError> {
        self.link.close()?;
        Ok(self.bus)
    }
}
