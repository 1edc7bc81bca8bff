//! A fake UWB positioning module for running the whole pipeline without
//! hardware.
//!
//! [`DummyUwb`] implements [`Read`] and [`Write`] the way the real module's
//! serial shell does: `la` is answered with an anchor roster, `lec` starts a
//! stream of `POS` lines for a tag walking in a circle around the anchors,
//! and a bare carriage return stops the stream.

use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{
    collections::VecDeque,
    f64::consts::PI,
    io::{self, Read, Write},
    time::Duration,
};

use crate::report_parser::AnchorPosition;
use crate::Point3;

/// The fake module. Build one with [`DummyUwb::builder`].
pub struct DummyUwb {
    anchors: Vec<AnchorPosition>,
    radius: f64,
    height: f64,
    noise: f64,
    step: f64,
    dropout: f64,
    interval: Duration,
    rng: StdRng,

    angle: f64,
    clock: f64,
    streaming: bool,
    command: Vec<u8>,
    output: VecDeque<u8>,
}

/// Configures a [`DummyUwb`].
pub struct DummyUwbBuilder {
    anchors: Vec<AnchorPosition>,
    radius: f64,
    height: f64,
    noise: f64,
    step: f64,
    dropout: f64,
    interval: Duration,
    seed: Option<u64>,
}

impl Default for DummyUwbBuilder {
    fn default() -> Self {
        Self {
            anchors: vec![
                Point3::new(0.0, 0.0, 2.5),
                Point3::new(8.0, 0.0, 2.5),
                Point3::new(8.0, 6.0, 2.5),
                Point3::new(0.0, 6.0, 2.5),
            ],
            radius: 2.0,
            height: 1.2,
            noise: 0.05,
            step: PI / 60.0,
            dropout: 0.02,
            interval: Duration::from_millis(100),
            seed: None,
        }
    }
}

impl DummyUwbBuilder {
    /// Anchors reported in answer to `la`.
    pub fn anchors(mut self, anchors: Vec<AnchorPosition>) -> Self {
        self.anchors = anchors;
        self
    }

    /// Radius of the tag's walk, in metres.
    pub fn radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    /// Height the tag is carried at.
    pub fn height(mut self, height: f64) -> Self {
        self.height = height;
        self
    }

    /// Half-width of the uniform noise added to every coordinate.
    pub fn noise(mut self, noise: f64) -> Self {
        self.noise = noise;
        self
    }

    /// Angle the tag advances per report, in radians.
    pub fn step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    /// Probability that a report comes out as `nan`.
    pub fn dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout.clamp(0.0, 1.0);
        self
    }

    /// Time between reports. A real module reports at 10 Hz.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Fixes the noise sequence.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds the fake module, idle and waiting for commands.
    pub fn build(self) -> DummyUwb {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        DummyUwb {
            anchors: self.anchors,
            radius: self.radius,
            height: self.height,
            noise: self.noise,
            step: self.step,
            dropout: self.dropout,
            interval: self.interval,
            rng,
            angle: 0.0,
            clock: 10.0,
            streaming: false,
            command: Vec::new(),
            output: VecDeque::new(),
        }
    }
}

impl DummyUwb {
    /// A builder with four anchors on a 8 x 6 m stage.
    pub fn builder() -> DummyUwbBuilder {
        DummyUwbBuilder::default()
    }

    /// Whether `lec` has been received and not yet stopped.
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// The tag's true position for the current step.
    pub fn true_position(&self) -> Point3 {
        let centre = self.centre();
        Point3::new(
            centre.x + self.radius * self.angle.cos(),
            centre.y + self.radius * self.angle.sin(),
            self.height,
        )
    }

    fn centre(&self) -> Point3 {
        if self.anchors.is_empty() {
            return Point3::default();
        }
        let n = self.anchors.len() as f64;
        let (x, y) = self
            .anchors
            .iter()
            .fold((0.0, 0.0), |(x, y), a| (x + a.x, y + a.y));
        Point3::new(x / n, y / n, 0.0)
    }

    fn say(&mut self, line: &str) {
        self.clock += 0.01;
        let stamped = format!("[{:010.3} INF] {}\r\n", self.clock, line);
        self.output.extend(stamped.bytes());
    }

    fn list_anchors(&mut self) {
        self.output.extend(b"la\r\n".iter());
        let lines: Vec<String> = self
            .anchors
            .iter()
            .enumerate()
            .map(|(i, a)| {
                format!(
                    "  {}) id={:016X} seat={} seens=0 rssi=-255 fl=0000 pos={:.2}:{:.2}:{:.2}",
                    i,
                    0x1A2B + i,
                    i,
                    a.x,
                    a.y,
                    a.z
                )
            })
            .collect();
        for line in lines {
            self.say(&line);
        }
        let count = format!("N={}", self.anchors.len());
        self.say(&count);
        self.say("");
    }

    fn run_command(&mut self, command: &[u8]) {
        match command {
            b"la" => self.list_anchors(),
            b"lec" => self.streaming = true,
            b"" if self.streaming => self.streaming = false,
            b"" => {}
            other => {
                let echoed = format!("unknown command {}", String::from_utf8_lossy(other));
                self.say(&echoed);
            }
        }
    }

    fn next_report(&mut self) {
        self.angle = (self.angle + self.step) % (2.0 * PI);
        let line = if self.rng.gen_bool(self.dropout) {
            "POS,0,1A2F,nan,nan,nan,0,x00\r\n".to_owned()
        } else {
            let p = self.true_position();
            let mut jitter = || {
                if self.noise > 0.0 {
                    self.rng.gen_range(-self.noise..self.noise)
                } else {
                    0.0
                }
            };
            let (x, y, z) = (p.x + jitter(), p.y + jitter(), p.z + jitter());
            format!("POS,0,1A2F,{:.2},{:.2},{:.2},97,x0C\r\n", x, y, z)
        };
        self.output.extend(line.bytes());
    }
}

impl Write for DummyUwb {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &c in buf {
            if c == b'\r' {
                let command = std::mem::take(&mut self.command);
                self.run_command(&command);
            } else {
                self.command.push(c);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for DummyUwb {
    /// Returns `Ok(0)` when the module is idle and has nothing left to say,
    /// the same as an unplugged port.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.output.is_empty() && self.streaming {
            if !self.interval.is_zero() {
                spin_sleep::sleep(self.interval);
            }
            self.next_report();
        }
        let n = buf.len().min(self.output.len());
        for (slot, byte) in buf.iter_mut().zip(self.output.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device_link::{tests::instant, DeviceLink};
    use crate::report_parser::{parse_anchor_roster, parse_tag_line};

    fn quiet() -> DummyUwb {
        DummyUwb::builder()
            .interval(Duration::ZERO)
            .dropout(0.0)
            .noise(0.0)
            .seed(7)
            .build()
    }

    #[test]
    fn answers_the_handshake() {
        let mut link = DeviceLink::new(quiet(), instant());
        link.connect().unwrap();
        let lines = link.enumerate_anchors().unwrap().to_vec();
        let anchors = parse_anchor_roster(&lines);
        assert_eq!(anchors.len(), 4);
        assert_eq!(anchors[2], Point3::new(8.0, 6.0, 2.5));

        link.start_streaming().unwrap();
        assert!(link.port().is_streaming());
        let line = link.next_report_line().unwrap();
        let pos = parse_tag_line(&line).unwrap();
        assert!((pos.z - 1.2).abs() < 1e-9);

        link.close().unwrap();
        assert!(!link.port().is_streaming());
    }

    #[test]
    fn reports_follow_the_circle() {
        let mut uwb = quiet();
        uwb.write_all(b"lec\r").unwrap();
        let mut buf = [0; 64];
        let n = uwb.read(&mut buf).unwrap();
        let pos = parse_tag_line(&buf[..n]).unwrap();
        let truth = uwb.true_position();
        assert!((pos.x - truth.x).abs() < 0.01);
        assert!((pos.y - truth.y).abs() < 0.01);
    }

    #[test]
    fn dropouts_are_nan() {
        let mut uwb = DummyUwb::builder()
            .interval(Duration::ZERO)
            .dropout(1.0)
            .build();
        uwb.write_all(b"lec\r").unwrap();
        let mut buf = [0; 64];
        let n = uwb.read(&mut buf).unwrap();
        assert_eq!(parse_tag_line(&buf[..n]), None);
    }

    #[test]
    fn idle_module_reads_empty() {
        let mut uwb = quiet();
        let mut buf = [0; 16];
        assert_eq!(uwb.read(&mut buf).unwrap(), 0);
    }
}
