//! The serial session with the UWB positioning module.
//!
//! The module is driven through its text shell. A session goes through
//!
//! ```text
//! Connecting -> EnumeratingAnchors -> Streaming -> Closed
//! ```
//!
//! During enumeration the module is asked for its anchor roster (`la`),
//! whose output ends with an empty `INF]` line. Then it is switched into
//! continuous position output (`lec`), after which every line it prints is
//! a tag report. Any state can be closed, which stops the output again.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serial2::SerialPort;
use std::{
    io::{self, ErrorKind, Read, Write},
    path::Path,
    time::Duration,
};

use crate::error::TrackerError;

/// Baud rate of the UWB module's shell.
pub const UWB_BAUD_RATE: u32 = 115200;

/// Lists the anchors the module knows about.
pub const LIST_ANCHORS: &[u8] = b"la\r\r";
/// An empty command, used to flush the shell.
pub const FLUSH: &[u8] = b"\r\r";
/// Enters continuous position output.
pub const CONTINUOUS_MODE: &[u8] = b"lec\r";
/// Stops continuous output.
pub const STOP: &[u8] = b"\r";
/// Ends every block of shell output.
pub const INFO_TERMINATOR: &[u8] = b"INF] \r\n";

const READ_CHUNK: usize = 256;
/// Longest run of bytes without a `\n` kept while waiting for the line end.
pub const MAX_LINE_LEN: usize = 4096;

/// Where a [`DeviceLink`] is in its handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// The port is open, the module may still be booting
    Connecting,
    /// Waiting for, or reading, the anchor roster
    EnumeratingAnchors,
    /// Tag reports are flowing
    Streaming,
    /// The stop command was sent
    Closed,
}

/// Timing of the serial session.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LinkSettings {
    /// How long the module gets to act on a command before the next one
    pub settle_delay: Duration,
    /// Upper bound on one serial read. `None` waits forever.
    pub read_timeout: Option<Duration>,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(1),
            read_timeout: None,
        }
    }
}

/// Anything a [`DeviceLink`] can talk through.
pub trait SerialIo: Read + Write + Send {}

impl<T: Read + Write + Send> SerialIo for T {}

/// Opens a serial port, mapping failure to the fatal
/// [`TrackerError::PortOpen`].
///
/// A `read_timeout` of `None` sets the timeout to [`Duration::MAX`], which
/// is as good as blocking forever.
pub fn open_port(
    path: impl AsRef<Path>,
    baud_rate: u32,
    read_timeout: Option<Duration>,
) -> Result<SerialPort, TrackerError> {
    let path = path.as_ref();
    let port_open_error = |source| TrackerError::PortOpen {
        path: path.to_string_lossy().into_owned(),
        source,
    };
    let mut port = SerialPort::open(path, baud_rate).map_err(port_open_error)?;
    port.set_read_timeout(read_timeout.unwrap_or(Duration::MAX))
        .map_err(port_open_error)?;
    Ok(port)
}

/// The UWB module's serial session.
pub struct DeviceLink<P: Read + Write> {
    port: P,
    state: LinkState,
    settings: LinkSettings,
    enumeration: Vec<String>,
    pending: Vec<u8>,
}

impl DeviceLink<SerialPort> {
    /// Opens the module's port and waits for it to settle.
    pub fn open(path: impl AsRef<Path>, settings: LinkSettings) -> Result<Self, TrackerError> {
        let port = open_port(path.as_ref(), UWB_BAUD_RATE, settings.read_timeout)?;
        info!("connected to {}", path.as_ref().to_string_lossy());
        let mut link = DeviceLink::new(port, settings);
        link.connect()?;
        Ok(link)
    }
}

impl<P: Read + Write> DeviceLink<P> {
    /// Wraps an already opened port. The link starts out
    /// [`LinkState::Connecting`].
    pub fn new(port: P, settings: LinkSettings) -> Self {
        Self {
            port,
            state: LinkState::Connecting,
            settings,
            enumeration: Vec::new(),
            pending: Vec::with_capacity(READ_CHUNK),
        }
    }

    /// Where the handshake is.
    pub fn state(&self) -> LinkState {
        self.state
    }

    fn expect_state(&self, expected: LinkState) -> Result<(), TrackerError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(TrackerError::InvalidState {
                expected,
                actual: self.state,
            })
        }
    }

    fn settle(&self) {
        if !self.settings.settle_delay.is_zero() {
            spin_sleep::sleep(self.settings.settle_delay);
        }
    }

    fn send_command(&mut self, command: &[u8]) -> io::Result<()> {
        self.port.write_all(command)?;
        self.port.flush()
    }

    /// Reads up to and including the next `\n`.
    fn read_line(&mut self) -> Result<Vec<u8>, TrackerError> {
        let mut chunk = [0; READ_CHUNK];
        loop {
            if let Some(end) = self.pending.iter().position(|&c| c == b'\n') {
                return Ok(self.pending.drain(..=end).collect());
            }
            match self.port.read(&mut chunk) {
                Ok(0) => return Err(TrackerError::Disconnected),
                Ok(n) => {
                    self.pending.extend_from_slice(&chunk[..n]);
                    if self.pending.len() > MAX_LINE_LEN
                        && !self.pending.contains(&b'\n')
                    {
                        warn!(
                            "discarding {} bytes with no line end, is the baud rate right?",
                            self.pending.len()
                        );
                        self.pending.clear();
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Lets the freshly opened module settle, then moves on to enumeration.
    pub fn connect(&mut self) -> Result<(), TrackerError> {
        self.expect_state(LinkState::Connecting)?;
        self.settle();
        self.state = LinkState::EnumeratingAnchors;
        Ok(())
    }

    /// Asks the module for its anchor roster and collects the output lines,
    /// stripped of their line endings, up to the terminating `INF]` line.
    pub fn enumerate_anchors(&mut self) -> Result<&[String], TrackerError> {
        self.expect_state(LinkState::EnumeratingAnchors)?;
        self.send_command(LIST_ANCHORS)?;
        self.settle();
        self.send_command(FLUSH)?;

        self.enumeration.clear();
        loop {
            let line = self.read_line()?;
            if line.ends_with(INFO_TERMINATOR) {
                break;
            }
            let decoded = String::from_utf8_lossy(&line)
                .trim_matches(|c: char| c == '\r' || c == '\n')
                .to_owned();
            debug!("raw la ({})", decoded);
            self.enumeration.push(decoded);
        }
        info!("enumeration returned {} lines", self.enumeration.len());
        Ok(&self.enumeration)
    }

    /// The lines collected by the last [`DeviceLink::enumerate_anchors`].
    pub fn read_enumeration_lines(&self) -> &[String] {
        &self.enumeration
    }

    /// Switches the module into continuous position output.
    pub fn start_streaming(&mut self) -> Result<(), TrackerError> {
        self.expect_state(LinkState::EnumeratingAnchors)?;
        self.send_command(CONTINUOUS_MODE)?;
        self.settle();
        self.state = LinkState::Streaming;
        info!("uwb module streaming");
        Ok(())
    }

    /// Blocks until the module prints its next report line and returns it
    /// raw, line ending included.
    pub fn next_report_line(&mut self) -> Result<Vec<u8>, TrackerError> {
        self.expect_state(LinkState::Streaming)?;
        self.read_line()
    }

    /// The report stream as an endless iterator.
    pub fn report_lines(&mut self) -> ReportLines<'_, P> {
        ReportLines { link: self }
    }

    /// Stops the module's output. Closing a closed link does nothing.
    pub fn close(&mut self) -> Result<(), TrackerError> {
        if self.state == LinkState::Closed {
            return Ok(());
        }
        self.state = LinkState::Closed;
        self.send_command(STOP)?;
        info!("uwb session closed");
        Ok(())
    }

    /// The underlying port.
    pub fn port(&self) -> &P {
        &self.port
    }
}

impl<P: Read + Write> Drop for DeviceLink<P> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("could not stop the uwb module: {}", e);
        }
    }
}

/// Report lines pulled one blocking read at a time. Never ends on its own.
pub struct ReportLines<'a, P: Read + Write> {
    link: &'a mut DeviceLink<P>,
}

impl<'a, P: Read + Write> Iterator for ReportLines<'a, P> {
    type Item = Result<Vec<u8>, TrackerError>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.link.next_report_line())
    }
}
