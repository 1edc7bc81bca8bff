//! The error type shared by the tracking pipeline.

use std::{borrow::Cow, fmt, io};

use crate::device_link::LinkState;
use crate::gui::GuiError;

/// Everything that can go wrong between the UWB module and the lighting bus.
///
/// Only [`TrackerError::PortOpen`], [`TrackerError::UnknownFixture`],
/// [`TrackerError::InvalidProfile`] and [`TrackerError::Config`] are fatal,
/// and only before tracking starts. Inside the loop every variant is logged
/// and the next report is read.
#[derive(Debug)]
pub enum TrackerError {
    /// A read or write on one of the serial sessions failed.
    Io(io::Error),

    /// A serial port could not be opened.
    PortOpen {
        /// The device path that was requested
        path: String,
        /// Why the open failed
        source: io::Error,
    },

    /// The fixture name did not match any entry in the registry.
    UnknownFixture(String),

    /// A fixture profile failed validation.
    InvalidProfile(String),

    /// The UWB module stopped producing bytes.
    Disconnected,

    /// A [`crate::device_link::DeviceLink`] operation was called out of order.
    InvalidState {
        /// The state the operation needs
        expected: LinkState,
        /// The state the link was actually in
        actual: LinkState,
    },

    /// The configuration file could not be read or understood.
    Config(String),

    /// The terminal interface failed.
    Gui(GuiError),

    /// The tracking thread panicked.
    JoinError,
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use TrackerError as TE;
        let msg = match self {
            TE::Io(error) => Cow::from(format!("io error: {}", error)),
            TE::PortOpen { path, source } => {
                Cow::from(format!("could not open serial port {}: {}", path, source))
            }
            TE::UnknownFixture(name) => Cow::from(format!(
                "unknown fixture '{}', expected one of {:?}",
                name,
                crate::pan_tilt::Fixture::NAMES
            )),
            TE::InvalidProfile(reason) => Cow::from(format!("invalid fixture profile: {}", reason)),
            TE::Disconnected => Cow::from("uwb module disconnected"),
            TE::InvalidState { expected, actual } => Cow::from(format!(
                "device link is {:?}, operation needs {:?}",
                actual, expected
            )),
            TE::Config(reason) => Cow::from(format!("config error: {}", reason)),
            TE::Gui(error) => Cow::from(format!("gui error: {}", error)),
            TE::JoinError => Cow::from("tracking thread panicked"),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for TrackerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TrackerError::Io(error) => Some(error),
            TrackerError::PortOpen { source, .. } => Some(source),
            TrackerError::Gui(error) => Some(error),
            _ => None,
        }
    }
}

impl From<io::Error> for TrackerError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<ron::error::SpannedError> for TrackerError {
    fn from(value: ron::error::SpannedError) -> Self {
        Self::Config(value.to_string())
    }
}

impl From<GuiError> for TrackerError {
    fn from(value: GuiError) -> Self {
        Self::Gui(value)
    }
}
