use std::{error::Error, fmt::Display, io};

/// Failures of the terminal interface.
#[derive(Debug)]
pub enum GuiError {
    /// The terminal could not be drawn to or read from
    IOError(io::Error),
    /// There was nothing to choose from
    NoPorts,
}

impl Display for GuiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuiError::IOError(e) => write!(f, "terminal io failed: {}", e),
            GuiError::NoPorts => write!(f, "no serial ports found"),
        }
    }
}

impl Error for GuiError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            GuiError::IOError(e) => Some(e),
            GuiError::NoPorts => None,
        }
    }
}

impl From<io::Error> for GuiError {
    fn from(value: io::Error) -> Self {
        Self::IOError(value)
    }
}
