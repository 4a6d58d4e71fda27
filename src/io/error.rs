// src/io/error.rs
//
// Typed IO errors with device context. Startup failures (open/bind) are
// fatal; read/write errors carry enough context for the log line that
// precedes removal or shutdown.

use std::fmt;

/// IO error with the device or address it occurred on.
///
/// Use `.map_err(String::from)` at boundaries that want a plain String.
#[derive(Debug, Clone)]
pub enum IoError {
    /// Failed to open the serial device.
    Open { device: String, reason: String },
    /// Failed to bind the listening socket.
    Bind { addr: String, reason: String },
    /// Read failure on an open transport.
    Read { device: String, reason: String },
    /// Write failure on an open transport.
    Write { device: String, reason: String },
}

impl IoError {
    pub fn open(device: &str, reason: impl Into<String>) -> Self {
        IoError::Open {
            device: device.to_string(),
            reason: reason.into(),
        }
    }

    pub fn bind(addr: &str, reason: impl Into<String>) -> Self {
        IoError::Bind {
            addr: addr.to_string(),
            reason: reason.into(),
        }
    }

    pub fn read(device: &str, reason: impl Into<String>) -> Self {
        IoError::Read {
            device: device.to_string(),
            reason: reason.into(),
        }
    }

    pub fn write(device: &str, reason: impl Into<String>) -> Self {
        IoError::Write {
            device: device.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoError::Open { device, reason } => {
                write!(f, "Failed to open {}: {}", device, reason)
            }
            IoError::Bind { addr, reason } => {
                write!(f, "Failed to bind {}: {}", addr, reason)
            }
            IoError::Read { device, reason } => {
                write!(f, "Read error on {}: {}", device, reason)
            }
            IoError::Write { device, reason } => {
                write!(f, "Write error on {}: {}", device, reason)
            }
        }
    }
}

impl std::error::Error for IoError {}

impl From<IoError> for String {
    fn from(e: IoError) -> String {
        e.to_string()
    }
}
