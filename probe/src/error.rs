//! Error types for probing and geolocation.

use std::error::Error;
use std::fmt;
use std::io;

/// Errors from a single connectivity attempt.
#[derive(Debug)]
pub enum ProbeError {
    /// The connection attempt did not complete within the timeout.
    TimedOut,
    /// An I/O error occurred while connecting.
    Io(io::Error),
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::TimedOut => write!(f, "Connection attempt timed out"),
            ProbeError::Io(err) => write!(f, "Probe error: {err}"),
        }
    }
}

impl Error for ProbeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ProbeError::TimedOut => None,
            ProbeError::Io(err) => Some(err),
        }
    }
}

impl From<io::Error> for ProbeError {
    fn from(err: io::Error) -> Self {
        ProbeError::Io(err)
    }
}

/// Errors from a geolocation lookup.
#[derive(Debug)]
pub enum ResolutionError {
    /// The lookup request failed at the transport level.
    Http(reqwest::Error),
    /// The lookup service answered with a non-success status.
    Status(u16),
    /// The lookup response could not be parsed into a country code.
    Malformed,
    /// The resolver holds no data for this address.
    Unknown,
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionError::Http(err) => write!(f, "Geolocation lookup failed: {err}"),
            ResolutionError::Status(status) => {
                write!(f, "Geolocation service answered with status {status}")
            }
            ResolutionError::Malformed => {
                write!(f, "Geolocation response did not carry a usable country code")
            }
            ResolutionError::Unknown => write!(f, "No geolocation data for this address"),
        }
    }
}

impl Error for ResolutionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ResolutionError::Http(err) => Some(err),
            ResolutionError::Status(_) => None,
            ResolutionError::Malformed => None,
            ResolutionError::Unknown => None,
        }
    }
}

impl From<reqwest::Error> for ResolutionError {
    fn from(err: reqwest::Error) -> Self {
        ResolutionError::Http(err)
    }
}
