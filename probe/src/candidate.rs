//! Candidate address structures.

use crate::country::CountryCode;
use std::net::IpAddr;

/// Geolocation knowledge a source attaches to a candidate.
///
/// Some list formats carry a country code alongside each entry; when present
/// it spares the scheduler a lookup against the resolution service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CountryHint {
    /// The source data included a country code for this address.
    Known(CountryCode),
    /// No embedded geolocation; a lookup is required.
    Unknown,
}

/// A candidate address produced by an address source.
///
/// Candidates are immutable once produced; the scheduler only reads them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Candidate {
    /// The address to probe.
    pub ip: IpAddr,
    /// Port pinned by the source data, overriding the scan port.
    pub port: Option<u16>,
    /// Country code embedded in the source data, if any.
    pub country: CountryHint,
}

impl Candidate {
    /// Create a candidate with no pinned port and no country hint.
    pub fn new(ip: IpAddr) -> Self {
        Candidate {
            ip,
            port: None,
            country: CountryHint::Unknown,
        }
    }

    /// Returns the candidate with a port pinned by its source.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Returns the candidate with an embedded country code.
    pub fn with_country(mut self, country: CountryCode) -> Self {
        self.country = CountryHint::Known(country);
        self
    }
}
