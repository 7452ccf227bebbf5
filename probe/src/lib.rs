mod candidate;
mod country;
mod error;
mod geo;
mod prober;

pub use candidate::{Candidate, CountryHint};
pub use country::{CountryCode, CountryCodeError};
pub use error::{ProbeError, ResolutionError};
pub use geo::{GeoResolver, HttpGeoResolver, StaticGeoResolver, DEFAULT_GEO_ENDPOINT};
pub use prober::{
    ProbeOutcome, Prober, RetryPolicy, TcpProber, DEFAULT_PROBE_ATTEMPTS, DEFAULT_PROBE_TIMEOUT,
    DEFAULT_RETRY_DELAY,
};
