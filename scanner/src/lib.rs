mod builder;
mod pool;
mod result;
mod scanner;
mod session;
mod source;

pub use builder::{ScannerBuilder, ScannerBuilderError};
pub use pool::{AddressSource, Pool};
pub use result::{rank, PassingResult};
pub use scanner::{ScanReport, Scanner};
pub use source::{FetchError, HttpListSource, ListFormat, StaticListSource, DEFAULT_SAMPLE_LIMIT};

// Re-exports.
pub use ip_scout_probe::{
    Candidate, CountryCode, CountryCodeError, CountryHint, GeoResolver, HttpGeoResolver, Prober,
    RetryPolicy, StaticGeoResolver, TcpProber,
};
