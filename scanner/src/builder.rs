//! Builder pattern for configuring and creating scanner instances.

use crate::pool::{AddressSource, Pool};
use crate::scanner::{ScanConfig, Scanner};
use ip_scout_probe::{CountryCode, GeoResolver, Prober, RetryPolicy};
use std::fmt;

/// Default number of passing results a scan looks for.
const DEFAULT_TARGET_COUNT: usize = 10;
/// Default port probed on candidates without a pinned port.
const DEFAULT_PORT: u16 = 443;
/// Default bound on candidates taken from a single pool.
const DEFAULT_PER_POOL_CAP: usize = 512;
/// Default number of concurrent probe workers.
const DEFAULT_CONCURRENCY: usize = 32;

/// Errors that can occur during scanner configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScannerBuilderError {
    /// A scan needs at least one pool to draw from.
    NoPools,
    /// A scan for zero results would never probe anything.
    ZeroTargetCount,
    /// At least one probe worker is required.
    ZeroConcurrency,
    /// The retry policy must allow at least one attempt.
    ZeroAttempts,
}

impl fmt::Display for ScannerBuilderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScannerBuilderError::NoPools => {
                write!(f, "At least one pool must be supplied")
            }
            ScannerBuilderError::ZeroTargetCount => {
                write!(f, "Target count must be at least one")
            }
            ScannerBuilderError::ZeroConcurrency => {
                write!(f, "Concurrency must be at least one worker")
            }
            ScannerBuilderError::ZeroAttempts => {
                write!(f, "Retry policy must allow at least one attempt")
            }
        }
    }
}

impl std::error::Error for ScannerBuilderError {}

/// Builder for creating a configured [`Scanner`] instance.
///
/// # Example
///
/// ```
/// use ip_scout_scanner::{
///     Candidate, CountryCode, Pool, ScannerBuilder, StaticGeoResolver, StaticListSource,
///     TcpProber,
/// };
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let country = CountryCode::new("us")?;
/// let candidate = Candidate::new("203.0.113.7".parse::<std::net::IpAddr>()?);
/// let pools = vec![Pool::new("official", 0, StaticListSource::new(vec![candidate]))];
///
/// let scanner = ScannerBuilder::new(country)
///     .with_target_count(5)
///     .with_port(443)
///     .with_concurrency(16)
///     .build(pools, TcpProber, StaticGeoResolver::default())?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ScannerBuilder {
    /// Country the scan is hunting for.
    target_country: CountryCode,
    /// Number of passing results to collect.
    target_count: usize,
    /// Port probed on candidates without a pinned port.
    port: u16,
    /// Bound on candidates taken from a single pool.
    per_pool_cap: usize,
    /// Number of concurrent probe workers.
    concurrency: usize,
    /// Per-candidate retry behavior.
    retry: RetryPolicy,
}

impl ScannerBuilder {
    /// Create a builder hunting for addresses in `target_country`.
    ///
    /// # Arguments
    ///
    /// * `target_country` - The country passing results must geolocate to.
    ///
    /// # Returns
    ///
    /// A new `ScannerBuilder` instance with default tuning.
    pub fn new(target_country: CountryCode) -> Self {
        ScannerBuilder {
            target_country,
            target_count: DEFAULT_TARGET_COUNT,
            port: DEFAULT_PORT,
            per_pool_cap: DEFAULT_PER_POOL_CAP,
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
        }
    }

    /// Set how many passing results the scan should collect.
    ///
    /// # Arguments
    ///
    /// * `count` - Number of results to hunt for (defaults to 10).
    ///
    /// # Returns
    ///
    /// Self for method chaining.
    pub fn with_target_count(mut self, count: usize) -> Self {
        self.target_count = count;
        self
    }

    /// Set the port probed on candidates without a pinned port.
    ///
    /// # Arguments
    ///
    /// * `port` - The port to probe (defaults to 443).
    ///
    /// # Returns
    ///
    /// Self for method chaining.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Bound the candidates taken from any single pool.
    ///
    /// # Arguments
    ///
    /// * `cap` - Maximum candidates probed per pool (defaults to 512).
    ///
    /// # Returns
    ///
    /// Self for method chaining.
    pub fn with_per_pool_cap(mut self, cap: usize) -> Self {
        self.per_pool_cap = cap;
        self
    }

    /// Set the number of concurrent probe workers.
    ///
    /// Controls how many candidates are tested simultaneously within a
    /// pool. Higher values speed up a scan, but increase network load and
    /// widen the bounded overshoot past the target count.
    ///
    /// # Recommendations
    ///
    /// * **Conservative (4-8)** - Slow links or rate-limited environments.
    /// * **Default (32)** - Good balance for most use cases.
    /// * **Aggressive (64-128)** - Fast scans with ample resources.
    ///
    /// # Arguments
    ///
    /// * `concurrency` - Maximum in-flight probes (defaults to 32).
    ///
    /// # Returns
    ///
    /// Self for method chaining.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Replace the per-candidate retry policy.
    ///
    /// # Arguments
    ///
    /// * `retry` - Timeout, attempt count, and inter-attempt delay.
    ///
    /// # Returns
    ///
    /// Self for method chaining.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Build a scanner over `pools` with the given prober and resolver.
    ///
    /// Pools are stable-sorted by priority here, so declaration order breaks
    /// ties and the traversal order never changes during a run.
    /// Configuration problems fail fast, before any network work starts.
    ///
    /// # Arguments
    ///
    /// * `pools` - The pools to traverse, any order.
    /// * `prober` - Connectivity primitive used on every candidate.
    /// * `resolver` - Geolocation lookup for candidates without a hint.
    ///
    /// # Returns
    ///
    /// * `Ok(Scanner)` - A scanner ready to run.
    /// * `Err(ScannerBuilderError)` - If the configuration cannot probe.
    pub fn build<S, P, G>(
        self,
        mut pools: Vec<Pool<S>>,
        prober: P,
        resolver: G,
    ) -> Result<Scanner<S, P, G>, ScannerBuilderError>
    where
        S: AddressSource,
        P: Prober,
        G: GeoResolver,
    {
        if pools.is_empty() {
            return Err(ScannerBuilderError::NoPools);
        }
        if self.target_count == 0 {
            return Err(ScannerBuilderError::ZeroTargetCount);
        }
        if self.concurrency == 0 {
            return Err(ScannerBuilderError::ZeroConcurrency);
        }
        if self.retry.attempts == 0 {
            return Err(ScannerBuilderError::ZeroAttempts);
        }

        pools.sort_by_key(|pool| pool.priority);

        Ok(Scanner {
            config: ScanConfig {
                target_country: self.target_country,
                target_count: self.target_count,
                port: self.port,
                per_pool_cap: self.per_pool_cap,
                concurrency: self.concurrency,
                retry: self.retry,
            },
            pools,
            prober,
            resolver,
        })
    }
}
