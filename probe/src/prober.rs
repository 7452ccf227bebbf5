//! Connectivity probing over TCP.

use crate::error::ProbeError;
use log::debug;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Default timeout for a single connection attempt.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// Default number of connection attempts per candidate.
pub const DEFAULT_PROBE_ATTEMPTS: u32 = 3;
/// Default pause between failed attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Retry behavior for probing a single address.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum wait for each connection attempt.
    pub timeout: Duration,
    /// Total number of attempts before giving up.
    pub attempts: u32,
    /// Pause between failed attempts.
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            timeout: DEFAULT_PROBE_TIMEOUT,
            attempts: DEFAULT_PROBE_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Result of probing one address through the retry loop.
#[derive(Debug)]
pub struct ProbeOutcome {
    /// The probed socket address.
    pub addr: SocketAddr,
    /// Latency of the first successful attempt, if any succeeded.
    pub latency: Option<Duration>,
    /// Attempts actually made.
    pub attempts: u32,
    /// The last failure, when no attempt succeeded.
    pub error: Option<ProbeError>,
}

impl ProbeOutcome {
    /// Whether any attempt reached the address.
    pub fn reachable(&self) -> bool {
        self.latency.is_some()
    }
}

/// Connectivity primitive measuring how quickly an address accepts a connection.
///
/// The trait seam lets schedulers run against scripted implementations in
/// tests without touching the network.
pub trait Prober: Clone + Send + Sync + 'static {
    /// One connection attempt against `addr`, returning the measured latency.
    fn connect(
        &self,
        addr: SocketAddr,
        timeout: Duration,
    ) -> impl std::future::Future<Output = Result<Duration, ProbeError>> + Send;

    /// Probes `addr` under the retry policy, recording the latency of the
    /// first successful attempt.
    ///
    /// Exhausting every attempt is not an error at this level; the outcome
    /// simply carries no latency and the last failure for logging.
    fn probe(
        &self,
        addr: SocketAddr,
        policy: RetryPolicy,
    ) -> impl std::future::Future<Output = ProbeOutcome> + Send {
        async move {
            let mut last_error = None;
            for attempt in 1..=policy.attempts {
                match self.connect(addr, policy.timeout).await {
                    Ok(latency) => {
                        debug!(
                            "{addr} answered on attempt {attempt} in {}ms",
                            latency.as_millis()
                        );
                        return ProbeOutcome {
                            addr,
                            latency: Some(latency),
                            attempts: attempt,
                            error: None,
                        };
                    }
                    Err(e) => {
                        debug!("{addr} attempt {attempt} failed: {e}");
                        last_error = Some(e);
                        if attempt < policy.attempts {
                            tokio::time::sleep(policy.retry_delay).await;
                        }
                    }
                }
            }
            ProbeOutcome {
                addr,
                latency: None,
                attempts: policy.attempts,
                error: last_error,
            }
        }
    }
}

/// TCP prober backed by tokio's connector.
///
/// The connection is dropped as soon as it is established; only the time to
/// an accepted connection is measured.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpProber;

impl Prober for TcpProber {
    async fn connect(&self, addr: SocketAddr, limit: Duration) -> Result<Duration, ProbeError> {
        let start = Instant::now();
        match timeout(limit, TcpStream::connect(addr)).await {
            Ok(Ok(_stream)) => Ok(start.elapsed()),
            Ok(Err(e)) => Err(ProbeError::Io(e)),
            Err(_) => Err(ProbeError::TimedOut),
        }
    }
}
