//! Passing results and latency ranking.

use ip_scout_probe::CountryCode;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

/// An address that answered within the timeout and geolocated to the target
/// country.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassingResult {
    /// The probed address.
    pub ip: IpAddr,
    /// The probed port.
    pub port: u16,
    /// Resolved country code.
    pub country: CountryCode,
    /// Label of the pool the address came from.
    pub pool: String,
    /// Priority of that pool, kept for ranking tie-breaks.
    pub pool_priority: u32,
    /// Latency of the first successful connection attempt.
    pub latency: Duration,
}

/// Report line format: `<ip>:<port>#<country> <pool> <latency_ms>ms`.
impl fmt::Display for PassingResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}#{} {} {}ms",
            self.ip,
            self.port,
            self.country,
            self.pool,
            self.latency.as_millis()
        )
    }
}

/// Sorts results by ascending latency.
///
/// Ties fall back to pool priority (higher-priority pools first) and then to
/// the lexicographic address literal, so identical inputs always rank
/// identically. Ranking an already-ranked slice is a no-op.
pub fn rank(results: &mut [PassingResult]) {
    results.sort_by(|a, b| {
        a.latency
            .cmp(&b.latency)
            .then_with(|| a.pool_priority.cmp(&b.pool_priority))
            .then_with(|| a.ip.to_string().cmp(&b.ip.to_string()))
    });
}
