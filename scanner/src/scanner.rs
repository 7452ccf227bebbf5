//! Pool traversal and the scan entry point.

use crate::pool::{AddressSource, Pool};
use crate::result::{rank, PassingResult};
use crate::session::{ProbeSession, SessionConfig};
use ip_scout_probe::{CountryCode, GeoResolver, Prober, RetryPolicy};
use log::info;
use std::collections::HashSet;
use std::net::IpAddr;

/// Aggregate configuration for a scan, assembled by the builder.
#[derive(Debug, Clone)]
pub(crate) struct ScanConfig {
    pub target_country: CountryCode,
    pub target_count: usize,
    pub port: u16,
    pub per_pool_cap: usize,
    pub concurrency: usize,
    pub retry: RetryPolicy,
}

/// Outcome of a full traversal.
///
/// `results` is ranked by latency and capped at the requested count. A
/// short list is a valid outcome, not a failure; the counters say how the
/// run went.
#[derive(Debug)]
pub struct ScanReport {
    /// Passing results, fastest first, at most the requested count.
    pub results: Vec<PassingResult>,
    /// The count the scan was asked for.
    pub target_count: usize,
    /// Candidates actually probed across all pools.
    pub probed: usize,
    /// Passing results found, including any beyond the requested count.
    pub passing: usize,
    /// Candidates that never answered.
    pub unreachable: usize,
    /// Reachable candidates outside the target country.
    pub wrong_country: usize,
    /// Reachable candidates whose country could not be determined.
    pub unresolved: usize,
    /// Pools whose sources were asked for candidates.
    pub pools_fetched: usize,
}

impl ScanReport {
    /// Whether the scan found as many results as requested.
    pub fn fulfilled(&self) -> bool {
        self.results.len() >= self.target_count
    }
}

/// Traverses pools in priority order, probing until the target is met.
///
/// Created through [`ScannerBuilder`](crate::ScannerBuilder), which fixes
/// the pool order and validates the configuration up front.
#[derive(Debug)]
pub struct Scanner<S, P, G> {
    pub(crate) config: ScanConfig,
    pub(crate) pools: Vec<Pool<S>>,
    pub(crate) prober: P,
    pub(crate) resolver: G,
}

impl<S: AddressSource, P: Prober, G: GeoResolver> Scanner<S, P, G> {
    /// Runs the traversal to completion.
    ///
    /// Pools are visited strictly in priority order, one at a time. Once
    /// enough passing results have accumulated, the remaining pools are
    /// skipped without even fetching their lists. Exhausting every pool
    /// short of the target is a normal return.
    pub async fn scan(&self) -> ScanReport {
        let target = self.config.target_count;
        let mut tried: HashSet<IpAddr> = HashSet::new();
        let mut accumulated: Vec<PassingResult> = Vec::new();
        let mut report = ScanReport {
            results: Vec::new(),
            target_count: target,
            probed: 0,
            passing: 0,
            unreachable: 0,
            wrong_country: 0,
            unresolved: 0,
            pools_fetched: 0,
        };

        for pool in &self.pools {
            if accumulated.len() >= target {
                info!("target of {target} reached, skipping remaining pools");
                break;
            }

            info!("fetching pool {} (priority {})", pool.name, pool.priority);
            report.pools_fetched += 1;
            let fetched = pool.source.fetch(self.config.port).await;
            if fetched.is_empty() {
                info!("pool {} yielded no candidates, moving on", pool.name);
                continue;
            }

            // Addresses a higher-priority pool already probed are redundant
            // here; drop them before capping.
            let mut candidates = Vec::new();
            for candidate in fetched {
                if candidates.len() >= self.config.per_pool_cap {
                    break;
                }
                if tried.insert(candidate.ip) {
                    candidates.push(candidate);
                }
            }
            if candidates.is_empty() {
                info!(
                    "pool {} held only already-probed addresses, moving on",
                    pool.name
                );
                continue;
            }

            let remaining = target - accumulated.len();
            info!(
                "probing {} candidates from {} for {} more results",
                candidates.len(),
                pool.name,
                remaining
            );

            let session = ProbeSession::new(
                SessionConfig {
                    target_country: self.config.target_country.clone(),
                    port: self.config.port,
                    concurrency: self.config.concurrency,
                    retry: self.config.retry,
                },
                pool.name.clone(),
                pool.priority,
                self.prober.clone(),
                self.resolver.clone(),
            );
            let outcome = session.run(candidates, remaining).await;

            info!(
                "pool {} contributed {} passing results ({} probed)",
                pool.name,
                outcome.results.len(),
                outcome.probed
            );
            report.probed += outcome.probed;
            report.unreachable += outcome.unreachable;
            report.wrong_country += outcome.wrong_country;
            report.unresolved += outcome.unresolved;
            accumulated.extend(outcome.results);
        }

        report.passing = accumulated.len();
        rank(&mut accumulated);
        accumulated.truncate(target);
        report.results = accumulated;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ScannerBuilder;
    use crate::session::test_utils::{ip, ScriptedProber};
    use ip_scout_probe::{Candidate, RetryPolicy, StaticGeoResolver};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Source over a fixed list that remembers whether it was fetched.
    #[derive(Clone, Default)]
    struct TrackingSource {
        candidates: Vec<Candidate>,
        fetched: Arc<AtomicBool>,
    }

    impl TrackingSource {
        fn new(candidates: Vec<Candidate>) -> Self {
            TrackingSource {
                candidates,
                fetched: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl AddressSource for TrackingSource {
        async fn fetch(&self, _port: u16) -> Vec<Candidate> {
            self.fetched.store(true, Ordering::SeqCst);
            self.candidates.clone()
        }
    }

    fn us(literal: &str) -> (std::net::IpAddr, CountryCode) {
        (ip(literal), CountryCode::new("US").unwrap())
    }

    fn other(literal: &str) -> (std::net::IpAddr, CountryCode) {
        (ip(literal), CountryCode::new("FR").unwrap())
    }

    fn scanner_for(
        target_count: usize,
        pools: Vec<Pool<TrackingSource>>,
        prober: ScriptedProber,
        resolver: StaticGeoResolver,
    ) -> Scanner<TrackingSource, ScriptedProber, StaticGeoResolver> {
        ScannerBuilder::new(CountryCode::new("US").unwrap())
            .with_target_count(target_count)
            .with_concurrency(4)
            .with_retry_policy(RetryPolicy {
                timeout: Duration::from_millis(100),
                attempts: 1,
                retry_delay: Duration::from_millis(1),
            })
            .build(pools, prober, resolver)
            .unwrap()
    }

    #[tokio::test]
    async fn test_first_pool_satisfies_target_and_later_pools_stay_cold() {
        // Pool "official": three US addresses at 50/30/70ms and two French.
        let prober = ScriptedProber::new([
            (ip("192.0.2.1"), 50),
            (ip("192.0.2.2"), 30),
            (ip("192.0.2.3"), 70),
            (ip("192.0.2.4"), 20),
            (ip("192.0.2.5"), 20),
        ]);
        let resolver = StaticGeoResolver::new([
            us("192.0.2.1"),
            us("192.0.2.2"),
            us("192.0.2.3"),
            other("192.0.2.4"),
            other("192.0.2.5"),
        ]);
        let official = TrackingSource::new(
            (1..=5)
                .map(|i| Candidate::new(ip(&format!("192.0.2.{i}"))))
                .collect(),
        );
        let cm = TrackingSource::new(vec![Candidate::new(ip("198.51.100.1"))]);
        let cm_fetched = cm.fetched.clone();

        let scanner = scanner_for(
            2,
            vec![Pool::new("official", 0, official), Pool::new("cm", 1, cm)],
            prober,
            resolver,
        );
        let report = scanner.scan().await;

        assert_eq!(report.results.len(), 2);
        assert!(report.fulfilled());
        let latencies: Vec<u128> = report.results.iter().map(|r| r.latency.as_millis()).collect();
        assert_eq!(latencies, vec![30, 50]);
        assert!(!cm_fetched.load(Ordering::SeqCst));
        assert_eq!(report.pools_fetched, 1);
    }

    #[tokio::test]
    async fn test_traversal_draws_from_pools_in_priority_order() {
        let prober = ScriptedProber::new([
            (ip("192.0.2.1"), 80),
            (ip("192.0.2.2"), 10),
            (ip("198.51.100.1"), 40),
            (ip("198.51.100.2"), 60),
            (ip("198.51.100.3"), 20),
        ]);
        let resolver = StaticGeoResolver::new([
            us("192.0.2.1"),
            us("192.0.2.2"),
            us("198.51.100.1"),
            us("198.51.100.2"),
            us("198.51.100.3"),
        ]);
        let official = TrackingSource::new(vec![
            Candidate::new(ip("192.0.2.1")),
            Candidate::new(ip("192.0.2.2")),
        ]);
        let cm = TrackingSource::new(vec![
            Candidate::new(ip("198.51.100.1")),
            Candidate::new(ip("198.51.100.2")),
            Candidate::new(ip("198.51.100.3")),
        ]);
        let as13335 = TrackingSource::new(vec![Candidate::new(ip("203.0.113.1"))]);
        let as13335_fetched = as13335.fetched.clone();

        let scanner = scanner_for(
            5,
            vec![
                Pool::new("official", 0, official),
                Pool::new("cm", 1, cm),
                Pool::new("as13335", 2, as13335),
            ],
            prober,
            resolver,
        );
        let report = scanner.scan().await;

        assert_eq!(report.results.len(), 5);
        let latencies: Vec<u128> = report.results.iter().map(|r| r.latency.as_millis()).collect();
        assert_eq!(latencies, vec![10, 20, 40, 60, 80]);
        let pools: std::collections::HashSet<&str> =
            report.results.iter().map(|r| r.pool.as_str()).collect();
        assert!(pools.contains("official") && pools.contains("cm"));
        assert!(!as13335_fetched.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_no_matches_anywhere_reports_empty_without_error() {
        let prober = ScriptedProber::new([(ip("192.0.2.1"), 30)]);
        let resolver = StaticGeoResolver::new([other("192.0.2.1")]);
        let pool = TrackingSource::new(vec![Candidate::new(ip("192.0.2.1"))]);

        let scanner = scanner_for(3, vec![Pool::new("official", 0, pool)], prober, resolver);
        let report = scanner.scan().await;

        assert!(report.results.is_empty());
        assert!(!report.fulfilled());
        assert_eq!(report.passing, 0);
        assert_eq!(report.wrong_country, 1);
    }

    #[tokio::test]
    async fn test_empty_pool_is_skipped_and_traversal_continues() {
        let prober = ScriptedProber::new([(ip("198.51.100.1"), 25)]);
        let resolver = StaticGeoResolver::new([us("198.51.100.1")]);
        // First pool simulates a failed fetch by yielding nothing.
        let broken = TrackingSource::new(Vec::new());
        let healthy = TrackingSource::new(vec![Candidate::new(ip("198.51.100.1"))]);

        let scanner = scanner_for(
            1,
            vec![Pool::new("broken", 0, broken), Pool::new("cm", 1, healthy)],
            prober,
            resolver,
        );
        let report = scanner.scan().await;

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].pool, "cm");
        assert_eq!(report.pools_fetched, 2);
    }

    #[tokio::test]
    async fn test_addresses_are_not_probed_twice_across_pools() {
        let prober = ScriptedProber::new([(ip("192.0.2.1"), 30), (ip("198.51.100.1"), 45)]);
        let resolver = StaticGeoResolver::new([us("192.0.2.1"), us("198.51.100.1")]);
        let official = TrackingSource::new(vec![Candidate::new(ip("192.0.2.1"))]);
        // The duplicate of 192.0.2.1 here must not cost a second probe.
        let cm = TrackingSource::new(vec![
            Candidate::new(ip("192.0.2.1")),
            Candidate::new(ip("198.51.100.1")),
        ]);
        let prober_handle = prober.clone();

        let scanner = scanner_for(
            5,
            vec![Pool::new("official", 0, official), Pool::new("cm", 1, cm)],
            prober,
            resolver,
        );
        let report = scanner.scan().await;

        assert_eq!(report.results.len(), 2);
        assert_eq!(report.probed, 2);
        assert_eq!(prober_handle.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_per_pool_cap_bounds_probing() {
        let prober = ScriptedProber::new(
            (1..=5).map(|i| (ip(&format!("192.0.2.{i}")), 30u64)),
        );
        let resolver = StaticGeoResolver::new(
            (1..=5).map(|i| other(&format!("192.0.2.{i}"))),
        );
        let pool = TrackingSource::new(
            (1..=5)
                .map(|i| Candidate::new(ip(&format!("192.0.2.{i}"))))
                .collect(),
        );

        let scanner = ScannerBuilder::new(CountryCode::new("US").unwrap())
            .with_target_count(5)
            .with_per_pool_cap(3)
            .with_concurrency(4)
            .with_retry_policy(RetryPolicy {
                timeout: Duration::from_millis(100),
                attempts: 1,
                retry_delay: Duration::from_millis(1),
            })
            .build(vec![Pool::new("official", 0, pool)], prober, resolver)
            .unwrap();
        let report = scanner.scan().await;

        assert_eq!(report.probed, 3);
        assert!(report.results.is_empty());
    }

    #[tokio::test]
    async fn test_under_fulfillment_is_reported_not_raised() {
        let prober = ScriptedProber::new([(ip("192.0.2.1"), 30), (ip("192.0.2.2"), 60)]);
        let resolver = StaticGeoResolver::new([us("192.0.2.1"), us("192.0.2.2")]);
        let pool = TrackingSource::new(vec![
            Candidate::new(ip("192.0.2.1")),
            Candidate::new(ip("192.0.2.2")),
        ]);

        let scanner = scanner_for(5, vec![Pool::new("official", 0, pool)], prober, resolver);
        let report = scanner.scan().await;

        assert_eq!(report.results.len(), 2);
        assert!(!report.fulfilled());
        assert_eq!(report.passing, 2);
        assert_eq!(report.target_count, 5);
    }
}
