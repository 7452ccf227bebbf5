//! End-to-end scans against real loopback listeners.
//!
//! These tests exercise the whole stack with the production `TcpProber`:
//! listeners are bound on distinct loopback addresses, geolocation comes
//! from a static table, and the scan probes over real sockets.

use ip_scout_probe::{Candidate, CountryCode, RetryPolicy, StaticGeoResolver, TcpProber};
use ip_scout_scanner::{AddressSource, Pool, ScannerBuilder, StaticListSource};
use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Binds a listener on a distinct loopback address and returns a candidate
/// pinned to its port. The listener must stay alive for the probe to land.
async fn live_candidate(literal: &str) -> (Candidate, TcpListener) {
    let ip: IpAddr = literal.parse().unwrap();
    let listener = TcpListener::bind(SocketAddr::new(ip, 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (Candidate::new(ip).with_port(port), listener)
}

/// A candidate whose port was bound once and released, so connections are
/// refused quickly.
async fn dead_candidate(literal: &str) -> Candidate {
    let ip: IpAddr = literal.parse().unwrap();
    let listener = TcpListener::bind(SocketAddr::new(ip, 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    Candidate::new(ip).with_port(port)
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        timeout: Duration::from_millis(500),
        attempts: 1,
        retry_delay: Duration::from_millis(10),
    }
}

fn country(code: &str) -> CountryCode {
    CountryCode::new(code).unwrap()
}

#[tokio::test]
async fn scan_ranks_reachable_target_country_listeners() {
    let (c1, _l1) = live_candidate("127.0.0.1").await;
    let (c2, _l2) = live_candidate("127.0.0.2").await;
    let (c3, _l3) = live_candidate("127.0.0.3").await;
    let dead = dead_candidate("127.0.0.4").await;

    let resolver = StaticGeoResolver::new([
        (c1.ip, country("US")),
        (c2.ip, country("DE")),
        (c3.ip, country("US")),
        (dead.ip, country("US")),
    ]);
    let pools = vec![Pool::new(
        "loopback",
        0,
        StaticListSource::new(vec![c1.clone(), c2, c3.clone(), dead]),
    )];

    let scanner = ScannerBuilder::new(country("US"))
        .with_target_count(5)
        .with_concurrency(4)
        .with_retry_policy(fast_retry())
        .build(pools, TcpProber, resolver)
        .unwrap();
    let report = scanner.scan().await;

    // Both live US listeners pass; the German one and the dead port do not.
    assert_eq!(report.results.len(), 2);
    assert!(!report.fulfilled());
    assert_eq!(report.probed, 4);
    assert_eq!(report.wrong_country, 1);
    assert_eq!(report.unreachable, 1);

    let found: HashSet<IpAddr> = report.results.iter().map(|r| r.ip).collect();
    assert_eq!(found, HashSet::from([c1.ip, c3.ip]));
    assert!(report.results[0].latency <= report.results[1].latency);
}

/// Source wrapper that remembers whether the engine ever asked for it.
#[derive(Clone)]
struct ObservedSource {
    inner: StaticListSource,
    fetched: Arc<AtomicBool>,
}

impl ObservedSource {
    fn new(candidates: Vec<Candidate>) -> Self {
        ObservedSource {
            inner: StaticListSource::new(candidates),
            fetched: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl AddressSource for ObservedSource {
    async fn fetch(&self, port: u16) -> Vec<Candidate> {
        self.fetched.store(true, Ordering::SeqCst);
        self.inner.fetch(port).await
    }
}

#[tokio::test]
async fn scan_stops_before_fetching_pools_it_does_not_need() {
    let (c1, _l1) = live_candidate("127.0.1.1").await;
    let (c2, _l2) = live_candidate("127.0.1.2").await;

    let resolver = StaticGeoResolver::new([(c1.ip, country("US")), (c2.ip, country("US"))]);
    let official = ObservedSource::new(vec![c1, c2]);
    let spare = ObservedSource::new(Vec::new());
    let spare_fetched = spare.fetched.clone();

    let scanner = ScannerBuilder::new(country("US"))
        .with_target_count(2)
        .with_concurrency(2)
        .with_retry_policy(fast_retry())
        .build(
            vec![Pool::new("official", 0, official), Pool::new("spare", 1, spare)],
            TcpProber,
            resolver,
        )
        .unwrap();
    let report = scanner.scan().await;

    assert_eq!(report.results.len(), 2);
    assert!(report.fulfilled());
    assert!(!spare_fetched.load(Ordering::SeqCst));
    assert_eq!(report.pools_fetched, 1);
}

#[tokio::test]
async fn scan_report_lines_round_trip_the_expected_format() {
    let (c1, _l1) = live_candidate("127.0.2.1").await;
    let port = c1.port.unwrap();

    let resolver = StaticGeoResolver::new([(c1.ip, country("US"))]);
    let pools = vec![Pool::new("loopback", 0, StaticListSource::new(vec![c1]))];

    let scanner = ScannerBuilder::new(country("US"))
        .with_target_count(1)
        .with_concurrency(1)
        .with_retry_policy(fast_retry())
        .build(pools, TcpProber, resolver)
        .unwrap();
    let report = scanner.scan().await;

    assert_eq!(report.results.len(), 1);
    let line = report.results[0].to_string();
    let latency_ms = report.results[0].latency.as_millis();
    assert_eq!(line, format!("127.0.2.1:{port}#US loopback {latency_ms}ms"));
}
