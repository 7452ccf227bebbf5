//! Per-pool probe scheduling.
//!
//! [`ProbeSession`] drives the concurrent probing of one pool's candidates
//! and implements the cooperative early stop once the traversal has enough
//! passing results.

use crate::result::PassingResult;
use ip_scout_probe::{Candidate, CountryCode, CountryHint, GeoResolver, Prober, RetryPolicy};
use log::{debug, info};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

/// Tuning for one pool's probe run.
#[derive(Debug, Clone)]
pub(crate) struct SessionConfig {
    pub target_country: CountryCode,
    pub port: u16,
    pub concurrency: usize,
    pub retry: RetryPolicy,
}

/// What became of one probed candidate.
#[derive(Debug)]
pub(crate) enum ProbeVerdict {
    /// Reachable and in the target country.
    Passing(PassingResult),
    /// Reachable but served from elsewhere.
    WrongCountry,
    /// Reachable but its country could not be determined.
    Unresolved,
    /// No connection attempt succeeded.
    Unreachable,
}

/// Counters and results from one pool's probe run.
#[derive(Debug, Default)]
pub(crate) struct PoolOutcome {
    pub results: Vec<PassingResult>,
    pub probed: usize,
    pub unreachable: usize,
    pub wrong_country: usize,
    pub unresolved: usize,
}

/// Schedules concurrent probes of one pool's candidates.
///
/// # Architecture
///
/// A coordinator/worker split. The coordinator admits candidates while the
/// passing count stays below what the traversal still needs; a semaphore
/// bounds the number of in-flight workers; workers report verdicts back
/// over a channel. Once the needed count is reached no new probe is
/// dispatched, but workers already in flight run to completion and their
/// results are kept.
#[derive(Clone)]
pub(crate) struct ProbeSession<P, G> {
    config: SessionConfig,
    pool_name: String,
    pool_priority: u32,
    prober: P,
    resolver: G,
}

impl<P: Prober, G: GeoResolver> ProbeSession<P, G> {
    /// Create a session for one pool.
    pub fn new(
        config: SessionConfig,
        pool_name: String,
        pool_priority: u32,
        prober: P,
        resolver: G,
    ) -> Self {
        ProbeSession {
            config,
            pool_name,
            pool_priority,
            prober,
            resolver,
        }
    }

    /// Probes `candidates` until all are done or `remaining_needed` passing
    /// results have been found.
    ///
    /// The found-counter lives and dies with this call; nothing mutable is
    /// shared beyond it and the verdict channel.
    pub async fn run(&self, candidates: Vec<Candidate>, remaining_needed: usize) -> PoolOutcome {
        let permits = Arc::new(Semaphore::new(self.config.concurrency));
        let found = Arc::new(AtomicUsize::new(0));
        let (verdict_tx, mut verdict_rx) = mpsc::unbounded_channel();

        let total = candidates.len();
        let mut dispatched = 0usize;

        for candidate in candidates {
            // Acquire_owned so the permit can move into the worker task.
            let permit = permits.clone().acquire_owned().await.unwrap();

            // Admission control: once the pool has yielded enough passing
            // results, stop dispatching. In-flight probes still complete
            // and their results are kept.
            if found.load(Ordering::Relaxed) >= remaining_needed {
                info!(
                    "pool {} satisfied the remaining target, {} of {} candidates dispatched",
                    self.pool_name, dispatched, total
                );
                break;
            }

            let session = self.clone();
            let found_handle = found.clone();
            let tx = verdict_tx.clone();
            dispatched += 1;
            tokio::spawn(async move {
                let verdict = session.process(candidate).await;
                if matches!(verdict, ProbeVerdict::Passing(_)) {
                    found_handle.fetch_add(1, Ordering::Relaxed);
                }
                // The coordinator drains the channel until every worker
                // has reported, so a send only fails if the whole session
                // was dropped.
                let _ = tx.send(verdict);
                drop(permit);
            });
        }

        // With the coordinator's sender gone, the channel closes as soon as
        // the last in-flight worker reports.
        drop(verdict_tx);

        let mut outcome = PoolOutcome {
            probed: dispatched,
            ..Default::default()
        };
        while let Some(verdict) = verdict_rx.recv().await {
            match verdict {
                ProbeVerdict::Passing(result) => outcome.results.push(result),
                ProbeVerdict::WrongCountry => outcome.wrong_country += 1,
                ProbeVerdict::Unresolved => outcome.unresolved += 1,
                ProbeVerdict::Unreachable => outcome.unreachable += 1,
            }
        }
        outcome
    }

    /// Probes a single candidate and classifies the outcome.
    async fn process(&self, candidate: Candidate) -> ProbeVerdict {
        let port = candidate.port.unwrap_or(self.config.port);
        let addr = SocketAddr::new(candidate.ip, port);

        let probe = self.prober.probe(addr, self.config.retry).await;
        let latency = match probe.latency {
            Some(latency) => latency,
            None => {
                debug!("{addr} unreachable after {} attempts", probe.attempts);
                return ProbeVerdict::Unreachable;
            }
        };

        let country = match &candidate.country {
            CountryHint::Known(country) => country.clone(),
            CountryHint::Unknown => match self.resolver.resolve(candidate.ip).await {
                Ok(country) => country,
                Err(e) => {
                    debug!("could not geolocate {}: {e}", candidate.ip);
                    return ProbeVerdict::Unresolved;
                }
            },
        };

        if country != self.config.target_country {
            debug!(
                "{addr} answered in {}ms but geolocates to {country}",
                latency.as_millis()
            );
            return ProbeVerdict::WrongCountry;
        }

        ProbeVerdict::Passing(PassingResult {
            ip: candidate.ip,
            port,
            country,
            pool: self.pool_name.clone(),
            pool_priority: self.pool_priority,
            latency,
        })
    }
}
