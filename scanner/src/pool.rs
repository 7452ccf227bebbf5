//! Pool descriptors and the address source seam.

use ip_scout_probe::Candidate;

/// Supplies candidate addresses for one pool.
///
/// Implementations absorb their own failures: an unreachable or unparseable
/// list yields an empty vec (logged upstream) and the traversal moves on to
/// the next pool. Nothing raised here ever aborts a scan.
pub trait AddressSource: Send + Sync {
    /// Fetch this pool's candidates for a scan against `port`.
    ///
    /// The scan port is passed so sources reading port-pinned list entries
    /// can drop the ones that cannot serve this scan.
    fn fetch(&self, port: u16) -> impl std::future::Future<Output = Vec<Candidate>> + Send;
}

/// A named, prioritized source of candidate addresses.
///
/// Lower priority values are tried first; pools sharing a priority keep
/// their declaration order. The ordering is fixed when the scanner is built
/// and never changes during a run.
#[derive(Debug, Clone)]
pub struct Pool<S> {
    /// Label attached to results drawn from this pool.
    pub name: String,
    /// Rank in the traversal order, lower tried first.
    pub priority: u32,
    /// Supplier of this pool's candidates.
    pub source: S,
}

impl<S> Pool<S> {
    /// Create a pool descriptor.
    pub fn new<N: Into<String>>(name: N, priority: u32, source: S) -> Self {
        Pool {
            name: name.into(),
            priority,
            source,
        }
    }
}
