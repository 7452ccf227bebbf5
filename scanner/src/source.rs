//! Address source implementations: remote lists and static lists.
//!
//! Remote lists come in two shapes. CIDR lists name whole blocks and are
//! expanded by sampling random hosts from each block; host lists name
//! individual `ip[:port][#comment]` entries, sometimes pinned to a port.
//! Either way the fetch boundary absorbs failures: a dead URL or garbage
//! body costs the scan one pool, never the run.

use crate::pool::AddressSource;
use ip_scout_probe::{Candidate, CountryCode};
use ipnet::Ipv4Net;
use log::{debug, warn};
use rand::Rng;
use std::collections::HashSet;
use std::error::Error;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Default bound on addresses drawn from one list.
pub const DEFAULT_SAMPLE_LIMIT: usize = 512;
/// Timeout for remote list downloads.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
/// Upper bound on sampling passes over a CIDR list.
const MAX_SAMPLE_ROUNDS: usize = 100;

/// How the lines of a remote list are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFormat {
    /// CIDR blocks (or bare addresses), one per line; hosts are sampled
    /// from each block.
    Cidr,
    /// `ip[:port][#comment]` entries; entries pinned to a different port
    /// are dropped.
    HostPort,
}

/// Errors from downloading a remote list.
#[derive(Debug)]
pub enum FetchError {
    /// The download failed at the transport level.
    Http(reqwest::Error),
    /// The server answered with a non-success status.
    Status(u16),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Http(err) => write!(f, "List download failed: {err}"),
            FetchError::Status(status) => {
                write!(f, "List server answered with status {status}")
            }
        }
    }
}

impl Error for FetchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FetchError::Http(err) => Some(err),
            FetchError::Status(_) => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Http(err)
    }
}

/// A candidate list downloaded from a URL.
#[derive(Debug, Clone)]
pub struct HttpListSource {
    url: String,
    format: ListFormat,
    sample_limit: usize,
    fallback: Option<String>,
}

impl HttpListSource {
    /// Create a source reading `url` in the given format.
    pub fn new<S: Into<String>>(url: S, format: ListFormat) -> Self {
        HttpListSource {
            url: url.into(),
            format,
            sample_limit: DEFAULT_SAMPLE_LIMIT,
            fallback: None,
        }
    }

    /// Bound the number of addresses drawn from this list.
    pub fn with_sample_limit(mut self, limit: usize) -> Self {
        self.sample_limit = limit;
        self
    }

    /// Text used in place of the remote list when the download fails.
    pub fn with_fallback<S: Into<String>>(mut self, text: S) -> Self {
        self.fallback = Some(text.into());
        self
    }

    async fn download(&self) -> Result<String, FetchError> {
        let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        let response = client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }
        Ok(response.text().await?)
    }
}

impl AddressSource for HttpListSource {
    async fn fetch(&self, port: u16) -> Vec<Candidate> {
        let text = match self.download().await {
            Ok(text) => text,
            Err(e) => match &self.fallback {
                Some(text) => {
                    warn!("{}: {e}, using built-in fallback list", self.url);
                    text.clone()
                }
                None => {
                    warn!("{}: {e}", self.url);
                    return Vec::new();
                }
            },
        };
        match self.format {
            ListFormat::Cidr => parse_cidr_list(&text, self.sample_limit),
            ListFormat::HostPort => parse_host_port_list(&text, port, self.sample_limit),
        }
    }
}

/// A fixed candidate list for callers that manage their own address data.
///
/// Entries are handed to the scan as-is; port pins and country hints are
/// whatever the caller put on them.
#[derive(Debug, Clone, Default)]
pub struct StaticListSource {
    candidates: Vec<Candidate>,
}

impl StaticListSource {
    /// Create a source over a fixed list of candidates.
    pub fn new<I: IntoIterator<Item = Candidate>>(candidates: I) -> Self {
        StaticListSource {
            candidates: candidates.into_iter().collect(),
        }
    }
}

impl AddressSource for StaticListSource {
    async fn fetch(&self, _port: u16) -> Vec<Candidate> {
        self.candidates.clone()
    }
}

/// Expands a CIDR list into up to `limit` sampled host addresses.
///
/// Sampling runs in rounds, drawing one more host per block each round, so
/// small limits still touch every block instead of draining the first one.
/// Bare addresses on a line are taken verbatim.
fn parse_cidr_list(text: &str, limit: usize) -> Vec<Candidate> {
    let mut blocks: Vec<Ipv4Net> = Vec::new();
    let mut picked: HashSet<Ipv4Addr> = HashSet::new();
    let mut out: Vec<Ipv4Addr> = Vec::new();

    for line in list_lines(text) {
        if let Ok(net) = line.parse::<Ipv4Net>() {
            blocks.push(net);
        } else if let Ok(ip) = line.parse::<Ipv4Addr>() {
            if picked.insert(ip) {
                out.push(ip);
            }
        } else {
            debug!("skipping unparseable list line: {line}");
        }
    }

    let mut rng = rand::thread_rng();
    let mut round = 1;
    while out.len() < limit && round <= MAX_SAMPLE_ROUNDS && !blocks.is_empty() {
        for net in &blocks {
            if out.len() >= limit {
                break;
            }
            sample_block(net, round, &mut rng, &mut picked, &mut out);
        }
        round += 1;
    }

    out.truncate(limit);
    out.into_iter()
        .map(|ip| Candidate::new(IpAddr::V4(ip)))
        .collect()
}

/// Draws up to `count` distinct hosts from one block.
///
/// Network and broadcast addresses are excluded; blocks narrower than /31
/// have no usable hosts under that rule and are skipped.
fn sample_block(
    net: &Ipv4Net,
    count: usize,
    rng: &mut impl Rng,
    picked: &mut HashSet<Ipv4Addr>,
    out: &mut Vec<Ipv4Addr>,
) {
    if net.prefix_len() >= 31 {
        return;
    }
    let hosts = (1u64 << (32 - u32::from(net.prefix_len()))) - 2;
    let base = u32::from(net.network());

    let mut drawn = 0;
    let mut misses = 0;
    while drawn < count && misses < count * 10 {
        let offset = rng.gen_range(1..=hosts) as u32;
        let ip = Ipv4Addr::from(base + offset);
        if picked.insert(ip) {
            out.push(ip);
            drawn += 1;
        } else {
            misses += 1;
        }
    }
}

/// Parses `ip[:port][#comment]` entries, keeping those usable on `scan_port`.
fn parse_host_port_list(text: &str, scan_port: u16, limit: usize) -> Vec<Candidate> {
    let mut seen: HashSet<IpAddr> = HashSet::new();
    let mut out = Vec::new();
    for line in list_lines(text) {
        if out.len() >= limit {
            break;
        }
        match parse_host_port_line(line, scan_port) {
            Some(candidate) if seen.insert(candidate.ip) => out.push(candidate),
            _ => {}
        }
    }
    out
}

/// Parses one host list entry. Unusable lines answer `None`.
///
/// A comment that validates as an alpha-2 code becomes the candidate's
/// country hint; anything else in the comment is ignored.
fn parse_host_port_line(line: &str, scan_port: u16) -> Option<Candidate> {
    let (main, comment) = match line.split_once('#') {
        Some((main, comment)) => (main.trim(), Some(comment.trim())),
        None => (line.trim(), None),
    };

    let (host, port) = match main.split_once(':') {
        Some((host, port)) => {
            let port = port.trim().parse::<u16>().ok()?;
            if port == 0 {
                return None;
            }
            (host.trim(), Some(port))
        }
        None => (main, None),
    };

    let ip: Ipv4Addr = host.parse().ok()?;

    // An entry pinned to another port cannot serve this scan.
    if let Some(port) = port {
        if port != scan_port {
            return None;
        }
    }

    let mut candidate = Candidate::new(IpAddr::V4(ip));
    if let Some(port) = port {
        candidate = candidate.with_port(port);
    }
    if let Some(comment) = comment {
        if let Ok(country) = CountryCode::new(comment) {
            candidate = candidate.with_country(country);
        }
    }
    Some(candidate)
}

fn list_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}
