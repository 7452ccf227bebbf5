//! Example scan over the public Cloudflare address pools.
//!
//! Hunts for edge addresses that geolocate to the requested country and
//! answer quickly on the given port, then writes the ranked report lines
//! to a file.

use clap::Parser;
use ip_scout_probe::{CountryCode, HttpGeoResolver, TcpProber};
use ip_scout_scanner::{HttpListSource, ListFormat, Pool, ScannerBuilder};
use log::LevelFilter;
use std::fs;

/// Known pool roster: the official list first, community lists after.
/// Declaration order is the traversal priority.
const POOLS: &[(&str, &str, ListFormat)] = &[
    (
        "official",
        "https://www.cloudflare.com/ips-v4/",
        ListFormat::Cidr,
    ),
    (
        "cm",
        "https://raw.githubusercontent.com/cmliu/cmliu/main/CF-CIDR.txt",
        ListFormat::Cidr,
    ),
    (
        "as13335",
        "https://raw.githubusercontent.com/ipverse/asn-ip/master/as/13335/ipv4-aggregated.txt",
        ListFormat::Cidr,
    ),
    (
        "as209242",
        "https://raw.githubusercontent.com/ipverse/asn-ip/master/as/209242/ipv4-aggregated.txt",
        ListFormat::Cidr,
    ),
    (
        "proxyip",
        "https://raw.githubusercontent.com/cmliu/ACL4SSR/main/baipiao.txt",
        ListFormat::HostPort,
    ),
    (
        "as24429",
        "https://raw.githubusercontent.com/ipverse/asn-ip/master/as/24429/ipv4-aggregated.txt",
        ListFormat::Cidr,
    ),
    (
        "as35916",
        "https://raw.githubusercontent.com/ipverse/asn-ip/master/as/35916/ipv4-aggregated.txt",
        ListFormat::Cidr,
    ),
    (
        "as199524",
        "https://raw.githubusercontent.com/ipverse/asn-ip/master/as/199524/ipv4-aggregated.txt",
        ListFormat::Cidr,
    ),
];

/// Published edge ranges, used when the official list cannot be fetched.
const OFFICIAL_FALLBACK: &str = "173.245.48.0/20
103.21.244.0/22
103.22.200.0/22
103.31.4.0/22
141.101.64.0/18
108.162.192.0/18
190.93.240.0/20
188.114.96.0/20
197.234.240.0/22
198.41.128.0/17
162.158.0.0/15
104.16.0.0/13
104.24.0.0/14
172.64.0.0/13
131.0.72.0/22";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Target country code.
    #[arg(short, long, default_value = "CN")]
    country: String,

    /// Number of addresses to find.
    #[arg(short = 'n', long, default_value = "10")]
    count: usize,

    /// Port to probe.
    #[arg(short, long, default_value = "443")]
    port: u16,

    /// Maximum addresses drawn from each pool.
    #[arg(short, long, default_value = "512")]
    max_ips: usize,

    /// Concurrent probe workers.
    #[arg(long, default_value = "32")]
    concurrent: usize,

    /// Output file for the ranked report lines.
    #[arg(short, long, default_value = "nodes.txt")]
    output: String,

    /// Log level.
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let log_level = match args.log_level.to_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    };

    // Configure fern logger
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}] {} - {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log_level)
        .chain(std::io::stderr())
        .apply()
        .unwrap();

    let country = CountryCode::new(&args.country)
        .map_err(|e| format!("Invalid country code {:?}: {e}", args.country))?;

    log::info!(
        "Hunting for {} {} addresses on port {}",
        args.count,
        country,
        args.port
    );

    let pools = POOLS
        .iter()
        .enumerate()
        .map(|(priority, (name, url, format))| {
            let mut source = HttpListSource::new(*url, *format).with_sample_limit(args.max_ips);
            if *name == "official" {
                source = source.with_fallback(OFFICIAL_FALLBACK);
            }
            Pool::new(*name, priority as u32, source)
        })
        .collect();

    let scanner = ScannerBuilder::new(country)
        .with_target_count(args.count)
        .with_port(args.port)
        .with_per_pool_cap(args.max_ips)
        .with_concurrency(args.concurrent)
        .build(pools, TcpProber, HttpGeoResolver::new())
        .map_err(|e| format!("Configuration error: {e}"))?;

    let report = scanner.scan().await;

    log::info!(
        "Probed {} candidates across {} pools: {} passing, {} unreachable, {} elsewhere, {} unresolved",
        report.probed,
        report.pools_fetched,
        report.passing,
        report.unreachable,
        report.wrong_country,
        report.unresolved
    );

    if report.results.is_empty() {
        log::warn!("No matching addresses found, nothing written");
        return Ok(());
    }
    if !report.fulfilled() {
        log::warn!(
            "Found {} of the {} requested addresses",
            report.results.len(),
            report.target_count
        );
    }

    let fastest = report.results.first().map(|r| r.latency.as_millis());
    let slowest = report.results.last().map(|r| r.latency.as_millis());
    let average = report
        .results
        .iter()
        .map(|r| r.latency.as_millis())
        .sum::<u128>()
        / report.results.len() as u128;
    if let (Some(fastest), Some(slowest)) = (fastest, slowest) {
        log::info!("Latency range {fastest}ms - {slowest}ms, average {average}ms");
    }

    let lines: Vec<String> = report.results.iter().map(|r| r.to_string()).collect();
    fs::write(&args.output, lines.join("\n"))?;
    log::info!("Wrote {} results to {}", report.results.len(), args.output);

    for (rank, result) in report.results.iter().enumerate() {
        log::info!("{:2}. {result}", rank + 1);
    }

    Ok(())
}
