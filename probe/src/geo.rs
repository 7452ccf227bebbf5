//! Geolocation of addresses to country codes.

use crate::country::CountryCode;
use crate::error::ResolutionError;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

/// Default lookup endpoint; answers `GET /{ip}` with `{"ip": ..., "country": ...}`.
pub const DEFAULT_GEO_ENDPOINT: &str = "https://api.country.is";

/// Resolves an address to the country it is served from.
///
/// A resolution failure is never fatal to a scan; the caller treats it as
/// "country unknown" and drops the address from consideration.
pub trait GeoResolver: Clone + Send + Sync + 'static {
    /// Look up the country code for `ip`.
    fn resolve(
        &self,
        ip: IpAddr,
    ) -> impl std::future::Future<Output = Result<CountryCode, ResolutionError>> + Send;
}

/// Resolver backed by an HTTP country-lookup service.
#[derive(Debug, Clone)]
pub struct HttpGeoResolver {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpGeoResolver {
    /// Create a resolver against the default lookup service.
    pub fn new() -> Self {
        Self::with_endpoint(DEFAULT_GEO_ENDPOINT)
    }

    /// Create a resolver against a custom lookup service.
    ///
    /// The service must answer `GET {endpoint}/{ip}` with a JSON object
    /// carrying a `country` field holding an alpha-2 code.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - Base URL of the lookup service, without trailing slash.
    pub fn with_endpoint<S: Into<String>>(endpoint: S) -> Self {
        HttpGeoResolver {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

impl Default for HttpGeoResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl GeoResolver for HttpGeoResolver {
    async fn resolve(&self, ip: IpAddr) -> Result<CountryCode, ResolutionError> {
        let url = format!("{}/{}", self.endpoint.trim_end_matches('/'), ip);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ResolutionError::Status(response.status().as_u16()));
        }
        let body: serde_json::Value = response.json().await?;
        parse_country_field(&body)
    }
}

/// Extracts the `country` field from a lookup response body.
fn parse_country_field(body: &serde_json::Value) -> Result<CountryCode, ResolutionError> {
    let code = body
        .get("country")
        .and_then(|value| value.as_str())
        .ok_or(ResolutionError::Malformed)?;
    CountryCode::new(code).map_err(|_| ResolutionError::Malformed)
}

/// Table-backed resolver for callers with pre-resolved geolocation data.
///
/// Misses answer with [`ResolutionError::Unknown`], which a scan treats the
/// same as any other resolution failure.
#[derive(Debug, Clone, Default)]
pub struct StaticGeoResolver {
    countries: Arc<HashMap<IpAddr, CountryCode>>,
}

impl StaticGeoResolver {
    /// Build a resolver from `(address, country)` pairs.
    pub fn new<I: IntoIterator<Item = (IpAddr, CountryCode)>>(entries: I) -> Self {
        StaticGeoResolver {
            countries: Arc::new(entries.into_iter().collect()),
        }
    }
}

impl GeoResolver for StaticGeoResolver {
    async fn resolve(&self, ip: IpAddr) -> Result<CountryCode, ResolutionError> {
        self.countries
            .get(&ip)
            .cloned()
            .ok_or(ResolutionError::Unknown)
    }
}
