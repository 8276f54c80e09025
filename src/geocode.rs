use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// One typed component of a geocoded address, e.g. a country or a
/// first-level administrative area.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressComponent {
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub long_name: Option<String>,
}

impl AddressComponent {
    pub fn has_type(&self, role: &str) -> bool {
        self.types.iter().any(|t| t == role)
    }

    /// Preferred label: short form when present, long form otherwise.
    pub fn label(&self) -> Option<&str> {
        self.short_name.as_deref().or(self.long_name.as_deref())
    }
}

#[derive(Debug, Clone)]
pub struct GeocodeResult {
    pub lat: f64,
    pub lon: f64,
    pub components: Vec<AddressComponent>,
}

impl GeocodeResult {
    pub fn state_code(&self) -> Option<&str> {
        self.component_label("administrative_area_level_1")
    }

    pub fn country_code(&self) -> Option<&str> {
        self.component_label("country")
    }

    fn component_label(&self, role: &str) -> Option<&str> {
        self.components
            .iter()
            .find(|c| c.has_type(role))
            .and_then(|c| c.label())
    }
}

/// Seam for the external geocoding service so the pipeline can be driven by
/// a stub in tests. Implementations make exactly one outbound call per
/// invocation, never retry, and never throttle; rate limiting is the
/// caller's job (see [`Throttled`]).
#[async_trait]
pub trait Geocode: Send + Sync {
    /// `Ok(Some(..))` on a match, `Ok(None)` on an explicit zero-result
    /// response (soft miss), `Err(..)` on any other status.
    async fn geocode(&self, address: &str) -> Result<Option<GeocodeResult>>;
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<WireResult>,
}

#[derive(Debug, Deserialize)]
struct WireResult {
    geometry: WireGeometry,
    #[serde(default)]
    address_components: Vec<AddressComponent>,
}

#[derive(Debug, Deserialize)]
struct WireGeometry {
    location: WireLocation,
}

#[derive(Debug, Deserialize)]
struct WireLocation {
    lat: f64,
    lng: f64,
}

/// Client for the Google-shaped geocoding API.
pub struct GoogleGeocoder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GoogleGeocoder {
    pub fn new(base_url: String, api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url,
            api_key,
        }
    }

    fn interpret(response: GeocodeResponse) -> Result<Option<GeocodeResult>> {
        match response.status.as_str() {
            "OK" => Ok(response.results.into_iter().next().map(|r| GeocodeResult {
                lat: r.geometry.location.lat,
                lon: r.geometry.location.lng,
                components: r.address_components,
            })),
            "ZERO_RESULTS" => Ok(None),
            other => {
                warn!("geocoder returned non-OK status: {}", other);
                Err(Error::GeocodeHardFailure {
                    status: other.to_string(),
                })
            }
        }
    }
}

#[async_trait]
impl Geocode for GoogleGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<GeocodeResult>> {
        debug!("geocoding address: {}", address);

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("address", address), ("key", self.api_key.as_str())])
            .send()
            .await?
            .json::<GeocodeResponse>()
            .await?;

        Self::interpret(response)
    }
}

/// Caller-side rate limit: a fixed pause after every completed call before
/// the next one is issued. The external service enforces a request-volume
/// quota; exceeding it produces hard failures.
pub struct Throttled<G> {
    inner: G,
    delay: Duration,
}

impl<G> Throttled<G> {
    pub fn new(inner: G, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl<G: Geocode> Geocode for Throttled<G> {
    async fn geocode(&self, address: &str) -> Result<Option<GeocodeResult>> {
        let outcome = self.inner.geocode(address).await;
        // No pause after a hard failure; the run aborts anyway.
        if outcome.is_ok() {
            tokio::time::sleep(self.delay).await;
        }
        outcome
    }
}
