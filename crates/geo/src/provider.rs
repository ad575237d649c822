//! Geocoding providers.

use async_trait::async_trait;
use matchmaker_core::config::GeoConfig;
use matchmaker_core::{Coordinates, MatchError, MatchResult};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Turns a free-text place name into coordinates.
///
/// `Ok(None)` is a definitive "no such place"; `Err` is a transient failure
/// worth retrying.
#[async_trait]
pub trait GeocodingProvider: Send + Sync {
    async fn geocode(&self, place: &str) -> MatchResult<Option<Coordinates>>;

    fn name(&self) -> &str;
}

#[async_trait]
impl<P: GeocodingProvider + ?Sized> GeocodingProvider for Arc<P> {
    async fn geocode(&self, place: &str) -> MatchResult<Option<Coordinates>> {
        (**self).geocode(place).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// OpenStreetMap Nominatim search API.
pub struct NominatimProvider {
    client: reqwest::Client,
    search_url: String,
}

/// Nominatim returns coordinates as decimal strings.
#[derive(Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

impl NominatimProvider {
    pub fn new(config: &GeoConfig) -> MatchResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_millis(config.attempt_timeout_ms))
            .build()
            .map_err(|e| MatchError::Config(format!("geocoding client: {e}")))?;
        Ok(Self {
            client,
            search_url: config.provider_url.clone(),
        })
    }

    fn parse(body: &str) -> MatchResult<Option<Coordinates>> {
        let places: Vec<NominatimPlace> = serde_json::from_str(body)?;
        let Some(first) = places.into_iter().next() else {
            return Ok(None);
        };
        let parse = |v: &str| {
            v.trim()
                .parse::<f64>()
                .map_err(|e| MatchError::Geocoding(format!("bad coordinate {v:?}: {e}")))
        };
        let coords = Coordinates::new(parse(&first.lat)?, parse(&first.lon)?);
        if !coords.is_valid() {
            return Err(MatchError::Geocoding(format!(
                "coordinate out of range: {}, {}",
                coords.latitude, coords.longitude
            )));
        }
        Ok(Some(coords))
    }
}

#[async_trait]
impl GeocodingProvider for NominatimProvider {
    async fn geocode(&self, place: &str) -> MatchResult<Option<Coordinates>> {
        let response = self
            .client
            .get(&self.search_url)
            .query(&[("q", place), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| MatchError::Geocoding(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MatchError::Geocoding(format!("provider returned {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| MatchError::Geocoding(format!("reading body: {e}")))?;
        let result = Self::parse(&body)?;
        debug!(place = place, found = result.is_some(), "Nominatim lookup");
        Ok(result)
    }

    fn name(&self) -> &str {
        "nominatim"
    }
}
