//! Long-lived city name → coordinates cache in front of the geocoder.

use crate::backend::CacheBackend;
use crate::keys::city_coordinates_key;
use matchmaker_core::Coordinates;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Serialize, Deserialize)]
struct StoredCoordinates {
    lat: f64,
    lon: f64,
}

pub struct CityCoordinateCache {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
}

impl CityCoordinateCache {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    pub async fn get(&self, city: &str) -> Option<Coordinates> {
        let key = city_coordinates_key(city);
        let raw = match self.backend.get(&key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(city = city, error = %e, "City cache read failed");
                return None;
            }
        };
        match serde_json::from_str::<StoredCoordinates>(&raw) {
            Ok(stored) => Some(Coordinates::new(stored.lat, stored.lon)),
            Err(e) => {
                warn!(city = city, error = %e, "Ignoring malformed city cache entry");
                None
            }
        }
    }

    pub async fn set(&self, city: &str, coords: Coordinates) {
        let value = StoredCoordinates {
            lat: coords.latitude,
            lon: coords.longitude,
        };
        let json = match serde_json::to_string(&value) {
            Ok(json) => json,
            Err(e) => {
                warn!(city = city, error = %e, "Failed to encode city coordinates");
                return;
            }
        };
        if let Err(e) = self
            .backend
            .set_ex(&city_coordinates_key(city), &json, self.ttl)
            .await
        {
            warn!(city = city, error = %e, "City cache write failed");
        }
    }

    pub async fn clear(&self, city: &str) {
        if let Err(e) = self.backend.delete(&city_coordinates_key(city)).await {
            warn!(city = city, error = %e, "City cache invalidation failed");
        }
    }
}
