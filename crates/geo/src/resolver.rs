use crate::gate::RateLimitedGeocoder;
use crate::provider::GeocodingProvider;
use matchmaker_cache::CityCoordinateCache;
use matchmaker_core::Coordinates;
use std::sync::Arc;
use tracing::{debug, warn};

pub type SharedProvider = Arc<dyn GeocodingProvider>;

/// Cache-aside city resolution: the city cache first, the rate-limited
/// provider on a miss. Only successful lookups are cached.
pub struct CachedLocationResolver {
    cities: Arc<CityCoordinateCache>,
    geocoder: RateLimitedGeocoder<SharedProvider>,
}

impl CachedLocationResolver {
    pub fn new(
        cities: Arc<CityCoordinateCache>,
        geocoder: RateLimitedGeocoder<SharedProvider>,
    ) -> Self {
        Self { cities, geocoder }
    }

    pub async fn resolve(&self, city: &str) -> Option<Coordinates> {
        let city = city.trim();
        if city.is_empty() {
            return None;
        }

        if let Some(coords) = self.cities.get(city).await {
            metrics::counter!("geo.cache.hit").increment(1);
            debug!(city = city, "City coordinates served from cache");
            return Some(coords);
        }

        match self.geocoder.geocode(city).await {
            Ok(Some(coords)) => {
                self.cities.set(city, coords).await;
                Some(coords)
            }
            Ok(None) => {
                debug!(city = city, "City not resolved");
                None
            }
            Err(e) => {
                warn!(city = city, error = %e, "Geocoder unavailable");
                None
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::gate::RetryPolicy;
    use async_trait::async_trait;
    use matchmaker_cache::MemoryBackend;
    use matchmaker_core::MatchResult;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GeocodingProvider for CountingProvider {
        async fn geocode(&self, place: &str) -> MatchResult<Option<Coordinates>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(match place.to_lowercase().as_str() {
                "paris" => Some(Coordinates::new(48.8566, 2.3522)),
                _ => None,
            })
        }
        fn name(&self) -> &str {
            "counting"
        }
    }

    fn resolver(provider: Arc<CountingProvider>) -> (Arc<MemoryBackend>, CachedLocationResolver) {
        let backend = Arc::new(MemoryBackend::new());
        let cities = Arc::new(CityCoordinateCache::new(backend.clone(), Duration::from_secs(3600)));
        let retry = RetryPolicy {
            max_attempts: 5,
            delay: Duration::from_millis(1),
            attempt_timeout: Duration::from_secs(5),
        };
        let gate = RateLimitedGeocoder::new(provider as SharedProvider, 10, Duration::ZERO, retry);
        (backend, CachedLocationResolver::new(cities, gate))
    }

    #[tokio::test]
    async fn test_second_lookup_served_from_cache() {
        let provider = Arc::new(CountingProvider::default());
        let (_, resolver) = resolver(provider.clone());

        let first = resolver.resolve("Paris").await.unwrap();
        let second = resolver.resolve("Paris").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        // Keys are case- and whitespace-insensitive.
        assert_eq!(resolver.resolve("  PARIS ").await, Some(first));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_city_not_cached() {
        let provider = Arc::new(CountingProvider::default());
        let (_, resolver) = resolver(provider.clone());

        assert_eq!(resolver.resolve("Atlantis").await, None);
        assert_eq!(resolver.resolve("Atlantis").await, None);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_blank_city_skips_provider() {
        let provider = Arc::new(CountingProvider::default());
        let (_, resolver) = resolver(provider.clone());
        assert_eq!(resolver.resolve("   ").await, None);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cache_outage_falls_through_to_provider() {
        let provider = Arc::new(CountingProvider::default());
        let (backend, resolver) = resolver(provider.clone());
        backend.set_unavailable(true);

        assert!(resolver.resolve("Paris").await.is_some());
        assert!(resolver.resolve("Paris").await.is_some());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }
}
