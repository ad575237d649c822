//! Integration test: a profile without coordinates receives nothing, its city
//! is resolved in the background, and the next request returns nearby users.

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;
    use matchmaker_cache::{
        CityCoordinateCache, MemoryBackend, RecommendationCache, SwipeExclusionCache,
    };
    use matchmaker_core::config::GeoConfig;
    use matchmaker_core::event_bus::capture_publisher;
    use matchmaker_core::types::{Gender, InterestingGender, Profile, UserId};
    use matchmaker_core::{Coordinates, MatchResult};
    use matchmaker_geo::{
        CachedLocationResolver, GeoJobHandler, GeoJobQueue, GeocodingProvider, RateLimitedGeocoder,
        RetryPolicy, SharedProvider,
    };
    use matchmaker_recommender::{
        CandidateGenerator, GeneratorSettings, HashingEncoder, InMemoryProfileStore,
        TextPreprocessor,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    const LISBON: Coordinates = Coordinates {
        latitude: 38.7223,
        longitude: -9.1393,
    };

    #[derive(Default)]
    struct LisbonOnly {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GeocodingProvider for LisbonOnly {
        async fn geocode(&self, place: &str) -> MatchResult<Option<Coordinates>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(place.eq_ignore_ascii_case("lisbon").then_some(LISBON))
        }
        fn name(&self) -> &str {
            "lisbon-only"
        }
    }

    fn profile(user_id: UserId, coords: Option<Coordinates>) -> Profile {
        Profile {
            user_id,
            about_text: String::new(),
            about_embedding: None,
            age: 28,
            gender: if user_id == 1 { Gender::Male } else { Gender::Female },
            interesting_gender: InterestingGender::Any,
            latitude: coords.map(|c| c.latitude),
            longitude: coords.map(|c| c.longitude),
            city: Some("Lisbon".into()),
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_location_resolution_unlocks_recommendations() {
        let backend = Arc::new(MemoryBackend::new());
        let hour = Duration::from_secs(3600);
        let swipes = Arc::new(SwipeExclusionCache::new(backend.clone(), hour));
        let recs = Arc::new(RecommendationCache::new(backend.clone(), swipes.clone(), hour));
        let cities = Arc::new(CityCoordinateCache::new(backend, hour));

        let nearby = Coordinates::new(LISBON.latitude + 0.01, LISBON.longitude);
        let store = Arc::new(InMemoryProfileStore::from_profiles([
            profile(1, None),
            profile(2, Some(nearby)),
            profile(3, Some(nearby)),
        ]));

        let generator = CandidateGenerator::new(
            store.clone(),
            Arc::new(HashingEncoder::default()),
            Arc::new(TextPreprocessor::new(Vec::<String>::new()).unwrap()),
            recs.clone(),
            swipes,
            GeneratorSettings::default(),
        );
        assert!(generator.get_recommendations(1, 10).await.unwrap().is_empty());

        let provider = Arc::new(LisbonOnly::default());
        let retry = RetryPolicy {
            max_attempts: 2,
            delay: Duration::from_millis(1),
            attempt_timeout: Duration::from_secs(1),
        };
        let shared = provider.clone() as SharedProvider;
        let gate = RateLimitedGeocoder::new(shared, 2, Duration::ZERO, retry);
        let resolver = Arc::new(CachedLocationResolver::new(cities, gate));
        let publisher = capture_publisher();
        let handler = Arc::new(GeoJobHandler::new(
            resolver.clone(),
            store.clone(),
            recs,
            publisher.clone(),
            "geo.notifications",
            None,
        ));
        let queue = GeoJobQueue::spawn(handler, &GeoConfig::default());

        queue.submit(1, "Lisbon").await.unwrap();
        let mut resolved = false;
        for _ in 0..200 {
            if publisher
                .on_topic("geo.notifications")
                .iter()
                .any(|e| e["status"] == "success")
            {
                resolved = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(resolved);

        let mut ids: Vec<UserId> = generator
            .get_recommendations(1, 10)
            .await
            .unwrap()
            .iter()
            .map(|c| c.user_id)
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![2, 3]);

        // The city is cached now.
        assert_eq!(resolver.resolve("lisbon").await, Some(LISBON));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }
}
