//! Short-lived per-user queue of already computed recommendations.
//!
//! Caching is best-effort: every backend failure is logged and reported to
//! the caller as a miss, which simply triggers recomputation.

use crate::backend::CacheBackend;
use crate::keys::recommendations_key;
use crate::swipes::SwipeExclusionCache;
use matchmaker_core::types::{Candidate, UserId};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct RecommendationCache {
    backend: Arc<dyn CacheBackend>,
    swipes: Arc<SwipeExclusionCache>,
    ttl: Duration,
}

impl RecommendationCache {
    pub fn new(
        backend: Arc<dyn CacheBackend>,
        swipes: Arc<SwipeExclusionCache>,
        ttl: Duration,
    ) -> Self {
        Self {
            backend,
            swipes,
            ttl,
        }
    }

    /// Cached queue for `user_id` with already-swiped users removed.
    /// An empty result means the caller has to recompute.
    pub async fn get(&self, user_id: UserId) -> Vec<Candidate> {
        let excluded = self.swipes.get_all(user_id).await;
        self.get_filtered(user_id, &excluded).await
    }

    /// Like [`get`](Self::get) with an exclusion set the caller already holds.
    pub async fn get_filtered(
        &self,
        user_id: UserId,
        excluded: &HashSet<UserId>,
    ) -> Vec<Candidate> {
        let raw = match self.backend.list_range(&recommendations_key(user_id)).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    user_id = user_id,
                    error = %e,
                    "Recommendation cache read failed, treating as miss"
                );
                return Vec::new();
            }
        };

        let cached: Vec<Candidate> = raw
            .iter()
            .filter_map(|item| match serde_json::from_str::<Candidate>(item) {
                Ok(candidate) => Some(candidate),
                Err(e) => {
                    warn!(
                        user_id = user_id,
                        error = %e,
                        "Dropping malformed cached recommendation"
                    );
                    None
                }
            })
            .collect();

        let total = cached.len();
        let filtered: Vec<Candidate> = cached
            .into_iter()
            .filter(|c| !excluded.contains(&c.user_id))
            .collect();

        if filtered.is_empty() {
            metrics::counter!("recs.cache.miss").increment(1);
        } else {
            metrics::counter!("recs.cache.hit").increment(1);
        }
        debug!(
            user_id = user_id,
            cached = total,
            served = filtered.len(),
            "Recommendation cache lookup"
        );
        filtered
    }

    /// Replace the cached queue. Empty lists are never stored.
    pub async fn set(&self, user_id: UserId, candidates: &[Candidate]) {
        if candidates.is_empty() {
            return;
        }
        let items: Vec<String> = match candidates
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<_, _>>()
        {
            Ok(items) => items,
            Err(e) => {
                warn!(user_id = user_id, error = %e, "Failed to encode recommendations for cache");
                return;
            }
        };

        if let Err(e) = self
            .backend
            .list_replace(&recommendations_key(user_id), &items, self.ttl)
            .await
        {
            warn!(user_id = user_id, error = %e, "Recommendation cache write failed");
        }
    }

    /// Drop the cached queue, e.g. after the user's text or location changed.
    pub async fn clear(&self, user_id: UserId) {
        if let Err(e) = self.backend.delete(&recommendations_key(user_id)).await {
            warn!(user_id = user_id, error = %e, "Recommendation cache invalidation failed");
        } else {
            debug!(user_id = user_id, "Recommendation cache invalidated");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::local::MemoryBackend;

    const HOUR: Duration = Duration::from_secs(3600);

    fn caches() -> (Arc<MemoryBackend>, Arc<SwipeExclusionCache>, RecommendationCache) {
        let backend = Arc::new(MemoryBackend::new());
        let swipes = Arc::new(SwipeExclusionCache::new(backend.clone(), HOUR));
        let recs = RecommendationCache::new(backend.clone(), swipes.clone(), HOUR);
        (backend, swipes, recs)
    }

    #[tokio::test]
    async fn test_set_then_get_preserves_order() {
        let (_, _, recs) = caches();
        let list = vec![
            Candidate::new(5, 12.5),
            Candidate::new(3, 0.4),
            Candidate::new(9, 7.0),
        ];
        recs.set(1, &list).await;
        assert_eq!(recs.get(1).await, list);
        // Reading again within the TTL yields the same list.
        assert_eq!(recs.get(1).await, list);
    }

    #[tokio::test]
    async fn test_get_filters_swiped() {
        let (_, swipes, recs) = caches();
        recs.set(1, &[Candidate::new(2, 1.0), Candidate::new(3, 2.0)]).await;
        swipes.add(1, 2).await.unwrap();
        assert_eq!(recs.get(1).await, vec![Candidate::new(3, 2.0)]);
    }

    #[tokio::test]
    async fn test_fully_swiped_queue_is_a_miss() {
        let (_, swipes, recs) = caches();
        recs.set(1, &[Candidate::new(2, 1.0)]).await;
        swipes.add(1, 2).await.unwrap();
        assert!(recs.get(1).await.is_empty());
    }

    #[tokio::test]
    async fn test_set_replaces_and_ignores_empty() {
        let (_, _, recs) = caches();
        recs.set(1, &[Candidate::new(2, 1.0)]).await;
        recs.set(1, &[]).await;
        assert_eq!(recs.get(1).await, vec![Candidate::new(2, 1.0)]);

        recs.set(1, &[Candidate::new(4, 3.0)]).await;
        assert_eq!(recs.get(1).await, vec![Candidate::new(4, 3.0)]);
    }

    #[tokio::test]
    async fn test_clear() {
        let (_, _, recs) = caches();
        recs.set(1, &[Candidate::new(2, 1.0)]).await;
        recs.clear(1).await;
        assert!(recs.get(1).await.is_empty());
    }

    #[tokio::test]
    async fn test_backend_outage_is_a_miss() {
        let (backend, _, recs) = caches();
        recs.set(1, &[Candidate::new(2, 1.0)]).await;
        backend.set_unavailable(true);
        assert!(recs.get(1).await.is_empty());
        // Writes and invalidations must not panic either.
        recs.set(1, &[Candidate::new(3, 1.0)]).await;
        recs.clear(1).await;
    }
}
