//! Per-user set of profiles the user has already acted upon.

use crate::backend::CacheBackend;
use crate::keys::swipes_key;
use matchmaker_core::types::UserId;
use matchmaker_core::MatchResult;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub struct SwipeExclusionCache {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
}

impl SwipeExclusionCache {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    /// Record that `from_user_id` acted on `to_user_id` and refresh the TTL.
    pub async fn add(&self, from_user_id: UserId, to_user_id: UserId) -> MatchResult<()> {
        self.backend
            .set_add(&swipes_key(from_user_id), &to_user_id.to_string(), self.ttl)
            .await
    }

    /// All ids `user_id` has swiped. Degrades to an empty set if the backend
    /// is unreachable.
    pub async fn get_all(&self, user_id: UserId) -> HashSet<UserId> {
        match self.backend.set_members(&swipes_key(user_id)).await {
            Ok(members) => members
                .iter()
                .filter_map(|m| m.parse::<UserId>().ok())
                .collect(),
            Err(e) => {
                warn!(
                    user_id = user_id,
                    error = %e,
                    "Swipe cache read failed, assuming no exclusions"
                );
                HashSet::new()
            }
        }
    }

    pub async fn has(&self, from_user_id: UserId, to_user_id: UserId) -> bool {
        self.backend
            .set_contains(&swipes_key(from_user_id), &to_user_id.to_string())
            .await
            .unwrap_or_else(|e| {
                warn!(user_id = from_user_id, error = %e, "Swipe cache lookup failed");
                false
            })
    }

    pub async fn clear(&self, user_id: UserId) -> MatchResult<()> {
        self.backend.delete(&swipes_key(user_id)).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::local::MemoryBackend;

    fn cache(ttl: Duration) -> (Arc<MemoryBackend>, SwipeExclusionCache) {
        let backend = Arc::new(MemoryBackend::new());
        (backend.clone(), SwipeExclusionCache::new(backend, ttl))
    }

    #[tokio::test]
    async fn test_add_and_lookup() {
        let (_, swipes) = cache(Duration::from_secs(60));
        swipes.add(1, 2).await.unwrap();
        swipes.add(1, 3).await.unwrap();
        swipes.add(1, 3).await.unwrap();
        swipes.add(4, 1).await.unwrap();

        assert_eq!(swipes.get_all(1).await, HashSet::from([2, 3]));
        assert!(swipes.has(1, 2).await);
        assert!(!swipes.has(2, 1).await);
        assert!(swipes.has(4, 1).await);
    }

    #[tokio::test]
    async fn test_lazily_empty() {
        let (_, swipes) = cache(Duration::from_secs(60));
        assert!(swipes.get_all(99).await.is_empty());
        assert!(!swipes.has(99, 1).await);
    }

    #[tokio::test]
    async fn test_expiry_recycles_pool() {
        let (_, swipes) = cache(Duration::from_millis(20));
        swipes.add(1, 2).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(swipes.get_all(1).await.is_empty());
    }

    #[tokio::test]
    async fn test_clear() {
        let (_, swipes) = cache(Duration::from_secs(60));
        swipes.add(1, 2).await.unwrap();
        swipes.clear(1).await.unwrap();
        assert!(!swipes.has(1, 2).await);
    }

    #[tokio::test]
    async fn test_outage_degrades() {
        let (backend, swipes) = cache(Duration::from_secs(60));
        swipes.add(1, 2).await.unwrap();
        backend.set_unavailable(true);
        assert!(swipes.add(1, 3).await.is_err());
        assert!(swipes.get_all(1).await.is_empty());
        assert!(!swipes.has(1, 2).await);
    }
}
