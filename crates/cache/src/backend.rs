//! Backend-agnostic TTL key/value store used by every cache in the engine.
//!
//! Three shapes are needed: scalars (city coordinates), sets (swipe
//! exclusions) and ordered lists (recommendation queues). Each method is a
//! single atomic operation against the backing store.

use async_trait::async_trait;
use matchmaker_core::MatchResult;
use std::time::Duration;

#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> MatchResult<Option<String>>;

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> MatchResult<()>;

    async fn delete(&self, key: &str) -> MatchResult<()>;

    /// Add `member` to the set at `key` and reset the key's TTL.
    async fn set_add(&self, key: &str, member: &str, ttl: Duration) -> MatchResult<()>;

    async fn set_contains(&self, key: &str, member: &str) -> MatchResult<bool>;

    async fn set_members(&self, key: &str) -> MatchResult<Vec<String>>;

    /// Replace the list at `key` with `items` (in order) and reset its TTL.
    async fn list_replace(&self, key: &str, items: &[String], ttl: Duration) -> MatchResult<()>;

    async fn list_range(&self, key: &str) -> MatchResult<Vec<String>>;

    /// Connectivity check used by readiness.
    async fn ping(&self) -> MatchResult<()> {
        Ok(())
    }
}

/// Redis only accepts whole seconds; never round a positive TTL down to zero.
pub(crate) fn ttl_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs();
    if ttl.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs.max(1)
    }
}
