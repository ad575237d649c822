//! In-process cache store backed by DashMap for lock-free concurrent access.
//! Used for single-node deployments and as the backend in tests.

use crate::backend::CacheBackend;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use matchmaker_core::{MatchError, MatchResult};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
enum Value {
    Scalar(String),
    Set(HashSet<String>),
    List(Vec<String>),
}

struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// DashMap-backed [`CacheBackend`] with per-key expiry.
#[derive(Default)]
pub struct MemoryBackend {
    store: Arc<DashMap<String, CacheEntry>>,
    unavailable: AtomicBool,
}

fn wrong_type(key: &str) -> MatchError {
    MatchError::Cache(format!("WRONGTYPE operation against key '{key}'"))
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every operation fails until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> MatchResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            metrics::counter!("cache.backend.errors").increment(1);
            return Err(MatchError::Cache("memory backend marked unavailable".into()));
        }
        Ok(())
    }

    /// Live value at `key`, dropping it first if it has expired.
    fn live(&self, key: &str) -> Option<Value> {
        let entry = self.store.get(key)?;
        if entry.is_expired() {
            drop(entry);
            self.store.remove_if(key, |_, e| e.is_expired());
            return None;
        }
        Some(entry.value.clone())
    }

    /// Remove expired entries. Call this periodically from a background task.
    pub fn evict_expired(&self) -> usize {
        let before = self.store.len();
        self.store.retain(|_, entry| !entry.is_expired());
        before.saturating_sub(self.store.len())
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> MatchResult<Option<String>> {
        self.check_available()?;
        match self.live(key) {
            None => Ok(None),
            Some(Value::Scalar(s)) => Ok(Some(s)),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> MatchResult<()> {
        self.check_available()?;
        self.store.insert(
            key.to_string(),
            CacheEntry {
                value: Value::Scalar(value.to_string()),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> MatchResult<()> {
        self.check_available()?;
        self.store.remove(key);
        Ok(())
    }

    async fn set_add(&self, key: &str, member: &str, ttl: Duration) -> MatchResult<()> {
        self.check_available()?;
        let expires_at = Instant::now() + ttl;
        match self.store.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if entry.is_expired() {
                    entry.value = Value::Set(HashSet::new());
                }
                match &mut entry.value {
                    Value::Set(members) => {
                        members.insert(member.to_string());
                    }
                    _ => return Err(wrong_type(key)),
                }
                entry.expires_at = expires_at;
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry {
                    value: Value::Set(HashSet::from([member.to_string()])),
                    expires_at,
                });
            }
        }
        Ok(())
    }

    async fn set_contains(&self, key: &str, member: &str) -> MatchResult<bool> {
        self.check_available()?;
        match self.live(key) {
            None => Ok(false),
            Some(Value::Set(members)) => Ok(members.contains(member)),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn set_members(&self, key: &str) -> MatchResult<Vec<String>> {
        self.check_available()?;
        match self.live(key) {
            None => Ok(Vec::new()),
            Some(Value::Set(members)) => Ok(members.into_iter().collect()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn list_replace(&self, key: &str, items: &[String], ttl: Duration) -> MatchResult<()> {
        self.check_available()?;
        if items.is_empty() {
            self.store.remove(key);
            return Ok(());
        }
        self.store.insert(
            key.to_string(),
            CacheEntry {
                value: Value::List(items.to_vec()),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn list_range(&self, key: &str) -> MatchResult<Vec<String>> {
        self.check_available()?;
        match self.live(key) {
            None => Ok(Vec::new()),
            Some(Value::List(items)) => Ok(items),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn ping(&self) -> MatchResult<()> {
        self.check_available()
    }
}
