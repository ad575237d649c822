//! Concurrency, pacing and retry around a [`GeocodingProvider`].
//!
//! Public geocoders enforce strict usage policies (Nominatim allows one
//! request per second), so every outbound call passes through one gate:
//! a semaphore bounds in-flight lookups, a shared clock spaces calls at least
//! `min_delay` apart, and each attempt runs under its own timeout.

use crate::provider::GeocodingProvider;
use matchmaker_core::config::GeoConfig;
use matchmaker_core::{Coordinates, MatchError, MatchResult};
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub attempt_timeout: Duration,
}

impl From<&GeoConfig> for RetryPolicy {
    fn from(config: &GeoConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: Duration::from_millis(config.retry_delay_ms),
            attempt_timeout: Duration::from_millis(config.attempt_timeout_ms),
        }
    }
}

pub struct RateLimitedGeocoder<P> {
    provider: P,
    permits: Semaphore,
    min_delay: Duration,
    last_call: Mutex<Option<Instant>>,
    retry: RetryPolicy,
}

impl<P: GeocodingProvider> RateLimitedGeocoder<P> {
    pub fn new(
        provider: P,
        max_concurrent: usize,
        min_delay: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            permits: Semaphore::new(max_concurrent.max(1)),
            min_delay,
            last_call: Mutex::new(None),
            retry,
        }
    }

    pub fn from_config(provider: P, config: &GeoConfig) -> Self {
        Self::new(
            provider,
            config.max_concurrent,
            Duration::from_millis(config.min_delay_ms),
            RetryPolicy::from(config),
        )
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Wait until at least `min_delay` has passed since the previous call
    /// started. Holding the lock while sleeping serializes the spacing.
    async fn pace(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_delay {
                tokio::time::sleep(self.min_delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Look up `place`, retrying transient failures.
    ///
    /// A definitive "not found" returns immediately, and so does an error the
    /// provider will keep repeating (a malformed answer, a bad client). Once
    /// every attempt has failed the lookup gives up with `None`.
    pub async fn geocode(&self, place: &str) -> MatchResult<Option<Coordinates>> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| MatchError::Geocoding(format!("gate closed: {e}")))?;

        for attempt in 1..=self.retry.max_attempts {
            self.pace().await;
            metrics::counter!("geo.provider.calls").increment(1);

            let lookup = self.provider.geocode(place);
            let failure = match tokio::time::timeout(self.retry.attempt_timeout, lookup).await {
                Ok(Ok(result)) => {
                    debug!(place = place, attempt = attempt, found = result.is_some(), "Geocoded");
                    return Ok(result);
                }
                Ok(Err(e)) if !e.is_transient() => {
                    warn!(
                        place = place,
                        provider = self.provider.name(),
                        attempt = attempt,
                        error = %e,
                        "Geocoding failed permanently"
                    );
                    metrics::counter!("geo.provider.permanent_failures").increment(1);
                    return Ok(None);
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!("timed out after {:?}", self.retry.attempt_timeout),
            };

            warn!(
                place = place,
                provider = self.provider.name(),
                attempt = attempt,
                max_attempts = self.retry.max_attempts,
                error = %failure,
                "Geocoding attempt failed"
            );
            if attempt < self.retry.max_attempts {
                metrics::counter!("geo.provider.retries").increment(1);
                tokio::time::sleep(self.retry.delay).await;
            }
        }

        warn!(place = place, "Geocoding gave up after all attempts");
        Ok(None)
    }
}
