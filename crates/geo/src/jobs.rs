//! Background geo-resolution jobs.
//!
//! `submit` announces a `waited` event and hands the job to a small worker
//! pool without waiting; the pool resolves the city, writes the coordinates
//! to the profile and announces the terminal `success` or `failed` event.
//! Deliveries that fail to persist are retried up to `max_deliveries`.
//!
//! The channel holds `queue_capacity` jobs. Beyond that a job is parked in
//! its own task until a slot frees up, so neither callers nor workers ever
//! wait on a full queue. Lookup throughput is bounded by the geocoding gate.

use crate::resolver::CachedLocationResolver;
use matchmaker_cache::RecommendationCache;
use matchmaker_core::config::GeoConfig;
use matchmaker_core::event_bus::{publish_event, EventPublisher};
use matchmaker_core::types::{GeoResolutionEvent, GeoStatus, UserId};
use matchmaker_core::{Coordinates, MatchError, MatchResult, ProfileStore};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct GeoJob {
    pub job_id: Uuid,
    pub user_id: UserId,
    pub city: String,
    /// Delivery attempts so far.
    pub deliveries: u32,
}

impl GeoJob {
    pub fn new(user_id: UserId, city: impl Into<String>) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            user_id,
            city: city.into(),
            deliveries: 0,
        }
    }
}

/// Applies a single job delivery.
pub struct GeoJobHandler {
    resolver: Arc<CachedLocationResolver>,
    store: Arc<dyn ProfileStore>,
    recommendations: Arc<RecommendationCache>,
    publisher: Arc<dyn EventPublisher>,
    topic: String,
    fallback: Option<Coordinates>,
}

impl GeoJobHandler {
    pub fn new(
        resolver: Arc<CachedLocationResolver>,
        store: Arc<dyn ProfileStore>,
        recommendations: Arc<RecommendationCache>,
        publisher: Arc<dyn EventPublisher>,
        topic: impl Into<String>,
        fallback: Option<Coordinates>,
    ) -> Self {
        Self {
            resolver,
            store,
            recommendations,
            publisher,
            topic: topic.into(),
            fallback,
        }
    }

    /// Resolve and persist. Re-running a delivery writes the same
    /// coordinates and clears the same cache entry. `Err` asks for a
    /// redelivery.
    pub async fn process(&self, job: &GeoJob) -> MatchResult<GeoStatus> {
        match self.resolver.resolve(&job.city).await {
            Some(coords) => {
                self.apply(job.user_id, coords).await?;
                publish_event(
                    self.publisher.as_ref(),
                    &self.topic,
                    &GeoResolutionEvent::success(
                        job.job_id,
                        job.user_id,
                        job.city.clone(),
                        coords,
                    ),
                );
                metrics::counter!("geo.jobs.success").increment(1);
                info!(user_id = job.user_id, city = %job.city, "Location resolved");
                Ok(GeoStatus::Success)
            }
            None => {
                if let Some(fallback) = self.fallback {
                    self.apply(job.user_id, fallback).await?;
                    debug!(user_id = job.user_id, "Fallback coordinates applied");
                }
                self.fail(job, "city could not be resolved");
                Ok(GeoStatus::Failed)
            }
        }
    }

    async fn apply(&self, user_id: UserId, coords: Coordinates) -> MatchResult<()> {
        self.store.update_coordinates(user_id, coords).await?;
        self.recommendations.clear(user_id).await;
        Ok(())
    }

    fn fail(&self, job: &GeoJob, reason: &str) {
        publish_event(
            self.publisher.as_ref(),
            &self.topic,
            &GeoResolutionEvent::failed(job.job_id, job.user_id, job.city.clone(), reason),
        );
        metrics::counter!("geo.jobs.failed").increment(1);
        warn!(user_id = job.user_id, city = %job.city, reason = reason, "Location not resolved");
    }
}

/// Handle for submitting jobs to the worker pool.
pub struct GeoJobQueue {
    sender: mpsc::Sender<GeoJob>,
    handler: Arc<GeoJobHandler>,
}

impl GeoJobQueue {
    /// Create the channel and spawn `config.workers` workers on the current
    /// runtime. Workers exit once every queue handle is dropped.
    pub fn spawn(handler: Arc<GeoJobHandler>, config: &GeoConfig) -> Self {
        let (sender, receiver) = mpsc::channel::<GeoJob>(config.queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let max_deliveries = config.max_deliveries.max(1);
        let workers = config.workers.max(1);

        for worker_id in 0..workers {
            let receiver = receiver.clone();
            let handler = handler.clone();
            let requeue = sender.downgrade();
            tokio::spawn(async move {
                run_worker(worker_id, receiver, handler, requeue, max_deliveries).await;
            });
        }

        info!(
            workers = workers,
            capacity = config.queue_capacity,
            max_deliveries = max_deliveries,
            "Geo job queue started"
        );
        Self { sender, handler }
    }

    /// Announce `waited` and enqueue. Returns without waiting for a worker
    /// or for queue capacity.
    pub async fn submit(&self, user_id: UserId, city: &str) -> MatchResult<GeoResolutionEvent> {
        let job = GeoJob::new(user_id, city.trim());
        let waited = GeoResolutionEvent::waited(job.job_id, user_id, job.city.clone());
        publish_event(self.handler.publisher.as_ref(), &self.handler.topic, &waited);

        if let Err(job) = enqueue(&self.sender, job, &self.handler) {
            self.handler.fail(&job, "geo job queue closed");
            return Err(MatchError::Geocoding("geo job queue closed".into()));
        }
        metrics::counter!("geo.jobs.submitted").increment(1);
        Ok(waited)
    }
}

/// Put `job` on the channel. When it is full the send moves to a spawned
/// task; only a closed channel hands the job back.
fn enqueue(
    sender: &mpsc::Sender<GeoJob>,
    job: GeoJob,
    handler: &Arc<GeoJobHandler>,
) -> Result<(), GeoJob> {
    match sender.try_send(job) {
        Ok(()) => Ok(()),
        Err(TrySendError::Closed(job)) => Err(job),
        Err(TrySendError::Full(job)) => {
            metrics::counter!("geo.jobs.deferred").increment(1);
            debug!(job_id = %job.job_id, "Geo job queue full, deferring");
            let sender = sender.clone();
            let handler = handler.clone();
            tokio::spawn(async move {
                if let Err(mpsc::error::SendError(job)) = sender.send(job).await {
                    handler.fail(&job, "geo job queue closed");
                }
            });
            Ok(())
        }
    }
}

async fn run_worker(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<GeoJob>>>,
    handler: Arc<GeoJobHandler>,
    requeue: mpsc::WeakSender<GeoJob>,
    max_deliveries: u32,
) {
    loop {
        let next = receiver.lock().await.recv().await;
        let Some(mut job) = next else {
            debug!(worker_id = worker_id, "Geo worker stopping");
            break;
        };
        job.deliveries += 1;

        let e = match handler.process(&job).await {
            Ok(status) => {
                debug!(
                    worker_id = worker_id,
                    job_id = %job.job_id,
                    status = ?status,
                    "Geo job done"
                );
                continue;
            }
            Err(e) => e,
        };

        if job.deliveries >= max_deliveries {
            error!(
                job_id = %job.job_id,
                deliveries = job.deliveries,
                error = %e,
                "Geo job exhausted deliveries"
            );
            handler.fail(&job, &e.to_string());
            continue;
        }

        warn!(
            job_id = %job.job_id,
            deliveries = job.deliveries,
            error = %e,
            "Geo job failed, redelivering"
        );
        let Some(sender) = requeue.upgrade() else {
            handler.fail(&job, "geo job queue closed");
            continue;
        };
        if let Err(job) = enqueue(&sender, job, &handler) {
            handler.fail(&job, "geo job queue closed");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::gate::{RateLimitedGeocoder, RetryPolicy};
    use crate::provider::GeocodingProvider;
    use crate::resolver::SharedProvider;
    use async_trait::async_trait;
    use matchmaker_cache::{CityCoordinateCache, MemoryBackend, SwipeExclusionCache};
    use matchmaker_core::event_bus::{capture_publisher, CapturePublisher};
    use matchmaker_core::types::{Candidate, Gender, InterestingGender, Profile};
    use matchmaker_recommender::InMemoryProfileStore;
    use std::time::Duration;

    const TOPIC: &str = "geo.notifications";

    struct KnownCities;

    #[async_trait]
    impl GeocodingProvider for KnownCities {
        async fn geocode(&self, place: &str) -> MatchResult<Option<Coordinates>> {
            Ok(match place.to_lowercase().as_str() {
                "paris" => Some(Coordinates::new(48.8566, 2.3522)),
                _ => None,
            })
        }
        fn name(&self) -> &str {
            "known-cities"
        }
    }

    /// Answers like [`KnownCities`] after a fixed delay.
    struct SlowCities(Duration);

    #[async_trait]
    impl GeocodingProvider for SlowCities {
        async fn geocode(&self, place: &str) -> MatchResult<Option<Coordinates>> {
            tokio::time::sleep(self.0).await;
            KnownCities.geocode(place).await
        }
        fn name(&self) -> &str {
            "slow-cities"
        }
    }

    struct Fixture {
        store: Arc<InMemoryProfileStore>,
        recs: Arc<RecommendationCache>,
        publisher: Arc<CapturePublisher>,
        handler: Arc<GeoJobHandler>,
    }

    fn fixture(fallback: Option<Coordinates>) -> Fixture {
        fixture_with(Arc::new(KnownCities), fallback)
    }

    fn fixture_with(provider: SharedProvider, fallback: Option<Coordinates>) -> Fixture {
        let backend = Arc::new(MemoryBackend::new());
        let hour = Duration::from_secs(3600);
        let swipes = Arc::new(SwipeExclusionCache::new(backend.clone(), hour));
        let recs = Arc::new(RecommendationCache::new(backend.clone(), swipes, hour));
        let cities = Arc::new(CityCoordinateCache::new(backend, hour));
        let retry = RetryPolicy {
            max_attempts: 1,
            delay: Duration::ZERO,
            attempt_timeout: Duration::from_secs(1),
        };
        let gate = RateLimitedGeocoder::new(provider, 4, Duration::ZERO, retry);
        let resolver = Arc::new(CachedLocationResolver::new(cities, gate));

        let store = Arc::new(InMemoryProfileStore::new());
        store.insert(Profile {
            user_id: 1,
            about_text: String::new(),
            about_embedding: None,
            age: 30,
            gender: Gender::Female,
            interesting_gender: InterestingGender::Any,
            latitude: None,
            longitude: None,
            city: Some("Paris".into()),
            is_active: true,
        });

        let publisher = capture_publisher();
        let handler = Arc::new(GeoJobHandler::new(
            resolver,
            store.clone(),
            recs.clone(),
            publisher.clone(),
            TOPIC,
            fallback,
        ));
        Fixture {
            store,
            recs,
            publisher,
            handler,
        }
    }

    fn config(max_deliveries: u32) -> GeoConfig {
        GeoConfig {
            workers: 2,
            queue_capacity: 8,
            max_deliveries,
            ..GeoConfig::default()
        }
    }

    async fn wait_for_terminal(publisher: &CapturePublisher) -> Vec<serde_json::Value> {
        wait_for_terminals(publisher, 1).await
    }

    async fn wait_for_terminals(publisher: &CapturePublisher, n: usize) -> Vec<serde_json::Value> {
        for _ in 0..300 {
            let events = publisher.on_topic(TOPIC);
            if events.iter().filter(|e| e["status"] != "waited").count() >= n {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {n} terminal geo events");
    }

    #[tokio::test]
    async fn test_success_updates_profile_and_clears_recommendations() {
        let f = fixture(None);
        f.recs.set(1, &[Candidate::new(7, 1.0)]).await;
        let queue = GeoJobQueue::spawn(f.handler.clone(), &config(3));

        let waited = queue.submit(1, " Paris ").await.unwrap();
        assert_eq!(waited.status, GeoStatus::Waited);

        let events = wait_for_terminal(&f.publisher).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["status"], "waited");
        assert_eq!(events[1]["status"], "success");
        assert_eq!(events[1]["job_id"], events[0]["job_id"]);

        let profile = f.store.get_profile(1).await.unwrap().unwrap();
        assert_eq!(profile.coordinates(), Some(Coordinates::new(48.8566, 2.3522)));
        assert!(f.recs.get(1).await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_city_fails_without_fallback() {
        let f = fixture(None);
        let queue = GeoJobQueue::spawn(f.handler.clone(), &config(3));
        queue.submit(1, "Atlantis").await.unwrap();

        let events = wait_for_terminal(&f.publisher).await;
        assert_eq!(events[1]["status"], "failed");
        assert!(f.store.get_profile(1).await.unwrap().unwrap().coordinates().is_none());
    }

    #[tokio::test]
    async fn test_unknown_city_uses_fallback() {
        let fallback = Coordinates::new(55.7558, 37.6173);
        let f = fixture(Some(fallback));
        let status = f.handler.process(&GeoJob::new(1, "Atlantis")).await.unwrap();
        assert_eq!(status, GeoStatus::Failed);

        let profile = f.store.get_profile(1).await.unwrap().unwrap();
        assert_eq!(profile.coordinates(), Some(fallback));
        assert_eq!(f.publisher.on_topic(TOPIC)[0]["status"], "failed");
    }

    #[tokio::test]
    async fn test_redelivery_gives_up_after_max() {
        let f = fixture(None);
        f.store.remove(1);
        let queue = GeoJobQueue::spawn(f.handler.clone(), &config(3));
        queue.submit(1, "Paris").await.unwrap();

        let events = wait_for_terminal(&f.publisher).await;
        // Give any stray redelivery a chance to show up.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let events_after = f.publisher.on_topic(TOPIC);
        assert_eq!(events.len(), 2);
        assert_eq!(events_after.len(), 2);
        assert_eq!(events[1]["status"], "failed");
        assert!(events[1]["reason"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_submit_does_not_wait_for_busy_workers() {
        let f = fixture_with(Arc::new(SlowCities(Duration::from_secs(3))), None);
        let config = GeoConfig {
            workers: 1,
            queue_capacity: 1,
            ..GeoConfig::default()
        };
        let queue = GeoJobQueue::spawn(f.handler.clone(), &config);

        for user_id in 0..3 {
            let submitted =
                tokio::time::timeout(Duration::from_millis(500), queue.submit(user_id, "Paris"))
                    .await;
            assert!(submitted.is_ok(), "submit {user_id} waited on the queue");
            assert_eq!(submitted.unwrap().unwrap().status, GeoStatus::Waited);
        }
        assert_eq!(f.publisher.on_topic(TOPIC).len(), 3);
    }

    #[tokio::test]
    async fn test_redelivery_survives_a_full_queue() {
        let f = fixture_with(Arc::new(SlowCities(Duration::from_millis(100))), None);
        let config = GeoConfig {
            workers: 1,
            queue_capacity: 1,
            max_deliveries: 3,
            ..GeoConfig::default()
        };
        let queue = GeoJobQueue::spawn(f.handler.clone(), &config);

        // User 99 has no profile, so every delivery fails to persist while
        // the job for user 1 occupies the only slot.
        queue.submit(99, "Paris").await.unwrap();
        queue.submit(1, "Paris").await.unwrap();

        let events = wait_for_terminals(&f.publisher, 2).await;
        let terminal: Vec<_> = events.iter().filter(|e| e["status"] != "waited").collect();
        assert_eq!(terminal.len(), 2);

        let missing = terminal.iter().find(|e| e["user_id"] == 99).unwrap();
        assert_eq!(missing["status"], "failed");
        assert!(missing["reason"].as_str().unwrap().contains("not found"));
        let present = terminal.iter().find(|e| e["user_id"] == 1).unwrap();
        assert_eq!(present["status"], "success");
    }

    #[tokio::test]
    async fn test_processing_is_idempotent() {
        let f = fixture(None);
        let job = GeoJob::new(1, "Paris");
        assert_eq!(f.handler.process(&job).await.unwrap(), GeoStatus::Success);
        assert_eq!(f.handler.process(&job).await.unwrap(), GeoStatus::Success);

        let profile = f.store.get_profile(1).await.unwrap().unwrap();
        assert_eq!(profile.coordinates(), Some(Coordinates::new(48.8566, 2.3522)));
        let events = f.publisher.on_topic(TOPIC);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["job_id"], events[1]["job_id"]);
        assert_eq!(events[0]["latitude"], events[1]["latitude"]);
    }
}
