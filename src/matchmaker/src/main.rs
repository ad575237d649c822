//! Matchmaker: hybrid dating recommendations with candidate caching.
//!
//! Main entry point that wires the caches, generator, geo workers and the
//! HTTP API, then serves traffic.

mod nats;

use clap::Parser;
use matchmaker_api::{ApiServer, AppState};
use matchmaker_cache::{
    CacheBackend, CityCoordinateCache, MemoryBackend, RecommendationCache, RedisBackend,
    SwipeExclusionCache,
};
use matchmaker_core::config::AppConfig;
use matchmaker_core::event_bus::noop_publisher;
use matchmaker_core::types::Profile;
use matchmaker_core::EventPublisher;
use matchmaker_geo::{
    CachedLocationResolver, GeoJobHandler, GeoJobQueue, NominatimProvider, RateLimitedGeocoder,
    SharedProvider,
};
use matchmaker_recommender::{
    CandidateGenerator, GeneratorSettings, HashingEncoder, InMemoryProfileStore, SwipeRecorder,
    TextPreprocessor,
};
use nats::NatsEventPublisher;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "matchmaker")]
#[command(about = "Hybrid dating recommendations with candidate caching")]
#[command(version)]
struct Cli {
    /// TOML config file layered under MATCHMAKER__* environment variables
    #[arg(long, env = "MATCHMAKER_CONFIG")]
    config: Option<String>,

    /// Node identifier (overrides config)
    #[arg(long, env = "MATCHMAKER__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "MATCHMAKER__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// JSON file with an array of profiles to load into the in-process store
    #[arg(long)]
    profiles: Option<String>,

    /// Use the in-process cache backend instead of Redis
    #[arg(long, default_value_t = false)]
    memory_cache: bool,

    /// Do not connect to NATS; events are only logged
    #[arg(long, default_value_t = false)]
    no_nats: bool,
}

fn load_profiles(path: &str) -> anyhow::Result<Vec<Profile>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "matchmaker=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Matchmaker starting up");

    // Load configuration
    let mut config = match cli.config.as_deref() {
        Some(path) => AppConfig::load(Some(path))?,
        None => AppConfig::load(None).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load config, using defaults");
            AppConfig::default()
        }),
    };

    // Apply CLI overrides
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    config.validate()?;

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        mix_ratio = config.recommender.mix_ratio,
        max_distance_km = config.recommender.max_distance_km,
        "Configuration loaded"
    );

    // Cache backend
    let mut memory_backend = None;
    let backend: Arc<dyn CacheBackend> = if cli.memory_cache {
        let memory = Arc::new(MemoryBackend::new());
        memory_backend = Some(memory.clone());
        info!("Using in-process cache backend");
        memory
    } else {
        match RedisBackend::new(&config.redis).await {
            Ok(redis) => Arc::new(redis),
            Err(e) => {
                error!(error = %e, "Failed to connect to Redis");
                return Err(e);
            }
        }
    };

    let ttl = &config.cache;
    let swipes = Arc::new(SwipeExclusionCache::new(
        backend.clone(),
        Duration::from_secs(ttl.swipe_ttl_secs),
    ));
    let recommendations = Arc::new(RecommendationCache::new(
        backend.clone(),
        swipes.clone(),
        Duration::from_secs(ttl.recommendation_ttl_secs),
    ));
    let cities = Arc::new(CityCoordinateCache::new(
        backend.clone(),
        Duration::from_secs(ttl.city_ttl_secs),
    ));

    // Event publisher
    let publisher: Arc<dyn EventPublisher> = if cli.no_nats {
        info!("NATS disabled, events will only be logged");
        noop_publisher()
    } else {
        match NatsEventPublisher::connect(&config.nats).await {
            Ok(nats) => Arc::new(nats),
            Err(e) => {
                error!(error = %e, "Failed to connect to NATS, events will only be logged");
                noop_publisher()
            }
        }
    };

    // Profile store
    let store = Arc::new(InMemoryProfileStore::new());
    if let Some(path) = cli.profiles.as_deref() {
        for profile in load_profiles(path)? {
            store.insert(profile);
        }
        info!(path = path, count = store.len(), "Profiles loaded");
    }

    // Recommendation engine
    let generator = Arc::new(CandidateGenerator::new(
        store.clone(),
        Arc::new(HashingEncoder::new(config.embedding.dimensions)),
        Arc::new(TextPreprocessor::new(config.recommender.stop_words.iter())?),
        recommendations.clone(),
        swipes.clone(),
        GeneratorSettings::from(&config.recommender),
    ));
    let recorder = Arc::new(SwipeRecorder::new(
        swipes,
        publisher.clone(),
        config.nats.swipes_topic.clone(),
    ));

    // Geo resolution workers
    let provider: SharedProvider = Arc::new(NominatimProvider::new(&config.geo)?);
    let resolver = Arc::new(CachedLocationResolver::new(
        cities,
        RateLimitedGeocoder::from_config(provider, &config.geo),
    ));
    let handler = Arc::new(GeoJobHandler::new(
        resolver,
        store,
        recommendations,
        publisher,
        config.nats.geo_topic.clone(),
        config.geo.fallback(),
    ));
    let geo_jobs = Arc::new(GeoJobQueue::spawn(handler, &config.geo));

    // Start API server
    let state = AppState {
        generator,
        swipes: recorder,
        geo_jobs,
        cache: backend,
        default_count: config.recommender.default_count,
        max_count: config.recommender.max_count,
        node_id: config.node_id.clone(),
        start_time: Instant::now(),
    };
    let api_server = ApiServer::new(config.clone(), state);

    // Start metrics exporter
    if let Err(e) = api_server.start_metrics() {
        error!(error = %e, "Failed to start metrics exporter");
    }

    // Spawn cache maintenance task
    if let Some(memory) = memory_backend {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                let evicted = memory.evict_expired();
                if evicted > 0 {
                    info!(evicted = evicted, remaining = memory.len(), "Cache maintenance");
                }
            }
        });
    }

    info!("Matchmaker is ready to serve traffic");

    // Start HTTP server (blocks until shutdown)
    api_server.start_http().await?;

    Ok(())
}
