use serde::Deserialize;

use crate::error::MatchError;
use crate::geo::Coordinates;

/// Root application configuration. Loaded from environment variables
/// with the prefix `MATCHMAKER__` and an optional TOML config file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub nats: NatsConfig,
    #[serde(default)]
    pub recommender: RecommenderConfig,
    #[serde(default)]
    pub cache: CacheTtlConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub geo: GeoConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_urls")]
    pub urls: Vec<String>,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    #[serde(default = "default_nats_urls")]
    pub urls: Vec<String>,
    #[serde(default = "default_geo_topic")]
    pub geo_topic: String,
    #[serde(default = "default_swipes_topic")]
    pub swipes_topic: String,
    #[serde(default = "default_max_reconnects")]
    pub max_reconnects: usize,
}

/// Tuning knobs for the hybrid candidate generator.
#[derive(Debug, Clone, Deserialize)]
pub struct RecommenderConfig {
    /// Share of each batch filled by embedding similarity.
    #[serde(default = "default_mix_ratio")]
    pub mix_ratio: f64,
    #[serde(default = "default_max_distance_km")]
    pub max_distance_km: f64,
    /// Upper bound on candidates scored by the content phase.
    #[serde(default = "default_content_pool_limit")]
    pub content_pool_limit: usize,
    #[serde(default = "default_count")]
    pub default_count: usize,
    #[serde(default = "default_max_count")]
    pub max_count: usize,
    #[serde(default)]
    pub stop_words: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheTtlConfig {
    #[serde(default = "default_recommendation_ttl_secs")]
    pub recommendation_ttl_secs: u64,
    #[serde(default = "default_swipe_ttl_secs")]
    pub swipe_ttl_secs: u64,
    #[serde(default = "default_city_ttl_secs")]
    pub city_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeoConfig {
    #[serde(default = "default_provider_url")]
    pub provider_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_max_deliveries")]
    pub max_deliveries: u32,
    #[serde(default)]
    pub fallback_latitude: Option<f64>,
    #[serde(default)]
    pub fallback_longitude: Option<f64>,
}

impl GeoConfig {
    /// Coordinate written to profiles whose city could not be resolved.
    pub fn fallback(&self) -> Option<Coordinates> {
        match (self.fallback_latitude, self.fallback_longitude) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        }
    }
}

// Default functions
fn default_node_id() -> String {
    "matchmaker-01".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_redis_urls() -> Vec<String> {
    vec!["redis://localhost:6379".to_string()]
}
fn default_connect_timeout_ms() -> u64 {
    5000
}
fn default_nats_urls() -> Vec<String> {
    vec!["nats://localhost:4222".to_string()]
}
fn default_geo_topic() -> String {
    "geo.notifications".to_string()
}
fn default_swipes_topic() -> String {
    "swipes".to_string()
}
fn default_max_reconnects() -> usize {
    10
}
fn default_mix_ratio() -> f64 {
    0.7
}
fn default_max_distance_km() -> f64 {
    20.0
}
fn default_content_pool_limit() -> usize {
    100
}
fn default_count() -> usize {
    10
}
fn default_max_count() -> usize {
    100
}
fn default_recommendation_ttl_secs() -> u64 {
    60 * 60
}
fn default_swipe_ttl_secs() -> u64 {
    60 * 60 * 24 * 3
}
fn default_city_ttl_secs() -> u64 {
    60 * 60 * 24 * 30
}
fn default_embedding_dimensions() -> usize {
    384
}
fn default_provider_url() -> String {
    "https://nominatim.openstreetmap.org/search".to_string()
}
fn default_user_agent() -> String {
    "matchmaker-geo".to_string()
}
fn default_max_concurrent() -> usize {
    10
}
fn default_min_delay_ms() -> u64 {
    1000
}
fn default_max_attempts() -> u32 {
    5
}
fn default_retry_delay_ms() -> u64 {
    1000
}
fn default_attempt_timeout_ms() -> u64 {
    5000
}
fn default_workers() -> usize {
    4
}
fn default_queue_capacity() -> usize {
    1024
}
fn default_max_deliveries() -> u32 {
    3
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            urls: default_redis_urls(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            urls: default_nats_urls(),
            geo_topic: default_geo_topic(),
            swipes_topic: default_swipes_topic(),
            max_reconnects: default_max_reconnects(),
        }
    }
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            mix_ratio: default_mix_ratio(),
            max_distance_km: default_max_distance_km(),
            content_pool_limit: default_content_pool_limit(),
            default_count: default_count(),
            max_count: default_max_count(),
            stop_words: Vec::new(),
        }
    }
}

impl Default for CacheTtlConfig {
    fn default() -> Self {
        Self {
            recommendation_ttl_secs: default_recommendation_ttl_secs(),
            swipe_ttl_secs: default_swipe_ttl_secs(),
            city_ttl_secs: default_city_ttl_secs(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimensions: default_embedding_dimensions(),
        }
    }
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            provider_url: default_provider_url(),
            user_agent: default_user_agent(),
            max_concurrent: default_max_concurrent(),
            min_delay_ms: default_min_delay_ms(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            max_deliveries: default_max_deliveries(),
            fallback_latitude: None,
            fallback_longitude: None,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            redis: RedisConfig::default(),
            nats: NatsConfig::default(),
            recommender: RecommenderConfig::default(),
            cache: CacheTtlConfig::default(),
            embedding: EmbeddingConfig::default(),
            geo: GeoConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables, layered over an
    /// optional TOML file.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("MATCHMAKER")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("redis.urls")
                .with_list_parse_key("nats.urls")
                .with_list_parse_key("recommender.stop_words"),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Reject settings the engine cannot operate with.
    pub fn validate(&self) -> Result<(), MatchError> {
        let r = &self.recommender;
        if !(0.0..=1.0).contains(&r.mix_ratio) {
            return Err(MatchError::Config(format!(
                "recommender.mix_ratio must be within [0, 1], got {}",
                r.mix_ratio
            )));
        }
        if r.max_distance_km.is_nan() || r.max_distance_km <= 0.0 {
            return Err(MatchError::Config(
                "recommender.max_distance_km must be positive".into(),
            ));
        }
        if r.max_count == 0 || r.default_count > r.max_count {
            return Err(MatchError::Config(
                "recommender.default_count must be within [1, max_count]".into(),
            ));
        }
        if self.embedding.dimensions == 0 {
            return Err(MatchError::Config("embedding.dimensions must be non-zero".into()));
        }
        let g = &self.geo;
        if g.max_concurrent == 0 || g.max_attempts == 0 || g.workers == 0 || g.queue_capacity == 0 {
            return Err(MatchError::Config(
                "geo.max_concurrent, geo.max_attempts, geo.workers and geo.queue_capacity must be non-zero"
                    .into(),
            ));
        }
        if g.fallback_latitude.is_some() != g.fallback_longitude.is_some() {
            return Err(MatchError::Config(
                "geo.fallback_latitude and geo.fallback_longitude must be set together".into(),
            ));
        }
        Ok(())
    }
}
