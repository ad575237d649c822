#![warn(clippy::unwrap_used)]

pub mod backend;
pub mod cities;
pub mod client;
pub mod keys;
pub mod local;
pub mod recommendations;
pub mod swipes;

pub use backend::CacheBackend;
pub use cities::CityCoordinateCache;
pub use client::RedisBackend;
pub use local::MemoryBackend;
pub use recommendations::RecommendationCache;
pub use swipes::SwipeExclusionCache;
