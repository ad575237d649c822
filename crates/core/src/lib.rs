pub mod config;
pub mod error;
pub mod event_bus;
pub mod geo;
pub mod store;
pub mod types;

pub use config::AppConfig;
pub use error::{MatchError, MatchResult};
pub use event_bus::EventPublisher;
pub use geo::Coordinates;
pub use store::ProfileStore;
