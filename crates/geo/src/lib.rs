//! City geocoding: a rate-limited provider gate, a cache-aside resolver and
//! the background job queue that writes resolved coordinates to profiles.

#![warn(clippy::unwrap_used)]

pub mod gate;
pub mod jobs;
pub mod provider;
pub mod resolver;

pub use gate::{RateLimitedGeocoder, RetryPolicy};
pub use jobs::{GeoJob, GeoJobHandler, GeoJobQueue};
pub use provider::{GeocodingProvider, NominatimProvider};
pub use resolver::{CachedLocationResolver, SharedProvider};
