//! Hybrid recommendation engine: embedding similarity blended with
//! criteria-based random sampling, fronted by the recommendation and swipe
//! caches.

#![warn(clippy::unwrap_used)]

pub mod age;
pub mod embedding;
pub mod generator;
pub mod similarity;
pub mod store;
pub mod swipes;
pub mod text;

pub use age::{match_age_range, AgeWindow};
pub use embedding::{EmbeddingModel, HashingEncoder};
pub use generator::{split_count, CandidateGenerator, GeneratorSettings};
pub use store::InMemoryProfileStore;
pub use swipes::SwipeRecorder;
pub use text::TextPreprocessor;
