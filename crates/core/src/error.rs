use thiserror::Error;

pub type MatchResult<T> = Result<T, MatchError>;

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Age {0} is outside the supported range [12, 100]")]
    InvalidAge(i32),

    #[error("Cache backend error: {0}")]
    Cache(String),

    #[error("Profile store error: {0}")]
    Store(String),

    #[error("Embedding model error: {0}")]
    Embedding(String),

    #[error("Geocoding error: {0}")]
    Geocoding(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl MatchError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            MatchError::Cache(_)
                | MatchError::Store(_)
                | MatchError::Geocoding(_)
                | MatchError::Io(_)
        )
    }
}
