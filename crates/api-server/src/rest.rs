//! REST API handlers for recommendations, swipes, profile refreshes and
//! operational endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use matchmaker_cache::CacheBackend;
use matchmaker_core::types::{Candidate, GeoResolutionEvent, Swipe, UserId};
use matchmaker_core::MatchError;
use matchmaker_geo::GeoJobQueue;
use matchmaker_recommender::{CandidateGenerator, SwipeRecorder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, warn};

/// Maximum accepted length of a city name.
const MAX_CITY_LEN: usize = 256;

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<CandidateGenerator>,
    pub swipes: Arc<SwipeRecorder>,
    pub geo_jobs: Arc<GeoJobQueue>,
    pub cache: Arc<dyn CacheBackend>,
    pub default_count: usize,
    pub max_count: usize,
    pub node_id: String,
    pub start_time: Instant,
}

#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    pub count: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecommendationsResponse {
    pub user_id: UserId,
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SwipeResponse {
    pub recorded: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    pub user_id: UserId,
    pub updated: bool,
}

#[derive(Debug, Deserialize)]
pub struct LocationRequest {
    pub city: String,
}

/// GET /v1/recommendations/:user_id?count=N
pub async fn get_recommendations(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Query(query): Query<RecommendationQuery>,
) -> Result<Json<RecommendationsResponse>, ApiError> {
    let count = query.count.unwrap_or(state.default_count).min(state.max_count);
    let candidates = state.generator.get_recommendations(user_id, count).await?;
    metrics::counter!("api.recommendations.served").increment(candidates.len() as u64);
    Ok(Json(RecommendationsResponse {
        user_id,
        candidates,
    }))
}

/// DELETE /v1/recommendations/:user_id
pub async fn clear_recommendations(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> StatusCode {
    state.generator.invalidate(user_id).await;
    StatusCode::NO_CONTENT
}

/// POST /v1/swipes
pub async fn record_swipe(
    State(state): State<AppState>,
    Json(swipe): Json<Swipe>,
) -> Result<Json<SwipeResponse>, ApiError> {
    let recorded = state.swipes.record(&swipe).await?;
    Ok(Json(SwipeResponse { recorded }))
}

/// DELETE /v1/swipes/:user_id: forget the user's swipes and cached queue.
pub async fn reset_swipes(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<StatusCode, ApiError> {
    state.swipes.reset(user_id).await?;
    state.generator.invalidate(user_id).await;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/profiles/:user_id/embedding
pub async fn refresh_embedding(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<EmbeddingResponse>, ApiError> {
    let updated = state.generator.update_embedding(user_id).await?;
    Ok(Json(EmbeddingResponse { user_id, updated }))
}

/// POST /v1/profiles/:user_id/location: queue a city lookup.
pub async fn submit_location(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Json(request): Json<LocationRequest>,
) -> Result<(StatusCode, Json<GeoResolutionEvent>), ApiError> {
    let city = request.city.trim();
    if city.is_empty() {
        return Err(ApiError::BadRequest("city must not be empty".into()));
    }
    if city.len() > MAX_CITY_LEN {
        return Err(ApiError::BadRequest("city exceeds maximum length".into()));
    }
    let waited = state.geo_jobs.submit(user_id, city).await?;
    Ok((StatusCode::ACCEPTED, Json(waited)))
}

/// GET /health: health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /ready: 200 only while the cache backend answers.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.cache.ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// GET /live: liveness check for Kubernetes.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Match(MatchError),
}

impl From<MatchError> for ApiError {
    fn from(e: MatchError) -> Self {
        ApiError::Match(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error, message) = match self {
            ApiError::BadRequest(message) => {
                metrics::counter!("api.validation_errors").increment(1);
                (StatusCode::BAD_REQUEST, "invalid_request", message)
            }
            ApiError::Match(MatchError::InvalidAge(age)) => {
                warn!(age = age, "Requester age outside the platform range");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "invalid_age",
                    format!("age {age} is outside the supported range"),
                )
            }
            ApiError::Match(e) => {
                error!(error = %e, "Request failed");
                metrics::counter!("api.errors").increment(1);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal processing error".to_string(),
                )
            }
        };
        (
            status,
            Json(ErrorResponse {
                error: error.to_string(),
                message,
            }),
        )
            .into_response()
    }
}
