//! Contract of the external profile store the engine reads candidates from.

use crate::geo::Coordinates;
use crate::types::{InterestingGender, Profile, UserId};
use crate::MatchResult;
use async_trait::async_trait;
use std::collections::HashSet;

/// Hard criteria every candidate must satisfy relative to the requester.
#[derive(Debug, Clone)]
pub struct CandidateFilters {
    pub origin: Coordinates,
    pub max_distance_km: f64,
    pub interesting_gender: InterestingGender,
    pub min_age: i32,
    pub max_age: i32,
    /// Users the requester already acted on.
    pub swiped: HashSet<UserId>,
    pub limit: usize,
}

/// A candidate returned by the embedding query.
#[derive(Debug, Clone)]
pub struct EmbeddedCandidate {
    pub user_id: UserId,
    pub embedding: Vec<f32>,
    pub distance_km: f64,
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, user_id: UserId) -> MatchResult<Option<Profile>>;

    /// Active, non-self candidates matching `filters` that carry an embedding,
    /// at most `filters.limit` of them.
    async fn get_candidates_with_embedding(
        &self,
        requester_id: UserId,
        filters: &CandidateFilters,
    ) -> MatchResult<Vec<EmbeddedCandidate>>;

    /// Ids of active, non-self candidates matching `filters`, minus `excluded_ids`.
    async fn get_candidates_by_criteria(
        &self,
        requester_id: UserId,
        filters: &CandidateFilters,
        excluded_ids: &HashSet<UserId>,
    ) -> MatchResult<Vec<UserId>>;

    async fn update_embedding(&self, user_id: UserId, embedding: Vec<f32>) -> MatchResult<()>;

    async fn update_coordinates(&self, user_id: UserId, coords: Coordinates) -> MatchResult<()>;
}
