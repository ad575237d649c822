//! In-process [`ProfileStore`] for single-node deployments, demos and tests.
//!
//! Applies the same hard criteria the production SQL queries do: active,
//! not the requester, not already swiped, located within the search radius,
//! of an accepted gender and inside the age window.

use async_trait::async_trait;
use dashmap::DashMap;
use matchmaker_core::store::{CandidateFilters, EmbeddedCandidate, ProfileStore};
use matchmaker_core::types::{Profile, UserId};
use matchmaker_core::{Coordinates, MatchError, MatchResult};
use std::collections::HashSet;

#[derive(Default)]
pub struct InMemoryProfileStore {
    profiles: DashMap<UserId, Profile>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_profiles(profiles: impl IntoIterator<Item = Profile>) -> Self {
        let store = Self::new();
        for profile in profiles {
            store.insert(profile);
        }
        store
    }

    pub fn insert(&self, profile: Profile) {
        self.profiles.insert(profile.user_id, profile);
    }

    pub fn remove(&self, user_id: UserId) -> Option<Profile> {
        self.profiles.remove(&user_id).map(|(_, p)| p)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Distance to `profile` if it satisfies every filter.
    fn matching_distance(
        requester_id: UserId,
        filters: &CandidateFilters,
        profile: &Profile,
    ) -> Option<f64> {
        if profile.user_id == requester_id
            || !profile.is_active
            || filters.swiped.contains(&profile.user_id)
            || !filters.interesting_gender.accepts(profile.gender)
            || !(filters.min_age..=filters.max_age).contains(&profile.age)
        {
            return None;
        }
        let distance = filters.origin.distance_km(&profile.coordinates()?);
        (distance <= filters.max_distance_km).then_some(distance)
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get_profile(&self, user_id: UserId) -> MatchResult<Option<Profile>> {
        Ok(self.profiles.get(&user_id).map(|p| p.clone()))
    }

    async fn get_candidates_with_embedding(
        &self,
        requester_id: UserId,
        filters: &CandidateFilters,
    ) -> MatchResult<Vec<EmbeddedCandidate>> {
        let mut candidates: Vec<EmbeddedCandidate> = self
            .profiles
            .iter()
            .filter_map(|entry| {
                let profile = entry.value();
                let embedding = profile.about_embedding.as_ref().filter(|e| !e.is_empty())?;
                let distance_km = Self::matching_distance(requester_id, filters, profile)?;
                Some(EmbeddedCandidate {
                    user_id: profile.user_id,
                    embedding: embedding.clone(),
                    distance_km,
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            a.distance_km
                .partial_cmp(&b.distance_km)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.user_id.cmp(&b.user_id))
        });
        candidates.truncate(filters.limit);
        Ok(candidates)
    }

    async fn get_candidates_by_criteria(
        &self,
        requester_id: UserId,
        filters: &CandidateFilters,
        excluded_ids: &HashSet<UserId>,
    ) -> MatchResult<Vec<UserId>> {
        let mut ids: Vec<UserId> = self
            .profiles
            .iter()
            .filter(|entry| !excluded_ids.contains(entry.key()))
            .filter(|entry| Self::matching_distance(requester_id, filters, entry.value()).is_some())
            .map(|entry| *entry.key())
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn update_embedding(&self, user_id: UserId, embedding: Vec<f32>) -> MatchResult<()> {
        let mut profile = self
            .profiles
            .get_mut(&user_id)
            .ok_or_else(|| MatchError::Store(format!("profile {user_id} not found")))?;
        profile.about_embedding = Some(embedding);
        Ok(())
    }

    async fn update_coordinates(&self, user_id: UserId, coords: Coordinates) -> MatchResult<()> {
        let mut profile = self
            .profiles
            .get_mut(&user_id)
            .ok_or_else(|| MatchError::Store(format!("profile {user_id} not found")))?;
        profile.latitude = Some(coords.latitude);
        profile.longitude = Some(coords.longitude);
        Ok(())
    }
}
