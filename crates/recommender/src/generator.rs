//! Hybrid candidate generator.
//!
//! A batch is filled from two independent sources: profiles whose "about"
//! embedding is closest to the requester's, and a uniform random sample of
//! profiles that merely pass the hard criteria. The split is fixed by
//! `mix_ratio`. Results are cached per requester and re-filtered against the
//! swipe exclusion set on every read.

use crate::age::match_age_range;
use crate::embedding::EmbeddingModel;
use crate::similarity::cosine_similarity;
use crate::text::TextPreprocessor;
use matchmaker_cache::{RecommendationCache, SwipeExclusionCache};
use matchmaker_core::config::RecommenderConfig;
use matchmaker_core::store::{CandidateFilters, ProfileStore};
use matchmaker_core::types::{Candidate, Profile, UserId};
use matchmaker_core::{Coordinates, MatchResult};
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub mix_ratio: f64,
    pub max_distance_km: f64,
    pub content_pool_limit: usize,
}

impl From<&RecommenderConfig> for GeneratorSettings {
    fn from(config: &RecommenderConfig) -> Self {
        Self {
            mix_ratio: config.mix_ratio,
            max_distance_km: config.max_distance_km,
            content_pool_limit: config.content_pool_limit,
        }
    }
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self::from(&RecommenderConfig::default())
    }
}

/// Split `count` into (content-based, criteria-based) quotas.
pub fn split_count(count: usize, mix_ratio: f64) -> (usize, usize) {
    let content = ((count as f64) * mix_ratio.clamp(0.0, 1.0)).floor() as usize;
    let content = content.min(count);
    (content, count - content)
}

pub struct CandidateGenerator {
    store: Arc<dyn ProfileStore>,
    model: Arc<dyn EmbeddingModel>,
    preprocessor: Arc<TextPreprocessor>,
    recommendations: Arc<RecommendationCache>,
    swipes: Arc<SwipeExclusionCache>,
    settings: GeneratorSettings,
}

impl CandidateGenerator {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        model: Arc<dyn EmbeddingModel>,
        preprocessor: Arc<TextPreprocessor>,
        recommendations: Arc<RecommendationCache>,
        swipes: Arc<SwipeExclusionCache>,
        settings: GeneratorSettings,
    ) -> Self {
        info!(
            model = model.name(),
            dimensions = model.dimensions(),
            mix_ratio = settings.mix_ratio,
            max_distance_km = settings.max_distance_km,
            "Candidate generator initialized"
        );
        Self {
            store,
            model,
            preprocessor,
            recommendations,
            swipes,
            settings,
        }
    }

    /// Next `count` users worth showing to `user_id`.
    ///
    /// Serves the cached queue when it still has unswiped entries, otherwise
    /// computes a fresh hybrid batch. "Nothing to show" is an empty list; the
    /// only error is an out-of-range requester age.
    pub async fn get_recommendations(
        &self,
        user_id: UserId,
        count: usize,
    ) -> MatchResult<Vec<Candidate>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let swiped = self.swipes.get_all(user_id).await;

        let mut cached = self.recommendations.get_filtered(user_id, &swiped).await;
        if !cached.is_empty() {
            cached.truncate(count);
            debug!(user_id = user_id, served = cached.len(), "Serving cached recommendations");
            return Ok(cached);
        }

        let fresh = self.generate(user_id, count, swiped).await?;
        if !fresh.is_empty() {
            self.recommendations.set(user_id, &fresh).await;
        }
        Ok(fresh)
    }

    /// Compute a fresh batch without touching the recommendation cache.
    pub async fn generate(
        &self,
        user_id: UserId,
        count: usize,
        swiped: HashSet<UserId>,
    ) -> MatchResult<Vec<Candidate>> {
        let Some(profile) = self.store.get_profile(user_id).await? else {
            debug!(user_id = user_id, "Requester not found");
            return Ok(Vec::new());
        };
        if !profile.is_active {
            debug!(user_id = user_id, "Requester inactive");
            return Ok(Vec::new());
        }

        let window = match_age_range(profile.age)?;

        let Some(origin) = profile.coordinates() else {
            debug!(user_id = user_id, "Requester has no coordinates yet");
            return Ok(Vec::new());
        };

        let (content_count, random_count) = split_count(count, self.settings.mix_ratio);
        let filters = CandidateFilters {
            origin,
            max_distance_km: self.settings.max_distance_km,
            interesting_gender: profile.interesting_gender,
            min_age: window.min_age,
            max_age: window.max_age,
            swiped,
            limit: self.settings.content_pool_limit,
        };

        let content = self.content_based(&profile, &filters, content_count).await?;
        let chosen: HashSet<UserId> = content.iter().map(|c| c.user_id).collect();
        let random = self
            .criteria_based(user_id, origin, &filters, &chosen, random_count)
            .await?;

        let mut seen = HashSet::new();
        let mut merged: Vec<Candidate> = content
            .into_iter()
            .chain(random)
            .filter(|c| c.user_id != user_id && seen.insert(c.user_id))
            .collect();
        merged.truncate(count);
        merged.retain(|c| !filters.swiped.contains(&c.user_id));

        metrics::counter!("recs.generated").increment(1);
        debug!(
            user_id = user_id,
            content = chosen.len(),
            returned = merged.len(),
            min_age = window.min_age,
            max_age = window.max_age,
            "Generated recommendations"
        );
        Ok(merged)
    }

    /// Top `count` candidates by cosine similarity of "about" embeddings.
    async fn content_based(
        &self,
        profile: &Profile,
        filters: &CandidateFilters,
        count: usize,
    ) -> MatchResult<Vec<Candidate>> {
        let Some(embedding) = profile.about_embedding.as_deref().filter(|e| !e.is_empty()) else {
            return Ok(Vec::new());
        };
        if count == 0 {
            return Ok(Vec::new());
        }

        let pool = self
            .store
            .get_candidates_with_embedding(profile.user_id, filters)
            .await?;
        metrics::counter!("recs.content_candidates").increment(pool.len() as u64);

        let mut scored: Vec<(f32, Candidate)> = pool
            .into_iter()
            .filter(|c| c.user_id != profile.user_id && !filters.swiped.contains(&c.user_id))
            .map(|c| {
                (
                    cosine_similarity(embedding, &c.embedding),
                    Candidate::new(c.user_id, c.distance_km),
                )
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored.into_iter().take(count).map(|(_, c)| c).collect())
    }

    /// Uniform random sample of `count` criteria-matching candidates.
    async fn criteria_based(
        &self,
        user_id: UserId,
        origin: Coordinates,
        filters: &CandidateFilters,
        chosen: &HashSet<UserId>,
        count: usize,
    ) -> MatchResult<Vec<Candidate>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut ids = self
            .store
            .get_candidates_by_criteria(user_id, filters, chosen)
            .await?;
        ids.retain(|id| *id != user_id && !chosen.contains(id) && !filters.swiped.contains(id));
        ids.shuffle(&mut rand::thread_rng());

        let mut picked = Vec::with_capacity(count);
        for id in ids {
            if picked.len() >= count {
                break;
            }
            match self.store.get_profile(id).await? {
                Some(candidate) => match candidate.coordinates() {
                    Some(coords) => picked.push(Candidate::new(id, origin.distance_km(&coords))),
                    None => debug!(candidate_id = id, "Skipping candidate without coordinates"),
                },
                None => debug!(candidate_id = id, "Candidate vanished between queries"),
            }
        }
        Ok(picked)
    }

    /// Recompute and store the embedding of `user_id`'s "about" text.
    ///
    /// Returns `Ok(true)` when a new vector was stored. Encoder failures are
    /// logged and leave the previous embedding in place.
    pub async fn update_embedding(&self, user_id: UserId) -> MatchResult<bool> {
        let Some(profile) = self.store.get_profile(user_id).await? else {
            return Ok(false);
        };
        if profile.about_text.trim().is_empty() {
            debug!(user_id = user_id, "Empty about text, keeping embedding as is");
            return Ok(false);
        }

        let model = self.model.clone();
        let preprocessor = self.preprocessor.clone();
        let about = profile.about_text;
        let encoded = tokio::task::spawn_blocking(move || {
            let cleaned = preprocessor.clean(&about);
            if cleaned.is_empty() {
                return Ok(None);
            }
            model.encode(&cleaned).map(Some)
        })
        .await;

        let embedding = match encoded {
            Ok(Ok(Some(embedding))) => embedding,
            Ok(Ok(None)) => {
                debug!(user_id = user_id, "Nothing left to embed after cleaning");
                return Ok(false);
            }
            Ok(Err(e)) => {
                warn!(
                    user_id = user_id,
                    error = %e,
                    "Embedding model failed, keeping previous embedding"
                );
                metrics::counter!("recs.embedding.failures").increment(1);
                return Ok(false);
            }
            Err(e) => {
                warn!(
                    user_id = user_id,
                    error = %e,
                    "Embedding task panicked, keeping previous embedding"
                );
                metrics::counter!("recs.embedding.failures").increment(1);
                return Ok(false);
            }
        };

        if embedding.len() != self.model.dimensions() {
            warn!(
                user_id = user_id,
                expected = self.model.dimensions(),
                got = embedding.len(),
                "Embedding has unexpected length, discarding"
            );
            return Ok(false);
        }

        self.store.update_embedding(user_id, embedding).await?;
        self.recommendations.clear(user_id).await;
        info!(user_id = user_id, "Embedding updated");
        Ok(true)
    }

    /// Drop the cached queue for `user_id`.
    pub async fn invalidate(&self, user_id: UserId) {
        self.recommendations.clear(user_id).await;
    }
}
