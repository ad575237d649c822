//! Records swipe decisions into the exclusion cache and forwards likes and
//! questions to the chat layer.

use matchmaker_cache::SwipeExclusionCache;
use matchmaker_core::event_bus::{publish_event, EventPublisher};
use matchmaker_core::types::{Swipe, SwipeEvent, UserId};
use matchmaker_core::MatchResult;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct SwipeRecorder {
    swipes: Arc<SwipeExclusionCache>,
    publisher: Arc<dyn EventPublisher>,
    topic: String,
}

impl SwipeRecorder {
    pub fn new(
        swipes: Arc<SwipeExclusionCache>,
        publisher: Arc<dyn EventPublisher>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            swipes,
            publisher,
            topic: topic.into(),
        }
    }

    /// Remember the swipe so the target is excluded from future batches.
    ///
    /// Returns `false` for a self-swipe, which is ignored.
    pub async fn record(&self, swipe: &Swipe) -> MatchResult<bool> {
        if swipe.from_user_id == swipe.to_user_id {
            warn!(user_id = swipe.from_user_id, "Ignoring self-swipe");
            return Ok(false);
        }

        self.swipes.add(swipe.from_user_id, swipe.to_user_id).await?;
        metrics::counter!("swipes.recorded").increment(1);

        if swipe.action.notifies_target() {
            publish_event(self.publisher.as_ref(), &self.topic, &SwipeEvent::from(swipe));
        }
        debug!(
            from = swipe.from_user_id,
            to = swipe.to_user_id,
            action = ?swipe.action,
            "Swipe recorded"
        );
        Ok(true)
    }

    /// Forget every swipe `user_id` made, so previously seen users can be
    /// recommended again.
    pub async fn reset(&self, user_id: UserId) -> MatchResult<()> {
        self.swipes.clear(user_id).await?;
        metrics::counter!("swipes.reset").increment(1);
        info!(user_id = user_id, "Swipe history reset");
        Ok(())
    }
}
