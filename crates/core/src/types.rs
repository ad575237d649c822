use crate::geo::Coordinates;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = i64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

/// Which genders a user wants to be shown.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum InterestingGender {
    Male,
    Female,
    Any,
}

impl InterestingGender {
    pub fn accepts(&self, gender: Gender) -> bool {
        matches!(
            (self, gender),
            (InterestingGender::Any, _)
                | (InterestingGender::Male, Gender::Male)
                | (InterestingGender::Female, Gender::Female)
        )
    }
}

/// Dating profile as read from the profile store.
///
/// Only `about_embedding`, `latitude` and `longitude` are ever written back
/// by the engine; everything else is owned by the profile service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: UserId,
    #[serde(default)]
    pub about_text: String,
    #[serde(default)]
    pub about_embedding: Option<Vec<f32>>,
    pub age: i32,
    pub gender: Gender,
    pub interesting_gender: InterestingGender,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl Profile {
    /// Coordinates if both halves are present.
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        }
    }

    pub fn has_embedding(&self) -> bool {
        self.about_embedding.as_ref().is_some_and(|e| !e.is_empty())
    }
}

/// A recommended user together with their distance from the requester.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub user_id: UserId,
    pub distance_km: f64,
}

impl Candidate {
    pub fn new(user_id: UserId, distance_km: f64) -> Self {
        Self {
            user_id,
            distance_km,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SwipeAction {
    Like,
    Dislike,
    Question,
}

impl SwipeAction {
    /// Likes and questions are forwarded to the target user.
    pub fn notifies_target(&self) -> bool {
        matches!(self, SwipeAction::Like | SwipeAction::Question)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Swipe {
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    pub action: SwipeAction,
    #[serde(default)]
    pub message: Option<String>,
}

/// Swipe notification published for the chat layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwipeEvent {
    pub event_id: Uuid,
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    pub action: SwipeAction,
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<&Swipe> for SwipeEvent {
    fn from(swipe: &Swipe) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            from_user_id: swipe.from_user_id,
            to_user_id: swipe.to_user_id,
            action: swipe.action,
            message: swipe.message.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// Lifecycle of a background city resolution job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GeoStatus {
    Waited,
    Success,
    Failed,
}

impl GeoStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GeoStatus::Waited)
    }
}

/// Outcome announcement for a geo resolution job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoResolutionEvent {
    pub job_id: Uuid,
    pub user_id: UserId,
    pub city: String,
    pub status: GeoStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl GeoResolutionEvent {
    pub fn waited(job_id: Uuid, user_id: UserId, city: impl Into<String>) -> Self {
        Self {
            job_id,
            user_id,
            city: city.into(),
            status: GeoStatus::Waited,
            latitude: None,
            longitude: None,
            reason: None,
            timestamp: Utc::now(),
        }
    }

    pub fn success(
        job_id: Uuid,
        user_id: UserId,
        city: impl Into<String>,
        coords: Coordinates,
    ) -> Self {
        Self {
            status: GeoStatus::Success,
            latitude: Some(coords.latitude),
            longitude: Some(coords.longitude),
            ..Self::waited(job_id, user_id, city)
        }
    }

    pub fn failed(
        job_id: Uuid,
        user_id: UserId,
        city: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            status: GeoStatus::Failed,
            reason: Some(reason.into()),
            ..Self::waited(job_id, user_id, city)
        }
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_interesting_gender() {
        assert!(InterestingGender::Any.accepts(Gender::Male));
        assert!(InterestingGender::Any.accepts(Gender::Female));
        assert!(InterestingGender::Female.accepts(Gender::Female));
        assert!(!InterestingGender::Female.accepts(Gender::Male));
    }

    #[test]
    fn test_profile_deserialize_defaults() {
        let json = r#"{"user_id": 7, "age": 30, "gender": "female",
                       "interesting_gender": "any", "city": "Paris"}"#;
        let profile: Profile = serde_json::from_str(json).unwrap();
        assert!(profile.is_active);
        assert!(profile.coordinates().is_none());
        assert!(!profile.has_embedding());
        assert_eq!(profile.city.as_deref(), Some("Paris"));
    }

    #[test]
    fn test_geo_event_shape() {
        let event = GeoResolutionEvent::success(
            Uuid::new_v4(),
            42,
            "Paris",
            Coordinates::new(48.85, 2.35),
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["latitude"], 48.85);
        assert!(json.get("reason").is_none());

        let failed = GeoResolutionEvent::failed(Uuid::new_v4(), 42, "Atlantis", "not_found");
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert!(json.get("latitude").is_none());
        assert!(failed.status.is_terminal());
    }

    #[test]
    fn test_swipe_action_notifies() {
        assert!(SwipeAction::Like.notifies_target());
        assert!(SwipeAction::Question.notifies_target());
        assert!(!SwipeAction::Dislike.notifies_target());
    }
}
