//! Key layout shared by every cache backend.

use matchmaker_core::types::UserId;

pub fn recommendations_key(user_id: UserId) -> String {
    format!("recs:{user_id}")
}

pub fn swipes_key(user_id: UserId) -> String {
    format!("swipes:{user_id}")
}

/// City names are case-folded and trimmed so "Paris " and "paris" share an entry.
pub fn city_coordinates_key(city: &str) -> String {
    format!("city_coords:{}", normalize_city(city))
}

pub fn normalize_city(city: &str) -> String {
    city.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
