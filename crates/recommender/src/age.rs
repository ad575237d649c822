//! Age-compatibility window.
//!
//! Blends the "half your age plus seven" rule with a soft band around the
//! requester's own age that widens slowly with age.

use matchmaker_core::{MatchError, MatchResult};

pub const MIN_PLATFORM_AGE: i32 = 12;
pub const MAX_PLATFORM_AGE: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeWindow {
    pub min_age: i32,
    pub max_age: i32,
}

impl AgeWindow {
    pub fn contains(&self, age: i32) -> bool {
        (self.min_age..=self.max_age).contains(&age)
    }
}

/// Compute the window of candidate ages acceptable for a user of `age`.
pub fn match_age_range(age: i32) -> MatchResult<AgeWindow> {
    if !(MIN_PLATFORM_AGE..=MAX_PLATFORM_AGE).contains(&age) {
        return Err(MatchError::InvalidAge(age));
    }

    let age_f = f64::from(age);
    let ethical_min = (age_f / 2.0 + 7.0).trunc();
    let ethical_max = f64::from((age - 7) * 2);

    let delta = if age < 18 {
        1.5
    } else {
        (2.0 + f64::from(age - 18) * 0.25).min(12.0)
    };
    let soft_min = age_f - delta;
    let soft_max = age_f + delta;

    // Half-to-even rounding keeps x.5 boundaries stable.
    let min_age = (((soft_min + ethical_min) / 2.0).round_ties_even() as i32).max(MIN_PLATFORM_AGE);
    let max_age = (((soft_max + ethical_max) / 2.0).round_ties_even() as i32).min(MAX_PLATFORM_AGE);

    Ok(AgeWindow { min_age, max_age })
}
