//! Pending-recommendation lifecycle.
//!
//! Each user has at most one unresolved recommendation at any instant.
//! A recommendation leaves the open state exactly once, through one of
//! three outcomes: explicit feedback, a qualifying follow-up check-in,
//! or expiry (the null-reward path, which never touches the value table).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::actions::Action;
use crate::error::{CoachError, Result};
use crate::state::StateKey;

/// Why a pending recommendation was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionOutcome {
    /// Closed by an explicit feedback submission
    Feedback,
    /// Closed by a qualifying next-day check-in
    FollowUp,
    /// Closed with no evidence either way; no value update was applied
    Expired,
}

impl ResolutionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionOutcome::Feedback => "feedback",
            ResolutionOutcome::FollowUp => "follow_up",
            ResolutionOutcome::Expired => "expired",
        }
    }
}

impl FromStr for ResolutionOutcome {
    type Err = CoachError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "feedback" => Ok(ResolutionOutcome::Feedback),
            "follow_up" => Ok(ResolutionOutcome::FollowUp),
            "expired" => Ok(ResolutionOutcome::Expired),
            other => Err(CoachError::storage(format!(
                "unknown resolution outcome: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for ResolutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An issued recommendation awaiting feedback or follow-up data.
///
/// Immutable after resolution; a new cycle appends a new record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRecommendation {
    pub id: Uuid,
    pub user_id: String,
    pub state: StateKey,
    pub action: Action,
    pub message: String,
    /// Raw energy score at issuance, kept for the next-day delta signal
    pub energy_at_issue: u8,
    /// Raw mood score at issuance
    pub mood_at_issue: u8,
    pub issued_at: DateTime<Utc>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub outcome: Option<ResolutionOutcome>,
}

impl PendingRecommendation {
    pub fn new(
        user_id: impl Into<String>,
        state: StateKey,
        action: Action,
        message: impl Into<String>,
        energy_at_issue: u8,
        mood_at_issue: u8,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            state,
            action,
            message: message.into(),
            energy_at_issue,
            mood_at_issue,
            issued_at,
            resolved: false,
            resolved_at: None,
            outcome: None,
        }
    }

    /// Whether a timestamp still falls inside the resolution window
    pub fn within_window(&self, at: DateTime<Utc>, window_hours: i64) -> bool {
        at <= self.issued_at + Duration::hours(window_hours)
    }
}

/// How a newly arrived check-in settles an open recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// The check-in qualifies as next-day follow-up evidence: compute the
    /// delta reward and bootstrap from the new state.
    FollowUp,
    /// No qualifying evidence: close via the null-reward path, leaving
    /// the value table untouched.
    Null,
}

/// Decide the settlement path for an open recommendation when a new
/// check-in arrives. Follow-up evidence requires a later calendar day
/// (same-day re-submissions are not outcome data) inside the window.
pub fn settlement_for(
    pending: &PendingRecommendation,
    check_in_at: DateTime<Utc>,
    window_hours: i64,
) -> Settlement {
    let later_day = check_in_at.date_naive() > pending.issued_at.date_naive();
    if later_day && pending.within_window(check_in_at, window_hours) {
        Settlement::FollowUp
    } else {
        Settlement::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{CyclePhase, Level, TimeOfDay};
    use chrono::TimeZone;

    fn pending(issued_at: DateTime<Utc>) -> PendingRecommendation {
        let state = StateKey {
            cycle_phase: CyclePhase::Luteal,
            sleep: Level::Medium,
            mood: Level::Low,
            stress: Level::High,
            pain: Level::Medium,
            energy: Level::Low,
            time_of_day: TimeOfDay::Morning,
        };
        PendingRecommendation::new("u1", state, Action::Nap, "rest up", 3, 4, issued_at)
    }

    #[test]
    fn test_next_day_check_in_is_follow_up() {
        let issued = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();
        let p = pending(issued);
        let next_day = Utc.with_ymd_and_hms(2026, 3, 11, 8, 0, 0).unwrap();
        assert_eq!(settlement_for(&p, next_day, 48), Settlement::FollowUp);
    }

    #[test]
    fn test_same_day_check_in_is_null() {
        let issued = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();
        let p = pending(issued);
        let same_day = Utc.with_ymd_and_hms(2026, 3, 10, 20, 0, 0).unwrap();
        assert_eq!(settlement_for(&p, same_day, 48), Settlement::Null);
    }

    #[test]
    fn test_check_in_outside_window_is_null() {
        let issued = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();
        let p = pending(issued);
        let late = Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap();
        assert_eq!(settlement_for(&p, late, 48), Settlement::Null);
    }
}
