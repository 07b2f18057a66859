//! State encoding: discretises a daily check-in into the small, hashable
//! state key the learning algorithm operates on.
//!
//! Bucketing thresholds on the 1..=10 score scale:
//! 1-3 → Low, 4-7 → Medium, 8-10 → High. Cycle phase and time of day are
//! already categorical and pass through unchanged.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoachError, Result};

/// Phase of the menstrual cycle reported with a check-in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclePhase {
    Menstrual,
    Follicular,
    Ovulation,
    Luteal,
}

impl CyclePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CyclePhase::Menstrual => "menstrual",
            CyclePhase::Follicular => "follicular",
            CyclePhase::Ovulation => "ovulation",
            CyclePhase::Luteal => "luteal",
        }
    }
}

impl FromStr for CyclePhase {
    type Err = CoachError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "menstrual" => Ok(CyclePhase::Menstrual),
            "follicular" => Ok(CyclePhase::Follicular),
            "ovulation" => Ok(CyclePhase::Ovulation),
            "luteal" => Ok(CyclePhase::Luteal),
            other => Err(CoachError::incomplete_state(format!(
                "cycle_phase (unrecognized value: {})",
                other
            ))),
        }
    }
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse time-of-day bucket derived from the check-in timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    /// Bucket an hour of day: 5-11 morning, 12-16 afternoon,
    /// 17-21 evening, otherwise night
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => TimeOfDay::Morning,
            12..=16 => TimeOfDay::Afternoon,
            17..=21 => TimeOfDay::Evening,
            _ => TimeOfDay::Night,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOfDay::Morning => "morning",
            TimeOfDay::Afternoon => "afternoon",
            TimeOfDay::Evening => "evening",
            TimeOfDay::Night => "night",
        }
    }
}

impl FromStr for TimeOfDay {
    type Err = CoachError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "morning" => Ok(TimeOfDay::Morning),
            "afternoon" => Ok(TimeOfDay::Afternoon),
            "evening" => Ok(TimeOfDay::Evening),
            "night" => Ok(TimeOfDay::Night),
            other => Err(CoachError::incomplete_state(format!(
                "time_of_day (unrecognized value: {})",
                other
            ))),
        }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discretisation level for the ordinal score fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    Medium,
    High,
}

impl Level {
    /// Bucket a validated 1..=10 score
    pub fn from_score(score: u8) -> Self {
        match score {
            1..=3 => Level::Low,
            4..=7 => Level::Medium,
            _ => Level::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Low => "low",
            Level::Medium => "medium",
            Level::High => "high",
        }
    }
}

impl FromStr for Level {
    type Err = CoachError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "low" => Ok(Level::Low),
            "medium" => Ok(Level::Medium),
            "high" => Ok(Level::High),
            other => Err(CoachError::incomplete_state(format!(
                "level (unrecognized value: {})",
                other
            ))),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw daily check-in as submitted by the user.
///
/// Score fields are optional at this layer so the encoder can reject an
/// incomplete check-in explicitly instead of silently defaulting a missing
/// physiological field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckIn {
    pub cycle_phase: CyclePhase,
    pub recorded_at: DateTime<Utc>,
    pub sleep: Option<u8>,
    pub mood: Option<u8>,
    pub stress: Option<u8>,
    pub pain: Option<u8>,
    pub energy: Option<u8>,
}

/// Fully validated score set extracted from a check-in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInScores {
    pub sleep: u8,
    pub mood: u8,
    pub stress: u8,
    pub pain: u8,
    pub energy: u8,
}

impl CheckIn {
    /// Validate that every score field is present and within 1..=10
    pub fn validated(&self) -> Result<CheckInScores> {
        Ok(CheckInScores {
            sleep: require_score("sleep", self.sleep)?,
            mood: require_score("mood", self.mood)?,
            stress: require_score("stress", self.stress)?,
            pain: require_score("pain", self.pain)?,
            energy: require_score("energy", self.energy)?,
        })
    }

    /// Time-of-day bucket of this check-in
    pub fn time_of_day(&self) -> TimeOfDay {
        TimeOfDay::from_hour(self.recorded_at.hour())
    }
}

fn require_score(field: &str, value: Option<u8>) -> Result<u8> {
    match value {
        Some(v) if (1..=10).contains(&v) => Ok(v),
        Some(v) => Err(CoachError::incomplete_state(format!(
            "{} (out of range: {})",
            field, v
        ))),
        None => Err(CoachError::incomplete_state(field)),
    }
}

/// Discretised state the learning algorithm is keyed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateKey {
    pub cycle_phase: CyclePhase,
    pub sleep: Level,
    pub mood: Level,
    pub stress: Level,
    pub pain: Level,
    pub energy: Level,
    pub time_of_day: TimeOfDay,
}

impl StateKey {
    /// Compact stable string form used as the persistence key
    pub fn as_key(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}|{}",
            self.cycle_phase,
            self.sleep,
            self.mood,
            self.stress,
            self.pain,
            self.energy,
            self.time_of_day
        )
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_key())
    }
}

impl FromStr for StateKey {
    type Err = CoachError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('|').collect();
        if parts.len() != 7 {
            return Err(CoachError::incomplete_state(format!(
                "state key (malformed: {})",
                s
            )));
        }
        Ok(StateKey {
            cycle_phase: parts[0].parse()?,
            sleep: parts[1].parse()?,
            mood: parts[2].parse()?,
            stress: parts[3].parse()?,
            pain: parts[4].parse()?,
            energy: parts[5].parse()?,
            time_of_day: parts[6].parse()?,
        })
    }
}

/// Encode a check-in into its state key.
///
/// Pure and deterministic: the same check-in always yields the same key.
/// Fails with an incomplete-state error if any mandatory score field is
/// missing or out of range.
pub fn encode(check_in: &CheckIn) -> Result<StateKey> {
    let scores = check_in.validated()?;
    Ok(StateKey {
        cycle_phase: check_in.cycle_phase,
        sleep: Level::from_score(scores.sleep),
        mood: Level::from_score(scores.mood),
        stress: Level::from_score(scores.stress),
        pain: Level::from_score(scores.pain),
        energy: Level::from_score(scores.energy),
        time_of_day: check_in.time_of_day(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn check_in(hour: u32) -> CheckIn {
        CheckIn {
            cycle_phase: CyclePhase::Luteal,
            recorded_at: Utc.with_ymd_and_hms(2026, 3, 10, hour, 30, 0).unwrap(),
            sleep: Some(6),
            mood: Some(4),
            stress: Some(9),
            pain: Some(2),
            energy: Some(3),
        }
    }

    #[test]
    fn test_encode_is_deterministic() {
        let ci = check_in(18);
        let a = encode(&ci).unwrap();
        let b = encode(&ci).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_key(), "luteal|medium|medium|high|low|low|evening");
    }

    #[test]
    fn test_encode_rejects_missing_field() {
        let mut ci = check_in(9);
        ci.energy = None;
        let err = encode(&ci).unwrap_err();
        assert!(matches!(
            err,
            crate::error::CoachError::IncompleteState { ref field } if field == "energy"
        ));
    }

    #[test]
    fn test_encode_rejects_out_of_range_score() {
        let mut ci = check_in(9);
        ci.pain = Some(11);
        assert!(encode(&ci).is_err());
    }

    #[test]
    fn test_bucket_thresholds() {
        assert_eq!(Level::from_score(1), Level::Low);
        assert_eq!(Level::from_score(3), Level::Low);
        assert_eq!(Level::from_score(4), Level::Medium);
        assert_eq!(Level::from_score(7), Level::Medium);
        assert_eq!(Level::from_score(8), Level::High);
        assert_eq!(Level::from_score(10), Level::High);
    }

    #[test]
    fn test_time_of_day_buckets() {
        assert_eq!(TimeOfDay::from_hour(5), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(12), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(17), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_hour(22), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(3), TimeOfDay::Night);
    }

    #[test]
    fn test_state_key_round_trips_through_string() {
        let key = encode(&check_in(14)).unwrap();
        let parsed: StateKey = key.as_key().parse().unwrap();
        assert_eq!(key, parsed);
    }
}
