//! Reward shaping from delayed feedback and next-day outcome deltas.

use serde::{Deserialize, Serialize};

use crate::config::RewardConfig;

/// Explicit user feedback on an issued recommendation
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeedbackSignal {
    /// Whether the user actually performed the suggested action
    pub action_taken: bool,
    /// Effectiveness rating on the 0..=10 scale
    pub rating: u8,
}

/// Energy and mood scores used for the next-day delta signal
#[derive(Debug, Clone, Copy)]
pub struct OutcomeScores {
    pub energy: u8,
    pub mood: u8,
}

/// Combines the available evidence for a resolved recommendation into a
/// single clamped reward.
#[derive(Debug, Clone)]
pub struct RewardCalculator {
    feedback_weight: f64,
    delta_weight: f64,
    not_taken_penalty: f64,
}

impl RewardCalculator {
    pub fn from_config(config: &RewardConfig) -> Self {
        Self {
            feedback_weight: config.feedback_weight,
            delta_weight: config.delta_weight,
            not_taken_penalty: config.not_taken_penalty,
        }
    }

    /// Rating mapped onto [-1, 1]: 5 is neutral, 10 maps to +1, 0 to -1.
    /// A skipped action earns the fixed (small negative) penalty.
    fn rating_signal(&self, feedback: &FeedbackSignal) -> f64 {
        if !feedback.action_taken {
            return self.not_taken_penalty;
        }
        (feedback.rating.min(10) as f64 - 5.0) / 5.0
    }

    /// Mean of the signed energy and mood deltas, scaled onto [-1, 1].
    /// Scores live on 1..=10 so each delta is at most 9 in magnitude.
    fn delta_signal(&self, at_issue: OutcomeScores, follow_up: OutcomeScores) -> f64 {
        let energy_delta = follow_up.energy as f64 - at_issue.energy as f64;
        let mood_delta = follow_up.mood as f64 - at_issue.mood as f64;
        ((energy_delta + mood_delta) / 2.0) / 9.0
    }

    /// Compute the reward for a resolution.
    ///
    /// Returns `None` when neither signal is available: the neutral path
    /// is an explicit skip, never a zero-reward update.
    pub fn compute(
        &self,
        feedback: Option<&FeedbackSignal>,
        at_issue: OutcomeScores,
        follow_up: Option<OutcomeScores>,
    ) -> Option<f64> {
        let reward = match (feedback, follow_up) {
            (None, None) => return None,
            (Some(f), None) => self.rating_signal(f),
            (None, Some(scores)) => self.delta_signal(at_issue, scores),
            (Some(f), Some(scores)) => {
                self.feedback_weight * self.rating_signal(f)
                    + self.delta_weight * self.delta_signal(at_issue, scores)
            }
        };
        Some(reward.clamp(-1.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calculator() -> RewardCalculator {
        RewardCalculator::from_config(&RewardConfig::default())
    }

    #[test]
    fn test_no_evidence_is_a_skip_not_a_zero() {
        let at_issue = OutcomeScores { energy: 3, mood: 4 };
        assert!(calculator().compute(None, at_issue, None).is_none());
    }

    #[test]
    fn test_positive_rating_alone() {
        let at_issue = OutcomeScores { energy: 3, mood: 4 };
        let feedback = FeedbackSignal {
            action_taken: true,
            rating: 8,
        };
        let reward = calculator().compute(Some(&feedback), at_issue, None).unwrap();
        assert!((reward - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_not_taken_earns_fixed_penalty() {
        let at_issue = OutcomeScores { energy: 3, mood: 4 };
        let feedback = FeedbackSignal {
            action_taken: false,
            rating: 9,
        };
        let reward = calculator().compute(Some(&feedback), at_issue, None).unwrap();
        assert!((reward - (-0.2)).abs() < 1e-9);
    }

    #[test]
    fn test_delta_alone_reflects_improvement_direction() {
        let calc = calculator();
        let at_issue = OutcomeScores { energy: 3, mood: 4 };
        let better = OutcomeScores { energy: 7, mood: 8 };
        let worse = OutcomeScores { energy: 1, mood: 2 };

        let up = calc.compute(None, at_issue, Some(better)).unwrap();
        let down = calc.compute(None, at_issue, Some(worse)).unwrap();
        assert!(up > 0.0);
        assert!(down < 0.0);
    }

    #[test]
    fn test_blended_reward_is_clamped() {
        let calc = RewardCalculator {
            feedback_weight: 5.0,
            delta_weight: 5.0,
            not_taken_penalty: -0.2,
        };
        let at_issue = OutcomeScores { energy: 1, mood: 1 };
        let follow_up = OutcomeScores {
            energy: 10,
            mood: 10,
        };
        let feedback = FeedbackSignal {
            action_taken: true,
            rating: 10,
        };
        let reward = calc
            .compute(Some(&feedback), at_issue, Some(follow_up))
            .unwrap();
        assert_eq!(reward, 1.0);
    }
}
