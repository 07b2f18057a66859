use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::actions::Action;
use crate::error::{CoachError, Result};

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub learning: LearningConfig,
    pub reward: RewardConfig,
}

/// Q-learning and exploration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Learning rate (alpha) applied to each value update
    pub learning_rate: f64,
    /// Discount factor (gamma) for the bootstrapped next-state term
    pub discount_factor: f64,
    /// Initial exploration rate (epsilon) for a user with no history
    pub exploration_rate: f64,
    /// Multiplicative decay applied per logged check-in
    pub exploration_decay: f64,
    /// Floor the exploration rate never decays below
    pub min_exploration_rate: f64,
    /// Probability that exploration prefers the pain-management subset
    /// during menstrual phase with high pain
    pub pain_bias_probability: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            discount_factor: 0.9,
            exploration_rate: 0.2,
            exploration_decay: 0.995,
            min_exploration_rate: 0.05,
            pain_bias_probability: 0.6,
        }
    }
}

/// Reward shaping and resolution-window parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Weight of the explicit feedback-rating signal in the blended reward
    pub feedback_weight: f64,
    /// Weight of the next-day energy/mood delta signal
    pub delta_weight: f64,
    /// Fixed reward when the user reports not having taken the action
    pub not_taken_penalty: f64,
    /// Hours after issuance during which feedback or a follow-up
    /// check-in may still close a recommendation
    pub resolution_window_hours: i64,
    /// Fallback action when no catalog action is applicable to a state
    pub neutral_action: Action,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            feedback_weight: 0.6,
            delta_weight: 0.4,
            not_taken_penalty: -0.2,
            resolution_window_hours: 48,
            neutral_action: Action::Mindfulness,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults
    /// for any missing section
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading configuration from {}", path.display());

        let content = fs::read_to_string(path)
            .map_err(|e| CoachError::invalid_config(format!("{}: {}", path.display(), e)))?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that all numeric parameters are in their valid ranges
    pub fn validate(&self) -> Result<()> {
        let l = &self.learning;
        if !(0.0..=1.0).contains(&l.learning_rate) || l.learning_rate == 0.0 {
            return Err(CoachError::invalid_config(format!(
                "learning_rate must be in (0, 1], got {}",
                l.learning_rate
            )));
        }
        if !(0.0..=1.0).contains(&l.discount_factor) {
            return Err(CoachError::invalid_config(format!(
                "discount_factor must be in [0, 1], got {}",
                l.discount_factor
            )));
        }
        if !(0.0..=1.0).contains(&l.exploration_rate)
            || !(0.0..=1.0).contains(&l.min_exploration_rate)
            || l.min_exploration_rate > l.exploration_rate
        {
            return Err(CoachError::invalid_config(
                "exploration rates must satisfy 0 <= min <= initial <= 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&l.exploration_decay) {
            return Err(CoachError::invalid_config(format!(
                "exploration_decay must be in [0, 1], got {}",
                l.exploration_decay
            )));
        }
        let r = &self.reward;
        if r.resolution_window_hours <= 0 {
            return Err(CoachError::invalid_config(
                "resolution_window_hours must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.learning.learning_rate, 0.1);
        assert_eq!(config.reward.neutral_action, Action::Mindfulness);
    }

    #[test]
    fn test_load_partial_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[learning]\nexploration_rate = 0.3\n\n[reward]\nfeedback_weight = 0.7"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.learning.exploration_rate, 0.3);
        // Unspecified fields fall back to defaults
        assert_eq!(config.learning.discount_factor, 0.9);
        assert_eq!(config.reward.feedback_weight, 0.7);
    }

    #[test]
    fn test_invalid_rates_rejected() {
        let mut config = Config::default();
        config.learning.min_exploration_rate = 0.5;
        config.learning.exploration_rate = 0.1;
        assert!(config.validate().is_err());
    }
}
