//! Incremental Q-learning value update.

use crate::config::LearningConfig;

/// Applies the standard incremental update rule. This is deliberately a
/// pure value computation; the engine is the sole writer of the value
/// table and applies updates in the order their rewards were computed.
#[derive(Debug, Clone)]
pub struct LearningUpdater {
    alpha: f64,
    gamma: f64,
}

impl LearningUpdater {
    pub fn from_config(config: &LearningConfig) -> Self {
        Self {
            alpha: config.learning_rate,
            gamma: config.discount_factor,
        }
    }

    /// New value for an entry given its old value, the computed reward
    /// and the best applicable value of the observed successor state.
    ///
    /// Without an observed successor the update degrades to the
    /// reward-only form (no bootstrapped future term).
    pub fn updated_value(&self, old_value: f64, reward: f64, next_best: Option<f64>) -> f64 {
        match next_best {
            Some(next) => old_value + self.alpha * (reward + self.gamma * next - old_value),
            None => old_value + self.alpha * (reward - old_value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn updater() -> LearningUpdater {
        LearningUpdater::from_config(&LearningConfig::default())
    }

    #[test]
    fn test_positive_reward_raises_fresh_entry() {
        let new = updater().updated_value(0.0, 0.6, None);
        assert!((new - 0.06).abs() < 1e-9);
    }

    #[test]
    fn test_bootstrapped_term_uses_discounted_next_best() {
        let u = updater();
        // 0.0 + 0.1 * (0.5 + 0.9 * 1.0 - 0.0) = 0.14
        let new = u.updated_value(0.0, 0.5, Some(1.0));
        assert!((new - 0.14).abs() < 1e-9);
    }

    #[test]
    fn test_update_converges_toward_reward() {
        let u = updater();
        let mut value = 0.0;
        for _ in 0..500 {
            value = u.updated_value(value, 0.8, None);
        }
        assert!((value - 0.8).abs() < 1e-3);
    }

    #[test]
    fn test_negative_reward_lowers_value() {
        let new = updater().updated_value(0.3, -1.0, None);
        assert!(new < 0.3);
    }
}
