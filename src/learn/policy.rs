//! Epsilon-greedy action selection over the applicable subset of the
//! catalog.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::actions::{self, Action, PAIN_MANAGEMENT};
use crate::config::LearningConfig;
use crate::error::Result;
use crate::state::{CyclePhase, Level, StateKey};

/// Chooses an action for a state given the current value estimates.
///
/// Exploration decays with the user's accumulated check-in history but is
/// floored at a strictly positive minimum, so the table keeps adapting to
/// drift indefinitely.
#[derive(Debug, Clone)]
pub struct PolicySelector {
    exploration_rate: f64,
    exploration_decay: f64,
    min_exploration_rate: f64,
    pain_bias_probability: f64,
}

impl PolicySelector {
    pub fn from_config(config: &LearningConfig) -> Self {
        Self {
            exploration_rate: config.exploration_rate,
            exploration_decay: config.exploration_decay,
            min_exploration_rate: config.min_exploration_rate,
            pain_bias_probability: config.pain_bias_probability,
        }
    }

    /// Exploration rate for a user with the given history length
    pub fn epsilon_for(&self, checkins_logged: u64) -> f64 {
        let decayed =
            self.exploration_rate * self.exploration_decay.powi(checkins_logged.min(10_000) as i32);
        decayed.max(self.min_exploration_rate)
    }

    /// Pick an action for `state`.
    ///
    /// With probability epsilon, samples uniformly among applicable
    /// actions (preferring the pain-management subset during menstrual
    /// phase with high pain). Otherwise picks the applicable action with
    /// the highest value, breaking ties by lowest catalog index.
    pub fn choose<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        state: &StateKey,
        values: &HashMap<Action, f64>,
        checkins_logged: u64,
    ) -> Result<Action> {
        let applicable = actions::applicable_actions(state)?;
        let epsilon = self.epsilon_for(checkins_logged);

        if rng.gen::<f64>() < epsilon {
            let pain_flare =
                state.cycle_phase == CyclePhase::Menstrual && state.pain == Level::High;
            if pain_flare && rng.gen::<f64>() < self.pain_bias_probability {
                let relief: Vec<Action> = PAIN_MANAGEMENT
                    .iter()
                    .copied()
                    .filter(|a| applicable.contains(a))
                    .collect();
                if let Some(action) = relief.choose(rng) {
                    debug!(action = %action, "explore (pain management)");
                    return Ok(*action);
                }
            }
            // applicable is never empty here
            let action = *applicable.choose(rng).unwrap();
            debug!(action = %action, epsilon, "explore");
            return Ok(action);
        }

        // Greedy: applicable is in catalog order, so keeping only a
        // strictly greater value breaks ties deterministically toward
        // the lowest index.
        let mut best = applicable[0];
        let mut best_value = values.get(&best).copied().unwrap_or(0.0);
        for action in applicable.iter().skip(1) {
            let value = values.get(action).copied().unwrap_or(0.0);
            if value > best_value {
                best = *action;
                best_value = value;
            }
        }
        debug!(action = %best, value = best_value, "exploit");
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TimeOfDay;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn selector(epsilon: f64) -> PolicySelector {
        PolicySelector {
            exploration_rate: epsilon,
            exploration_decay: 0.995,
            min_exploration_rate: 0.05,
            pain_bias_probability: 0.6,
        }
    }

    fn state(phase: CyclePhase, pain: Level) -> StateKey {
        StateKey {
            cycle_phase: phase,
            sleep: Level::Medium,
            mood: Level::Medium,
            stress: Level::Medium,
            pain,
            energy: Level::Medium,
            time_of_day: TimeOfDay::Afternoon,
        }
    }

    #[test]
    fn test_greedy_picks_highest_value() {
        let selector = selector(0.0);
        let mut rng = StdRng::seed_from_u64(1);
        let s = state(CyclePhase::Follicular, Level::Low);
        let mut values = HashMap::new();
        values.insert(Action::Nap, 0.8);
        values.insert(Action::Stretch, 0.3);

        let action = selector.choose(&mut rng, &s, &values, 0).unwrap();
        assert_eq!(action, Action::Nap);
    }

    #[test]
    fn test_greedy_tie_breaks_by_catalog_index() {
        let selector = selector(0.0);
        let mut rng = StdRng::seed_from_u64(1);
        let s = state(CyclePhase::Follicular, Level::Low);
        // All values default to 0.0: the first catalog entry wins
        let action = selector.choose(&mut rng, &s, &HashMap::new(), 0).unwrap();
        assert_eq!(action, Action::Stretch);
    }

    #[test]
    fn test_never_returns_inapplicable_action() {
        let selector = selector(1.0);
        let mut rng = StdRng::seed_from_u64(42);
        let s = state(CyclePhase::Menstrual, Level::High);
        let mut values = HashMap::new();
        // Even with a dominant value, an inapplicable action must not win
        values.insert(Action::MovementBreak, 99.0);

        for _ in 0..200 {
            let action = selector.choose(&mut rng, &s, &values, 0).unwrap();
            assert!(crate::actions::is_applicable(action, &s));
            assert_ne!(action, Action::MovementBreak);
        }
    }

    #[test]
    fn test_epsilon_decays_but_stays_bounded_away_from_zero() {
        let selector = selector(0.2);
        assert_eq!(selector.epsilon_for(0), 0.2);
        assert!(selector.epsilon_for(100) < 0.2);
        assert!(selector.epsilon_for(100) > selector.epsilon_for(500));
        // Perpetual minimum exploration
        assert_eq!(selector.epsilon_for(1_000_000), 0.05);
    }

    #[test]
    fn test_exploration_prefers_pain_management_during_flare() {
        let selector = selector(1.0);
        let mut rng = StdRng::seed_from_u64(9);
        let s = state(CyclePhase::Menstrual, Level::High);

        let mut relief_hits = 0usize;
        let trials = 1000;
        for _ in 0..trials {
            let action = selector.choose(&mut rng, &s, &HashMap::new(), 0).unwrap();
            if PAIN_MANAGEMENT.contains(&action) {
                relief_hits += 1;
            }
        }
        // Baseline uniform would land near 2/5 of trials; with the bias
        // the subset should clearly dominate.
        assert!(relief_hits > trials / 2);
    }
}
