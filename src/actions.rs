//! The closed, ordered catalog of recommendation actions.
//!
//! The catalog is identical for every user; personalisation lives entirely
//! in the per-user value table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoachError, Result};
use crate::state::{CyclePhase, Level, StateKey, TimeOfDay};

/// A recommendable wellness action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Stretch,
    Mindfulness,
    Magnesium,
    Nap,
    HealthySnack,
    MovementBreak,
}

/// Full catalog in canonical order. Greedy tie-breaks resolve to the
/// lowest index in this list.
pub const CATALOG: [Action; 6] = [
    Action::Stretch,
    Action::Mindfulness,
    Action::Magnesium,
    Action::Nap,
    Action::HealthySnack,
    Action::MovementBreak,
];

/// Subset preferred while exploring during menstrual phase with high pain
pub const PAIN_MANAGEMENT: [Action; 2] = [Action::Magnesium, Action::Stretch];

impl Action {
    /// Position in the canonical catalog order
    pub fn index(&self) -> usize {
        CATALOG.iter().position(|a| a == self).unwrap_or(0)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Stretch => "stretch",
            Action::Mindfulness => "mindfulness",
            Action::Magnesium => "magnesium",
            Action::Nap => "nap",
            Action::HealthySnack => "healthy_snack",
            Action::MovementBreak => "movement_break",
        }
    }
}

impl FromStr for Action {
    type Err = CoachError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stretch" => Ok(Action::Stretch),
            "mindfulness" => Ok(Action::Mindfulness),
            "magnesium" => Ok(Action::Magnesium),
            "nap" => Ok(Action::Nap),
            "healthy_snack" => Ok(Action::HealthySnack),
            "movement_break" => Ok(Action::MovementBreak),
            other => Err(CoachError::storage(format!("unknown action: {}", other))),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contraindication rules. An action may only be recommended for a state
/// it is applicable to:
/// - MovementBreak is suppressed at high pain, and entirely during
///   menstrual phase when energy is low.
/// - Nap is suppressed at night (it would displace actual sleep).
/// - Magnesium is only suggested during menstrual and luteal phases.
/// - Stretch, Mindfulness and HealthySnack are always applicable.
pub fn is_applicable(action: Action, state: &StateKey) -> bool {
    match action {
        Action::MovementBreak => {
            state.pain != Level::High
                && !(state.cycle_phase == CyclePhase::Menstrual && state.energy == Level::Low)
        }
        Action::Nap => state.time_of_day != TimeOfDay::Night,
        Action::Magnesium => matches!(
            state.cycle_phase,
            CyclePhase::Menstrual | CyclePhase::Luteal
        ),
        Action::Stretch | Action::Mindfulness | Action::HealthySnack => true,
    }
}

/// Applicable actions for a state, in catalog order.
///
/// Errors if the applicable set is empty; callers fall back to the
/// configured neutral action.
pub fn applicable_actions(state: &StateKey) -> Result<Vec<Action>> {
    let actions: Vec<Action> = CATALOG
        .iter()
        .copied()
        .filter(|a| is_applicable(*a, state))
        .collect();
    if actions.is_empty() {
        return Err(CoachError::no_applicable_action(state.as_key()));
    }
    Ok(actions)
}
