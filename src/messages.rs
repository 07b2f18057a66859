//! Phase-aware notification text for issued recommendations.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::actions::Action;
use crate::state::{CheckInScores, CyclePhase, StateKey};

fn stretch_type(phase: CyclePhase) -> &'static str {
    match phase {
        CyclePhase::Menstrual => "hip-opening and gentle yoga",
        CyclePhase::Follicular => "dynamic stretches and flow movements",
        CyclePhase::Ovulation => "energetic and full-range stretches",
        CyclePhase::Luteal => "calming and restorative stretches",
    }
}

fn snack_suggestion(phase: CyclePhase) -> &'static str {
    match phase {
        CyclePhase::Menstrual => "iron-rich foods and dark chocolate",
        CyclePhase::Follicular => "light, nutrient-dense foods",
        CyclePhase::Ovulation => "fresh fruits and vegetables",
        CyclePhase::Luteal => "complex carbs and protein-rich foods",
    }
}

fn movement_type(phase: CyclePhase) -> &'static str {
    match phase {
        CyclePhase::Menstrual => "gentle walking or stretching",
        CyclePhase::Follicular => "moderate cardio or strength training",
        CyclePhase::Ovulation => "high-intensity activities or dance",
        CyclePhase::Luteal => "yoga or light cardio",
    }
}

/// Generate the user-facing message for a chosen action.
///
/// The message variant is sampled, so this is the one place in the issue
/// path besides the policy that consumes randomness.
pub fn generate<R: Rng + ?Sized>(
    rng: &mut R,
    action: Action,
    state: &StateKey,
    scores: &CheckInScores,
) -> String {
    let phase = state.cycle_phase;
    let variants: Vec<String> = match action {
        Action::Stretch => vec![
            format!(
                "Time for some gentle stretching! During {} phase, focus on {}",
                phase,
                stretch_type(phase)
            ),
            format!(
                "Your body could use some movement. Try these {}-friendly stretches",
                phase
            ),
            "Quick stretch break! Listen to your body and move gently".to_string(),
        ],
        Action::Mindfulness => vec![
            format!(
                "Take a moment to check in with yourself. During {}, practice deep breathing",
                phase
            ),
            "Time for a mindful moment. Close your eyes and breathe deeply".to_string(),
            "Pause for peace. A short meditation can help balance your energy".to_string(),
        ],
        Action::Magnesium => vec![
            format!(
                "During {}, magnesium can help with comfort. Consider taking a supplement",
                phase
            ),
            "Magnesium-rich foods like dark chocolate or nuts could help with symptoms"
                .to_string(),
            "Remember your magnesium supplement to support your body's needs".to_string(),
        ],
        Action::Nap => vec![
            format!(
                "Your energy seems low. A short nap could help during {} phase",
                phase
            ),
            "Listen to your body - a 20-minute power nap might be just what you need".to_string(),
            "Rest is important! Consider a short nap to recharge".to_string(),
        ],
        Action::HealthySnack => vec![
            format!(
                "Time for a {}-supporting snack! Focus on {}",
                phase,
                snack_suggestion(phase)
            ),
            "Nourish your body with a balanced snack".to_string(),
            "Hungry? Choose a nutrient-rich snack to support your energy".to_string(),
        ],
        Action::MovementBreak => vec![
            format!("Time to move! During {}, try {}", phase, movement_type(phase)),
            "A short walk or gentle movement can help with energy and mood".to_string(),
            "Your body needs movement - choose an activity that feels good".to_string(),
        ],
    };

    let mut message = variants
        .choose(rng)
        .cloned()
        .unwrap_or_else(|| "Time to take care of yourself!".to_string());

    if scores.pain >= 7 && phase == CyclePhase::Menstrual {
        message.push_str("\nRemember to be gentle with yourself and listen to your body's needs.");
    }
    if scores.energy <= 3 {
        message.push_str("\nKeep it gentle and rest if needed.");
    }

    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Level, TimeOfDay};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn state() -> StateKey {
        StateKey {
            cycle_phase: CyclePhase::Menstrual,
            sleep: Level::Medium,
            mood: Level::Low,
            stress: Level::High,
            pain: Level::High,
            energy: Level::Low,
            time_of_day: TimeOfDay::Evening,
        }
    }

    #[test]
    fn test_pain_and_energy_addenda() {
        let mut rng = StdRng::seed_from_u64(7);
        let scores = CheckInScores {
            sleep: 5,
            mood: 3,
            stress: 8,
            pain: 8,
            energy: 2,
        };
        let message = generate(&mut rng, Action::Magnesium, &state(), &scores);
        assert!(message.contains("gentle with yourself"));
        assert!(message.contains("rest if needed"));
    }

    #[test]
    fn test_message_mentions_phase_specific_guidance() {
        let mut rng = StdRng::seed_from_u64(0);
        let scores = CheckInScores {
            sleep: 5,
            mood: 5,
            stress: 5,
            pain: 5,
            energy: 5,
        };
        // All stretch variants either name the phase or the generic prompt
        for _ in 0..10 {
            let message = generate(&mut rng, Action::Stretch, &state(), &scores);
            assert!(!message.is_empty());
        }
    }
}
