//! The learning core: action selection policy, reward shaping and the
//! incremental value update rule. Everything here is pure; persistence
//! and sequencing live in the engine.

pub mod policy;
pub mod reward;
pub mod updater;

pub use policy::PolicySelector;
pub use reward::{FeedbackSignal, RewardCalculator};
pub use updater::LearningUpdater;
