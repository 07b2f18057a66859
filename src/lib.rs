// Cyclewise - per-user Q-learning engine for personalised wellness
// recommendations

pub mod actions;
pub mod analytics;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod learn;
pub mod messages;
pub mod state;
pub mod tracker;

pub use config::Config;
pub use engine::{Engine, Recommendation, Resolution};
pub use error::{CoachError, Result};
pub use learn::FeedbackSignal;
pub use state::{CheckIn, CyclePhase, StateKey};

use tracing::info;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Initialize logging with default settings (colored CLI output)
pub fn init() -> anyhow::Result<()> {
    init_with_logger(true)
}

/// Initialize logging with custom configuration
///
/// @param ansi_colors - Whether to enable ANSI color codes in logs;
/// disable when output is consumed by another process
pub fn init_with_logger(ansi_colors: bool) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    if !ansi_colors {
        fmt::Subscriber::builder()
            .with_ansi(false)
            .with_writer(std::io::stderr)
            .with_env_filter(EnvFilter::from_default_env())
            .with_target(false)
            .without_time()
            .init();
    } else {
        fmt::Subscriber::builder()
            .with_ansi(true)
            .with_env_filter(EnvFilter::from_default_env())
            .with_target(true)
            .init();
    }

    info!("Initializing cyclewise engine v{}", version());
    Ok(())
}
