use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

use cyclewise::{CheckIn, Config, CyclePhase, Engine, FeedbackSignal};

/// Command-line driver for the cyclewise recommendation engine.
///
/// This stands in for the service layer (HTTP handlers, dashboard) that
/// would normally call the engine.
#[derive(Parser)]
#[command(name = "cyclewise", version, about)]
struct Cli {
    /// Path to the SQLite database file
    #[arg(long, default_value = "cyclewise.db")]
    db: PathBuf,

    /// Optional TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Daily check-in fields shared by the recording subcommands
#[derive(Args)]
struct CheckInArgs {
    #[arg(long)]
    user: String,
    #[arg(long)]
    phase: CyclePhase,
    #[arg(long)]
    sleep: u8,
    #[arg(long)]
    mood: u8,
    #[arg(long)]
    stress: u8,
    #[arg(long)]
    pain: u8,
    #[arg(long)]
    energy: u8,
}

impl CheckInArgs {
    fn to_check_in(&self) -> CheckIn {
        CheckIn {
            cycle_phase: self.phase,
            recorded_at: Utc::now(),
            sleep: Some(self.sleep),
            mood: Some(self.mood),
            stress: Some(self.stress),
            pain: Some(self.pain),
            energy: Some(self.energy),
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Register a user (idempotent)
    Register {
        #[arg(long)]
        user: String,
    },
    /// Record today's check-in and get a recommendation
    Recommend(CheckInArgs),
    /// Record today's check-in without requesting a recommendation
    CheckIn(CheckInArgs),
    /// Submit feedback for an outstanding recommendation
    Feedback {
        /// Recommendation id returned by `recommend`
        #[arg(long)]
        id: Uuid,
        /// Effectiveness rating, 0-10
        #[arg(long)]
        rating: u8,
        /// Set if the suggested action was not actually taken
        #[arg(long)]
        skipped: bool,
    },
    /// Expire a stale outstanding recommendation
    Expire {
        #[arg(long)]
        user: String,
    },
    /// Export the learned table and history as JSON
    Analytics {
        #[arg(long)]
        user: String,
    },
    /// Delete a user and all their data
    DeleteUser {
        #[arg(long)]
        user: String,
    },
}

fn main() -> Result<()> {
    cyclewise::init()?;
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path).context("Failed to load configuration")?,
        None => Config::default(),
    };
    let engine = Engine::open(&cli.db, config).context("Failed to open engine database")?;

    match cli.command {
        Command::Register { user } => {
            engine.register_user(&user)?;
            println!("registered {}", user);
        }
        Command::Recommend(args) => {
            let rec = engine.recommend(&args.user, &args.to_check_in())?;
            println!("recommendation {} ({})", rec.action, rec.pending_id);
            println!("{}", rec.message);
        }
        Command::CheckIn(args) => {
            if engine.record_check_in(&args.user, &args.to_check_in())? {
                println!("recorded check-in for {}", args.user);
            } else {
                println!("updated today's check-in for {}", args.user);
            }
        }
        Command::Feedback {
            id,
            rating,
            skipped,
        } => {
            let resolution = engine.submit_feedback(
                id,
                FeedbackSignal {
                    action_taken: !skipped,
                    rating,
                },
            )?;
            println!(
                "reward {:.3}: value for ({}, {}) moved {:.4} -> {:.4}",
                resolution.reward,
                resolution.state,
                resolution.action,
                resolution.old_value,
                resolution.new_value
            );
        }
        Command::Expire { user } => {
            if engine.resolve_by_timeout(&user, Utc::now())? {
                println!("expired stale recommendation for {}", user);
            } else {
                println!("nothing to expire for {}", user);
            }
        }
        Command::Analytics { user } => {
            let report = engine.export_analytics(&user)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::DeleteUser { user } => {
            engine.delete_user(&user)?;
            println!("deleted {}", user);
        }
    }

    Ok(())
}
