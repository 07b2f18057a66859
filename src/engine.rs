//! The engine facade: the three operations the surrounding service layer
//! consumes, plus user registration and deletion.
//!
//! Every per-user operation runs under that user's exclusive critical
//! section and performs its storage writes inside a single transaction,
//! so callers never observe a partially-applied pipeline.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::Transaction;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::actions::{self, Action, CATALOG};
use crate::analytics::{self, AnalyticsReport};
use crate::config::Config;
use crate::db::{store, Database};
use crate::error::{CoachError, Result};
use crate::learn::reward::OutcomeScores;
use crate::learn::{FeedbackSignal, LearningUpdater, PolicySelector, RewardCalculator};
use crate::messages;
use crate::state::{self, CheckIn, StateKey};
use crate::tracker::{settlement_for, PendingRecommendation, ResolutionOutcome, Settlement};

/// Result of a successful `recommend` call
#[derive(Debug, Clone)]
pub struct Recommendation {
    pub pending_id: Uuid,
    pub action: Action,
    pub message: String,
    pub state: StateKey,
}

/// Result of a feedback-driven resolution
#[derive(Debug, Clone)]
pub struct Resolution {
    pub pending_id: Uuid,
    pub action: Action,
    pub state: StateKey,
    pub reward: f64,
    pub old_value: f64,
    pub new_value: f64,
}

/// Per-user Q-learning recommendation engine
pub struct Engine {
    db: Database,
    config: Config,
    policy: PolicySelector,
    rewards: RewardCalculator,
    updater: LearningUpdater,
    /// Registry of per-user critical sections; operations for different
    /// users proceed in parallel
    user_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Engine {
    pub fn new(db: Database, config: Config) -> Result<Self> {
        config.validate()?;
        let policy = PolicySelector::from_config(&config.learning);
        let rewards = RewardCalculator::from_config(&config.reward);
        let updater = LearningUpdater::from_config(&config.learning);
        Ok(Self {
            db,
            config,
            policy,
            rewards,
            updater,
            user_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Open (or create) a file-backed engine
    pub fn open(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        let db = Database::open(Some(path))?;
        info!(path = %db.path().display(), "opened engine database");
        Self::new(db, config)
    }

    fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().unwrap();
        locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Register a user. Idempotent: re-registering is a no-op.
    pub fn register_user(&self, user_id: &str) -> Result<()> {
        info!(user_id, "registering user");
        self.db
            .with_conn(|conn| store::create_user(conn, user_id, Utc::now()))
    }

    /// Delete a user and everything they own
    pub fn delete_user(&self, user_id: &str) -> Result<()> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().unwrap();
        self.db.transaction(|tx| {
            store::get_user(tx, user_id)?
                .ok_or_else(|| CoachError::unknown_user(user_id))?;
            store::delete_user(tx, user_id)
        })?;
        info!(user_id, "deleted user");
        Ok(())
    }

    /// Process a check-in and issue a recommendation.
    ///
    /// Settles any outstanding recommendation first (follow-up evidence
    /// if this check-in qualifies, the null path otherwise), records the
    /// check-in, then selects and records a new pending recommendation.
    pub fn recommend(&self, user_id: &str, check_in: &CheckIn) -> Result<Recommendation> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().unwrap();

        let user = self
            .db
            .with_conn(|conn| store::get_user(conn, user_id))?
            .ok_or_else(|| CoachError::unknown_user(user_id))?;

        // Validate and encode before any write
        let scores = check_in.validated()?;
        let new_state = state::encode(check_in)?;
        let now = check_in.recorded_at;
        let window = self.config.reward.resolution_window_hours;
        let mut rng = rand::thread_rng();

        let recommendation = self.db.transaction(|tx| {
            if let Some(open) = store::open_pending(tx, user_id)? {
                match settlement_for(&open, now, window) {
                    Settlement::FollowUp => {
                        let at_issue = OutcomeScores {
                            energy: open.energy_at_issue,
                            mood: open.mood_at_issue,
                        };
                        let follow_up = OutcomeScores {
                            energy: scores.energy,
                            mood: scores.mood,
                        };
                        // A follow-up always yields a reward
                        let reward = self
                            .rewards
                            .compute(None, at_issue, Some(follow_up))
                            .unwrap_or(0.0);
                        let (old, new) = self.apply_update(
                            tx,
                            user_id,
                            &open.state,
                            open.action,
                            reward,
                            Some(&new_state),
                            now,
                        )?;
                        store::mark_resolved(tx, open.id, ResolutionOutcome::FollowUp, now)?;
                        debug!(
                            user_id,
                            pending_id = %open.id,
                            reward,
                            old,
                            new,
                            "resolved recommendation from follow-up check-in"
                        );
                    }
                    Settlement::Null => {
                        // No evidence either way: explicit skip, the
                        // value table is not touched
                        store::mark_resolved(tx, open.id, ResolutionOutcome::Expired, now)?;
                        debug!(user_id, pending_id = %open.id, "expired stale recommendation");
                    }
                }
            }

            store::upsert_check_in(tx, user_id, check_in, &scores)?;

            let mut values = HashMap::new();
            for action in CATALOG {
                if actions::is_applicable(action, &new_state) {
                    values.insert(action, store::q_get(tx, user_id, &new_state, action)?);
                }
            }

            let action = match self
                .policy
                .choose(&mut rng, &new_state, &values, user.checkins_logged)
            {
                Ok(action) => action,
                Err(CoachError::NoApplicableAction { .. })
                    if actions::is_applicable(self.config.reward.neutral_action, &new_state) =>
                {
                    warn!(user_id, "empty applicable set, falling back to neutral action");
                    self.config.reward.neutral_action
                }
                Err(e) => return Err(e),
            };

            let message = messages::generate(&mut rng, action, &new_state, &scores);
            let pending = PendingRecommendation::new(
                user_id,
                new_state,
                action,
                message.clone(),
                scores.energy,
                scores.mood,
                now,
            );
            store::insert_pending(tx, &pending)?;

            info!(user_id, action = %action, state = %new_state, pending_id = %pending.id,
                "issued recommendation");

            Ok(Recommendation {
                pending_id: pending.id,
                action,
                message,
                state: new_state,
            })
        })?;

        Ok(recommendation)
    }

    /// Record a day's check-in without requesting a recommendation.
    ///
    /// An outstanding recommendation stays open while its resolution
    /// window lasts, so later explicit feedback can still blend the
    /// rating with this check-in's delta signal; one whose window has
    /// lapsed is expired on the null path. Returns true if the day was
    /// new rather than an overwrite.
    pub fn record_check_in(&self, user_id: &str, check_in: &CheckIn) -> Result<bool> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().unwrap();

        self.db
            .with_conn(|conn| store::get_user(conn, user_id))?
            .ok_or_else(|| CoachError::unknown_user(user_id))?;

        let scores = check_in.validated()?;
        let now = check_in.recorded_at;
        let window = self.config.reward.resolution_window_hours;

        self.db.transaction(|tx| {
            if let Some(open) = store::open_pending(tx, user_id)? {
                if !open.within_window(now, window) {
                    store::mark_resolved(tx, open.id, ResolutionOutcome::Expired, now)?;
                    debug!(user_id, pending_id = %open.id, "expired stale recommendation");
                }
            }
            let is_new = store::upsert_check_in(tx, user_id, check_in, &scores)?;
            info!(user_id, day_is_new = is_new, "recorded check-in");
            Ok(is_new)
        })
    }

    /// Resolve an outstanding recommendation with explicit feedback.
    ///
    /// The reward blends the rating with the next-day delta signal when a
    /// qualifying follow-up check-in has already been recorded.
    pub fn submit_feedback(&self, pending_id: Uuid, signal: FeedbackSignal) -> Result<Resolution> {
        let pending = self
            .db
            .with_conn(|conn| store::pending_by_id(conn, pending_id))?
            .ok_or_else(|| CoachError::unknown_recommendation(pending_id))?;

        let lock = self.user_lock(&pending.user_id);
        let _guard = lock.lock().unwrap();
        let now = Utc::now();
        let window = self.config.reward.resolution_window_hours;

        self.db.transaction(|tx| {
            // Re-read under the lock: a concurrent call may have
            // resolved it since the unlocked read
            let pending = store::pending_by_id(tx, pending_id)?
                .ok_or_else(|| CoachError::unknown_recommendation(pending_id))?;
            if pending.resolved {
                return Err(CoachError::unknown_recommendation(pending_id));
            }
            let user_id = pending.user_id.as_str();
            store::get_user(tx, user_id)?
                .ok_or_else(|| CoachError::unknown_user(user_id))?;

            let follow_up = store::follow_up_check_in(tx, user_id, pending.issued_at, window)?;
            let follow_scores = follow_up.as_ref().map(|row| OutcomeScores {
                energy: row.scores.energy,
                mood: row.scores.mood,
            });
            let next_state = follow_up
                .as_ref()
                .map(|row| state::encode(&row.as_check_in()))
                .transpose()?;

            let at_issue = OutcomeScores {
                energy: pending.energy_at_issue,
                mood: pending.mood_at_issue,
            };
            // With feedback present a reward is always produced
            let reward = self
                .rewards
                .compute(Some(&signal), at_issue, follow_scores)
                .unwrap_or(0.0);

            store::insert_feedback(tx, pending_id, signal.action_taken, signal.rating, now)?;
            let (old_value, new_value) = self.apply_update(
                tx,
                user_id,
                &pending.state,
                pending.action,
                reward,
                next_state.as_ref(),
                now,
            )?;
            store::mark_resolved(tx, pending_id, ResolutionOutcome::Feedback, now)?;

            info!(user_id, pending_id = %pending_id, reward, old_value, new_value,
                "resolved recommendation from feedback");

            Ok(Resolution {
                pending_id,
                action: pending.action,
                state: pending.state,
                reward,
                old_value,
                new_value,
            })
        })
    }

    /// Expire a user's outstanding recommendation if its resolution
    /// window has passed. Returns true if one was expired.
    pub fn resolve_by_timeout(&self, user_id: &str, now: DateTime<Utc>) -> Result<bool> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().unwrap();
        let window = self.config.reward.resolution_window_hours;

        self.db.transaction(|tx| {
            store::get_user(tx, user_id)?
                .ok_or_else(|| CoachError::unknown_user(user_id))?;
            match store::open_pending(tx, user_id)? {
                Some(open) if !open.within_window(now, window) => {
                    store::mark_resolved(tx, open.id, ResolutionOutcome::Expired, now)?;
                    debug!(user_id, pending_id = %open.id, "expired recommendation by timeout");
                    Ok(true)
                }
                _ => Ok(false),
            }
        })
    }

    /// Read-only export of the user's learned table and update history
    pub fn export_analytics(&self, user_id: &str) -> Result<AnalyticsReport> {
        self.db.with_conn(|conn| {
            store::get_user(conn, user_id)?
                .ok_or_else(|| CoachError::unknown_user(user_id))?;
            let q_table = store::q_snapshot(conn, user_id)?;
            let history = store::history_for_user(conn, user_id)?;
            let latest = store::latest_check_in(conn, user_id)?;
            Ok(analytics::build_report(user_id, q_table, history, latest))
        })
    }

    /// The user's currently outstanding recommendation, if any
    pub fn open_recommendation(&self, user_id: &str) -> Result<Option<PendingRecommendation>> {
        self.db.with_conn(|conn| store::open_pending(conn, user_id))
    }

    /// Apply one value update and append its history row. Sole writer of
    /// the value table.
    #[allow(clippy::too_many_arguments)]
    fn apply_update(
        &self,
        tx: &Transaction,
        user_id: &str,
        state: &StateKey,
        action: Action,
        reward: f64,
        next_state: Option<&StateKey>,
        now: DateTime<Utc>,
    ) -> Result<(f64, f64)> {
        let old_value = store::q_get(tx, user_id, state, action)?;
        let next_best = match next_state {
            Some(next) => best_applicable_value(tx, user_id, next)?,
            None => None,
        };
        let new_value = self.updater.updated_value(old_value, reward, next_best);
        store::q_set(tx, user_id, state, action, new_value)?;
        store::insert_history(tx, user_id, state, action, new_value, reward, now)?;
        Ok((old_value, new_value))
    }
}

/// Highest learned value among the actions applicable to a state, or
/// `None` if no action is applicable (no bootstrap term then)
fn best_applicable_value(
    tx: &Transaction,
    user_id: &str,
    state: &StateKey,
) -> Result<Option<f64>> {
    let mut best: Option<f64> = None;
    for action in CATALOG {
        if actions::is_applicable(action, state) {
            let value = store::q_get(tx, user_id, state, action)?;
            best = Some(best.map_or(value, |b: f64| b.max(value)));
        }
    }
    Ok(best)
}
