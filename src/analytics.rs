//! Read-only analytics export: the learned value table plus the history
//! of applied updates, aggregated into per-action effectiveness.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::db::{CheckInRow, HistoryRow, QEntry};

/// Aggregate effectiveness of one action across all applied updates
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ActionStats {
    pub total_reward: f64,
    pub count: u64,
    pub average: f64,
}

/// Everything a dashboard needs for one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub user_id: String,
    /// Full (state, action) → value snapshot
    pub q_table: Vec<QEntry>,
    /// Applied updates in temporal order
    pub history: Vec<HistoryRow>,
    pub action_effectiveness: HashMap<String, ActionStats>,
    /// Up to three actions with the highest average reward
    pub top_actions: Vec<String>,
    /// Most recent logged check-in, if any
    pub latest_check_in: Option<CheckInRow>,
}

/// Assemble the report from a user's snapshot and update history
pub fn build_report(
    user_id: impl Into<String>,
    q_table: Vec<QEntry>,
    history: Vec<HistoryRow>,
    latest_check_in: Option<CheckInRow>,
) -> AnalyticsReport {
    let mut effectiveness: HashMap<String, ActionStats> = HashMap::new();
    for entry in &history {
        let stats = effectiveness.entry(entry.action.clone()).or_default();
        stats.total_reward += entry.reward;
        stats.count += 1;
    }
    for stats in effectiveness.values_mut() {
        if stats.count > 0 {
            stats.average = stats.total_reward / stats.count as f64;
        }
    }

    let mut ranked: Vec<(&String, f64)> = effectiveness
        .iter()
        .map(|(action, stats)| (action, stats.average))
        .collect();
    // Ties rank alphabetically so the export is stable
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });
    let top_actions = ranked.into_iter().take(3).map(|(a, _)| a.clone()).collect();

    AnalyticsReport {
        user_id: user_id.into(),
        q_table,
        history,
        action_effectiveness: effectiveness,
        top_actions,
        latest_check_in,
    }
}
