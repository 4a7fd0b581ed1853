//! Session history and the statistics derived from it.
//!
//! History is stored oldest first under [`HISTORY_KEY`] and only ever
//! appended to.

use crate::difficulty::{difficulty_level, mean_exertion, BIAS_WINDOW};
use crate::store::{KeyValueStore, KeyValueStoreExt, HISTORY_KEY};
use crate::{Result, SessionRecord};
use serde::Serialize;

/// Number of sessions listed in [`Stats::recent`]
pub const RECENT_COUNT: usize = 3;

/// Load the full history, oldest first (empty when missing or unreadable)
pub fn load_history<S: KeyValueStore + ?Sized>(store: &S) -> Vec<SessionRecord> {
    store.get(HISTORY_KEY, Vec::new())
}

/// Append one record, rewriting the whole list
pub fn append_record<S: KeyValueStore + ?Sized>(store: &mut S, record: &SessionRecord) -> Result<()> {
    let mut history = load_history(store);
    if history.iter().any(|r| r.id == record.id) {
        tracing::warn!("Session {} already in history, not appending", record.id);
        return Ok(());
    }

    history.push(record.clone());
    store.set(HISTORY_KEY, &history)?;

    tracing::debug!("History now holds {} sessions", history.len());
    Ok(())
}

/// Summary shown on the stats screen
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Stats {
    pub total_workouts: usize,
    pub total_calories: u64,
    /// Mean RPE over the sessions the bias looks at
    pub average_exertion: Option<f64>,
    pub difficulty_level: u8,
    /// Most recent sessions, newest first
    pub recent: Vec<SessionRecord>,
}

/// Summarize a history (oldest first) for the given bias
pub fn summarize(history: &[SessionRecord], bias: f64) -> Stats {
    let window = &history[history.len().saturating_sub(BIAS_WINDOW)..];
    let average_exertion = (!window.is_empty()).then(|| mean_exertion(window));

    Stats {
        total_workouts: history.len(),
        total_calories: history.iter().map(|r| u64::from(r.calories_burned)).sum(),
        average_exertion,
        difficulty_level: difficulty_level(bias),
        recent: history.iter().rev().take(RECENT_COUNT).cloned().collect(),
    }
}
