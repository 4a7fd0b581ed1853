//! Per-exercise difficulty feedback.
//!
//! Ratings fold into a running mean that is never reset except by an
//! explicit data clear.

use crate::store::{KeyValueStore, KeyValueStoreExt, FEEDBACK_KEY};
use crate::{FeedbackEntry, FeedbackMap, Result};

/// Lowest accepted rating
pub const MIN_RATING: u8 = 1;

/// Highest accepted rating
pub const MAX_RATING: u8 = 10;

impl FeedbackEntry {
    /// Fold a new rating into the running mean
    ///
    /// Ratings outside 1..=10 are clamped first.
    pub fn record(&mut self, rating: u8) {
        let rating = f64::from(rating.clamp(MIN_RATING, MAX_RATING));
        let count = f64::from(self.count);
        self.avg_score = (self.avg_score * count + rating) / (count + 1.0);
        self.count += 1;
    }
}

/// Record a rating for `exercise_id`, creating the entry on first use
pub fn record_rating(map: &mut FeedbackMap, exercise_id: &str, rating: u8) -> FeedbackEntry {
    let entry = map.entry(exercise_id.to_string()).or_default();
    entry.record(rating);
    *entry
}

/// Load the feedback map (empty when missing or unreadable)
pub fn load_feedback<S: KeyValueStore + ?Sized>(store: &S) -> FeedbackMap {
    store.get(FEEDBACK_KEY, FeedbackMap::new())
}

/// Read-modify-write a single rating through the store
///
/// The whole map is replaced on write (last writer wins).
pub fn submit_rating<S: KeyValueStore + ?Sized>(
    store: &mut S,
    exercise_id: &str,
    rating: u8,
) -> Result<FeedbackEntry> {
    let mut map = load_feedback(store);
    let entry = record_rating(&mut map, exercise_id, rating);
    store.set(FEEDBACK_KEY, &map)?;

    tracing::info!(
        "Recorded rating {} for {}: avg {:.2} over {} ratings",
        rating,
        exercise_id,
        entry.avg_score,
        entry.count
    );
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_incremental_mean() {
        let mut entry = FeedbackEntry::default();
        assert_eq!(entry.avg_score, 5.0);
        assert_eq!(entry.count, 0);

        entry.record(9);
        assert_eq!(entry, FeedbackEntry { avg_score: 9.0, count: 1 });

        entry.record(3);
        assert_eq!(entry, FeedbackEntry { avg_score: 6.0, count: 2 });
    }

    #[test]
    fn test_out_of_range_rating_clamped() {
        let mut entry = FeedbackEntry::default();
        entry.record(0);
        assert_eq!(entry.avg_score, 1.0);

        entry.record(42);
        assert_eq!(entry.avg_score, 5.5);
    }

    #[test]
    fn test_record_rating_creates_entry() {
        let mut map = FeedbackMap::new();
        let entry = record_rating(&mut map, "burpees", 8);
        assert_eq!(entry.count, 1);
        assert_eq!(map["burpees"].avg_score, 8.0);
    }

    #[test]
    fn test_submit_rating_persists() {
        let mut store = MemoryStore::new();
        submit_rating(&mut store, "pushups", 9).unwrap();
        submit_rating(&mut store, "pushups", 3).unwrap();
        submit_rating(&mut store, "squats", 2).unwrap();

        let map = load_feedback(&store);
        assert_eq!(map.len(), 2);
        assert_eq!(map["pushups"], FeedbackEntry { avg_score: 6.0, count: 2 });
        assert_eq!(map["squats"].count, 1);
    }
}
