//! Difficulty model: global bias from recent exertion and per-exercise
//! effective difficulty from personal feedback.
//!
//! Every function here is pure; the caller decides what to persist.

use crate::{ExerciseRecord, FeedbackEntry, SessionRecord, MAX_DIFFICULTY, MIN_DIFFICULTY};

/// Number of most recent sessions the bias looks at
pub const BIAS_WINDOW: usize = 5;

/// Lowest allowed bias
pub const MIN_BIAS: f64 = -1.5;

/// Highest allowed bias
pub const MAX_BIAS: f64 = 2.5;

/// Mean exertion above which the next workouts get easier
pub const DELOAD_ABOVE: f64 = 8.0;

/// Mean exertion below which the next workouts get harder
pub const PROGRESS_BELOW: f64 = 5.0;

/// Bias change applied on a clear signal in either direction
pub const BIAS_STEP: f64 = 0.5;

/// Bias change applied when exertion sits in the comfortable band
pub const BIAS_NUDGE: f64 = 0.1;

/// Centre of the difficulty scale, reached at bias 0
pub const NEUTRAL_DIFFICULTY: f64 = 5.0;

/// Difficulty points per unit of bias
pub const BIAS_SCALE: f64 = 2.0;

/// Average feedback at or above which an exercise counts one point harder
pub const HARDER_THRESHOLD: f64 = 8.0;

/// Average feedback at or below which an exercise counts one point easier
pub const EASIER_THRESHOLD: f64 = 3.0;

/// Compute the next bias from session history (oldest first)
///
/// Looks at the last [`BIAS_WINDOW`] records. An empty history yields 0.
pub fn compute_bias(history: &[SessionRecord], current_bias: f64) -> f64 {
    if history.is_empty() {
        return 0.0;
    }

    let window = &history[history.len().saturating_sub(BIAS_WINDOW)..];
    let mean = mean_exertion(window);

    let adjusted = if mean > DELOAD_ABOVE {
        current_bias - BIAS_STEP
    } else if mean < PROGRESS_BELOW {
        current_bias + BIAS_STEP
    } else {
        current_bias + BIAS_NUDGE
    };

    let bias = adjusted.clamp(MIN_BIAS, MAX_BIAS);
    tracing::debug!(
        "Bias {:.2} -> {:.2} (mean RPE {:.2} over {} sessions)",
        current_bias,
        bias,
        mean,
        window.len()
    );
    bias
}

/// Mean perceived exertion of the given records (0 when empty)
pub fn mean_exertion(records: &[SessionRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let total: f64 = records.iter().map(|r| f64::from(r.perceived_exertion)).sum();
    total / records.len() as f64
}

/// Map a bias onto the 0-10 difficulty scale
pub fn target_difficulty(bias: f64) -> f64 {
    (NEUTRAL_DIFFICULTY + bias * BIAS_SCALE).clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
}

/// Whole-number difficulty level shown to the user
pub fn difficulty_level(bias: f64) -> u8 {
    // Clamped to 0..=10 before the cast.
    (NEUTRAL_DIFFICULTY + bias * BIAS_SCALE)
        .round()
        .clamp(MIN_DIFFICULTY, MAX_DIFFICULTY) as u8
}

/// Base difficulty adjusted by the user's own ratings, clamped to 0-10
pub fn effective_difficulty(exercise: &ExerciseRecord, feedback: Option<&FeedbackEntry>) -> f64 {
    let mut difficulty = exercise.base_difficulty;

    if let Some(fb) = feedback {
        if fb.avg_score >= HARDER_THRESHOLD {
            difficulty += 1.0;
        } else if fb.avg_score <= EASIER_THRESHOLD {
            difficulty -= 1.0;
        }
    }

    difficulty.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
}
