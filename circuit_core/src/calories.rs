//! Calorie estimation from MET values.
//!
//! kcal = MET × body weight (kg) × hours. Every exercise in a plan is
//! charged its scheduled phase duration, regardless of pauses or skips.

use crate::session::PhaseDurations;
use crate::WorkoutPlan;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Energy for one exercise performed for `seconds`
pub fn exercise_calories(met: f64, body_weight_kg: f64, seconds: u32) -> f64 {
    met * body_weight_kg * f64::from(seconds) / SECONDS_PER_HOUR
}

/// Energy for a whole plan at the fixed phase durations
///
/// Summed as MET-seconds first and scaled once to keep the result exact
/// for the common case of whole-number inputs.
pub fn plan_calories(plan: &WorkoutPlan, body_weight_kg: f64, durations: &PhaseDurations) -> f64 {
    let warmup_met_seconds: f64 = plan
        .warmups
        .iter()
        .map(|e| e.met() * f64::from(durations.warmup))
        .sum();
    let main_met_seconds: f64 = plan
        .main
        .iter()
        .map(|e| e.met() * f64::from(durations.work))
        .sum();

    body_weight_kg * (warmup_met_seconds + main_met_seconds) / SECONDS_PER_HOUR
}

/// Calories as stored on a session record
pub fn rounded(calories: f64) -> u32 {
    if calories.is_finite() && calories > 0.0 {
        calories.round() as u32
    } else {
        0
    }
}
