//! Core domain types for the Circuit workout system.
//!
//! This module defines the fundamental types used throughout the system:
//! - Exercise records and their metadata
//! - Muscle-group buckets and workout focus
//! - Personal feedback entries and user settings
//! - Workout plans and completed session records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

/// Lowest difficulty on the 0-10 scale
pub const MIN_DIFFICULTY: f64 = 0.0;

/// Highest difficulty on the 0-10 scale
pub const MAX_DIFFICULTY: f64 = 10.0;

/// Difficulty assigned to exercises whose record omits one
pub const DEFAULT_DIFFICULTY: f64 = 5.0;

/// MET used for warmups without an explicit value
pub const WARMUP_MET: f64 = 4.0;

/// MET used for main exercises whose category has no specific default
pub const DEFAULT_MET: f64 = 6.0;

// ============================================================================
// Exercise Types
// ============================================================================

/// A single exercise from the catalog
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExerciseRecord {
    /// Derived from the name when a catalog file leaves it out
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default = "default_difficulty")]
    pub base_difficulty: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub equipment: Option<String>,
    #[serde(default)]
    pub force: Option<String>,
    #[serde(default)]
    pub mechanic: Option<String>,
    #[serde(default)]
    pub primary_muscles: BTreeSet<String>,
    #[serde(default)]
    pub secondary_muscles: BTreeSet<String>,
    #[serde(default)]
    pub quiet: bool,
    #[serde(default)]
    pub partner_required: bool,
    #[serde(default)]
    pub is_warmup: bool,
    #[serde(default)]
    pub met_value: Option<f64>,
    /// Reference identifiers for images or videos; never loaded by the engine
    #[serde(default)]
    pub media: Vec<String>,
}

fn default_difficulty() -> f64 {
    DEFAULT_DIFFICULTY
}

impl ExerciseRecord {
    /// Create a main exercise with the id derived from its name
    pub fn new(name: &str, base_difficulty: f64) -> Self {
        Self {
            id: exercise_id_from_name(name),
            name: name.to_string(),
            base_difficulty,
            description: String::new(),
            category: None,
            equipment: None,
            force: None,
            mechanic: None,
            primary_muscles: BTreeSet::new(),
            secondary_muscles: BTreeSet::new(),
            quiet: false,
            partner_required: false,
            is_warmup: false,
            met_value: None,
            media: Vec::new(),
        }
    }

    /// Create a warmup exercise with the id derived from its name
    pub fn warmup(name: &str) -> Self {
        Self {
            is_warmup: true,
            base_difficulty: 1.0,
            ..Self::new(name, 1.0)
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn with_equipment(mut self, equipment: &str) -> Self {
        self.equipment = Some(equipment.to_string());
        self
    }

    pub fn with_force(mut self, force: &str) -> Self {
        self.force = Some(force.to_string());
        self
    }

    pub fn with_mechanic(mut self, mechanic: &str) -> Self {
        self.mechanic = Some(mechanic.to_string());
        self
    }

    pub fn with_primary(mut self, muscles: &[&str]) -> Self {
        self.primary_muscles = muscles.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn with_secondary(mut self, muscles: &[&str]) -> Self {
        self.secondary_muscles = muscles.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn with_met(mut self, met: f64) -> Self {
        self.met_value = Some(met);
        self
    }

    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    pub fn needs_partner(mut self) -> Self {
        self.partner_required = true;
        self
    }

    /// MET value used for calorie estimation
    ///
    /// Missing or non-positive values fall back to a category default.
    pub fn met(&self) -> f64 {
        match self.met_value {
            Some(met) if met > 0.0 => met,
            _ => default_met(self.category.as_deref(), self.is_warmup),
        }
    }

    /// Whether any primary muscle belongs to the given bucket
    pub fn targets(&self, group: MuscleGroup) -> bool {
        self.primary_muscles
            .iter()
            .any(|m| group.muscles().contains(&m.to_lowercase().as_str()))
    }
}

/// Derive a stable exercise id from its display name
///
/// Whitespace is removed and the result lowercased ("Push Ups" → "pushups").
pub fn exercise_id_from_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Default MET for an exercise lacking an explicit value
pub fn default_met(category: Option<&str>, is_warmup: bool) -> f64 {
    if is_warmup {
        return WARMUP_MET;
    }

    match category.map(str::to_lowercase).as_deref() {
        Some("cardio") | Some("plyometrics") => 8.0,
        Some("stretching") => 2.5,
        _ => DEFAULT_MET,
    }
}

// ============================================================================
// Muscle Groups and Focus
// ============================================================================

/// Coarse muscle-group bucket used for balanced selection
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum MuscleGroup {
    UpperBody,
    LowerBody,
    Core,
    Cardio,
}

impl MuscleGroup {
    /// Buckets in the order balanced selection fills them
    pub const ALL: [MuscleGroup; 4] = [
        MuscleGroup::UpperBody,
        MuscleGroup::LowerBody,
        MuscleGroup::Core,
        MuscleGroup::Cardio,
    ];

    /// Primary-muscle names that place an exercise in this bucket
    pub fn muscles(&self) -> &'static [&'static str] {
        match self {
            MuscleGroup::UpperBody => &[
                "chest",
                "back",
                "shoulders",
                "biceps",
                "triceps",
                "lats",
                "middle back",
                "traps",
                "forearms",
            ],
            MuscleGroup::LowerBody => &[
                "quads",
                "quadriceps",
                "hamstrings",
                "glutes",
                "calves",
                "adductors",
                "abductors",
            ],
            MuscleGroup::Core => &["abs", "abdominals", "obliques", "lower back"],
            MuscleGroup::Cardio => &["cardio"],
        }
    }
}

/// Workout focus chosen in the user's settings
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutFocus {
    #[default]
    FullBody,
    UpperBody,
    LowerBody,
    Core,
    Cardio,
}

impl WorkoutFocus {
    /// The single bucket a focused workout draws from (None for full body)
    pub fn muscle_group(&self) -> Option<MuscleGroup> {
        match self {
            WorkoutFocus::FullBody => None,
            WorkoutFocus::UpperBody => Some(MuscleGroup::UpperBody),
            WorkoutFocus::LowerBody => Some(MuscleGroup::LowerBody),
            WorkoutFocus::Core => Some(MuscleGroup::Core),
            WorkoutFocus::Cardio => Some(MuscleGroup::Cardio),
        }
    }

    /// Parse a user-supplied focus name ("full body", "upper", "core", ...)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace(['-', '_'], " ").trim() {
            "full body" | "full" | "fullbody" => Some(WorkoutFocus::FullBody),
            "upper body" | "upper" => Some(WorkoutFocus::UpperBody),
            "lower body" | "lower" => Some(WorkoutFocus::LowerBody),
            "core" => Some(WorkoutFocus::Core),
            "cardio" => Some(WorkoutFocus::Cardio),
            _ => None,
        }
    }
}

// ============================================================================
// Feedback and Settings
// ============================================================================

/// Running average of a user's difficulty ratings for one exercise
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct FeedbackEntry {
    pub avg_score: f64,
    pub count: u32,
}

impl Default for FeedbackEntry {
    fn default() -> Self {
        Self {
            avg_score: 5.0,
            count: 0,
        }
    }
}

/// Feedback keyed by exercise id
pub type FeedbackMap = HashMap<String, FeedbackEntry>;

/// Per-user settings persisted between sessions
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionSettings {
    #[serde(default = "default_body_weight")]
    pub body_weight_kg: f64,
    #[serde(default)]
    pub difficulty_bias: f64,
    #[serde(default)]
    pub focus: WorkoutFocus,
}

fn default_body_weight() -> f64 {
    70.0
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            body_weight_kg: default_body_weight(),
            difficulty_bias: 0.0,
            focus: WorkoutFocus::FullBody,
        }
    }
}

// ============================================================================
// Plans and Records
// ============================================================================

/// The immutable set of exercises generated for one session
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkoutPlan {
    pub warmups: Vec<ExerciseRecord>,
    pub main: Vec<ExerciseRecord>,
    pub target_difficulty: f64,
    pub total_duration_seconds: u32,
}

impl WorkoutPlan {
    /// Every exercise id in the plan, warmups first
    pub fn exercise_ids(&self) -> impl Iterator<Item = &str> {
        self.warmups
            .iter()
            .chain(self.main.iter())
            .map(|e| e.id.as_str())
    }
}

/// A completed workout, appended to history
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub perceived_exertion: u8,
    pub calories_burned: u32,
    #[serde(default)]
    pub duration_seconds: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_from_name() {
        assert_eq!(exercise_id_from_name("Push Ups"), "pushups");
        assert_eq!(exercise_id_from_name("  Jumping\tJacks "), "jumpingjacks");
    }

    #[test]
    fn test_met_defaults() {
        let squat = ExerciseRecord::new("Squat", 4.0);
        assert_eq!(squat.met(), DEFAULT_MET);

        let sprint = ExerciseRecord::new("Sprint", 7.0).with_category("cardio");
        assert_eq!(sprint.met(), 8.0);

        let arm_circles = ExerciseRecord::warmup("Arm Circles");
        assert_eq!(arm_circles.met(), WARMUP_MET);

        let explicit = ExerciseRecord::new("Plank", 3.0).with_met(3.0);
        assert_eq!(explicit.met(), 3.0);

        let broken = ExerciseRecord::new("Broken", 3.0).with_met(0.0);
        assert_eq!(broken.met(), DEFAULT_MET);
    }

    #[test]
    fn test_missing_attributes_use_defaults() {
        let json = r#"{ "id": "mystery", "name": "Mystery Move" }"#;
        let record: ExerciseRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.base_difficulty, DEFAULT_DIFFICULTY);
        assert!(record.primary_muscles.is_empty());
        assert!(!record.is_warmup);
        assert_eq!(record.met(), DEFAULT_MET);
    }

    #[test]
    fn test_targets_bucket_case_insensitive() {
        let pushup = ExerciseRecord::new("Push Up", 4.0).with_primary(&["Chest", "triceps"]);
        assert!(pushup.targets(MuscleGroup::UpperBody));
        assert!(!pushup.targets(MuscleGroup::LowerBody));
    }

    #[test]
    fn test_focus_parse() {
        assert_eq!(WorkoutFocus::parse("full body"), Some(WorkoutFocus::FullBody));
        assert_eq!(WorkoutFocus::parse("upper_body"), Some(WorkoutFocus::UpperBody));
        assert_eq!(WorkoutFocus::parse("Lower"), Some(WorkoutFocus::LowerBody));
        assert_eq!(WorkoutFocus::parse("legs"), None);
        assert_eq!(WorkoutFocus::FullBody.muscle_group(), None);
        assert_eq!(
            WorkoutFocus::Core.muscle_group(),
            Some(MuscleGroup::Core)
        );
    }
}
