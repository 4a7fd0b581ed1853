//! Exercise catalog: the built-in set and file-backed sources.
//!
//! The engine only reads the catalog. Loading failures degrade to an empty
//! catalog so the rest of the application stays usable.

use crate::types::*;
use crate::{Error, Result};
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// The complete list of exercises available for one session
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Catalog {
    pub exercises: Vec<ExerciseRecord>,
}

impl Catalog {
    pub fn new(exercises: Vec<ExerciseRecord>) -> Self {
        Self { exercises }
    }

    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }

    pub fn len(&self) -> usize {
        self.exercises.len()
    }

    pub fn find(&self, id: &str) -> Option<&ExerciseRecord> {
        self.exercises.iter().find(|e| e.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    pub fn warmups(&self) -> impl Iterator<Item = &ExerciseRecord> {
        self.exercises.iter().filter(|e| e.is_warmup)
    }

    pub fn main_exercises(&self) -> impl Iterator<Item = &ExerciseRecord> {
        self.exercises.iter().filter(|e| !e.is_warmup)
    }

    /// Append user-authored exercises, skipping ids already present
    pub fn with_custom(mut self, custom: &[ExerciseRecord]) -> Self {
        for exercise in custom {
            if self.contains(&exercise.id) {
                tracing::warn!(
                    "Custom exercise {} shadows a catalog entry, ignoring",
                    exercise.id
                );
                continue;
            }
            self.exercises.push(exercise.clone());
        }
        self
    }

    /// Validate catalog entries
    ///
    /// Returns human-readable problems; an empty list means the catalog is
    /// usable as-is.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        for exercise in &self.exercises {
            if exercise.id.is_empty() {
                errors.push(format!("Exercise '{}' has an empty id", exercise.name));
            }
            if !seen.insert(exercise.id.as_str()) {
                errors.push(format!("Duplicate exercise id '{}'", exercise.id));
            }
            if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&exercise.base_difficulty) {
                errors.push(format!(
                    "Exercise '{}': difficulty {} outside {}..={}",
                    exercise.id, exercise.base_difficulty, MIN_DIFFICULTY, MAX_DIFFICULTY
                ));
            }
            if let Some(met) = exercise.met_value {
                if met <= 0.0 {
                    errors.push(format!(
                        "Exercise '{}': MET value {} must be positive",
                        exercise.id, met
                    ));
                }
            }
        }

        errors
    }
}

// ============================================================================
// Sources
// ============================================================================

/// Something that can produce the exercise list
pub trait CatalogSource {
    fn load_catalog(&self) -> Result<Vec<ExerciseRecord>>;
}

/// The catalog compiled into the binary
pub struct BuiltinCatalog;

impl CatalogSource for BuiltinCatalog {
    fn load_catalog(&self) -> Result<Vec<ExerciseRecord>> {
        Ok(get_default_catalog().exercises.clone())
    }
}

/// A JSON file holding an array of exercise records
pub struct JsonCatalogFile {
    path: PathBuf,
}

impl JsonCatalogFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CatalogSource for JsonCatalogFile {
    fn load_catalog(&self) -> Result<Vec<ExerciseRecord>> {
        let contents = std::fs::read_to_string(&self.path)?;
        let exercises: Vec<ExerciseRecord> = serde_json::from_str(&contents)?;
        tracing::info!("Loaded {} exercises from {:?}", exercises.len(), self.path);
        Ok(exercises)
    }
}

/// Load a catalog, treating any failure as an empty catalog
///
/// Invalid entries are reported and dropped rather than failing the load.
pub fn load_or_empty(source: &dyn CatalogSource) -> Catalog {
    let exercises = match source.load_catalog() {
        Ok(exercises) => exercises,
        Err(e) => {
            tracing::warn!("Failed to load exercise catalog: {}. Using empty catalog.", e);
            return Catalog::default();
        }
    };

    let mut seen = HashSet::new();
    let exercises = exercises
        .into_iter()
        .map(|mut e| {
            if e.id.is_empty() {
                e.id = exercise_id_from_name(&e.name);
            }
            e
        })
        .filter(|e| {
            let valid = !e.id.is_empty()
                && (MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&e.base_difficulty);
            if !valid {
                tracing::warn!("Dropping invalid catalog entry {:?}", e.id);
                return false;
            }
            if !seen.insert(e.id.clone()) {
                tracing::warn!("Dropping duplicate catalog entry {:?}", e.id);
                return false;
            }
            true
        })
        .collect();

    Catalog::new(exercises)
}

/// Fail loudly on a catalog with problems (used by validation tooling)
pub fn ensure_valid(catalog: &Catalog) -> Result<()> {
    let errors = catalog.validate();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::CatalogValidation(errors.join("; ")))
    }
}

// ============================================================================
// Built-in catalog
// ============================================================================

/// Cached default catalog - built once and reused across all operations
static DEFAULT_CATALOG: Lazy<Catalog> = Lazy::new(build_default_catalog);

/// Get a reference to the cached default catalog
pub fn get_default_catalog() -> &'static Catalog {
    &DEFAULT_CATALOG
}

/// Builds the default catalog with built-in warmups and exercises
///
/// **Note**: For production use, prefer `get_default_catalog()` which returns a
/// cached reference.
pub fn build_default_catalog() -> Catalog {
    let exercises = vec![
        // ====================================================================
        // Warmups
        // ====================================================================
        ExerciseRecord::warmup("Arm Circles")
            .with_description("Extend arms and draw small circles, reversing halfway.")
            .with_primary(&["shoulders"])
            .quiet(),
        ExerciseRecord::warmup("Jumping Jacks")
            .with_description("Jump feet wide while raising arms overhead, then return.")
            .with_category("cardio")
            .with_primary(&["cardio"]),
        ExerciseRecord::warmup("Hip Circles")
            .with_description("Hands on hips, rotate the pelvis in wide circles.")
            .with_primary(&["glutes"])
            .quiet(),
        ExerciseRecord::warmup("March in Place")
            .with_description("Drive knees up alternately while swinging the arms.")
            .with_primary(&["cardio"])
            .quiet(),
        ExerciseRecord::warmup("Torso Twists")
            .with_description("Rotate the upper body side to side with soft knees.")
            .with_primary(&["obliques"])
            .quiet(),
        // ====================================================================
        // Upper body
        // ====================================================================
        ExerciseRecord::new("Wall Push Up", 2.0)
            .with_description("Push away from a wall with a straight body.")
            .with_force("push")
            .with_mechanic("compound")
            .with_equipment("body only")
            .with_category("strength")
            .with_primary(&["chest"])
            .with_secondary(&["triceps", "shoulders"])
            .with_met(3.8)
            .quiet(),
        ExerciseRecord::new("Knee Push Up", 3.0)
            .with_description("Push up from the knees keeping hips in line.")
            .with_force("push")
            .with_mechanic("compound")
            .with_equipment("body only")
            .with_category("strength")
            .with_primary(&["chest"])
            .with_secondary(&["triceps"])
            .with_met(5.0)
            .quiet(),
        ExerciseRecord::new("Push Up", 5.0)
            .with_description("Lower the chest to the floor and press back up.")
            .with_force("push")
            .with_mechanic("compound")
            .with_equipment("body only")
            .with_category("strength")
            .with_primary(&["chest"])
            .with_secondary(&["triceps", "shoulders"])
            .with_met(8.0)
            .quiet(),
        ExerciseRecord::new("Chair Dips", 4.0)
            .with_description("Lower and raise the body from the edge of a chair.")
            .with_force("push")
            .with_mechanic("isolation")
            .with_equipment("chair")
            .with_category("strength")
            .with_primary(&["triceps"])
            .with_met(5.0)
            .quiet(),
        ExerciseRecord::new("Pike Push Up", 6.0)
            .with_description("Hips high, lower the head towards the floor.")
            .with_force("push")
            .with_mechanic("compound")
            .with_equipment("body only")
            .with_category("strength")
            .with_primary(&["shoulders"])
            .with_secondary(&["triceps"])
            .with_met(7.0)
            .quiet(),
        ExerciseRecord::new("Superman Pull", 3.0)
            .with_description("Lying face down, pull elbows back while lifting the chest.")
            .with_force("pull")
            .with_mechanic("isolation")
            .with_equipment("body only")
            .with_category("strength")
            .with_primary(&["back"])
            .with_met(3.5)
            .quiet(),
        ExerciseRecord::new("Diamond Push Up", 7.0)
            .with_description("Push up with hands forming a diamond under the chest.")
            .with_force("push")
            .with_mechanic("compound")
            .with_equipment("body only")
            .with_category("strength")
            .with_primary(&["triceps"])
            .with_secondary(&["chest"])
            .with_met(8.0)
            .quiet(),
        ExerciseRecord::new("Pull Up", 8.0)
            .with_description("Hang from a bar and pull the chin over it.")
            .with_force("pull")
            .with_mechanic("compound")
            .with_equipment("pull-up bar")
            .with_category("strength")
            .with_primary(&["lats"])
            .with_secondary(&["biceps"])
            .with_met(8.0)
            .quiet(),
        ExerciseRecord::new("Archer Push Up", 9.0)
            .with_description("Wide push up shifting the weight onto one arm.")
            .with_force("push")
            .with_mechanic("compound")
            .with_equipment("body only")
            .with_category("strength")
            .with_primary(&["chest"])
            .with_secondary(&["triceps"])
            .with_met(8.0)
            .quiet(),
        // ====================================================================
        // Lower body
        // ====================================================================
        ExerciseRecord::new("Glute Bridge", 2.0)
            .with_description("Lying on the back, drive the hips up and squeeze.")
            .with_force("push")
            .with_mechanic("isolation")
            .with_equipment("body only")
            .with_category("strength")
            .with_primary(&["glutes"])
            .with_secondary(&["hamstrings"])
            .with_met(3.5)
            .quiet(),
        ExerciseRecord::new("Calf Raises", 2.0)
            .with_description("Rise onto the toes and lower slowly.")
            .with_force("push")
            .with_mechanic("isolation")
            .with_equipment("body only")
            .with_category("strength")
            .with_primary(&["calves"])
            .with_met(3.0)
            .quiet(),
        ExerciseRecord::new("Squats", 4.0)
            .with_description("Sit the hips back and down, then stand tall.")
            .with_force("push")
            .with_mechanic("compound")
            .with_equipment("body only")
            .with_category("strength")
            .with_primary(&["quads"])
            .with_secondary(&["glutes"])
            .with_met(5.5)
            .quiet(),
        ExerciseRecord::new("Lunges", 5.0)
            .with_description("Step forward and lower the back knee towards the floor.")
            .with_force("push")
            .with_mechanic("compound")
            .with_equipment("body only")
            .with_category("strength")
            .with_primary(&["quads"])
            .with_secondary(&["glutes", "hamstrings"])
            .with_met(6.0)
            .quiet(),
        ExerciseRecord::new("Wall Sit", 5.0)
            .with_description("Hold a seated position against a wall.")
            .with_force("static")
            .with_mechanic("isolation")
            .with_equipment("body only")
            .with_category("strength")
            .with_primary(&["quads"])
            .with_met(4.0)
            .quiet(),
        ExerciseRecord::new("Step Ups", 4.0)
            .with_description("Step onto a chair or box and drive through the heel.")
            .with_force("push")
            .with_mechanic("compound")
            .with_equipment("chair")
            .with_category("strength")
            .with_primary(&["quads"])
            .with_secondary(&["glutes"])
            .with_met(6.0),
        ExerciseRecord::new("Single Leg Deadlift", 6.0)
            .with_description("Hinge on one leg with the free leg extending behind.")
            .with_force("pull")
            .with_mechanic("compound")
            .with_equipment("body only")
            .with_category("strength")
            .with_primary(&["hamstrings"])
            .with_secondary(&["glutes"])
            .with_met(5.0)
            .quiet(),
        ExerciseRecord::new("Bulgarian Split Squat", 7.0)
            .with_description("Rear foot elevated, lower into a deep split squat.")
            .with_force("push")
            .with_mechanic("compound")
            .with_equipment("chair")
            .with_category("strength")
            .with_primary(&["quads"])
            .with_secondary(&["glutes"])
            .with_met(7.0)
            .quiet(),
        ExerciseRecord::new("Jump Squats", 7.0)
            .with_description("Squat down and explode upwards, landing softly.")
            .with_force("push")
            .with_mechanic("compound")
            .with_equipment("body only")
            .with_category("plyometrics")
            .with_primary(&["quads"])
            .with_secondary(&["calves", "glutes"])
            .with_met(8.0),
        ExerciseRecord::new("Pistol Squat", 9.0)
            .with_description("Squat on one leg with the other extended forward.")
            .with_force("push")
            .with_mechanic("compound")
            .with_equipment("body only")
            .with_category("strength")
            .with_primary(&["quads"])
            .with_secondary(&["glutes"])
            .with_met(7.0)
            .quiet(),
        // ====================================================================
        // Core
        // ====================================================================
        ExerciseRecord::new("Dead Bug", 2.0)
            .with_description("Extend opposite arm and leg while pressing the back down.")
            .with_force("static")
            .with_mechanic("isolation")
            .with_equipment("body only")
            .with_category("strength")
            .with_primary(&["abs"])
            .with_met(3.0)
            .quiet(),
        ExerciseRecord::new("Crunches", 3.0)
            .with_description("Curl the shoulders off the floor towards the hips.")
            .with_force("pull")
            .with_mechanic("isolation")
            .with_equipment("body only")
            .with_category("strength")
            .with_primary(&["abs"])
            .with_met(3.8)
            .quiet(),
        ExerciseRecord::new("Plank", 4.0)
            .with_description("Hold a straight line from head to heels on the forearms.")
            .with_force("static")
            .with_mechanic("isolation")
            .with_equipment("body only")
            .with_category("strength")
            .with_primary(&["abs"])
            .with_met(3.0)
            .quiet(),
        ExerciseRecord::new("Side Plank", 5.0)
            .with_description("Balance on one forearm with hips lifted.")
            .with_force("static")
            .with_mechanic("isolation")
            .with_equipment("body only")
            .with_category("strength")
            .with_primary(&["obliques"])
            .with_met(3.0)
            .quiet(),
        ExerciseRecord::new("Bicycle Crunches", 5.0)
            .with_description("Alternate elbow to opposite knee in a pedalling motion.")
            .with_force("pull")
            .with_mechanic("isolation")
            .with_equipment("body only")
            .with_category("strength")
            .with_primary(&["obliques"])
            .with_secondary(&["abs"])
            .with_met(4.0)
            .quiet(),
        ExerciseRecord::new("V Ups", 7.0)
            .with_description("Raise legs and torso together to touch the toes.")
            .with_force("pull")
            .with_mechanic("compound")
            .with_equipment("body only")
            .with_category("strength")
            .with_primary(&["abs"])
            .with_met(5.0)
            .quiet(),
        ExerciseRecord::new("Hanging Leg Raise", 8.0)
            .with_description("Hang from a bar and lift straight legs to hip height.")
            .with_force("pull")
            .with_mechanic("isolation")
            .with_equipment("pull-up bar")
            .with_category("strength")
            .with_primary(&["abs"])
            .with_met(5.0)
            .quiet(),
        // ====================================================================
        // Cardio
        // ====================================================================
        ExerciseRecord::new("High Knees", 3.0)
            .with_description("Run in place driving the knees to hip height.")
            .with_category("cardio")
            .with_equipment("body only")
            .with_primary(&["cardio"])
            .with_met(8.0),
        ExerciseRecord::new("Skaters", 4.0)
            .with_description("Leap side to side landing on one foot.")
            .with_category("cardio")
            .with_equipment("body only")
            .with_primary(&["cardio"])
            .with_secondary(&["glutes"])
            .with_met(7.5),
        ExerciseRecord::new("Mountain Climbers", 5.0)
            .with_description("From a plank, drive the knees towards the chest quickly.")
            .with_category("cardio")
            .with_equipment("body only")
            .with_primary(&["cardio"])
            .with_secondary(&["abs"])
            .with_met(8.0),
        ExerciseRecord::new("Burpees", 7.0)
            .with_description("Drop to a push up, jump the feet in and leap up.")
            .with_category("cardio")
            .with_equipment("body only")
            .with_primary(&["cardio"])
            .with_secondary(&["chest", "quads"])
            .with_met(10.0),
        ExerciseRecord::new("Tuck Jumps", 8.0)
            .with_description("Jump and pull both knees towards the chest.")
            .with_category("plyometrics")
            .with_equipment("body only")
            .with_primary(&["cardio"])
            .with_secondary(&["quads"])
            .with_met(10.0),
        ExerciseRecord::new("Partner Wheelbarrow", 6.0)
            .with_description("Walk on the hands while a partner holds the ankles.")
            .with_force("push")
            .with_mechanic("compound")
            .with_equipment("body only")
            .with_category("strength")
            .with_primary(&["shoulders"])
            .with_secondary(&["abs"])
            .with_met(6.0)
            .needs_partner(),
    ];

    Catalog::new(exercises)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_validates() {
        let catalog = build_default_catalog();
        let errors = catalog.validate();
        assert!(
            errors.is_empty(),
            "Default catalog has validation errors: {:?}",
            errors
        );
    }

    #[test]
    fn test_default_catalog_has_enough_warmups() {
        let catalog = build_default_catalog();
        assert!(catalog.warmups().count() >= 3);
    }

    #[test]
    fn test_every_bucket_populated() {
        let catalog = build_default_catalog();
        for group in MuscleGroup::ALL {
            let count = catalog.main_exercises().filter(|e| e.targets(group)).count();
            assert!(count >= 4, "Bucket {:?} has only {} exercises", group, count);
        }
    }

    #[test]
    fn test_cached_catalog_matches_fresh_build() {
        assert_eq!(get_default_catalog(), &build_default_catalog());
    }

    #[test]
    fn test_validate_reports_problems() {
        let catalog = Catalog::new(vec![
            ExerciseRecord::new("Push Up", 5.0),
            ExerciseRecord::new("Push Up", 5.0),
            ExerciseRecord::new("Impossible", 11.0),
            ExerciseRecord::new("Weird", 3.0).with_met(-1.0),
        ]);
        let errors = catalog.validate();
        assert_eq!(errors.len(), 3, "{:?}", errors);
        assert!(ensure_valid(&catalog).is_err());
    }

    #[test]
    fn test_with_custom_skips_shadowing_ids() {
        let catalog = build_default_catalog();
        let before = catalog.len();
        let custom = vec![
            ExerciseRecord::new("Push Up", 1.0),
            ExerciseRecord::new("Bear Crawl", 6.0),
        ];
        let merged = catalog.with_custom(&custom);
        assert_eq!(merged.len(), before + 1);
        assert_eq!(merged.find("pushup").unwrap().base_difficulty, 5.0);
        assert!(merged.contains("bearcrawl"));
    }

    #[test]
    fn test_json_file_source() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"[
                {"id": "squat", "name": "Squat", "base_difficulty": 4, "primary_muscles": ["quads"]},
                {"id": "wave", "name": "Arm Wave", "is_warmup": true},
                {"id": "squat", "name": "Squat Again"},
                {"id": "broken", "name": "Broken", "base_difficulty": 42}
            ]"#,
        )
        .unwrap();

        let catalog = load_or_empty(&JsonCatalogFile::new(&path));
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.warmups().count(), 1);
        assert_eq!(catalog.find("squat").unwrap().name, "Squat");
    }

    #[test]
    fn test_json_file_without_ids() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"[
                {"name": "Push Up", "base_difficulty": 4, "primary_muscles": ["chest"]},
                {"name": "Squats", "primary_muscles": ["quads"]},
                {"name": "  "}
            ]"#,
        )
        .unwrap();

        let catalog = load_or_empty(&JsonCatalogFile::new(&path));
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.find("pushup").unwrap().base_difficulty, 4.0);
        assert_eq!(catalog.find("squats").unwrap().base_difficulty, 5.0);
    }

    #[test]
    fn test_missing_file_degrades_to_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = JsonCatalogFile::new(temp_dir.path().join("missing.json"));
        assert!(source.load_catalog().is_err());
        assert!(load_or_empty(&source).is_empty());
    }

    #[test]
    fn test_builtin_source() {
        let catalog = load_or_empty(&BuiltinCatalog);
        assert_eq!(catalog.len(), get_default_catalog().len());
    }
}
