//! User-authored exercises stored next to the built-in catalog.

use crate::store::{KeyValueStore, KeyValueStoreExt, CUSTOM_EXERCISES_KEY};
use crate::{exercise_id_from_name, Catalog, Error, ExerciseRecord, Result, DEFAULT_MET};
use crate::{MAX_DIFFICULTY, MIN_DIFFICULTY};

/// Load custom exercises (empty when missing or unreadable)
pub fn load_custom_exercises<S: KeyValueStore + ?Sized>(store: &S) -> Vec<ExerciseRecord> {
    store.get(CUSTOM_EXERCISES_KEY, Vec::new())
}

/// Validate and persist a new custom exercise
///
/// The id is always derived from the name. Rejects blank names,
/// difficulties outside 0-10 and ids already used by `catalog` or by
/// another custom exercise. A missing MET defaults to 6.
pub fn add_custom_exercise<S: KeyValueStore + ?Sized>(
    store: &mut S,
    catalog: &Catalog,
    mut exercise: ExerciseRecord,
) -> Result<ExerciseRecord> {
    let name = exercise.name.trim().to_string();
    if name.is_empty() {
        return Err(Error::InvalidCustomExercise("name must not be empty".into()));
    }

    if !exercise.base_difficulty.is_finite()
        || !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&exercise.base_difficulty)
    {
        return Err(Error::InvalidCustomExercise(format!(
            "difficulty {} is outside {}-{}",
            exercise.base_difficulty, MIN_DIFFICULTY, MAX_DIFFICULTY
        )));
    }

    match exercise.met_value {
        Some(met) if !met.is_finite() || met <= 0.0 => {
            return Err(Error::InvalidCustomExercise(format!(
                "MET value {} must be positive",
                met
            )));
        }
        Some(_) => {}
        None => exercise.met_value = Some(DEFAULT_MET),
    }

    exercise.id = exercise_id_from_name(&name);
    exercise.name = name;

    let mut custom = load_custom_exercises(store);
    if catalog.contains(&exercise.id) || custom.iter().any(|e| e.id == exercise.id) {
        return Err(Error::InvalidCustomExercise(format!(
            "an exercise with id {:?} already exists",
            exercise.id
        )));
    }

    custom.push(exercise.clone());
    store.set(CUSTOM_EXERCISES_KEY, &custom)?;

    tracing::info!("Added custom exercise {}", exercise.id);
    Ok(exercise)
}

/// Delete a custom exercise by id; returns whether one was removed
pub fn remove_custom_exercise<S: KeyValueStore + ?Sized>(store: &mut S, id: &str) -> Result<bool> {
    let mut custom = load_custom_exercises(store);
    let before = custom.len();
    custom.retain(|e| e.id != id);

    if custom.len() == before {
        return Ok(false);
    }

    store.set(CUSTOM_EXERCISES_KEY, &custom)?;
    tracing::info!("Removed custom exercise {}", id);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::build_default_catalog;
    use crate::store::MemoryStore;

    #[test]
    fn test_add_derives_id_and_met() {
        let mut store = MemoryStore::new();
        let catalog = build_default_catalog();

        let added = add_custom_exercise(
            &mut store,
            &catalog,
            ExerciseRecord::new("  Bear Crawl ", 6.0).with_primary(&["shoulders"]),
        )
        .unwrap();

        assert_eq!(added.id, "bearcrawl");
        assert_eq!(added.name, "Bear Crawl");
        assert_eq!(added.met_value, Some(DEFAULT_MET));
        assert_eq!(load_custom_exercises(&store), vec![added]);
    }

    #[test]
    fn test_rejects_invalid_entries() {
        let mut store = MemoryStore::new();
        let catalog = build_default_catalog();

        let blank = add_custom_exercise(&mut store, &catalog, ExerciseRecord::new("   ", 5.0));
        assert!(matches!(blank, Err(Error::InvalidCustomExercise(_))));

        let too_hard = add_custom_exercise(&mut store, &catalog, ExerciseRecord::new("Planche", 11.0));
        assert!(matches!(too_hard, Err(Error::InvalidCustomExercise(_))));

        let bad_met = add_custom_exercise(
            &mut store,
            &catalog,
            ExerciseRecord::new("Crawl", 5.0).with_met(0.0),
        );
        assert!(matches!(bad_met, Err(Error::InvalidCustomExercise(_))));

        assert!(load_custom_exercises(&store).is_empty());
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let mut store = MemoryStore::new();
        let catalog = build_default_catalog();

        // Collides with the built-in "Push Up"
        let builtin = add_custom_exercise(&mut store, &catalog, ExerciseRecord::new("push up", 5.0));
        assert!(matches!(builtin, Err(Error::InvalidCustomExercise(_))));

        add_custom_exercise(&mut store, &catalog, ExerciseRecord::new("Bear Crawl", 6.0)).unwrap();
        let again = add_custom_exercise(&mut store, &catalog, ExerciseRecord::new("BearCrawl", 4.0));
        assert!(matches!(again, Err(Error::InvalidCustomExercise(_))));
    }

    #[test]
    fn test_remove() {
        let mut store = MemoryStore::new();
        let catalog = Catalog::default();
        add_custom_exercise(&mut store, &catalog, ExerciseRecord::new("Bear Crawl", 6.0)).unwrap();

        assert!(remove_custom_exercise(&mut store, "bearcrawl").unwrap());
        assert!(!remove_custom_exercise(&mut store, "bearcrawl").unwrap());
        assert!(load_custom_exercises(&store).is_empty());
    }
}
