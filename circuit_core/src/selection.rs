//! Exercise selection: builds a workout plan from the catalog.
//!
//! Selection logic:
//! 1. Split the catalog into warmup and main pools and apply the filters
//! 2. Pick warmups uniformly at random without replacement
//! 3. Keep main exercises whose effective difficulty lies within the
//!    tolerance of the target, then let a [`SelectionStrategy`] pick
//! 4. Backfill from the full filtered pool when the tolerance band runs dry
//! 5. Shuffle the main list so it is not presented in difficulty order

use crate::config::{BucketQuotas, SelectionConfig};
use crate::difficulty::effective_difficulty;
use crate::filter::{FacetUniverse, Filters};
use crate::session::PhaseDurations;
use crate::{Catalog, ExerciseRecord, FeedbackMap, MuscleGroup, WorkoutFocus, WorkoutPlan};
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use std::collections::HashSet;

/// A main exercise paired with its personalized difficulty
#[derive(Clone, Copy, Debug)]
pub struct Candidate<'a> {
    pub exercise: &'a ExerciseRecord,
    pub effective: f64,
}

impl<'a> Candidate<'a> {
    pub fn id(&self) -> &'a str {
        &self.exercise.id
    }
}

/// Order candidates by `|effective - target| + U(0, jitter)` ascending
///
/// The jitter is drawn once per candidate so the ordering is consistent.
pub fn rank_by_distance<'a>(
    candidates: impl IntoIterator<Item = Candidate<'a>>,
    target: f64,
    jitter: f64,
    rng: &mut dyn RngCore,
) -> Vec<Candidate<'a>> {
    let mut keyed: Vec<(f64, Candidate<'a>)> = candidates
        .into_iter()
        .map(|c| {
            let noise = rng.gen::<f64>() * jitter;
            ((c.effective - target).abs() + noise, c)
        })
        .collect();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
    keyed.into_iter().map(|(_, c)| c).collect()
}

/// Strategy for picking main exercises out of the tolerance-filtered pool
pub trait SelectionStrategy {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Whether an exercise may appear in the plan at all (also applies to
    /// backfill)
    fn admits(&self, exercise: &ExerciseRecord) -> bool;

    /// Pick up to `count` distinct candidates from `pool`
    fn select<'a>(
        &self,
        pool: &[Candidate<'a>],
        target: f64,
        count: usize,
        jitter: f64,
        rng: &mut dyn RngCore,
    ) -> Vec<Candidate<'a>>;
}

/// Fixed quota per muscle-group bucket, backfilled from the rest of the pool
#[derive(Clone, Debug)]
pub struct Balanced {
    pub quotas: BucketQuotas,
}

impl SelectionStrategy for Balanced {
    fn name(&self) -> &'static str {
        "balanced"
    }

    fn admits(&self, _exercise: &ExerciseRecord) -> bool {
        true
    }

    fn select<'a>(
        &self,
        pool: &[Candidate<'a>],
        target: f64,
        count: usize,
        jitter: f64,
        rng: &mut dyn RngCore,
    ) -> Vec<Candidate<'a>> {
        let mut chosen = Vec::with_capacity(count);
        let mut taken: HashSet<&'a str> = HashSet::new();

        for group in MuscleGroup::ALL {
            let quota = self.quotas.for_group(group);
            let bucket = pool.iter().copied().filter(|c| c.exercise.targets(group));
            let mut filled = 0;

            for candidate in rank_by_distance(bucket, target, jitter, rng) {
                if filled == quota {
                    break;
                }
                // An exercise can sit in several buckets; count it once.
                if taken.insert(candidate.id()) {
                    chosen.push(candidate);
                    filled += 1;
                }
            }

            if filled < quota {
                tracing::debug!(
                    "Bucket {:?} filled {} of {} slots",
                    group,
                    filled,
                    quota
                );
            }
        }

        if chosen.len() < count {
            let remaining = pool.iter().copied().filter(|c| !taken.contains(c.id()));
            let missing = count - chosen.len();
            chosen.extend(rank_by_distance(remaining, target, jitter, rng).into_iter().take(missing));
        }

        chosen.truncate(count);
        chosen
    }
}

/// Draw only from one bucket (or everything for full body), closest first
#[derive(Clone, Debug)]
pub struct Focused {
    pub group: Option<MuscleGroup>,
}

impl SelectionStrategy for Focused {
    fn name(&self) -> &'static str {
        "focused"
    }

    fn admits(&self, exercise: &ExerciseRecord) -> bool {
        self.group.map_or(true, |group| exercise.targets(group))
    }

    fn select<'a>(
        &self,
        pool: &[Candidate<'a>],
        target: f64,
        count: usize,
        jitter: f64,
        rng: &mut dyn RngCore,
    ) -> Vec<Candidate<'a>> {
        let admitted = pool.iter().copied().filter(|c| self.admits(c.exercise));
        let mut ranked = rank_by_distance(admitted, target, jitter, rng);
        ranked.truncate(count);
        ranked
    }
}

/// Builds workout plans from a catalog
#[derive(Clone, Debug)]
pub struct SelectionEngine {
    params: SelectionConfig,
    durations: PhaseDurations,
}

impl SelectionEngine {
    pub fn new(params: SelectionConfig, durations: PhaseDurations) -> Self {
        Self { params, durations }
    }

    pub fn params(&self) -> &SelectionConfig {
        &self.params
    }

    /// Balanced quotas for full body, a single bucket otherwise
    pub fn strategy_for(&self, focus: WorkoutFocus) -> Box<dyn SelectionStrategy> {
        match focus.muscle_group() {
            None => Box::new(Balanced {
                quotas: self.params.quotas.clone(),
            }),
            Some(group) => Box::new(Focused { group: Some(group) }),
        }
    }

    /// Number of distinct main exercises passing the filters
    ///
    /// Used as a pre-flight check before starting a session.
    pub fn count_matching(&self, catalog: &Catalog, filters: &Filters) -> usize {
        let universe = FacetUniverse::observe(&catalog.exercises);
        main_pool(catalog, filters, &universe).len()
    }

    /// Build a plan for the given target difficulty
    ///
    /// Never fails: small pools yield a short (possibly empty) plan and the
    /// caller decides whether that is acceptable.
    pub fn build_plan(
        &self,
        catalog: &Catalog,
        filters: &Filters,
        feedback: &FeedbackMap,
        target: f64,
        strategy: &dyn SelectionStrategy,
        rng: &mut dyn RngCore,
    ) -> WorkoutPlan {
        let universe = FacetUniverse::observe(&catalog.exercises);
        let warmups = self.pick_warmups(catalog, filters, &universe, rng);

        let candidates: Vec<Candidate<'_>> = main_pool(catalog, filters, &universe)
            .into_iter()
            .map(|exercise| Candidate {
                exercise,
                effective: effective_difficulty(exercise, feedback.get(&exercise.id)),
            })
            .collect();

        let within_tolerance: Vec<Candidate<'_>> = candidates
            .iter()
            .copied()
            .filter(|c| (c.effective - target).abs() <= self.params.tolerance)
            .collect();

        let count = self.params.main_count;
        let mut chosen = strategy.select(
            &within_tolerance,
            target,
            count,
            self.params.jitter,
            rng,
        );

        if chosen.len() < count {
            let taken: HashSet<&str> = chosen.iter().map(Candidate::id).collect();
            let fallback = candidates
                .iter()
                .copied()
                .filter(|c| strategy.admits(c.exercise) && !taken.contains(c.id()));
            let missing = count - chosen.len();
            let backfill = rank_by_distance(fallback, target, self.params.jitter, rng);
            tracing::debug!(
                "Tolerance band gave {} of {}, backfilling from {} more",
                chosen.len(),
                count,
                backfill.len()
            );
            chosen.extend(backfill.into_iter().take(missing));
        }

        let mut main: Vec<ExerciseRecord> = chosen.iter().map(|c| c.exercise.clone()).collect();
        main.shuffle(rng);

        let total_duration_seconds = self.durations.plan_seconds(warmups.len(), main.len());

        tracing::info!(
            "Built {} plan: {} warmups, {} exercises, target difficulty {:.1}, {} seconds",
            strategy.name(),
            warmups.len(),
            main.len(),
            target,
            total_duration_seconds
        );

        WorkoutPlan {
            warmups,
            main,
            target_difficulty: target,
            total_duration_seconds,
        }
    }

    fn pick_warmups(
        &self,
        catalog: &Catalog,
        filters: &Filters,
        universe: &FacetUniverse,
        rng: &mut dyn RngCore,
    ) -> Vec<ExerciseRecord> {
        let mut pool = distinct(catalog.warmups().filter(|e| filters.matches(e, universe)));
        pool.shuffle(rng);
        pool.truncate(self.params.warmup_count);
        pool.into_iter().cloned().collect()
    }
}

fn main_pool<'a>(
    catalog: &'a Catalog,
    filters: &Filters,
    universe: &FacetUniverse,
) -> Vec<&'a ExerciseRecord> {
    distinct(
        catalog
            .main_exercises()
            .filter(|e| filters.matches(e, universe)),
    )
}

/// Drop repeated ids, keeping the first occurrence
fn distinct<'a>(exercises: impl Iterator<Item = &'a ExerciseRecord>) -> Vec<&'a ExerciseRecord> {
    let mut seen = HashSet::new();
    exercises.filter(|e| seen.insert(e.id.as_str())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::build_default_catalog;
    use crate::filter::Facet;
    use crate::{Config, FeedbackEntry};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn engine() -> SelectionEngine {
        let config = Config::default();
        SelectionEngine::new(config.selection, PhaseDurations::from(&config.session))
    }

    fn engine_with(params: SelectionConfig) -> SelectionEngine {
        SelectionEngine::new(params, PhaseDurations::from(&Config::default().session))
    }

    fn primary_bucket(exercise: &ExerciseRecord) -> Option<MuscleGroup> {
        MuscleGroup::ALL.into_iter().find(|g| exercise.targets(*g))
    }

    #[test]
    fn test_plan_has_no_duplicates() {
        let catalog = build_default_catalog();
        let engine = engine();
        let strategy = engine.strategy_for(WorkoutFocus::FullBody);

        for seed in 0..50 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let plan = engine.build_plan(
                &catalog,
                &Filters::new(),
                &FeedbackMap::new(),
                5.0,
                strategy.as_ref(),
                &mut rng,
            );

            let ids: Vec<&str> = plan.exercise_ids().collect();
            let unique: HashSet<&str> = ids.iter().copied().collect();
            assert_eq!(ids.len(), unique.len(), "seed {} produced duplicates", seed);
            assert!(plan.main.len() <= 12);
        }
    }

    #[test]
    fn test_balanced_quotas() {
        let catalog = build_default_catalog();
        let engine = engine();
        let strategy = engine.strategy_for(WorkoutFocus::FullBody);
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let plan = engine.build_plan(
            &catalog,
            &Filters::new(),
            &FeedbackMap::new(),
            5.0,
            strategy.as_ref(),
            &mut rng,
        );

        assert_eq!(plan.main.len(), 12);
        assert_eq!(plan.warmups.len(), 3);
        let count = |group| {
            plan.main
                .iter()
                .filter(|e| primary_bucket(e) == Some(group))
                .count()
        };
        assert_eq!(count(MuscleGroup::UpperBody), 4);
        assert_eq!(count(MuscleGroup::LowerBody), 4);
        assert_eq!(count(MuscleGroup::Core), 2);
        assert_eq!(count(MuscleGroup::Cardio), 2);
    }

    #[test]
    fn test_balanced_backfills_exhausted_buckets() {
        let mut exercises = vec![ExerciseRecord::warmup("Arm Circles")];
        for i in 0..10 {
            exercises.push(ExerciseRecord::new(&format!("Press {}", i), 5.0).with_primary(&["chest"]));
            exercises.push(ExerciseRecord::new(&format!("Lunge {}", i), 5.0).with_primary(&["quads"]));
        }
        let catalog = Catalog::new(exercises);
        let engine = engine();
        let strategy = engine.strategy_for(WorkoutFocus::FullBody);

        for seed in 0..10 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let plan = engine.build_plan(
                &catalog,
                &Filters::new(),
                &FeedbackMap::new(),
                5.0,
                strategy.as_ref(),
                &mut rng,
            );

            assert_eq!(plan.main.len(), 12);
            let unique: HashSet<&str> = plan.main.iter().map(|e| e.id.as_str()).collect();
            assert_eq!(unique.len(), 12, "seed {} produced duplicates", seed);
            assert!(plan
                .main
                .iter()
                .all(|e| matches!(primary_bucket(e), Some(MuscleGroup::UpperBody | MuscleGroup::LowerBody))));
        }
    }

    #[test]
    fn test_muscle_filter_on_unlabelled_catalog_matches_nothing() {
        let catalog = Catalog::new(
            (0..8)
                .map(|i| ExerciseRecord::new(&format!("Move {}", i), 5.0))
                .collect(),
        );
        let filters = Filters::new().with(Facet::PrimaryMuscles, ["chest"]);
        assert_eq!(engine().count_matching(&catalog, &filters), 0);
        assert_eq!(engine().count_matching(&catalog, &Filters::new()), 8);
    }

    #[test]
    fn test_main_within_tolerance_when_pool_is_large() {
        let catalog = build_default_catalog();
        let engine = engine();
        let strategy = engine.strategy_for(WorkoutFocus::FullBody);
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let plan = engine.build_plan(
            &catalog,
            &Filters::new(),
            &FeedbackMap::new(),
            5.0,
            strategy.as_ref(),
            &mut rng,
        );

        for exercise in &plan.main {
            assert!(
                (exercise.base_difficulty - 5.0).abs() <= 3.0,
                "{} is outside the tolerance band",
                exercise.id
            );
        }
    }

    #[test]
    fn test_focused_plan_stays_in_bucket() {
        let catalog = build_default_catalog();
        let engine = engine();
        let strategy = engine.strategy_for(WorkoutFocus::LowerBody);
        let mut rng = ChaCha8Rng::seed_from_u64(11);

        let plan = engine.build_plan(
            &catalog,
            &Filters::new(),
            &FeedbackMap::new(),
            5.0,
            strategy.as_ref(),
            &mut rng,
        );

        assert!(!plan.main.is_empty());
        assert!(plan.main.iter().all(|e| e.targets(MuscleGroup::LowerBody)));
    }

    #[test]
    fn test_same_seed_same_plan() {
        let catalog = build_default_catalog();
        let engine = engine();
        let strategy = engine.strategy_for(WorkoutFocus::FullBody);

        let build = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            engine.build_plan(
                &catalog,
                &Filters::new(),
                &FeedbackMap::new(),
                6.0,
                strategy.as_ref(),
                &mut rng,
            )
        };

        assert_eq!(build(42), build(42));
    }

    #[test]
    fn test_small_pool_returns_short_plan() {
        let catalog = Catalog::new(vec![
            ExerciseRecord::warmup("Arm Circles"),
            ExerciseRecord::new("Push Up", 5.0).with_primary(&["chest"]),
            ExerciseRecord::new("Squats", 4.0).with_primary(&["quads"]),
            ExerciseRecord::new("Plank", 4.0).with_primary(&["abs"]),
            ExerciseRecord::new("Burpees", 7.0).with_primary(&["cardio"]),
        ]);
        let engine = engine();
        let strategy = engine.strategy_for(WorkoutFocus::FullBody);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        assert_eq!(engine.count_matching(&catalog, &Filters::new()), 4);

        let plan = engine.build_plan(
            &catalog,
            &Filters::new(),
            &FeedbackMap::new(),
            5.0,
            strategy.as_ref(),
            &mut rng,
        );
        assert_eq!(plan.warmups.len(), 1);
        assert_eq!(plan.main.len(), 4);
        assert_eq!(plan.total_duration_seconds, 20 + 4 * 40);
    }

    #[test]
    fn test_backfill_outside_tolerance() {
        let mut exercises: Vec<ExerciseRecord> = (0..10)
            .map(|i| ExerciseRecord::new(&format!("Easy {}", i), 0.0).with_primary(&["chest"]))
            .collect();
        exercises.push(ExerciseRecord::new("Hard A", 9.0).with_primary(&["chest"]));
        exercises.push(ExerciseRecord::new("Hard B", 10.0).with_primary(&["chest"]));
        let catalog = Catalog::new(exercises);

        let engine = engine();
        let strategy = Focused { group: None };
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        let plan = engine.build_plan(
            &catalog,
            &Filters::new(),
            &FeedbackMap::new(),
            10.0,
            &strategy,
            &mut rng,
        );

        assert_eq!(plan.main.len(), 12);
        assert!(plan.main.iter().any(|e| e.id == "harda"));
        assert!(plan.main.iter().any(|e| e.id == "hardb"));
    }

    #[test]
    fn test_feedback_changes_selection() {
        let catalog = Catalog::new(vec![
            ExerciseRecord::new("Lunges", 5.0).with_primary(&["quads"]),
            ExerciseRecord::new("Squats", 5.0).with_primary(&["quads"]),
        ]);
        let mut feedback = FeedbackMap::new();
        feedback.insert(
            "squats".into(),
            FeedbackEntry {
                avg_score: 9.0,
                count: 4,
            },
        );

        let engine = engine_with(SelectionConfig {
            main_count: 1,
            jitter: 0.0,
            ..SelectionConfig::default()
        });
        let strategy = Focused { group: None };
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        // Target 9: squats resolve to 6 and sit inside the band, lunges do not.
        let plan = engine.build_plan(&catalog, &Filters::new(), &feedback, 9.0, &strategy, &mut rng);
        assert_eq!(plan.main.len(), 1);
        assert_eq!(plan.main[0].id, "squats");
    }

    #[test]
    fn test_filters_apply_to_both_pools() {
        let catalog = build_default_catalog();
        let engine = engine();
        let filters = Filters::new().with(Facet::NoiseLevel, ["quiet"]);
        let strategy = engine.strategy_for(WorkoutFocus::FullBody);
        let mut rng = ChaCha8Rng::seed_from_u64(9);

        let plan = engine.build_plan(
            &catalog,
            &filters,
            &FeedbackMap::new(),
            5.0,
            strategy.as_ref(),
            &mut rng,
        );

        assert!(plan.warmups.iter().all(|e| e.quiet));
        assert!(plan.main.iter().all(|e| e.quiet));
    }

    #[test]
    fn test_empty_catalog_gives_empty_plan() {
        let engine = engine();
        let strategy = engine.strategy_for(WorkoutFocus::FullBody);
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let plan = engine.build_plan(
            &Catalog::default(),
            &Filters::new(),
            &FeedbackMap::new(),
            5.0,
            strategy.as_ref(),
            &mut rng,
        );
        assert!(plan.warmups.is_empty());
        assert!(plan.main.is_empty());
        assert_eq!(plan.total_duration_seconds, 0);
    }

    #[test]
    fn test_rank_by_distance_without_jitter() {
        let a = ExerciseRecord::new("A", 2.0);
        let b = ExerciseRecord::new("B", 5.0);
        let c = ExerciseRecord::new("C", 9.0);
        let candidates = [&a, &b, &c].map(|exercise| Candidate {
            exercise,
            effective: exercise.base_difficulty,
        });
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let ranked = rank_by_distance(candidates, 6.0, 0.0, &mut rng);
        let ids: Vec<&str> = ranked.iter().map(Candidate::id).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }
}
