//! The coach ties catalog, store and configuration together.
//!
//! Front ends go through [`Coach`] for everything: prescribing workouts,
//! starting sessions, editing settings and filters, statistics and
//! snapshots.

use crate::catalog::{load_or_empty, BuiltinCatalog, CatalogSource, JsonCatalogFile};
use crate::custom::{add_custom_exercise, load_custom_exercises, remove_custom_exercise};
use crate::difficulty::{compute_bias, target_difficulty};
use crate::export::write_history_csv;
use crate::feedback::load_feedback;
use crate::filter::Filters;
use crate::history::{load_history, summarize, Stats};
use crate::selection::SelectionEngine;
use crate::session::{PhaseDurations, SessionDeps, SessionOptions, SessionRunner, Ticker};
use crate::snapshot::Snapshot;
use crate::store::{
    KeyValueStore, KeyValueStoreExt, CUSTOM_EXERCISES_KEY, FEEDBACK_KEY, FILTERS_KEY, HISTORY_KEY,
    SETTINGS_KEY,
};
use crate::{
    Catalog, Config, Error, ExerciseRecord, FeedbackMap, Result, SessionRecord, SessionSettings,
    WorkoutFocus, WorkoutPlan,
};
use rand::RngCore;
use std::path::Path;

pub struct Coach<S: KeyValueStore> {
    base_catalog: Catalog,
    catalog: Catalog,
    store: S,
    config: Config,
    engine: SelectionEngine,
}

impl<S: KeyValueStore> Coach<S> {
    /// Build a coach over an already-loaded catalog; custom exercises from
    /// the store are appended
    pub fn new(base_catalog: Catalog, store: S, config: Config) -> Self {
        let engine = SelectionEngine::new(
            config.selection.clone(),
            PhaseDurations::from(&config.session),
        );
        let catalog = base_catalog
            .clone()
            .with_custom(&load_custom_exercises(&store));

        Self {
            base_catalog,
            catalog,
            store,
            config,
            engine,
        }
    }

    /// Load the catalog named by the configuration (built-in when unset)
    ///
    /// A catalog that fails to load leaves the coach usable but unable to
    /// start a session.
    pub fn open(store: S, config: Config) -> Self {
        let source: Box<dyn CatalogSource> = match &config.catalog.path {
            Some(path) => Box::new(JsonCatalogFile::new(path)),
            None => Box::new(BuiltinCatalog),
        };
        let catalog = load_or_empty(source.as_ref());
        Self::new(catalog, store, config)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    // ------------------------------------------------------------------
    // Settings and filters
    // ------------------------------------------------------------------

    /// Stored settings, or the configured profile defaults on first run
    pub fn settings(&self) -> SessionSettings {
        let defaults = SessionSettings {
            body_weight_kg: self.config.profile.body_weight_kg,
            difficulty_bias: 0.0,
            focus: self.config.profile.focus,
        };
        self.store.get(SETTINGS_KEY, defaults)
    }

    pub fn save_settings(&mut self, settings: &SessionSettings) -> Result<()> {
        if !(settings.body_weight_kg.is_finite() && settings.body_weight_kg > 0.0) {
            return Err(Error::Config(format!(
                "body weight must be positive, got {}",
                settings.body_weight_kg
            )));
        }
        self.store.set(SETTINGS_KEY, settings)
    }

    pub fn set_body_weight(&mut self, body_weight_kg: f64) -> Result<()> {
        let settings = SessionSettings {
            body_weight_kg,
            ..self.settings()
        };
        self.save_settings(&settings)
    }

    pub fn set_focus(&mut self, focus: WorkoutFocus) -> Result<()> {
        let settings = SessionSettings {
            focus,
            ..self.settings()
        };
        self.save_settings(&settings)
    }

    pub fn filters(&self) -> Filters {
        self.store.get(FILTERS_KEY, Filters::new())
    }

    pub fn save_filters(&mut self, filters: &Filters) -> Result<()> {
        self.store.set(FILTERS_KEY, filters)
    }

    pub fn feedback(&self) -> FeedbackMap {
        load_feedback(&self.store)
    }

    pub fn history(&self) -> Vec<SessionRecord> {
        load_history(&self.store)
    }

    // ------------------------------------------------------------------
    // Prescription
    // ------------------------------------------------------------------

    /// Distinct main exercises passing the stored filters
    pub fn count_matching(&self) -> usize {
        self.engine.count_matching(&self.catalog, &self.filters())
    }

    /// Refuse to go on when the matching pool is too small
    pub fn check_pool(&self) -> Result<usize> {
        let available = self.count_matching();
        let required = self.config.selection.min_pool.max(1);
        if available < required {
            return Err(Error::InsufficientPool {
                available,
                required,
            });
        }
        Ok(available)
    }

    /// Build a plan without touching stored state
    pub fn preview(&self, rng: &mut dyn RngCore) -> Result<WorkoutPlan> {
        let settings = self.settings();
        let bias = compute_bias(&self.history(), settings.difficulty_bias);
        self.build(&settings, bias, rng)
    }

    /// Update the bias from recent history, persist it and build a plan
    pub fn prescribe(&mut self, rng: &mut dyn RngCore) -> Result<WorkoutPlan> {
        let mut settings = self.settings();
        let bias = compute_bias(&self.history(), settings.difficulty_bias);
        let plan = self.build(&settings, bias, rng)?;

        if bias != settings.difficulty_bias {
            tracing::info!(
                "Difficulty bias {:.2} -> {:.2}",
                settings.difficulty_bias,
                bias
            );
        }
        settings.difficulty_bias = bias;
        self.save_settings(&settings)?;
        Ok(plan)
    }

    fn build(
        &self,
        settings: &SessionSettings,
        bias: f64,
        rng: &mut dyn RngCore,
    ) -> Result<WorkoutPlan> {
        self.check_pool()?;

        let strategy = self.engine.strategy_for(settings.focus);
        let plan = self.engine.build_plan(
            &self.catalog,
            &self.filters(),
            &self.feedback(),
            target_difficulty(bias),
            strategy.as_ref(),
            rng,
        );

        if plan.main.is_empty() {
            return Err(Error::EmptyPlan);
        }
        Ok(plan)
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions::from_config(&self.config.session, self.settings().body_weight_kg)
    }

    /// Check the preconditions and hand the plan to a new runner
    pub fn start_session(&self, plan: WorkoutPlan, deps: SessionDeps) -> Result<SessionRunner> {
        self.check_pool()?;
        SessionRunner::start(plan, self.session_options(), deps)
    }

    /// Runner dependencies backed by a handle on this coach's store
    pub fn session_deps(&self, ticker: Box<dyn Ticker>) -> SessionDeps
    where
        S: Clone + 'static,
    {
        SessionDeps::new(Box::new(self.store.clone()), ticker)
    }

    // ------------------------------------------------------------------
    // Custom exercises
    // ------------------------------------------------------------------

    pub fn custom_exercises(&self) -> Vec<ExerciseRecord> {
        load_custom_exercises(&self.store)
    }

    pub fn add_custom(&mut self, exercise: ExerciseRecord) -> Result<ExerciseRecord> {
        let added = add_custom_exercise(&mut self.store, &self.catalog, exercise)?;
        self.reload_custom();
        Ok(added)
    }

    pub fn remove_custom(&mut self, id: &str) -> Result<bool> {
        let removed = remove_custom_exercise(&mut self.store, id)?;
        if removed {
            self.reload_custom();
        }
        Ok(removed)
    }

    fn reload_custom(&mut self) {
        self.catalog = self
            .base_catalog
            .clone()
            .with_custom(&load_custom_exercises(&self.store));
    }

    // ------------------------------------------------------------------
    // Stats, export and snapshots
    // ------------------------------------------------------------------

    pub fn stats(&self) -> Stats {
        summarize(&self.history(), self.settings().difficulty_bias)
    }

    pub fn export_history(&self, csv_path: &Path) -> Result<usize> {
        write_history_csv(&self.history(), csv_path)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.store)
    }

    pub fn restore(&mut self, snapshot: &Snapshot) -> Result<()> {
        snapshot.restore_into(&mut self.store)?;
        self.reload_custom();
        Ok(())
    }

    /// Clear all personal data: history, feedback, filters, custom
    /// exercises, and settings back to the profile defaults
    pub fn reset(&mut self) -> Result<()> {
        let settings = SessionSettings {
            body_weight_kg: self.config.profile.body_weight_kg,
            difficulty_bias: 0.0,
            focus: self.config.profile.focus,
        };
        self.store.set(SETTINGS_KEY, &settings)?;
        self.store.set(FILTERS_KEY, &Filters::new())?;
        self.store.set(FEEDBACK_KEY, &FeedbackMap::new())?;
        self.store.set(HISTORY_KEY, &Vec::<SessionRecord>::new())?;
        self.store
            .set(CUSTOM_EXERCISES_KEY, &Vec::<ExerciseRecord>::new())?;
        self.reload_custom();

        tracing::info!("All personal data cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::build_default_catalog;
    use crate::filter::Facet;
    use crate::session::{ManualTicker, Phase};
    use crate::store::{JsonFileStore, MemoryStore};
    use chrono::Utc;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use uuid::Uuid;

    fn coach() -> Coach<MemoryStore> {
        Coach::new(build_default_catalog(), MemoryStore::new(), Config::default())
    }

    fn record(rpe: u8) -> SessionRecord {
        SessionRecord {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            perceived_exertion: rpe,
            calories_burned: 40,
            duration_seconds: 540,
        }
    }

    #[test]
    fn test_first_run_settings_come_from_profile() {
        let mut config = Config::default();
        config.profile.body_weight_kg = 82.0;
        let coach = Coach::new(build_default_catalog(), MemoryStore::new(), config);
        assert_eq!(coach.settings().body_weight_kg, 82.0);
        assert_eq!(coach.settings().difficulty_bias, 0.0);
    }

    #[test]
    fn test_prescribe_persists_bias() {
        let mut coach = coach();
        for _ in 0..5 {
            crate::history::append_record(coach.store_mut(), &record(9)).unwrap();
        }
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let plan = coach.prescribe(&mut rng).unwrap();
        assert_eq!(coach.settings().difficulty_bias, -0.5);
        assert_eq!(plan.target_difficulty, 4.0);
        assert_eq!(plan.main.len(), 12);
    }

    #[test]
    fn test_preview_does_not_persist() {
        let mut coach = coach();
        crate::history::append_record(coach.store_mut(), &record(2)).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let plan = coach.preview(&mut rng).unwrap();
        assert_eq!(plan.target_difficulty, 6.0);
        assert_eq!(coach.settings().difficulty_bias, 0.0);
    }

    #[test]
    fn test_insufficient_pool_refused() {
        let mut coach = coach();
        // Only the partner exercise requires a partner
        let filters = Filters::new().with(Facet::PartnerRequired, ["yes"]);
        coach.save_filters(&filters).unwrap();

        assert_eq!(coach.count_matching(), 1);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        match coach.prescribe(&mut rng) {
            Err(Error::InsufficientPool {
                available,
                required,
            }) => {
                assert_eq!(available, 1);
                assert_eq!(required, 6);
            }
            other => panic!("expected InsufficientPool, got {:?}", other.map(|p| p.main.len())),
        }
        // Refusal leaves the bias alone
        assert_eq!(coach.settings().difficulty_bias, 0.0);
    }

    #[test]
    fn test_empty_catalog_is_navigable_but_cannot_start() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.catalog.path = Some(temp_dir.path().join("missing.json"));

        let coach = Coach::open(MemoryStore::new(), config);
        assert!(coach.catalog().is_empty());
        assert_eq!(coach.count_matching(), 0);
        assert_eq!(coach.stats().total_workouts, 0);

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(matches!(
            coach.preview(&mut rng),
            Err(Error::InsufficientPool { available: 0, .. })
        ));
    }

    #[test]
    fn test_full_session_through_coach() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut coach = Coach::new(
            build_default_catalog(),
            JsonFileStore::new(temp_dir.path()),
            Config::default(),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let plan = coach.prescribe(&mut rng).unwrap();

        let ticker = ManualTicker::new();
        let deps = coach.session_deps(Box::new(ticker.clone()));
        let mut runner = coach.start_session(plan, deps).unwrap();
        assert!(ticker.is_running());

        while runner.phase() != Phase::Finished {
            if runner.feedback_slot().is_some() {
                runner.submit_feedback(9);
            }
            runner.skip();
            runner.tick();
        }
        runner.complete(7).unwrap();

        assert_eq!(coach.history().len(), 1);
        assert_eq!(coach.feedback().len(), 12);
        assert_eq!(coach.stats().total_workouts, 1);
    }

    #[test]
    fn test_custom_exercise_joins_catalog() {
        let mut coach = coach();
        let before = coach.catalog().len();

        coach
            .add_custom(ExerciseRecord::new("Bear Crawl", 6.0).with_primary(&["shoulders"]))
            .unwrap();
        assert_eq!(coach.catalog().len(), before + 1);
        assert!(coach.catalog().contains("bearcrawl"));

        assert!(coach.remove_custom("bearcrawl").unwrap());
        assert_eq!(coach.catalog().len(), before);
    }

    #[test]
    fn test_snapshot_restore_round_trip() {
        let mut source = coach();
        source.set_body_weight(60.0).unwrap();
        source
            .add_custom(ExerciseRecord::new("Bear Crawl", 6.0))
            .unwrap();
        let snapshot = source.snapshot();

        let mut target = coach();
        target.restore(&snapshot).unwrap();
        assert_eq!(target.settings().body_weight_kg, 60.0);
        assert!(target.catalog().contains("bearcrawl"));
    }

    #[test]
    fn test_reset_clears_personal_data() {
        let mut coach = coach();
        let before = coach.catalog().len();
        for _ in 0..3 {
            crate::history::append_record(coach.store_mut(), &record(2)).unwrap();
        }
        crate::feedback::submit_rating(coach.store_mut(), "pushup", 9).unwrap();
        coach.set_body_weight(90.0).unwrap();
        coach.add_custom(ExerciseRecord::new("Bear Crawl", 6.0)).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        coach.prescribe(&mut rng).unwrap();
        assert_eq!(coach.settings().difficulty_bias, 0.5);
        coach
            .save_filters(&Filters::new().with(Facet::NoiseLevel, ["quiet"]))
            .unwrap();

        coach.reset().unwrap();

        assert!(coach.history().is_empty());
        assert!(coach.feedback().is_empty());
        assert!(coach.filters().is_unconstrained());
        assert!(coach.custom_exercises().is_empty());
        assert_eq!(coach.catalog().len(), before);
        assert_eq!(coach.settings().difficulty_bias, 0.0);
        assert_eq!(coach.settings().body_weight_kg, 70.0);
    }

    #[test]
    fn test_rejects_non_positive_weight() {
        let mut coach = coach();
        assert!(matches!(coach.set_body_weight(0.0), Err(Error::Config(_))));
        assert_eq!(coach.settings().body_weight_kg, 70.0);
    }
}
