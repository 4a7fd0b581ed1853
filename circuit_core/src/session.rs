//! Session runner: the timed phase state machine for one workout.
//!
//! Phases run `Warmup(0..W)` → (`Work(i)`, `Rest(i)`) for every main
//! exercise → `Finished`. A single recurring tick drives the countdown;
//! pause only suspends it, skip zeroes it so the next tick advances, and
//! quit aborts without writing history.
//!
//! The runner owns no timer, speech or storage of its own. Those are
//! injected through [`SessionDeps`] and views subscribe to
//! [`SessionEvent`]s.

use crate::calories::{plan_calories, rounded};
use crate::config::SessionConfig;
use crate::feedback::{submit_rating, MAX_RATING, MIN_RATING};
use crate::history::append_record;
use crate::store::KeyValueStore;
use crate::{Error, ExerciseRecord, FeedbackEntry, Result, SessionRecord, WorkoutPlan};
use chrono::Utc;
use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;
use std::time::Duration;
use uuid::Uuid;

/// Spoken when a rest phase begins
pub const REST_ANNOUNCEMENT: &str = "Rest";

/// Spoken when the last rest phase ends
pub const FINISHED_ANNOUNCEMENT: &str = "Workout complete";

// ============================================================================
// Timing
// ============================================================================

/// Fixed countdown length of each phase, in seconds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseDurations {
    pub warmup: u32,
    pub work: u32,
    pub rest: u32,
}

impl Default for PhaseDurations {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

impl From<&SessionConfig> for PhaseDurations {
    fn from(config: &SessionConfig) -> Self {
        Self {
            warmup: config.warmup_seconds,
            work: config.work_seconds,
            rest: config.rest_seconds,
        }
    }
}

impl PhaseDurations {
    /// Scheduled length of a plan: every warmup, then work + rest per exercise
    pub fn plan_seconds(&self, warmups: usize, main: usize) -> u32 {
        let warmups = u32::try_from(warmups).unwrap_or(u32::MAX);
        let main = u32::try_from(main).unwrap_or(u32::MAX);
        warmups
            .saturating_mul(self.warmup)
            .saturating_add(main.saturating_mul(self.work.saturating_add(self.rest)))
    }
}

/// Per-session settings handed to the runner
#[derive(Clone, Debug, PartialEq)]
pub struct SessionOptions {
    pub durations: PhaseDurations,
    pub tick_period: Duration,
    pub body_weight_kg: f64,
}

impl SessionOptions {
    pub fn from_config(config: &SessionConfig, body_weight_kg: f64) -> Self {
        Self {
            durations: PhaseDurations::from(config),
            tick_period: config.tick_period(),
            body_weight_kg,
        }
    }
}

// ============================================================================
// Phases and events
// ============================================================================

/// Where the runner is; the index points into warmups or main exercises
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Warmup(usize),
    Work(usize),
    Rest(usize),
    Finished,
    Aborted,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Finished | Phase::Aborted)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Phase::Warmup(_) => "Warmup",
            Phase::Work(_) => "Work",
            Phase::Rest(_) => "Rest",
            Phase::Finished => "Finished",
            Phase::Aborted => "Aborted",
        }
    }
}

/// Notifications delivered to observers, in the order they happen
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// A new phase began; `exercise` names what to do (the upcoming
    /// exercise during rest)
    PhaseChanged {
        phase: Phase,
        exercise: Option<String>,
        remaining: u32,
    },
    /// The countdown moved
    Tick { phase: Phase, remaining: u32 },
    /// A rating may now be submitted for this exercise
    FeedbackOpened { exercise_id: String, name: String },
    FeedbackRecorded {
        exercise_id: String,
        entry: FeedbackEntry,
    },
    Paused,
    Resumed,
    Finished { calories: f64 },
    Aborted,
}

// ============================================================================
// Collaborators
// ============================================================================

/// Fire-and-forget speech output
pub trait Narrator {
    fn announce(&mut self, text: &str);
}

impl<F: FnMut(&str)> Narrator for F {
    fn announce(&mut self, text: &str) {
        self(text)
    }
}

/// Narrator that says nothing
#[derive(Clone, Copy, Debug, Default)]
pub struct SilentNarrator;

impl Narrator for SilentNarrator {
    fn announce(&mut self, _text: &str) {}
}

/// Recurring tick source; the owner calls [`SessionRunner::tick`] per period
pub trait Ticker {
    fn start(&mut self, period: Duration);

    /// Stop ticking; must not return until no further tick can be delivered
    fn cancel(&mut self);
}

/// Ticker driven by hand, for tests and non-interactive runs
///
/// Clones share state so a caller can keep a handle after boxing one.
#[derive(Clone, Debug, Default)]
pub struct ManualTicker {
    running: Rc<Cell<bool>>,
    period: Rc<Cell<Option<Duration>>>,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    pub fn period(&self) -> Option<Duration> {
        self.period.get()
    }
}

impl Ticker for ManualTicker {
    fn start(&mut self, period: Duration) {
        self.period.set(Some(period));
        self.running.set(true);
    }

    fn cancel(&mut self) {
        self.running.set(false);
    }
}

/// Receives [`SessionEvent`]s
pub trait SessionObserver {
    fn on_event(&mut self, event: &SessionEvent);
}

impl<F: FnMut(&SessionEvent)> SessionObserver for F {
    fn on_event(&mut self, event: &SessionEvent) {
        self(event)
    }
}

/// Everything the runner talks to
pub struct SessionDeps {
    pub store: Box<dyn KeyValueStore>,
    pub narrator: Box<dyn Narrator>,
    pub ticker: Box<dyn Ticker>,
    pub observers: Vec<Box<dyn SessionObserver>>,
}

impl SessionDeps {
    pub fn new(store: Box<dyn KeyValueStore>, ticker: Box<dyn Ticker>) -> Self {
        Self {
            store,
            narrator: Box::new(SilentNarrator),
            ticker,
            observers: Vec::new(),
        }
    }

    pub fn with_narrator(mut self, narrator: Box<dyn Narrator>) -> Self {
        self.narrator = narrator;
        self
    }

    pub fn with_observer(mut self, observer: Box<dyn SessionObserver>) -> Self {
        self.observers.push(observer);
        self
    }
}

// ============================================================================
// Runner
// ============================================================================

/// One in-flight workout; construct per session and drop when done
pub struct SessionRunner {
    plan: Option<WorkoutPlan>,
    phase: Phase,
    remaining: u32,
    paused: bool,
    feedback_slot: Option<String>,
    rated: HashSet<String>,
    options: SessionOptions,
    calories: Option<f64>,
    recorded: bool,
    deps: SessionDeps,
}

impl SessionRunner {
    /// Enter the first phase and start the ticker
    ///
    /// A plan with no main exercises is rejected before anything runs.
    pub fn start(plan: WorkoutPlan, options: SessionOptions, deps: SessionDeps) -> Result<Self> {
        if plan.main.is_empty() {
            return Err(Error::EmptyPlan);
        }

        let first = if plan.warmups.is_empty() {
            Phase::Work(0)
        } else {
            Phase::Warmup(0)
        };

        tracing::info!(
            "Starting session: {} warmups, {} exercises",
            plan.warmups.len(),
            plan.main.len()
        );

        let mut runner = Self {
            plan: Some(plan),
            phase: first,
            remaining: 0,
            paused: false,
            feedback_slot: None,
            rated: HashSet::new(),
            options,
            calories: None,
            recorded: false,
            deps,
        };
        runner.enter(first);
        let period = runner.options.tick_period;
        runner.deps.ticker.start(period);
        Ok(runner)
    }

    pub fn subscribe(&mut self, observer: Box<dyn SessionObserver>) {
        self.deps.observers.push(observer);
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Seconds left in the current phase
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// The plan being run; gone once the session is aborted
    pub fn plan(&self) -> Option<&WorkoutPlan> {
        self.plan.as_ref()
    }

    /// Exercise id awaiting a rating, if any
    pub fn feedback_slot(&self) -> Option<&str> {
        self.feedback_slot.as_deref()
    }

    /// Total calories, available once finished
    pub fn calories(&self) -> Option<f64> {
        self.calories
    }

    /// The exercise being performed (or, while resting, the one just done)
    pub fn current_exercise(&self) -> Option<&ExerciseRecord> {
        let plan = self.plan.as_ref()?;
        match self.phase {
            Phase::Warmup(i) => plan.warmups.get(i),
            Phase::Work(i) | Phase::Rest(i) => plan.main.get(i),
            Phase::Finished | Phase::Aborted => None,
        }
    }

    /// Advance the countdown by one period
    ///
    /// Does nothing while paused or after the session ended. Reaching zero
    /// performs the phase transition before returning.
    pub fn tick(&mut self) {
        if self.paused || self.phase.is_terminal() {
            return;
        }

        if self.remaining > 0 {
            self.remaining -= 1;
            let event = SessionEvent::Tick {
                phase: self.phase,
                remaining: self.remaining,
            };
            self.emit(event);
        }

        if self.remaining == 0 {
            self.advance();
        }
    }

    /// Suspend the countdown; returns false if nothing changed
    pub fn pause(&mut self) -> bool {
        if self.paused || self.phase.is_terminal() {
            return false;
        }
        self.paused = true;
        tracing::debug!("Paused in {:?} with {}s left", self.phase, self.remaining);
        self.emit(SessionEvent::Paused);
        true
    }

    /// Resume the countdown; returns false if nothing changed
    pub fn resume(&mut self) -> bool {
        if !self.paused || self.phase.is_terminal() {
            return false;
        }
        self.paused = false;
        tracing::debug!("Resumed in {:?}", self.phase);
        self.emit(SessionEvent::Resumed);
        true
    }

    /// Zero the countdown; the next tick performs the transition
    pub fn skip(&mut self) {
        if self.phase.is_terminal() {
            return;
        }
        tracing::debug!("Skipping {:?}", self.phase);
        self.remaining = 0;
    }

    /// Abort the session: stop the ticker and discard the plan
    ///
    /// Has no effect once finished. No history is written.
    pub fn quit(&mut self) -> bool {
        if self.phase.is_terminal() {
            return false;
        }

        self.deps.ticker.cancel();
        tracing::info!("Session aborted in {:?}", self.phase);

        self.phase = Phase::Aborted;
        self.remaining = 0;
        self.paused = false;
        self.feedback_slot = None;
        self.plan = None;
        self.emit(SessionEvent::Aborted);
        true
    }

    /// Rate the exercise whose feedback slot is open
    ///
    /// Returns the updated entry, or None when no slot is open or the
    /// store rejected the write.
    pub fn submit_feedback(&mut self, rating: u8) -> Option<FeedbackEntry> {
        let exercise_id = self.feedback_slot.take()?;
        let rating = rating.clamp(MIN_RATING, MAX_RATING);
        self.rated.insert(exercise_id.clone());

        match submit_rating(self.deps.store.as_mut(), &exercise_id, rating) {
            Ok(entry) => {
                self.emit(SessionEvent::FeedbackRecorded {
                    exercise_id,
                    entry,
                });
                Some(entry)
            }
            Err(e) => {
                tracing::warn!("Failed to save rating for {}: {}", exercise_id, e);
                None
            }
        }
    }

    /// Record the finished session with its overall perceived exertion
    ///
    /// Appends exactly one record to history; a second call is an error.
    pub fn complete(&mut self, perceived_exertion: u8) -> Result<SessionRecord> {
        if self.phase != Phase::Finished {
            return Err(Error::Session(format!(
                "cannot complete a session in phase {}",
                self.phase.label()
            )));
        }
        if self.recorded {
            return Err(Error::Session("session already recorded".into()));
        }

        let calories = self.calories.unwrap_or_default();
        let duration_seconds = self
            .plan
            .as_ref()
            .map_or(0, |p| {
                self.options
                    .durations
                    .plan_seconds(p.warmups.len(), p.main.len())
            });

        let record = SessionRecord {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            perceived_exertion: perceived_exertion.clamp(MIN_RATING, MAX_RATING),
            calories_burned: rounded(calories),
            duration_seconds,
        };

        append_record(self.deps.store.as_mut(), &record)?;
        self.recorded = true;

        tracing::info!(
            "Session recorded: RPE {}, {} kcal",
            record.perceived_exertion,
            record.calories_burned
        );
        Ok(record)
    }

    fn advance(&mut self) {
        let Some(plan) = self.plan.as_ref() else {
            return;
        };

        let next = match self.phase {
            Phase::Warmup(i) if i + 1 < plan.warmups.len() => Phase::Warmup(i + 1),
            Phase::Warmup(_) => Phase::Work(0),
            Phase::Work(i) => Phase::Rest(i),
            Phase::Rest(i) if i + 1 < plan.main.len() => Phase::Work(i + 1),
            Phase::Rest(_) => Phase::Finished,
            Phase::Finished | Phase::Aborted => return,
        };

        self.enter(next);
    }

    fn enter(&mut self, phase: Phase) {
        if let Some(forfeited) = self.feedback_slot.take() {
            tracing::debug!("Feedback for {} not given this session", forfeited);
        }

        tracing::debug!("{:?} -> {:?}", self.phase, phase);
        self.phase = phase;

        let Some(plan) = self.plan.as_ref() else {
            return;
        };

        let durations = self.options.durations;
        let (remaining, exercise, announcement, feedback) = match phase {
            Phase::Warmup(i) => {
                let name = plan.warmups[i].name.clone();
                (durations.warmup, Some(name.clone()), name, None)
            }
            Phase::Work(i) => {
                let name = plan.main[i].name.clone();
                (durations.work, Some(name.clone()), name, None)
            }
            Phase::Rest(i) => {
                let done = &plan.main[i];
                let upcoming = plan.main.get(i + 1).map(|e| e.name.clone());
                let slot = (!self.rated.contains(&done.id))
                    .then(|| (done.id.clone(), done.name.clone()));
                (durations.rest, upcoming, REST_ANNOUNCEMENT.to_string(), slot)
            }
            Phase::Finished => {
                let calories = plan_calories(plan, self.options.body_weight_kg, &durations);
                self.calories = Some(calories);
                (0, None, FINISHED_ANNOUNCEMENT.to_string(), None)
            }
            Phase::Aborted => return,
        };

        self.remaining = remaining;
        if phase == Phase::Finished {
            self.deps.ticker.cancel();
            self.paused = false;
        }

        self.deps.narrator.announce(&announcement);
        self.emit(SessionEvent::PhaseChanged {
            phase,
            exercise,
            remaining,
        });

        if let Some((exercise_id, name)) = feedback {
            self.feedback_slot = Some(exercise_id.clone());
            self.emit(SessionEvent::FeedbackOpened { exercise_id, name });
        }

        if let Some(calories) = self.calories.filter(|_| phase == Phase::Finished) {
            tracing::info!("Session finished: {:.1} kcal", calories);
            self.emit(SessionEvent::Finished { calories });
        }
    }

    fn emit(&mut self, event: SessionEvent) {
        for observer in self.deps.observers.iter_mut() {
            observer.on_event(&event);
        }
    }
}

impl Drop for SessionRunner {
    fn drop(&mut self) {
        if !self.phase.is_terminal() {
            self.deps.ticker.cancel();
        }
    }
}
