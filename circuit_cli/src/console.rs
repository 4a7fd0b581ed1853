//! Terminal collaborators for the session runner.
//!
//! Ticks and stdin lines arrive on one channel and are handled by a single
//! loop, so runner calls never overlap.

use circuit_core::session::{Narrator, SessionEvent, SessionObserver, Ticker};
use circuit_core::Phase;
use std::io::{self, BufRead, Write};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Everything the session loop reacts to
#[derive(Debug)]
pub enum Input {
    Tick,
    Line(String),
    Eof,
}

/// Ticker backed by a thread that posts [`Input::Tick`] every period
pub struct ThreadTicker {
    tx: Sender<Input>,
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ThreadTicker {
    pub fn new(tx: Sender<Input>) -> Self {
        Self {
            tx,
            stop: None,
            handle: None,
        }
    }
}

impl Ticker for ThreadTicker {
    fn start(&mut self, period: Duration) {
        self.cancel();

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let tx = self.tx.clone();
        self.stop = Some(stop_tx);
        self.handle = Some(thread::spawn(move || loop {
            match stop_rx.recv_timeout(period) {
                Err(RecvTimeoutError::Timeout) => {
                    if tx.send(Input::Tick).is_err() {
                        break;
                    }
                }
                // Disconnected (or an explicit stop)
                _ => break,
            }
        }));
    }

    /// Disconnect the stop channel and wait for the thread to exit
    fn cancel(&mut self) {
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Ticker thread panicked");
            }
        }
    }
}

impl Drop for ThreadTicker {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Forward stdin lines to the session loop until EOF
pub fn spawn_stdin_reader(tx: Sender<Input>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(Input::Line(line)).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
        let _ = tx.send(Input::Eof);
    });
}

/// Speaks through an external text-to-speech program, ignoring failures
///
/// Spawned speech processes are reaped on the next announcement and on drop.
pub struct SpeechNarrator {
    program: String,
    children: Vec<Child>,
}

impl SpeechNarrator {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            children: Vec::new(),
        }
    }

    /// Number of speech processes still running
    pub fn pending(&self) -> usize {
        self.children.len()
    }

    fn reap(&mut self) {
        self.children.retain_mut(|child| match child.try_wait() {
            Ok(Some(_)) => false,
            Ok(None) => true,
            Err(e) => {
                tracing::debug!("Failed to poll speech process: {}", e);
                false
            }
        });
    }

    /// `say` on macOS, `espeak` elsewhere
    pub fn platform_default() -> Self {
        if cfg!(target_os = "macos") {
            Self::new("say")
        } else {
            Self::new("espeak")
        }
    }
}

impl Narrator for SpeechNarrator {
    fn announce(&mut self, text: &str) {
        self.reap();
        let spawned = Command::new(&self.program)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match spawned {
            Ok(child) => self.children.push(child),
            Err(e) => tracing::debug!("Narration via {} failed: {}", self.program, e),
        }
    }
}

impl Drop for SpeechNarrator {
    fn drop(&mut self) {
        for child in self.children.iter_mut() {
            if let Err(e) = child.wait() {
                tracing::debug!("Failed to wait for speech process: {}", e);
            }
        }
    }
}

/// Prints session progress to stdout
pub struct ConsoleObserver {
    warmups: usize,
    exercises: usize,
    show_countdown: bool,
}

impl ConsoleObserver {
    pub fn new(warmups: usize, exercises: usize, show_countdown: bool) -> Self {
        Self {
            warmups,
            exercises,
            show_countdown,
        }
    }
}

impl SessionObserver for ConsoleObserver {
    fn on_event(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::PhaseChanged {
                phase,
                exercise,
                remaining,
            } => {
                let name = exercise.as_deref().unwrap_or("");
                match phase {
                    Phase::Warmup(i) => println!(
                        "\n▶ Warmup {}/{}: {} ({}s)",
                        i + 1,
                        self.warmups,
                        name,
                        remaining
                    ),
                    Phase::Work(i) => println!(
                        "\n▶ Exercise {}/{}: {} ({}s)",
                        i + 1,
                        self.exercises,
                        name,
                        remaining
                    ),
                    Phase::Rest(_) if exercise.is_some() => {
                        println!("  Rest ({}s). Next up: {}", remaining, name)
                    }
                    Phase::Rest(_) => println!("  Rest ({}s). Last one done!", remaining),
                    Phase::Finished | Phase::Aborted => {}
                }
            }
            SessionEvent::Tick { remaining, .. } => {
                if self.show_countdown && (1..=3).contains(remaining) {
                    println!("  {}...", remaining);
                }
            }
            SessionEvent::FeedbackOpened { name, .. } => {
                if self.show_countdown {
                    println!("  How hard was {}? Type 1-10 + Enter", name);
                }
            }
            SessionEvent::FeedbackRecorded { exercise_id, entry } => {
                println!(
                    "  ✓ Rated {} (avg {:.1} over {})",
                    exercise_id, entry.avg_score, entry.count
                );
            }
            SessionEvent::Paused => println!("  ⏸ Paused. 'p' + Enter to resume"),
            SessionEvent::Resumed => println!("  ▶ Resumed"),
            SessionEvent::Finished { calories } => {
                println!("\n✓ Workout complete: ~{:.0} kcal", calories)
            }
            SessionEvent::Aborted => println!("\n✗ Workout aborted. Nothing was recorded."),
        }
        let _ = io::stdout().flush();
    }
}
