mod console;

use circuit_core::filter::FacetUniverse;
use circuit_core::session::SessionDeps;
use circuit_core::*;
use clap::{Args, Parser, Subcommand};
use console::{spawn_stdin_reader, ConsoleObserver, Input, SpeechNarrator, ThreadTicker};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};

/// Overall effort recorded when none can be read
const DEFAULT_RPE: u8 = 5;

#[derive(Parser)]
#[command(name = "circuit")]
#[command(about = "Adaptive bodyweight circuit trainer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Seed the random source for reproducible plans
    #[arg(long, global = true)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a workout and run it (default)
    Start(StartArgs),

    /// Preview the next workout without saving anything
    Plan,

    /// Show workout statistics
    Stats,

    /// List every exercise in the catalog
    Library,

    /// Show or change personal settings
    Settings {
        /// Body weight in kilograms
        #[arg(long)]
        weight: Option<f64>,

        /// Workout focus (full_body, upper_body, lower_body, core, cardio)
        #[arg(long)]
        focus: Option<String>,
    },

    /// Manage exercise filters
    #[command(subcommand)]
    Filter(FilterCommand),

    /// Manage custom exercises
    #[command(subcommand)]
    Custom(CustomCommand),

    /// Export session history to CSV
    Export {
        /// CSV file to append to
        path: PathBuf,
    },

    /// Save or restore a snapshot of all personal data
    #[command(subcommand)]
    Snapshot(SnapshotCommand),

    /// Delete history, ratings, filters, custom exercises and settings
    Reset {
        /// Confirm that all personal data should be cleared
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args, Default)]
struct StartArgs {
    /// Run without waiting (for testing) - ticks as fast as possible
    #[arg(long)]
    auto: bool,

    /// Rating given to every exercise during rest (auto mode)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=10))]
    rate: Option<u8>,

    /// Overall perceived exertion recorded at the end
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=10))]
    rpe: Option<u8>,

    /// Speak exercise names through the system speech program
    #[arg(long)]
    speak: bool,
}

#[derive(Subcommand)]
enum FilterCommand {
    /// Accept only these values for a facet
    Set {
        /// force, mechanic, equipment, category, primary, secondary, noise, partner
        facet: String,
        #[arg(required = true)]
        values: Vec<String>,
    },
    /// Remove one facet's constraint, or all of them
    Clear { facet: Option<String> },
    /// Show active filters and the matching pool size
    Show,
}

#[derive(Subcommand)]
enum CustomCommand {
    /// Add a custom exercise
    Add {
        name: String,

        /// Difficulty from 0 to 10
        #[arg(long, default_value_t = 5.0)]
        difficulty: f64,

        /// Primary muscles (e.g. chest, quads, abs, cardio)
        #[arg(long, num_args = 1..)]
        primary: Vec<String>,

        #[arg(long, num_args = 1..)]
        secondary: Vec<String>,

        #[arg(long)]
        equipment: Option<String>,

        #[arg(long)]
        category: Option<String>,

        /// MET value (defaults to 6)
        #[arg(long)]
        met: Option<f64>,

        #[arg(long)]
        quiet: bool,

        #[arg(long)]
        partner: bool,
    },
    /// Remove a custom exercise by id
    Remove { id: String },
    /// List custom exercises
    List,
}

#[derive(Subcommand)]
enum SnapshotCommand {
    /// Write a snapshot file
    Push { path: PathBuf },
    /// Restore from a snapshot file, replacing current data
    Pull { path: PathBuf },
}

fn main() {
    // Initialize logging
    circuit_core::logging::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| config.data.data_dir.clone());

    let store = JsonFileStore::new(data_dir.join("store"));
    let mut coach = Coach::open(store, config);
    let mut rng = match cli.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };

    match cli.command.unwrap_or(Commands::Start(StartArgs::default())) {
        Commands::Start(args) => cmd_start(&mut coach, &mut rng, args),
        Commands::Plan => cmd_plan(&coach, &mut rng),
        Commands::Stats => cmd_stats(&coach),
        Commands::Library => cmd_library(&coach),
        Commands::Settings { weight, focus } => cmd_settings(&mut coach, weight, focus),
        Commands::Filter(command) => cmd_filter(&mut coach, command),
        Commands::Custom(command) => cmd_custom(&mut coach, command),
        Commands::Export { path } => {
            let count = coach.export_history(&path)?;
            println!("✓ Exported {} sessions to {}", count, path.display());
            Ok(())
        }
        Commands::Snapshot(command) => cmd_snapshot(&mut coach, command),
        Commands::Reset { yes } => cmd_reset(&mut coach, yes),
    }
}

fn cmd_start(coach: &mut Coach<JsonFileStore>, rng: &mut ChaCha8Rng, args: StartArgs) -> Result<()> {
    let plan = coach.prescribe(rng)?;
    display_plan(&plan);

    let observer = ConsoleObserver::new(plan.warmups.len(), plan.main.len(), !args.auto);

    if args.auto {
        let ticker = ManualTicker::new();
        let deps = with_narrator(coach.session_deps(Box::new(ticker)), args.speak)
            .with_observer(Box::new(observer));
        let mut runner = coach.start_session(plan, deps)?;

        while !runner.phase().is_terminal() {
            if let (Some(rating), Some(_)) = (args.rate, runner.feedback_slot()) {
                runner.submit_feedback(rating);
            }
            runner.tick();
        }

        return finish(&mut runner, args.rpe.unwrap_or(DEFAULT_RPE));
    }

    let (tx, rx) = mpsc::channel();
    let ticker = ThreadTicker::new(tx.clone());
    spawn_stdin_reader(tx);

    let deps = with_narrator(coach.session_deps(Box::new(ticker)), args.speak)
        .with_observer(Box::new(observer));
    let mut runner = coach.start_session(plan, deps)?;

    println!("\nCommands: p = pause/resume, s = skip, q = quit, 1-10 = rate the last exercise");
    run_interactive(&mut runner, &rx);

    if runner.phase() != Phase::Finished {
        return Ok(());
    }

    let rpe = match args.rpe {
        Some(rpe) => rpe,
        None => prompt_rpe(&rx)?,
    };
    finish(&mut runner, rpe)
}

fn with_narrator(deps: SessionDeps, speak: bool) -> SessionDeps {
    if speak {
        deps.with_narrator(Box::new(SpeechNarrator::platform_default()))
    } else {
        deps
    }
}

/// Dispatch ticks and typed commands until the session ends
fn run_interactive(runner: &mut SessionRunner, rx: &Receiver<Input>) {
    while !runner.phase().is_terminal() {
        let input = match rx.recv() {
            Ok(input) => input,
            Err(_) => break,
        };

        match input {
            Input::Tick => runner.tick(),
            Input::Eof => {}
            Input::Line(line) => match line.trim().to_lowercase().as_str() {
                "" => {}
                "p" => {
                    if !runner.pause() {
                        runner.resume();
                    }
                }
                "s" => runner.skip(),
                "q" => {
                    runner.quit();
                }
                other => match other.parse::<u8>() {
                    Ok(rating) if (1..=10).contains(&rating) => {
                        if runner.submit_feedback(rating).is_none() {
                            println!("  No exercise is waiting for a rating right now");
                        }
                    }
                    _ => println!("  Unknown command {:?}", other),
                },
            },
        }
    }
}

fn prompt_rpe(rx: &Receiver<Input>) -> Result<u8> {
    loop {
        print!("Overall, how hard was that workout (1-10)? ");
        io::stdout().flush()?;

        loop {
            match rx.recv() {
                Ok(Input::Tick) => continue,
                Ok(Input::Line(line)) => match line.trim().parse::<u8>() {
                    Ok(rpe) if (1..=10).contains(&rpe) => return Ok(rpe),
                    _ => break,
                },
                Ok(Input::Eof) | Err(_) => {
                    println!("\nNo rating given, recording {}", DEFAULT_RPE);
                    return Ok(DEFAULT_RPE);
                }
            }
        }
    }
}

fn finish(runner: &mut SessionRunner, rpe: u8) -> Result<()> {
    if runner.phase() != Phase::Finished {
        return Ok(());
    }
    let record = runner.complete(rpe)?;
    println!(
        "✓ Session logged! RPE {}, {} kcal, {} min",
        record.perceived_exertion,
        record.calories_burned,
        record.duration_seconds / 60
    );
    Ok(())
}

fn cmd_plan(coach: &Coach<JsonFileStore>, rng: &mut ChaCha8Rng) -> Result<()> {
    let plan = coach.preview(rng)?;
    display_plan(&plan);
    println!("[Preview - nothing saved]");
    Ok(())
}

fn display_plan(plan: &WorkoutPlan) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  CIRCUIT WORKOUT");
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  Target difficulty: {:.1}", plan.target_difficulty);
    println!(
        "  Duration: ~{} min ({} seconds)",
        (plan.total_duration_seconds + 59) / 60,
        plan.total_duration_seconds
    );

    if !plan.warmups.is_empty() {
        println!("\n  Warmup:");
        for exercise in &plan.warmups {
            println!("    • {}", exercise.name);
        }
    }

    println!("\n  Exercises:");
    for (i, exercise) in plan.main.iter().enumerate() {
        println!(
            "    {:>2}. {} (difficulty {:.0})",
            i + 1,
            exercise.name,
            exercise.base_difficulty
        );
    }
    println!();
}

fn cmd_stats(coach: &Coach<JsonFileStore>) -> Result<()> {
    let stats = coach.stats();

    println!("Workouts:         {}", stats.total_workouts);
    println!("Calories burned:  {} kcal", stats.total_calories);
    match stats.average_exertion {
        Some(avg) => println!("Recent avg RPE:   {:.1}", avg),
        None => println!("Recent avg RPE:   -"),
    }
    println!("Difficulty level: {}/10", stats.difficulty_level);

    if !stats.recent.is_empty() {
        println!("\nRecent sessions:");
        for record in &stats.recent {
            println!(
                "  {}  RPE {:>2}  {:>4} kcal",
                record.timestamp.format("%Y-%m-%d %H:%M"),
                record.perceived_exertion,
                record.calories_burned
            );
        }
    }
    Ok(())
}

fn cmd_library(coach: &Coach<JsonFileStore>) -> Result<()> {
    let catalog = coach.catalog();
    let filters = coach.filters();
    let universe = FacetUniverse::observe(&catalog.exercises);
    let custom_ids: Vec<String> = coach.custom_exercises().into_iter().map(|e| e.id).collect();

    for exercise in &catalog.exercises {
        let mut tags = Vec::new();
        if exercise.is_warmup {
            tags.push("warmup");
        }
        if exercise.quiet {
            tags.push("quiet");
        }
        if exercise.partner_required {
            tags.push("partner");
        }
        if custom_ids.contains(&exercise.id) {
            tags.push("custom");
        }
        let marker = if filters.matches(exercise, &universe) { " " } else { "✗" };
        let muscles: Vec<&str> = exercise.primary_muscles.iter().map(String::as_str).collect();

        println!(
            "{} {:<22} {:<24} {:>4.1}  {:<20} {}",
            marker,
            exercise.id,
            exercise.name,
            exercise.base_difficulty,
            muscles.join(", "),
            tags.join(" ")
        );
    }

    println!(
        "\n{} exercises, {} match the current filters",
        catalog.len(),
        coach.count_matching()
    );
    Ok(())
}

fn cmd_settings(
    coach: &mut Coach<JsonFileStore>,
    weight: Option<f64>,
    focus: Option<String>,
) -> Result<()> {
    if let Some(weight) = weight {
        coach.set_body_weight(weight)?;
    }
    if let Some(focus) = focus {
        let parsed = WorkoutFocus::parse(&focus)
            .ok_or_else(|| Error::Config(format!("Unknown focus: {}", focus)))?;
        coach.set_focus(parsed)?;
    }

    let settings = coach.settings();
    println!("Body weight:      {:.1} kg", settings.body_weight_kg);
    println!("Focus:            {:?}", settings.focus);
    println!("Difficulty bias:  {:+.1}", settings.difficulty_bias);
    Ok(())
}

fn parse_facet(name: &str) -> Result<Facet> {
    Facet::parse(name).ok_or_else(|| Error::Config(format!("Unknown filter facet: {}", name)))
}

fn cmd_filter(coach: &mut Coach<JsonFileStore>, command: FilterCommand) -> Result<()> {
    let mut filters = coach.filters();

    match command {
        FilterCommand::Set { facet, values } => {
            filters.set(parse_facet(&facet)?, &values);
            coach.save_filters(&filters)?;
        }
        FilterCommand::Clear { facet: Some(facet) } => {
            filters.clear(parse_facet(&facet)?);
            coach.save_filters(&filters)?;
        }
        FilterCommand::Clear { facet: None } => {
            filters.clear_all();
            coach.save_filters(&filters)?;
        }
        FilterCommand::Show => {}
    }

    if filters.is_unconstrained() {
        println!("No filters active");
    } else {
        for (facet, values) in filters.iter() {
            let values: Vec<&str> = values.iter().map(String::as_str).collect();
            println!("{:?}: {}", facet, values.join(", "));
        }
    }

    let matching = coach.count_matching();
    println!("{} exercises match", matching);
    if matching < coach.config().selection.min_pool {
        println!(
            "⚠ At least {} are needed to start a workout",
            coach.config().selection.min_pool
        );
    }
    Ok(())
}

fn cmd_custom(coach: &mut Coach<JsonFileStore>, command: CustomCommand) -> Result<()> {
    match command {
        CustomCommand::Add {
            name,
            difficulty,
            primary,
            secondary,
            equipment,
            category,
            met,
            quiet,
            partner,
        } => {
            let primary: Vec<&str> = primary.iter().map(String::as_str).collect();
            let secondary: Vec<&str> = secondary.iter().map(String::as_str).collect();

            let mut exercise = ExerciseRecord::new(&name, difficulty)
                .with_primary(&primary)
                .with_secondary(&secondary);
            if let Some(equipment) = equipment {
                exercise = exercise.with_equipment(&equipment);
            }
            if let Some(category) = category {
                exercise = exercise.with_category(&category);
            }
            if let Some(met) = met {
                exercise = exercise.with_met(met);
            }
            if quiet {
                exercise = exercise.quiet();
            }
            if partner {
                exercise = exercise.needs_partner();
            }

            let added = coach.add_custom(exercise)?;
            println!("✓ Added {} ({})", added.name, added.id);
        }
        CustomCommand::Remove { id } => {
            if coach.remove_custom(&id)? {
                println!("✓ Removed {}", id);
            } else {
                println!("No custom exercise with id {}", id);
            }
        }
        CustomCommand::List => {
            let custom = coach.custom_exercises();
            if custom.is_empty() {
                println!("No custom exercises");
            }
            for exercise in custom {
                println!(
                    "{:<22} {:<24} {:>4.1}",
                    exercise.id, exercise.name, exercise.base_difficulty
                );
            }
        }
    }
    Ok(())
}

fn cmd_snapshot(coach: &mut Coach<JsonFileStore>, command: SnapshotCommand) -> Result<()> {
    match command {
        SnapshotCommand::Push { path } => {
            let mut sync = FileSnapshotSync::new(&path);
            sync.push(&coach.snapshot())?;
            println!("✓ Snapshot saved to {}", path.display());
        }
        SnapshotCommand::Pull { path } => {
            let sync = FileSnapshotSync::new(&path);
            match sync.pull()? {
                Some(snapshot) => {
                    coach.restore(&snapshot)?;
                    println!(
                        "✓ Restored snapshot from {} ({} sessions)",
                        snapshot.taken_at.format("%Y-%m-%d %H:%M"),
                        snapshot.history.len()
                    );
                }
                None => println!("No snapshot found at {}", path.display()),
            }
        }
    }
    Ok(())
}

fn cmd_reset(coach: &mut Coach<JsonFileStore>, yes: bool) -> Result<()> {
    if !yes {
        println!(
            "This deletes {} logged sessions and every rating. Re-run with --yes to confirm.",
            coach.history().len()
        );
        return Ok(());
    }
    coach.reset()?;
    println!("✓ All personal data cleared");
    Ok(())
}
