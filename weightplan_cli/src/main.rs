use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use weightplan_core::correction::baseline;
use weightplan_core::history::{current_weight, CurrentWeight};
use weightplan_core::*;

#[derive(Parser)]
#[command(name = "wplan")]
#[command(about = "Adaptive weight goal planner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Evaluate as of this date (YYYY-MM-DD) instead of today
    #[arg(long, global = true, value_parser = parse_date)]
    today: Option<NaiveDate>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Log weight and/or calories for a day
    Log {
        /// Bodyweight in kg
        #[arg(long)]
        weight: Option<f64>,

        /// Calorie intake in kcal
        #[arg(long)]
        calories: Option<i32>,

        /// Day to log (defaults to today)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },

    /// Import log entries from a CSV file (date,weight_kg,calories)
    Import { path: PathBuf },

    /// Export the log to a CSV file
    Export { path: PathBuf },

    /// Estimate maintenance calories from the last two weeks
    Maintenance,

    /// Manage the active goal
    Goal {
        #[command(subcommand)]
        action: GoalAction,
    },

    /// Run one correction evaluation for the active goal
    Correct,

    /// List correction segments of the active goal
    Segments,

    /// Show target weight and calories for a day
    Timeline {
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
}

#[derive(Subcommand)]
enum GoalAction {
    /// Replace the active goal
    Set(GoalArgs),

    /// Project the active goal, optionally previewing unsaved edits
    Show {
        /// Preview a different rate value
        #[arg(long)]
        rate: Option<String>,

        /// Preview a different duration in weeks
        #[arg(long)]
        duration: Option<i32>,

        /// Preview a different target date
        #[arg(long, value_parser = parse_date)]
        target_date: Option<NaiveDate>,
    },

    /// Remove the active goal and its correction segments
    Clear,
}

#[derive(Args)]
struct GoalArgs {
    #[arg(long, value_enum)]
    archetype: ArchetypeArg,

    #[arg(long, value_enum)]
    mode: ModeArg,

    #[arg(long)]
    target_weight: Option<f64>,

    #[arg(long, value_parser = parse_date)]
    target_date: Option<NaiveDate>,

    #[arg(long)]
    duration: Option<i32>,

    /// Flat rate in kg/week
    #[arg(long, conflicts_with_all = ["rate_percent", "preset"])]
    rate_kg: Option<f64>,

    /// Rate in percent of bodyweight per week
    #[arg(long, conflicts_with = "preset")]
    rate_percent: Option<f64>,

    #[arg(long, value_enum)]
    preset: Option<PresetArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ArchetypeArg {
    TargetWeight,
    Bulk,
    Cut,
    Maintain,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    ByDate,
    ByRate,
    ByDuration,
}

#[derive(Clone, Copy, ValueEnum)]
enum PresetArg {
    Gentle,
    Moderate,
    Aggressive,
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {}", e))
}

/// File-backed stores under the data directory
struct Stores {
    log: Arc<JsonlLogStore>,
    goals: Arc<JsonGoalStore>,
    segments: Arc<JsonlSegmentStore>,
}

impl Stores {
    fn open(data_dir: &Path) -> Self {
        Self {
            log: Arc::new(JsonlLogStore::new(data_dir.join("log.jsonl"))),
            goals: Arc::new(JsonGoalStore::new(data_dir.join("goal.json"))),
            segments: Arc::new(JsonlSegmentStore::new(data_dir.join("segments.jsonl"))),
        }
    }
}

struct Ctx {
    stores: Stores,
    config: Config,
    today: NaiveDate,
    json: bool,
}

fn main() -> Result<()> {
    // Initialize logging
    weightplan_core::logging::init_with_level("warn");

    let cli = Cli::parse();

    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    std::fs::create_dir_all(&data_dir)?;

    let ctx = Ctx {
        stores: Stores::open(&data_dir),
        config,
        today: cli.today.unwrap_or_else(|| Local::now().date_naive()),
        json: cli.json,
    };

    match cli.command {
        Commands::Log {
            weight,
            calories,
            date,
        } => cmd_log(&ctx, weight, calories, date),
        Commands::Import { path } => cmd_import(&ctx, &path),
        Commands::Export { path } => cmd_export(&ctx, &path),
        Commands::Maintenance => cmd_maintenance(&ctx),
        Commands::Goal { action } => match action {
            GoalAction::Set(args) => cmd_goal_set(&ctx, args),
            GoalAction::Show {
                rate,
                duration,
                target_date,
            } => cmd_goal_show(
                &ctx,
                ProjectionOverrides {
                    rate_text: rate,
                    duration_weeks: duration,
                    target_date,
                },
            ),
            GoalAction::Clear => cmd_goal_clear(&ctx),
        },
        Commands::Correct => cmd_correct(&ctx),
        Commands::Segments => cmd_segments(&ctx),
        Commands::Timeline { date } => cmd_timeline(&ctx, date.unwrap_or(ctx.today)),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Let the correction worker react to a change and report what it appended
fn react(ctx: &Ctx, change: StoreChange) -> Result<()> {
    let coordinator = Arc::new(CorrectionCoordinator::new(
        ctx.stores.log.clone(),
        ctx.stores.goals.clone(),
        ctx.stores.segments.clone(),
        &ctx.config,
    ));
    let today = ctx.today;
    let worker = CorrectionWorker::spawn(coordinator, move || today)?;
    worker.notify(change)?;
    let mut report = worker.shutdown()?;
    tracing::debug!(
        "Correction worker ran {} evaluations, appended {}",
        report.evaluations,
        report.appended.len()
    );

    for segment in &report.appended {
        if !ctx.json {
            println!(
                "↻ Plan corrected: {:+.2} kg/week observed {} to {}, new target {} kcal/day",
                segment.rate_per_week, segment.start_date, segment.end_date, segment.target_calories
            );
        }
    }

    match report.errors.pop() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn cmd_log(
    ctx: &Ctx,
    weight: Option<f64>,
    calories: Option<i32>,
    date: Option<NaiveDate>,
) -> Result<()> {
    if weight.is_none() && calories.is_none() {
        return Err(Error::Other("nothing to log: pass --weight and/or --calories".into()));
    }

    let mut entry = WeightLogEntry::new(date.unwrap_or(ctx.today));
    if let Some(w) = weight {
        entry = entry.with_weight(w);
    }
    if let Some(c) = calories {
        entry = entry.with_calories(c);
    }
    entry.validate()?;
    let date = entry.date;
    ctx.stores.log.upsert(entry)?;

    if !ctx.json {
        println!("✓ Logged {}", date);
    }
    react(ctx, StoreChange::Log)
}

fn cmd_import(ctx: &Ctx, path: &Path) -> Result<()> {
    let count = csv_io::import_csv(path, ctx.stores.log.as_ref())?;
    println!("✓ Imported {} entries", count);
    react(ctx, StoreChange::Log)
}

fn cmd_export(ctx: &Ctx, path: &Path) -> Result<()> {
    let entries = ctx.stores.log.query(None)?;
    let count = csv_io::export_csv(&entries, path)?;
    println!("✓ Exported {} entries to {}", count, path.display());
    Ok(())
}

fn cmd_maintenance(ctx: &Ctx) -> Result<()> {
    let entries = ctx.stores.log.query(None)?;
    let estimate =
        MaintenanceEstimator::new(ctx.config.estimator.clone()).estimate(&entries, ctx.today);

    if ctx.json {
        return print_json(&estimate);
    }

    match (estimate.estimate, &estimate.message) {
        (Some(kcal), _) => println!(
            "Maintenance: {} kcal/day ({} days of data)",
            kcal, estimate.qualifying_count
        ),
        (None, Some(message)) => println!("Maintenance unavailable: {}", message),
        (None, None) => println!("Maintenance unavailable"),
    }
    Ok(())
}

fn cmd_goal_set(ctx: &Ctx, args: GoalArgs) -> Result<()> {
    let rate = match (args.rate_kg, args.rate_percent, args.preset) {
        (Some(kg_per_week), _, _) => RateSpec::Flat { kg_per_week },
        (_, Some(percent_per_week), _) => RateSpec::PercentBodyweight { percent_per_week },
        (_, _, Some(preset)) => RateSpec::Preset {
            preset: match preset {
                PresetArg::Gentle => RatePreset::Gentle,
                PresetArg::Moderate => RatePreset::Moderate,
                PresetArg::Aggressive => RatePreset::Aggressive,
            },
        },
        (None, None, None) => RateSpec::Preset {
            preset: RatePreset::Moderate,
        },
    };

    let archetype = match args.archetype {
        ArchetypeArg::TargetWeight => GoalArchetype::TargetWeight,
        ArchetypeArg::Bulk => GoalArchetype::Bulk,
        ArchetypeArg::Cut => GoalArchetype::Cut,
        ArchetypeArg::Maintain => GoalArchetype::Maintain,
    };
    let time_mode = match args.mode {
        ModeArg::ByDate => TimeMode::ByDate,
        ModeArg::ByRate => TimeMode::ByRate,
        ModeArg::ByDuration => TimeMode::ByDuration,
    };

    if archetype == GoalArchetype::TargetWeight && args.target_weight.is_none() {
        return Err(Error::Goal("a target-weight goal needs --target-weight".into()));
    }

    let entries = ctx.stores.log.query(None)?;
    let mut goal = Goal::new(archetype, time_mode, rate).started_on(ctx.today);
    goal.target_weight_kg = args.target_weight;
    goal.target_date = args.target_date;
    goal.duration_weeks = args.duration;
    goal.baseline_maintenance = MaintenanceEstimator::new(ctx.config.estimator.clone())
        .estimate(&entries, ctx.today)
        .estimate;

    ctx.stores.goals.replace(goal.clone())?;
    if ctx.json {
        print_json(&goal)?;
    } else {
        println!("✓ Goal {} saved", goal.id);
    }
    react(ctx, StoreChange::Goal)
}

/// Maintenance from the log, falling back to the goal's baseline
fn maintenance_for(ctx: &Ctx, entries: &[WeightLogEntry], goal: Option<&Goal>) -> Option<i32> {
    MaintenanceEstimator::new(ctx.config.estimator.clone())
        .estimate(entries, ctx.today)
        .estimate
        .or_else(|| goal.and_then(|g| g.baseline_maintenance))
}

fn cmd_goal_show(ctx: &Ctx, overrides: ProjectionOverrides) -> Result<()> {
    let goal = ctx.stores.goals.active()?;
    let entries = ctx.stores.log.query(None)?;
    let current: CurrentWeight = current_weight(&entries, ctx.today, &ctx.config.projection);
    let maintenance = maintenance_for(ctx, &entries, goal.as_ref());

    let projection = GoalProjector::new(ctx.config.projection.clone()).project(
        goal.as_ref(),
        current.weight_kg,
        maintenance,
        &overrides,
        ctx.today,
    );

    if ctx.json {
        return print_json(&projection);
    }

    if goal.is_none() {
        println!("No active goal.");
        return Ok(());
    }

    println!("Current weight: {:.1} kg ({:?})", current.weight_kg, current.source);
    println!("Rate:           {:+.2} kg/week", projection.rate_kg_per_week);
    print_optional("Duration", projection.duration_weeks.map(|w| format!("{:.1} weeks", w)));
    print_optional("Goal date", projection.goal_date.map(|d| d.to_string()));
    print_optional("Final weight", projection.final_weight_kg.map(|w| format!("{:.1} kg", w)));
    print_optional("Change", projection.weight_change_kg.map(|w| format!("{:+.1} kg", w)));
    print_optional("Daily delta", projection.daily_calorie_delta.map(|d| format!("{:+} kcal", d)));
    print_optional("Target", projection.target_calories.map(|t| format!("{} kcal/day", t)));
    for gap in &projection.gaps {
        println!("  ⚠ {}", gap);
    }
    Ok(())
}

fn print_optional(label: &str, value: Option<String>) {
    println!(
        "{:<15} {}",
        format!("{}:", label),
        value.unwrap_or_else(|| "—".into())
    );
}

fn cmd_goal_clear(ctx: &Ctx) -> Result<()> {
    match ctx.stores.goals.active()? {
        Some(goal) => {
            let removed = ctx.stores.segments.clear_for_goal(goal.id)?;
            ctx.stores.goals.clear()?;
            println!("✓ Cleared goal {} and {} segments", goal.id, removed);
        }
        None => println!("No active goal."),
    }
    Ok(())
}

fn cmd_correct(ctx: &Ctx) -> Result<()> {
    let coordinator = CorrectionCoordinator::new(
        ctx.stores.log.clone(),
        ctx.stores.goals.clone(),
        ctx.stores.segments.clone(),
        &ctx.config,
    );

    match coordinator.run_once(ctx.today)? {
        Evaluation::Appended(segment) if ctx.json => print_json(&segment)?,
        Evaluation::Appended(segment) => println!(
            "↻ Plan corrected: {:+.2} kg/week observed {} to {}, new target {} kcal/day",
            segment.rate_per_week, segment.start_date, segment.end_date, segment.target_calories
        ),
        Evaluation::Held => println!("On track, no correction needed."),
        Evaluation::NoActiveGoal => println!("No active goal."),
        Evaluation::Discarded { .. } => println!("Goal changed during evaluation, nothing recorded."),
    }
    Ok(())
}

fn cmd_segments(ctx: &Ctx) -> Result<()> {
    let Some(goal) = ctx.stores.goals.active()? else {
        println!("No active goal.");
        return Ok(());
    };
    let segments = ctx.stores.segments.list_for_goal(goal.id)?;

    if ctx.json {
        return print_json(&segments);
    }

    if segments.is_empty() {
        println!("No corrections yet.");
    }
    for s in &segments {
        println!(
            "{} → {}  {:.1} → {:.1} kg  {:+.2} kg/week  {} kcal/day",
            s.start_date,
            s.end_date,
            s.start_weight_kg,
            s.end_weight_kg,
            s.rate_per_week,
            s.target_calories
        );
    }
    Ok(())
}

fn cmd_timeline(ctx: &Ctx, date: NaiveDate) -> Result<()> {
    let Some(goal) = ctx.stores.goals.active()? else {
        println!("No active goal.");
        return Ok(());
    };
    let entries = ctx.stores.log.query(None)?;
    let Some(start) = baseline(goal.start_date(), &entries, &[]) else {
        println!("No weigh-ins yet.");
        return Ok(());
    };

    let plan = GoalProjector::new(ctx.config.projection.clone()).project(
        Some(&goal),
        start.weight_kg,
        maintenance_for(ctx, &entries, Some(&goal)),
        &ProjectionOverrides::default(),
        start.date,
    );
    let segments = ctx.stores.segments.list_for_goal(goal.id)?;
    let timeline = GoalTimeline::build(start, &plan, &segments);

    if ctx.json {
        return print_json(&timeline);
    }

    print_optional("Target weight", timeline.weight_on(date).map(|w| format!("{:.1} kg", w)));
    print_optional("Target intake", timeline.calories_on(date).map(|c| format!("{} kcal/day", c)));
    Ok(())
}
