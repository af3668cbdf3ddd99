//! tasktree - hierarchical task scheduler
//!
//! CLI entry point for running workload plans under the dashboard.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{CommandFactory, FromArgMatches};
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, error, info};

use tasktree::cli::{Cli, Command, generate_after_help};
use tasktree::config::Config;
use tasktree::monitor::{Alignment, MonitorMode, Section, create_monitor};
use tasktree::plan::{DemoShape, Plan, random_plan, spawn_plan};
use tasktree::scheduler::{LevelCaps, Manager};
use tasktree::task::{Task, TaskState, UNHANDLED_PANIC_EXIT};

const FOOTER_REFRESH: Duration = Duration::from_millis(250);

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tasktree")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > default (INFO)
    let level_str = cli_log_level.or(config_log_level);
    let level = match level_str.map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    };

    let log_file = fs::File::create(log_dir.join("tasktree.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Build command with dynamic after_help that shows terminal and config details
    let cmd = Cli::command().after_help(generate_after_help());
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(caps = ?config.scheduler, mode = ?config.monitor.mode, "tasktree loaded config");

    let settings = RunSettings::resolve(&config, cli.plain, cli.command.caps());

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Run { plan, .. } => {
            debug!(plan = %plan.display(), "main: matched Run command");
            cmd_run(&settings, &plan).await
        }
        Command::Demo {
            branches,
            leaves,
            max_units,
            max_delay_ms,
            seed,
            ..
        } => {
            debug!(branches, leaves, max_units, max_delay_ms, ?seed, "main: matched Demo command");
            let shape = DemoShape {
                branches,
                leaves,
                max_units,
                max_delay_ms,
            };
            cmd_demo(&settings, shape, seed).await
        }
        Command::Check { plan } => {
            debug!(plan = %plan.display(), "main: matched Check command");
            cmd_check(&plan)
        }
    }
}

/// Config after command-line overrides
struct RunSettings {
    caps: LevelCaps,
    mode: MonitorMode,
    probe_interval: Duration,
}

impl RunSettings {
    fn resolve(config: &Config, plain: bool, caps: Option<&[usize]>) -> Self {
        let caps = match caps {
            Some(levels) => LevelCaps::new(levels.to_vec(), config.scheduler.default_cap),
            None => config.scheduler.clone(),
        };
        let mode = if plain { MonitorMode::Plain } else { config.monitor.mode };
        Self {
            caps,
            mode,
            probe_interval: config.monitor.probe_interval(),
        }
    }
}

async fn cmd_run(settings: &RunSettings, path: &Path) -> Result<()> {
    debug!(path = %path.display(), "cmd_run: called");
    let plan = Plan::load(path).context(format!("Failed to load plan {}", path.display()))?;
    run_plan(settings, plan).await
}

async fn cmd_demo(settings: &RunSettings, shape: DemoShape, seed: Option<u64>) -> Result<()> {
    debug!(?shape, ?seed, "cmd_demo: called");
    let plan = random_plan(shape, seed);
    run_plan(settings, plan).await
}

fn cmd_check(path: &Path) -> Result<()> {
    debug!(path = %path.display(), "cmd_check: called");
    let plan = Plan::load(path).context(format!("Failed to load plan {}", path.display()))?;
    println!(
        "{} {}: {} tasks, depth {}",
        "\u{2713}".green(),
        plan.title.bold(),
        plan.task_count(),
        plan.depth()
    );
    Ok(())
}

/// Run a plan under the monitor until every task has finished
async fn run_plan(settings: &RunSettings, plan: Plan) -> Result<()> {
    info!(title = %plan.title, tasks = plan.task_count(), caps = ?settings.caps, "run_plan: starting");
    let started = Instant::now();

    let root = Task::root();
    root.add_panic_listener(|task, message| {
        error!(task = %task.id(), %message, "run_plan: task panicked");
        let _ = crossterm::execute!(io::stdout(), crossterm::cursor::Show);
        eprintln!("{} Task {} panicked: {}", "\u{2717}".red(), task.qualified_name(), message);
        std::process::exit(UNHANDLED_PANIC_EXIT);
    });

    let mut monitor = create_monitor(&root, settings.mode, settings.probe_interval);
    fill_header(monitor.header(), &plan);

    let footer = monitor.footer().clone();
    footer.set_size(1);
    update_footer(&footer, &root, started);
    let refresher = {
        let footer = footer.clone();
        let root = root.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(FOOTER_REFRESH);
            loop {
                ticker.tick().await;
                update_footer(&footer, &root, started);
            }
        })
    };

    spawn_plan(&root, &plan);
    let manager = Manager::create(&root, settings.caps.clone());
    manager.wait().await;

    refresher.abort();
    update_footer(&footer, &root, started);
    monitor.close();

    let counts = StateCounts::of(&root);
    info!(finished = counts.finished, elapsed = ?started.elapsed(), "run_plan: complete");
    println!(
        "{} Finished {} tasks in {:.1}s",
        "\u{2713}".green(),
        counts.finished,
        started.elapsed().as_secs_f64()
    );
    Ok(())
}

fn fill_header(header: &Section, plan: &Plan) {
    header.set_size(2);
    header.set_text(0, Alignment::Left, plan.title.clone());
    header.set_text(0, Alignment::Right, format!("tasktree v{}", env!("CARGO_PKG_VERSION")));
    if let Some(subtitle) = &plan.subtitle {
        header.set_text(1, Alignment::Left, subtitle.clone());
    }
    header.set_text(1, Alignment::Center, format!("{} tasks", plan.task_count()));
    header.set_text(
        1,
        Alignment::Right,
        format!("started {}", chrono::Local::now().format("%H:%M:%S")),
    );
}

fn update_footer(footer: &Section, root: &Task, started: Instant) {
    let counts = StateCounts::of(root);
    let percent = if counts.total() == 0 {
        0
    } else {
        counts.finished * 100 / counts.total()
    };
    footer.set_text(0, Alignment::Left, format!("elapsed {:.1}s", started.elapsed().as_secs_f64()));
    footer.set_text(
        0,
        Alignment::Center,
        format!("{} running, {} queued", counts.running, counts.queued),
    );
    footer.set_text(0, Alignment::Right, format!("{}/{} done ({}%)", counts.finished, counts.total(), percent));
}

/// Tasks below the root by state
#[derive(Debug, Default)]
struct StateCounts {
    queued: usize,
    running: usize,
    finished: usize,
}

impl StateCounts {
    fn of(root: &Task) -> Self {
        let mut counts = Self::default();
        let mut pending = root.children();
        while let Some(task) = pending.pop() {
            match task.state() {
                TaskState::Queued => counts.queued += 1,
                TaskState::Running => counts.running += 1,
                TaskState::Finished => counts.finished += 1,
            }
            pending.extend(task.children());
        }
        counts
    }

    fn total(&self) -> usize {
        self.queued + self.running + self.finished
    }
}
