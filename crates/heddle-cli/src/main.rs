use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use heddle_core::app::StatusCounts;
use heddle_core::domain::config::{MAX_PARALLEL, MIN_PARALLEL};
use heddle_core::impls::{CommandWorker, JsonTaskStore};
use heddle_core::observer::{
    ObserverSet, ProgressObserver, TaskLogWriter, TaskRunBoard, TracingObserver,
};
use heddle_core::ports::{Clock, TaskStore};
use heddle_core::{RunConfig, SchedulerBuilder, TaskEvent, TaskList};

#[derive(Parser, Debug)]
#[command(name = "heddle")]
#[command(about = "Run a task list: ordered fundamental tasks, then independent tasks in parallel", long_about = None)]
struct Cli {
    /// Task list (JSON array of {name, category, order?, group?, done?})
    tasks: PathBuf,

    /// Run config file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Max independent tasks running at once
    #[arg(long, value_parser = clap::value_parser!(u8).range(MIN_PARALLEL as i64..=MAX_PARALLEL as i64))]
    max_parallel: Option<u8>,

    /// Stop starting new tasks after the first failure
    #[arg(long)]
    fail_fast: bool,

    /// Run independent tasks one at a time
    #[arg(long)]
    no_parallel: bool,

    /// Retries for rate-limited / overloaded tasks (0 disables)
    #[arg(long)]
    max_retries: Option<u32>,

    /// Per-task log directory root
    #[arg(long, default_value = ".heddle/runs")]
    log_dir: PathBuf,

    /// Debug logging (includes task output lines)
    #[arg(short, long)]
    verbose: bool,

    /// Print the run report as JSON instead of the task board
    #[arg(long)]
    json: bool,

    /// Worker command; the task name is appended as the last argument
    #[arg(last = true, required = true)]
    command: Vec<String>,
}

impl Cli {
    fn run_config(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => RunConfig::default(),
        };
        if let Some(n) = self.max_parallel {
            config.max_parallel = usize::from(n);
        }
        if self.fail_fast {
            config.fail_fast = true;
        }
        if self.no_parallel {
            config.parallel = false;
        }
        if let Some(retries) = self.max_retries {
            config.retry = config.retry.with_max_retries(retries)?;
        }
        config.validate()?;
        Ok(config)
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "heddle=debug,heddle_core=debug" } else { "heddle=info,heddle_core=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(2)
        }
    }
}

/// Ok(true) iff no task failed.
async fn run(cli: Cli) -> Result<bool> {
    let config = cli.run_config()?;

    let mut store = JsonTaskStore::new(&cli.tasks);
    let loaded = store
        .load()
        .with_context(|| format!("Failed to load tasks from {}", cli.tasks.display()))?;
    let mut tasks = TaskList::new(loaded)?;

    let (program, args) = cli
        .command
        .split_first()
        .context("No worker command given")?;
    let worker = CommandWorker::new(program, args.iter().cloned());

    let parallel = config.parallel;
    let mut scheduler = SchedulerBuilder::new()
        .worker(Arc::new(worker))
        .config(config)
        .build()?;

    let log_writer = TaskLogWriter::new(&cli.log_dir, scheduler.clock().now());
    tracing::info!("task logs: {}", log_writer.run_dir().display());

    let mut board = TaskRunBoard::for_tasks(&tasks);
    board.set_parallel_mode(parallel);
    let mut observers = ObserverSet::new().with(TracingObserver).with(log_writer);

    let report = {
        let mut both = BoardAndRest {
            board: &mut board,
            rest: &mut observers,
        };
        scheduler.run(&mut tasks, &mut store, &mut both).await?
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(report.success());
    }

    println!("{}", board.render_text());
    println!();
    for (label, names) in [
        ("Completed", report.overall.completed()),
        ("Failed", report.overall.failed()),
        ("Skipped", report.overall.skipped()),
    ] {
        if !names.is_empty() {
            println!("{label}: {}", names.join(", "));
        }
    }
    let counts = StatusCounts::from_tasks(&tasks);
    println!(
        "{} ({} already done before this run)",
        report.overall.summary(),
        counts.completed.saturating_sub(report.overall.completed().len())
    );
    Ok(report.success())
}

/// Keeps the board borrowable after the run so it can be printed.
struct BoardAndRest<'a> {
    board: &'a mut TaskRunBoard,
    rest: &'a mut ObserverSet,
}

impl ProgressObserver for BoardAndRest<'_> {
    fn apply(&mut self, event: &TaskEvent) {
        self.board.apply(event);
        self.rest.apply(event);
    }

    fn render(&mut self) {
        self.board.render();
        self.rest.render();
    }
}
