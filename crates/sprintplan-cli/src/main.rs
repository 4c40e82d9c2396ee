//! sprintplan CLI - Sprint Planning Engine
//!
//! Loads the configuration documents, pulls the sprint's work items from the
//! tracker (or a JSON snapshot), runs the scheduler and writes the report.
//!
//! Exit codes: 0 when a report was produced (rejections allowed); 1 on
//! configuration, upstream or internal failure.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sprintplan_config::ConfigBundle;
use sprintplan_render::{Renderer, SprintReport, TextRenderer};
use sprintplan_solver::{aggregate_stories, SprintScheduler};
use sprintplan_tracker::{load_snapshot, normalize, TrackerClient};

#[derive(Parser)]
#[command(name = "sprintplan")]
#[command(author, version, about = "Sprint planning engine", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate the configuration documents
    Check {
        /// Configuration directory
        #[arg(value_name = "DIR")]
        config: PathBuf,
    },

    /// Fetch the sprint's work items, schedule them and emit the report
    Schedule {
        /// Configuration directory
        #[arg(value_name = "DIR")]
        config: PathBuf,

        /// Read raw work items from a JSON snapshot instead of the tracker
        #[arg(long, value_name = "FILE")]
        snapshot: Option<PathBuf>,

        /// Personal access token for the tracker
        #[arg(long, env = "SPRINTPLAN_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Output directory (overrides setup.toml)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Print the report to stdout instead of writing files
        #[arg(long)]
        stdout: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match cli.verbose {
            0 => "sprintplan=warn",
            1 => "sprintplan=info",
            _ => "sprintplan=debug",
        })
    });
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    match cli.command {
        Commands::Check { config } => run_check(&config),
        Commands::Schedule {
            config,
            snapshot,
            token,
            output,
            format,
            stdout,
        } => run_schedule(&config, snapshot, token, output, &format, stdout),
    }
}

fn run_check(config_dir: &std::path::Path) -> Result<()> {
    let bundle = ConfigBundle::load(config_dir)
        .with_context(|| format!("loading configuration from {}", config_dir.display()))?;

    println!(
        "ok: sprint {} ({} .. {}), {} executors, {} day-offs, {} dependency edges",
        bundle.setup.sprint.name,
        bundle.setup.sprint.start,
        bundle.setup.sprint.end,
        bundle.executors.len(),
        bundle.dayoffs.len(),
        bundle.dependencies.values().map(Vec::len).sum::<usize>(),
    );
    Ok(())
}

fn run_schedule(
    config_dir: &std::path::Path,
    snapshot: Option<PathBuf>,
    token: Option<String>,
    output: Option<PathBuf>,
    format: &str,
    to_stdout: bool,
) -> Result<()> {
    let bundle = ConfigBundle::load(config_dir)
        .with_context(|| format!("loading configuration from {}", config_dir.display()))?;
    let sprint = &bundle.setup.sprint;

    // The whole snapshot is in memory before scheduling starts; a fetch
    // failure aborts here and nothing is scheduled.
    let items = match snapshot {
        Some(path) => load_snapshot(&path)
            .with_context(|| format!("reading snapshot {}", path.display()))?,
        None => {
            let Some(token) = token else {
                bail!("no tracker token: set SPRINTPLAN_TOKEN or pass --token (or use --snapshot)");
            };
            let client = TrackerClient::new(&bundle.setup.tracker.base_url, token)
                .context("building tracker client")?;
            client
                .fetch_work_items(&bundle.setup.tracker.area_path, &sprint.name)
                .context("fetching work items from the tracker")?
        }
    };

    let backlog = normalize(&items);
    info!(
        tasks = backlog.tasks.len(),
        stories = backlog.stories.len(),
        "normalized upstream snapshot"
    );

    let scheduler = SprintScheduler::new(
        sprint,
        &bundle.executors,
        &bundle.dayoffs,
        bundle.dependencies.clone(),
    );
    let schedule = scheduler
        .schedule(&backlog.tasks)
        .context("scheduling the sprint")?;
    let summaries = aggregate_stories(&backlog.stories, &backlog.tasks, &schedule);
    let report = SprintReport::assemble(
        sprint,
        &backlog.tasks,
        &summaries,
        &schedule,
        &bundle.dayoffs,
    );

    let (rendered, extension) = match format {
        "text" => (TextRenderer::new().render(&report)?, "txt"),
        "json" => (serde_json::to_string_pretty(&report)?, "json"),
        other => bail!("unsupported output format: {other} (expected text or json)"),
    };

    if to_stdout {
        println!("{rendered}");
    } else {
        let out_dir = output.unwrap_or_else(|| bundle.setup.output_dir.clone());
        fs::create_dir_all(&out_dir)
            .with_context(|| format!("creating output directory {}", out_dir.display()))?;
        let path = out_dir.join(format!("{}-report.{extension}", sprint.name));
        fs::write(&path, rendered)
            .with_context(|| format!("writing report to {}", path.display()))?;
        println!("report written to {}", path.display());
    }

    println!(
        "{} placed, {} rejected across {} stories",
        report.placements.len(),
        report.rejections_flat().len(),
        report.stories.len(),
    );
    Ok(())
}
