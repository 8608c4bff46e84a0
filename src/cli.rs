//! The command line interface.
pub mod settings;

use crate::log;
use crate::milp;
use crate::orchestrator::Orchestrator;
use crate::output::get_log_dir;
use crate::schedule;
use crate::settings::{Settings, SystemMode};
use crate::source::csv_source::CsvSourceConfig;
use crate::source::rest_source::RestSourceConfig;
use crate::source::DataSource;
use crate::domain::RULE_TIMEKEY_FORMAT;
use crate::error::PlannerError;
use ::log::info;
use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use settings::SettingsSubcommands;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

/// The command line interface.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API, optionally alongside the scheduled trigger.
    Serve {
        /// Address to bind the HTTP API to.
        #[arg(long, default_value = "0.0.0.0:8000")]
        bind: SocketAddr,
    },
    /// Run a single job synchronously against the configured data source and exit.
    Run,
    /// Manage the settings file.
    Settings {
        /// The available subcommands for managing settings.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

/// Parse CLI arguments and start the program.
///
/// Every failure path reports its message to stderr. The `run` subcommand maps its
/// `PlannerError` kind onto a distinct exit code (see `PlannerError::exit_code`) so a
/// caller scripting a batch invocation can branch on infeasibility vs. solver error vs.
/// invalid input without parsing stderr; every other failure (bad settings, a bind
/// error, a crashed server) exits `1`.
pub async fn run_cli() -> ExitCode {
    let cli = Cli::parse();

    let Some(command) = command_or_help(cli.command) else {
        return ExitCode::SUCCESS;
    };

    match command {
        Commands::Serve { bind } => report(handle_serve_command(bind).await),
        Commands::Run => match handle_run_command().await {
            Ok(()) => ExitCode::SUCCESS,
            Err(RunFailure::Bootstrap(e)) => {
                eprintln!("Error: {e:#}");
                ExitCode::FAILURE
            }
            Err(RunFailure::Planner(e)) => {
                eprintln!("Error: {e}");
                ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(255))
            }
        },
        Commands::Settings { subcommand } => report(subcommand.execute()),
    }
}

fn report(result: Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Why a `run` invocation failed: either it never got as far as the core pipeline
/// (settings/logging bootstrap), or the pipeline itself returned a `PlannerError` with
/// a distinct exit code attached.
enum RunFailure {
    Bootstrap(anyhow::Error),
    Planner(PlannerError),
}

impl From<PlannerError> for RunFailure {
    fn from(e: PlannerError) -> Self {
        Self::Planner(e)
    }
}

fn command_or_help(command: Option<Commands>) -> Option<Commands> {
    if command.is_none() {
        let help_str = <Cli as clap::CommandFactory>::command()
            .render_long_help()
            .to_string();
        println!("{help_str}");
    }
    command
}

fn load_settings_and_init_logging() -> Result<Settings> {
    let settings = Settings::load().context("Failed to load settings.")?;
    let log_dir = get_log_dir().context("Failed to create log directory.")?;
    log::init(Some(&settings.log_level), Some(&log_dir)).context("Failed to initialise logging.")?;
    Ok(settings)
}

fn data_source_from_settings(settings: &Settings) -> DataSource {
    match settings.system_mode {
        SystemMode::LocalTest => DataSource::LocalTest,
        SystemMode::Dev => DataSource::Dev(CsvSourceConfig {
            dir: PathBuf::from(&settings.database.dev_dir),
        }),
        SystemMode::Prod => DataSource::Live(RestSourceConfig {
            base_url: settings.database.base_url.clone(),
            api_key: settings.database.api_key.clone(),
        }),
    }
}

async fn handle_serve_command(bind: SocketAddr) -> Result<()> {
    let settings = load_settings_and_init_logging()?;
    let data_source = data_source_from_settings(&settings);
    let orchestrator = Orchestrator::new(
        data_source,
        settings.api.workers,
        settings.optimization.timeout_sec,
    );

    if settings.scheduler.enabled {
        let interval = Duration::from_secs(settings.scheduler.interval_min * 60);
        let trigger_orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            crate::trigger::run(trigger_orchestrator, interval).await;
        });
    }

    info!("listening on {bind}");
    let app = crate::api::router(orchestrator);
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind to {bind}"))?;
    axum::serve(listener, app)
        .await
        .context("HTTP server failed")?;

    Ok(())
}

async fn handle_run_command() -> std::result::Result<(), RunFailure> {
    let settings = load_settings_and_init_logging().map_err(RunFailure::Bootstrap)?;
    let data_source = data_source_from_settings(&settings);

    let bundle = data_source.fetch_inputs().await?;
    info!("loaded input bundle, solving...");

    let solution = milp::solve(&bundle, settings.optimization.timeout_sec)?;
    if !solution.is_success() {
        return Err(PlannerError::Infeasible.into());
    }

    let sched = schedule::reconstruct(&bundle, &solution);
    info!(
        "solved: bottleneck time {} min, {} unmet entries",
        sched.bottleneck_time,
        sched.unmet.len()
    );

    let rule_timekey = Local::now().format(RULE_TIMEKEY_FORMAT).to_string();
    data_source.upload_results(&sched, &rule_timekey).await?;

    Ok(())
}
