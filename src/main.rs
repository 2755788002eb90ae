//! pigroup CLI entry point

use anyhow::{Context, Result};
use pigroup::config::{cli::Cli, toml::build_config, validator::validate_config, Config};
use pigroup::output::{json, text};
use pigroup::run::{
    launch_group, Coordinator, CoordinatorSettings, FixedIntent, IntentSource, PromptIntent,
    StopSignal,
};
use pigroup::stats::RunSummary;
use pigroup::view::{CsvPointView, HeadlessView, PointView};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    println!("pigroup v{}", env!("CARGO_PKG_VERSION"));
    println!("Group-coordinated Monte Carlo estimation of pi");
    println!();

    // Parse CLI arguments
    let cli = Cli::parse_args();
    cli.validate()?;

    // Build configuration from config file and CLI
    let config = build_config(&cli)?;
    init_logging(&config);

    validate_config(&config).context("Configuration validation failed")?;
    text::print_configuration(&config);

    if config.runtime.dry_run {
        println!("Dry run mode - configuration validated successfully");
        return Ok(());
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    let result = runtime.block_on(run(&config));

    // A prompt still blocked on stdin must not hold the process open
    runtime.shutdown_timeout(Duration::from_millis(100));

    let summary = result?;
    if let Some(path) = &config.output.json_output {
        let report = json::build_run_report(&summary, json::local_hostname());
        json::write_json_output(path, &report, true)
            .with_context(|| format!("Failed to write JSON output: {}", path.display()))?;
        println!("JSON report written to {}", path.display());
    }

    Ok(())
}

fn init_logging(config: &Config) {
    let level = if config.runtime.debug {
        "debug"
    } else {
        config.runtime.log_level.as_str()
    };

    let filter = tracing_subscriber::filter::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::filter::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(config: &Config) -> Result<RunSummary> {
    let stop = StopSignal::new();
    spawn_interrupt_handler(stop.clone());

    let intent: Box<dyn IntentSource> = match (config.run.mode, config.run.points) {
        (Some(mode), Some(points)) => Box::new(FixedIntent::new(mode, points)),
        (mode, points) => Box::new(PromptIntent::stdio().with_mode(mode).with_points(points)),
    };

    let view: Box<dyn PointView> = match &config.output.points_output {
        Some(path) => Box::new(CsvPointView::new(path)),
        None => Box::new(HeadlessView::new()),
    };

    let coordinator = Coordinator::new(
        intent,
        view,
        stop,
        CoordinatorSettings::from_config(config),
    );

    println!("[Root] Program Started.");
    let outcome = launch_group(config.group.size, config.group.heartbeat(), coordinator).await?;

    for failure in &outcome.failures {
        eprintln!("Warning: rank {} did not finish: {:#}", failure.rank, failure.error);
    }

    Ok(outcome.summary)
}

/// Raise `stop` on Ctrl-C; the run ends at the next decision
fn spawn_interrupt_handler(stop: StopSignal) {
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("failed to listen for Ctrl-C: {}", e);
                return;
            }

            if stop.is_raised() {
                println!();
                println!("[Root] Stop already requested, finishing the current round.");
            } else {
                println!();
                println!("[Root] Simulation interrupted.");
                stop.raise();
            }
        }
    });
}
