use anyhow::{Context, Result};
use chrono::Local;
use std::fmt::Write as _;

use paperboy::config::{Config, SourceConfig};
use paperboy::download::DownloadTask;
use paperboy::scheduler::{DispatchLoop, PollTask, SourceScheduler, SystemClock};
use paperboy::sinks::{build_sinks, validate_sinks, SinkFanout};
use paperboy::sources::{Source, SourceRegistry};

/// Start the dispatch loop and run until interrupted
pub async fn run(mut config: Config, selected: Vec<String>) -> Result<()> {
    config.select_sources(&selected)?;
    config.validate()?;

    let fanout = SinkFanout::new(build_sinks(&config.sinks, &config.storage)?);
    if fanout.is_empty() {
        tracing::warn!("No sink configured, downloaded issues are discarded");
    }

    let registry = SourceRegistry::with_builtin();
    let today = Local::now().date_naive();
    let mut entries: Vec<(SourceScheduler, Box<dyn PollTask>)> = Vec::new();

    for source_config in &config.sources {
        let Some(source) = build_source(&registry, source_config, !selected.is_empty())? else {
            continue;
        };
        let scheduler = source_config.scheduler(today)?;
        tracing::info!(
            source = %source_config.name,
            schedule = %scheduler.policy(),
            target = %scheduler.target_date(),
            wait_until = %scheduler.wait_until(),
            "Source scheduled"
        );

        let task = DownloadTask::new(source, fanout.clone())
            .with_staging_dir(config.storage.staging_dir.clone());
        entries.push((scheduler, Box::new(task)));
    }

    let mut dispatch = DispatchLoop::new(entries, SystemClock)
        .context("Every configured source is disabled")?;
    tracing::info!(sources = dispatch.len(), sinks = fanout.len(), "paperboy started");

    tokio::select! {
        never = dispatch.run() => match never {},
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            tracing::info!("Interrupted, stopping");
        }
    }

    Ok(())
}

/// Build a source, disabling it on failure unless it was asked for explicitly
fn build_source(
    registry: &SourceRegistry,
    config: &SourceConfig,
    required: bool,
) -> Result<Option<Box<dyn Source>>> {
    match registry.build(config) {
        Ok(source) => Ok(Some(source)),
        Err(e) if required => {
            Err(e).with_context(|| format!("Cannot enable source '{}'", config.name))
        }
        Err(e) => {
            tracing::info!(source = %config.name, error = %e, "Source disabled");
            Ok(None)
        }
    }
}

/// Print the configured sources and their first target date
pub fn sources(config: &Config) -> Result<()> {
    let registry = SourceRegistry::with_builtin();
    let today = Local::now().date_naive();

    println!("Configured sources");
    println!("==================");
    for source in &config.sources {
        let mut line = format!("{:<24} {:<10}", source.name, source.kind);
        match source.scheduler(today) {
            Ok(scheduler) => {
                let _ = write!(
                    line,
                    " {:<28} next {} (from {})",
                    scheduler.policy().to_string(),
                    scheduler.target_date(),
                    scheduler.wait_until().format("%Y-%m-%d %H:%M:%S")
                );
            }
            Err(e) => {
                let _ = write!(line, " invalid: {e}");
            }
        }
        if let Err(e) = registry.build(source) {
            let _ = write!(line, " [disabled: {e}]");
        }
        println!("{line}");
    }

    Ok(())
}

/// Validate the configuration, building every source and checking every sink
pub fn check(config: &Config) -> Result<()> {
    config.validate()?;

    let registry = SourceRegistry::with_builtin();
    for source in &config.sources {
        registry
            .build(source)
            .with_context(|| format!("Invalid source '{}'", source.name))?;
    }

    validate_sinks(&config.sinks)?;

    println!(
        "Configuration OK: {} source(s), {} sink(s)",
        config.sources.len(),
        config.sinks.len()
    );
    Ok(())
}
