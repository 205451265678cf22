//! `run`, `status` and `daemon` commands.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use backdrop_core::{ArtifactSlot, BackdropConfig};
use backdrop_imagegen::{Generator, OpenAiImagesProvider};
use backdrop_scheduler::{
    CycleOutcome, JsonStateStore, RunController, RunLock, StateStore, StatusReporter,
};
use chrono::Utc;
use tokio::sync::watch;
use tracing::{error, info, warn};

fn state_store(config: &BackdropConfig) -> Arc<dyn StateStore> {
    Arc::new(JsonStateStore::new(&config.paths.state_file))
}

pub fn build_controller(config: &BackdropConfig) -> Result<RunController> {
    let provider = OpenAiImagesProvider::from_config(&config.generator)
        .context("failed to build HTTP client for the image API")?;
    let generator = Generator::new(
        Arc::new(provider),
        ArtifactSlot::from_config(&config.paths),
        Duration::from_secs(config.generator.timeout_secs),
    );
    Ok(RunController::from_config(
        config,
        state_store(config),
        generator,
    ))
}

fn acquire_lock(config: &BackdropConfig) -> Result<Option<RunLock>> {
    let lock = RunLock::acquire(
        &config.paths.lock_path(),
        Duration::from_secs(config.schedule.lock_stale_secs),
    )?;
    Ok(lock)
}

/// What a `run` invocation did.
#[derive(Debug)]
pub enum RunReport {
    /// Another cycle holds the run lock; nothing was attempted.
    Busy,
    Finished(CycleOutcome),
}

impl RunReport {
    /// Skipped and busy runs succeed; only an attempted, failed cycle does not.
    pub fn is_success(&self) -> bool {
        !matches!(self, RunReport::Finished(outcome) if outcome.is_failure())
    }

    pub fn exit_code(&self) -> ExitCode {
        if self.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}

/// One cycle under the run lock.
pub async fn run_locked(config: &BackdropConfig) -> Result<RunReport> {
    let Some(_lock) = acquire_lock(config)? else {
        warn!("another generation cycle holds the run lock; skipping");
        return Ok(RunReport::Busy);
    };

    let controller = build_controller(config)?;
    Ok(RunReport::Finished(controller.run_cycle(Utc::now()).await))
}

/// One cycle, then exit. Failure of an attempted generation is a non-zero exit.
pub async fn run_once(config: &BackdropConfig) -> Result<ExitCode> {
    info!(
        model = %config.generator.model,
        prompt = %config.generator.prompt,
        interval_hours = config.schedule.interval_hours,
        "starting image generator"
    );

    let report = run_locked(config).await?;
    match &report {
        RunReport::Busy => println!("Another generation cycle is running; skipped"),
        RunReport::Finished(outcome) => print_outcome(outcome),
    }
    Ok(report.exit_code())
}

fn print_outcome(outcome: &CycleOutcome) {
    match outcome {
        CycleOutcome::Generated {
            artifact,
            recorded_at,
            ..
        } => println!(
            "New image generated at {} ({:.1} KB, recorded {})",
            artifact.path.display(),
            artifact.size_bytes as f64 / 1024.0,
            recorded_at.to_rfc3339()
        ),
        CycleOutcome::Skipped { decision } => match decision.hours_remaining {
            Some(h) => println!("Image generation not needed yet: {h:.1} hours remaining"),
            None => println!("Image generation not needed yet"),
        },
        CycleOutcome::Failed { error, .. } => {
            eprintln!("Failed to generate image [{}]: {error}", error.code())
        }
    }
}

pub fn print_status(config: &BackdropConfig, json: bool) -> Result<ExitCode> {
    let reporter = StatusReporter::new(
        state_store(config),
        ArtifactSlot::from_config(&config.paths),
        config.schedule.interval_hours,
    );
    let report = reporter.status(Utc::now());

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render(&config.generator));
    }
    Ok(ExitCode::SUCCESS)
}

/// In-process recurring trigger. Polls every `tick_secs` until Ctrl-C.
pub async fn run_daemon(config: &BackdropConfig, tick_secs: u64) -> Result<ExitCode> {
    let controller = build_controller(config)?;

    let (shutdown_tx, mut shutdown) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = shutdown_tx.send(true);
    });

    info!(tick_secs, "generation daemon started");
    let mut interval = tokio::time::interval(Duration::from_secs(tick_secs.max(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match acquire_lock(config) {
                    Ok(Some(_lock)) => {
                        let outcome = controller.run_cycle(Utc::now()).await;
                        if let CycleOutcome::Failed { error, .. } = &outcome {
                            // The next tick is the retry.
                            warn!(code = error.code(), "cycle failed; will re-check next tick");
                        }
                    }
                    Ok(None) => warn!("run lock busy; skipping tick"),
                    Err(e) => error!("could not take run lock: {e:#}"),
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("generation daemon shutting down");
                    break;
                }
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
