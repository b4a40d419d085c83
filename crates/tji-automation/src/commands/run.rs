//! `sheet-checker run` command implementation

use crate::config::SheetCheckerConfig;
use crate::executor::Phase;
use crate::job::DatasetJob;
use crate::runner::{RunOutcome, Runner};
use anyhow::{anyhow, Context, Result};
use std::path::Path;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// What happened to each dataset in one invocation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub completed: Vec<String>,
    pub skipped: Vec<String>,
}

/// Run jobs one after another, stopping at the first dataset that errors
/// or aborts.
pub async fn run_jobs(runner: &Runner, jobs: &[DatasetJob]) -> Result<RunReport> {
    let mut report = RunReport::default();

    for job in jobs {
        let outcome = runner
            .run(job)
            .await
            .with_context(|| format!("Exiting: could not check {} for updates", job.key))?;

        match outcome {
            RunOutcome::Completed => report.completed.push(job.key.clone()),
            RunOutcome::Skipped => report.skipped.push(job.key.clone()),
            RunOutcome::Aborted { phase, error } => {
                let action = match phase {
                    Phase::Cleaning => "cleaning",
                    Phase::Compressing => "compressing",
                };
                return Err(anyhow!(
                    "Exiting: encountered an issue while {} {}: {}",
                    action,
                    job.key,
                    error
                ));
            },
        }
    }

    Ok(report)
}

pub async fn run(config_path: &Path, datasets: &[String], force: bool) -> Result<()> {
    let config = SheetCheckerConfig::load(config_path)?;
    let jobs = config.jobs(datasets, force)?;

    if jobs.is_empty() {
        println!("No enabled datasets in {}", config_path.display());
        return Ok(());
    }

    let runner = super::build_runner(&config).await?;

    let span = info_span!("sheet_check", run_id = %Uuid::new_v4());
    let report = run_jobs(&runner, &jobs).instrument(span).await?;

    info!(
        completed = report.completed.len(),
        skipped = report.skipped.len(),
        "Sheet check finished"
    );
    for key in &report.completed {
        println!("{}: cleaned and compressed", key);
    }
    for key in &report.skipped {
        println!("{}: unchanged, skipped", key);
    }

    Ok(())
}
