//! `sheet-checker status` command implementation
//!
//! Read-only: fetches the same inputs a run would look at and prints them.

use crate::config::SheetCheckerConfig;
use crate::detector::{UpdateCheck, UpdateDetector};
use crate::job::DatasetJob;
use crate::storage::LastRun;
use anyhow::Result;
use std::path::Path;
use tracing::warn;

#[derive(Debug)]
pub struct DatasetStatus {
    pub key: String,
    pub enabled: bool,
    pub check: std::result::Result<UpdateCheck, String>,
    pub force: bool,
}

impl DatasetStatus {
    pub fn would_run(&self) -> bool {
        self.force || self.check.as_ref().map(|c| c.updated).unwrap_or(false)
    }

    pub fn render(&self) -> String {
        let mut out = format!("{}{}\n", self.key, if self.enabled { "" } else { " (disabled)" });
        match &self.check {
            Ok(check) => {
                let last_run = match check.last_run {
                    LastRun::Found(ts) => ts.to_rfc3339(),
                    LastRun::Missing => "never".to_string(),
                    LastRun::Unreadable => "unreadable".to_string(),
                };
                out.push_str(&format!("  Last run:      {}\n", last_run));
                out.push_str(&format!("  Sheet updated: {}\n", check.sheet_modified.to_rfc3339()));
                out.push_str(&format!("  Changed:       {}\n", if check.updated { "yes" } else { "no" }));
            },
            Err(e) => out.push_str(&format!("  Error:         {}\n", e)),
        }
        out.push_str(&format!("  Would run:     {}\n", if self.would_run() { "yes" } else { "no" }));
        out
    }
}

pub async fn collect(detector: &UpdateDetector, jobs: &[DatasetJob], config: &SheetCheckerConfig) -> Vec<DatasetStatus> {
    let mut statuses = Vec::with_capacity(jobs.len());
    for job in jobs {
        let check = detector.check(job).await.map_err(|e| {
            warn!(dataset = %job.key, error = %e, "Status check failed");
            e.to_string()
        });
        statuses.push(DatasetStatus {
            key: job.key.clone(),
            enabled: config.datasets.get(&job.key).map(|d| d.enabled).unwrap_or(false),
            check,
            force: job.force,
        });
    }
    statuses
}

pub async fn run(config_path: &Path, datasets: &[String]) -> Result<()> {
    let config = SheetCheckerConfig::load(config_path)?;
    let keys: Vec<String> = if datasets.is_empty() {
        config.datasets.keys().cloned().collect()
    } else {
        datasets.to_vec()
    };
    let jobs = config.jobs(&keys, false)?;

    let (detector, _) = super::build_detector().await?;
    for status in collect(&detector, &jobs, &config).await {
        print!("{}", status.render());
    }
    Ok(())
}
