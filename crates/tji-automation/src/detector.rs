//! Decides whether a dataset's sheet changed since the last run

use crate::job::DatasetJob;
use crate::sheets::SheetMetadataSource;
use crate::storage::{LastRun, TimestampStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tji_common::Result;
use tracing::{info, instrument, warn};

/// Inputs and result of one update check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateCheck {
    pub sheet_modified: DateTime<Utc>,
    pub last_run: LastRun,
    pub updated: bool,
}

/// Pure decision rule.
///
/// A missing watermark means "not updated": the first run of a dataset only
/// records a watermark, a full rebuild needs `force`. An unreadable one means
/// "updated", so a storage outage errs toward re-running. Ties count as
/// updated.
pub fn sheet_changed(sheet_modified: DateTime<Utc>, last_run: LastRun) -> bool {
    match last_run {
        LastRun::Found(last) => sheet_modified >= last,
        LastRun::Missing => false,
        LastRun::Unreadable => true,
    }
}

#[derive(Clone)]
pub struct UpdateDetector {
    sheets: Arc<dyn SheetMetadataSource>,
    timestamps: TimestampStore,
}

impl UpdateDetector {
    pub fn new(sheets: Arc<dyn SheetMetadataSource>, timestamps: TimestampStore) -> Self {
        Self { sheets, timestamps }
    }

    /// Metadata errors propagate; watermark problems never do.
    #[instrument(skip(self, job), fields(dataset = %job.key))]
    pub async fn check(&self, job: &DatasetJob) -> Result<UpdateCheck> {
        let sheet_modified = self
            .sheets
            .modified_time(&job.sheet_key, job.sheet_name.as_deref())
            .await?;
        let last_run = self.timestamps.get_last_run(&job.key).await;
        let updated = sheet_changed(sheet_modified, last_run);

        match last_run {
            LastRun::Found(last) => info!(
                dataset = %job.key,
                sheet_modified = %sheet_modified,
                last_run = %last,
                updated,
                "Compared sheet against last run"
            ),
            LastRun::Missing => info!(
                dataset = %job.key,
                "No previous run recorded; treating sheet as unchanged"
            ),
            LastRun::Unreadable => warn!(
                dataset = %job.key,
                "Last run timestamp unavailable; treating sheet as changed"
            ),
        }

        Ok(UpdateCheck {
            sheet_modified,
            last_run,
            updated,
        })
    }

    pub async fn is_updated(&self, job: &DatasetJob) -> Result<bool> {
        Ok(self.check(job).await?.updated)
    }
}
