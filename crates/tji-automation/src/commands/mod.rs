//! Command implementations for the `sheet-checker` binary

pub mod run;
pub mod status;

use crate::config::SheetCheckerConfig;
use crate::detector::UpdateDetector;
use crate::executor::NotebookExecutor;
use crate::notifier::{Notifier, SesSender};
use crate::runner::Runner;
use crate::sheets::DriveClient;
use crate::storage::{S3ObjectStore, StorageConfig, TimestampStore};
use anyhow::{Context, Result};
use std::sync::Arc;

/// Production wiring: S3 watermarks, Drive metadata
pub async fn build_detector() -> Result<(UpdateDetector, TimestampStore)> {
    let storage_config = StorageConfig::from_env().context("Invalid object storage settings")?;
    let store = S3ObjectStore::new(storage_config).await?;
    let timestamps = TimestampStore::new(Arc::new(store));

    let drive = DriveClient::from_env().context("Invalid Google Drive settings")?;
    Ok((UpdateDetector::new(Arc::new(drive), timestamps.clone()), timestamps))
}

/// Production wiring for a full run: adds SES and the notebook executor
pub async fn build_runner(config: &SheetCheckerConfig) -> Result<Runner> {
    let (detector, timestamps) = build_detector().await?;

    let sender = SesSender::new(&config.email.region).await;
    let notifier = Notifier::new(
        config.email.sender.clone(),
        config.email.recipients.clone(),
        Arc::new(sender),
    );

    let executor = NotebookExecutor::new(config.executor_config());
    Ok(Runner::new(detector, timestamps, Arc::new(executor), notifier))
}
