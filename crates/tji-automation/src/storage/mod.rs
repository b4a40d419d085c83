//! Run watermark storage
//!
//! The sheet checker keeps exactly one value per dataset: the instant its
//! last run finished. Values live in an object store bucket, keyed by the
//! dataset key, and are overwritten on every successful or skipped run.
//!
//! Reads never fail from the caller's point of view. A missing object is the
//! normal first-run case ([`LastRun::Missing`]); anything else that goes wrong
//! is logged and reported as [`LastRun::Unreadable`] so the update detector
//! can decide how to treat it.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::{Credentials, Region},
    error::{DisplayErrorContext, SdkError},
    operation::get_object::GetObjectError,
    primitives::ByteStream,
    Client,
};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, instrument, warn};

pub mod config;

pub use config::StorageConfig;

/// Minimal key-value view of an object store bucket
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the object under `key`; `Ok(None)` when no such object exists
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Overwrite the object under `key`
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<()>;

    /// Human-readable location used in log lines
    fn describe(&self, key: &str) -> String;
}

/// S3 (or S3-compatible) bucket
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub async fn new(config: StorageConfig) -> Result<Self> {
        debug!("Initializing object store with config: {:?}", config);

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let Some(ref creds) = config.credentials {
            loader = loader.credentials_provider(Credentials::new(
                &creds.access_key,
                &creds.secret_key,
                None,
                None,
                "tji-static",
            ));
        }

        let shared = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared).force_path_style(config.path_style);
        if let Some(ref endpoint) = config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        info!(bucket = %config.bucket, "Object store client initialized");

        Ok(Self::from_client(Client::from_conf(builder.build()), config.bucket))
    }

    pub fn from_client(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn is_not_found(err: &SdkError<GetObjectError>) -> bool {
    if err.as_service_error().is_some_and(GetObjectError::is_no_such_key) {
        return true;
    }
    err.raw_response().is_some_and(|r| r.status().as_u16() == 404)
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match response {
            Ok(output) => {
                let data = output
                    .body
                    .collect()
                    .await
                    .context("Failed to read S3 response body")?
                    .into_bytes()
                    .to_vec();
                debug!("Downloaded {} bytes from {}", data.len(), self.describe(key));
                Ok(Some(data))
            },
            Err(err) if is_not_found(&err) => Ok(None),
            Err(err) => Err(anyhow!(
                "Failed to download {}: {}",
                self.describe(key),
                DisplayErrorContext(&err)
            )),
        }
    }

    #[instrument(skip(self, data))]
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("text/plain")
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| anyhow!("Failed to upload {}: {}", self.describe(key), DisplayErrorContext(&e)))?;
        Ok(())
    }

    fn describe(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}

/// In-process store, used by tests and `--dry-run` style tooling
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `get` return an error (simulates an outage)
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `put` return an error
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Raw object contents, bypassing failure injection
    pub fn snapshot(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().ok().and_then(|m| m.get(key).cloned())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(anyhow!("simulated read failure for {}", key));
        }
        let objects = self.objects.lock().map_err(|_| anyhow!("memory store lock poisoned"))?;
        Ok(objects.get(key).cloned())
    }

    async fn put(&self, key: &str, data: Vec<u8>) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("simulated write failure for {}", key));
        }
        let mut objects = self.objects.lock().map_err(|_| anyhow!("memory store lock poisoned"))?;
        objects.insert(key.to_string(), data);
        Ok(())
    }

    fn describe(&self, key: &str) -> String {
        format!("memory://{}", key)
    }
}

/// Result of reading a dataset's watermark
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastRun {
    Found(DateTime<Utc>),
    /// No object under the key: the dataset has never been checked
    Missing,
    /// The store failed or held something that is not a timestamp
    Unreadable,
}

/// Parse a stored watermark.
///
/// Accepts RFC 3339 (what this crate writes) and the offset-less
/// `YYYY-MM-DD HH:MM:SS` form older runs wrote, which is read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Per-dataset watermark on top of an [`ObjectStore`]
#[derive(Clone)]
pub struct TimestampStore {
    store: Arc<dyn ObjectStore>,
}

impl TimestampStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn get_last_run(&self, dataset: &str) -> LastRun {
        let location = self.store.describe(dataset);

        let bytes = match self.store.get(dataset).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                info!(dataset = %dataset, "No timestamp found at {}", location);
                return LastRun::Missing;
            },
            Err(e) => {
                error!(dataset = %dataset, error = %e, "Something went wrong while fetching timestamp");
                return LastRun::Unreadable;
            },
        };

        let raw = String::from_utf8_lossy(&bytes);
        match parse_timestamp(&raw) {
            Some(ts) => {
                debug!(dataset = %dataset, last_run = %ts, "Fetched last run timestamp");
                LastRun::Found(ts)
            },
            None => {
                warn!(dataset = %dataset, value = %raw, "Stored timestamp is not a valid datetime");
                LastRun::Unreadable
            },
        }
    }

    /// Overwrite the watermark. Failures are logged, never returned; the
    /// return value only says whether the write landed.
    #[instrument(skip(self))]
    pub async fn set_last_run(&self, dataset: &str, timestamp: DateTime<Utc>) -> bool {
        let value = timestamp.to_rfc3339_opts(SecondsFormat::Secs, true);
        match self.store.put(dataset, value.clone().into_bytes()).await {
            Ok(()) => {
                info!(dataset = %dataset, timestamp = %value, "Updated {} timestamp", dataset);
                true
            },
            Err(e) => {
                error!(dataset = %dataset, error = %e, "Failed to update timestamp");
                false
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn store() -> (Arc<MemoryObjectStore>, TimestampStore) {
        let memory = Arc::new(MemoryObjectStore::new());
        let timestamps = TimestampStore::new(memory.clone());
        (memory, timestamps)
    }

    #[test]
    fn test_parse_rfc3339_normalizes_offset() {
        let ts = parse_timestamp("2024-01-01T02:00:00+02:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_legacy_format_as_utc() {
        let ts = parse_timestamp("2020-03-04 05:06:07\n").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2020, 3, 4, 5, 6, 7).unwrap());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_timestamp("yesterday-ish").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_s3_describe() {
        let s3 = S3ObjectStore::from_client(
            Client::from_conf(aws_sdk_s3::Config::builder().behavior_version(BehaviorVersion::latest()).build()),
            "tji-timestamps",
        );
        assert_eq!(s3.describe("cdr"), "s3://tji-timestamps/cdr");
        assert_eq!(s3.bucket(), "tji-timestamps");
    }

    #[tokio::test]
    async fn test_missing_key_is_missing() {
        let (_, timestamps) = store();
        assert_eq!(timestamps.get_last_run("cdr").await, LastRun::Missing);
    }

    #[tokio::test]
    async fn test_round_trip_through_store() {
        let (memory, timestamps) = store();
        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap();

        assert!(timestamps.set_last_run("ois", ts).await);
        assert_eq!(memory.snapshot("ois").unwrap(), b"2024-06-01T12:30:00Z".to_vec());
        assert_eq!(timestamps.get_last_run("ois").await, LastRun::Found(ts));
    }

    #[tokio::test]
    async fn test_read_failure_is_unreadable() {
        let (memory, timestamps) = store();
        memory.put("cdr", b"2024-01-01T00:00:00Z".to_vec()).await.unwrap();
        memory.set_fail_reads(true);
        assert_eq!(timestamps.get_last_run("cdr").await, LastRun::Unreadable);
    }

    #[tokio::test]
    async fn test_corrupt_value_is_unreadable() {
        let (memory, timestamps) = store();
        memory.put("cdr", b"not a date".to_vec()).await.unwrap();
        assert_eq!(timestamps.get_last_run("cdr").await, LastRun::Unreadable);
    }

    #[tokio::test]
    async fn test_write_failure_is_absorbed() {
        let (memory, timestamps) = store();
        memory.set_fail_writes(true);
        assert!(!timestamps.set_last_run("cdr", Utc::now()).await);
        assert!(memory.snapshot("cdr").is_none());
    }
}
