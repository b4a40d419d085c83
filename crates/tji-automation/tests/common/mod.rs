//! Shared fakes for runner integration tests
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tji_automation::detector::UpdateDetector;
use tji_automation::executor::{Phase, StageArtifact, StageContext, StageError, StageExecutor};
use tji_automation::notifier::{MessageSender, Notification, Notifier};
use tji_automation::runner::{FixedClock, Runner};
use tji_automation::sheets::SheetMetadataSource;
use tji_automation::storage::{MemoryObjectStore, ObjectStore, TimestampStore};
use tji_automation::DatasetJob;
use tji_common::{Result, TjiError};

pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
}

/// Instant every test run "finishes" at
pub fn now() -> DateTime<Utc> {
    utc(2024, 7, 4, 12, 0, 0)
}

/// Sheet metadata with a settable modification time; `None` fails the fetch
#[derive(Default)]
pub struct FakeSheets {
    modified: Mutex<Option<DateTime<Utc>>>,
}

impl FakeSheets {
    pub fn set(&self, modified: Option<DateTime<Utc>>) {
        *self.modified.lock().unwrap() = modified;
    }
}

#[async_trait]
impl SheetMetadataSource for FakeSheets {
    async fn modified_time(&self, sheet_key: &str, _sheet_name: Option<&str>) -> Result<DateTime<Utc>> {
        let modified = *self.modified.lock().unwrap();
        modified.ok_or_else(|| TjiError::sheet_metadata(format!("Drive unavailable for {}", sheet_key)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Exit,
    Timeout,
}

/// Records every stage it is asked to run; fails the configured ones
#[derive(Default)]
pub struct ScriptedExecutor {
    calls: Mutex<Vec<(Phase, String, StageContext)>>,
    failures: Mutex<HashMap<String, Failure>>,
}

impl ScriptedExecutor {
    pub fn fail(&self, stage: &str, failure: Failure) {
        self.failures.lock().unwrap().insert(stage.to_string(), failure);
    }

    pub fn ran(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(_, s, _)| s.clone()).collect()
    }

    pub fn contexts(&self) -> Vec<StageContext> {
        self.calls.lock().unwrap().iter().map(|(_, _, c)| c.clone()).collect()
    }
}

#[async_trait]
impl StageExecutor for ScriptedExecutor {
    async fn run_stage(&self, stage_id: &str, ctx: &StageContext) -> std::result::Result<StageArtifact, StageError> {
        self.calls
            .lock()
            .unwrap()
            .push((ctx.phase, stage_id.to_string(), ctx.clone()));

        match self.failures.lock().unwrap().get(stage_id) {
            Some(Failure::Exit) => Err(StageError::Failed {
                stage: stage_id.to_string(),
                code: Some(1),
                stderr: "CellExecutionError".to_string(),
            }),
            Some(Failure::Timeout) => Err(StageError::Timeout {
                stage: stage_id.to_string(),
                secs: 600,
            }),
            None => Ok(StageArtifact {
                stage: stage_id.to_string(),
                output: format!("output_notebooks/{}_result_nb.ipynb", stage_id).into(),
                log: format!("output_notebooks/{}_result_nb.log", stage_id).into(),
                duration: std::time::Duration::from_millis(1),
            }),
        }
    }
}

/// Captures outgoing mail; when failing, every send is attempted and rejected
#[derive(Default)]
pub struct Outbox {
    sent: Mutex<Vec<Notification>>,
    failing: AtomicBool,
    attempts: AtomicUsize,
}

impl Outbox {
    pub fn subjects(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|n| n.subject.clone()).collect()
    }

    pub fn messages(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageSender for Outbox {
    async fn send(&self, message: &Notification) -> Result<Option<String>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(TjiError::notification(format!("SES rejected \"{}\"", message.subject)));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(None)
    }
}

pub struct Harness {
    pub store: Arc<MemoryObjectStore>,
    pub timestamps: TimestampStore,
    pub sheets: Arc<FakeSheets>,
    pub executor: Arc<ScriptedExecutor>,
    pub outbox: Arc<Outbox>,
    pub runner: Runner,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryObjectStore::new());
        let timestamps = TimestampStore::new(store.clone());
        let sheets = Arc::new(FakeSheets::default());
        let executor = Arc::new(ScriptedExecutor::default());
        let outbox = Arc::new(Outbox::default());

        let detector = UpdateDetector::new(sheets.clone(), timestamps.clone());
        let notifier = Notifier::new(
            "TJI Data <data@texasjusticeinitiative.org>",
            vec!["team@texasjusticeinitiative.org".to_string()],
            outbox.clone(),
        );
        let runner = Runner::new(detector, timestamps.clone(), executor.clone(), notifier)
            .with_clock(Arc::new(FixedClock(now())));

        Self {
            store,
            timestamps,
            sheets,
            executor,
            outbox,
            runner,
        }
    }

    pub fn detector(&self) -> UpdateDetector {
        UpdateDetector::new(self.sheets.clone(), self.timestamps.clone())
    }

    pub async fn store_raw(&self, dataset: &str, value: &str) {
        self.store.put(dataset, value.as_bytes().to_vec()).await.unwrap();
    }

    pub fn stored(&self, dataset: &str) -> Option<String> {
        self.store
            .snapshot(dataset)
            .map(|b| String::from_utf8(b).unwrap())
    }
}

/// A three-notebook cleaning phase and a one-notebook compression phase
pub fn cdr_job() -> DatasetJob {
    DatasetJob::new("cdr", "1CdrSheetKey")
        .with_cleaning(["clean_1.ipynb", "clean_2.ipynb", "clean_3.ipynb"])
        .with_compression(["compress.ipynb"])
}
