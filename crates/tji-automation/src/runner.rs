//! Per-dataset run state machine
//!
//! ```text
//! Idle -> Checking -> Skipping ----------------------> Done
//!                  \-> Cleaning -> Compressing ------> Done
//!                          \            \
//!                           `-> Aborted  `-> Aborted
//! ```
//!
//! Every path into `Done` stores "now" as the dataset's watermark, the skip
//! path included. An aborted run leaves the watermark alone so the next
//! scheduled run sees the sheet as changed again.

use crate::detector::UpdateDetector;
use crate::executor::{run_phase, Phase, StageContext, StageError, StageExecutor, StageFlags};
use crate::job::DatasetJob;
use crate::notifier::{Notifier, PhaseOutcome};
use crate::storage::TimestampStore;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tji_common::Result;
use tracing::{debug, error, info, instrument};

/// Source of "now" for watermarks
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Checking,
    Skipping,
    Cleaning,
    Compressing,
    Done,
    Aborted,
}

impl RunState {
    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Idle, Checking)
                | (Checking, Skipping)
                | (Checking, Cleaning)
                | (Skipping, Done)
                | (Cleaning, Compressing)
                | (Cleaning, Aborted)
                | (Compressing, Done)
                | (Compressing, Aborted)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Aborted)
    }
}

impl From<Phase> for RunState {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Cleaning => RunState::Cleaning,
            Phase::Compressing => RunState::Compressing,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    /// Sheet unchanged and not forced; watermark refreshed
    Skipped,
    /// Both phases succeeded; watermark refreshed
    Completed,
    /// A stage failed; watermark untouched
    Aborted { phase: Phase, error: StageError },
}

impl RunOutcome {
    pub fn is_aborted(&self) -> bool {
        matches!(self, RunOutcome::Aborted { .. })
    }
}

struct Machine<'a> {
    dataset: &'a str,
    state: RunState,
}

impl<'a> Machine<'a> {
    fn new(dataset: &'a str) -> Self {
        Self {
            dataset,
            state: RunState::Idle,
        }
    }

    fn advance(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {} -> {}",
            self.state,
            next
        );
        debug!(dataset = %self.dataset, from = %self.state, to = %next, "State transition");
        self.state = next;
    }
}

pub struct Runner {
    detector: UpdateDetector,
    timestamps: TimestampStore,
    executor: Arc<dyn StageExecutor>,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
}

impl Runner {
    pub fn new(
        detector: UpdateDetector,
        timestamps: TimestampStore,
        executor: Arc<dyn StageExecutor>,
        notifier: Notifier,
    ) -> Self {
        Self {
            detector,
            timestamps,
            executor,
            notifier,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Process one dataset.
    ///
    /// Stage failures are reported through [`RunOutcome::Aborted`]; an `Err`
    /// means the run never got past the update check (sheet metadata could
    /// not be fetched) and nothing was changed.
    #[instrument(skip(self, job), fields(dataset = %job.key))]
    pub async fn run(&self, job: &DatasetJob) -> Result<RunOutcome> {
        let mut machine = Machine::new(&job.key);
        machine.advance(RunState::Checking);

        let updated = match self.detector.is_updated(job).await {
            Ok(updated) => updated,
            Err(e) => {
                error!(dataset = %job.key, error = %e, "Could not check sheet for updates");
                return Err(e);
            },
        };

        if !updated && !job.force {
            machine.advance(RunState::Skipping);
            info!(
                dataset = %job.key,
                "Sheet has not been updated since last run. Set force to clean and compress anyway."
            );
            self.finish(&mut machine).await;
            return Ok(RunOutcome::Skipped);
        }

        if updated {
            info!(dataset = %job.key, "Cleaning and compressing...");
        } else {
            info!(dataset = %job.key, "Sheet unchanged but force is set; cleaning and compressing...");
        }

        let ctx = StageContext::new(&job.key, Phase::Cleaning, StageFlags::for_run(job.sync));
        let phases = [
            (Phase::Cleaning, &job.cleaning_stages),
            (Phase::Compressing, &job.compression_stages),
        ];

        for (phase, stages) in phases {
            machine.advance(phase.into());
            let ctx = ctx.with_phase(phase);

            if let Err(error) = run_phase(self.executor.as_ref(), stages, &ctx).await {
                self.notifier
                    .notify(phase, &job.key, &PhaseOutcome::Failure(error.to_string()))
                    .await;
                error!(dataset = %job.key, "{} failed.", phase);
                machine.advance(RunState::Aborted);
                return Ok(RunOutcome::Aborted { phase, error });
            }

            self.notifier.notify(phase, &job.key, &PhaseOutcome::Success).await;
        }

        info!(dataset = %job.key, "Successfully cleaned and compressed data.");
        self.finish(&mut machine).await;
        Ok(RunOutcome::Completed)
    }

    async fn finish(&self, machine: &mut Machine<'_>) {
        machine.advance(RunState::Done);
        self.timestamps.set_last_run(machine.dataset, self.clock.now()).await;
    }
}
