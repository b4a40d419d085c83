//! Notebook stage execution
//!
//! A phase is an ordered list of notebooks. Each notebook is run as an
//! external process (by default `jupyter nbconvert --execute`) with a
//! bounded timeout. Whatever the process printed is saved under the output
//! directory on every exit path, so a failed run always leaves the partially
//! executed notebook and its log behind for inspection.
//!
//! Per-dataset switches the notebooks read (`CLEAN_<DATASET>_S3` and
//! friends) are set on the child process only; the runner's own environment
//! is never touched.

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, error, info, instrument, warn};

// ============================================================================
// Executor Constants
// ============================================================================

/// Per-stage limit, matching the notebook execution timeout the cron job
/// has always used.
pub const DEFAULT_STAGE_TIMEOUT_SECS: u64 = 600;

pub const DEFAULT_NOTEBOOK_DIR: &str = "../data_cleaning";

pub const DEFAULT_OUTPUT_DIR: &str = "output_notebooks";

pub const DEFAULT_PROGRAM: &str = "jupyter";

pub const DEFAULT_ARGS: &[&str] = &[
    "nbconvert",
    "--to",
    "notebook",
    "--execute",
    "--stdout",
    "--ExecutePreprocessor.kernel_name=python3",
];

/// How long to keep draining pipes after the child is gone.
const PIPE_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Lines of stderr carried in a failure error.
const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Cleaning,
    Compressing,
}

impl Phase {
    /// Short form used in artifact file names
    pub fn slug(&self) -> &'static str {
        match self {
            Phase::Cleaning => "clean",
            Phase::Compressing => "compress",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Cleaning => write!(f, "Cleaning"),
            Phase::Compressing => write!(f, "Compressing"),
        }
    }
}

/// Switches exported to notebooks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StageFlags {
    /// Publish cleaned data to the data catalog (`CLEAN_<DS>_DW`)
    pub sync_catalog: bool,
    /// Upload cleaned data to object storage (`CLEAN_<DS>_S3`)
    pub clean_to_object_store: bool,
    /// Upload compressed data to object storage (`COMPRESS_<DS>_S3`)
    pub compress_to_object_store: bool,
}

impl StageFlags {
    /// Flags for a full run: object storage always, catalog when `sync`
    pub fn for_run(sync: bool) -> Self {
        Self {
            sync_catalog: sync,
            clean_to_object_store: true,
            compress_to_object_store: true,
        }
    }

    /// Environment variables for a child process. Disabled flags are left
    /// unset rather than set to a false value.
    pub fn env_vars(&self, dataset: &str) -> Vec<(String, &'static str)> {
        let dataset = dataset.to_uppercase();
        [
            (self.sync_catalog, format!("CLEAN_{}_DW", dataset)),
            (self.clean_to_object_store, format!("CLEAN_{}_S3", dataset)),
            (self.compress_to_object_store, format!("COMPRESS_{}_S3", dataset)),
        ]
        .into_iter()
        .filter(|(enabled, _)| *enabled)
        .map(|(_, name)| (name, "TRUE"))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageContext {
    pub dataset: String,
    pub phase: Phase,
    pub flags: StageFlags,
}

impl StageContext {
    pub fn new(dataset: impl Into<String>, phase: Phase, flags: StageFlags) -> Self {
        Self {
            dataset: dataset.into(),
            phase,
            flags,
        }
    }

    pub fn with_phase(&self, phase: Phase) -> Self {
        Self {
            phase,
            ..self.clone()
        }
    }
}

/// Files left behind by a finished stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageArtifact {
    pub stage: String,
    pub output: PathBuf,
    pub log: PathBuf,
    pub duration: Duration,
}

#[derive(Error, Debug)]
pub enum StageError {
    #[error("Notebook not found: {}", .0.display())]
    NotebookNotFound(PathBuf),

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Stage {stage} exited with {}: {stderr}", code.map_or_else(|| "a signal".to_string(), |c| format!("status {}", c)))]
    Failed {
        stage: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Stage {stage} timed out after {secs}s")]
    Timeout { stage: String, secs: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait StageExecutor: Send + Sync {
    async fn run_stage(&self, stage_id: &str, ctx: &StageContext) -> Result<StageArtifact, StageError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    pub notebook_dir: PathBuf,
    pub output_dir: PathBuf,
    pub timeout: Duration,
    pub program: String,
    /// Arguments placed before the notebook path
    pub args: Vec<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            notebook_dir: PathBuf::from(DEFAULT_NOTEBOOK_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            timeout: Duration::from_secs(DEFAULT_STAGE_TIMEOUT_SECS),
            program: DEFAULT_PROGRAM.to_string(),
            args: DEFAULT_ARGS.iter().map(|a| a.to_string()).collect(),
        }
    }
}

pub struct NotebookExecutor {
    config: ExecutorConfig,
}

impl NotebookExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// `<output_dir>/<dataset>_<phase>_<stem>_result_nb.ipynb` and the
    /// matching `.log`
    pub fn artifact_paths(&self, stage_id: &str, ctx: &StageContext) -> (PathBuf, PathBuf) {
        let stem = Path::new(stage_id)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| stage_id.to_string());
        let base = format!("{}_{}_{}_result_nb", ctx.dataset, ctx.phase.slug(), stem);
        (
            self.config.output_dir.join(format!("{}.ipynb", base)),
            self.config.output_dir.join(format!("{}.log", base)),
        )
    }
}

async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        if let Err(e) = pipe.read_to_end(&mut buf).await {
            debug!("Stopped reading child pipe: {}", e);
        }
    }
    buf
}

async fn collect(task: tokio::task::JoinHandle<Vec<u8>>) -> Vec<u8> {
    let abort = task.abort_handle();
    match tokio::time::timeout(PIPE_DRAIN_GRACE, task).await {
        Ok(Ok(buf)) => buf,
        Ok(Err(_)) => Vec::new(),
        Err(_) => {
            abort.abort();
            Vec::new()
        },
    }
}

fn tail(bytes: &[u8], lines: usize) -> String {
    let text = String::from_utf8_lossy(bytes);
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

#[async_trait]
impl StageExecutor for NotebookExecutor {
    #[instrument(skip(self, ctx), fields(dataset = %ctx.dataset, phase = %ctx.phase))]
    async fn run_stage(&self, stage_id: &str, ctx: &StageContext) -> Result<StageArtifact, StageError> {
        let notebook = self.config.notebook_dir.join(stage_id);
        if !tokio::fs::try_exists(&notebook).await.unwrap_or(false) {
            return Err(StageError::NotebookNotFound(notebook));
        }

        tokio::fs::create_dir_all(&self.config.output_dir).await?;
        let (output, log) = self.artifact_paths(stage_id, ctx);

        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.args)
            .arg(stage_id)
            .current_dir(&self.config.notebook_dir)
            .envs(ctx.flags.env_vars(&ctx.dataset))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let started = Instant::now();
        let mut child = command.spawn().map_err(|source| StageError::Spawn {
            program: self.config.program.clone(),
            source,
        })?;

        let stdout_task = tokio::spawn(drain(child.stdout.take()));
        let stderr_task = tokio::spawn(drain(child.stderr.take()));

        let waited = tokio::time::timeout(self.config.timeout, child.wait()).await;
        let outcome = match waited {
            Ok(Ok(status)) if status.success() => Ok(()),
            Ok(Ok(status)) => Err(status.code()),
            Ok(Err(e)) => {
                error!(stage = %stage_id, "Waiting on notebook process failed: {}", e);
                Err(None)
            },
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!(stage = %stage_id, "Failed to kill timed out notebook process: {}", e);
                }
                let stdout = collect(stdout_task).await;
                let stderr = collect(stderr_task).await;
                self.write_artifacts(&output, &stdout, &log, &stderr).await;
                return Err(StageError::Timeout {
                    stage: stage_id.to_string(),
                    secs: self.config.timeout.as_secs(),
                });
            },
        };

        let stdout = collect(stdout_task).await;
        let stderr = collect(stderr_task).await;
        let written = self.write_artifacts(&output, &stdout, &log, &stderr).await;

        match outcome {
            Ok(()) => {
                written?;
                let duration = started.elapsed();
                info!(stage = %stage_id, output = %output.display(), "Notebook finished in {:.1}s", duration.as_secs_f64());
                Ok(StageArtifact {
                    stage: stage_id.to_string(),
                    output,
                    log,
                    duration,
                })
            },
            Err(code) => {
                info!(
                    stage = %stage_id,
                    "Error executing the notebook. See notebook \"{}\" for the traceback.",
                    output.display()
                );
                Err(StageError::Failed {
                    stage: stage_id.to_string(),
                    code,
                    stderr: tail(&stderr, STDERR_TAIL_LINES),
                })
            },
        }
    }
}

impl NotebookExecutor {
    async fn write_artifacts(&self, output: &Path, stdout: &[u8], log: &Path, stderr: &[u8]) -> std::io::Result<()> {
        let result = async {
            tokio::fs::write(output, stdout).await?;
            tokio::fs::write(log, stderr).await
        }
        .await;
        if let Err(ref e) = result {
            warn!(output = %output.display(), "Failed to write stage artifacts: {}", e);
        }
        result
    }
}

/// Run `stages` in order, stopping at the first failure.
pub async fn run_phase(
    executor: &dyn StageExecutor,
    stages: &[String],
    ctx: &StageContext,
) -> Result<Vec<StageArtifact>, StageError> {
    let mut artifacts = Vec::with_capacity(stages.len());
    for (index, stage) in stages.iter().enumerate() {
        info!(
            dataset = %ctx.dataset,
            phase = %ctx.phase,
            stage = %stage,
            "Running stage {}/{}",
            index + 1,
            stages.len()
        );
        match executor.run_stage(stage, ctx).await {
            Ok(artifact) => artifacts.push(artifact),
            Err(e) => {
                error!(dataset = %ctx.dataset, phase = %ctx.phase, stage = %stage, error = %e, "Stage failed");
                return Err(e);
            },
        }
    }
    Ok(artifacts)
}
