//! Sheet checker configuration (YAML)
//!
//! The file layout predates this crate and is shared with the notebooks'
//! tooling, which is why keys contain spaces.

use crate::executor::{ExecutorConfig, DEFAULT_ARGS, DEFAULT_NOTEBOOK_DIR, DEFAULT_OUTPUT_DIR, DEFAULT_PROGRAM, DEFAULT_STAGE_TIMEOUT_SECS};
use crate::job::DatasetJob;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tji_common::{Result, TjiError};

// ============================================================================
// Configuration Constants
// ============================================================================

/// SES region used when the email settings omit one.
pub const DEFAULT_EMAIL_REGION: &str = "us-east-1";

/// Configuration shown in the generated command reference
pub const EXAMPLE_CONFIG: &str = r#"Email Settings:
  sender: data@texasjusticeinitiative.org
  recipients:
    - team@texasjusticeinitiative.org

Datasets:
  cdr:
    enabled: true
    sheet key: 1AbCdEf
    cleaning notebooks: [clean_cdr.ipynb, clean_cdr_2.ipynb]
    compression notebooks: [compress_cdr.ipynb]
  ois:
    enabled: false
    sheet key: 2GhIjKl
    sync: true

Runner:
  notebook dir: ../data_cleaning
  stage timeout secs: 600
"#;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SheetCheckerConfig {
    #[serde(rename = "Email Settings")]
    pub email: EmailSettings,

    #[serde(rename = "Datasets")]
    pub datasets: BTreeMap<String, DatasetSettings>,

    #[serde(rename = "Runner", default)]
    pub runner: RunnerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailSettings {
    pub sender: String,
    pub recipients: Vec<String>,
    #[serde(default = "default_email_region")]
    pub region: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetSettings {
    pub enabled: bool,

    #[serde(rename = "sheet key")]
    pub sheet_key: String,

    #[serde(rename = "sheet name", default, skip_serializing_if = "Option::is_none")]
    pub sheet_name: Option<String>,

    #[serde(rename = "cleaning notebooks", default)]
    pub cleaning_notebooks: Vec<String>,

    #[serde(rename = "compression notebooks", default)]
    pub compression_notebooks: Vec<String>,

    #[serde(default)]
    pub force: bool,

    /// Publish to the data catalog after cleaning
    #[serde(default)]
    pub sync: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunnerSettings {
    #[serde(rename = "notebook dir")]
    pub notebook_dir: PathBuf,

    #[serde(rename = "output dir")]
    pub output_dir: PathBuf,

    #[serde(rename = "stage timeout secs")]
    pub stage_timeout_secs: u64,

    pub program: String,

    pub args: Vec<String>,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            notebook_dir: PathBuf::from(DEFAULT_NOTEBOOK_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            stage_timeout_secs: DEFAULT_STAGE_TIMEOUT_SECS,
            program: DEFAULT_PROGRAM.to_string(),
            args: DEFAULT_ARGS.iter().map(|a| a.to_string()).collect(),
        }
    }
}

fn default_email_region() -> String {
    DEFAULT_EMAIL_REGION.to_string()
}

impl SheetCheckerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TjiError::config(format!("The file {} does not exist.", path.display())));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: SheetCheckerConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.email.sender.trim().is_empty() {
            return Err(TjiError::config("Email Settings: sender cannot be empty"));
        }
        if self.email.recipients.is_empty() || self.email.recipients.iter().any(|r| r.trim().is_empty()) {
            return Err(TjiError::config("Email Settings: recipients must be a non-empty list of addresses"));
        }
        if self.runner.stage_timeout_secs == 0 {
            return Err(TjiError::config("Runner: stage timeout secs must be greater than 0"));
        }
        if self.runner.program.trim().is_empty() {
            return Err(TjiError::config("Runner: program cannot be empty"));
        }
        for (key, dataset) in &self.datasets {
            if dataset.sheet_key.trim().is_empty() {
                return Err(TjiError::config(format!("Dataset {}: sheet key cannot be empty", key)));
            }
        }
        Ok(())
    }

    /// Jobs to run, in dataset key order.
    ///
    /// With no selection every enabled dataset is returned. An explicit
    /// selection runs exactly those datasets, enabled or not. `force`
    /// forces every returned job; it never un-forces one.
    pub fn jobs(&self, selected: &[String], force: bool) -> Result<Vec<DatasetJob>> {
        if let Some(unknown) = selected.iter().find(|key| !self.datasets.contains_key(*key)) {
            return Err(TjiError::UnknownDataset(unknown.clone()));
        }

        Ok(self
            .datasets
            .iter()
            .filter(|(key, settings)| {
                if selected.is_empty() {
                    settings.enabled
                } else {
                    selected.contains(*key)
                }
            })
            .map(|(key, settings)| settings.to_job(key, force))
            .collect())
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            notebook_dir: self.runner.notebook_dir.clone(),
            output_dir: self.runner.output_dir.clone(),
            timeout: Duration::from_secs(self.runner.stage_timeout_secs),
            program: self.runner.program.clone(),
            args: self.runner.args.clone(),
        }
    }
}

impl DatasetSettings {
    pub fn to_job(&self, key: &str, force: bool) -> DatasetJob {
        DatasetJob {
            key: key.to_string(),
            sheet_key: self.sheet_key.clone(),
            sheet_name: self.sheet_name.clone(),
            cleaning_stages: self.cleaning_notebooks.clone(),
            compression_stages: self.compression_notebooks.clone(),
            force: self.force || force,
            sync: self.sync,
        }
    }
}
