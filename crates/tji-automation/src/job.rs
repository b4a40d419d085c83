//! Per-dataset job description


/// Everything the runner needs to process one dataset. Built once per
/// invocation from the YAML config and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetJob {
    pub key: String,
    pub sheet_key: String,
    /// Expected file name of the sheet; checked against Drive when present
    pub sheet_name: Option<String>,
    pub cleaning_stages: Vec<String>,
    pub compression_stages: Vec<String>,
    pub force: bool,
    pub sync: bool,
}

impl DatasetJob {
    pub fn new(key: impl Into<String>, sheet_key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            sheet_key: sheet_key.into(),
            sheet_name: None,
            cleaning_stages: Vec::new(),
            compression_stages: Vec::new(),
            force: false,
            sync: false,
        }
    }

    pub fn with_sheet_name(mut self, name: impl Into<String>) -> Self {
        self.sheet_name = Some(name.into());
        self
    }

    pub fn with_cleaning<I, S>(mut self, stages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cleaning_stages = stages.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_compression<I, S>(mut self, stages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.compression_stages = stages.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }
}
