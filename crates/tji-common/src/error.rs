//! Error types shared by the TJI crates

use thiserror::Error;

/// Result type alias for TJI operations
pub type Result<T> = std::result::Result<T, TjiError>;

/// Main error type for the automation pipeline
#[derive(Error, Debug)]
pub enum TjiError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Sheet metadata error: {0}")]
    SheetMetadata(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Unknown dataset: {0}")]
    UnknownDataset(String),
}

impl TjiError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a sheet metadata error
    pub fn sheet_metadata(msg: impl Into<String>) -> Self {
        Self::SheetMetadata(msg.into())
    }

    /// Create a notification error
    pub fn notification(msg: impl Into<String>) -> Self {
        Self::Notification(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            TjiError::config("missing sender").to_string(),
            "Configuration error: missing sender"
        );
        assert_eq!(
            TjiError::UnknownDataset("xyz".to_string()).to_string(),
            "Unknown dataset: xyz"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: TjiError = io.into();
        assert!(matches!(err, TjiError::Io(_)));
    }
}
