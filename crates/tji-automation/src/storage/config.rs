use std::env;

/// Bucket the nightly cron job has always written watermarks to.
pub const DEFAULT_TIMESTAMP_BUCKET: &str = "tji-timestamps";

/// Region used when neither `S3_REGION` nor `AWS_REGION` is set.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Static access key pair for S3-compatible endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticCredentials {
    pub access_key: String,
    pub secret_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    /// When absent the default AWS provider chain is used (instance profile
    /// on the cron host, `~/.aws/credentials` locally).
    pub credentials: Option<StaticCredentials>,
    pub path_style: bool,
}

impl StorageConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let access_key = env::var("S3_ACCESS_KEY").or_else(|_| env::var("AWS_ACCESS_KEY_ID"));
        let secret_key = env::var("S3_SECRET_KEY").or_else(|_| env::var("AWS_SECRET_ACCESS_KEY"));

        let credentials = match (access_key, secret_key) {
            (Ok(access_key), Ok(secret_key)) => Some(StaticCredentials {
                access_key,
                secret_key,
            }),
            (Ok(_), Err(_)) | (Err(_), Ok(_)) => {
                anyhow::bail!("S3 access key and secret key must be set together")
            },
            (Err(_), Err(_)) => None,
        };

        let bucket = env::var("TIMESTAMP_BUCKET").unwrap_or_else(|_| DEFAULT_TIMESTAMP_BUCKET.to_string());
        if bucket.trim().is_empty() {
            anyhow::bail!("TIMESTAMP_BUCKET cannot be empty");
        }

        Ok(Self {
            endpoint: env::var("S3_ENDPOINT").ok().filter(|e| !e.is_empty()),
            region: env::var("S3_REGION")
                .or_else(|_| env::var("AWS_REGION"))
                .unwrap_or_else(|_| DEFAULT_REGION.to_string()),
            bucket,
            credentials,
            path_style: env::var("S3_PATH_STYLE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        })
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: DEFAULT_REGION.to_string(),
            bucket: DEFAULT_TIMESTAMP_BUCKET.to_string(),
            credentials: None,
            path_style: false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "S3_ACCESS_KEY",
        "S3_SECRET_KEY",
        "AWS_ACCESS_KEY_ID",
        "AWS_SECRET_ACCESS_KEY",
        "TIMESTAMP_BUCKET",
        "S3_ENDPOINT",
        "S3_REGION",
        "AWS_REGION",
        "S3_PATH_STYLE",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_from_env_defaults_to_provider_chain() {
        clear_env();
        let config = StorageConfig::from_env().unwrap();
        assert_eq!(config, StorageConfig::default());
    }

    #[test]
    #[serial]
    fn test_from_env_reads_static_credentials() {
        clear_env();
        std::env::set_var("S3_ACCESS_KEY", "key");
        std::env::set_var("S3_SECRET_KEY", "secret");
        std::env::set_var("TIMESTAMP_BUCKET", "staging-timestamps");
        std::env::set_var("S3_PATH_STYLE", "true");

        let config = StorageConfig::from_env().unwrap();
        assert_eq!(config.bucket, "staging-timestamps");
        assert!(config.path_style);
        assert_eq!(
            config.credentials,
            Some(StaticCredentials {
                access_key: "key".to_string(),
                secret_key: "secret".to_string(),
            })
        );
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_half_credentials() {
        clear_env();
        std::env::set_var("S3_ACCESS_KEY", "key");
        assert!(StorageConfig::from_env().is_err());
        clear_env();
    }
}
