//! Spreadsheet metadata via the Google Drive v3 API
//!
//! Only one fact about a sheet matters to the runner: when it was last
//! modified. [`DriveClient`] fetches the file resource with a narrow field
//! mask and, when the job names the sheet, verifies the name so a mistyped
//! key in the config cannot silently track a different document.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tji_common::{Result, TjiError};
use tracing::{debug, instrument};

// ============================================================================
// Drive Client Constants
// ============================================================================

pub const DEFAULT_DRIVE_API_URL: &str = "https://www.googleapis.com/drive/v3";

pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Default request timeout in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Field mask requested from `files.get`.
const FILE_FIELDS: &str = "id,name,modifiedTime";

/// Source of a spreadsheet's server-side modification time
#[async_trait]
pub trait SheetMetadataSource: Send + Sync {
    async fn modified_time(&self, sheet_key: &str, sheet_name: Option<&str>) -> Result<DateTime<Utc>>;
}

/// OAuth2 client plus a long-lived refresh token
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GoogleCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl GoogleCredentials {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TjiError::config(format!("Failed to read Google credentials {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[derive(Debug, Clone)]
enum Auth {
    AccessToken(String),
    RefreshToken(GoogleCredentials),
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Subset of the Drive `File` resource we ask for
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub modified_time: DateTime<Utc>,
}

pub struct DriveClient {
    client: Client,
    api_url: String,
    token_url: String,
    auth: Auth,
}

impl DriveClient {
    fn with_auth(auth: Auth) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| TjiError::sheet_metadata(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: DEFAULT_DRIVE_API_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            auth,
        })
    }

    /// Use a pre-issued bearer token as-is
    pub fn with_access_token(token: impl Into<String>) -> Result<Self> {
        Self::with_auth(Auth::AccessToken(token.into()))
    }

    /// Exchange the refresh token for an access token on every lookup
    pub fn with_credentials(credentials: GoogleCredentials) -> Result<Self> {
        Self::with_auth(Auth::RefreshToken(credentials))
    }

    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Build from `GOOGLE_ACCESS_TOKEN` or `GOOGLE_CREDENTIALS_FILE`, with
    /// `GOOGLE_DRIVE_API_URL` / `GOOGLE_TOKEN_URL` overriding the endpoints.
    pub fn from_env() -> Result<Self> {
        let client = match std::env::var("GOOGLE_ACCESS_TOKEN").ok().filter(|t| !t.is_empty()) {
            Some(token) => Self::with_access_token(token)?,
            None => {
                let path = std::env::var("GOOGLE_CREDENTIALS_FILE").map_err(|_| {
                    TjiError::config("Set GOOGLE_CREDENTIALS_FILE or GOOGLE_ACCESS_TOKEN to reach Google Drive")
                })?;
                Self::with_credentials(GoogleCredentials::from_file(Path::new(&path))?)?
            },
        };

        let client = match std::env::var("GOOGLE_DRIVE_API_URL") {
            Ok(url) if !url.is_empty() => client.api_url(url),
            _ => client,
        };
        Ok(match std::env::var("GOOGLE_TOKEN_URL") {
            Ok(url) if !url.is_empty() => client.token_url(url),
            _ => client,
        })
    }

    async fn access_token(&self) -> Result<String> {
        let credentials = match &self.auth {
            Auth::AccessToken(token) => return Ok(token.clone()),
            Auth::RefreshToken(credentials) => credentials,
        };

        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
                ("refresh_token", credentials.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| TjiError::sheet_metadata(format!("Failed to refresh Google access token: {}", e)))?;

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| TjiError::sheet_metadata(format!("Malformed token response: {}", e)))?;
        Ok(token.access_token)
    }

    #[instrument(skip(self))]
    pub async fn get_file(&self, sheet_key: &str) -> Result<DriveFile> {
        let token = self.access_token().await?;
        let url = format!("{}/files/{}", self.api_url, sheet_key);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[("fields", FILE_FIELDS), ("supportsAllDrives", "true")])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| TjiError::sheet_metadata(format!("Drive lookup for {} failed: {}", sheet_key, e)))?;

        let file: DriveFile = response
            .json()
            .await
            .map_err(|e| TjiError::sheet_metadata(format!("Malformed Drive response for {}: {}", sheet_key, e)))?;
        debug!(sheet = %file.name, modified = %file.modified_time, "Fetched sheet metadata");
        Ok(file)
    }
}

#[async_trait]
impl SheetMetadataSource for DriveClient {
    async fn modified_time(&self, sheet_key: &str, sheet_name: Option<&str>) -> Result<DateTime<Utc>> {
        let file = self.get_file(sheet_key).await?;

        if file.id != sheet_key {
            return Err(TjiError::sheet_metadata(format!(
                "Drive returned file {} when asked for {}",
                file.id, sheet_key
            )));
        }
        if let Some(expected) = sheet_name {
            if file.name != expected {
                return Err(TjiError::sheet_metadata(format!(
                    "Sheet {} is named '{}', expected '{}'",
                    sheet_key, file.name, expected
                )));
            }
        }
        Ok(file.modified_time)
    }
}
