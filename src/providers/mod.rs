mod auth;
mod google;

use anyhow::Result;
use async_trait::async_trait;

pub use google::GoogleAnalyticsSource;

#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error("Failed to read key file {path}: {source}")]
    KeyFile {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse key file {path}: {source}")]
    KeyFormat {
        path: String,
        source: serde_json::Error,
    },
    #[error("Key file belongs to {found}, expected {expected}")]
    IdentityMismatch { expected: String, found: String },
    #[error("Failed to sign token assertion: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
    #[error("Token exchange rejected: {status} - {body}")]
    TokenRejected {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("No analytics profile matches {url}")]
    ProfileNotFound { url: String },
    #[error("Analytics API error: {status} - {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("Malformed analytics response: {0}")]
    MalformedResponse(String),
    #[error("Analytics request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Supplies the current number of active users on a web resource.
///
/// The credential reference is passed through as-is; interpreting it is up to
/// the implementation.
#[async_trait]
pub trait MetricSource: Send + Sync {
    async fn fetch_active_users(
        &self,
        identity: &str,
        credential_ref: &str,
        target_url: &str,
    ) -> Result<i64>;
}
