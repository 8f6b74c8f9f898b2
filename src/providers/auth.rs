use crate::providers::AnalyticsError;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::Mutex;

const SCOPE: &str = "https://www.googleapis.com/auth/analytics.readonly";
const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
pub struct ServiceAccountKey {
    pub private_key: String,
    pub client_email: Option<String>,
}

impl ServiceAccountKey {
    pub fn load(path: &Path) -> Result<Self, AnalyticsError> {
        let content = std::fs::read_to_string(path).map_err(|source| AnalyticsError::KeyFile {
            path: path.display().to_string(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| AnalyticsError::KeyFormat {
            path: path.display().to_string(),
            source,
        })
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

pub fn sign_assertion(
    identity: &str,
    key: &ServiceAccountKey,
    audience: &str,
    now: DateTime<Utc>,
) -> Result<String, AnalyticsError> {
    let claims = Claims {
        iss: identity,
        scope: SCOPE,
        aud: audience,
        iat: now.timestamp(),
        exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
    };

    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
    Ok(jsonwebtoken::encode(
        &Header::new(Algorithm::RS256),
        &claims,
        &encoding_key,
    )?)
}

/// Access tokens keyed by (identity, key file), reused until shortly before expiry.
pub struct TokenCache {
    client: reqwest::Client,
    token_url: String,
    tokens: Mutex<HashMap<(String, String), CachedToken>>,
}

impl TokenCache {
    pub fn new(client: reqwest::Client, token_url: String) -> Self {
        Self {
            client,
            token_url,
            tokens: Mutex::new(HashMap::new()),
        }
    }

    pub async fn access_token(
        &self,
        identity: &str,
        key_file: &str,
    ) -> Result<String, AnalyticsError> {
        let cache_key = (identity.to_string(), key_file.to_string());
        let now = Utc::now();

        if let Some(token) = self.tokens.lock().await.get(&cache_key) {
            if token.expires_at > now {
                return Ok(token.access_token.clone());
            }
        }

        let key = ServiceAccountKey::load(Path::new(key_file))?;
        if let Some(email) = key.client_email.as_deref() {
            if email != identity {
                return Err(AnalyticsError::IdentityMismatch {
                    expected: identity.to_string(),
                    found: email.to_string(),
                });
            }
        }

        let assertion = sign_assertion(identity, &key, &self.token_url, now)?;
        let response = self
            .client
            .post(&self.token_url)
            .form(&[("grant_type", GRANT_TYPE), ("assertion", assertion.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AnalyticsError::TokenRejected { status, body });
        }

        let token: TokenResponse = response.json().await?;
        tracing::debug!(identity, expires_in = token.expires_in, "Obtained access token");

        let cached = CachedToken {
            access_token: token.access_token.clone(),
            expires_at: now + Duration::seconds(token.expires_in - EXPIRY_MARGIN_SECS),
        };
        self.tokens.lock().await.insert(cache_key, cached);

        Ok(token.access_token)
    }
}
