use crate::core::settings::AnalyticsSettings;
use crate::providers::auth::TokenCache;
use crate::providers::{AnalyticsError, MetricSource};
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const ACTIVE_USERS_METRIC: &str = "rt:activeUsers";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountSummaries {
    #[serde(default)]
    items: Vec<AccountSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountSummary {
    #[serde(default)]
    web_properties: Vec<WebPropertySummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebPropertySummary {
    website_url: Option<String>,
    #[serde(default)]
    profiles: Vec<ProfileSummary>,
}

#[derive(Debug, Deserialize)]
struct ProfileSummary {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RealtimeData {
    #[serde(default)]
    totals_for_all_results: std::collections::HashMap<String, String>,
}

/// Realtime active users from Google Analytics, authenticated as a service account.
pub struct GoogleAnalyticsSource {
    client: reqwest::Client,
    tokens: TokenCache,
    management_url: String,
    realtime_url: String,
}

impl GoogleAnalyticsSource {
    pub fn new(settings: &AnalyticsSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;

        Ok(Self {
            tokens: TokenCache::new(client.clone(), settings.token_url.clone()),
            client,
            management_url: settings.management_url.clone(),
            realtime_url: settings.realtime_url.clone(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        token: &str,
        query: &[(&str, &str)],
    ) -> Result<T, AnalyticsError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AnalyticsError::Api { status, body });
        }

        Ok(response.json().await?)
    }

    async fn resolve_profile(&self, token: &str, target_url: &str) -> Result<String, AnalyticsError> {
        let summaries: AccountSummaries = self.get_json(&self.management_url, token, &[]).await?;
        find_profile(&summaries, target_url).ok_or_else(|| AnalyticsError::ProfileNotFound {
            url: target_url.to_string(),
        })
    }
}

#[async_trait]
impl MetricSource for GoogleAnalyticsSource {
    async fn fetch_active_users(
        &self,
        identity: &str,
        credential_ref: &str,
        target_url: &str,
    ) -> Result<i64> {
        let token = self.tokens.access_token(identity, credential_ref).await?;
        let profile = self.resolve_profile(&token, target_url).await?;
        let ids = format!("ga:{}", profile);

        let data: RealtimeData = self
            .get_json(
                &self.realtime_url,
                &token,
                &[("ids", ids.as_str()), ("metrics", ACTIVE_USERS_METRIC)],
            )
            .await?;

        Ok(parse_active_users(&data)?)
    }
}

fn find_profile(summaries: &AccountSummaries, target_url: &str) -> Option<String> {
    let target = normalize_url(target_url);
    summaries
        .items
        .iter()
        .flat_map(|account| &account.web_properties)
        .filter(|property| {
            property
                .website_url
                .as_deref()
                .is_some_and(|url| normalize_url(url) == target)
        })
        .find_map(|property| property.profiles.first())
        .map(|profile| profile.id.clone())
}

fn parse_active_users(data: &RealtimeData) -> Result<i64, AnalyticsError> {
    let raw = data
        .totals_for_all_results
        .get(ACTIVE_USERS_METRIC)
        .ok_or_else(|| AnalyticsError::MalformedResponse(format!("missing {}", ACTIVE_USERS_METRIC)))?;

    raw.parse()
        .map_err(|_| AnalyticsError::MalformedResponse(format!("non-integer {}: {}", ACTIVE_USERS_METRIC, raw)))
}

fn normalize_url(url: &str) -> String {
    let lower = url.trim().to_lowercase();
    let without_scheme = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .unwrap_or(&lower);
    let without_www = without_scheme.strip_prefix("www.").unwrap_or(without_scheme);
    without_www.trim_end_matches('/').to_string()
}
