use crate::core::settings::Settings;
use crate::providers::{GoogleAnalyticsSource, MetricSource};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Serialize)]
struct FetchOutput<'a> {
    url: &'a str,
    users_online: i64,
    #[serde(with = "chrono::serde::ts_seconds")]
    fetched_at: DateTime<Utc>,
}

pub async fn run(
    settings: &Settings,
    email: &str,
    key_file: &str,
    url: &str,
    json: bool,
) -> Result<()> {
    let source = GoogleAnalyticsSource::new(&settings.analytics)?;
    let users_online = source.fetch_active_users(email, key_file, url).await?;

    if json {
        let output = FetchOutput {
            url,
            users_online,
            fetched_at: Utc::now(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("Online on {}: {}", url, users_online);
    }

    Ok(())
}
