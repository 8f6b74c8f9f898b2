use crate::core::models::{DueResource, MonitoredResource};
use crate::core::settings::Settings;
use crate::core::store::{ConnectionTarget, PgResourceStore};
use crate::daemon::StaleResourceSelector;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
struct DueOutput {
    resources: Vec<DueResource>,
    #[serde(with = "chrono::serde::ts_seconds")]
    checked_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct ResourceStatus {
    #[serde(flatten)]
    resource: MonitoredResource,
    due: bool,
}

pub async fn run(
    settings: &Settings,
    target: &ConnectionTarget,
    all: bool,
    json: bool,
) -> Result<()> {
    let store = Arc::new(PgResourceStore::connect(target, &settings.database).await?);

    if all {
        let now = Utc::now();
        let statuses: Vec<ResourceStatus> = store
            .list_all()
            .await?
            .into_iter()
            .map(|resource| ResourceStatus {
                due: resource.is_due(now),
                resource,
            })
            .collect();

        if json {
            println!("{}", serde_json::to_string_pretty(&statuses)?);
        } else {
            print!("{}", format_all(&statuses));
        }
        return Ok(());
    }

    let selector = StaleResourceSelector::new(store);

    let resources = selector.select_due().await?;
    let checked_at = Utc::now();

    if json {
        let output = DueOutput {
            resources,
            checked_at,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print!("{}", format_text(&resources, checked_at));
    }

    Ok(())
}

fn format_text(resources: &[DueResource], now: DateTime<Utc>) -> String {
    if resources.is_empty() {
        return "No resources due\n".to_string();
    }

    let mut out = String::new();
    for resource in resources {
        out.push_str(&format!(
            "{:>5}  {:<40} overdue {}\n",
            resource.id,
            resource.url,
            format_seconds(resource.seconds_overdue(now))
        ));
    }
    out
}

fn format_all(statuses: &[ResourceStatus]) -> String {
    let mut out = String::new();
    for status in statuses {
        let r = &status.resource;
        let state = match (r.is_active, status.due) {
            (false, _) => "inactive",
            (true, true) => "due",
            (true, false) => "fresh",
        };
        out.push_str(&format!(
            "{:>5}  {:<40} {:<8} {:>6} online  updated {}\n",
            r.id,
            r.url,
            state,
            r.users_online,
            r.last_updated.format("%Y-%m-%d %H:%M:%S")
        ));
    }
    out
}

fn format_seconds(total: i64) -> String {
    let total = total.max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}h {:02}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
