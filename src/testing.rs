//! In-memory fakes for the store and metric source.

use crate::core::models::{DueResource, MonitoredResource};
use crate::core::store::ResourceStore;
use crate::providers::MetricSource;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub fn resource(id: i32, period: i64, elapsed_secs: i64, active: bool) -> MonitoredResource {
    MonitoredResource {
        id,
        url: format!("https://site{}.example.org/", id),
        key_file_location: format!("/etc/analytics/site{}.json", id),
        service_account_email: format!("site{}@example.iam.gserviceaccount.com", id),
        last_updated: epoch() - Duration::seconds(elapsed_secs),
        updating_period: period,
        is_active: active,
        users_online: 0,
    }
}

#[derive(Default)]
struct StoreState {
    rows: Vec<MonitoredResource>,
    now: Option<DateTime<Utc>>,
    selects: usize,
    writes: Vec<(i32, i32)>,
    fail_write_for: Option<i32>,
}

/// Evaluates the due predicate against a controllable clock.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new(rows: Vec<MonitoredResource>) -> Self {
        Self {
            state: Mutex::new(StoreState {
                rows,
                now: Some(epoch()),
                ..Default::default()
            }),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.state.lock().unwrap().now.unwrap_or_else(epoch)
    }

    pub fn advance(&self, secs: i64) {
        let mut state = self.state.lock().unwrap();
        let now = state.now.unwrap_or_else(epoch);
        state.now = Some(now + Duration::seconds(secs));
    }

    pub fn fail_write_for(&self, id: i32) {
        self.state.lock().unwrap().fail_write_for = Some(id);
    }

    pub fn row(&self, id: i32) -> MonitoredResource {
        self.state
            .lock()
            .unwrap()
            .rows
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .unwrap()
    }

    pub fn selects(&self) -> usize {
        self.state.lock().unwrap().selects
    }

    pub fn writes(&self) -> Vec<(i32, i32)> {
        self.state.lock().unwrap().writes.clone()
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn select_due(&self) -> Result<Vec<DueResource>> {
        let mut state = self.state.lock().unwrap();
        state.selects += 1;
        let now = state.now.unwrap_or_else(epoch);
        Ok(state
            .rows
            .iter()
            .filter(|r| r.is_due(now))
            .map(MonitoredResource::as_due)
            .collect())
    }

    async fn record_users_online(&self, id: i32, users_online: i32) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_write_for == Some(id) {
            anyhow::bail!("write to resource {} rejected", id);
        }
        let now = state.now.unwrap_or_else(epoch);
        if let Some(row) = state.rows.iter_mut().find(|r| r.id == id) {
            row.users_online = users_online;
            row.last_updated = now;
        }
        state.writes.push((id, users_online));
        Ok(())
    }
}

/// Answers fetches per URL from a queue of scripted results.
#[derive(Default)]
pub struct ScriptedSource {
    responses: Mutex<HashMap<String, VecDeque<Result<i64, String>>>>,
    calls: Mutex<Vec<(String, String, String)>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, result: Result<i64, &str>) -> &Self {
        self.responses
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(result.map_err(str::to_string));
        self
    }

    pub fn calls(&self) -> Vec<(String, String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl MetricSource for ScriptedSource {
    async fn fetch_active_users(
        &self,
        identity: &str,
        credential_ref: &str,
        target_url: &str,
    ) -> Result<i64> {
        self.calls.lock().unwrap().push((
            identity.to_string(),
            credential_ref.to_string(),
            target_url.to_string(),
        ));

        let next = self
            .responses
            .lock()
            .unwrap()
            .get_mut(target_url)
            .and_then(VecDeque::pop_front);

        match next {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Err(anyhow::anyhow!("no scripted response for {}", target_url)),
        }
    }
}
