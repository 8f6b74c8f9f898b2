use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row of the `webresource` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct MonitoredResource {
    pub id: i32,
    pub url: String,
    pub key_file_location: String,
    pub service_account_email: String,
    pub last_updated: DateTime<Utc>,
    pub updating_period: i64,
    pub is_active: bool,
    pub users_online: i32,
}

impl MonitoredResource {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        is_due(self.is_active, self.last_updated, self.updating_period, now)
    }

    #[allow(dead_code)]
    pub fn as_due(&self) -> DueResource {
        DueResource {
            id: self.id,
            url: self.url.clone(),
            key_file_location: self.key_file_location.clone(),
            service_account_email: self.service_account_email.clone(),
            last_updated: self.last_updated,
            updating_period: self.updating_period,
        }
    }
}

/// The projection of a resource returned by the due query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct DueResource {
    pub id: i32,
    pub url: String,
    pub key_file_location: String,
    pub service_account_email: String,
    pub last_updated: DateTime<Utc>,
    pub updating_period: i64,
}

impl DueResource {
    pub fn seconds_overdue(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.last_updated).num_seconds() - self.updating_period
    }
}

/// Elapsed time equal to the period counts as due.
pub fn is_due(
    is_active: bool,
    last_updated: DateTime<Utc>,
    updating_period: i64,
    now: DateTime<Utc>,
) -> bool {
    is_active && now.signed_duration_since(last_updated).num_seconds() >= updating_period
}
