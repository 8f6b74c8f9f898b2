use crate::core::models::{DueResource, MonitoredResource};
use crate::core::settings::DatabaseSettings;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::str::FromStr;
use std::time::Duration;

const SELECT_DUE: &str = "SELECT id, url, key_file_location, service_account_email, \
     last_updated, updating_period::BIGINT AS updating_period \
     FROM webresource \
     WHERE is_active \
     AND EXTRACT(EPOCH FROM (current_timestamp - last_updated)) >= updating_period";

const UPDATE_USERS_ONLINE: &str =
    "UPDATE webresource SET users_online = $1, last_updated = current_timestamp WHERE id = $2";

const SELECT_ALL: &str = "SELECT id, url, key_file_location, service_account_email, \
     last_updated, updating_period::BIGINT AS updating_period, is_active, users_online \
     FROM webresource ORDER BY id";

#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Active resources whose period has elapsed, evaluated by the store.
    async fn select_due(&self) -> Result<Vec<DueResource>>;

    /// Sets `users_online` and stamps `last_updated` in one statement.
    async fn record_users_online(&self, id: i32, users_online: i32) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct ConnectionTarget {
    pub url: String,
    pub login: Option<String>,
    pub password: Option<String>,
}

impl ConnectionTarget {
    fn connect_options(&self) -> Result<PgConnectOptions> {
        let mut options = PgConnectOptions::from_str(&self.url)
            .context("Failed to parse database connection string")?;

        if let Some(login) = &self.login {
            options = options.username(login);
        }
        if let Some(password) = &self.password {
            options = options.password(password);
        }

        Ok(options)
    }
}

/// Postgres-backed store with separate read and write connections.
pub struct PgResourceStore {
    read_pool: PgPool,
    write_pool: PgPool,
}

impl PgResourceStore {
    pub async fn connect(target: &ConnectionTarget, settings: &DatabaseSettings) -> Result<Self> {
        let options = target.connect_options()?;
        let timeout = Duration::from_secs(settings.connect_timeout_secs);

        let read_pool = open_pool(options.clone(), timeout)
            .await
            .context("Failed to open read connection")?;
        let write_pool = open_pool(options, timeout)
            .await
            .context("Failed to open write connection")?;

        tracing::info!("Connected to resource store");
        Ok(Self {
            read_pool,
            write_pool,
        })
    }

    pub async fn list_all(&self) -> Result<Vec<MonitoredResource>> {
        sqlx::query_as::<_, MonitoredResource>(SELECT_ALL)
            .fetch_all(&self.read_pool)
            .await
            .context("Failed to list resources")
    }
}

async fn open_pool(options: PgConnectOptions, timeout: Duration) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .acquire_timeout(timeout)
        .connect_with(options)
        .await?;
    Ok(pool)
}

#[async_trait]
impl ResourceStore for PgResourceStore {
    async fn select_due(&self) -> Result<Vec<DueResource>> {
        sqlx::query_as::<_, DueResource>(SELECT_DUE)
            .fetch_all(&self.read_pool)
            .await
            .context("Failed to select due resources")
    }

    async fn record_users_online(&self, id: i32, users_online: i32) -> Result<()> {
        let result = sqlx::query(UPDATE_USERS_ONLINE)
            .bind(users_online)
            .bind(id)
            .execute(&self.write_pool)
            .await
            .with_context(|| format!("Failed to update resource {}", id))?;

        if result.rows_affected() == 0 {
            tracing::warn!(resource_id = id, "Resource vanished before update");
        }

        Ok(())
    }
}
