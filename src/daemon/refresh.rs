use crate::core::models::DueResource;
use crate::core::store::ResourceStore;
use crate::providers::MetricSource;
use anyhow::{Context, Result};
use std::sync::Arc;

pub struct RefreshExecutor {
    source: Arc<dyn MetricSource>,
    store: Arc<dyn ResourceStore>,
}

impl RefreshExecutor {
    pub fn new(source: Arc<dyn MetricSource>, store: Arc<dyn ResourceStore>) -> Self {
        Self { source, store }
    }

    /// Fetches the metric for one resource and commits it. Errors are not
    /// handled here.
    pub async fn refresh(&self, resource: &DueResource) -> Result<i32> {
        let fetched = self
            .source
            .fetch_active_users(
                &resource.service_account_email,
                &resource.key_file_location,
                &resource.url,
            )
            .await
            .with_context(|| {
                format!(
                    "Failed to fetch online users for resource {} ({})",
                    resource.id, resource.url
                )
            })?;

        let users_online = i32::try_from(fetched).with_context(|| {
            format!(
                "Online users for resource {} out of range: {}",
                resource.id, fetched
            )
        })?;

        tracing::debug!(
            resource_id = resource.id,
            url = %resource.url,
            users_online,
            "Online users fetched"
        );

        self.store
            .record_users_online(resource.id, users_online)
            .await?;

        Ok(users_online)
    }

    /// Refreshes resources in order, stopping at the first error.
    pub async fn refresh_all(&self, resources: &[DueResource]) -> Result<usize> {
        for resource in resources {
            self.refresh(resource).await?;
        }
        Ok(resources.len())
    }
}
