use crate::core::models::DueResource;
use crate::core::store::ResourceStore;
use anyhow::Result;
use std::sync::Arc;

/// Asks the store for the current due-set. Nothing is cached between calls.
pub struct StaleResourceSelector {
    store: Arc<dyn ResourceStore>,
}

impl StaleResourceSelector {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }

    pub async fn select_due(&self) -> Result<Vec<DueResource>> {
        let due = self.store.select_due().await?;
        tracing::debug!(count = due.len(), "Selected due resources");
        Ok(due)
    }
}
