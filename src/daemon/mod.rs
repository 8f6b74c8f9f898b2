mod polling;
mod refresh;
mod selector;

use crate::core::settings::Settings;
use crate::core::store::{ConnectionTarget, PgResourceStore, ResourceStore};
use crate::providers::{GoogleAnalyticsSource, MetricSource};
use anyhow::Result;
use std::convert::Infallible;
use std::sync::Arc;

pub use polling::{IntervalTicker, PollLoop};
pub use refresh::RefreshExecutor;
pub use selector::StaleResourceSelector;

pub async fn run(settings: &Settings, target: &ConnectionTarget) -> Result<Infallible> {
    tracing::info!(
        interval_ms = settings.polling.interval_ms,
        "Starting analytics-sync daemon"
    );

    let store: Arc<dyn ResourceStore> =
        Arc::new(PgResourceStore::connect(target, &settings.database).await?);
    let source: Arc<dyn MetricSource> = Arc::new(GoogleAnalyticsSource::new(&settings.analytics)?);

    let poll = PollLoop::new(
        StaleResourceSelector::new(Arc::clone(&store)),
        RefreshExecutor::new(source, store),
        IntervalTicker::new(settings.polling.interval()),
    );

    poll.run().await
}
