//! Background refresh and retention tasks
//!
//! Tokens whose freshness window has passed are refreshed proactively in
//! small batches with bounded concurrency, so interactive reads mostly hit
//! fresh records.

use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::{
    configuration::{AppState, State},
    error::Error,
};

use super::AnalysisStore;

/// How often old analyses are pruned
const PRUNE_INTERVAL_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub due: usize,
    pub refreshed: usize,
    pub degraded: usize,
    pub failed: usize,
}

/// Main background task for proactive refresh
pub async fn refresh_task(app_state: AppState<State>) -> Result<(), Error> {
    let config = &app_state.config;
    info!(
        "Starting refresh task (every {}s, batch {}, max {} concurrent)",
        config.refresh_interval, config.refresh_batch_size, config.max_concurrent_refreshes
    );

    let mut check_interval = interval(Duration::from_secs(config.refresh_interval));

    loop {
        check_interval.tick().await;

        match refresh_due(
            &app_state.store,
            config.refresh_batch_size,
            config.max_concurrent_refreshes,
        )
        .await
        {
            Ok(summary) if summary.due == 0 => debug!("No analyses due for refresh"),
            Ok(summary) => info!(
                "Refresh cycle: {} due, {} refreshed, {} degraded, {} failed",
                summary.due, summary.refreshed, summary.degraded, summary.failed
            ),
            Err(e) => error!("Error in refresh cycle: {}", e),
        }
    }
}

/// Refreshes up to `batch_size` due analyses, at most `max_concurrent` at a
/// time. Individual failures are counted, not returned.
pub async fn refresh_due(
    store: &AnalysisStore,
    batch_size: usize,
    max_concurrent: usize,
) -> Result<RefreshSummary, Error> {
    let due = store.due_for_update(batch_size).await?;
    let mut summary = RefreshSummary {
        due: due.len(),
        ..RefreshSummary::default()
    };

    let results: Vec<_> = stream::iter(due)
        .map(|analysis| async move {
            let result = store.get_analysis(&analysis.address, analysis.chain).await;
            (analysis, result)
        })
        .buffer_unordered(max_concurrent.max(1))
        .collect()
        .await;

    for (analysis, result) in results {
        match result {
            Ok(updated) if updated.last_analysis > analysis.last_analysis => {
                summary.refreshed += 1
            },
            Ok(updated) => {
                summary.degraded += 1;
                if let Some(last_error) = updated.last_error {
                    debug!(
                        "Kept stale analysis for {} on {}: {}",
                        analysis.address, analysis.chain, last_error.message
                    );
                }
            },
            Err(e) => {
                summary.failed += 1;
                warn!(
                    "Failed to refresh {} on {}: {}",
                    analysis.address, analysis.chain, e
                );
            },
        }
    }

    Ok(summary)
}

/// Deletes analyses untouched for the configured retention period, once a day.
pub async fn prune_task(app_state: AppState<State>) -> Result<(), Error> {
    let retention = chrono::Duration::days(app_state.config.retention_days);
    info!("Starting prune task (retention {} days)", retention.num_days());

    let mut prune_interval = interval(Duration::from_secs(PRUNE_INTERVAL_SECS));

    loop {
        prune_interval.tick().await;

        match app_state.store.prune(retention).await {
            Ok(0) => debug!("No analyses to prune"),
            Ok(deleted) => info!("Pruned {} old analyses", deleted),
            Err(e) => error!("Error pruning analyses: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::{
        dao::{AnalysisRepository, MemoryRepository},
        handler::StoreSettings,
        test_support::{sample_analysis_for, ts, Failure, ManualClock, ScriptedProvider},
    };

    fn store(
        repository: Arc<MemoryRepository>,
        provider: Arc<ScriptedProvider>,
        clock: Arc<ManualClock>,
    ) -> AnalysisStore {
        AnalysisStore::new(repository, provider, clock, StoreSettings::default())
    }

    #[tokio::test]
    async fn refreshes_only_due_records_within_batch() {
        let repository = Arc::new(MemoryRepository::new());
        for index in 0..4 {
            let mut analysis = sample_analysis_for(index, ts(0));
            analysis.next_update_due = ts(index as i64 * 10);
            repository.save(&analysis).await.unwrap();
        }

        let provider = Arc::new(ScriptedProvider::new());
        let clock = Arc::new(ManualClock::new(ts(15)));
        let store = store(repository.clone(), provider.clone(), clock);

        let summary = refresh_due(&store, 10, 2).await.unwrap();

        assert_eq!(
            summary,
            RefreshSummary {
                due: 2,
                refreshed: 2,
                degraded: 0,
                failed: 0
            }
        );
        assert_eq!(provider.graph_calls(), 2);

        let summary = refresh_due(&store, 10, 2).await.unwrap();
        assert_eq!(summary.due, 0);
    }

    #[tokio::test]
    async fn provider_outage_counts_as_degraded() {
        let repository = Arc::new(MemoryRepository::new());
        let analysis = sample_analysis_for(1, ts(0));
        repository.save(&analysis).await.unwrap();

        let provider = Arc::new(ScriptedProvider::new());
        provider.fail_with(Some(Failure::Unavailable));
        let clock = Arc::new(ManualClock::new(ts(30)));
        let store = store(repository.clone(), provider, clock);

        let summary = refresh_due(&store, 10, 4).await.unwrap();
        assert_eq!(summary.degraded, 1);

        let stored = repository
            .find(&analysis.address, analysis.chain)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.last_error.is_some());
    }

    #[tokio::test]
    async fn prune_uses_retention_window() {
        let repository = Arc::new(MemoryRepository::new());
        repository.save(&sample_analysis_for(1, ts(0))).await.unwrap();
        repository
            .save(&sample_analysis_for(2, ts(24 * 40)))
            .await
            .unwrap();

        let clock = Arc::new(ManualClock::new(ts(24 * 45)));
        let store = store(repository.clone(), Arc::new(ScriptedProvider::new()), clock);

        let deleted = store.prune(ChronoDuration::days(30)).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(repository.len().await, 1);
    }
}
