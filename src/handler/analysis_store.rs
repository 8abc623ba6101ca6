//! Analysis lifecycle
//!
//! `AnalysisStore` decides when a token's analysis is refreshed from the
//! provider, logs the pre-refresh state into the bounded history, and falls
//! back to the last good record when the provider fails.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::{
    dao::AnalysisRepository,
    error::Error,
    helpers::{normalize_address, Clock},
    model::{Chain, TokenAnalysis},
    provider::GraphProvider,
    types::{build_snapshot, SnapshotLimits},
};

#[derive(Debug, Clone, Copy)]
pub struct StoreSettings {
    pub freshness_window: Duration,
    pub limits: SnapshotLimits,
    /// Collapse concurrent refreshes of one (address, chain) into a single
    /// provider round trip.
    pub single_flight: bool,
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            freshness_window: Duration::hours(24),
            limits: SnapshotLimits::default(),
            single_flight: true,
        }
    }
}

pub struct AnalysisStore {
    repository: Arc<dyn AnalysisRepository>,
    provider: Arc<dyn GraphProvider>,
    clock: Arc<dyn Clock>,
    settings: StoreSettings,
    refreshing: RefreshLocks,
}

impl AnalysisStore {
    pub fn new(
        repository: Arc<dyn AnalysisRepository>,
        provider: Arc<dyn GraphProvider>,
        clock: Arc<dyn Clock>,
        settings: StoreSettings,
    ) -> Self {
        AnalysisStore {
            repository,
            provider,
            clock,
            settings,
            refreshing: RefreshLocks::default(),
        }
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Returns a current analysis for the token, refreshing it first when it
    /// is missing or stale.
    pub async fn get_analysis(
        &self,
        address: &str,
        chain: Chain,
    ) -> Result<TokenAnalysis, Error> {
        let address = normalize_address(address, chain)?;

        let existing = self.repository.find(&address, chain).await?;
        if let Some(analysis) = existing.as_ref() {
            if analysis.is_fresh(self.clock.now()) {
                debug!("Fresh analysis for {} on {}", address, chain);
                return Ok(analysis.clone());
            }
        }

        if !self.settings.single_flight {
            return self.refresh(&address, chain, existing).await;
        }

        let _guard = self.refreshing.lock(&address, chain).await;

        // another caller may have refreshed while we waited
        let existing = self.repository.find(&address, chain).await?;
        if let Some(analysis) = existing.as_ref() {
            if analysis.is_fresh(self.clock.now()) {
                debug!("Analysis for {} on {} refreshed by a concurrent caller", address, chain);
                return Ok(analysis.clone());
            }
        }

        self.refresh(&address, chain, existing).await
    }

    /// Marks the stored analysis as due and refreshes it.
    pub async fn force_update(
        &self,
        address: &str,
        chain: Chain,
    ) -> Result<TokenAnalysis, Error> {
        let address = normalize_address(address, chain)?;

        let mut analysis = self
            .repository
            .find(&address, chain)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!("analysis for {} on {}", address, chain))
            })?;

        analysis.next_update_due = DateTime::<Utc>::UNIX_EPOCH;
        self.repository.save(&analysis).await?;
        info!("Forced update of {} on {}", address, chain);

        self.get_analysis(&address, chain).await
    }

    pub async fn recent(&self, limit: usize) -> Result<Vec<TokenAnalysis>, Error> {
        self.repository.recent(limit).await
    }

    pub async fn due_for_update(&self, limit: usize) -> Result<Vec<TokenAnalysis>, Error> {
        self.repository.due_for_update(self.clock.now(), limit).await
    }

    /// Drops analyses not written for `retention`.
    pub async fn prune(&self, retention: Duration) -> Result<u64, Error> {
        let cutoff = self.clock.now() - retention;
        self.repository.delete_older_than(cutoff).await
    }

    pub async fn update_screenshot(
        &self,
        address: &str,
        chain: Chain,
        url: &str,
    ) -> Result<(), Error> {
        let address = normalize_address(address, chain)?;
        self.repository
            .update_screenshot(&address, chain, url, self.clock.now())
            .await
    }

    async fn refresh(
        &self,
        address: &str,
        chain: Chain,
        existing: Option<TokenAnalysis>,
    ) -> Result<TokenAnalysis, Error> {
        let now = self.clock.now();
        info!("Refreshing analysis for {} on {}", address, chain);

        let fetched = async {
            let (data, metadata) = tokio::try_join!(
                self.provider.fetch_graph(address, chain),
                self.provider.fetch_metadata(address, chain),
            )?;
            build_snapshot(data, metadata, chain, self.settings.limits)
        }
        .await;

        match (fetched, existing) {
            (Ok(snapshot), Some(mut analysis)) => {
                analysis.apply_refresh(snapshot, now, self.settings.freshness_window);
                self.repository.save(&analysis).await?;
                info!(
                    "Refreshed {} on {}: score {:.2}, {} holders",
                    address,
                    chain,
                    analysis.decentralization_score,
                    analysis.holders.len()
                );
                Ok(analysis)
            },
            (Ok(snapshot), None) => {
                let analysis = TokenAnalysis::from_snapshot(
                    address.to_owned(),
                    chain,
                    snapshot,
                    now,
                    self.settings.freshness_window,
                );
                self.repository.save(&analysis).await?;
                info!("Created analysis for {} on {}", address, chain);
                Ok(analysis)
            },
            (Err(e), Some(mut analysis)) if e.is_provider_failure() => {
                warn!(
                    "Refresh of {} on {} failed, serving stale analysis: {}",
                    address, chain, e
                );
                analysis.record_error(e.to_string(), now);
                if let Err(save_error) = self.repository.save(&analysis).await {
                    warn!(
                        "Could not record refresh error for {} on {}: {}",
                        address, chain, save_error
                    );
                }
                Ok(analysis)
            },
            (Err(e), _) => Err(e),
        }
    }
}

/// One async mutex per key being refreshed. Entries are dropped once the
/// last holder releases them.
#[derive(Default)]
struct RefreshLocks {
    locks: Mutex<HashMap<(String, Chain), Arc<AsyncMutex<()>>>>,
}

impl RefreshLocks {
    async fn lock(&self, address: &str, chain: Chain) -> RefreshGuard<'_> {
        let key = (address.to_owned(), chain);
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            locks.entry(key.clone()).or_default().clone()
        };

        let guard = lock.clone().lock_owned().await;
        RefreshGuard {
            locks: self,
            key,
            lock,
            guard: Some(guard),
        }
    }
}

struct RefreshGuard<'a> {
    locks: &'a RefreshLocks,
    key: (String, Chain),
    lock: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();

        let mut locks = self
            .locks
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // the map and this guard are the only owners left
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.key);
        }
    }
}
