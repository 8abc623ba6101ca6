use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    error::Error,
    model::{Chain, TokenAnalysis},
};

use super::AnalysisRepository;

type Key = (String, Chain);

/// Process-local analysis store, used when no database is configured.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    records: RwLock<BTreeMap<Key, TokenAnalysis>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl AnalysisRepository for MemoryRepository {
    async fn find(
        &self,
        address: &str,
        chain: Chain,
    ) -> Result<Option<TokenAnalysis>, Error> {
        let records = self.records.read().await;
        Ok(records.get(&(address.to_owned(), chain)).cloned())
    }

    async fn save(&self, analysis: &TokenAnalysis) -> Result<(), Error> {
        analysis.check_bounds()?;

        let mut records = self.records.write().await;
        let key = (analysis.address.to_owned(), analysis.chain);
        let mut record = analysis.clone();
        if let Some(existing) = records.get(&key) {
            record.created_at = existing.created_at;
        }
        records.insert(key, record);

        Ok(())
    }

    async fn due_for_update(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TokenAnalysis>, Error> {
        let records = self.records.read().await;
        let mut due = records
            .values()
            .filter(|analysis| analysis.next_update_due <= now)
            .cloned()
            .collect::<Vec<_>>();
        due.sort_by_key(|analysis| analysis.next_update_due);
        due.truncate(limit);
        Ok(due)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<TokenAnalysis>, Error> {
        let records = self.records.read().await;
        let mut recent = records.values().cloned().collect::<Vec<_>>();
        recent.sort_by(|a, b| b.last_analysis.cmp(&a.last_analysis));
        recent.truncate(limit);
        Ok(recent)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, Error> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, analysis| analysis.updated_at >= cutoff);
        Ok((before - records.len()) as u64)
    }

    async fn update_screenshot(
        &self,
        address: &str,
        chain: Chain,
        url: &str,
        at: DateTime<Utc>,
    ) -> Result<(), Error> {
        let mut records = self.records.write().await;
        let analysis = records
            .get_mut(&(address.to_owned(), chain))
            .ok_or_else(|| {
                Error::NotFound(format!("analysis for {} on {}", address, chain))
            })?;

        analysis.screenshot_url = Some(url.to_owned());
        analysis.screenshot_last_update = Some(at);
        analysis.updated_at = at;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::model::MAX_HOLDERS;
    use crate::test_support::{sample_analysis, sample_analysis_for, ts};

    #[tokio::test]
    async fn save_is_an_upsert_per_address_and_chain() {
        let repository = MemoryRepository::new();
        let mut analysis = sample_analysis(ts(0));
        repository.save(&analysis).await.unwrap();

        analysis.decentralization_score = 80.0;
        analysis.created_at = ts(5);
        repository.save(&analysis).await.unwrap();

        assert_eq!(repository.len().await, 1);
        let stored = repository
            .find(&analysis.address, analysis.chain)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.decentralization_score, 80.0);
        assert_eq!(stored.created_at, ts(0));

        assert!(repository
            .find(&analysis.address, Chain::Bsc)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn save_rejects_records_over_caps() {
        let repository = MemoryRepository::new();
        let mut analysis = sample_analysis(ts(0));
        let holder = analysis.holders[0].clone();
        analysis.holders = vec![holder; MAX_HOLDERS + 1];

        let result = repository.save(&analysis).await;
        assert!(matches!(result, Err(Error::ValidationError(_))));
        assert_eq!(repository.len().await, 0);
    }

    #[tokio::test]
    async fn due_for_update_orders_by_due_time() {
        let repository = MemoryRepository::new();
        for (index, hour) in [(1, 0), (2, -2), (3, 30)] {
            let mut analysis = sample_analysis_for(index, ts(0));
            analysis.next_update_due = ts(hour);
            repository.save(&analysis).await.unwrap();
        }

        let due = repository.due_for_update(ts(1), 10).await.unwrap();
        let hours = due
            .iter()
            .map(|analysis| analysis.next_update_due)
            .collect::<Vec<_>>();
        assert_eq!(hours, vec![ts(-2), ts(0)]);

        let due = repository.due_for_update(ts(1), 1).await.unwrap();
        assert_eq!(due.len(), 1);
    }

    #[tokio::test]
    async fn recent_and_retention() {
        let repository = MemoryRepository::new();
        for index in 0..3 {
            let analysis = sample_analysis_for(index, ts(index as i64 * 24));
            repository.save(&analysis).await.unwrap();
        }

        let recent = repository.recent(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].last_analysis, ts(48));

        let deleted = repository
            .delete_older_than(ts(0) + Duration::hours(30))
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(repository.len().await, 1);
    }

    #[tokio::test]
    async fn screenshot_requires_existing_record() {
        let repository = MemoryRepository::new();
        let analysis = sample_analysis(ts(0));

        let missing = repository
            .update_screenshot(&analysis.address, analysis.chain, "file:///a.png", ts(1))
            .await;
        assert!(matches!(missing, Err(Error::NotFound(_))));

        repository.save(&analysis).await.unwrap();
        repository
            .update_screenshot(&analysis.address, analysis.chain, "file:///a.png", ts(1))
            .await
            .unwrap();

        let stored = repository
            .find(&analysis.address, analysis.chain)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.screenshot_url.as_deref(), Some("file:///a.png"));
        assert_eq!(stored.screenshot_last_update, Some(ts(1)));
    }
}
