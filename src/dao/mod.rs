use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::Error,
    model::{Chain, TokenAnalysis},
};

mod memory;
mod postgre;

pub use memory::MemoryRepository;
pub use postgre::{get_path, PoolOption, PoolType};

/// Storage of `TokenAnalysis` records, unique per (address, chain).
///
/// `save` is an upsert and rejects records over the holder, link or history
/// caps before anything is written.
#[async_trait]
pub trait AnalysisRepository: Send + Sync {
    async fn find(
        &self,
        address: &str,
        chain: Chain,
    ) -> Result<Option<TokenAnalysis>, Error>;

    async fn save(&self, analysis: &TokenAnalysis) -> Result<(), Error>;

    /// Records with `next_update_due <= now`, soonest due first.
    async fn due_for_update(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TokenAnalysis>, Error>;

    /// Most recently analysed records first.
    async fn recent(&self, limit: usize) -> Result<Vec<TokenAnalysis>, Error>;

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, Error>;

    async fn update_screenshot(
        &self,
        address: &str,
        chain: Chain,
        url: &str,
        at: DateTime<Utc>,
    ) -> Result<(), Error>;
}
