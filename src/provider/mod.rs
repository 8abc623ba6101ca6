use async_trait::async_trait;

use crate::{
    error::Error,
    model::Chain,
    types::{MapData, MapMetadata},
};

pub use self::{database::DatabasePool, http::BubblemapsClient};

mod database;
mod http;

/// Source of holder graphs and their summary metadata for a token.
#[async_trait]
pub trait GraphProvider: Send + Sync {
    async fn fetch_graph(&self, address: &str, chain: Chain) -> Result<MapData, Error>;

    async fn fetch_metadata(
        &self,
        address: &str,
        chain: Chain,
    ) -> Result<MapMetadata, Error>;
}
