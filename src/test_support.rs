//! Fixtures shared by unit tests.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::{
    error::Error,
    helpers::Clock,
    model::{
        AnalysisSnapshot, Chain, Holder, HolderLink, SupplyDistribution,
        TokenAnalysis, TokenLink,
    },
    provider::GraphProvider,
    types::{
        IdentifiedSupply, MapData, MapLink, MapMetadata, MapNode,
        MetadataStatus,
    },
};

pub const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

pub const ADDRESS: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";

pub fn ts(hour: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::hours(hour)
}

pub fn holder_address(index: usize) -> String {
    format!("0x{:040x}", 0xa000 + index)
}

pub fn holder(index: usize, percentage: f64, is_contract: bool) -> Holder {
    Holder {
        address: holder_address(index),
        name: None,
        amount: percentage * 1_000.0,
        percentage,
        is_contract,
        transaction_count: index as u64 + 1,
        transfer_count: index as u64 * 2,
    }
}

pub fn link(source: &Holder, target: &Holder, forward: f64, backward: f64) -> HolderLink {
    HolderLink {
        source_address: source.address.to_owned(),
        target_address: target.address.to_owned(),
        source_name: source.name.to_owned(),
        target_name: target.name.to_owned(),
        forward_amount: forward,
        backward_amount: backward,
    }
}

pub fn sample_snapshot() -> AnalysisSnapshot {
    let mut exchange = holder(0, 35.0, false);
    exchange.name = Some(String::from("Binance 14"));
    let holders = vec![
        exchange,
        holder(1, 20.0, true),
        holder(2, 7.5, false),
        holder(3, 1.0, false),
    ];
    let holder_links = vec![
        link(&holders[0], &holders[1], 500.0, 0.0),
        link(&holders[1], &holders[2], 120.0, 80.0),
        link(&holders[3], &holders[0], 0.0, 40.0),
    ];

    AnalysisSnapshot {
        name: String::from("USD Coin"),
        symbol: String::from("USDC"),
        version: 5,
        is_nft: false,
        decentralization_score: 42.0,
        supply_distribution: SupplyDistribution {
            percent_in_cex: 12.0,
            percent_in_contracts: 30.0,
        },
        holders,
        holder_links,
        related_tokens: vec![TokenLink {
            address: String::from("0xdac17f958d2ee523a2206206994597c13d831ec7"),
            name: String::from("Tether USD"),
            symbol: String::from("USDT"),
            decimals: Some(6),
        }],
    }
}

pub fn sample_analysis(now: DateTime<Utc>) -> TokenAnalysis {
    TokenAnalysis::from_snapshot(
        String::from(ADDRESS),
        Chain::Eth,
        sample_snapshot(),
        now,
        Duration::hours(24),
    )
}

/// A distinct token per `index`.
pub fn sample_analysis_for(index: usize, now: DateTime<Utc>) -> TokenAnalysis {
    let mut analysis = sample_analysis(now);
    analysis.address = format!("0x{:040x}", 0xbeef_0000 + index);
    analysis
}

/// `count` nodes linked as a chain 0 -> 1 -> 2 ...
pub fn map_data(count: usize) -> MapData {
    let nodes = (0..count)
        .map(|index| MapNode {
            address: holder_address(index),
            amount: 1_000.0 / (index as f64 + 1.0),
            is_contract: index % 4 == 1,
            name: (index == 0).then(|| String::from("Binance 14")),
            percentage: 50.0 / (index as f64 + 1.0),
            transaction_count: 10,
            transfer_count: 4,
        })
        .collect();
    let links = (1..count)
        .map(|index| MapLink {
            source: index - 1,
            target: index,
            forward: 10.0 * index as f64,
            backward: 1.0,
        })
        .collect();

    MapData {
        version: 5,
        full_name: String::from("USD Coin"),
        symbol: String::from("USDC"),
        is_x721: false,
        nodes,
        links,
        token_links: vec![],
    }
}

pub fn map_metadata() -> MapMetadata {
    MapMetadata {
        decentralisation_score: 42.0,
        identified_supply: IdentifiedSupply {
            percent_in_cexs: 12.0,
            percent_in_contracts: 30.0,
        },
        status: MetadataStatus::OK,
        message: None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Unavailable,
    NoData,
    BadPayload,
}

/// In-process provider: counts calls, can be switched to fail, and can be
/// slowed down to widen race windows.
#[derive(Debug)]
pub struct ScriptedProvider {
    graph_calls: AtomicUsize,
    metadata_calls: AtomicUsize,
    failure: Mutex<Option<Failure>>,
    score: Mutex<f64>,
    delay: Option<StdDuration>,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        ScriptedProvider {
            graph_calls: AtomicUsize::new(0),
            metadata_calls: AtomicUsize::new(0),
            failure: Mutex::new(None),
            score: Mutex::new(42.0),
            delay: None,
        }
    }
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: StdDuration) -> Self {
        ScriptedProvider {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn graph_calls(&self) -> usize {
        self.graph_calls.load(Ordering::SeqCst)
    }

    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    pub fn fail_with(&self, failure: Option<Failure>) {
        *self.failure.lock().unwrap() = failure;
    }

    pub fn set_score(&self, score: f64) {
        *self.score.lock().unwrap() = score;
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn failure(&self) -> Option<Failure> {
        *self.failure.lock().unwrap()
    }
}

#[async_trait]
impl GraphProvider for ScriptedProvider {
    async fn fetch_graph(&self, _address: &str, _chain: Chain) -> Result<MapData, Error> {
        self.graph_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        match self.failure() {
            Some(Failure::Unavailable) => Err(Error::ProviderUnavailable {
                status: Some(503),
                message: String::from("maintenance"),
            }),
            Some(Failure::NoData) => Err(Error::ProviderDataUnavailable(String::from(
                "Data not available for this token",
            ))),
            Some(Failure::BadPayload) => {
                let mut data = map_data(3);
                data.links.push(MapLink {
                    source: 0,
                    target: 99,
                    forward: 1.0,
                    backward: 0.0,
                });
                Ok(data)
            },
            None => Ok(map_data(4)),
        }
    }

    async fn fetch_metadata(
        &self,
        _address: &str,
        _chain: Chain,
    ) -> Result<MapMetadata, Error> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        let mut metadata = map_metadata();
        metadata.decentralisation_score = *self.score.lock().unwrap();
        Ok(metadata)
    }
}

#[derive(Debug)]
pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        ManualClock(Mutex::new(now))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.0.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}
