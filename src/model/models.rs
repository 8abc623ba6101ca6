//! Token analysis entities
//!
//! A `TokenAnalysis` owns every holder, link and history entry that belongs
//! to it; none of these are shared between records.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

use super::AnalysisHistory;

pub const MAX_HOLDERS: usize = 150;
pub const MAX_HOLDER_LINKS: usize = 1000;

// =============================================================================
// CHAIN
// =============================================================================

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Eth,
    Bsc,
    Ftm,
    Avax,
    Cro,
    Arbi,
    Poly,
    Base,
    Sol,
    Sonic,
}

impl Chain {
    pub const ALL: [Chain; 10] = [
        Chain::Eth,
        Chain::Bsc,
        Chain::Ftm,
        Chain::Avax,
        Chain::Cro,
        Chain::Arbi,
        Chain::Poly,
        Chain::Base,
        Chain::Sol,
        Chain::Sonic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Eth => "eth",
            Chain::Bsc => "bsc",
            Chain::Ftm => "ftm",
            Chain::Avax => "avax",
            Chain::Cro => "cro",
            Chain::Arbi => "arbi",
            Chain::Poly => "poly",
            Chain::Base => "base",
            Chain::Sol => "sol",
            Chain::Sonic => "sonic",
        }
    }

    /// Chains whose addresses are `0x`-prefixed hex and compare
    /// case-insensitively.
    pub fn is_evm(&self) -> bool {
        !matches!(self, Chain::Sol)
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Chain {
    type Err = Error;

    fn from_str(value: &str) -> Result<Chain, Self::Err> {
        let value = value.trim().to_lowercase();
        Chain::ALL
            .into_iter()
            .find(|chain| chain.as_str() == value)
            .ok_or_else(|| {
                let supported = Chain::ALL
                    .iter()
                    .map(Chain::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                Error::ValidationError(format!(
                    "chain must be one of: {}",
                    supported
                ))
            })
    }
}

// =============================================================================
// HOLDERS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holder {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub amount: f64,
    pub percentage: f64,
    pub is_contract: bool,
    pub transaction_count: u64,
    pub transfer_count: u64,
}

/// Flow between two holders, both directions folded into one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolderLink {
    pub source_address: String,
    pub target_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,
    pub forward_amount: f64,
    pub backward_amount: f64,
}

impl HolderLink {
    pub fn total_flow(&self) -> f64 {
        self.forward_amount + self.backward_amount
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenLink {
    pub address: String,
    pub name: String,
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,
}

// =============================================================================
// ANALYSIS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplyDistribution {
    #[serde(rename = "percentInCEX")]
    pub percent_in_cex: f64,
    pub percent_in_contracts: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisHistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub decentralization_score: f64,
    pub supply_distribution: SupplyDistribution,
    pub top_holders_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastError {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Everything one provider refresh yields for a token.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSnapshot {
    pub name: String,
    pub symbol: String,
    pub version: i32,
    pub is_nft: bool,
    pub decentralization_score: f64,
    pub supply_distribution: SupplyDistribution,
    pub holders: Vec<Holder>,
    pub holder_links: Vec<HolderLink>,
    pub related_tokens: Vec<TokenLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAnalysis {
    pub address: String,
    pub chain: Chain,
    pub name: String,
    pub symbol: String,
    pub version: i32,
    #[serde(rename = "isNFT")]
    pub is_nft: bool,

    pub decentralization_score: f64,
    pub supply_distribution: SupplyDistribution,
    pub holders: Vec<Holder>,
    pub holder_links: Vec<HolderLink>,
    pub related_tokens: Vec<TokenLink>,

    pub last_analysis: DateTime<Utc>,
    pub next_update_due: DateTime<Utc>,
    pub analysis_history: AnalysisHistory,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_last_update: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<LastError>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TokenAnalysis {
    pub fn from_snapshot(
        address: String,
        chain: Chain,
        snapshot: AnalysisSnapshot,
        now: DateTime<Utc>,
        freshness_window: Duration,
    ) -> TokenAnalysis {
        TokenAnalysis {
            address,
            chain,
            name: snapshot.name,
            symbol: snapshot.symbol,
            version: snapshot.version,
            is_nft: snapshot.is_nft,
            decentralization_score: snapshot.decentralization_score,
            supply_distribution: snapshot.supply_distribution,
            holders: snapshot.holders,
            holder_links: snapshot.holder_links,
            related_tokens: snapshot.related_tokens,
            last_analysis: now,
            next_update_due: now + freshness_window,
            analysis_history: AnalysisHistory::default(),
            screenshot_url: None,
            screenshot_last_update: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.next_update_due
    }

    /// Snapshot of the current derived state, as stored in the history log.
    pub fn history_entry(&self) -> AnalysisHistoryEntry {
        AnalysisHistoryEntry {
            timestamp: self.last_analysis,
            decentralization_score: self.decentralization_score,
            supply_distribution: self.supply_distribution,
            top_holders_count: self.holders.len(),
        }
    }

    /// Logs the pre-update state, then overwrites it with `snapshot`.
    pub fn apply_refresh(
        &mut self,
        snapshot: AnalysisSnapshot,
        now: DateTime<Utc>,
        freshness_window: Duration,
    ) {
        self.analysis_history.push(self.history_entry());

        self.name = snapshot.name;
        self.symbol = snapshot.symbol;
        self.version = snapshot.version;
        self.is_nft = snapshot.is_nft;
        self.decentralization_score = snapshot.decentralization_score;
        self.supply_distribution = snapshot.supply_distribution;
        self.holders = snapshot.holders;
        self.holder_links = snapshot.holder_links;
        self.related_tokens = snapshot.related_tokens;
        self.last_analysis = now;
        self.next_update_due = now + freshness_window;
        self.last_error = None;
        self.updated_at = now;
    }

    /// Annotates a failed refresh. Freshness and derived state stay as they
    /// were.
    pub fn record_error(&mut self, message: String, now: DateTime<Utc>) {
        self.last_error = Some(LastError {
            message,
            timestamp: now,
        });
    }

    /// Rejects records that would break the stored size limits.
    pub fn check_bounds(&self) -> Result<(), Error> {
        if self.holders.len() > MAX_HOLDERS {
            return Err(Error::ValidationError(format!(
                "holders array cannot exceed {} entries, got {}",
                MAX_HOLDERS,
                self.holders.len()
            )));
        }

        if self.holder_links.len() > MAX_HOLDER_LINKS {
            return Err(Error::ValidationError(format!(
                "holder links array cannot exceed {} entries, got {}",
                MAX_HOLDER_LINKS,
                self.holder_links.len()
            )));
        }

        if self.analysis_history.len() > AnalysisHistory::CAPACITY {
            return Err(Error::ValidationError(format!(
                "analysis history cannot exceed {} entries",
                AnalysisHistory::CAPACITY
            )));
        }

        if !(0.0..=100.0).contains(&self.decentralization_score) {
            return Err(Error::ValidationError(format!(
                "decentralization score {} outside [0, 100]",
                self.decentralization_score
            )));
        }

        Ok(())
    }
}
