//! Artifact cache keys
//!
//! Map keys embed the analysis timestamp, so a refresh changes the key and
//! older renders simply age out of the cache.

use chrono::{DateTime, Utc};

use crate::{helpers::canonical_address, model::Chain};

pub const MAP_PREFIX: &str = "map";
pub const CARD_PREFIX: &str = "card";

pub fn map_key(address: &str, chain: Chain, updated_at: DateTime<Utc>) -> String {
    let material = format!(
        "{}-{}-{}",
        canonical_address(address, chain),
        chain,
        updated_at.timestamp_millis()
    );
    format!("{}:{}", MAP_PREFIX, sha256::digest(material))
}

pub fn card_key(chain: Chain, address: &str) -> String {
    let material = format!("{}:{}", chain, canonical_address(address, chain));
    format!("{}:{}", CARD_PREFIX, sha256::digest(material))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ts;

    const ADDRESS: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";

    #[test]
    fn map_key_is_deterministic() {
        assert_eq!(
            map_key(ADDRESS, Chain::Eth, ts(0)),
            map_key(ADDRESS, Chain::Eth, ts(0))
        );
        assert!(map_key(ADDRESS, Chain::Eth, ts(0)).starts_with("map:"));
    }

    #[test]
    fn map_key_changes_with_timestamp_and_chain() {
        let base = map_key(ADDRESS, Chain::Eth, ts(0));
        assert_ne!(base, map_key(ADDRESS, Chain::Eth, ts(1)));
        assert_ne!(base, map_key(ADDRESS, Chain::Bsc, ts(0)));
    }

    #[test]
    fn card_key_ignores_address_case() {
        assert_eq!(
            card_key(Chain::Eth, ADDRESS),
            card_key(Chain::Eth, &ADDRESS.to_uppercase())
        );
        assert_ne!(card_key(Chain::Eth, ADDRESS), card_key(Chain::Base, ADDRESS));
    }

    #[test]
    fn solana_keys_keep_address_case() {
        let lower = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
        let upper = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1V";

        assert_ne!(card_key(Chain::Sol, lower), card_key(Chain::Sol, upper));
        assert_ne!(
            map_key(lower, Chain::Sol, ts(0)),
            map_key(upper, Chain::Sol, ts(0))
        );
    }
}
