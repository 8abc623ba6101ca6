use std::collections::HashSet;

use crate::{
    error::Error,
    helpers::canonical_address,
    model::{
        AnalysisSnapshot, Chain, Holder, HolderLink, SupplyDistribution, TokenLink,
        MAX_HOLDERS, MAX_HOLDER_LINKS,
    },
};

use super::{MapData, MapMetadata, MapNode, MetadataStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotLimits {
    pub max_holders: usize,
    pub max_holder_links: usize,
}

impl Default for SnapshotLimits {
    fn default() -> Self {
        SnapshotLimits {
            max_holders: MAX_HOLDERS,
            max_holder_links: MAX_HOLDER_LINKS,
        }
    }
}

/// Folds the two provider payloads into the derived state stored on a
/// `TokenAnalysis`. Holders are kept in provider order; links survive only
/// when both endpoints are kept holders. Holder and link addresses are put in
/// `chain`'s canonical form so links resolve against the deduplicated holders.
pub fn build_snapshot(
    data: MapData,
    metadata: MapMetadata,
    chain: Chain,
    limits: SnapshotLimits,
) -> Result<AnalysisSnapshot, Error> {
    if metadata.status == MetadataStatus::KO {
        return Err(Error::ProviderDataUnavailable(
            metadata
                .message
                .unwrap_or_else(|| String::from("Failed to fetch map metadata")),
        ));
    }

    let score = metadata.decentralisation_score;
    if !(0.0..=100.0).contains(&score) {
        return Err(Error::ProviderPayload(format!(
            "decentralisation score {} outside [0, 100]",
            score
        )));
    }

    let max_holders = limits.max_holders.min(MAX_HOLDERS);
    let max_holder_links = limits.max_holder_links.min(MAX_HOLDER_LINKS);
    let node_count = data.nodes.len();
    let addresses = data
        .nodes
        .iter()
        .map(|node| canonical_address(&node.address, chain))
        .collect::<Vec<_>>();

    let mut holder_links = Vec::new();
    for link in &data.links {
        if link.source >= node_count || link.target >= node_count {
            return Err(Error::ProviderPayload(format!(
                "link {} -> {} references a node outside 0..{}",
                link.source, link.target, node_count
            )));
        }

        if link.source >= max_holders
            || link.target >= max_holders
            || addresses[link.source] == addresses[link.target]
        {
            continue;
        }

        if holder_links.len() == max_holder_links {
            break;
        }

        let source = &data.nodes[link.source];
        let target = &data.nodes[link.target];
        holder_links.push(HolderLink {
            source_address: addresses[link.source].to_owned(),
            target_address: addresses[link.target].to_owned(),
            source_name: display_name(source),
            target_name: display_name(target),
            forward_amount: link.forward.max(0.0),
            backward_amount: link.backward.max(0.0),
        });
    }

    let mut seen = HashSet::new();
    let holders = data
        .nodes
        .iter()
        .zip(&addresses)
        .take(max_holders)
        .filter(|&(_, address)| seen.insert(address.as_str()))
        .map(|(node, address)| Holder {
            address: address.to_owned(),
            name: display_name(node),
            amount: node.amount,
            percentage: node.percentage.clamp(0.0, 100.0),
            is_contract: node.is_contract,
            transaction_count: node.transaction_count,
            transfer_count: node.transfer_count,
        })
        .collect::<Vec<_>>();

    let related_tokens = data
        .token_links
        .into_iter()
        .map(|token| TokenLink {
            address: token.address,
            name: token.name,
            symbol: token.symbol,
            decimals: token.decimals,
        })
        .collect();

    Ok(AnalysisSnapshot {
        name: data.full_name,
        symbol: data.symbol,
        version: data.version,
        is_nft: data.is_x721,
        decentralization_score: score,
        supply_distribution: SupplyDistribution {
            percent_in_cex: metadata.identified_supply.percent_in_cexs,
            percent_in_contracts: metadata
                .identified_supply
                .percent_in_contracts,
        },
        holders,
        holder_links,
        related_tokens,
    })
}

fn display_name(node: &MapNode) -> Option<String> {
    node.name
        .as_ref()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
}
