use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum MetadataStatus {
    OK,
    KO,
}

/// Response of the `map-metadata` endpoint. A `KO` status is a logical
/// failure even when the HTTP status is 200.
#[derive(Debug, Clone, Deserialize)]
pub struct MapMetadata {
    #[serde(default)]
    pub decentralisation_score: f64,
    #[serde(default)]
    pub identified_supply: IdentifiedSupply,
    pub status: MetadataStatus,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct IdentifiedSupply {
    #[serde(default)]
    pub percent_in_cexs: f64,
    #[serde(default)]
    pub percent_in_contracts: f64,
}
