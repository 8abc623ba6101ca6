use serde::Deserialize;

/// Holder graph as returned by the `map-data` endpoint. Link endpoints are
/// indices into `nodes`. Fields the analysis does not use are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct MapData {
    #[serde(default)]
    pub version: i32,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default, rename = "is_X721")]
    pub is_x721: bool,
    #[serde(default)]
    pub nodes: Vec<MapNode>,
    #[serde(default)]
    pub links: Vec<MapLink>,
    #[serde(default)]
    pub token_links: Vec<MapTokenLink>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapNode {
    pub address: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub is_contract: bool,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub percentage: f64,
    #[serde(default)]
    pub transaction_count: u64,
    #[serde(default)]
    pub transfer_count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapLink {
    pub source: usize,
    pub target: usize,
    #[serde(default)]
    pub forward: f64,
    #[serde(default)]
    pub backward: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapTokenLink {
    pub address: String,
    #[serde(default)]
    pub decimals: Option<u8>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
}
