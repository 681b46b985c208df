use serde::{Deserialize, Serialize};

/// A chain retained for checking. Built once per run from the aggregator's
/// chain list and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    pub name: String,
    /// Base URL of the chain's LCD (REST) endpoint, without trailing slash
    pub node_endpoint: String,
    /// Bech32 human-readable prefix of account addresses
    pub address_prefix: String,
}

// ========== AGGREGATOR RESPONSE MODELS ==========

#[derive(Debug, Deserialize)]
pub struct ChainsResponse {
    #[serde(default)]
    pub chains: Vec<ChainEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ChainEntry {
    pub chain_name: String,

    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub online: bool,

    #[serde(default)]
    pub public_node_endpoints: NodeEndpoints,
    #[serde(default)]
    pub node_info: NodeInfo,
}

#[derive(Debug, Default, Deserialize)]
pub struct NodeEndpoints {
    #[serde(default)]
    pub cosmos_api: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NodeInfo {
    #[serde(default)]
    pub bech32_config: Bech32Config,
}

#[derive(Debug, Default, Deserialize)]
pub struct Bech32Config {
    #[serde(default)]
    pub main_prefix: String,
}
