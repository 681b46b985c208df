use tracing::{info, instrument, warn};

use crate::chains::models::{Chain, ChainEntry, ChainsResponse};
use crate::client::JsonClient;
use crate::error::FetchError;

/// Lists the chains known to the aggregator that can actually be checked.
#[derive(Clone)]
pub struct ChainDirectory {
    client: JsonClient,
    base_url: String,
}

impl ChainDirectory {
    pub fn new(client: JsonClient, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn chains_url(&self) -> String {
        format!("{}/v1/chains", self.base_url)
    }

    /// Fetch and filter. An empty list is a valid answer.
    #[instrument(skip(self))]
    pub async fn list_checkable_chains(&self) -> Result<Vec<Chain>, FetchError> {
        let url = self.chains_url();
        info!(url = %url, "fetching chains from aggregator");

        let response: ChainsResponse = self.client.get_json(&url).await?;
        let chains = filter_checkable(response.chains);

        info!(count = chains.len(), "checkable chains resolved");
        Ok(chains)
    }
}

/// Keep chains that are enabled, online and expose at least one LCD endpoint.
/// Skipped chains are logged, never treated as errors.
pub fn filter_checkable(entries: Vec<ChainEntry>) -> Vec<Chain> {
    let mut chains = Vec::with_capacity(entries.len());

    for entry in entries {
        if !entry.enabled || !entry.online {
            warn!(
                chain = %entry.chain_name,
                enabled = entry.enabled,
                online = entry.online,
                "skipping chain"
            );
            continue;
        }

        let Some(endpoint) = entry.public_node_endpoints.cosmos_api.first() else {
            warn!(chain = %entry.chain_name, "no LCD endpoints configured");
            continue;
        };

        chains.push(Chain {
            name: entry.chain_name,
            node_endpoint: endpoint.trim_end_matches('/').to_string(),
            address_prefix: entry.node_info.bech32_config.main_prefix,
        });
    }

    chains
}
