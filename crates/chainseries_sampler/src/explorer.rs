//! Contract creation lookup against an Etherscan-compatible explorer API

use alloy::primitives::Address;
use async_trait::async_trait;
use chainseries_core::{CreationLookup, Height, ReadError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Upper bound on a single explorer request
pub const EXPLORER_TIMEOUT: Duration = Duration::from_secs(30);

/// Explorer connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorerConfig {
    /// Multichain API base, e.g. `https://api.etherscan.io/v2/api`
    pub base_url: String,
    pub api_key: String,
}

/// Raw explorer envelope: `result` is a list on success and a message otherwise
#[derive(Debug, Deserialize)]
pub struct ExplorerResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
    pub result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CreationRecord {
    #[serde(rename = "blockNumber")]
    block_number: String,
}

/// `getcontractcreation` client
#[derive(Clone)]
pub struct ExplorerClient {
    client: reqwest::Client,
    config: ExplorerConfig,
}

impl ExplorerClient {
    pub fn new(config: ExplorerConfig) -> Result<Self, ReadError> {
        let client = reqwest::Client::builder()
            .timeout(EXPLORER_TIMEOUT)
            .build()
            .map_err(|e| ReadError::Unavailable(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl CreationLookup for ExplorerClient {
    async fn creation_height(&self, contract: Address, chain_id: u64) -> Result<Height, ReadError> {
        debug!("Looking up creation of {} on chain {}", contract, chain_id);

        let query = [
            ("chainid", chain_id.to_string()),
            ("module", "contract".to_string()),
            ("action", "getcontractcreation".to_string()),
            ("contractaddresses", contract.to_string()),
            ("apikey", self.config.api_key.clone()),
        ];
        let response = self
            .client
            .get(&self.config.base_url)
            .query(&query)
            .send()
            .await
            .map_err(|e| ReadError::Unavailable(format!("Explorer request failed: {}", e)))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ReadError::RateLimited("Explorer returned 429".to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReadError::Unavailable(format!(
                "Explorer returned {}: {}",
                status, body
            )));
        }

        let body: ExplorerResponse = response
            .json()
            .await
            .map_err(|e| ReadError::InvalidResponse(format!("Explorer response: {}", e)))?;
        parse_creation_response(body, contract)
    }
}

/// Interpret a `getcontractcreation` response
pub fn parse_creation_response(body: ExplorerResponse, contract: Address) -> Result<Height, ReadError> {
    if body.status != "1" {
        let detail = body
            .result
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| body.message.clone());
        let lowered = detail.to_lowercase();
        return Err(if lowered.contains("rate limit") {
            ReadError::RateLimited(detail)
        } else if lowered.contains("no data") || body.message.to_lowercase().contains("no data") {
            ReadError::NotFound(format!("no creation record for {}", contract))
        } else {
            ReadError::CallFailed(format!("Explorer error: {} ({})", body.message, detail))
        });
    }

    let records: Vec<CreationRecord> = serde_json::from_value(body.result)
        .map_err(|e| ReadError::InvalidResponse(format!("Creation records: {}", e)))?;
    let record = records
        .first()
        .ok_or_else(|| ReadError::NotFound(format!("no creation record for {}", contract)))?;

    record.block_number.trim().parse::<Height>().map_err(|e| {
        ReadError::InvalidResponse(format!(
            "Bad creation block {:?} for {}: {}",
            record.block_number, contract, e
        ))
    })
}
