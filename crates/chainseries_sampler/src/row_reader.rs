//! Per-height row bodies: tracked view functions or a token balance probe

use alloy::{json_abi::JsonAbi, primitives::Address};
use async_trait::async_trait;
use chainseries_core::{
    FunctionSpec, Height, ReadApi, ReadError, SourceDescriptor, SourceKind,
};
use std::sync::Arc;
use tracing::warn;

/// Minimal ERC-20 ABI for balance probes
const ERC20_BALANCE_ABI: &str = r#"[
    {
        "type": "function",
        "name": "balanceOf",
        "stateMutability": "view",
        "inputs": [{ "name": "account", "type": "address", "internalType": "address" }],
        "outputs": [{ "name": "", "type": "uint256", "internalType": "uint256" }]
    }
]"#;

/// Reads the value columns of one row
#[async_trait]
pub trait RowReader: Send + Sync {
    /// Columns read at `height`. Failed reads are left out of the row;
    /// only fatal (connectivity) errors are returned.
    async fn read_row(
        &self,
        api: &dyn ReadApi,
        height: Height,
    ) -> Result<Vec<(String, String)>, ReadError>;
}

/// Build the reader matching a source's kind
pub fn row_reader_for(source: &SourceDescriptor) -> Result<Box<dyn RowReader>, ReadError> {
    match &source.kind {
        SourceKind::Functions { abi, functions } => Ok(Box::new(FunctionRowReader {
            source: source.name.clone(),
            contract: source.address,
            abi: abi.clone(),
            functions: functions.clone(),
        })),
        SourceKind::BalanceProbe(probe) => {
            let abi: JsonAbi = serde_json::from_str(ERC20_BALANCE_ABI)
                .map_err(|e| ReadError::InvalidResponse(format!("ERC-20 ABI: {}", e)))?;
            Ok(Box::new(BalanceRowReader {
                source: source.name.clone(),
                token: probe.token,
                holder: source.address,
                column_name: probe.column_name.clone(),
                abi: Arc::new(abi),
            }))
        }
    }
}

/// Calls every tracked function on the source contract
pub struct FunctionRowReader {
    source: String,
    contract: Address,
    abi: Arc<JsonAbi>,
    functions: Vec<FunctionSpec>,
}

#[async_trait]
impl RowReader for FunctionRowReader {
    async fn read_row(
        &self,
        api: &dyn ReadApi,
        height: Height,
    ) -> Result<Vec<(String, String)>, ReadError> {
        let mut values = Vec::new();
        for function in &self.functions {
            match api
                .call(self.contract, &self.abi, &function.name, &function.args, height)
                .await
            {
                Ok(output) => values.extend(output.bind(&function.column_names)),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(
                        "{}: {} failed at block {}: {}",
                        self.source, function.name, height, e
                    );
                }
            }
        }
        Ok(values)
    }
}

/// Reads `balanceOf(holder)` on the token contract
pub struct BalanceRowReader {
    source: String,
    token: Address,
    holder: Address,
    column_name: String,
    abi: Arc<JsonAbi>,
}

#[async_trait]
impl RowReader for BalanceRowReader {
    async fn read_row(
        &self,
        api: &dyn ReadApi,
        height: Height,
    ) -> Result<Vec<(String, String)>, ReadError> {
        let args = [self.holder.to_string().to_lowercase()];
        match api
            .call(self.token, &self.abi, "balanceOf", &args, height)
            .await
        {
            Ok(output) => Ok(output.bind(std::slice::from_ref(&self.column_name))),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!("{}: balanceOf failed at block {}: {}", self.source, height, e);
                Ok(Vec::new())
            }
        }
    }
}
