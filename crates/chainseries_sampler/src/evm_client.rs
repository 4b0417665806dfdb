//! EVM JSON-RPC read API backed by alloy

use alloy::{
    dyn_abi::{DynSolType, DynSolValue, FunctionExt, JsonAbiExt, Specifier},
    eips::{BlockId, BlockNumberOrTag},
    json_abi::{Function, JsonAbi},
    primitives::{hex, Address, Bytes},
    providers::{Provider, RootProvider},
    rpc::types::{TransactionInput, TransactionRequest},
    transports::{http::reqwest::Url, RpcError, TransportError, TransportErrorKind},
};
use async_trait::async_trait;
use chainseries_core::{BlockHeader, CallOutput, Height, ReadApi, ReadError};
use chrono::DateTime;

/// Read API over one HTTP JSON-RPC endpoint
pub struct EvmReadApi {
    label: String,
    provider: RootProvider,
}

impl EvmReadApi {
    /// Connect to `url`. Logs only show the host since RPC URLs often embed keys.
    pub fn connect(url: &str) -> Result<Self, ReadError> {
        let parsed: Url = url
            .parse()
            .map_err(|e| ReadError::Unavailable(format!("Invalid RPC URL: {}", e)))?;
        let label = parsed.host_str().unwrap_or("rpc").to_string();
        Ok(Self {
            label,
            provider: RootProvider::new_http(parsed),
        })
    }
}

#[async_trait]
impl ReadApi for EvmReadApi {
    fn endpoint(&self) -> &str {
        &self.label
    }

    async fn current_height(&self) -> Result<Height, ReadError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| map_transport_error("eth_blockNumber", e))
    }

    async fn block(&self, height: Height) -> Result<BlockHeader, ReadError> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(height))
            .await
            .map_err(|e| map_transport_error("eth_getBlockByNumber", e))?
            .ok_or_else(|| ReadError::NotFound(format!("block {}", height)))?;

        let timestamp = DateTime::from_timestamp(block.header.timestamp as i64, 0).ok_or_else(|| {
            ReadError::InvalidResponse(format!(
                "block {} has timestamp {} out of range",
                height, block.header.timestamp
            ))
        })?;

        Ok(BlockHeader { height, timestamp })
    }

    async fn call(
        &self,
        contract: Address,
        abi: &JsonAbi,
        function: &str,
        args: &[String],
        height: Height,
    ) -> Result<CallOutput, ReadError> {
        let function = resolve_function(abi, function, args.len())?;
        let input = encode_call(function, args)?;

        let request = TransactionRequest::default()
            .to(contract)
            .input(TransactionInput::new(Bytes::from(input)));
        let raw = self
            .provider
            .call(request)
            .block(BlockId::number(height))
            .await
            .map_err(|e| map_transport_error(&function.name, e))?;

        let outputs = function
            .abi_decode_output(&raw)
            .map_err(|e| ReadError::InvalidResponse(format!("{}: {}", function.name, e)))?;
        Ok(call_output(outputs))
    }
}

/// Find the overload of `name` taking `arity` inputs
fn resolve_function<'a>(abi: &'a JsonAbi, name: &str, arity: usize) -> Result<&'a Function, ReadError> {
    abi.function(name)
        .and_then(|overloads| overloads.iter().find(|f| f.inputs.len() == arity))
        .ok_or_else(|| {
            ReadError::CallFailed(format!("ABI has no function {} taking {} arguments", name, arity))
        })
}

/// ABI-encode textual arguments against the function's input types
fn encode_call(function: &Function, args: &[String]) -> Result<Vec<u8>, ReadError> {
    let values = function
        .inputs
        .iter()
        .zip(args)
        .map(|(param, raw)| {
            let ty: DynSolType = param.resolve()?;
            ty.coerce_str(raw)
        })
        .collect::<Result<Vec<DynSolValue>, _>>()
        .map_err(|e| ReadError::CallFailed(format!("{}: bad argument: {}", function.name, e)))?;

    function
        .abi_encode_input(&values)
        .map_err(|e| ReadError::CallFailed(format!("{}: {}", function.name, e)))
}

/// Multiple outputs, or a single struct output, become a tuple
fn call_output(mut outputs: Vec<DynSolValue>) -> CallOutput {
    if outputs.len() == 1 {
        return match outputs.remove(0) {
            DynSolValue::Tuple(fields) => CallOutput::Tuple(fields.iter().map(render_value).collect()),
            value => CallOutput::Scalar(render_value(&value)),
        };
    }
    CallOutput::Tuple(outputs.iter().map(render_value).collect())
}

/// Decimal integers, checksummed addresses, 0x-hex bytes, bracketed lists
pub fn render_value(value: &DynSolValue) -> String {
    match value {
        DynSolValue::Bool(b) => b.to_string(),
        DynSolValue::Int(i, _) => i.to_string(),
        DynSolValue::Uint(u, _) => u.to_string(),
        DynSolValue::Address(a) => a.to_checksum(None),
        DynSolValue::FixedBytes(word, size) => hex::encode_prefixed(&word[..*size]),
        DynSolValue::Bytes(bytes) => hex::encode_prefixed(bytes),
        DynSolValue::String(s) => s.clone(),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
            let inner: Vec<String> = items.iter().map(render_value).collect();
            format!("[{}]", inner.join(", "))
        }
        other => format!("{:?}", other),
    }
}

fn map_transport_error(context: &str, err: TransportError) -> ReadError {
    match &err {
        RpcError::Transport(TransportErrorKind::HttpError(http)) if http.status == 429 => {
            ReadError::RateLimited(format!("{}: {}", context, err))
        }
        RpcError::Transport(_) => ReadError::Unavailable(format!("{}: {}", context, err)),
        RpcError::ErrorResp(payload) if payload.code == 429 => {
            ReadError::RateLimited(format!("{}: {}", context, err))
        }
        RpcError::ErrorResp(_) => ReadError::CallFailed(format!("{}: {}", context, err)),
        RpcError::NullResp => ReadError::NotFound(format!("{}: null response", context)),
        _ => ReadError::InvalidResponse(format!("{}: {}", context, err)),
    }
}
