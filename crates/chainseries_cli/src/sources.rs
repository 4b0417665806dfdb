//! Asset-group definitions loaded from the sources TOML file

use alloy::{json_abi::JsonAbi, primitives::Address};
use chainseries_core::{
    is_valid_source_name, AssetGroup, BalanceProbe, FunctionSpec, SourceDescriptor, SourceKind,
    DEFAULT_BALANCE_COLUMN,
};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourcesError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid sources file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Invalid ABI file {}: {reason}", .path.display())]
    Abi { path: PathBuf, reason: String },
    #[error("Group {group}: {reason}")]
    Invalid { group: String, reason: String },
    #[error("Unknown group {0}")]
    UnknownGroup(String),
}

#[derive(Debug, Deserialize)]
struct SourcesFile {
    #[serde(default)]
    groups: BTreeMap<String, GroupEntry>,
}

#[derive(Debug, Deserialize)]
struct GroupEntry {
    chain_id: u64,
    stride: Option<u64>,
    #[serde(default)]
    contracts: Vec<ContractEntry>,
    #[serde(default)]
    balances: Vec<BalanceEntry>,
}

#[derive(Debug, Deserialize)]
struct ContractEntry {
    name: String,
    description: Option<String>,
    address: String,
    /// Relative to the sources file
    abi_file: PathBuf,
    #[serde(default)]
    functions: Vec<FunctionEntry>,
}

#[derive(Debug, Deserialize)]
struct FunctionEntry {
    name: String,
    #[serde(default)]
    params: Vec<toml::Value>,
    column_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct BalanceEntry {
    name: String,
    description: Option<String>,
    token_address: String,
    holder_address: String,
    column_name: Option<String>,
}

/// Load and validate every group in `path`
pub fn load_groups(path: &Path) -> Result<Vec<AssetGroup>, SourcesError> {
    let content = fs::read_to_string(path).map_err(|source| SourcesError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    parse_groups(&content, base_dir).map_err(|e| match e {
        SourcesError::Parse { source, .. } => SourcesError::Parse {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })
}

/// Find a group by name, ignoring case
pub fn find_group(groups: Vec<AssetGroup>, name: &str) -> Result<AssetGroup, SourcesError> {
    groups
        .into_iter()
        .find(|g| g.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| SourcesError::UnknownGroup(name.to_string()))
}

fn parse_groups(content: &str, base_dir: &Path) -> Result<Vec<AssetGroup>, SourcesError> {
    let file: SourcesFile = toml::from_str(content).map_err(|source| SourcesError::Parse {
        path: PathBuf::new(),
        source,
    })?;

    let mut abis = AbiCache::new(base_dir);
    file.groups
        .into_iter()
        .map(|(name, entry)| build_group(name, entry, &mut abis))
        .collect()
}

fn build_group(
    name: String,
    entry: GroupEntry,
    abis: &mut AbiCache,
) -> Result<AssetGroup, SourcesError> {
    let invalid = |reason: String| SourcesError::Invalid {
        group: name.clone(),
        reason,
    };

    let mut sources = Vec::with_capacity(entry.contracts.len() + entry.balances.len());
    for contract in entry.contracts {
        let address = parse_address(&contract.address).map_err(&invalid)?;
        let abi = abis.load(&contract.abi_file)?;

        if contract.functions.is_empty() {
            return Err(invalid(format!("{} tracks no functions", contract.name)));
        }
        let mut functions = Vec::with_capacity(contract.functions.len());
        for function in contract.functions {
            functions.push(
                build_function(&abi, function)
                    .map_err(|reason| invalid(format!("{}: {}", contract.name, reason)))?,
            );
        }

        sources.push(SourceDescriptor {
            name: contract.name,
            description: contract.description,
            address,
            chain_id: entry.chain_id,
            kind: SourceKind::Functions { abi, functions },
        });
    }

    for balance in entry.balances {
        let token = parse_address(&balance.token_address).map_err(&invalid)?;
        let holder = parse_address(&balance.holder_address).map_err(&invalid)?;
        let column_name = balance
            .column_name
            .unwrap_or_else(|| DEFAULT_BALANCE_COLUMN.to_string());
        if column_name.is_empty() {
            return Err(invalid(format!("{} has an empty column name", balance.name)));
        }

        sources.push(SourceDescriptor {
            name: balance.name,
            description: balance.description,
            address: holder,
            chain_id: entry.chain_id,
            kind: SourceKind::BalanceProbe(BalanceProbe { token, column_name }),
        });
    }

    let mut seen = HashSet::new();
    for source in &sources {
        if !is_valid_source_name(&source.name) {
            return Err(invalid(format!("invalid source name {:?}", source.name)));
        }
        if !seen.insert(source.name.as_str()) {
            return Err(invalid(format!("duplicate source name {}", source.name)));
        }
    }

    Ok(AssetGroup {
        name,
        chain_id: entry.chain_id,
        stride: entry.stride,
        sources,
    })
}

fn build_function(abi: &JsonAbi, entry: FunctionEntry) -> Result<FunctionSpec, String> {
    if entry.column_names.is_empty() || entry.column_names.iter().any(|c| c.is_empty()) {
        return Err(format!("{} needs non-empty column names", entry.name));
    }

    let args = entry
        .params
        .iter()
        .map(param_to_string)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("{}: {}", entry.name, e))?;

    let overloads = abi
        .function(&entry.name)
        .ok_or_else(|| format!("{} is not in the ABI", entry.name))?;
    if !overloads.iter().any(|f| f.inputs.len() == args.len()) {
        return Err(format!(
            "{} takes no overload with {} parameters",
            entry.name,
            args.len()
        ));
    }

    Ok(FunctionSpec {
        name: entry.name,
        args,
        column_names: entry.column_names,
    })
}

fn param_to_string(value: &toml::Value) -> Result<String, String> {
    match value {
        toml::Value::String(s) => Ok(s.clone()),
        toml::Value::Integer(i) => Ok(i.to_string()),
        toml::Value::Boolean(b) => Ok(b.to_string()),
        other => Err(format!("unsupported parameter {}", other)),
    }
}

fn parse_address(raw: &str) -> Result<Address, String> {
    raw.parse()
        .map_err(|e| format!("invalid address {:?}: {}", raw, e))
}

/// ABI files shared between contracts are parsed once
struct AbiCache<'a> {
    base_dir: &'a Path,
    loaded: HashMap<PathBuf, Arc<JsonAbi>>,
}

impl<'a> AbiCache<'a> {
    fn new(base_dir: &'a Path) -> Self {
        Self {
            base_dir,
            loaded: HashMap::new(),
        }
    }

    fn load(&mut self, relative: &Path) -> Result<Arc<JsonAbi>, SourcesError> {
        let path = self.base_dir.join(relative);
        if let Some(abi) = self.loaded.get(&path) {
            return Ok(abi.clone());
        }

        let content = fs::read_to_string(&path).map_err(|source| SourcesError::Io {
            path: path.clone(),
            source,
        })?;
        let abi = Arc::new(parse_abi(&content).map_err(|reason| SourcesError::Abi {
            path: path.clone(),
            reason,
        })?);
        self.loaded.insert(path, abi.clone());
        Ok(abi)
    }
}

/// Accepts a bare ABI array or a compiler artifact with an `abi` field
fn parse_abi(content: &str) -> Result<JsonAbi, String> {
    let value: serde_json::Value = serde_json::from_str(content).map_err(|e| e.to_string())?;
    let abi = match value {
        serde_json::Value::Object(mut artifact) => artifact
            .remove("abi")
            .ok_or_else(|| "object without an abi field".to_string())?,
        other => other,
    };
    serde_json::from_value(abi).map_err(|e| e.to_string())
}
