//! Dune table upload API client

use async_trait::async_trait;
use chainseries_core::{ColumnSchema, Series, TableStatus, Warehouse, WarehouseError};
use chainseries_store::encode_series_with_columns;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Largest CSV payload accepted by a single insert
pub const MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;

/// Upper bound on a single upload request
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Warehouse connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuneConfig {
    /// API base, e.g. `https://api.dune.com/api/v1`
    pub base_url: String,
    pub api_key: String,
    /// Namespace owning the tables
    pub namespace: String,
}

#[derive(Debug, Serialize)]
struct CreateTableRequest<'a> {
    namespace: &'a str,
    table_name: &'a str,
    description: &'a str,
    schema: Vec<ColumnSpec<'a>>,
    is_private: bool,
}

#[derive(Debug, Serialize)]
struct ColumnSpec<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    column_type: &'static str,
    nullable: bool,
}

#[derive(Debug, Deserialize)]
struct CreateTableResponse {
    #[serde(default)]
    already_existed: bool,
}

#[derive(Debug, Deserialize)]
struct InsertResponse {
    rows_written: u64,
    #[serde(default)]
    bytes_written: u64,
}

/// HTTP client for Dune uploads
#[derive(Clone)]
pub struct DuneClient {
    client: reqwest::Client,
    config: DuneConfig,
}

impl DuneClient {
    pub fn new(config: DuneConfig) -> Result<Self, WarehouseError> {
        if config.api_key.is_empty() {
            return Err(WarehouseError::Configuration(
                "warehouse API key is not set".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .build()
            .map_err(|e| WarehouseError::HttpError(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    fn request_builder(&self, url: String) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("X-DUNE-API-KEY", &self.config.api_key)
    }

    fn table_url(&self, table: &str) -> String {
        format!(
            "{}/table/{}/{}/insert",
            self.config.base_url.trim_end_matches('/'),
            self.config.namespace,
            table
        )
    }
}

#[async_trait]
impl Warehouse for DuneClient {
    async fn ensure_table(
        &self,
        table: &str,
        description: &str,
        schema: &[ColumnSchema],
    ) -> Result<TableStatus, WarehouseError> {
        let body = CreateTableRequest {
            namespace: &self.config.namespace,
            table_name: table,
            description,
            schema: schema
                .iter()
                .map(|c| ColumnSpec {
                    name: &c.name,
                    column_type: c.column_type.as_str(),
                    nullable: c.nullable,
                })
                .collect(),
            is_private: false,
        };
        let url = format!("{}/table/create", self.config.base_url.trim_end_matches('/'));

        let response = self
            .request_builder(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| WarehouseError::HttpError(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 409 {
            return Ok(TableStatus::AlreadyExists);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if body.to_lowercase().contains("already exists") {
                return Ok(TableStatus::AlreadyExists);
            }
            return Err(WarehouseError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let created: CreateTableResponse = response
            .json()
            .await
            .map_err(|e| WarehouseError::HttpError(format!("Invalid create response: {}", e)))?;
        Ok(if created.already_existed {
            TableStatus::AlreadyExists
        } else {
            TableStatus::Created
        })
    }

    async fn append_rows(
        &self,
        table: &str,
        columns: &[String],
        rows: &Series,
    ) -> Result<u64, WarehouseError> {
        let payload = encode_series_with_columns(rows, columns)
            .map_err(|e| WarehouseError::Encoding(e.to_string()))?;
        if payload.len() > MAX_UPLOAD_BYTES {
            return Err(WarehouseError::Encoding(format!(
                "payload of {} bytes exceeds the {} byte upload limit",
                payload.len(),
                MAX_UPLOAD_BYTES
            )));
        }

        let response = self
            .request_builder(self.table_url(table))
            .header("Content-Type", "text/csv")
            .body(payload)
            .send()
            .await
            .map_err(|e| WarehouseError::HttpError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WarehouseError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let inserted: InsertResponse = response
            .json()
            .await
            .map_err(|e| WarehouseError::HttpError(format!("Invalid insert response: {}", e)))?;
        debug!(
            "Inserted {} rows ({} bytes) into {}.{}",
            inserted.rows_written, inserted.bytes_written, self.config.namespace, table
        );
        Ok(inserted.rows_written)
    }
}
