//! Incremental sync of one source: plan, sample in chunks, merge and persist

use crate::creation::CreationHeights;
use crate::planner::{PlanError, ResumePlanner};
use crate::rate_limiter::RateLimiter;
use crate::sampler::{BlockSampler, SampleError};
use chainseries_core::{
    Height, ReadApi, ReadError, SamplingWindow, Series, SeriesStore, SourceDescriptor, StoreError,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Sampling parameters shared by every source of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingOptions {
    /// Blocks between consecutive samples
    pub stride: u64,
    /// Minimum delay between sampled heights on one endpoint
    pub call_interval: Duration,
    /// Heights sampled before each merge-and-save
    pub chunk_size: u64,
    /// Series whose last height is closer than this to the target end are left alone
    pub freshness_threshold: u64,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            stride: 100,
            call_interval: Duration::from_millis(100),
            chunk_size: 500,
            freshness_threshold: 100,
        }
    }
}

/// Successful sync of one source
#[derive(Debug, Clone)]
pub struct SourceReport {
    pub source: String,
    pub endpoint: String,
    /// `None` when the series was already fresh
    pub window: Option<SamplingWindow>,
    pub new_rows: usize,
    /// Merged series as persisted
    pub series: Series,
}

impl SourceReport {
    pub fn is_fresh(&self) -> bool {
        self.window.is_none()
    }
}

/// Why a source failed; siblings are unaffected
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to load persisted series: {0}")]
    Load(StoreError),
    #[error("Failed to save series: {0}")]
    Save(StoreError),
    #[error("Failed to read chain height: {0}")]
    ChainHeight(ReadError),
    #[error("Failed to resolve creation height: {0}")]
    CreationHeight(ReadError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error("Sampling aborted at block {height} after saving {saved_rows} new rows: {cause}")]
    Aborted {
        height: Height,
        saved_rows: usize,
        cause: ReadError,
    },
    #[error(transparent)]
    Sample(SampleError),
    #[error("Task failed: {0}")]
    TaskFailed(String),
}

/// Bring one source's persisted series up to date
pub async fn sync_source(
    source: &SourceDescriptor,
    api: Arc<dyn ReadApi>,
    store: &dyn SeriesStore,
    creation: &CreationHeights,
    options: &SamplingOptions,
    requested_end: Option<Height>,
) -> Result<SourceReport, SourceError> {
    let persisted = store.load(&source.name).map_err(SourceError::Load)?;
    let current_height = api
        .current_height()
        .await
        .map_err(SourceError::ChainHeight)?;

    let creation_height = if persisted.is_empty() {
        Some(
            creation
                .resolve(source.address, source.chain_id)
                .await
                .map_err(SourceError::CreationHeight)?,
        )
    } else {
        None
    };

    let planner = ResumePlanner::new(options.stride, options.freshness_threshold);
    let window = match planner.plan(&persisted, creation_height, current_height, requested_end)? {
        Some(window) => window,
        None => {
            info!(
                "{} is up to date (last block {:?}, head {})",
                source.name,
                persisted.last_height(),
                current_height
            );
            return Ok(SourceReport {
                source: source.name.clone(),
                endpoint: api.endpoint().to_string(),
                window: None,
                new_rows: 0,
                series: persisted,
            });
        }
    };

    info!(
        "Collecting {} from block {} to {} every {} blocks ({} heights) via {}",
        source.name,
        window.start,
        window.end,
        window.stride,
        window.len(),
        api.endpoint()
    );

    let sampler = BlockSampler::new(Arc::new(RateLimiter::new(options.call_interval)));
    let mut series = persisted;
    let mut new_rows = 0;

    for chunk in window.chunks(options.chunk_size) {
        match sampler.sample(source, chunk, api.as_ref()).await {
            Ok(sampled) => {
                if sampled.is_empty() {
                    debug!("{}: no rows in blocks {}..={}", source.name, chunk.start, chunk.end);
                    continue;
                }
                new_rows += sampled.len();
                series = store.merge(&series, &sampled);
                store.save(&source.name, &series).map_err(SourceError::Save)?;
                info!(
                    "{}: saved blocks {}..={} ({} rows total)",
                    source.name,
                    chunk.start,
                    chunk.end,
                    series.len()
                );
            }
            Err(SampleError::Aborted {
                height,
                cause,
                partial,
            }) => {
                if !partial.is_empty() {
                    new_rows += partial.len();
                    series = store.merge(&series, &partial);
                    store.save(&source.name, &series).map_err(SourceError::Save)?;
                }
                return Err(SourceError::Aborted {
                    height,
                    saved_rows: new_rows,
                    cause,
                });
            }
            Err(e) => return Err(SourceError::Sample(e)),
        }
    }

    Ok(SourceReport {
        source: source.name.clone(),
        endpoint: api.endpoint().to_string(),
        window: Some(window),
        new_rows,
        series,
    })
}
