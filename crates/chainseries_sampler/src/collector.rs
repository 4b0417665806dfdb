//! Concurrent collection over a set of sources with per-source failure isolation

use crate::creation::CreationHeights;
use crate::endpoint::EndpointPool;
use crate::source_task::{sync_source, SamplingOptions, SourceError, SourceReport};
use chainseries_core::{Height, SeriesStore, SourceDescriptor};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info};

/// Result of one source's task
pub type SourceOutcome = Result<SourceReport, SourceError>;

/// Run-wide window settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowPolicy {
    /// Sample up to this height instead of the chain head
    pub requested_end: Option<Height>,
}

/// Samples every source of a set concurrently
pub struct SourceSetCollector {
    endpoints: Arc<EndpointPool>,
    store: Arc<dyn SeriesStore>,
    creation: Arc<CreationHeights>,
    options: SamplingOptions,
}

impl SourceSetCollector {
    pub fn new(
        endpoints: Arc<EndpointPool>,
        store: Arc<dyn SeriesStore>,
        creation: Arc<CreationHeights>,
        options: SamplingOptions,
    ) -> Self {
        Self {
            endpoints,
            store,
            creation,
            options,
        }
    }

    pub fn options(&self) -> &SamplingOptions {
        &self.options
    }

    /// Sync all sources, at most `min(endpoints, sources)` at a time.
    ///
    /// Returns once every task has finished; a failing or panicking task is
    /// recorded under its source name and does not affect the others.
    pub async fn collect_all(
        &self,
        sources: &[SourceDescriptor],
        policy: WindowPolicy,
    ) -> BTreeMap<String, SourceOutcome> {
        let mut outcomes = BTreeMap::new();
        if sources.is_empty() {
            return outcomes;
        }

        let concurrency = self.endpoints.len().min(sources.len());
        info!(
            "Collecting {} sources with {} concurrent tasks",
            sources.len(),
            concurrency
        );
        let permits = Arc::new(Semaphore::new(concurrency));

        let mut handles = Vec::with_capacity(sources.len());
        for source in sources.iter().cloned() {
            let permits = permits.clone();
            let api = self.endpoints.next();
            let store = self.store.clone();
            let creation = self.creation.clone();
            let options = self.options;
            let name = source.name.clone();

            let handle = tokio::spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| SourceError::TaskFailed(e.to_string()))?;
                sync_source(
                    &source,
                    api,
                    store.as_ref(),
                    creation.as_ref(),
                    &options,
                    policy.requested_end,
                )
                .await
            });
            handles.push((name, handle));
        }

        for (name, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(SourceError::TaskFailed(e.to_string())),
            };
            match &outcome {
                Ok(report) => info!(
                    "{}: {} new rows, {} total",
                    name,
                    report.new_rows,
                    report.series.len()
                ),
                Err(e) => error!("{}: collection failed: {}", name, e),
            }
            outcomes.insert(name, outcome);
        }

        outcomes
    }
}
