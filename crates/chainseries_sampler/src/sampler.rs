//! Block sampler: one row per sampled height, rate limited

use crate::rate_limiter::RateLimiter;
use crate::row_reader::row_reader_for;
use chainseries_core::{
    Height, ReadApi, ReadError, Sample, SamplingWindow, Series, SourceDescriptor,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum SampleError {
    #[error("Cannot sample {source_name}: {cause}")]
    InvalidSource { source_name: String, cause: ReadError },
    /// Connectivity was lost; `partial` holds the rows read before `height`
    #[error("Sampling aborted at block {height}: {cause}")]
    Aborted {
        height: Height,
        cause: ReadError,
        partial: Series,
    },
}

/// Samples a source at every height of a window
pub struct BlockSampler {
    limiter: Arc<RateLimiter>,
}

impl BlockSampler {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }

    /// Produce a series for `window`. Heights whose block cannot be fetched are
    /// skipped, failed function calls only drop their own columns.
    pub async fn sample(
        &self,
        source: &SourceDescriptor,
        window: SamplingWindow,
        api: &dyn ReadApi,
    ) -> Result<Series, SampleError> {
        let reader = row_reader_for(source).map_err(|cause| SampleError::InvalidSource {
            source_name: source.name.clone(),
            cause,
        })?;

        debug!(
            "Sampling {} over blocks {}..={} (stride {}) via {}",
            source.name,
            window.start,
            window.end,
            window.stride,
            api.endpoint()
        );

        let mut series = Series::new();
        for height in window.heights() {
            self.limiter.wait_for_slot().await;

            let header = match api.block(height).await {
                Ok(header) => header,
                Err(cause) if cause.is_fatal() => {
                    return Err(SampleError::Aborted {
                        height,
                        cause,
                        partial: series,
                    })
                }
                Err(e) => {
                    warn!("{}: skipping block {}: {}", source.name, height, e);
                    continue;
                }
            };

            let values = match reader.read_row(api, height).await {
                Ok(values) => values,
                Err(cause) => {
                    return Err(SampleError::Aborted {
                        height,
                        cause,
                        partial: series,
                    })
                }
            };

            series.insert(Sample {
                height,
                timestamp: header.timestamp,
                values,
            });
        }

        Ok(series)
    }
}
