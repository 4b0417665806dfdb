//! Block-height sampling of on-chain sources: rate limiting, resume planning,
//! chunked collection and the EVM / explorer adapters

pub mod collector;
pub mod creation;
pub mod endpoint;
pub mod evm_client;
#[cfg(feature = "explorer")]
pub mod explorer;
pub mod planner;
pub mod rate_limiter;
pub mod row_reader;
pub mod sampler;
pub mod source_task;

pub use collector::{SourceOutcome, SourceSetCollector, WindowPolicy};
pub use creation::CreationHeights;
pub use endpoint::EndpointPool;
pub use evm_client::EvmReadApi;
#[cfg(feature = "explorer")]
pub use explorer::{ExplorerClient, ExplorerConfig};
pub use planner::{PlanError, ResumePlanner};
pub use rate_limiter::RateLimiter;
pub use sampler::{BlockSampler, SampleError};
pub use source_task::{sync_source, SamplingOptions, SourceError, SourceReport};

#[cfg(test)]
mod sampler_tests;
