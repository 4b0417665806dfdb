use crate::creation::CreationHeights;
use crate::rate_limiter::RateLimiter;
use crate::sampler::{BlockSampler, SampleError};
use crate::source_task::{sync_source, SamplingOptions, SourceError};
use alloy::{json_abi::JsonAbi, primitives::Address};
use chainseries_core::test_helpers::{
    mock_timestamp, MemorySeriesStore, MockCreationLookup, MockReadApi,
};
use chainseries_core::{
    BalanceProbe, FunctionSpec, ReadApi, ReadError, Sample, SamplingWindow, Series, SeriesStore,
    SourceDescriptor, SourceKind,
};
use std::sync::Arc;
use std::time::Duration;

pub(crate) fn function_source(name: &str, address_byte: u8, functions: &[&str]) -> SourceDescriptor {
    SourceDescriptor {
        name: name.to_string(),
        description: None,
        address: Address::repeat_byte(address_byte),
        chain_id: 1,
        kind: SourceKind::Functions {
            abi: Arc::new(JsonAbi::default()),
            functions: functions
                .iter()
                .map(|f| FunctionSpec {
                    name: f.to_string(),
                    args: Vec::new(),
                    column_names: vec![format!("{}_value", f)],
                })
                .collect(),
        },
    }
}

pub(crate) fn fast_options(stride: u64) -> SamplingOptions {
    SamplingOptions {
        stride,
        call_interval: Duration::ZERO,
        chunk_size: 500,
        freshness_threshold: stride,
    }
}

fn sampler() -> BlockSampler {
    BlockSampler::new(Arc::new(RateLimiter::new(Duration::ZERO)))
}

#[tokio::test]
async fn test_samples_every_stride_from_creation() {
    let source = function_source("pool", 0x01, &["totalSupply"]);
    let api: Arc<dyn ReadApi> = Arc::new(MockReadApi::new(210));
    let store = MemorySeriesStore::new();
    let creation = CreationHeights::new(Arc::new(
        MockCreationLookup::new().with_creation(source.address, 100),
    ));

    let report = sync_source(&source, api, &store, &creation, &fast_options(50), None)
        .await
        .unwrap();

    assert_eq!(report.series.heights(), vec![100, 150, 200]);
    assert_eq!(report.new_rows, 3);
    let row = report.series.get(150).unwrap();
    assert_eq!(row.timestamp, mock_timestamp(150));
    assert_eq!(row.value("totalSupply_value"), Some("150"));
    assert_eq!(store.load("pool").unwrap(), report.series);
}

#[tokio::test]
async fn test_failed_function_only_drops_its_columns() {
    let source = function_source("pool", 0x01, &["a", "b", "c"]);
    let api = MockReadApi::new(210).with_call_failure("b", 150);
    let window = SamplingWindow::new(100, 210, 50).unwrap();

    let series = sampler().sample(&source, window, &api).await.unwrap();

    assert_eq!(series.heights(), vec![100, 150, 200]);
    let row = series.get(150).unwrap();
    assert_eq!(row.value("a_value"), Some("150"));
    assert_eq!(row.value("b_value"), None);
    assert_eq!(row.value("c_value"), Some("150"));
    assert_eq!(series.get(200).unwrap().values.len(), 3);
}

#[tokio::test]
async fn test_unreadable_block_is_skipped() {
    let source = function_source("pool", 0x01, &["a"]);
    let api = MockReadApi::new(300).with_block_failure(150);
    let window = SamplingWindow::new(100, 300, 50).unwrap();

    let series = sampler().sample(&source, window, &api).await.unwrap();

    assert_eq!(series.heights(), vec![100, 200, 250, 300]);
    // No calls were made for the skipped height
    assert!(api.calls().iter().all(|(_, h)| *h != 150));
}

#[tokio::test]
async fn test_row_kept_when_every_call_fails() {
    let source = function_source("pool", 0x01, &["a", "b"]);
    let api = MockReadApi::new(10)
        .with_call_failure("a", 5)
        .with_call_failure("b", 5);
    let window = SamplingWindow::new(5, 5, 1).unwrap();

    let series = sampler().sample(&source, window, &api).await.unwrap();
    let row = series.get(5).unwrap();
    assert!(row.values.is_empty());
    assert_eq!(row.timestamp, mock_timestamp(5));
}

#[tokio::test]
async fn test_tuple_outputs_zip_with_columns() {
    let mut source = function_source("range", 0x02, &[]);
    source.kind = SourceKind::Functions {
        abi: Arc::new(JsonAbi::default()),
        functions: vec![FunctionSpec {
            name: "getRange".to_string(),
            args: vec!["7".to_string()],
            column_names: vec!["low".to_string(), "high".to_string()],
        }],
    };
    let api = MockReadApi::new(100).with_tuple("getRange", 2);
    let window = SamplingWindow::new(10, 10, 1).unwrap();

    let series = sampler().sample(&source, window, &api).await.unwrap();
    let row = series.get(10).unwrap();
    assert_eq!(row.value("low"), Some("10"));
    assert_eq!(row.value("high"), Some("11"));
}

#[tokio::test]
async fn test_balance_probe_reads_balance_of() {
    let source = SourceDescriptor {
        name: "vault_balance".to_string(),
        description: None,
        address: Address::repeat_byte(0x03),
        chain_id: 1,
        kind: SourceKind::BalanceProbe(BalanceProbe {
            token: Address::repeat_byte(0x04),
            column_name: "balance".to_string(),
        }),
    };
    let api = MockReadApi::new(100).with_call_failure("balanceOf", 20);
    let window = SamplingWindow::new(10, 30, 10).unwrap();

    let series = sampler().sample(&source, window, &api).await.unwrap();

    assert_eq!(series.heights(), vec![10, 20, 30]);
    assert_eq!(series.get(10).unwrap().value("balance"), Some("10"));
    assert_eq!(series.get(20).unwrap().value("balance"), None);
    assert!(api.calls().iter().all(|(f, _)| f == "balanceOf"));
}

#[tokio::test]
async fn test_outage_returns_partial_rows() {
    let source = function_source("pool", 0x01, &["a"]);
    let api = MockReadApi::new(1000).with_outage_from(130);
    let window = SamplingWindow::new(100, 200, 10).unwrap();

    match sampler().sample(&source, window, &api).await {
        Err(SampleError::Aborted {
            height,
            cause,
            partial,
        }) => {
            assert_eq!(height, 130);
            assert!(matches!(cause, ReadError::Unavailable(_)));
            assert_eq!(partial.heights(), vec![100, 110, 120]);
        }
        other => panic!("expected abort, got {:?}", other),
    }
}

#[tokio::test]
async fn test_outage_keeps_progress_for_next_run() {
    let source = function_source("pool", 0x01, &["a"]);
    let store = MemorySeriesStore::new();
    let creation = CreationHeights::new(Arc::new(
        MockCreationLookup::new().with_creation(source.address, 100),
    ));
    let mut options = fast_options(10);
    options.chunk_size = 2;

    let failing: Arc<dyn ReadApi> = Arc::new(MockReadApi::new(200).with_outage_from(150));
    let err = sync_source(&source, failing, &store, &creation, &options, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::Aborted { height: 150, saved_rows: 5, .. }));
    assert_eq!(store.load("pool").unwrap().heights(), vec![100, 110, 120, 130, 140]);

    // Next run resumes after the last persisted height and never re-reads it
    let healthy = Arc::new(MockReadApi::new(200));
    let report = sync_source(&source, healthy.clone(), &store, &creation, &options, None)
        .await
        .unwrap();
    assert_eq!(report.window.unwrap().start, 141);
    assert!(healthy.blocks_requested().iter().all(|h| *h > 140));
    assert_eq!(report.series.first_height(), Some(100));
    assert_eq!(report.series.last_height(), Some(191));
}

#[tokio::test]
async fn test_each_chunk_is_saved() {
    let source = function_source("pool", 0x01, &["a"]);
    let store = MemorySeriesStore::new();
    let creation = CreationHeights::new(Arc::new(
        MockCreationLookup::new().with_creation(source.address, 0),
    ));
    let mut options = fast_options(1);
    options.chunk_size = 4;

    let api: Arc<dyn ReadApi> = Arc::new(MockReadApi::new(9));
    let report = sync_source(&source, api, &store, &creation, &options, None)
        .await
        .unwrap();

    assert_eq!(report.new_rows, 10);
    // 0..=3, 4..=7, 8..=9
    assert_eq!(store.saves(), 3);
}

#[tokio::test]
async fn test_fresh_series_is_not_sampled() {
    let source = function_source("pool", 0x01, &["a"]);
    let persisted: Series = vec![Sample::new(180, mock_timestamp(180))].into_iter().collect();
    let store = MemorySeriesStore::new().with_series("pool", persisted.clone());
    let lookup = Arc::new(MockCreationLookup::new());
    let creation = CreationHeights::new(lookup.clone());
    let api = Arc::new(MockReadApi::new(210));

    let report = sync_source(&source, api.clone(), &store, &creation, &fast_options(50), None)
        .await
        .unwrap();

    assert!(report.is_fresh());
    assert_eq!(report.series, persisted);
    assert!(api.blocks_requested().is_empty());
    // Persisted data means the creation height is never needed
    assert_eq!(lookup.lookups(), 0);
    assert_eq!(store.saves(), 0);
}

#[tokio::test]
async fn test_requested_end_bounds_the_window() {
    let source = function_source("pool", 0x01, &["a"]);
    let store = MemorySeriesStore::new();
    let creation = CreationHeights::new(Arc::new(
        MockCreationLookup::new().with_creation(source.address, 100),
    ));
    let api: Arc<dyn ReadApi> = Arc::new(MockReadApi::new(10_000));

    let report = sync_source(&source, api, &store, &creation, &fast_options(25), Some(200))
        .await
        .unwrap();
    assert_eq!(report.series.heights(), vec![100, 125, 150, 175, 200]);
}

#[tokio::test]
async fn test_save_failure_fails_the_source() {
    let source = function_source("pool", 0x01, &["a"]);
    let store = MemorySeriesStore::failing();
    let creation = CreationHeights::new(Arc::new(
        MockCreationLookup::new().with_creation(source.address, 0),
    ));
    let api: Arc<dyn ReadApi> = Arc::new(MockReadApi::new(5));

    let err = sync_source(&source, api, &store, &creation, &fast_options(1), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::Save(_)));
}

#[tokio::test(start_paused = true)]
async fn test_heights_are_rate_limited() {
    let source = function_source("pool", 0x01, &["a", "b"]);
    let api = MockReadApi::new(100);
    let window = SamplingWindow::new(0, 3, 1).unwrap();
    let sampler = BlockSampler::new(Arc::new(RateLimiter::new(Duration::from_secs(2))));

    let start = tokio::time::Instant::now();
    let series = sampler.sample(&source, window, &api).await.unwrap();

    assert_eq!(series.len(), 4);
    // One slot per height, not per call
    assert!(tokio::time::Instant::now() - start >= Duration::from_secs(6));
    assert!(tokio::time::Instant::now() - start < Duration::from_secs(8));
}
