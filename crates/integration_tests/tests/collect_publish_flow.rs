use chainseries_core::test_helpers::{MockCreationLookup, MockReadApi, MockWarehouse};
use chainseries_core::{AssetGroup, ReadApi, SeriesStore};
use chainseries_sampler::{
    sync_source, CreationHeights, EndpointPool, SourceError, SourceSetCollector, WindowPolicy,
};
use chainseries_warehouse::{PublishOutcome, WarehousePublisher};
use integration_tests::{function_source, options, DataDir};
use std::sync::Arc;

#[tokio::test]
async fn test_collect_publish_and_resume_on_disk() {
    let data = DataDir::new();
    let source = function_source("lp_eth_pool", 0x01, &["totalSupply"]);
    let group = AssetGroup {
        name: "ETH".to_string(),
        chain_id: 1,
        stride: Some(50),
        sources: vec![source.clone()],
    };
    let table = group.table_name(&source.name);
    assert_eq!(table, "lp_eth_pool_eth");

    let creation = CreationHeights::new(Arc::new(
        MockCreationLookup::new().with_creation(source.address, 100),
    ))
    .with_state(data.state.clone());

    // First collection backfills from the creation height
    let api: Arc<dyn ReadApi> = Arc::new(MockReadApi::new(300));
    let report = sync_source(&source, api, data.store.as_ref(), &creation, &options(50), None)
        .await
        .unwrap();
    assert_eq!(report.series.heights(), vec![100, 150, 200, 250, 300]);

    let csv = std::fs::read_to_string(data.dir.path().join("lp_eth_pool.csv")).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("block_number,timestamp,totalSupply_value"));
    assert!(lines.next().unwrap().starts_with("100,"));

    // A short write fails the publish without touching local data or the cursor
    let flaky = Arc::new(MockWarehouse::new().with_short_writes(1));
    let outcome = WarehousePublisher::new(flaky)
        .with_cursors(data.state.clone())
        .publish(&table, "LP-ETH pool", &report.series)
        .await;
    assert!(!outcome.is_success());
    assert_eq!(data.state.publish_cursor(&table).unwrap(), None);
    assert_eq!(data.store.load(&source.name).unwrap(), report.series);

    // Re-running at the same head samples nothing
    let idle = Arc::new(MockReadApi::new(300));
    let report = sync_source(
        &source,
        idle.clone(),
        data.store.as_ref(),
        &creation,
        &options(50),
        None,
    )
    .await
    .unwrap();
    assert!(report.is_fresh());
    assert!(idle.blocks_requested().is_empty());

    // A healthy warehouse takes everything, then only what is new
    let warehouse = Arc::new(MockWarehouse::new());
    let publisher = WarehousePublisher::new(warehouse.clone()).with_cursors(data.state.clone());
    assert_eq!(
        publisher.publish(&table, "LP-ETH pool", &report.series).await,
        PublishOutcome::Published { rows: 5 }
    );

    let api: Arc<dyn ReadApi> = Arc::new(MockReadApi::new(400));
    let report = sync_source(&source, api, data.store.as_ref(), &creation, &options(50), None)
        .await
        .unwrap();
    assert_eq!(report.new_rows, 2);
    assert_eq!(report.series.last_height(), Some(351));

    assert_eq!(
        publisher.publish(&table, "LP-ETH pool", &report.series).await,
        PublishOutcome::Published { rows: 2 }
    );
    assert_eq!(warehouse.appended().last().unwrap().1.heights(), vec![301, 351]);
    assert_eq!(data.state.publish_cursor(&table).unwrap(), Some(351));
}

#[tokio::test]
async fn test_creation_height_survives_restart() {
    let data = DataDir::new();
    let source = function_source("slp_eth", 0x02, &["totalSupply"]);

    let first = CreationHeights::new(Arc::new(
        MockCreationLookup::new().with_creation(source.address, 120),
    ))
    .with_state(data.state.clone());
    assert_eq!(first.resolve(source.address, 1).await.unwrap(), 120);

    // A later process with a broken explorer still knows the height
    let broken = Arc::new(MockCreationLookup::new().with_failure(source.address));
    let second = CreationHeights::new(broken.clone()).with_state(data.state.clone());
    assert_eq!(second.resolve(source.address, 1).await.unwrap(), 120);
    assert_eq!(broken.lookups(), 0);
}

#[tokio::test]
async fn test_outage_keeps_partial_rows_and_resumes() {
    let data = DataDir::new();
    let source = function_source("usd_cdp_vault", 0x03, &["spotPrice"]);
    let creation = CreationHeights::new(Arc::new(
        MockCreationLookup::new().with_creation(source.address, 100),
    ));

    // The endpoint drops out at block 140: rows up to 130 are kept
    let failing: Arc<dyn ReadApi> = Arc::new(MockReadApi::new(200).with_outage_from(140));
    let err = sync_source(&source, failing, data.store.as_ref(), &creation, &options(10), None)
        .await
        .unwrap_err();
    match err {
        SourceError::Aborted {
            height, saved_rows, ..
        } => {
            assert_eq!(height, 140);
            assert_eq!(saved_rows, 4);
        }
        other => panic!("expected an aborted sync, got {:?}", other),
    }
    assert_eq!(
        data.store.load(&source.name).unwrap().heights(),
        vec![100, 110, 120, 130]
    );

    let healthy = Arc::new(MockReadApi::new(200));
    let report = sync_source(
        &source,
        healthy.clone(),
        data.store.as_ref(),
        &creation,
        &options(10),
        None,
    )
    .await
    .unwrap();
    // Resumes one past the last persisted height
    assert_eq!(healthy.blocks_requested().first(), Some(&131));
    assert_eq!(report.series.len(), 11);
}

#[tokio::test]
async fn test_group_collection_isolates_failures() {
    let data = DataDir::new();
    let a = function_source("source_a", 0x0a, &["totalSupply"]);
    let b = function_source("source_b", 0x0b, &["totalSupply"]);
    let c = function_source("source_c", 0x0c, &["totalSupply"]);

    let lookup = MockCreationLookup::new()
        .with_creation(a.address, 100)
        .with_failure(b.address)
        .with_creation(c.address, 100);
    let endpoints: Vec<Arc<dyn ReadApi>> = vec![
        Arc::new(MockReadApi::new(200).with_label("rpc-1")),
        Arc::new(MockReadApi::new(200).with_label("rpc-2")),
    ];
    let collector = SourceSetCollector::new(
        Arc::new(EndpointPool::new(endpoints).unwrap()),
        data.store.clone(),
        Arc::new(CreationHeights::new(Arc::new(lookup)).with_state(data.state.clone())),
        options(50),
    );

    let outcomes = collector
        .collect_all(&[a, b, c], WindowPolicy::default())
        .await;

    assert!(outcomes["source_a"].is_ok());
    assert!(matches!(
        outcomes["source_b"],
        Err(SourceError::CreationHeight(_))
    ));
    assert!(outcomes["source_c"].is_ok());
    assert_eq!(
        data.store.list().unwrap(),
        vec!["source_a".to_string(), "source_c".to_string()]
    );
}
