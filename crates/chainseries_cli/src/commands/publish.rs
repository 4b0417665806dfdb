use crate::runtime::Runtime;
use crate::sources::{find_group, load_groups};
use crate::summary::RunSummary;
use anyhow::Result;
use chainseries_core::{AssetGroup, Series, SeriesStore, SourceDescriptor};
use chainseries_warehouse::WarehousePublisher;

/// Publish the persisted series of every source in `group_name`
pub async fn handle_publish_command(group_name: &str, runtime: &Runtime) -> Result<usize> {
    let group = find_group(load_groups(&runtime.config.sources.file)?, group_name)?;
    let publisher = runtime.publisher()?;
    let mut summary = RunSummary::new();

    for source in &group.sources {
        match runtime.store.load(&source.name) {
            Ok(series) => publish_source(&publisher, &group, source, &series, &mut summary).await,
            Err(e) => summary.record_failure(&source.name, "publish", e.to_string()),
        }
    }

    println!("{}", summary.render());
    Ok(summary.failures())
}

pub async fn publish_source(
    publisher: &WarehousePublisher,
    group: &AssetGroup,
    source: &SourceDescriptor,
    series: &Series,
    summary: &mut RunSummary,
) {
    let table = group.table_name(&source.name);
    let description = source
        .description
        .clone()
        .unwrap_or_else(|| default_description(group, source));
    let outcome = publisher.publish(&table, &description, series).await;
    summary.record_publish(&source.name, &table, &outcome);
}

fn default_description(group: &AssetGroup, source: &SourceDescriptor) -> String {
    format!("Data for {} ({})", source.name, group.name)
}
