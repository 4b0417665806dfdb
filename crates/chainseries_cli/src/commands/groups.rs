use crate::config::AppConfig;
use crate::sources::load_groups;
use anyhow::Result;
use chainseries_core::{SeriesStore, SourceKind};
use chainseries_store::CsvSeriesStore;

pub fn handle_groups_command(config: &AppConfig) -> Result<()> {
    let groups = load_groups(&config.sources.file)?;
    if groups.is_empty() {
        println!("No groups defined in {}", config.sources.file.display());
        return Ok(());
    }

    let store = CsvSeriesStore::open(&config.storage.data_dir)?;
    let persisted = store.list()?;

    for group in groups {
        let stride = group.stride.unwrap_or(config.sampling.stride);
        println!(
            "{} (chain {}, stride {}, {} sources)",
            group.name,
            group.chain_id,
            stride,
            group.sources.len()
        );
        for source in &group.sources {
            let what = match &source.kind {
                SourceKind::Functions { functions, .. } => functions
                    .iter()
                    .map(|f| f.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                SourceKind::BalanceProbe(probe) => format!("balanceOf on {}", probe.token),
            };
            let rows = if persisted.contains(&source.name) {
                store.load(&source.name)?.len()
            } else {
                0
            };
            println!(
                "  {:<28} {} -> {}  [{}] columns {}; {} rows",
                source.name,
                source.address,
                group.table_name(&source.name),
                what,
                source.column_names().join(", "),
                rows
            );
        }
    }
    Ok(())
}
