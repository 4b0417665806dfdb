use crate::runtime::Runtime;
use crate::sources::{find_group, load_groups};
use anyhow::Result;
use chainseries_store::csv_codec::format_timestamp;

/// Resolve and print the creation block of every source in the group.
/// Returns the number of sources that could not be resolved.
pub async fn handle_creation_heights_command(group_name: &str, runtime: &Runtime) -> Result<usize> {
    let group = find_group(load_groups(&runtime.config.sources.file)?, group_name)?;
    let creation = runtime.creation_heights()?;
    let api = runtime.endpoint_pool()?.next();
    let mut failures = 0;

    println!("Creation heights for {} (chain {}):", group.name, group.chain_id);
    for source in &group.sources {
        let height = match creation.resolve(source.address, source.chain_id).await {
            Ok(height) => height,
            Err(e) => {
                println!("  {:<28} {}  lookup failed: {}", source.name, source.address, e);
                failures += 1;
                continue;
            }
        };

        match api.block(height).await {
            Ok(block) => println!(
                "  {:<28} {}  block {} at {}",
                source.name,
                source.address,
                height,
                format_timestamp(&block.timestamp)
            ),
            Err(e) => println!(
                "  {:<28} {}  block {} (timestamp unavailable: {})",
                source.name, source.address, height, e
            ),
        }
    }

    Ok(failures)
}
