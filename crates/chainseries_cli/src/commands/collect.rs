use crate::commands::publish::publish_source;
use crate::runtime::Runtime;
use crate::sources::{find_group, load_groups};
use crate::summary::RunSummary;
use anyhow::Result;
use chainseries_core::{AssetGroup, Height};
use chainseries_sampler::{SourceSetCollector, WindowPolicy};
use chainseries_warehouse::WarehousePublisher;
use clap::{Args, ValueEnum};
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RunMode {
    /// Collect once and exit
    Once,
    /// Collect every `schedule.interval_secs` until interrupted
    Daily,
}

#[derive(Debug, Args)]
pub struct CollectArgs {
    /// Asset group to collect (ETH, USD, ...)
    #[arg(long)]
    pub group: String,
    /// Sample up to this block instead of the chain head
    #[arg(long)]
    pub end_height: Option<Height>,
    /// Blocks between samples, overriding the group and configured stride
    #[arg(long)]
    pub stride: Option<u64>,
    #[arg(long, value_enum, default_value_t = RunMode::Once)]
    pub mode: RunMode,
    /// Publish each collected series to the warehouse
    #[arg(long)]
    pub publish: bool,
}

/// Returns the number of failed steps of the last pass
pub async fn handle_collect_command(args: CollectArgs, runtime: &Runtime) -> Result<usize> {
    let group = find_group(load_groups(&runtime.config.sources.file)?, &args.group)?;
    let options = runtime.config.sampling_options(&group, args.stride)?;
    let collector = runtime.collector(options)?;
    let publisher = if args.publish {
        Some(runtime.publisher()?)
    } else {
        None
    };
    let policy = WindowPolicy {
        requested_end: args.end_height,
    };

    info!(
        "Collecting group {} ({} sources, stride {})",
        group.name,
        group.sources.len(),
        options.stride
    );

    match args.mode {
        RunMode::Once => {
            let summary = collect_pass(&group, &collector, publisher.as_ref(), policy).await;
            println!("{}", summary.render());
            Ok(summary.failures())
        }
        RunMode::Daily => {
            let period = Duration::from_secs(runtime.config.schedule.interval_secs.max(1));
            let (group, collector, publisher) = (&group, &collector, publisher.as_ref());
            let failures = run_recurring(period, tokio::signal::ctrl_c(), move || async move {
                let summary = collect_pass(group, collector, publisher, policy).await;
                println!("{}", summary.render());
                info!("Next collection of {} in {}s", group.name, period.as_secs());
                summary.failures()
            })
            .await;
            Ok(failures)
        }
    }
}

/// Run `pass` every `period` until `shutdown` completes, returning the
/// failures of the last pass. A shutdown requested during a pass stops the
/// loop before the next one.
async fn run_recurring<S, F, Fut>(period: Duration, shutdown: S, mut pass: F) -> usize
where
    S: Future,
    F: FnMut() -> Fut,
    Fut: Future<Output = usize>,
{
    let mut ticker = tokio::time::interval(period);
    tokio::pin!(shutdown);
    let mut failures = 0;

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Interrupted; stopping recurring collection");
                break;
            }
            _ = ticker.tick() => failures = pass().await,
        }
    }
    failures
}

/// One collection pass over the group, publishing successful sources when asked
async fn collect_pass(
    group: &AssetGroup,
    collector: &SourceSetCollector,
    publisher: Option<&WarehousePublisher>,
    policy: WindowPolicy,
) -> RunSummary {
    let outcomes = collector.collect_all(&group.sources, policy).await;
    let mut summary = RunSummary::new();

    for source in &group.sources {
        let Some(outcome) = outcomes.get(&source.name) else {
            continue;
        };
        summary.record_collect(&source.name, outcome);

        if let Some(publisher) = publisher {
            match outcome {
                Ok(report) => {
                    publish_source(publisher, group, source, &report.series, &mut summary).await
                }
                // Saved rows stay local; the next successful pass publishes them
                Err(_) => warn!("Not publishing {} after a failed collection", source.name),
            }
        }
    }

    summary
}
