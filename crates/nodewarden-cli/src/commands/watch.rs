//! `nodewarden sync` and `nodewarden watch`

use std::time::Duration;

use clap::Args;
use tracing::{info, warn};

use nodewarden_fleet::stats::{aggregate, partition};
use nodewarden_fleet::EnrichedNode;

use super::nodes::render_nodes;
use super::{emit, OutputFormat, Session};
use crate::Result;

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Seconds between syncs
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,
}

/// Reconcile once and print every node
pub async fn sync_once(session: &Session, output: &OutputFormat) -> Result<()> {
    let nodes = session.service.sync_cluster_state().await?;
    emit(output, &nodes, |n| render_nodes(n))
}

/// Reconcile on an interval until Ctrl-C
///
/// A failed pass is logged and retried on the next tick; the inventory is
/// saved after every successful pass.
pub async fn run(session: &Session, args: WatchArgs, output: &OutputFormat) -> Result<()> {
    let mut ticker = tokio::time::interval(Duration::from_secs(args.interval));
    info!(interval_secs = args.interval, "watching cluster");

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, stopping watch");
                return Ok(());
            }
        }

        match session.service.sync_cluster_state().await {
            Ok(nodes) => {
                emit(output, &nodes, |n| summary_line(n))?;
                if let Err(e) = session.save().await {
                    warn!(error = %e, "failed to save inventory");
                }
            }
            Err(e) => warn!(error = %e, "sync failed, retrying on next tick"),
        }
    }
}

fn summary_line(nodes: &[EnrichedNode]) -> String {
    let stats = aggregate(nodes);
    let (online, offline) = partition(nodes.to_vec());
    format!(
        "{} nodes: {} online, {} offline, cpu {}% allocated, memory {}% allocated\n",
        stats.total_nodes,
        online.len(),
        offline.len(),
        stats.cpu.utilization,
        stats.memory.utilization
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_fleet_summary() {
        assert_eq!(
            summary_line(&[]),
            "0 nodes: 0 online, 0 offline, cpu 0% allocated, memory 0% allocated\n"
        );
    }
}
