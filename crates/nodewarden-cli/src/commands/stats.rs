//! Statistics and online/offline listings

use nodewarden_fleet::{ClusterStats, NodeStatus};

use super::format::{format_percent, render_fields, render_table, trim_float};
use super::nodes::render_nodes;
use super::{emit, OutputFormat, Session};
use crate::Result;

pub async fn run_stats(session: &Session, output: &OutputFormat) -> Result<()> {
    let stats = session.service.get_cluster_stats().await?;
    emit(output, &stats, render_stats)
}

pub async fn run_online(session: &Session, output: &OutputFormat) -> Result<()> {
    let nodes = session.service.list_online().await?;
    emit(output, &nodes, |n| render_nodes(n))
}

pub async fn run_offline(session: &Session, output: &OutputFormat) -> Result<()> {
    let nodes = session.service.list_offline_nodes().await?;
    emit(output, &nodes, |n| render_nodes(n))
}

/// Fleet summary followed by a resource table
pub fn render_stats(stats: &ClusterStats) -> String {
    let mut out = render_fields(&[
        ("Nodes", stats.total_nodes.to_string()),
        ("Ready", stats.ready_nodes.to_string()),
        ("Schedulable", stats.schedulable_nodes.to_string()),
        ("Online", stats.online_nodes.to_string()),
        (
            "Metrics",
            format!(
                "{} reporting, avg cpu {}, avg memory {}",
                stats.live_metrics.nodes_reporting,
                format_percent(stats.live_metrics.avg_cpu_utilization),
                format_percent(stats.live_metrics.avg_memory_utilization)
            ),
        ),
    ]);

    out.push('\n');
    let statuses: Vec<Vec<String>> = NodeStatus::ALL
        .iter()
        .map(|s| vec![s.to_string(), stats.status_counts.get(*s).to_string()])
        .collect();
    out.push_str(&render_table(&["STATUS", "NODES"], &statuses));

    out.push('\n');
    let resources: Vec<Vec<String>> = [
        ("cpu (cores)", &stats.cpu),
        ("memory (GB)", &stats.memory),
        ("pods", &stats.pods),
    ]
    .iter()
    .map(|(name, usage)| {
        vec![
            name.to_string(),
            trim_float(usage.allocated),
            trim_float(usage.total),
            format_percent(Some(usage.utilization)),
        ]
    })
    .collect();
    out.push_str(&render_table(
        &["RESOURCE", "ALLOCATED", "TOTAL", "ALLOCATED%"],
        &resources,
    ));
    out
}
