//! Lifecycle commands: cordon, uncordon, drain and delete

use clap::Args;

use nodewarden_fleet::{DrainOptions, DrainResult, EvictionStatus, WorkerNode};

use super::format::{render_table, yes_no};
use super::{emit, OutputFormat, Session};
use crate::Result;

#[derive(Args, Debug)]
pub struct DrainArgs {
    /// Node name or inventory id
    pub node: String,

    /// Seconds each pod gets to terminate (default: NODEWARDEN_GRACE_PERIOD_SECONDS or 30)
    #[arg(long)]
    pub grace_period: Option<u32>,

    /// Also evict pods using emptyDir volumes; their local data is lost
    #[arg(long)]
    pub delete_local_data: bool,
}

pub async fn cordon(session: &Session, node: &str, output: &OutputFormat) -> Result<()> {
    let record = session.service.cordon(node).await?;
    emit(output, &record, |n| render_state("cordoned", n))
}

pub async fn uncordon(session: &Session, node: &str, output: &OutputFormat) -> Result<()> {
    let record = session.service.uncordon(node).await?;
    emit(output, &record, |n| render_state("uncordoned", n))
}

pub async fn drain(session: &Session, args: DrainArgs, output: &OutputFormat) -> Result<()> {
    let options = DrainOptions {
        grace_period_seconds: args.grace_period,
        delete_local_data: args.delete_local_data,
    };
    let result = session.service.drain(&args.node, options).await?;
    emit(output, &result, render_drain)
}

pub async fn delete(session: &Session, node: &str, output: &OutputFormat) -> Result<()> {
    let record = session.service.delete_worker_node(node).await?;
    emit(output, &record, |n| format!("node/{} deleted from inventory\n", n.name))
}

fn render_state(action: &str, node: &WorkerNode) -> String {
    format!(
        "node/{} {} (status {}, schedulable {})\n",
        node.name,
        action,
        node.status,
        yes_no(node.is_schedulable)
    )
}

fn render_drain(result: &DrainResult) -> String {
    let rows: Vec<Vec<String>> = result
        .eviction_results
        .iter()
        .map(|r| {
            vec![
                r.namespace.clone(),
                r.name.clone(),
                match r.status {
                    EvictionStatus::Evicted => "evicted".to_string(),
                    EvictionStatus::Failed => "failed".to_string(),
                },
                r.error.clone().unwrap_or_default(),
            ]
        })
        .collect();

    let mut out = String::new();
    if !rows.is_empty() {
        out.push_str(&render_table(&["NAMESPACE", "POD", "RESULT", "ERROR"], &rows));
        out.push('\n');
    }
    out.push_str(&format!(
        "node/{} drained: {} evicted, {} failed\n",
        result.node, result.pods_evicted, result.pods_failed
    ));
    out
}
