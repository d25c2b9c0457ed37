//! Fleet statistics
//!
//! Folds a reconciled node list into cluster-wide counts and utilization.
//! INACTIVE nodes are counted but contribute no capacity or allocation:
//! hardware that left the cluster cannot host pods.

use serde::{Deserialize, Serialize};

use nodewarden_common::quantity::{percentage, round2};

use crate::model::{EnrichedNode, NodeStatus};

/// Number of nodes in each lifecycle status
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusHistogram {
    pub active: usize,
    pub inactive: usize,
    pub maintenance: usize,
    pub pending: usize,
    pub not_ready: usize,
}

impl StatusHistogram {
    fn record(&mut self, status: NodeStatus) {
        match status {
            NodeStatus::Active => self.active += 1,
            NodeStatus::Inactive => self.inactive += 1,
            NodeStatus::Maintenance => self.maintenance += 1,
            NodeStatus::Pending => self.pending += 1,
            NodeStatus::NotReady => self.not_ready += 1,
        }
    }

    /// Count for one status
    pub fn get(&self, status: NodeStatus) -> usize {
        match status {
            NodeStatus::Active => self.active,
            NodeStatus::Inactive => self.inactive,
            NodeStatus::Maintenance => self.maintenance,
            NodeStatus::Pending => self.pending,
            NodeStatus::NotReady => self.not_ready,
        }
    }
}

/// Total, allocated and allocated-over-total percentage of one resource
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub total: f64,
    pub allocated: f64,
    pub utilization: f64,
}

impl ResourceUsage {
    fn new(total: f64, allocated: f64) -> Self {
        Self {
            total: round2(total),
            allocated: round2(allocated),
            utilization: percentage(allocated, total),
        }
    }
}

/// Averages over nodes that reported metrics
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveMetricsSummary {
    pub nodes_reporting: usize,
    pub avg_cpu_utilization: Option<f64>,
    pub avg_memory_utilization: Option<f64>,
}

/// Cluster-wide statistics
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStats {
    pub total_nodes: usize,
    pub ready_nodes: usize,
    pub schedulable_nodes: usize,
    pub online_nodes: usize,
    /// Live nodes whose allocation could not be recomputed on this read
    #[serde(default)]
    pub stale_allocation_nodes: usize,
    pub status_counts: StatusHistogram,
    pub cpu: ResourceUsage,
    pub memory: ResourceUsage,
    pub pods: ResourceUsage,
    pub live_metrics: LiveMetricsSummary,
}

fn average(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| round2(values.iter().sum::<f64>() / values.len() as f64))
}

/// Aggregate statistics over a reconciled node list
pub fn aggregate(nodes: &[EnrichedNode]) -> ClusterStats {
    let mut status_counts = StatusHistogram::default();
    let (mut cpu_total, mut cpu_allocated) = (0.0, 0.0);
    let (mut memory_total, mut memory_allocated) = (0.0, 0.0);
    let (mut pods_total, mut pods_allocated) = (0.0, 0.0);
    let mut cpu_samples = Vec::new();
    let mut memory_samples = Vec::new();

    for enriched in nodes {
        let node = &enriched.node;
        status_counts.record(node.status);
        if node.status == NodeStatus::Inactive {
            continue;
        }
        cpu_total += node.cpu_cores;
        cpu_allocated += node.allocated_cpu;
        memory_total += node.total_memory;
        memory_allocated += node.allocated_memory;
        pods_total += f64::from(node.max_pods);
        pods_allocated += f64::from(node.current_pods);
        if enriched.metrics_available {
            cpu_samples.extend(enriched.cpu_utilization);
            memory_samples.extend(enriched.memory_utilization);
        }
    }

    ClusterStats {
        total_nodes: nodes.len(),
        ready_nodes: nodes.iter().filter(|n| n.node.is_ready).count(),
        schedulable_nodes: nodes.iter().filter(|n| n.node.is_schedulable).count(),
        online_nodes: nodes.iter().filter(|n| n.is_online()).count(),
        stale_allocation_nodes: nodes
            .iter()
            .filter(|n| n.live && !n.allocation_available)
            .count(),
        status_counts,
        cpu: ResourceUsage::new(cpu_total, cpu_allocated),
        memory: ResourceUsage::new(memory_total, memory_allocated),
        pods: ResourceUsage::new(pods_total, pods_allocated),
        live_metrics: LiveMetricsSummary {
            nodes_reporting: nodes.iter().filter(|n| n.metrics_available).count(),
            avg_cpu_utilization: average(&cpu_samples),
            avg_memory_utilization: average(&memory_samples),
        },
    }
}

/// Split nodes into `(online, offline)`, keeping order
///
/// Online means ready, schedulable and ACTIVE. Every node lands in exactly
/// one side.
pub fn partition(nodes: Vec<EnrichedNode>) -> (Vec<EnrichedNode>, Vec<EnrichedNode>) {
    nodes.into_iter().partition(EnrichedNode::is_online)
}
