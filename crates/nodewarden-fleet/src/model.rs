//! Fleet data model
//!
//! `WorkerNode` is the persisted inventory record. `EnrichedNode` is the
//! request-scoped view that merges it with live cluster facts; only the
//! `WorkerNode` part is ever written back to the store.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a worker node record
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
    /// Present in the cluster and serving workloads
    #[default]
    Active,
    /// Missing from the live cluster
    Inactive,
    /// Drained and held out of rotation by an operator
    Maintenance,
    /// Registered but not yet observed
    Pending,
    /// Present in the cluster but the kubelet reports not ready
    NotReady,
}

impl NodeStatus {
    /// Every status, in display order
    pub const ALL: [NodeStatus; 5] = [
        NodeStatus::Active,
        NodeStatus::Inactive,
        NodeStatus::Maintenance,
        NodeStatus::Pending,
        NodeStatus::NotReady,
    ];

    /// Wire representation (e.g. `NOT_READY`)
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Active => "ACTIVE",
            NodeStatus::Inactive => "INACTIVE",
            NodeStatus::Maintenance => "MAINTENANCE",
            NodeStatus::Pending => "PENDING",
            NodeStatus::NotReady => "NOT_READY",
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeStatus {
    type Err = String;

    /// Case-insensitive; accepts `not-ready` as well as `NOT_READY`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        NodeStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| format!("unknown node status: {}", s))
    }
}

/// A taint copied from the live node spec
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTaint {
    /// Taint key
    pub key: String,
    /// Optional taint value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// NoSchedule, PreferNoSchedule or NoExecute
    pub effect: String,
}

/// Persisted fleet inventory record
///
/// Sizes are in gigabytes, cpu in cores.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerNode {
    /// Opaque store-assigned identifier
    pub id: String,
    /// Unique node name; the join key with the live cluster
    pub name: String,
    pub hostname: Option<String>,
    pub ip_address: Option<String>,
    pub cpu_cores: f64,
    pub cpu_architecture: Option<String>,
    pub total_memory: f64,
    pub total_storage: f64,
    pub operating_system: Option<String>,
    pub kernel_version: Option<String>,
    pub os_image: Option<String>,
    pub container_runtime: Option<String>,
    pub kubelet_version: Option<String>,
    pub max_pods: u32,
    #[serde(rename = "allocatedCPU")]
    pub allocated_cpu: f64,
    pub allocated_memory: f64,
    pub allocated_storage: f64,
    pub current_pods: u32,
    pub status: NodeStatus,
    pub is_ready: bool,
    pub is_schedulable: bool,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub taints: Vec<NodeTaint>,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub last_health_check: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkerNode {
    /// Build a fresh record from live facts. New records start ACTIVE.
    pub fn from_facts(
        id: impl Into<String>,
        name: impl Into<String>,
        facts: &NodeFacts,
        now: DateTime<Utc>,
    ) -> Self {
        let mut node = Self {
            id: id.into(),
            name: name.into(),
            hostname: None,
            ip_address: None,
            cpu_cores: 0.0,
            cpu_architecture: None,
            total_memory: 0.0,
            total_storage: 0.0,
            operating_system: None,
            kernel_version: None,
            os_image: None,
            container_runtime: None,
            kubelet_version: None,
            max_pods: 0,
            allocated_cpu: 0.0,
            allocated_memory: 0.0,
            allocated_storage: 0.0,
            current_pods: 0,
            status: NodeStatus::Active,
            is_ready: false,
            is_schedulable: false,
            labels: BTreeMap::new(),
            taints: Vec::new(),
            last_heartbeat: Some(now),
            last_health_check: None,
            created_at: now,
            updated_at: now,
        };
        node.apply_facts(facts, now);
        node
    }

    /// Overwrite identity, hardware and readiness fields with live facts and
    /// refresh the heartbeat. Status and allocation are left alone.
    pub fn apply_facts(&mut self, facts: &NodeFacts, now: DateTime<Utc>) {
        self.hostname = facts.hostname.clone();
        self.ip_address = facts.ip_address.clone();
        self.cpu_cores = facts.cpu_cores;
        self.cpu_architecture = facts.cpu_architecture.clone();
        self.total_memory = facts.total_memory;
        self.total_storage = facts.total_storage;
        self.operating_system = facts.operating_system.clone();
        self.kernel_version = facts.kernel_version.clone();
        self.os_image = facts.os_image.clone();
        self.container_runtime = facts.container_runtime.clone();
        self.kubelet_version = facts.kubelet_version.clone();
        self.max_pods = facts.max_pods;
        self.is_ready = facts.is_ready;
        self.is_schedulable = facts.is_schedulable;
        self.labels = facts.labels.clone();
        self.taints = facts.taints.clone();
        self.last_heartbeat = Some(now);
        self.updated_at = now;
    }

    /// Apply a partial update. Fields left as `None` are untouched.
    pub fn apply_update(&mut self, update: &NodeUpdate, now: DateTime<Utc>) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(ready) = update.is_ready {
            self.is_ready = ready;
        }
        if let Some(schedulable) = update.is_schedulable {
            self.is_schedulable = schedulable;
        }
        if let Some(cpu) = update.allocated_cpu {
            self.allocated_cpu = cpu;
        }
        if let Some(memory) = update.allocated_memory {
            self.allocated_memory = memory;
        }
        if let Some(pods) = update.current_pods {
            self.current_pods = pods;
        }
        if let Some(at) = update.last_health_check {
            self.last_health_check = Some(at);
        }
        self.updated_at = now;
    }
}

/// Identity, hardware and readiness facts read from a live node
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeFacts {
    pub hostname: Option<String>,
    pub ip_address: Option<String>,
    pub cpu_cores: f64,
    pub cpu_architecture: Option<String>,
    pub total_memory: f64,
    pub total_storage: f64,
    pub operating_system: Option<String>,
    pub kernel_version: Option<String>,
    pub os_image: Option<String>,
    pub container_runtime: Option<String>,
    pub kubelet_version: Option<String>,
    pub max_pods: u32,
    pub is_ready: bool,
    pub is_schedulable: bool,
    pub labels: BTreeMap<String, String>,
    pub taints: Vec<NodeTaint>,
}

/// Partial update of the derived fields of a record
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeUpdate {
    pub status: Option<NodeStatus>,
    pub is_ready: Option<bool>,
    pub is_schedulable: Option<bool>,
    pub allocated_cpu: Option<f64>,
    pub allocated_memory: Option<f64>,
    pub current_pods: Option<u32>,
    pub last_health_check: Option<DateTime<Utc>>,
}

impl NodeUpdate {
    /// Set the lifecycle status
    pub fn status(mut self, status: NodeStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Set readiness
    pub fn ready(mut self, ready: bool) -> Self {
        self.is_ready = Some(ready);
        self
    }

    /// Set schedulability
    pub fn schedulable(mut self, schedulable: bool) -> Self {
        self.is_schedulable = Some(schedulable);
        self
    }

    /// Set the pod count
    pub fn current_pods(mut self, pods: u32) -> Self {
        self.current_pods = Some(pods);
        self
    }

    /// The update that reflects a node missing from the live cluster
    pub fn disappeared() -> Self {
        Self::default()
            .status(NodeStatus::Inactive)
            .ready(false)
            .schedulable(false)
    }
}

/// Status of one live node condition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl ConditionStatus {
    /// Parse the API string; anything unexpected is `Unknown`
    pub fn parse(status: &str) -> Self {
        match status {
            "True" => ConditionStatus::True,
            "False" => ConditionStatus::False,
            _ => ConditionStatus::Unknown,
        }
    }
}

/// Well-known node condition types
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeConditionType {
    Ready,
    MemoryPressure,
    DiskPressure,
    PidPressure,
    NetworkUnavailable,
}

impl NodeConditionType {
    /// The condition type string used by the API
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeConditionType::Ready => "Ready",
            NodeConditionType::MemoryPressure => "MemoryPressure",
            NodeConditionType::DiskPressure => "DiskPressure",
            NodeConditionType::PidPressure => "PIDPressure",
            NodeConditionType::NetworkUnavailable => "NetworkUnavailable",
        }
    }
}

/// Live conditions keyed by condition type
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeConditions(BTreeMap<String, ConditionStatus>);

impl NodeConditions {
    /// Build from `(type, status)` pairs as reported by the API
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(type_, status)| (type_.to_string(), ConditionStatus::parse(status)))
                .collect(),
        )
    }

    /// Status of the given condition; `Unknown` when not reported
    pub fn status(&self, condition: NodeConditionType) -> ConditionStatus {
        self.0
            .get(condition.as_str())
            .copied()
            .unwrap_or(ConditionStatus::Unknown)
    }

    /// Whether the given condition is reported as True
    pub fn is_true(&self, condition: NodeConditionType) -> bool {
        self.status(condition) == ConditionStatus::True
    }

    /// Whether no conditions were reported
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Normalized capacity or allocatable figures of a live node
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSnapshot {
    pub cpu_cores: f64,
    pub memory_gb: f64,
    pub storage_gb: f64,
    pub pods: u32,
}

/// Instantaneous usage reported by the metrics API
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUsage {
    pub cpu_cores: f64,
    pub memory_gb: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<String>,
}

/// Request-scoped view of a node: the record plus live and computed facts
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedNode {
    #[serde(flatten)]
    pub node: WorkerNode,
    /// Whether the node was present in the live cluster for this read
    pub live: bool,
    pub conditions: NodeConditions,
    pub capacity: ResourceSnapshot,
    pub allocatable: ResourceSnapshot,
    /// `None` when metrics are unavailable or capacity is zero
    pub cpu_utilization: Option<f64>,
    pub memory_utilization: Option<f64>,
    pub usage: Option<NodeUsage>,
    pub metrics_available: bool,
    /// False when the pod list could not be read; allocation and pod count
    /// then carry the last persisted values
    #[serde(default = "default_true")]
    pub allocation_available: bool,
}

fn default_true() -> bool {
    true
}

impl EnrichedNode {
    /// Node name
    pub fn name(&self) -> &str {
        &self.node.name
    }

    /// Ready, schedulable and ACTIVE
    pub fn is_online(&self) -> bool {
        self.node.is_ready && self.node.is_schedulable && self.node.status == NodeStatus::Active
    }
}

/// Options for draining a node
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainOptions {
    /// Grace period handed to each eviction; `None` uses
    /// `SyncConfig::default_grace_period_seconds`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grace_period_seconds: Option<u32>,
    /// Evict pods that keep data in emptyDir volumes
    pub delete_local_data: bool,
}

/// Outcome of one pod eviction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionStatus {
    Evicted,
    Failed,
}

/// Per-pod drain detail
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvictionResult {
    pub name: String,
    pub namespace: String,
    pub status: EvictionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EvictionResult {
    /// A successful eviction
    pub fn evicted(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            status: EvictionStatus::Evicted,
            error: None,
        }
    }

    /// A failed eviction with its error attached
    pub fn failed(
        name: impl Into<String>,
        namespace: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            status: EvictionStatus::Failed,
            error: Some(error.into()),
        }
    }
}

/// Summary returned by a drain
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainResult {
    pub node: String,
    pub pods_evicted: u32,
    pub pods_failed: u32,
    pub eviction_results: Vec<EvictionResult>,
}

impl DrainResult {
    /// Tally per-pod results, keeping their order
    pub fn from_results(node: impl Into<String>, eviction_results: Vec<EvictionResult>) -> Self {
        let pods_evicted = eviction_results
            .iter()
            .filter(|r| r.status == EvictionStatus::Evicted)
            .count() as u32;
        let pods_failed = eviction_results.len() as u32 - pods_evicted;
        Self {
            node: node.into(),
            pods_evicted,
            pods_failed,
            eviction_results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in NodeStatus::ALL {
            assert_eq!(status.as_str().parse::<NodeStatus>(), Ok(status));
        }
        assert_eq!("not-ready".parse::<NodeStatus>(), Ok(NodeStatus::NotReady));
        assert_eq!("active".parse::<NodeStatus>(), Ok(NodeStatus::Active));
        assert!("retired".parse::<NodeStatus>().is_err());
    }

    #[test]
    fn status_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&NodeStatus::NotReady).unwrap();
        assert_eq!(json, "\"NOT_READY\"");
    }

    #[test]
    fn update_touches_only_set_fields() {
        let now = Utc::now();
        let facts = NodeFacts {
            cpu_cores: 4.0,
            is_ready: true,
            is_schedulable: true,
            ..Default::default()
        };
        let mut node = WorkerNode::from_facts("id-1", "worker-1", &facts, now);
        node.allocated_cpu = 1.5;

        node.apply_update(&NodeUpdate::default().schedulable(false), now);

        assert!(!node.is_schedulable);
        assert!(node.is_ready);
        assert_eq!(node.allocated_cpu, 1.5);
        assert_eq!(node.status, NodeStatus::Active);
    }

    #[test]
    fn disappeared_update_takes_node_offline() {
        let update = NodeUpdate::disappeared();
        assert_eq!(update.status, Some(NodeStatus::Inactive));
        assert_eq!(update.is_ready, Some(false));
        assert_eq!(update.is_schedulable, Some(false));
    }

    #[test]
    fn conditions_lookup_defaults_to_unknown() {
        let conditions =
            NodeConditions::from_pairs([("Ready", "True"), ("DiskPressure", "False")]);
        assert!(conditions.is_true(NodeConditionType::Ready));
        assert_eq!(
            conditions.status(NodeConditionType::DiskPressure),
            ConditionStatus::False
        );
        assert_eq!(
            conditions.status(NodeConditionType::MemoryPressure),
            ConditionStatus::Unknown
        );
    }

    #[test]
    fn drain_result_counts_outcomes() {
        let result = DrainResult::from_results(
            "worker-1",
            vec![
                EvictionResult::evicted("a", "default"),
                EvictionResult::failed("b", "default", "pdb"),
                EvictionResult::evicted("c", "kube-system"),
            ],
        );
        assert_eq!(result.pods_evicted, 2);
        assert_eq!(result.pods_failed, 1);
        assert_eq!(result.eviction_results[1].error.as_deref(), Some("pdb"));
    }

    #[test]
    fn worker_node_serializes_camel_case() {
        let node = WorkerNode::from_facts("id-1", "worker-1", &NodeFacts::default(), Utc::now());
        let value = serde_json::to_value(&node).unwrap();
        assert!(value.get("isSchedulable").is_some());
        assert!(value.get("allocatedCPU").is_some());
        assert_eq!(value["status"], "ACTIVE");
    }
}
