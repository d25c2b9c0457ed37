//! Node enrichment
//!
//! Turns a live `Node`, the pods bound to it and an optional metrics sample
//! into an `EnrichedNode`. Everything here is pure; fetching happens in the
//! reconciliation engine.
//!
//! Merge rules: live facts (hardware, readiness, schedulability, labels,
//! taints) always win. The record keeps its id and creation time, and keeps
//! MAINTENANCE for as long as the node stays cordoned.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Node, Pod};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

use nodewarden_common::kube_utils::{is_node_ready, is_node_unschedulable};
use nodewarden_common::quantity::{parse_count, parse_cpu_cores, parse_memory_gb, round2};

use crate::model::{
    EnrichedNode, NodeConditions, NodeFacts, NodeStatus, NodeTaint, NodeUpdate, NodeUsage,
    ResourceSnapshot, WorkerNode,
};

const ADDRESS_INTERNAL_IP: &str = "InternalIP";
const ADDRESS_HOSTNAME: &str = "Hostname";

/// Node name, empty when the object has none
pub fn node_name(node: &Node) -> &str {
    node.metadata.name.as_deref().unwrap_or_default()
}

/// Resolve `(ip_address, hostname)` from node addresses
///
/// The hostname falls back to the node name when no Hostname address is set.
pub fn node_addresses(node: &Node) -> (Option<String>, Option<String>) {
    let addresses = node
        .status
        .as_ref()
        .and_then(|s| s.addresses.as_deref())
        .unwrap_or_default();
    let find = |type_: &str| {
        addresses
            .iter()
            .find(|a| a.type_ == type_)
            .map(|a| a.address.clone())
    };
    let hostname = find(ADDRESS_HOSTNAME).or_else(|| node.metadata.name.clone());
    (find(ADDRESS_INTERNAL_IP), hostname)
}

fn snapshot(resources: Option<&BTreeMap<String, Quantity>>) -> ResourceSnapshot {
    let get = |key: &str| resources.and_then(|r| r.get(key)).map(|q| q.0.as_str());
    ResourceSnapshot {
        cpu_cores: get("cpu").map(parse_cpu_cores).unwrap_or_default(),
        memory_gb: get("memory").map(parse_memory_gb).unwrap_or_default(),
        storage_gb: get("ephemeral-storage")
            .map(parse_memory_gb)
            .unwrap_or_default(),
        pods: get("pods").map(parse_count).unwrap_or_default(),
    }
}

/// Normalized capacity of a live node
pub fn capacity(node: &Node) -> ResourceSnapshot {
    snapshot(node.status.as_ref().and_then(|s| s.capacity.as_ref()))
}

/// Normalized allocatable resources of a live node
pub fn allocatable(node: &Node) -> ResourceSnapshot {
    snapshot(node.status.as_ref().and_then(|s| s.allocatable.as_ref()))
}

/// Typed view of the node's reported conditions
pub fn conditions(node: &Node) -> NodeConditions {
    let conditions = node
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_deref())
        .unwrap_or_default();
    NodeConditions::from_pairs(
        conditions
            .iter()
            .map(|c| (c.type_.as_str(), c.status.as_str())),
    )
}

/// Identity, hardware and readiness facts of a live node
pub fn node_facts(node: &Node) -> NodeFacts {
    let (ip_address, hostname) = node_addresses(node);
    let capacity = capacity(node);
    let info = node.status.as_ref().and_then(|s| s.node_info.as_ref());
    let non_empty = |v: &str| (!v.is_empty()).then(|| v.to_string());

    NodeFacts {
        hostname,
        ip_address,
        cpu_cores: capacity.cpu_cores,
        cpu_architecture: info.and_then(|i| non_empty(&i.architecture)),
        total_memory: capacity.memory_gb,
        total_storage: capacity.storage_gb,
        operating_system: info.and_then(|i| non_empty(&i.operating_system)),
        kernel_version: info.and_then(|i| non_empty(&i.kernel_version)),
        os_image: info.and_then(|i| non_empty(&i.os_image)),
        container_runtime: info.and_then(|i| non_empty(&i.container_runtime_version)),
        kubelet_version: info.and_then(|i| non_empty(&i.kubelet_version)),
        max_pods: capacity.pods,
        is_ready: is_node_ready(node),
        is_schedulable: !is_node_unschedulable(node),
        labels: node.metadata.labels.clone().unwrap_or_default(),
        taints: node
            .spec
            .as_ref()
            .and_then(|s| s.taints.as_ref())
            .map(|taints| {
                taints
                    .iter()
                    .map(|t| NodeTaint {
                        key: t.key.clone(),
                        value: t.value.clone(),
                        effect: t.effect.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default(),
    }
}

/// Sum of container cpu and memory requests over the given pods
///
/// Returns `(cores, gigabytes)`. Containers without requests contribute zero.
pub fn pod_requests(pods: &[Pod]) -> (f64, f64) {
    pods.iter()
        .filter_map(|p| p.spec.as_ref())
        .flat_map(|spec| spec.containers.iter())
        .filter_map(|c| c.resources.as_ref().and_then(|r| r.requests.as_ref()))
        .fold((0.0, 0.0), |(cpu, memory), requests| {
            (
                cpu + requests
                    .get("cpu")
                    .map(|q| parse_cpu_cores(&q.0))
                    .unwrap_or_default(),
                memory
                    + requests
                        .get("memory")
                        .map(|q| parse_memory_gb(&q.0))
                        .unwrap_or_default(),
            )
        })
}

/// Usage over capacity as a percentage with two decimals
///
/// `None` when capacity is zero or negative, so no NaN or infinity escapes.
pub fn utilization(used: f64, capacity: f64) -> Option<f64> {
    (capacity > 0.0).then(|| round2(used / capacity * 100.0))
}

/// Status of a live node given its persisted status
///
/// A node held in MAINTENANCE stays there until it is uncordoned.
pub fn resolve_status(persisted: NodeStatus, ready: bool, schedulable: bool) -> NodeStatus {
    if persisted == NodeStatus::Maintenance && !schedulable {
        NodeStatus::Maintenance
    } else if ready {
        NodeStatus::Active
    } else {
        NodeStatus::NotReady
    }
}

/// Merge a persisted record with live facts, pods and metrics
///
/// `pods` is `None` when the pod list could not be read. The persisted
/// allocation and pod count are kept and the view is flagged.
pub fn enrich(
    persisted: &WorkerNode,
    live: &Node,
    pods: Option<&[Pod]>,
    usage: Option<&NodeUsage>,
    now: DateTime<Utc>,
) -> EnrichedNode {
    let facts = node_facts(live);
    let capacity = capacity(live);

    let mut node = persisted.clone();
    node.apply_facts(&facts, persisted.last_heartbeat.unwrap_or(now));
    node.status = resolve_status(persisted.status, facts.is_ready, facts.is_schedulable);
    if let Some(pods) = pods {
        let (allocated_cpu, allocated_memory) = pod_requests(pods);
        node.allocated_cpu = allocated_cpu;
        node.allocated_memory = allocated_memory;
        node.current_pods = pods.len() as u32;
    }
    node.last_health_check = Some(now);

    EnrichedNode {
        node,
        live: true,
        conditions: conditions(live),
        cpu_utilization: usage.and_then(|u| utilization(u.cpu_cores, capacity.cpu_cores)),
        memory_utilization: usage.and_then(|u| utilization(u.memory_gb, capacity.memory_gb)),
        metrics_available: usage.is_some(),
        allocation_available: pods.is_some(),
        usage: usage.cloned(),
        allocatable: allocatable(live),
        capacity,
    }
}

/// The subset of an enriched node that is written back to the store
///
/// Allocation is left untouched when it was not recomputed.
pub fn persisted_update(enriched: &EnrichedNode) -> NodeUpdate {
    let node = &enriched.node;
    let recomputed = enriched.allocation_available;
    NodeUpdate {
        status: Some(node.status),
        is_ready: Some(node.is_ready),
        is_schedulable: Some(node.is_schedulable),
        allocated_cpu: recomputed.then_some(node.allocated_cpu),
        allocated_memory: recomputed.then_some(node.allocated_memory),
        current_pods: recomputed.then_some(node.current_pods),
        last_health_check: node.last_health_check,
    }
}

/// View of a record whose node is gone from the live cluster
pub fn disappeared(persisted: &WorkerNode) -> EnrichedNode {
    let mut node = persisted.clone();
    node.status = NodeStatus::Inactive;
    node.is_ready = false;
    node.is_schedulable = false;
    EnrichedNode {
        node,
        live: false,
        conditions: NodeConditions::default(),
        capacity: ResourceSnapshot::default(),
        allocatable: ResourceSnapshot::default(),
        cpu_utilization: None,
        memory_utilization: None,
        usage: None,
        metrics_available: false,
        allocation_available: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeConditionType;
    use crate::testing::{pod, usage, NodeBuilder, PodBuilder};

    fn record_for(live: &Node) -> WorkerNode {
        WorkerNode::from_facts("id-1", node_name(live), &node_facts(live), Utc::now())
    }

    /// Story: worker-1 runs two pods requesting 500m/1Gi each
    #[test]
    fn story_worker_allocation_sums_pod_requests() {
        let live = NodeBuilder::new("worker-1")
            .cpu("4")
            .memory("16Gi")
            .internal_ip("10.0.0.5")
            .build();
        let pods = vec![
            pod("a", "worker-1", "500m", "1Gi"),
            pod("b", "worker-1", "500m", "1Gi"),
        ];

        let enriched = enrich(&record_for(&live), &live, Some(pods.as_slice()), None, Utc::now());

        assert_eq!(enriched.node.allocated_cpu, 1.0);
        assert_eq!(enriched.node.allocated_memory, 2.0);
        assert_eq!(enriched.node.current_pods, 2);
        assert_eq!(enriched.node.ip_address.as_deref(), Some("10.0.0.5"));
        assert_eq!(enriched.node.status, NodeStatus::Active);
        assert!(enriched.live);
    }

    #[test]
    fn addresses_fall_back_to_node_name() {
        let live = NodeBuilder::new("worker-1").build();
        assert_eq!(node_addresses(&live), (None, Some("worker-1".to_string())));

        let live = NodeBuilder::new("worker-1")
            .internal_ip("10.0.0.5")
            .hostname("w1.internal")
            .build();
        assert_eq!(
            node_addresses(&live),
            (Some("10.0.0.5".to_string()), Some("w1.internal".to_string()))
        );
    }

    #[test]
    fn facts_normalize_capacity_and_copy_metadata() {
        let live = NodeBuilder::new("worker-1")
            .cpu("8")
            .memory("32Gi")
            .pods("110")
            .label("pool", "general")
            .taint("dedicated", "NoSchedule")
            .unschedulable(true)
            .build();

        let facts = node_facts(&live);
        assert_eq!(facts.cpu_cores, 8.0);
        assert_eq!(facts.total_memory, 32.0);
        assert_eq!(facts.total_storage, 100.0);
        assert_eq!(facts.max_pods, 110);
        assert_eq!(facts.cpu_architecture.as_deref(), Some("amd64"));
        assert_eq!(facts.kubelet_version.as_deref(), Some("v1.32.0"));
        assert_eq!(facts.labels.get("pool").map(String::as_str), Some("general"));
        assert_eq!(facts.taints.len(), 1);
        assert!(facts.is_ready);
        assert!(!facts.is_schedulable);
    }

    #[test]
    fn containers_without_requests_count_as_zero() {
        let pods = vec![
            PodBuilder::new("a", "w")
                .container(Some("250m"), None)
                .container(None, Some("512Mi"))
                .container(None, None)
                .build(),
            Pod::default(),
        ];
        assert_eq!(pod_requests(&pods), (0.25, 0.5));
    }

    /// Story: without metrics-server, utilization is absent rather than zero
    #[test]
    fn story_missing_metrics_leave_utilization_empty() {
        let live = NodeBuilder::new("worker-1").build();
        let enriched = enrich(&record_for(&live), &live, Some(&[]), None, Utc::now());
        assert_eq!(enriched.cpu_utilization, None);
        assert_eq!(enriched.memory_utilization, None);
        assert!(!enriched.metrics_available);
    }

    #[test]
    fn metrics_produce_two_decimal_percentages() {
        let live = NodeBuilder::new("worker-1").cpu("3").memory("16Gi").build();
        let enriched = enrich(
            &record_for(&live),
            &live,
            Some(&[]),
            Some(&usage(1.0, 4.0)),
            Utc::now(),
        );
        assert_eq!(enriched.cpu_utilization, Some(33.33));
        assert_eq!(enriched.memory_utilization, Some(25.0));
        assert!(enriched.metrics_available);
    }

    #[test]
    fn zero_capacity_never_divides() {
        let live = NodeBuilder::new("worker-1").cpu("0").memory("garbage").build();
        let enriched = enrich(
            &record_for(&live),
            &live,
            Some(&[]),
            Some(&usage(1.0, 1.0)),
            Utc::now(),
        );
        assert_eq!(enriched.cpu_utilization, None);
        assert_eq!(enriched.memory_utilization, None);
        assert!(enriched.metrics_available);
    }

    #[test]
    fn status_resolution() {
        use NodeStatus::*;
        assert_eq!(resolve_status(Active, true, true), Active);
        assert_eq!(resolve_status(Inactive, true, true), Active);
        assert_eq!(resolve_status(Active, false, true), NotReady);
        assert_eq!(resolve_status(Maintenance, true, false), Maintenance);
        assert_eq!(resolve_status(Maintenance, false, false), Maintenance);
        // uncordoned outside nodewarden: maintenance ends
        assert_eq!(resolve_status(Maintenance, true, true), Active);
        // cordoned but never drained: still active
        assert_eq!(resolve_status(Active, true, false), Active);
    }

    #[test]
    fn enrichment_keeps_record_identity() {
        let live = NodeBuilder::new("worker-1").cpu("16").build();
        let mut record = record_for(&live);
        record.cpu_cores = 2.0;
        let enriched = enrich(&record, &live, Some(&[]), None, Utc::now());
        assert_eq!(enriched.node.id, "id-1");
        assert_eq!(enriched.node.created_at, record.created_at);
        assert_eq!(enriched.node.cpu_cores, 16.0);
    }

    #[test]
    fn conditions_are_typed() {
        let live = NodeBuilder::new("worker-1").ready(false).build();
        let enriched = enrich(&record_for(&live), &live, Some(&[]), None, Utc::now());
        assert!(!enriched.conditions.is_true(NodeConditionType::Ready));
        assert_eq!(enriched.node.status, NodeStatus::NotReady);

        let live = NodeBuilder::new("worker-2").no_conditions().build();
        assert!(conditions(&live).is_empty());
        assert!(!node_facts(&live).is_ready);
    }

    #[test]
    fn disappeared_node_is_inactive_and_offline() {
        let live = NodeBuilder::new("worker-1").build();
        let gone = disappeared(&record_for(&live));
        assert_eq!(gone.node.status, NodeStatus::Inactive);
        assert!(!gone.node.is_ready);
        assert!(!gone.node.is_schedulable);
        assert!(!gone.live);
        assert!(!gone.is_online());
    }

    #[test]
    fn persisted_update_carries_derived_fields() {
        let live = NodeBuilder::new("worker-1").build();
        let pods = vec![pod("a", "worker-1", "1", "2Gi")];
        let enriched = enrich(&record_for(&live), &live, Some(pods.as_slice()), None, Utc::now());
        let update = persisted_update(&enriched);
        assert_eq!(update.allocated_cpu, Some(1.0));
        assert_eq!(update.allocated_memory, Some(2.0));
        assert_eq!(update.current_pods, Some(1));
        assert_eq!(update.status, Some(NodeStatus::Active));
    }

    /// Story: the pod list is forbidden, so the node keeps its last known allocation
    #[test]
    fn story_unreadable_pods_keep_persisted_allocation() {
        let live = NodeBuilder::new("worker-1").cpu("4").build();
        let mut record = record_for(&live);
        record.allocated_cpu = 1.5;
        record.allocated_memory = 3.0;
        record.current_pods = 4;

        let enriched = enrich(&record, &live, None, None, Utc::now());
        assert!(!enriched.allocation_available);
        assert!(enriched.live);
        assert_eq!(enriched.node.status, NodeStatus::Active);
        assert_eq!(enriched.node.allocated_cpu, 1.5);
        assert_eq!(enriched.node.allocated_memory, 3.0);
        assert_eq!(enriched.node.current_pods, 4);

        let update = persisted_update(&enriched);
        assert_eq!(update.allocated_cpu, None);
        assert_eq!(update.allocated_memory, None);
        assert_eq!(update.current_pods, None);
        assert!(update.last_health_check.is_some());
    }
}
