//! Cluster state reader
//!
//! `ClusterClient` is the only path to the control plane. Nothing is cached;
//! every call reads (or writes) the API server directly.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::{
    Api, DeleteParams, DynamicObject, EvictParams, ListParams, Patch, PatchParams,
};
use kube::discovery::ApiResource;
use kube::{Client, ResourceExt};
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use nodewarden_common::kube_utils::pods_on_node_selector;
use nodewarden_common::quantity::{parse_cpu_cores, parse_memory_gb};
use nodewarden_common::{Error, Result};

use crate::model::NodeUsage;

/// API group serving node metrics (metrics-server)
pub const METRICS_API_GROUP: &str = "metrics.k8s.io";
/// Version of the node metrics API
pub const METRICS_API_VERSION: &str = "v1beta1";

/// Trait abstracting control plane operations on nodes and pods
///
/// Allows mocking the cluster in tests while using kube-rs in production.
/// Every method fails with `ClusterUnavailable` when the control plane cannot
/// be reached.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// List every node in the cluster
    async fn list_nodes(&self) -> Result<Vec<Node>>;

    /// Get a node by name, `None` when the API server returns 404
    async fn get_node(&self, name: &str) -> Result<Option<Node>>;

    /// List pods bound to a node across all namespaces
    async fn list_pods_on_node(&self, node_name: &str) -> Result<Vec<Pod>>;

    /// Read current usage for one node
    ///
    /// Fails with `MetricsUnavailable` when the metrics API is not installed
    /// or has no sample for the node yet.
    async fn get_node_metrics(&self, node_name: &str) -> Result<NodeUsage>;

    /// Read current usage for every node reporting metrics, keyed by node name
    async fn list_node_metrics(&self) -> Result<BTreeMap<String, NodeUsage>>;

    /// Set `spec.unschedulable` to the negation of `schedulable`
    ///
    /// Returns the patched node. A missing node is `NodeNotFound`.
    async fn set_schedulable(&self, node_name: &str, schedulable: bool) -> Result<Node>;

    /// Request eviction of a pod through the policy eviction API
    async fn evict_pod(
        &self,
        name: &str,
        namespace: &str,
        grace_period_seconds: u32,
    ) -> Result<()>;
}

/// Real cluster client backed by kube-rs
pub struct KubeClusterClient {
    client: Client,
    field_manager: String,
}

impl KubeClusterClient {
    /// Wrap a kube client; patches are recorded under `field_manager`
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    fn nodes(&self) -> Api<Node> {
        Api::all(self.client.clone())
    }

    fn node_metrics(&self) -> Api<DynamicObject> {
        let ar = ApiResource {
            group: METRICS_API_GROUP.to_string(),
            version: METRICS_API_VERSION.to_string(),
            api_version: format!("{}/{}", METRICS_API_GROUP, METRICS_API_VERSION),
            kind: "NodeMetrics".to_string(),
            plural: "nodes".to_string(),
        };
        Api::all_with(self.client.clone(), &ar)
    }
}

/// Extract usage from a NodeMetrics object
fn usage_from_metrics(obj: &DynamicObject) -> Option<NodeUsage> {
    let usage = obj.data.get("usage")?;
    let cpu = usage.get("cpu").and_then(|v| v.as_str())?;
    let memory = usage.get("memory").and_then(|v| v.as_str())?;
    Some(NodeUsage {
        cpu_cores: parse_cpu_cores(cpu),
        memory_gb: parse_memory_gb(memory),
        timestamp: obj
            .data
            .get("timestamp")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        window: obj
            .data
            .get("window")
            .and_then(|v| v.as_str())
            .map(str::to_string),
    })
}

/// Any metrics API failure is soft, including a missing metrics-server
fn metrics_error(node: &str, err: kube::Error) -> Error {
    Error::metrics_unavailable(node, err.to_string())
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let nodes = self
            .nodes()
            .list(&ListParams::default())
            .await
            .map_err(Error::from_kube)?;
        Ok(nodes.items)
    }

    async fn get_node(&self, name: &str) -> Result<Option<Node>> {
        self.nodes().get_opt(name).await.map_err(Error::from_kube)
    }

    async fn list_pods_on_node(&self, node_name: &str) -> Result<Vec<Pod>> {
        let api: Api<Pod> = Api::all(self.client.clone());
        let params = ListParams::default().fields(&pods_on_node_selector(node_name));
        let pods = api.list(&params).await.map_err(Error::from_kube)?;
        Ok(pods.items)
    }

    async fn get_node_metrics(&self, node_name: &str) -> Result<NodeUsage> {
        let obj = self
            .node_metrics()
            .get(node_name)
            .await
            .map_err(|e| metrics_error(node_name, e))?;
        usage_from_metrics(&obj)
            .ok_or_else(|| Error::metrics_unavailable(node_name, "metrics object has no usage"))
    }

    async fn list_node_metrics(&self) -> Result<BTreeMap<String, NodeUsage>> {
        let list = self
            .node_metrics()
            .list(&ListParams::default())
            .await
            .map_err(|e| metrics_error("*", e))?;

        let mut usage = BTreeMap::new();
        for obj in &list.items {
            match usage_from_metrics(obj) {
                Some(u) => {
                    usage.insert(obj.name_any(), u);
                }
                None => debug!(node = %obj.name_any(), "skipping metrics object without usage"),
            }
        }
        Ok(usage)
    }

    async fn set_schedulable(&self, node_name: &str, schedulable: bool) -> Result<Node> {
        let patch = serde_json::json!({
            "spec": { "unschedulable": !schedulable }
        });
        match self
            .nodes()
            .patch(
                node_name,
                &PatchParams::apply(&self.field_manager),
                &Patch::Merge(&patch),
            )
            .await
        {
            Ok(node) => Ok(node),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Err(Error::node_not_found(node_name)),
            Err(e) => Err(Error::from_kube(e)),
        }
    }

    async fn evict_pod(
        &self,
        name: &str,
        namespace: &str,
        grace_period_seconds: u32,
    ) -> Result<()> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = EvictParams {
            delete_options: Some(DeleteParams {
                grace_period_seconds: Some(grace_period_seconds),
                ..Default::default()
            }),
            ..Default::default()
        };
        api.evict(name, &params).await.map_err(Error::from_kube)?;
        Ok(())
    }
}

/// Client used when no cluster configuration could be loaded
///
/// Every call fails with `ClusterUnavailable`, so store-only operations still
/// work while anything touching the cluster reports why it cannot.
pub struct DisconnectedClusterClient {
    reason: String,
}

impl DisconnectedClusterClient {
    /// Create a disconnected client that reports `reason` on every call
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn unavailable(&self) -> Error {
        Error::cluster_unavailable(self.reason.clone())
    }
}

#[async_trait]
impl ClusterClient for DisconnectedClusterClient {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        Err(self.unavailable())
    }

    async fn get_node(&self, _name: &str) -> Result<Option<Node>> {
        Err(self.unavailable())
    }

    async fn list_pods_on_node(&self, _node_name: &str) -> Result<Vec<Pod>> {
        Err(self.unavailable())
    }

    async fn get_node_metrics(&self, _node_name: &str) -> Result<NodeUsage> {
        Err(self.unavailable())
    }

    async fn list_node_metrics(&self) -> Result<BTreeMap<String, NodeUsage>> {
        Err(self.unavailable())
    }

    async fn set_schedulable(&self, _node_name: &str, _schedulable: bool) -> Result<Node> {
        Err(self.unavailable())
    }

    async fn evict_pod(
        &self,
        _name: &str,
        _namespace: &str,
        _grace_period_seconds: u32,
    ) -> Result<()> {
        Err(self.unavailable())
    }
}
