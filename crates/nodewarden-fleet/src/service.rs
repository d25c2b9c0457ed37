//! Public fleet operations
//!
//! `FleetService` is the entry point used by the CLI. Read operations always
//! reconcile first, so every answer reflects the cluster as of the call.

use std::sync::Arc;

use tracing::{info, instrument};

use nodewarden_common::{Error, Result};

use crate::cluster::{ClusterClient, KubeClusterClient};
use crate::config::SyncConfig;
use crate::lifecycle;
use crate::model::{DrainOptions, DrainResult, EnrichedNode, WorkerNode};
use crate::query::{self, NodeFilter, NodePage, Pagination, SortSpec};
use crate::reconcile::{self, SyncContext};
use crate::stats::{self, ClusterStats};
use crate::store::NodeStore;

/// Fleet inventory and lifecycle operations over one cluster
#[derive(Clone)]
pub struct FleetService {
    ctx: SyncContext,
}

impl FleetService {
    /// Create a service from explicit collaborators
    pub fn new(
        cluster: Arc<dyn ClusterClient>,
        store: Arc<dyn NodeStore>,
        config: SyncConfig,
    ) -> Self {
        Self {
            ctx: SyncContext::new(cluster, store, config),
        }
    }

    /// Create a service talking to a real cluster through kube-rs
    pub fn with_kube_client(
        client: kube::Client,
        store: Arc<dyn NodeStore>,
        config: SyncConfig,
    ) -> Self {
        let cluster = Arc::new(KubeClusterClient::new(client, config.field_manager.clone()));
        Self::new(cluster, store, config)
    }

    /// The sync configuration in effect
    pub fn config(&self) -> &SyncConfig {
        &self.ctx.config
    }

    /// Reconcile, then filter, sort and paginate
    #[instrument(skip(self))]
    pub async fn list_worker_nodes(
        &self,
        filter: &NodeFilter,
        pagination: Pagination,
        sort: SortSpec,
    ) -> Result<NodePage> {
        let nodes = reconcile::reconcile(&self.ctx).await?;
        Ok(query::apply(nodes, filter, sort, pagination))
    }

    /// Reconcile and return a single node by store id or name
    #[instrument(skip(self))]
    pub async fn get_worker_node(&self, id_or_name: &str) -> Result<EnrichedNode> {
        reconcile::reconcile_node(&self.ctx, id_or_name).await
    }

    /// Reconcile the whole fleet and return every node
    #[instrument(skip(self))]
    pub async fn sync_cluster_state(&self) -> Result<Vec<EnrichedNode>> {
        let nodes = reconcile::reconcile(&self.ctx).await?;
        info!(nodes = nodes.len(), "cluster state synchronized");
        Ok(nodes)
    }

    /// Reconcile and aggregate fleet statistics
    #[instrument(skip(self))]
    pub async fn get_cluster_stats(&self) -> Result<ClusterStats> {
        let nodes = reconcile::reconcile(&self.ctx).await?;
        Ok(stats::aggregate(&nodes))
    }

    /// Nodes that are ready, schedulable and ACTIVE
    #[instrument(skip(self))]
    pub async fn list_online(&self) -> Result<Vec<EnrichedNode>> {
        let (online, _) = stats::partition(reconcile::reconcile(&self.ctx).await?);
        Ok(online)
    }

    /// Every node not in the online set
    #[instrument(skip(self))]
    pub async fn list_offline_nodes(&self) -> Result<Vec<EnrichedNode>> {
        let (_, offline) = stats::partition(reconcile::reconcile(&self.ctx).await?);
        Ok(offline)
    }

    /// Mark a node unschedulable
    #[instrument(skip(self))]
    pub async fn cordon(&self, id_or_name: &str) -> Result<WorkerNode> {
        lifecycle::cordon(&self.ctx, id_or_name).await
    }

    /// Mark a node schedulable again
    #[instrument(skip(self))]
    pub async fn uncordon(&self, id_or_name: &str) -> Result<WorkerNode> {
        lifecycle::uncordon(&self.ctx, id_or_name).await
    }

    /// Cordon a node and evict its pods
    #[instrument(skip(self))]
    pub async fn drain(&self, id_or_name: &str, options: DrainOptions) -> Result<DrainResult> {
        lifecycle::drain(&self.ctx, id_or_name, options).await
    }

    /// Remove the persisted record of a node; the cluster is not touched
    ///
    /// A node still in the cluster is registered again by the next sync.
    #[instrument(skip(self))]
    pub async fn delete_worker_node(&self, id_or_name: &str) -> Result<WorkerNode> {
        let store = &self.ctx.store;
        let record = match store.find_by_id(id_or_name).await? {
            Some(record) => record,
            None => store
                .find_by_name(id_or_name)
                .await?
                .ok_or_else(|| Error::node_not_found(id_or_name))?,
        };
        store.delete(&record.name).await?;
        info!(node = %record.name, id = %record.id, "worker node record deleted");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::cluster::{DisconnectedClusterClient, MockClusterClient};
    use crate::model::NodeStatus;
    use crate::query::{SortField, SortOrder};
    use crate::store::InMemoryNodeStore;
    use crate::testing::{pod, NodeBuilder};

    fn fleet_cluster() -> MockClusterClient {
        let mut cluster = MockClusterClient::new();
        cluster.expect_list_nodes().returning(|| {
            Ok(vec![
                NodeBuilder::new("worker-1").cpu("4").build(),
                NodeBuilder::new("worker-2").cpu("4").ready(false).build(),
                NodeBuilder::new("worker-3").cpu("4").build(),
            ])
        });
        cluster
            .expect_list_node_metrics()
            .returning(|| Ok(BTreeMap::new()));
        cluster.expect_list_pods_on_node().returning(|node| match node {
            "worker-1" => Ok(vec![
                pod("a", node, "1", "1Gi"),
                pod("b", node, "1", "1Gi"),
            ]),
            "worker-3" => Ok(vec![pod("c", node, "1", "1Gi")]),
            _ => Ok(Vec::new()),
        });
        cluster
    }

    fn service(cluster: MockClusterClient, store: Arc<InMemoryNodeStore>) -> FleetService {
        FleetService::new(Arc::new(cluster), store, SyncConfig::default())
    }

    /// Story: an operator checks how full the fleet is
    #[tokio::test]
    async fn story_stats_reflect_live_allocation() {
        let svc = service(fleet_cluster(), Arc::new(InMemoryNodeStore::new()));
        let stats = svc.get_cluster_stats().await.unwrap();
        assert_eq!(stats.total_nodes, 3);
        assert_eq!(stats.cpu.total, 12.0);
        assert_eq!(stats.cpu.allocated, 3.0);
        assert_eq!(stats.cpu.utilization, 25.0);
        assert_eq!(stats.status_counts.not_ready, 1);
    }

    #[tokio::test]
    async fn online_and_offline_split_the_fleet() {
        let svc = service(fleet_cluster(), Arc::new(InMemoryNodeStore::new()));
        let online: Vec<String> = svc
            .list_online()
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.node.name)
            .collect();
        let offline: Vec<String> = svc
            .list_offline_nodes()
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.node.name)
            .collect();
        assert_eq!(online, ["worker-1", "worker-3"]);
        assert_eq!(offline, ["worker-2"]);
    }

    #[tokio::test]
    async fn listing_pages_over_reconciled_nodes() {
        let svc = service(fleet_cluster(), Arc::new(InMemoryNodeStore::new()));
        let page = svc
            .list_worker_nodes(
                &NodeFilter {
                    status: Some(NodeStatus::Active),
                    ..Default::default()
                },
                Pagination::new(1, 1),
                SortSpec::new(SortField::AllocatedCpu, SortOrder::Desc),
            )
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.items[0].name(), "worker-1");
    }

    #[tokio::test]
    async fn delete_removes_record_only() {
        let store = Arc::new(InMemoryNodeStore::new());
        let svc = service(fleet_cluster(), store.clone());
        svc.sync_cluster_state().await.unwrap();

        let id = store.find_by_name("worker-2").await.unwrap().unwrap().id;
        let deleted = svc.delete_worker_node(&id).await.unwrap();
        assert_eq!(deleted.name, "worker-2");
        assert!(store.find_by_name("worker-2").await.unwrap().is_none());

        let err = svc.delete_worker_node("worker-2").await.unwrap_err();
        assert!(err.is_not_found());
    }

    /// Story: with no cluster configured, reads fail but the inventory remains editable
    #[tokio::test]
    async fn story_disconnected_service() {
        let store = Arc::new(InMemoryNodeStore::new());
        let svc = FleetService::new(
            Arc::new(DisconnectedClusterClient::new("no kubeconfig")),
            store.clone(),
            SyncConfig::default(),
        );
        assert!(svc
            .sync_cluster_state()
            .await
            .unwrap_err()
            .is_cluster_unavailable());
        assert!(svc
            .get_cluster_stats()
            .await
            .unwrap_err()
            .is_cluster_unavailable());
        assert!(svc.delete_worker_node("worker-1").await.unwrap_err().is_not_found());
    }
}
