//! Reconciliation engine
//!
//! Brings the node store in line with the live cluster and returns the
//! enriched view of every known node. There is no cache: each call observes
//! the cluster afresh.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use k8s_openapi::api::core::v1::Node;
use tracing::{debug, warn};

use nodewarden_common::{Error, Result};

use crate::cluster::ClusterClient;
use crate::config::SyncConfig;
use crate::enrich::{disappeared, enrich, node_facts, node_name, persisted_update};
use crate::model::{EnrichedNode, NodeUpdate, NodeUsage, WorkerNode};
use crate::store::NodeStore;

/// Shared collaborators for reconciliation and lifecycle operations
#[derive(Clone)]
pub struct SyncContext {
    /// Control plane access (trait object for testability)
    pub cluster: Arc<dyn ClusterClient>,
    /// Persisted inventory
    pub store: Arc<dyn NodeStore>,
    /// Fan-out limits and patch settings
    pub config: SyncConfig,
}

impl SyncContext {
    /// Create a context with the given collaborators
    pub fn new(
        cluster: Arc<dyn ClusterClient>,
        store: Arc<dyn NodeStore>,
        config: SyncConfig,
    ) -> Self {
        Self {
            cluster,
            store,
            config,
        }
    }
}

/// Reconcile the whole fleet
///
/// 1. List live nodes; failure aborts with `ClusterUnavailable`.
/// 2. Read metrics once for all nodes; failure only disables utilization.
/// 3. Upsert, enrich and persist each live node with bounded concurrency.
///    A node whose store write fails is logged and skipped. A node whose pods
///    cannot be listed is kept with `allocation_available` cleared.
/// 4. Mark records missing from the live list INACTIVE and include them.
///    If the store cannot be listed the sweep is skipped for this pass.
///
/// Returns every node sorted by name.
pub async fn reconcile(ctx: &SyncContext) -> Result<Vec<EnrichedNode>> {
    let live_nodes = ctx.cluster.list_nodes().await?;
    let metrics = cluster_metrics(ctx).await;
    let live_names: BTreeSet<String> = live_nodes.iter().map(|n| node_name(n).to_string()).collect();

    let results: Vec<Result<EnrichedNode>> = stream::iter(live_nodes.iter())
        .filter(|node| futures::future::ready(!node_name(node).is_empty()))
        .map(|node| {
            let usage = metrics.get(node_name(node));
            sync_live_node(ctx, node, usage)
        })
        .buffer_unordered(ctx.config.enrich_concurrency.max(1))
        .collect()
        .await;

    let mut enriched = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(node) => enriched.push(node),
            Err(e) if e.is_cluster_unavailable() => return Err(e),
            Err(e) => {
                warn!(node = e.node().unwrap_or("unknown"), error = %e, "skipping node");
            }
        }
    }

    let records = match ctx.store.list().await {
        Ok(records) => records,
        Err(e) => {
            warn!(error = %e, "failed to list inventory, skipping disappearance sweep");
            Vec::new()
        }
    };
    for record in records {
        if live_names.contains(&record.name) {
            continue;
        }
        match mark_disappeared(ctx, &record).await {
            Ok(gone) => enriched.push(gone),
            Err(e) => warn!(node = %record.name, error = %e, "failed to mark node inactive"),
        }
    }

    enriched.sort_by(|a, b| a.node.name.cmp(&b.node.name));
    Ok(enriched)
}

/// Reconcile a single node by store id or node name
///
/// The live node is fetched directly by name. A record whose node is gone is
/// marked INACTIVE; an identifier unknown to both sides is `NodeNotFound`.
pub async fn reconcile_node(ctx: &SyncContext, id_or_name: &str) -> Result<EnrichedNode> {
    let record = match ctx.store.find_by_id(id_or_name).await? {
        Some(record) => Some(record),
        None => ctx.store.find_by_name(id_or_name).await?,
    };
    let name = record
        .as_ref()
        .map(|r| r.name.clone())
        .unwrap_or_else(|| id_or_name.to_string());

    match ctx.cluster.get_node(&name).await? {
        Some(live) => {
            let usage = match ctx.cluster.get_node_metrics(&name).await {
                Ok(usage) => Some(usage),
                Err(e) => {
                    debug!(node = %name, error = %e, "metrics unavailable");
                    None
                }
            };
            sync_live_node(ctx, &live, usage.as_ref()).await
        }
        None => match record {
            Some(record) => mark_disappeared(ctx, &record).await,
            None => Err(Error::node_not_found(id_or_name)),
        },
    }
}

async fn cluster_metrics(ctx: &SyncContext) -> BTreeMap<String, NodeUsage> {
    match ctx.cluster.list_node_metrics().await {
        Ok(metrics) => metrics,
        Err(e) => {
            debug!(error = %e, "node metrics unavailable, utilization disabled");
            BTreeMap::new()
        }
    }
}

/// Upsert, enrich and persist one live node
async fn sync_live_node(
    ctx: &SyncContext,
    live: &Node,
    usage: Option<&NodeUsage>,
) -> Result<EnrichedNode> {
    let name = node_name(live);
    let now = Utc::now();

    let record = ctx
        .store
        .upsert(name, &node_facts(live), now)
        .await
        .map_err(|e| as_store_error(name, e))?;
    let pods = match ctx.cluster.list_pods_on_node(name).await {
        Ok(pods) => Some(pods),
        Err(e) if e.is_cluster_unavailable() => return Err(e),
        Err(e) => {
            warn!(node = %name, error = %e, "failed to list pods, keeping last allocation");
            None
        }
    };

    let enriched = enrich(&record, live, pods.as_deref(), usage, now);
    ctx.store
        .update(name, &persisted_update(&enriched))
        .await
        .map_err(|e| as_store_error(name, e))?;
    Ok(enriched)
}

async fn mark_disappeared(ctx: &SyncContext, record: &WorkerNode) -> Result<EnrichedNode> {
    let updated = ctx
        .store
        .update(&record.name, &NodeUpdate::disappeared())
        .await
        .map_err(|e| as_store_error(&record.name, e))?;
    debug!(node = %record.name, "node no longer in cluster, marked inactive");
    Ok(disappeared(&updated))
}

fn as_store_error(node: &str, err: Error) -> Error {
    match err {
        Error::StoreInconsistency { .. } => err,
        other => Error::store_inconsistency(node, other.to_string()),
    }
}
