//! Cordon, uncordon and drain
//!
//! Schedulability changes are applied to the cluster first and mirrored into
//! the store afterwards. A drain evicts every pod on the node, isolating each
//! eviction so one rejected pod never stops the others.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::ResourceExt;
use tracing::{info, warn};

use nodewarden_common::kube_utils::uses_local_storage;
use nodewarden_common::{Error, Result};

use crate::enrich::node_facts;
use crate::model::{
    DrainOptions, DrainResult, EvictionResult, NodeStatus, NodeUpdate, WorkerNode,
};
use crate::reconcile::SyncContext;

/// Resolve a store id or node name to a node name
///
/// Tries the store by id, then by name, then the live cluster. Unknown
/// everywhere is `NodeNotFound`.
pub async fn resolve_node_name(ctx: &SyncContext, id_or_name: &str) -> Result<String> {
    if let Some(record) = ctx.store.find_by_id(id_or_name).await? {
        return Ok(record.name);
    }
    if let Some(record) = ctx.store.find_by_name(id_or_name).await? {
        return Ok(record.name);
    }
    match ctx.cluster.get_node(id_or_name).await? {
        Some(_) => Ok(id_or_name.to_string()),
        None => Err(Error::node_not_found(id_or_name)),
    }
}

/// Mark a node unschedulable. Idempotent.
pub async fn cordon(ctx: &SyncContext, id_or_name: &str) -> Result<WorkerNode> {
    let name = resolve_node_name(ctx, id_or_name).await?;
    let live = ctx.cluster.set_schedulable(&name, false).await?;
    let record = record_schedulability(ctx, &name, &live, false, NodeUpdate::default()).await?;
    info!(node = %name, "node cordoned");
    Ok(record)
}

/// Mark a node schedulable again. Idempotent.
///
/// A ready node leaving MAINTENANCE goes back to ACTIVE.
pub async fn uncordon(ctx: &SyncContext, id_or_name: &str) -> Result<WorkerNode> {
    let name = resolve_node_name(ctx, id_or_name).await?;
    let live = ctx.cluster.set_schedulable(&name, true).await?;

    let mut update = NodeUpdate::default();
    let facts = node_facts(&live);
    let in_maintenance = ctx
        .store
        .find_by_name(&name)
        .await?
        .is_some_and(|r| r.status == NodeStatus::Maintenance);
    if in_maintenance && facts.is_ready {
        update = update.status(NodeStatus::Active);
    }

    let record = record_schedulability(ctx, &name, &live, true, update).await?;
    info!(node = %name, status = %record.status, "node uncordoned");
    Ok(record)
}

/// Cordon the node and evict every pod on it
///
/// Eviction failures are collected per pod in the result; only resolving,
/// cordoning or listing pods can fail the drain itself. Completes once every
/// eviction was accepted or rejected, not when the pods have terminated.
pub async fn drain(
    ctx: &SyncContext,
    id_or_name: &str,
    options: DrainOptions,
) -> Result<DrainResult> {
    let record = cordon(ctx, id_or_name).await?;
    let name = record.name;
    let pods = ctx.cluster.list_pods_on_node(&name).await?;
    let grace_period = options
        .grace_period_seconds
        .unwrap_or(ctx.config.default_grace_period_seconds);
    info!(node = %name, pods = pods.len(), grace_period, "draining node");

    let results: Vec<EvictionResult> = stream::iter(pods.iter())
        .map(|pod| evict_one(ctx, pod, grace_period, options.delete_local_data))
        .buffered(ctx.config.eviction_concurrency.max(1))
        .collect()
        .await;
    let result = DrainResult::from_results(&name, results);

    let update = NodeUpdate::default()
        .status(NodeStatus::Maintenance)
        .schedulable(false)
        .current_pods(0);
    if let Err(e) = ctx.store.update(&name, &update).await {
        warn!(node = %name, error = %e, "drain finished but the store was not updated");
    }

    info!(
        node = %name,
        evicted = result.pods_evicted,
        failed = result.pods_failed,
        "drain complete"
    );
    Ok(result)
}

async fn evict_one(
    ctx: &SyncContext,
    pod: &Pod,
    grace_period_seconds: u32,
    delete_local_data: bool,
) -> EvictionResult {
    let name = pod.name_any();
    let namespace = pod.namespace().unwrap_or_else(|| "default".to_string());

    if !delete_local_data && uses_local_storage(pod) {
        let err = Error::eviction_failed(
            &name,
            &namespace,
            "pod uses emptyDir local storage; set delete_local_data to evict it",
        );
        warn!(pod = %name, namespace = %namespace, error = %err, "eviction skipped");
        return EvictionResult::failed(name, namespace, err.to_string());
    }

    match ctx
        .cluster
        .evict_pod(&name, &namespace, grace_period_seconds)
        .await
    {
        Ok(()) => EvictionResult::evicted(name, namespace),
        Err(e) => {
            let err = Error::eviction_failed(&name, &namespace, e.to_string());
            warn!(pod = %name, namespace = %namespace, error = %err, "eviction failed");
            EvictionResult::failed(name, namespace, err.to_string())
        }
    }
}

async fn record_schedulability(
    ctx: &SyncContext,
    name: &str,
    live: &Node,
    schedulable: bool,
    update: NodeUpdate,
) -> Result<WorkerNode> {
    let mut facts = node_facts(live);
    facts.is_schedulable = schedulable;
    ctx.store.upsert(name, &facts, Utc::now()).await?;
    ctx.store
        .update(name, &update.schedulable(schedulable))
        .await
}
