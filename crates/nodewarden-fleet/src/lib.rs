//! Fleet inventory reconciliation for Kubernetes worker nodes
//!
//! Keeps a persisted node inventory in line with the live cluster, enriches
//! nodes with allocation and utilization data, runs cordon/uncordon/drain and
//! aggregates cluster-wide statistics.

pub mod cluster;
pub mod config;
pub mod enrich;
pub mod lifecycle;
pub mod model;
pub mod query;
pub mod reconcile;
pub mod service;
pub mod stats;
pub mod store;

#[cfg(test)]
mod testing;

pub use cluster::{ClusterClient, DisconnectedClusterClient, KubeClusterClient};
pub use config::{EnvSource, OsEnv, SyncConfig};
pub use model::{
    DrainOptions, DrainResult, EnrichedNode, EvictionResult, EvictionStatus, NodeStatus,
    WorkerNode,
};
pub use query::{NodeFilter, NodePage, Pagination, SortField, SortOrder, SortSpec};
pub use service::FleetService;
pub use stats::ClusterStats;
pub use store::{InMemoryNodeStore, NodeStore};
