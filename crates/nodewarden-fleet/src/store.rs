//! Node store
//!
//! The persisted inventory contract plus an in-memory implementation keyed
//! by node name. Writes for one name go through a single map entry, so a
//! concurrent upsert can never create two records for the same node.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use nodewarden_common::{Error, Result};

use crate::model::{NodeFacts, NodeUpdate, WorkerNode};

/// Read/write contract of the persisted fleet inventory
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Look up a record by node name
    async fn find_by_name(&self, name: &str) -> Result<Option<WorkerNode>>;

    /// Look up a record by its store id
    async fn find_by_id(&self, id: &str) -> Result<Option<WorkerNode>>;

    /// All records, sorted by name
    async fn list(&self) -> Result<Vec<WorkerNode>>;

    /// Insert a new record; fails if the name is taken
    async fn create(&self, node: WorkerNode) -> Result<WorkerNode>;

    /// Apply a partial update to the record with the given name
    ///
    /// A missing record is `StoreInconsistency`.
    async fn update(&self, name: &str, update: &NodeUpdate) -> Result<WorkerNode>;

    /// Create the record (status ACTIVE) or refresh its live facts and heartbeat
    ///
    /// Status and allocation of an existing record are never touched here.
    async fn upsert(
        &self,
        name: &str,
        facts: &NodeFacts,
        heartbeat: DateTime<Utc>,
    ) -> Result<WorkerNode>;

    /// Remove a record, returning whether it existed
    async fn delete(&self, name: &str) -> Result<bool>;
}

/// DashMap-backed node store with JSON snapshot persistence
#[derive(Default)]
pub struct InMemoryNodeStore {
    nodes: DashMap<String, WorkerNode>,
}

impl InMemoryNodeStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding the given records
    pub fn from_snapshot(nodes: Vec<WorkerNode>) -> Self {
        let store = Self::new();
        for node in nodes {
            store.nodes.insert(node.name.clone(), node);
        }
        store
    }

    /// All records sorted by name
    pub fn snapshot(&self) -> Vec<WorkerNode> {
        let mut nodes: Vec<WorkerNode> = self.nodes.iter().map(|e| e.value().clone()).collect();
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        nodes
    }

    /// Load a snapshot file; a missing file yields an empty store
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no inventory file, starting empty");
                return Ok(Self::new());
            }
            Err(e) => {
                return Err(Error::internal_with_context(
                    "store",
                    format!("failed to read {}: {}", path.display(), e),
                ))
            }
        };
        let nodes: Vec<WorkerNode> = serde_json::from_slice(&raw).map_err(|e| {
            Error::serialization(format!("invalid inventory {}: {}", path.display(), e))
        })?;
        Ok(Self::from_snapshot(nodes))
    }

    /// Write the snapshot to `path`, creating parent directories
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::internal_with_context(
                    "store",
                    format!("failed to create {}: {}", parent.display(), e),
                )
            })?;
        }
        let json = serde_json::to_vec_pretty(&self.snapshot())
            .map_err(|e| Error::serialization(e.to_string()))?;
        tokio::fs::write(path, json).await.map_err(|e| {
            Error::internal_with_context(
                "store",
                format!("failed to write {}: {}", path.display(), e),
            )
        })
    }
}

#[async_trait]
impl NodeStore for InMemoryNodeStore {
    async fn find_by_name(&self, name: &str) -> Result<Option<WorkerNode>> {
        Ok(self.nodes.get(name).map(|e| e.value().clone()))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<WorkerNode>> {
        Ok(self
            .nodes
            .iter()
            .find(|e| e.value().id == id)
            .map(|e| e.value().clone()))
    }

    async fn list(&self) -> Result<Vec<WorkerNode>> {
        Ok(self.snapshot())
    }

    async fn create(&self, node: WorkerNode) -> Result<WorkerNode> {
        match self.nodes.entry(node.name.clone()) {
            Entry::Occupied(_) => Err(Error::store_inconsistency(
                &node.name,
                "a record with this name already exists",
            )),
            Entry::Vacant(slot) => {
                slot.insert(node.clone());
                Ok(node)
            }
        }
    }

    async fn update(&self, name: &str, update: &NodeUpdate) -> Result<WorkerNode> {
        let mut entry = self
            .nodes
            .get_mut(name)
            .ok_or_else(|| Error::store_inconsistency(name, "no record to update"))?;
        entry.apply_update(update, Utc::now());
        Ok(entry.clone())
    }

    async fn upsert(
        &self,
        name: &str,
        facts: &NodeFacts,
        heartbeat: DateTime<Utc>,
    ) -> Result<WorkerNode> {
        match self.nodes.entry(name.to_string()) {
            Entry::Occupied(mut existing) => {
                existing.get_mut().apply_facts(facts, heartbeat);
                Ok(existing.get().clone())
            }
            Entry::Vacant(slot) => {
                let node = WorkerNode::from_facts(
                    uuid::Uuid::new_v4().to_string(),
                    name,
                    facts,
                    heartbeat,
                );
                info!(node = %name, id = %node.id, "registered new worker node");
                slot.insert(node.clone());
                Ok(node)
            }
        }
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        Ok(self.nodes.remove(name).is_some())
    }
}
