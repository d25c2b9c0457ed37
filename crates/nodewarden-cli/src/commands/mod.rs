//! CLI commands
//!
//! Every command runs against a `Session`: the inventory file loaded into an
//! in-memory store plus a fleet service bound to the cluster, or to a
//! disconnected client when no cluster configuration can be loaded.

pub mod format;
pub mod nodes;
pub mod ops;
pub mod stats;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::ValueEnum;
use serde::Serialize;
use tracing::{debug, warn};

use nodewarden_common::kube_utils::create_client;
use nodewarden_fleet::{
    DisconnectedClusterClient, FleetService, InMemoryNodeStore, OsEnv, SyncConfig,
};

use crate::{Error, GlobalArgs, Result};

/// Inventory file location under the home directory
const DEFAULT_STORE_PATH: &str = ".nodewarden/inventory.json";

/// Output format
#[derive(Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Columnar table (default)
    #[default]
    Table,
    /// JSON
    Json,
}

/// Loaded inventory and the service operating on it
pub struct Session {
    pub service: FleetService,
    store: Arc<InMemoryNodeStore>,
    store_path: PathBuf,
}

impl Session {
    /// Load the inventory and connect to the cluster
    pub async fn open(global: &GlobalArgs) -> Result<Self> {
        let store_path = resolve_store_path(global.store.as_deref())?;
        let store = Arc::new(InMemoryNodeStore::load(&store_path).await?);
        debug!(path = %store_path.display(), "inventory loaded");

        let config = sync_config(global)?;
        let service = match create_client(global.kubeconfig.as_deref()).await {
            Ok(client) => FleetService::with_kube_client(client, store.clone(), config),
            Err(e) => {
                warn!(error = %e, "no cluster connection, only inventory commands will work");
                let reason = match e {
                    nodewarden_common::Error::ClusterUnavailable { message } => message,
                    other => other.to_string(),
                };
                FleetService::new(
                    Arc::new(DisconnectedClusterClient::new(reason)),
                    store.clone(),
                    config,
                )
            }
        };

        Ok(Self {
            service,
            store,
            store_path,
        })
    }

    /// Write the inventory back to disk
    pub async fn save(&self) -> Result<()> {
        self.store.save(&self.store_path).await?;
        Ok(())
    }
}

/// Explicit path, else `~/.nodewarden/inventory.json`
fn resolve_store_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    dirs::home_dir()
        .map(|home| home.join(DEFAULT_STORE_PATH))
        .ok_or_else(|| Error::StorePath {
            path: PathBuf::from("~").join(DEFAULT_STORE_PATH),
        })
}

/// Environment configuration with command-line overrides applied
fn sync_config(global: &GlobalArgs) -> Result<SyncConfig> {
    let mut config = SyncConfig::from_env(&OsEnv)?;
    if let Some(n) = global.enrich_concurrency {
        config = config.with_enrich_concurrency(n)?;
    }
    if let Some(n) = global.eviction_concurrency {
        config = config.with_eviction_concurrency(n)?;
    }
    Ok(config)
}

/// Print `value` as JSON, or as rendered by `table` otherwise
pub(crate) fn emit<T: Serialize>(
    output: &OutputFormat,
    value: &T,
    table: impl FnOnce(&T) -> String,
) -> Result<()> {
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Table => print!("{}", table(value)),
    }
    Ok(())
}
