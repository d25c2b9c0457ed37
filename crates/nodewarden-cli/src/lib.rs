//! nodewarden CLI library

pub mod commands;
pub mod error;

pub use error::{Error, Result};

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use commands::OutputFormat;

/// nodewarden - worker-node inventory and lifecycle for Kubernetes
#[derive(Parser, Debug)]
#[command(name = "nodewarden")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Path to kubeconfig file (default: inferred from $KUBECONFIG, ~/.kube/config or in-cluster)
    #[arg(long, global = true)]
    pub kubeconfig: Option<PathBuf>,

    /// Inventory file (default: ~/.nodewarden/inventory.json)
    #[arg(long, env = "NODEWARDEN_STORE", global = true)]
    pub store: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    pub output: OutputFormat,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Nodes enriched concurrently (overrides NODEWARDEN_ENRICH_CONCURRENCY)
    #[arg(long, global = true)]
    pub enrich_concurrency: Option<usize>,

    /// Pods evicted concurrently (overrides NODEWARDEN_EVICTION_CONCURRENCY)
    #[arg(long, global = true)]
    pub eviction_concurrency: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List or inspect worker nodes
    Nodes(commands::nodes::NodesArgs),
    /// Reconcile the inventory with the cluster
    Sync,
    /// Show cluster-wide statistics
    Stats,
    /// List nodes that are ready, schedulable and active
    Online,
    /// List nodes that are not online
    Offline,
    /// Mark a node unschedulable
    Cordon {
        /// Node name or inventory id
        node: String,
    },
    /// Mark a node schedulable
    Uncordon {
        /// Node name or inventory id
        node: String,
    },
    /// Cordon a node and evict its pods
    Drain(commands::ops::DrainArgs),
    /// Remove a node from the inventory (the cluster is not modified)
    Delete {
        /// Node name or inventory id
        node: String,
    },
    /// Re-run sync on an interval until interrupted
    Watch(commands::watch::WatchArgs),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        let session = commands::Session::open(&self.global).await?;
        let output = &self.global.output;

        let result = match self.command {
            Commands::Nodes(args) => commands::nodes::run(&session, args, output).await,
            Commands::Sync => commands::watch::sync_once(&session, output).await,
            Commands::Stats => commands::stats::run_stats(&session, output).await,
            Commands::Online => commands::stats::run_online(&session, output).await,
            Commands::Offline => commands::stats::run_offline(&session, output).await,
            Commands::Cordon { node } => commands::ops::cordon(&session, &node, output).await,
            Commands::Uncordon { node } => commands::ops::uncordon(&session, &node, output).await,
            Commands::Drain(args) => commands::ops::drain(&session, args, output).await,
            Commands::Delete { node } => commands::ops::delete(&session, &node, output).await,
            Commands::Watch(args) => commands::watch::run(&session, args, output).await,
        };

        // persist whatever was observed, even when the command itself failed
        session.save().await?;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodewarden_fleet::{NodeStatus, SortField};

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn nodes_list_flags() {
        let cli = parse(&[
            "nodewarden",
            "nodes",
            "list",
            "--status",
            "not-ready",
            "--ready",
            "false",
            "--search",
            "gpu",
            "--sort",
            "cpuUtilization",
            "--desc",
            "--page",
            "2",
            "--limit",
            "50",
        ]);
        let Commands::Nodes(args) = cli.command else {
            panic!("expected nodes command");
        };
        let commands::nodes::NodesCommand::List(list) = args.command else {
            panic!("expected list");
        };
        assert_eq!(list.status, Some(NodeStatus::NotReady));
        assert_eq!(list.ready, Some(false));
        assert_eq!(list.search.as_deref(), Some("gpu"));
        assert_eq!(list.sort, SortField::CpuUtilization);
        assert!(list.desc);
        assert_eq!(list.page, 2);
        assert_eq!(list.limit, 50);
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let cli = parse(&["nodewarden", "stats", "-o", "json", "--store", "/tmp/inv.json"]);
        assert_eq!(cli.global.output, OutputFormat::Json);
        assert_eq!(cli.global.store, Some(PathBuf::from("/tmp/inv.json")));
        assert!(matches!(cli.command, Commands::Stats));
    }

    #[test]
    fn drain_defaults() {
        let cli = parse(&["nodewarden", "drain", "worker-1"]);
        let Commands::Drain(args) = cli.command else {
            panic!("expected drain");
        };
        assert_eq!(args.node, "worker-1");
        assert_eq!(args.grace_period, None);
        assert!(!args.delete_local_data);
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(Cli::try_parse_from(["nodewarden", "nodes", "list", "--status", "retired"]).is_err());
    }

    #[test]
    fn watch_interval_must_be_positive() {
        assert!(Cli::try_parse_from(["nodewarden", "watch", "--interval", "0"]).is_err());
        let cli = parse(&["nodewarden", "watch"]);
        let Commands::Watch(args) = cli.command else {
            panic!("expected watch");
        };
        assert_eq!(args.interval, 30);
    }
}
