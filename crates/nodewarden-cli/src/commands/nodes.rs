//! `nodewarden nodes` - list and inspect worker nodes

use clap::{Args, Subcommand};

use nodewarden_fleet::{
    EnrichedNode, NodeFilter, NodePage, NodeStatus, Pagination, SortField, SortOrder, SortSpec,
};

use super::format::{
    format_optional_age, format_percent, format_ratio, render_fields, render_table, trim_float,
    yes_no,
};
use super::{emit, OutputFormat, Session};
use crate::Result;

#[derive(Args, Debug)]
pub struct NodesArgs {
    #[command(subcommand)]
    pub command: NodesCommand,
}

#[derive(Subcommand, Debug)]
pub enum NodesCommand {
    /// List nodes with filters, sorting and pagination
    List(ListArgs),
    /// Show one node by name or inventory id
    Get {
        /// Node name or inventory id
        node: String,
    },
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only nodes with this status (ACTIVE, INACTIVE, MAINTENANCE, PENDING, NOT_READY)
    #[arg(long)]
    pub status: Option<NodeStatus>,

    /// Only ready (true) or not ready (false) nodes
    #[arg(long, value_name = "BOOL")]
    pub ready: Option<bool>,

    /// Only schedulable (true) or cordoned (false) nodes
    #[arg(long, value_name = "BOOL")]
    pub schedulable: Option<bool>,

    /// Case-insensitive match on name, hostname, IP, architecture or OS
    #[arg(long)]
    pub search: Option<String>,

    /// Field to sort by (e.g. name, cpuCores, cpuUtilization, lastHeartbeat)
    #[arg(long, default_value = "name")]
    pub sort: SortField,

    /// Sort descending
    #[arg(long)]
    pub desc: bool,

    /// Page number, starting at 1
    #[arg(long, default_value_t = 1)]
    pub page: usize,

    /// Nodes per page (at most 100)
    #[arg(long, default_value_t = nodewarden_fleet::query::DEFAULT_PAGE_LIMIT)]
    pub limit: usize,
}

impl ListArgs {
    fn filter(&self) -> NodeFilter {
        NodeFilter {
            status: self.status,
            is_ready: self.ready,
            is_schedulable: self.schedulable,
            search: self.search.clone(),
        }
    }

    fn sort_spec(&self) -> SortSpec {
        let order = if self.desc {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        };
        SortSpec::new(self.sort, order)
    }
}

pub async fn run(session: &Session, args: NodesArgs, output: &OutputFormat) -> Result<()> {
    match args.command {
        NodesCommand::List(list) => {
            let page = session
                .service
                .list_worker_nodes(
                    &list.filter(),
                    Pagination::new(list.page, list.limit),
                    list.sort_spec(),
                )
                .await?;
            emit(output, &page, render_page)
        }
        NodesCommand::Get { node } => {
            let node = session.service.get_worker_node(&node).await?;
            emit(output, &node, render_node)
        }
    }
}

const NODE_HEADERS: [&str; 10] = [
    "NAME", "STATUS", "READY", "SCHED", "IP", "CPU", "MEMORY(GB)", "PODS", "CPU%", "MEM%",
];

fn node_row(node: &EnrichedNode) -> Vec<String> {
    let n = &node.node;
    vec![
        n.name.clone(),
        n.status.to_string(),
        yes_no(n.is_ready).to_string(),
        yes_no(n.is_schedulable).to_string(),
        n.ip_address.clone().unwrap_or_else(|| "-".to_string()),
        format_ratio(n.allocated_cpu, n.cpu_cores),
        format_ratio(n.allocated_memory, n.total_memory),
        format!("{}/{}", n.current_pods, n.max_pods),
        format_percent(node.cpu_utilization),
        format_percent(node.memory_utilization),
    ]
}

/// Table of nodes
pub fn render_nodes(nodes: &[EnrichedNode]) -> String {
    let rows: Vec<Vec<String>> = nodes.iter().map(node_row).collect();
    render_table(&NODE_HEADERS, &rows)
}

fn render_page(page: &NodePage) -> String {
    let mut out = render_nodes(&page.items);
    out.push_str(&format!(
        "\npage {} of {} ({} nodes)\n",
        page.page,
        page.total_pages.max(1),
        page.total
    ));
    out
}

fn render_node(node: &EnrichedNode) -> String {
    let n = &node.node;
    let opt = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
    let mut fields = vec![
        ("Name", n.name.clone()),
        ("ID", n.id.clone()),
        ("Status", n.status.to_string()),
        ("Ready", yes_no(n.is_ready).to_string()),
        ("Schedulable", yes_no(n.is_schedulable).to_string()),
        ("Hostname", opt(&n.hostname)),
        ("IP", opt(&n.ip_address)),
        ("Architecture", opt(&n.cpu_architecture)),
        ("OS", opt(&n.os_image)),
        ("Kernel", opt(&n.kernel_version)),
        ("Runtime", opt(&n.container_runtime)),
        ("Kubelet", opt(&n.kubelet_version)),
        ("CPU", format_ratio(n.allocated_cpu, n.cpu_cores)),
        ("Memory (GB)", format_ratio(n.allocated_memory, n.total_memory)),
        ("Storage (GB)", trim_float(n.total_storage)),
        ("Pods", format!("{}/{}", n.current_pods, n.max_pods)),
        ("CPU usage", format_percent(node.cpu_utilization)),
        ("Memory usage", format_percent(node.memory_utilization)),
        ("Heartbeat", format_optional_age(n.last_heartbeat.as_ref())),
        ("Age", format_optional_age(Some(&n.created_at))),
    ];
    if !n.taints.is_empty() {
        let taints: Vec<String> = n
            .taints
            .iter()
            .map(|t| match &t.value {
                Some(v) => format!("{}={}:{}", t.key, v, t.effect),
                None => format!("{}:{}", t.key, t.effect),
            })
            .collect();
        fields.push(("Taints", taints.join(", ")));
    }
    if !node.live {
        fields.push(("Note", "not present in the cluster".to_string()));
    } else if !node.allocation_available {
        fields.push(("Note", "pods unreadable, allocation is from the last sync".to_string()));
    }
    render_fields(&fields)
}
