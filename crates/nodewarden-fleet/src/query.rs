//! Filtering, sorting and pagination over a reconciled node list

use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::{EnrichedNode, NodeStatus};

/// Default page size
pub const DEFAULT_PAGE_LIMIT: usize = 20;
/// Largest page a caller may request
pub const MAX_PAGE_LIMIT: usize = 100;

/// Exact-match filters plus a free-text search
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeFilter {
    pub status: Option<NodeStatus>,
    pub is_ready: Option<bool>,
    pub is_schedulable: Option<bool>,
    /// Case-insensitive substring over name, hostname, ip, architecture and OS
    pub search: Option<String>,
}

impl NodeFilter {
    /// Whether the node passes every set filter
    pub fn matches(&self, node: &EnrichedNode) -> bool {
        let n = &node.node;
        if self.status.is_some_and(|s| s != n.status) {
            return false;
        }
        if self.is_ready.is_some_and(|r| r != n.is_ready) {
            return false;
        }
        if self.is_schedulable.is_some_and(|s| s != n.is_schedulable) {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let term = term.to_lowercase();
                [
                    Some(n.name.as_str()),
                    n.hostname.as_deref(),
                    n.ip_address.as_deref(),
                    n.cpu_architecture.as_deref(),
                    n.operating_system.as_deref(),
                ]
                .into_iter()
                .flatten()
                .any(|field| field.to_lowercase().contains(&term))
            }
        }
    }
}

/// Sortable node fields
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    #[default]
    Name,
    Hostname,
    IpAddress,
    Status,
    CpuCores,
    TotalMemory,
    AllocatedCpu,
    AllocatedMemory,
    CurrentPods,
    CpuUtilization,
    MemoryUtilization,
    CreatedAt,
    LastHeartbeat,
}

impl FromStr for SortField {
    type Err = String;

    /// Accepts camelCase, snake_case or kebab-case names
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();
        let field = match key.as_str() {
            "name" => SortField::Name,
            "hostname" => SortField::Hostname,
            "ip" | "ipaddress" => SortField::IpAddress,
            "status" => SortField::Status,
            "cpu" | "cpucores" => SortField::CpuCores,
            "memory" | "totalmemory" => SortField::TotalMemory,
            "allocatedcpu" => SortField::AllocatedCpu,
            "allocatedmemory" => SortField::AllocatedMemory,
            "pods" | "currentpods" => SortField::CurrentPods,
            "cpuutilization" => SortField::CpuUtilization,
            "memoryutilization" => SortField::MemoryUtilization,
            "createdat" => SortField::CreatedAt,
            "lastheartbeat" => SortField::LastHeartbeat,
            _ => return Err(format!("unknown sort field: {}", s)),
        };
        Ok(field)
    }
}

/// Sort direction
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Field and direction to sort by
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    pub order: SortOrder,
}

impl SortSpec {
    pub fn new(field: SortField, order: SortOrder) -> Self {
        Self { field, order }
    }

    fn compare(&self, a: &EnrichedNode, b: &EnrichedNode) -> Ordering {
        let (x, y) = (&a.node, &b.node);
        let ordering = match self.field {
            SortField::Name => Ordering::Equal,
            SortField::Hostname => x.hostname.cmp(&y.hostname),
            SortField::IpAddress => x.ip_address.cmp(&y.ip_address),
            SortField::Status => x.status.as_str().cmp(y.status.as_str()),
            SortField::CpuCores => x.cpu_cores.total_cmp(&y.cpu_cores),
            SortField::TotalMemory => x.total_memory.total_cmp(&y.total_memory),
            SortField::AllocatedCpu => x.allocated_cpu.total_cmp(&y.allocated_cpu),
            SortField::AllocatedMemory => x.allocated_memory.total_cmp(&y.allocated_memory),
            SortField::CurrentPods => x.current_pods.cmp(&y.current_pods),
            SortField::CpuUtilization => cmp_optional(a.cpu_utilization, b.cpu_utilization),
            SortField::MemoryUtilization => {
                cmp_optional(a.memory_utilization, b.memory_utilization)
            }
            SortField::CreatedAt => x.created_at.cmp(&y.created_at),
            SortField::LastHeartbeat => x.last_heartbeat.cmp(&y.last_heartbeat),
        }
        .then_with(|| x.name.cmp(&y.name));

        match self.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

// None sorts before any value
fn cmp_optional(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (a, b) => a.is_some().cmp(&b.is_some()),
    }
}

/// 1-based page request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl Pagination {
    /// Clamp to a valid request: page at least 1, limit in `1..=MAX_PAGE_LIMIT`
    pub fn new(page: usize, limit: usize) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_PAGE_LIMIT),
        }
    }
}

/// One page of nodes plus totals over the filtered set
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePage {
    pub items: Vec<EnrichedNode>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub total_pages: usize,
}

/// Filter, sort and paginate
pub fn apply(
    nodes: Vec<EnrichedNode>,
    filter: &NodeFilter,
    sort: SortSpec,
    pagination: Pagination,
) -> NodePage {
    let pagination = Pagination::new(pagination.page, pagination.limit);
    let mut matching: Vec<EnrichedNode> = nodes.into_iter().filter(|n| filter.matches(n)).collect();
    matching.sort_by(|a, b| sort.compare(a, b));

    let total = matching.len();
    let items = matching
        .into_iter()
        .skip((pagination.page - 1).saturating_mul(pagination.limit))
        .take(pagination.limit)
        .collect();

    NodePage {
        items,
        total,
        page: pagination.page,
        limit: pagination.limit,
        total_pages: total.div_ceil(pagination.limit),
    }
}
