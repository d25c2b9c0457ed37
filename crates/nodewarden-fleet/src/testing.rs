//! Test fixtures: k8s-openapi node and pod builders

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    Container, EmptyDirVolumeSource, Node, NodeAddress, NodeCondition, NodeSpec, NodeStatus,
    NodeSystemInfo, Pod, PodSpec, ResourceRequirements, Taint, Volume,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::model::NodeUsage;

/// Builder for live `Node` objects
pub struct NodeBuilder {
    name: String,
    cpu: String,
    memory: String,
    storage: String,
    pods: String,
    ready: Option<bool>,
    unschedulable: bool,
    internal_ip: Option<String>,
    hostname: Option<String>,
    labels: BTreeMap<String, String>,
    taints: Vec<Taint>,
}

impl NodeBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            cpu: "4".to_string(),
            memory: "16Gi".to_string(),
            storage: "100Gi".to_string(),
            pods: "110".to_string(),
            ready: Some(true),
            unschedulable: false,
            internal_ip: None,
            hostname: None,
            labels: BTreeMap::new(),
            taints: Vec::new(),
        }
    }

    pub fn cpu(mut self, cpu: &str) -> Self {
        self.cpu = cpu.to_string();
        self
    }

    pub fn memory(mut self, memory: &str) -> Self {
        self.memory = memory.to_string();
        self
    }

    pub fn pods(mut self, pods: &str) -> Self {
        self.pods = pods.to_string();
        self
    }

    pub fn ready(mut self, ready: bool) -> Self {
        self.ready = Some(ready);
        self
    }

    /// Omit the Ready condition entirely
    pub fn no_conditions(mut self) -> Self {
        self.ready = None;
        self
    }

    pub fn unschedulable(mut self, unschedulable: bool) -> Self {
        self.unschedulable = unschedulable;
        self
    }

    pub fn internal_ip(mut self, ip: &str) -> Self {
        self.internal_ip = Some(ip.to_string());
        self
    }

    pub fn hostname(mut self, hostname: &str) -> Self {
        self.hostname = Some(hostname.to_string());
        self
    }

    pub fn label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    pub fn taint(mut self, key: &str, effect: &str) -> Self {
        self.taints.push(Taint {
            key: key.to_string(),
            effect: effect.to_string(),
            ..Default::default()
        });
        self
    }

    pub fn build(self) -> Node {
        let resources: BTreeMap<String, Quantity> = [
            ("cpu", self.cpu),
            ("memory", self.memory),
            ("ephemeral-storage", self.storage),
            ("pods", self.pods),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), Quantity(v)))
        .collect();

        let mut addresses = Vec::new();
        if let Some(ip) = self.internal_ip {
            addresses.push(NodeAddress {
                type_: "InternalIP".to_string(),
                address: ip,
            });
        }
        if let Some(hostname) = self.hostname {
            addresses.push(NodeAddress {
                type_: "Hostname".to_string(),
                address: hostname,
            });
        }

        let conditions = self.ready.map(|ready| {
            vec![NodeCondition {
                type_: "Ready".to_string(),
                status: if ready { "True" } else { "False" }.to_string(),
                ..Default::default()
            }]
        });

        Node {
            metadata: ObjectMeta {
                name: Some(self.name),
                labels: Some(self.labels),
                ..Default::default()
            },
            spec: Some(NodeSpec {
                unschedulable: Some(self.unschedulable),
                taints: (!self.taints.is_empty()).then_some(self.taints),
                ..Default::default()
            }),
            status: Some(NodeStatus {
                capacity: Some(resources.clone()),
                allocatable: Some(resources),
                addresses: Some(addresses),
                conditions,
                node_info: Some(NodeSystemInfo {
                    architecture: "amd64".to_string(),
                    operating_system: "linux".to_string(),
                    kernel_version: "6.1.0".to_string(),
                    os_image: "Ubuntu 22.04".to_string(),
                    container_runtime_version: "containerd://1.7.0".to_string(),
                    kubelet_version: "v1.32.0".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
        }
    }
}

/// Convenience for a ready, schedulable node with default capacity
pub fn node(name: &str) -> Node {
    NodeBuilder::new(name).build()
}

/// Builder for pods bound to a node
pub struct PodBuilder {
    name: String,
    namespace: String,
    node: String,
    requests: Vec<(Option<String>, Option<String>)>,
    empty_dir: bool,
}

impl PodBuilder {
    pub fn new(name: &str, node: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: "default".to_string(),
            node: node.to_string(),
            requests: Vec::new(),
            empty_dir: false,
        }
    }

    pub fn namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_string();
        self
    }

    /// Add a container with the given cpu/memory requests
    pub fn container(mut self, cpu: Option<&str>, memory: Option<&str>) -> Self {
        self.requests
            .push((cpu.map(str::to_string), memory.map(str::to_string)));
        self
    }

    pub fn empty_dir(mut self) -> Self {
        self.empty_dir = true;
        self
    }

    pub fn build(self) -> Pod {
        let containers = self
            .requests
            .into_iter()
            .enumerate()
            .map(|(i, (cpu, memory))| {
                let mut requests = BTreeMap::new();
                if let Some(cpu) = cpu {
                    requests.insert("cpu".to_string(), Quantity(cpu));
                }
                if let Some(memory) = memory {
                    requests.insert("memory".to_string(), Quantity(memory));
                }
                Container {
                    name: format!("c{}", i),
                    resources: Some(ResourceRequirements {
                        requests: (!requests.is_empty()).then_some(requests),
                        ..Default::default()
                    }),
                    ..Default::default()
                }
            })
            .collect();

        let volumes = self.empty_dir.then(|| {
            vec![Volume {
                name: "scratch".to_string(),
                empty_dir: Some(EmptyDirVolumeSource::default()),
                ..Default::default()
            }]
        });

        Pod {
            metadata: ObjectMeta {
                name: Some(self.name),
                namespace: Some(self.namespace),
                ..Default::default()
            },
            spec: Some(PodSpec {
                node_name: Some(self.node),
                containers,
                volumes,
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

/// A pod with one container requesting `cpu` and `memory`
pub fn pod(name: &str, node: &str, cpu: &str, memory: &str) -> Pod {
    PodBuilder::new(name, node)
        .container(Some(cpu), Some(memory))
        .build()
}

/// Usage sample as returned by the metrics API
pub fn usage(cpu_cores: f64, memory_gb: f64) -> NodeUsage {
    NodeUsage {
        cpu_cores,
        memory_gb,
        timestamp: None,
        window: None,
    }
}
