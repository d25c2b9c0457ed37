//! Shared Kubernetes utilities using kube-rs
//!
//! Client construction, condition lookups and the handful of field selectors
//! the fleet engine needs. Nothing here shells out to kubectl.

use std::path::Path;
use std::time::Duration;

use k8s_openapi::api::core::v1::{Node, NodeCondition, Pod};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::debug;

use crate::Error;

/// Condition type reported by the kubelet when the node is healthy
pub const CONDITION_READY: &str = "Ready";

/// Condition status string meaning the condition holds
pub const STATUS_TRUE: &str = "True";

/// Default connection timeout for kube clients
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default read timeout for kube clients
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Check if a condition with the given type exists and has status "True"
///
/// # Arguments
/// * `conditions` - Optional slice of conditions (e.g., from status.conditions)
/// * `condition_type` - The condition type to check (e.g., "Ready")
pub fn has_condition<T>(conditions: Option<&[T]>, condition_type: &str) -> bool
where
    T: HasConditionFields,
{
    conditions
        .map(|conds| {
            conds
                .iter()
                .any(|c| c.type_field() == condition_type && c.status_field() == STATUS_TRUE)
        })
        .unwrap_or(false)
}

/// Trait for types that have condition-like fields (type and status)
pub trait HasConditionFields {
    /// Get the condition type field value
    fn type_field(&self) -> &str;
    /// Get the condition status field value
    fn status_field(&self) -> &str;
}

impl HasConditionFields for NodeCondition {
    fn type_field(&self) -> &str {
        &self.type_
    }
    fn status_field(&self) -> &str {
        &self.status
    }
}

/// Whether the node's Ready condition is True
pub fn is_node_ready(node: &Node) -> bool {
    let conditions = node.status.as_ref().and_then(|s| s.conditions.as_deref());
    has_condition(conditions, CONDITION_READY)
}

/// Whether the node is marked unschedulable (cordoned)
pub fn is_node_unschedulable(node: &Node) -> bool {
    node.spec
        .as_ref()
        .and_then(|s| s.unschedulable)
        .unwrap_or(false)
}

/// Field selector matching pods bound to the given node
pub fn pods_on_node_selector(node_name: &str) -> String {
    format!("spec.nodeName={}", node_name)
}

/// Whether the pod mounts an emptyDir volume (node-local data lost on eviction)
pub fn uses_local_storage(pod: &Pod) -> bool {
    pod.spec
        .as_ref()
        .and_then(|s| s.volumes.as_ref())
        .map(|volumes| volumes.iter().any(|v| v.empty_dir.is_some()))
        .unwrap_or(false)
}

/// Create a kube client from optional kubeconfig path with default timeouts
pub async fn create_client(kubeconfig: Option<&Path>) -> Result<Client, Error> {
    create_client_with_timeout(kubeconfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT).await
}

/// Create a kube client from optional kubeconfig path with custom timeouts
///
/// Any failure to load or infer configuration is reported as
/// `ClusterUnavailable`: without a config there is no control plane to talk to.
pub async fn create_client_with_timeout(
    kubeconfig: Option<&Path>,
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<Client, Error> {
    let mut config = match kubeconfig {
        Some(path) => {
            debug!(path = %path.display(), "loading kubeconfig");
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                Error::cluster_unavailable(format!(
                    "failed to read kubeconfig {}: {}",
                    path.display(),
                    e
                ))
            })?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| {
                    Error::cluster_unavailable(format!("failed to load kubeconfig: {}", e))
                })?
        }
        None => {
            debug!("inferring cluster config");
            Config::infer().await.map_err(|e| {
                Error::cluster_unavailable(format!("failed to infer config: {}", e))
            })?
        }
    };
    config.connect_timeout = Some(connect_timeout);
    config.read_timeout = Some(read_timeout);
    Client::try_from(config)
        .map_err(|e| Error::cluster_unavailable(format!("failed to create client: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{EmptyDirVolumeSource, NodeSpec, NodeStatus, PodSpec, Volume};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn node_with(ready: Option<&str>, unschedulable: Option<bool>) -> Node {
        Node {
            metadata: ObjectMeta {
                name: Some("worker-1".to_string()),
                ..Default::default()
            },
            spec: Some(NodeSpec {
                unschedulable,
                ..Default::default()
            }),
            status: Some(NodeStatus {
                conditions: ready.map(|status| {
                    vec![NodeCondition {
                        type_: CONDITION_READY.to_string(),
                        status: status.to_string(),
                        ..Default::default()
                    }]
                }),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn ready_condition_must_be_true() {
        assert!(is_node_ready(&node_with(Some("True"), None)));
        assert!(!is_node_ready(&node_with(Some("False"), None)));
        assert!(!is_node_ready(&node_with(Some("Unknown"), None)));
        assert!(!is_node_ready(&node_with(None, None)));
    }

    #[test]
    fn unschedulable_defaults_to_false() {
        assert!(!is_node_unschedulable(&node_with(None, None)));
        assert!(!is_node_unschedulable(&node_with(None, Some(false))));
        assert!(is_node_unschedulable(&node_with(None, Some(true))));
    }

    #[test]
    fn has_condition_ignores_other_types() {
        let conditions = vec![NodeCondition {
            type_: "MemoryPressure".to_string(),
            status: "True".to_string(),
            ..Default::default()
        }];
        assert!(!has_condition(Some(conditions.as_slice()), CONDITION_READY));
        assert!(has_condition(Some(conditions.as_slice()), "MemoryPressure"));
    }

    #[test]
    fn selector_targets_node_name() {
        assert_eq!(pods_on_node_selector("worker-1"), "spec.nodeName=worker-1");
    }

    #[test]
    fn detects_local_storage_pods() {
        assert!(!uses_local_storage(&Pod::default()));

        let scratch = Pod {
            spec: Some(PodSpec {
                volumes: Some(vec![Volume {
                    name: "scratch".to_string(),
                    empty_dir: Some(EmptyDirVolumeSource::default()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(uses_local_storage(&scratch));
    }
}
