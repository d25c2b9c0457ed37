//! Error types for nodewarden
//!
//! Errors carry the node, pod or configuration key they concern so a failure
//! deep inside a reconciliation pass can be traced back without extra logging.
//! Failures scoped to a single node or pod are normally folded into result
//! data by the callers; only `ClusterUnavailable` is expected to abort a pass.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for nodewarden operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error that is not a connectivity failure
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// The control plane client is missing or cannot reach the API server
    #[error("cluster unavailable: {message}")]
    ClusterUnavailable {
        /// Description of why the cluster cannot be reached
        message: String,
    },

    /// Neither the store nor the live cluster knows the identifier
    #[error("node not found: {node}")]
    NodeNotFound {
        /// The id or name that was requested
        node: String,
    },

    /// Metrics for a node could not be read (soft failure)
    #[error("metrics unavailable for {node}: {message}")]
    MetricsUnavailable {
        /// Node whose metrics were requested
        node: String,
        /// Description of what failed
        message: String,
    },

    /// A single pod eviction was rejected or failed
    #[error("eviction failed for {namespace}/{pod}: {message}")]
    EvictionFailed {
        /// Pod name
        pod: String,
        /// Pod namespace
        namespace: String,
        /// Description of what failed (e.g. disruption budget violation)
        message: String,
    },

    /// A live node could not be matched or written in the node store
    #[error("store inconsistency for {node}: {message}")]
    StoreInconsistency {
        /// Node name the store operation concerned
        node: String,
        /// Description of what failed
        message: String,
    },

    /// Invalid configuration value
    #[error("configuration error for {key}: {message}")]
    Config {
        /// Configuration key (environment variable or flag)
        key: String,
        /// Description of what's invalid
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "store", "client")
        context: String,
    },
}

impl Error {
    /// Create a cluster-unavailable error
    pub fn cluster_unavailable(msg: impl Into<String>) -> Self {
        Self::ClusterUnavailable {
            message: msg.into(),
        }
    }

    /// Create a not-found error for the given id or name
    pub fn node_not_found(node: impl Into<String>) -> Self {
        Self::NodeNotFound { node: node.into() }
    }

    /// Create a metrics-unavailable error
    pub fn metrics_unavailable(node: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::MetricsUnavailable {
            node: node.into(),
            message: msg.into(),
        }
    }

    /// Create an eviction failure for a single pod
    pub fn eviction_failed(
        pod: impl Into<String>,
        namespace: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::EvictionFailed {
            pod: pod.into(),
            namespace: namespace.into(),
            message: msg.into(),
        }
    }

    /// Create a store inconsistency error for a node
    pub fn store_inconsistency(node: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::StoreInconsistency {
            node: node.into(),
            message: msg.into(),
        }
    }

    /// Create a configuration error
    pub fn config(key: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Config {
            key: key.into(),
            message: msg.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Map a kube-rs error to either `ClusterUnavailable` or `Kube`.
    ///
    /// API status responses mean the server was reached and answered, so they
    /// stay `Kube`. Everything else (connect, TLS, timeouts, service errors)
    /// means the control plane could not be talked to.
    pub fn from_kube(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(_) => Self::Kube { source: err },
            other => Self::cluster_unavailable(other.to_string()),
        }
    }

    /// Check if this error is a 404 from the API server or a missing node
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Kube {
                source: kube::Error::Api(ae),
            } => ae.code == 404,
            Error::NodeNotFound { .. } => true,
            _ => false,
        }
    }

    /// Check if this error is retryable by an outer caller
    ///
    /// The core never retries on its own; this is a hint for whoever drives it.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => !matches!(
                source,
                kube::Error::Api(ae) if (400..500).contains(&ae.code)
            ),
            Error::ClusterUnavailable { .. } => true,
            Error::NodeNotFound { .. } => false,
            Error::MetricsUnavailable { .. } => true,
            Error::EvictionFailed { .. } => true,
            Error::StoreInconsistency { .. } => true,
            Error::Config { .. } => false,
            Error::Serialization { .. } => false,
            Error::Internal { .. } => true,
        }
    }

    /// Get the node name if this error concerns a specific node
    pub fn node(&self) -> Option<&str> {
        match self {
            Error::NodeNotFound { node }
            | Error::MetricsUnavailable { node, .. }
            | Error::StoreInconsistency { node, .. } => Some(node),
            _ => None,
        }
    }

    /// Whether this error means the whole control plane connection is gone
    pub fn is_cluster_unavailable(&self) -> bool {
        matches!(self, Error::ClusterUnavailable { .. })
    }
}
