//! Common types for nodewarden: errors, quantity parsing and Kubernetes helpers

#![deny(missing_docs)]

pub mod error;
pub mod kube_utils;
pub mod quantity;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Field manager recorded on every patch nodewarden sends to the API server
pub const DEFAULT_FIELD_MANAGER: &str = "nodewarden-controller";

/// Grace period applied to pod evictions when the caller does not choose one
pub const DEFAULT_GRACE_PERIOD_SECONDS: u32 = 30;
