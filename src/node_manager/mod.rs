//! Node registry with per-node health and backoff
//!
//! Nodes are addressed by their account id. Every node starts healthy; a
//! failed or busy response puts it into an exponential backoff window, and
//! good responses shrink the window again.

pub mod node;
pub mod registry;
pub mod transport;

pub use node::{Node, NodeBackoffConfig, NodeHealth};
pub use registry::{HealthChangeEvent, NodeRegistry, NodeStats, RegistryStats};
pub use transport::{Transport, TransportError};
