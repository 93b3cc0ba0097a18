//! A single consensus node and its backoff state

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

use crate::entity::AccountId;

/// Node backoff bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeBackoffConfig {
    #[serde(default = "default_min_node_backoff", with = "crate::config::duration_ms")]
    pub min_backoff: Duration,
    #[serde(default = "default_max_node_backoff", with = "crate::config::duration_ms")]
    pub max_backoff: Duration,
    /// Consecutive failures after which the node is marked dead. `None` never.
    #[serde(default)]
    pub max_node_attempts: Option<u32>,
}

fn default_min_node_backoff() -> Duration {
    Duration::from_secs(8)
}

fn default_max_node_backoff() -> Duration {
    Duration::from_secs(60 * 60)
}

impl Default for NodeBackoffConfig {
    fn default() -> Self {
        Self {
            min_backoff: default_min_node_backoff(),
            max_backoff: default_max_node_backoff(),
            max_node_attempts: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeHealth {
    Healthy,
    BackingOff { until: Instant },
    Dead,
}

impl NodeHealth {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::BackingOff { .. } => "backing_off",
            Self::Dead => "dead",
        }
    }

    pub fn same_kind(&self, other: &NodeHealth) -> bool {
        self.label() == other.label()
    }
}

#[derive(Debug)]
struct BackoffState {
    current_backoff: Duration,
    readmit_at: Option<Instant>,
    consecutive_failures: u32,
    dead: bool,
    total_requests: u64,
    successful_requests: u64,
}

#[derive(Debug)]
pub struct Node {
    account_id: AccountId,
    address: String,
    config: NodeBackoffConfig,
    state: Mutex<BackoffState>,
}

impl Node {
    pub fn new(account_id: AccountId, address: impl Into<String>, config: NodeBackoffConfig) -> Self {
        Self {
            account_id,
            address: address.into(),
            config,
            state: Mutex::new(BackoffState {
                current_backoff: config.min_backoff,
                readmit_at: None,
                consecutive_failures: 0,
                dead: false,
                total_requests: 0,
                successful_requests: 0,
            }),
        }
    }

    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn health(&self) -> NodeHealth {
        let state = self.state.lock();
        if state.dead {
            return NodeHealth::Dead;
        }
        match state.readmit_at {
            Some(until) if until > Instant::now() => NodeHealth::BackingOff { until },
            _ => NodeHealth::Healthy,
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self.health(), NodeHealth::Healthy)
    }

    pub fn is_dead(&self) -> bool {
        self.state.lock().dead
    }

    /// Time until the node may be used again; zero when healthy.
    pub fn remaining_backoff(&self) -> Duration {
        match self.health() {
            NodeHealth::BackingOff { until } => until.saturating_duration_since(Instant::now()),
            _ => Duration::ZERO,
        }
    }

    /// Current backoff window length.
    pub fn current_backoff(&self) -> Duration {
        self.state.lock().current_backoff
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.state.lock().consecutive_failures
    }

    /// Record a bad response: readmit after the current window, then double it.
    pub(crate) fn increase_backoff(&self) -> NodeHealth {
        let mut state = self.state.lock();
        state.total_requests += 1;
        state.consecutive_failures += 1;
        state.readmit_at = Some(Instant::now() + state.current_backoff);
        state.current_backoff = (state.current_backoff * 2).min(self.config.max_backoff);

        if let Some(max) = self.config.max_node_attempts {
            if state.consecutive_failures >= max {
                state.dead = true;
                return NodeHealth::Dead;
            }
        }
        NodeHealth::BackingOff {
            until: state.readmit_at.unwrap_or_else(Instant::now),
        }
    }

    /// Record a good response: halve the window.
    pub(crate) fn decrease_backoff(&self) {
        let mut state = self.state.lock();
        state.total_requests += 1;
        state.successful_requests += 1;
        state.consecutive_failures = 0;
        state.current_backoff = (state.current_backoff / 2).max(self.config.min_backoff);
    }

    pub(crate) fn requests(&self) -> (u64, u64) {
        let state = self.state.lock();
        (state.total_requests, state.successful_requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(config: NodeBackoffConfig) -> Node {
        Node::new(AccountId::from_num(3), "127.0.0.1:50211", config)
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_doubles_and_expires() {
        let node = node(NodeBackoffConfig::default());
        assert!(node.is_healthy());

        node.increase_backoff();
        assert!(!node.is_healthy());
        assert_eq!(node.remaining_backoff(), Duration::from_secs(8));
        assert_eq!(node.current_backoff(), Duration::from_secs(16));

        tokio::time::advance(Duration::from_secs(8)).await;
        assert!(node.is_healthy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_is_capped_and_halves_on_success() {
        let node = node(NodeBackoffConfig {
            min_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(4),
            max_node_attempts: None,
        });
        for _ in 0..5 {
            node.increase_backoff();
        }
        assert_eq!(node.current_backoff(), Duration::from_secs(4));

        node.decrease_backoff();
        assert_eq!(node.current_backoff(), Duration::from_secs(2));
        node.decrease_backoff();
        node.decrease_backoff();
        assert_eq!(node.current_backoff(), Duration::from_secs(1));
        assert_eq!(node.consecutive_failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_marked_dead_after_max_attempts() {
        let node = node(NodeBackoffConfig {
            max_node_attempts: Some(2),
            ..NodeBackoffConfig::default()
        });
        assert!(matches!(node.increase_backoff(), NodeHealth::BackingOff { .. }));
        assert_eq!(node.increase_backoff(), NodeHealth::Dead);

        tokio::time::advance(Duration::from_secs(3600)).await;
        assert!(node.is_dead());
        assert!(!node.is_healthy());
    }
}
