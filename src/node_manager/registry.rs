//! Registry of known nodes, shared by every execution on a client

use dashmap::DashMap;
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::node::{Node, NodeBackoffConfig, NodeHealth};
use crate::entity::AccountId;
use crate::error::{Error, Result};
use crate::metrics::metrics;

/// Emitted when a node moves between healthy, backing off and dead.
#[derive(Debug, Clone)]
pub struct HealthChangeEvent {
    pub node_account_id: AccountId,
    pub address: String,
    pub old_health: NodeHealth,
    pub new_health: NodeHealth,
    pub timestamp: Instant,
}

#[derive(Debug)]
pub struct NodeRegistry {
    nodes: DashMap<AccountId, Arc<Node>>,
    // Insertion order, so iteration is stable across calls.
    order: RwLock<Vec<AccountId>>,
    config: NodeBackoffConfig,
    health_event_tx: broadcast::Sender<HealthChangeEvent>,
}

impl NodeRegistry {
    pub fn new(
        network: impl IntoIterator<Item = (AccountId, String)>,
        config: NodeBackoffConfig,
    ) -> Self {
        let (health_event_tx, _) = broadcast::channel(100);
        let registry = Self {
            nodes: DashMap::new(),
            order: RwLock::new(Vec::new()),
            config,
            health_event_tx,
        };
        registry.set_network(network);
        registry
    }

    /// Replace the node set. Nodes present before and after keep their state.
    pub fn set_network(&self, network: impl IntoIterator<Item = (AccountId, String)>) {
        let mut order = self.order.write();
        let mut next = Vec::new();

        for (account_id, address) in network {
            let keep = self
                .nodes
                .get(&account_id)
                .map(|n| n.address() == address)
                .unwrap_or(false);
            if !keep {
                self.nodes.insert(
                    account_id.clone(),
                    Arc::new(Node::new(account_id.clone(), address, self.config)),
                );
            }
            if !next.contains(&account_id) {
                next.push(account_id);
            }
        }

        self.nodes.retain(|id, _| next.contains(id));
        *order = next;
        info!(nodes = order.len(), "Node registry updated");
    }

    pub fn subscribe_health_events(&self) -> broadcast::Receiver<HealthChangeEvent> {
        self.health_event_tx.subscribe()
    }

    pub fn len(&self) -> usize {
        self.order.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, account_id: &AccountId) -> Option<Arc<Node>> {
        self.nodes.get(account_id).map(|n| Arc::clone(n.value()))
    }

    /// Look up every id, failing on the first one the registry doesn't know.
    pub fn resolve(&self, account_ids: &[AccountId]) -> Result<Vec<Arc<Node>>> {
        account_ids
            .iter()
            .map(|id| {
                self.get(id)
                    .ok_or_else(|| Error::IllegalState(format!("node {id} is not in the client network")))
            })
            .collect()
    }

    pub fn node_account_ids(&self) -> Vec<AccountId> {
        self.order.read().clone()
    }

    /// Random subset of at most `max` healthy nodes.
    ///
    /// Falls back to every live node when none is currently healthy, so a
    /// transaction can still be frozen while the whole network is backing off.
    pub fn select_nodes(&self, max: usize) -> Vec<AccountId> {
        let order = self.order.read();
        let nodes: Vec<Arc<Node>> = order.iter().filter_map(|id| self.get(id)).collect();

        let mut candidates: Vec<AccountId> = nodes
            .iter()
            .filter(|n| n.is_healthy())
            .map(|n| n.account_id().clone())
            .collect();
        if candidates.is_empty() {
            candidates = nodes
                .iter()
                .filter(|n| !n.is_dead())
                .map(|n| n.account_id().clone())
                .collect();
        }

        candidates.shuffle(&mut rand::thread_rng());
        candidates.truncate(max.max(1));
        candidates
    }

    pub(crate) fn record_success(&self, node: &Node) {
        let old = node.health();
        node.decrease_backoff();
        let new = node.health();
        if !old.same_kind(&new) {
            self.emit_health_event(node, old, new);
        }
    }

    pub(crate) fn record_failure(&self, node: &Node) {
        let old = node.health();
        let new = node.increase_backoff();
        metrics().node_backoffs.with_label_values(&[&node.account_id().to_string()]).inc();

        match new {
            NodeHealth::Dead => warn!(
                node = %node.account_id(),
                failures = node.consecutive_failures(),
                "Node marked dead"
            ),
            _ => debug!(
                node = %node.account_id(),
                backoff_ms = node.remaining_backoff().as_millis() as u64,
                "Node backing off"
            ),
        }

        if !old.same_kind(&new) {
            self.emit_health_event(node, old, new);
        }
    }

    fn emit_health_event(&self, node: &Node, old_health: NodeHealth, new_health: NodeHealth) {
        let event = HealthChangeEvent {
            node_account_id: node.account_id().clone(),
            address: node.address().to_string(),
            old_health,
            new_health,
            timestamp: Instant::now(),
        };
        let _ = self.health_event_tx.send(event);

        info!(
            node = %node.account_id(),
            old = old_health.label(),
            new = new_health.label(),
            "Node health changed"
        );
    }

    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats::default();
        for id in self.order.read().iter() {
            let Some(node) = self.get(id) else { continue };
            let health = node.health();
            match health {
                NodeHealth::Healthy => stats.healthy_nodes += 1,
                NodeHealth::BackingOff { .. } => stats.backing_off_nodes += 1,
                NodeHealth::Dead => stats.dead_nodes += 1,
            }
            let (total, successful) = node.requests();
            stats.node_stats.push(NodeStats {
                account_id: id.clone(),
                address: node.address().to_string(),
                health,
                total_requests: total,
                successful_requests: successful,
                current_backoff: node.current_backoff(),
            });
        }
        stats.total_nodes = stats.node_stats.len();
        stats
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegistryStats {
    pub total_nodes: usize,
    pub healthy_nodes: usize,
    pub backing_off_nodes: usize,
    pub dead_nodes: usize,
    pub node_stats: Vec<NodeStats>,
}

#[derive(Debug, Clone)]
pub struct NodeStats {
    pub account_id: AccountId,
    pub address: String,
    pub health: NodeHealth,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub current_backoff: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(n: u64) -> NodeRegistry {
        NodeRegistry::new(
            (3..3 + n).map(|i| (AccountId::from_num(i), format!("node{i}:50211"))),
            NodeBackoffConfig::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_nodes_skips_unhealthy() {
        let registry = registry(4);
        let sick = registry.get(&AccountId::from_num(4)).unwrap();
        registry.record_failure(&sick);

        for _ in 0..20 {
            let selected = registry.select_nodes(3);
            assert_eq!(selected.len(), 3);
            assert!(!selected.contains(&AccountId::from_num(4)));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_nodes_falls_back_when_all_unhealthy() {
        let registry = registry(2);
        for id in registry.node_account_ids() {
            registry.record_failure(&registry.get(&id).unwrap());
        }
        assert_eq!(registry.select_nodes(5).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_events() {
        let registry = registry(1);
        let mut rx = registry.subscribe_health_events();
        let node = registry.get(&AccountId::from_num(3)).unwrap();

        registry.record_failure(&node);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.node_account_id, AccountId::from_num(3));
        assert_eq!(event.old_health, NodeHealth::Healthy);
        assert!(matches!(event.new_health, NodeHealth::BackingOff { .. }));

        let stats = registry.stats();
        assert_eq!(stats.total_nodes, 1);
        assert_eq!(stats.backing_off_nodes, 1);
    }

    #[test]
    fn test_resolve_unknown_node() {
        let registry = registry(1);
        let err = registry.resolve(&[AccountId::from_num(99)]).unwrap_err();
        assert!(matches!(err, Error::IllegalState(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_network_keeps_existing_state() {
        let registry = registry(2);
        let node = registry.get(&AccountId::from_num(3)).unwrap();
        registry.record_failure(&node);

        registry.set_network(vec![(AccountId::from_num(3), "node3:50211".to_string())]);
        assert_eq!(registry.len(), 1);
        assert!(!registry.get(&AccountId::from_num(3)).unwrap().is_healthy());
    }
}
