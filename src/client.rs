//! Client: network, operator and settings shared by every request
//!
//! A `Client` is cheap to clone; clones share the node registry, operator
//! and settings. Settings sit behind an `ArcSwap`, so `update_settings`
//! takes effect for requests started afterwards without blocking requests
//! already in flight.

use arc_swap::{ArcSwap, ArcSwapOption};
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::config::{ClientConfig, ClientSettings, ConfigError};
use crate::crypto::{PrivateKey, PublicKey, Signer};
use crate::entity::{AccountId, LedgerId};
use crate::error::{Error, Result};
use crate::network::Network;
use crate::node_manager::{NodeBackoffConfig, NodeRegistry, Transport};

/// Account that pays for and signs transactions by default.
#[derive(Clone)]
pub struct Operator {
    pub account_id: AccountId,
    pub signer: Arc<dyn Signer>,
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operator")
            .field("account_id", &self.account_id)
            .field("public_key", &self.signer.public_key())
            .finish()
    }
}

struct ClientInner {
    registry: NodeRegistry,
    transport: Arc<dyn Transport>,
    mirror_network: Vec<String>,
    ledger_id: Option<LedgerId>,
    operator: ArcSwapOption<Operator>,
    settings: ArcSwap<ClientSettings>,
}

#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("nodes", &self.inner.registry.len())
            .field("ledger_id", &self.inner.ledger_id)
            .field("operator", &self.operator_account_id())
            .field("transport", &self.inner.transport)
            .finish()
    }
}

impl Client {
    pub fn builder(transport: Arc<dyn Transport>) -> ClientBuilder {
        ClientBuilder::new(transport)
    }

    pub fn for_network(network: Network, transport: Arc<dyn Transport>) -> Result<Self> {
        ClientBuilder::new(transport).network(network).build()
    }

    /// `mainnet`, `testnet`, `previewnet` or `local`.
    pub fn for_name(name: &str, transport: Arc<dyn Transport>) -> Result<Self> {
        let network = Network::for_name(name)
            .ok_or_else(|| Error::Configuration(format!("unknown network `{name}`")))?;
        Self::for_network(network, transport)
    }

    /// Build a client from loaded configuration.
    pub fn from_config(config: &ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;

        let mut builder = ClientBuilder::new(transport)
            .settings(config.settings.clone())
            .node_backoff(config.node_backoff);

        if let Some(network) = config.network.as_deref().and_then(Network::for_name) {
            builder = builder.network(network);
        }
        if !config.nodes.is_empty() {
            let nodes = config
                .nodes
                .iter()
                .map(|node| Ok((node.account_id.parse::<AccountId>()?, node.address.clone())))
                .collect::<Result<Vec<_>>>()?;
            builder = builder.nodes(nodes);
        }
        if !config.mirror_network.is_empty() {
            builder = builder.mirror_network(config.mirror_network.clone());
        }
        if let Some(ledger_id) = config.ledger_id.as_deref() {
            builder = builder.ledger_id(parse_ledger_id(ledger_id)?);
        }
        if let Some(operator) = &config.operator {
            let account_id: AccountId = operator.account_id.parse()?;
            let key: PrivateKey = operator.private_key.parse()?;
            builder = builder.operator(account_id, Arc::new(key));
        }

        builder.build()
    }

    /// Replace the operator for requests started from now on.
    pub fn set_operator(&self, account_id: AccountId, signer: Arc<dyn Signer>) {
        info!(operator = %account_id, "Operator set");
        self.inner
            .operator
            .store(Some(Arc::new(Operator { account_id, signer })));
    }

    pub fn operator(&self) -> Option<Arc<Operator>> {
        self.inner.operator.load_full()
    }

    pub fn operator_account_id(&self) -> Option<AccountId> {
        self.operator().map(|operator| operator.account_id.clone())
    }

    pub fn operator_public_key(&self) -> Option<PublicKey> {
        self.operator().map(|operator| operator.signer.public_key())
    }

    /// Snapshot of the current settings.
    pub fn settings(&self) -> Arc<ClientSettings> {
        self.inner.settings.load_full()
    }

    /// Apply `f` to a copy of the settings and swap it in if it validates.
    pub fn update_settings(&self, f: impl FnOnce(&mut ClientSettings)) -> Result<()> {
        let mut settings = ClientSettings::clone(&self.settings());
        f(&mut settings);
        settings.validate()?;
        self.inner.settings.store(Arc::new(settings));
        Ok(())
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.inner.registry
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    pub fn ledger_id(&self) -> Option<&LedgerId> {
        self.inner.ledger_id.as_ref()
    }

    pub fn mirror_network(&self) -> &[String] {
        &self.inner.mirror_network
    }
}

/// Network name or hex-encoded ledger id bytes.
fn parse_ledger_id(value: &str) -> Result<LedgerId> {
    if let Some(ledger_id) = LedgerId::from_network_name(value) {
        return Ok(ledger_id);
    }
    hex::decode(value.trim_start_matches("0x"))
        .map(LedgerId::from_bytes)
        .map_err(|e| Error::Configuration(format!("invalid ledger id `{value}`: {e}")))
}

pub struct ClientBuilder {
    transport: Arc<dyn Transport>,
    nodes: Vec<(AccountId, String)>,
    mirror_network: Vec<String>,
    ledger_id: Option<LedgerId>,
    operator: Option<Operator>,
    settings: ClientSettings,
    node_backoff: NodeBackoffConfig,
}

impl ClientBuilder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            nodes: Vec::new(),
            mirror_network: Vec::new(),
            ledger_id: None,
            operator: None,
            settings: ClientSettings::default(),
            node_backoff: NodeBackoffConfig::default(),
        }
    }

    /// Use a preset's nodes, mirror network and ledger id.
    pub fn network(mut self, network: Network) -> Self {
        self.nodes = network.nodes;
        self.mirror_network = network.mirror_network;
        self.ledger_id = network.ledger_id;
        self
    }

    pub fn nodes(mut self, nodes: impl IntoIterator<Item = (AccountId, String)>) -> Self {
        self.nodes = nodes.into_iter().collect();
        self
    }

    pub fn mirror_network(mut self, addresses: impl IntoIterator<Item = String>) -> Self {
        self.mirror_network = addresses.into_iter().collect();
        self
    }

    pub fn ledger_id(mut self, ledger_id: LedgerId) -> Self {
        self.ledger_id = Some(ledger_id);
        self
    }

    pub fn operator(mut self, account_id: AccountId, signer: Arc<dyn Signer>) -> Self {
        self.operator = Some(Operator { account_id, signer });
        self
    }

    pub fn settings(mut self, settings: ClientSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn node_backoff(mut self, config: NodeBackoffConfig) -> Self {
        self.node_backoff = config;
        self
    }

    pub fn build(self) -> Result<Client> {
        self.settings.validate()?;
        if self.nodes.is_empty() {
            return Err(ConfigError::Validation("client needs at least one node".to_string()).into());
        }

        info!(
            nodes = self.nodes.len(),
            mirrors = self.mirror_network.len(),
            operator = ?self.operator.as_ref().map(|o| o.account_id.to_string()),
            "Client created"
        );

        Ok(Client {
            inner: Arc::new(ClientInner {
                registry: NodeRegistry::new(self.nodes, self.node_backoff),
                transport: self.transport,
                mirror_network: self.mirror_network,
                ledger_id: self.ledger_id,
                operator: ArcSwapOption::new(self.operator.map(Arc::new)),
                settings: ArcSwap::from_pointee(self.settings),
            }),
        })
    }
}
