//! Well-known networks

use crate::entity::{AccountId, LedgerId};

/// Node addresses, mirror addresses and ledger id of one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub nodes: Vec<(AccountId, String)>,
    pub mirror_network: Vec<String>,
    pub ledger_id: Option<LedgerId>,
}

impl Network {
    pub fn mainnet() -> Self {
        let addresses = ["35.237.200.180", "35.186.191.247", "35.192.2.25", "35.199.161.108"];
        Self {
            nodes: numbered_nodes(addresses.iter().map(|a| format!("{a}:50211"))),
            mirror_network: vec!["mainnet-public.mirrornode.hedera.com:443".to_string()],
            ledger_id: Some(LedgerId::mainnet()),
        }
    }

    pub fn testnet() -> Self {
        Self::hosted("testnet", LedgerId::testnet())
    }

    pub fn previewnet() -> Self {
        Self::hosted("previewnet", LedgerId::previewnet())
    }

    /// Single-node local development network.
    pub fn local() -> Self {
        Self {
            nodes: vec![(AccountId::from_num(3), "127.0.0.1:50211".to_string())],
            mirror_network: vec!["127.0.0.1:5600".to_string()],
            ledger_id: Some(LedgerId::local()),
        }
    }

    pub fn for_name(name: &str) -> Option<Self> {
        match name {
            "mainnet" => Some(Self::mainnet()),
            "testnet" => Some(Self::testnet()),
            "previewnet" => Some(Self::previewnet()),
            "local" | "local-node" => Some(Self::local()),
            _ => None,
        }
    }

    fn hosted(name: &str, ledger_id: LedgerId) -> Self {
        Self {
            nodes: numbered_nodes((0..4).map(|i| format!("{i}.{name}.hedera.com:50211"))),
            mirror_network: vec![format!("{name}.mirrornode.hedera.com:443")],
            ledger_id: Some(ledger_id),
        }
    }
}

/// Assign node accounts 0.0.3, 0.0.4, ... in order.
fn numbered_nodes(addresses: impl Iterator<Item = String>) -> Vec<(AccountId, String)> {
    addresses
        .enumerate()
        .map(|(i, address)| (AccountId::from_num(3 + i as u64), address))
        .collect()
}
