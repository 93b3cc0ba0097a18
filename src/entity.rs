//! Entity identifiers (`shard.realm.num`) and network checksums
//!
//! Accounts, tokens, topics, contracts, files and schedules are all addressed
//! by the same three-part id. Accounts may instead be addressed by an alias
//! (a serialized public key) or a 20-byte EVM address.
//!
//! The optional 5-letter checksum binds an id to a ledger. It is carried
//! through parsing and display but only checked when a caller asks for it or
//! the client has automatic checksum validation switched on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Identifies a ledger (mainnet, testnet, ...) for checksum purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerId(Vec<u8>);

impl LedgerId {
    pub fn mainnet() -> Self {
        Self(vec![0])
    }

    pub fn testnet() -> Self {
        Self(vec![1])
    }

    pub fn previewnet() -> Self {
        Self(vec![2])
    }

    pub fn local() -> Self {
        Self(vec![3])
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Resolve a well-known network name.
    pub fn from_network_name(name: &str) -> Option<Self> {
        match name {
            "mainnet" => Some(Self::mainnet()),
            "testnet" => Some(Self::testnet()),
            "previewnet" => Some(Self::previewnet()),
            "local" | "local-node" => Some(Self::local()),
            _ => None,
        }
    }
}

/// 20-byte EVM address.
pub type EvmAddress = [u8; 20];

/// A `shard.realm.num` entity id with optional alias, EVM address and checksum.
///
/// Equality and hashing ignore the checksum: `0.0.5` and `0.0.5-abcde` name
/// the same entity.
#[derive(Clone, Serialize, Deserialize)]
pub struct EntityId {
    pub shard: u64,
    pub realm: u64,
    pub num: u64,
    pub alias: Option<Vec<u8>>,
    pub evm_address: Option<EvmAddress>,
    checksum: Option<String>,
}

pub type AccountId = EntityId;
pub type TokenId = EntityId;
pub type TopicId = EntityId;
pub type ContractId = EntityId;
pub type FileId = EntityId;
pub type ScheduleId = EntityId;

impl EntityId {
    pub const fn new(shard: u64, realm: u64, num: u64) -> Self {
        Self {
            shard,
            realm,
            num,
            alias: None,
            evm_address: None,
            checksum: None,
        }
    }

    /// `0.0.num`
    pub const fn from_num(num: u64) -> Self {
        Self::new(0, 0, num)
    }

    pub fn from_alias(shard: u64, realm: u64, alias: Vec<u8>) -> Self {
        Self {
            alias: Some(alias),
            ..Self::new(shard, realm, 0)
        }
    }

    pub fn from_evm_address(shard: u64, realm: u64, address: EvmAddress) -> Self {
        Self {
            evm_address: Some(address),
            ..Self::new(shard, realm, 0)
        }
    }

    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    /// Whether the id is addressed by its number (not an alias or EVM address).
    pub fn is_numeric(&self) -> bool {
        self.alias.is_none() && self.evm_address.is_none()
    }

    /// Check the carried checksum against `ledger_id`.
    ///
    /// Ids without a checksum, and alias/EVM ids, always pass.
    pub fn validate_checksum(&self, ledger_id: &LedgerId) -> Result<()> {
        let Some(present) = self.checksum.as_deref() else {
            return Ok(());
        };
        if !self.is_numeric() {
            return Ok(());
        }

        let expected = checksum(ledger_id, self.shard, self.realm, self.num);
        if present != expected {
            return Err(Error::BadEntityId {
                id: format!("{}.{}.{}", self.shard, self.realm, self.num),
                present: present.to_string(),
                expected,
            });
        }
        Ok(())
    }

    /// `s.r.n-checksum` for `ledger_id`.
    pub fn to_string_with_checksum(&self, ledger_id: &LedgerId) -> Result<String> {
        if !self.is_numeric() {
            return Err(Error::IllegalState(
                "checksums cannot be applied to alias or EVM address ids".to_string(),
            ));
        }
        Ok(format!(
            "{}.{}.{}-{}",
            self.shard,
            self.realm,
            self.num,
            checksum(ledger_id, self.shard, self.realm, self.num)
        ))
    }

    pub fn with_checksum_for(mut self, ledger_id: &LedgerId) -> Self {
        if self.is_numeric() {
            self.checksum = Some(checksum(ledger_id, self.shard, self.realm, self.num));
        }
        self
    }
}

impl PartialEq for EntityId {
    fn eq(&self, other: &Self) -> bool {
        self.shard == other.shard
            && self.realm == other.realm
            && self.num == other.num
            && self.alias == other.alias
            && self.evm_address == other.evm_address
    }
}

impl Eq for EntityId {}

impl Hash for EntityId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.shard.hash(state);
        self.realm.hash(state);
        self.num.hash(state);
        self.alias.hash(state);
        self.evm_address.hash(state);
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(address) = &self.evm_address {
            write!(f, "{}.{}.{}", self.shard, self.realm, hex::encode(address))
        } else if let Some(alias) = &self.alias {
            write!(f, "{}.{}.{}", self.shard, self.realm, hex::encode(alias))
        } else {
            write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
        }
    }
}

impl FromStr for EntityId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parse_err = || Error::EntityIdParse(format!("expected `shard.realm.num`, got `{s}`"));

        // Bare EVM address, with or without 0x prefix
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        if !s.contains('.') {
            return parse_evm_address(stripped)
                .map(|address| Self::from_evm_address(0, 0, address))
                .ok_or_else(parse_err);
        }

        let (id, checksum) = match s.split_once('-') {
            Some((id, checksum)) => (id, Some(checksum)),
            None => (s, None),
        };

        let mut parts = id.splitn(3, '.');
        let (Some(shard), Some(realm), Some(last)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(parse_err());
        };
        let shard = shard.parse::<u64>().map_err(|_| parse_err())?;
        let realm = realm.parse::<u64>().map_err(|_| parse_err())?;

        if let Ok(num) = last.parse::<u64>() {
            let mut id = Self::new(shard, realm, num);
            if let Some(checksum) = checksum {
                if checksum.len() != 5 || !checksum.bytes().all(|b| b.is_ascii_lowercase()) {
                    return Err(Error::EntityIdParse(format!("invalid checksum `{checksum}`")));
                }
                id.checksum = Some(checksum.to_string());
            }
            return Ok(id);
        }

        if checksum.is_some() {
            return Err(Error::EntityIdParse(
                "checksums are only valid on numeric ids".to_string(),
            ));
        }

        let last = last.strip_prefix("0x").unwrap_or(last);
        if let Some(address) = parse_evm_address(last) {
            return Ok(Self::from_evm_address(shard, realm, address));
        }

        let alias = hex::decode(last).map_err(|_| parse_err())?;
        if alias.is_empty() {
            return Err(parse_err());
        }
        Ok(Self::from_alias(shard, realm, alias))
    }
}

fn parse_evm_address(s: &str) -> Option<EvmAddress> {
    if s.len() != 40 {
        return None;
    }
    let bytes = hex::decode(s).ok()?;
    bytes.try_into().ok()
}

/// Ledger-bound checksum of `shard.realm.num`.
///
/// Base-26 rendering of a weighted digit sum mixed with a hash of the ledger
/// id, always five lowercase letters.
pub fn checksum(ledger_id: &LedgerId, shard: u64, realm: u64, num: u64) -> String {
    const P3: u64 = 26 * 26 * 26;
    const P5: u64 = 26 * 26 * 26 * 26 * 26;
    const M: u64 = 1_000_003;
    const W: u64 = 31;

    let address = format!("{shard}.{realm}.{num}");
    let digits: Vec<u64> = address
        .bytes()
        .map(|b| if b == b'.' { 10 } else { (b - b'0') as u64 })
        .collect();

    let mut s = 0u64;
    let mut s0 = 0u64;
    let mut s1 = 0u64;
    for (i, &d) in digits.iter().enumerate() {
        s = (W * s + d) % P3;
        if i % 2 == 0 {
            s0 = (s0 + d) % 11;
        } else {
            s1 = (s1 + d) % 11;
        }
    }

    let mut sh = 0u64;
    for &b in ledger_id.as_bytes().iter().chain([0u8; 6].iter()) {
        sh = (W * sh + b as u64) % P5;
    }

    let c = ((((digits.len() as u64 % 5) * 11 + s0) * 11 + s1) * P3 + s + sh) % P5;
    let mut cp = (c * M) % P5;

    let mut out = [b'a'; 5];
    for slot in out.iter_mut().rev() {
        *slot = b'a' + (cp % 26) as u8;
        cp /= 26;
    }
    out.iter().map(|&b| b as char).collect()
}
