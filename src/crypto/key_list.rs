//! Composite keys and signature maps
//!
//! A `Key` is either a single public key or a list of keys with an optional
//! threshold, nested to any depth. Whether a set of signatures satisfies a key
//! is a pure function of the key and the set, and adding signatures can never
//! turn a satisfied key into an unsatisfied one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::key::PublicKey;
use crate::error::{Error, Result};

/// Signatures over one body, keyed by signer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureMap(BTreeMap<PublicKey, Vec<u8>>);

impl SignatureMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a signature. Returns `false` when the key had already signed;
    /// the first signature is kept.
    pub fn insert(&mut self, public_key: PublicKey, signature: Vec<u8>) -> bool {
        if self.0.contains_key(&public_key) {
            return false;
        }
        self.0.insert(public_key, signature);
        true
    }

    pub fn contains(&self, public_key: &PublicKey) -> bool {
        self.0.contains_key(public_key)
    }

    pub fn get(&self, public_key: &PublicKey) -> Option<&[u8]> {
        self.0.get(public_key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn public_keys(&self) -> impl Iterator<Item = &PublicKey> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PublicKey, &[u8])> {
        self.0.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Union with `other`; existing entries win.
    pub fn merge(&mut self, other: &SignatureMap) {
        for (key, signature) in &other.0 {
            self.0
                .entry(key.clone())
                .or_insert_with(|| signature.clone());
        }
    }

    /// Verify every signature against `message`.
    pub fn verify_all(&self, message: &[u8]) -> Result<()> {
        for (key, signature) in &self.0 {
            key.verify(message, signature)?;
        }
        Ok(())
    }
}

/// A list of keys, satisfied when at least `threshold` children are.
///
/// A threshold is always between 1 and the number of keys; decoding
/// enforces the same bound as `KeyList::threshold`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawKeyList")]
pub struct KeyList {
    keys: Vec<Key>,
    /// `None` requires every child.
    threshold: Option<u32>,
}

#[derive(Deserialize)]
struct RawKeyList {
    keys: Vec<Key>,
    threshold: Option<u32>,
}

impl TryFrom<RawKeyList> for KeyList {
    type Error = Error;

    fn try_from(raw: RawKeyList) -> Result<Self> {
        match raw.threshold {
            Some(threshold) => Self::threshold(raw.keys, threshold),
            None => Ok(Self::all(raw.keys)),
        }
    }
}

impl KeyList {
    pub fn all(keys: Vec<Key>) -> Self {
        Self {
            keys,
            threshold: None,
        }
    }

    pub fn threshold(keys: Vec<Key>, threshold: u32) -> Result<Self> {
        if threshold == 0 || threshold as usize > keys.len() {
            return Err(Error::KeyParse(format!(
                "threshold {threshold} out of range for {} keys",
                keys.len()
            )));
        }
        Ok(Self {
            keys,
            threshold: Some(threshold),
        })
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn get_threshold(&self) -> Option<u32> {
        self.threshold
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn required(&self) -> usize {
        self.threshold
            .map(|t| t as usize)
            .unwrap_or(self.keys.len())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    Single(PublicKey),
    List(KeyList),
}

impl Key {
    pub fn is_satisfied_by(&self, signatures: &SignatureMap) -> bool {
        match self {
            Key::Single(key) => signatures.contains(key),
            Key::List(list) => {
                if list.keys.is_empty() {
                    return false;
                }
                let required = list.required();
                let mut satisfied = 0;
                for child in &list.keys {
                    if child.is_satisfied_by(signatures) {
                        satisfied += 1;
                        if satisfied >= required {
                            return true;
                        }
                    }
                }
                false
            }
        }
    }

    /// Every distinct public key anywhere in the structure.
    pub fn public_keys(&self) -> Vec<&PublicKey> {
        let mut out = Vec::new();
        self.collect_keys(&mut out);
        out
    }

    fn collect_keys<'a>(&'a self, out: &mut Vec<&'a PublicKey>) {
        match self {
            Key::Single(key) => {
                if !out.contains(&key) {
                    out.push(key);
                }
            }
            Key::List(list) => list.keys.iter().for_each(|k| k.collect_keys(out)),
        }
    }
}

impl From<PublicKey> for Key {
    fn from(key: PublicKey) -> Self {
        Key::Single(key)
    }
}

impl From<KeyList> for Key {
    fn from(list: KeyList) -> Self {
        Key::List(list)
    }
}
