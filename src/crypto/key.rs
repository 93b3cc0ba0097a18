//! ED25519 and ECDSA-secp256k1 key pairs
//!
//! ECDSA signatures are taken over the SHA-256 digest of the message and
//! serialized in 64-byte compact form. ED25519 signs the message directly.

use ed25519_dalek::{Signer as _, Verifier as _};
use secp256k1::{Message, Secp256k1};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    Ed25519,
    EcdsaSecp256k1,
}

impl KeyAlgorithm {
    fn prefix(self) -> &'static str {
        match self {
            Self::Ed25519 => "ed25519",
            Self::EcdsaSecp256k1 => "ecdsa",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "ed25519" => Some(Self::Ed25519),
            "ecdsa" | "secp256k1" => Some(Self::EcdsaSecp256k1),
            _ => None,
        }
    }
}

/// Public half of a key pair: 32 raw bytes (ED25519) or 33 compressed bytes (ECDSA).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PublicKey {
    algorithm: KeyAlgorithm,
    bytes: Vec<u8>,
}

impl PublicKey {
    pub fn from_bytes(algorithm: KeyAlgorithm, bytes: &[u8]) -> Result<Self> {
        match algorithm {
            KeyAlgorithm::Ed25519 => {
                let raw: [u8; 32] = bytes.try_into().map_err(|_| {
                    Error::KeyParse(format!("ed25519 public key must be 32 bytes, got {}", bytes.len()))
                })?;
                ed25519_dalek::VerifyingKey::from_bytes(&raw)
                    .map_err(|e| Error::KeyParse(e.to_string()))?;
            }
            KeyAlgorithm::EcdsaSecp256k1 => {
                secp256k1::PublicKey::from_slice(bytes).map_err(|e| Error::KeyParse(e.to_string()))?;
            }
        }
        Ok(Self {
            algorithm,
            bytes: bytes.to_vec(),
        })
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Check `signature` over `message`.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        let bad = |e: String| Error::Signature(format!("verification failed for {self}: {e}"));

        match self.algorithm {
            KeyAlgorithm::Ed25519 => {
                let raw: [u8; 32] = self.bytes.as_slice().try_into().map_err(|_| bad("key length".into()))?;
                let key = ed25519_dalek::VerifyingKey::from_bytes(&raw).map_err(|e| bad(e.to_string()))?;
                let signature =
                    ed25519_dalek::Signature::from_slice(signature).map_err(|e| bad(e.to_string()))?;
                key.verify(message, &signature).map_err(|e| bad(e.to_string()))
            }
            KeyAlgorithm::EcdsaSecp256k1 => {
                let key = secp256k1::PublicKey::from_slice(&self.bytes).map_err(|e| bad(e.to_string()))?;
                let signature = secp256k1::ecdsa::Signature::from_compact(signature)
                    .map_err(|e| bad(e.to_string()))?;
                let digest = ecdsa_digest(message)?;
                Secp256k1::verification_only()
                    .verify_ecdsa(&digest, &signature, &key)
                    .map_err(|e| bad(e.to_string()))
            }
        }
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm.prefix(), hex::encode(&self.bytes))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({self})")
    }
}

impl FromStr for PublicKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (algorithm, hex_part) = split_prefixed(s)?;
        let bytes = hex::decode(hex_part).map_err(|e| Error::KeyParse(e.to_string()))?;
        Self::from_bytes(algorithm, &bytes)
    }
}

#[derive(Clone)]
enum PrivateKeyInner {
    Ed25519(ed25519_dalek::SigningKey),
    Ecdsa(secp256k1::SecretKey),
}

/// Private key usable as a `Signer`.
#[derive(Clone)]
pub struct PrivateKey {
    inner: PrivateKeyInner,
}

impl PrivateKey {
    pub fn generate_ed25519() -> Self {
        let seed: [u8; 32] = rand::random();
        Self {
            inner: PrivateKeyInner::Ed25519(ed25519_dalek::SigningKey::from_bytes(&seed)),
        }
    }

    pub fn generate_ecdsa() -> Self {
        let (secret, _) = Secp256k1::new().generate_keypair(&mut rand::thread_rng());
        Self {
            inner: PrivateKeyInner::Ecdsa(secret),
        }
    }

    pub fn from_bytes(algorithm: KeyAlgorithm, bytes: &[u8]) -> Result<Self> {
        let raw: [u8; 32] = bytes.try_into().map_err(|_| {
            Error::KeyParse(format!("private key must be 32 bytes, got {}", bytes.len()))
        })?;
        if raw.iter().all(|&b| b == 0) {
            return Err(Error::KeyParse("all-zero private key rejected".to_string()));
        }

        let inner = match algorithm {
            KeyAlgorithm::Ed25519 => PrivateKeyInner::Ed25519(ed25519_dalek::SigningKey::from_bytes(&raw)),
            KeyAlgorithm::EcdsaSecp256k1 => PrivateKeyInner::Ecdsa(
                secp256k1::SecretKey::from_slice(&raw).map_err(|e| Error::KeyParse(e.to_string()))?,
            ),
        };
        Ok(Self { inner })
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        match self.inner {
            PrivateKeyInner::Ed25519(_) => KeyAlgorithm::Ed25519,
            PrivateKeyInner::Ecdsa(_) => KeyAlgorithm::EcdsaSecp256k1,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        let bytes = match &self.inner {
            PrivateKeyInner::Ed25519(key) => key.verifying_key().to_bytes().to_vec(),
            PrivateKeyInner::Ecdsa(secret) => secret.public_key(&Secp256k1::signing_only()).serialize().to_vec(),
        };
        PublicKey {
            algorithm: self.algorithm(),
            bytes,
        }
    }

    /// Sign `message`, returning the raw signature bytes.
    pub fn sign_bytes(&self, message: &[u8]) -> Result<Vec<u8>> {
        match &self.inner {
            PrivateKeyInner::Ed25519(key) => Ok(key.sign(message).to_bytes().to_vec()),
            PrivateKeyInner::Ecdsa(secret) => {
                let digest = ecdsa_digest(message)?;
                let signature = Secp256k1::signing_only().sign_ecdsa(&digest, secret);
                Ok(signature.serialize_compact().to_vec())
            }
        }
    }

    /// `<algorithm>:<hex>` form accepted by `FromStr`. Exposes secret material.
    pub fn to_string_raw(&self) -> String {
        let bytes = match &self.inner {
            PrivateKeyInner::Ed25519(key) => key.to_bytes().to_vec(),
            PrivateKeyInner::Ecdsa(secret) => secret.secret_bytes().to_vec(),
        };
        format!("{}:{}", self.algorithm().prefix(), hex::encode(bytes))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

impl FromStr for PrivateKey {
    type Err = Error;

    /// Accepts `ed25519:<hex>`, `ecdsa:<hex>`, or bare hex (ED25519).
    fn from_str(s: &str) -> Result<Self> {
        let (algorithm, hex_part) = split_prefixed(s)?;
        let bytes = hex::decode(hex_part).map_err(|e| Error::KeyParse(e.to_string()))?;
        Self::from_bytes(algorithm, &bytes)
    }
}

fn split_prefixed(s: &str) -> Result<(KeyAlgorithm, &str)> {
    let s = s.trim();
    match s.split_once(':') {
        Some((prefix, rest)) => {
            let algorithm = KeyAlgorithm::from_prefix(prefix)
                .ok_or_else(|| Error::KeyParse(format!("unknown key algorithm `{prefix}`")))?;
            Ok((algorithm, rest.strip_prefix("0x").unwrap_or(rest)))
        }
        None => Ok((KeyAlgorithm::Ed25519, s.strip_prefix("0x").unwrap_or(s))),
    }
}

fn ecdsa_digest(message: &[u8]) -> Result<Message> {
    let hash = Sha256::digest(message);
    Message::from_digest_slice(&hash).map_err(|e| Error::Signature(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ed25519_sign_verify() {
        let key = PrivateKey::generate_ed25519();
        let signature = key.sign_bytes(b"body").unwrap();
        assert_eq!(signature.len(), 64);
        key.public_key().verify(b"body", &signature).unwrap();
        assert!(key.public_key().verify(b"other", &signature).is_err());
    }

    #[test]
    fn test_ecdsa_sign_verify() {
        let key = PrivateKey::generate_ecdsa();
        assert_eq!(key.public_key().as_bytes().len(), 33);
        let signature = key.sign_bytes(b"body").unwrap();
        key.public_key().verify(b"body", &signature).unwrap();
        assert!(PrivateKey::generate_ecdsa().public_key().verify(b"body", &signature).is_err());
    }

    #[test]
    fn test_private_key_string_round_trip() {
        for key in [PrivateKey::generate_ed25519(), PrivateKey::generate_ecdsa()] {
            let parsed: PrivateKey = key.to_string_raw().parse().unwrap();
            assert_eq!(parsed.public_key(), key.public_key());
        }
    }

    #[test]
    fn test_public_key_string_round_trip() {
        let public = PrivateKey::generate_ecdsa().public_key();
        assert_eq!(public.to_string().parse::<PublicKey>().unwrap(), public);
    }

    #[test]
    fn test_debug_does_not_leak_secret() {
        let key = PrivateKey::generate_ed25519();
        let raw = key.to_string_raw();
        let secret_hex = raw.split_once(':').unwrap().1;
        assert!(!format!("{key:?}").contains(secret_hex));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!("rsa:00".parse::<PrivateKey>().is_err());
        assert!("ed25519:zz".parse::<PrivateKey>().is_err());
        assert!(PrivateKey::from_bytes(KeyAlgorithm::Ed25519, &[0u8; 32]).is_err());
    }
}
