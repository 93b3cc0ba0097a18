//! Async signer abstraction
//!
//! Anything that can produce a signature for a public key: an in-memory
//! private key, a remote signing service, a hardware wallet.

use async_trait::async_trait;
use std::sync::Arc;

use super::key::{PrivateKey, PublicKey};
use crate::error::Result;

#[async_trait]
pub trait Signer: Send + Sync {
    fn public_key(&self) -> PublicKey;

    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>>;

    /// Sign several messages (one per chunk), in order.
    async fn sign_all(&self, messages: &[Vec<u8>]) -> Result<Vec<Vec<u8>>> {
        let mut signatures = Vec::with_capacity(messages.len());
        for message in messages {
            signatures.push(self.sign(message).await?);
        }
        Ok(signatures)
    }
}

#[async_trait]
impl Signer for PrivateKey {
    fn public_key(&self) -> PublicKey {
        PrivateKey::public_key(self)
    }

    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        self.sign_bytes(message)
    }
}

#[async_trait]
impl<S: Signer + ?Sized> Signer for Arc<S> {
    fn public_key(&self) -> PublicKey {
        (**self).public_key()
    }

    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        (**self).sign(message).await
    }
}
