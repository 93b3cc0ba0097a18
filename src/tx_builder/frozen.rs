//! Frozen transactions: fixed bodies, accumulating signatures

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::any::SerializedTransaction;
use super::transaction::{FALLBACK_MAX_TRANSACTION_FEE, FALLBACK_VALID_DURATION};
use super::{AnyTransactionData, Transaction, TransactionData, TransactionKind, TransactionResponse};
use crate::client::Client;
use crate::crypto::{Key, PublicKey, SignatureMap, Signer};
use crate::entity::AccountId;
use crate::error::{Error, Result};
use crate::execute::{self, Execute, RetryOverrides};
use crate::hbar::Hbar;
use crate::observability::TraceContext;
use crate::transaction_id::TransactionId;
use crate::wire::{self, Operation, SignedTransaction, TransactionBody};

/// One chunk's body bytes and the signatures over them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct FrozenChunk {
    pub transaction_id: TransactionId,
    pub body_bytes: Vec<u8>,
    pub signatures: SignatureMap,
}

impl FrozenChunk {
    fn signed_bytes(&self) -> Result<Vec<u8>> {
        wire::encode(&SignedTransaction {
            body_bytes: self.body_bytes.clone(),
            signatures: self.signatures.clone(),
        })
    }
}

/// Serialized form of everything freezing fixed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct FrozenParts {
    pub node_account_ids: Vec<AccountId>,
    pub transaction_id: TransactionId,
    pub chunks: Vec<FrozenChunk>,
}

/// A transaction whose bodies can no longer change.
///
/// Only signatures can be added. Every signing method takes `self` and
/// returns the updated value, so a frozen transaction is never observed
/// half-signed across chunks.
#[derive(Debug, Clone, PartialEq)]
pub struct FrozenTransaction<D> {
    source: Transaction<D>,
    node_account_ids: Vec<AccountId>,
    transaction_id: TransactionId,
    chunks: Vec<FrozenChunk>,
    /// Not serialized.
    payer_key: Option<Key>,
}

impl<D: TransactionData> FrozenTransaction<D> {
    pub(crate) fn new(
        source: Transaction<D>,
        node_account_ids: Vec<AccountId>,
        transaction_id: TransactionId,
        chunks: Vec<FrozenChunk>,
    ) -> Self {
        let source = source
            .node_account_ids(node_account_ids.clone())
            .transaction_id(transaction_id.clone());
        Self {
            source,
            node_account_ids,
            transaction_id,
            chunks,
            payer_key: None,
        }
    }

    pub fn transaction_id(&self) -> &TransactionId {
        &self.transaction_id
    }

    pub fn node_account_ids(&self) -> &[AccountId] {
        &self.node_account_ids
    }

    pub fn data(&self) -> &D {
        self.source.data()
    }

    pub fn kind(&self) -> TransactionKind {
        self.source.data().kind()
    }

    pub fn memo(&self) -> &str {
        self.source.get_transaction_memo()
    }

    pub fn max_transaction_fee(&self) -> Hbar {
        self.source
            .get_max_transaction_fee()
            .unwrap_or(FALLBACK_MAX_TRANSACTION_FEE)
    }

    pub fn valid_duration(&self) -> Duration {
        self.source
            .get_transaction_valid_duration()
            .unwrap_or(FALLBACK_VALID_DURATION)
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunk_transaction_ids(&self) -> Vec<TransactionId> {
        self.chunks.iter().map(|c| c.transaction_id.clone()).collect()
    }

    /// Signed bytes of chunk `index`.
    pub fn body_bytes(&self, index: usize) -> Option<&[u8]> {
        self.chunks.get(index).map(|c| c.body_bytes.as_slice())
    }

    /// Signature map of every chunk, in chunk order.
    pub fn signatures(&self) -> Vec<&SignatureMap> {
        self.chunks.iter().map(|c| &c.signatures).collect()
    }

    /// Key of the paying account, when known.
    ///
    /// `execute` then refuses to submit until the signatures satisfy it on
    /// every chunk. Without it the network is the authority on the payer
    /// signature of a transaction the operator doesn't pay for.
    pub fn payer_key(mut self, key: impl Into<Key>) -> Self {
        self.payer_key = Some(key.into());
        self
    }

    /// Whether `key` is satisfied on every chunk.
    pub fn is_fully_signed(&self, key: &Key) -> bool {
        self.chunks.iter().all(|c| key.is_satisfied_by(&c.signatures))
    }

    /// Sign every chunk. Signing twice with the same key is a no-op.
    pub async fn sign<S: Signer + ?Sized>(mut self, signer: &S) -> Result<Self> {
        let public_key = signer.public_key();
        if self.chunks.iter().all(|c| c.signatures.contains(&public_key)) {
            return Ok(self);
        }

        let bodies: Vec<Vec<u8>> = self.chunks.iter().map(|c| c.body_bytes.clone()).collect();
        let signatures = signer.sign_all(&bodies).await?;
        if signatures.len() != self.chunks.len() {
            return Err(Error::Signature(format!(
                "signer returned {} signatures for {} chunks",
                signatures.len(),
                self.chunks.len()
            )));
        }

        for (chunk, signature) in self.chunks.iter_mut().zip(signatures) {
            chunk.signatures.insert(public_key.clone(), signature);
        }
        debug!(
            transaction_id = %self.transaction_id,
            public_key = %public_key,
            "Transaction signed"
        );
        Ok(self)
    }

    pub async fn sign_with_operator(self, client: &Client) -> Result<Self> {
        let operator = client
            .operator()
            .ok_or_else(|| Error::illegal_state("client has no operator"))?;
        self.sign(operator.signer.as_ref()).await
    }

    /// Attach externally produced signatures, one per chunk.
    pub fn add_signature(mut self, public_key: PublicKey, signatures: Vec<Vec<u8>>) -> Result<Self> {
        if signatures.len() != self.chunks.len() {
            return Err(Error::IllegalState(format!(
                "got {} signatures for a transaction with {} chunks",
                signatures.len(),
                self.chunks.len()
            )));
        }
        for (chunk, signature) in self.chunks.iter().zip(&signatures) {
            public_key.verify(&chunk.body_bytes, signature)?;
        }
        for (chunk, signature) in self.chunks.iter_mut().zip(signatures) {
            chunk.signatures.insert(public_key.clone(), signature);
        }
        Ok(self)
    }

    /// Union of the signatures of two frozen copies of the same transaction.
    pub fn merge_signatures(mut self, other: &FrozenTransaction<D>) -> Result<Self> {
        let same_bodies = self.node_account_ids == other.node_account_ids
            && self.chunks.len() == other.chunks.len()
            && self
                .chunks
                .iter()
                .zip(&other.chunks)
                .all(|(a, b)| a.body_bytes == b.body_bytes);
        if !same_bodies {
            return Err(Error::illegal_state(
                "cannot merge signatures of transactions with different bodies",
            ));
        }
        for (chunk, theirs) in self.chunks.iter_mut().zip(&other.chunks) {
            chunk.signatures.merge(&theirs.signatures);
        }
        Ok(self)
    }

    /// SHA-256 of the first chunk's signed bytes.
    pub fn transaction_hash(&self) -> Result<Vec<u8>> {
        let chunk = self
            .chunks
            .first()
            .ok_or_else(|| Error::illegal_state("frozen transaction has no chunks"))?;
        Ok(Sha256::digest(chunk.signed_bytes()?).to_vec())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        wire::encode(&SerializedTransaction {
            draft: self.source.clone().into_any(),
            frozen: Some(self.parts()),
        })
    }

    /// Decode a frozen transaction. Draft bytes are rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let serialized = SerializedTransaction::decode(bytes)?;
        let parts = serialized
            .frozen
            .ok_or_else(|| Error::illegal_state("bytes hold a draft transaction"))?;
        FrozenTransaction::from_parts(serialized.draft, parts)?.downcast()
    }

    fn parts(&self) -> FrozenParts {
        FrozenParts {
            node_account_ids: self.node_account_ids.clone(),
            transaction_id: self.transaction_id.clone(),
            chunks: self.chunks.clone(),
        }
    }

    fn overrides(&self) -> RetryOverrides {
        RetryOverrides {
            max_attempts: self.source.get_max_attempts(),
            min_backoff: self.source.get_min_backoff(),
            max_backoff: self.source.get_max_backoff(),
        }
    }

    /// Sign with the operator when it pays; otherwise require some signature,
    /// and the payer key's signatures when one was given.
    async fn prepare(self, client: &Client) -> Result<Self> {
        let operator_pays = client
            .operator_account_id()
            .is_some_and(|id| id == self.transaction_id.account_id);
        let prepared = if operator_pays {
            self.sign_with_operator(client).await?
        } else {
            self
        };

        if prepared.chunks.iter().any(|c| c.signatures.is_empty()) {
            return Err(Error::not_signed(format!(
                "transaction {} has no payer signature",
                prepared.transaction_id
            )));
        }
        if let Some(key) = &prepared.payer_key {
            if !prepared.is_fully_signed(key) {
                return Err(Error::not_signed(format!(
                    "transaction {} is not signed by its payer {}",
                    prepared.transaction_id, prepared.transaction_id.account_id
                )));
            }
        }
        Ok(prepared)
    }

    fn scheduled_transaction_id(&self) -> Option<TransactionId> {
        (self.kind() == TransactionKind::ScheduleCreate)
            .then(|| self.transaction_id.clone().with_scheduled(true))
    }

    async fn submit_chunk(
        &self,
        client: &Client,
        index: usize,
        timeout: Option<Duration>,
    ) -> Result<TransactionResponse> {
        let chunk = &self.chunks[index];
        let signed = chunk.signed_bytes()?;
        let submit = SubmitChunk {
            node_account_ids: &self.node_account_ids,
            transaction_id: &chunk.transaction_id,
            transaction_hash: Sha256::digest(&signed).to_vec(),
            signed,
            overrides: self.overrides(),
            scheduled_transaction_id: self.scheduled_transaction_id(),
            trace: TraceContext::new(Operation::SubmitTransaction.as_str()),
        };
        execute::execute(client, &submit, timeout).await
    }

    /// Submit the transaction. For a chunked transaction every chunk is
    /// submitted and the first chunk's response is returned.
    pub async fn execute(self, client: &Client) -> Result<TransactionResponse> {
        self.execute_inner(client, None).await
    }

    pub async fn execute_with_timeout(self, client: &Client, timeout: Duration) -> Result<TransactionResponse> {
        self.execute_inner(client, Some(timeout)).await
    }

    async fn execute_inner(self, client: &Client, timeout: Option<Duration>) -> Result<TransactionResponse> {
        let mut responses = self.execute_all_inner(client, timeout).await?;
        // At least one chunk always exists.
        Ok(responses.swap_remove(0))
    }

    /// Submit every chunk in order, waiting for each chunk's receipt before
    /// sending the next one.
    pub async fn execute_all(self, client: &Client) -> Result<Vec<TransactionResponse>> {
        self.execute_all_inner(client, None).await
    }

    /// Like `execute_all`; `timeout` bounds each chunk separately.
    pub async fn execute_all_with_timeout(
        self,
        client: &Client,
        timeout: Duration,
    ) -> Result<Vec<TransactionResponse>> {
        self.execute_all_inner(client, Some(timeout)).await
    }

    async fn execute_all_inner(
        self,
        client: &Client,
        timeout: Option<Duration>,
    ) -> Result<Vec<TransactionResponse>> {
        if self.chunks.is_empty() {
            return Err(Error::illegal_state("frozen transaction has no chunks"));
        }
        let prepared = self.prepare(client).await?;
        let total = prepared.chunks.len();

        let mut responses = Vec::with_capacity(total);
        for index in 0..total {
            let response = prepared.submit_chunk(client, index, timeout).await?;
            if index + 1 < total {
                match timeout {
                    Some(timeout) => response.get_receipt_with_timeout(client, timeout).await?,
                    None => response.get_receipt(client).await?,
                };
            }
            responses.push(response);
        }

        info!(
            transaction_id = %prepared.transaction_id,
            kind = %prepared.kind(),
            chunks = total,
            node = %responses[0].node_id,
            "Transaction submitted"
        );
        Ok(responses)
    }

    /// Run `execute` on a spawned task.
    pub fn execute_detached(self, client: &Client) -> JoinHandle<Result<TransactionResponse>> {
        let client = client.clone();
        tokio::spawn(async move { self.execute(&client).await })
    }
}

impl FrozenTransaction<AnyTransactionData> {
    pub(crate) fn from_parts(draft: Transaction<AnyTransactionData>, parts: FrozenParts) -> Result<Self> {
        let first = parts
            .chunks
            .first()
            .ok_or_else(|| Error::serialization("frozen transaction has no chunks"))?;
        if first.transaction_id != parts.transaction_id || parts.node_account_ids.is_empty() {
            return Err(Error::serialization("inconsistent frozen transaction"));
        }

        for chunk in &parts.chunks {
            let body: TransactionBody = wire::decode(&chunk.body_bytes)?;
            if body.transaction_id != chunk.transaction_id {
                return Err(Error::serialization("chunk body does not match its transaction id"));
            }
            chunk.signatures.verify_all(&chunk.body_bytes)?;
        }

        let source = draft
            .node_account_ids(parts.node_account_ids.clone())
            .transaction_id(parts.transaction_id.clone());
        Ok(Self {
            source,
            node_account_ids: parts.node_account_ids,
            transaction_id: parts.transaction_id,
            chunks: parts.chunks,
            payer_key: None,
        })
    }

    pub fn downcast<D: TransactionData>(self) -> Result<FrozenTransaction<D>> {
        Ok(FrozenTransaction {
            source: self.source.downcast()?,
            node_account_ids: self.node_account_ids,
            transaction_id: self.transaction_id,
            chunks: self.chunks,
            payer_key: self.payer_key,
        })
    }
}

struct SubmitChunk<'a> {
    node_account_ids: &'a [AccountId],
    transaction_id: &'a TransactionId,
    signed: Vec<u8>,
    transaction_hash: Vec<u8>,
    overrides: RetryOverrides,
    scheduled_transaction_id: Option<TransactionId>,
    trace: TraceContext,
}

impl Execute for SubmitChunk<'_> {
    type Output = TransactionResponse;

    fn operation(&self) -> Operation {
        Operation::SubmitTransaction
    }

    fn node_account_ids(&self) -> Option<&[AccountId]> {
        Some(self.node_account_ids)
    }

    fn transaction_id(&self) -> Option<&TransactionId> {
        Some(self.transaction_id)
    }

    fn overrides(&self) -> RetryOverrides {
        self.overrides
    }

    fn trace_context(&self) -> TraceContext {
        self.trace.clone()
    }

    fn make_request(&self) -> Result<Vec<u8>> {
        Ok(self.signed.clone())
    }

    fn map_response(&self, node: &AccountId, _payload: Vec<u8>) -> Result<TransactionResponse> {
        Ok(TransactionResponse {
            node_id: node.clone(),
            transaction_id: self.transaction_id.clone(),
            transaction_hash: self.transaction_hash.clone(),
            scheduled_transaction_id: self.scheduled_transaction_id.clone(),
            validate_status: true,
            trace: self.trace.clone(),
        })
    }
}
