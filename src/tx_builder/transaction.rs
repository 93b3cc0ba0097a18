//! Draft transactions

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::any::SerializedTransaction;
use super::data::{SchedulableBody, ScheduleCreateData};
use super::frozen::{FrozenChunk, FrozenTransaction};
use super::{AnyTransactionData, ChunkInfo, TransactionData};
use crate::client::Client;
use crate::crypto::SignatureMap;
use crate::entity::AccountId;
use crate::error::{Error, Result};
use crate::hbar::Hbar;
use crate::transaction_id::TransactionId;
use crate::wire::{self, TransactionBody};

/// Fee ceiling used when freezing without a client.
pub(crate) const FALLBACK_MAX_TRANSACTION_FEE: Hbar = Hbar::new(2);
pub(crate) const FALLBACK_VALID_DURATION: Duration = Duration::from_secs(120);

/// A transaction under construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction<D> {
    data: D,
    node_account_ids: Option<Vec<AccountId>>,
    transaction_id: Option<TransactionId>,
    max_transaction_fee: Option<Hbar>,
    valid_duration: Option<Duration>,
    memo: String,
    max_attempts: Option<u32>,
    min_backoff: Option<Duration>,
    max_backoff: Option<Duration>,
}

impl<D: TransactionData + Default> Transaction<D> {
    pub fn new() -> Self {
        Self::from_data(D::default())
    }
}

impl<D: TransactionData + Default> Default for Transaction<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: TransactionData> Transaction<D> {
    pub fn from_data(data: D) -> Self {
        Self {
            data,
            node_account_ids: None,
            transaction_id: None,
            max_transaction_fee: None,
            valid_duration: None,
            memo: String::new(),
            max_attempts: None,
            min_backoff: None,
            max_backoff: None,
        }
    }

    pub fn data(&self) -> &D {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut D {
        &mut self.data
    }

    /// Submit only to these nodes, in this order.
    pub fn node_account_ids(mut self, ids: impl IntoIterator<Item = AccountId>) -> Self {
        self.node_account_ids = Some(ids.into_iter().collect());
        self
    }

    pub fn transaction_id(mut self, id: TransactionId) -> Self {
        self.transaction_id = Some(id);
        self
    }

    pub fn max_transaction_fee(mut self, fee: Hbar) -> Self {
        self.max_transaction_fee = Some(fee);
        self
    }

    pub fn transaction_valid_duration(mut self, duration: Duration) -> Self {
        self.valid_duration = Some(duration);
        self
    }

    pub fn transaction_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    /// Override the client's attempt budget for this transaction.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn min_backoff(mut self, backoff: Duration) -> Self {
        self.min_backoff = Some(backoff);
        self
    }

    pub fn max_backoff(mut self, backoff: Duration) -> Self {
        self.max_backoff = Some(backoff);
        self
    }

    pub fn get_node_account_ids(&self) -> Option<&[AccountId]> {
        self.node_account_ids.as_deref()
    }

    pub fn get_transaction_id(&self) -> Option<&TransactionId> {
        self.transaction_id.as_ref()
    }

    pub fn get_max_transaction_fee(&self) -> Option<Hbar> {
        self.max_transaction_fee
    }

    pub fn get_transaction_valid_duration(&self) -> Option<Duration> {
        self.valid_duration
    }

    pub fn get_transaction_memo(&self) -> &str {
        &self.memo
    }

    pub fn get_max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    pub fn get_min_backoff(&self) -> Option<Duration> {
        self.min_backoff
    }

    pub fn get_max_backoff(&self) -> Option<Duration> {
        self.max_backoff
    }

    /// Freeze using the client for node selection, transaction id and defaults.
    pub fn freeze_with(mut self, client: &Client) -> Result<FrozenTransaction<D>> {
        let settings = client.settings();

        let node_account_ids = match self.node_account_ids.take() {
            Some(ids) => {
                client.registry().resolve(&ids)?;
                ids
            }
            None => client.registry().select_nodes(settings.max_nodes_per_transaction),
        };

        let transaction_id = match self.transaction_id.take() {
            Some(id) => id,
            None => {
                let payer = client.operator_account_id().ok_or_else(|| {
                    Error::IllegalState(
                        "no transaction id set and the client has no operator to generate one".to_string(),
                    )
                })?;
                TransactionId::generate(payer)
            }
        };

        if settings.auto_validate_checksums {
            if let Some(ledger_id) = client.ledger_id() {
                transaction_id.account_id.validate_checksum(ledger_id)?;
                self.data.validate_checksums(ledger_id)?;
            }
        }

        self.max_transaction_fee.get_or_insert(settings.default_max_transaction_fee);
        self.valid_duration.get_or_insert(settings.default_valid_duration);
        self.freeze_inner(node_account_ids, transaction_id)
    }

    /// Freeze without a client; node ids and transaction id must be set.
    pub fn freeze(mut self) -> Result<FrozenTransaction<D>> {
        let node_account_ids = self.node_account_ids.take().ok_or_else(|| {
            Error::IllegalState("node account ids must be set to freeze without a client".to_string())
        })?;
        let transaction_id = self.transaction_id.take().ok_or_else(|| {
            Error::IllegalState("transaction id must be set to freeze without a client".to_string())
        })?;

        self.max_transaction_fee.get_or_insert(FALLBACK_MAX_TRANSACTION_FEE);
        self.valid_duration.get_or_insert(FALLBACK_VALID_DURATION);
        self.freeze_inner(node_account_ids, transaction_id)
    }

    fn freeze_inner(
        self,
        node_account_ids: Vec<AccountId>,
        transaction_id: TransactionId,
    ) -> Result<FrozenTransaction<D>> {
        if node_account_ids.is_empty() {
            return Err(Error::IllegalState("no nodes available to freeze against".to_string()));
        }
        self.validate_overrides()?;
        self.data.validate()?;

        let total = match self.data.chunk_data() {
            Some(chunks) => chunks.check_limits()?,
            None => 1,
        };

        let max_transaction_fee = self.max_transaction_fee.unwrap_or(FALLBACK_MAX_TRANSACTION_FEE);
        let valid_duration = self.valid_duration.unwrap_or(FALLBACK_VALID_DURATION);
        let any_data = self.data.clone().into_any();

        let mut chunks = Vec::with_capacity(total);
        for index in 0..total {
            let chunk_transaction_id = transaction_id.offset_nanos(index as u64);

            let mut data = any_data.clone();
            let chunk_info = match data.chunk_data_mut() {
                Some(chunk_data) => {
                    *chunk_data = chunk_data.sliced(index);
                    Some(ChunkInfo {
                        initial_transaction_id: transaction_id.clone(),
                        number: index as u32 + 1,
                        total: total as u32,
                    })
                }
                None => None,
            };

            let body = TransactionBody {
                transaction_id: chunk_transaction_id.clone(),
                node_account_ids: node_account_ids.clone(),
                max_transaction_fee,
                valid_duration,
                memo: self.memo.clone(),
                chunk_info,
                data,
            };

            chunks.push(FrozenChunk {
                transaction_id: chunk_transaction_id,
                body_bytes: wire::encode(&body)?,
                signatures: SignatureMap::new(),
            });
        }

        debug!(
            transaction_id = %transaction_id,
            kind = %self.data.kind(),
            chunks = total,
            nodes = node_account_ids.len(),
            "Transaction frozen"
        );

        Ok(FrozenTransaction::new(self, node_account_ids, transaction_id, chunks))
    }

    fn validate_overrides(&self) -> Result<()> {
        if self.max_attempts == Some(0) {
            return Err(Error::IllegalState("max_attempts must be > 0".to_string()));
        }
        if let (Some(min), Some(max)) = (self.min_backoff, self.max_backoff) {
            if min > max {
                return Err(Error::IllegalState(format!(
                    "min_backoff ({min:?}) exceeds max_backoff ({max:?})"
                )));
            }
        }
        Ok(())
    }

    /// Wrap this transaction in a schedule-create transaction.
    pub fn schedule(self) -> Result<Transaction<ScheduleCreateData>> {
        Transaction::<ScheduleCreateData>::new().scheduled_transaction(self)
    }

    pub(crate) fn into_schedulable_body(self) -> Result<SchedulableBody> {
        if !self.data.is_schedulable() {
            return Err(Error::IllegalState(format!(
                "{} transactions cannot be scheduled",
                self.data.kind()
            )));
        }
        if let Some(chunks) = self.data.chunk_data() {
            if chunks.required_chunks() > 1 {
                return Err(Error::IllegalState(
                    "a transaction with more than one chunk cannot be scheduled".to_string(),
                ));
            }
        }
        Ok(SchedulableBody {
            data: Box::new(self.data.into_any()),
            max_transaction_fee: self.max_transaction_fee,
            memo: self.memo,
        })
    }

    pub(crate) fn map_data<E>(self, f: impl FnOnce(D) -> Result<E>) -> Result<Transaction<E>> {
        Ok(Transaction {
            data: f(self.data)?,
            node_account_ids: self.node_account_ids,
            transaction_id: self.transaction_id,
            max_transaction_fee: self.max_transaction_fee,
            valid_duration: self.valid_duration,
            memo: self.memo,
            max_attempts: self.max_attempts,
            min_backoff: self.min_backoff,
            max_backoff: self.max_backoff,
        })
    }

    pub fn into_any(self) -> Transaction<AnyTransactionData> {
        Transaction {
            data: self.data.into_any(),
            node_account_ids: self.node_account_ids,
            transaction_id: self.transaction_id,
            max_transaction_fee: self.max_transaction_fee,
            valid_duration: self.valid_duration,
            memo: self.memo,
            max_attempts: self.max_attempts,
            min_backoff: self.min_backoff,
            max_backoff: self.max_backoff,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        wire::encode(&SerializedTransaction {
            draft: self.clone().into_any(),
            frozen: None,
        })
    }

    /// Decode a draft. Frozen bytes are rejected; use `FrozenTransaction::from_bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let serialized = SerializedTransaction::decode(bytes)?;
        if serialized.frozen.is_some() {
            return Err(Error::IllegalState(
                "bytes hold a frozen transaction".to_string(),
            ));
        }
        serialized.draft.downcast()
    }
}

impl Transaction<AnyTransactionData> {
    pub fn downcast<D: TransactionData>(self) -> Result<Transaction<D>> {
        self.map_data(D::from_any)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timestamp::Timestamp;
    use crate::tx_builder::{
        AccountCreateTransaction, FileAppendTransaction, TopicMessageSubmitTransaction,
        TransferTransaction,
    };

    fn tx_id() -> TransactionId {
        TransactionId::new(AccountId::from_num(1001), Timestamp::new(1_700_000_000, 0))
    }

    #[test]
    fn test_freeze_without_client_requires_ids() {
        let err = TransferTransaction::new().freeze().unwrap_err();
        assert!(matches!(err, Error::IllegalState(_)));

        let err = TransferTransaction::new()
            .node_account_ids([AccountId::from_num(3)])
            .freeze()
            .unwrap_err();
        assert!(matches!(err, Error::IllegalState(_)));
    }

    #[test]
    fn test_freeze_fills_defaults() {
        let frozen = AccountCreateTransaction::new()
            .initial_balance(Hbar::new(1))
            .node_account_ids([AccountId::from_num(3)])
            .transaction_id(tx_id())
            .freeze()
            .unwrap();

        assert_eq!(frozen.max_transaction_fee(), Hbar::new(2));
        assert_eq!(frozen.valid_duration(), Duration::from_secs(120));
        assert_eq!(frozen.chunk_count(), 1);
        assert_eq!(frozen.transaction_id(), &tx_id());
    }

    #[test]
    fn test_chunked_freeze_assigns_consecutive_ids() {
        let frozen = TopicMessageSubmitTransaction::new()
            .topic_id(AccountId::from_num(800))
            .message(vec![7u8; 2500])
            .node_account_ids([AccountId::from_num(3)])
            .transaction_id(tx_id())
            .freeze()
            .unwrap();

        assert_eq!(frozen.chunk_count(), 3);
        let ids = frozen.chunk_transaction_ids();
        assert_eq!(ids[0], tx_id());
        assert_eq!(ids[2].valid_start, tx_id().valid_start.plus_nanos(2));
    }

    #[test]
    fn test_max_chunks_checked_before_network() {
        let err = FileAppendTransaction::new()
            .file_id(AccountId::from_num(150))
            .contents(vec![1u8; 100])
            .chunk_size(10)
            .max_chunks(3)
            .node_account_ids([AccountId::from_num(3)])
            .transaction_id(tx_id())
            .freeze()
            .unwrap_err();
        assert!(matches!(err, Error::MaxChunksExceeded { required: 10, max: 3 }));
    }

    #[test]
    fn test_invalid_backoff_override() {
        let err = TransferTransaction::new()
            .min_backoff(Duration::from_secs(5))
            .max_backoff(Duration::from_secs(1))
            .node_account_ids([AccountId::from_num(3)])
            .transaction_id(tx_id())
            .freeze()
            .unwrap_err();
        assert!(matches!(err, Error::IllegalState(_)));
    }

    #[test]
    fn test_multi_chunk_cannot_be_scheduled() {
        let err = TopicMessageSubmitTransaction::new()
            .message(vec![0u8; 5000])
            .schedule()
            .unwrap_err();
        assert!(matches!(err, Error::IllegalState(_)));

        let scheduled = TopicMessageSubmitTransaction::new()
            .message(b"short".to_vec())
            .schedule()
            .unwrap();
        assert!(scheduled.data().scheduled_transaction().is_some());
    }

    #[test]
    fn test_draft_round_trip_and_kind_check() {
        let draft = TransferTransaction::new()
            .hbar_transfer(AccountId::from_num(2), Hbar::new(-1))
            .hbar_transfer(AccountId::from_num(3), Hbar::new(1))
            .transaction_memo("memo");
        let bytes = draft.to_bytes().unwrap();
        assert_eq!(TransferTransaction::from_bytes(&bytes).unwrap(), draft);
        assert!(AccountCreateTransaction::from_bytes(&bytes).is_err());
    }
}
