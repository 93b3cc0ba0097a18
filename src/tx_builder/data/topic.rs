use serde::{Deserialize, Serialize};

use super::validate_id;
use crate::crypto::Key;
use crate::entity::{AccountId, LedgerId, TopicId};
use crate::error::Result;
use crate::tx_builder::{ChunkData, Transaction, TransactionData, TransactionKind};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicCreateData {
    pub topic_memo: String,
    pub admin_key: Option<Key>,
    /// When set, only messages signed by this key are accepted.
    pub submit_key: Option<Key>,
    pub auto_renew_account_id: Option<AccountId>,
}

impl TransactionData for TopicCreateData {
    fn kind(&self) -> TransactionKind {
        TransactionKind::TopicCreate
    }

    fn validate_checksums(&self, ledger_id: &LedgerId) -> Result<()> {
        validate_id(self.auto_renew_account_id.as_ref(), ledger_id)
    }
}

impl Transaction<TopicCreateData> {
    pub fn topic_memo(mut self, memo: impl Into<String>) -> Self {
        self.data_mut().topic_memo = memo.into();
        self
    }

    pub fn admin_key(mut self, key: impl Into<Key>) -> Self {
        self.data_mut().admin_key = Some(key.into());
        self
    }

    pub fn submit_key(mut self, key: impl Into<Key>) -> Self {
        self.data_mut().submit_key = Some(key.into());
        self
    }

    pub fn auto_renew_account_id(mut self, account_id: AccountId) -> Self {
        self.data_mut().auto_renew_account_id = Some(account_id);
        self
    }
}

/// Publish a message to a topic, split into chunks when large.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicMessageSubmitData {
    pub topic_id: Option<TopicId>,
    pub chunk_data: ChunkData,
}

impl TransactionData for TopicMessageSubmitData {
    fn kind(&self) -> TransactionKind {
        TransactionKind::TopicMessageSubmit
    }

    fn chunk_data(&self) -> Option<&ChunkData> {
        Some(&self.chunk_data)
    }

    fn chunk_data_mut(&mut self) -> Option<&mut ChunkData> {
        Some(&mut self.chunk_data)
    }

    fn validate_checksums(&self, ledger_id: &LedgerId) -> Result<()> {
        validate_id(self.topic_id.as_ref(), ledger_id)
    }
}

impl Transaction<TopicMessageSubmitData> {
    pub fn topic_id(mut self, topic_id: TopicId) -> Self {
        self.data_mut().topic_id = Some(topic_id);
        self
    }

    pub fn message(mut self, message: impl Into<Vec<u8>>) -> Self {
        self.data_mut().chunk_data.data = message.into();
        self
    }

    pub fn chunk_size(mut self, size: usize) -> Self {
        self.data_mut().chunk_data.chunk_size = size;
        self
    }

    pub fn max_chunks(mut self, max: usize) -> Self {
        self.data_mut().chunk_data.max_chunks = max;
        self
    }
}
