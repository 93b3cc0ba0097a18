//! Wire envelopes exchanged with nodes
//!
//! Every request and response is a bincode-encoded serde value. Bodies are
//! encoded once at freeze time and signed as raw bytes, so a body decoded on
//! the far side verifies against exactly the bytes that were signed.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::crypto::SignatureMap;
use crate::entity::{AccountId, ScheduleId, TopicId};
use crate::error::Result;
use crate::hbar::Hbar;
use crate::transaction_id::TransactionId;
use crate::tx_builder::{AnyTransactionData, ChunkInfo};

/// Remote procedure addressed by a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    SubmitTransaction,
    GetTransactionReceipt,
    GetTransactionRecord,
    GetAccountBalance,
    GetScheduleInfo,
    GetTopicMessages,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SubmitTransaction => "submit_transaction",
            Self::GetTransactionReceipt => "get_transaction_receipt",
            Self::GetTransactionRecord => "get_transaction_record",
            Self::GetAccountBalance => "get_account_balance",
            Self::GetScheduleInfo => "get_schedule_info",
            Self::GetTopicMessages => "get_topic_messages",
        }
    }
}

/// The signed part of one chunk of a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionBody {
    pub transaction_id: TransactionId,
    /// Nodes allowed to accept this body.
    pub node_account_ids: Vec<AccountId>,
    pub max_transaction_fee: Hbar,
    pub valid_duration: Duration,
    pub memo: String,
    pub chunk_info: Option<ChunkInfo>,
    pub data: AnyTransactionData,
}

/// Body bytes plus the signatures collected over them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub body_bytes: Vec<u8>,
    pub signatures: SignatureMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryRequest {
    TransactionReceipt {
        transaction_id: TransactionId,
        include_children: bool,
        include_duplicates: bool,
    },
    TransactionRecord {
        transaction_id: TransactionId,
        include_children: bool,
        include_duplicates: bool,
    },
    AccountBalance {
        account_id: AccountId,
    },
    ScheduleInfo {
        schedule_id: ScheduleId,
    },
    TopicMessages {
        topic_id: TopicId,
        /// First sequence number to return.
        start_sequence_number: u64,
        limit: usize,
    },
}

/// Node response: numeric status code plus an operation-specific payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub status: i32,
    pub payload: Vec<u8>,
}

impl ResponseEnvelope {
    pub fn status_only(status: crate::status::Status) -> Self {
        Self {
            status: status.code(),
            payload: Vec::new(),
        }
    }
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::status::Status;

    #[test]
    fn test_decode_garbage_is_serialization_error() {
        let err = decode::<ResponseEnvelope>(&[1, 2]).unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_envelope_carries_status_code() {
        let bytes = encode(&ResponseEnvelope::status_only(Status::Busy)).unwrap();
        let envelope: ResponseEnvelope = decode(&bytes).unwrap();
        assert_eq!(Status::from_code(envelope.status).unwrap(), Status::Busy);
        assert!(envelope.payload.is_empty());
    }
}
