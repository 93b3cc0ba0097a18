//! Transaction receipts and records
//!
//! Both are produced by the network and only ever decoded here. A receipt
//! carries the outcome and the ids of anything the transaction created; a
//! record adds fees, transfers and timing.

mod query;

pub use query::{TransactionReceiptQuery, TransactionRecordQuery};

use serde::{Deserialize, Serialize};

use crate::entity::{AccountId, ContractId, FileId, ScheduleId, TokenId, TopicId};
use crate::hbar::Hbar;
use crate::status::Status;
use crate::timestamp::Timestamp;
use crate::transaction_id::TransactionId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub status: Status,
    pub transaction_id: Option<TransactionId>,
    pub account_id: Option<AccountId>,
    pub file_id: Option<FileId>,
    pub contract_id: Option<ContractId>,
    pub topic_id: Option<TopicId>,
    pub token_id: Option<TokenId>,
    pub schedule_id: Option<ScheduleId>,
    /// Set on a schedule create/sign receipt.
    pub scheduled_transaction_id: Option<TransactionId>,
    pub topic_sequence_number: u64,
    pub serials: Vec<i64>,
    /// Receipts of child transactions, when requested.
    pub children: Vec<TransactionReceipt>,
    /// Receipts of duplicate submissions, when requested.
    pub duplicates: Vec<TransactionReceipt>,
}

impl TransactionReceipt {
    /// Receipt carrying only a status.
    pub fn from_status(status: Status) -> Self {
        Self {
            status,
            transaction_id: None,
            account_id: None,
            file_id: None,
            contract_id: None,
            topic_id: None,
            token_id: None,
            schedule_id: None,
            scheduled_transaction_id: None,
            topic_sequence_number: 0,
            serials: Vec::new(),
            children: Vec::new(),
            duplicates: Vec::new(),
        }
    }

    /// Whether the receipt is still pending and worth polling again.
    pub fn is_pending(&self) -> bool {
        matches!(
            self.status,
            Status::Ok | Status::Unknown | Status::Busy | Status::ReceiptNotFound | Status::RecordNotFound
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub account_id: AccountId,
    pub amount: Hbar,
    pub is_approved: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTransfer {
    pub token_id: TokenId,
    pub account_id: AccountId,
    pub amount: i64,
}

/// A custom fee the network charged on top of the transaction fee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessedCustomFee {
    /// Hbar when `None`.
    pub token_id: Option<TokenId>,
    pub amount: i64,
    pub fee_collector_account_id: AccountId,
    pub payer_account_ids: Vec<AccountId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractFunctionResult {
    pub contract_id: ContractId,
    pub bytes: Vec<u8>,
    pub error_message: Option<String>,
    pub gas_used: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub receipt: TransactionReceipt,
    pub transaction_hash: Vec<u8>,
    pub consensus_timestamp: Timestamp,
    pub transaction_id: TransactionId,
    pub memo: String,
    pub transaction_fee: Hbar,
    pub transfers: Vec<Transfer>,
    pub token_transfers: Vec<TokenTransfer>,
    pub contract_function_result: Option<ContractFunctionResult>,
    pub assessed_custom_fees: Vec<AssessedCustomFee>,
    pub children: Vec<TransactionRecord>,
    pub duplicates: Vec<TransactionRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_statuses() {
        for status in [Status::Ok, Status::Unknown, Status::Busy, Status::ReceiptNotFound] {
            assert!(TransactionReceipt::from_status(status).is_pending(), "{status}");
        }
        assert!(!TransactionReceipt::from_status(Status::Success).is_pending());
        assert!(!TransactionReceipt::from_status(Status::InsufficientPayerBalance).is_pending());
    }
}
