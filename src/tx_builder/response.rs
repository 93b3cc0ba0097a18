use std::time::Duration;

use crate::client::Client;
use crate::entity::AccountId;
use crate::error::Result;
use crate::observability::TraceContext;
use crate::receipt::{TransactionReceipt, TransactionReceiptQuery, TransactionRecord, TransactionRecordQuery};
use crate::transaction_id::TransactionId;

/// Acknowledgement that a node accepted a transaction for consensus.
///
/// Acceptance says nothing about the outcome; fetch the receipt for that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionResponse {
    /// The node that accepted the transaction.
    pub node_id: AccountId,
    pub transaction_id: TransactionId,
    pub transaction_hash: Vec<u8>,
    pub scheduled_transaction_id: Option<TransactionId>,
    pub validate_status: bool,
    /// Trace of the submission; receipt and record queries continue it.
    pub trace: TraceContext,
}

impl TransactionResponse {
    /// Whether `get_receipt`/`get_record` fail on a non-SUCCESS status.
    pub fn validate_status(mut self, validate: bool) -> Self {
        self.validate_status = validate;
        self
    }

    pub fn get_receipt_query(&self) -> TransactionReceiptQuery {
        TransactionReceiptQuery::new()
            .transaction_id(self.transaction_id.clone())
            .node_account_ids([self.node_id.clone()])
            .validate_status(self.validate_status)
            .parent_trace(self.trace.clone())
    }

    pub fn get_record_query(&self) -> TransactionRecordQuery {
        TransactionRecordQuery::new()
            .transaction_id(self.transaction_id.clone())
            .node_account_ids([self.node_id.clone()])
            .validate_status(self.validate_status)
            .parent_trace(self.trace.clone())
    }

    pub async fn get_receipt(&self, client: &Client) -> Result<TransactionReceipt> {
        self.get_receipt_query().execute(client).await
    }

    pub async fn get_receipt_with_timeout(&self, client: &Client, timeout: Duration) -> Result<TransactionReceipt> {
        self.get_receipt_query().execute_with_timeout(client, timeout).await
    }

    /// Waits for the receipt first, so a failed transaction fails here the
    /// same way `get_receipt` would.
    pub async fn get_record(&self, client: &Client) -> Result<TransactionRecord> {
        self.get_receipt(client).await?;
        self.get_record_query().execute(client).await
    }

    pub async fn get_record_with_timeout(&self, client: &Client, timeout: Duration) -> Result<TransactionRecord> {
        self.get_receipt_with_timeout(client, timeout).await?;
        self.get_record_query().execute_with_timeout(client, timeout).await
    }
}
