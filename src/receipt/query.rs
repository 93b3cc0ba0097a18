use std::time::Duration;
use tracing::debug;

use super::{TransactionReceipt, TransactionRecord};
use crate::client::Client;
use crate::entity::AccountId;
use crate::error::{Error, Result};
use crate::execute::{self, Execute};
use crate::metrics::metrics;
use crate::observability::TraceContext;
use crate::status::{Status, StatusClass, StatusPolicy};
use crate::transaction_id::TransactionId;
use crate::wire::{self, Operation, QueryRequest};

/// Precheck statuses that mean "not yet known, ask again".
fn is_pending_precheck(status: Status) -> bool {
    matches!(
        status,
        Status::Busy | Status::Unknown | Status::ReceiptNotFound | Status::RecordNotFound
    )
}

fn continue_trace(parent: Option<&TraceContext>, operation: Operation) -> TraceContext {
    match parent {
        Some(parent) => parent.child_span(operation.as_str()),
        None => TraceContext::new(operation.as_str()),
    }
}

fn check_receipt(receipt: &TransactionReceipt, transaction_id: &TransactionId, validate: bool) -> Result<()> {
    metrics()
        .receipts
        .with_label_values(&[receipt.status.as_str_name()])
        .inc();
    if validate && receipt.status != Status::Success {
        return Err(Error::ReceiptStatus {
            status: receipt.status,
            transaction_id: transaction_id.clone(),
            receipt: Box::new(receipt.clone()),
        });
    }
    Ok(())
}

/// Poll the outcome of a submitted transaction.
#[derive(Debug, Clone, Default)]
pub struct TransactionReceiptQuery {
    transaction_id: Option<TransactionId>,
    node_account_ids: Option<Vec<AccountId>>,
    include_children: bool,
    include_duplicates: bool,
    validate_status: bool,
    parent_trace: Option<TraceContext>,
}

impl TransactionReceiptQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transaction_id(mut self, transaction_id: TransactionId) -> Self {
        self.transaction_id = Some(transaction_id);
        self
    }

    /// Ask only these nodes; any healthy node when unset.
    pub fn node_account_ids(mut self, ids: impl IntoIterator<Item = AccountId>) -> Self {
        self.node_account_ids = Some(ids.into_iter().collect());
        self
    }

    pub fn include_children(mut self, include: bool) -> Self {
        self.include_children = include;
        self
    }

    pub fn include_duplicates(mut self, include: bool) -> Self {
        self.include_duplicates = include;
        self
    }

    /// Fail with `ReceiptStatus` when the final status isn't SUCCESS.
    pub fn validate_status(mut self, validate: bool) -> Self {
        self.validate_status = validate;
        self
    }

    /// Log this query as part of an earlier operation's trace.
    pub fn parent_trace(mut self, trace: TraceContext) -> Self {
        self.parent_trace = Some(trace);
        self
    }

    pub async fn execute(&self, client: &Client) -> Result<TransactionReceipt> {
        self.execute_inner(client, None).await
    }

    pub async fn execute_with_timeout(&self, client: &Client, timeout: Duration) -> Result<TransactionReceipt> {
        self.execute_inner(client, Some(timeout)).await
    }

    async fn execute_inner(&self, client: &Client, timeout: Option<Duration>) -> Result<TransactionReceipt> {
        let transaction_id = self
            .transaction_id
            .as_ref()
            .ok_or_else(|| Error::illegal_state("receipt query needs a transaction id"))?;

        let receipt = execute::execute(
            client,
            &ReceiptRequest {
                query: self,
                transaction_id,
            },
            timeout,
        )
        .await?;

        debug!(transaction_id = %transaction_id, status = %receipt.status, "Receipt resolved");
        check_receipt(&receipt, transaction_id, self.validate_status)?;
        Ok(receipt)
    }
}

struct ReceiptRequest<'a> {
    query: &'a TransactionReceiptQuery,
    transaction_id: &'a TransactionId,
}

impl Execute for ReceiptRequest<'_> {
    type Output = TransactionReceipt;

    fn operation(&self) -> Operation {
        Operation::GetTransactionReceipt
    }

    fn trace_context(&self) -> TraceContext {
        continue_trace(self.query.parent_trace.as_ref(), self.operation())
    }

    fn node_account_ids(&self) -> Option<&[AccountId]> {
        self.query.node_account_ids.as_deref()
    }

    fn transaction_id(&self) -> Option<&TransactionId> {
        Some(self.transaction_id)
    }

    fn make_request(&self) -> Result<Vec<u8>> {
        wire::encode(&QueryRequest::TransactionReceipt {
            transaction_id: self.transaction_id.clone(),
            include_children: self.query.include_children,
            include_duplicates: self.query.include_duplicates,
        })
    }

    fn classify(&self, policy: &StatusPolicy, status: Status, payload: &[u8]) -> StatusClass {
        if is_pending_precheck(status) {
            return StatusClass::RetryTransient;
        }
        if status != Status::Ok {
            return policy.classify(status);
        }
        match wire::decode::<TransactionReceipt>(payload) {
            Ok(receipt) if receipt.is_pending() => StatusClass::RetryTransient,
            // Undecodable payloads surface from map_response.
            _ => StatusClass::Success,
        }
    }

    fn map_response(&self, _node: &AccountId, payload: Vec<u8>) -> Result<TransactionReceipt> {
        wire::decode(&payload)
    }

    fn map_status_error(&self, status: Status, payload: &[u8]) -> Error {
        if status == Status::Ok {
            if let Ok(receipt) = wire::decode::<TransactionReceipt>(payload) {
                return Error::ReceiptStatus {
                    status: receipt.status,
                    transaction_id: self.transaction_id.clone(),
                    receipt: Box::new(receipt),
                };
            }
        }
        Error::precheck(status, Some(self.transaction_id.clone()))
    }
}

/// Fetch the full record of a transaction once it has reached consensus.
#[derive(Debug, Clone, Default)]
pub struct TransactionRecordQuery {
    transaction_id: Option<TransactionId>,
    node_account_ids: Option<Vec<AccountId>>,
    include_children: bool,
    include_duplicates: bool,
    validate_status: bool,
    parent_trace: Option<TraceContext>,
}

impl TransactionRecordQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transaction_id(mut self, transaction_id: TransactionId) -> Self {
        self.transaction_id = Some(transaction_id);
        self
    }

    pub fn node_account_ids(mut self, ids: impl IntoIterator<Item = AccountId>) -> Self {
        self.node_account_ids = Some(ids.into_iter().collect());
        self
    }

    pub fn include_children(mut self, include: bool) -> Self {
        self.include_children = include;
        self
    }

    pub fn include_duplicates(mut self, include: bool) -> Self {
        self.include_duplicates = include;
        self
    }

    pub fn validate_status(mut self, validate: bool) -> Self {
        self.validate_status = validate;
        self
    }

    pub fn parent_trace(mut self, trace: TraceContext) -> Self {
        self.parent_trace = Some(trace);
        self
    }

    pub async fn execute(&self, client: &Client) -> Result<TransactionRecord> {
        self.execute_inner(client, None).await
    }

    pub async fn execute_with_timeout(&self, client: &Client, timeout: Duration) -> Result<TransactionRecord> {
        self.execute_inner(client, Some(timeout)).await
    }

    async fn execute_inner(&self, client: &Client, timeout: Option<Duration>) -> Result<TransactionRecord> {
        let transaction_id = self
            .transaction_id
            .as_ref()
            .ok_or_else(|| Error::illegal_state("record query needs a transaction id"))?;

        let record = execute::execute(
            client,
            &RecordRequest {
                query: self,
                transaction_id,
            },
            timeout,
        )
        .await?;

        check_receipt(&record.receipt, transaction_id, self.validate_status)?;
        Ok(record)
    }
}

struct RecordRequest<'a> {
    query: &'a TransactionRecordQuery,
    transaction_id: &'a TransactionId,
}

impl Execute for RecordRequest<'_> {
    type Output = TransactionRecord;

    fn operation(&self) -> Operation {
        Operation::GetTransactionRecord
    }

    fn trace_context(&self) -> TraceContext {
        continue_trace(self.query.parent_trace.as_ref(), self.operation())
    }

    fn node_account_ids(&self) -> Option<&[AccountId]> {
        self.query.node_account_ids.as_deref()
    }

    fn transaction_id(&self) -> Option<&TransactionId> {
        Some(self.transaction_id)
    }

    fn make_request(&self) -> Result<Vec<u8>> {
        wire::encode(&QueryRequest::TransactionRecord {
            transaction_id: self.transaction_id.clone(),
            include_children: self.query.include_children,
            include_duplicates: self.query.include_duplicates,
        })
    }

    fn classify(&self, policy: &StatusPolicy, status: Status, payload: &[u8]) -> StatusClass {
        if is_pending_precheck(status) {
            return StatusClass::RetryTransient;
        }
        if status != Status::Ok {
            return policy.classify(status);
        }
        match wire::decode::<TransactionRecord>(payload) {
            Ok(record) if record.receipt.is_pending() => StatusClass::RetryTransient,
            _ => StatusClass::Success,
        }
    }

    fn map_response(&self, _node: &AccountId, payload: Vec<u8>) -> Result<TransactionRecord> {
        wire::decode(&payload)
    }
}
