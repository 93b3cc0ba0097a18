use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::client::Client;
use crate::crypto::{Key, PublicKey};
use crate::entity::{AccountId, ScheduleId};
use crate::error::{Error, Result};
use crate::execute::{self, Execute};
use crate::timestamp::Timestamp;
use crate::transaction_id::TransactionId;
use crate::tx_builder::AnyTransactionData;
use crate::wire::{self, Operation, QueryRequest};

/// Current state of a schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleInfo {
    pub schedule_id: ScheduleId,
    pub creator_account_id: AccountId,
    pub payer_account_id: AccountId,
    /// Keys that have signed the scheduled transaction so far.
    pub signatories: Vec<PublicKey>,
    pub admin_key: Option<Key>,
    pub scheduled_transaction_id: TransactionId,
    pub scheduled_transaction: AnyTransactionData,
    pub memo: String,
    pub expiration_time: Option<Timestamp>,
    pub executed_at: Option<Timestamp>,
    pub deleted_at: Option<Timestamp>,
    pub wait_for_expiry: bool,
}

impl ScheduleInfo {
    pub fn is_executed(&self) -> bool {
        self.executed_at.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScheduleInfoQuery {
    schedule_id: Option<ScheduleId>,
    node_account_ids: Option<Vec<AccountId>>,
}

impl ScheduleInfoQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_id(mut self, schedule_id: ScheduleId) -> Self {
        self.schedule_id = Some(schedule_id);
        self
    }

    pub fn node_account_ids(mut self, ids: impl IntoIterator<Item = AccountId>) -> Self {
        self.node_account_ids = Some(ids.into_iter().collect());
        self
    }

    pub async fn execute(&self, client: &Client) -> Result<ScheduleInfo> {
        self.execute_inner(client, None).await
    }

    pub async fn execute_with_timeout(&self, client: &Client, timeout: Duration) -> Result<ScheduleInfo> {
        self.execute_inner(client, Some(timeout)).await
    }

    async fn execute_inner(&self, client: &Client, timeout: Option<Duration>) -> Result<ScheduleInfo> {
        let schedule_id = self
            .schedule_id
            .as_ref()
            .ok_or_else(|| Error::illegal_state("schedule info query needs a schedule id"))?;
        execute::execute(client, &ScheduleInfoRequest { query: self, schedule_id }, timeout).await
    }
}

struct ScheduleInfoRequest<'a> {
    query: &'a ScheduleInfoQuery,
    schedule_id: &'a ScheduleId,
}

impl Execute for ScheduleInfoRequest<'_> {
    type Output = ScheduleInfo;

    fn operation(&self) -> Operation {
        Operation::GetScheduleInfo
    }

    fn node_account_ids(&self) -> Option<&[AccountId]> {
        self.query.node_account_ids.as_deref()
    }

    fn make_request(&self) -> Result<Vec<u8>> {
        wire::encode(&QueryRequest::ScheduleInfo {
            schedule_id: self.schedule_id.clone(),
        })
    }

    fn map_response(&self, _node: &AccountId, payload: Vec<u8>) -> Result<ScheduleInfo> {
        wire::decode(&payload)
    }
}
