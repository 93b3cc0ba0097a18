use serde::{Deserialize, Serialize};

use super::validate_id;
use crate::crypto::Key;
use crate::entity::{AccountId, LedgerId, ScheduleId};
use crate::error::{Error, Result};
use crate::hbar::Hbar;
use crate::timestamp::Timestamp;
use crate::tx_builder::{AnyTransactionData, Transaction, TransactionData, TransactionKind};

/// The inner transaction of a schedule, without id or node list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulableBody {
    pub data: Box<AnyTransactionData>,
    pub max_transaction_fee: Option<Hbar>,
    pub memo: String,
}

/// Create a schedule holding a transaction until enough keys have signed it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleCreateData {
    pub scheduled: Option<SchedulableBody>,
    /// Pays for the scheduled transaction; defaults to the schedule's payer.
    pub payer_account_id: Option<AccountId>,
    pub admin_key: Option<Key>,
    pub schedule_memo: String,
    pub expiration_time: Option<Timestamp>,
    /// Execute at expiration instead of as soon as signatures suffice.
    pub wait_for_expiry: bool,
}

impl ScheduleCreateData {
    pub fn scheduled_transaction(&self) -> Option<&AnyTransactionData> {
        self.scheduled.as_ref().map(|body| body.data.as_ref())
    }
}

impl TransactionData for ScheduleCreateData {
    fn kind(&self) -> TransactionKind {
        TransactionKind::ScheduleCreate
    }

    fn is_schedulable(&self) -> bool {
        false
    }

    fn validate(&self) -> Result<()> {
        if self.scheduled.is_none() {
            return Err(Error::illegal_state("schedule create has no scheduled transaction"));
        }
        Ok(())
    }

    fn validate_checksums(&self, ledger_id: &LedgerId) -> Result<()> {
        validate_id(self.payer_account_id.as_ref(), ledger_id)?;
        match &self.scheduled {
            Some(body) => body.data.validate_checksums(ledger_id),
            None => Ok(()),
        }
    }
}

impl Transaction<ScheduleCreateData> {
    pub fn scheduled_transaction<D: TransactionData>(mut self, transaction: Transaction<D>) -> Result<Self> {
        self.data_mut().scheduled = Some(transaction.into_schedulable_body()?);
        Ok(self)
    }

    pub fn payer_account_id(mut self, account_id: AccountId) -> Self {
        self.data_mut().payer_account_id = Some(account_id);
        self
    }

    pub fn admin_key(mut self, key: impl Into<Key>) -> Self {
        self.data_mut().admin_key = Some(key.into());
        self
    }

    pub fn schedule_memo(mut self, memo: impl Into<String>) -> Self {
        self.data_mut().schedule_memo = memo.into();
        self
    }

    pub fn expiration_time(mut self, expiration: Timestamp) -> Self {
        self.data_mut().expiration_time = Some(expiration);
        self
    }

    pub fn wait_for_expiry(mut self, wait: bool) -> Self {
        self.data_mut().wait_for_expiry = wait;
        self
    }
}

/// Add the transaction's signatures to an existing schedule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSignData {
    pub schedule_id: Option<ScheduleId>,
}

impl TransactionData for ScheduleSignData {
    fn kind(&self) -> TransactionKind {
        TransactionKind::ScheduleSign
    }

    fn is_schedulable(&self) -> bool {
        false
    }

    fn validate_checksums(&self, ledger_id: &LedgerId) -> Result<()> {
        validate_id(self.schedule_id.as_ref(), ledger_id)
    }
}

impl Transaction<ScheduleSignData> {
    pub fn schedule_id(mut self, schedule_id: ScheduleId) -> Self {
        self.data_mut().schedule_id = Some(schedule_id);
        self
    }
}

/// Delete a schedule; must be signed by its admin key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleDeleteData {
    pub schedule_id: Option<ScheduleId>,
}

impl TransactionData for ScheduleDeleteData {
    fn kind(&self) -> TransactionKind {
        TransactionKind::ScheduleDelete
    }

    fn validate_checksums(&self, ledger_id: &LedgerId) -> Result<()> {
        validate_id(self.schedule_id.as_ref(), ledger_id)
    }
}

impl Transaction<ScheduleDeleteData> {
    pub fn schedule_id(mut self, schedule_id: ScheduleId) -> Self {
        self.data_mut().schedule_id = Some(schedule_id);
        self
    }
}
