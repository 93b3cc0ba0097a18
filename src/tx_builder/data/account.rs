use serde::{Deserialize, Serialize};

use crate::crypto::Key;
use crate::entity::EvmAddress;
use crate::hbar::Hbar;
use crate::tx_builder::{Transaction, TransactionData, TransactionKind};

/// Create a new account, funded from the payer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountCreateData {
    pub key: Option<Key>,
    pub initial_balance: Hbar,
    pub receiver_signature_required: bool,
    pub account_memo: String,
    pub max_automatic_token_associations: i32,
    pub alias: Option<EvmAddress>,
}

impl TransactionData for AccountCreateData {
    fn kind(&self) -> TransactionKind {
        TransactionKind::AccountCreate
    }
}

impl Transaction<AccountCreateData> {
    /// Key that must sign for the new account.
    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.data_mut().key = Some(key.into());
        self
    }

    pub fn initial_balance(mut self, balance: Hbar) -> Self {
        self.data_mut().initial_balance = balance;
        self
    }

    pub fn receiver_signature_required(mut self, required: bool) -> Self {
        self.data_mut().receiver_signature_required = required;
        self
    }

    pub fn account_memo(mut self, memo: impl Into<String>) -> Self {
        self.data_mut().account_memo = memo.into();
        self
    }

    pub fn max_automatic_token_associations(mut self, max: i32) -> Self {
        self.data_mut().max_automatic_token_associations = max;
        self
    }

    pub fn alias(mut self, alias: EvmAddress) -> Self {
        self.data_mut().alias = Some(alias);
        self
    }
}
