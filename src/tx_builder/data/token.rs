use serde::{Deserialize, Serialize};

use super::validate_id;
use crate::entity::{AccountId, LedgerId, TokenId};
use crate::error::Result;
use crate::tx_builder::{Transaction, TransactionData, TransactionKind};

/// Associate an account with tokens so it can hold them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenAssociateData {
    pub account_id: Option<AccountId>,
    pub token_ids: Vec<TokenId>,
}

impl TransactionData for TokenAssociateData {
    fn kind(&self) -> TransactionKind {
        TransactionKind::TokenAssociate
    }

    fn validate_checksums(&self, ledger_id: &LedgerId) -> Result<()> {
        validate_id(self.account_id.as_ref(), ledger_id)?;
        self.token_ids
            .iter()
            .try_for_each(|id| validate_id(Some(id), ledger_id))
    }
}

impl Transaction<TokenAssociateData> {
    pub fn account_id(mut self, account_id: AccountId) -> Self {
        self.data_mut().account_id = Some(account_id);
        self
    }

    pub fn token_ids(mut self, token_ids: impl IntoIterator<Item = TokenId>) -> Self {
        self.data_mut().token_ids = token_ids.into_iter().collect();
        self
    }
}
