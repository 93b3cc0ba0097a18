use serde::{Deserialize, Serialize};

use super::validate_id;
use crate::entity::{AccountId, LedgerId, TokenId};
use crate::error::Result;
use crate::hbar::Hbar;
use crate::tx_builder::{Transaction, TransactionData, TransactionKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HbarTransfer {
    pub account_id: AccountId,
    pub amount: Hbar,
    pub is_approval: bool,
}

/// Fungible token movement, in the token's smallest unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTransfer {
    pub token_id: TokenId,
    pub account_id: AccountId,
    pub amount: i64,
    pub expected_decimals: Option<u32>,
    pub is_approval: bool,
}

/// Move hbar and fungible tokens between accounts. Each currency's amounts
/// must sum to zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferData {
    pub hbar_transfers: Vec<HbarTransfer>,
    pub token_transfers: Vec<TokenTransfer>,
}

impl TransactionData for TransferData {
    fn kind(&self) -> TransactionKind {
        TransactionKind::Transfer
    }

    fn validate_checksums(&self, ledger_id: &LedgerId) -> Result<()> {
        for transfer in &self.hbar_transfers {
            validate_id(Some(&transfer.account_id), ledger_id)?;
        }
        for transfer in &self.token_transfers {
            validate_id(Some(&transfer.token_id), ledger_id)?;
            validate_id(Some(&transfer.account_id), ledger_id)?;
        }
        Ok(())
    }
}

impl TransferData {
    fn add_hbar(&mut self, account_id: AccountId, amount: Hbar, is_approval: bool) {
        // Repeated entries for the same account collapse into one.
        if let Some(existing) = self
            .hbar_transfers
            .iter_mut()
            .find(|t| t.account_id == account_id && t.is_approval == is_approval)
        {
            existing.amount = existing.amount + amount;
            return;
        }
        self.hbar_transfers.push(HbarTransfer {
            account_id,
            amount,
            is_approval,
        });
    }

    fn add_token(
        &mut self,
        token_id: TokenId,
        account_id: AccountId,
        amount: i64,
        expected_decimals: Option<u32>,
        is_approval: bool,
    ) {
        if let Some(existing) = self
            .token_transfers
            .iter_mut()
            .find(|t| t.token_id == token_id && t.account_id == account_id && t.is_approval == is_approval)
        {
            existing.amount += amount;
            return;
        }
        self.token_transfers.push(TokenTransfer {
            token_id,
            account_id,
            amount,
            expected_decimals,
            is_approval,
        });
    }
}

impl Transaction<TransferData> {
    pub fn hbar_transfer(mut self, account_id: AccountId, amount: Hbar) -> Self {
        self.data_mut().add_hbar(account_id, amount, false);
        self
    }

    /// Debit an owner's account through a previously granted allowance.
    pub fn approved_hbar_transfer(mut self, owner_id: AccountId, amount: Hbar) -> Self {
        self.data_mut().add_hbar(owner_id, amount, true);
        self
    }

    pub fn token_transfer(mut self, token_id: TokenId, account_id: AccountId, amount: i64) -> Self {
        self.data_mut().add_token(token_id, account_id, amount, None, false);
        self
    }

    pub fn token_transfer_with_decimals(
        mut self,
        token_id: TokenId,
        account_id: AccountId,
        amount: i64,
        decimals: u32,
    ) -> Self {
        self.data_mut()
            .add_token(token_id, account_id, amount, Some(decimals), false);
        self
    }

    pub fn hbar_transfers(&self) -> &[HbarTransfer] {
        &self.data().hbar_transfers
    }

    pub fn token_transfers(&self) -> &[TokenTransfer] {
        &self.data().token_transfers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx_builder::TransferTransaction;

    #[test]
    fn test_transfers_to_same_account_collapse() {
        let tx = TransferTransaction::new()
            .hbar_transfer(AccountId::from_num(2), Hbar::new(-3))
            .hbar_transfer(AccountId::from_num(5), Hbar::new(3))
            .hbar_transfer(AccountId::from_num(2), Hbar::new(-1))
            .hbar_transfer(AccountId::from_num(5), Hbar::new(1));

        assert_eq!(tx.hbar_transfers().len(), 2);
        assert_eq!(tx.hbar_transfers()[0].amount, Hbar::new(-4));
    }

    #[test]
    fn test_token_transfers_keep_decimals() {
        let token = TokenId::from_num(900);
        let tx = TransferTransaction::new()
            .token_transfer_with_decimals(token.clone(), AccountId::from_num(2), -10, 2)
            .token_transfer(token, AccountId::from_num(7), 10);
        assert_eq!(tx.token_transfers()[0].expected_decimals, Some(2));
        assert_eq!(tx.token_transfers()[1].expected_decimals, None);
    }
}
