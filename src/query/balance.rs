use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::client::Client;
use crate::entity::{AccountId, TokenId};
use crate::error::{Error, Result};
use crate::execute::{self, Execute};
use crate::hbar::Hbar;
use crate::wire::{self, Operation, QueryRequest};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account_id: AccountId,
    pub hbars: Hbar,
    /// Fungible token balances in the token's smallest unit.
    pub tokens: HashMap<TokenId, u64>,
}

#[derive(Debug, Clone, Default)]
pub struct AccountBalanceQuery {
    account_id: Option<AccountId>,
    node_account_ids: Option<Vec<AccountId>>,
}

impl AccountBalanceQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account_id(mut self, account_id: AccountId) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn node_account_ids(mut self, ids: impl IntoIterator<Item = AccountId>) -> Self {
        self.node_account_ids = Some(ids.into_iter().collect());
        self
    }

    pub async fn execute(&self, client: &Client) -> Result<AccountBalance> {
        self.execute_inner(client, None).await
    }

    pub async fn execute_with_timeout(&self, client: &Client, timeout: Duration) -> Result<AccountBalance> {
        self.execute_inner(client, Some(timeout)).await
    }

    async fn execute_inner(&self, client: &Client, timeout: Option<Duration>) -> Result<AccountBalance> {
        let account_id = self
            .account_id
            .as_ref()
            .ok_or_else(|| Error::illegal_state("balance query needs an account id"))?;
        if client.settings().auto_validate_checksums {
            if let Some(ledger_id) = client.ledger_id() {
                account_id.validate_checksum(ledger_id)?;
            }
        }
        execute::execute(client, &BalanceRequest { query: self, account_id }, timeout).await
    }
}

struct BalanceRequest<'a> {
    query: &'a AccountBalanceQuery,
    account_id: &'a AccountId,
}

impl Execute for BalanceRequest<'_> {
    type Output = AccountBalance;

    fn operation(&self) -> Operation {
        Operation::GetAccountBalance
    }

    fn node_account_ids(&self) -> Option<&[AccountId]> {
        self.query.node_account_ids.as_deref()
    }

    fn make_request(&self) -> Result<Vec<u8>> {
        wire::encode(&QueryRequest::AccountBalance {
            account_id: self.account_id.clone(),
        })
    }

    fn map_response(&self, _node: &AccountId, payload: Vec<u8>) -> Result<AccountBalance> {
        wire::decode(&payload)
    }
}
