use serde::{Deserialize, Serialize};

use super::validate_id;
use crate::entity::{ContractId, LedgerId};
use crate::error::Result;
use crate::hbar::Hbar;
use crate::tx_builder::{Transaction, TransactionData, TransactionKind};

/// Call a smart contract function.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractExecuteData {
    pub contract_id: Option<ContractId>,
    pub gas: u64,
    pub payable_amount: Hbar,
    /// ABI-encoded selector and arguments.
    pub function_parameters: Vec<u8>,
}

impl TransactionData for ContractExecuteData {
    fn kind(&self) -> TransactionKind {
        TransactionKind::ContractExecute
    }

    fn validate_checksums(&self, ledger_id: &LedgerId) -> Result<()> {
        validate_id(self.contract_id.as_ref(), ledger_id)
    }
}

impl Transaction<ContractExecuteData> {
    pub fn contract_id(mut self, contract_id: ContractId) -> Self {
        self.data_mut().contract_id = Some(contract_id);
        self
    }

    pub fn gas(mut self, gas: u64) -> Self {
        self.data_mut().gas = gas;
        self
    }

    pub fn payable_amount(mut self, amount: Hbar) -> Self {
        self.data_mut().payable_amount = amount;
        self
    }

    pub fn function_parameters(mut self, parameters: Vec<u8>) -> Self {
        self.data_mut().function_parameters = parameters;
        self
    }
}
