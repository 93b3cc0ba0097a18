//! Operation-specific transaction payloads

mod account;
mod contract;
mod file;
mod schedule;
mod token;
mod topic;
mod transfer;

pub use account::AccountCreateData;
pub use contract::ContractExecuteData;
pub use file::{FileAppendData, FILE_APPEND_CHUNK_SIZE};
pub use schedule::{SchedulableBody, ScheduleCreateData, ScheduleDeleteData, ScheduleSignData};
pub use token::TokenAssociateData;
pub use topic::{TopicCreateData, TopicMessageSubmitData};
pub use transfer::{HbarTransfer, TokenTransfer, TransferData};

use crate::entity::{EntityId, LedgerId};
use crate::error::Result;

pub(crate) fn validate_id(id: Option<&EntityId>, ledger_id: &LedgerId) -> Result<()> {
    match id {
        Some(id) => id.validate_checksum(ledger_id),
        None => Ok(()),
    }
}
