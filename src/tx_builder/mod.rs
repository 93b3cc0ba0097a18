//! Transaction builder
//!
//! A transaction moves through two stages:
//!
//! - **Draft** (`Transaction<D>`): operation fields and options are set with
//!   by-value setters.
//! - **Frozen** (`FrozenTransaction<D>`): node list, transaction id and body
//!   bytes are fixed. Only signatures can still be added, and they only
//!   accumulate.
//!
//! Freezing consumes the draft, so setters after freeze don't type-check.
//!
//! ## Usage
//!
//! ```rust,no_run
//! # use ledger_sdk::{Client, Hbar, PrivateKey, AccountCreateTransaction};
//! # async fn example(client: &Client) -> ledger_sdk::Result<()> {
//! let key = PrivateKey::generate_ed25519();
//! let receipt = AccountCreateTransaction::new()
//!     .key(key.public_key())
//!     .initial_balance(Hbar::new(5))
//!     .freeze_with(client)?
//!     .execute(client)
//!     .await?
//!     .get_receipt(client)
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! Large topic messages and file appends are split into chunks at freeze
//! time; each chunk is its own transaction with consecutive valid-start
//! nanoseconds.

mod any;
mod chunked;
pub mod data;
mod frozen;
mod response;
mod transaction;

pub use any::{AnyTransaction, AnyTransactionData, AnyConversion};
pub use chunked::{ChunkData, ChunkInfo, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_CHUNKS};
pub use data::*;
pub use frozen::FrozenTransaction;
pub use response::TransactionResponse;
pub use transaction::Transaction;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::entity::LedgerId;
use crate::error::{Error, Result};

pub type AccountCreateTransaction = Transaction<AccountCreateData>;
pub type TransferTransaction = Transaction<TransferData>;
pub type TokenAssociateTransaction = Transaction<TokenAssociateData>;
pub type ContractExecuteTransaction = Transaction<ContractExecuteData>;
pub type TopicCreateTransaction = Transaction<TopicCreateData>;
pub type TopicMessageSubmitTransaction = Transaction<TopicMessageSubmitData>;
pub type FileAppendTransaction = Transaction<FileAppendData>;
pub type ScheduleCreateTransaction = Transaction<ScheduleCreateData>;
pub type ScheduleSignTransaction = Transaction<ScheduleSignData>;
pub type ScheduleDeleteTransaction = Transaction<ScheduleDeleteData>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    AccountCreate,
    Transfer,
    TokenAssociate,
    ContractExecute,
    TopicCreate,
    TopicMessageSubmit,
    FileAppend,
    ScheduleCreate,
    ScheduleSign,
    ScheduleDelete,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Operation-specific payload of a transaction.
pub trait TransactionData: Clone + fmt::Debug + Send + Sync + 'static + AnyConversion {
    fn kind(&self) -> TransactionKind;

    /// Payload split across chunks, for chunked operations.
    fn chunk_data(&self) -> Option<&ChunkData> {
        None
    }

    fn chunk_data_mut(&mut self) -> Option<&mut ChunkData> {
        None
    }

    /// Whether the operation may be wrapped in a schedule.
    fn is_schedulable(&self) -> bool {
        true
    }

    /// Local checks run at freeze time.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Check every entity id checksum against `ledger_id`.
    fn validate_checksums(&self, _ledger_id: &LedgerId) -> Result<()> {
        Ok(())
    }
}

pub(crate) fn kind_mismatch(expected: &str, found: TransactionKind) -> Error {
    Error::IllegalState(format!("expected a {expected} transaction, found {found}"))
}
