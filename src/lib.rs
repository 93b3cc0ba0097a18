//! Ledger SDK core
//!
//! Builds, signs and submits transactions to a hashgraph-style ledger and
//! resolves their receipts and records. Requests go through one execution
//! loop that rotates across nodes, backs off unhealthy ones and retries
//! transient statuses until the attempt budget or deadline runs out.
//!
//! The network itself sits behind the [`Transport`] trait; the crate ships
//! no wire client of its own. Enable the `test_utils` feature for an
//! in-memory ledger implementing it.

pub mod client;
pub mod config;
pub mod crypto;
pub mod entity;
pub mod error;
mod execute;
pub mod hbar;
pub mod metrics;
pub mod network;
pub mod node_manager;
pub mod observability;
pub mod query;
pub mod receipt;
pub mod status;
pub mod structured_logging;
pub mod timestamp;
pub mod transaction_id;
pub mod tx_builder;
pub mod wire;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

#[cfg(test)]
mod tests;

pub use client::{Client, ClientBuilder, Operator};
pub use config::{ClientConfig, ClientSettings, ConfigError};
pub use crypto::{Key, KeyAlgorithm, KeyList, PrivateKey, PublicKey, SignatureMap, Signer};
pub use entity::{AccountId, ContractId, EntityId, FileId, LedgerId, ScheduleId, TokenId, TopicId};
pub use error::{Error, Result};
pub use execute::{BackoffPolicy, RetryOverrides};
pub use hbar::Hbar;
pub use network::Network;
pub use node_manager::{Transport, TransportError};
pub use query::{
    AccountBalance, AccountBalanceQuery, ScheduleInfo, ScheduleInfoQuery, SubscriptionHandle, TopicMessage,
    TopicMessageQuery,
};
pub use receipt::{TransactionReceipt, TransactionReceiptQuery, TransactionRecord, TransactionRecordQuery};
pub use status::Status;
pub use timestamp::Timestamp;
pub use transaction_id::TransactionId;
pub use tx_builder::{
    AccountCreateTransaction, AnyTransaction, ContractExecuteTransaction, FileAppendTransaction,
    FrozenTransaction, ScheduleCreateTransaction, ScheduleDeleteTransaction, ScheduleSignTransaction,
    TokenAssociateTransaction, TopicCreateTransaction, TopicMessageSubmitTransaction, Transaction,
    TransactionResponse, TransferTransaction,
};
