//! Error taxonomy for the whole SDK
//!
//! One enum covers local precondition failures (which never touch the
//! network), network rejections carrying the ledger's status code, and the
//! ambient failures of parsing, signing, transport and configuration.

use std::time::Duration;
use thiserror::Error;

use crate::node_manager::transport::TransportError;
use crate::receipt::TransactionReceipt;
use crate::status::Status;
use crate::transaction_id::TransactionId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    /// A node rejected the request before consensus.
    #[error("precheck failed with status {status}{}", fmt_tx_id(transaction_id))]
    PrecheckStatus {
        status: Status,
        transaction_id: Option<TransactionId>,
    },

    /// The transaction reached consensus with a failing status.
    #[error("receipt for transaction {transaction_id} contained error status {status}")]
    ReceiptStatus {
        status: Status,
        transaction_id: TransactionId,
        receipt: Box<TransactionReceipt>,
    },

    /// Attempt or time budget exhausted.
    #[error("gave up after {attempts} attempts in {elapsed:?}{}", fmt_last_error(last_error))]
    Timeout {
        attempts: u32,
        elapsed: Duration,
        last_error: Option<Box<Error>>,
    },

    #[error("message requires {required} chunks but max_chunks is {max}")]
    MaxChunksExceeded { required: usize, max: usize },

    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error("transaction is not signed: {0}")]
    NotSigned(String),

    #[error("checksum mismatch for {id}: present `{present}`, expected `{expected}`")]
    BadEntityId {
        id: String,
        present: String,
        expected: String,
    },

    #[error("failed to parse entity id: {0}")]
    EntityIdParse(String),

    #[error("failed to parse key: {0}")]
    KeyParse(String),

    #[error("signature error: {0}")]
    Signature(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

fn fmt_tx_id(id: &Option<TransactionId>) -> String {
    id.as_ref()
        .map(|id| format!(" for transaction {id}"))
        .unwrap_or_default()
}

fn fmt_last_error(err: &Option<Box<Error>>) -> String {
    err.as_ref()
        .map(|err| format!(" (last error: {err})"))
        .unwrap_or_default()
}

impl Error {
    /// Whether trying the same operation again could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(err) => err.is_retryable(),
            Self::PrecheckStatus { status, .. } => status.is_transient(),
            Self::Timeout { .. } => true,

            Self::ReceiptStatus { .. }
            | Self::MaxChunksExceeded { .. }
            | Self::IllegalState(_)
            | Self::NotSigned(_)
            | Self::BadEntityId { .. }
            | Self::EntityIdParse(_)
            | Self::KeyParse(_)
            | Self::Signature(_)
            | Self::Serialization(_)
            | Self::Configuration(_) => false,
        }
    }

    /// Label for metrics and logs.
    pub fn category(&self) -> &'static str {
        match self {
            Self::PrecheckStatus { .. } => "precheck",
            Self::ReceiptStatus { .. } => "receipt",
            Self::Timeout { .. } => "timeout",
            Self::MaxChunksExceeded { .. } => "chunking",
            Self::IllegalState(_) => "state",
            Self::NotSigned(_) => "unsigned",
            Self::BadEntityId { .. } | Self::EntityIdParse(_) => "entity_id",
            Self::KeyParse(_) | Self::Signature(_) => "crypto",
            Self::Transport(_) => "transport",
            Self::Serialization(_) => "serialization",
            Self::Configuration(_) => "config",
        }
    }

    /// Ledger status carried by the error, if any.
    pub fn status(&self) -> Option<Status> {
        match self {
            Self::PrecheckStatus { status, .. } | Self::ReceiptStatus { status, .. } => {
                Some(*status)
            }
            Self::Timeout {
                last_error: Some(err),
                ..
            } => err.status(),
            _ => None,
        }
    }
}

// Convenience constructors
impl Error {
    pub fn illegal_state(msg: impl Into<String>) -> Self {
        Self::IllegalState(msg.into())
    }

    pub fn not_signed(msg: impl Into<String>) -> Self {
        Self::NotSigned(msg.into())
    }

    pub fn precheck(status: Status, transaction_id: Option<TransactionId>) -> Self {
        Self::PrecheckStatus {
            status,
            transaction_id,
        }
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
