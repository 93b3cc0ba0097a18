//! Type-erased transactions, used for serialization and scheduling

use serde::{Deserialize, Serialize};

use super::data::*;
use super::frozen::FrozenParts;
use super::{kind_mismatch, ChunkData, FrozenTransaction, Transaction, TransactionData, TransactionKind};
use crate::entity::LedgerId;
use crate::error::Result;
use crate::wire;

/// Conversion to and from the type-erased payload.
pub trait AnyConversion: Sized {
    fn into_any(self) -> AnyTransactionData;

    fn from_any(data: AnyTransactionData) -> Result<Self>;
}

macro_rules! any_transaction_data {
    ($($variant:ident($data:ident),)*) => {
        /// Payload of any supported operation.
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub enum AnyTransactionData {
            $($variant($data),)*
        }

        impl TransactionData for AnyTransactionData {
            fn kind(&self) -> TransactionKind {
                match self {
                    $(Self::$variant(data) => data.kind(),)*
                }
            }

            fn chunk_data(&self) -> Option<&ChunkData> {
                match self {
                    $(Self::$variant(data) => data.chunk_data(),)*
                }
            }

            fn chunk_data_mut(&mut self) -> Option<&mut ChunkData> {
                match self {
                    $(Self::$variant(data) => data.chunk_data_mut(),)*
                }
            }

            fn is_schedulable(&self) -> bool {
                match self {
                    $(Self::$variant(data) => data.is_schedulable(),)*
                }
            }

            fn validate(&self) -> Result<()> {
                match self {
                    $(Self::$variant(data) => data.validate(),)*
                }
            }

            fn validate_checksums(&self, ledger_id: &LedgerId) -> Result<()> {
                match self {
                    $(Self::$variant(data) => data.validate_checksums(ledger_id),)*
                }
            }
        }

        impl AnyConversion for AnyTransactionData {
            fn into_any(self) -> AnyTransactionData {
                self
            }

            fn from_any(data: AnyTransactionData) -> Result<Self> {
                Ok(data)
            }
        }

        $(
            impl AnyConversion for $data {
                fn into_any(self) -> AnyTransactionData {
                    AnyTransactionData::$variant(self)
                }

                fn from_any(data: AnyTransactionData) -> Result<Self> {
                    match data {
                        AnyTransactionData::$variant(data) => Ok(data),
                        #[allow(unreachable_patterns)]
                        other => Err(kind_mismatch(stringify!($variant), other.kind())),
                    }
                }
            }

            impl From<$data> for AnyTransactionData {
                fn from(data: $data) -> Self {
                    AnyTransactionData::$variant(data)
                }
            }
        )*
    };
}

any_transaction_data! {
    AccountCreate(AccountCreateData),
    Transfer(TransferData),
    TokenAssociate(TokenAssociateData),
    ContractExecute(ContractExecuteData),
    TopicCreate(TopicCreateData),
    TopicMessageSubmit(TopicMessageSubmitData),
    FileAppend(FileAppendData),
    ScheduleCreate(ScheduleCreateData),
    ScheduleSign(ScheduleSignData),
    ScheduleDelete(ScheduleDeleteData),
}

/// On-the-wire form of a transaction at either stage.
#[derive(Serialize, Deserialize)]
pub(crate) struct SerializedTransaction {
    pub draft: Transaction<AnyTransactionData>,
    pub frozen: Option<FrozenParts>,
}

impl SerializedTransaction {
    pub(crate) fn decode(bytes: &[u8]) -> Result<Self> {
        wire::decode(bytes)
    }
}

/// A transaction of unknown kind and stage, as recovered from bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyTransaction {
    Draft(Transaction<AnyTransactionData>),
    Frozen(FrozenTransaction<AnyTransactionData>),
}

impl AnyTransaction {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let serialized = SerializedTransaction::decode(bytes)?;
        Ok(match serialized.frozen {
            None => Self::Draft(serialized.draft),
            Some(parts) => Self::Frozen(FrozenTransaction::from_parts(serialized.draft, parts)?),
        })
    }

    pub fn kind(&self) -> TransactionKind {
        match self {
            Self::Draft(tx) => tx.data().kind(),
            Self::Frozen(tx) => tx.data().kind(),
        }
    }

    pub fn is_frozen(&self) -> bool {
        matches!(self, Self::Frozen(_))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Self::Draft(tx) => tx.to_bytes(),
            Self::Frozen(tx) => tx.to_bytes(),
        }
    }

    /// Recover the typed draft; fails on kind mismatch or a frozen transaction.
    pub fn into_draft<D: TransactionData>(self) -> Result<Transaction<D>> {
        match self {
            Self::Draft(tx) => tx.downcast(),
            Self::Frozen(_) => Err(crate::error::Error::IllegalState(
                "transaction is frozen".to_string(),
            )),
        }
    }

    /// Recover the typed frozen transaction; fails on kind mismatch or a draft.
    pub fn into_frozen<D: TransactionData>(self) -> Result<FrozenTransaction<D>> {
        match self {
            Self::Frozen(tx) => tx.downcast(),
            Self::Draft(_) => Err(crate::error::Error::IllegalState(
                "transaction is not frozen".to_string(),
            )),
        }
    }
}
