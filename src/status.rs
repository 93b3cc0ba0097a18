//! Ledger response codes and their retry classification
//!
//! `Status` is closed: codes the SDK doesn't know decode to a serialization
//! error instead of being passed through. Which statuses are retried, and
//! how, is held in a `StatusPolicy` so deployments can tune it from config.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::{Error, Result};

macro_rules! statuses {
    ($($variant:ident = $code:literal => $name:literal,)*) => {
        /// Response code returned by a node at precheck or in a receipt.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum Status {
            $($variant,)*
        }

        impl Status {
            /// Numeric wire code.
            pub const fn code(self) -> i32 {
                match self {
                    $(Self::$variant => $code,)*
                }
            }

            pub fn from_code(code: i32) -> Result<Self> {
                match code {
                    $($code => Ok(Self::$variant),)*
                    other => Err(Error::Serialization(format!("unknown status code {other}"))),
                }
            }

            pub const fn as_str_name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)*
                }
            }
        }
    };
}

statuses! {
    Ok = 0 => "OK",
    InvalidTransaction = 1 => "INVALID_TRANSACTION",
    PayerAccountNotFound = 2 => "PAYER_ACCOUNT_NOT_FOUND",
    InvalidNodeAccount = 3 => "INVALID_NODE_ACCOUNT",
    TransactionExpired = 4 => "TRANSACTION_EXPIRED",
    InvalidTransactionStart = 5 => "INVALID_TRANSACTION_START",
    InvalidTransactionDuration = 6 => "INVALID_TRANSACTION_DURATION",
    InvalidSignature = 7 => "INVALID_SIGNATURE",
    MemoTooLong = 8 => "MEMO_TOO_LONG",
    InsufficientTxFee = 9 => "INSUFFICIENT_TX_FEE",
    InsufficientPayerBalance = 10 => "INSUFFICIENT_PAYER_BALANCE",
    DuplicateTransaction = 11 => "DUPLICATE_TRANSACTION",
    Busy = 12 => "BUSY",
    NotSupported = 13 => "NOT_SUPPORTED",
    InvalidFileId = 14 => "INVALID_FILE_ID",
    InvalidAccountId = 15 => "INVALID_ACCOUNT_ID",
    InvalidContractId = 16 => "INVALID_CONTRACT_ID",
    ReceiptNotFound = 18 => "RECEIPT_NOT_FOUND",
    RecordNotFound = 19 => "RECORD_NOT_FOUND",
    Unknown = 21 => "UNKNOWN",
    Success = 22 => "SUCCESS",
    FailInvalid = 23 => "FAIL_INVALID",
    InsufficientAccountBalance = 28 => "INSUFFICIENT_ACCOUNT_BALANCE",
    ContractRevertExecuted = 33 => "CONTRACT_REVERT_EXECUTED",
    InvalidPayerSignature = 43 => "INVALID_PAYER_SIGNATURE",
    KeyNotProvided = 44 => "KEY_NOT_PROVIDED",
    InvalidAccountAmounts = 48 => "INVALID_ACCOUNT_AMOUNTS",
    TransactionOversize = 64 => "TRANSACTION_OVERSIZE",
    PlatformNotActive = 67 => "PLATFORM_NOT_ACTIVE",
    PlatformTransactionNotCreated = 69 => "PLATFORM_TRANSACTION_NOT_CREATED",
    InvalidTopicId = 150 => "INVALID_TOPIC_ID",
    InvalidTokenId = 167 => "INVALID_TOKEN_ID",
    InsufficientTokenBalance = 178 => "INSUFFICIENT_TOKEN_BALANCE",
    TokenNotAssociatedToAccount = 184 => "TOKEN_NOT_ASSOCIATED_TO_ACCOUNT",
    TokenAlreadyAssociatedToAccount = 194 => "TOKEN_ALREADY_ASSOCIATED_TO_ACCOUNT",
    InvalidScheduleId = 201 => "INVALID_SCHEDULE_ID",
    ScheduleIsImmutable = 202 => "SCHEDULE_IS_IMMUTABLE",
    NoNewValidSignatures = 205 => "NO_NEW_VALID_SIGNATURES",
    SomeSignaturesWereInvalid = 208 => "SOME_SIGNATURES_WERE_INVALID",
    IdenticalScheduleAlreadyCreated = 210 => "IDENTICAL_SCHEDULE_ALREADY_CREATED",
    ScheduleAlreadyDeleted = 212 => "SCHEDULE_ALREADY_DELETED",
    ScheduleAlreadyExecuted = 213 => "SCHEDULE_ALREADY_EXECUTED",
    SpenderDoesNotHaveAllowance = 292 => "SPENDER_DOES_NOT_HAVE_ALLOWANCE",
    AmountExceedsAllowance = 294 => "AMOUNT_EXCEEDS_ALLOWANCE",
}

impl Status {
    /// Retryable under the default policy, on any node.
    pub fn is_transient(self) -> bool {
        StatusPolicy::default().classify(self) != StatusClass::Reject
            && self != Status::Ok
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str_name())
    }
}

/// What the execution engine does with a precheck status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    /// Back the node off and try the next one.
    RetryNode,
    /// Wait, then try again.
    RetryTransient,
    Reject,
}

/// Classification table for precheck statuses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPolicy {
    #[serde(default = "default_node_retryable")]
    pub node_retryable: HashSet<Status>,
    #[serde(default = "default_transient")]
    pub transient: HashSet<Status>,
}

fn default_node_retryable() -> HashSet<Status> {
    [Status::Busy, Status::PlatformTransactionNotCreated]
        .into_iter()
        .collect()
}

fn default_transient() -> HashSet<Status> {
    [Status::PlatformNotActive].into_iter().collect()
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self {
            node_retryable: default_node_retryable(),
            transient: default_transient(),
        }
    }
}

impl StatusPolicy {
    pub fn classify(&self, status: Status) -> StatusClass {
        if status == Status::Ok {
            StatusClass::Success
        } else if self.node_retryable.contains(&status) {
            StatusClass::RetryNode
        } else if self.transient.contains(&status) {
            StatusClass::RetryTransient
        } else {
            StatusClass::Reject
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trip() {
        for status in [Status::Ok, Status::Busy, Status::ScheduleAlreadyExecuted] {
            assert_eq!(Status::from_code(status.code()).unwrap(), status);
        }
        assert!(matches!(Status::from_code(9999), Err(Error::Serialization(_))));
    }

    #[test]
    fn test_default_classification() {
        let policy = StatusPolicy::default();
        assert_eq!(policy.classify(Status::Ok), StatusClass::Success);
        assert_eq!(policy.classify(Status::Busy), StatusClass::RetryNode);
        assert_eq!(
            policy.classify(Status::PlatformTransactionNotCreated),
            StatusClass::RetryNode
        );
        assert_eq!(policy.classify(Status::PlatformNotActive), StatusClass::RetryTransient);
        assert_eq!(policy.classify(Status::DuplicateTransaction), StatusClass::Reject);
        assert!(Status::Busy.is_transient());
        assert!(!Status::InvalidSignature.is_transient());
    }

    #[test]
    fn test_policy_from_toml() {
        let policy: StatusPolicy = toml::from_str(r#"transient = ["PLATFORM_NOT_ACTIVE", "UNKNOWN"]"#).unwrap();
        assert!(policy.node_retryable.contains(&Status::Busy));
        assert_eq!(policy.classify(Status::Unknown), StatusClass::RetryTransient);
    }

    #[test]
    fn test_display_uses_wire_name() {
        assert_eq!(Status::InsufficientTxFee.to_string(), "INSUFFICIENT_TX_FEE");
    }
}
