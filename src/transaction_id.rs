//! Transaction identifiers
//!
//! A transaction id is the payer account plus the instant the transaction
//! becomes valid. The ledger uses it for duplicate detection, so two
//! transactions from the same payer must never share one.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::entity::AccountId;
use crate::error::{Error, Result};
use crate::timestamp::Timestamp;

/// Generated ids start this far in the past so small clock skew between
/// client and node doesn't trip INVALID_TRANSACTION_START.
const VALID_START_BACKDATE: Duration = Duration::from_secs(8);
const VALID_START_JITTER_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId {
    pub account_id: AccountId,
    pub valid_start: Timestamp,
    pub scheduled: bool,
    pub nonce: Option<i32>,
}

impl TransactionId {
    pub fn new(account_id: AccountId, valid_start: Timestamp) -> Self {
        Self {
            account_id,
            valid_start,
            scheduled: false,
            nonce: None,
        }
    }

    /// Fresh id for `account_id`, with a valid start a few seconds in the past.
    pub fn generate(account_id: AccountId) -> Self {
        let jitter = rand::thread_rng().gen_range(0..VALID_START_JITTER_MS);
        let backdate = VALID_START_BACKDATE + Duration::from_millis(jitter);
        // Random sub-millisecond nanos keep ids distinct within one millisecond.
        let nanos = rand::thread_rng().gen_range(0..1_000_000u64);
        Self::new(account_id, Timestamp::now().minus(backdate).plus_nanos(nanos))
    }

    pub fn with_scheduled(mut self, scheduled: bool) -> Self {
        self.scheduled = scheduled;
        self
    }

    pub fn with_nonce(mut self, nonce: i32) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Id of the `index`th chunk derived from this (initial) id.
    pub(crate) fn offset_nanos(&self, index: u64) -> Self {
        Self {
            valid_start: self.valid_start.plus_nanos(index),
            ..self.clone()
        }
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.account_id, self.valid_start)?;
        if self.scheduled {
            f.write_str("?scheduled")?;
        }
        if let Some(nonce) = self.nonce {
            write!(f, "/{nonce}")?;
        }
        Ok(())
    }
}

impl FromStr for TransactionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || {
            Error::Serialization(format!(
                "expected `shard.realm.num@seconds.nanos[?scheduled][/nonce]`, got `{s}`"
            ))
        };

        let (account, rest) = s.split_once('@').ok_or_else(invalid)?;
        let account_id: AccountId = account.parse()?;

        let (rest, nonce) = match rest.rsplit_once('/') {
            Some((rest, nonce)) => (rest, Some(nonce.parse::<i32>().map_err(|_| invalid())?)),
            None => (rest, None),
        };
        let (valid_start, scheduled) = match rest.strip_suffix("?scheduled") {
            Some(valid_start) => (valid_start, true),
            None => (rest, false),
        };

        Ok(Self {
            account_id,
            valid_start: valid_start.parse()?,
            scheduled,
            nonce,
        })
    }
}
