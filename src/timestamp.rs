//! Consensus-style timestamps (seconds + nanos since the Unix epoch)

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::Error;

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// A point in time with nanosecond precision.
///
/// This is the representation used on the wire for transaction valid-start
/// times, consensus timestamps and schedule expirations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: u32,
}

impl Timestamp {
    pub const fn new(seconds: i64, nanos: u32) -> Self {
        Self { seconds, nanos }
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        Utc::now().into()
    }

    /// Total nanoseconds since the epoch.
    pub fn as_nanos(&self) -> i128 {
        self.seconds as i128 * NANOS_PER_SECOND as i128 + self.nanos as i128
    }

    fn from_nanos(total: i128) -> Self {
        let seconds = total.div_euclid(NANOS_PER_SECOND as i128) as i64;
        let nanos = total.rem_euclid(NANOS_PER_SECOND as i128) as u32;
        Self { seconds, nanos }
    }

    pub fn plus_nanos(self, nanos: u64) -> Self {
        Self::from_nanos(self.as_nanos() + nanos as i128)
    }

    pub fn plus(self, duration: Duration) -> Self {
        Self::from_nanos(self.as_nanos() + duration.as_nanos() as i128)
    }

    pub fn minus(self, duration: Duration) -> Self {
        Self::from_nanos(self.as_nanos() - duration.as_nanos() as i128)
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.seconds, self.nanos).single()
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self {
            seconds: value.timestamp(),
            nanos: value.timestamp_subsec_nanos(),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanos)
    }
}

impl FromStr for Timestamp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::Serialization(format!("invalid timestamp `{s}`"));

        let (seconds, nanos) = s.split_once('.').ok_or_else(invalid)?;
        let seconds = seconds.parse::<i64>().map_err(|_| invalid())?;
        let nanos = nanos.parse::<u32>().map_err(|_| invalid())?;
        if nanos as u64 >= NANOS_PER_SECOND {
            return Err(invalid());
        }

        Ok(Self { seconds, nanos })
    }
}
