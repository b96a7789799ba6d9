//! Timestamp type used throughout the workspace.
//!
//! Timestamps are UTC instants. They serialize as RFC 3339 strings, the
//! format the certificate table stores, and convert to Unix seconds for the
//! contract.

use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// A UTC instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// The epoch (time zero).
    pub const EPOCH: Self = Self(DateTime::<Utc>::UNIX_EPOCH);

    /// From Unix seconds. Values past chrono's range clamp to its maximum.
    pub fn new(secs: u64) -> Self {
        let secs = i64::try_from(secs).unwrap_or(i64::MAX);
        Self(DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::<Utc>::MAX_UTC))
    }

    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Unix seconds. Instants before the epoch read as zero.
    pub fn as_secs(&self) -> u64 {
        u64::try_from(self.0.timestamp()).unwrap_or(0)
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    /// Calendar `(year, month)` in UTC, month in `1..=12`.
    pub fn year_month(&self) -> (i32, u32) {
        (self.0.year(), self.0.month())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

impl FromStr for Timestamp {
    type Err = TypesError;

    /// Accepts RFC 3339 with any offset.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DateTime::parse_from_rfc3339(s.trim())
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .map_err(|e| TypesError::InvalidTimestamp(format!("{s}: {e}")))
    }
}
