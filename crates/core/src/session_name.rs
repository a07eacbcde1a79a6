//! Calendar-day scoped session identities of the form `YYYY-MM-DD_N`.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionNameError {
    #[error("session name is missing the `_N` counter: {0:?}")]
    MissingCounter(String),

    #[error("session name has an invalid date: {0:?}")]
    InvalidDate(String),

    #[error("session name has an invalid counter: {0:?}")]
    InvalidCounter(String),
}

/// A session identity: the day it belongs to plus a 1-based counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionName {
    date: NaiveDate,
    counter: u32,
}

impl SessionName {
    /// First session of `date`.
    #[must_use]
    pub fn first_of(date: NaiveDate) -> Self {
        Self { date, counter: 1 }
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    #[must_use]
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// The session that follows this one on `today`.
    #[must_use]
    pub fn successor(&self, today: NaiveDate) -> Self {
        if self.date == today {
            Self {
                date: today,
                counter: self.counter.saturating_add(1),
            }
        } else {
            Self::first_of(today)
        }
    }
}

impl fmt::Display for SessionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.date.format(DATE_FORMAT), self.counter)
    }
}

impl FromStr for SessionName {
    type Err = SessionNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (date, counter) = s
            .rsplit_once('_')
            .ok_or_else(|| SessionNameError::MissingCounter(s.to_owned()))?;
        let date = NaiveDate::parse_from_str(date, DATE_FORMAT)
            .map_err(|_| SessionNameError::InvalidDate(s.to_owned()))?;
        let counter = counter
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| SessionNameError::InvalidCounter(s.to_owned()))?;
        Ok(Self { date, counter })
    }
}

impl Serialize for SessionName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SessionName {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Compute the session name that follows `previous` on `today`.
///
/// An absent or unparseable previous name starts the day over at `_1`, as
/// does a name from another day.
#[must_use]
pub fn next_session_name(previous: Option<&str>, today: NaiveDate) -> SessionName {
    previous
        .and_then(|raw| raw.trim().parse::<SessionName>().ok())
        .map_or_else(|| SessionName::first_of(today), |prev| prev.successor(today))
}

/// Name of the session an attempt belongs to, given the stored value.
///
/// The stored name is used as-is when it parses; otherwise the day's first
/// session is assumed.
#[must_use]
pub fn current_session_name(stored: Option<&str>, today: NaiveDate) -> SessionName {
    stored
        .and_then(|raw| raw.trim().parse::<SessionName>().ok())
        .unwrap_or_else(|| SessionName::first_of(today))
}
