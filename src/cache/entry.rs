//! Cache Entry Module
//!
//! Defines the structure for individual cache entries and the units in which
//! their age can be reported.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

// == Cache Entry ==
/// A stored value together with its creation time.
///
/// Entries are never refreshed: the timestamp is fixed at creation and an
/// entry can only be replaced by deleting it and setting the key again.
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry<T> {
    /// Wall-clock creation time (serialized as Unix milliseconds)
    #[serde(with = "chrono::serde::ts_milliseconds")]
    timestamp: DateTime<Utc>,
    /// The stored value
    #[serde(rename = "data")]
    value: T,
    /// Monotonic creation instant, used for all age computations
    #[serde(skip)]
    created: Instant,
}

impl<T> CacheEntry<T> {
    // == Constructor ==
    /// Creates a new entry stamped with the current time.
    pub fn new(value: T) -> Self {
        Self {
            timestamp: Utc::now(),
            value,
            created: Instant::now(),
        }
    }

    /// Wall-clock creation time.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    // == Age ==
    /// Whole seconds elapsed since the entry was created.
    pub fn age_seconds(&self) -> u64 {
        self.created.elapsed().as_secs()
    }

    /// Whole `unit`s elapsed since the entry was created.
    pub fn age_in(&self, unit: TimeUnit) -> u64 {
        self.age_seconds() / unit.seconds()
    }
}

impl<T: PartialEq> PartialEq for CacheEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp && self.value == other.value
    }
}

// == Time Unit ==
/// Unit used when reporting entry ages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeUnit {
    #[default]
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Number of seconds in one unit.
    pub fn seconds(self) -> u64 {
        match self {
            TimeUnit::Seconds => 1,
            TimeUnit::Minutes => 60,
            TimeUnit::Hours => 60 * 60,
            TimeUnit::Days => 24 * 60 * 60,
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimeUnit::Seconds => "SECONDS",
            TimeUnit::Minutes => "MINUTES",
            TimeUnit::Hours => "HOURS",
            TimeUnit::Days => "DAYS",
        };
        f.write_str(name)
    }
}

impl FromStr for TimeUnit {
    type Err = String;

    /// Accepts singular or plural unit names in any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SECOND" | "SECONDS" => Ok(TimeUnit::Seconds),
            "MINUTE" | "MINUTES" => Ok(TimeUnit::Minutes),
            "HOUR" | "HOURS" => Ok(TimeUnit::Hours),
            "DAY" | "DAYS" => Ok(TimeUnit::Days),
            other => Err(format!("Unknown time unit: {}", other)),
        }
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
