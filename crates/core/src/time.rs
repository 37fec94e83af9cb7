//! Unit-tagged duration value
//!
//! A [`Time`] keeps the value and unit it was configured with, but compares,
//! orders and hashes by its value normalized to milliseconds:
//!
//! ```
//! use beanstore_core::{Time, TimeUnit};
//!
//! assert_eq!(Time::new(1000, TimeUnit::Milliseconds), Time::new(1, TimeUnit::Seconds));
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::time::Duration;

use crate::error::CoreError;

/// Time units understood by [`Time`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    /// Nanoseconds
    Nanoseconds,
    /// Microseconds
    Microseconds,
    /// Milliseconds (the canonical unit)
    Milliseconds,
    /// Seconds
    Seconds,
    /// Minutes
    Minutes,
    /// Hours
    Hours,
    /// Days
    Days,
}

impl TimeUnit {
    /// Convert `value` in this unit to whole milliseconds (truncating, saturating)
    pub const fn to_millis(self, value: u64) -> u64 {
        match self {
            TimeUnit::Nanoseconds => value / 1_000_000,
            TimeUnit::Microseconds => value / 1_000,
            TimeUnit::Milliseconds => value,
            TimeUnit::Seconds => value.saturating_mul(1_000),
            TimeUnit::Minutes => value.saturating_mul(60_000),
            TimeUnit::Hours => value.saturating_mul(3_600_000),
            TimeUnit::Days => value.saturating_mul(86_400_000),
        }
    }

    /// Short suffix used by `Display`/`FromStr`
    pub const fn suffix(self) -> &'static str {
        match self {
            TimeUnit::Nanoseconds => "ns",
            TimeUnit::Microseconds => "us",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "m",
            TimeUnit::Hours => "h",
            TimeUnit::Days => "d",
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        Some(match suffix {
            "ns" => TimeUnit::Nanoseconds,
            "us" => TimeUnit::Microseconds,
            "ms" => TimeUnit::Milliseconds,
            "s" => TimeUnit::Seconds,
            "m" => TimeUnit::Minutes,
            "h" => TimeUnit::Hours,
            "d" => TimeUnit::Days,
            _ => return None,
        })
    }
}

/// Immutable duration with an explicit unit
///
/// ## Invariants
///
/// - Equality, ordering and hashing use [`Time::as_millis`], so two values with
///   different raw units but the same normalized value are equal
/// - Never mutated after construction
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Time {
    value: u64,
    unit: TimeUnit,
}

impl Time {
    /// Create a time value
    pub const fn new(value: u64, unit: TimeUnit) -> Self {
        Time { value, unit }
    }

    /// Shorthand for a millisecond value
    pub const fn millis(value: u64) -> Self {
        Time::new(value, TimeUnit::Milliseconds)
    }

    /// Shorthand for a second value
    pub const fn seconds(value: u64) -> Self {
        Time::new(value, TimeUnit::Seconds)
    }

    /// Shorthand for a minute value
    pub const fn minutes(value: u64) -> Self {
        Time::new(value, TimeUnit::Minutes)
    }

    /// Raw value as configured
    pub const fn value(&self) -> u64 {
        self.value
    }

    /// Unit as configured
    pub const fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// Value normalized to milliseconds
    pub const fn as_millis(&self) -> u64 {
        self.unit.to_millis(self.value)
    }

    /// Whether the normalized value is zero
    pub const fn is_zero(&self) -> bool {
        self.as_millis() == 0
    }

    /// Convert to a std Duration (millisecond precision)
    pub fn to_duration(&self) -> Duration {
        Duration::from_millis(self.as_millis())
    }
}

impl PartialEq for Time {
    fn eq(&self, other: &Self) -> bool {
        self.as_millis() == other.as_millis()
    }
}

impl Eq for Time {}

impl Hash for Time {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_millis().hash(state);
    }
}

impl PartialOrd for Time {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Time {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_millis().cmp(&other.as_millis())
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.suffix())
    }
}

impl FromStr for Time {
    type Err = CoreError;

    /// Parse `"<value><suffix>"`, e.g. `"30s"`, `"500ms"`, `"5m"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| CoreError::InvalidTime(format!("missing unit in '{}'", s)))?;
        let (digits, suffix) = s.split_at(split);
        let value = digits
            .parse::<u64>()
            .map_err(|e| CoreError::InvalidTime(format!("invalid value in '{}': {}", s, e)))?;
        let unit = TimeUnit::from_suffix(suffix.trim())
            .ok_or_else(|| CoreError::InvalidTime(format!("unknown unit '{}'", suffix)))?;
        Ok(Time::new(value, unit))
    }
}

impl From<Duration> for Time {
    fn from(duration: Duration) -> Self {
        Time::millis(duration.as_millis().min(u64::MAX as u128) as u64)
    }
}
