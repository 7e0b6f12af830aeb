//! Channel and source bit rates.

use crate::Time;
use std::fmt::{self, Display};
use std::str::FromStr;
use thiserror::Error as ThisError;

/// A bit rate, stored as bits per second.
///
/// Rates come out of the configuration file in strings like `"100Mbps"` or
/// `"1000Gbps"`; both the `bps` and `b/s` suffix spellings are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataRate(u64);

impl DataRate {
    pub const fn from_bits_per_sec(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits_per_sec(self) -> u64 {
        self.0
    }

    /// The time it takes to move `bits` at this rate, rounded to the nearest
    /// nanosecond.
    pub fn interval_for_bits(self, bits: u64) -> Time {
        debug_assert!(self.0 > 0);
        let nanos = (bits as u128 * 1_000_000_000 + self.0 as u128 / 2) / self.0 as u128;
        Time::from_nanos(nanos as u64)
    }
}

impl Display for DataRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}bps", self.0)
    }
}

impl FromStr for DataRate {
    type Err = ParseDataRateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let lower = s.to_ascii_lowercase();
        let (digits_len, multiplier) = SUFFIXES
            .iter()
            .find_map(|&(suffix, multiplier)| {
                lower
                    .strip_suffix(suffix)
                    .map(|head| (head.len(), multiplier))
            })
            .ok_or_else(|| ParseDataRateError::MissingUnit(s.to_string()))?;
        let value: f64 = s[..digits_len]
            .trim()
            .parse()
            .map_err(|_| ParseDataRateError::BadNumber(s.to_string()))?;
        if value < 0.0 {
            return Err(ParseDataRateError::Negative(s.to_string()));
        }
        let bits = (value * multiplier).round() as u64;
        if bits == 0 {
            return Err(ParseDataRateError::Zero(s.to_string()));
        }
        Ok(Self(bits))
    }
}

/// Longest suffixes first so `"bps"` does not shadow `"Mbps"`.
const SUFFIXES: &[(&str, f64)] = &[
    ("tbps", 1e12),
    ("gbps", 1e9),
    ("mbps", 1e6),
    ("kbps", 1e3),
    ("tb/s", 1e12),
    ("gb/s", 1e9),
    ("mb/s", 1e6),
    ("kb/s", 1e3),
    ("bps", 1.0),
    ("b/s", 1.0),
];

#[derive(Debug, ThisError, Clone, PartialEq, Eq)]
pub enum ParseDataRateError {
    #[error("data rate {0:?} is missing a unit (bps, Kbps, Mbps, Gbps, or Tbps)")]
    MissingUnit(String),
    #[error("data rate {0:?} is not a number")]
    BadNumber(String),
    #[error("data rate {0:?} is negative")]
    Negative(String),
    #[error("data rate {0:?} is zero")]
    Zero(String),
}
