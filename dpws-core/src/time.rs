//! Virtual time for the discrete-event kernel.

use std::fmt::{self, Display};
use std::ops::{Add, AddAssign, Sub};
use std::str::FromStr;
use thiserror::Error as ThisError;

/// A point in virtual time, or a span of it, in nanoseconds.
///
/// All event timings in the kernel are integer nanoseconds so that schedule
/// arithmetic is exact and runs with the same configuration produce the same
/// event order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Time(u64);

impl Time {
    /// The start of the simulation.
    pub const ZERO: Self = Self(0);

    /// The largest representable time.
    pub const MAX: Self = Self(u64::MAX);

    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    pub const fn from_micros(micros: u64) -> Self {
        Self(micros * 1_000)
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self(millis * 1_000_000)
    }

    pub const fn from_secs(secs: u64) -> Self {
        Self(secs * 1_000_000_000)
    }

    /// Converts a non-negative fractional second count, rounding to the
    /// nearest nanosecond. Negative inputs clamp to zero.
    pub fn from_secs_f64(secs: f64) -> Self {
        if secs <= 0.0 {
            Self::ZERO
        } else {
            Self((secs * 1e9).round() as u64)
        }
    }

    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1e9
    }

    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Scales this span by a non-negative factor, rounding to the nearest
    /// nanosecond. Used for the per-packet send-gap fluctuation.
    pub fn mul_f64(self, factor: f64) -> Self {
        Self::from_secs_f64(self.as_secs_f64() * factor)
    }
}

impl Add for Time {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self(self.0 + other.0)
    }
}

impl AddAssign for Time {
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Time {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self(self.0 - other.0)
    }
}

impl Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.as_secs_f64())
    }
}

impl FromStr for Time {
    type Err = ParseTimeError;

    /// Parses a duration with one of the `ns`, `us`, `ms`, or `s` suffixes,
    /// e.g. `"5ms"` or `"1.5s"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (value, scale) = if let Some(v) = s.strip_suffix("ns") {
            (v, 1.0)
        } else if let Some(v) = s.strip_suffix("us") {
            (v, 1e3)
        } else if let Some(v) = s.strip_suffix("ms") {
            (v, 1e6)
        } else if let Some(v) = s.strip_suffix('s') {
            (v, 1e9)
        } else {
            return Err(ParseTimeError::MissingUnit(s.to_string()));
        };
        let value: f64 = value
            .trim()
            .parse()
            .map_err(|_| ParseTimeError::BadNumber(s.to_string()))?;
        if value < 0.0 {
            return Err(ParseTimeError::Negative(s.to_string()));
        }
        Ok(Self((value * scale).round() as u64))
    }
}

#[derive(Debug, ThisError, Clone, PartialEq, Eq)]
pub enum ParseTimeError {
    #[error("time value {0:?} is missing a unit (ns, us, ms, or s)")]
    MissingUnit(String),
    #[error("time value {0:?} is not a number")]
    BadNumber(String),
    #[error("time value {0:?} is negative")]
    Negative(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_units() {
        assert_eq!("5ms".parse::<Time>().unwrap(), Time::from_millis(5));
        assert_eq!("250us".parse::<Time>().unwrap(), Time::from_micros(250));
        assert_eq!("10ns".parse::<Time>().unwrap(), Time::from_nanos(10));
        assert_eq!("2s".parse::<Time>().unwrap(), Time::from_secs(2));
        assert_eq!("1.5s".parse::<Time>().unwrap(), Time::from_millis(1500));
        assert_eq!(" 7 ms ".parse::<Time>().unwrap(), Time::from_millis(7));
    }

    #[test]
    fn rejects_malformed() {
        assert!("5".parse::<Time>().is_err());
        assert!("fast".parse::<Time>().is_err());
        assert!("-1s".parse::<Time>().is_err());
    }

    #[test]
    fn second_round_trip() {
        let t = Time::from_secs_f64(7.5);
        assert_eq!(t, Time::from_millis(7500));
        assert_eq!(t.as_secs_f64(), 7.5);
    }
}
