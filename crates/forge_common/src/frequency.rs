//! Clock frequencies with unit parsing and display.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A clock frequency in whole Hertz.
///
/// Parses strings like `"12MHz"`, `"48kHz"`, `"12.5MHz"` and bare integers
/// (interpreted as Hz). Fractional values are rounded to the nearest Hertz.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Frequency(u64);

impl Frequency {
    /// Creates a frequency from a value in Hertz.
    pub fn from_hz(hz: u64) -> Self {
        Self(hz)
    }

    /// Returns the frequency in Hertz.
    pub fn hz(self) -> u64 {
        self.0
    }

    /// Returns the frequency in megahertz.
    pub fn mhz(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }
}

impl fmt::Debug for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frequency({self})")
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hz = self.0;
        if hz >= 1_000_000 {
            write!(f, "{}MHz", hz as f64 / 1_000_000.0)
        } else if hz >= 1_000 {
            write!(f, "{}kHz", hz as f64 / 1_000.0)
        } else {
            write!(f, "{hz}Hz")
        }
    }
}

/// Error returned when a frequency string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid frequency: '{input}'")]
pub struct ParseFrequencyError {
    /// The rejected input.
    pub input: String,
}

impl FromStr for Frequency {
    type Err = ParseFrequencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || ParseFrequencyError {
            input: s.to_string(),
        };

        let lower = s.to_ascii_lowercase();
        let (number, scale) = if let Some(num) = lower.strip_suffix("mhz") {
            (num, 1_000_000.0)
        } else if let Some(num) = lower.strip_suffix("khz") {
            (num, 1_000.0)
        } else if let Some(num) = lower.strip_suffix("hz") {
            (num, 1.0)
        } else {
            (lower.as_str(), 1.0)
        };

        let value: f64 = number.trim().parse().map_err(|_| err())?;
        let hz = (value * scale).round();
        if !hz.is_finite() || hz <= 0.0 || hz > u64::MAX as f64 {
            return Err(err());
        }
        Ok(Frequency(hz as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_units() {
        assert_eq!("12MHz".parse::<Frequency>().unwrap().hz(), 12_000_000);
        assert_eq!("48kHz".parse::<Frequency>().unwrap().hz(), 48_000);
        assert_eq!("48000Hz".parse::<Frequency>().unwrap().hz(), 48_000);
        assert_eq!("25000000".parse::<Frequency>().unwrap().hz(), 25_000_000);
    }

    #[test]
    fn parse_fractional_mhz() {
        let f: Frequency = "12.5MHz".parse().unwrap();
        assert_eq!(f.hz(), 12_500_000);
    }

    #[test]
    fn parse_case_insensitive() {
        assert_eq!("12mhz".parse::<Frequency>().unwrap().hz(), 12_000_000);
    }

    #[test]
    fn rejects_garbage_and_zero() {
        assert!("fast".parse::<Frequency>().is_err());
        assert!("0MHz".parse::<Frequency>().is_err());
        assert!("-5MHz".parse::<Frequency>().is_err());
    }

    #[test]
    fn display_selects_unit() {
        assert_eq!(Frequency::from_hz(12_000_000).to_string(), "12MHz");
        assert_eq!(Frequency::from_hz(44_100).to_string(), "44.1kHz");
        assert_eq!(Frequency::from_hz(500).to_string(), "500Hz");
    }

    #[test]
    fn mhz_accessor() {
        assert_eq!(Frequency::from_hz(48_000_000).mhz(), 48.0);
    }
}
