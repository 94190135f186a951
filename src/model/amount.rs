//! Fixed-point ingredient quantities.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors produced when parsing an [`Amount`] from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,

    #[error("invalid amount {0:?}: expected a decimal such as 0.125")]
    Invalid(String),

    #[error("amount {0:?} has more than {max} fractional digits", max = Amount::SCALE_DIGITS)]
    TooPrecise(String),

    #[error("amount {0:?} exceeds {max}", max = Amount::MAX)]
    OutOfRange(String),
}

/// A non-negative decimal quantity with three fractional digits, such as
/// `0.125` (1/8) or `0.250` (1/4).
///
/// Stored as an integer count of thousandths. At most six digits in total,
/// so the largest representable value is `999.999`.
///
/// # Examples
///
/// ```
/// use larder::model::Amount;
///
/// let quarter: Amount = "0.25".parse().unwrap();
/// assert_eq!(quarter.thousandths(), 250);
/// assert_eq!(quarter.to_string(), "0.250");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(u32);

impl Amount {
    /// Number of fractional digits carried.
    pub const SCALE_DIGITS: usize = 3;
    const SCALE: u32 = 1_000;
    /// Largest representable amount, in thousandths.
    pub const MAX: Amount = Amount(999_999);

    /// Builds an amount from a count of thousandths.
    ///
    /// Returns `None` when the value exceeds [`Amount::MAX`].
    pub fn from_thousandths(thousandths: u32) -> Option<Self> {
        (thousandths <= Self::MAX.0).then_some(Self(thousandths))
    }

    pub fn thousandths(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}", self.0 / Self::SCALE, self.0 % Self::SCALE)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AmountError::Empty);
        }

        let (whole, fraction) = match s.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (s, ""),
        };

        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if (whole.is_empty() && fraction.is_empty()) || !all_digits(whole) || !all_digits(fraction)
        {
            return Err(AmountError::Invalid(s.to_owned()));
        }
        if fraction.len() > Self::SCALE_DIGITS {
            return Err(AmountError::TooPrecise(s.to_owned()));
        }

        let whole: u32 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| AmountError::OutOfRange(s.to_owned()))?
        };

        let mut padded = fraction.to_owned();
        while padded.len() < Self::SCALE_DIGITS {
            padded.push('0');
        }
        let fraction: u32 = padded
            .parse()
            .map_err(|_| AmountError::Invalid(s.to_owned()))?;

        whole
            .checked_mul(Self::SCALE)
            .and_then(|w| w.checked_add(fraction))
            .and_then(Self::from_thousandths)
            .ok_or_else(|| AmountError::OutOfRange(s.to_owned()))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
