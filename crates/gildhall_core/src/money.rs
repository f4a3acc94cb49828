//! # Fixed-Point Money
//!
//! **NO FLOATING POINT IN CURRENCY MATH**
//!
//! Real-money amounts arrive from the payment provider in major currency
//! units ("3.00"). They are held as fixed-point integers with 6 decimal
//! places and converted to in-game coins with one explicit, tested
//! rounding policy.
//!
//! ## Why Fixed-Point?
//!
//! - Deterministic: the same payment always mints the same coins
//! - Auditable: `0.10 + 0.20 == 0.30`, unlike IEEE 754 floats
//!
//! ## Rounding Policy
//!
//! `to_coins` rounds **half-up** on the exact fixed-point product. Floor
//! would silently shave paid-for coins at common fractional price points;
//! half-up keeps the buyer whole and is symmetric across price tables.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Number of decimal places carried by [`MajorAmount`].
const DECIMAL_PLACES: u32 = 6;

/// The scale factor for 6 decimal places.
const MULTIPLIER: u64 = 10u64.pow(DECIMAL_PLACES);

/// A non-negative amount of major currency units with 6 decimal places.
///
/// Internally stores `value * 10^6` as a `u64`, which comfortably covers
/// any real-money purchase this economy will ever see.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct MajorAmount(u64);

impl MajorAmount {
    /// Zero amount.
    pub const ZERO: Self = Self(0);

    /// Creates from a whole number of major units.
    #[inline]
    #[must_use]
    pub const fn from_whole(whole: u64) -> Self {
        Self(whole * MULTIPLIER)
    }

    /// Creates from a raw count of millionths of a major unit.
    #[inline]
    #[must_use]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Returns the raw count of millionths of a major unit.
    #[inline]
    #[must_use]
    pub const fn micros(self) -> u64 {
        self.0
    }

    /// Returns the whole-unit part.
    #[inline]
    #[must_use]
    pub const fn whole(self) -> u64 {
        self.0 / MULTIPLIER
    }

    /// Returns the fractional part in millionths (0 to 999,999).
    #[inline]
    #[must_use]
    pub const fn frac_micros(self) -> u64 {
        self.0 % MULTIPLIER
    }

    /// Returns true for a zero amount.
    #[inline]
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Checked addition.
    #[inline]
    #[must_use]
    pub const fn checked_add(self, rhs: Self) -> Option<Self> {
        match self.0.checked_add(rhs.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Converts to in-game coins at `coins_per_major_unit`.
    ///
    /// The product is computed exactly in 128-bit and rounded half-up,
    /// the economy's single documented rounding policy.
    #[must_use]
    pub const fn to_coins(self, coins_per_major_unit: u32) -> u64 {
        let product = self.0 as u128 * coins_per_major_unit as u128;
        let scale = MULTIPLIER as u128;
        ((product + scale / 2) / scale) as u64
    }
}

impl fmt::Display for MajorAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.whole(), self.frac_micros())
    }
}

impl fmt::Debug for MajorAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MajorAmount({self})")
    }
}

/// Error parsing a decimal string into a [`MajorAmount`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseAmountError {
    input: String,
}

impl fmt::Display for ParseAmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid currency amount: {:?}", self.input)
    }
}

impl std::error::Error for ParseAmountError {}

impl FromStr for MajorAmount {
    type Err = ParseAmountError;

    /// Parses `"3"`, `"3.0"`, or `"3.000000"` (at most 6 fractional
    /// digits). Signs, exponents, and grouping are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseAmountError { input: s.to_owned() };

        let (whole_str, frac_str) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole_str.is_empty() && frac_str.is_empty() {
            return Err(err());
        }
        if frac_str.len() > DECIMAL_PLACES as usize {
            return Err(err());
        }
        if !whole_str.chars().all(|c| c.is_ascii_digit())
            || !frac_str.chars().all(|c| c.is_ascii_digit())
        {
            return Err(err());
        }

        let whole: u64 = if whole_str.is_empty() {
            0
        } else {
            whole_str.parse().map_err(|_| err())?
        };
        let mut frac: u64 = if frac_str.is_empty() {
            0
        } else {
            frac_str.parse().map_err(|_| err())?
        };
        for _ in frac_str.len()..DECIMAL_PLACES as usize {
            frac *= 10;
        }

        whole
            .checked_mul(MULTIPLIER)
            .and_then(|w| w.checked_add(frac))
            .map(Self)
            .ok_or_else(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whole_and_fractional() {
        assert_eq!("3".parse::<MajorAmount>().unwrap(), MajorAmount::from_whole(3));
        assert_eq!("3.00".parse::<MajorAmount>().unwrap(), MajorAmount::from_whole(3));
        assert_eq!(
            "0.5".parse::<MajorAmount>().unwrap(),
            MajorAmount::from_micros(500_000)
        );
        assert_eq!(
            ".25".parse::<MajorAmount>().unwrap(),
            MajorAmount::from_micros(250_000)
        );
        assert_eq!(
            "1.000001".parse::<MajorAmount>().unwrap(),
            MajorAmount::from_micros(1_000_001)
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", ".", "-1", "+1", "1e3", "1.2.3", "1,00", "1.0000001", "abc"] {
            assert!(bad.parse::<MajorAmount>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_to_coins_exact() {
        let paid: MajorAmount = "3.00".parse().unwrap();
        assert_eq!(paid.to_coins(3000), 9000);
        assert_eq!(paid.to_coins(2000), 6000);
    }

    #[test]
    fn test_to_coins_rounds_half_up() {
        // 1.00025 * 2000 = 2000.5 -> 2001
        let a: MajorAmount = "1.00025".parse().unwrap();
        assert_eq!(a.to_coins(2000), 2001);

        // 1.0001 * 2000 = 2000.2 -> 2000
        let b: MajorAmount = "1.0001".parse().unwrap();
        assert_eq!(b.to_coins(2000), 2000);

        // 0.0004 * 1000 = 0.4 -> 0 coins, a logged no-op upstream
        let c: MajorAmount = "0.0004".parse().unwrap();
        assert_eq!(c.to_coins(1000), 0);

        // 0.0005 * 1000 = 0.5 -> 1
        let d: MajorAmount = "0.0005".parse().unwrap();
        assert_eq!(d.to_coins(1000), 1);
    }

    #[test]
    fn test_display_round_trips() {
        let a: MajorAmount = "12.340000".parse().unwrap();
        assert_eq!(a.to_string(), "12.340000");
        assert_eq!(a.to_string().parse::<MajorAmount>().unwrap(), a);
    }

    #[test]
    fn test_checked_add() {
        let a = MajorAmount::from_whole(1);
        let b = MajorAmount::from_micros(u64::MAX);
        assert_eq!(
            a.checked_add(a),
            Some(MajorAmount::from_whole(2))
        );
        assert_eq!(b.checked_add(a), None);
    }
}
