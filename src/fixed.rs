//! Exact decimal scores.
//!
//! Sentiment and trend sums are accumulated as integers counting billionths,
//! so merging partial sums gives the same result in any order. Values are
//! converted from `f64` once, at the record boundary, rounded to the nearest
//! billionth.

use std::fmt;
use std::ops::{Add, AddAssign};

/// Fixed-point units per 1.0.
pub const SCALE: i128 = 1_000_000_000;

/// Largest magnitude accepted by [`Fixed::from_f64`]. Sums of up to 1e11
/// such values still fit.
pub const MAX_MAGNITUDE: f64 = 1e18;

/// A decimal with nine fractional digits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fixed(i128);

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);
    pub const MIN: Fixed = Fixed(i128::MIN);
    pub const MAX: Fixed = Fixed(i128::MAX);

    /// Rounds `value` to the nearest billionth. `None` for non-finite values
    /// and magnitudes of [`MAX_MAGNITUDE`] or more.
    pub fn from_f64(value: f64) -> Option<Fixed> {
        if !value.is_finite() || value.abs() >= MAX_MAGNITUDE {
            return None;
        }
        Some(Fixed((value * SCALE as f64).round() as i128))
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// `self / divisor` rounded half away from zero to `decimals` fractional
    /// digits, e.g. `0.67` for 2/3 with two decimals. `decimals` is at most 9.
    pub fn format_div(self, divisor: u64, decimals: u32) -> String {
        let decimals = decimals.min(9);
        let unit = 10i128.pow(decimals);
        let num = self.0.saturating_mul(unit);
        let den = i128::from(divisor.max(1)) * SCALE;
        let mut quotient = num / den;
        let remainder = num % den;
        if remainder.unsigned_abs() * 2 >= den.unsigned_abs() {
            quotient += num.signum();
        }
        let sign = if quotient < 0 { "-" } else { "" };
        let magnitude = quotient.unsigned_abs();
        let unit = unit.unsigned_abs();
        if decimals == 0 {
            format!("{}{}", sign, magnitude)
        } else {
            format!(
                "{}{}.{:0width$}",
                sign,
                magnitude / unit,
                magnitude % unit,
                width = decimals as usize
            )
        }
    }
}

impl Add for Fixed {
    type Output = Fixed;

    fn add(self, other: Fixed) -> Fixed {
        Fixed(self.0 + other.0)
    }
}

impl AddAssign for Fixed {
    fn add_assign(&mut self, other: Fixed) {
        self.0 += other.0;
    }
}

impl std::iter::Sum for Fixed {
    fn sum<I: Iterator<Item = Fixed>>(iter: I) -> Fixed {
        iter.fold(Fixed::ZERO, |acc, value| acc + value)
    }
}

/// Shortest decimal form: `3`, `-2`, `0.5`, `1.2`.
impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let magnitude = self.0.unsigned_abs();
        let scale = SCALE.unsigned_abs();
        let (whole, frac) = (magnitude / scale, magnitude % scale);
        if frac == 0 {
            return write!(f, "{}{}", sign, whole);
        }
        let digits = format!("{:09}", frac);
        write!(f, "{}{}.{}", sign, whole, digits.trim_end_matches('0'))
    }
}
