//! Hbar amounts, stored as signed tinybars

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};

/// Number of tinybars in one hbar.
pub const TINYBARS_PER_HBAR: i64 = 100_000_000;

/// An amount of the ledger's native currency.
///
/// Negative values appear in transfer lists (the debited side).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hbar(i64);

impl Hbar {
    pub const ZERO: Hbar = Hbar(0);

    /// Whole hbars.
    pub const fn new(hbars: i64) -> Self {
        Self(hbars * TINYBARS_PER_HBAR)
    }

    pub const fn from_tinybars(tinybars: i64) -> Self {
        Self(tinybars)
    }

    pub const fn to_tinybars(self) -> i64 {
        self.0
    }

    pub fn negated(self) -> Self {
        Self(-self.0)
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl Add for Hbar {
    type Output = Hbar;

    fn add(self, rhs: Self) -> Self::Output {
        Hbar(self.0 + rhs.0)
    }
}

impl Sub for Hbar {
    type Output = Hbar;

    fn sub(self, rhs: Self) -> Self::Output {
        Hbar(self.0 - rhs.0)
    }
}

impl Neg for Hbar {
    type Output = Hbar;

    fn neg(self) -> Self::Output {
        self.negated()
    }
}

impl fmt::Display for Hbar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % TINYBARS_PER_HBAR == 0 {
            write!(f, "{} ℏ", self.0 / TINYBARS_PER_HBAR)
        } else {
            write!(f, "{} tℏ", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hbar_conversions() {
        assert_eq!(Hbar::new(5).to_tinybars(), 500_000_000);
        assert_eq!(Hbar::new(1) - Hbar::from_tinybars(1), Hbar::from_tinybars(99_999_999));
        assert_eq!(-Hbar::new(2), Hbar::new(-2));
    }

    #[test]
    fn test_hbar_display() {
        assert_eq!(Hbar::new(5).to_string(), "5 ℏ");
        assert_eq!(Hbar::from_tinybars(42).to_string(), "42 tℏ");
    }
}
