//! Real-valued algebra: probabilities and adjoints stored directly.

use super::{Ring, Semiring};

/// A real number under ordinary arithmetic.
///
/// The fastest domain, but prone to underflow for long sentences where tree
/// scores are products of many potentials. Prefer [`LogProb`](super::LogProb)
/// or [`LogSign`](super::LogSign) when magnitudes vary widely.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Real(pub f64);

impl Semiring for Real {
    fn zero() -> Self {
        Real(0.0)
    }

    fn one() -> Self {
        Real(1.0)
    }

    fn plus(self, rhs: Self) -> Self {
        Real(self.0 + rhs.0)
    }

    fn times(self, rhs: Self) -> Self {
        Real(self.0 * rhs.0)
    }

    fn divide(self, rhs: Self) -> Self {
        Real(self.0 / rhs.0)
    }

    fn minus_or_zero(self, rhs: Self) -> Self {
        Real((self.0 - rhs.0).max(0.0))
    }

    fn from_real(value: f64) -> Self {
        Real(value)
    }

    fn to_real(self) -> f64 {
        self.0
    }
}

impl Ring for Real {
    fn negate(self) -> Self {
        Real(-self.0)
    }

    fn minus(self, rhs: Self) -> Self {
        Real(self.0 - rhs.0)
    }
}
