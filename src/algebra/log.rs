//! Log-domain algebra: nonnegative reals stored as natural logarithms.

use super::Semiring;

/// A nonnegative real number stored as its natural logarithm.
///
/// Products become sums and sums become log-sum-exp, so long chains of small
/// potentials do not underflow. Negative reals are not representable, which
/// is why this domain supports forward inference only; the adjoint pass
/// requires [`LogSign`](super::LogSign) or [`Real`](super::Real).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LogProb(f64);

impl LogProb {
    /// Wraps a value already in log space.
    pub fn from_parts(log_value: f64) -> Self {
        LogProb(log_value)
    }

    /// The stored logarithm.
    pub fn log_value(self) -> f64 {
        self.0
    }
}

impl Semiring for LogProb {
    fn zero() -> Self {
        LogProb(f64::NEG_INFINITY)
    }

    fn one() -> Self {
        LogProb(0.0)
    }

    fn plus(self, rhs: Self) -> Self {
        LogProb(log_sum_exp(self.0, rhs.0))
    }

    fn times(self, rhs: Self) -> Self {
        // -inf + inf would be NaN; zero annihilates first
        if self.is_zero() || rhs.is_zero() {
            return Self::zero();
        }
        LogProb(self.0 + rhs.0)
    }

    fn divide(self, rhs: Self) -> Self {
        if self.is_zero() {
            return Self::zero();
        }
        LogProb(self.0 - rhs.0)
    }

    fn minus_or_zero(self, rhs: Self) -> Self {
        if rhs.0 >= self.0 {
            return Self::zero();
        }
        LogProb(log_diff_exp(self.0, rhs.0))
    }

    fn from_real(value: f64) -> Self {
        debug_assert!(value >= 0.0, "log domain cannot represent {value}");
        LogProb(value.ln())
    }

    fn to_real(self) -> f64 {
        self.0.exp()
    }

    fn is_zero(self) -> bool {
        self.0 == f64::NEG_INFINITY
    }
}

/// Computes `ln(exp(a) + exp(b))` without overflow.
#[inline]
pub(crate) fn log_sum_exp(a: f64, b: f64) -> f64 {
    let m = a.max(b);
    if !m.is_finite() {
        return m;
    }
    m + ((a - m).exp() + (b - m).exp()).ln()
}

/// Computes `ln(exp(a) - exp(b))` for `a >= b` without loss of significance.
#[inline]
pub(crate) fn log_diff_exp(a: f64, b: f64) -> f64 {
    if b == f64::NEG_INFINITY {
        return a;
    }
    let d = b - a;
    if d >= 0.0 {
        return f64::NEG_INFINITY;
    }
    // ln(1 - exp(d)): switch formulations at -ln 2 to keep precision
    let log1m = if d > -std::f64::consts::LN_2 {
        (-d.exp_m1()).ln()
    } else {
        (-d.exp()).ln_1p()
    };
    a + log1m
}
