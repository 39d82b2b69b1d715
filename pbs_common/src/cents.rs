use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

/// The largest amount, in whole dollars, that is accepted from user input.
pub const MAX_DOLLARS: f64 = 10_000_000.0;

//--------------------------------------       Cents         ---------------------------------------------------------
/// An amount of money, expressed as an integer number of the currency's smallest unit (cents for USD).
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Cents(i64);

op!(binary Cents, Add, add);
op!(binary Cents, Sub, sub);
op!(inplace Cents, SubAssign, sub_assign);
op!(unary Cents, Neg, neg);

impl Sum for Cents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Value cannot be represented in cents: {0}")]
pub struct CentsConversionError(String);

impl From<i64> for Cents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Display for Cents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

impl Cents {
    pub const fn from_cents(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_whole_dollars(dollars: i64) -> Self {
        Self(dollars * 100)
    }

    /// Converts a dollar amount, as typed in by a user, into cents, rounding to the nearest cent.
    ///
    /// Non-finite, negative and absurdly large (> [`MAX_DOLLARS`]) values are rejected.
    pub fn from_dollars(dollars: f64) -> Result<Self, CentsConversionError> {
        if !dollars.is_finite() {
            return Err(CentsConversionError(format!("{dollars} is not a finite number")));
        }
        if dollars < 0.0 {
            return Err(CentsConversionError(format!("{dollars} is negative")));
        }
        if dollars > MAX_DOLLARS {
            return Err(CentsConversionError(format!("{dollars} exceeds the maximum of {MAX_DOLLARS}")));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self((dollars * 100.0).round() as i64))
    }

    /// Returns `bps` basis points of this amount, rounded half-up to the nearest cent.
    pub fn basis_points(&self, bps: u32) -> Self {
        let scaled = i128::from(self.0) * i128::from(bps);
        let rounded = if scaled >= 0 { (scaled + 5_000) / 10_000 } else { (scaled - 5_000) / 10_000 };
        #[allow(clippy::cast_possible_truncation)]
        Self(rounded as i64)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}
