use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const KES_CURRENCY_CODE: &str = "KES";

//--------------------------------------     Shillings       ---------------------------------------------------------
/// A whole-unit Kenya Shilling amount. M-Pesa does not accept fractional amounts on any of its payment APIs, so
/// this is the only unit the client ever sends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Shillings(u64);

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in Shillings: {0}")]
pub struct ShillingsConversionError(String);

impl From<u64> for Shillings {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<u32> for Shillings {
    fn from(value: u32) -> Self {
        Self(u64::from(value))
    }
}

impl TryFrom<i64> for Shillings {
    type Error = ShillingsConversionError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u64::try_from(value)
            .map(Self)
            .map_err(|_| ShillingsConversionError(format!("{value} is negative and cannot be converted to Shillings")))
    }
}

/// M-Pesa reports amounts in callbacks as decimals (`"1.00"`, `1.0`), even though only whole shillings can be
/// transferred. A non-zero fractional part is rejected.
impl TryFrom<f64> for Shillings {
    type Error = ShillingsConversionError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > u64::MAX as f64 {
            return Err(ShillingsConversionError(format!("{value} is not a whole, non-negative shilling amount")));
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(Self(value as u64))
    }
}

impl FromStr for Shillings {
    type Err = ShillingsConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix(KES_CURRENCY_CODE).map(str::trim).unwrap_or(s);
        if let Ok(v) = s.parse::<u64>() {
            return Ok(Self(v));
        }
        let v = s.parse::<f64>().map_err(|e| ShillingsConversionError(format!("Invalid amount '{s}'. {e}")))?;
        Self::try_from(v)
    }
}

impl Display for Shillings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{KES_CURRENCY_CODE} {}", self.0)
    }
}

impl Shillings {
    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}
