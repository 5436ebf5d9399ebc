//! # Fixed-Point Amounts
//!
//! Every monetary value in Novax is an integer in the smallest unit of its
//! token: 6-decimal USDC, 18-decimal pool shares. The contracts never see a
//! float and neither does this crate.
//!
//! The only numerically sensitive invariant in the system lives here:
//! amount semantics depend on the decimals constant per token type. An
//! [`Amount`] therefore always carries its decimals, and conversions
//! between the 6- and 18-decimal worlds go through the exact scale factor
//! in [`crate::config::USDC_TO_SHARE_SCALE`].
//!
//! Formatting and parsing are inverse operations: for every raw value
//! representable at a token's precision, `parse_units(format_units(v)) == v`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::config::USDC_TO_SHARE_SCALE;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from amount parsing and arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    /// The input string is not a decimal number.
    #[error("not a decimal number: '{0}'")]
    InvalidNumber(String),

    /// The input has more fractional digits than the token supports.
    #[error("precision loss: '{input}' has more than {decimals} fractional digits")]
    PrecisionLoss {
        /// The offending input string.
        input: String,
        /// The token's decimal precision.
        decimals: u8,
    },

    /// The value does not fit in a u128.
    #[error("amount overflow")]
    Overflow,

    /// Two amounts with different decimals were combined.
    #[error("decimals mismatch: {left} vs {right}")]
    DecimalsMismatch {
        /// Decimals of the left operand.
        left: u8,
        /// Decimals of the right operand.
        right: u8,
    },
}

// ---------------------------------------------------------------------------
// Amount
// ---------------------------------------------------------------------------

/// A monetary amount in the smallest indivisible unit of its token.
///
/// `raw` is always an integer. For USDC (6 decimals), `raw = 1_000_000`
/// means $1.00. For pool shares (18 decimals), `raw = 10^18` means one
/// share. u128 because 18-decimal tokens overflow u64 at ~18.4 tokens'
/// worth of wei-scale units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Amount {
    /// Value in the smallest unit.
    pub raw: u128,
    /// Decimal precision of the token this amount belongs to.
    pub decimals: u8,
}

impl Amount {
    /// Creates an amount from a raw smallest-unit value.
    pub fn from_raw(raw: u128, decimals: u8) -> Self {
        Self { raw, decimals }
    }

    /// The zero amount at the given precision.
    pub fn zero(decimals: u8) -> Self {
        Self { raw: 0, decimals }
    }

    /// Returns `true` if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.raw == 0
    }

    /// Checked addition. Fails on overflow or mismatched decimals.
    pub fn checked_add(&self, other: &Amount) -> Result<Amount, AmountError> {
        if self.decimals != other.decimals {
            return Err(AmountError::DecimalsMismatch {
                left: self.decimals,
                right: other.decimals,
            });
        }
        let raw = self
            .raw
            .checked_add(other.raw)
            .ok_or(AmountError::Overflow)?;
        Ok(Amount::from_raw(raw, self.decimals))
    }

    /// Checked subtraction. Fails on underflow or mismatched decimals.
    pub fn checked_sub(&self, other: &Amount) -> Result<Amount, AmountError> {
        if self.decimals != other.decimals {
            return Err(AmountError::DecimalsMismatch {
                left: self.decimals,
                right: other.decimals,
            });
        }
        let raw = self
            .raw
            .checked_sub(other.raw)
            .ok_or(AmountError::Overflow)?;
        Ok(Amount::from_raw(raw, self.decimals))
    }

    /// Formats the amount as a full-width decimal string, e.g. a 6-decimal
    /// `1_500_000` becomes `"1.500000"`.
    pub fn format_units(&self) -> String {
        format_units(self.raw, self.decimals)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_units())
    }
}

// ---------------------------------------------------------------------------
// Serde helper: u128 as decimal string
// ---------------------------------------------------------------------------

/// Serde helper for serializing `u128` raw amounts as decimal strings.
///
/// JSON numbers lose precision past 2^53, and 18-decimal token amounts
/// blow past that immediately. Every raw amount therefore crosses the
/// wire as a string, exactly like the hex-quantity convention in
/// Ethereum JSON-RPC.
///
/// # Usage
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Pool {
///     #[serde(with = "novax_protocol::amount::serde_raw")]
///     target_amount: u128,
/// }
/// ```
pub mod serde_raw {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Formats a raw smallest-unit value as a decimal string with exactly
/// `decimals` fractional digits.
pub fn format_units(raw: u128, decimals: u8) -> String {
    if decimals == 0 {
        return raw.to_string();
    }
    let divisor = 10u128.pow(decimals as u32);
    let whole = raw / divisor;
    let frac = raw % divisor;
    format!("{}.{:0>width$}", whole, frac, width = decimals as usize)
}

/// Parses a decimal string into a raw smallest-unit value.
///
/// Accepts `"12"`, `"12.5"`, `"12.500000"`, `".5"`. Rejects empty input,
/// non-digit characters, and inputs with more fractional digits than
/// `decimals` — silently truncating money is not a feature.
pub fn parse_units(input: &str, decimals: u8) -> Result<u128, AmountError> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed == "." {
        return Err(AmountError::InvalidNumber(input.to_string()));
    }

    let (whole_str, frac_str) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };

    if !whole_str.chars().all(|c| c.is_ascii_digit())
        || !frac_str.chars().all(|c| c.is_ascii_digit())
    {
        return Err(AmountError::InvalidNumber(input.to_string()));
    }

    if frac_str.len() > decimals as usize {
        // Trailing zeros beyond the precision are harmless; anything else
        // would be silent truncation.
        let (keep, excess) = frac_str.split_at(decimals as usize);
        if excess.chars().any(|c| c != '0') {
            return Err(AmountError::PrecisionLoss {
                input: input.to_string(),
                decimals,
            });
        }
        return assemble(whole_str, keep, decimals, input);
    }

    assemble(whole_str, frac_str, decimals, input)
}

fn assemble(
    whole_str: &str,
    frac_str: &str,
    decimals: u8,
    original: &str,
) -> Result<u128, AmountError> {
    let whole: u128 = if whole_str.is_empty() {
        0
    } else {
        whole_str
            .parse()
            .map_err(|_| AmountError::InvalidNumber(original.to_string()))?
    };

    let mut frac: u128 = 0;
    if !frac_str.is_empty() {
        frac = frac_str
            .parse()
            .map_err(|_| AmountError::InvalidNumber(original.to_string()))?;
        frac = frac
            .checked_mul(10u128.pow((decimals as usize - frac_str.len()) as u32))
            .ok_or(AmountError::Overflow)?;
    }

    whole
        .checked_mul(10u128.pow(decimals as u32))
        .and_then(|w| w.checked_add(frac))
        .ok_or(AmountError::Overflow)
}

/// Scales a 6-decimal USDC amount into 18-decimal pool shares. Exact.
pub fn usdc_to_shares(usdc_raw: u128) -> Result<u128, AmountError> {
    usdc_raw
        .checked_mul(USDC_TO_SHARE_SCALE)
        .ok_or(AmountError::Overflow)
}

/// Scales an 18-decimal share amount back to 6-decimal USDC.
///
/// Truncates sub-USDC dust; distribution math rounds in the pool's favor
/// so the contract can never pay out more than it holds.
pub fn shares_to_usdc(share_raw: u128) -> u128 {
    share_raw / USDC_TO_SHARE_SCALE
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
