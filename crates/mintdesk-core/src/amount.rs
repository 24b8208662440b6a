//! Conversion between user-facing decimal amounts and token base units.

use crate::error::DeskError;

/// Largest `decimals` value accepted for new mints.
pub const MAX_DECIMALS: u8 = 9;

/// Parse a decimal string such as `"1.5"` into base units for a mint with
/// `decimals` decimal places.
///
/// Fails with `InvalidAmount` when the value is not a plain non-negative
/// decimal, is zero, has more fractional digits than the mint supports
/// (i.e. is below the smallest representable unit), or overflows `u64`.
pub fn parse_ui_amount(input: &str, decimals: u8) -> Result<u64, DeskError> {
    let s = input.trim();
    let invalid = || DeskError::InvalidAmount(format!("{input:?} is not a valid amount"));

    if s.is_empty() {
        return Err(invalid());
    }

    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let frac = frac.trim_end_matches('0');
    if frac.len() > decimals as usize {
        return Err(DeskError::InvalidAmount(format!(
            "{input} is below the smallest unit of a token with {decimals} decimals"
        )));
    }

    let overflow = || DeskError::InvalidAmount(format!("{input} is too large"));
    let scale = 10u64.checked_pow(decimals as u32).ok_or_else(overflow)?;

    let whole_units = if whole.is_empty() {
        0
    } else {
        whole.parse::<u64>().map_err(|_| overflow())?
    };
    let frac_units = if frac.is_empty() {
        0
    } else {
        let padded = format!("{frac:0<width$}", width = decimals as usize);
        padded.parse::<u64>().map_err(|_| overflow())?
    };

    let total = whole_units
        .checked_mul(scale)
        .and_then(|w| w.checked_add(frac_units))
        .ok_or_else(overflow)?;

    if total == 0 {
        return Err(DeskError::InvalidAmount("amount must be greater than zero".into()));
    }
    Ok(total)
}

/// Render base units as a decimal string, without trailing zeros.
pub fn format_ui_amount(amount: u64, decimals: u8) -> String {
    if decimals == 0 {
        return amount.to_string();
    }
    let digits = format!("{amount:0>width$}", width = decimals as usize + 1);
    let (whole, frac) = digits.split_at(digits.len() - decimals as usize);
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{frac}")
    }
}

/// Reject amounts that are zero or exceed what the account holds.
pub fn check_spendable(amount: u64, balance: u64) -> Result<(), DeskError> {
    if amount == 0 {
        return Err(DeskError::InvalidAmount("amount must be greater than zero".into()));
    }
    if amount > balance {
        return Err(DeskError::InvalidAmount(format!(
            "amount {amount} exceeds balance {balance}"
        )));
    }
    Ok(())
}
