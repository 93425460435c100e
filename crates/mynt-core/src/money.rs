//! Display formatting for credit balances.
//!
//! Balances are integer cents everywhere in the ledger; dollars only exist
//! at the display edge. These helpers are pure and have no store access.

/// Render cents as a dollar string: `12500` → `"$125.00"`.
pub fn format_credits(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}${}.{:02}", abs / 100, abs % 100)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a credit amount: {0:?}")]
pub struct ParseCreditsError(pub String);

/// Parse a dollar string back to cents: `"$125.00"` → `12500`.
/// Accepts an optional `$` and an optional fractional part of one or two
/// digits. Inverse of [`format_credits`].
pub fn parse_credits(input: &str) -> Result<i64, ParseCreditsError> {
    let err = || ParseCreditsError(input.to_string());
    let mut s = input.trim();

    let negative = if let Some(rest) = s.strip_prefix('-') {
        s = rest;
        true
    } else {
        false
    };
    s = s.strip_prefix('$').unwrap_or(s);

    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() || frac.len() > 2 {
        return Err(err());
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(err());
    }

    let dollars: i64 = whole.parse().map_err(|_| err())?;
    let mut cents: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().map_err(|_| err())? * 10,
        _ => frac.parse().map_err(|_| err())?,
    };
    cents = dollars
        .checked_mul(100)
        .and_then(|d| d.checked_add(cents))
        .ok_or_else(err)?;

    Ok(if negative { -cents } else { cents })
}
