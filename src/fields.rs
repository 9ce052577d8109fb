//! Typed field parsers shared by all formats: amounts, dates, header names.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

use crate::error::{Error, Result};

const CURRENCY_SYMBOLS: [char; 7] = ['€', '$', '£', '¥', '₣', '₦', '₵'];

/// Currency codes accepted before or after a number. `FCFA` precedes `CFA`.
const CURRENCY_CODES: [&str; 7] = ["FCFA", "CFA", "XOF", "XAF", "KSH", "EUR", "USD"];

/// Remove one leading and one trailing currency code, ignoring case.
fn strip_currency_codes(value: &str) -> &str {
    let mut s = value;
    if let Some(code) = CURRENCY_CODES
        .iter()
        .find(|code| s.get(..code.len()).map_or(false, |head| head.eq_ignore_ascii_case(code)))
    {
        s = &s[code.len()..];
    }
    if let Some(code) = CURRENCY_CODES.iter().find(|code| {
        s.len()
            .checked_sub(code.len())
            .and_then(|start| s.get(start..))
            .map_or(false, |tail| tail.eq_ignore_ascii_case(code))
    }) {
        s = &s[..s.len() - code.len()];
    }
    s
}

/// Parse a monetary amount written in any of the usual locales.
///
/// Returns `Ok(None)` for an empty cell. Handles `1 234,56`, `1.234,56`,
/// `1,234.56`, `(1234.56)`, `1234.56-`, and currency symbols or codes around
/// the number (`€`, `FCFA`, `KSh`, `EUR`...). The result is rounded to cents.
pub fn parse_amount(value: &str) -> Result<Option<Decimal>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    // Thousands separators: spaces, NBSP, narrow NBSP, Swiss apostrophe
    let mut s: String = trimmed
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\'' && !CURRENCY_SYMBOLS.contains(c))
        .collect();
    s = strip_currency_codes(&s).to_string();

    let mut negative = false;
    if s.starts_with('(') && s.ends_with(')') && s.len() >= 2 {
        negative = true;
        s = s[1..s.len() - 1].to_string();
    }
    if let Some(stripped) = s.strip_suffix('-') {
        negative = !negative;
        s = stripped.to_string();
    }
    if let Some(stripped) = s.strip_prefix('+') {
        s = stripped.to_string();
    }

    let has_comma = s.contains(',');
    let has_dot = s.contains('.');

    let normalized = if has_comma && has_dot {
        let last_comma = s.rfind(',').unwrap_or(0);
        let last_dot = s.rfind('.').unwrap_or(0);
        if last_comma > last_dot {
            // 1.234,56
            s.replace('.', "").replace(',', ".")
        } else {
            // 1,234.56
            s.replace(',', "")
        }
    } else if has_comma {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() == 2 && parts[1].len() <= 2 {
            s.replace(',', ".")
        } else {
            s.replace(',', "")
        }
    } else {
        s
    };

    if normalized.is_empty() {
        return Err(Error::InvalidAmount(value.to_string()));
    }

    let mut amount = Decimal::from_str(&normalized)
        .map_err(|_| Error::InvalidAmount(value.to_string()))?
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

    if negative {
        amount = -amount;
    }
    if amount.is_zero() {
        amount = Decimal::ZERO;
    }

    Ok(Some(amount))
}

/// Parse a date in any of the common ledger notations.
///
/// Any time component (after a space or `T`) is ignored. When neither part
/// of a `xx/yy/zzzz` date exceeds 12, `day_first` decides the order.
pub fn parse_date(value: &str, day_first: bool) -> Option<NaiveDate> {
    let cleaned = value.trim().split([' ', 'T']).next()?.trim();
    if cleaned.is_empty() {
        return None;
    }

    // YYYYMMDD (FEC)
    if cleaned.len() == 8 && cleaned.chars().all(|c| c.is_ascii_digit()) {
        let year = cleaned[0..4].parse().ok()?;
        let month = cleaned[4..6].parse().ok()?;
        let day = cleaned[6..8].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    let separator = ['-', '/', '.'].into_iter().find(|sep| cleaned.contains(*sep))?;
    let parts: Vec<&str> = cleaned.split(separator).collect();
    if parts.len() != 3
        || parts
            .iter()
            .any(|p| p.is_empty() || p.len() > 4 || !p.chars().all(|c| c.is_ascii_digit()))
    {
        return None;
    }

    // YYYY-MM-DD / YYYY/MM/DD
    if parts[0].len() == 4 {
        let year = parts[0].parse().ok()?;
        let month = parts[1].parse().ok()?;
        let day = parts[2].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    let year = match parts[2].len() {
        4 => parts[2].parse::<i32>().ok()?,
        2 => {
            // Assume 2000+ for years < 50, otherwise 1900+
            let short = parts[2].parse::<i32>().ok()?;
            if short < 50 {
                2000 + short
            } else {
                1900 + short
            }
        }
        _ => return None,
    };

    let first: u32 = parts[0].parse().ok()?;
    let second: u32 = parts[1].parse().ok()?;
    let (day, month) = if first > 12 {
        (first, second)
    } else if second > 12 {
        (second, first)
    } else if day_first {
        (first, second)
    } else {
        (second, first)
    };

    NaiveDate::from_ymd_opt(year, month, day)
}

/// Normalize a header or alias for comparison: accents folded, lowercase,
/// ASCII alphanumerics only. `"Débit (EUR)"` becomes `"debiteur"`.
pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .flat_map(|c| c.to_lowercase())
        .map(|c| match c {
            'à' | 'á' | 'â' | 'ä' | 'ã' | 'å' => 'a',
            'ç' => 'c',
            'è' | 'é' | 'ê' | 'ë' => 'e',
            'ì' | 'í' | 'î' | 'ï' => 'i',
            'ñ' => 'n',
            'ò' | 'ó' | 'ô' | 'ö' | 'õ' => 'o',
            'ù' | 'ú' | 'û' | 'ü' => 'u',
            other => other,
        })
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Clean a raw cell: trimmed, surrounding quotes removed.
pub fn clean_cell(value: &str) -> &str {
    value
        .trim()
        .trim_start_matches(['"', '\''])
        .trim_end_matches(['"', '\''])
        .trim()
}
