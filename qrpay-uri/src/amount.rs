//! Conversions between smallest-unit amounts and human-readable stablecoin amounts

use rust_decimal::Decimal;

use crate::{ParseError, Result, AMOUNT_DECIMALS, SCALE};

/// Convert a smallest-unit amount to display units (`raw / SCALE`, exact)
pub fn to_display_amount(raw: u64) -> Decimal {
    // u64 always fits the 96-bit mantissa
    Decimal::from_i128_with_scale(raw as i128, AMOUNT_DECIMALS)
}

/// Parse a human-readable amount such as `"12.5"` into smallest units
pub fn parse_display_amount(amount_str: &str) -> Result<u64> {
    let amount_str = amount_str.trim();

    if amount_str.is_empty() {
        return Err(ParseError::InvalidAmount("Empty amount".to_string()));
    }

    let (whole_part, frac_part) = match amount_str.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (amount_str, ""),
    };

    if frac_part.contains('.') {
        return Err(ParseError::InvalidAmount(format!(
            "Multiple decimal points: {}",
            amount_str
        )));
    }
    if !whole_part.chars().all(|c| c.is_ascii_digit()) {
        return Err(ParseError::InvalidAmount(format!(
            "Invalid whole part: {}",
            whole_part
        )));
    }
    if !frac_part.chars().all(|c| c.is_ascii_digit()) {
        return Err(ParseError::InvalidAmount(format!(
            "Invalid fractional part: {}",
            frac_part
        )));
    }
    if whole_part.is_empty() && frac_part.is_empty() {
        return Err(ParseError::InvalidAmount(format!("No digits: {}", amount_str)));
    }
    if frac_part.len() > AMOUNT_DECIMALS as usize {
        return Err(ParseError::TooManyDecimalPlaces(amount_str.to_string()));
    }

    let whole_units: u64 = if whole_part.is_empty() {
        0
    } else {
        whole_part
            .parse::<u64>()
            .map_err(|e| ParseError::InvalidAmount(format!("Invalid whole part: {}", e)))?
            .checked_mul(SCALE)
            .ok_or_else(|| ParseError::InvalidAmount("Amount overflow".to_string()))?
    };

    let frac_units: u64 = if frac_part.is_empty() {
        0
    } else {
        let padded = format!("{:0<6}", frac_part);
        padded
            .parse::<u64>()
            .map_err(|e| ParseError::InvalidAmount(format!("Invalid fractional part: {}", e)))?
    };

    whole_units
        .checked_add(frac_units)
        .ok_or_else(|| ParseError::InvalidAmount("Amount overflow".to_string()))
}

/// Format smallest units as a plain decimal string, trailing zeros trimmed
pub fn format_display_amount(raw: u64) -> String {
    let whole = raw / SCALE;
    let frac = raw % SCALE;

    if frac == 0 {
        format!("{}", whole)
    } else {
        let frac_str = format!("{:06}", frac);
        format!("{}.{}", whole, frac_str.trim_end_matches('0'))
    }
}
