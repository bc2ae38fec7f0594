//! Display helpers for balances, amounts and addresses

use std::fmt;

use chrono::{DateTime, TimeZone};
use rust_decimal::{Decimal, RoundingStrategy};

/// Shorten an address to `0x1c7D...7238`
pub fn mask_address(address: &str) -> String {
    if address.len() <= 10 || !address.is_ascii() {
        return address.to_string();
    }
    format!("{}...{}", &address[..6], &address[address.len() - 4..])
}

/// Format a dollar-pegged amount as `$1,234.56`
pub fn format_usd(amount: Decimal) -> String {
    let rounded = amount
        .abs()
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.2}", rounded);
    let (whole, frac) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{}${}.{}", sign, grouped, frac)
}

/// Label a transfer time as `Today, 10:23 AM`, `Yesterday, 4:01 PM` or `Jun 8, 2025`
///
/// Days are calendar days in the zone of `now`.
pub fn format_relative_date<Tz>(at: &DateTime<Tz>, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let at = at.with_timezone(&now.timezone());
    let days = now
        .date_naive()
        .signed_duration_since(at.date_naive())
        .num_days();
    match days {
        0 => format!("Today, {}", at.format("%-I:%M %p")),
        1 => format!("Yesterday, {}", at.format("%-I:%M %p")),
        _ => at.format("%b %-d, %Y").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_mask_address() {
        assert_eq!(
            mask_address("0x5DFE0A60d3c27976eb3F1530F8a1CfA4bE2BAD30"),
            "0x5DFE...AD30"
        );
        assert_eq!(mask_address("0xCCC"), "0xCCC");
        assert_eq!(mask_address(""), "");
    }

    #[test]
    fn test_format_usd() {
        assert_eq!(format_usd(dec("15423.87")), "$15,423.87");
        assert_eq!(format_usd(dec("5")), "$5.00");
        assert_eq!(format_usd(dec("0.25")), "$0.25");
        assert_eq!(format_usd(dec("0.005")), "$0.01");
        assert_eq!(format_usd(dec("1234567.891")), "$1,234,567.89");
        assert_eq!(format_usd(dec("-35.75")), "-$35.75");
        assert_eq!(format_usd(dec("-0.001")), "$0.00");
        assert_eq!(format_usd(Decimal::ZERO), "$0.00");
    }

    #[test]
    fn test_relative_date() {
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 15, 30, 0).unwrap();
        let at = |d, h, m| Utc.with_ymd_and_hms(2025, 6, d, h, m, 0).unwrap();

        assert_eq!(format_relative_date(&at(10, 10, 23), &now), "Today, 10:23 AM");
        assert_eq!(format_relative_date(&at(10, 0, 5), &now), "Today, 12:05 AM");
        assert_eq!(format_relative_date(&at(9, 16, 1), &now), "Yesterday, 4:01 PM");
        assert_eq!(format_relative_date(&at(8, 23, 59), &now), "Jun 8, 2025");
        // clock skew puts a transfer in the future
        assert_eq!(format_relative_date(&at(11, 9, 0), &now), "Jun 11, 2025");
    }

    #[test]
    fn test_relative_date_uses_local_calendar_day() {
        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2025, 6, 10, 9, 0, 0).unwrap();
        // 02:00 UTC on the 10th is still the evening of the 9th at UTC-5
        let at = Utc
            .with_ymd_and_hms(2025, 6, 10, 2, 0, 0)
            .unwrap()
            .with_timezone(&tz);
        assert_eq!(format_relative_date(&at, &now), "Yesterday, 9:00 PM");
    }
}
