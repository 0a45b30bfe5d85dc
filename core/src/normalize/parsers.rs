use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::{prelude::ToPrimitive, Decimal};

const CURRENCY_SYMBOLS: &[char] = &['€', '$', '£'];

/// Whitespace-only (or empty) cells count as blank.
pub fn is_blank(raw: &str) -> bool {
    raw.trim().is_empty()
}

/// Parses an amount like `"1,234€"` or `"10,50 €"` into a decimal with two fraction digits.
///
/// Symbols and whitespace are stripped first. When both `,` and `.` appear the last one is the
/// decimal mark, and a mark that repeats is always a thousands separator. A lone mark of either
/// kind is a thousands separator only when exactly three digits follow it and it splits off a
/// non-zero leading group of one to three digits.
pub fn parse_currency(raw: &str) -> Option<Decimal> {
    let cleaned: String =
        raw.chars().filter(|c| !CURRENCY_SYMBOLS.contains(c) && !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return None;
    }

    let value = Decimal::from_str(&normalize_separators(&cleaned)).ok()?;
    let mut rounded = value.round_dp(2);
    rounded.rescale(2);
    Some(rounded)
}

fn normalize_separators(value: &str) -> String {
    let commas = value.matches(',').count();
    let dots = value.matches('.').count();

    match (commas, dots) {
        (0, 0) => value.to_string(),
        (1, 0) => normalize_lone_separator(value, ','),
        (0, 1) => normalize_lone_separator(value, '.'),
        (_, 0) => value.replace(',', ""),
        (0, _) => value.replace('.', ""),
        _ => {
            if value.rfind(',') > value.rfind('.') {
                value.replace('.', "").replace(',', ".")
            } else {
                value.replace(',', "")
            }
        }
    }
}

fn normalize_lone_separator(value: &str, separator: char) -> String {
    let Some((leading, fraction)) = value.split_once(separator) else {
        return value.to_string();
    };
    let group = leading.strip_prefix(['-', '+']).unwrap_or(leading);

    let is_grouping = fraction.len() == 3
        && fraction.chars().all(|c| c.is_ascii_digit())
        && (1..=3).contains(&group.len())
        && group.chars().all(|c| c.is_ascii_digit())
        && group != "0";

    if is_grouping {
        format!("{}{}", leading, fraction)
    } else {
        format!("{}.{}", leading, fraction)
    }
}

/// Parses a numeric identifier, blank and non-integral values coerce to `None`.
pub fn parse_identifier(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = trimmed.parse::<i64>() {
        return Some(value);
    }

    // sheets sometimes render ids as "12.0"
    let value = Decimal::from_str(trimmed).ok()?;
    if value.fract().is_zero() {
        value.to_i64()
    } else {
        None
    }
}

/// Parses a date in the given `strftime` format, anything else coerces to `None`.
pub fn parse_date(raw: &str, format: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, format).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    #[test]
    fn test_parse_currency_thousands_separator() {
        assert_eq!(parse_currency("1,234€"), Some(dec("1234.00")));
        assert_eq!(parse_currency("1,234,567€"), Some(dec("1234567.00")));
        assert_eq!(parse_currency("1.234.567"), Some(dec("1234567.00")));
    }

    #[test]
    fn test_parse_currency_decimal_comma() {
        assert_eq!(parse_currency("10,50€"), Some(dec("10.50")));
        assert_eq!(parse_currency("10,5 €"), Some(dec("10.50")));
        assert_eq!(parse_currency("1.234,56€"), Some(dec("1234.56")));
    }

    #[test]
    fn test_parse_currency_decimal_point() {
        assert_eq!(parse_currency("$1,234.56"), Some(dec("1234.56")));
        assert_eq!(parse_currency("12.5"), Some(dec("12.50")));
        assert_eq!(parse_currency("-3.2€"), Some(dec("-3.20")));
    }

    #[test]
    fn test_parse_currency_lone_separator_reads_the_same_either_way() {
        assert_eq!(parse_currency("1.234€"), Some(dec("1234.00")));
        assert_eq!(parse_currency("1,234€"), Some(dec("1234.00")));
        assert_eq!(parse_currency("99.999"), Some(dec("99999.00")));
        assert_eq!(parse_currency("99,999"), Some(dec("99999.00")));
        assert_eq!(parse_currency("-1.500"), Some(dec("-1500.00")));
    }

    #[test]
    fn test_parse_currency_lone_separator_after_zero_or_long_group_is_decimal() {
        assert_eq!(parse_currency("0,125€"), Some(dec("0.12")));
        assert_eq!(parse_currency("0.125"), Some(dec("0.12")));
        assert_eq!(parse_currency("1234,567"), Some(dec("1234.57")));
        assert_eq!(parse_currency("1234.567"), Some(dec("1234.57")));
    }

    #[test]
    fn test_parse_currency_both_separators() {
        assert_eq!(parse_currency("1.234,00€"), Some(dec("1234.00")));
        assert_eq!(parse_currency("1,234.00"), Some(dec("1234.00")));
        assert_eq!(parse_currency("1.234.567,891"), Some(dec("1234567.89")));
    }

    #[test]
    fn test_parse_currency_keeps_two_fraction_digits() {
        assert_eq!(parse_currency("1,234€").unwrap().to_string(), "1234.00");
        assert_eq!(parse_currency("0.125").unwrap().to_string(), "0.12");
    }

    #[test]
    fn test_parse_currency_blank_and_garbage() {
        assert_eq!(parse_currency(""), None);
        assert_eq!(parse_currency("€"), None);
        assert_eq!(parse_currency("   "), None);
        assert_eq!(parse_currency("n/a"), None);
    }

    #[test]
    fn test_parse_identifier() {
        assert_eq!(parse_identifier("42"), Some(42));
        assert_eq!(parse_identifier(" 7 "), Some(7));
        assert_eq!(parse_identifier("12.0"), Some(12));
        assert_eq!(parse_identifier("   "), None);
        assert_eq!(parse_identifier(""), None);
        assert_eq!(parse_identifier("1.5"), None);
        assert_eq!(parse_identifier("abc"), None);
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("05/03/2025", "%d/%m/%Y"), NaiveDate::from_ymd_opt(2025, 3, 5));
        assert_eq!(parse_date(" 31/12/2024 ", "%d/%m/%Y"), NaiveDate::from_ymd_opt(2024, 12, 31));
        assert_eq!(parse_date("not-a-date", "%d/%m/%Y"), None);
        assert_eq!(parse_date("31/02/2025", "%d/%m/%Y"), None);
        assert_eq!(parse_date("2025-03-05", "%d/%m/%Y"), None);
        assert_eq!(parse_date("", "%d/%m/%Y"), None);
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(""));
        assert!(is_blank("   "));
        assert!(is_blank("\t\n"));
        assert!(!is_blank(" x "));
    }
}
