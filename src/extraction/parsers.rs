//! Parsers for free-form field values
//!
//! Each parser returns `None` when the text does not parse; callers omit the
//! field rather than store a guess.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use std::sync::LazyLock;

/// Digit groups joined by `.`, `,` or `'`; a space only separates thousands.
static AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:[.,']\d+|[ ]\d{3}\b)*").unwrap());

static MULTIPLIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(miljard|billion|bn|miljoen|million|mln|mio|duizend|thousand)\b").unwrap()
});

/// An amount with the currency named next to it, if any
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAmount {
    pub value: f64,
    pub currency: Option<&'static str>,
}

fn detect_currency(text: &str) -> Option<&'static str> {
    let upper = text.to_uppercase();
    if text.contains('€') || upper.contains("EUR") {
        Some("EUR")
    } else if text.contains('$') || upper.contains("USD") {
        Some("USD")
    } else if text.contains('£') || upper.contains("GBP") {
        Some("GBP")
    } else {
        None
    }
}

/// Interpret a digit group that may use either `.` or `,` as thousands or
/// decimal separator.
fn normalize_number(raw: &str) -> Option<f64> {
    let compact: String = raw.chars().filter(|c| !matches!(c, ' ' | '\'')).collect();

    let last_dot = compact.rfind('.');
    let last_comma = compact.rfind(',');

    let decimal_sep = match (last_dot, last_comma) {
        (Some(d), Some(c)) => Some(if d > c { '.' } else { ',' }),
        (Some(_), None) => single_separator_decimal(&compact, '.'),
        (None, Some(_)) => single_separator_decimal(&compact, ','),
        (None, None) => None,
    };

    let canonical: String = match decimal_sep {
        Some(sep) => {
            let idx = compact.rfind(sep)?;
            let (int_part, frac_part) = compact.split_at(idx);
            let int_digits: String = int_part.chars().filter(char::is_ascii_digit).collect();
            format!("{}.{}", int_digits, &frac_part[1..])
        }
        None => compact.chars().filter(char::is_ascii_digit).collect(),
    };

    canonical.parse().ok()
}

/// With only one separator kind: repeated, or followed by exactly three
/// digits, means thousands grouping.
fn single_separator_decimal(text: &str, sep: char) -> Option<char> {
    if text.matches(sep).count() > 1 {
        return None;
    }
    let idx = text.find(sep)?;
    let digits_after = text[idx + 1..].chars().filter(char::is_ascii_digit).count();
    if digits_after == 3 {
        None
    } else {
        Some(sep)
    }
}

/// Parse an amount such as `€ 1.250.000,00`, `EUR 500,000` or `2,5 miljoen euro`.
pub fn parse_currency(text: &str) -> Option<ParsedAmount> {
    let raw = AMOUNT.find(text)?;
    let mut value = normalize_number(raw.as_str().trim())?;

    if let Some(m) = MULTIPLIER.find(&text[raw.end()..]) {
        value *= match m.as_str().to_lowercase().as_str() {
            "miljard" | "billion" | "bn" => 1e9,
            "miljoen" | "million" | "mln" | "mio" => 1e6,
            _ => 1e3,
        };
    }

    Some(ParsedAmount {
        value,
        currency: detect_currency(text),
    })
}

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})").unwrap());

static NUMERIC_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})[-/.](\d{1,2})[-/.](\d{4})\b").unwrap());

static DAY_MONTH_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?:st|nd|rd|th|e)?\s+([a-z]+)\.?\s+(\d{4})\b").unwrap()
});

static MONTH_DAY_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b([a-z]+)\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})\b").unwrap());

/// Hour and minute not preceded by another digit ("T17:00", "om 10.30")
static TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\D)([01]?\d|2[0-3])[:.]([0-5]\d)\b").unwrap());

fn month_number(name: &str) -> Option<u32> {
    let name = name.to_lowercase();
    let month = match name.as_str() {
        "januari" | "january" | "jan" => 1,
        "februari" | "february" | "feb" => 2,
        "maart" | "march" | "mrt" | "mar" => 3,
        "april" | "apr" => 4,
        "mei" | "may" => 5,
        "juni" | "june" | "jun" => 6,
        "juli" | "july" | "jul" => 7,
        "augustus" | "august" | "aug" => 8,
        "september" | "sept" | "sep" => 9,
        "oktober" | "october" | "okt" | "oct" => 10,
        "november" | "nov" => 11,
        "december" | "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn find_date(text: &str) -> Option<(NaiveDate, usize)> {
    // An impossible date in one format falls through to the next candidate.
    let iso = || {
        ISO_DATE.captures_iter(text).find_map(|c| {
            let date =
                NaiveDate::from_ymd_opt(c[1].parse().ok()?, c[2].parse().ok()?, c[3].parse().ok()?)?;
            Some((date, c.get(0)?.end()))
        })
    };
    // Day first, as written in European tenders
    let numeric = || {
        NUMERIC_DATE.captures_iter(text).find_map(|c| {
            let date =
                NaiveDate::from_ymd_opt(c[3].parse().ok()?, c[2].parse().ok()?, c[1].parse().ok()?)?;
            Some((date, c.get(0)?.end()))
        })
    };
    let day_month = || {
        DAY_MONTH_YEAR.captures_iter(text).find_map(|c| {
            let month = month_number(&c[2])?;
            let date = NaiveDate::from_ymd_opt(c[3].parse().ok()?, month, c[1].parse().ok()?)?;
            Some((date, c.get(0)?.end()))
        })
    };
    let month_day = || {
        MONTH_DAY_YEAR.captures_iter(text).find_map(|c| {
            let month = month_number(&c[1])?;
            let date = NaiveDate::from_ymd_opt(c[3].parse().ok()?, month, c[2].parse().ok()?)?;
            Some((date, c.get(0)?.end()))
        })
    };

    iso().or_else(numeric).or_else(day_month).or_else(month_day)
}

/// Parse a date with optional time of day out of free text, e.g.
/// `"15 maart 2024 om 12:00 uur"`, `"2024-01-20T17:00"`, `"20-01-2024"`.
/// Without a time the result is midnight.
pub fn parse_date(text: &str) -> Option<NaiveDateTime> {
    let (date, date_end) = find_date(text)?;

    let time = TIME
        .captures(&text[date_end..])
        .and_then(|c| NaiveTime::from_hms_opt(c[1].parse().ok()?, c[2].parse().ok()?, 0))
        .unwrap_or(NaiveTime::MIN);

    Some(date.and_time(time))
}

static WEIGHTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<name>.+?)\s*(?::\s*|\s+)(?P<weight>\d+(?:[.,]\d+)?)\s*(?P<pct>%|procent|percent)?\s*$")
        .unwrap()
});

/// Parse `"Prijs: 40%"` into `("Prijs", 0.4)`. A weight without a percent
/// sign is taken as-is and requires a colon separator.
pub fn parse_weighted_criterion(text: &str) -> Option<(String, f64)> {
    let caps = WEIGHTED.captures(text)?;
    let name = caps["name"].trim().trim_end_matches(['-', '=']).trim();
    if name.is_empty() {
        return None;
    }

    let weight: f64 = caps["weight"].replace(',', ".").parse().ok()?;
    let has_colon = text.contains(':');

    match caps.name("pct") {
        Some(_) => Some((name.to_string(), weight / 100.0)),
        None if has_colon => Some((name.to_string(), weight)),
        None => None,
    }
}

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\w.+-]+@[\w-]+(?:\.[\w-]+)+").unwrap());

static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\+?\d[\d\s\-()]{7,}\d").unwrap());

static ROLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(([^)]+)\)").unwrap());

/// Name, role, email and phone pulled out of one contact line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedContact {
    pub name: String,
    pub role: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Parse `"J. de Vries (inkoper), j.devries@utrecht.nl, 030-2861111"`.
pub fn parse_contact(text: &str) -> Option<ParsedContact> {
    let email = EMAIL.find(text).map(|m| m.as_str().to_string());
    let without_email = EMAIL.replace_all(text, "");

    let phone = PHONE
        .find(&without_email)
        .map(|m| m.as_str().trim().to_string());
    let without_phone = PHONE.replace_all(&without_email, "");

    let role = ROLE
        .captures(&without_phone)
        .map(|c| c[1].trim().to_string())
        .filter(|r| !r.is_empty());
    let rest = ROLE.replace_all(&without_phone, "");

    let name = rest
        .split([',', ';', '|', '\n'])
        .map(|part| {
            part.trim()
                .trim_start_matches(|c: char| c == '-' || c == ':' || c.is_whitespace())
                .trim_end_matches(|c: char| c == '-' || c == ':' || c.is_whitespace())
        })
        .find(|part| !part.is_empty())
        .map(str::to_string)
        .or_else(|| email.clone())?;

    Some(ParsedContact {
        name,
        role,
        email,
        phone,
    })
}
