//! Field parsers for raw catalog page text
//!
//! These are pure functions; the orchestrator decides which parse failures are
//! fatal to a record.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

/// Release date layouts seen on catalog pages ("4 Apr, 2024", "Apr 4, 2024")
const DATE_FORMATS: [&str; 4] = ["%d %b, %Y", "%b %d, %Y", "%d %B, %Y", "%B %d, %Y"];

fn rating_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(\d+)%\s+(?:of the|af de)\s+([\d,.]+)\s+(?:user reviews|brugeranmeldelser)")
            .expect("rating pattern is a valid regex")
    })
}

fn discount_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(\d+(?:[.,]\d+)?)\s*%").expect("discount pattern is a valid regex")
    })
}

/// Parses a displayed price into currency units
///
/// Everything but digits, `,` and `.` is dropped. The last separator is the
/// decimal point when exactly two digits follow it; every other separator
/// groups thousands. Text without digits ("Free to Play") is a price of 0.
///
/// # Examples
///
/// ```
/// use bundle_harvest::extract::parse_price;
///
/// assert_eq!(parse_price("$19.99"), 19.99);
/// assert_eq!(parse_price("1.234,56€"), 1234.56);
/// assert_eq!(parse_price("Free to Play"), 0.0);
/// ```
pub fn parse_price(text: &str) -> f64 {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();

    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return 0.0;
    }

    let (whole, fraction) = match cleaned.rfind(|c| c == ',' || c == '.') {
        Some(pos) if cleaned.len() - pos - 1 == 2 => (&cleaned[..pos], &cleaned[pos + 1..]),
        _ => (cleaned.as_str(), ""),
    };

    let whole_digits: String = whole.chars().filter(|c| c.is_ascii_digit()).collect();
    let number = if fraction.is_empty() {
        whole_digits
    } else {
        format!("{}.{}", whole_digits, fraction)
    };

    number.parse().unwrap_or(0.0)
}

/// Parses a review summary into `(score, count)`
///
/// Accepts "96% of the 151,234 user reviews ..." and the Danish
/// "96% af de 151.234 brugeranmeldelser ..." wording. The score is the
/// percentage as a fraction.
pub fn parse_rating(text: &str) -> Option<(f64, u64)> {
    let caps = rating_pattern().captures(text)?;

    let percent: f64 = caps.get(1)?.as_str().parse().ok()?;
    let count: u64 = caps
        .get(2)?
        .as_str()
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .ok()?;

    Some((percent / 100.0, count))
}

/// Parses a discount badge ("-25%") into a fraction (0.25)
pub fn parse_discount(text: &str) -> Option<f64> {
    let caps = discount_pattern().captures(text)?;
    let value: f64 = caps.get(1)?.as_str().replace(',', ".").parse().ok()?;
    Some(value / 100.0)
}

/// Parses a release date
///
/// Only the last non-empty line counts, and a leading "Release Date:" style
/// label is dropped. Returns `None` for text such as "Coming soon".
pub fn parse_release_date(text: &str) -> Option<NaiveDate> {
    let line = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()?;

    let line = match line.rfind(':') {
        Some(pos) => line[pos + 1..].trim(),
        None => line,
    };

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(line, format).ok())
}

/// Trims and lower-cases tags, dropping empty ones; order is kept
pub fn normalize_tags<I, T>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    raw.into_iter()
        .map(|tag| tag.as_ref().trim().to_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect()
}
