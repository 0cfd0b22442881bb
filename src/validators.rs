use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex"));
static DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date regex"));
static TIME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{2}:\d{2}$").expect("time regex"));

/// `local@domain.tld` shape: no whitespace, one `@`, a dot after it.
pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

pub fn is_non_empty(value: &str) -> bool {
    !value.trim().is_empty()
}

pub fn is_valid_password(value: &str) -> bool {
    value.len() >= 6
}

/// `YYYY-MM-DD` with numeric groups. Format only; calendar validity is
/// checked where the date is actually interpreted.
pub fn is_valid_date(value: &str) -> bool {
    DATE_RE.is_match(value)
}

/// Empty, or `HH:MM` with numeric groups.
pub fn is_valid_time(value: &str) -> bool {
    value.is_empty() || TIME_RE.is_match(value)
}
