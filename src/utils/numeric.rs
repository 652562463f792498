use std::sync::LazyLock;

use regex::Regex;

static NUMERIC_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[-+]?[0-9]+(?:\.[0-9]+)?)+$").expect("numeric regex"));

// Whether a cell holds a plain decimal number ("88", "-2", "0.6"), nothing else.
pub fn is_numeric(text: &str) -> bool {
    NUMERIC_REGEX.is_match(text)
}

// Parses a cell only when `is_numeric` accepts it.
pub fn parse_numeric(text: &str) -> Option<f64> {
    if is_numeric(text) {
        text.parse().ok()
    } else {
        None
    }
}

// Arithmetic mean; `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}
