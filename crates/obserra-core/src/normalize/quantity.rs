//! Parsing of the display strings the backend uses for quantities.
//!
//! Every function here is total: text that does not match the grammar,
//! including the backend's `N/A` placeholder, yields zero.

const KIB: f64 = 1024.0;

/// Parse `"<number>[ ]<unit>"` into a plain number.
///
/// Byte units `B`, `KB`, `MB`, `GB`, `TB` are 1024-based. Count suffixes
/// `K` and `M` are 1000-based. A bare number is returned as is.
pub fn parse_quantity(text: &str) -> f64 {
    let text = text.trim();
    let split = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);

    let Ok(value) = number.parse::<f64>() else {
        return 0.0;
    };
    if !value.is_finite() {
        return 0.0;
    }

    let multiplier = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1.0,
        "KB" => KIB,
        "MB" => KIB * KIB,
        "GB" => KIB * KIB * KIB,
        "TB" => KIB * KIB * KIB * KIB,
        "K" => 1_000.0,
        "M" => 1_000_000.0,
        _ => return 0.0,
    };
    value * multiplier
}

/// Byte size rounded to a whole number of bytes.
pub fn parse_bytes(text: &str) -> u64 {
    parse_quantity(text).round() as u64
}

/// Parse an uptime such as `"1d 2h 3m 4s"` into seconds.
pub fn parse_duration_secs(text: &str) -> u64 {
    let mut total: u64 = 0;
    let mut parts = 0;

    for token in text.split_whitespace() {
        let Some(unit) = token.chars().last() else {
            continue;
        };
        let factor = match unit {
            'd' => 86_400,
            'h' => 3_600,
            'm' => 60,
            's' => 1,
            _ => return 0,
        };
        let Ok(amount) = token[..token.len() - 1].parse::<u64>() else {
            return 0;
        };
        total = total.saturating_add(amount.saturating_mul(factor));
        parts += 1;
    }

    if parts == 0 { 0 } else { total }
}

/// A finite, non-negative float or zero.
pub(crate) fn finite_or_zero(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() && v >= 0.0 => v,
        _ => 0.0,
    }
}
