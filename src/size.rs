//! Human-readable byte sizes (1024 based).

use crate::error::ConfigurationError;

const SYMBOLS: [char; 9] = ['B', 'K', 'M', 'G', 'T', 'P', 'E', 'Z', 'Y'];

fn multiplier(exponent: usize) -> f64 {
    1024f64.powi(exponent as i32)
}

/// Parse a size such as `4096`, `200MB`, `1.5G` or `10 kb`.
///
/// The unit letter is optional and may be followed by `B`. Values that do not fit in
/// a `u64` are rejected.
pub fn parse_size(input: &str) -> Result<u64, ConfigurationError> {
    let invalid = || ConfigurationError::InvalidSize(input.to_string());
    let text = input.trim().to_ascii_uppercase();
    if text.is_empty() {
        return Err(invalid());
    }
    if let Ok(bytes) = text.parse::<u64>() {
        return Ok(bytes);
    }

    let split = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .ok_or_else(invalid)?;
    let (number, unit) = text.split_at(split);
    let number: f64 = number.trim().parse().map_err(|_| invalid())?;
    let unit = unit.trim();

    let mut chars = unit.chars();
    let symbol = chars.next().ok_or_else(invalid)?;
    let exponent = SYMBOLS.iter().position(|s| *s == symbol).ok_or_else(invalid)?;
    match chars.as_str() {
        "" => {}
        "B" if exponent > 0 => {}
        _ => return Err(invalid()),
    }

    let bytes = number * multiplier(exponent);
    if !bytes.is_finite() || bytes < 0.0 || bytes >= u64::MAX as f64 {
        return Err(invalid());
    }
    Ok(bytes as u64)
}

/// Format a byte count with one decimal digit, e.g. `1.5G`.
pub fn format_size(bytes: u64) -> String {
    format_size_with(bytes, 1)
}

pub fn format_size_with(bytes: u64, digits: usize) -> String {
    let mut exponent = 0;
    while exponent + 1 < SYMBOLS.len() && (bytes as f64) >= multiplier(exponent + 1) {
        exponent += 1;
    }
    let scaled = bytes as f64 / multiplier(exponent);
    format!("{:.*}{}", digits, scaled, SYMBOLS[exponent])
}
