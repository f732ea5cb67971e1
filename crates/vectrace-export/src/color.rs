//! Colour helpers for stroke and fill attributes.

use crate::ExportError;

/// Convert `#rrggbb` (or `#rgb`) plus an opacity into `rgba(r, g, b, a)`.
///
/// The leading `#` is optional. Opacity is clamped to `[0, 1]`.
///
/// # Errors
///
/// Returns [`ExportError::InvalidColor`] if `hex` is not a 3- or 6-digit
/// hexadecimal colour.
///
/// # Examples
///
/// ```
/// use vectrace_export::hex_to_rgba;
///
/// assert_eq!(hex_to_rgba("#ff8000", 0.5).unwrap(), "rgba(255, 128, 0, 0.5)");
/// ```
pub fn hex_to_rgba(hex: &str, opacity: f64) -> Result<String, ExportError> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    let invalid = || ExportError::InvalidColor(hex.to_owned());
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());
    let (r, g, b) = match digits.len() {
        6 => (
            channel(&digits[0..2])?,
            channel(&digits[2..4])?,
            channel(&digits[4..6])?,
        ),
        // #rgb expands each digit: f -> ff.
        3 => (
            channel(&digits[0..1])? * 17,
            channel(&digits[1..2])? * 17,
            channel(&digits[2..3])? * 17,
        ),
        _ => return Err(invalid()),
    };
    let alpha = if opacity.is_nan() { 1.0 } else { opacity.clamp(0.0, 1.0) };
    Ok(format!("rgba({r}, {g}, {b}, {alpha})"))
}
