//! Theme color helpers
//!
//! The dashboard sends tenant theme colors as `#RRGGBB` hex strings; the
//! public menu renders them as `rgba(...)` with a configurable alpha.

/// Parse a `#RRGGBB` (or `RRGGBB`) hex color string.
///
/// Returns `None` for anything that is not exactly six hex digits, leaving
/// the fallback decision to the caller.
pub fn parse_hex_color(input: &str) -> Option<(u8, u8, u8)> {
    let hex = input.strip_prefix('#').unwrap_or(input);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some((r, g, b))
}

/// Convert a hex color to an `rgba(...)` string.
///
/// Malformed input is returned unchanged so a broken tenant theme degrades
/// to whatever the browser makes of the raw value instead of failing the
/// render.
pub fn hex_to_rgba(input: &str, alpha: f32) -> String {
    match parse_hex_color(input) {
        Some((r, g, b)) => format!("rgba({}, {}, {}, {})", r, g, b, alpha),
        None => input.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_hex() {
        assert_eq!(parse_hex_color("#ff8000"), Some((255, 128, 0)));
        assert_eq!(parse_hex_color("00FF00"), Some((0, 255, 0)));
    }

    #[test]
    fn test_parse_malformed_hex() {
        assert_eq!(parse_hex_color("#fff"), None);
        assert_eq!(parse_hex_color("not-a-color"), None);
        assert_eq!(parse_hex_color("#12345g"), None);
        assert_eq!(parse_hex_color(""), None);
    }

    #[test]
    fn test_hex_to_rgba() {
        assert_eq!(hex_to_rgba("#ff8000", 0.5), "rgba(255, 128, 0, 0.5)");
    }

    #[test]
    fn test_hex_to_rgba_malformed_returns_input() {
        assert_eq!(hex_to_rgba("tomato", 0.5), "tomato");
    }
}
