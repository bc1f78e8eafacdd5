//! Fixed-decimal float formatting for panel text.
//!
//! Panels never print `NaN`/`inf`: values reaching this module have already
//! been coerced to finite numbers, but a stray non-finite value still renders
//! as `0` followed by the requested decimals.

#[inline]
pub fn fixed(v: f32, decimals: usize) -> String {
    fixed_f64(v as f64, decimals)
}

pub fn fixed_f64(v: f64, decimals: usize) -> String {
    let v = if v.is_finite() { v } else { 0.0 };
    // Clamp decimals to something reasonable to avoid huge powers.
    let decimals = decimals.min(9);
    let mut out = format!("{v:.decimals$}");
    // `-0.00` reads oddly in a table cell.
    if out.starts_with('-') && out[1..].chars().all(|c| c == '0' || c == '.') {
        out.remove(0);
    }
    out
}

/// `0.256 -> "25.60%"` with two decimals.
pub fn percent(share: f32, decimals: usize) -> String {
    let mut s = fixed_f64(share as f64 * 100.0, decimals);
    s.push('%');
    s
}

/// Comma-joined preview of the first `show` values. When the slice is longer,
/// a trailing `, ...` marks the truncation.
pub fn preview(values: &[f32], show: usize, decimals: usize) -> String {
    let head: Vec<String> = values
        .iter()
        .take(show)
        .map(|&v| fixed(v, decimals))
        .collect();
    let mut out = head.join(", ");
    if values.len() > show {
        out.push_str(", ...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_rounds_and_pads() {
        assert_eq!(fixed(0.25, 3), "0.250");
        assert_eq!(fixed(1.0, 0), "1");
        assert_eq!(fixed(f32::NAN, 2), "0.00");
        assert_eq!(fixed(-0.0001, 2), "0.00");
        assert_eq!(fixed(-1.5, 1), "-1.5");
    }

    #[test]
    fn percent_uses_two_decimals() {
        assert_eq!(percent(0.5, 2), "50.00%");
        assert_eq!(percent(0.25, 2), "25.00%");
    }

    #[test]
    fn preview_marks_truncation() {
        assert_eq!(preview(&[1.0, 2.0], 8, 1), "1.0, 2.0");
        assert_eq!(preview(&[1.0, 2.0, 3.0], 2, 1), "1.0, 2.0, ...");
        assert_eq!(preview(&[], 4, 2), "");
    }
}
