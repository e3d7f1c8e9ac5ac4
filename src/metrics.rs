/// Convert a display-formatted count such as `"12.3K"`, `"4,500"` or `"2M"`
/// into its magnitude.
///
/// Thousands separators are dropped, a single trailing `K`/`M` suffix
/// (either case) scales the value. Anything that does not start with a number
/// after that yields `0.0`; the result is never negative.
pub fn parse_metric(raw: &str) -> f64 {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return 0.0;
    }

    let (body, multiplier) = match cleaned.chars().last() {
        Some('k' | 'K') => (&cleaned[..cleaned.len() - 1], 1_000.0),
        Some('m' | 'M') => (&cleaned[..cleaned.len() - 1], 1_000_000.0),
        _ => (cleaned.as_str(), 1.0),
    };

    match leading_number(body.trim()) {
        Some(n) if n.is_finite() && n > 0.0 => n * multiplier,
        _ => 0.0,
    }
}

/// Parse the longest numeric prefix (digits with at most one decimal point).
pub(crate) fn leading_number(s: &str) -> Option<f64> {
    let mut end = 0;
    let mut seen_dot = false;
    for (i, c) in s.char_indices() {
        match c {
            '0'..='9' => end = i + 1,
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
    }
    if end == 0 {
        return None;
    }
    s[..end].parse().ok()
}
