//! Column-width helpers for fixed-width rows.

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Truncate `s` with an ellipsis so it fits in `width` columns.
pub fn fit(s: &str, width: usize) -> String {
    if s.width() <= width {
        return s.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in s.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}

/// `fit` then right-pad with spaces to exactly `width` columns.
pub fn pad(s: &str, width: usize) -> String {
    let mut out = fit(s, width);
    let w = out.width();
    if w < width {
        out.push_str(&" ".repeat(width - w));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_truncates_with_ellipsis() {
        assert_eq!(fit("short", 10), "short");
        let long = fit("No wallet provider available at http://127.0.0.1:8545.", 12);
        assert_eq!(long, "No wallet p…");
        assert_eq!(long.width(), 12);
        assert_eq!(fit("abc", 0), "");
    }

    #[test]
    fn test_pad_is_exact_width() {
        assert_eq!(pad("FE!N", 6), "FE!N  ");
        assert_eq!(pad("Not Like Us", 6).width(), 6);
        assert_eq!(pad("日本語", 5).width(), 5);
    }
}
