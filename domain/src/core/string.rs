//! String utilities for the domain layer.

/// Shorten a string to at most `max_chars` characters, ending with `...`
/// when anything was cut.
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Collapse internal whitespace runs (including newlines) into single spaces.
pub fn single_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_ascii() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 8), "hello...");
    }

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        assert_eq!(truncate("日本語テスト", 6), "日本語テスト");
        assert_eq!(truncate("日本語テスト文字列", 7), "日本語テ...");
    }

    #[test]
    fn test_single_line() {
        assert_eq!(single_line("  a\n b\t\tc "), "a b c");
    }
}
