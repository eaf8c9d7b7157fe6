//! Shared utility functions.

/// Longest prefix of `s` that fits in `max_bytes` and ends on a character
/// boundary. Used for log previews of questions, payloads and error bodies.
pub fn truncate_str(s: &str, max_bytes: usize) -> &str {
    let end = s
        .char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .take_while(|&end| end <= max_bytes)
        .last()
        .unwrap_or(0);
    &s[..end]
}
