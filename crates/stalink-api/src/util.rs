/// Longest response body preview written to logs and error messages.
pub const LOG_BODY_LIMIT: usize = 200;

/// Make `text` safe for a single log line: abbreviate to `max_len` chars
/// (ending in `...`), then drop `\n`, `\r` and `\t`.
pub fn clean_for_logging(text: &str, max_len: usize) -> String {
    let abbreviated = if text.chars().count() > max_len && max_len >= 3 {
        let mut head: String = text.chars().take(max_len - 3).collect();
        head.push_str("...");
        head
    } else {
        text.to_owned()
    };
    abbreviated
        .chars()
        .filter(|c| !matches!(c, '\n' | '\r' | '\t'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_control_whitespace() {
        assert_eq!(clean_for_logging("a\nb\r\tc", 50), "abc");
    }

    #[test]
    fn abbreviates_long_text() {
        assert_eq!(clean_for_logging("abcdefghij", 6), "abc...");
        assert_eq!(clean_for_logging("abcdef", 6), "abcdef");
    }
}
