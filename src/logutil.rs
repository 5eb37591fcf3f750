//! Log helpers. Player names and chat text end up in log lines, so anything
//! multi-line or oversized is flattened first.

use std::fmt::Write;

/// Longest preview kept by [`escape_log`].
pub const MAX_PREVIEW: usize = 300;

/// Escape `s` onto one line, truncated to [`MAX_PREVIEW`] characters.
pub fn escape_log(s: &str) -> String {
    escape_log_with_limit(s, MAX_PREVIEW)
}

/// Escape backslashes and control characters (`\n`, `\r`, `\t`, others as
/// `\xNN`) and cut the result after `limit` source characters with `…`.
pub fn escape_log_with_limit(s: &str, limit: usize) -> String {
    let mut out = String::with_capacity(s.len().min(limit) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= limit {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_multiline_messages() {
        assert_eq!(
            escape_log("You chop at the oak.\nIt shudders.\t!"),
            "You chop at the oak.\\nIt shudders.\\t!"
        );
    }

    #[test]
    fn escapes_backslash_and_control() {
        assert_eq!(escape_log("a\\b\u{7}"), "a\\\\b\\x07");
    }

    #[test]
    fn truncates_long_input() {
        assert_eq!(escape_log_with_limit("abcdef", 3), "abc…");
        assert_eq!(escape_log(&"x".repeat(MAX_PREVIEW)).chars().count(), MAX_PREVIEW);
    }
}
