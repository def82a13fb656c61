//! Formatting of the comments the bot posts.
//!
//! Every bot comment ends with a hidden instruction, so that reading the
//! comment back on the next poll acknowledges what it reported.

use crate::instructions::MARKER;

/// Review host comment size limit (65536 characters).
pub const COMMENT_SIZE_LIMIT: usize = 65536;

/// Room kept for the hidden instruction and the truncation notice.
const FOOTER_RESERVE: usize = 256;

/// Appends a hidden `instruction` to `body`.
///
/// Bodies exceeding the host limit are truncated on a character boundary.
pub fn with_hidden_instruction(body: &str, instruction: &str) -> String {
    let body = truncate(body.trim_end(), COMMENT_SIZE_LIMIT - FOOTER_RESERVE);
    format!("{}\n\n<!--\n{} {}\n-->\n", body, MARKER, instruction)
}

fn truncate(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }
    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\n\n*(truncated)*", &text[..end])
}

/// Formats `@login` mentions.
pub fn mentions<'a>(logins: impl IntoIterator<Item = &'a String>) -> String {
    logins
        .into_iter()
        .map(|login| format!("@{}", login))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instructions::parse_instructions;
    use chrono::Utc;

    #[test]
    fn hidden_instruction_is_parsed_back() {
        let body = with_hidden_instruction("Something broke.", "reset-errors");
        assert!(body.starts_with("Something broke."));

        let instructions = parse_instructions(&body, "bot", Utc::now());
        assert_eq!(instructions.len(), 1);
        assert_eq!(instructions[0].name, "reset-errors");
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "é".repeat(COMMENT_SIZE_LIMIT);
        let comment = with_hidden_instruction(&body, "report-done");
        assert!(comment.len() <= COMMENT_SIZE_LIMIT);
        assert!(comment.contains("*(truncated)*"));
        assert!(comment.ends_with("jenkins: report-done\n-->\n"));
    }

    #[test]
    fn mentions_are_space_separated() {
        let logins = vec!["asker1".to_string(), "asker2".to_string()];
        assert_eq!(mentions(&logins), "@asker1 @asker2");
    }
}
