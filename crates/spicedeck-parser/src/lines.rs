//! Logical line assembly.
//!
//! SPICE is line oriented: a physical line starting with `+` continues the
//! previous logical line, `*` in column 0 opens a full-line comment, and
//! `;` opens a comment to end of line. Comment and blank lines vanish here
//! but never shift the numbering of what remains.

use crate::error::{Error, Result};

/// One logical line, tagged with the physical line number it started on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    pub number: usize,
    pub text: String,
}

/// Join physical lines into logical lines.
pub fn logical_lines(source: &str) -> Result<Vec<LogicalLine>> {
    let mut out: Vec<LogicalLine> = Vec::new();
    for (index, raw) in source.lines().enumerate() {
        let number = index + 1;
        if raw.starts_with('*') {
            continue;
        }
        let stripped = match raw.find(';') {
            Some(pos) => &raw[..pos],
            None => raw,
        };
        let trimmed = stripped.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix('+') {
            let Some(last) = out.last_mut() else {
                return Err(Error::grammar(number, 1, "unexpected line continuation"));
            };
            last.text.push(' ');
            last.text.push_str(rest.trim());
        } else {
            out.push(LogicalLine {
                number,
                text: trimmed.to_string(),
            });
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_continuation_joins_with_space() {
        let lines = logical_lines("Title\nR1 1 2\n+ 1k\n").unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].text, "R1 1 2 1k");
        assert_eq!(lines[1].number, 2);
    }

    #[test]
    fn test_comments_do_not_shift_line_numbers() {
        let lines = logical_lines("Title\n* comment\nR1 1 2 1k ; trailing\n").unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].text, "R1 1 2 1k");
        assert_eq!(lines[1].number, 3);
    }

    #[test]
    fn test_comment_between_continuations() {
        let lines = logical_lines("Title\nR1 1 2\n* interleaved\n+ 1k\n").unwrap();
        assert_eq!(lines[1].text, "R1 1 2 1k");
    }

    #[test]
    fn test_leading_continuation_is_fatal() {
        let err = logical_lines("+ 1k\n").unwrap_err();
        assert!(err.to_string().contains("line continuation"));
    }
}
