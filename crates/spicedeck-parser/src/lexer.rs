//! Token scanner for one logical line.
//!
//! SPICE tokens are whitespace separated words plus a handful of
//! punctuation marks. `{...}` bodies are captured whole (braces nest) and
//! handed to the expression sub-parser later; quoted strings lose their
//! quotes here.

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Word(String),
    /// The raw text between balanced `{` and `}`.
    Braced(String),
    Equals,
    LParen,
    RParen,
    Comma,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpannedToken {
    pub token: Token,
    /// 1-based column of the token start within the logical line.
    pub column: usize,
}

/// Characters that terminate a bare word.
fn is_special(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '{' | '}' | '=' | ',' | '"')
}

/// Tokenize a logical line.
pub fn tokenize(text: &str, line: usize) -> Result<Vec<SpannedToken>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let mut pos = 0;
    while pos < chars.len() {
        let c = chars[pos];
        let column = pos + 1;
        match c {
            _ if c.is_whitespace() => {
                pos += 1;
            }
            '=' => {
                tokens.push(SpannedToken {
                    token: Token::Equals,
                    column,
                });
                pos += 1;
            }
            '(' => {
                tokens.push(SpannedToken {
                    token: Token::LParen,
                    column,
                });
                pos += 1;
            }
            ')' => {
                tokens.push(SpannedToken {
                    token: Token::RParen,
                    column,
                });
                pos += 1;
            }
            ',' => {
                tokens.push(SpannedToken {
                    token: Token::Comma,
                    column,
                });
                pos += 1;
            }
            '{' => {
                let mut depth = 1;
                let mut end = pos + 1;
                while end < chars.len() && depth > 0 {
                    match chars[end] {
                        '{' => depth += 1,
                        '}' => depth -= 1,
                        _ => {}
                    }
                    end += 1;
                }
                if depth > 0 {
                    return Err(Error::grammar(line, column, "unbalanced '{'"));
                }
                let inner: String = chars[pos + 1..end - 1].iter().collect();
                tokens.push(SpannedToken {
                    token: Token::Braced(inner.trim().to_string()),
                    column,
                });
                pos = end;
            }
            '}' => {
                return Err(Error::grammar(line, column, "unexpected '}'"));
            }
            '"' => {
                let mut end = pos + 1;
                while end < chars.len() && chars[end] != '"' {
                    end += 1;
                }
                if end == chars.len() {
                    return Err(Error::grammar(line, column, "unterminated string"));
                }
                let inner: String = chars[pos + 1..end].iter().collect();
                tokens.push(SpannedToken {
                    token: Token::Word(inner),
                    column,
                });
                pos = end + 1;
            }
            _ => {
                let start = pos;
                while pos < chars.len() && !is_special(chars[pos]) {
                    pos += 1;
                }
                let word: String = chars[start..pos].iter().collect();
                tokens.push(SpannedToken {
                    token: Token::Word(word),
                    column,
                });
            }
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(text: &str) -> Vec<Token> {
        tokenize(text, 1).unwrap().into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn test_words_and_punctuation() {
        assert_eq!(
            words("R1 1 2 r=1k"),
            vec![
                Token::Word("R1".into()),
                Token::Word("1".into()),
                Token::Word("2".into()),
                Token::Word("r".into()),
                Token::Equals,
                Token::Word("1k".into()),
            ]
        );
    }

    #[test]
    fn test_braced_body_captured_whole() {
        assert_eq!(
            words("B1 1 0 V={2 * {a}}"),
            vec![
                Token::Word("B1".into()),
                Token::Word("1".into()),
                Token::Word("0".into()),
                Token::Word("V".into()),
                Token::Equals,
                Token::Braced("2 * {a}".into()),
            ]
        );
    }

    #[test]
    fn test_quotes_are_stripped() {
        assert_eq!(
            words(".include \"sub dir/file.cir\""),
            vec![
                Token::Word(".include".into()),
                Token::Word("sub dir/file.cir".into()),
            ]
        );
    }

    #[test]
    fn test_unbalanced_brace_is_fatal() {
        assert!(tokenize("B1 1 0 V={1 + 2", 4).is_err());
    }
}
