//! Expression sub-parser for `{...}` bodies.
//!
//! Precedence, loosest first: `?:`, `||`, `^^`, `&&`, `!`, relational,
//! `+ -`, `* / %`, unary sign, `**`, atom. Relational operators do not
//! chain. The ternary lowers to the `if` built-in, mirroring how the
//! dialect treats `c ? a : b` and `if(c, a, b)` as the same thing.

use spicedeck_core::expr::{BinaryOp, Expr, Function, UnaryOp};
use spicedeck_core::units::{parse_complex, parse_value};

use crate::error::{Error, Result};

/// Parse one brace-delimited expression body.
pub fn parse_expression(text: &str, line: usize) -> Result<Expr> {
    let tokens = scan(text, line)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        line,
    };
    let expr = parser.ternary()?;
    if parser.pos != parser.tokens.len() {
        return Err(parser.error("trailing tokens in expression"));
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Number(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    Bang,
    AndAnd,
    OrOr,
    XorXor,
    Lt,
    Le,
    EqEq,
    Ne,
    Ge,
    Gt,
    Question,
    Colon,
    LParen,
    RParen,
    Comma,
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.')
}

fn scan(text: &str, line: usize) -> Result<Vec<(Tok, usize)>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < chars.len() {
        let c = chars[pos];
        let column = pos + 1;
        let next = chars.get(pos + 1).copied();
        match c {
            _ if c.is_whitespace() => {
                pos += 1;
                continue;
            }
            _ if c.is_ascii_digit() || (c == '.' && chars.get(pos + 1).is_some_and(|d| d.is_ascii_digit())) => {
                let start = pos;
                while pos < chars.len() && (chars[pos].is_ascii_digit() || chars[pos] == '.') {
                    pos += 1;
                }
                // exponent
                if pos < chars.len()
                    && matches!(chars[pos], 'e' | 'E')
                    && chars
                        .get(pos + 1)
                        .is_some_and(|d| d.is_ascii_digit() || matches!(d, '+' | '-'))
                    && (chars[pos + 1].is_ascii_digit()
                        || chars.get(pos + 2).is_some_and(char::is_ascii_digit))
                {
                    pos += 2;
                    while pos < chars.len() && chars[pos].is_ascii_digit() {
                        pos += 1;
                    }
                }
                // scale suffix, unit name, or the complex marker 'j'
                while pos < chars.len() && chars[pos].is_alphabetic() {
                    pos += 1;
                }
                let raw: String = chars[start..pos].iter().collect();
                tokens.push((Tok::Number(raw), column));
                continue;
            }
            _ if is_ident_start(c) => {
                let start = pos;
                while pos < chars.len() && is_ident_part(chars[pos]) {
                    pos += 1;
                }
                let name: String = chars[start..pos].iter().collect();
                tokens.push((Tok::Ident(name), column));
                continue;
            }
            '*' if next == Some('*') => {
                tokens.push((Tok::StarStar, column));
                pos += 2;
                continue;
            }
            '^' if next == Some('^') => {
                tokens.push((Tok::XorXor, column));
                pos += 2;
                continue;
            }
            '&' if next == Some('&') => {
                tokens.push((Tok::AndAnd, column));
                pos += 2;
                continue;
            }
            '|' if next == Some('|') => {
                tokens.push((Tok::OrOr, column));
                pos += 2;
                continue;
            }
            '<' if next == Some('=') => {
                tokens.push((Tok::Le, column));
                pos += 2;
                continue;
            }
            '>' if next == Some('=') => {
                tokens.push((Tok::Ge, column));
                pos += 2;
                continue;
            }
            '=' if next == Some('=') => {
                tokens.push((Tok::EqEq, column));
                pos += 2;
                continue;
            }
            '!' if next == Some('=') => {
                tokens.push((Tok::Ne, column));
                pos += 2;
                continue;
            }
            _ => {}
        }
        let tok = match c {
            '+' => Tok::Plus,
            '-' => Tok::Minus,
            '*' => Tok::Star,
            // a single '^' is exponentiation in this dialect
            '^' => Tok::StarStar,
            '/' => Tok::Slash,
            '%' => Tok::Percent,
            '!' => Tok::Bang,
            '<' => Tok::Lt,
            '>' => Tok::Gt,
            '?' => Tok::Question,
            ':' => Tok::Colon,
            '(' => Tok::LParen,
            ')' => Tok::RParen,
            ',' => Tok::Comma,
            other => {
                return Err(Error::grammar(
                    line,
                    column,
                    format!("unexpected character '{other}' in expression"),
                ));
            }
        };
        tokens.push((tok, column));
        pos += 1;
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Tok, usize)>,
    pos: usize,
    line: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn advance(&mut self) -> Option<&Tok> {
        let tok = self.tokens.get(self.pos).map(|(t, _)| t);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Tok, what: &str) -> Result<()> {
        if self.eat(&tok) {
            Ok(())
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        let column = self
            .tokens
            .get(self.pos.min(self.tokens.len().saturating_sub(1)))
            .map(|(_, c)| *c)
            .unwrap_or(1);
        Error::grammar(self.line, column, message)
    }

    fn ternary(&mut self) -> Result<Expr> {
        let cond = self.or()?;
        if self.eat(&Tok::Question) {
            let if_true = self.ternary()?;
            self.expect(Tok::Colon, "':' in conditional")?;
            let if_false = self.ternary()?;
            return Ok(Expr::call(Function::If, vec![cond, if_true, if_false]));
        }
        Ok(cond)
    }

    fn or(&mut self) -> Result<Expr> {
        let mut lhs = self.xor()?;
        while self.eat(&Tok::OrOr) {
            let rhs = self.xor()?;
            lhs = Expr::binary(BinaryOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn xor(&mut self) -> Result<Expr> {
        let mut lhs = self.and()?;
        while self.eat(&Tok::XorXor) {
            let rhs = self.and()?;
            lhs = Expr::binary(BinaryOp::Xor, lhs, rhs);
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr> {
        let mut lhs = self.not()?;
        while self.eat(&Tok::AndAnd) {
            let rhs = self.not()?;
            lhs = Expr::binary(BinaryOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn not(&mut self) -> Result<Expr> {
        if self.eat(&Tok::Bang) {
            let operand = self.not()?;
            return Ok(Expr::unary(UnaryOp::Not, operand));
        }
        self.relational()
    }

    fn relational(&mut self) -> Result<Expr> {
        let lhs = self.additive()?;
        let op = match self.peek() {
            Some(Tok::Lt) => BinaryOp::Lt,
            Some(Tok::Le) => BinaryOp::Le,
            Some(Tok::EqEq) => BinaryOp::Eq,
            Some(Tok::Ne) => BinaryOp::Ne,
            Some(Tok::Ge) => BinaryOp::Ge,
            Some(Tok::Gt) => BinaryOp::Gt,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.additive()?;
        Ok(Expr::binary(op, lhs, rhs))
    }

    fn additive(&mut self) -> Result<Expr> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Plus) => BinaryOp::Add,
                Some(Tok::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.multiplicative()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
    }

    fn multiplicative(&mut self) -> Result<Expr> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Star) => BinaryOp::Mul,
                Some(Tok::Slash) => BinaryOp::Div,
                Some(Tok::Percent) => BinaryOp::Mod,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
    }

    fn unary(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Tok::Minus) => {
                self.pos += 1;
                Ok(Expr::unary(UnaryOp::Neg, self.unary()?))
            }
            Some(Tok::Plus) => {
                self.pos += 1;
                Ok(Expr::unary(UnaryOp::Pos, self.unary()?))
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Expr> {
        let base = self.atom()?;
        if self.eat(&Tok::StarStar) {
            // right associative; the exponent may carry its own sign
            let exponent = self.unary()?;
            return Ok(Expr::binary(BinaryOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Expr> {
        match self.advance().cloned() {
            Some(Tok::Number(raw)) => number_expr(&raw).ok_or_else(|| {
                Error::grammar(self.line, 1, format!("invalid numeric literal '{raw}'"))
            }),
            Some(Tok::Ident(name)) => {
                if self.peek() == Some(&Tok::LParen) {
                    self.pos += 1;
                    self.call(&name)
                } else {
                    Ok(Expr::symbol(name))
                }
            }
            Some(Tok::LParen) => {
                let inner = self.ternary()?;
                self.expect(Tok::RParen, "')'")?;
                Ok(inner)
            }
            _ => Err(self.error("expected an expression atom")),
        }
    }

    fn call(&mut self, name: &str) -> Result<Expr> {
        let function = Function::from_name(name)
            .ok_or_else(|| self.error(format!("unknown function '{name}'")))?;
        let mut args = Vec::new();
        if !self.eat(&Tok::RParen) {
            loop {
                args.push(self.ternary()?);
                if self.eat(&Tok::Comma) {
                    continue;
                }
                self.expect(Tok::RParen, "')' after function arguments")?;
                break;
            }
        }
        let (min, max) = function.arity();
        if args.len() < min || args.len() > max {
            return Err(self.error(format!(
                "function '{}' expects {} argument(s), got {}",
                function.name(),
                if min == max {
                    min.to_string()
                } else {
                    format!("{min} to {max}")
                },
                args.len()
            )));
        }
        // The dialect writes atan2(x, y) but the node stores (y, x).
        if function == Function::Atan2 {
            args.swap(0, 1);
        }
        Ok(Expr::call(function, args))
    }
}

fn number_expr(raw: &str) -> Option<Expr> {
    if raw.ends_with(['j', 'J']) {
        if let Some(c) = parse_complex(raw) {
            return Some(Expr::Complex(c));
        }
    }
    parse_value(raw).map(Expr::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spicedeck_core::units::Value;

    fn parse(text: &str) -> Expr {
        parse_expression(text, 1).unwrap()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(parse("1 + 2 * 3").to_string(), "1 + (2 * 3)");
        assert_eq!(parse("(1 + 2) * 3").to_string(), "(1 + 2) * 3");
        assert_eq!(parse("2 ** 3 ** 4").to_string(), "2 ** (3 ** 4)");
        assert_eq!(parse("-2 ** 2").to_string(), "-(2 ** 2)");
    }

    #[test]
    fn test_suffixed_literals() {
        assert_eq!(parse("2.2u"), Expr::Number(Value::float(2.2e-6)));
        assert_eq!(parse("1k"), Expr::Number(Value::int(1000)));
    }

    #[test]
    fn test_ternary_lowers_to_if() {
        let expr = parse("x > 1 ? 2 : 3");
        let Expr::Call { function, args } = expr else {
            panic!("expected call");
        };
        assert_eq!(function, Function::If);
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn test_atan2_swaps_arguments() {
        let Expr::Call { args, .. } = parse("atan2(x, y)") else {
            panic!("expected call");
        };
        assert_eq!(args[0], Expr::symbol("y"));
        assert_eq!(args[1], Expr::symbol("x"));
    }

    #[test]
    fn test_node_functions() {
        assert_eq!(parse("v(out)").to_string(), "v(out)");
        assert_eq!(parse("v(a, b) * 2").to_string(), "v(a, b) * 2");
        assert_eq!(parse("i(V1)").to_string(), "i(V1)");
    }

    #[test]
    fn test_log_is_ln() {
        let Expr::Call { function, .. } = parse("log(x)") else {
            panic!("expected call");
        };
        assert_eq!(function, Function::Ln);
    }

    #[test]
    fn test_arity_is_enforced() {
        assert!(parse_expression("sin(1, 2)", 1).is_err());
        assert!(parse_expression("limit(1, 2)", 1).is_err());
        assert!(parse_expression("rand()", 1).is_ok());
    }

    #[test]
    fn test_unknown_function_is_fatal() {
        assert!(parse_expression("nosuch(1)", 1).is_err());
    }

    #[test]
    fn test_boolean_and_relational() {
        assert_eq!(
            parse("a && b || !c").to_string(),
            "(a && b) || (!c)"
        );
        assert_eq!(parse("a <= 3").to_string(), "a <= 3");
    }
}
