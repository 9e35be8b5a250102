//! Numeric literals with SPICE engineering-notation suffixes.
//!
//! SPICE writes `2.2u`, `1k`, `10Meg`; a value is a mantissa paired with a
//! decimal scale. The mantissa keeps its integer-ness when the source wrote
//! an integer, so `.param n=4` survives as an exact count. Equality compares
//! the normalized product, so `2k == 2000` and `2200n == 2.2u`.

use std::fmt;

use num_complex::Complex64;

/// A decimal scale factor attached to a numeric literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scale {
    Tera,
    Giga,
    Mega,
    Kilo,
    #[default]
    Unit,
    Milli,
    Micro,
    Nano,
    Pico,
    Femto,
}

impl Scale {
    /// Power of ten this scale multiplies by.
    pub fn exponent(self) -> i32 {
        match self {
            Scale::Tera => 12,
            Scale::Giga => 9,
            Scale::Mega => 6,
            Scale::Kilo => 3,
            Scale::Unit => 0,
            Scale::Milli => -3,
            Scale::Micro => -6,
            Scale::Nano => -9,
            Scale::Pico => -12,
            Scale::Femto => -15,
        }
    }

    pub fn multiplier(self) -> f64 {
        10f64.powi(self.exponent())
    }

    /// Canonical SPICE suffix for emission.
    pub fn suffix(self) -> &'static str {
        match self {
            Scale::Tera => "T",
            Scale::Giga => "G",
            Scale::Mega => "Meg",
            Scale::Kilo => "k",
            Scale::Unit => "",
            Scale::Milli => "m",
            Scale::Micro => "u",
            Scale::Nano => "n",
            Scale::Pico => "p",
            Scale::Femto => "f",
        }
    }

    /// Split an alphabetic literal tail into its scale and trailing unit
    /// name. `meg` is matched before the single-letter suffixes so that
    /// `10Meg` is not read as milli; a bare `m` always means milli. The
    /// Unicode micro signs U+00B5 and U+03BC are accepted as `u`.
    pub fn split_suffix(tail: &str) -> (Scale, &str) {
        let lower = tail.to_lowercase();
        if lower.starts_with("meg") {
            return (Scale::Mega, &tail[3..]);
        }
        let mut chars = tail.chars();
        let scale = match chars.next() {
            Some('t') | Some('T') => Scale::Tera,
            Some('g') | Some('G') => Scale::Giga,
            Some('k') | Some('K') => Scale::Kilo,
            Some('m') | Some('M') => Scale::Milli,
            Some('u') | Some('U') | Some('\u{00b5}') | Some('\u{03bc}') => Scale::Micro,
            Some('n') | Some('N') => Scale::Nano,
            Some('p') | Some('P') => Scale::Pico,
            Some('f') | Some('F') => Scale::Femto,
            _ => return (Scale::Unit, tail),
        };
        (scale, chars.as_str())
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.suffix())
    }
}

/// A literal mantissa, integer-preserving.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    pub fn is_int(self) -> bool {
        matches!(self, Number::Int(_))
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{i}"),
            Number::Float(x) => write!(f, "{x}"),
        }
    }
}

/// A numeric literal paired with its scale, e.g. `2.2u`.
#[derive(Debug, Clone, Copy)]
pub struct Value {
    pub number: Number,
    pub scale: Scale,
}

impl Value {
    pub fn new(number: Number, scale: Scale) -> Self {
        Self { number, scale }
    }

    pub fn int(value: i64) -> Self {
        Self::new(Number::Int(value), Scale::Unit)
    }

    pub fn float(value: f64) -> Self {
        Self::new(Number::Float(value), Scale::Unit)
    }

    /// The normalized product `mantissa * 10^scale`.
    ///
    /// Scaled values go through a decimal round-trip so that equal decimals
    /// land on the same double: `2.2u` and `2200n` both parse as `2.2e-6`
    /// would, instead of picking up a stray ulp from binary multiplication.
    pub fn as_f64(&self) -> f64 {
        let exponent = self.scale.exponent();
        if exponent == 0 {
            return self.number.as_f64();
        }
        format!("{}e{}", self.number, exponent)
            .parse()
            .unwrap_or_else(|_| self.number.as_f64() * self.scale.multiplier())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.as_f64() == other.as_f64()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.number, self.scale)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::float(value)
    }
}

/// Parse a SPICE numeric literal: optional sign, integer or float mantissa,
/// optional exponent, optional scale suffix, optional unit name (discarded).
///
/// Returns `None` when the token is not a number, which callers use to
/// disambiguate positional arguments (a BJT `area` versus a model name).
pub fn parse_value(token: &str) -> Option<Value> {
    let (mantissa_end, saw_dot, saw_exp) = scan_mantissa(token)?;
    let mantissa = &token[..mantissa_end];
    let tail = &token[mantissa_end..];
    if !tail.is_empty() && !tail.chars().all(|c| c.is_alphabetic()) {
        return None;
    }
    let (scale, _unit) = Scale::split_suffix(tail);
    let number = if saw_dot || saw_exp {
        Number::Float(mantissa.parse::<f64>().ok()?)
    } else {
        match mantissa.parse::<i64>() {
            Ok(i) => Number::Int(i),
            Err(_) => Number::Float(mantissa.parse::<f64>().ok()?),
        }
    };
    Some(Value::new(number, scale))
}

/// Scan the numeric mantissa at the start of `token`. Returns the byte end
/// of the mantissa plus whether a decimal point or exponent was seen.
fn scan_mantissa(token: &str) -> Option<(usize, bool, bool)> {
    let bytes = token.as_bytes();
    let mut pos = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        pos += 1;
    }
    let digits_start = pos;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    let mut saw_dot = false;
    if pos < bytes.len() && bytes[pos] == b'.' {
        saw_dot = true;
        pos += 1;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
    }
    if pos == digits_start || (saw_dot && pos == digits_start + 1) {
        return None;
    }
    let mut saw_exp = false;
    if pos < bytes.len() && matches!(bytes[pos], b'e' | b'E') {
        let mut exp_pos = pos + 1;
        if exp_pos < bytes.len() && matches!(bytes[exp_pos], b'+' | b'-') {
            exp_pos += 1;
        }
        if exp_pos < bytes.len() && bytes[exp_pos].is_ascii_digit() {
            saw_exp = true;
            pos = exp_pos;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
        }
    }
    Some((pos, saw_dot, saw_exp))
}

/// Parse a complex literal of the form `a+bj`, `a-bj` or `bj`.
pub fn parse_complex(token: &str) -> Option<Complex64> {
    let body = token.strip_suffix(['j', 'J'])?;
    if body.is_empty() {
        return None;
    }
    // Split at the sign separating real and imaginary parts; a sign at
    // position 0 or inside an exponent belongs to the mantissa.
    let mut split = None;
    for (idx, c) in body.char_indices().skip(1) {
        if (c == '+' || c == '-') && !matches!(body.as_bytes()[idx - 1], b'e' | b'E') {
            split = Some(idx);
        }
    }
    match split {
        Some(idx) => {
            let real = parse_value(&body[..idx])?;
            let imag = parse_value(&body[idx..])?;
            Some(Complex64::new(real.as_f64(), imag.as_f64()))
        }
        None => {
            let imag = parse_value(body)?;
            Some(Complex64::new(0.0, imag.as_f64()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_integer() {
        let v = parse_value("42").unwrap();
        assert_eq!(v.number, Number::Int(42));
        assert_eq!(v.scale, Scale::Unit);
    }

    #[test]
    fn test_parse_suffixed() {
        assert_eq!(parse_value("1k").unwrap().as_f64(), 1e3);
        assert_eq!(parse_value("10Meg").unwrap().as_f64(), 10e6);
        assert_eq!(parse_value("2.2u").unwrap().as_f64(), 2.2e-6);
        assert_eq!(parse_value("100p").unwrap().as_f64(), 100e-12);
        assert_eq!(parse_value("3f").unwrap().as_f64(), 3e-15);
    }

    #[test]
    fn test_bare_m_is_milli() {
        assert_eq!(parse_value("5m").unwrap().scale, Scale::Milli);
        assert_eq!(parse_value("5M").unwrap().scale, Scale::Milli);
    }

    #[test]
    fn test_unicode_micro() {
        let micro_sign = parse_value("2.2\u{00b5}").unwrap();
        let greek_mu = parse_value("2.2\u{03bc}").unwrap();
        let ascii = parse_value("2.2u").unwrap();
        assert_eq!(micro_sign, ascii);
        assert_eq!(greek_mu, ascii);
    }

    #[test]
    fn test_trailing_unit_name() {
        let v = parse_value("2.2uF").unwrap();
        assert_eq!(v.scale, Scale::Micro);
        let v = parse_value("10Hz").unwrap();
        assert_eq!(v.scale, Scale::Unit);
        // A lone F is femto, not farad.
        assert_eq!(parse_value("1F").unwrap().scale, Scale::Femto);
    }

    #[test]
    fn test_exponent_vs_suffix() {
        assert_eq!(parse_value("1e3").unwrap().as_f64(), 1000.0);
        assert!(parse_value("1e3").unwrap().number.is_int() == false);
        // 'e' with no digits after it is not an exponent.
        assert!(parse_value("1e").is_some());
        assert_eq!(parse_value("1e").unwrap().scale, Scale::Unit);
    }

    #[test]
    fn test_normalized_equality() {
        assert_eq!(parse_value("2k").unwrap(), Value::int(2000));
        assert_eq!(parse_value("2200n").unwrap(), parse_value("2.2u").unwrap());
    }

    #[test]
    fn test_rejects_non_numbers() {
        assert!(parse_value("2N2222").is_none());
        assert!(parse_value("abc").is_none());
        assert!(parse_value("").is_none());
        assert!(parse_value("-").is_none());
        assert!(parse_value("1.2.3").is_none());
    }

    #[test]
    fn test_parse_complex() {
        let c = parse_complex("1+2j").unwrap();
        assert_eq!(c, Complex64::new(1.0, 2.0));
        let c = parse_complex("3.5-4j").unwrap();
        assert_eq!(c, Complex64::new(3.5, -4.0));
        let c = parse_complex("2j").unwrap();
        assert_eq!(c, Complex64::new(0.0, 2.0));
        assert!(parse_complex("j").is_none());
        assert!(parse_complex("1k").is_none());
    }
}
