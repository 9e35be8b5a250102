//! Grammar layer: logical lines to production-tagged CST nodes.
//!
//! Each logical line becomes one [`Production`]. Device lines keep a
//! generic shape (name plus a list of [`Atom`]s); the per-device
//! positional/keyword disambiguation belongs to the semantic walker, which
//! is where the SPICE dialect's real irregularity lives.

use crate::error::{Error, Result};
use crate::lexer::{self, SpannedToken, Token};
use crate::lines::LogicalLine;
use spicedeck_core::units::parse_value;

/// One argument slot on a device or directive line.
#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Word(String),
    /// Raw `{...}` body, parsed by the expression sub-parser later.
    Braced(String),
    /// `NAME(args...)`, e.g. `PULSE(0 1 2n)` or `POLY(2)`.
    Call { name: String, args: Vec<Atom> },
    /// A bare parenthesized group, e.g. the pairs of a TABLE control.
    Group(Vec<Atom>),
    /// `key=value`.
    KeyValue { key: String, value: Box<Atom> },
    /// A free-standing `=` (TABLE control syntax).
    Equals,
}

impl Atom {
    pub fn as_word(&self) -> Option<&str> {
        match self {
            Atom::Word(w) => Some(w),
            _ => None,
        }
    }
}

/// A device line: instance name plus its argument atoms.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceLine {
    pub name: String,
    pub atoms: Vec<Atom>,
}

/// A production-tagged CST node for one logical line.
#[derive(Debug, Clone, PartialEq)]
pub enum Production {
    Title(String),
    Device(DeviceLine),
    Model {
        name: String,
        device: String,
        params: Vec<(String, Atom)>,
    },
    Subckt {
        name: String,
        nodes: Vec<String>,
        params: Vec<(String, Atom)>,
    },
    Ends {
        name: Option<String>,
    },
    Param {
        params: Vec<(String, Atom)>,
    },
    Include {
        path: String,
    },
    LibBlock {
        entry: String,
    },
    LibCall {
        file: String,
        entry: String,
    },
    Endl {
        name: Option<String>,
    },
    Data {
        table: String,
        columns: Vec<String>,
        values: Vec<String>,
    },
    DataRow {
        values: Vec<String>,
    },
    EndData,
    TitleCmd {
        title: String,
    },
    /// A simulator control directive, accepted and ignored.
    Control {
        name: String,
        text: String,
    },
}

/// A CST node with its source line number.
#[derive(Debug, Clone, PartialEq)]
pub struct CstLine {
    pub number: usize,
    pub production: Production,
}

/// Control directives the grammar accepts without interpreting.
const CONTROL_DIRECTIVES: &[&str] = &[
    "ac", "dc", "tran", "op", "ic", "nodeset", "options", "option", "save", "probe", "print",
    "plot", "temp", "global", "width", "four", "noise",
];

/// Parse logical lines into CST nodes. Stops at `.end`.
pub fn parse_lines(lines: &[LogicalLine]) -> Result<Vec<CstLine>> {
    let mut out = Vec::new();
    let mut in_data = false;
    for (index, line) in lines.iter().enumerate() {
        // The first line is the title unless it is a directive.
        if index == 0 && !line.text.starts_with('.') {
            out.push(CstLine {
                number: line.number,
                production: Production::Title(line.text.clone()),
            });
            continue;
        }
        if in_data {
            if line.text.starts_with('.') {
                let (name, _) = split_directive(&line.text);
                if name != "enddata" {
                    return Err(Error::grammar(line.number, 1, "expected .enddata"));
                }
                in_data = false;
                out.push(CstLine {
                    number: line.number,
                    production: Production::EndData,
                });
            } else {
                let tokens = lexer::tokenize(&line.text, line.number)?;
                out.push(CstLine {
                    number: line.number,
                    production: Production::DataRow {
                        values: word_list(&tokens, line.number)?,
                    },
                });
            }
            continue;
        }
        let production = parse_line(line)?;
        if matches!(production, Production::Data { .. }) {
            in_data = true;
        }
        match production {
            // .end terminates the netlist; anything after is ignored.
            Production::Control { ref name, .. } if name == "end" => break,
            production => out.push(CstLine {
                number: line.number,
                production,
            }),
        }
    }
    if in_data {
        return Err(Error::grammar(
            lines.last().map(|l| l.number).unwrap_or(0),
            1,
            "unterminated .data block",
        ));
    }
    Ok(out)
}

fn parse_line(line: &LogicalLine) -> Result<Production> {
    if line.text.starts_with('.') {
        parse_directive(line)
    } else {
        parse_device(line)
    }
}

/// Split a directive line into its lowercased name and the remainder text.
fn split_directive(text: &str) -> (String, &str) {
    let body = &text[1..];
    match body.split_once(char::is_whitespace) {
        Some((name, rest)) => (name.to_lowercase(), rest.trim()),
        None => (body.to_lowercase(), ""),
    }
}

fn parse_directive(line: &LogicalLine) -> Result<Production> {
    let (name, rest) = split_directive(&line.text);
    let tokens = lexer::tokenize(rest, line.number)?;
    let number = line.number;
    match name.as_str() {
        "model" => {
            let mut words = tokens.iter();
            let model_name = expect_word(words.next(), number, "model name")?;
            let device = expect_word(words.next(), number, "model type")?;
            let consumed = 2;
            let params = parse_params(&tokens[param_start(&tokens, consumed)..], number)?;
            Ok(Production::Model {
                name: model_name,
                device,
                params,
            })
        }
        "subckt" => {
            let mut words = tokens.iter();
            let subckt_name = expect_word(words.next(), number, "subcircuit name")?;
            let atoms = atomize(&tokens[1..], number)?;
            let mut nodes = Vec::new();
            let mut params = Vec::new();
            let mut in_params = false;
            for atom in atoms {
                match atom {
                    Atom::Word(w) if w.eq_ignore_ascii_case("params:") => in_params = true,
                    Atom::Word(w) if !in_params => nodes.push(w),
                    Atom::KeyValue { key, value } => params.push((key, *value)),
                    _ => {
                        return Err(Error::grammar(
                            number,
                            1,
                            "malformed .subckt parameter list",
                        ));
                    }
                }
            }
            Ok(Production::Subckt {
                name: subckt_name,
                nodes,
                params,
            })
        }
        "ends" => Ok(Production::Ends {
            name: optional_word(&tokens, number)?,
        }),
        "param" => Ok(Production::Param {
            params: parse_params(&tokens, number)?,
        }),
        "include" => {
            let path = expect_word(tokens.first(), number, "include path")?;
            Ok(Production::Include { path })
        }
        "lib" => {
            let words = word_list(&tokens, number)?;
            match words.as_slice() {
                [entry] => Ok(Production::LibBlock {
                    entry: entry.clone(),
                }),
                [file, entry] => Ok(Production::LibCall {
                    file: file.clone(),
                    entry: entry.clone(),
                }),
                _ => Err(Error::grammar(number, 1, "malformed .lib directive")),
            }
        }
        "endl" => Ok(Production::Endl {
            name: optional_word(&tokens, number)?,
        }),
        "data" => {
            let words = word_list(&tokens, number)?;
            let mut iter = words.into_iter();
            let table = iter
                .next()
                .ok_or_else(|| Error::grammar(number, 1, "missing .data table name"))?;
            let mut columns = Vec::new();
            let mut values = Vec::new();
            for word in iter {
                if values.is_empty() && parse_value(&word).is_none() {
                    columns.push(word);
                } else {
                    values.push(word);
                }
            }
            if columns.is_empty() {
                return Err(Error::grammar(number, 1, "missing .data column names"));
            }
            Ok(Production::Data {
                table,
                columns,
                values,
            })
        }
        "enddata" => Ok(Production::EndData),
        "title" => Ok(Production::TitleCmd {
            title: rest.to_string(),
        }),
        _ if name == "end" || CONTROL_DIRECTIVES.contains(&name.as_str()) => {
            Ok(Production::Control {
                name,
                text: rest.to_string(),
            })
        }
        _ => Err(Error::grammar(
            number,
            1,
            format!("unknown directive .{name}"),
        )),
    }
}

fn parse_device(line: &LogicalLine) -> Result<Production> {
    let tokens = lexer::tokenize(&line.text, line.number)?;
    let mut iter = tokens.iter();
    let name = match iter.next() {
        Some(SpannedToken {
            token: Token::Word(w),
            ..
        }) if w.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) => w.clone(),
        _ => {
            return Err(Error::grammar(
                line.number,
                1,
                "expected a device or directive",
            ));
        }
    };
    let atoms = atomize(&tokens[1..], line.number)?;
    Ok(Production::Device(DeviceLine { name, atoms }))
}

/// Group a token slice into atoms: `key=value` pairs, `NAME(...)` calls,
/// bare groups, braced expressions and words. Commas separate and vanish.
fn atomize(tokens: &[SpannedToken], line: usize) -> Result<Vec<Atom>> {
    let mut pos = 0;
    let atoms = atomize_until(tokens, &mut pos, line, None)?;
    Ok(atoms)
}

fn atomize_until(
    tokens: &[SpannedToken],
    pos: &mut usize,
    line: usize,
    closing: Option<&Token>,
) -> Result<Vec<Atom>> {
    let mut out = Vec::new();
    while *pos < tokens.len() {
        let spanned = &tokens[*pos];
        if Some(&spanned.token) == closing {
            *pos += 1;
            return Ok(out);
        }
        match &spanned.token {
            Token::Comma => {
                *pos += 1;
            }
            Token::Word(w) => {
                *pos += 1;
                match tokens.get(*pos).map(|t| &t.token) {
                    Some(Token::Equals) => {
                        *pos += 1;
                        let value = single_atom(tokens, pos, line)?;
                        out.push(Atom::KeyValue {
                            key: w.clone(),
                            value: Box::new(value),
                        });
                    }
                    Some(Token::LParen) => {
                        *pos += 1;
                        let args = atomize_until(tokens, pos, line, Some(&Token::RParen))?;
                        out.push(Atom::Call {
                            name: w.clone(),
                            args,
                        });
                    }
                    _ => out.push(Atom::Word(w.clone())),
                }
            }
            Token::Braced(body) => {
                *pos += 1;
                out.push(Atom::Braced(body.clone()));
            }
            Token::LParen => {
                *pos += 1;
                let items = atomize_until(tokens, pos, line, Some(&Token::RParen))?;
                out.push(Atom::Group(items));
            }
            Token::Equals => {
                *pos += 1;
                out.push(Atom::Equals);
            }
            Token::RParen => {
                return Err(Error::grammar(line, spanned.column, "unexpected ')'"));
            }
        }
    }
    if closing.is_some() {
        return Err(Error::grammar(line, 1, "unbalanced '('"));
    }
    Ok(out)
}

fn single_atom(tokens: &[SpannedToken], pos: &mut usize, line: usize) -> Result<Atom> {
    let spanned = tokens
        .get(*pos)
        .ok_or_else(|| Error::grammar(line, 1, "missing value after '='"))?;
    match &spanned.token {
        Token::Word(w) => {
            *pos += 1;
            Ok(Atom::Word(w.clone()))
        }
        Token::Braced(body) => {
            *pos += 1;
            Ok(Atom::Braced(body.clone()))
        }
        Token::LParen => {
            *pos += 1;
            let items = atomize_until(tokens, pos, line, Some(&Token::RParen))?;
            Ok(Atom::Group(items))
        }
        _ => Err(Error::grammar(
            line,
            spanned.column,
            "expected a value after '='",
        )),
    }
}

/// Parse a directive parameter list (`a=1 b={x} ...`), flattening one level
/// of enclosing parentheses (`.model name type (a=1 b=2)`).
fn parse_params(tokens: &[SpannedToken], line: usize) -> Result<Vec<(String, Atom)>> {
    let atoms = atomize(tokens, line)?;
    let mut out = Vec::new();
    collect_params(atoms, &mut out, line)?;
    Ok(out)
}

fn collect_params(atoms: Vec<Atom>, out: &mut Vec<(String, Atom)>, line: usize) -> Result<()> {
    for atom in atoms {
        match atom {
            Atom::KeyValue { key, value } => out.push((key, *value)),
            Atom::Group(items) => collect_params(items, out, line)?,
            _ => {
                return Err(Error::grammar(line, 1, "expected name=value parameter"));
            }
        }
    }
    Ok(())
}

fn param_start(tokens: &[SpannedToken], consumed: usize) -> usize {
    consumed.min(tokens.len())
}

fn expect_word(token: Option<&SpannedToken>, line: usize, what: &str) -> Result<String> {
    match token {
        Some(SpannedToken {
            token: Token::Word(w),
            ..
        }) => Ok(w.clone()),
        _ => Err(Error::grammar(line, 1, format!("missing {what}"))),
    }
}

fn optional_word(tokens: &[SpannedToken], line: usize) -> Result<Option<String>> {
    match tokens {
        [] => Ok(None),
        [SpannedToken {
            token: Token::Word(w),
            ..
        }] => Ok(Some(w.clone())),
        _ => Err(Error::grammar(line, 1, "expected at most one name")),
    }
}

fn word_list(tokens: &[SpannedToken], line: usize) -> Result<Vec<String>> {
    tokens
        .iter()
        .map(|t| match &t.token {
            Token::Word(w) => Ok(w.clone()),
            _ => Err(Error::grammar(line, t.column, "expected a word")),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lines::logical_lines;

    fn parse(source: &str) -> Vec<CstLine> {
        parse_lines(&logical_lines(source).unwrap()).unwrap()
    }

    #[test]
    fn test_first_line_is_title() {
        let cst = parse("My Circuit\nR1 1 2 1k\n");
        assert_eq!(cst[0].production, Production::Title("My Circuit".into()));
        assert!(matches!(cst[1].production, Production::Device(_)));
    }

    #[test]
    fn test_directive_first_line_means_no_title() {
        let cst = parse(".param x=1\n");
        assert!(matches!(cst[0].production, Production::Param { .. }));
    }

    #[test]
    fn test_device_atoms() {
        let cst = parse("T\nM1 d g s b nfet W=2u L={l}\n");
        let Production::Device(dev) = &cst[1].production else {
            panic!("expected device");
        };
        assert_eq!(dev.name, "M1");
        assert_eq!(dev.atoms.len(), 7);
        assert_eq!(
            dev.atoms[5],
            Atom::KeyValue {
                key: "W".into(),
                value: Box::new(Atom::Word("2u".into())),
            }
        );
        assert_eq!(
            dev.atoms[6],
            Atom::KeyValue {
                key: "L".into(),
                value: Box::new(Atom::Braced("l".into())),
            }
        );
    }

    #[test]
    fn test_model_params_with_parens() {
        let cst = parse("T\n.model sw SW (ron=1 roff=1Meg)\n");
        let Production::Model {
            name,
            device,
            params,
        } = &cst[1].production
        else {
            panic!("expected model");
        };
        assert_eq!(name, "sw");
        assert_eq!(device, "SW");
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].0, "ron");
    }

    #[test]
    fn test_lib_forms() {
        let cst = parse("T\n.lib fast\n.endl fast\n.lib \"models.lib\" slow\n");
        assert_eq!(
            cst[1].production,
            Production::LibBlock {
                entry: "fast".into()
            }
        );
        assert_eq!(
            cst[2].production,
            Production::Endl {
                name: Some("fast".into())
            }
        );
        assert_eq!(
            cst[3].production,
            Production::LibCall {
                file: "models.lib".into(),
                entry: "slow".into()
            }
        );
    }

    #[test]
    fn test_data_block_rows() {
        let cst = parse("T\n.data tab x y\n1 2\n3 4\n.enddata\n");
        assert!(matches!(cst[1].production, Production::Data { .. }));
        assert_eq!(
            cst[2].production,
            Production::DataRow {
                values: vec!["1".into(), "2".into()]
            }
        );
        assert_eq!(cst[4].production, Production::EndData);
    }

    #[test]
    fn test_end_stops_parsing() {
        let cst = parse("T\nR1 1 0 1k\n.end\ngarbage !!\n");
        assert_eq!(cst.len(), 2);
    }

    #[test]
    fn test_unknown_directive_is_fatal() {
        let lines = logical_lines("T\n.bogus 1 2\n").unwrap();
        assert!(parse_lines(&lines).is_err());
    }
}
