//! Source lowering: independent V/I sources with transient waveforms, the
//! behavioral B source, and the controlled-source letters E, F, G and H.
//!
//! The controlled letters do not survive into the IR. Each folds to a
//! behavioral source whose output expression encodes the control: a VCVS
//! becomes `voltage_expression = v(cp, cn) * gain`, a CCCS becomes
//! `current_expression = i(source) * gain`, and so on. POLY forms are kept
//! as verbatim `{ POLY (n) ... }` text.

use indexmap::IndexMap;

use spicedeck_core::circuit::{DeviceClass, Element, Statement, Transient, TransientKind};
use spicedeck_core::expr::{BinaryOp, Expr, Function};
use spicedeck_core::units::parse_value;

use super::{node, split_device_atoms, to_expr, Walker};
use crate::cst::{Atom, DeviceLine};
use crate::error::{Error, Result};
use crate::expr::parse_expression;

const PULSE_KEYS: &[&str] = &[
    "initial_value",
    "pulsed_value",
    "delay_time",
    "rise_time",
    "fall_time",
    "pulse_width",
    "period",
    "phase",
];

const SIN_KEYS: &[&str] = &[
    "offset",
    "amplitude",
    "frequency",
    "delay",
    "damping_factor",
];

const PAT_KEYS: &[&str] = &[
    "high_value",
    "low_value",
    "delay_time",
    "rise_time",
    "fall_time",
    "bit_period",
    "bit_pattern",
    "repeat",
];

impl Walker<'_> {
    /// V and I: two nodes, then any of `[DC] value`, `AC mag [phase]` and
    /// a transient waveform, in source order.
    pub(super) fn walk_source(
        &mut self,
        device: DeviceLine,
        class: DeviceClass,
        line: usize,
    ) -> Result<()> {
        let mut atoms = device.atoms.into_iter().peekable();
        let positive = source_node(atoms.next(), &device.name, line)?;
        let negative = source_node(atoms.next(), &device.name, line)?;
        let mut params = IndexMap::new();
        let mut transient = None;
        while let Some(atom) = atoms.next() {
            match atom {
                Atom::Word(w) if w.eq_ignore_ascii_case("dc") => {
                    let value = atoms.next().ok_or_else(|| {
                        Error::shape(line, format!("missing DC value on {}", device.name))
                    })?;
                    params.insert("dc_value".to_string(), to_expr(value, line)?);
                }
                Atom::Word(w) if w.eq_ignore_ascii_case("ac") => {
                    let value = atoms.next().ok_or_else(|| {
                        Error::shape(line, format!("missing AC magnitude on {}", device.name))
                    })?;
                    params.insert("ac_magnitude".to_string(), to_expr(value, line)?);
                    let has_phase = match atoms.peek() {
                        Some(Atom::Word(next)) => parse_value(next).is_some(),
                        Some(Atom::Braced(_)) => true,
                        _ => false,
                    };
                    if has_phase {
                        if let Some(phase) = atoms.next() {
                            params.insert("ac_phase".to_string(), to_expr(phase, line)?);
                        }
                    }
                }
                Atom::Call { name, args }
                    if matches!(
                        name.to_lowercase().as_str(),
                        "pulse" | "sin" | "pwl" | "pat"
                    ) =>
                {
                    transient = Some(parse_waveform(&name, args, line)?);
                }
                Atom::KeyValue { key, value } => {
                    params.insert(key.to_lowercase(), to_expr(*value, line)?);
                }
                Atom::Word(_) | Atom::Braced(_) => {
                    if params.contains_key("dc_value") {
                        return Err(Error::shape(
                            line,
                            format!("unexpected argument on source {}", device.name),
                        ));
                    }
                    params.insert("dc_value".to_string(), to_expr(atom, line)?);
                }
                _ => {
                    return Err(Error::shape(
                        line,
                        format!("unexpected argument on source {}", device.name),
                    ));
                }
            }
        }
        self.push_statement(Statement::Element(Element {
            class,
            name: device.name,
            nodes: vec![positive, negative],
            params,
            transient,
        }));
        Ok(())
    }

    /// B: two nodes plus a `V={...}` or `I={...}` output expression.
    pub(super) fn walk_behavioral(&mut self, device: DeviceLine, line: usize) -> Result<()> {
        let (positional, mut params) = split_device_atoms(device.atoms, line)?;
        if positional.len() != 2 {
            return Err(Error::shape(
                line,
                format!("behavioral source {} expects two nodes", device.name),
            ));
        }
        let nodes = vec![node(&positional[0], line)?, node(&positional[1], line)?];
        let voltage = params.shift_remove("v");
        let current = params.shift_remove("i");
        match (voltage, current) {
            (Some(expr), None) => {
                params.insert("voltage_expression".to_string(), expr);
            }
            (None, Some(expr)) => {
                params.insert("current_expression".to_string(), expr);
            }
            _ => {
                return Err(Error::shape(
                    line,
                    format!("device {} not properly defined", device.name),
                ));
            }
        }
        self.push_statement(Statement::Element(Element {
            class: DeviceClass::Behavioral,
            name: device.name,
            nodes,
            params,
            transient: None,
        }));
        Ok(())
    }

    /// E/G/F/H: folded to a behavioral source. `output_voltage` selects
    /// which expression slot the fold fills; `control_voltage` selects
    /// between a node-pair control and a named-source control.
    pub(super) fn walk_controlled(
        &mut self,
        device: DeviceLine,
        output_voltage: bool,
        control_voltage: bool,
        line: usize,
    ) -> Result<()> {
        let mut atoms = device.atoms.into_iter();
        let positive = source_node(atoms.next(), &device.name, line)?;
        let negative = source_node(atoms.next(), &device.name, line)?;
        let rest: Vec<Atom> = atoms.collect();

        let mut params = IndexMap::new();
        let first = rest.first().cloned();
        let expression = match first {
            Some(Atom::Call { ref name, ref args }) if name.eq_ignore_ascii_case("poly") => {
                poly_expression(control_voltage, args, &rest[1..], &device.name, line)?
            }
            Some(Atom::Word(ref w)) if w.eq_ignore_ascii_case("table") => {
                table_expression(&rest[1..], &device.name, line)?
            }
            _ => {
                let mut positional = Vec::new();
                for atom in rest {
                    match atom {
                        Atom::KeyValue { key, value } => {
                            params.insert(key.to_lowercase(), to_expr(*value, line)?);
                        }
                        other => positional.push(other),
                    }
                }
                match params.shift_remove("value") {
                    Some(expr) => expr,
                    None => gain_expression(
                        control_voltage,
                        &positional,
                        &device.name,
                        line,
                    )?,
                }
            }
        };
        let output_key = if output_voltage {
            "voltage_expression"
        } else {
            "current_expression"
        };
        params.insert(output_key.to_string(), expression);
        self.push_statement(Statement::Element(Element {
            class: DeviceClass::Behavioral,
            name: device.name,
            nodes: vec![positive, negative],
            params,
            transient: None,
        }));
        Ok(())
    }
}

fn source_node(atom: Option<Atom>, device: &str, line: usize) -> Result<String> {
    match atom {
        Some(atom) => node(&atom, line),
        None => Err(Error::shape(
            line,
            format!("device {device} not properly defined"),
        )),
    }
}

/// The plain linear control: `v(cp, cn) * gain` or `i(source) * gain`.
fn gain_expression(
    control_voltage: bool,
    positional: &[Atom],
    device: &str,
    line: usize,
) -> Result<Expr> {
    if control_voltage {
        let [cp, cn, gain] = positional else {
            return Err(Error::shape(
                line,
                format!("device {device} not properly defined"),
            ));
        };
        let control = Expr::call(
            Function::V,
            vec![
                Expr::symbol(node(cp, line)?),
                Expr::symbol(node(cn, line)?),
            ],
        );
        Ok(Expr::binary(
            BinaryOp::Mul,
            control,
            to_expr(gain.clone(), line)?,
        ))
    } else {
        let [source, gain] = positional else {
            return Err(Error::shape(
                line,
                format!("device {device} not properly defined"),
            ));
        };
        let control = Expr::call(Function::I, vec![Expr::symbol(node(source, line)?)]);
        Ok(Expr::binary(
            BinaryOp::Mul,
            control,
            to_expr(gain.clone(), line)?,
        ))
    }
}

/// A POLY control, preserved as verbatim `{ POLY (n) ... }` text. For a
/// voltage control the tail is `n` node pairs then coefficients; for a
/// current control it is `n` source names then coefficients.
fn poly_expression(
    control_voltage: bool,
    dimension_args: &[Atom],
    tail: &[Atom],
    device: &str,
    line: usize,
) -> Result<Expr> {
    let dimension = dimension_args
        .first()
        .and_then(Atom::as_word)
        .and_then(|w| w.parse::<usize>().ok())
        .filter(|d| *d > 0)
        .ok_or_else(|| Error::shape(line, format!("invalid POLY dimension on {device}")))?;
    let words = tail
        .iter()
        .map(|atom| node(atom, line))
        .collect::<Result<Vec<_>>>()?;
    let controls = if control_voltage { 2 * dimension } else { dimension };
    if words.len() < controls {
        return Err(Error::shape(
            line,
            format!(
                "the number of control nodes is smaller than the expected controllers: {dimension}"
            ),
        ));
    }
    let mut parts = Vec::new();
    if control_voltage {
        for pair in words[..controls].chunks(2) {
            parts.push(format!("v({},{})", pair[0], pair[1]));
        }
    } else {
        parts.extend(words[..controls].iter().cloned());
    }
    for coefficient in &words[controls..] {
        if parse_value(coefficient).is_none() {
            return Err(Error::shape(
                line,
                format!("POLY coefficient '{coefficient}' on {device} is not numeric"),
            ));
        }
        parts.push(coefficient.clone());
    }
    Ok(Expr::Raw(format!(
        "{{ POLY ({dimension}) {} }}",
        parts.join(" ")
    )))
}

/// A `TABLE {expr} = (in,out)(in,out)...` control.
fn table_expression(rest: &[Atom], device: &str, line: usize) -> Result<Expr> {
    let mut iter = rest.iter();
    let lookup = match iter.next() {
        Some(Atom::Braced(body)) => parse_expression(body, line)?,
        _ => {
            return Err(Error::shape(
                line,
                format!("TABLE control on {device} requires a braced expression"),
            ));
        }
    };
    let mut points = Vec::new();
    for atom in iter {
        match atom {
            Atom::Equals => {}
            Atom::Group(items) if items.len() == 2 => {
                let input = to_expr(items[0].clone(), line)?;
                let output = to_expr(items[1].clone(), line)?;
                points.push((input, output));
            }
            _ => {
                return Err(Error::shape(
                    line,
                    format!("malformed TABLE point on {device}"),
                ));
            }
        }
    }
    if points.is_empty() {
        return Err(Error::shape(
            line,
            format!("TABLE control on {device} has no points"),
        ));
    }
    Ok(Expr::Table {
        expr: Box::new(lookup),
        points,
    })
}

/// Lower a transient waveform call to its canonical parameter names.
fn parse_waveform(name: &str, args: Vec<Atom>, line: usize) -> Result<Transient> {
    match name.to_lowercase().as_str() {
        "pulse" => keyed_waveform(TransientKind::Pulse, PULSE_KEYS, 2, args, line),
        "sin" => keyed_waveform(TransientKind::Sin, SIN_KEYS, 3, args, line),
        "pat" => keyed_waveform(TransientKind::Pattern, PAT_KEYS, 7, args, line),
        "pwl" => pwl_waveform(args, line),
        other => Err(Error::shape(
            line,
            format!("unsupported transient specification {other}"),
        )),
    }
}

fn keyed_waveform(
    kind: TransientKind,
    keys: &[&str],
    required: usize,
    args: Vec<Atom>,
    line: usize,
) -> Result<Transient> {
    if args.len() < required || args.len() > keys.len() {
        return Err(Error::shape(
            line,
            format!(
                "transient specification expects {required} to {} arguments, got {}",
                keys.len(),
                args.len()
            ),
        ));
    }
    let mut params = IndexMap::new();
    for (key, atom) in keys.iter().zip(args) {
        let value = if *key == "bit_pattern" {
            // bit patterns keep leading zeros, so never coerce to a number
            Expr::Str(node(&atom, line)?)
        } else {
            to_expr(atom, line)?
        };
        params.insert((*key).to_string(), value);
    }
    Ok(Transient { kind, params })
}

fn pwl_waveform(args: Vec<Atom>, line: usize) -> Result<Transient> {
    if args.is_empty() || args.len() % 2 != 0 {
        return Err(Error::shape(
            line,
            "PWL requires time/value pairs".to_string(),
        ));
    }
    let values = args
        .into_iter()
        .map(|atom| to_expr(atom, line))
        .collect::<Result<Vec<_>>>()?;
    let points = values
        .chunks(2)
        .map(|pair| Expr::List(pair.to_vec()))
        .collect();
    let mut params = IndexMap::new();
    params.insert("points".to_string(), Expr::List(points));
    Ok(Transient {
        kind: TransientKind::Pwl,
        params,
    })
}
