//! Per-device lowering for passives, semiconductors, switches and
//! subcircuit instances.
//!
//! This is where the dialect's positional/keyword overloading gets
//! resolved. The BJT rule is the subtle one: the trailing positional
//! arguments may spell `model`, `model area`, `thermal model`,
//! `substrate model area`, `substrate thermal model` or
//! `substrate thermal model area`, and only a numeric-coercion attempt on
//! the last argument tells them apart.

use spicedeck_core::circuit::{DeviceClass, Element, Statement};
use spicedeck_core::expr::Expr;
use spicedeck_core::units::parse_value;

use super::{node, split_device_atoms, to_expr, Walker};
use crate::cst::{Atom, DeviceLine};
use crate::error::{Error, Result};

impl Walker<'_> {
    /// R, L and C: two nodes, then a positional value, a `r=`/`l=`/`c=`
    /// keyword, or no value at all when a model supplies it.
    pub(super) fn walk_passive(
        &mut self,
        device: DeviceLine,
        class: DeviceClass,
        value_key: &str,
        letter: &str,
        line: usize,
    ) -> Result<()> {
        let (positional, mut params) = split_device_atoms(device.atoms, line)?;
        if !(2..=3).contains(&positional.len()) {
            return Err(Error::shape(
                line,
                format!(
                    "device {} expects two nodes and an optional value",
                    device.name
                ),
            ));
        }
        let nodes = vec![node(&positional[0], line)?, node(&positional[1], line)?];
        let mut value = match positional.into_iter().nth(2) {
            Some(atom) => Some(to_expr(atom, line)?),
            None => None,
        };
        if value.is_none() {
            value = params.shift_remove(letter);
        }
        let has_model = self.note_model(&params, line)?;
        match value {
            Some(value) => {
                params.insert(value_key.to_string(), value);
            }
            None if has_model => {}
            None => {
                return Err(Error::shape(
                    line,
                    format!("device {} has no value and no model", device.name),
                ));
            }
        }
        self.push_statement(Statement::Element(Element {
            class,
            name: device.name,
            nodes,
            params,
            transient: None,
        }));
        Ok(())
    }

    /// K: exactly two inductor names and a coupling factor. No nodes.
    pub(super) fn walk_coupled(&mut self, device: DeviceLine, line: usize) -> Result<()> {
        let (positional, mut params) = split_device_atoms(device.atoms, line)?;
        if positional.len() != 3 {
            return Err(Error::shape(
                line,
                format!(
                    "coupled inductor {} expects exactly two inductors and a coupling factor",
                    device.name
                ),
            ));
        }
        let inductor1 = node(&positional[0], line)?;
        let inductor2 = node(&positional[1], line)?;
        let coupling = to_expr(positional[2].clone(), line)?;
        self.note_model(&params, line)?;
        params.insert("inductor1".to_string(), Expr::Str(inductor1));
        params.insert("inductor2".to_string(), Expr::Str(inductor2));
        params.insert("coupling_factor".to_string(), coupling);
        self.push_statement(Statement::Element(Element {
            class: DeviceClass::CoupledInductor,
            name: device.name,
            nodes: Vec::new(),
            params,
            transient: None,
        }));
        Ok(())
    }

    /// D: anode, cathode, required model, optional positional area.
    pub(super) fn walk_diode(&mut self, device: DeviceLine, line: usize) -> Result<()> {
        let (positional, mut params) = split_device_atoms(device.atoms, line)?;
        if !(2..=4).contains(&positional.len()) {
            return Err(Error::shape(
                line,
                format!("diode {} expects two nodes and a model", device.name),
            ));
        }
        let nodes = vec![node(&positional[0], line)?, node(&positional[1], line)?];
        if let Some(atom) = positional.get(2) {
            let model = node(atom, line)?;
            params.insert("model".to_string(), Expr::Str(model));
        }
        if let Some(atom) = positional.get(3) {
            let area = atom.as_word().and_then(parse_value).ok_or_else(|| {
                Error::shape(line, format!("diode {} area must be numeric", device.name))
            })?;
            params.insert("area".to_string(), Expr::Number(area));
        }
        if !self.note_model(&params, line)? {
            return Err(Error::shape(
                line,
                format!("the device {} has no model", device.name),
            ));
        }
        self.push_statement(Statement::Element(Element {
            class: DeviceClass::Diode,
            name: device.name,
            nodes,
            params,
            transient: None,
        }));
        Ok(())
    }

    /// Q: collector, base, emitter, then the ambiguous tail. An `area=`
    /// keyword disables the numeric-coercion probe on the last argument.
    pub(super) fn walk_bjt(&mut self, device: DeviceLine, line: usize) -> Result<()> {
        let (positional, mut params) = split_device_atoms(device.atoms, line)?;
        if positional.len() < 3 {
            return Err(Error::shape(
                line,
                format!("BJT {} expects at least three nodes", device.name),
            ));
        }
        let mut nodes = vec![
            node(&positional[0], line)?,
            node(&positional[1], line)?,
            node(&positional[2], line)?,
        ];
        let rest = positional[3..]
            .iter()
            .map(|atom| node(atom, line))
            .collect::<Result<Vec<_>>>()?;
        let keyword_area = params.contains_key("area");
        let incompatible = || {
            Error::shape(
                line,
                format!("device not compatible with a BJT definition: {}", device.name),
            )
        };
        let mut area = None;
        let model = match rest.as_slice() {
            [] => {
                return Err(Error::shape(
                    line,
                    format!("the device {} has no model", device.name),
                ));
            }
            [model] => model.clone(),
            [first, last] => {
                let coerced = if keyword_area { None } else { parse_value(last) };
                match coerced {
                    Some(value) => {
                        area = Some(value);
                        first.clone()
                    }
                    None => {
                        // four-node form: substrate then model
                        nodes.push(first.clone());
                        last.clone()
                    }
                }
            }
            [first, second, last] => {
                if keyword_area {
                    return Err(incompatible());
                }
                if let Some(value) = parse_value(last) {
                    area = Some(value);
                    nodes.push(first.clone());
                    second.clone()
                } else {
                    nodes.push(first.clone());
                    nodes.push(second.clone());
                    last.clone()
                }
            }
            [first, second, third, last] => {
                if keyword_area {
                    return Err(incompatible());
                }
                if let Some(value) = parse_value(last) {
                    area = Some(value);
                    nodes.push(first.clone());
                    nodes.push(second.clone());
                    third.clone()
                } else {
                    return Err(incompatible());
                }
            }
            _ => return Err(incompatible()),
        };
        if let Some(area) = area {
            params.insert("area".to_string(), Expr::Number(area));
        }
        params.insert("model".to_string(), Expr::Str(model));
        self.note_model(&params, line)?;
        self.push_statement(Statement::Element(Element {
            class: DeviceClass::Bjt,
            name: device.name,
            nodes,
            params,
            transient: None,
        }));
        Ok(())
    }

    /// J: drain, gate, source, required model, optional positional area.
    pub(super) fn walk_jfet(&mut self, device: DeviceLine, line: usize) -> Result<()> {
        let (positional, mut params) = split_device_atoms(device.atoms, line)?;
        if !(3..=5).contains(&positional.len()) {
            return Err(Error::shape(
                line,
                format!("JFET {} expects three nodes and a model", device.name),
            ));
        }
        let nodes = vec![
            node(&positional[0], line)?,
            node(&positional[1], line)?,
            node(&positional[2], line)?,
        ];
        if let Some(atom) = positional.get(3) {
            let model = node(atom, line)?;
            params.insert("model".to_string(), Expr::Str(model));
        }
        if let Some(atom) = positional.get(4) {
            let area = atom.as_word().and_then(parse_value).ok_or_else(|| {
                Error::shape(line, format!("JFET {} area must be numeric", device.name))
            })?;
            params.insert("area".to_string(), Expr::Number(area));
        }
        if !self.note_model(&params, line)? {
            return Err(Error::shape(
                line,
                format!("the device {} has no model", device.name),
            ));
        }
        self.push_statement(Statement::Element(Element {
            class: DeviceClass::Jfet,
            name: device.name,
            nodes,
            params,
            transient: None,
        }));
        Ok(())
    }

    /// M: fixed drain, gate, source, bulk nodes, a model, then keywords.
    /// Parenthesized keyword values collapse into list parameters.
    pub(super) fn walk_mosfet(&mut self, device: DeviceLine, line: usize) -> Result<()> {
        let (positional, mut params) = split_device_atoms(device.atoms, line)?;
        if positional.len() < 5 {
            return Err(Error::shape(
                line,
                format!(
                    "MOSFET {} expects four nodes and a model",
                    device.name
                ),
            ));
        }
        if positional.len() > 5 {
            return Err(Error::shape(
                line,
                format!("unexpected argument on MOSFET {}", device.name),
            ));
        }
        let nodes = vec![
            node(&positional[0], line)?,
            node(&positional[1], line)?,
            node(&positional[2], line)?,
            node(&positional[3], line)?,
        ];
        let model = node(&positional[4], line)?;
        params.insert("model".to_string(), Expr::Str(model));
        self.note_model(&params, line)?;
        self.push_statement(Statement::Element(Element {
            class: DeviceClass::Mosfet,
            name: device.name,
            nodes,
            params,
            transient: None,
        }));
        Ok(())
    }

    /// S: positive, negative, optionally a control node pair, a model and
    /// an ON/OFF initial state. A lone control node is fatal.
    pub(super) fn walk_switch(&mut self, device: DeviceLine, line: usize) -> Result<()> {
        let (mut positional, mut params) = split_device_atoms(device.atoms, line)?;
        if let Some(last) = positional.last().and_then(Atom::as_word) {
            if last.eq_ignore_ascii_case("on") || last.eq_ignore_ascii_case("off") {
                params.insert("initial_state".to_string(), Expr::Str(last.to_string()));
                positional.pop();
            }
        }
        let nodes = match positional.len() {
            3 => vec![node(&positional[0], line)?, node(&positional[1], line)?],
            5 => vec![
                node(&positional[0], line)?,
                node(&positional[1], line)?,
                node(&positional[2], line)?,
                node(&positional[3], line)?,
            ],
            4 => {
                return Err(Error::shape(
                    line,
                    format!("only one control node defined on switch {}", device.name),
                ));
            }
            _ => {
                return Err(Error::shape(
                    line,
                    format!("switch {} not properly defined", device.name),
                ));
            }
        };
        let model = positional
            .last()
            .ok_or_else(|| Error::shape(line, format!("switch {} has no model", device.name)))
            .and_then(|atom| node(atom, line))?;
        params.insert("model".to_string(), Expr::Str(model));
        self.note_model(&params, line)?;
        self.push_statement(Statement::Element(Element {
            class: DeviceClass::Switch,
            name: device.name,
            nodes,
            params,
            transient: None,
        }));
        Ok(())
    }

    /// X: pin nodes, then the subcircuit name, then optional keywords
    /// (usually behind a `params:` marker).
    pub(super) fn walk_subcircuit_instance(
        &mut self,
        device: DeviceLine,
        line: usize,
    ) -> Result<()> {
        let (mut positional, mut params) = split_device_atoms(device.atoms, line)?;
        let Some(last) = positional.pop() else {
            return Err(Error::shape(
                line,
                format!(
                    "subcircuit instance {} requires a subcircuit name",
                    device.name
                ),
            ));
        };
        let subcircuit = node(&last, line)?;
        let nodes = positional
            .iter()
            .map(|atom| node(atom, line))
            .collect::<Result<Vec<_>>>()?;
        self.require_subcircuit(&subcircuit);
        params.insert("subcircuit".to_string(), Expr::Str(subcircuit));
        self.push_statement(Statement::Element(Element {
            class: DeviceClass::Subcircuit,
            name: device.name,
            nodes,
            params,
            transient: None,
        }));
        Ok(())
    }
}
