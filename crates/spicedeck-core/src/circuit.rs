//! The hierarchical circuit IR.
//!
//! A parse produces a single [`Circuit`] owning every statement, model,
//! subcircuit, library and data table found in the source. Elements refer
//! to models and subcircuits by lowercased name, never by pointer; the
//! resolver validates those names against the scope chain and reorders the
//! subcircuit lists without touching anything else.

use std::collections::BTreeSet;
use std::path::PathBuf;

use indexmap::IndexMap;

use crate::expr::Expr;
use crate::units::Value;

/// One `.param` statement: a set of name/expression bindings.
pub type ParamSet = IndexMap<String, Expr>;

/// Device families, tagged by the instance-name prefix letter.
///
/// The controlled-source letters E, F, G and H all fold to
/// [`DeviceClass::Behavioral`]; the walker synthesizes the equivalent
/// behavioral expression when it lowers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    Resistor,
    Capacitor,
    Inductor,
    CoupledInductor,
    Diode,
    Bjt,
    Jfet,
    Mosfet,
    VoltageSource,
    CurrentSource,
    Behavioral,
    Switch,
    Subcircuit,
}

impl DeviceClass {
    /// Map an instance-name prefix letter to its device family.
    pub fn from_prefix(letter: char) -> Option<DeviceClass> {
        Some(match letter.to_ascii_uppercase() {
            'R' => DeviceClass::Resistor,
            'C' => DeviceClass::Capacitor,
            'L' => DeviceClass::Inductor,
            'K' => DeviceClass::CoupledInductor,
            'D' => DeviceClass::Diode,
            'Q' => DeviceClass::Bjt,
            'J' => DeviceClass::Jfet,
            'M' => DeviceClass::Mosfet,
            'V' => DeviceClass::VoltageSource,
            'I' => DeviceClass::CurrentSource,
            'B' | 'E' | 'F' | 'G' | 'H' => DeviceClass::Behavioral,
            'S' => DeviceClass::Switch,
            'X' => DeviceClass::Subcircuit,
            _ => return None,
        })
    }

    /// Canonical prefix letter for emission.
    pub fn prefix(self) -> char {
        match self {
            DeviceClass::Resistor => 'R',
            DeviceClass::Capacitor => 'C',
            DeviceClass::Inductor => 'L',
            DeviceClass::CoupledInductor => 'K',
            DeviceClass::Diode => 'D',
            DeviceClass::Bjt => 'Q',
            DeviceClass::Jfet => 'J',
            DeviceClass::Mosfet => 'M',
            DeviceClass::VoltageSource => 'V',
            DeviceClass::CurrentSource => 'I',
            DeviceClass::Behavioral => 'B',
            DeviceClass::Switch => 'S',
            DeviceClass::Subcircuit => 'X',
        }
    }
}

/// The transient waveform attached to an independent source.
#[derive(Debug, Clone, PartialEq)]
pub struct Transient {
    pub kind: TransientKind,
    pub params: IndexMap<String, Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientKind {
    Pulse,
    Sin,
    Pwl,
    Pattern,
}

/// A device instance.
///
/// Parameter keys are stored lowercased; node names and parameter values
/// keep their source casing.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub class: DeviceClass,
    pub name: String,
    pub nodes: Vec<String>,
    pub params: IndexMap<String, Expr>,
    pub transient: Option<Transient>,
}

impl Element {
    pub fn new(class: DeviceClass, name: impl Into<String>) -> Self {
        Self {
            class,
            name: name.into(),
            nodes: Vec::new(),
            params: IndexMap::new(),
            transient: None,
        }
    }

    /// The referenced model name, if any.
    pub fn model(&self) -> Option<&str> {
        self.params.get("model").and_then(Expr::as_str)
    }

    /// The instantiated subcircuit name, for X elements.
    pub fn subcircuit(&self) -> Option<&str> {
        self.params.get("subcircuit").and_then(Expr::as_str)
    }
}

/// A `.model` record.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub name: String,
    pub device: String,
    pub params: IndexMap<String, Expr>,
}

/// A `.data` table: equally long named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTable {
    pub name: String,
    pub columns: IndexMap<String, Vec<Value>>,
}

/// A deferred `.lib "file" entry` import, resolved during `build`.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryCall {
    pub file: String,
    pub entry: String,
}

/// An `.include` statement and its eagerly parsed contents.
#[derive(Debug, Clone, PartialEq)]
pub struct Include {
    pub path: PathBuf,
    pub circuit: Box<Circuit>,
}

/// A source-ordered statement inside a circuit or subcircuit body.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Element(Element),
    Include(Include),
}

/// A named `.lib entry ... .endl` block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Library {
    pub entry: String,
    pub models: Vec<Model>,
    pub subcircuits: Vec<SubCircuit>,
    pub params: Vec<ParamSet>,
    pub statements: Vec<Statement>,
}

impl Library {
    pub fn new(entry: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
            ..Self::default()
        }
    }
}

/// A `.subckt` definition. May nest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubCircuit {
    pub name: String,
    /// Port nodes, in declaration order.
    pub nodes: Vec<String>,
    /// Default parameter bindings from the `.subckt` line.
    pub defaults: IndexMap<String, Expr>,
    pub models: Vec<Model>,
    pub subcircuits: Vec<SubCircuit>,
    pub params: Vec<ParamSet>,
    pub statements: Vec<Statement>,
    pub required_models: BTreeSet<String>,
    pub required_subcircuits: BTreeSet<String>,
}

impl SubCircuit {
    pub fn new(name: impl Into<String>, nodes: Vec<String>) -> Self {
        Self {
            name: name.into(),
            nodes,
            ..Self::default()
        }
    }

    /// Elements directly contained in this definition, in source order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.statements.iter().filter_map(|s| match s {
            Statement::Element(e) => Some(e),
            _ => None,
        })
    }
}

/// The root of a parsed netlist.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Circuit {
    /// The title line, possibly overridden by `.title`.
    pub title: String,
    /// Source path, when parsed from a file. Used for diagnostics and as
    /// the base directory for `.include` resolution.
    pub path: Option<PathBuf>,
    /// `.lib entry` blocks, keyed by lowercased entry name.
    pub libraries: IndexMap<String, Library>,
    pub library_calls: Vec<LibraryCall>,
    pub models: Vec<Model>,
    pub subcircuits: Vec<SubCircuit>,
    pub params: Vec<ParamSet>,
    pub statements: Vec<Statement>,
    /// `.data` tables, keyed by table name.
    pub data: IndexMap<String, DataTable>,
    pub required_models: BTreeSet<String>,
    pub required_subcircuits: BTreeSet<String>,
}

impl Circuit {
    pub fn new(title: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self {
            title: title.into(),
            path,
            ..Self::default()
        }
    }

    /// Elements directly contained in the root, in source order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.statements.iter().filter_map(|s| match s {
            Statement::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Look up a library block by entry name, case-insensitively.
    pub fn library(&self, entry: &str) -> Option<&Library> {
        self.libraries.get(&entry.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_dispatch() {
        assert_eq!(DeviceClass::from_prefix('r'), Some(DeviceClass::Resistor));
        assert_eq!(DeviceClass::from_prefix('X'), Some(DeviceClass::Subcircuit));
        assert_eq!(DeviceClass::from_prefix('z'), None);
    }

    #[test]
    fn test_controlled_source_letters_fold_to_behavioral() {
        for letter in ['E', 'F', 'G', 'H', 'B'] {
            assert_eq!(
                DeviceClass::from_prefix(letter),
                Some(DeviceClass::Behavioral)
            );
        }
        assert_eq!(DeviceClass::Behavioral.prefix(), 'B');
    }

    #[test]
    fn test_element_model_accessor() {
        let mut element = Element::new(DeviceClass::Diode, "D1");
        element
            .params
            .insert("model".to_string(), Expr::Str("1N4148".to_string()));
        assert_eq!(element.model(), Some("1N4148"));
    }
}
