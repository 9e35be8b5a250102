//! Semantic walker: CST to circuit IR.
//!
//! The walker consumes production-tagged lines in source order while
//! holding a scope stack. `.subckt` and `.lib` push a scope, `.ends` and
//! `.endl` pop it and hand the finished definition to the parent. Device
//! lines go through the per-family disambiguation in the sibling modules.

mod devices;
mod sources;

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use spicedeck_core::circuit::{
    Circuit, DataTable, DeviceClass, Include, Library, LibraryCall, Model, Statement, SubCircuit,
};
use spicedeck_core::expr::Expr;
use spicedeck_core::units::{parse_complex, parse_value};

use crate::cst::{Atom, CstLine, DeviceLine, Production};
use crate::error::{Error, Result};
use crate::expr::parse_expression;
use crate::IncludeStack;

/// An open `.subckt` or `.lib` definition.
enum Scope {
    Subcircuit(SubCircuit),
    Library(Library),
}

pub(crate) struct Walker<'a> {
    path: Option<PathBuf>,
    display_path: String,
    root: Circuit,
    stack: Vec<Scope>,
    data: Option<DataBuilder>,
    includes: &'a mut IncludeStack,
}

struct DataBuilder {
    line: usize,
    table: String,
    columns: Vec<String>,
    values: Vec<String>,
}

impl<'a> Walker<'a> {
    pub(crate) fn new(path: Option<&Path>, includes: &'a mut IncludeStack) -> Self {
        let display_path = match path {
            Some(p) => p.display().to_string(),
            None => "<string>".to_string(),
        };
        Self {
            path: path.map(Path::to_path_buf),
            display_path,
            root: Circuit::new("", path.map(Path::to_path_buf)),
            stack: Vec::new(),
            data: None,
            includes,
        }
    }

    pub(crate) fn walk(mut self, lines: Vec<CstLine>) -> Result<Circuit> {
        for CstLine { number, production } in lines {
            self.walk_line(production, number)?;
        }
        if !self.stack.is_empty() {
            return Err(Error::NotClosedHierarchy {
                scope: self.display_path,
            });
        }
        Ok(self.root)
    }

    fn walk_line(&mut self, production: Production, line: usize) -> Result<()> {
        match production {
            Production::Title(title) => {
                self.root.title = title;
                Ok(())
            }
            Production::TitleCmd { title } => {
                if !self.stack.is_empty() {
                    return Err(Error::grammar(
                        line,
                        1,
                        ".title can only be used in the root circuit",
                    ));
                }
                self.root.title = title;
                Ok(())
            }
            Production::Device(device) => self.walk_device(device, line),
            Production::Model {
                name,
                device,
                params,
            } => {
                let params = param_map_lower(params, line)?;
                self.push_model(Model {
                    name,
                    device,
                    params,
                });
                Ok(())
            }
            Production::Param { params } => {
                let set = param_map(params, line)?;
                self.push_param(set);
                Ok(())
            }
            Production::Subckt {
                name,
                nodes,
                params,
            } => {
                let mut subcircuit = SubCircuit::new(name, nodes);
                subcircuit.defaults = param_map(params, line)?;
                self.stack.push(Scope::Subcircuit(subcircuit));
                Ok(())
            }
            Production::Ends { name } => match self.stack.pop() {
                Some(Scope::Subcircuit(subcircuit)) => {
                    if let Some(close) = name {
                        if !close.eq_ignore_ascii_case(&subcircuit.name) {
                            return Err(Error::NameMismatch {
                                open: subcircuit.name,
                                close,
                                line,
                            });
                        }
                    }
                    self.subcircuits_mut().push(subcircuit);
                    Ok(())
                }
                other => {
                    if let Some(scope) = other {
                        self.stack.push(scope);
                    }
                    Err(Error::grammar(line, 1, ".ends without matching .subckt"))
                }
            },
            Production::LibBlock { entry } => {
                if !self.stack.is_empty() {
                    return Err(Error::grammar(
                        line,
                        1,
                        "library blocks must be at the top level",
                    ));
                }
                self.stack.push(Scope::Library(Library::new(entry)));
                Ok(())
            }
            Production::Endl { name } => match self.stack.pop() {
                Some(Scope::Library(library)) => {
                    if let Some(close) = name {
                        if !close.eq_ignore_ascii_case(&library.entry) {
                            return Err(Error::NameMismatch {
                                open: library.entry,
                                close,
                                line,
                            });
                        }
                    }
                    self.root
                        .libraries
                        .insert(library.entry.to_lowercase(), library);
                    Ok(())
                }
                other => {
                    if let Some(scope) = other {
                        self.stack.push(scope);
                    }
                    Err(Error::grammar(line, 1, ".endl without matching .lib"))
                }
            },
            Production::LibCall { file, entry } => self.walk_lib_call(file, entry),
            Production::Include { path } => self.walk_include(&path),
            Production::Data {
                table,
                columns,
                values,
            } => {
                self.data = Some(DataBuilder {
                    line,
                    table,
                    columns,
                    values,
                });
                Ok(())
            }
            Production::DataRow { values } => match &mut self.data {
                Some(builder) => {
                    builder.values.extend(values);
                    Ok(())
                }
                None => Err(Error::grammar(line, 1, "data row outside a .data block")),
            },
            Production::EndData => self.finish_data(line),
            Production::Control { name, text } => {
                log::debug!("ignoring control directive .{name} {text}");
                Ok(())
            }
        }
    }

    fn finish_data(&mut self, line: usize) -> Result<()> {
        let Some(builder) = self.data.take() else {
            return Err(Error::grammar(line, 1, ".enddata without .data"));
        };
        if builder.values.len() % builder.columns.len() != 0 {
            return Err(Error::DataShape { line: builder.line });
        }
        let parsed = builder
            .values
            .iter()
            .map(|word| {
                parse_value(word).ok_or_else(|| {
                    Error::grammar(builder.line, 1, format!("invalid data value '{word}'"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let width = builder.columns.len();
        let mut columns = IndexMap::new();
        for (index, name) in builder.columns.into_iter().enumerate() {
            let column = parsed.iter().skip(index).step_by(width).copied().collect();
            columns.insert(name, column);
        }
        let table = DataTable {
            name: builder.table.clone(),
            columns,
        };
        self.root.data.insert(builder.table, table);
        Ok(())
    }

    fn walk_include(&mut self, path: &str) -> Result<()> {
        let resolved = self.resolve_path(path);
        log::debug!("including {}", resolved.display());
        let circuit = crate::parse_include(&resolved, self.includes)?;
        self.push_statement(Statement::Include(Include {
            path: resolved,
            circuit: Box::new(circuit),
        }));
        Ok(())
    }

    /// A `.lib file entry` call: parse the file now, adopt the library
    /// blocks it defines, and record the deferred splice for build time.
    fn walk_lib_call(&mut self, file: String, entry: String) -> Result<()> {
        let resolved = self.resolve_path(&file);
        log::debug!("loading library file {}", resolved.display());
        let circuit = crate::parse_include(&resolved, self.includes)?;
        for (key, library) in circuit.libraries {
            self.root.libraries.entry(key).or_insert(library);
        }
        self.root.library_calls.push(LibraryCall { file, entry });
        Ok(())
    }

    fn resolve_path(&self, target: &str) -> PathBuf {
        let target = Path::new(target);
        if target.is_absolute() {
            return target.to_path_buf();
        }
        match &self.path {
            Some(path) => path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(target),
            None => target.to_path_buf(),
        }
    }

    // ───────────────────── scope plumbing ─────────────────────

    fn push_statement(&mut self, statement: Statement) {
        match self.stack.last_mut() {
            Some(Scope::Subcircuit(s)) => s.statements.push(statement),
            Some(Scope::Library(l)) => l.statements.push(statement),
            None => self.root.statements.push(statement),
        }
    }

    fn push_model(&mut self, model: Model) {
        match self.stack.last_mut() {
            Some(Scope::Subcircuit(s)) => s.models.push(model),
            Some(Scope::Library(l)) => l.models.push(model),
            None => self.root.models.push(model),
        }
    }

    fn push_param(&mut self, set: IndexMap<String, Expr>) {
        match self.stack.last_mut() {
            Some(Scope::Subcircuit(s)) => s.params.push(set),
            Some(Scope::Library(l)) => l.params.push(set),
            None => self.root.params.push(set),
        }
    }

    fn subcircuits_mut(&mut self) -> &mut Vec<SubCircuit> {
        match self.stack.last_mut() {
            Some(Scope::Subcircuit(s)) => &mut s.subcircuits,
            Some(Scope::Library(l)) => &mut l.subcircuits,
            None => &mut self.root.subcircuits,
        }
    }

    /// Record a model reference in the enclosing scope. Definitions inside
    /// a library block are checked where the entry gets spliced, not here.
    fn require_model(&mut self, name: &str) {
        let lower = name.to_lowercase();
        match self.stack.last_mut() {
            Some(Scope::Subcircuit(s)) => {
                s.required_models.insert(lower);
            }
            Some(Scope::Library(_)) => {}
            None => {
                self.root.required_models.insert(lower);
            }
        }
    }

    fn require_subcircuit(&mut self, name: &str) {
        let lower = name.to_lowercase();
        match self.stack.last_mut() {
            Some(Scope::Subcircuit(s)) => {
                s.required_subcircuits.insert(lower);
            }
            Some(Scope::Library(_)) => {}
            None => {
                self.root.required_subcircuits.insert(lower);
            }
        }
    }

    // ───────────────────── device dispatch ─────────────────────

    fn walk_device(&mut self, device: DeviceLine, line: usize) -> Result<()> {
        let first = device.name.chars().next().unwrap_or(' ');
        match first.to_ascii_uppercase() {
            'R' => self.walk_passive(device, DeviceClass::Resistor, "resistance", "r", line),
            'C' => self.walk_passive(device, DeviceClass::Capacitor, "capacitance", "c", line),
            'L' => self.walk_passive(device, DeviceClass::Inductor, "inductance", "l", line),
            'K' => self.walk_coupled(device, line),
            'D' => self.walk_diode(device, line),
            'Q' => self.walk_bjt(device, line),
            'J' => self.walk_jfet(device, line),
            'M' => self.walk_mosfet(device, line),
            'V' => self.walk_source(device, DeviceClass::VoltageSource, line),
            'I' => self.walk_source(device, DeviceClass::CurrentSource, line),
            'E' => self.walk_controlled(device, true, true, line),
            'G' => self.walk_controlled(device, false, true, line),
            'F' => self.walk_controlled(device, false, false, line),
            'H' => self.walk_controlled(device, true, false, line),
            'B' => self.walk_behavioral(device, line),
            'S' => self.walk_switch(device, line),
            'X' => self.walk_subcircuit_instance(device, line),
            other => Err(Error::grammar(
                line,
                1,
                format!("unknown device prefix '{other}'"),
            )),
        }
    }

    /// Note the `model` parameter of an element, if present, as required
    /// in the enclosing scope.
    fn note_model(&mut self, params: &IndexMap<String, Expr>, line: usize) -> Result<bool> {
        match params.get("model") {
            Some(value) => {
                let name = value
                    .as_str()
                    .ok_or_else(|| Error::shape(line, "model reference must be a name"))?
                    .to_string();
                self.require_model(&name);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ───────────────────── atom lowering helpers ─────────────────────

/// Lower a single atom to an expression. Bare words become numbers when
/// they scan as one, complex literals when they end in `j`, and strings
/// otherwise; braced bodies go through the expression sub-parser.
pub(crate) fn to_expr(atom: Atom, line: usize) -> Result<Expr> {
    match atom {
        Atom::Word(word) => Ok(word_expr(word)),
        Atom::Braced(body) => parse_expression(&body, line),
        Atom::Group(items) => Ok(Expr::List(
            items
                .into_iter()
                .map(|item| to_expr(item, line))
                .collect::<Result<Vec<_>>>()?,
        )),
        _ => Err(Error::grammar(line, 1, "unexpected token in value position")),
    }
}

fn word_expr(word: String) -> Expr {
    if word.ends_with(['j', 'J']) {
        if let Some(c) = parse_complex(&word) {
            return Expr::Complex(c);
        }
    }
    match parse_value(&word) {
        Some(value) => Expr::Number(value),
        None => Expr::Str(word),
    }
}

fn node(atom: &Atom, line: usize) -> Result<String> {
    atom.as_word()
        .map(str::to_string)
        .ok_or_else(|| Error::shape(line, "expected a node name"))
}

/// Split device-line atoms into positional arguments and a lowercased
/// keyword map. A `params:` marker switches everything after it to
/// keywords only.
fn split_device_atoms(
    atoms: Vec<Atom>,
    line: usize,
) -> Result<(Vec<Atom>, IndexMap<String, Expr>)> {
    let mut positional = Vec::new();
    let mut params = IndexMap::new();
    let mut keywords_only = false;
    for atom in atoms {
        match atom {
            Atom::KeyValue { key, value } => {
                params.insert(key.to_lowercase(), to_expr(*value, line)?);
            }
            Atom::Word(w) if w.eq_ignore_ascii_case("params:") => keywords_only = true,
            Atom::Word(_) | Atom::Braced(_) | Atom::Group(_) if !keywords_only => {
                positional.push(atom);
            }
            _ => {
                return Err(Error::grammar(line, 1, "unexpected token on device line"));
            }
        }
    }
    Ok((positional, params))
}

/// Directive parameter list with keys lowercased (`.model` records).
fn param_map_lower(params: Vec<(String, Atom)>, line: usize) -> Result<IndexMap<String, Expr>> {
    let mut map = IndexMap::new();
    for (key, value) in params {
        map.insert(key.to_lowercase(), to_expr(value, line)?);
    }
    Ok(map)
}

/// Directive parameter list with keys as written (`.param`, `.subckt`).
fn param_map(params: Vec<(String, Atom)>, line: usize) -> Result<IndexMap<String, Expr>> {
    let mut map = IndexMap::new();
    for (key, value) in params {
        map.insert(key, to_expr(value, line)?);
    }
    Ok(map)
}
