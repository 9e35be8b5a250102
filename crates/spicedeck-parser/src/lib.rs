//! SPICE netlist parser and semantic analyzer.
//!
//! Parsing runs a fixed pipeline: logical-line assembly (continuation
//! joining, comment stripping), a grammar layer producing production-tagged
//! CST lines, a semantic walker lowering the CST to the circuit IR while
//! resolving `.include`/`.lib` references eagerly, and a resolution pass
//! that validates model references and topologically orders subcircuits.
//! The result is a [`SpiceParser`] handle over a
//! [`Circuit`](spicedeck_core::Circuit).
//!
//! ```no_run
//! use spicedeck_parser::SpiceParser;
//!
//! let parser = SpiceParser::parse_file("amplifier.cir")?;
//! for model in parser.models() {
//!     println!("{} ({})", model.name, model.device);
//! }
//! # Ok::<(), spicedeck_parser::Error>(())
//! ```

mod cst;
mod error;
mod expr;
mod lexer;
mod lines;
mod resolve;
mod walker;

use std::fs;
use std::path::{Path, PathBuf};

use spicedeck_core::circuit::{Circuit, Model, ParamSet, SubCircuit};
use spicedeck_core::NetlistSink;

pub use error::{Error, Result};

/// Parse a netlist from a source string.
pub fn parse(source: &str) -> Result<SpiceParser> {
    SpiceParser::parse_source(source)
}

/// A parsed and resolved SPICE netlist.
#[derive(Debug)]
pub struct SpiceParser {
    circuit: Circuit,
}

impl SpiceParser {
    /// Parse a netlist file.
    pub fn parse_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_file(path.as_ref(), false)
    }

    /// Parse a library file: its own models and subcircuits are promoted
    /// to requirements, so it resolves like a leaf that publishes them.
    pub fn parse_library(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_file(path.as_ref(), true)
    }

    /// Parse a netlist from a source string.
    pub fn parse_source(source: &str) -> Result<Self> {
        Self::from_source(source, None, false)
    }

    /// Parse a source string, treating it as a library file.
    pub fn parse_library_source(source: &str) -> Result<Self> {
        Self::from_source(source, None, true)
    }

    /// Parse a source string while attributing it to `path` for error
    /// messages and `.include` resolution.
    pub fn parse_source_at(source: &str, path: impl AsRef<Path>) -> Result<Self> {
        Self::from_source(source, Some(path.as_ref()), false)
    }

    fn from_file(path: &Path, library: bool) -> Result<Self> {
        let mut includes = IncludeStack::default();
        let circuit = parse_path(path, library, &mut includes)?;
        Ok(Self { circuit })
    }

    fn from_source(source: &str, path: Option<&Path>, library: bool) -> Result<Self> {
        let mut includes = IncludeStack::default();
        let circuit = parse_text(source, path, library, &mut includes)?;
        Ok(Self { circuit })
    }

    /// The root of the IR.
    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    /// Models defined at the root.
    pub fn models(&self) -> &[Model] {
        &self.circuit.models
    }

    /// Subcircuits defined at the root, in dependency order.
    pub fn subcircuits(&self) -> &[SubCircuit] {
        &self.circuit.subcircuits
    }

    /// `.param` sets defined at the root.
    pub fn parameters(&self) -> &[ParamSet] {
        &self.circuit.params
    }

    /// True when the netlist defines subcircuits and nothing else.
    pub fn is_only_subcircuit(&self) -> bool {
        self.circuit.statements.is_empty() && !self.circuit.subcircuits.is_empty()
    }

    /// True when the netlist defines models and nothing else.
    pub fn is_only_model(&self) -> bool {
        self.circuit.statements.is_empty()
            && self.circuit.subcircuits.is_empty()
            && !self.circuit.models.is_empty()
    }

    /// Replay the IR into `sink`, rewriting nodes named `ground` to 0.
    pub fn build_circuit<S: NetlistSink>(&self, sink: &mut S, ground: &str) -> Result<()> {
        self.circuit.build(sink, ground)?;
        Ok(())
    }
}

/// The chain of files currently being parsed, for include-cycle detection.
#[derive(Default)]
pub(crate) struct IncludeStack {
    paths: Vec<PathBuf>,
}

impl IncludeStack {
    fn canonical(path: &Path) -> PathBuf {
        fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
    }

    fn enter(&mut self, path: &Path) -> Result<()> {
        let canonical = Self::canonical(path);
        if self.paths.contains(&canonical) {
            return Err(Error::IncludeCycle { path: canonical });
        }
        self.paths.push(canonical);
        Ok(())
    }

    fn leave(&mut self) {
        self.paths.pop();
    }
}

/// Parse a file into a resolved circuit.
pub(crate) fn parse_path(
    path: &Path,
    library: bool,
    includes: &mut IncludeStack,
) -> Result<Circuit> {
    includes.enter(path)?;
    let result = read_and_parse(path, library, includes);
    includes.leave();
    result
}

/// Parse an `.include`d or `.lib`-called file.
pub(crate) fn parse_include(path: &Path, includes: &mut IncludeStack) -> Result<Circuit> {
    parse_path(path, false, includes)
}

fn read_and_parse(path: &Path, library: bool, includes: &mut IncludeStack) -> Result<Circuit> {
    log::debug!("reading SPICE file {}", path.display());
    let source = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_text(&source, Some(path), library, includes)
}

/// The full pipeline over in-memory source. Errors pick up the source path
/// as a prefix, so failures inside includes carry a breadcrumb trail.
pub(crate) fn parse_text(
    source: &str,
    path: Option<&Path>,
    library: bool,
    includes: &mut IncludeStack,
) -> Result<Circuit> {
    let run = |includes: &mut IncludeStack| -> Result<Circuit> {
        let logical = lines::logical_lines(source)?;
        let cst = cst::parse_lines(&logical)?;
        let mut circuit = walker::Walker::new(path, includes).walk(cst)?;
        resolve::resolve(&mut circuit, library)?;
        Ok(circuit)
    };
    match path {
        Some(path) => run(includes).map_err(|error| Error::in_file(path, error)),
        None => run(includes),
    }
}
