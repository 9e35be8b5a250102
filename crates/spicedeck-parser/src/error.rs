//! Parser error type.
//!
//! A single public error enum covers the whole pipeline, from lexing to
//! resolution. Every failure is fatal; the first error aborts the parse.
//! Errors crossing an `.include` boundary are wrapped with the including
//! file's path, so deep failures read like a breadcrumb trail.

use std::path::{Path, PathBuf};

use spicedeck_core::BuildError;
use thiserror::Error;

/// Errors raised while parsing and resolving a SPICE netlist.
#[derive(Debug, Error)]
pub enum Error {
    /// A grammar-level diagnostic with its source position.
    #[error("line {line}, column {column}: {message}")]
    Grammar {
        line: usize,
        column: usize,
        message: String,
    },

    /// A `.subckt` or `.lib` scope left open at end of input.
    #[error("Not closed hierarchy: {scope}")]
    NotClosedHierarchy { scope: String },

    /// Opening and closing names of a scope differ.
    #[error("Begin and end names differ (line {line}): {open} != {close}")]
    NameMismatch {
        open: String,
        close: String,
        line: usize,
    },

    /// A device line whose arguments do not fit any legal shape.
    #[error("line {line}: {message}")]
    DeviceShape { line: usize, message: String },

    /// An element references a model no enclosing scope defines.
    #[error("Model {model} not available in {scope}")]
    MissingModel { model: String, scope: String },

    /// An element instantiates a subcircuit no enclosing scope defines.
    #[error("Subcircuit {name} not available in {scope}")]
    MissingSubcircuit { name: String, scope: String },

    /// The subcircuit dependency graph has a cycle.
    #[error("Crossed dependencies ({remaining})")]
    CrossedDependencies { remaining: String },

    /// A `.data` value count not divisible by the column count.
    #[error("The number of elements per parameter do not match (line {line})")]
    DataShape { line: usize },

    /// An `.include` chain that re-enters a file already being parsed.
    #[error("include cycle: {path}")]
    IncludeCycle { path: PathBuf },

    /// Failure reading a source or include file.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An error from a nested parse, prefixed with the enclosing path.
    #[error("{path}: {source}")]
    InFile {
        path: String,
        #[source]
        source: Box<Error>,
    },

    /// An error raised while replaying the IR into a sink.
    #[error(transparent)]
    Build(#[from] BuildError),
}

impl Error {
    pub(crate) fn grammar(line: usize, column: usize, message: impl Into<String>) -> Error {
        Error::Grammar {
            line,
            column,
            message: message.into(),
        }
    }

    pub(crate) fn shape(line: usize, message: impl Into<String>) -> Error {
        Error::DeviceShape {
            line,
            message: message.into(),
        }
    }

    pub(crate) fn in_file(path: &Path, source: Error) -> Error {
        Error::InFile {
            path: path.display().to_string(),
            source: Box::new(source),
        }
    }
}

/// Result type for parsing operations.
pub type Result<T> = std::result::Result<T, Error>;
