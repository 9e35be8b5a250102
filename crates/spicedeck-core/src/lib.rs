//! Circuit intermediate representation for Spicedeck.
//!
//! This crate provides the building blocks shared by the parser front-end
//! and by downstream consumers:
//! - Numeric values with engineering-notation scale suffixes
//! - The algebraic expression AST used in `{...}` braces and `.param`
//! - The hierarchical circuit IR (elements, models, subcircuits, libraries)
//! - The [`NetlistSink`] trait and [`Circuit::build`] replay facade

pub mod build;
pub mod circuit;
pub mod error;
pub mod expr;
pub mod units;

pub use build::NetlistSink;
pub use circuit::{
    Circuit, DataTable, DeviceClass, Element, Include, Library, LibraryCall, Model, ParamSet,
    Statement, SubCircuit, Transient, TransientKind,
};
pub use error::{BuildError, Result};
pub use expr::{BinaryOp, Expr, Function, UnaryOp};
pub use units::{Number, Scale, Value};
