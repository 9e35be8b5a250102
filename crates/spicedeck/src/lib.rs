//! Spicedeck: parse SPICE netlists into a hierarchical circuit IR.
//!
//! This facade re-exports the public surface of the workspace:
//! [`SpiceParser`] and its error type from `spicedeck-parser`, and the IR,
//! expression and value types from `spicedeck-core`.
//!
//! ```
//! use spicedeck::SpiceParser;
//!
//! let parser = SpiceParser::parse_source(
//!     "Voltage Divider\n\
//!      V1 in 0 DC 10\n\
//!      R1 in out 1k\n\
//!      R2 out 0 1k\n\
//!      .end\n",
//! )?;
//! assert_eq!(parser.circuit().title, "Voltage Divider");
//! assert_eq!(parser.circuit().elements().count(), 3);
//! # Ok::<(), spicedeck::Error>(())
//! ```

pub use spicedeck_core::{
    BinaryOp, BuildError, Circuit, DataTable, DeviceClass, Element, Expr, Function, Include,
    Library, LibraryCall, Model, NetlistSink, Number, ParamSet, Scale, Statement, SubCircuit,
    Transient, TransientKind, UnaryOp, Value,
};
pub use spicedeck_parser::{parse, Error, Result, SpiceParser};
