//! Replay of the IR into an external netlist sink.
//!
//! [`Circuit::build`] walks the finished IR in a fixed order - includes,
//! library splices, parameters, data tables, models, subcircuits, elements -
//! and drives the caller-supplied [`NetlistSink`]. Node names equal to the
//! caller's ground identifier are rewritten to `0` on the way out.

use std::path::Path;

use indexmap::IndexMap;

use crate::circuit::{Circuit, Element, Statement, SubCircuit};
use crate::error::{BuildError, Result};
use crate::expr::Expr;
use crate::units::Value;

/// The downstream netlist object model, seen as a sink of replay calls.
///
/// Subcircuits are built depth-first: `subcircuit` opens a child sink, the
/// child receives the definition's contents, and `finish_subcircuit` hands
/// the completed child back to its parent.
pub trait NetlistSink: Sized {
    fn include(&mut self, path: &Path);

    fn parameter(&mut self, name: &str, value: &Expr);

    fn model(&mut self, name: &str, device: &str, params: &IndexMap<String, Expr>);

    fn data(&mut self, table: &str, columns: &IndexMap<String, Vec<Value>>);

    fn subcircuit(
        &mut self,
        name: &str,
        nodes: &[String],
        defaults: &IndexMap<String, Expr>,
    ) -> Self;

    fn finish_subcircuit(&mut self, child: Self);

    /// Receive one element. `nodes` is the element's node list with the
    /// ground identifier already rewritten to `0`.
    fn element(&mut self, element: &Element, nodes: &[String]);
}

impl Circuit {
    /// Replay this circuit into `sink`, rewriting nodes named `ground` to 0.
    pub fn build<S: NetlistSink>(&self, sink: &mut S, ground: &str) -> Result<()> {
        for statement in &self.statements {
            if let Statement::Include(include) = statement {
                sink.include(&include.path);
            }
        }
        for call in &self.library_calls {
            let library = self
                .library(&call.entry)
                .ok_or_else(|| BuildError::MissingLibrary {
                    entry: call.entry.clone(),
                    scope: self.title.clone(),
                })?;
            log::debug!("splicing library entry {} from {}", library.entry, call.file);
            for set in &library.params {
                for (name, value) in set {
                    sink.parameter(name, value);
                }
            }
            for model in &library.models {
                sink.model(&model.name, &model.device, &model.params);
            }
            for subcircuit in &library.subcircuits {
                build_subcircuit(subcircuit, sink, ground);
            }
        }
        for set in &self.params {
            for (name, value) in set {
                sink.parameter(name, value);
            }
        }
        for table in self.data.values() {
            sink.data(&table.name, &table.columns);
        }
        for model in &self.models {
            sink.model(&model.name, &model.device, &model.params);
        }
        for subcircuit in &self.subcircuits {
            build_subcircuit(subcircuit, sink, ground);
        }
        for element in self.elements() {
            sink.element(element, &translate_ground(&element.nodes, ground));
        }
        Ok(())
    }
}

fn build_subcircuit<S: NetlistSink>(subcircuit: &SubCircuit, parent: &mut S, ground: &str) {
    let mut child = parent.subcircuit(&subcircuit.name, &subcircuit.nodes, &subcircuit.defaults);
    for set in &subcircuit.params {
        for (name, value) in set {
            child.parameter(name, value);
        }
    }
    for model in &subcircuit.models {
        child.model(&model.name, &model.device, &model.params);
    }
    for nested in &subcircuit.subcircuits {
        build_subcircuit(nested, &mut child, ground);
    }
    for element in subcircuit.elements() {
        child.element(element, &translate_ground(&element.nodes, ground));
    }
    parent.finish_subcircuit(child);
}

fn translate_ground(nodes: &[String], ground: &str) -> Vec<String> {
    nodes
        .iter()
        .map(|node| {
            if node == ground {
                "0".to_string()
            } else {
                node.clone()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::DeviceClass;

    #[derive(Default)]
    struct TraceSink {
        calls: Vec<String>,
    }

    impl NetlistSink for TraceSink {
        fn include(&mut self, path: &Path) {
            self.calls.push(format!("include {}", path.display()));
        }

        fn parameter(&mut self, name: &str, value: &Expr) {
            self.calls.push(format!("param {name}={value}"));
        }

        fn model(&mut self, name: &str, device: &str, _params: &IndexMap<String, Expr>) {
            self.calls.push(format!("model {name} {device}"));
        }

        fn data(&mut self, table: &str, _columns: &IndexMap<String, Vec<Value>>) {
            self.calls.push(format!("data {table}"));
        }

        fn subcircuit(
            &mut self,
            name: &str,
            _nodes: &[String],
            _defaults: &IndexMap<String, Expr>,
        ) -> Self {
            self.calls.push(format!("subckt {name}"));
            TraceSink::default()
        }

        fn finish_subcircuit(&mut self, child: Self) {
            for call in child.calls {
                self.calls.push(format!("  {call}"));
            }
            self.calls.push("ends".to_string());
        }

        fn element(&mut self, element: &Element, nodes: &[String]) {
            self.calls
                .push(format!("elem {} {}", element.name, nodes.join(" ")));
        }
    }

    #[test]
    fn test_build_order_and_ground_rewrite() {
        let mut circuit = Circuit::new("Test", None);
        circuit.models.push(crate::circuit::Model {
            name: "nfet".to_string(),
            device: "nmos".to_string(),
            params: IndexMap::new(),
        });
        let mut element = Element::new(DeviceClass::Resistor, "R1");
        element.nodes = vec!["in".to_string(), "gnd".to_string()];
        circuit.statements.push(Statement::Element(element));

        let mut sink = TraceSink::default();
        circuit.build(&mut sink, "gnd").unwrap();
        assert_eq!(sink.calls, vec!["model nfet nmos", "elem R1 in 0"]);
    }

    #[test]
    fn test_build_missing_library_entry_is_fatal() {
        let mut circuit = Circuit::new("Test", None);
        circuit.library_calls.push(crate::circuit::LibraryCall {
            file: "lib.spi".to_string(),
            entry: "fast".to_string(),
        });
        let mut sink = TraceSink::default();
        let err = circuit.build(&mut sink, "0").unwrap_err();
        assert!(err.to_string().contains("fast"));
    }
}
