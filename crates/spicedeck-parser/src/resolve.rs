//! Post-walk resolution: model availability and subcircuit ordering.
//!
//! Two depth-first passes run over the finished IR. The model check
//! accumulates the set of model names visible on the scope chain and
//! demands that every recorded requirement is satisfied. The subcircuit
//! sort reorders each scope's subcircuit list so that definitions precede
//! their users; a scope whose remaining definitions all wait on each other
//! is a dependency cycle and fatal.

use std::collections::{BTreeSet, HashSet};

use spicedeck_core::circuit::{Circuit, Model, SubCircuit};

use crate::error::{Error, Result};

/// Run both resolution passes over the root.
///
/// With `library` set, the root first promotes its own model and
/// subcircuit names into its required sets, so a library file behaves
/// like a leaf that publishes its definitions.
pub(crate) fn resolve(circuit: &mut Circuit, library: bool) -> Result<()> {
    if library {
        circuit.required_models = circuit
            .models
            .iter()
            .map(|m| m.name.to_lowercase())
            .collect();
        circuit.required_subcircuits = circuit
            .subcircuits
            .iter()
            .map(|s| s.name.to_lowercase())
            .collect();
    }
    let scope = scope_label(circuit);
    check_models(
        &circuit.models,
        &circuit.subcircuits,
        &circuit.required_models,
        &scope,
        &HashSet::new(),
    )?;
    sort_subcircuits(
        &mut circuit.subcircuits,
        &circuit.required_subcircuits,
        &scope,
        &HashSet::new(),
    )?;
    Ok(())
}

fn scope_label(circuit: &Circuit) -> String {
    if circuit.title.is_empty() {
        match &circuit.path {
            Some(path) => path.display().to_string(),
            None => "<circuit>".to_string(),
        }
    } else {
        circuit.title.clone()
    }
}

/// Depth-first model check. `inherited` is the set of lowercased model
/// names visible from enclosing scopes.
fn check_models(
    models: &[Model],
    subcircuits: &[SubCircuit],
    required: &BTreeSet<String>,
    scope: &str,
    inherited: &HashSet<String>,
) -> Result<()> {
    let mut available = inherited.clone();
    available.extend(models.iter().map(|m| m.name.to_lowercase()));
    for subcircuit in subcircuits {
        check_models(
            &subcircuit.models,
            &subcircuit.subcircuits,
            &subcircuit.required_models,
            &subcircuit.name,
            &available,
        )?;
    }
    for model in required {
        if !available.contains(model) {
            return Err(Error::MissingModel {
                model: model.clone(),
                scope: scope.to_string(),
            });
        }
    }
    Ok(())
}

/// Depth-first subcircuit sort. Within one scope, a definition's unmet
/// dependencies are the required names satisfied neither inside itself nor
/// by inheritance - that is, the names its siblings must provide first.
fn sort_subcircuits(
    subcircuits: &mut Vec<SubCircuit>,
    required: &BTreeSet<String>,
    scope: &str,
    inherited: &HashSet<String>,
) -> Result<()> {
    let mut available = inherited.clone();
    available.extend(subcircuits.iter().map(|s| s.name.to_lowercase()));

    for subcircuit in subcircuits.iter_mut() {
        let name = subcircuit.name.clone();
        let nested_required = subcircuit.required_subcircuits.clone();
        sort_subcircuits(
            &mut subcircuit.subcircuits,
            &nested_required,
            &name,
            &available,
        )?;
    }
    for name in required {
        if !available.contains(name) {
            return Err(Error::MissingSubcircuit {
                name: name.clone(),
                scope: scope.to_string(),
            });
        }
    }

    let dependencies: Vec<BTreeSet<String>> = subcircuits
        .iter()
        .map(|subcircuit| {
            let local: HashSet<String> = subcircuit
                .subcircuits
                .iter()
                .map(|s| s.name.to_lowercase())
                .collect();
            subcircuit
                .required_subcircuits
                .iter()
                .filter(|name| !local.contains(*name) && !inherited.contains(*name))
                .cloned()
                .collect()
        })
        .collect();

    // Repeated stable passes in insertion order. Definitions emitted
    // earlier in a pass immediately satisfy later ones.
    let mut remaining: Vec<(SubCircuit, BTreeSet<String>)> =
        subcircuits.drain(..).zip(dependencies).collect();
    let mut emitted_names: HashSet<String> = HashSet::new();
    let mut ordered = Vec::new();
    while !remaining.is_empty() {
        let before = remaining.len();
        let mut deferred = Vec::new();
        for (subcircuit, dependencies) in remaining {
            if dependencies.iter().all(|name| emitted_names.contains(name)) {
                emitted_names.insert(subcircuit.name.to_lowercase());
                ordered.push(subcircuit);
            } else {
                deferred.push((subcircuit, dependencies));
            }
        }
        if deferred.len() == before {
            let description = deferred
                .iter()
                .map(|(subcircuit, dependencies)| {
                    format!(
                        "{}: {}",
                        subcircuit.name,
                        dependencies
                            .iter()
                            .cloned()
                            .collect::<Vec<_>>()
                            .join(", ")
                    )
                })
                .collect::<Vec<_>>()
                .join("; ");
            return Err(Error::CrossedDependencies {
                remaining: description,
            });
        }
        remaining = deferred;
    }
    *subcircuits = ordered;
    Ok(())
}
