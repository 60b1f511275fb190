//! Structural graph validation
//!
//! Checks a graph for problems that edits normally prevent or that only
//! a node implementation can introduce: connections that point nowhere or
//! no longer type-check, `affects()` declarations naming plugs that are
//! not outputs of the node, and dependency cycles.

use std::collections::{HashMap, VecDeque};

use crate::graph::{Direction, Graph, PlugId};

/// Validation error with location context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Plugs whose values depend on themselves
    CycleDetected { plugs: Vec<String> },
    /// A connection that `check_input` would reject
    IncompatibleConnection { plug: String, input: String, reason: String },
    /// A connection to a missing plug, or not mirrored by the source
    DanglingConnection { plug: String },
    /// `affects()` names a plug the node does not have
    UnknownAffectedPlug { node: String, input: String, affected: String },
    /// `affects()` names a plug that is not an output
    AffectsNonOutput { node: String, input: String, affected: String },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CycleDetected { plugs } => {
                write!(f, "Cycle detected between plugs: {}", plugs.join(", "))
            }
            Self::IncompatibleConnection { plug, input, reason } => {
                write!(f, "Connection {} -> {} is invalid: {}", input, plug, reason)
            }
            Self::DanglingConnection { plug } => {
                write!(f, "Input of '{}' is dangling", plug)
            }
            Self::UnknownAffectedPlug { node, input, affected } => {
                write!(
                    f,
                    "Node '{}' declares '{}' affects unknown plug '{}'",
                    node, input, affected
                )
            }
            Self::AffectsNonOutput { node, input, affected } => {
                write!(
                    f,
                    "Node '{}' declares '{}' affects '{}', which is not an output",
                    node, input, affected
                )
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate `graph`
///
/// Returns all validation errors found (not just the first).
pub fn validate_graph(graph: &Graph) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    validate_connections(graph, &mut errors);
    let edges = validate_affects(graph, &mut errors);
    detect_cycles(graph, &edges, &mut errors);

    errors
}

fn validate_connections(graph: &Graph, errors: &mut Vec<ValidationError>) {
    for (id, plug) in graph.plugs() {
        let Some(input) = plug.input() else {
            continue;
        };
        let mirrored = graph
            .plug(input)
            .map(|source| source.outputs().contains(&id))
            .unwrap_or(false);
        if !mirrored {
            errors.push(ValidationError::DanglingConnection {
                plug: graph.display_name(id),
            });
            continue;
        }
        if let Err(e) = graph.check_input(id, input) {
            errors.push(ValidationError::IncompatibleConnection {
                plug: graph.display_name(id),
                input: graph.display_name(input),
                reason: e.to_string(),
            });
        }
    }
}

/// Check every input's `affects()` and return the resolved input -> output
/// edges, expanded to the outputs' descendants.
fn validate_affects(graph: &Graph, errors: &mut Vec<ValidationError>) -> Vec<(PlugId, PlugId)> {
    let mut edges = Vec::new();
    for (id, plug) in graph.plugs() {
        if plug.direction() != Direction::In {
            continue;
        }
        let (Ok(node), Ok(relative)) = (graph.node(plug.node()), graph.relative_name(id)) else {
            continue;
        };
        for name in node.behaviour().affects(&relative) {
            let affected = match graph.find_plug(plug.node(), &name) {
                Ok(affected) => affected,
                Err(_) => {
                    errors.push(ValidationError::UnknownAffectedPlug {
                        node: node.name().to_string(),
                        input: relative.clone(),
                        affected: name,
                    });
                    continue;
                }
            };
            let is_output = graph
                .plug(affected)
                .map(|p| p.direction() == Direction::Out)
                .unwrap_or(false);
            if !is_output {
                errors.push(ValidationError::AffectsNonOutput {
                    node: node.name().to_string(),
                    input: relative.clone(),
                    affected: name,
                });
                continue;
            }
            edges.push((id, affected));
            edges.extend(graph.descendants(affected).into_iter().map(|d| (id, d)));
        }
    }
    edges
}

/// Kahn's algorithm over value dependencies: child -> parent,
/// source -> destination and input -> affected output.
fn detect_cycles(graph: &Graph, affects_edges: &[(PlugId, PlugId)], errors: &mut Vec<ValidationError>) {
    let mut dependents: HashMap<PlugId, Vec<PlugId>> = HashMap::new();
    let mut in_degree: HashMap<PlugId, usize> = HashMap::new();
    let mut add_edge = |from: PlugId, to: PlugId| {
        dependents.entry(from).or_default().push(to);
        *in_degree.entry(to).or_insert(0) += 1;
    };

    for (id, plug) in graph.plugs() {
        if let Some(parent) = plug.parent() {
            add_edge(id, parent);
        }
        if let Some(input) = plug.input().filter(|i| graph.contains_plug(*i)) {
            add_edge(input, id);
        }
    }
    for (from, to) in affects_edges {
        add_edge(*from, *to);
    }

    let mut queue: VecDeque<PlugId> = graph
        .plugs()
        .map(|(id, _)| id)
        .filter(|id| in_degree.get(id).copied().unwrap_or(0) == 0)
        .collect();

    let mut visited = 0;
    while let Some(id) = queue.pop_front() {
        visited += 1;
        for dependent in dependents.get(&id).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(*dependent);
                }
            }
        }
    }

    if visited < graph.plugs().count() {
        let mut plugs: Vec<String> = in_degree
            .iter()
            .filter(|(_, degree)| **degree > 0)
            .map(|(id, _)| graph.display_name(*id))
            .collect();
        plugs.sort();
        errors.push(ValidationError::CycleDetected { plugs });
    }
}
