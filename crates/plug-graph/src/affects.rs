//! Dependency propagation
//!
//! Turns a set of directly changed plugs into the transitive set of plugs
//! whose hashes may have changed, by following three kinds of edges:
//!
//! - child -> parent (a compound's value is made of its children)
//! - output -> downstream input (connections)
//! - input -> outputs on the same node (`ComputeNode::affects`)
//!
//! The result drives change notifications and the per-plug dirty counts
//! that validate the hash cache. The value cache itself needs no
//! invalidation: a changed plug has a changed fingerprint.

use std::collections::{HashSet, VecDeque};

use log::warn;

use crate::graph::{Direction, Graph, PlugId};

/// Transitive affected set of `changed`, including `changed` itself.
///
/// Plugs in discovery order; plugs that no longer exist are skipped.
pub fn affected_plugs(graph: &Graph, changed: &[PlugId]) -> Vec<PlugId> {
    let mut visited = HashSet::new();
    let mut result = Vec::new();
    let mut queue = VecDeque::new();

    let mut enqueue = |id: PlugId, queue: &mut VecDeque<PlugId>| {
        if visited.insert(id) {
            queue.push_back(id);
        }
    };

    for id in changed {
        if !graph.contains_plug(*id) {
            continue;
        }
        enqueue(*id, &mut queue);
        for descendant in graph.descendants(*id) {
            enqueue(descendant, &mut queue);
        }
    }

    while let Some(id) = queue.pop_front() {
        let Ok(plug) = graph.plug(id) else {
            continue;
        };
        result.push(id);

        if let Some(parent) = plug.parent() {
            enqueue(parent, &mut queue);
        }
        for output in plug.outputs() {
            enqueue(*output, &mut queue);
        }

        if plug.direction() != Direction::In {
            continue;
        }
        let Ok(node) = graph.node(plug.node()) else {
            continue;
        };
        let Ok(relative) = graph.relative_name(id) else {
            continue;
        };
        for name in node.behaviour().affects(&relative) {
            match graph.find_plug(plug.node(), &name) {
                Ok(affected) => {
                    enqueue(affected, &mut queue);
                    for descendant in graph.descendants(affected) {
                        enqueue(descendant, &mut queue);
                    }
                }
                Err(_) => warn!(
                    "{} ({}) affects unknown plug '{}' for input '{}'",
                    node.name(),
                    node.behaviour().type_name(),
                    name,
                    relative
                ),
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::graph::PlugDefinition;
    use crate::hash::FingerprintHasher;
    use crate::node::{ComputeContext, ComputeNode};
    use crate::test_nodes::Passthrough;
    use crate::value::{PlugType, PlugValue};
    use std::sync::Arc;

    /// Claims an output that does not exist
    struct Misdeclared;

    impl ComputeNode for Misdeclared {
        fn type_name(&self) -> &str {
            "Misdeclared"
        }

        fn plugs(&self) -> Vec<PlugDefinition> {
            vec![
                PlugDefinition::input("in", PlugType::Float),
                PlugDefinition::output("out", PlugType::Float),
            ]
        }

        fn affects(&self, _input: &str) -> Vec<String> {
            vec!["out".to_string(), "nope".to_string()]
        }

        fn hash(&self, _output: &str, _ctx: &ComputeContext<'_>, _h: &mut FingerprintHasher) -> Result<()> {
            Ok(())
        }

        fn compute(&self, _output: &str, _ctx: &ComputeContext<'_>) -> Result<PlugValue> {
            Ok(PlugValue::Float(0.0))
        }
    }

    #[test]
    fn test_affected_set_follows_connections() {
        let mut graph = Graph::new();
        let a = graph.insert_node("a", Arc::new(Passthrough)).unwrap();
        let b = graph.insert_node("b", Arc::new(Passthrough)).unwrap();
        let c = graph.insert_node("c", Arc::new(Passthrough)).unwrap();
        let a_in = graph.find_plug(a, "in").unwrap();
        let a_out = graph.find_plug(a, "out").unwrap();
        let b_in = graph.find_plug(b, "in").unwrap();
        let b_out = graph.find_plug(b, "out").unwrap();
        let b_count = graph.find_plug(b, "count").unwrap();
        let a_count = graph.find_plug(a, "count").unwrap();
        let c_out = graph.find_plug(c, "out").unwrap();
        graph.set_input_raw(b_in, Some(a_out));

        let affected = affected_plugs(&graph, &[a_in]);
        assert_eq!(affected, vec![a_in, a_out, a_count, b_in, b_out, b_count]);
        assert!(!affected.contains(&c_out));

        // Labels affect nothing
        let a_label = graph.find_plug(a, "label").unwrap();
        assert_eq!(affected_plugs(&graph, &[a_label]), vec![a_label]);
    }

    #[test]
    fn test_unknown_affected_plug_is_skipped() {
        let mut graph = Graph::new();
        let n = graph.insert_node("n", Arc::new(Misdeclared)).unwrap();
        let n_in = graph.find_plug(n, "in").unwrap();
        let n_out = graph.find_plug(n, "out").unwrap();
        assert_eq!(affected_plugs(&graph, &[n_in]), vec![n_in, n_out]);
    }
}
