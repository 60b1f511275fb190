//! Validated structural and value edits
//!
//! A `GraphEdit` wraps exclusive access to the graph for the duration of
//! `Engine::edit`. Every operation validates before it mutates, so a
//! rejected operation leaves the graph exactly as it was. Successful
//! operations record the plugs they changed and the events to emit; the
//! engine propagates dirtiness once for the whole transaction.

use std::sync::Arc;

use log::debug;

use crate::affects::affected_plugs;
use crate::error::{PlugGraphError, Result};
use crate::events::GraphEvent;
use crate::graph::{Direction, Graph, NodeId, PlugDefinition, PlugId};
use crate::node::ComputeNode;
use crate::spline::SplineDefinition;
use crate::value::PlugValue;

/// Exclusive, validated access to a graph
pub struct GraphEdit<'g> {
    graph: &'g mut Graph,
    changed: Vec<PlugId>,
    events: Vec<GraphEvent>,
}

impl<'g> GraphEdit<'g> {
    pub(crate) fn new(graph: &'g mut Graph) -> Self {
        Self {
            graph,
            changed: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Read access to the graph being edited
    pub fn graph(&self) -> &Graph {
        self.graph
    }

    pub(crate) fn into_parts(self) -> (Vec<PlugId>, Vec<GraphEvent>) {
        (self.changed, self.events)
    }

    pub fn add_node(&mut self, name: &str, node: Arc<dyn ComputeNode>) -> Result<NodeId> {
        let node_type = node.type_name().to_string();
        let id = self.graph.insert_node(name, node)?;
        debug!("Added node {} ({})", name, node_type);
        self.events.push(GraphEvent::NodeAdded {
            node: name.to_string(),
            node_type,
        });
        Ok(id)
    }

    /// Remove a node, disconnecting everything downstream of it
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        let name = self.graph.node(id)?.name().to_string();
        let orphaned = self.graph.remove_node(id)?;
        debug!("Removed node {} ({} downstream plugs disconnected)", name, orphaned.len());
        for plug in &orphaned {
            self.events.push(GraphEvent::InputChanged {
                plug: self.graph.display_name(*plug),
                input: None,
            });
        }
        self.changed.extend(orphaned);
        self.events.push(GraphEvent::NodeRemoved { node: name });
        Ok(())
    }

    /// Connect `dest` to `source`, or disconnect it with `None`.
    ///
    /// Compound plugs are connected child by child. Fails with
    /// `IncompatibleInput` on a direction or type mismatch and with
    /// `CyclicConnection` if `dest` already (transitively) affects `source`.
    pub fn set_input(&mut self, dest: PlugId, source: Option<PlugId>) -> Result<()> {
        let Some(source) = source else {
            return self.disconnect(dest);
        };
        self.graph.check_input(dest, source)?;
        if self.would_cycle(dest, source) {
            return Err(PlugGraphError::CyclicConnection(format!(
                "{} -> {}",
                self.graph.display_name(source),
                self.graph.display_name(dest)
            )));
        }

        self.clear_parent_inputs(dest);
        self.connect_recursive(dest, source)?;
        debug!(
            "Connected {} -> {}",
            self.graph.display_name(source),
            self.graph.display_name(dest)
        );
        self.events.push(GraphEvent::InputChanged {
            plug: self.graph.display_name(dest),
            input: Some(self.graph.display_name(source)),
        });
        Ok(())
    }

    pub fn connect(&mut self, source: PlugId, dest: PlugId) -> Result<()> {
        self.set_input(dest, Some(source))
    }

    /// Remove the input of `dest` (and of its children). A no-op if
    /// nothing is connected.
    pub fn disconnect(&mut self, dest: PlugId) -> Result<()> {
        let mut subtree = vec![dest];
        subtree.extend(self.graph.descendants(dest));
        let connected: Vec<PlugId> = subtree
            .into_iter()
            .filter(|id| self.graph.plug(*id).map(|p| p.input().is_some()).unwrap_or(false))
            .collect();
        self.graph.plug(dest)?;
        if connected.is_empty() {
            return Ok(());
        }

        self.clear_parent_inputs(dest);
        for id in &connected {
            self.graph.set_input_raw(*id, None);
        }
        self.changed.extend(connected);
        debug!("Disconnected {}", self.graph.display_name(dest));
        self.events.push(GraphEvent::InputChanged {
            plug: self.graph.display_name(dest),
            input: None,
        });
        Ok(())
    }

    /// Set the static value of an unconnected input leaf.
    ///
    /// Numeric values are converted to the plug's type.
    pub fn set_value(&mut self, id: PlugId, value: PlugValue) -> Result<()> {
        let plug = self.graph.plug(id)?;
        let invalid = |message: String| PlugGraphError::InvalidValue {
            plug: self.graph.display_name(id),
            message,
        };
        if plug.direction() != Direction::In {
            return Err(invalid("output plugs are computed".to_string()));
        }
        if !plug.is_leaf() {
            return Err(invalid("compound plugs are set through their children".to_string()));
        }
        if plug.input().is_some() {
            return Err(invalid("plug is connected".to_string()));
        }
        let converted = value.convert_to(plug.plug_type()).ok_or_else(|| {
            invalid(format!(
                "{} does not accept {}",
                plug.plug_type().name(),
                value.plug_type().name()
            ))
        })?;
        if plug.static_value() == Some(&converted) {
            return Ok(());
        }

        self.graph.set_static_value(id, Some(converted));
        self.changed.push(id);
        self.events.push(GraphEvent::PlugSet {
            plug: self.graph.display_name(id),
        });
        Ok(())
    }

    /// Restore the default of an input leaf, or of every leaf below a compound
    pub fn set_to_default(&mut self, id: PlugId) -> Result<()> {
        let mut targets = vec![id];
        targets.extend(self.graph.descendants(id));
        for target in targets {
            let plug = self.graph.plug(target)?;
            if plug.is_leaf() && plug.direction() == Direction::In && plug.input().is_none() {
                if let Some(default) = plug.default_value().cloned() {
                    self.set_value(target, default)?;
                }
            }
        }
        Ok(())
    }

    /// Add a child under a compound plug, checked by `Graph::check_child`
    pub fn add_child(&mut self, parent: PlugId, child: PlugDefinition) -> Result<PlugId> {
        self.graph.check_child(parent, &child)?;
        let node = self.graph.plug(parent)?.node();
        let id = self.graph.insert_plug(node, Some(parent), &child);
        self.changed.push(id);
        self.events.push(GraphEvent::ChildAdded {
            parent: self.graph.display_name(parent),
            child: child.name,
        });
        Ok(id)
    }

    /// Remove a child plug and its subtree, disconnecting it first
    pub fn remove_child(&mut self, child: PlugId) -> Result<()> {
        let parent = self.graph.plug(child)?.parent().ok_or_else(|| PlugGraphError::InvalidChild {
            parent: self.graph.display_name(child),
            message: "top-level plugs cannot be removed".to_string(),
        })?;
        let name = self.graph.plug(child)?.name().to_string();

        let orphaned = self.graph.detach(child);
        self.graph.remove_plug(child);
        self.changed.push(parent);
        self.changed.extend(orphaned);
        self.events.push(GraphEvent::ChildRemoved {
            parent: self.graph.display_name(parent),
            child: name,
        });
        Ok(())
    }

    pub(crate) fn set_spline_default(&mut self, id: PlugId, default: SplineDefinition) {
        self.graph.set_spline_default(id, default);
    }

    /// True if connecting `source -> dest` would close a loop
    fn would_cycle(&self, dest: PlugId, source: PlugId) -> bool {
        let mut roots = vec![dest];
        roots.extend(self.graph.descendants(dest));
        let downstream = affected_plugs(self.graph, &roots);
        let mut sources = vec![source];
        sources.extend(self.graph.descendants(source));
        sources.iter().any(|s| downstream.contains(s))
    }

    /// A child with its own input supersedes any compound-level connection
    fn clear_parent_inputs(&mut self, id: PlugId) {
        for ancestor in self.graph.ancestors(id) {
            if self.graph.plug(ancestor).map(|p| p.input().is_some()).unwrap_or(false) {
                self.graph.set_input_raw(ancestor, None);
            }
        }
    }

    fn connect_recursive(&mut self, dest: PlugId, source: PlugId) -> Result<()> {
        self.graph.set_input_raw(dest, Some(source));
        self.changed.push(dest);
        let dest_children = self.graph.plug(dest)?.children().to_vec();
        let source_children = self.graph.plug(source)?.children().to_vec();
        for (d, s) in dest_children.into_iter().zip(source_children) {
            self.connect_recursive(d, s)?;
        }
        Ok(())
    }
}
