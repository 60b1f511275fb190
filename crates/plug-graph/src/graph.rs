//! Plug/node arena
//!
//! Nodes and plugs live in slot vectors owned by `Graph` and refer to each
//! other through `NodeId`/`PlugId` handles: a plug knows its node, its
//! parent, its children, its `input` and the downstream plugs whose input it
//! is. None of these relations carry ownership. Removed entries leave a
//! tombstone, so handles are never reused.
//!
//! `Graph` only offers raw mutators to the crate; validated edits go
//! through `GraphEdit`.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{PlugGraphError, Result};
use crate::node::ComputeNode;
use crate::spline::SplineDefinition;
use crate::value::{PlugType, PlugValue};

/// Handle to a node in a `Graph`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u32);

/// Handle to a plug in a `Graph`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlugId(u32);

impl NodeId {
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl PlugId {
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

impl fmt::Display for PlugId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "plug#{}", self.0)
    }
}

/// Direction of a plug
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    In,
    Out,
}

/// Restriction on the children a compound plug accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChildPolicy {
    #[default]
    Any,
    /// Only numeric leaves (bool, int, float)
    Numeric,
}

/// Declaration of a plug, as returned by `ComputeNode::plugs`
#[derive(Debug, Clone, PartialEq)]
pub struct PlugDefinition {
    pub name: String,
    pub direction: Direction,
    pub plug_type: PlugType,
    /// Default for leaf plugs; `None` uses the type's default
    pub default_value: Option<PlugValue>,
    pub child_policy: ChildPolicy,
    pub children: Vec<PlugDefinition>,
    /// Default for spline plugs
    pub spline_default: Option<SplineDefinition>,
}

impl PlugDefinition {
    fn leaf(name: &str, direction: Direction, plug_type: PlugType) -> Self {
        Self {
            name: name.to_string(),
            direction,
            plug_type,
            default_value: None,
            child_policy: ChildPolicy::Any,
            children: Vec::new(),
            spline_default: None,
        }
    }

    pub fn input(name: &str, plug_type: PlugType) -> Self {
        Self::leaf(name, Direction::In, plug_type)
    }

    pub fn output(name: &str, plug_type: PlugType) -> Self {
        Self::leaf(name, Direction::Out, plug_type)
    }

    pub fn with_default(mut self, value: impl Into<PlugValue>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// A generic compound plug; children take the compound's direction
    pub fn compound(name: &str, direction: Direction, children: Vec<PlugDefinition>) -> Self {
        Self {
            children: children
                .into_iter()
                .map(|child| child.with_direction(direction))
                .collect(),
            ..Self::leaf(name, direction, PlugType::Compound)
        }
    }

    pub fn with_child_policy(mut self, policy: ChildPolicy) -> Self {
        self.child_policy = policy;
        self
    }

    /// A spline plug whose children mirror `default`
    pub fn spline(name: &str, direction: Direction, default: SplineDefinition) -> Self {
        Self {
            children: crate::spline_plug::child_definitions(&default, direction),
            spline_default: Some(default),
            ..Self::leaf(name, direction, PlugType::Spline)
        }
    }

    fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self.children = self
            .children
            .into_iter()
            .map(|child| child.with_direction(direction))
            .collect();
        self
    }
}

/// A plug in the arena
#[derive(Debug, Clone)]
pub struct Plug {
    name: String,
    node: NodeId,
    parent: Option<PlugId>,
    direction: Direction,
    plug_type: PlugType,
    child_policy: ChildPolicy,
    children: Vec<PlugId>,
    input: Option<PlugId>,
    outputs: Vec<PlugId>,
    default_value: Option<PlugValue>,
    value: Option<PlugValue>,
    spline_default: Option<SplineDefinition>,
    dirty_count: u64,
}

impl Plug {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn parent(&self) -> Option<PlugId> {
        self.parent
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn plug_type(&self) -> PlugType {
        self.plug_type
    }

    pub fn child_policy(&self) -> ChildPolicy {
        self.child_policy
    }

    pub fn children(&self) -> &[PlugId] {
        &self.children
    }

    /// Upstream plug driving this one, if connected
    pub fn input(&self) -> Option<PlugId> {
        self.input
    }

    /// Downstream plugs connected to this one
    pub fn outputs(&self) -> &[PlugId] {
        &self.outputs
    }

    pub fn is_leaf(&self) -> bool {
        !self.plug_type.is_compound()
    }

    pub fn default_value(&self) -> Option<&PlugValue> {
        self.default_value.as_ref()
    }

    /// The value an unconnected leaf plug holds: its explicit value if one
    /// was set, otherwise its default.
    pub fn static_value(&self) -> Option<&PlugValue> {
        self.value.as_ref().or(self.default_value.as_ref())
    }

    pub fn spline_default(&self) -> Option<&SplineDefinition> {
        self.spline_default.as_ref()
    }

    /// Bumped every time the plug is in the affected set of an edit
    pub fn dirty_count(&self) -> u64 {
        self.dirty_count
    }
}

/// A node in the arena
#[derive(Clone)]
pub struct NodeEntry {
    name: String,
    behaviour: Arc<dyn ComputeNode>,
    plugs: Vec<PlugId>,
}

impl NodeEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn behaviour(&self) -> &Arc<dyn ComputeNode> {
        &self.behaviour
    }

    /// Top-level plugs, in declaration order
    pub fn plugs(&self) -> &[PlugId] {
        &self.plugs
    }
}

impl fmt::Debug for NodeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeEntry")
            .field("name", &self.name)
            .field("type", &self.behaviour.type_name())
            .field("plugs", &self.plugs)
            .finish()
    }
}

/// The plug/node arena
#[derive(Debug, Default)]
pub struct Graph {
    nodes: Vec<Option<NodeEntry>>,
    plugs: Vec<Option<Plug>>,
    node_names: HashMap<String, NodeId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: NodeId) -> Result<&NodeEntry> {
        self.nodes
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or_else(|| PlugGraphError::UnknownNode(id.to_string()))
    }

    pub fn plug(&self, id: PlugId) -> Result<&Plug> {
        self.plugs
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or_else(|| PlugGraphError::UnknownPlug(id.to_string()))
    }

    pub fn contains_plug(&self, id: PlugId) -> bool {
        self.plug(id).is_ok()
    }

    pub fn node_by_name(&self, name: &str) -> Result<NodeId> {
        self.node_names
            .get(name)
            .copied()
            .ok_or_else(|| PlugGraphError::UnknownNode(name.to_string()))
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &NodeEntry)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_ref().map(|n| (NodeId(i as u32), n)))
    }

    pub fn plugs(&self) -> impl Iterator<Item = (PlugId, &Plug)> {
        self.plugs
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.as_ref().map(|p| (PlugId(i as u32), p)))
    }

    pub fn node_count(&self) -> usize {
        self.node_names.len()
    }

    /// Resolve a dot-separated path relative to a node (`curve.p0.x`)
    pub fn find_plug(&self, node: NodeId, path: &str) -> Result<PlugId> {
        let entry = self.node(node)?;
        let unknown = || PlugGraphError::UnknownPlug(format!("{}.{}", entry.name, path));

        let mut candidates = entry.plugs.as_slice();
        let mut found = None;
        for segment in path.split('.') {
            let id = candidates
                .iter()
                .copied()
                .find(|id| self.plug(*id).map(|p| p.name == segment).unwrap_or(false))
                .ok_or_else(unknown)?;
            candidates = self.plug(id)?.children.as_slice();
            found = Some(id);
        }
        found.ok_or_else(unknown)
    }

    /// Resolve a full path (`node.plug.child`)
    pub fn plug_by_path(&self, path: &str) -> Result<PlugId> {
        let (node, rest) = path
            .split_once('.')
            .ok_or_else(|| PlugGraphError::UnknownPlug(path.to_string()))?;
        self.find_plug(self.node_by_name(node)?, rest)
    }

    /// Path of a plug relative to its node
    pub fn relative_name(&self, id: PlugId) -> Result<String> {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(plug_id) = current {
            let plug = self.plug(plug_id)?;
            segments.push(plug.name.as_str());
            current = plug.parent;
        }
        segments.reverse();
        Ok(segments.join("."))
    }

    /// Path of a plug including its node name
    pub fn full_name(&self, id: PlugId) -> Result<String> {
        let plug = self.plug(id)?;
        let node = self.node(plug.node)?;
        Ok(format!("{}.{}", node.name, self.relative_name(id)?))
    }

    /// Full name for messages; falls back to the handle
    pub(crate) fn display_name(&self, id: PlugId) -> String {
        self.full_name(id).unwrap_or_else(|_| id.to_string())
    }

    /// All plugs below `id`, depth first, excluding `id`
    pub fn descendants(&self, id: PlugId) -> Vec<PlugId> {
        let mut result = Vec::new();
        let mut stack: Vec<PlugId> = match self.plug(id) {
            Ok(plug) => plug.children.iter().rev().copied().collect(),
            Err(_) => return result,
        };
        while let Some(next) = stack.pop() {
            if let Ok(plug) = self.plug(next) {
                stack.extend(plug.children.iter().rev().copied());
                result.push(next);
            }
        }
        result
    }

    /// Parent chain of `id`, nearest first
    pub fn ancestors(&self, id: PlugId) -> Vec<PlugId> {
        let mut result = Vec::new();
        let mut current = self.plug(id).ok().and_then(|p| p.parent);
        while let Some(parent) = current {
            result.push(parent);
            current = self.plug(parent).ok().and_then(|p| p.parent);
        }
        result
    }

    /// Check direction, type and shape for `source -> dest`, then ask the
    /// destination node. Does not check for cycles.
    pub fn check_input(&self, dest: PlugId, source: PlugId) -> Result<()> {
        let dst = self.plug(dest)?;
        let src = self.plug(source)?;
        let incompatible = |reason: &str| {
            PlugGraphError::IncompatibleInput(format!(
                "{} -> {}: {}",
                self.display_name(source),
                self.display_name(dest),
                reason
            ))
        };

        if src.direction != Direction::Out {
            return Err(incompatible("source is not an output"));
        }
        if dst.direction != Direction::In {
            return Err(incompatible("destination is not an input"));
        }
        if !self.shapes_compatible(dst, src) {
            return Err(incompatible(&format!(
                "{} does not accept {}",
                dst.plug_type.name(),
                src.plug_type.name()
            )));
        }

        let node = self.node(dst.node)?;
        if !node.behaviour.accepts_input(&self.relative_name(dest)?, src) {
            return Err(incompatible("rejected by node"));
        }
        Ok(())
    }

    pub fn accepts_input(&self, dest: PlugId, source: PlugId) -> bool {
        self.check_input(dest, source).is_ok()
    }

    fn shapes_compatible(&self, dst: &Plug, src: &Plug) -> bool {
        if !dst.plug_type.accepts(src.plug_type) {
            return false;
        }
        if !dst.plug_type.is_compound() {
            return true;
        }
        dst.children.len() == src.children.len()
            && dst.children.iter().zip(&src.children).all(|(d, s)| {
                match (self.plug(*d), self.plug(*s)) {
                    (Ok(d), Ok(s)) => self.shapes_compatible(d, s),
                    _ => false,
                }
            })
    }

    /// Check that `child` may be parented under `parent`
    pub fn check_child(&self, parent: PlugId, child: &PlugDefinition) -> Result<()> {
        let plug = self.plug(parent)?;
        let invalid = |message: String| PlugGraphError::InvalidChild {
            parent: self.display_name(parent),
            message,
        };

        if !plug.plug_type.is_compound() {
            return Err(invalid(format!("{} plugs have no children", plug.plug_type.name())));
        }
        if child.direction != plug.direction {
            return Err(invalid(format!("'{}' has the wrong direction", child.name)));
        }
        if child.name.is_empty() || child.name.contains('.') {
            return Err(invalid(format!("'{}' is not a valid plug name", child.name)));
        }
        let taken = plug
            .children
            .iter()
            .any(|c| self.plug(*c).map(|c| c.name == child.name).unwrap_or(false));
        if taken {
            return Err(PlugGraphError::DuplicateName(format!(
                "{}.{}",
                self.display_name(parent),
                child.name
            )));
        }

        if plug.plug_type == PlugType::Spline {
            let valid = if child.name == crate::spline_plug::INTERPOLATION {
                child.plug_type == PlugType::Int
            } else {
                crate::spline_plug::is_point_definition(child)
            };
            if !valid {
                return Err(invalid(format!("'{}' is not a spline point", child.name)));
            }
        }
        if plug.child_policy == ChildPolicy::Numeric && !all_numeric(child) {
            return Err(invalid(format!("'{}' is not numeric", child.name)));
        }
        Ok(())
    }

    pub fn accepts_child(&self, parent: PlugId, child: &PlugDefinition) -> bool {
        self.check_child(parent, child).is_ok()
    }

    // Raw mutators, used by `GraphEdit`

    pub(crate) fn insert_node(&mut self, name: &str, behaviour: Arc<dyn ComputeNode>) -> Result<NodeId> {
        if name.is_empty() || name.contains('.') {
            return Err(PlugGraphError::InvalidValue {
                plug: name.to_string(),
                message: "node names must be non-empty and contain no '.'".to_string(),
            });
        }
        if self.node_names.contains_key(name) {
            return Err(PlugGraphError::DuplicateName(name.to_string()));
        }

        let definitions = behaviour.plugs();
        check_definition_names(name, &definitions)?;

        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(NodeEntry {
            name: name.to_string(),
            behaviour,
            plugs: Vec::new(),
        }));
        self.node_names.insert(name.to_string(), id);

        let mut top_level = Vec::with_capacity(definitions.len());
        for definition in &definitions {
            top_level.push(self.insert_plug(id, None, definition));
        }
        if let Some(Some(entry)) = self.nodes.get_mut(id.index()) {
            entry.plugs = top_level;
        }
        Ok(id)
    }

    pub(crate) fn insert_plug(&mut self, node: NodeId, parent: Option<PlugId>, definition: &PlugDefinition) -> PlugId {
        let id = PlugId(self.plugs.len() as u32);
        let default_value = if definition.plug_type.is_compound() {
            None
        } else {
            Some(
                definition
                    .default_value
                    .clone()
                    .unwrap_or_else(|| definition.plug_type.default_value()),
            )
        };
        self.plugs.push(Some(Plug {
            name: definition.name.clone(),
            node,
            parent,
            direction: definition.direction,
            plug_type: definition.plug_type,
            child_policy: definition.child_policy,
            children: Vec::new(),
            input: None,
            outputs: Vec::new(),
            default_value,
            value: None,
            spline_default: definition.spline_default.clone(),
            dirty_count: 0,
        }));

        let children: Vec<PlugId> = definition
            .children
            .iter()
            .map(|child| self.insert_plug(node, Some(id), child))
            .collect();
        if let Some(plug) = self.plug_mut(id) {
            plug.children = children;
        }
        if let Some(parent) = parent.and_then(|p| self.plug_mut(p)) {
            if !parent.children.contains(&id) {
                parent.children.push(id);
            }
        }
        id
    }

    fn plug_mut(&mut self, id: PlugId) -> Option<&mut Plug> {
        self.plugs.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Point `dest` at `source` (or disconnect), keeping `outputs` in sync
    pub(crate) fn set_input_raw(&mut self, dest: PlugId, source: Option<PlugId>) {
        let previous = self.plug_mut(dest).and_then(|p| std::mem::replace(&mut p.input, source));
        if let Some(old) = previous.and_then(|old| self.plug_mut(old)) {
            old.outputs.retain(|o| *o != dest);
        }
        if let Some(new) = source.and_then(|s| self.plug_mut(s)) {
            new.outputs.push(dest);
        }
    }

    pub(crate) fn set_static_value(&mut self, id: PlugId, value: Option<PlugValue>) {
        if let Some(plug) = self.plug_mut(id) {
            plug.value = value;
        }
    }

    pub(crate) fn set_spline_default(&mut self, id: PlugId, default: SplineDefinition) {
        if let Some(plug) = self.plug_mut(id) {
            plug.spline_default = Some(default);
        }
    }

    /// Disconnect every connection into or out of `id` and its descendants.
    ///
    /// Returns the downstream plugs that lost their input.
    pub(crate) fn detach(&mut self, id: PlugId) -> Vec<PlugId> {
        let mut subtree = vec![id];
        subtree.extend(self.descendants(id));

        let mut orphaned = Vec::new();
        for plug_id in &subtree {
            self.set_input_raw(*plug_id, None);
            let outputs = self.plug(*plug_id).map(|p| p.outputs.clone()).unwrap_or_default();
            for output in outputs {
                self.set_input_raw(output, None);
                if !subtree.contains(&output) {
                    orphaned.push(output);
                }
            }
        }
        orphaned
    }

    /// Remove a child plug and its subtree; connections must already be detached
    pub(crate) fn remove_plug(&mut self, id: PlugId) {
        let parent = self.plug(id).ok().and_then(|p| p.parent);
        for descendant in self.descendants(id) {
            if let Some(slot) = self.plugs.get_mut(descendant.index()) {
                *slot = None;
            }
        }
        if let Some(slot) = self.plugs.get_mut(id.index()) {
            *slot = None;
        }
        if let Some(parent) = parent.and_then(|p| self.plug_mut(p)) {
            parent.children.retain(|c| *c != id);
        }
    }

    /// Remove a node and all of its plugs.
    ///
    /// Returns the downstream plugs (on other nodes) that lost their input.
    pub(crate) fn remove_node(&mut self, id: NodeId) -> Result<Vec<PlugId>> {
        let entry = self.node(id)?.clone();
        let mut orphaned = Vec::new();
        for plug in &entry.plugs {
            orphaned.extend(self.detach(*plug));
        }
        for plug in &entry.plugs {
            self.remove_plug(*plug);
        }
        orphaned.retain(|p| self.contains_plug(*p));
        self.node_names.remove(&entry.name);
        if let Some(slot) = self.nodes.get_mut(id.index()) {
            *slot = None;
        }
        Ok(orphaned)
    }

    pub(crate) fn bump_dirty(&mut self, plugs: &[PlugId]) {
        for id in plugs {
            if let Some(plug) = self.plug_mut(*id) {
                plug.dirty_count += 1;
            }
        }
    }
}

/// Plug names in `definitions` must be valid and unique among siblings
fn check_definition_names(path: &str, definitions: &[PlugDefinition]) -> Result<()> {
    let mut seen = HashSet::new();
    for definition in definitions {
        let full = format!("{}.{}", path, definition.name);
        if definition.name.is_empty() || definition.name.contains('.') {
            return Err(PlugGraphError::InvalidValue {
                plug: full,
                message: "plug names must be non-empty and contain no '.'".to_string(),
            });
        }
        if !seen.insert(definition.name.as_str()) {
            return Err(PlugGraphError::DuplicateName(full));
        }
        check_definition_names(&full, &definition.children)?;
    }
    Ok(())
}

fn all_numeric(definition: &PlugDefinition) -> bool {
    if definition.plug_type.is_compound() {
        definition.children.iter().all(all_numeric)
    } else {
        definition.plug_type.is_numeric()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_nodes::Passthrough;

    fn graph_with(names: &[&str]) -> (Graph, Vec<NodeId>) {
        let mut graph = Graph::new();
        let ids = names
            .iter()
            .map(|name| graph.insert_node(name, Arc::new(Passthrough)).unwrap())
            .collect();
        (graph, ids)
    }

    #[test]
    fn test_plug_paths() {
        let (graph, ids) = graph_with(&["a"]);
        let out = graph.find_plug(ids[0], "out").unwrap();
        assert_eq!(graph.full_name(out).unwrap(), "a.out");
        assert_eq!(graph.plug_by_path("a.out").unwrap(), out);
        assert!(matches!(
            graph.find_plug(ids[0], "missing"),
            Err(PlugGraphError::UnknownPlug(_))
        ));
    }

    #[test]
    fn test_duplicate_node_name() {
        let (mut graph, _) = graph_with(&["a"]);
        assert!(matches!(
            graph.insert_node("a", Arc::new(Passthrough)),
            Err(PlugGraphError::DuplicateName(_))
        ));
    }

    /// Declares whatever plugs it is given
    struct Declared(Vec<PlugDefinition>);

    impl ComputeNode for Declared {
        fn type_name(&self) -> &str {
            "Declared"
        }

        fn plugs(&self) -> Vec<PlugDefinition> {
            self.0.clone()
        }

        fn affects(&self, _input: &str) -> Vec<String> {
            Vec::new()
        }

        fn hash(
            &self,
            _output: &str,
            _ctx: &crate::node::ComputeContext<'_>,
            _h: &mut crate::hash::FingerprintHasher,
        ) -> Result<()> {
            Ok(())
        }

        fn compute(&self, _output: &str, _ctx: &crate::node::ComputeContext<'_>) -> Result<PlugValue> {
            Ok(PlugValue::Float(0.0))
        }
    }

    #[test]
    fn test_duplicate_plug_definitions() {
        let mut graph = Graph::new();
        let twice = Declared(vec![
            PlugDefinition::input("in", PlugType::Float),
            PlugDefinition::input("in", PlugType::Int),
        ]);
        assert_eq!(
            graph.insert_node("a", Arc::new(twice)).unwrap_err(),
            PlugGraphError::DuplicateName("a.in".to_string())
        );

        let nested = Declared(vec![PlugDefinition::compound(
            "p",
            Direction::In,
            vec![
                PlugDefinition::input("x", PlugType::Float),
                PlugDefinition::input("x", PlugType::Float),
            ],
        )]);
        assert_eq!(
            graph.insert_node("a", Arc::new(nested)).unwrap_err(),
            PlugGraphError::DuplicateName("a.p.x".to_string())
        );

        let dotted = Declared(vec![PlugDefinition::input("a.b", PlugType::Float)]);
        assert!(matches!(
            graph.insert_node("a", Arc::new(dotted)),
            Err(PlugGraphError::InvalidValue { .. })
        ));

        // Nothing was inserted by the failed attempts
        assert!(graph.node_by_name("a").is_err());
        assert_eq!(graph.plugs().count(), 0);
        let ok = Declared(vec![PlugDefinition::input("in", PlugType::Float)]);
        assert!(graph.insert_node("a", Arc::new(ok)).is_ok());
    }

    #[test]
    fn test_check_input_direction_and_type() {
        let (graph, ids) = graph_with(&["a", "b"]);
        let a_out = graph.find_plug(ids[0], "out").unwrap();
        let b_in = graph.find_plug(ids[1], "in").unwrap();
        let b_out = graph.find_plug(ids[1], "out").unwrap();
        let b_label = graph.find_plug(ids[1], "label").unwrap();

        assert!(graph.accepts_input(b_in, a_out));
        assert!(matches!(
            graph.check_input(b_out, a_out),
            Err(PlugGraphError::IncompatibleInput(_))
        ));
        assert!(matches!(
            graph.check_input(b_in, b_in),
            Err(PlugGraphError::IncompatibleInput(_))
        ));
        assert!(!graph.accepts_input(b_label, a_out));
    }

    #[test]
    fn test_set_input_raw_tracks_outputs() {
        let (mut graph, ids) = graph_with(&["a", "b", "c"]);
        let a_out = graph.find_plug(ids[0], "out").unwrap();
        let c_out = graph.find_plug(ids[2], "out").unwrap();
        let b_in = graph.find_plug(ids[1], "in").unwrap();

        graph.set_input_raw(b_in, Some(a_out));
        assert_eq!(graph.plug(a_out).unwrap().outputs(), &[b_in]);

        graph.set_input_raw(b_in, Some(c_out));
        assert!(graph.plug(a_out).unwrap().outputs().is_empty());
        assert_eq!(graph.plug(c_out).unwrap().outputs(), &[b_in]);
        assert_eq!(graph.plug(b_in).unwrap().input(), Some(c_out));
    }

    #[test]
    fn test_remove_node_reports_orphans() {
        let (mut graph, ids) = graph_with(&["a", "b"]);
        let a_out = graph.find_plug(ids[0], "out").unwrap();
        let b_in = graph.find_plug(ids[1], "in").unwrap();
        graph.set_input_raw(b_in, Some(a_out));

        let orphaned = graph.remove_node(ids[0]).unwrap();
        assert_eq!(orphaned, vec![b_in]);
        assert_eq!(graph.plug(b_in).unwrap().input(), None);
        assert!(graph.plug(a_out).is_err());
        assert!(graph.node_by_name("a").is_err());
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_numeric_child_policy() {
        let mut graph = Graph::new();
        let node = graph.insert_node("n", Arc::new(Passthrough)).unwrap();
        let root = graph.find_plug(node, "in").unwrap();
        // Leaf plugs take no children
        assert!(!graph.accepts_child(root, &PlugDefinition::input("x", PlugType::Float)));

        let id = graph.insert_plug(
            node,
            None,
            &PlugDefinition::compound("values", Direction::In, vec![]).with_child_policy(ChildPolicy::Numeric),
        );
        assert!(graph.accepts_child(id, &PlugDefinition::input("x", PlugType::Float)));
        assert!(!graph.accepts_child(id, &PlugDefinition::input("s", PlugType::String)));
        assert!(!graph.accepts_child(id, &PlugDefinition::output("o", PlugType::Float)));
    }
}
