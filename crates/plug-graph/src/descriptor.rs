//! Node descriptor trait and metadata types
//!
//! This module provides the `NodeDescriptor` trait that allows node types to
//! self-describe their metadata (plugs, category, label, etc.) for hosts
//! that list or inspect available nodes.
//!
//! The plug list is derived from `ComputeNode::plugs`, so the node
//! implementation stays the single source of truth for its interface.

use serde::{Deserialize, Serialize};

use crate::graph::{Direction, PlugDefinition};
use crate::node::ComputeNode;
use crate::value::{PlugType, PlugValue};

/// Category of a node type, for grouping in hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    /// Produces values from plugs or the context alone
    Source,
    /// Transforms upstream values
    Processing,
    /// Evaluates upstream plugs in a modified context
    Context,
}

/// Trait for node types that can describe their metadata
///
/// # Example
///
/// ```ignore
/// use plug_graph::{NodeCategory, NodeDescriptor, NodeMetadata};
///
/// impl NodeDescriptor for Constant {
///     fn descriptor() -> NodeMetadata {
///         NodeMetadata::describe(&Constant, NodeCategory::Source, "Constant", "Outputs its value")
///     }
/// }
/// ```
pub trait NodeDescriptor {
    /// Get the static metadata for this node type
    fn descriptor() -> NodeMetadata
    where
        Self: Sized;
}

/// Complete metadata for a node type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetadata {
    /// Unique type identifier (e.g., "arithmetic")
    pub node_type: String,
    /// Version of the node's hash/compute behaviour
    pub type_version: u32,
    /// Category for grouping
    pub category: NodeCategory,
    /// Human-readable label
    pub label: String,
    /// Description of what the node does
    pub description: String,
    /// Every plug, parents before children
    pub plugs: Vec<PlugMetadata>,
}

impl NodeMetadata {
    /// Describe `node`, flattening its plug definitions
    pub fn describe(
        node: &dyn ComputeNode,
        category: NodeCategory,
        label: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let mut plugs = Vec::new();
        for definition in node.plugs() {
            flatten(&definition, None, &mut plugs);
        }
        Self {
            node_type: node.type_name().to_string(),
            type_version: node.type_version(),
            category,
            label: label.into(),
            description: description.into(),
            plugs,
        }
    }

    /// Input plugs, including compound children
    pub fn inputs(&self) -> impl Iterator<Item = &PlugMetadata> {
        self.plugs.iter().filter(|p| p.direction == Direction::In)
    }

    /// Output plugs, including compound children
    pub fn outputs(&self) -> impl Iterator<Item = &PlugMetadata> {
        self.plugs.iter().filter(|p| p.direction == Direction::Out)
    }

    pub fn plug(&self, path: &str) -> Option<&PlugMetadata> {
        self.plugs.iter().find(|p| p.path == path)
    }
}

/// Metadata for a single plug
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlugMetadata {
    /// Dot-separated path relative to the node
    pub path: String,
    pub direction: Direction,
    pub plug_type: PlugType,
    /// Default value of leaf inputs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<PlugValue>,
}

fn flatten(definition: &PlugDefinition, prefix: Option<&str>, out: &mut Vec<PlugMetadata>) {
    let path = match prefix {
        Some(prefix) => format!("{}.{}", prefix, definition.name),
        None => definition.name.clone(),
    };
    let default_value = match (definition.direction, definition.plug_type.is_compound()) {
        (Direction::In, false) => Some(
            definition
                .default_value
                .clone()
                .unwrap_or_else(|| definition.plug_type.default_value()),
        ),
        _ => None,
    };
    out.push(PlugMetadata {
        path: path.clone(),
        direction: definition.direction,
        plug_type: definition.plug_type,
        default_value,
    });
    for child in &definition.children {
        flatten(child, Some(&path), out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_nodes::{Curve, Pair};

    #[test]
    fn test_describe_flattens_compounds() {
        let meta = NodeMetadata::describe(&Pair, NodeCategory::Processing, "Pair", "Doubles a pair");
        assert_eq!(meta.node_type, "Pair");
        assert_eq!(meta.type_version, 1);

        let paths: Vec<&str> = meta.plugs.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, vec!["in", "in.x", "in.y", "out", "out.x", "out.y", "label", "extra"]);

        assert_eq!(meta.inputs().count(), 5);
        assert_eq!(meta.outputs().count(), 3);
        assert_eq!(meta.plug("in.x").unwrap().default_value, Some(PlugValue::Float(0.0)));
        assert_eq!(meta.plug("out.x").unwrap().default_value, None);
        assert_eq!(meta.plug("in").unwrap().default_value, None);
    }

    #[test]
    fn test_spline_defaults() {
        let meta = NodeMetadata::describe(&Curve, NodeCategory::Processing, "Curve", "");
        assert_eq!(meta.plug("curve").unwrap().plug_type, PlugType::Spline);
        assert_eq!(meta.plug("curve.p1.y").unwrap().default_value, Some(PlugValue::Float(1.0)));
        assert!(meta.plug("curve.interpolation").is_some());
    }

    #[test]
    fn test_metadata_serialization() {
        let meta = NodeMetadata::describe(&Pair, NodeCategory::Processing, "Pair", "Doubles a pair");
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["nodeType"], "Pair");
        assert_eq!(json["category"], "processing");
        assert_eq!(json["plugs"][1]["path"], "in.x");
        assert!(json["plugs"][0].get("defaultValue").is_none());

        let back: NodeMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, meta);
    }
}
