//! Node type registry for dynamic node creation
//!
//! Maps node type strings to metadata and factories so hosts can list the
//! available nodes and instantiate them by name.
//!
//! # Usage
//!
//! ```ignore
//! use plug_graph::{Engine, NodeRegistry};
//!
//! let registry = NodeRegistry::with_builtins();
//! let engine = Engine::default();
//! let node = engine.add_node("add1", registry.create("Arithmetic")?)?;
//! ```
//!
//! Node crates register their types at link time:
//!
//! ```ignore
//! inventory::submit!(plug_graph::NodeRegistration {
//!     node_type: "Arithmetic",
//!     descriptor: Arithmetic::descriptor,
//!     factory: || Arc::new(Arithmetic),
//! });
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::descriptor::{NodeCategory, NodeMetadata};
use crate::error::{PlugGraphError, Result};
use crate::node::ComputeNode;

/// Link-time registration of a node type.
///
/// Plain function pointers so registrations can be built in a const context.
pub struct NodeRegistration {
    /// The node type, matching `ComputeNode::type_name`
    pub node_type: &'static str,
    /// Produces the node type's metadata
    pub descriptor: fn() -> NodeMetadata,
    /// Creates a node instance
    pub factory: fn() -> Arc<dyn ComputeNode>,
}

inventory::collect!(NodeRegistration);

/// Creates node instances for one node type
pub trait NodeFactory: Send + Sync {
    fn create(&self) -> Arc<dyn ComputeNode>;
}

impl<F> NodeFactory for F
where
    F: Fn() -> Arc<dyn ComputeNode> + Send + Sync,
{
    fn create(&self) -> Arc<dyn ComputeNode> {
        self()
    }
}

/// A registration entry combining metadata with an optional factory
struct RegistryEntry {
    metadata: NodeMetadata,
    factory: Option<Arc<dyn NodeFactory>>,
}

/// Registry of node types with their metadata and factories
pub struct NodeRegistry {
    entries: HashMap<String, RegistryEntry>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Create a registry holding every `NodeRegistration` linked into the binary
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for registration in inventory::iter::<NodeRegistration> {
            let metadata = (registration.descriptor)();
            if metadata.node_type != registration.node_type {
                debug!(
                    "Registration '{}' describes itself as '{}'",
                    registration.node_type, metadata.node_type
                );
            }
            registry.register(metadata, registration.factory);
        }
        debug!("Registered {} built-in node types", registry.entries.len());
        registry
    }

    /// Register a node type with metadata and a factory
    pub fn register(&mut self, metadata: NodeMetadata, factory: impl NodeFactory + 'static) {
        self.entries.insert(
            metadata.node_type.clone(),
            RegistryEntry {
                metadata,
                factory: Some(Arc::new(factory)),
            },
        );
    }

    /// Register a node type with metadata only (no factory)
    pub fn register_metadata(&mut self, metadata: NodeMetadata) {
        self.entries.insert(
            metadata.node_type.clone(),
            RegistryEntry {
                metadata,
                factory: None,
            },
        );
    }

    /// Get metadata for a node type
    pub fn get_metadata(&self, node_type: &str) -> Option<&NodeMetadata> {
        self.entries.get(node_type).map(|e| &e.metadata)
    }

    /// Get all registered metadata
    pub fn all_metadata(&self) -> Vec<&NodeMetadata> {
        self.entries.values().map(|e| &e.metadata).collect()
    }

    /// Get metadata grouped by category
    pub fn metadata_by_category(&self) -> HashMap<NodeCategory, Vec<&NodeMetadata>> {
        let mut grouped: HashMap<NodeCategory, Vec<&NodeMetadata>> = HashMap::new();
        for entry in self.entries.values() {
            grouped.entry(entry.metadata.category).or_default().push(&entry.metadata);
        }
        grouped
    }

    /// Instantiate a node of `node_type`
    pub fn create(&self, node_type: &str) -> Result<Arc<dyn ComputeNode>> {
        self.entries
            .get(node_type)
            .and_then(|e| e.factory.as_ref())
            .map(|f| f.create())
            .ok_or_else(|| PlugGraphError::UnknownNodeType(node_type.to_string()))
    }

    /// Check if a node type is registered
    pub fn has_node_type(&self, node_type: &str) -> bool {
        self.entries.contains_key(node_type)
    }

    /// List all registered node type strings
    pub fn node_types(&self) -> Vec<&str> {
        self.entries.keys().map(|s| s.as_str()).collect()
    }

    /// Merge another registry into this one
    ///
    /// Entries from `other` override entries in `self` if they share the same node_type.
    pub fn merge(&mut self, other: NodeRegistry) {
        self.entries.extend(other.entries);
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::context::Context;
    use crate::test_nodes::{Counting, Passthrough};

    fn passthrough_metadata() -> NodeMetadata {
        NodeMetadata::describe(&Passthrough, NodeCategory::Processing, "Passthrough", "Forwards its input")
    }

    fn counting_metadata() -> NodeMetadata {
        NodeMetadata::describe(&Counting::default(), NodeCategory::Processing, "Counting", "Doubles")
    }

    inventory::submit!(NodeRegistration {
        node_type: "Passthrough",
        descriptor: passthrough_metadata,
        factory: || Arc::new(Passthrough),
    });

    #[test]
    fn test_builtins_come_from_inventory() {
        let registry = NodeRegistry::with_builtins();
        assert!(registry.has_node_type("Passthrough"));
        let node = registry.create("Passthrough").unwrap();
        assert_eq!(node.type_name(), "Passthrough");
    }

    #[test]
    fn test_register_and_create() {
        let mut registry = NodeRegistry::new();
        registry.register(counting_metadata(), || Arc::new(Counting::default()) as Arc<dyn ComputeNode>);

        let engine = Engine::default();
        let node = engine.add_node("double", registry.create("Counting").unwrap()).unwrap();
        let input = engine.graph().find_plug(node, "in").unwrap();
        let output = engine.graph().find_plug(node, "out").unwrap();
        engine.set_value(input, 1.5).unwrap();
        assert_eq!(engine.get::<f64>(output, &Context::new()).unwrap(), 3.0);
    }

    #[test]
    fn test_unknown_and_metadata_only() {
        let mut registry = NodeRegistry::new();
        registry.register_metadata(passthrough_metadata());
        assert!(registry.has_node_type("Passthrough"));
        assert!(matches!(
            registry.create("Passthrough"),
            Err(PlugGraphError::UnknownNodeType(_))
        ));
        assert!(matches!(
            registry.create("Nope"),
            Err(PlugGraphError::UnknownNodeType(_))
        ));
    }

    #[test]
    fn test_merge_override() {
        let mut registry1 = NodeRegistry::new();
        let mut meta1 = passthrough_metadata();
        meta1.label = "Original".to_string();
        registry1.register_metadata(meta1);

        let mut registry2 = NodeRegistry::new();
        let mut meta2 = passthrough_metadata();
        meta2.label = "Override".to_string();
        registry2.register_metadata(meta2);
        registry2.register_metadata(counting_metadata());

        registry1.merge(registry2);
        assert_eq!(registry1.all_metadata().len(), 2);
        assert_eq!(registry1.node_types().len(), 2);
        assert_eq!(registry1.get_metadata("Passthrough").unwrap().label, "Override");
    }

    #[test]
    fn test_metadata_by_category() {
        let mut registry = NodeRegistry::new();
        let mut source = counting_metadata();
        source.category = NodeCategory::Source;
        registry.register_metadata(source);
        registry.register_metadata(passthrough_metadata());

        let grouped = registry.metadata_by_category();
        assert_eq!(grouped.get(&NodeCategory::Source).unwrap().len(), 1);
        assert_eq!(grouped.get(&NodeCategory::Processing).unwrap().len(), 1);
        assert!(grouped.get(&NodeCategory::Context).is_none());
    }
}
