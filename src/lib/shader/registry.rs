//! Registry mapping node class ids to constructors, used when loading graph documents.

use super::{graph::Error, node::NodeKind};

use indexmap::IndexMap;
use lazy_static::lazy_static;

/// Builds a node with its default configuration.
pub type Constructor = fn() -> NodeKind;

#[derive(Clone, Debug)]
/// Class id to constructor map.
pub struct NodeRegistry {
    constructors: IndexMap<String, Constructor>,
}

impl Default for NodeRegistry {
    /// Registry of every built-in node.
    fn default() -> Self {
        let mut registry = Self::empty();
        for (class_id, constructor) in NodeKind::builtins() {
            registry.register(class_id, constructor);
        }
        registry
    }
}

impl NodeRegistry {
    /// Registry without any class.
    pub fn empty() -> Self {
        Self {
            constructors: IndexMap::new(),
        }
    }

    /// Register a class, replacing any constructor previously registered under `class_id`.
    pub fn register(&mut self, class_id: impl Into<String>, constructor: Constructor) -> &mut Self {
        self.constructors.insert(class_id.into(), constructor);
        self
    }

    /// Whether `class_id` is registered.
    pub fn contains(&self, class_id: &str) -> bool {
        self.constructors.contains_key(class_id)
    }

    /// Registered class ids in registration order.
    pub fn class_ids(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Instantiate a node of class `class_id`.
    pub fn create(&self, class_id: &str) -> Result<NodeKind, Error> {
        let constructor = self
            .constructors
            .get(class_id)
            .ok_or_else(|| Error::UnregisteredNodeClass(class_id.to_owned()))?;
        Ok(constructor())
    }
}

lazy_static! {
    /// Process-wide registry of the built-in nodes.
    pub static ref REGISTRY: NodeRegistry = NodeRegistry::default();
}
