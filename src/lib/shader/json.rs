//! JSON persistence: node configuration objects and whole-graph documents.

use super::{
    graph::{Error, Graph, Unvalidated},
    node::NodeId,
    program::ProgramConfig,
    registry::NodeRegistry,
    types::{GlslType, Literal, Scope, Stages},
    value::{Value, ValueId},
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration object a node reads from and writes to.
pub type JsonObject = serde_json::Map<String, serde_json::Value>;

/// Typed accessors with defaults for missing keys.
pub trait JsonExt {
    /// Float at `key`, `default` when missing.
    fn float_or(&self, key: &str, default: f32) -> f32;
    /// Integer at `key`, `default` when missing.
    fn int_or(&self, key: &str, default: i32) -> i32;
    /// Boolean at `key`, `default` when missing.
    fn bool_or(&self, key: &str, default: bool) -> bool;
    /// String at `key`, `default` when missing.
    fn string_or(&self, key: &str, default: &str) -> String;
    /// Deserialize the entry at `key`, [None] when missing.
    fn parse<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, Error>;
    /// Serialize `value` at `key`.
    fn put<T: Serialize>(&mut self, key: &str, value: T);
}

impl JsonExt for JsonObject {
    fn float_or(&self, key: &str, default: f32) -> f32 {
        self.get(key)
            .and_then(serde_json::Value::as_f64)
            .map_or(default, |value| value as f32)
    }

    fn int_or(&self, key: &str, default: i32) -> i32 {
        self.get(key)
            .and_then(serde_json::Value::as_i64)
            .and_then(|value| i32::try_from(value).ok())
            .unwrap_or(default)
    }

    fn bool_or(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(default)
    }

    fn string_or(&self, key: &str, default: &str) -> String {
        self.get(key)
            .and_then(serde_json::Value::as_str)
            .unwrap_or(default)
            .to_owned()
    }

    fn parse<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, Error> {
        self.get(key)
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
            .map_err(Error::from)
    }

    fn put<T: Serialize>(&mut self, key: &str, value: T) {
        match serde_json::to_value(value) {
            Ok(value) => {
                self.insert(key.to_owned(), value);
            }
            Err(error) => tracing::warn!(key, %error, "Skipped unserializable configuration entry"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Persisted node.
pub struct NodeEntry {
    /// Document-local id.
    pub id: usize,
    /// Registry class id.
    pub class_id: String,
    /// Display name.
    pub name: String,
    /// Configuration written by the node.
    #[serde(default)]
    pub config: JsonObject,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Persisted value without owner.
pub struct ValueEntry {
    /// Document-local id.
    pub id: usize,
    /// Base name.
    pub name: String,
    /// Type.
    pub ty: GlslType,
    /// Declaration scope.
    pub scope: Scope,
    /// Availability.
    pub stages: Stages,
    /// Inline expression.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub inline: String,
    /// Constant components.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub literal: Option<Literal>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "from")]
/// Origin of a connected value.
pub enum Source {
    /// Output of a persisted node.
    Output {
        /// Document-local node id.
        node: usize,
        /// Output name.
        output: String,
    },
    /// Persisted value without owner.
    Value {
        /// Document-local value id.
        value: usize,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
/// Persisted connection into an input slot.
pub struct Link {
    /// Document-local id of the consuming node.
    pub node: usize,
    /// Input slot name.
    pub input: String,
    /// Connected value.
    pub source: Source,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
/// Serializable form of a [Graph]. Slots left on their defaults are not persisted.
pub struct GraphDocument {
    /// Target dialect.
    #[serde(default)]
    pub config: ProgramConfig,
    /// Nodes in insertion order.
    pub nodes: Vec<NodeEntry>,
    /// Values without owner that feed a slot.
    #[serde(default)]
    pub values: Vec<ValueEntry>,
    /// Connections.
    #[serde(default)]
    pub links: Vec<Link>,
    /// Document-local id of the root node.
    #[serde(default)]
    pub root: Option<usize>,
}

impl<State> Graph<State> {
    /// Persist the graph. Document ids are positions, so equal graphs give equal documents.
    pub fn to_document(&self) -> GraphDocument {
        let node_ids: HashMap<NodeId, usize> = self
            .nodes
            .keys()
            .enumerate()
            .map(|(index, id)| (*id, index))
            .collect();

        let nodes = self
            .nodes
            .iter()
            .enumerate()
            .map(|(index, (_, node))| {
                let mut config = JsonObject::new();
                node.kind.as_node().write(&mut config);
                NodeEntry {
                    id: index,
                    class_id: node.class_id().to_owned(),
                    name: node.name.clone(),
                    config,
                }
            })
            .collect();

        let mut value_ids: HashMap<ValueId, usize> = HashMap::new();
        let mut values = Vec::new();
        let mut links = Vec::new();

        for (index, node) in self.nodes.values().enumerate() {
            for (input, slot) in node.inputs.iter() {
                if !slot.is_connected() {
                    continue;
                }
                let Some(value) = self.values.get(&slot.value) else {continue};

                let source = match value.owner.and_then(|owner| {
                    let output = self.nodes.get(&owner)?.outputs.iter().find(|(_, id)| **id == slot.value)?;
                    Some((node_ids.get(&owner).copied()?, output.0.to_string()))
                }) {
                    Some((node, output)) => Source::Output { node, output },
                    None => {
                        let next = value_ids.len();
                        let id = *value_ids.entry(slot.value).or_insert_with(|| {
                            values.push(ValueEntry {
                                id: next,
                                name: value.name.clone(),
                                ty: value.ty,
                                scope: value.scope,
                                stages: value.stages,
                                inline: value.inline.clone(),
                                literal: value.literal,
                            });
                            next
                        });
                        Source::Value { value: id }
                    }
                };

                links.push(Link {
                    node: index,
                    input: input.to_string(),
                    source,
                });
            }
        }

        GraphDocument {
            config: self.config.clone(),
            nodes,
            values,
            links,
            root: self.root.and_then(|root| node_ids.get(&root).copied()),
        }
    }

    /// Persist the graph as a JSON string.
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }
}

impl Graph<Unvalidated> {
    /// Rebuild a graph, creating nodes through `registry`.
    pub fn from_document(document: &GraphDocument, registry: &NodeRegistry) -> Result<Self, Error> {
        let mut graph = Graph::new(document.config.clone());

        let mut nodes = HashMap::new();
        for entry in document.nodes.iter() {
            let mut kind = registry.create(&entry.class_id)?;
            kind.as_node_mut().read(&entry.config)?;

            let id = graph.add_node(kind);
            if let Some(node) = graph.nodes.get_mut(&id) {
                node.name = entry.name.clone();
            }
            nodes.insert(entry.id, id);
        }

        let mut values = HashMap::new();
        for entry in document.values.iter() {
            let mut value = Value::new(entry.name.as_str(), entry.ty, entry.scope, entry.stages);
            value.inline = entry.inline.clone();
            value.literal = entry.literal;
            values.insert(entry.id, graph.add_value(value));
        }

        let node = |id: usize| nodes.get(&id).copied().ok_or(Error::UnknownNode(NodeId(id)));

        for link in document.links.iter() {
            let target = node(link.node)?;
            let value = match &link.source {
                Source::Output { node: source, output } => graph.output(node(*source)?, output)?,
                Source::Value { value } => values
                    .get(value)
                    .copied()
                    .ok_or(Error::UnknownValue(ValueId(*value)))?,
            };
            graph.set_input(target, &link.input, value)?;
        }

        if let Some(root) = document.root {
            graph.set_root(node(root)?)?;
        }

        Ok(graph)
    }

    /// Rebuild a graph from a JSON string.
    pub fn from_json(json: &str, registry: &NodeRegistry) -> Result<Self, Error> {
        Self::from_document(&serde_json::from_str(json)?, registry)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::shader::{
        nodes::{AlphaMode, OperationNode, OutputNode, SplitVec4Node, TextureNode},
        registry::REGISTRY,
    };

    #[test]
    fn defaults_for_missing_keys() {
        let json: JsonObject = serde_json::from_str(r#"{"a": 2.5, "b": true, "c": "x", "d": 3}"#).unwrap();

        assert_eq!(json.float_or("a", 0.), 2.5);
        assert_eq!(json.float_or("missing", 0.5), 0.5);
        assert!(json.bool_or("b", false));
        assert_eq!(json.string_or("c", "y"), "x");
        assert_eq!(json.int_or("d", 0), 3);
        assert_eq!(json.parse::<GlslType>("missing").unwrap(), None);
        assert!(json.parse::<GlslType>("c").is_err());
    }

    fn sample() -> Graph<Unvalidated> {
        let mut graph = Graph::default();
        let output = graph.add_node(OutputNode {
            alpha_mode: AlphaMode::Mask,
            alpha_cutoff: 0.25,
            ..Default::default()
        });
        let texture = graph.add_node(TextureNode {
            srgb: true,
            ..Default::default()
        });
        let split = graph.add_node(SplitVec4Node::default());
        let op = graph.add_node(OperationNode::new("arg1 * arg2", GlslType::Vec4));
        let tint = graph.add_value(Value::uniform("tint", GlslType::Vec4));

        graph.connect(texture, "color", split, "vector").unwrap();
        graph.connect(split, "x", op, "arg1").unwrap();
        graph.set_input(op, "arg2", tint).unwrap();
        graph.connect(op, "result", output, "frag_color").unwrap();
        graph.set_root(output).unwrap();
        graph
    }

    #[test]
    fn document_round_trip() {
        let graph = sample();
        let json = graph.to_json().unwrap();
        let restored = Graph::from_json(&json, &REGISTRY).unwrap();

        assert_eq!(restored.to_document(), graph.to_document());

        let mut original = graph.validate().unwrap();
        let mut restored = restored.validate().unwrap();
        assert_eq!(original.build().unwrap(), restored.build().unwrap());
    }

    #[test]
    fn unknown_class() {
        let mut document = sample().to_document();
        document.nodes[1].class_id = "hologram".to_owned();

        assert!(matches!(
            Graph::from_document(&document, &REGISTRY),
            Err(Error::UnregisteredNodeClass(class)) if class == "hologram"
        ));
    }

    #[test]
    fn malformed_json() {
        assert!(matches!(
            Graph::from_json("{\"nodes\": 3}", &REGISTRY),
            Err(Error::Json(_))
        ));
    }
}
