//! Arena-backed shader [Graph]: node and value storage, wiring and validation.

use super::{
    binding::Uniform,
    build::BuildPass,
    node::{Name, Node, NodeId, NodeKind, Side, Slot},
    program::ProgramConfig,
    types::{GlslType, Literal, Stage},
    value::{self, Consumer, Value, ValueId},
};

use indexmap::IndexMap;
use std::{
    collections::{HashMap, HashSet},
    marker::PhantomData,
};

macro_rules! states {
    ($($(#[$attr:meta])* $state:ident),+ $(,)?) => {
        $(
            #[derive(Clone, Debug, Default, PartialEq)]
            $(#[$attr])*
            pub struct $state;
        )+
    };
}
states! {
    /// Graph is being wired and may contain cycles.
    Unvalidated,
    /// Graph has a root and no cycle reachable from it.
    Validated,
}

#[derive(Debug, thiserror::Error)]
/// [Graph] error
pub enum Error {
    #[error("No root node set")]
    /// Building requires a root node.
    NoRoot,

    #[error("Unknown node `{0}`")]
    /// Node id not present in the graph.
    UnknownNode(NodeId),

    #[error("Unknown value `{0:?}`")]
    /// Value id not present in the graph.
    UnknownValue(ValueId),

    #[error("Referencing missing {0:?} socket `{1}`")]
    /// Trying to get/set a non-existent socket.
    Missing(Side, Name),

    #[error("Mismatched types: `{value}` is a {got}, slot `{slot}` expects a {expected}")]
    /// Connected value cannot be widened to the slot type.
    MismatchedTypes {
        /// Name of the connected value.
        value: String,
        /// Target slot.
        slot: Name,
        /// Type of the connected value.
        got: GlslType,
        /// Type expected by the slot.
        expected: GlslType,
    },

    #[error("Detected a cycle while validating the path {during:?}; cycle is from a `{source_socket}` socket to a `{target_socket}` socket, reaching node `{detected}`")]
    /// Detected a cycle on the node with the given [NodeId].
    Cycle {
        /// Current path.
        during: Vec<NodeId>,
        /// Name of the slot the detected node was reached from.
        source_socket: Name,
        /// Name of the output the detected node was reached through.
        target_socket: Name,
        /// Node detected as already visited in the current path.
        detected: NodeId,
    },

    #[error("`{value}` feeding `{node}.{slot}` does not exist in the {stage:?} stage")]
    /// A slot is read in a stage its value is not available in.
    MissingStageLinkage {
        /// Name of the value.
        value: String,
        /// Display name of the consuming node.
        node: String,
        /// Consuming slot.
        slot: Name,
        /// Stage lacking the value.
        stage: Stage,
    },

    #[error("Value name `{0}` cannot take a build suffix: it must not be empty or end with a digit")]
    /// Declared value whose name would make suffixed references ambiguous.
    InvalidValueName(String),

    #[error("Unregistered node class `{0}`")]
    /// Class id not found in the [registry](super::registry::NodeRegistry).
    UnregisteredNodeClass(String),

    #[error("Invalid `{node}` configuration: {reason}")]
    /// Node configuration cannot produce valid code.
    InvalidConfig {
        /// Class id of the node.
        node: &'static str,
        /// What is wrong.
        reason: String,
    },

    #[error("Graph changed since its last build")]
    /// Binding requires an up-to-date build.
    NotBuilt,

    #[error("Code generation failed: {0}")]
    /// [Value] code generation error.
    Value(value::Error),

    #[error("Serialization failed: {0}")]
    /// Graph document (de)serialization error.
    Json(#[from] serde_json::Error),

    #[error("Program compilation failed: {log}")]
    /// The compile sink rejected the generated program.
    Compile {
        /// Compiler info log.
        log: String,
        /// Vertex stage source.
        vertex: String,
        /// Fragment stage source.
        fragment: String,
    },
}

impl From<value::Error> for Error {
    fn from(value: value::Error) -> Self {
        Self::Value(value)
    }
}

#[derive(Clone, Debug)]
/// Shader graph state machine: nodes and values live in arenas and reference each other by
/// id.
pub struct Graph<State> {
    pub(crate) nodes: IndexMap<NodeId, Node>,
    pub(crate) values: IndexMap<ValueId, Value>,
    pub(crate) root: Option<NodeId>,
    pub(crate) config: ProgramConfig,
    pub(crate) pass: Option<BuildPass>,
    pub(crate) pushed: HashMap<String, Uniform>,
    next_node: usize,
    next_value: usize,
    state: PhantomData<State>,
}

impl Default for Graph<Unvalidated> {
    fn default() -> Self {
        Self::new(ProgramConfig::default())
    }
}

impl<State> Graph<State> {
    fn into_state<Next>(self) -> Graph<Next> {
        let Self {
            nodes,
            values,
            root,
            config,
            pass,
            pushed,
            next_node,
            next_value,
            state: _state,
        } = self;

        Graph {
            nodes,
            values,
            root,
            config,
            pass,
            pushed,
            next_node,
            next_value,
            state: PhantomData,
        }
    }

    /// Target dialect.
    pub fn config(&self) -> &ProgramConfig {
        &self.config
    }

    /// Change the target dialect.
    pub fn set_config(&mut self, config: ProgramConfig) {
        self.config = config;
        self.pass = None;
    }

    /// Node the build starts from.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Node by id.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().map(|(id, node)| (*id, node))
    }

    /// Value by id.
    pub fn value(&self, id: ValueId) -> Option<&Value> {
        self.values.get(&id)
    }

    /// Values in insertion order.
    pub fn values(&self) -> impl Iterator<Item = (ValueId, &Value)> {
        self.values.iter().map(|(id, value)| (*id, value))
    }

    /// Output value of a node.
    pub fn output(&self, node: NodeId, output: &str) -> Result<ValueId, Error> {
        self.nodes
            .get(&node)
            .ok_or(Error::UnknownNode(node))?
            .output(output)
            .ok_or_else(|| Error::Missing(Side::Output, output.into()))
    }

    /// Value currently feeding an input slot.
    pub fn input(&self, node: NodeId, slot: &str) -> Result<ValueId, Error> {
        self.slot(node, slot).map(Slot::value)
    }

    fn slot(&self, node: NodeId, slot: &str) -> Result<&Slot, Error> {
        self.nodes
            .get(&node)
            .ok_or(Error::UnknownNode(node))?
            .inputs
            .get(slot)
            .ok_or_else(|| Error::Missing(Side::Input, slot.into()))
    }

    /// Change a node's configuration. Output types are refreshed and the last build is
    /// discarded.
    pub fn configure<F: FnOnce(&mut NodeKind)>(&mut self, node: NodeId, f: F) -> Result<(), Error> {
        let entry = self.nodes.get_mut(&node).ok_or(Error::UnknownNode(node))?;
        f(&mut entry.kind);

        let contract = entry.kind.as_node();
        for spec in contract.outputs() {
            let Some(id) = entry.outputs.get(spec.name) else {continue};
            if let Some(value) = self.values.get_mut(id) {
                value.ty = contract.output_type(spec);
            }
        }

        self.pass = None;
        Ok(())
    }
}

impl Graph<Unvalidated> {
    /// Empty graph targeting `config`.
    pub fn new(config: ProgramConfig) -> Self {
        Self {
            nodes: IndexMap::new(),
            values: IndexMap::new(),
            root: None,
            config,
            pass: None,
            pushed: HashMap::new(),
            next_node: 0,
            next_value: 0,
            state: PhantomData,
        }
    }

    fn insert_value(&mut self, value: Value) -> ValueId {
        let id = ValueId(self.next_value);
        self.next_value += 1;
        self.values.insert(id, value);
        id
    }

    /// Register a node. Its slots start on their defaults and its outputs are owned by it.
    pub fn add_node(&mut self, node: impl Into<NodeKind>) -> NodeId {
        let kind = node.into();
        let id = NodeId(self.next_node);
        self.next_node += 1;

        let contract = kind.as_node();

        let mut inputs = IndexMap::new();
        for spec in contract.inputs() {
            let name = Name::from(spec.name);
            let mut default = Value::literal(spec.default);
            default.add_consumer(id, &name);
            let default = self.insert_value(default);

            inputs.insert(
                name,
                Slot {
                    ty: spec.ty,
                    stages: spec.stages,
                    value: default,
                    default,
                },
            );
        }

        let mut outputs = IndexMap::new();
        for spec in contract.outputs() {
            let mut value = Value::new(
                spec.value_name,
                contract.output_type(spec),
                spec.scope,
                spec.stages,
            );
            value.owner = Some(id);
            outputs.insert(Name::from(spec.name), self.insert_value(value));
        }

        tracing::trace!(node = %id, class = contract.class_id(), "Added node");

        let name = contract.name().to_owned();
        self.nodes.insert(
            id,
            Node {
                name,
                kind,
                inputs,
                outputs,
            },
        );
        self.pass = None;

        id
    }

    /// Register a value not produced by any node, e.g. an application-driven uniform.
    pub fn add_value(&mut self, mut value: Value) -> ValueId {
        value.owner = None;
        value.consumers.clear();
        self.insert_value(value)
    }

    /// Register an inline constant.
    pub fn add_literal(&mut self, literal: Literal) -> ValueId {
        self.add_value(Value::literal(literal))
    }

    /// Mutable access to a value, e.g. to rename an application uniform.
    pub fn value_mut(&mut self, id: ValueId) -> Option<&mut Value> {
        self.pass = None;
        self.values.get_mut(&id)
    }

    /// Connect `value` to an input slot, replacing the previous connection. Connecting the
    /// value already in place changes nothing.
    pub fn set_input(&mut self, node: NodeId, slot: &str, value: ValueId) -> Result<(), Error> {
        let incoming = self.values.get(&value).ok_or(Error::UnknownValue(value))?;
        let target = self.nodes.get_mut(&node).ok_or(Error::UnknownNode(node))?;
        let Some((_, name, entry)) = target.inputs.get_full_mut(slot) else {
            return Err(Error::Missing(Side::Input, slot.into()));
        };

        if !incoming.ty.widens_to(entry.ty) {
            return Err(Error::MismatchedTypes {
                value: incoming.name.clone(),
                slot: name.clone(),
                got: incoming.ty,
                expected: entry.ty,
            });
        }

        let previous = std::mem::replace(&mut entry.value, value);
        let name = name.clone();

        if previous != value {
            if let Some(previous) = self.values.get_mut(&previous) {
                previous.remove_consumer(node, &name);
            }
        }
        if let Some(incoming) = self.values.get_mut(&value) {
            incoming.add_consumer(node, &name);
        }

        self.pass = None;
        Ok(())
    }

    /// Connect a node output to another node's input slot.
    pub fn connect(
        &mut self,
        from: NodeId,
        output: &str,
        to: NodeId,
        input: &str,
    ) -> Result<(), Error> {
        let value = self.output(from, output)?;
        self.set_input(to, input, value)
    }

    /// Put a slot back on its default value.
    pub fn reset_input(&mut self, node: NodeId, slot: &str) -> Result<(), Error> {
        let default = self.slot(node, slot)?.default;
        self.set_input(node, slot, default)
    }

    /// Set the node the build starts from, usually an [OutputNode](super::nodes::OutputNode).
    pub fn set_root(&mut self, node: NodeId) -> Result<(), Error> {
        if !self.nodes.contains_key(&node) {
            return Err(Error::UnknownNode(node));
        }
        self.root = Some(node);
        self.pass = None;
        Ok(())
    }

    /// Remove a node and its values. Slots it fed fall back to their defaults.
    pub fn remove_node(&mut self, node: NodeId) -> Result<NodeKind, Error> {
        let removed = self
            .nodes
            .shift_remove(&node)
            .ok_or(Error::UnknownNode(node))?;

        for output in removed.outputs.values() {
            let consumers = self
                .values
                .shift_remove(output)
                .map(|value| value.consumers)
                .unwrap_or_default();

            for Consumer { node: consumer, slot } in consumers {
                let Some(entry) = self
                    .nodes
                    .get_mut(&consumer)
                    .and_then(|consumer| consumer.inputs.get_mut(&slot))
                else {
                    continue;
                };

                entry.value = entry.default;
                if let Some(default) = self.values.get_mut(&entry.default) {
                    default.add_consumer(consumer, &slot);
                }
            }
        }

        for (slot, entry) in removed.inputs {
            for id in [entry.value, entry.default] {
                if let Some(value) = self.values.get_mut(&id) {
                    value.remove_consumer(node, &slot);
                }
            }
            // Defaults wired into other slots outlive their node.
            if self
                .values
                .get(&entry.default)
                .is_some_and(|default| default.consumers.is_empty())
            {
                self.values.shift_remove(&entry.default);
            }
        }

        if self.root == Some(node) {
            self.root = None;
        }
        self.pass = None;

        tracing::trace!(node = %node, "Removed node");

        Ok(removed.kind)
    }

    /// Check the [unvalidated](Unvalidated) [Graph] for a root and for cycles reachable from
    /// it.
    pub fn validate(self) -> Result<Graph<Validated>, Error> {
        let root = self.root.ok_or(Error::NoRoot)?;

        let mut path = Vec::new();
        let mut done = HashSet::new();
        self.check_cycles(root, &mut path, &mut done)?;

        tracing::debug!(nodes = done.len(), "Validated shader graph");

        Ok(self.into_state())
    }

    fn check_cycles(
        &self,
        current: NodeId,
        path: &mut Vec<NodeId>,
        done: &mut HashSet<NodeId>,
    ) -> Result<(), Error> {
        if done.contains(&current) {
            return Ok(());
        }
        let Some(node) = self.nodes.get(&current) else {
            return Err(Error::UnknownNode(current));
        };

        path.push(current);

        for (input, slot) in node.inputs.iter() {
            let Some(owner) = self.values.get(&slot.value).and_then(Value::owner) else {continue};

            // Check for cycles, i.e. if the node was already encountered in the path.
            if path.contains(&owner) {
                let target_socket = self
                    .nodes
                    .get(&owner)
                    .and_then(|owner| owner.outputs.iter().find(|(_, id)| **id == slot.value))
                    .map(|(name, _)| name.clone())
                    .unwrap_or_default();

                return Err(Error::Cycle {
                    during: path.clone(),
                    source_socket: input.clone(),
                    target_socket,
                    detected: owner,
                });
            }

            self.check_cycles(owner, path, done)?;
        }

        path.pop();
        done.insert(current);

        Ok(())
    }
}

impl Graph<Validated> {
    /// Go back to wiring. The last build stays valid until something changes.
    pub fn edit(self) -> Graph<Unvalidated> {
        self.into_state()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::shader::{
        nodes::{OperationNode, OutputNode},
        types::Scope,
        types::Stages,
    };

    fn operation(graph: &mut Graph<Unvalidated>) -> NodeId {
        graph.add_node(OperationNode::default())
    }

    #[test]
    fn slots_start_on_defaults() {
        let mut graph = Graph::default();
        let output = graph.add_node(OutputNode::default());

        let node = graph.node(output).unwrap();
        let slot = &node.inputs()["frag_color"];
        assert!(!slot.is_connected());

        let default = graph.value(slot.value()).unwrap();
        assert_eq!(default.inline, "1.0");
        assert_eq!(default.consumers().len(), 1);
    }

    #[test]
    fn idempotent_set_input() {
        let mut graph = Graph::default();
        let output = graph.add_node(OutputNode::default());
        let color = graph.add_value(Value::uniform("tint", GlslType::Vec4));

        graph.set_input(output, "frag_color", color).unwrap();
        let once = graph.clone();
        graph.set_input(output, "frag_color", color).unwrap();

        assert_eq!(graph.value(color), once.value(color));
        assert_eq!(graph.value(color).unwrap().consumers().len(), 1);
        assert_eq!(graph.node(output), once.node(output));
    }

    #[test]
    fn rewiring_moves_consumer() {
        let mut graph = Graph::default();
        let output = graph.add_node(OutputNode::default());
        let a = graph.add_value(Value::uniform("a", GlslType::Vec4));
        let b = graph.add_value(Value::uniform("b", GlslType::Float));

        graph.set_input(output, "frag_color", a).unwrap();
        graph.set_input(output, "frag_color", b).unwrap();

        assert!(!graph.value(a).unwrap().is_used());
        assert_eq!(
            graph.value(b).unwrap().consumers(),
            &[Consumer {
                node: output,
                slot: Name::from("frag_color")
            }]
        );

        graph.reset_input(output, "frag_color").unwrap();
        assert!(!graph.value(b).unwrap().is_used());
        assert!(!graph.node(output).unwrap().inputs()["frag_color"].is_connected());
    }

    #[test]
    fn narrowing_connection_is_rejected() {
        let mut graph = Graph::default();
        let output = graph.add_node(OutputNode::default());
        let matrix = graph.add_value(Value::uniform("matrix", GlslType::Mat4));

        let result = graph.set_input(output, "frag_color", matrix);
        assert!(
            matches!(
                result,
                Err(Error::MismatchedTypes {
                    got: GlslType::Mat4,
                    expected: GlslType::Vec4,
                    ..
                })
            ),
            "Expected a type mismatch, got `{result:?}`"
        );
    }

    #[test]
    fn missing_sockets() {
        let mut graph = Graph::default();
        let output = graph.add_node(OutputNode::default());
        let value = graph.add_literal(Literal::Float(1.));

        assert!(matches!(
            graph.set_input(output, "nope", value),
            Err(Error::Missing(Side::Input, _))
        ));
        assert!(matches!(
            graph.output(output, "nope"),
            Err(Error::Missing(Side::Output, _))
        ));
        assert!(matches!(
            graph.set_input(NodeId(42), "frag_color", value),
            Err(Error::UnknownNode(NodeId(42)))
        ));
    }

    #[test]
    fn removing_a_node_resets_its_consumers() {
        let mut graph = Graph::default();
        let output = graph.add_node(OutputNode::default());
        let op = operation(&mut graph);
        graph.connect(op, "result", output, "frag_color").unwrap();
        graph.set_root(op).unwrap();

        graph.remove_node(op).unwrap();

        let slot = &graph.node(output).unwrap().inputs()["frag_color"];
        assert!(!slot.is_connected());
        assert!(graph.value(slot.value()).unwrap().is_used());
        assert_eq!(graph.root(), None);
    }

    #[test]
    fn shared_defaults_outlive_their_node() {
        let mut graph = Graph::default();
        let output = graph.add_node(OutputNode::default());
        let op = operation(&mut graph);
        let borrowed = graph.input(op, "arg1").unwrap();
        graph.set_input(output, "frag_color", borrowed).unwrap();
        graph.set_root(output).unwrap();

        graph.remove_node(op).unwrap();

        assert_eq!(graph.input(output, "frag_color").unwrap(), borrowed);
        assert_eq!(graph.value(borrowed).unwrap().consumers().len(), 1);
        let mut graph = graph.validate().unwrap();
        assert!(graph
            .build()
            .unwrap()
            .fragment
            .contains("fragColor = vec4(0.0, 0.0, 0.0, 1.0);"));
    }

    #[test]
    fn configure_refreshes_output_types() {
        let mut graph = Graph::default();
        let op = operation(&mut graph);
        graph
            .configure(op, |kind| {
                if let NodeKind::Operation(op) = kind {
                    op.result_type = GlslType::Float;
                }
            })
            .unwrap();

        let result = graph.output(op, "result").unwrap();
        assert_eq!(graph.value(result).unwrap().ty, GlslType::Float);
    }

    #[test]
    fn orphan_values_have_no_owner() {
        let mut graph = Graph::default();
        let mut value = Value::new("time", GlslType::Float, Scope::GlobalUniform, Stages::BOTH);
        value.owner = Some(NodeId(3));

        let id = graph.add_value(value);
        assert_eq!(graph.value(id).unwrap().owner(), None);
    }

    #[cfg(test)]
    mod cycle_detection {
        use super::*;

        #[test]
        fn no_cycle() {
            let mut graph = Graph::default();
            let output = graph.add_node(OutputNode::default());
            let a = operation(&mut graph);
            let b = operation(&mut graph);
            graph.connect(a, "result", b, "arg1").unwrap();
            graph.connect(a, "result", b, "arg2").unwrap();
            graph.connect(b, "result", output, "frag_color").unwrap();
            graph.set_root(output).unwrap();

            let validation_result = graph.validate();
            assert!(
                validation_result.is_ok(),
                "Expected a success, got `{validation_result:?}`"
            );
        }

        #[test]
        fn simple_cycle() {
            let mut graph = Graph::default();
            let output = graph.add_node(OutputNode::default());
            let a = operation(&mut graph);
            let b = operation(&mut graph);
            graph.connect(a, "result", b, "arg1").unwrap();
            graph.connect(b, "result", a, "arg2").unwrap();
            graph.connect(b, "result", output, "frag_color").unwrap();
            graph.set_root(output).unwrap();

            let validation_result = graph.validate();
            let Err(Error::Cycle {
                during,
                source_socket,
                target_socket,
                detected,
            }) = validation_result
            else {
                panic!("Expected a cycle, got `{validation_result:?}`");
            };

            assert_eq!(during, vec![output, b, a]);
            assert_eq!(source_socket, Name::from("arg2"));
            assert_eq!(target_socket, Name::from("result"));
            assert_eq!(detected, b);
        }

        #[test]
        fn self_loop() {
            let mut graph = Graph::default();
            let a = operation(&mut graph);
            graph.connect(a, "result", a, "arg1").unwrap();
            graph.set_root(a).unwrap();

            assert!(matches!(graph.validate(), Err(Error::Cycle { detected, .. }) if detected == a));
        }

        #[test]
        fn missing_root() {
            let mut graph = Graph::default();
            operation(&mut graph);

            assert!(matches!(graph.validate(), Err(Error::NoRoot)));
        }
    }
}
