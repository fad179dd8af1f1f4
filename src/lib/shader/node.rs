//! Node contract shared by every shader node and the closed [NodeKind] enumeration.

use super::{
    binding::BindCtx,
    build::{EmitCtx, PrepareCtx},
    graph::Error,
    json::JsonObject,
    nodes::{
        CameraDataNode, LightingNode, LiteralNode, OperationNode, OutputNode, SplitVec4Node,
        TextureNode, VertexNode,
    },
    registry::Constructor,
    types::{GlslType, Literal, Scope, Stage, Stages},
    value::ValueId,
};

use crate::scene::{Mesh, Object, Scene};

use derive_more::Display;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;

#[derive(
    Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize,
)]
#[serde(transparent)]
/// Wrapper around [String].
pub struct Name(String);

impl Name {
    /// Borrow the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Name {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Name {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for Name {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize,
)]
/// Index of a [Node] in its graph's arena.
pub struct NodeId(pub(crate) usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Side of a node socket.
pub enum Side {
    /// Input slot.
    Input,
    /// Output value.
    Output,
}

#[derive(Clone, Copy, Debug, PartialEq)]
/// Static description of an input slot.
pub struct InputSpec {
    /// Slot name.
    pub name: &'static str,
    /// Expected type; narrower float types are accepted and widened.
    pub ty: GlslType,
    /// Stages the node reads the slot in.
    pub stages: Stages,
    /// Constant read when nothing is connected.
    pub default: Literal,
}

#[derive(Clone, Copy, Debug, PartialEq)]
/// Static description of an output value.
pub struct OutputSpec {
    /// Output name.
    pub name: &'static str,
    /// Base name of the generated variable.
    pub value_name: &'static str,
    /// Type before any configuration.
    pub ty: GlslType,
    /// Declaration scope.
    pub scope: Scope,
    /// Stages the value is available in.
    pub stages: Stages,
}

#[derive(Clone, Debug, PartialEq)]
/// Input slot of a [Node] instance.
pub struct Slot {
    /// Expected type.
    pub ty: GlslType,
    /// Stages the slot is read in.
    pub stages: Stages,
    pub(crate) value: ValueId,
    pub(crate) default: ValueId,
}

impl Slot {
    /// Value currently feeding the slot.
    pub fn value(&self) -> ValueId {
        self.value
    }

    /// Value the slot falls back to when disconnected.
    pub fn default_value(&self) -> ValueId {
        self.default
    }

    /// Whether something other than the default feeds the slot.
    pub fn is_connected(&self) -> bool {
        self.value != self.default
    }
}

#[derive(Clone, Debug, PartialEq)]
/// Node instance registered in a graph.
pub struct Node {
    /// Display name.
    pub name: String,
    pub(crate) kind: NodeKind,
    pub(crate) inputs: IndexMap<Name, Slot>,
    pub(crate) outputs: IndexMap<Name, ValueId>,
}

impl Node {
    /// Node implementation.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Stable class identifier.
    pub fn class_id(&self) -> &'static str {
        self.kind.as_node().class_id()
    }

    /// Input slots in declaration order.
    pub fn inputs(&self) -> &IndexMap<Name, Slot> {
        &self.inputs
    }

    /// Output values in declaration order.
    pub fn outputs(&self) -> &IndexMap<Name, ValueId> {
        &self.outputs
    }

    /// Output value by name.
    pub fn output(&self, name: &str) -> Option<ValueId> {
        self.outputs.get(name).copied()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
/// Line-oriented source buffer.
pub struct CodeBuffer {
    text: String,
    indent: usize,
}

impl CodeBuffer {
    pub(crate) fn indented(indent: usize) -> Self {
        Self {
            text: String::new(),
            indent,
        }
    }

    /// Append one line at the current indentation.
    pub fn line(&mut self, line: impl AsRef<str>) -> &mut Self {
        for _ in 0..self.indent {
            self.text.push_str("    ");
        }
        self.text.push_str(line.as_ref());
        self.text.push('\n');
        self
    }

    /// Append `header {` and indent what follows.
    pub fn open(&mut self, header: impl AsRef<str>) -> &mut Self {
        match header.as_ref() {
            "" => self.line("{"),
            header => self.line(format!("{header} {{")),
        };
        self.indent += 1;
        self
    }

    /// Close the block opened last.
    pub fn close(&mut self) -> &mut Self {
        self.indent = self.indent.saturating_sub(1);
        self.line("}")
    }

    /// Buffered text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Whether nothing was appended.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Contract every shader node implements.
///
/// Emission hooks append to per-stage buffers and are called once per build pass, after every
/// node they depend on. Binding hooks are called in build order by the
/// [binding protocol](super::binding).
pub trait ShaderNode {
    /// Stable identifier used by the [registry](super::registry) and graph documents.
    fn class_id(&self) -> &'static str;

    /// Human readable name.
    fn name(&self) -> &'static str;

    /// Input slots.
    fn inputs(&self) -> &'static [InputSpec] {
        &[]
    }

    /// Output values.
    fn outputs(&self) -> &'static [OutputSpec] {
        &[]
    }

    /// Type of an output under the current configuration.
    fn output_type(&self, output: &OutputSpec) -> GlslType {
        output.ty
    }

    /// Adjust outputs and slots once wiring is final, before any emission.
    fn prepare_to_build(&mut self, _ctx: &mut PrepareCtx<'_>) -> Result<(), Error> {
        Ok(())
    }

    /// Global declarations of the vertex stage.
    fn declaration_vertex(&self, ctx: &EmitCtx<'_>, out: &mut CodeBuffer) -> Result<(), Error> {
        ctx.declare_outputs(Stage::Vertex, out)
    }

    /// Global declarations of the fragment stage.
    fn declaration_fragment(&self, ctx: &EmitCtx<'_>, out: &mut CodeBuffer) -> Result<(), Error> {
        ctx.declare_outputs(Stage::Fragment, out)
    }

    /// Statements of the vertex stage `main`.
    fn execution_vertex(&self, _ctx: &EmitCtx<'_>, _out: &mut CodeBuffer) -> Result<(), Error> {
        Ok(())
    }

    /// Statements of the fragment stage `main`.
    fn execution_fragment(&self, _ctx: &EmitCtx<'_>, _out: &mut CodeBuffer) -> Result<(), Error> {
        Ok(())
    }

    /// Push data shared by everything drawn in a scene.
    fn prepare_to_draw_scene(&mut self, _ctx: &mut BindCtx<'_>, _scene: &Scene) -> Result<(), Error> {
        Ok(())
    }

    /// Push per-object data.
    fn prepare_object_data(&mut self, _ctx: &mut BindCtx<'_>, _object: &Object) -> Result<(), Error> {
        Ok(())
    }

    /// Push per-mesh data right before drawing.
    fn prepare_to_draw_mesh(&mut self, _ctx: &mut BindCtx<'_>, _mesh: &Mesh) -> Result<(), Error> {
        Ok(())
    }

    /// Restore configuration scalars.
    fn read(&mut self, _json: &JsonObject) -> Result<(), Error> {
        Ok(())
    }

    /// Persist configuration scalars.
    fn write(&self, _json: &mut JsonObject) {}
}

macro_rules! node_kinds {
    { $($(#[$attr:meta])* $variant:ident($node:ident)),+ $(,)? } => {
        #[derive(Clone, Debug, PartialEq)]
        /// Closed set of node implementations.
        pub enum NodeKind {
            $(
                $(#[$attr])*
                $variant($node),
            )+
        }

        $(
            impl From<$node> for NodeKind {
                fn from(node: $node) -> Self {
                    Self::$variant(node)
                }
            }
        )+

        impl NodeKind {
            /// Node contract of the wrapped implementation.
            pub fn as_node(&self) -> &dyn ShaderNode {
                match self {
                    $(Self::$variant(node) => node as &dyn ShaderNode,)+
                }
            }

            /// Mutable node contract of the wrapped implementation.
            pub fn as_node_mut(&mut self) -> &mut dyn ShaderNode {
                match self {
                    $(Self::$variant(node) => node as &mut dyn ShaderNode,)+
                }
            }

            /// Class ids and default constructors of every built-in node.
            pub fn builtins() -> Vec<(&'static str, Constructor)> {
                vec![
                    $(($node::CLASS_ID, (|| Self::$variant($node::default())) as Constructor),)+
                ]
            }
        }
    };
}

node_kinds! {
    /// Final vertex position and fragment color.
    Output(OutputNode),
    /// Vector split into four float channels.
    Split(SplitVec4Node),
    /// Constant.
    Literal(LiteralNode),
    /// Blinn-Phong lighting.
    Lighting(LightingNode),
    /// Texture sampling.
    Texture(TextureNode),
    /// Mesh attributes in world space.
    Vertex(VertexNode),
    /// Camera derived data.
    Camera(CameraDataNode),
    /// Free-form expression.
    Operation(OperationNode),
}
