//! Constant node.

use crate::shader::{
    build::PrepareCtx,
    graph::Error,
    json::{JsonExt, JsonObject},
    node::{OutputSpec, ShaderNode},
    types::{GlslType, Literal, Scope, Stages},
};

const OUTPUTS: &[OutputSpec] = &[OutputSpec {
    name: "value",
    value_name: "literal",
    ty: GlslType::Float,
    scope: Scope::Inline,
    stages: Stages::BOTH,
}];

#[derive(Clone, Debug, Default, PartialEq)]
/// Exposes a constant, inlined at every use site.
pub struct LiteralNode {
    /// Constant to expose.
    pub value: Literal,
}

impl LiteralNode {
    /// Registry class id.
    pub const CLASS_ID: &'static str = "literal";

    /// Node exposing `value`.
    pub fn new(value: Literal) -> Self {
        Self { value }
    }
}

impl ShaderNode for LiteralNode {
    fn class_id(&self) -> &'static str {
        Self::CLASS_ID
    }

    fn name(&self) -> &'static str {
        "Literal"
    }

    fn outputs(&self) -> &'static [OutputSpec] {
        OUTPUTS
    }

    fn output_type(&self, _output: &OutputSpec) -> GlslType {
        self.value.glsl_type()
    }

    fn prepare_to_build(&mut self, ctx: &mut PrepareCtx<'_>) -> Result<(), Error> {
        ctx.output_mut("value")?.set_literal(self.value);
        Ok(())
    }

    fn read(&mut self, json: &JsonObject) -> Result<(), Error> {
        if let Some(value) = json.parse("value")? {
            self.value = value;
        }
        Ok(())
    }

    fn write(&self, json: &mut JsonObject) {
        json.put("value", self.value);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::shader::{graph::Graph, nodes::OutputNode};

    #[test]
    fn inlined_and_widened() {
        let mut graph = Graph::default();
        let output = graph.add_node(OutputNode::default());
        let literal = graph.add_node(LiteralNode::new(Literal::Vec3([0.25, 0.5, 1.])));
        graph.connect(literal, "value", output, "frag_color").unwrap();
        graph.set_root(output).unwrap();

        let mut graph = graph.validate().unwrap();
        let fragment = &graph.build().unwrap().fragment;

        assert!(fragment.contains("fragColor = vec4(0.25, 0.5, 1.0, 1.0);"));
        assert!(!fragment.contains("literal"));
    }

    #[test]
    fn config_round_trip() {
        let node = LiteralNode::new(Literal::Vec2([1., -2.]));
        let mut json = JsonObject::new();
        node.write(&mut json);

        let mut restored = LiteralNode::default();
        restored.read(&json).unwrap();
        assert_eq!(restored, node);
        assert_eq!(json["value"]["type"], "vec2");
    }
}
