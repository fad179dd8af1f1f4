//! Vector splitter exposing each channel as an inline float.

use crate::shader::{
    build::PrepareCtx,
    graph::Error,
    node::{InputSpec, OutputSpec, ShaderNode},
    types::{fmt_float, widening_fill, GlslType, Literal, Scope, Stages},
    value,
};

const CHANNELS: [&str; 4] = ["x", "y", "z", "w"];

const INPUTS: &[InputSpec] = &[InputSpec {
    name: "vector",
    ty: GlslType::Vec4,
    stages: Stages::NONE,
    default: Literal::Vec4([0., 0., 0., 1.]),
}];

macro_rules! channel {
    ($name:literal) => {
        OutputSpec {
            name: $name,
            value_name: $name,
            ty: GlslType::Float,
            scope: Scope::Inline,
            stages: Stages::BOTH,
        }
    };
}

const OUTPUTS: &[OutputSpec] = &[channel!("x"), channel!("y"), channel!("z"), channel!("w")];

#[derive(Clone, Debug, Default, PartialEq)]
/// Splits a vector of up to four components into `x`, `y`, `z` and `w`. Missing channels read
/// as `0.0`, except `w` which reads as `1.0`.
pub struct SplitVec4Node;

impl SplitVec4Node {
    /// Registry class id.
    pub const CLASS_ID: &'static str = "split_vec4";
}

impl ShaderNode for SplitVec4Node {
    fn class_id(&self) -> &'static str {
        Self::CLASS_ID
    }

    fn name(&self) -> &'static str {
        "Split Vec4"
    }

    fn inputs(&self) -> &'static [InputSpec] {
        INPUTS
    }

    fn outputs(&self) -> &'static [OutputSpec] {
        OUTPUTS
    }

    fn prepare_to_build(&mut self, ctx: &mut PrepareCtx<'_>) -> Result<(), Error> {
        let input = ctx.input("vector")?;
        let stages = input.value().stages;

        let Some(arity) = input.ty().arity() else {
            return Err(value::Error::TypeCoercion {
                name: input.reference().to_owned(),
                from: input.ty(),
                to: GlslType::Vec4,
            }
            .into());
        };

        let constant = |x: f32| (fmt_float(x), Some(Literal::Float(x)));
        let components = input.value().literal.and_then(|literal| literal.components());

        let channels: Vec<(String, Option<Literal>)> = match components {
            Some(components) => (0..CHANNELS.len())
                .map(|index| {
                    constant(components.get(index).copied().unwrap_or(widening_fill(index)))
                })
                .collect(),
            None => CHANNELS
                .iter()
                .enumerate()
                .map(|(index, channel)| match (index < arity, arity) {
                    (true, 1) => (input.reference().to_owned(), None),
                    (true, _) => (format!("{}.{channel}", input.operand()), None),
                    (false, _) => constant(widening_fill(index)),
                })
                .collect(),
        };

        for (channel, (expression, literal)) in CHANNELS.iter().zip(channels) {
            let output = ctx.output_mut(channel)?;
            output.inline = expression;
            output.literal = literal;
            output.stages = stages;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::shader::{
        graph::Graph,
        nodes::{OutputNode, TextureNode},
        value::Value,
    };

    fn channels(input: Value) -> Vec<String> {
        let mut graph = Graph::default();
        let output = graph.add_node(OutputNode::default());
        let split = graph.add_node(SplitVec4Node);
        let input = graph.add_value(input);
        graph.set_input(split, "vector", input).unwrap();
        graph.connect(split, "x", output, "frag_color").unwrap();
        graph.set_root(output).unwrap();

        let mut graph = graph.validate().unwrap();
        graph.build().unwrap();

        CHANNELS
            .iter()
            .map(|channel| {
                let id = graph.output(split, channel).unwrap();
                graph.value(id).unwrap().inline.clone()
            })
            .collect()
    }

    #[test]
    fn scalar_channels() {
        let channels = channels(Value::inline("a", GlslType::Float, "a"));
        assert_eq!(channels, ["a", "0.0", "0.0", "1.0"]);
    }

    #[test]
    fn pair_channels() {
        let channels = channels(Value::inline("uv", GlslType::Vec2, "uv"));
        assert_eq!(channels, ["uv.x", "uv.y", "0.0", "1.0"]);
    }

    #[test]
    fn variable_channels() {
        let mut graph = Graph::default();
        let output = graph.add_node(OutputNode::default());
        let texture = graph.add_node(TextureNode::default());
        let split = graph.add_node(SplitVec4Node);
        graph.connect(texture, "color", split, "vector").unwrap();
        graph.connect(split, "w", output, "frag_color").unwrap();
        graph.set_root(output).unwrap();

        let mut graph = graph.validate().unwrap();
        let fragment = graph.build().unwrap().fragment.clone();

        // texture 1, split 2, output 3
        let x = graph.output(split, "x").unwrap();
        assert_eq!(graph.value(x).unwrap().inline, "texColor1.x");
        assert_eq!(graph.value(x).unwrap().stages, Stages::FRAGMENT);
        assert!(fragment.contains("fragColor = vec4(texColor1.w, 0.0, 0.0, 1.0);"));
    }

    #[test]
    fn channels_follow_input_stages() {
        let mut graph = Graph::default();
        let output = graph.add_node(OutputNode::default());
        let texture = graph.add_node(TextureNode::default());
        let split = graph.add_node(SplitVec4Node);
        graph.connect(texture, "color", split, "vector").unwrap();
        graph.connect(split, "x", output, "vert_position").unwrap();
        graph.set_root(output).unwrap();

        let mut graph = graph.validate().unwrap();
        assert!(matches!(
            graph.build(),
            Err(Error::MissingStageLinkage { .. })
        ));
    }
}
