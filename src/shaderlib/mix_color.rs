//! Mix two textures together by a factor.
//!
//! Application uniforms:
//! - factor: float, used in `mix(left, right, factor)`
//!
//! Output: alpha clipped at [DEFAULT_CUTOFF].

use super::{
    utils::{set_root, wire},
    GraphResult,
};

use shadegraph::prelude::*;

use map_macro::hash_map;

pub const DEFAULT_CUTOFF: f32 = 0.5;

pub fn graph() -> GraphResult {
    let mut graph = Graph::default();
    let factor = graph.add_value(Value::uniform("factor", GlslType::Float));

    let nodes = hash_map! {
        "vertex" => graph.add_node(VertexNode::default()),
        "camera" => graph.add_node(CameraDataNode::default()),
        "left" => graph.add_node(TextureNode::default()),
        "right" => graph.add_node(TextureNode::default()),
        "mix" => graph.add_node(OperationNode::new("mix(arg1, arg2, arg3)", GlslType::Vec4)),
        "output" => graph.add_node(OutputNode {
            alpha_mode: AlphaMode::Mask,
            alpha_cutoff: DEFAULT_CUTOFF,
            ..Default::default()
        }),
    };

    wire(
        &mut graph,
        &nodes,
        &[
            ("vertex", "position", "camera", "vertex_position"),
            ("left", "color", "mix", "arg1"),
            ("right", "color", "mix", "arg2"),
            ("camera", "clip_position", "output", "vert_position"),
            ("mix", "result", "output", "frag_color"),
        ],
    )?;
    graph.set_input(nodes["mix"], "arg3", factor)?;
    set_root(&mut graph, &nodes, "output")?;

    Ok(graph)
}
