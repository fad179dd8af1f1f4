//! Unlit color driven by an application uniform.
//!
//! Application uniforms:
//! - tint: vec4, scaled by a shading hint derived from the world normal
//!
//! Output: opaque, back faces culled.

use super::{
    utils::{set_root, wire},
    GraphResult,
};

use shadegraph::prelude::*;

use map_macro::hash_map;

pub fn graph() -> GraphResult {
    let mut graph = Graph::default();
    let tint = graph.add_value(Value::uniform("tint", GlslType::Vec4));

    let nodes = hash_map! {
        "vertex" => graph.add_node(VertexNode::default()),
        "camera" => graph.add_node(CameraDataNode::default()),
        "shade" => graph.add_node(OperationNode::new(
            "arg1 * vec4(0.5 + 0.5 * normalize(arg2.xyz), 1.0)",
            GlslType::Vec4,
        )),
        "output" => graph.add_node(OutputNode::default()),
    };

    wire(
        &mut graph,
        &nodes,
        &[
            ("vertex", "position", "camera", "vertex_position"),
            ("vertex", "normal", "shade", "arg2"),
            ("camera", "clip_position", "output", "vert_position"),
            ("shade", "result", "output", "frag_color"),
        ],
    )?;
    graph.set_input(nodes["shade"], "arg1", tint)?;
    set_root(&mut graph, &nodes, "output")?;

    Ok(graph)
}
