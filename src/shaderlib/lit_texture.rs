//! Textured surface lit by the scene lights.
//!
//! The base color texture is read in sRGB and sampled at the world position's `xz` plane, which
//! keeps the graph independent from UV attributes.
//!
//! Output: alpha blended, far fragments faded out.

use super::{
    utils::{set_root, wire},
    GraphResult,
};

use shadegraph::prelude::*;

use map_macro::hash_map;

pub fn graph() -> GraphResult {
    let mut graph = Graph::default();

    let nodes = hash_map! {
        "vertex" => graph.add_node(VertexNode::default()),
        "camera" => graph.add_node(CameraDataNode::default()),
        "uv" => graph.add_node(OperationNode::new("arg1.xz", GlslType::Vec2)),
        "albedo" => graph.add_node(TextureNode {
            srgb: true,
            ..Default::default()
        }),
        "lighting" => graph.add_node(LightingNode::default()),
        "output" => graph.add_node(OutputNode {
            alpha_mode: AlphaMode::Blend,
            fade: true,
            ..Default::default()
        }),
    };

    wire(
        &mut graph,
        &nodes,
        &[
            ("vertex", "position", "camera", "vertex_position"),
            ("vertex", "position", "uv", "arg1"),
            ("uv", "result", "albedo", "uv"),
            ("albedo", "color", "lighting", "base_color"),
            ("vertex", "normal", "lighting", "normal"),
            ("vertex", "position", "lighting", "world_position"),
            ("camera", "view_vector", "lighting", "view_vector"),
            ("camera", "clip_position", "output", "vert_position"),
            ("lighting", "result", "output", "frag_color"),
        ],
    )?;
    set_root(&mut graph, &nodes, "output")?;

    Ok(graph)
}
