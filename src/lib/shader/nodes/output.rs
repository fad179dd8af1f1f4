//! Terminal node writing the clip-space position and the fragment color.

use crate::{
    scene::{Mesh, Scene},
    shader::{
        binding::{BindCtx, CullFace, RenderState, Uniform},
        build::EmitCtx,
        graph::Error,
        json::{JsonExt, JsonObject},
        node::{CodeBuffer, InputSpec, ShaderNode},
        types::{fmt_float, GlslType, Literal, Scope, Stage, Stages},
    },
};

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
/// How the fragment alpha is used.
pub enum AlphaMode {
    #[default]
    /// Alpha is ignored.
    Opaque,
    /// Fragments below the cutoff are discarded, the others are opaque.
    Mask,
    /// Alpha blending.
    Blend,
}

const INPUTS: &[InputSpec] = &[
    InputSpec {
        name: "vert_position",
        ty: GlslType::Vec4,
        stages: Stages::VERTEX,
        default: Literal::Vec4([0., 0., 0., 1.]),
    },
    InputSpec {
        name: "frag_color",
        ty: GlslType::Vec4,
        stages: Stages::FRAGMENT,
        default: Literal::Float(1.),
    },
];

#[derive(Clone, Debug, PartialEq)]
/// Writes `gl_Position` and the fragment color; usually the graph root.
pub struct OutputNode {
    /// Alpha handling.
    pub alpha_mode: AlphaMode,
    /// Discard threshold of [AlphaMode::Mask].
    pub alpha_cutoff: f32,
    /// Culled faces, [None] to draw both sides.
    pub cull_face: Option<CullFace>,
    /// Fade fragments out near the far plane.
    pub fade: bool,
    /// Fraction of the far distance where fading starts.
    pub fade_start: f32,
}

impl Default for OutputNode {
    fn default() -> Self {
        Self {
            alpha_mode: AlphaMode::Opaque,
            alpha_cutoff: 0.5,
            cull_face: Some(CullFace::Back),
            fade: false,
            fade_start: 0.8,
        }
    }
}

impl OutputNode {
    /// Registry class id.
    pub const CLASS_ID: &'static str = "output";

    fn fades(&self) -> bool {
        self.fade && (0. ..1.).contains(&self.fade_start)
    }
}

impl ShaderNode for OutputNode {
    fn class_id(&self) -> &'static str {
        Self::CLASS_ID
    }

    fn name(&self) -> &'static str {
        "Output"
    }

    fn inputs(&self) -> &'static [InputSpec] {
        INPUTS
    }

    fn declaration_vertex(&self, ctx: &EmitCtx<'_>, out: &mut CodeBuffer) -> Result<(), Error> {
        if self.fades() {
            let varying = Scope::VaryingOut
                .qualifier(Stage::Vertex, ctx.config().is_modern())
                .unwrap_or_default();
            out.line(format!("{varying} float depthForFade{};", ctx.uid()));
        }
        Ok(())
    }

    fn declaration_fragment(&self, ctx: &EmitCtx<'_>, out: &mut CodeBuffer) -> Result<(), Error> {
        if self.fades() {
            let uid = ctx.uid();
            let varying = Scope::VaryingOut
                .qualifier(Stage::Fragment, ctx.config().is_modern())
                .unwrap_or_default();
            out.line(format!("{varying} float depthForFade{uid};"))
                .line(format!("uniform float fadeStart{uid};"))
                .line(format!("uniform float fadeMul{uid};"));
        }
        Ok(())
    }

    fn execution_vertex(&self, ctx: &EmitCtx<'_>, out: &mut CodeBuffer) -> Result<(), Error> {
        out.line(format!(
            "gl_Position = {};",
            ctx.input("vert_position")?.as_vec4()?
        ));
        if self.fades() {
            out.line(format!("depthForFade{} = gl_Position.w;", ctx.uid()));
        }
        Ok(())
    }

    fn execution_fragment(&self, ctx: &EmitCtx<'_>, out: &mut CodeBuffer) -> Result<(), Error> {
        let color = ctx.config().frag_color();
        out.line(format!("{color} = {};", ctx.input("frag_color")?.as_vec4()?));

        if self.alpha_mode == AlphaMode::Mask {
            out.open(format!(
                "if ({color}.a < 0.001 || {color}.a < {})",
                fmt_float(self.alpha_cutoff)
            ))
            .line("discard;")
            .close();
            out.line(format!("{color}.a = 1.0;"));
        }

        if self.fades() {
            let uid = ctx.uid();
            out.line(format!(
                "{color}.a *= clamp(1.0 - (depthForFade{uid} - fadeStart{uid}) * fadeMul{uid}, 0.0, 1.0);"
            ));
        }
        Ok(())
    }

    fn prepare_to_draw_scene(&mut self, ctx: &mut BindCtx<'_>, scene: &Scene) -> Result<(), Error> {
        if !self.fades() {
            return Ok(());
        }

        let uid = ctx.uid();
        let far = scene.camera.far;
        let start = far * self.fade_start;
        ctx.set_uniform_if_changed(format!("fadeStart{uid}"), Uniform::Float(start));
        ctx.set_uniform_if_changed(format!("fadeMul{uid}"), Uniform::Float(1. / (far - start)));

        Ok(())
    }

    fn prepare_to_draw_mesh(&mut self, ctx: &mut BindCtx<'_>, mesh: &Mesh) -> Result<(), Error> {
        let alpha_mode = mesh.alpha_mode.unwrap_or(self.alpha_mode);
        ctx.set_render_state(
            RenderState::Blend,
            alpha_mode == AlphaMode::Blend || self.fades(),
        );

        match self.cull_face {
            Some(face) => ctx.set_render_state(RenderState::CullFace(face), true),
            None => ctx.set_render_state(RenderState::CullFace(CullFace::Back), false),
        }

        Ok(())
    }

    fn read(&mut self, json: &JsonObject) -> Result<(), Error> {
        if let Some(alpha_mode) = json.parse("alphaMode")? {
            self.alpha_mode = alpha_mode;
        }
        if let Some(cull_face) = json.parse("cullFace")? {
            self.cull_face = cull_face;
        }
        self.alpha_cutoff = json.float_or("alphaCutoff", self.alpha_cutoff);
        self.fade = json.bool_or("fade", self.fade);
        self.fade_start = json.float_or("fadeStart", self.fade_start);
        Ok(())
    }

    fn write(&self, json: &mut JsonObject) {
        json.put("alphaMode", self.alpha_mode);
        json.put("alphaCutoff", self.alpha_cutoff);
        json.put("cullFace", self.cull_face);
        json.put("fade", self.fade);
        json.put("fadeStart", self.fade_start);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        camera::Camera,
        shader::{
            binding::RecordingSink,
            graph::{Graph, Validated},
            program::ProgramConfig,
        },
    };
    use float_eq::assert_float_eq;

    fn single(node: OutputNode, config: ProgramConfig) -> Graph<Validated> {
        let mut graph = Graph::new(config);
        let output = graph.add_node(node);
        graph.set_root(output).unwrap();
        graph.validate().unwrap()
    }

    #[test]
    fn config_round_trip() {
        let node = OutputNode {
            alpha_mode: AlphaMode::Blend,
            alpha_cutoff: 0.3,
            cull_face: None,
            fade: true,
            fade_start: 0.9,
        };
        let mut json = JsonObject::new();
        node.write(&mut json);

        let mut restored = OutputNode::default();
        restored.read(&json).unwrap();

        assert_eq!(restored.alpha_mode, AlphaMode::Blend);
        assert_eq!(restored.cull_face, None);
        assert!(restored.fade);
        assert_float_eq!(restored.alpha_cutoff, 0.3, abs <= f32::EPSILON);
        assert_float_eq!(restored.fade_start, 0.9, abs <= f32::EPSILON);
        assert_eq!(json["alphaMode"], "BLEND");
    }

    #[test]
    fn legacy_fragment_color() {
        let mut graph = single(OutputNode::default(), ProgramConfig::legacy());
        let source = graph.build().unwrap();

        assert!(source
            .fragment
            .contains("gl_FragColor = vec4(1.0, 0.0, 0.0, 1.0);"));
        assert!(source
            .vertex
            .contains("gl_Position = vec4(0.0, 0.0, 0.0, 1.0);"));
        assert!(!source.fragment.contains("discard"));
    }

    #[test]
    fn far_plane_fade() {
        let mut graph = single(
            OutputNode {
                fade: true,
                ..Default::default()
            },
            ProgramConfig::default(),
        );
        let source = graph.build().unwrap().clone();
        assert!(source.vertex.contains("out float depthForFade1;"));
        assert!(source.vertex.contains("depthForFade1 = gl_Position.w;"));
        assert!(source.fragment.contains("in float depthForFade1;"));
        assert!(source.fragment.contains("uniform float fadeMul1;"));

        let scene = Scene::new(Camera {
            far: 50.,
            ..Default::default()
        });
        let mut sink = RecordingSink::default();
        graph.prepare_to_draw_scene(&scene, &mut sink).unwrap();

        let Some(Uniform::Float(start)) = sink.uniforms.get("fadeStart1") else {
            panic!("fade start not pushed: {sink:?}");
        };
        let Some(Uniform::Float(mul)) = sink.uniforms.get("fadeMul1") else {
            panic!("fade multiplier not pushed: {sink:?}");
        };
        assert_float_eq!(*start, 40., abs <= 1e-4);
        assert_float_eq!(*mul, 0.1, abs <= 1e-6);

        // Unchanged far plane: nothing pushed again.
        let mut sink = RecordingSink::default();
        graph.prepare_to_draw_scene(&scene, &mut sink).unwrap();
        assert!(sink.uniforms.is_empty());
    }

    #[test]
    fn fade_pushed_again_after_far_plane_change_or_rebuild() {
        let mut graph = single(
            OutputNode {
                fade: true,
                fade_start: 0.5,
                ..Default::default()
            },
            ProgramConfig::default(),
        );
        graph.build().unwrap();

        let mut near = Scene::new(Camera {
            far: 10.,
            ..Default::default()
        });
        let mut sink = RecordingSink::default();
        graph.prepare_to_draw_scene(&near, &mut sink).unwrap();
        assert_eq!(sink.uniforms.len(), 2);

        near.camera.far = 20.;
        let mut sink = RecordingSink::default();
        graph.prepare_to_draw_scene(&near, &mut sink).unwrap();
        let Some(Uniform::Float(start)) = sink.uniforms.get("fadeStart1") else {
            panic!("fade start not pushed: {sink:?}");
        };
        assert_float_eq!(*start, 10., abs <= 1e-4);

        // A new program starts with unset uniforms.
        graph.build().unwrap();
        let mut sink = RecordingSink::default();
        graph.prepare_to_draw_scene(&near, &mut sink).unwrap();
        assert_eq!(sink.uniforms.len(), 2);
    }

    #[test]
    fn culling_state() {
        let mut graph = single(
            OutputNode {
                cull_face: None,
                ..Default::default()
            },
            ProgramConfig::default(),
        );
        graph.build().unwrap();

        let mut sink = RecordingSink::default();
        graph.prepare_to_draw_mesh(&Mesh::default(), &mut sink).unwrap();

        assert_eq!(
            sink.states,
            vec![
                (RenderState::Blend, false),
                (RenderState::CullFace(CullFace::Back), false)
            ]
        );
    }
}
