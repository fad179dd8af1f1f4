//! Camera derived data: clip-space position, view vector and view depth.

use crate::{
    scene::Scene,
    shader::{
        binding::{BindCtx, Uniform},
        build::EmitCtx,
        graph::Error,
        json::{JsonExt, JsonObject},
        node::{CodeBuffer, InputSpec, OutputSpec, ShaderNode},
        types::{GlslType, Literal, Scope, Stage, Stages},
    },
};

const INPUTS: &[InputSpec] = &[InputSpec {
    name: "vertex_position",
    ty: GlslType::Vec3,
    stages: Stages::VERTEX,
    default: Literal::Vec3([0., 0., 0.]),
}];

const OUTPUTS: &[OutputSpec] = &[
    OutputSpec {
        name: "clip_position",
        value_name: "clipSpacePosition",
        ty: GlslType::Vec4,
        scope: Scope::VaryingOut,
        stages: Stages::BOTH,
    },
    OutputSpec {
        name: "view_vector",
        value_name: "normalizedViewVector",
        ty: GlslType::Vec3,
        scope: Scope::VaryingOut,
        stages: Stages::BOTH,
    },
    OutputSpec {
        name: "view_depth",
        value_name: "viewZDepth",
        ty: GlslType::Float,
        scope: Scope::VaryingOut,
        stages: Stages::BOTH,
    },
    OutputSpec {
        name: "camera_position",
        value_name: "cameraPosition",
        ty: GlslType::Vec3,
        scope: Scope::GlobalUniform,
        stages: Stages::BOTH,
    },
    OutputSpec {
        name: "view_projection",
        value_name: "viewProjectionMatrix",
        ty: GlslType::Mat4,
        scope: Scope::GlobalUniform,
        stages: Stages::BOTH,
    },
];

/// Which uniforms and intermediates the used outputs depend on.
#[derive(Clone, Copy, Debug)]
struct Needs {
    clip: bool,
    view_projection: bool,
    camera_position: bool,
}

impl Needs {
    fn new(is_used: impl Fn(&str) -> bool) -> Self {
        let clip = is_used("clip_position") || is_used("view_depth");
        Self {
            clip,
            view_projection: clip || is_used("view_projection"),
            camera_position: is_used("camera_position") || is_used("view_vector"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
/// Projects a world-space position with the scene camera.
pub struct CameraDataNode {
    /// Offset positions by a per-instance attribute.
    pub use_instance_position: bool,
    /// Per-instance offset attribute name.
    pub instance_position_name: String,
}

impl Default for CameraDataNode {
    fn default() -> Self {
        Self {
            use_instance_position: false,
            instance_position_name: "INSTANCE_POSITION".to_owned(),
        }
    }
}

impl CameraDataNode {
    /// Registry class id.
    pub const CLASS_ID: &'static str = "camera";
}

impl ShaderNode for CameraDataNode {
    fn class_id(&self) -> &'static str {
        Self::CLASS_ID
    }

    fn name(&self) -> &'static str {
        "Camera Data"
    }

    fn inputs(&self) -> &'static [InputSpec] {
        INPUTS
    }

    fn outputs(&self) -> &'static [OutputSpec] {
        OUTPUTS
    }

    fn declaration_vertex(&self, ctx: &EmitCtx<'_>, out: &mut CodeBuffer) -> Result<(), Error> {
        let needs = Needs::new(|name| ctx.is_used(name));

        if self.use_instance_position {
            let attribute = Scope::Attribute
                .qualifier(Stage::Vertex, ctx.config().is_modern())
                .unwrap_or_default();
            out.line(format!("{attribute} vec3 {};", self.instance_position_name));
        }
        if needs.view_projection {
            ctx.declare("view_projection", Stage::Vertex, out)?;
        }
        if needs.camera_position {
            ctx.declare("camera_position", Stage::Vertex, out)?;
        }
        for varying in ["clip_position", "view_vector", "view_depth"] {
            if ctx.is_used(varying) {
                ctx.declare(varying, Stage::Vertex, out)?;
            }
        }
        Ok(())
    }

    fn execution_vertex(&self, ctx: &EmitCtx<'_>, out: &mut CodeBuffer) -> Result<(), Error> {
        let needs = Needs::new(|name| ctx.is_used(name));

        let mut position = ctx.input("vertex_position")?.as_vec3()?;
        if self.use_instance_position {
            position = format!("({position} + {})", self.instance_position_name);
        }

        if needs.clip {
            let projected = format!(
                "{} * vec4({position}, 1.0)",
                ctx.output("view_projection")?.reference()
            );
            let clip = ctx.output("clip_position")?;

            let clip = if ctx.is_used("clip_position") {
                out.line(format!("{} = {projected};", clip.reference()));
                clip.reference().to_owned()
            } else {
                format!("({projected})")
            };
            if ctx.is_used("view_depth") {
                out.line(format!(
                    "{} = {clip}.w;",
                    ctx.output("view_depth")?.reference()
                ));
            }
        }

        if ctx.is_used("view_vector") {
            out.line(format!(
                "{} = normalize({} - {position});",
                ctx.output("view_vector")?.reference(),
                ctx.output("camera_position")?.reference()
            ));
        }

        Ok(())
    }

    fn prepare_to_draw_scene(&mut self, ctx: &mut BindCtx<'_>, scene: &Scene) -> Result<(), Error> {
        let needs = Needs::new(|name| ctx.is_used(name));

        if needs.view_projection {
            ctx.set_output(
                "view_projection",
                Uniform::Mat4(scene.camera.view_projection()),
            )?;
        }
        if needs.camera_position {
            ctx.set_output("camera_position", Uniform::Vec3(scene.camera.position))?;
        }
        Ok(())
    }

    fn read(&mut self, json: &JsonObject) -> Result<(), Error> {
        self.use_instance_position = json.bool_or("useInstancePosition", self.use_instance_position);
        self.instance_position_name =
            json.string_or("instancePositionName", &self.instance_position_name);
        Ok(())
    }

    fn write(&self, json: &mut JsonObject) {
        json.put("useInstancePosition", self.use_instance_position);
        json.put("instancePositionName", &self.instance_position_name);
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
            nodes::{OutputNode, VertexNode},
        },
    };

    fn projected(camera: CameraDataNode, output: &str, slot: &str) -> Graph<Validated> {
        let mut graph = Graph::default();
        let root = graph.add_node(OutputNode::default());
        let vertex = graph.add_node(VertexNode::default());
        let node = graph.add_node(camera);
        graph.connect(vertex, "position", node, "vertex_position").unwrap();
        graph.connect(node, output, root, slot).unwrap();
        graph.set_root(root).unwrap();
        graph.validate().unwrap()
    }

    #[test]
    fn depth_without_clip_position() {
        let mut graph = projected(CameraDataNode::default(), "view_depth", "frag_color");
        let source = graph.build().unwrap().clone();

        // vertex 1, camera 2, output 3
        assert!(source.vertex.contains("uniform mat4 viewProjectionMatrix2;"));
        assert!(source
            .vertex
            .contains("viewZDepth2 = (viewProjectionMatrix2 * vec4(worldPosition1, 1.0)).w;"));
        assert!(!source.vertex.contains("clipSpacePosition2"));
        assert!(!source.vertex.contains("cameraPosition2"));
        assert!(source.fragment.contains("in float viewZDepth2;"));
    }

    #[test]
    fn view_vector_needs_camera_position() {
        let mut graph = projected(CameraDataNode::default(), "view_vector", "frag_color");
        let vertex = graph.build().unwrap().vertex.clone();

        assert!(vertex.contains("uniform vec3 cameraPosition2;"));
        assert!(vertex.contains("normalizedViewVector2 = normalize(cameraPosition2 - worldPosition1);"));
        assert!(!vertex.contains("viewProjectionMatrix2"));

        let scene = Scene::new(Camera::perspective([1., 2., 3.], 1., 1., 0.1, 10.));
        let mut sink = RecordingSink::default();
        graph.prepare_to_draw_scene(&scene, &mut sink).unwrap();

        assert_eq!(
            sink.uniforms.get("cameraPosition2"),
            Some(&Uniform::Vec3([1., 2., 3.]))
        );
        assert_eq!(sink.uniforms.get("viewProjectionMatrix2"), None);
    }

    #[test]
    fn instance_offset() {
        let camera = CameraDataNode {
            use_instance_position: true,
            ..Default::default()
        };
        let mut graph = projected(camera, "clip_position", "vert_position");
        let vertex = graph.build().unwrap().vertex.clone();

        assert!(vertex.contains("in vec3 INSTANCE_POSITION;"));
        assert!(vertex.contains(
            "clipSpacePosition2 = viewProjectionMatrix2 * vec4((worldPosition1 + INSTANCE_POSITION), 1.0);"
        ));
    }

    #[test]
    fn config_round_trip() {
        let node = CameraDataNode {
            use_instance_position: true,
            instance_position_name: "aOffset".to_owned(),
        };
        let mut json = JsonObject::new();
        node.write(&mut json);

        let mut restored = CameraDataNode::default();
        restored.read(&json).unwrap();
        assert_eq!(restored, node);
    }
}
