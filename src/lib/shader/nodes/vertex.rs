//! Mesh attributes transformed to world space, with optional skinning.

use crate::{
    scene::Object,
    shader::{
        binding::{BindCtx, Uniform},
        build::EmitCtx,
        graph::Error,
        json::{JsonExt, JsonObject},
        node::{CodeBuffer, OutputSpec, ShaderNode},
        types::{GlslType, Scope, Stage, Stages},
    },
};

const OUTPUTS: &[OutputSpec] = &[
    OutputSpec {
        name: "position",
        value_name: "worldPosition",
        ty: GlslType::Vec3,
        scope: Scope::VaryingOut,
        stages: Stages::BOTH,
    },
    OutputSpec {
        name: "normal",
        value_name: "worldNormal",
        ty: GlslType::Vec3,
        scope: Scope::VaryingOut,
        stages: Stages::BOTH,
    },
];

const JOINTS: &str = "JOINTS_0";
const WEIGHTS: &str = "WEIGHTS_0";

#[derive(Clone, Debug, PartialEq)]
/// Reads the position and normal attributes and moves them to world space.
pub struct VertexNode {
    /// Size of the bone matrix array, `0` disables skinning.
    pub max_bones: i32,
    /// Position attribute name.
    pub position_name: String,
    /// Normal attribute name.
    pub normal_name: String,
}

impl Default for VertexNode {
    fn default() -> Self {
        Self {
            max_bones: 0,
            position_name: "POSITION".to_owned(),
            normal_name: "NORMAL".to_owned(),
        }
    }
}

impl VertexNode {
    /// Registry class id.
    pub const CLASS_ID: &'static str = "vertex";

    fn skinned(&self) -> bool {
        self.max_bones > 0
    }
}

impl ShaderNode for VertexNode {
    fn class_id(&self) -> &'static str {
        Self::CLASS_ID
    }

    fn name(&self) -> &'static str {
        "Vertex"
    }

    fn outputs(&self) -> &'static [OutputSpec] {
        OUTPUTS
    }

    fn declaration_vertex(&self, ctx: &EmitCtx<'_>, out: &mut CodeBuffer) -> Result<(), Error> {
        let uid = ctx.uid();
        let attribute = Scope::Attribute
            .qualifier(Stage::Vertex, ctx.config().is_modern())
            .unwrap_or_default();

        out.line(format!("{attribute} vec3 {};", self.position_name))
            .line(format!("{attribute} vec3 {};", self.normal_name))
            .line(format!("uniform mat4 uWorldMatrix{uid};"));

        if self.skinned() {
            out.line(format!("{attribute} vec4 {JOINTS};"))
                .line(format!("{attribute} vec4 {WEIGHTS};"))
                .line(format!("uniform mat4 uBoneMatrices{uid}[{}];", self.max_bones))
                .line(format!("uniform bool uUseBones{uid};"));
        }

        ctx.declare_outputs(Stage::Vertex, out)
    }

    fn execution_vertex(&self, ctx: &EmitCtx<'_>, out: &mut CodeBuffer) -> Result<(), Error> {
        let uid = ctx.uid();
        let model = format!("model{uid}");
        out.line(format!("mat4 {model} = uWorldMatrix{uid};"));

        if self.skinned() {
            let bone = |channel: char| {
                format!("{WEIGHTS}.{channel} * uBoneMatrices{uid}[int({JOINTS}.{channel})]")
            };
            out.open(format!("if (uUseBones{uid})"))
                .line(format!(
                    "{model} = {model} * ({});",
                    ['x', 'y', 'z', 'w'].map(bone).join(" + ")
                ))
                .close();
        }

        if ctx.is_used("position") {
            out.line(format!(
                "{} = ({model} * vec4({}, 1.0)).xyz;",
                ctx.output("position")?.reference(),
                self.position_name
            ));
        }
        if ctx.is_used("normal") {
            out.line(format!(
                "{} = normalize(({model} * vec4({}, 0.0)).xyz);",
                ctx.output("normal")?.reference(),
                self.normal_name
            ));
        }

        Ok(())
    }

    fn prepare_object_data(&mut self, ctx: &mut BindCtx<'_>, object: &Object) -> Result<(), Error> {
        let uid = ctx.uid();
        ctx.set_uniform(format!("uWorldMatrix{uid}"), Uniform::Mat4(object.world));

        if self.skinned() {
            let capacity = usize::try_from(self.max_bones).unwrap_or_default();
            ctx.set_uniform(
                format!("uUseBones{uid}"),
                Uniform::Bool(!object.bones.is_empty()),
            );
            if !object.bones.is_empty() {
                let bones = object.bones.iter().take(capacity).copied().collect();
                ctx.set_uniform(format!("uBoneMatrices{uid}"), Uniform::Mat4Array(bones));
            }
        }

        Ok(())
    }

    fn read(&mut self, json: &JsonObject) -> Result<(), Error> {
        self.max_bones = json.int_or("maxBones", self.max_bones).max(0);
        self.position_name = json.string_or("positionName", &self.position_name);
        self.normal_name = json.string_or("normalName", &self.normal_name);
        Ok(())
    }

    fn write(&self, json: &mut JsonObject) {
        json.put("maxBones", self.max_bones);
        json.put("positionName", &self.position_name);
        json.put("normalName", &self.normal_name);
    }
}
