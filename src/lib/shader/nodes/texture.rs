//! Texture sampling node.

use crate::{
    scene::Mesh,
    shader::{
        binding::{BindCtx, TextureHandle, Uniform},
        build::{require_sampler, EmitCtx, PrepareCtx},
        graph::Error,
        json::{JsonExt, JsonObject},
        node::{CodeBuffer, InputSpec, OutputSpec, ShaderNode},
        types::{GlslType, Literal, Scope, Stage, Stages},
        value::Code,
    },
};

const INPUTS: &[InputSpec] = &[InputSpec {
    name: "uv",
    ty: GlslType::Vec3,
    stages: Stages::FRAGMENT,
    default: Literal::Vec2([0., 0.]),
}];

const OUTPUTS: &[OutputSpec] = &[
    OutputSpec {
        name: "sampler",
        value_name: "tex",
        ty: GlslType::Sampler2D,
        scope: Scope::GlobalUniform,
        stages: Stages::FRAGMENT,
    },
    OutputSpec {
        name: "color",
        value_name: "texColor",
        ty: GlslType::Vec4,
        scope: Scope::Local,
        stages: Stages::FRAGMENT,
    },
    OutputSpec {
        name: "alpha",
        value_name: "texAlpha",
        ty: GlslType::Float,
        scope: Scope::Inline,
        stages: Stages::FRAGMENT,
    },
];

#[derive(Clone, Debug, PartialEq)]
/// Samples a texture bound by the application at `uv`.
pub struct TextureNode {
    /// Convert the sampled color from sRGB to linear.
    pub srgb: bool,
    /// Sampler type, which decides how many coordinates are read.
    pub texture_type: GlslType,
    /// Texture bound while drawing meshes.
    pub texture: Option<TextureHandle>,
}

impl Default for TextureNode {
    fn default() -> Self {
        Self {
            srgb: false,
            texture_type: GlslType::Sampler2D,
            texture: None,
        }
    }
}

impl TextureNode {
    /// Registry class id.
    pub const CLASS_ID: &'static str = "texture";

    fn sampled(ctx: &EmitCtx<'_>) -> bool {
        ["sampler", "color", "alpha"]
            .into_iter()
            .any(|output| ctx.is_used(output))
    }

    fn coordinates(&self, uv: &Code<'_>) -> Result<String, Error> {
        let target = match self.texture_type {
            GlslType::Sampler1D => GlslType::Float,
            GlslType::Sampler2D => GlslType::Vec2,
            _ => GlslType::Vec3,
        };

        Ok(match (uv.ty().arity(), target.arity()) {
            (Some(from), Some(to)) if from > to => {
                format!("{}.{}", uv.operand(), &"xyz"[..to])
            }
            _ => uv.widened(target)?,
        })
    }
}

impl ShaderNode for TextureNode {
    fn class_id(&self) -> &'static str {
        Self::CLASS_ID
    }

    fn name(&self) -> &'static str {
        "Texture"
    }

    fn inputs(&self) -> &'static [InputSpec] {
        INPUTS
    }

    fn outputs(&self) -> &'static [OutputSpec] {
        OUTPUTS
    }

    fn output_type(&self, output: &OutputSpec) -> GlslType {
        match output.name {
            "sampler" => self.texture_type,
            _ => output.ty,
        }
    }

    fn prepare_to_build(&mut self, ctx: &mut PrepareCtx<'_>) -> Result<(), Error> {
        require_sampler(Self::CLASS_ID, self.texture_type)?;

        let color = ctx.output("color")?.reference().to_owned();
        ctx.output_mut("alpha")?.inline = format!("{color}.a");
        Ok(())
    }

    fn declaration_vertex(&self, _ctx: &EmitCtx<'_>, _out: &mut CodeBuffer) -> Result<(), Error> {
        Ok(())
    }

    fn declaration_fragment(&self, ctx: &EmitCtx<'_>, out: &mut CodeBuffer) -> Result<(), Error> {
        if Self::sampled(ctx) {
            ctx.declare("sampler", Stage::Fragment, out)?;
            ctx.declare("color", Stage::Fragment, out)?;
        }
        Ok(())
    }

    fn execution_fragment(&self, ctx: &EmitCtx<'_>, out: &mut CodeBuffer) -> Result<(), Error> {
        if !Self::sampled(ctx) {
            return Ok(());
        }

        let color = ctx.output("color")?;
        let color = color.reference();
        out.line(format!(
            "{color} = {}({}, {});",
            ctx.config().texture_function(self.texture_type),
            ctx.output("sampler")?.reference(),
            self.coordinates(&ctx.input("uv")?)?
        ));
        if self.srgb {
            out.line(format!("{color}.rgb = pow({color}.rgb, vec3(2.2));"));
        }
        Ok(())
    }

    fn prepare_to_draw_mesh(&mut self, ctx: &mut BindCtx<'_>, _mesh: &Mesh) -> Result<(), Error> {
        if !["sampler", "color", "alpha"]
            .into_iter()
            .any(|output| ctx.is_used(output))
        {
            return Ok(());
        }

        let unit = ctx.next_texture_unit();
        ctx.set_output("sampler", Uniform::Int(unit as i32))?;
        if let Some(texture) = self.texture {
            ctx.bind_texture(unit, texture);
        }
        Ok(())
    }

    fn read(&mut self, json: &JsonObject) -> Result<(), Error> {
        self.srgb = json.bool_or("sRGB", self.srgb);
        if let Some(texture_type) = json.parse("textureType")? {
            require_sampler(Self::CLASS_ID, texture_type)?;
            self.texture_type = texture_type;
        }
        Ok(())
    }

    fn write(&self, json: &mut JsonObject) {
        json.put("sRGB", self.srgb);
        json.put("textureType", self.texture_type);
    }
}
