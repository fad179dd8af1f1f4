//! Blinn-Phong lighting over the scene's enabled lights.

use crate::{
    scene::Scene,
    shader::{
        binding::{BindCtx, Uniform},
        build::{EmitCtx, PrepareCtx},
        graph::Error,
        json::{JsonExt, JsonObject},
        node::{CodeBuffer, InputSpec, OutputSpec, ShaderNode},
        types::{fmt_float, GlslType, Literal, Scope, Stage, Stages},
    },
};

const INPUTS: &[InputSpec] = &[
    InputSpec {
        name: "base_color",
        ty: GlslType::Vec4,
        stages: Stages::FRAGMENT,
        default: Literal::Vec4([1., 1., 1., 1.]),
    },
    InputSpec {
        name: "normal",
        ty: GlslType::Vec3,
        stages: Stages::FRAGMENT,
        default: Literal::Vec3([0., 0., 1.]),
    },
    InputSpec {
        name: "world_position",
        ty: GlslType::Vec3,
        stages: Stages::FRAGMENT,
        default: Literal::Vec3([0., 0., 0.]),
    },
    InputSpec {
        name: "view_vector",
        ty: GlslType::Vec3,
        stages: Stages::FRAGMENT,
        default: Literal::Vec3([0., 0., 1.]),
    },
];

const OUTPUTS: &[OutputSpec] = &[OutputSpec {
    name: "result",
    value_name: "result",
    ty: GlslType::Vec4,
    scope: Scope::Local,
    stages: Stages::FRAGMENT,
}];

/// Per-light uniform arrays: base name and element type.
const LIGHT_ARRAYS: [(&str, GlslType); 6] = [
    ("uLightColor", GlslType::Vec3),
    ("uLightPosition", GlslType::Vec3),
    ("uLightDirection", GlslType::Vec3),
    ("uLightIntensity", GlslType::Float),
    ("uLightRange", GlslType::Float),
    ("uLightType", GlslType::Int),
];

#[derive(Clone, Debug, PartialEq)]
/// Lights `base_color` with every enabled light of the scene, up to `max_lights`.
pub struct LightingNode {
    /// Size of the light uniform arrays.
    pub max_lights: i32,
    /// Specular exponent.
    pub specular_power: f32,
    /// Specular contribution factor.
    pub specular_strength: f32,
}

impl Default for LightingNode {
    fn default() -> Self {
        Self {
            max_lights: 4,
            specular_power: 32.,
            specular_strength: 0.5,
        }
    }
}

impl LightingNode {
    /// Registry class id.
    pub const CLASS_ID: &'static str = "lighting";

    fn light_slots(&self) -> usize {
        usize::try_from(self.max_lights).unwrap_or_default()
    }
}

fn check_capacity(max_lights: i32) -> Result<(), Error> {
    if max_lights < 1 {
        return Err(Error::InvalidConfig {
            node: LightingNode::CLASS_ID,
            reason: format!("at least one light is required, got {max_lights}"),
        });
    }
    Ok(())
}

impl ShaderNode for LightingNode {
    fn class_id(&self) -> &'static str {
        Self::CLASS_ID
    }

    fn name(&self) -> &'static str {
        "Lighting"
    }

    fn inputs(&self) -> &'static [InputSpec] {
        INPUTS
    }

    fn outputs(&self) -> &'static [OutputSpec] {
        OUTPUTS
    }

    fn prepare_to_build(&mut self, _ctx: &mut PrepareCtx<'_>) -> Result<(), Error> {
        check_capacity(self.max_lights)
    }

    fn declaration_fragment(&self, ctx: &EmitCtx<'_>, out: &mut CodeBuffer) -> Result<(), Error> {
        let uid = ctx.uid();
        for (name, ty) in LIGHT_ARRAYS {
            out.line(format!("uniform {ty} {name}{uid}[{}];", self.max_lights));
        }
        out.line(format!("uniform int uLightsNum{uid};"))
            .line(format!("uniform vec3 uAmbientColor{uid};"));

        ctx.declare_outputs(Stage::Fragment, out)
    }

    fn execution_fragment(&self, ctx: &EmitCtx<'_>, out: &mut CodeBuffer) -> Result<(), Error> {
        if !ctx.is_used("result") {
            return Ok(());
        }

        let uid = ctx.uid();
        let result = ctx.output("result")?;

        out.open("")
            .line(format!("vec4 base = {};", ctx.input("base_color")?.as_vec4()?))
            .line(format!("vec3 normal = normalize({});", ctx.input("normal")?.as_vec3()?))
            .line(format!("vec3 view = normalize({});", ctx.input("view_vector")?.as_vec3()?))
            .line(format!("vec3 position = {};", ctx.input("world_position")?.as_vec3()?))
            .line(format!("vec3 lit = uAmbientColor{uid} * base.rgb;"));

        out.open(format!("for (int i = 0; i < {}; i++)", self.max_lights))
            .open(format!("if (i >= uLightsNum{uid})"))
            .line("break;")
            .close()
            .line("vec3 toLight;")
            .line("float attenuation = 1.0;");

        out.open(format!("if (uLightType{uid}[i] == 0)"))
            .line(format!("toLight = -normalize(uLightDirection{uid}[i]);"))
            .close();
        out.open("else")
            .line(format!("vec3 offset = uLightPosition{uid}[i] - position;"))
            .line("float dist = length(offset);")
            .line("toLight = offset / max(dist, 0.0001);")
            .open(format!("if (uLightRange{uid}[i] > 0.0)"))
            .line(format!(
                "attenuation = clamp(1.0 - dist / uLightRange{uid}[i], 0.0, 1.0);"
            ))
            .close()
            .open(format!("if (uLightType{uid}[i] == 2)"))
            .line(format!(
                "attenuation *= smoothstep(0.8, 0.9, dot(-toLight, normalize(uLightDirection{uid}[i])));"
            ))
            .close()
            .close();

        out.line("float diffuse = max(dot(normal, toLight), 0.0);")
            .line("vec3 halfway = normalize(toLight + view);")
            .line(format!(
                "float specular = pow(max(dot(normal, halfway), 0.0), {}) * {};",
                fmt_float(self.specular_power),
                fmt_float(self.specular_strength)
            ))
            .line(format!(
                "lit += (base.rgb * diffuse + specular) * uLightColor{uid}[i] * uLightIntensity{uid}[i] * attenuation;"
            ))
            .close();

        out.line(format!("{} = vec4(lit, base.a);", result.reference()))
            .close();

        Ok(())
    }

    fn prepare_to_draw_scene(&mut self, ctx: &mut BindCtx<'_>, scene: &Scene) -> Result<(), Error> {
        let uid = ctx.uid();
        let mut count = 0;

        for (index, light) in scene.enabled_lights().take(self.light_slots()).enumerate() {
            let element = |name: &str| format!("{name}{uid}[{index}]");

            ctx.set_uniform(element("uLightColor"), Uniform::Vec3(light.color.as_array()));
            ctx.set_uniform(element("uLightPosition"), Uniform::Vec3(light.position));
            ctx.set_uniform(element("uLightDirection"), Uniform::Vec3(light.direction));
            ctx.set_uniform(element("uLightIntensity"), Uniform::Float(light.intensity));
            ctx.set_uniform(element("uLightRange"), Uniform::Float(light.range));
            ctx.set_uniform(element("uLightType"), Uniform::Int(light.variant.code()));
            count += 1;
        }

        ctx.set_uniform(format!("uLightsNum{uid}"), Uniform::Int(count));
        ctx.set_uniform(
            format!("uAmbientColor{uid}"),
            Uniform::Vec3(scene.ambient.as_array()),
        );

        Ok(())
    }

    fn read(&mut self, json: &JsonObject) -> Result<(), Error> {
        let max_lights = json.int_or("maxLights", self.max_lights);
        check_capacity(max_lights)?;

        self.max_lights = max_lights;
        self.specular_power = json.float_or("specularPower", self.specular_power);
        self.specular_strength = json.float_or("specularStrength", self.specular_strength);
        Ok(())
    }

    fn write(&self, json: &mut JsonObject) {
        json.put("maxLights", self.max_lights);
        json.put("specularPower", self.specular_power);
        json.put("specularStrength", self.specular_strength);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        color::Color,
        light::Light,
        shader::{
            binding::RecordingSink,
            graph::{Graph, Validated},
            nodes::OutputNode,
        },
    };
    use float_eq::assert_float_eq;

    fn lit(node: LightingNode) -> Graph<Validated> {
        let mut graph = Graph::default();
        let output = graph.add_node(OutputNode::default());
        let lighting = graph.add_node(node);
        graph.connect(lighting, "result", output, "frag_color").unwrap();
        graph.set_root(output).unwrap();
        graph.validate().unwrap()
    }

    #[test]
    fn light_arrays() {
        let mut graph = lit(LightingNode {
            max_lights: 2,
            ..Default::default()
        });
        let fragment = graph.build().unwrap().fragment.clone();

        // lighting 1, output 2
        assert!(fragment.contains("uniform vec3 uLightColor1[2];"));
        assert!(fragment.contains("uniform int uLightType1[2];"));
        assert!(fragment.contains("uniform int uLightsNum1;"));
        assert!(fragment.contains("vec4 result1;"));
        assert!(fragment.contains("vec3 normal = normalize(vec3(0.0, 0.0, 1.0));"));
        assert!(fragment.contains("result1 = vec4(lit, base.a);"));
        assert!(fragment.contains("fragColor = result1;"));
        assert_eq!(fragment.matches('{').count(), fragment.matches('}').count());
    }

    #[test]
    fn enabled_lights_up_to_capacity() {
        let mut graph = lit(LightingNode {
            max_lights: 2,
            ..Default::default()
        });
        graph.build().unwrap();

        let mut scene = Scene::default();
        let mut disabled = Light::point([1., 2., 3.], Color::WHITE, 2., 10.);
        disabled.enabled = false;
        scene
            .add_light(disabled)
            .add_light(Light::directional([0., -1., 0.], Color::new(1., 0.5, 0.), 0.5))
            .add_light(Light::point([4., 0., 0.], Color::WHITE, 1., 0.))
            .add_light(Light::point([8., 0., 0.], Color::WHITE, 1., 0.));

        let mut sink = RecordingSink::default();
        graph.prepare_to_draw_scene(&scene, &mut sink).unwrap();

        assert_eq!(sink.uniforms.get("uLightsNum1"), Some(&Uniform::Int(2)));
        assert_eq!(
            sink.uniforms.get("uLightColor1[0]"),
            Some(&Uniform::Vec3([1., 0.5, 0.]))
        );
        assert_eq!(sink.uniforms.get("uLightType1[1]"), Some(&Uniform::Int(1)));
        assert_eq!(
            sink.uniforms.get("uLightPosition1[1]"),
            Some(&Uniform::Vec3([4., 0., 0.]))
        );
        assert_eq!(sink.uniforms.get("uLightType1[2]"), None);

        let Some(Uniform::Float(intensity)) = sink.uniforms.get("uLightIntensity1[0]") else {
            panic!("intensity not pushed: {sink:?}");
        };
        assert_float_eq!(*intensity, 0.5, abs <= f32::EPSILON);
    }

    #[test]
    fn config_round_trip() {
        let node = LightingNode {
            max_lights: 8,
            specular_power: 16.,
            specular_strength: 0.25,
        };
        let mut json = JsonObject::new();
        node.write(&mut json);

        let mut restored = LightingNode::default();
        restored.read(&json).unwrap();
        assert_eq!(restored.max_lights, 8);
        assert_float_eq!(restored.specular_power, 16., abs <= f32::EPSILON);
        assert_float_eq!(restored.specular_strength, 0.25, abs <= f32::EPSILON);
    }

    #[test]
    fn light_capacity_must_be_positive() {
        let json: JsonObject = serde_json::from_str(r#"{"maxLights": 0}"#).unwrap();
        assert!(matches!(
            LightingNode::default().read(&json),
            Err(Error::InvalidConfig { node: "lighting", .. })
        ));
    }

    #[test]
    fn empty_light_arrays_are_not_built() {
        let mut graph = lit(LightingNode {
            max_lights: 0,
            ..Default::default()
        });
        let result = graph.build().map(Clone::clone);
        assert!(
            matches!(&result, Err(Error::InvalidConfig { node: "lighting", .. })),
            "Expected a configuration error, got `{result:?}`"
        );
        assert!(graph.source().is_none());
    }
}
