//! Binding protocol: after a build, every reachable node pushes live data into the compiled
//! program, once per scene, once per object and once per mesh, in that order.

use super::{
    build::EmitCtx,
    graph::{Error, Graph, Validated},
    node::{Node, ShaderNode},
    types::GlslType,
    value::Code,
};

use crate::{
    matrix::Mat4,
    scene::{Mesh, Object, Scene},
};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq)]
/// Data assigned to a uniform.
pub enum Uniform {
    /// `bool`
    Bool(bool),
    /// `int`, also used for sampler units
    Int(i32),
    /// `float`
    Float(f32),
    /// `vec2`
    Vec2([f32; 2]),
    /// `vec3`
    Vec3([f32; 3]),
    /// `vec4`
    Vec4([f32; 4]),
    /// `mat3`, row-major
    Mat3([[f32; 3]; 3]),
    /// `mat4`
    Mat4(Mat4),
    /// `mat4[]`
    Mat4Array(Vec<Mat4>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// Texture owned by the application.
pub struct TextureHandle {
    /// Backend texture name.
    pub id: u32,
    /// Sampler type the texture is read through.
    pub target: GlslType,
}

impl TextureHandle {
    /// 2D texture.
    pub fn new_2d(id: u32) -> Self {
        Self {
            id,
            target: GlslType::Sampler2D,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Faces discarded by face culling.
pub enum CullFace {
    #[default]
    /// Faces pointing away from the camera.
    Back,
    /// Faces pointing towards the camera.
    Front,
    /// Every face.
    FrontAndBack,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// Fixed-function state toggled while binding.
pub enum RenderState {
    /// Alpha blending.
    Blend,
    /// Face culling of the given faces.
    CullFace(CullFace),
    /// Depth buffer writes.
    DepthWrite,
}

/// Collaborator receiving uniform values and state changes for the program being drawn.
pub trait UniformSink {
    /// Assign a uniform by name.
    fn set_uniform(&mut self, name: &str, value: Uniform);
    /// Bind a texture to a texture unit.
    fn bind_texture(&mut self, unit: u32, texture: TextureHandle);
    /// Toggle fixed-function state.
    fn set_render_state(&mut self, state: RenderState, enabled: bool);
}

/// View of one node during binding.
pub struct BindCtx<'a> {
    view: EmitCtx<'a>,
    sink: &'a mut dyn UniformSink,
    texture_units: &'a mut u32,
    pushed: &'a mut HashMap<String, Uniform>,
}

impl<'a> BindCtx<'a> {
    /// Build uid of the node.
    pub fn uid(&self) -> usize {
        self.view.uid()
    }

    /// Output value.
    pub fn output(&self, name: &str) -> Result<Code<'a>, Error> {
        self.view.output(name)
    }

    /// Whether a reachable node reads an output.
    pub fn is_used(&self, name: &str) -> bool {
        self.view.is_used(name)
    }

    /// Assign a uniform by name.
    pub fn set_uniform(&mut self, name: impl AsRef<str>, value: Uniform) {
        self.sink.set_uniform(name.as_ref(), value);
    }

    /// Assign a uniform by name, skipped when it already holds `value` since the last build.
    pub fn set_uniform_if_changed(&mut self, name: impl AsRef<str>, value: Uniform) {
        let name = name.as_ref();
        if self.pushed.get(name) == Some(&value) {
            return;
        }
        self.sink.set_uniform(name, value.clone());
        self.pushed.insert(name.to_owned(), value);
    }

    /// Assign the uniform backing an output.
    pub fn set_output(&mut self, output: &str, value: Uniform) -> Result<(), Error> {
        let name = self.output(output)?.reference().to_owned();
        self.sink.set_uniform(&name, value);
        Ok(())
    }

    /// Bind a texture to a texture unit.
    pub fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        self.sink.bind_texture(unit, texture);
    }

    /// Toggle fixed-function state.
    pub fn set_render_state(&mut self, state: RenderState, enabled: bool) {
        self.sink.set_render_state(state, enabled);
    }

    /// Reserve the next free texture unit.
    pub fn next_texture_unit(&mut self) -> u32 {
        let unit = *self.texture_units;
        *self.texture_units += 1;
        unit
    }
}

impl Graph<Validated> {
    fn each_node<F>(&mut self, sink: &mut dyn UniformSink, mut f: F) -> Result<(), Error>
    where
        F: FnMut(&mut dyn ShaderNode, &mut BindCtx<'_>) -> Result<(), Error>,
    {
        let Self {
            nodes,
            values,
            config,
            pass,
            pushed,
            ..
        } = self;
        let pass = pass.as_ref().ok_or(Error::NotBuilt)?;

        // Texture units are counted from zero on every call.
        let mut texture_units = 0;

        for id in pass.order.iter() {
            let Some(node) = nodes.get_mut(id) else {continue};
            let Node {
                kind,
                inputs,
                outputs,
                ..
            } = node;

            let mut ctx = BindCtx {
                view: EmitCtx {
                    node: *id,
                    inputs: &*inputs,
                    outputs: &*outputs,
                    values: &*values,
                    pass,
                    config: &*config,
                },
                sink: &mut *sink,
                texture_units: &mut texture_units,
                pushed: &mut *pushed,
            };
            f(kind.as_node_mut(), &mut ctx)?;
        }

        Ok(())
    }

    /// Push data shared by everything drawn in `scene`.
    pub fn prepare_to_draw_scene(
        &mut self,
        scene: &Scene,
        sink: &mut dyn UniformSink,
    ) -> Result<(), Error> {
        self.each_node(sink, |node, ctx| node.prepare_to_draw_scene(ctx, scene))
    }

    /// Push per-object data.
    pub fn prepare_object_data(
        &mut self,
        object: &Object,
        sink: &mut dyn UniformSink,
    ) -> Result<(), Error> {
        self.each_node(sink, |node, ctx| node.prepare_object_data(ctx, object))
    }

    /// Push per-mesh data right before drawing it.
    pub fn prepare_to_draw_mesh(
        &mut self,
        mesh: &Mesh,
        sink: &mut dyn UniformSink,
    ) -> Result<(), Error> {
        self.each_node(sink, |node, ctx| node.prepare_to_draw_mesh(ctx, mesh))
    }

    /// Run the three binding levels in order for a single draw.
    pub fn bind(
        &mut self,
        scene: &Scene,
        object: &Object,
        mesh: &Mesh,
        sink: &mut dyn UniformSink,
    ) -> Result<(), Error> {
        self.prepare_to_draw_scene(scene, sink)?;
        self.prepare_object_data(object, sink)?;
        self.prepare_to_draw_mesh(mesh, sink)
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
/// Sink recording every call, in order.
pub(crate) struct RecordingSink {
    pub(crate) uniforms: indexmap::IndexMap<String, Uniform>,
    pub(crate) textures: Vec<(u32, TextureHandle)>,
    pub(crate) states: Vec<(RenderState, bool)>,
}

#[cfg(test)]
impl UniformSink for RecordingSink {
    fn set_uniform(&mut self, name: &str, value: Uniform) {
        self.uniforms.insert(name.to_owned(), value);
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        self.textures.push((unit, texture));
    }

    fn set_render_state(&mut self, state: RenderState, enabled: bool) {
        self.states.push((state, enabled));
    }
}
