//! Read-only data handed to the binding protocol: the scene, each drawn object and each of its
//! meshes.

use crate::{camera::Camera, color::Color, light::Light, matrix::Mat4, shader::nodes::AlphaMode};

#[derive(Clone, Debug, PartialEq)]
/// Scene representation with lights and a camera.
pub struct Scene {
    /// Lights currently in the scene.
    pub lights: Vec<Light>,
    /// Light reaching every surface.
    pub ambient: Color,
    /// Scene camera.
    pub camera: Camera,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            lights: Vec::new(),
            ambient: Color::new(0.03, 0.03, 0.03),
            camera: Camera::default(),
        }
    }
}

impl Scene {
    /// Empty scene seen through `camera`.
    pub fn new(camera: Camera) -> Self {
        Self {
            camera,
            ..Default::default()
        }
    }

    /// Adds a light to the scene.
    pub fn add_light(&mut self, light: Light) -> &mut Self {
        self.lights.push(light);
        self
    }

    /// Enabled lights in insertion order.
    pub fn enabled_lights(&self) -> impl Iterator<Item = &Light> {
        self.lights.iter().filter(|light| light.enabled)
    }
}

#[derive(Clone, Debug, PartialEq)]
/// Per-object data.
pub struct Object {
    /// Model to world transform.
    pub world: Mat4,
    /// Skinning matrices, empty for rigid objects.
    pub bones: Vec<Mat4>,
}

impl Default for Object {
    fn default() -> Self {
        Self {
            world: Mat4::identity(),
            bones: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
/// Per-mesh data.
pub struct Mesh {
    /// Material alpha mode overriding the output node's own.
    pub alpha_mode: Option<AlphaMode>,
}
