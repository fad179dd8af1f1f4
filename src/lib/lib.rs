#![warn(missing_docs)]

//! Library used by the shadegraph software. Compiles shader node graphs into vertex and fragment
//! programs and feeds them scene, object and mesh data when drawing.

pub mod camera;
pub mod color;
pub mod light;
pub mod matrix;
pub mod opengl;
pub mod scene;
pub mod shader;

/// Types most applications need.
pub mod prelude {
    pub use crate::{
        camera::Camera,
        color::Color,
        light::{Light, LightVariant},
        matrix::Mat4,
        scene::{Mesh, Object, Scene},
        shader::{
            nodes::*, CompileSink, Graph, GlslType, Literal, ProgramConfig, UniformSink,
            Unvalidated, Validated, Value, REGISTRY,
        },
    };
}
