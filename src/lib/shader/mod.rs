//! Shader node graph: wiring, validation, code generation for both pipeline stages, binding of
//! live data and graph persistence.

pub mod binding;
pub mod build;
pub mod graph;
pub mod json;
pub mod node;
pub mod nodes;
pub mod program;
pub mod registry;
pub mod types;
pub mod value;

pub use binding::{CullFace, RenderState, TextureHandle, Uniform, UniformSink};
pub use graph::{Error, Graph, Unvalidated, Validated};
pub use node::{Name, NodeId, NodeKind, ShaderNode};
pub use program::{CompileFailure, CompileSink, ProgramConfig, ProgramSource};
pub use registry::{NodeRegistry, REGISTRY};
pub use types::{GlslType, Literal, Scope, Stage, Stages};
pub use value::{Value, ValueId};
