//! Built-in shader nodes.

mod camera;
mod lighting;
mod literal;
mod operation;
mod output;
mod split;
mod texture;
mod vertex;

pub use camera::CameraDataNode;
pub use lighting::LightingNode;
pub use literal::LiteralNode;
pub use operation::OperationNode;
pub use output::{AlphaMode, OutputNode};
pub use split::SplitVec4Node;
pub use texture::TextureNode;
pub use vertex::VertexNode;
