mod builder;
mod mesh;
pub mod node;
mod skeleton;
pub mod tables;
mod tree;

pub use builder::{build_scene_graph, BuildError, BuildErrorKind, BuildOptions, BuildStage, SceneBuild};
pub use skeleton::BoneChain;
pub use tree::{GraphError, SceneGraph};
