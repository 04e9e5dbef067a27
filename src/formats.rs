pub mod i3d;
mod json;
pub mod scene_json;
pub mod xml;

pub use json::JsonError;
pub use scene_json::{parse_scene, SceneJsonError};
pub use xml::{indent, XmlElement, XmlError};
