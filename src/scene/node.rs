use std::fmt;

use glam::{Mat4, Vec3};

use crate::math::transform::{view_axis_correction, EngineTransform};
use crate::scene::tables::{MaterialId, ShapeId};
use crate::source::{LightType, ObjectKey};

/// Scene node identifier, unique across every node kind within one export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct I3dNodeId(pub(crate) u32);

impl I3dNodeId {
	pub fn get(self) -> u32 {
		self.0
	}
}

impl fmt::Display for I3dNodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Hands out node IDs for one export session.
#[derive(Debug, Default)]
pub struct IdAllocator {
	next: u32,
}

impl IdAllocator {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn next_id(&mut self) -> I3dNodeId {
		let id = I3dNodeId(self.next);
		self.next += 1;
		id
	}
}

#[derive(Debug, Clone)]
pub struct SceneNode {
	pub id: I3dNodeId,
	pub name: String,
	/// The host object this node was built from. Bones and the root have none.
	pub source: Option<ObjectKey>,
	/// Parent relative transform, already in engine space.
	pub transform: Mat4,
	pub kind: NodeKind,
}

impl SceneNode {
	pub fn engine_transform(&self) -> EngineTransform {
		EngineTransform::from_matrix(self.transform)
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
	/// The synthetic root every exported tree hangs from.
	Root,
	TransformGroup,
	ArmatureRoot,
	Bone,
	Shape(ShapeRef),
	SkinnedShape {
		shape: ShapeRef,
		/// Armature node whose bone chain provides the skin bind IDs.
		armature: I3dNodeId,
	},
	Light(LightAttributes),
	Camera(CameraAttributes),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeRef {
	pub shape_id: ShapeId,
	/// One material per subset of the shape.
	pub materials: Vec<MaterialId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LightAttributes {
	pub light_type: LightType,
	pub color: Vec3,
	pub range: f32,
	pub cone_angle: f32,
	pub cast_shadows: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CameraAttributes {
	pub fov: f32,
	pub near_clip: f32,
	pub far_clip: f32,
}

impl NodeKind {
	pub fn type_name(&self) -> &'static str {
		match self {
			NodeKind::Root => "Root",
			NodeKind::TransformGroup => "TransformGroup",
			NodeKind::ArmatureRoot => "Armature",
			NodeKind::Bone => "Bone",
			NodeKind::Shape(_) => "Shape",
			NodeKind::SkinnedShape { .. } => "SkinnedShape",
			NodeKind::Light(_) => "Light",
			NodeKind::Camera(_) => "Camera",
		}
	}

	pub fn shape(&self) -> Option<&ShapeRef> {
		match self {
			NodeKind::Shape(shape) | NodeKind::SkinnedShape { shape, .. } => Some(shape),
			_ => None,
		}
	}

	/// Local axis correction applied on top of the converted transform.
	pub fn axis_correction(&self) -> Mat4 {
		match self {
			NodeKind::Light(_) | NodeKind::Camera(_) => view_axis_correction(),
			_ => Mat4::IDENTITY,
		}
	}
}
