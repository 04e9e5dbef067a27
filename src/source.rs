//! Read-only model of the host scene.
//!
//! A host binding fills a [`SourceScene`] from the tool's object model, everything downstream only ever borrows it.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::Index;

use glam::{Mat4, Vec2, Vec3, Vec4};

/// Index of an object inside its [`SourceScene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ObjectKey(pub(crate) usize);

#[derive(Debug, Clone, Default)]
pub struct SourceScene {
	objects: Vec<SourceObject>,
	names: HashMap<String, ObjectKey>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceSceneError {
	#[error("Object name {0:?} is used twice")]
	DuplicateName(String),
	#[error("Object {child:?} names unknown parent {parent:?}")]
	UnknownParent { child: String, parent: String },
	#[error("Object {0:?} is its own ancestor")]
	ParentCycle(String),
}

impl SourceScene {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds an object. Its parent, if any, is referenced by name and must be added before [`SourceScene::validate`].
	pub fn add(&mut self, object: SourceObject) -> Result<ObjectKey, SourceSceneError> {
		if self.names.contains_key(&object.name) {
			return Err(SourceSceneError::DuplicateName(object.name));
		}
		let key = ObjectKey(self.objects.len());
		self.names.insert(object.name.clone(), key);
		self.objects.push(object);
		Ok(key)
	}

	/// Checks that every parent reference resolves and that the parent links form a forest.
	pub fn validate(&self) -> Result<(), SourceSceneError> {
		for object in &self.objects {
			if let Some(parent) = &object.parent {
				if !self.names.contains_key(parent) {
					return Err(SourceSceneError::UnknownParent {
						child: object.name.clone(),
						parent: parent.clone(),
					});
				}
			}
		}

		for key in self.keys() {
			if self.cyclic_ancestor(key).is_some() {
				return Err(SourceSceneError::ParentCycle(self[key].name.clone()));
			}
		}
		Ok(())
	}

	/// First object on the parent chain of `key` (itself included) that turns out to be its own ancestor.
	pub fn cyclic_ancestor(&self, key: ObjectKey) -> Option<ObjectKey> {
		let mut seen = HashSet::new();
		let mut current = Some(key);
		while let Some(key) = current {
			if !seen.insert(key) {
				return Some(key);
			}
			current = self.parent_of(key);
		}
		None
	}

	pub fn get(&self, key: ObjectKey) -> Option<&SourceObject> {
		self.objects.get(key.0)
	}

	pub fn find(&self, name: &str) -> Option<ObjectKey> {
		self.names.get(name).copied()
	}

	pub fn parent_of(&self, key: ObjectKey) -> Option<ObjectKey> {
		let parent = self.get(key)?.parent.as_deref()?;
		self.find(parent)
	}

	/// Direct children of `key`, in scene order.
	pub fn children_of(&self, key: ObjectKey) -> impl Iterator<Item = ObjectKey> + '_ {
		self.keys().filter(move |&child| self.parent_of(child) == Some(key))
	}

	pub fn keys(&self) -> impl Iterator<Item = ObjectKey> {
		(0..self.objects.len()).map(ObjectKey)
	}

	pub fn len(&self) -> usize {
		self.objects.len()
	}

	pub fn is_empty(&self) -> bool {
		self.objects.is_empty()
	}
}

impl Index<ObjectKey> for SourceScene {
	type Output = SourceObject;

	fn index(&self, key: ObjectKey) -> &SourceObject {
		&self.objects[key.0]
	}
}

#[derive(Debug, Clone)]
pub struct SourceObject {
	pub name: String,
	pub parent: Option<String>,
	/// Object matrix in world space.
	pub matrix_world: Mat4,
	pub selected: bool,
	pub data: ObjectData,
}

impl SourceObject {
	pub fn new(name: impl Into<String>, data: ObjectData) -> Self {
		Self {
			name: name.into(),
			parent: None,
			matrix_world: Mat4::IDENTITY,
			selected: true,
			data,
		}
	}

	pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
		self.parent = Some(parent.into());
		self
	}

	pub fn with_matrix(mut self, matrix_world: Mat4) -> Self {
		self.matrix_world = matrix_world;
		self
	}

	pub fn with_selected(mut self, selected: bool) -> Self {
		self.selected = selected;
		self
	}

	pub fn kind(&self) -> ObjectKind {
		match &self.data {
			ObjectData::Empty => ObjectKind::Empty,
			ObjectData::Mesh(_) => ObjectKind::Mesh,
			ObjectData::Armature(_) => ObjectKind::Armature,
			ObjectData::Light(_) => ObjectKind::Light,
			ObjectData::Camera(_) => ObjectKind::Camera,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
	Empty,
	Mesh,
	Armature,
	Light,
	Camera,
}

impl fmt::Display for ObjectKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			ObjectKind::Empty => "EMPTY",
			ObjectKind::Mesh => "MESH",
			ObjectKind::Armature => "ARMATURE",
			ObjectKind::Light => "LIGHT",
			ObjectKind::Camera => "CAMERA",
		})
	}
}

#[derive(Debug, Clone)]
pub enum ObjectData {
	Empty,
	Mesh(SourceMesh),
	Armature(SourceArmature),
	Light(SourceLight),
	Camera(SourceCamera),
}

#[derive(Debug, Clone, Default)]
pub struct SourceArmature {
	/// Bones in the tool's order, parents are not guaranteed to come first.
	pub bones: Vec<SourceBone>,
}

#[derive(Debug, Clone)]
pub struct SourceBone {
	pub name: String,
	/// Index into [`SourceArmature::bones`].
	pub parent: Option<usize>,
	/// Bone matrix in armature space.
	pub matrix_local: Mat4,
}

impl SourceArmature {
	/// Bones without a bone parent, in source order.
	pub fn root_bones(&self) -> impl Iterator<Item = usize> + '_ {
		self.bones
			.iter()
			.enumerate()
			.filter(|(_, bone)| bone.parent.is_none())
			.map(|(i, _)| i)
	}

	pub fn child_bones(&self, parent: usize) -> impl Iterator<Item = usize> + '_ {
		self.bones
			.iter()
			.enumerate()
			.filter(move |(_, bone)| bone.parent == Some(parent))
			.map(|(i, _)| i)
	}
}

#[derive(Debug, Clone, Default)]
pub struct SourceMesh {
	/// Name of the mesh datablock.
	pub name: String,
	/// Geometry after modifiers, before armature deformation.
	pub evaluated: Geometry,
	pub materials: Vec<SourceMaterial>,
	pub modifiers: Vec<Modifier>,
}

impl SourceMesh {
	/// Name of the armature object the first armature modifier binds to.
	pub fn armature(&self) -> Option<&str> {
		self.modifiers.iter().find_map(|modifier| match modifier {
			Modifier::Armature { object } => Some(object.as_str()),
			_ => None,
		})
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modifier {
	Armature { object: String },
	Other(String),
}

/// Triangulated geometry with one entry per split vertex.
#[derive(Debug, Clone, Default)]
pub struct Geometry {
	pub positions: Vec<Vec3>,
	pub normals: Vec<Vec3>,
	/// Empty when the mesh has no UV map.
	pub uvs: Vec<Vec2>,
	pub triangles: Vec<[u32; 3]>,
	/// Material slot per triangle. Empty means slot 0 everywhere.
	pub material_slots: Vec<usize>,
	/// Names of the vertex groups referenced by [`Geometry::weights`].
	pub vertex_groups: Vec<String>,
	/// `(group index, weight)` pairs per vertex. Empty when unweighted.
	pub weights: Vec<Vec<(usize, f32)>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceMaterial {
	pub name: String,
	pub diffuse_color: Vec4,
	pub specular_color: Vec3,
	/// Path of the diffuse texture, relative to the exported file.
	pub diffuse_texture: Option<String>,
}

impl SourceMaterial {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			diffuse_color: Vec4::new(0.8, 0.8, 0.8, 1.0),
			specular_color: Vec3::new(0.5, 0.5, 0.5),
			diffuse_texture: None,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightType {
	Point,
	Directional,
	Spot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceLight {
	pub light_type: LightType,
	pub color: Vec3,
	pub range: f32,
	/// Full cone angle in degrees, spot lights only.
	pub cone_angle: f32,
	pub cast_shadows: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceCamera {
	/// Vertical field of view in degrees.
	pub fov: f32,
	pub near_clip: f32,
	pub far_clip: f32,
}
