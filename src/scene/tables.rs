//! Append-only, deduplicating tables for shapes, materials and files.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use glam::{Vec2, Vec3, Vec4};

/// Content key deciding whether two table entries are the same entry.
///
/// Keys must only compare equal when the entries serialize identically.
pub trait Fingerprint {
	type Key: Eq + Hash;

	fn fingerprint(&self) -> Self::Key;
}

pub trait TableId: Copy {
	fn from_index(index: usize) -> Self;
	fn index(self) -> usize;
}

macro_rules! table_id {
	($name:ident) => {
		/// Table local ID, starting at 1.
		#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
		#[repr(transparent)]
		pub struct $name(pub(crate) u32);

		impl $name {
			pub fn get(self) -> u32 {
				self.0
			}
		}

		impl TableId for $name {
			fn from_index(index: usize) -> Self {
				Self(index as u32 + 1)
			}

			fn index(self) -> usize {
				self.0 as usize - 1
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}
	};
}

table_id!(ShapeId);
table_id!(MaterialId);
table_id!(FileId);

#[derive(Debug)]
pub struct Table<I, T: Fingerprint> {
	entries: Vec<T>,
	lookup: HashMap<T::Key, I>,
}

impl<I: TableId, T: Fingerprint> Default for Table<I, T> {
	fn default() -> Self {
		Self {
			entries: Vec::new(),
			lookup: HashMap::new(),
		}
	}
}

impl<I: TableId, T: Fingerprint> Table<I, T> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts `entry` unless an entry with the same fingerprint exists. Returns the ID of whichever is kept.
	pub fn insert(&mut self, entry: T) -> I {
		let key = entry.fingerprint();
		if let Some(&id) = self.lookup.get(&key) {
			return id;
		}
		let id = I::from_index(self.entries.len());
		self.entries.push(entry);
		self.lookup.insert(key, id);
		id
	}

	pub fn get(&self, id: I) -> Option<&T> {
		self.entries.get(id.index())
	}

	pub fn iter(&self) -> impl Iterator<Item = (I, &T)> {
		self.entries.iter().enumerate().map(|(i, entry)| (I::from_index(i), entry))
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

// shapes

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendWeights {
	pub weights: [f32; 4],
	/// Indices into the owning armature's bone chain.
	pub bones: [u32; 4],
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShapeVertex {
	pub position: Vec3,
	pub normal: Option<Vec3>,
	pub uv: Option<Vec2>,
	pub blend: Option<BlendWeights>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subset {
	pub first_vertex: u32,
	pub num_vertices: u32,
	pub first_index: u32,
	pub num_indices: u32,
}

/// One `IndexedTriangleSet`, in engine space.
#[derive(Debug, Clone)]
pub struct Shape {
	pub name: String,
	pub vertices: Vec<ShapeVertex>,
	/// Sorted by subset.
	pub triangles: Vec<[u32; 3]>,
	pub subsets: Vec<Subset>,
	/// Bone names by bone index, skinned shapes only.
	pub bone_mapping: Option<Vec<String>>,
}

impl Shape {
	pub fn has_normals(&self) -> bool {
		self.vertices.first().is_some_and(|v| v.normal.is_some())
	}

	pub fn has_uvs(&self) -> bool {
		self.vertices.first().is_some_and(|v| v.uv.is_some())
	}

	pub fn is_skinned(&self) -> bool {
		self.vertices.first().is_some_and(|v| v.blend.is_some())
	}
}

/// Bit exact shape content, name and bone mapping excluded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShapeFingerprint(Vec<u32>);

impl Fingerprint for Shape {
	type Key = ShapeFingerprint;

	fn fingerprint(&self) -> ShapeFingerprint {
		let mut words = Vec::with_capacity(self.vertices.len() * 16 + self.triangles.len() * 3 + 8);
		words.push(self.vertices.len() as u32);
		for vertex in &self.vertices {
			words.extend(vertex.position.to_array().map(f32::to_bits));
			match vertex.normal {
				Some(n) => {
					words.push(1);
					words.extend(n.to_array().map(f32::to_bits));
				}
				None => words.push(0),
			}
			match vertex.uv {
				Some(uv) => {
					words.push(1);
					words.extend(uv.to_array().map(f32::to_bits));
				}
				None => words.push(0),
			}
			match vertex.blend {
				Some(blend) => {
					words.push(1);
					words.extend(blend.weights.map(f32::to_bits));
					words.extend(blend.bones);
				}
				None => words.push(0),
			}
		}
		words.push(self.triangles.len() as u32);
		for triangle in &self.triangles {
			words.extend(triangle);
		}
		words.push(self.subsets.len() as u32);
		for subset in &self.subsets {
			words.extend([
				subset.first_vertex,
				subset.num_vertices,
				subset.first_index,
				subset.num_indices,
			]);
		}
		ShapeFingerprint(words)
	}
}

// materials

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
	pub name: String,
	pub diffuse_color: Vec4,
	pub specular_color: Vec3,
	pub texture: Option<FileId>,
}

impl Material {
	/// Assigned to meshes without any material slot.
	pub fn fallback() -> Self {
		Self {
			name: "i3d_default_material".to_owned(),
			diffuse_color: Vec4::new(0.8, 0.8, 0.8, 1.0),
			specular_color: Vec3::new(0.5, 0.5, 0.5),
			texture: None,
		}
	}
}

impl Fingerprint for Material {
	type Key = (String, [u32; 7], Option<FileId>);

	fn fingerprint(&self) -> Self::Key {
		let d = self.diffuse_color.to_array().map(f32::to_bits);
		let s = self.specular_color.to_array().map(f32::to_bits);
		(
			self.name.clone(),
			[d[0], d[1], d[2], d[3], s[0], s[1], s[2]],
			self.texture,
		)
	}
}

// files

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
	pub filename: String,
}

impl File {
	/// Stores the path with forward slashes, as the engine expects.
	pub fn new(path: &str) -> Self {
		Self {
			filename: path.replace('\\', "/"),
		}
	}
}

impl Fingerprint for File {
	type Key = String;

	fn fingerprint(&self) -> String {
		self.filename.clone()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn triangle_shape(name: &str, offset: f32) -> Shape {
		let vertex = |x: f32, y: f32| ShapeVertex {
			position: Vec3::new(x + offset, y, 0.0),
			normal: Some(Vec3::Z),
			uv: None,
			blend: None,
		};
		Shape {
			name: name.to_owned(),
			vertices: vec![vertex(0.0, 0.0), vertex(1.0, 0.0), vertex(0.0, 1.0)],
			triangles: vec![[0, 1, 2]],
			subsets: vec![Subset {
				first_vertex: 0,
				num_vertices: 3,
				first_index: 0,
				num_indices: 3,
			}],
			bone_mapping: None,
		}
	}

	#[test]
	fn identical_geometry_shares_an_entry() {
		let mut shapes = Table::<ShapeId, Shape>::new();
		let a = shapes.insert(triangle_shape("a", 0.0));
		let b = shapes.insert(triangle_shape("b", 0.0));
		assert_eq!(a, b);
		assert_eq!(a.get(), 1);
		assert_eq!(shapes.len(), 1);
		assert_eq!(shapes.get(a).unwrap().name, "a");
	}

	#[test]
	fn different_geometry_is_never_merged() {
		let mut shapes = Table::<ShapeId, Shape>::new();
		let a = shapes.insert(triangle_shape("a", 0.0));
		let b = shapes.insert(triangle_shape("a", 1e-6));
		assert_ne!(a, b);
		assert_eq!(shapes.len(), 2);
	}

	#[test]
	fn files_dedup_on_normalized_path() {
		let mut files = Table::<FileId, File>::new();
		let a = files.insert(File::new("textures\\wood.png"));
		let b = files.insert(File::new("textures/wood.png"));
		let c = files.insert(File::new("textures/metal.png"));
		assert_eq!(a, b);
		assert_eq!(c.get(), 2);
		assert_eq!(files.get(a).unwrap().filename, "textures/wood.png");
	}

	#[test]
	fn materials_with_same_name_but_other_texture_stay_apart() {
		let mut materials = Table::<MaterialId, Material>::new();
		let plain = materials.insert(Material::fallback());
		let textured = materials.insert(Material {
			texture: Some(FileId(1)),
			..Material::fallback()
		});
		assert_ne!(plain, textured);
		assert_eq!(materials.insert(Material::fallback()), plain);
	}
}
