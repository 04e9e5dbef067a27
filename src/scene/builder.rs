use std::collections::HashMap;
use std::fmt;

use glam::Mat4;
use tracing::{debug, info, warn};

use super::mesh::evaluate_shape;
use super::node::{CameraAttributes, I3dNodeId, LightAttributes, NodeKind, ShapeRef};
use super::skeleton::build_bone_chain;
use super::tables::{File, Material, MaterialId};
use super::tree::{GraphError, SceneGraph};
use crate::math::transform::{engine_local, TransformError};
use crate::source::{
	ObjectData, ObjectKey, ObjectKind, SourceMaterial, SourceMesh, SourceObject, SourceScene, SourceSceneError,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
	/// Only export selected objects (and armatures they are bound to).
	pub selection_only: bool,
	/// Abort on the first object that fails instead of skipping it.
	pub strict: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
	Dependency,
	Transform,
	Skeleton,
	Geometry,
	Placement,
}

impl fmt::Display for BuildStage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			BuildStage::Dependency => "dependency resolution",
			BuildStage::Transform => "transform conversion",
			BuildStage::Skeleton => "skeleton construction",
			BuildStage::Geometry => "shape evaluation",
			BuildStage::Placement => "scene placement",
		})
	}
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum BuildErrorKind {
	#[error(transparent)]
	Transform(#[from] TransformError),
	#[error(transparent)]
	Graph(#[from] GraphError),
	#[error(transparent)]
	Scene(#[from] SourceSceneError),
	#[error("Object {0:?} is already being built, the dependency is cyclic")]
	CyclicDependency(String),
	#[error("Armature modifier refers to {0:?}, which is not in the scene")]
	MissingArmature(String),
	#[error("Armature modifier refers to {name:?}, which is a {kind} object")]
	NotAnArmature { name: String, kind: ObjectKind },
	#[error("Armature {0:?} could not be exported")]
	DependencyFailed(String),
	#[error("Invalid bone hierarchy: {0}")]
	InvalidBoneHierarchy(String),
	#[error("Invalid geometry: {0}")]
	InvalidGeometry(String),
}

/// A scene object that could not be turned into nodes.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Could not export {object_kind} object {object:?} during {stage}\n  - {kind}")]
pub struct BuildError {
	pub object: String,
	pub object_kind: ObjectKind,
	pub stage: BuildStage,
	pub kind: BuildErrorKind,
}

/// Result of a build pass.
#[derive(Debug)]
pub struct SceneBuild {
	pub graph: SceneGraph,
	/// Objects skipped because they failed, in the order they failed.
	pub warnings: Vec<BuildError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuildState {
	InProgress,
	/// `placed` is false while an armature built for a modifier still waits for its spot in scene order.
	Built { node: I3dNodeId, placed: bool },
	Failed,
}

/// Builds the scene graph for `scene`.
///
/// Objects that fail are reported in [`SceneBuild::warnings`] and skipped along with their children,
/// unless [`BuildOptions::strict`] is set, in which case the first failure is returned.
pub fn build_scene_graph(scene: &SourceScene, options: BuildOptions) -> Result<SceneBuild, BuildError> {
	SceneBuilder::new(scene, options).run()
}

struct SceneBuilder<'s> {
	scene: &'s SourceScene,
	options: BuildOptions,
	graph: SceneGraph,
	states: HashMap<ObjectKey, BuildState>,
	warnings: Vec<BuildError>,
}

impl<'s> SceneBuilder<'s> {
	fn new(scene: &'s SourceScene, options: BuildOptions) -> Self {
		Self {
			scene,
			options,
			graph: SceneGraph::new(),
			states: HashMap::new(),
			warnings: Vec::new(),
		}
	}

	fn run(mut self) -> Result<SceneBuild, BuildError> {
		self.reject_parent_cycles()?;

		let roots = self
			.scene
			.keys()
			.filter(|&key| self.is_exported(key))
			.filter(|&key| self.scene.parent_of(key).map_or(true, |parent| !self.is_exported(parent)))
			.collect::<Vec<_>>();
		info!("Building scene graph from {} root objects", roots.len());

		let root = self.graph.root();
		for key in roots {
			self.build_tree(key, root)?;
		}

		for (key, state) in &self.states {
			if let BuildState::Built { placed: false, .. } = state {
				info!(
					"Armature {:?} was not placed in scene order, keeping it at the scene root for its skinned meshes",
					self.object(*key).name
				);
			}
		}

		Ok(SceneBuild {
			graph: self.graph,
			warnings: self.warnings,
		})
	}

	/// Objects whose parent chain loops are never reached from a root, fail them up front.
	fn reject_parent_cycles(&mut self) -> Result<(), BuildError> {
		let cyclic = self
			.scene
			.keys()
			.filter(|&key| self.is_exported(key))
			.filter_map(|key| self.scene.cyclic_ancestor(key).map(|ancestor| (key, ancestor)))
			.collect::<Vec<_>>();

		for (key, ancestor) in cyclic {
			self.states.insert(key, BuildState::Failed);
			let cycle = SourceSceneError::ParentCycle(self.object(ancestor).name.clone());
			let error = self.error(key, BuildStage::Dependency, cycle);
			self.recover(error)?;
		}
		Ok(())
	}

	fn is_exported(&self, key: ObjectKey) -> bool {
		!self.options.selection_only || self.object(key).selected
	}

	fn object(&self, key: ObjectKey) -> &'s SourceObject {
		let scene: &'s SourceScene = self.scene;
		&scene[key]
	}

	fn error(&self, key: ObjectKey, stage: BuildStage, kind: impl Into<BuildErrorKind>) -> BuildError {
		let object = self.object(key);
		BuildError {
			object: object.name.clone(),
			object_kind: object.kind(),
			stage,
			kind: kind.into(),
		}
	}

	/// Skips a failed object, or hands the error back in strict mode.
	fn recover(&mut self, error: BuildError) -> Result<(), BuildError> {
		if self.options.strict {
			return Err(error);
		}
		warn!("{error}");
		self.warnings.push(error);
		Ok(())
	}

	/// Builds `key` below `parent`, then its exported children below it.
	fn build_tree(&mut self, key: ObjectKey, parent: I3dNodeId) -> Result<(), BuildError> {
		let built = match self.states.get(&key).copied() {
			None => self.build_object(key, parent, true),
			Some(BuildState::Built { node, placed: false }) => self.place(key, node, parent),
			Some(BuildState::Built { node, placed: true }) => Ok(node),
			Some(BuildState::InProgress) => Err(self.error(
				key,
				BuildStage::Placement,
				BuildErrorKind::CyclicDependency(self.object(key).name.clone()),
			)),
			Some(BuildState::Failed) => {
				debug!("Skipping {:?}, it already failed", self.object(key).name);
				return Ok(());
			}
		};

		match built {
			Ok(node) => {
				let children = self
					.scene
					.children_of(key)
					.filter(|&child| self.is_exported(child))
					.collect::<Vec<_>>();
				for child in children {
					self.build_tree(child, node)?;
				}
				Ok(())
			}
			Err(error) => self.recover(error),
		}
	}

	/// Creates the node for `key` and records the outcome in the build cache.
	fn build_object(&mut self, key: ObjectKey, parent: I3dNodeId, placed: bool) -> Result<I3dNodeId, BuildError> {
		self.states.insert(key, BuildState::InProgress);
		let result = self.create_node(key, parent);
		let state = match result {
			Ok(node) => BuildState::Built { node, placed },
			Err(_) => BuildState::Failed,
		};
		self.states.insert(key, state);
		result
	}

	/// Moves an armature that was built ahead of scene order under its real parent.
	fn place(&mut self, key: ObjectKey, node: I3dNodeId, parent: I3dNodeId) -> Result<I3dNodeId, BuildError> {
		debug!("Placing {:?} below node {parent}", self.object(key).name);
		let transform = self
			.transform_for(key, parent, NodeKind::ArmatureRoot.axis_correction())
			.map_err(|kind| self.error(key, BuildStage::Transform, kind))?;
		let placed = self
			.graph
			.reparent(node, parent)
			.and_then(|()| self.graph.set_transform(node, transform));
		placed.map_err(|err| self.error(key, BuildStage::Placement, err))?;
		self.states.insert(key, BuildState::Built { node, placed: true });
		Ok(node)
	}

	/// Engine space transform of `key` relative to the graph node `parent`.
	///
	/// `axis` is the local axis correction of the node being built.
	fn transform_for(&self, key: ObjectKey, parent: I3dNodeId, axis: Mat4) -> Result<Mat4, BuildErrorKind> {
		let parent_node = self.graph.get_node(parent).ok_or(GraphError::UnknownNode(parent))?;
		let parent_world = parent_node.source.map(|source| self.object(source).matrix_world);
		Ok(engine_local(
			self.object(key).matrix_world,
			parent_world,
			parent_node.kind.axis_correction(),
			axis,
		)?)
	}

	fn create_node(&mut self, key: ObjectKey, parent: I3dNodeId) -> Result<I3dNodeId, BuildError> {
		let object = self.object(key);
		debug!("Exporting {} object {:?}", object.kind(), object.name);

		let kind = match &object.data {
			ObjectData::Empty => NodeKind::TransformGroup,
			ObjectData::Armature(_) => NodeKind::ArmatureRoot,
			ObjectData::Light(light) => NodeKind::Light(LightAttributes {
				light_type: light.light_type,
				color: light.color,
				range: light.range,
				cone_angle: light.cone_angle,
				cast_shadows: light.cast_shadows,
			}),
			ObjectData::Camera(camera) => NodeKind::Camera(CameraAttributes {
				fov: camera.fov,
				near_clip: camera.near_clip,
				far_clip: camera.far_clip,
			}),
			ObjectData::Mesh(mesh) => return self.create_mesh_node(key, parent, mesh),
		};

		let transform = self
			.transform_for(key, parent, kind.axis_correction())
			.map_err(|err| self.error(key, BuildStage::Transform, err))?;
		let node = self
			.graph
			.add_node(parent, object.name.clone(), Some(key), transform, kind)
			.map_err(|err| self.error(key, BuildStage::Placement, err))?;

		if let ObjectData::Armature(armature) = &object.data {
			match build_bone_chain(&mut self.graph, node, armature) {
				Ok(chain) => {
					debug!("Armature {:?} binds bones {:?}", object.name, chain.skin_bind_ids());
					self.graph.insert_skeleton(node, chain);
				}
				Err(kind) => {
					// drop the half built chain, its IDs stay burned
					self.graph
						.remove_child(parent, node)
						.map_err(|err| self.error(key, BuildStage::Skeleton, err))?;
					return Err(self.error(key, BuildStage::Skeleton, kind));
				}
			}
		}

		Ok(node)
	}

	/// Shapes, materials and files only enter the tables once everything that can fail for the mesh has passed.
	fn create_mesh_node(
		&mut self,
		key: ObjectKey,
		parent: I3dNodeId,
		mesh: &SourceMesh,
	) -> Result<I3dNodeId, BuildError> {
		let armature = match mesh.armature() {
			Some(name) => Some(self.armature_node(key, name)?),
			None => None,
		};

		let evaluated = evaluate_shape(mesh, armature.and_then(|node| self.graph.skeleton(node)))
			.map_err(|kind| self.error(key, BuildStage::Geometry, kind))?;
		let transform = self
			.transform_for(key, parent, Mat4::IDENTITY)
			.map_err(|err| self.error(key, BuildStage::Transform, err))?;

		let shape_id = self.graph.add_shape(evaluated.shape);
		let materials = evaluated
			.subset_slots
			.iter()
			.map(|&slot| self.add_material(mesh.materials.get(slot)))
			.collect();
		let shape = ShapeRef { shape_id, materials };
		let kind = match armature {
			Some(armature) => NodeKind::SkinnedShape { shape, armature },
			None => NodeKind::Shape(shape),
		};

		let name = self.object(key).name.clone();
		self.graph
			.add_node(parent, name, Some(key), transform, kind)
			.map_err(|err| self.error(key, BuildStage::Placement, err))
	}

	fn add_material(&mut self, material: Option<&SourceMaterial>) -> MaterialId {
		let Some(material) = material else {
			return self.graph.add_material(Material::fallback());
		};
		let texture = material
			.diffuse_texture
			.as_deref()
			.map(|path| self.graph.add_file(File::new(path)));
		self.graph.add_material(Material {
			name: material.name.clone(),
			diffuse_color: material.diffuse_color,
			specular_color: material.specular_color,
			texture,
		})
	}

	/// Get-or-build for the armature a mesh modifier refers to.
	fn armature_node(&mut self, mesh: ObjectKey, name: &str) -> Result<I3dNodeId, BuildError> {
		let Some(key) = self.scene.find(name) else {
			return Err(self.error(mesh, BuildStage::Dependency, BuildErrorKind::MissingArmature(name.to_owned())));
		};
		let kind = self.object(key).kind();
		if kind != ObjectKind::Armature {
			return Err(self.error(
				mesh,
				BuildStage::Dependency,
				BuildErrorKind::NotAnArmature {
					name: name.to_owned(),
					kind,
				},
			));
		}

		match self.states.get(&key).copied() {
			Some(BuildState::Built { node, .. }) => Ok(node),
			Some(BuildState::InProgress) => Err(self.error(
				mesh,
				BuildStage::Dependency,
				BuildErrorKind::CyclicDependency(name.to_owned()),
			)),
			Some(BuildState::Failed) => Err(self.error(
				mesh,
				BuildStage::Dependency,
				BuildErrorKind::DependencyFailed(name.to_owned()),
			)),
			None => {
				info!("Building armature {name:?} ahead of scene order for {:?}", self.object(mesh).name);
				let root = self.graph.root();
				match self.build_object(key, root, false) {
					Ok(node) => Ok(node),
					Err(error) => {
						self.recover(error)?;
						Err(self.error(
							mesh,
							BuildStage::Dependency,
							BuildErrorKind::DependencyFailed(name.to_owned()),
						))
					}
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use glam::{Mat4, Quat, Vec3};

	use super::*;
	use crate::math::transform::convert_space;
	use crate::source::{Geometry, Modifier, SourceArmature, SourceBone, SourceCamera};

	fn empty(name: &str) -> SourceObject {
		SourceObject::new(name, ObjectData::Empty)
	}

	fn triangle() -> Geometry {
		Geometry {
			positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
			normals: vec![Vec3::Z; 3],
			triangles: vec![[0, 1, 2]],
			vertex_groups: vec!["A".to_owned(), "C".to_owned()],
			weights: vec![vec![(0, 1.0)], vec![(0, 0.5), (1, 0.5)], vec![(1, 2.0)]],
			..Default::default()
		}
	}

	fn mesh(name: &str, armature: Option<&str>) -> SourceObject {
		SourceObject::new(
			name,
			ObjectData::Mesh(SourceMesh {
				name: format!("{name}_data"),
				evaluated: triangle(),
				materials: Vec::new(),
				modifiers: armature
					.map(|object| Modifier::Armature {
						object: object.to_owned(),
					})
					.into_iter()
					.collect(),
			}),
		)
	}

	/// A -> B -> C, each one unit further along Z.
	fn chain_armature(name: &str) -> SourceObject {
		let bone = |name: &str, parent: Option<usize>, z: f32| SourceBone {
			name: name.to_owned(),
			parent,
			matrix_local: Mat4::from_translation(Vec3::new(0.0, 0.0, z)),
		};
		SourceObject::new(
			name,
			ObjectData::Armature(SourceArmature {
				bones: vec![bone("B", Some(2), 2.0), bone("C", Some(0), 3.0), bone("A", None, 1.0)],
			}),
		)
	}

	fn scene(objects: Vec<SourceObject>) -> SourceScene {
		let mut scene = SourceScene::new();
		for object in objects {
			scene.add(object).unwrap();
		}
		scene.validate().unwrap();
		scene
	}

	fn build(scene: &SourceScene) -> SceneBuild {
		build_scene_graph(scene, BuildOptions::default()).unwrap()
	}

	fn node_named<'g>(graph: &'g SceneGraph, name: &str) -> &'g crate::scene::node::SceneNode {
		graph.pre_order().find(|node| node.name == name).unwrap()
	}

	#[test]
	fn forest_gives_one_node_per_object_plus_root() {
		let scene = scene(vec![
			empty("a"),
			empty("b").with_parent("a"),
			empty("c").with_parent("a"),
			empty("d"),
			empty("e").with_parent("d"),
		]);
		let build = build(&scene);
		let graph = &build.graph;

		assert!(build.warnings.is_empty());
		assert_eq!(graph.len(), scene.len() + 1);
		assert_eq!(graph.pre_order().count(), graph.len());

		let mut ids = graph.pre_order().map(|node| node.id).collect::<Vec<_>>();
		ids.sort();
		ids.dedup();
		assert_eq!(ids.len(), graph.len());

		for node in graph.pre_order().skip(1) {
			let parent = graph.get_parent(node.id).unwrap();
			let source_parent = node.source.and_then(|key| scene.parent_of(key));
			assert_eq!(parent.source, source_parent);
		}
	}

	#[test]
	fn root_level_transform_is_converted_source_matrix() {
		let matrix = Mat4::from_rotation_translation(Quat::from_rotation_z(0.4), Vec3::new(1.0, 2.0, 3.0));
		let scene = scene(vec![empty("a").with_matrix(matrix)]);
		let build = build(&scene);
		let node = node_named(&build.graph, "a");
		assert!(node.transform.abs_diff_eq(convert_space(matrix), 1e-6));
	}

	#[test]
	fn child_transform_is_parent_relative() {
		let scene = scene(vec![
			empty("a").with_matrix(Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0))),
			empty("b")
				.with_parent("a")
				.with_matrix(Mat4::from_translation(Vec3::new(1.0, 0.0, 5.0))),
		]);
		let build = build(&scene);
		let b = node_named(&build.graph, "b");
		assert!(b
			.transform
			.abs_diff_eq(Mat4::from_translation(Vec3::new(0.0, 5.0, 0.0)), 1e-6));
	}

	#[test]
	fn selection_only_attaches_orphans_to_root() {
		let scene = scene(vec![
			empty("a").with_selected(false),
			empty("b").with_parent("a"),
			empty("c"),
		]);
		let build = build_scene_graph(
			&scene,
			BuildOptions {
				selection_only: true,
				..Default::default()
			},
		)
		.unwrap();
		let graph = &build.graph;
		assert_eq!(graph.len(), 3);
		let names = graph.children(graph.root()).map(|n| n.name.as_str()).collect::<Vec<_>>();
		assert_eq!(names, ["b", "c"]);
	}

	#[test]
	fn instanced_geometry_shares_one_shape() {
		let scene = scene(vec![mesh("first", None), mesh("second", None)]);
		let build = build(&scene);
		let graph = &build.graph;
		assert_eq!(graph.shapes.len(), 1);
		let first = node_named(graph, "first").kind.shape().unwrap();
		let second = node_named(graph, "second").kind.shape().unwrap();
		assert_eq!(first.shape_id, second.shape_id);
		assert_eq!(graph.materials.len(), 1);
		assert_eq!(first.materials, second.materials);
	}

	#[test]
	fn skinned_mesh_binds_bones_in_pre_order() {
		let scene = scene(vec![chain_armature("rig"), mesh("body", Some("rig")).with_parent("rig")]);
		let build = build(&scene);
		let graph = &build.graph;

		// root + armature + 3 bones + shape
		assert_eq!(graph.len(), 6);
		let rig = node_named(graph, "rig");
		assert_eq!(rig.kind, NodeKind::ArmatureRoot);

		let ids = ["A", "B", "C"].map(|name| node_named(graph, name).id);
		let chain = graph.skeleton(rig.id).unwrap();
		assert_eq!(chain.bones(), ids);
		assert_eq!(chain.skin_bind_ids(), format!("{} {} {}", ids[0], ids[1], ids[2]));
		assert_eq!(chain.bone_index("C"), Some(2));

		assert_eq!(graph.get_parent(ids[0]).unwrap().id, rig.id);
		assert_eq!(graph.get_parent(ids[1]).unwrap().id, ids[0]);
		assert_eq!(graph.get_parent(ids[2]).unwrap().id, ids[1]);

		let body = node_named(graph, "body");
		let NodeKind::SkinnedShape { shape, armature } = &body.kind else {
			panic!("expected skinned shape, got {:?}", body.kind);
		};
		assert_eq!(*armature, rig.id);

		let shape = graph.shapes.get(shape.shape_id).unwrap();
		assert_eq!(shape.bone_mapping.as_deref().unwrap(), ["A", "B", "C"]);
		let blend = shape.vertices[1].blend.unwrap();
		assert_eq!(blend.bones[..2], [0, 2]);
		assert_eq!(blend.weights[..2], [0.5, 0.5]);
		assert_eq!(shape.vertices[2].blend.unwrap().weights[0], 1.0);
	}

	#[test]
	fn root_bone_uses_its_own_armature_space_matrix() {
		let scene = scene(vec![chain_armature("rig")]);
		let build = build(&scene);
		let a = node_named(&build.graph, "A");
		let b = node_named(&build.graph, "B");
		let expected_a = convert_space(Mat4::from_translation(Vec3::new(0.0, 0.0, 1.0)));
		assert!(a.transform.abs_diff_eq(expected_a, 1e-6));
		// B sits one unit above A
		assert!(b
			.transform
			.abs_diff_eq(Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)), 1e-6));
	}

	#[test]
	fn armature_referenced_before_scene_order_is_built_once_then_placed() {
		let scene = scene(vec![
			mesh("body", Some("rig")),
			empty("holder").with_matrix(Mat4::from_translation(Vec3::new(0.0, 0.0, 2.0))),
			chain_armature("rig")
				.with_parent("holder")
				.with_matrix(Mat4::from_translation(Vec3::new(0.0, 0.0, 3.0))),
		]);
		let build = build(&scene);
		let graph = &build.graph;

		assert!(build.warnings.is_empty());
		// root + body + holder + rig + 3 bones
		assert_eq!(graph.len(), 7);
		let rig = node_named(graph, "rig");
		assert_eq!(graph.get_parent(rig.id).unwrap().name, "holder");
		assert!(rig
			.transform
			.abs_diff_eq(Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)), 1e-6));

		let body = node_named(graph, "body");
		assert!(matches!(body.kind, NodeKind::SkinnedShape { armature, .. } if armature == rig.id));
		// the armature was built first, on demand
		assert!(rig.id < body.id);
	}

	#[test]
	fn unselected_armature_stays_at_root() {
		let scene = scene(vec![
			chain_armature("rig").with_selected(false),
			mesh("body", Some("rig")).with_parent("rig"),
		]);
		let build = build_scene_graph(
			&scene,
			BuildOptions {
				selection_only: true,
				..Default::default()
			},
		)
		.unwrap();
		let graph = &build.graph;
		let names = graph.children(graph.root()).map(|n| n.name.as_str()).collect::<Vec<_>>();
		assert_eq!(names, ["rig", "body"]);
	}

	#[test]
	fn missing_armature_skips_only_that_mesh() {
		let scene = scene(vec![
			mesh("body", Some("ghost")),
			empty("child").with_parent("body"),
			empty("sibling"),
		]);
		let build = build(&scene);
		assert_eq!(build.graph.len(), 2);
		assert_eq!(build.warnings.len(), 1);
		let warning = &build.warnings[0];
		assert_eq!(warning.object, "body");
		assert_eq!(warning.stage, BuildStage::Dependency);
		assert!(matches!(warning.kind, BuildErrorKind::MissingArmature(ref name) if name == "ghost"));
	}

	#[test]
	fn modifier_on_non_armature_is_reported() {
		let scene = scene(vec![empty("target"), mesh("body", Some("target"))]);
		let build = build(&scene);
		assert!(matches!(
			build.warnings[0].kind,
			BuildErrorKind::NotAnArmature {
				kind: ObjectKind::Empty,
				..
			}
		));
	}

	#[test]
	fn singular_parent_names_the_child() {
		let scene = scene(vec![
			empty("flat").with_matrix(Mat4::from_scale(Vec3::new(1.0, 1.0, 0.0))),
			empty("child").with_parent("flat"),
		]);
		let build = build(&scene);
		assert_eq!(build.graph.len(), 2);
		let warning = &build.warnings[0];
		assert_eq!(warning.object, "child");
		assert_eq!(warning.stage, BuildStage::Transform);
		assert!(warning.to_string().contains("\"child\""));
	}

	#[test]
	fn strict_mode_aborts() {
		let scene = scene(vec![mesh("body", Some("ghost")), empty("sibling")]);
		let err = build_scene_graph(
			&scene,
			BuildOptions {
				strict: true,
				..Default::default()
			},
		)
		.unwrap_err();
		assert_eq!(err.object, "body");
	}

	#[test]
	fn broken_bone_hierarchy_removes_the_armature() {
		let mut armature = chain_armature("rig");
		if let ObjectData::Armature(data) = &mut armature.data {
			data.bones[2].parent = Some(1);
		}
		let scene = scene(vec![armature, mesh("body", Some("rig")), empty("other")]);
		let build = build(&scene);
		let graph = &build.graph;

		assert_eq!(graph.len(), 2);
		assert_eq!(node_named(graph, "other").id.get(), 2);
		// armature failure, then the mesh that needed it
		assert_eq!(build.warnings.len(), 2);
		assert_eq!(build.warnings[0].stage, BuildStage::Skeleton);
		assert!(matches!(build.warnings[1].kind, BuildErrorKind::DependencyFailed(_)));
	}

	#[test]
	fn in_progress_dependency_is_a_cycle() {
		let scene = scene(vec![chain_armature("rig"), mesh("body", Some("rig"))]);
		let mut builder = SceneBuilder::new(&scene, BuildOptions::default());
		let rig = scene.find("rig").unwrap();
		let body = scene.find("body").unwrap();
		builder.states.insert(rig, BuildState::InProgress);

		let err = builder.armature_node(body, "rig").unwrap_err();
		assert!(matches!(err.kind, BuildErrorKind::CyclicDependency(_)));
	}

	#[test]
	fn camera_gets_view_axis_correction() {
		let camera = SourceObject::new(
			"cam",
			ObjectData::Camera(SourceCamera {
				fov: 50.0,
				near_clip: 0.1,
				far_clip: 100.0,
			}),
		);
		let scene = scene(vec![camera, empty("child").with_parent("cam")]);
		let build = build(&scene);
		let cam = node_named(&build.graph, "cam");
		let forward = cam.transform.transform_vector3(-Vec3::Z);
		assert!(forward.abs_diff_eq(-Vec3::Y, 1e-6));
		// children cancel the correction again
		let child = node_named(&build.graph, "child");
		let world = cam.transform * child.transform;
		assert!(world.abs_diff_eq(Mat4::IDENTITY, 1e-6));
	}

	#[test]
	fn parent_cycles_are_reported() {
		let mut scene = SourceScene::new();
		scene.add(empty("loop").with_parent("loop")).unwrap();
		scene.add(empty("ok")).unwrap();
		let single = build(&scene);
		assert_eq!(single.graph.len(), scene.len());
		assert_eq!(single.warnings.len(), 1);
		let warning = &single.warnings[0];
		assert_eq!(warning.object, "loop");
		assert_eq!(warning.stage, BuildStage::Dependency);
		assert!(matches!(
			warning.kind,
			BuildErrorKind::Scene(SourceSceneError::ParentCycle(ref name)) if name == "loop"
		));

		let mut scene = SourceScene::new();
		scene.add(empty("a").with_parent("b")).unwrap();
		scene.add(empty("b").with_parent("a")).unwrap();
		scene.add(empty("c").with_parent("a")).unwrap();
		let pair = build(&scene);
		assert_eq!(pair.graph.len(), 1);
		let failed = pair.warnings.iter().map(|w| w.object.as_str()).collect::<Vec<_>>();
		assert_eq!(failed, ["a", "b", "c"]);

		let err = build_scene_graph(
			&scene,
			BuildOptions {
				strict: true,
				..Default::default()
			},
		)
		.unwrap_err();
		assert_eq!(err.object, "a");
	}

	#[test]
	fn failed_mesh_leaves_no_table_entries() {
		let mut textured = mesh("body", None);
		if let ObjectData::Mesh(data) = &mut textured.data {
			let mut material = SourceMaterial::new("skin");
			material.diffuse_texture = Some("skin.dds".to_owned());
			data.materials.push(material);
		}
		let scene = scene(vec![
			empty("flat").with_matrix(Mat4::from_scale(Vec3::new(1.0, 1.0, 0.0))),
			textured.with_parent("flat"),
		]);
		let build = build(&scene);
		let graph = &build.graph;

		assert_eq!(build.warnings.len(), 1);
		assert_eq!(build.warnings[0].stage, BuildStage::Transform);
		assert_eq!(graph.len(), 2);
		assert!(graph.shapes.is_empty());
		assert!(graph.materials.is_empty());
		assert!(graph.files.is_empty());
	}

	#[test]
	fn flattened_leaf_keeps_a_finite_rotation() {
		let scene = scene(vec![empty("flat").with_matrix(Mat4::from_scale(Vec3::new(1.0, 1.0, 0.0)))]);
		let build = build(&scene);
		assert!(build.warnings.is_empty());
		let transform = node_named(&build.graph, "flat").engine_transform();
		assert_eq!(transform.rotation, Vec3::ZERO);
		assert_eq!(transform.scale, Vec3::new(1.0, 0.0, 1.0));
	}

	#[test]
	fn armature_that_cannot_be_placed_stays_at_root() {
		let scene = scene(vec![
			mesh("body", Some("rig")),
			empty("holder").with_matrix(Mat4::from_scale(Vec3::new(1.0, 1.0, 0.0))),
			chain_armature("rig").with_parent("holder"),
		]);
		let build = build(&scene);
		let graph = &build.graph;

		assert_eq!(build.warnings.len(), 1);
		assert_eq!(build.warnings[0].object, "rig");
		assert_eq!(build.warnings[0].stage, BuildStage::Transform);

		// root + rig + 3 bones + body + holder
		assert_eq!(graph.len(), 7);
		let rig = node_named(graph, "rig");
		assert_eq!(graph.get_parent(rig.id).unwrap().id, graph.root());
		let body = node_named(graph, "body");
		assert!(matches!(body.kind, NodeKind::SkinnedShape { armature, .. } if armature == rig.id));
	}
}
