//! Turns a finished [`SceneGraph`] into an i3D document.

use tracing::debug;

use super::xml::{fmt, XmlElement};
use crate::scene::node::{NodeKind, SceneNode};
use crate::scene::tables::{File, FileId, Material, MaterialId, Shape, ShapeId};
use crate::scene::SceneGraph;
use crate::source::LightType;
use crate::{EXPORTER_NAME, EXPORTER_VERSION, I3D_VERSION};

const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
const SCHEMA_LOCATION: &str = "http://i3d.giants.ch/schema/i3d-1.6.xsd";

/// Top level sections, in the order the engine expects them.
pub const SECTIONS: [&str; 8] = [
	"Asset",
	"Files",
	"Materials",
	"Shapes",
	"Dynamics",
	"Scene",
	"Animation",
	"UserAttributes",
];

/// Builds the unindented document for `graph`. `name` ends up on the root element.
pub fn build_document(graph: &SceneGraph, name: &str) -> XmlElement {
	let mut root = XmlElement::new("i3D")
		.with("name", name)
		.with("version", I3D_VERSION)
		.with("xmlns:xsi", XSI_NAMESPACE)
		.with("xsi:noNamespaceSchemaLocation", SCHEMA_LOCATION);

	for section in SECTIONS {
		root.push(XmlElement::new(section));
	}

	root.children[0].push(
		XmlElement::new("Export")
			.with("program", EXPORTER_NAME)
			.with("version", EXPORTER_VERSION),
	);

	for (id, file) in graph.files.iter() {
		root.children[1].push(file_element(id, file));
	}
	for (id, material) in graph.materials.iter() {
		root.children[2].push(material_element(id, material));
	}
	for (id, shape) in graph.shapes.iter() {
		root.children[3].push(shape_element(id, shape));
	}
	for node in graph.children(graph.root()) {
		root.children[5].push(scene_element(graph, node));
	}

	debug!(
		"Built document with {} files, {} materials, {} shapes",
		graph.files.len(),
		graph.materials.len(),
		graph.shapes.len()
	);
	root
}

fn file_element(id: FileId, file: &File) -> XmlElement {
	let mut element = XmlElement::new("File");
	element.set_int("fileId", id.get()).set_str("filename", file.filename.as_str());
	element
}

fn material_element(id: MaterialId, material: &Material) -> XmlElement {
	let mut element = XmlElement::new("Material");
	element
		.set_str("name", material.name.as_str())
		.set_int("materialId", id.get())
		.set_floats("diffuseColor", &material.diffuse_color.to_array())
		.set_floats("specularColor", &material.specular_color.to_array());
	if let Some(file) = material.texture {
		element.push(XmlElement::new("Texture")).set_int("fileId", file.get());
	}
	element
}

fn shape_element(id: ShapeId, shape: &Shape) -> XmlElement {
	let mut element = XmlElement::new("IndexedTriangleSet");
	element.set_str("name", shape.name.as_str()).set_int("shapeId", id.get());

	let vertices = element.push(XmlElement::new("Vertices"));
	vertices.set_int("count", shape.vertices.len() as u32);
	if shape.has_normals() {
		vertices.set_bool("normal", true);
	}
	if shape.has_uvs() {
		vertices.set_bool("uv0", true);
	}
	if shape.is_skinned() {
		vertices.set_bool("blendweights", true);
	}
	for vertex in &shape.vertices {
		let v = vertices.push(XmlElement::new("v"));
		v.set_floats("p", &vertex.position.to_array());
		if let Some(normal) = vertex.normal {
			v.set_floats("n", &normal.to_array());
		}
		if let Some(uv) = vertex.uv {
			v.set_floats("t0", &uv.to_array());
		}
		if let Some(blend) = vertex.blend {
			v.set_floats("bw", &blend.weights);
			v.set_str("bi", fmt::ints(&blend.bones));
		}
	}

	let triangles = element.push(XmlElement::new("Triangles"));
	triangles.set_int("count", shape.triangles.len() as u32);
	for triangle in &shape.triangles {
		triangles.push(XmlElement::new("t")).set_str("vi", fmt::ints(triangle));
	}

	let subsets = element.push(XmlElement::new("Subsets"));
	subsets.set_int("count", shape.subsets.len() as u32);
	for subset in &shape.subsets {
		subsets
			.push(XmlElement::new("Subset"))
			.set_int("firstVertex", subset.first_vertex)
			.set_int("numVertices", subset.num_vertices)
			.set_int("firstIndex", subset.first_index)
			.set_int("numIndices", subset.num_indices);
	}

	element
}

fn scene_element(graph: &SceneGraph, node: &SceneNode) -> XmlElement {
	let tag = match node.kind {
		NodeKind::Root | NodeKind::TransformGroup | NodeKind::ArmatureRoot | NodeKind::Bone => "TransformGroup",
		NodeKind::Shape(_) | NodeKind::SkinnedShape { .. } => "Shape",
		NodeKind::Light(_) => "Light",
		NodeKind::Camera(_) => "Camera",
	};

	let transform = node.engine_transform();
	let mut element = XmlElement::new(tag);
	element
		.set_str("name", node.name.as_str())
		.set_int("nodeId", node.id.get())
		.set_floats("translation", &transform.translation.to_array())
		.set_floats("rotation", &transform.rotation.to_array())
		.set_floats("scale", &transform.scale.to_array());

	match &node.kind {
		NodeKind::Shape(shape) => {
			element
				.set_int("shapeId", shape.shape_id.get())
				.set_str("materialIds", material_ids(&shape.materials));
		}
		NodeKind::SkinnedShape { shape, armature } => {
			element
				.set_int("shapeId", shape.shape_id.get())
				.set_str("materialIds", material_ids(&shape.materials));
			if let Some(chain) = graph.skeleton(*armature) {
				element.set_str("skinBindNodeIds", chain.skin_bind_ids());
			}
		}
		NodeKind::Light(light) => {
			element
				.set_str(
					"type",
					match light.light_type {
						LightType::Point => "point",
						LightType::Directional => "directional",
						LightType::Spot => "spot",
					},
				)
				.set_floats("color", &light.color.to_array())
				.set_float("range", light.range)
				.set_bool("castShadowMap", light.cast_shadows);
			if light.light_type == LightType::Spot {
				element.set_float("coneAngle", light.cone_angle);
			}
		}
		NodeKind::Camera(camera) => {
			element
				.set_float("fov", camera.fov)
				.set_float("nearClip", camera.near_clip)
				.set_float("farClip", camera.far_clip);
		}
		NodeKind::Root | NodeKind::TransformGroup | NodeKind::ArmatureRoot | NodeKind::Bone => (),
	}

	for child in graph.children(node.id) {
		element.push(scene_element(graph, child));
	}
	element
}

fn material_ids(materials: &[MaterialId]) -> String {
	materials.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
	use glam::{Mat4, Vec3};

	use super::*;
	use crate::formats::xml::indent;
	use crate::scene::{build_scene_graph, BuildOptions};
	use crate::source::{
		Geometry, Modifier, ObjectData, SourceArmature, SourceBone, SourceLight, SourceMaterial, SourceMesh,
		SourceObject, SourceScene,
	};

	fn rigged_scene() -> SourceScene {
		let bone = |name: &str, parent: Option<usize>, z: f32| SourceBone {
			name: name.to_owned(),
			parent,
			matrix_local: Mat4::from_translation(Vec3::new(0.0, 0.0, z)),
		};
		let armature = SourceObject::new(
			"rig",
			ObjectData::Armature(SourceArmature {
				bones: vec![bone("A", None, 0.0), bone("B", Some(0), 1.0), bone("C", Some(1), 2.0)],
			}),
		);

		let mut material = SourceMaterial::new("skin");
		material.diffuse_texture = Some("textures\\skin.dds".to_owned());
		let mesh = SourceObject::new(
			"body",
			ObjectData::Mesh(SourceMesh {
				name: "body_mesh".to_owned(),
				evaluated: Geometry {
					positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
					normals: vec![Vec3::Z; 3],
					triangles: vec![[0, 1, 2]],
					vertex_groups: vec!["B".to_owned()],
					weights: vec![vec![(0, 1.0)], vec![], vec![(0, 0.5)]],
					..Default::default()
				},
				materials: vec![material],
				modifiers: vec![Modifier::Armature {
					object: "rig".to_owned(),
				}],
			}),
		)
		.with_parent("rig");

		let lamp = SourceObject::new(
			"lamp",
			ObjectData::Light(SourceLight {
				light_type: LightType::Spot,
				color: Vec3::ONE,
				range: 10.0,
				cone_angle: 45.0,
				cast_shadows: true,
			}),
		);

		let mut scene = SourceScene::new();
		for object in [armature, mesh, lamp] {
			scene.add(object).unwrap();
		}
		scene
	}

	fn document(scene: &SourceScene) -> XmlElement {
		let build = build_scene_graph(scene, BuildOptions::default()).unwrap();
		assert!(build.warnings.is_empty());
		build_document(&build.graph, "rigged")
	}

	#[test]
	fn empty_scene_has_every_section() {
		let root = build_document(&SceneGraph::new(), "empty");
		assert_eq!(root.tag, "i3D");
		assert_eq!(
			root.attributes
				.iter()
				.map(|(k, v)| (k.as_str(), v.as_str()))
				.collect::<Vec<_>>(),
			[
				("name", "empty"),
				("version", "1.6"),
				("xmlns:xsi", XSI_NAMESPACE),
				("xsi:noNamespaceSchemaLocation", SCHEMA_LOCATION),
			]
		);

		let tags = root.children.iter().map(|c| c.tag.as_str()).collect::<Vec<_>>();
		assert_eq!(tags, SECTIONS);
		let export = root.child("Asset").unwrap().child("Export").unwrap();
		assert_eq!(export.attr("program"), Some(EXPORTER_NAME));
		for section in &root.children[1..] {
			assert!(section.children.is_empty(), "{} is not empty", section.tag);
		}
	}

	#[test]
	fn skinned_shape_carries_bone_ids() {
		let root = document(&rigged_scene());
		let scene = root.child("Scene").unwrap();
		let rig = scene.child("TransformGroup").unwrap();
		assert_eq!(rig.attr("name"), Some("rig"));

		let bones = rig
			.descendants()
			.into_iter()
			.filter(|e| matches!(e.attr("name"), Some("A" | "B" | "C")))
			.map(|e| e.attr("nodeId").unwrap())
			.collect::<Vec<_>>();
		assert_eq!(bones.len(), 3);

		let body = rig.child("Shape").unwrap();
		assert_eq!(body.attr("skinBindNodeIds"), Some(bones.join(" ").as_str()));
		assert_eq!(body.attr("shapeId"), Some("1"));
		assert_eq!(body.attr("materialIds"), Some("1"));

		let vertices = root
			.child("Shapes")
			.unwrap()
			.child("IndexedTriangleSet")
			.unwrap()
			.child("Vertices")
			.unwrap();
		assert_eq!(vertices.attr("count"), Some("3"));
		assert_eq!(vertices.attr("blendweights"), Some("true"));
		assert_eq!(vertices.attr("uv0"), None);
		let first = &vertices.children[0];
		assert_eq!(first.attr("bw"), Some("1.0000000 0.0000000 0.0000000 0.0000000"));
		assert_eq!(first.attr("bi"), Some("1 0 0 0"));
		// unweighted vertices follow the first bone
		assert_eq!(vertices.children[1].attr("bi"), Some("0 0 0 0"));
	}

	#[test]
	fn materials_and_files_are_linked() {
		let root = document(&rigged_scene());
		let file = root.child("Files").unwrap().child("File").unwrap();
		assert_eq!(file.attr("fileId"), Some("1"));
		assert_eq!(file.attr("filename"), Some("textures/skin.dds"));

		let material = root.child("Materials").unwrap().child("Material").unwrap();
		assert_eq!(material.attr("name"), Some("skin"));
		assert_eq!(material.attr("diffuseColor"), Some("0.8000000 0.8000000 0.8000000 1.0000000"));
		assert_eq!(material.child("Texture").unwrap().attr("fileId"), Some("1"));
	}

	#[test]
	fn light_attributes() {
		let root = document(&rigged_scene());
		let light = root.child("Scene").unwrap().child("Light").unwrap();
		assert_eq!(light.attr("type"), Some("spot"));
		assert_eq!(light.attr("range"), Some("10.0000000"));
		assert_eq!(light.attr("coneAngle"), Some("45.0000000"));
		assert_eq!(light.attr("castShadowMap"), Some("true"));
	}

	#[test]
	fn written_document_parses_back() {
		let mut root = document(&rigged_scene());
		indent(&mut root, 0);
		let parsed = XmlElement::parse(&root.to_latin1()).unwrap();
		assert_eq!(parsed, root);

		let node_ids = parsed
			.child("Scene")
			.unwrap()
			.descendants()
			.into_iter()
			.skip(1)
			.map(|e| e.attr("nodeId").unwrap().parse::<u32>().unwrap())
			.collect::<Vec<_>>();
		assert_eq!(node_ids.len(), 6);
		assert!(node_ids.iter().all(|&id| id > 0));
	}
}
