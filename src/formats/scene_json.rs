//! JSON dumps of a host scene, as written by the host bindings for offline export.
//!
//! ```json
//! { "objects": [ { "name": "Cube", "type": "MESH", "parent": null, "matrix_world": [ 16 floats ], "mesh": { ... } } ] }
//! ```

use glam::Mat4;
use json::JsonValue;

use super::json::{indices, JsonError, JsonObject, SerialExtend};
use crate::source::{
	Geometry, LightType, Modifier, ObjectData, SourceArmature, SourceBone, SourceCamera, SourceLight, SourceMaterial,
	SourceMesh, SourceObject, SourceScene, SourceSceneError,
};

pub type SceneJsonResult<T> = Result<T, SceneJsonError>;

#[derive(Debug, thiserror::Error)]
pub enum SceneJsonError {
	#[error("Could not parse JSON\n  - {0}")]
	Syntax(#[from] json::Error),
	#[error(transparent)]
	JsonError(#[from] JsonError),
	#[error("Unknown object type {0:?}")]
	UnknownObjectType(String),
	#[error("Unknown light type {0:?}")]
	UnknownLightType(String),
	#[error("Error in object {name:?}\n  - {inner}")]
	InObject { name: String, inner: Box<SceneJsonError> },
	#[error("Inconsistent scene\n  - {0}")]
	Scene(#[from] SourceSceneError),
}

impl SceneJsonError {
	pub fn nested(self, key: &str) -> Self {
		match self {
			SceneJsonError::JsonError(err) => SceneJsonError::JsonError(err.nested(key)),
			_ => self,
		}
	}
}

fn vals<T>(key: &str, res: SceneJsonResult<T>) -> SceneJsonResult<T> {
	res.map_err(|e| e.nested(key))
}

fn as_object<'file>(msg: &str, val: &'file JsonValue) -> SceneJsonResult<JsonObject<'file>> {
	if let Some(obj) = val.as_object() {
		Ok(JsonObject(obj))
	} else {
		Err(SceneJsonError::JsonError(JsonError::ValueIsNotObject(msg.to_owned())))
	}
}

/// Parses a scene dump and checks that its parent links resolve.
pub fn parse_scene(src: &str) -> SceneJsonResult<SourceScene> {
	let payload = json::parse(src)?;
	let root = as_object("(scene)", &payload)?;

	let mut scene = SourceScene::new();
	for (index, value) in root.get_list("objects")?.iter().enumerate() {
		let obj = as_object(&index.to_string(), value).map_err(|e| e.nested("objects"))?;
		let name = obj.get_str("name")?;
		let object = deserialize_object(name, obj).map_err(|inner| SceneJsonError::InObject {
			name: name.to_owned(),
			inner: Box::new(inner),
		})?;
		scene.add(object)?;
	}
	scene.validate()?;
	Ok(scene)
}

fn deserialize_object(name: &str, obj: JsonObject) -> SceneJsonResult<SourceObject> {
	let data = match obj.get_str("type")? {
		"EMPTY" => ObjectData::Empty,
		"MESH" => ObjectData::Mesh(vals("mesh", deserialize_mesh(obj.get_object("mesh")?))?),
		"ARMATURE" => ObjectData::Armature(vals("armature", deserialize_armature(obj.get_object("armature")?))?),
		"LIGHT" => ObjectData::Light(vals("light", deserialize_light(obj.get_object("light")?))?),
		"CAMERA" => ObjectData::Camera(vals("camera", deserialize_camera(obj.get_object("camera")?))?),
		unknown => return Err(SceneJsonError::UnknownObjectType(unknown.to_owned())),
	};

	let mut object = SourceObject::new(name, data)
		.with_matrix(optional_matrix(obj, "matrix_world")?)
		.with_selected(obj.get_bool_or("selected", true)?);
	if let Some(parent) = obj.get_nullable_str("parent")? {
		object = object.with_parent(parent);
	}
	Ok(object)
}

fn optional_matrix(obj: JsonObject, key: &str) -> SceneJsonResult<Mat4> {
	if obj.has(key) {
		Ok(obj.get_mat4(key)?)
	} else {
		Ok(Mat4::IDENTITY)
	}
}

fn deserialize_mesh(obj: JsonObject) -> SceneJsonResult<SourceMesh> {
	let mut materials = Vec::new();
	for (i, value) in obj.get_list_or_empty("materials")?.iter().enumerate() {
		let material = as_object(&i.to_string(), value).and_then(deserialize_material);
		materials.push(vals("materials", material)?);
	}

	let mut modifiers = Vec::new();
	for (i, value) in obj.get_list_or_empty("modifiers")?.iter().enumerate() {
		let modifier = as_object(&i.to_string(), value).and_then(deserialize_modifier);
		modifiers.push(vals("modifiers", modifier)?);
	}

	Ok(SourceMesh {
		name: obj.get_str("name")?.to_owned(),
		evaluated: deserialize_geometry(obj)?,
		materials,
		modifiers,
	})
}

fn deserialize_geometry(obj: JsonObject) -> SceneJsonResult<Geometry> {
	let triangles = obj
		.get_list_or_empty("triangles")?
		.iter()
		.enumerate()
		.map(|(i, value)| indices::<3>(&i.to_string(), value).map_err(|e| e.nested("triangles")))
		.collect::<Result<Vec<_>, _>>()?;

	let material_slots = obj
		.get_list_or_empty("material_slots")?
		.iter()
		.enumerate()
		.map(|(i, value)| {
			value
				.as_usize()
				.ok_or_else(|| JsonError::ParseIntError(i.to_string()).nested("material_slots"))
		})
		.collect::<Result<Vec<_>, _>>()?;

	let vertex_groups = obj
		.get_list_or_empty("vertex_groups")?
		.iter()
		.enumerate()
		.map(|(i, value)| {
			value
				.as_str()
				.map(str::to_owned)
				.ok_or_else(|| JsonError::ValueIsNotString(i.to_string()).nested("vertex_groups"))
		})
		.collect::<Result<Vec<_>, _>>()?;

	let mut weights = Vec::new();
	for (v, value) in obj.get_list_or_empty("weights")?.iter().enumerate() {
		weights.push(vals("weights", deserialize_vertex_weights(v, value))?);
	}

	Ok(Geometry {
		positions: obj.get_vec3s("positions")?,
		normals: obj.get_vec3s("normals")?,
		uvs: obj.get_vec2s("uvs")?,
		triangles,
		material_slots,
		vertex_groups,
		weights,
	})
}

/// `[[group, weight], ...]` for one vertex.
fn deserialize_vertex_weights(vertex: usize, value: &JsonValue) -> SceneJsonResult<Vec<(usize, f32)>> {
	let JsonValue::Array(pairs) = value else {
		return Err(JsonError::ValueIsNotList(vertex.to_string()).into());
	};
	let mut weights = Vec::with_capacity(pairs.len());
	for (i, pair) in pairs.iter().enumerate() {
		let parsed = match pair {
			JsonValue::Array(pair) if pair.len() == 2 => pair[0].as_usize().zip(pair[1].as_f32()),
			_ => None,
		};
		match parsed {
			Some(weight) => weights.push(weight),
			None => {
				let err = JsonError::ParseFloatsError {
					key: i.to_string(),
					len: 2,
					msg: "expected [group index, weight]".to_owned(),
				};
				return Err(err.in_list(vertex).into());
			}
		}
	}
	Ok(weights)
}

fn deserialize_material(obj: JsonObject) -> SceneJsonResult<SourceMaterial> {
	let mut material = SourceMaterial::new(obj.get_str("name")?);
	if obj.has("diffuse_color") {
		material.diffuse_color = obj.get_vec4("diffuse_color")?;
	}
	if obj.has("specular_color") {
		material.specular_color = obj.get_vec3("specular_color")?;
	}
	material.diffuse_texture = obj.get_nullable_str("diffuse_texture")?.map(str::to_owned);
	Ok(material)
}

fn deserialize_modifier(obj: JsonObject) -> SceneJsonResult<Modifier> {
	Ok(match obj.get_str("type")? {
		"ARMATURE" => Modifier::Armature {
			object: obj.get_str("object")?.to_owned(),
		},
		other => Modifier::Other(other.to_owned()),
	})
}

fn deserialize_armature(obj: JsonObject) -> SceneJsonResult<SourceArmature> {
	let mut bones = Vec::new();
	for (i, value) in obj.get_list("bones")?.iter().enumerate() {
		let bone = as_object(&i.to_string(), value).and_then(|bone| {
			Ok(SourceBone {
				name: bone.get_str("name")?.to_owned(),
				parent: bone.get_nullable_usize("parent")?,
				matrix_local: optional_matrix(bone, "matrix_local")?,
			})
		});
		bones.push(vals("bones", bone)?);
	}
	Ok(SourceArmature { bones })
}

fn deserialize_light(obj: JsonObject) -> SceneJsonResult<SourceLight> {
	Ok(SourceLight {
		light_type: match obj.get_str("type")? {
			"POINT" => LightType::Point,
			"SUN" | "DIRECTIONAL" => LightType::Directional,
			"SPOT" => LightType::Spot,
			unknown => return Err(SceneJsonError::UnknownLightType(unknown.to_owned())),
		},
		color: obj.get_vec3("color")?,
		range: obj.get_f32("range")?,
		cone_angle: obj.get_f32_or("cone_angle", 0.0)?,
		cast_shadows: obj.get_bool_or("cast_shadows", false)?,
	})
}

fn deserialize_camera(obj: JsonObject) -> SceneJsonResult<SourceCamera> {
	Ok(SourceCamera {
		fov: obj.get_f32("fov")?,
		near_clip: obj.get_f32("near_clip")?,
		far_clip: obj.get_f32("far_clip")?,
	})
}
