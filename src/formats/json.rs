//! Typed accessors over `json` objects, erroring with the key that was looked up.

use glam::{Mat4, Vec2, Vec3, Vec4};
use json::JsonValue;

pub(super) trait SerialExtend {
	fn as_object(&self) -> Option<&json::object::Object>;
}

impl SerialExtend for json::JsonValue {
	fn as_object(&self) -> Option<&json::object::Object> {
		if let json::JsonValue::Object(object) = self {
			Some(object)
		} else {
			None
		}
	}
}

pub type JsonResult<T> = Result<T, JsonError>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum JsonError {
	#[error("Key {0:?} does not exist")]
	KeyDoesNotExist(String),
	#[error("Value at {0:?} is not an object")]
	ValueIsNotObject(String),
	#[error("Value at {0:?} is not a list")]
	ValueIsNotList(String),
	#[error("Value at {0:?} is not a string")]
	ValueIsNotString(String),
	#[error("Value at {0:?} is not a number")]
	ValueIsNotNumber(String),
	#[error("Value at {0:?} is not a bool")]
	ValueIsNotBool(String),
	#[error("Error while parsing int at {0:?}\n  - number out of scope")]
	ParseIntError(String),
	#[error("Error while parsing {len} floats at {key:?}\n  - {msg}")]
	ParseFloatsError { key: String, len: usize, msg: String },
	#[error("Error in list at index {index}\n  - {inner}")]
	ErrorInList { index: usize, inner: Box<JsonError> },
	#[error("Error in object at {key:?}\n  - {inner}")]
	ErrorInObject { key: String, inner: Box<JsonError> },
}

impl JsonError {
	pub fn nested(self, key: &str) -> Self {
		Self::ErrorInObject {
			key: key.to_owned(),
			inner: Box::new(self),
		}
	}

	pub fn in_list(self, index: usize) -> Self {
		Self::ErrorInList {
			index,
			inner: Box::new(self),
		}
	}
}

#[derive(Clone, Copy)]
pub struct JsonObject<'a>(pub &'a json::object::Object);

impl<'a> JsonObject<'a> {
	fn get(&self, key: &str) -> JsonResult<&'a json::JsonValue> {
		match self.0.get(key) {
			Some(value) => Ok(value),
			None => Err(JsonError::KeyDoesNotExist(key.to_owned())),
		}
	}

	/// `None` when the key is missing or holds `null`.
	pub fn get_nullable(&self, key: &str) -> Option<&'a json::JsonValue> {
		self.0.get(key).filter(|value| !value.is_null())
	}

	pub fn has(&self, key: &str) -> bool {
		self.get_nullable(key).is_some()
	}

	pub fn get_object(&self, key: &str) -> JsonResult<JsonObject<'a>> {
		match self.get(key)?.as_object() {
			Some(obj) => Ok(JsonObject(obj)),
			None => Err(JsonError::ValueIsNotObject(key.to_owned())),
		}
	}

	pub fn get_list(&self, key: &str) -> JsonResult<&'a [JsonValue]> {
		match self.get(key)? {
			json::JsonValue::Array(arr) => Ok(arr),
			_ => Err(JsonError::ValueIsNotList(key.to_owned())),
		}
	}

	/// Like [`JsonObject::get_list`], but a missing or `null` list is empty.
	pub fn get_list_or_empty(&self, key: &str) -> JsonResult<&'a [JsonValue]> {
		if self.has(key) {
			self.get_list(key)
		} else {
			Ok(&[])
		}
	}

	pub fn get_nullable_str(&self, key: &str) -> JsonResult<Option<&'a str>> {
		let Some(val) = self.get_nullable(key) else {
			return Ok(None);
		};
		match val.as_str() {
			Some(val) => Ok(Some(val)),
			None => Err(JsonError::ValueIsNotString(key.to_owned())),
		}
	}

	pub fn get_str(&self, key: &str) -> JsonResult<&'a str> {
		match self.get(key)?.as_str() {
			Some(val) => Ok(val),
			None => Err(JsonError::ValueIsNotString(key.to_owned())),
		}
	}

	fn get_number(&self, key: &str) -> JsonResult<json::number::Number> {
		match self.get(key)?.as_number() {
			Some(val) => Ok(val),
			None => Err(JsonError::ValueIsNotNumber(key.to_owned())),
		}
	}

	pub fn get_f32(&self, key: &str) -> JsonResult<f32> {
		Ok(self.get_number(key)?.into())
	}

	/// `default` when the key is missing or `null`, an error when it holds something else.
	pub fn get_f32_or(&self, key: &str, default: f32) -> JsonResult<f32> {
		if self.has(key) {
			self.get_f32(key)
		} else {
			Ok(default)
		}
	}

	pub fn get_usize(&self, key: &str) -> JsonResult<usize> {
		self.get_number(key)?
			.try_into()
			.map_err(|_| JsonError::ParseIntError(key.to_owned()))
	}

	pub fn get_nullable_usize(&self, key: &str) -> JsonResult<Option<usize>> {
		if self.has(key) {
			self.get_usize(key).map(Some)
		} else {
			Ok(None)
		}
	}

	pub fn get_bool(&self, key: &str) -> JsonResult<bool> {
		match self.get(key)?.as_bool() {
			Some(val) => Ok(val),
			None => Err(JsonError::ValueIsNotBool(key.to_owned())),
		}
	}

	pub fn get_bool_or(&self, key: &str, default: bool) -> JsonResult<bool> {
		if self.has(key) {
			self.get_bool(key)
		} else {
			Ok(default)
		}
	}

	pub fn get_vec3(&self, key: &str) -> JsonResult<Vec3> {
		Ok(Vec3::from_array(floats(key, self.get(key)?)?))
	}

	pub fn get_vec4(&self, key: &str) -> JsonResult<Vec4> {
		Ok(Vec4::from_array(floats(key, self.get(key)?)?))
	}

	/// Sixteen floats, column major.
	pub fn get_mat4(&self, key: &str) -> JsonResult<Mat4> {
		Ok(Mat4::from_cols_array(&floats(key, self.get(key)?)?))
	}

	/// A list of `[x, y]` pairs.
	pub fn get_vec2s(&self, key: &str) -> JsonResult<Vec<Vec2>> {
		self.float_lists::<2>(key).map(|lists| lists.into_iter().map(Vec2::from_array).collect())
	}

	/// A list of `[x, y, z]` triples.
	pub fn get_vec3s(&self, key: &str) -> JsonResult<Vec<Vec3>> {
		self.float_lists::<3>(key).map(|lists| lists.into_iter().map(Vec3::from_array).collect())
	}

	fn float_lists<const N: usize>(&self, key: &str) -> JsonResult<Vec<[f32; N]>> {
		self.get_list_or_empty(key)?
			.iter()
			.enumerate()
			.map(|(i, value)| floats(&i.to_string(), value).map_err(|e| e.in_list(i).nested(key)))
			.collect()
	}
}

/// Reads a list of exactly `N` numbers.
pub fn floats<const N: usize>(key: &str, value: &JsonValue) -> JsonResult<[f32; N]> {
	let JsonValue::Array(list) = value else {
		return Err(JsonError::ValueIsNotList(key.to_owned()));
	};
	if list.len() != N {
		return Err(JsonError::ParseFloatsError {
			key: key.to_owned(),
			len: N,
			msg: format!("expected list of length {N}, but has length {}", list.len()),
		});
	}

	let mut out = [0.0; N];
	for (slot, value) in out.iter_mut().zip(list) {
		*slot = match value.as_f32() {
			Some(val) => val,
			None => {
				return Err(JsonError::ParseFloatsError {
					key: key.to_owned(),
					len: N,
					msg: "expected float, but did not get a number".to_owned(),
				})
			}
		};
	}
	Ok(out)
}

/// Reads a list of exactly `N` unsigned integers.
pub fn indices<const N: usize>(key: &str, value: &JsonValue) -> JsonResult<[u32; N]> {
	let JsonValue::Array(list) = value else {
		return Err(JsonError::ValueIsNotList(key.to_owned()));
	};
	if list.len() != N {
		return Err(JsonError::ParseIntError(key.to_owned()));
	}

	let mut out = [0; N];
	for (slot, value) in out.iter_mut().zip(list) {
		*slot = value.as_u32().ok_or_else(|| JsonError::ParseIntError(key.to_owned()))?;
	}
	Ok(out)
}
