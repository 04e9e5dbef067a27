use glam::{EulerRot, Mat3, Mat4, Quat, Vec3};

/// Smallest absolute determinant a parent matrix may have and still be inverted.
const SINGULAR_EPSILON: f32 = 1e-12;

/// Axes shorter than this count as flattened when splitting a matrix.
const FLAT_AXIS_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransformError {
	#[error("parent matrix is singular (determinant {0})")]
	SingularMatrix(f32),
	#[error("matrix contains non-finite values")]
	NonFinite,
}

/// Change of basis from the tool's space (Z up, -Y forward) into engine space (Y up, -Z forward).
///
/// Maps `(x, y, z)` to `(x, z, -y)`.
pub fn conversion_matrix() -> Mat4 {
	Mat4::from_cols_array(&[
		1.0, 0.0, 0.0, 0.0, //
		0.0, 0.0, -1.0, 0.0, //
		0.0, 1.0, 0.0, 0.0, //
		0.0, 0.0, 0.0, 1.0,
	])
}

/// Extra local rotation for nodes that look down their -Z axis (lights and cameras).
///
/// After the change of basis their viewing axis points down engine -Y, this turns it back onto -Z.
pub fn view_axis_correction() -> Mat4 {
	Mat4::from_rotation_x(-std::f32::consts::FRAC_PI_2)
}

/// Inverts `m`, reporting singular or non-finite matrices instead of producing garbage.
pub fn try_inverse(m: Mat4) -> Result<Mat4, TransformError> {
	if !m.is_finite() {
		return Err(TransformError::NonFinite);
	}
	let det = m.determinant();
	if det.abs() <= SINGULAR_EPSILON {
		return Err(TransformError::SingularMatrix(det));
	}
	Ok(m.inverse())
}

/// Transform of `local` relative to `parent`, both expressed in the same source space.
///
/// Without a parent the local matrix already is the relative transform.
pub fn relative_transform(local: Mat4, parent: Option<Mat4>) -> Result<Mat4, TransformError> {
	match parent {
		Some(parent) => Ok(try_inverse(parent)? * local),
		None => {
			if !local.is_finite() {
				return Err(TransformError::NonFinite);
			}
			Ok(local)
		}
	}
}

/// `C · m · C⁻¹`
pub fn convert_space(m: Mat4) -> Mat4 {
	let conversion = conversion_matrix();
	conversion * m * conversion.inverse()
}

/// Source matrices in, engine-space parent relative matrix out.
///
/// `parent_axis` and `own_axis` are the local axis corrections of the parent node and this node.
pub fn engine_local(
	local: Mat4,
	parent: Option<Mat4>,
	parent_axis: Mat4,
	own_axis: Mat4,
) -> Result<Mat4, TransformError> {
	let relative = convert_space(relative_transform(local, parent)?);
	Ok(parent_axis.inverse() * relative * own_axis)
}

/// Transform split the way the i3D scene elements store it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineTransform {
	pub translation: Vec3,
	/// Euler angles in degrees, X applied first.
	pub rotation: Vec3,
	pub scale: Vec3,
}

impl Default for EngineTransform {
	fn default() -> Self {
		Self {
			translation: Vec3::ZERO,
			rotation: Vec3::ZERO,
			scale: Vec3::ONE,
		}
	}
}

impl EngineTransform {
	/// Splits `m`, which may be flattened along some of its axes.
	pub fn from_matrix(m: Mat4) -> Self {
		let (scale, rotation, translation) = decompose(m);
		let (z, y, x) = rotation.to_euler(EulerRot::ZYX);
		Self {
			translation,
			rotation: Vec3::new(x.to_degrees(), y.to_degrees(), z.to_degrees()),
			scale,
		}
	}

	pub fn to_matrix(&self) -> Mat4 {
		let rotation = Quat::from_euler(
			EulerRot::ZYX,
			self.rotation.z.to_radians(),
			self.rotation.y.to_radians(),
			self.rotation.x.to_radians(),
		);
		Mat4::from_scale_rotation_translation(self.scale, rotation, self.translation)
	}
}

/// Like `Mat4::to_scale_rotation_translation`, but a zero length axis gets its direction rebuilt from the others
/// instead of being divided by.
fn decompose(m: Mat4) -> (Vec3, Quat, Vec3) {
	let columns = [m.x_axis.truncate(), m.y_axis.truncate(), m.z_axis.truncate()];
	let mut scale = Vec3::from_array(columns.map(Vec3::length));
	let axes = columns.map(|axis| {
		let length = axis.length();
		(length > FLAT_AXIS_EPSILON).then(|| axis / length)
	});

	let mut basis = orthonormal_basis(axes);
	if m.determinant() < 0.0 {
		scale.x = -scale.x;
		basis[0] = -basis[0];
	}
	let rotation = Quat::from_mat3(&Mat3::from_cols(basis[0], basis[1], basis[2]));
	(scale, rotation, m.w_axis.truncate())
}

/// Fills in missing axes so the result is a right handed basis.
fn orthonormal_basis(axes: [Option<Vec3>; 3]) -> [Vec3; 3] {
	if let [Some(x), Some(y), Some(z)] = axes {
		return [x, y, z];
	}

	// one axis missing: the cross product of the other two
	for i in 0..3 {
		let (j, k) = ((i + 1) % 3, (i + 2) % 3);
		if let (None, Some(a), Some(b)) = (axes[i], axes[j], axes[k]) {
			if let Some(rebuilt) = a.cross(b).try_normalize() {
				let mut basis = [Vec3::ZERO; 3];
				basis[i] = rebuilt;
				basis[j] = a;
				basis[k] = b;
				return basis;
			}
		}
	}

	// at most one usable axis: any perpendicular pair around it
	match (0..3).find_map(|i| axes[i].map(|axis| (i, axis))) {
		Some((i, a)) => {
			let helper = if a.x.abs() < 0.9 { Vec3::X } else { Vec3::Y };
			let b = a.cross(helper).normalize();
			let mut basis = [Vec3::ZERO; 3];
			basis[i] = a;
			basis[(i + 1) % 3] = b;
			basis[(i + 2) % 3] = a.cross(b);
			basis
		}
		None => [Vec3::X, Vec3::Y, Vec3::Z],
	}
}
