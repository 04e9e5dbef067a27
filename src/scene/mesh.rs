use super::builder::BuildErrorKind;
use super::skeleton::BoneChain;
use super::tables::{BlendWeights, Shape, ShapeVertex, Subset};
use crate::math::transform::conversion_matrix;
use crate::source::{Geometry, SourceMesh};

/// Most bone influences a vertex can carry.
const MAX_INFLUENCES: usize = 4;

/// An evaluated shape plus the material slot of each of its subsets.
pub(super) struct EvaluatedShape {
	pub shape: Shape,
	pub subset_slots: Vec<usize>,
}

/// Converts the evaluated mesh into engine space, skinned against `skeleton` when given.
pub(super) fn evaluate_shape(mesh: &SourceMesh, skeleton: Option<&BoneChain>) -> Result<EvaluatedShape, BuildErrorKind> {
	let geometry = &mesh.evaluated;
	validate(geometry)?;

	let skeleton = skeleton.filter(|chain| !chain.is_empty());
	let conversion = conversion_matrix();

	let mut vertices = Vec::with_capacity(geometry.positions.len());
	for (i, position) in geometry.positions.iter().enumerate() {
		vertices.push(ShapeVertex {
			position: conversion.transform_point3(*position),
			normal: geometry
				.normals
				.get(i)
				.map(|n| conversion.transform_vector3(*n).normalize_or_zero()),
			uv: geometry.uvs.get(i).copied(),
			blend: skeleton.map(|chain| blend_weights(geometry, i, chain)),
		});
	}

	let (triangles, subsets, subset_slots) = split_subsets(geometry);

	Ok(EvaluatedShape {
		shape: Shape {
			name: mesh.name.clone(),
			vertices,
			triangles,
			subsets,
			bone_mapping: skeleton.map(|chain| chain.bone_names().to_vec()),
		},
		subset_slots,
	})
}

fn validate(geometry: &Geometry) -> Result<(), BuildErrorKind> {
	let count = geometry.positions.len();
	let check_len = |what: &str, len: usize| {
		if len != 0 && len != count {
			Err(BuildErrorKind::InvalidGeometry(format!(
				"{len} {what} for {count} vertices"
			)))
		} else {
			Ok(())
		}
	};
	check_len("normals", geometry.normals.len())?;
	check_len("uvs", geometry.uvs.len())?;
	check_len("weight lists", geometry.weights.len())?;

	if !geometry.material_slots.is_empty() && geometry.material_slots.len() != geometry.triangles.len() {
		return Err(BuildErrorKind::InvalidGeometry(format!(
			"{} material slots for {} triangles",
			geometry.material_slots.len(),
			geometry.triangles.len()
		)));
	}

	for (t, triangle) in geometry.triangles.iter().enumerate() {
		if let Some(index) = triangle.iter().find(|&&index| index as usize >= count) {
			return Err(BuildErrorKind::InvalidGeometry(format!(
				"triangle {t} uses vertex {index} but there are only {count} vertices"
			)));
		}
	}

	for (v, weights) in geometry.weights.iter().enumerate() {
		if let Some((group, _)) = weights.iter().find(|(group, _)| *group >= geometry.vertex_groups.len()) {
			return Err(BuildErrorKind::InvalidGeometry(format!(
				"vertex {v} is weighted to group {group} but there are only {} groups",
				geometry.vertex_groups.len()
			)));
		}
	}
	Ok(())
}

/// Strongest influences first, normalized. Groups that name no bone are ignored.
/// A vertex without any bone influence follows the first bone of the chain.
fn blend_weights(geometry: &Geometry, vertex: usize, chain: &BoneChain) -> BlendWeights {
	let mut influences = geometry
		.weights
		.get(vertex)
		.map(|weights| {
			weights
				.iter()
				.filter(|(_, weight)| *weight > 0.0)
				.filter_map(|(group, weight)| Some((chain.bone_index(&geometry.vertex_groups[*group])?, *weight)))
				.collect::<Vec<_>>()
		})
		.unwrap_or_default();
	influences.sort_by(|a, b| b.1.total_cmp(&a.1));
	influences.truncate(MAX_INFLUENCES);

	let mut blend = BlendWeights {
		weights: [0.0; MAX_INFLUENCES],
		bones: [0; MAX_INFLUENCES],
	};
	let total: f32 = influences.iter().map(|(_, weight)| weight).sum();
	if total <= 0.0 {
		blend.weights[0] = 1.0;
		return blend;
	}
	for (slot, (bone, weight)) in influences.into_iter().enumerate() {
		blend.bones[slot] = bone as u32;
		blend.weights[slot] = weight / total;
	}
	blend
}

/// Orders triangles by material slot and describes each run as a subset.
fn split_subsets(geometry: &Geometry) -> (Vec<[u32; 3]>, Vec<Subset>, Vec<usize>) {
	let slot_of = |t: usize| geometry.material_slots.get(t).copied().unwrap_or(0);

	let mut order = (0..geometry.triangles.len()).collect::<Vec<_>>();
	order.sort_by_key(|&t| slot_of(t));

	let mut triangles = Vec::with_capacity(order.len());
	let mut subsets = Vec::new();
	let mut slots = Vec::new();

	let mut start = 0;
	while start < order.len() {
		let slot = slot_of(order[start]);
		let end = order[start..]
			.iter()
			.position(|&t| slot_of(t) != slot)
			.map_or(order.len(), |offset| start + offset);

		let run = order[start..end].iter().map(|&t| geometry.triangles[t]).collect::<Vec<_>>();
		let first_vertex = run.iter().flatten().copied().min().unwrap_or(0);
		let last_vertex = run.iter().flatten().copied().max().unwrap_or(0);

		subsets.push(Subset {
			first_vertex,
			num_vertices: last_vertex - first_vertex + 1,
			first_index: triangles.len() as u32 * 3,
			num_indices: run.len() as u32 * 3,
		});
		slots.push(slot);
		triangles.extend(run);
		start = end;
	}

	(triangles, subsets, slots)
}
