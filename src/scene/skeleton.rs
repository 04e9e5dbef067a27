use std::collections::HashMap;

use glam::Mat4;
use tracing::debug;

use super::builder::BuildErrorKind;
use super::node::{I3dNodeId, NodeKind};
use super::tree::SceneGraph;
use crate::math::transform::engine_local;
use crate::source::SourceArmature;

/// Bones of one armature in pre-order, which is the order the engine binds skins in.
#[derive(Debug, Clone, Default)]
pub struct BoneChain {
	bones: Vec<I3dNodeId>,
	names: Vec<String>,
	mapping: HashMap<String, usize>,
	skin_bind_ids: String,
}

impl BoneChain {
	pub fn bones(&self) -> &[I3dNodeId] {
		&self.bones
	}

	/// Bone names, indexed like [`BoneChain::bones`].
	pub fn bone_names(&self) -> &[String] {
		&self.names
	}

	/// Position of the bone called `name` in the chain.
	pub fn bone_index(&self, name: &str) -> Option<usize> {
		self.mapping.get(name).copied()
	}

	/// Space separated bone node IDs, the value of a skinned shape's `skinBindNodeIds`.
	pub fn skin_bind_ids(&self) -> &str {
		&self.skin_bind_ids
	}

	pub fn len(&self) -> usize {
		self.bones.len()
	}

	pub fn is_empty(&self) -> bool {
		self.bones.is_empty()
	}

	fn push(&mut self, name: &str, id: I3dNodeId) {
		self.mapping.insert(name.to_owned(), self.bones.len());
		self.names.push(name.to_owned());
		self.bones.push(id);
	}
}

/// Adds every bone of `armature` below `armature_node` and returns the finished chain.
pub(super) fn build_bone_chain(
	graph: &mut SceneGraph,
	armature_node: I3dNodeId,
	armature: &SourceArmature,
) -> Result<BoneChain, BuildErrorKind> {
	for bone in &armature.bones {
		if let Some(parent) = bone.parent {
			if parent >= armature.bones.len() {
				return Err(BuildErrorKind::InvalidBoneHierarchy(format!(
					"bone {:?} has parent index {parent} but the armature has {} bones",
					bone.name,
					armature.bones.len()
				)));
			}
		}
	}

	let mut chain = BoneChain::default();
	for root_bone in armature.root_bones() {
		add_bone(graph, armature, root_bone, armature_node, &mut chain)?;
	}

	if chain.len() != armature.bones.len() {
		return Err(BuildErrorKind::InvalidBoneHierarchy(format!(
			"only {} of {} bones are reachable from a root bone",
			chain.len(),
			armature.bones.len()
		)));
	}

	chain.skin_bind_ids = chain
		.bones
		.iter()
		.map(ToString::to_string)
		.collect::<Vec<_>>()
		.join(" ");
	Ok(chain)
}

fn add_bone(
	graph: &mut SceneGraph,
	armature: &SourceArmature,
	index: usize,
	parent_node: I3dNodeId,
	chain: &mut BoneChain,
) -> Result<(), BuildErrorKind> {
	let bone = &armature.bones[index];
	debug!("Exporting bone {:?}", bone.name);

	// root bones sit directly in armature space, others are relative to their parent bone
	let parent_matrix = bone.parent.map(|parent| armature.bones[parent].matrix_local);
	let transform = engine_local(bone.matrix_local, parent_matrix, Mat4::IDENTITY, Mat4::IDENTITY)?;

	let id = graph.add_node(parent_node, bone.name.clone(), None, transform, NodeKind::Bone)?;
	chain.push(&bone.name, id);

	for child in armature.child_bones(index) {
		add_bone(graph, armature, child, id, chain)?;
	}
	Ok(())
}
