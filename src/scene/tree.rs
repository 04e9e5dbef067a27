use std::collections::HashMap;
use std::fmt::{self, Display};

use glam::Mat4;
use indextree::{Arena, NodeId};

use super::node::{I3dNodeId, IdAllocator, NodeKind, SceneNode};
use super::skeleton::BoneChain;
use super::tables::{File, FileId, Material, MaterialId, Shape, ShapeId, Table};
use crate::source::ObjectKey;

#[derive(Debug, Clone, thiserror::Error)]
pub enum GraphError {
	#[error("Node {0} does not exist")]
	UnknownNode(I3dNodeId),
	#[error("Node {child} is not a child of node {parent}")]
	NotAChild { parent: I3dNodeId, child: I3dNodeId },
	#[error("The root node can not be moved or removed")]
	RootIsFixed,
	#[error("Node {node} can not become a descendant of itself")]
	WouldCycle { node: I3dNodeId },
}

/// Everything the exporter knows about a scene before it is written out.
#[derive(Debug)]
pub struct SceneGraph {
	root_id: NodeId,
	arena: Arena<SceneNode>,
	node_ids: HashMap<I3dNodeId, NodeId>,
	ids: IdAllocator,
	pub shapes: Table<ShapeId, Shape>,
	pub materials: Table<MaterialId, Material>,
	pub files: Table<FileId, File>,
	skeletons: HashMap<I3dNodeId, BoneChain>,
}

impl Default for SceneGraph {
	fn default() -> Self {
		Self::new()
	}
}

impl SceneGraph {
	/// New graph holding only the synthetic root, which takes the first ID.
	pub fn new() -> Self {
		let mut ids = IdAllocator::new();
		let mut arena = Arena::new();
		let id = ids.next_id();
		let root_id = arena.new_node(SceneNode {
			id,
			name: "root".to_owned(),
			source: None,
			transform: Mat4::IDENTITY,
			kind: NodeKind::Root,
		});

		let mut node_ids = HashMap::new();
		node_ids.insert(id, root_id);

		Self {
			root_id,
			arena,
			node_ids,
			ids,
			shapes: Table::new(),
			materials: Table::new(),
			files: Table::new(),
			skeletons: HashMap::new(),
		}
	}

	pub fn root(&self) -> I3dNodeId {
		self.arena[self.root_id].get().id
	}

	fn internal_id(&self, id: I3dNodeId) -> Result<NodeId, GraphError> {
		self.node_ids.get(&id).copied().ok_or(GraphError::UnknownNode(id))
	}

	/// Allocates an ID for a new node and appends it as the last child of `parent`.
	pub fn add_node(
		&mut self,
		parent: I3dNodeId,
		name: impl Into<String>,
		source: Option<ObjectKey>,
		transform: Mat4,
		kind: NodeKind,
	) -> Result<I3dNodeId, GraphError> {
		let parent_id = self.internal_id(parent)?;
		let id = self.ids.next_id();
		let node_id = self.arena.new_node(SceneNode {
			id,
			name: name.into(),
			source,
			transform,
			kind,
		});
		parent_id.append(node_id, &mut self.arena);
		self.node_ids.insert(id, node_id);
		Ok(id)
	}

	/// Unlinks `child` from `parent` and drops its whole subtree. IDs of dropped nodes are not reused.
	pub fn remove_child(&mut self, parent: I3dNodeId, child: I3dNodeId) -> Result<(), GraphError> {
		let parent_id = self.internal_id(parent)?;
		let child_id = self.internal_id(child)?;
		if child_id == self.root_id {
			return Err(GraphError::RootIsFixed);
		}
		if self.arena[child_id].parent() != Some(parent_id) {
			return Err(GraphError::NotAChild { parent, child });
		}

		let removed = child_id
			.descendants(&self.arena)
			.map(|nid| self.arena[nid].get().id)
			.collect::<Vec<_>>();
		for id in removed {
			self.node_ids.remove(&id);
			self.skeletons.remove(&id);
		}
		child_id.remove_subtree(&mut self.arena);
		Ok(())
	}

	/// Moves `node` with its subtree to the end of `new_parent`'s children.
	pub fn reparent(&mut self, node: I3dNodeId, new_parent: I3dNodeId) -> Result<(), GraphError> {
		let node_id = self.internal_id(node)?;
		let parent_id = self.internal_id(new_parent)?;
		if node_id == self.root_id {
			return Err(GraphError::RootIsFixed);
		}
		if parent_id.ancestors(&self.arena).any(|nid| nid == node_id) {
			return Err(GraphError::WouldCycle { node });
		}
		node_id.detach(&mut self.arena);
		parent_id.append(node_id, &mut self.arena);
		Ok(())
	}

	pub fn set_transform(&mut self, node: I3dNodeId, transform: Mat4) -> Result<(), GraphError> {
		let node_id = self.internal_id(node)?;
		self.arena[node_id].get_mut().transform = transform;
		Ok(())
	}

	pub fn get_node(&self, id: I3dNodeId) -> Option<&SceneNode> {
		Some(self.arena.get(*self.node_ids.get(&id)?)?.get())
	}

	pub fn get_parent(&self, id: I3dNodeId) -> Option<&SceneNode> {
		let node = self.arena.get(*self.node_ids.get(&id)?)?;
		Some(self.arena.get(node.parent()?)?.get())
	}

	pub fn children(&self, id: I3dNodeId) -> impl Iterator<Item = &SceneNode> {
		let node_id = self.node_ids.get(&id).copied();
		node_id
			.into_iter()
			.flat_map(move |nid| nid.children(&self.arena))
			.map(move |nid| self.arena[nid].get())
	}

	/// Every live node, parents before children, root first.
	pub fn pre_order(&self) -> impl Iterator<Item = &SceneNode> {
		self.root_id.descendants(&self.arena).map(move |nid| self.arena[nid].get())
	}

	/// Number of live nodes, root included.
	pub fn len(&self) -> usize {
		self.node_ids.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() <= 1
	}

	pub(crate) fn insert_skeleton(&mut self, armature: I3dNodeId, chain: BoneChain) {
		self.skeletons.insert(armature, chain);
	}

	/// Bone chain of the armature node `armature`.
	pub fn skeleton(&self, armature: I3dNodeId) -> Option<&BoneChain> {
		self.skeletons.get(&armature)
	}

	pub fn add_shape(&mut self, shape: Shape) -> ShapeId {
		self.shapes.insert(shape)
	}

	pub fn add_material(&mut self, material: Material) -> MaterialId {
		self.materials.insert(material)
	}

	pub fn add_file(&mut self, file: File) -> FileId {
		self.files.insert(file)
	}
}

fn rec_fmt(indent: usize, f: &mut fmt::Formatter<'_>, node_id: NodeId, arena: &Arena<SceneNode>) -> fmt::Result {
	let Some(node) = arena.get(node_id) else {
		return Ok(());
	};

	let node = node.get();

	let type_name = node.kind.type_name();
	#[cfg(feature = "owo")]
	let type_name = {
		use owo_colors::OwoColorize;
		type_name.magenta()
	};

	writeln!(f, "{}- [{}] {} (#{})", "  ".repeat(indent), type_name, node.name, node.id)?;
	for child in node_id.children(arena) {
		rec_fmt(indent + 1, f, child, arena)?;
	}

	Ok(())
}

impl Display for SceneGraph {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		rec_fmt(0, f, self.root_id, &self.arena)
	}
}
