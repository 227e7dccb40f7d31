//! Arena-style registry of live components, frames and layouts.
//!
//! The registry is the single source of truth for tree traversal. It is owned
//! by one [`Engine`](crate::engine::Engine) and passed around explicitly.
//!
//! Invariants:
//! - ids are never reused while a node is live
//! - the parent/child graph is a strict tree
//! - every node except a root has exactly one parent

use crate::component::{ComponentNode, Frame, FrameId, Layout, LayoutId, NodeId};
use crate::error::{PagesError, PagesResult};
use std::collections::HashMap;

/// Registry of live nodes, keyed by id, one namespace per node kind.
#[derive(Debug, Default)]
pub struct Registry {
	components: HashMap<NodeId, ComponentNode>,
	frames: HashMap<FrameId, Frame>,
	layouts: HashMap<LayoutId, Layout>,
	roots: Vec<NodeId>,
}

impl Registry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts a node under `parent`, or as a new root.
	pub fn insert(&mut self, mut node: ComponentNode, parent: Option<&NodeId>) -> PagesResult<()> {
		let id = node.id().clone();
		if self.components.contains_key(&id) {
			return Err(PagesError::DuplicateId(id));
		}

		match parent {
			Some(parent_id) => {
				let parent_node = self
					.components
					.get_mut(parent_id)
					.ok_or_else(|| PagesError::ComponentNotFound(parent_id.clone()))?;
				parent_node.children.push(id.clone());
				node.parent = Some(parent_id.clone());
			}
			None => {
				node.parent = None;
				self.roots.push(id.clone());
			}
		}

		node.children.clear();
		self.components.insert(id, node);
		Ok(())
	}

	/// Removes a node and its whole subtree, detaching it from its parent.
	///
	/// Frame and layout memberships of removed nodes are dropped. Returns the
	/// removed nodes, parents before children.
	pub fn remove_subtree(&mut self, id: &NodeId) -> PagesResult<Vec<ComponentNode>> {
		let ids = self.subtree(id);
		if ids.is_empty() {
			return Err(PagesError::ComponentNotFound(id.clone()));
		}

		let parent = self.components.get(id).and_then(|n| n.parent.clone());
		match parent {
			Some(parent_id) => {
				if let Some(parent_node) = self.components.get_mut(&parent_id) {
					parent_node.children.retain(|child| child != id);
				}
			}
			None => self.roots.retain(|root| root != id),
		}

		let mut removed = Vec::with_capacity(ids.len());
		for node_id in ids {
			if let Some(node) = self.components.remove(&node_id) {
				if let Some(frame) = node.frame.as_ref().and_then(|f| self.frames.get_mut(f)) {
					frame.members.retain(|m| m != &node_id);
				}
				if let Some(layout) = node.layout.as_ref().and_then(|l| self.layouts.get_mut(l)) {
					layout.members.retain(|m| m != &node_id);
				}
				removed.push(node);
			}
		}
		Ok(removed)
	}

	pub fn contains(&self, id: &NodeId) -> bool {
		self.components.contains_key(id)
	}

	pub fn get(&self, id: &NodeId) -> Option<&ComponentNode> {
		self.components.get(id)
	}

	pub fn get_mut(&mut self, id: &NodeId) -> Option<&mut ComponentNode> {
		self.components.get_mut(id)
	}

	/// Returns the number of live components.
	pub fn len(&self) -> usize {
		self.components.len()
	}

	pub fn is_empty(&self) -> bool {
		self.components.is_empty()
	}

	/// Root nodes in insertion order.
	pub fn roots(&self) -> &[NodeId] {
		&self.roots
	}

	/// Ids of `id` and all its descendants, parents before children.
	///
	/// Returns an empty list if `id` is not live.
	pub fn subtree(&self, id: &NodeId) -> Vec<NodeId> {
		let mut out = Vec::new();
		let mut stack = vec![id.clone()];
		while let Some(current) = stack.pop() {
			let Some(node) = self.components.get(&current) else {
				continue;
			};
			stack.extend(node.children.iter().rev().cloned());
			out.push(current);
		}
		out
	}

	/// Ancestors of `id`, nearest first.
	pub fn ancestors(&self, id: &NodeId) -> Vec<NodeId> {
		let mut out = Vec::new();
		let mut current = self.components.get(id).and_then(|n| n.parent.clone());
		while let Some(parent) = current {
			current = self.components.get(&parent).and_then(|n| n.parent.clone());
			out.push(parent);
		}
		out
	}

	/// All live ids in tree order: roots in insertion order, each followed by its subtree.
	pub fn tree_order(&self) -> Vec<NodeId> {
		self.roots.iter().flat_map(|root| self.subtree(root)).collect()
	}

	/// Ids of all live nodes whose template name is `name`, in tree order.
	pub fn named(&self, name: &str) -> Vec<NodeId> {
		self.tree_order()
			.into_iter()
			.filter(|id| self.components.get(id).is_some_and(|n| n.name() == name))
			.collect()
	}

	pub fn insert_frame(&mut self, frame: Frame) -> PagesResult<()> {
		let id = frame.id().clone();
		if self.frames.contains_key(&id) {
			return Err(PagesError::DuplicateFrame(id));
		}
		self.frames.insert(id, frame);
		Ok(())
	}

	pub fn frame(&self, id: &FrameId) -> Option<&Frame> {
		self.frames.get(id)
	}

	pub fn frame_mut(&mut self, id: &FrameId) -> Option<&mut Frame> {
		self.frames.get_mut(id)
	}

	/// Adds a component to a frame. A component belongs to at most one frame.
	pub fn join_frame(&mut self, frame_id: &FrameId, node_id: &NodeId) -> PagesResult<()> {
		if !self.frames.contains_key(frame_id) {
			return Err(PagesError::FrameNotFound(frame_id.clone()));
		}
		let node = self
			.components
			.get_mut(node_id)
			.ok_or_else(|| PagesError::ComponentNotFound(node_id.clone()))?;
		match &node.frame {
			Some(current) if current == frame_id => return Ok(()),
			Some(current) => {
				return Err(PagesError::AlreadyInFrame {
					component: node_id.clone(),
					frame: current.clone(),
				});
			}
			None => node.frame = Some(frame_id.clone()),
		}
		if let Some(frame) = self.frames.get_mut(frame_id) {
			frame.members.push(node_id.clone());
		}
		Ok(())
	}

	pub fn insert_layout(&mut self, layout: Layout) -> PagesResult<()> {
		let id = layout.id().clone();
		if self.layouts.contains_key(&id) {
			return Err(PagesError::DuplicateLayout(id));
		}
		self.layouts.insert(id, layout);
		Ok(())
	}

	pub fn layout(&self, id: &LayoutId) -> Option<&Layout> {
		self.layouts.get(id)
	}

	/// Layouts that have at least one member among `ids`.
	pub fn layouts_touching(&self, ids: &[NodeId]) -> Vec<LayoutId> {
		let mut out: Vec<LayoutId> = ids
			.iter()
			.filter_map(|id| self.components.get(id).and_then(|n| n.layout.clone()))
			.collect();
		out.sort();
		out.dedup();
		out
	}

	/// Adds a component to a layout. A component belongs to at most one layout.
	pub fn join_layout(&mut self, layout_id: &LayoutId, node_id: &NodeId) -> PagesResult<()> {
		if !self.layouts.contains_key(layout_id) {
			return Err(PagesError::LayoutNotFound(layout_id.clone()));
		}
		let node = self
			.components
			.get_mut(node_id)
			.ok_or_else(|| PagesError::ComponentNotFound(node_id.clone()))?;
		match &node.layout {
			Some(current) if current == layout_id => return Ok(()),
			Some(current) => {
				return Err(PagesError::AlreadyInLayout {
					component: node_id.clone(),
					layout: current.clone(),
				});
			}
			None => node.layout = Some(layout_id.clone()),
		}
		if let Some(layout) = self.layouts.get_mut(layout_id) {
			layout.members.push(node_id.clone());
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::component::HydrationStrategy;
	use rstest::{fixture, rstest};
	use serde_json::Value;

	fn node(id: &str) -> ComponentNode {
		ComponentNode::new(
			NodeId::from(id),
			"Item",
			Value::Null,
			Value::Null,
			HydrationStrategy::Eager,
			false,
		)
	}

	/// root
	/// ├── a
	/// │   └── a1
	/// └── b
	#[fixture]
	fn tree() -> Registry {
		let mut registry = Registry::new();
		registry.insert(node("root"), None).unwrap();
		registry.insert(node("a"), Some(&NodeId::from("root"))).unwrap();
		registry.insert(node("a1"), Some(&NodeId::from("a"))).unwrap();
		registry.insert(node("b"), Some(&NodeId::from("root"))).unwrap();
		registry
	}

	fn ids(list: &[&str]) -> Vec<NodeId> {
		list.iter().map(|s| NodeId::from(*s)).collect()
	}

	#[rstest]
	fn test_subtree_is_parent_first(tree: Registry) {
		assert_eq!(tree.subtree(&NodeId::from("root")), ids(&["root", "a", "a1", "b"]));
		assert_eq!(tree.tree_order(), ids(&["root", "a", "a1", "b"]));
	}

	#[rstest]
	fn test_ancestors_nearest_first(tree: Registry) {
		assert_eq!(tree.ancestors(&NodeId::from("a1")), ids(&["a", "root"]));
		assert!(tree.ancestors(&NodeId::from("root")).is_empty());
	}

	#[rstest]
	fn test_duplicate_id_is_rejected(mut tree: Registry) {
		let err = tree.insert(node("a"), None).unwrap_err();
		assert_eq!(err, PagesError::DuplicateId(NodeId::from("a")));
	}

	#[rstest]
	fn test_unknown_parent_is_rejected(mut tree: Registry) {
		let err = tree.insert(node("z"), Some(&NodeId::from("missing"))).unwrap_err();
		assert_eq!(err, PagesError::ComponentNotFound(NodeId::from("missing")));
		assert!(!tree.contains(&NodeId::from("z")));
	}

	#[rstest]
	fn test_remove_subtree_detaches_from_parent(mut tree: Registry) {
		let removed = tree.remove_subtree(&NodeId::from("a")).unwrap();

		assert_eq!(removed.len(), 2);
		assert!(!tree.contains(&NodeId::from("a")));
		assert!(!tree.contains(&NodeId::from("a1")));
		assert_eq!(tree.get(&NodeId::from("root")).unwrap().children(), &ids(&["b"])[..]);
	}

	#[rstest]
	fn test_remove_root(mut tree: Registry) {
		tree.remove_subtree(&NodeId::from("root")).unwrap();
		assert!(tree.is_empty());
		assert!(tree.roots().is_empty());
	}

	#[rstest]
	fn test_component_belongs_to_one_frame(mut tree: Registry) {
		tree.insert_frame(Frame::new(FrameId::from("f1"), "cart", Value::Null))
			.unwrap();
		tree.insert_frame(Frame::new(FrameId::from("f2"), "nav", Value::Null))
			.unwrap();

		tree.join_frame(&FrameId::from("f1"), &NodeId::from("a")).unwrap();
		tree.join_frame(&FrameId::from("f1"), &NodeId::from("a")).unwrap();
		let err = tree
			.join_frame(&FrameId::from("f2"), &NodeId::from("a"))
			.unwrap_err();

		assert!(matches!(err, PagesError::AlreadyInFrame { .. }));
		assert_eq!(tree.frame(&FrameId::from("f1")).unwrap().members(), &ids(&["a"])[..]);
	}

	#[rstest]
	fn test_removal_drops_frame_membership(mut tree: Registry) {
		tree.insert_frame(Frame::new(FrameId::from("f1"), "cart", Value::Null))
			.unwrap();
		tree.join_frame(&FrameId::from("f1"), &NodeId::from("a1")).unwrap();

		tree.remove_subtree(&NodeId::from("a")).unwrap();

		assert!(tree.frame(&FrameId::from("f1")).unwrap().members().is_empty());
	}

	#[rstest]
	fn test_named_lists_matching_nodes(tree: Registry) {
		assert_eq!(tree.named("Item").len(), 4);
		assert!(tree.named("Other").is_empty());
	}
}
