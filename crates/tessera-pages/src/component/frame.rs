//! Frames group components around shared state.

use super::{FrameId, NodeId};
use serde_json::Value;

/// A named group of components with its own state.
///
/// A component belongs to at most one frame. Mutating frame state re-renders
/// every member.
#[derive(Debug, Clone)]
pub struct Frame {
	id: FrameId,
	name: String,
	state: Value,
	pub(crate) members: Vec<NodeId>,
}

impl Frame {
	pub fn new(id: FrameId, name: impl Into<String>, state: Value) -> Self {
		Self {
			id,
			name: name.into(),
			state,
			members: Vec::new(),
		}
	}

	pub fn id(&self) -> &FrameId {
		&self.id
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn state(&self) -> &Value {
		&self.state
	}

	pub(crate) fn state_mut(&mut self) -> &mut Value {
		&mut self.state
	}

	pub fn members(&self) -> &[NodeId] {
		&self.members
	}
}
