//! Component nodes.

use super::{FrameId, LayoutId, NodeId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// When a component becomes interactive on the client.
///
/// The strategy is fixed when the node is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HydrationStrategy {
	/// Hydrate during initial tree construction.
	#[default]
	Eager,
	/// Hydrate after a fixed delay.
	Lazy,
	/// Hydrate on the first visibility notification.
	Visible,
	/// Hydrate on the first qualifying interaction inside the component.
	Interactive,
}

impl HydrationStrategy {
	/// Returns the marker value written into markup.
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Eager => "eager",
			Self::Lazy => "lazy",
			Self::Visible => "visible",
			Self::Interactive => "interactive",
		}
	}
}

impl FromStr for HydrationStrategy {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"eager" | "load" => Ok(Self::Eager),
			"lazy" | "idle" => Ok(Self::Lazy),
			"visible" => Ok(Self::Visible),
			"interactive" | "interaction" => Ok(Self::Interactive),
			other => Err(format!("unknown hydration strategy: {}", other)),
		}
	}
}

/// Hydration progress of a node. `Hydrated` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HydrationStatus {
	/// Not hydrated and not waiting for a trigger.
	#[default]
	Unhydrated,
	/// Waiting for a timer, a visibility notification or an interaction.
	Scheduled,
	/// Interactive.
	Hydrated,
}

/// A live component node.
#[derive(Debug, Clone)]
pub struct ComponentNode {
	id: NodeId,
	name: String,
	props: Value,
	state: Value,
	pub(crate) parent: Option<NodeId>,
	pub(crate) children: Vec<NodeId>,
	pub(crate) frame: Option<FrameId>,
	pub(crate) layout: Option<LayoutId>,
	strategy: HydrationStrategy,
	pub(crate) status: HydrationStatus,
	critical: bool,
}

impl ComponentNode {
	/// Creates a detached node.
	pub fn new(
		id: NodeId,
		name: impl Into<String>,
		props: Value,
		state: Value,
		strategy: HydrationStrategy,
		critical: bool,
	) -> Self {
		Self {
			id,
			name: name.into(),
			props,
			state,
			parent: None,
			children: Vec::new(),
			frame: None,
			layout: None,
			strategy,
			status: HydrationStatus::Unhydrated,
			critical,
		}
	}

	pub fn id(&self) -> &NodeId {
		&self.id
	}

	/// Template key.
	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn props(&self) -> &Value {
		&self.props
	}

	pub fn state(&self) -> &Value {
		&self.state
	}

	pub(crate) fn state_mut(&mut self) -> &mut Value {
		&mut self.state
	}

	pub fn parent(&self) -> Option<&NodeId> {
		self.parent.as_ref()
	}

	pub fn children(&self) -> &[NodeId] {
		&self.children
	}

	pub fn frame(&self) -> Option<&FrameId> {
		self.frame.as_ref()
	}

	pub fn layout(&self) -> Option<&LayoutId> {
		self.layout.as_ref()
	}

	pub fn strategy(&self) -> HydrationStrategy {
		self.strategy
	}

	pub fn status(&self) -> HydrationStatus {
		self.status
	}

	/// Critical nodes hydrate before any other node.
	pub fn is_critical(&self) -> bool {
		self.critical
	}
}

/// Parameters for creating a component at runtime.
///
/// # Example
///
/// ```rust
/// use tessera_pages::component::{HydrationStrategy, NewComponent};
/// use serde_json::json;
///
/// let new = NewComponent::new("Counter")
///     .id("counter-1")
///     .state(json!({ "count": 0 }))
///     .strategy(HydrationStrategy::Lazy);
/// assert_eq!(new.name, "Counter");
/// ```
#[derive(Debug, Clone)]
pub struct NewComponent {
	/// Explicit id. A fresh id is generated when absent.
	pub id: Option<NodeId>,
	/// Template key.
	pub name: String,
	/// Read-only props.
	pub props: Value,
	/// Initial state.
	pub state: Value,
	/// Parent node, if any.
	pub parent: Option<NodeId>,
	/// Hydration strategy.
	pub strategy: HydrationStrategy,
	/// Whether the node is critical.
	pub critical: bool,
	/// Store slices mirrored into the node's state.
	pub slices: Vec<String>,
}

impl NewComponent {
	/// Creates parameters for a root, eager, non-critical component with empty props and state.
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			id: None,
			name: name.into(),
			props: Value::Object(Default::default()),
			state: Value::Object(Default::default()),
			parent: None,
			strategy: HydrationStrategy::default(),
			critical: false,
			slices: Vec::new(),
		}
	}

	pub fn id(mut self, id: impl Into<NodeId>) -> Self {
		self.id = Some(id.into());
		self
	}

	pub fn props(mut self, props: Value) -> Self {
		self.props = props;
		self
	}

	pub fn state(mut self, state: Value) -> Self {
		self.state = state;
		self
	}

	pub fn parent(mut self, parent: impl Into<NodeId>) -> Self {
		self.parent = Some(parent.into());
		self
	}

	pub fn strategy(mut self, strategy: HydrationStrategy) -> Self {
		self.strategy = strategy;
		self
	}

	pub fn critical(mut self, critical: bool) -> Self {
		self.critical = critical;
		self
	}

	/// Mirrors store slice `slice` into `state.<slice>`. See [`Engine::attach_store`].
	///
	/// [`Engine::attach_store`]: crate::engine::Engine::attach_store
	pub fn bind_slice(mut self, slice: impl Into<String>) -> Self {
		self.slices.push(slice.into());
		self
	}
}
