//! Component definitions: the behavior shared by every node with the same name.
//!
//! A [`ComponentDef`] holds the action handlers and template helpers of a
//! component type. Handlers are either local closures or the name of a
//! handler on the server; helpers are invoked from `{{ name(args) }}`
//! expressions while rendering.

use super::NodeId;
use crate::events::EventPayload;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// A local action handler.
pub type ActionFn = Arc<dyn Fn(&mut ActionContext<'_>, &EventPayload) + Send + Sync + 'static>;

/// A template helper method.
pub type HelperFn = Arc<dyn Fn(&HelperContext<'_>, &[Value]) -> Value + Send + Sync + 'static>;

/// How an action is handled.
#[derive(Clone)]
pub enum Handler {
	/// Run a closure synchronously.
	Local(ActionFn),
	/// Forward to the named handler on the server bridge.
	Remote(String),
}

impl std::fmt::Debug for Handler {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Local(_) => f.write_str("Handler::Local(..)"),
			Self::Remote(name) => f.debug_tuple("Handler::Remote").field(name).finish(),
		}
	}
}

/// View of a node passed to local action handlers.
///
/// State changes are collected with [`ActionContext::set_state`] and applied
/// by the dispatcher after the handler returns, which schedules a re-render.
#[derive(Debug)]
pub struct ActionContext<'a> {
	id: &'a NodeId,
	props: &'a Value,
	state: &'a Value,
	patch: Map<String, Value>,
}

impl<'a> ActionContext<'a> {
	pub(crate) fn new(id: &'a NodeId, props: &'a Value, state: &'a Value) -> Self {
		Self {
			id,
			props,
			state,
			patch: Map::new(),
		}
	}

	pub fn id(&self) -> &NodeId {
		self.id
	}

	pub fn props(&self) -> &Value {
		self.props
	}

	/// State as it was when the handler started.
	pub fn state(&self) -> &Value {
		self.state
	}

	/// Queues a shallow state merge. Non-object patches are ignored.
	pub fn set_state(&mut self, patch: Value) {
		match patch {
			Value::Object(map) => self.patch.extend(map),
			other => tracing::warn!(
				"Ignoring non-object state patch from handler on {}: {}",
				self.id,
				other
			),
		}
	}

	pub(crate) fn into_patch(self) -> Map<String, Value> {
		self.patch
	}
}

/// View of a node passed to template helpers.
#[derive(Debug, Clone, Copy)]
pub struct HelperContext<'a> {
	pub id: &'a NodeId,
	pub props: &'a Value,
	pub state: &'a Value,
	/// State of the frame the node belongs to, if any.
	pub frame_state: Option<&'a Value>,
}

/// Behavior of a component type.
///
/// # Example
///
/// ```rust
/// use tessera_pages::component::ComponentDef;
/// use serde_json::json;
///
/// let counter = ComponentDef::new("Counter")
///     .on("increment", |ctx, _event| {
///         let count = ctx.state()["count"].as_i64().unwrap_or(0);
///         ctx.set_state(json!({ "count": count + 1 }));
///     })
///     .remote("save", "save_counter")
///     .helper("double", |ctx, _args| {
///         json!(ctx.state["count"].as_i64().unwrap_or(0) * 2)
///     });
/// assert!(counter.resolve("increment").is_some());
/// ```
#[derive(Debug, Clone)]
pub struct ComponentDef {
	name: String,
	handlers: HashMap<String, Handler>,
	helpers: HashMap<String, HelperFnEntry>,
}

#[derive(Clone)]
struct HelperFnEntry(HelperFn);

impl std::fmt::Debug for HelperFnEntry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str("HelperFn(..)")
	}
}

impl ComponentDef {
	/// Creates an empty definition for the given template name.
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			handlers: HashMap::new(),
			helpers: HashMap::new(),
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Registers a local action handler.
	pub fn on<F>(mut self, action: impl Into<String>, handler: F) -> Self
	where
		F: Fn(&mut ActionContext<'_>, &EventPayload) + Send + Sync + 'static,
	{
		self.handlers
			.insert(action.into(), Handler::Local(Arc::new(handler)));
		self
	}

	/// Declares an action handled by `handler` on the server.
	pub fn remote(mut self, action: impl Into<String>, handler: impl Into<String>) -> Self {
		self.handlers
			.insert(action.into(), Handler::Remote(handler.into()));
		self
	}

	/// Registers a template helper.
	pub fn helper<F>(mut self, name: impl Into<String>, helper: F) -> Self
	where
		F: Fn(&HelperContext<'_>, &[Value]) -> Value + Send + Sync + 'static,
	{
		self.helpers
			.insert(name.into(), HelperFnEntry(Arc::new(helper)));
		self
	}

	/// Resolves an action name to a handler.
	///
	/// The verbatim name is tried first, then its camel-cased form
	/// (`add-item` and `add_item` both resolve `addItem`).
	pub fn resolve(&self, action: &str) -> Option<&Handler> {
		self.handlers
			.get(action)
			.or_else(|| self.handlers.get(&to_camel_case(action)))
	}

	pub(crate) fn helper_fn(&self, name: &str) -> Option<HelperFn> {
		self.helpers.get(name).map(|entry| Arc::clone(&entry.0))
	}
}

/// Converts `-` and `_` separated names to camelCase.
pub fn to_camel_case(name: &str) -> String {
	let mut out = String::with_capacity(name.len());
	let mut upper_next = false;
	for c in name.chars() {
		if c == '-' || c == '_' {
			upper_next = !out.is_empty();
		} else if upper_next {
			out.extend(c.to_uppercase());
			upper_next = false;
		} else {
			out.push(c);
		}
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("add-item", "addItem")]
	#[case("add_item", "addItem")]
	#[case("toggle-all-done", "toggleAllDone")]
	#[case("save", "save")]
	#[case("-leading", "leading")]
	fn test_to_camel_case(#[case] input: &str, #[case] expected: &str) {
		assert_eq!(to_camel_case(input), expected);
	}

	#[rstest]
	fn test_resolve_prefers_verbatim_name() {
		let def = ComponentDef::new("List")
			.remote("add-item", "server_add")
			.on("addItem", |_, _| {});

		assert!(matches!(def.resolve("add-item"), Some(Handler::Remote(name)) if name == "server_add"));
		assert!(matches!(def.resolve("add_item"), Some(Handler::Local(_))));
		assert!(def.resolve("remove-item").is_none());
	}

	#[rstest]
	fn test_action_context_collects_object_patches() {
		let id = NodeId::from("n");
		let props = Value::Null;
		let state = serde_json::json!({ "count": 1 });
		let mut ctx = ActionContext::new(&id, &props, &state);

		ctx.set_state(serde_json::json!({ "count": 2 }));
		ctx.set_state(serde_json::json!("ignored"));
		ctx.set_state(serde_json::json!({ "label": "x" }));

		let patch = ctx.into_patch();
		assert_eq!(patch.get("count"), Some(&serde_json::json!(2)));
		assert_eq!(patch.get("label"), Some(&serde_json::json!("x")));
		assert_eq!(patch.len(), 2);
	}
}
