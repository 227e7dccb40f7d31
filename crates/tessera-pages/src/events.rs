//! Delegated event binding and action dispatch.
//!
//! Markup declares behavior with two attributes:
//!
//! ```html
//! <button data-event="click" data-action="add-item">Add</button>
//! <input data-event="input change" data-action="update-query">
//! ```
//!
//! After a hydrated component is mounted, one listener is registered per
//! (element, event kind) pair inside the component's own markup. Listeners
//! are re-bound after every re-render because the markup is replaced.
//!
//! Dispatch resolves the action against the originating component first and
//! then bubbles to every ancestor. See [`BubblePolicy`].

mod binding;
mod dispatch;

pub use binding::{Listener, ListenerRegistry};
pub use dispatch::{BubblePolicy, DispatchReport, LevelOutcome, RemoteOutcome, TriggerOutcome};

pub(crate) use dispatch::{DispatchScope, dispatch_action};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Kind of a DOM event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
	Click,
	Input,
	Change,
	Submit,
	Focus,
	PointerOver,
	TouchStart,
	KeyDown,
	/// Any other event name.
	Custom(String),
}

impl EventKind {
	pub fn as_str(&self) -> &str {
		match self {
			Self::Click => "click",
			Self::Input => "input",
			Self::Change => "change",
			Self::Submit => "submit",
			Self::Focus => "focus",
			Self::PointerOver => "pointerover",
			Self::TouchStart => "touchstart",
			Self::KeyDown => "keydown",
			Self::Custom(name) => name,
		}
	}

	/// Events that hydrate an `interactive` component on first occurrence.
	pub fn is_interaction(&self) -> bool {
		matches!(
			self,
			Self::PointerOver | Self::Focus | Self::TouchStart | Self::Click
		)
	}
}

impl FromStr for EventKind {
	type Err = std::convert::Infallible;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let name = s.trim().to_ascii_lowercase();
		Ok(match name.as_str() {
			"click" => Self::Click,
			"input" => Self::Input,
			"change" => Self::Change,
			"submit" => Self::Submit,
			"focus" | "focusin" => Self::Focus,
			"pointerover" | "mouseover" => Self::PointerOver,
			"touchstart" => Self::TouchStart,
			"keydown" => Self::KeyDown,
			_ => Self::Custom(name),
		})
	}
}

impl From<String> for EventKind {
	fn from(value: String) -> Self {
		match value.parse() {
			Ok(kind) => kind,
			Err(never) => match never {},
		}
	}
}

impl From<EventKind> for String {
	fn from(value: EventKind) -> Self {
		value.as_str().to_string()
	}
}

impl std::fmt::Display for EventKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Metadata of a triggered event, passed to handlers and sent to the
/// server bridge as `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
	pub kind: EventKind,
	pub action: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub target_tag: Option<String>,
	/// `value` attribute of the target, for form controls.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub value: Option<String>,
	#[serde(default)]
	pub detail: Value,
}

impl EventPayload {
	pub fn new(kind: EventKind, action: impl Into<String>) -> Self {
		Self {
			kind,
			action: action.into(),
			target_tag: None,
			value: None,
			detail: Value::Null,
		}
	}

	pub fn detail(mut self, detail: Value) -> Self {
		self.detail = detail;
		self
	}
}
