//! Component, frame and layout data model.
//!
//! Nodes live in the [`Registry`](crate::registry::Registry) arena and refer to
//! each other by id. A parent id is a back-reference used for traversal only;
//! ownership flows from the registry through the ordered `children` list.

pub mod definition;
pub mod frame;
pub mod layout;
pub mod node;

pub use definition::{ActionContext, ActionFn, ComponentDef, Handler, HelperContext, HelperFn};
pub use frame::Frame;
pub use layout::{Layout, LayoutDirective};
pub use node::{ComponentNode, HydrationStatus, HydrationStrategy, NewComponent};

use serde::{Deserialize, Serialize};

macro_rules! define_id {
	($(#[$meta:meta])* $name:ident) => {
		$(#[$meta])*
		#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(String);

		impl $name {
			/// Returns the id as a string slice.
			pub fn as_str(&self) -> &str {
				&self.0
			}
		}

		impl std::fmt::Display for $name {
			fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
				f.write_str(&self.0)
			}
		}

		impl From<&str> for $name {
			fn from(value: &str) -> Self {
				Self(value.to_string())
			}
		}

		impl From<String> for $name {
			fn from(value: String) -> Self {
				Self(value)
			}
		}

		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
	};
}

define_id!(
	/// Unique, stable id of a component node.
	NodeId
);

define_id!(
	/// Unique id of a frame.
	FrameId
);

define_id!(
	/// Unique id of a layout.
	LayoutId
);

/// Reads a dotted path (`user.name`, `items.0`) out of a JSON value.
pub(crate) fn lookup_path<'v>(
	value: &'v serde_json::Value,
	path: &str,
) -> Option<&'v serde_json::Value> {
	path.split('.').try_fold(value, |current, segment| match current {
		serde_json::Value::Object(map) => map.get(segment),
		serde_json::Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
		_ => None,
	})
}

/// Shallow-merges `patch` into `target`, replacing non-object targets.
pub(crate) fn merge_object(
	target: &mut serde_json::Value,
	patch: serde_json::Map<String, serde_json::Value>,
) {
	if !target.is_object() {
		*target = serde_json::Value::Object(serde_json::Map::new());
	}
	if let serde_json::Value::Object(map) = target {
		map.extend(patch);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	#[case("name", Some(json!("Ada")))]
	#[case("tags.1", Some(json!("b")))]
	#[case("address.city", Some(json!("Paris")))]
	#[case("address.zip", None)]
	#[case("tags.9", None)]
	#[case("name.first", None)]
	fn test_lookup_path(#[case] path: &str, #[case] expected: Option<serde_json::Value>) {
		let value = json!({
			"name": "Ada",
			"tags": ["a", "b"],
			"address": { "city": "Paris" }
		});
		assert_eq!(lookup_path(&value, path).cloned(), expected);
	}

	#[rstest]
	fn test_merge_object_keeps_untouched_keys() {
		let mut state = json!({ "count": 1, "label": "x" });
		let patch = json!({ "count": 2 }).as_object().cloned().unwrap_or_default();
		merge_object(&mut state, patch);
		assert_eq!(state, json!({ "count": 2, "label": "x" }));
	}

	#[rstest]
	fn test_merge_object_replaces_non_object() {
		let mut state = json!(null);
		let patch = json!({ "ready": true }).as_object().cloned().unwrap_or_default();
		merge_object(&mut state, patch);
		assert_eq!(state, json!({ "ready": true }));
	}

	#[rstest]
	fn test_id_display_and_serde() {
		let id = NodeId::from("counter-1");
		assert_eq!(id.to_string(), "counter-1");
		assert_eq!(serde_json::to_value(&id).ok(), Some(json!("counter-1")));
	}
}
