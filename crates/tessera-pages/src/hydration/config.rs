//! Hydration configuration carried in the handoff payload.

use crate::component::NodeId;
use serde::{Deserialize, Serialize};

/// Page-wide hydration switches.
///
/// Deserializes from the handoff object
/// `{ "enabled": bool, "selective": bool, "componentIds": [..], "streaming": bool }`.
/// Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HydrationConfig {
	/// When false nothing hydrates.
	pub enabled: bool,
	/// When true only `component_ids` may hydrate, whatever their strategy.
	pub selective: bool,
	/// Allowlist used when `selective` is set.
	pub component_ids: Vec<NodeId>,
	/// When true non-critical eager nodes hydrate one per tick instead of all at once.
	pub streaming: bool,
}

impl Default for HydrationConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			selective: false,
			component_ids: Vec::new(),
			streaming: false,
		}
	}
}

impl HydrationConfig {
	/// Selective config that only allows `ids`.
	pub fn selective<I, T>(ids: I) -> Self
	where
		I: IntoIterator<Item = T>,
		T: Into<NodeId>,
	{
		Self {
			selective: true,
			component_ids: ids.into_iter().map(Into::into).collect(),
			..Self::default()
		}
	}

	pub fn disabled() -> Self {
		Self {
			enabled: false,
			..Self::default()
		}
	}

	pub fn streaming(mut self, streaming: bool) -> Self {
		self.streaming = streaming;
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_deserializes_camel_case_keys() {
		let config: HydrationConfig = serde_json::from_value(json!({
			"enabled": true,
			"selective": true,
			"componentIds": ["A"],
			"streaming": false
		}))
		.unwrap();

		assert!(config.selective);
		assert_eq!(config.component_ids, vec![NodeId::from("A")]);
	}

	#[rstest]
	fn test_missing_fields_use_defaults() {
		let config: HydrationConfig = serde_json::from_value(json!({})).unwrap();
		assert_eq!(config, HydrationConfig::default());
		assert!(config.enabled);
	}
}
