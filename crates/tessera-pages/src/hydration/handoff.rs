//! The server-to-client handoff payload.

use super::HydrationConfig;
use crate::component::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The global JavaScript variable name the handoff is assigned to.
pub const HANDOFF_VAR: &str = "__TESSERA_HANDOFF__";

/// Server props and state of one component, mirroring the markup tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialNode {
	pub id: NodeId,
	#[serde(default)]
	pub props: Value,
	#[serde(default)]
	pub state: Value,
	#[serde(default)]
	pub children: Vec<InitialNode>,
}

impl InitialNode {
	/// Finds the entry for `id` anywhere in this subtree.
	pub fn find(&self, id: &NodeId) -> Option<&InitialNode> {
		if &self.id == id {
			return Some(self);
		}
		self.children.iter().find_map(|child| child.find(id))
	}
}

/// Everything the client needs to take over a server-rendered page.
///
/// - `markup`: annotated markup; every component boundary carries the
///   `data-tessera-*` markers
/// - `data`: initial-data tree with props and state per id
/// - `config`: page-wide hydration switches
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Handoff {
	pub markup: String,
	#[serde(default)]
	pub data: Vec<InitialNode>,
	#[serde(default)]
	pub config: HydrationConfig,
}

impl Handoff {
	/// Finds the initial data for `id`.
	pub fn initial(&self, id: &NodeId) -> Option<&InitialNode> {
		self.data.iter().find_map(|root| root.find(id))
	}

	pub fn to_json(&self) -> Result<String, serde_json::Error> {
		serde_json::to_string(self)
	}

	pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
		serde_json::from_str(json)
	}

	/// Generates a `<script>` tag assigning the data tree and config to
	/// [`HANDOFF_VAR`]. The markup is not included.
	pub fn to_script_tag(&self) -> String {
		let payload = serde_json::json!({
			"data": self.data,
			"config": self.config,
		});
		// `</` inside a script element would terminate it early.
		let json = payload.to_string().replace("</", "<\\/");
		format!(
			r#"<script id="tessera-handoff" type="application/json">window.{} = {};</script>"#,
			HANDOFF_VAR, json
		)
	}
}
