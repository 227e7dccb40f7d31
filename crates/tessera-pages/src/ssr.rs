//! Server-side rendering into a handoff payload.
//!
//! The server builds a [`Registry`] for the page, renders it with
//! [`SsrRenderer`], and embeds the resulting [`Handoff`] in the response. The
//! client passes the same handoff to
//! [`Engine::hydrate_document`](crate::engine::Engine::hydrate_document).

use crate::component::{ComponentDef, NodeId};
use crate::dom::Document;
use crate::error::PagesResult;
use crate::hydration::{Handoff, HydrationConfig, InitialNode};
use crate::registry::Registry;
use crate::render::RenderContext;
use crate::template::{TemplateSource, TemplateStore};
use std::collections::HashMap;
use std::sync::Arc;

/// Renders component trees to annotated markup.
pub struct SsrRenderer {
	templates: TemplateStore,
	definitions: HashMap<String, ComponentDef>,
	fallback_class: String,
	config: HydrationConfig,
}

impl std::fmt::Debug for SsrRenderer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SsrRenderer")
			.field("config", &self.config)
			.finish_non_exhaustive()
	}
}

impl SsrRenderer {
	pub fn new(source: Arc<dyn TemplateSource>) -> Self {
		Self {
			templates: TemplateStore::new(source),
			definitions: HashMap::new(),
			fallback_class: "tessera-missing".to_string(),
			config: HydrationConfig::default(),
		}
	}

	/// Registers a definition whose helpers templates may call.
	pub fn define(mut self, definition: ComponentDef) -> Self {
		self.definitions
			.insert(definition.name().to_string(), definition);
		self
	}

	/// Sets the hydration config sent along with the markup.
	pub fn config(mut self, config: HydrationConfig) -> Self {
		self.config = config;
		self
	}

	pub fn fallback_class(mut self, class: impl Into<String>) -> Self {
		self.fallback_class = class.into();
		self
	}

	/// Renders every root of `registry`, each into its own container.
	///
	/// Render issues are logged and do not fail the page.
	pub async fn render(&mut self, registry: &Registry) -> PagesResult<Handoff> {
		let order = registry.tree_order();
		let names: Vec<String> = order
			.iter()
			.filter_map(|id| registry.get(id))
			.map(|node| node.name().to_string())
			.collect();
		self.templates
			.load_all(names.iter().map(String::as_str))
			.await;

		let ctx = RenderContext {
			registry,
			templates: &self.templates,
			definitions: &self.definitions,
			fallback_class: &self.fallback_class,
		};
		let mut document = Document::new();
		let root = document.root();
		for id in registry.roots() {
			let Some(container) = document.append_element(root, "div", Vec::new()) else {
				continue;
			};
			let report = ctx.mount(&mut document, id, container)?;
			for issue in &report.issues {
				tracing::warn!("Server render of {}: {}", id, issue);
			}
		}

		let data = registry
			.roots()
			.iter()
			.filter_map(|id| initial_node(registry, id))
			.collect();
		tracing::debug!("Rendered {} component(s) on the server", order.len());

		Ok(Handoff {
			markup: document.inner_html(root),
			data,
			config: self.config.clone(),
		})
	}
}

fn initial_node(registry: &Registry, id: &NodeId) -> Option<InitialNode> {
	let node = registry.get(id)?;
	Some(InitialNode {
		id: id.clone(),
		props: node.props().clone(),
		state: node.state().clone(),
		children: node
			.children()
			.iter()
			.filter_map(|child| initial_node(registry, child))
			.collect(),
	})
}
