//! Render pipeline: templates and state to markup, markup into containers.
//!
//! [`RenderContext::render`] substitutes one node's template. It never fails
//! because of template content: unresolved references and unknown helpers
//! render as empty strings and are reported as issues, and a missing
//! template renders fallback markup naming the component.
//!
//! [`RenderContext::mount`] writes a node's markup as the entire content of a
//! container, tags the container with the node's boundary markers, and then
//! mounts each child into a fresh wrapper inside the matching child slot.
//! Parents are always written before their children.

use crate::component::{ComponentDef, ComponentNode, HelperContext, NodeId, lookup_path};
use crate::dom::{Document, ElementId};
use crate::error::{PagesError, PagesResult};
use crate::markers::{ATTR_COMPONENT, ATTR_CRITICAL, ATTR_HYDRATE, ATTR_ID, ATTR_SLOT, slot_markup};
use crate::registry::Registry;
use crate::template::{Arg, TemplateLookup, TemplateStore, Token};
use serde_json::Value;
use std::collections::HashMap;

/// Markup produced for a single node.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
	pub markup: String,
	/// Recoverable problems hit while rendering.
	pub issues: Vec<PagesError>,
}

/// Outcome of mounting a subtree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MountReport {
	/// Mounted nodes with their containers, parents before children.
	pub mounted: Vec<(NodeId, ElementId)>,
	/// Recoverable problems hit while rendering or mounting.
	pub issues: Vec<PagesError>,
}

impl MountReport {
	pub fn container_of(&self, id: &NodeId) -> Option<ElementId> {
		self.mounted
			.iter()
			.find(|(mounted, _)| mounted == id)
			.map(|(_, container)| *container)
	}
}

/// Borrowed view of everything rendering needs.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
	pub registry: &'a Registry,
	pub templates: &'a TemplateStore,
	pub definitions: &'a HashMap<String, ComponentDef>,
	/// CSS class of the fallback markup for missing templates.
	pub fallback_class: &'a str,
}

impl<'a> RenderContext<'a> {
	/// Renders the markup of one node, without its children.
	///
	/// Child slots render as empty placeholder regions.
	pub fn render(&self, id: &NodeId) -> PagesResult<Rendered> {
		let node = self
			.registry
			.get(id)
			.ok_or_else(|| PagesError::ComponentNotFound(id.clone()))?;

		let template = match self.templates.lookup(node.name()) {
			Some(TemplateLookup::Ready(template)) => template,
			Some(TemplateLookup::Missing) | None => {
				tracing::warn!(
					"Template not found for component '{}' ({}), rendering fallback",
					node.name(),
					id
				);
				return Ok(Rendered {
					markup: self.fallback_markup(node.name()),
					issues: vec![PagesError::TemplateNotFound(node.name().to_string())],
				});
			}
		};

		let frame_state = node
			.frame()
			.and_then(|frame| self.registry.frame(frame))
			.map(|frame| frame.state());

		let mut markup = String::new();
		let mut issues = Vec::new();
		for token in template.tokens() {
			match token {
				Token::Literal(text) => markup.push_str(text),
				Token::PropRef(path) => match lookup_path(node.props(), path) {
					Some(value) => markup.push_str(&display_value(value)),
					None => issues.push(unresolved(node, format!("props.{}", path))),
				},
				Token::StateRef(path) => match lookup_path(node.state(), path) {
					Some(value) => markup.push_str(&display_value(value)),
					None => issues.push(unresolved(node, format!("state.{}", path))),
				},
				Token::FrameRef(path) => match frame_state.and_then(|s| lookup_path(s, path)) {
					Some(value) => markup.push_str(&display_value(value)),
					None => issues.push(unresolved(node, format!("frame.{}", path))),
				},
				Token::MethodCall { name, args } => {
					let helper = self
						.definitions
						.get(node.name())
						.and_then(|def| def.helper_fn(name));
					match helper {
						Some(helper) => {
							let ctx = HelperContext {
								id: node.id(),
								props: node.props(),
								state: node.state(),
								frame_state,
							};
							let args: Vec<Value> = args
								.iter()
								.map(|arg| eval_arg(arg, node, frame_state))
								.collect();
							markup.push_str(&display_value(&helper(&ctx, &args)));
						}
						None => issues.push(unresolved(node, format!("{}()", name))),
					}
				}
				Token::ChildSlot(index) => markup.push_str(&slot_markup(*index)),
				Token::Include(name) => {
					issues.push(unresolved(node, format!("@include {}", name)));
				}
				Token::Unresolved(raw) => issues.push(unresolved(node, raw.clone())),
			}
		}

		Ok(Rendered { markup, issues })
	}

	/// Mounts the subtree rooted at `id` into `container`.
	///
	/// Fails only if `id` is unknown or `container` is dead. Failures below the
	/// root are collected into the report and never stop sibling subtrees.
	pub fn mount(
		&self,
		document: &mut Document,
		id: &NodeId,
		container: ElementId,
	) -> PagesResult<MountReport> {
		let mut report = MountReport::default();
		self.mount_node(document, id, container, &mut report)?;
		Ok(report)
	}

	fn mount_node(
		&self,
		document: &mut Document,
		id: &NodeId,
		container: ElementId,
		report: &mut MountReport,
	) -> PagesResult<()> {
		let node = self
			.registry
			.get(id)
			.ok_or_else(|| PagesError::ComponentNotFound(id.clone()))?;
		if !document.is_alive(container) {
			return Err(PagesError::ContainerDetached(id.clone()));
		}

		let rendered = self.render(id)?;
		document.set_inner_html(container, &rendered.markup);
		tag_container(document, container, node);
		report.issues.extend(rendered.issues);
		report.mounted.push((id.clone(), container));

		let slots = document.descendants_with_attr(container, ATTR_SLOT);
		for (index, child) in node.children().iter().enumerate() {
			let region = match slots.len() {
				0 => container,
				len => slots[index.min(len - 1)],
			};
			let Some(wrapper) = document.append_element(region, "div", Vec::new()) else {
				continue;
			};
			if let Err(e) = self.mount_node(document, child, wrapper, report) {
				tracing::warn!("Failed to mount child {} of {}: {}", child, id, e);
				document.remove(wrapper);
				report.issues.push(e);
			}
		}
		Ok(())
	}

	fn fallback_markup(&self, name: &str) -> String {
		let name = html_escape::encode_double_quoted_attribute(name);
		format!(
			"<div class=\"{}\" data-missing-template=\"{}\">Component \"{}\" is unavailable</div>",
			html_escape::encode_double_quoted_attribute(self.fallback_class),
			name,
			name
		)
	}
}

/// Writes the boundary markers of `node` onto its container.
pub(crate) fn tag_container(document: &mut Document, container: ElementId, node: &ComponentNode) {
	document.set_attr(container, ATTR_ID, node.id().as_str());
	document.set_attr(container, ATTR_COMPONENT, node.name());
	document.set_attr(container, ATTR_HYDRATE, node.strategy().as_str());
	if node.is_critical() {
		document.set_attr(container, ATTR_CRITICAL, "true");
	} else {
		document.remove_attr(container, ATTR_CRITICAL);
	}
}

fn unresolved(node: &ComponentNode, token: String) -> PagesError {
	tracing::warn!(
		"Unresolved token '{}' in component '{}' ({})",
		token,
		node.name(),
		node.id()
	);
	PagesError::UnresolvedToken {
		component: node.name().to_string(),
		token,
	}
}

fn eval_arg(arg: &Arg, node: &ComponentNode, frame_state: Option<&Value>) -> Value {
	let found = match arg {
		Arg::Literal(value) => return value.clone(),
		Arg::Prop(path) => lookup_path(node.props(), path),
		Arg::State(path) => lookup_path(node.state(), path),
		Arg::Frame(path) => frame_state.and_then(|s| lookup_path(s, path)),
	};
	found.cloned().unwrap_or(Value::Null)
}

/// Converts a JSON value into escaped display text.
///
/// Strings are escaped, numbers and booleans print as-is, `null` prints
/// nothing, arrays and objects print as escaped JSON.
pub fn display_value(value: &Value) -> String {
	match value {
		Value::Null => String::new(),
		Value::Bool(b) => b.to_string(),
		Value::Number(n) => n.to_string(),
		Value::String(s) => html_escape::encode_safe(s).into_owned(),
		Value::Array(_) | Value::Object(_) => {
			html_escape::encode_safe(&value.to_string()).into_owned()
		}
	}
}
