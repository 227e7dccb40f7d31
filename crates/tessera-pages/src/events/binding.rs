//! Listener registration.

use super::EventKind;
use crate::component::NodeId;
use crate::dom::{Document, ElementId};
use crate::markers::{ATTR_ACTION, ATTR_EVENT, ATTR_ID};
use std::collections::HashMap;

/// A bound listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listener {
	/// Component whose markup contains the element.
	pub owner: NodeId,
	pub kind: EventKind,
	pub action: String,
}

/// Delegated listeners keyed by (element, event kind).
///
/// There is never more than one listener per pair; binding the same pair
/// again replaces it.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
	listeners: HashMap<(ElementId, EventKind), Listener>,
}

impl ListenerRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Binds every action element in the markup owned by `owner`.
	///
	/// Elements inside nested component containers belong to those
	/// components and are skipped. `data-event` may list several kinds
	/// separated by whitespace and defaults to `click`. Returns the number
	/// of listeners bound.
	pub fn bind_component(
		&mut self,
		document: &Document,
		owner: &NodeId,
		container: ElementId,
	) -> usize {
		let mut candidates = vec![container];
		candidates.extend(document.descendants_with_attr(container, ATTR_ACTION));

		let mut bound = 0;
		for element in candidates {
			let Some(action) = document.attr(element, ATTR_ACTION) else {
				continue;
			};
			if document.closest_with_attr(element, ATTR_ID) != Some(container) {
				continue;
			}
			let kinds: Vec<EventKind> = match document.attr(element, ATTR_EVENT) {
				Some(list) if !list.trim().is_empty() => list
					.split_whitespace()
					.map(|name| EventKind::from(name.to_string()))
					.collect(),
				_ => vec![EventKind::Click],
			};
			for kind in kinds {
				self.listeners.insert(
					(element, kind.clone()),
					Listener {
						owner: owner.clone(),
						kind,
						action: action.to_string(),
					},
				);
				bound += 1;
			}
		}
		tracing::debug!("Bound {} listener(s) for {}", bound, owner);
		bound
	}

	/// Drops listeners of elements that are no longer in the document.
	pub fn purge_dead(&mut self, document: &Document) {
		self.listeners
			.retain(|(element, _), _| document.is_alive(*element));
	}

	/// Drops every listener owned by `owner`.
	pub fn unbind(&mut self, owner: &NodeId) {
		self.listeners.retain(|_, listener| &listener.owner != owner);
	}

	pub fn get(&self, element: ElementId, kind: &EventKind) -> Option<&Listener> {
		self.listeners.get(&(element, kind.clone()))
	}

	/// Finds the listener for `kind` on `target` or its nearest ancestor that has one.
	pub fn find(
		&self,
		document: &Document,
		target: ElementId,
		kind: &EventKind,
	) -> Option<(ElementId, &Listener)> {
		let mut current = Some(target);
		while let Some(element) = current {
			if let Some(listener) = self.get(element, kind) {
				return Some((element, listener));
			}
			current = document.parent(element);
		}
		None
	}

	/// Number of listeners owned by `owner`.
	pub fn count_for(&self, owner: &NodeId) -> usize {
		self.listeners
			.values()
			.filter(|listener| &listener.owner == owner)
			.count()
	}

	pub fn len(&self) -> usize {
		self.listeners.len()
	}

	pub fn is_empty(&self) -> bool {
		self.listeners.is_empty()
	}
}
