//! Error types for the rendering and hydration engine.
//!
//! Most engine failures are recoverable by policy: a missing template renders
//! fallback markup, an unresolved token renders as an empty string, a failed
//! remote action leaves state untouched. Those conditions are still modelled as
//! [`PagesError`] variants so they can be logged and collected in reports, but
//! they are never propagated out of the render, hydrate or dispatch paths.

use crate::component::{FrameId, LayoutId, NodeId};

/// Errors produced by engine and registry operations.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PagesError {
	#[error("Component not found: {0}")]
	ComponentNotFound(NodeId),

	#[error("Component id already in use: {0}")]
	DuplicateId(NodeId),

	#[error("Frame not found: {0}")]
	FrameNotFound(FrameId),

	#[error("Frame id already in use: {0}")]
	DuplicateFrame(FrameId),

	#[error("Layout not found: {0}")]
	LayoutNotFound(LayoutId),

	#[error("Layout id already in use: {0}")]
	DuplicateLayout(LayoutId),

	#[error("Component {component} already belongs to frame {frame}")]
	AlreadyInFrame { component: NodeId, frame: FrameId },

	#[error("Component {component} already belongs to layout {layout}")]
	AlreadyInLayout { component: NodeId, layout: LayoutId },

	#[error("State patch for {0} must be a JSON object")]
	InvalidStatePatch(String),

	#[error("Template not found for component '{0}'")]
	TemplateNotFound(String),

	#[error("Unresolved token '{token}' in component '{component}'")]
	UnresolvedToken { component: String, token: String },

	#[error("Remote action '{handler}' on {component} failed: {reason}")]
	RemoteActionFailure {
		component: NodeId,
		handler: String,
		reason: String,
	},

	#[error("Component {0} is already hydrated")]
	DuplicateHydration(NodeId),

	#[error("Component {0} no longer exists")]
	StaleNodeMutation(NodeId),

	#[error("Hydration of component {0} is not permitted by the page config")]
	HydrationBlocked(NodeId),

	#[error("Container of component {0} is not attached to the document")]
	ContainerDetached(NodeId),

	#[error("No store is attached to the engine")]
	StoreNotAttached,
}

/// Errors produced while fetching templates or polling for template changes.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
	#[error("Template not found: {0}")]
	NotFound(String),

	#[error("Failed to read template '{name}': {message}")]
	Io { name: String, message: String },

	#[error("Template watcher error: {0}")]
	Watch(String),
}

/// Result type for engine operations.
pub type PagesResult<T> = Result<T, PagesError>;

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_pages_error_display() {
		let err = PagesError::ComponentNotFound(NodeId::from("c-1"));
		assert_eq!(err.to_string(), "Component not found: c-1");

		let err = PagesError::UnresolvedToken {
			component: "Counter".to_string(),
			token: "state.missing".to_string(),
		};
		assert_eq!(
			err.to_string(),
			"Unresolved token 'state.missing' in component 'Counter'"
		);
	}

	#[rstest]
	fn test_template_error_display() {
		let err = TemplateError::NotFound("header".to_string());
		assert_eq!(err.to_string(), "Template not found: header");
	}
}
