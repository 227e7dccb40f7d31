//! Layouts: presentational arrangement directives.

use super::{LayoutId, NodeId};
use crate::dom::ElementId;
use serde::{Deserialize, Serialize};

/// How the members of a layout are arranged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum LayoutDirective {
	/// Vertical stack.
	Stack,
	/// Horizontal row.
	Row,
	/// Grid with a fixed number of columns.
	Grid { columns: u16 },
	/// Application-defined directive, written verbatim.
	Custom { value: String },
}

impl LayoutDirective {
	/// Returns the attribute value written onto the layout container.
	pub fn to_attr(&self) -> String {
		match self {
			Self::Stack => "stack".to_string(),
			Self::Row => "row".to_string(),
			Self::Grid { columns } => format!("grid:{}", columns),
			Self::Custom { value } => value.clone(),
		}
	}
}

/// A layout applied to a container and a set of member components.
///
/// Layouts carry no state.
#[derive(Debug, Clone)]
pub struct Layout {
	id: LayoutId,
	name: String,
	directive: LayoutDirective,
	container: Option<ElementId>,
	pub(crate) members: Vec<NodeId>,
}

impl Layout {
	pub fn new(
		id: LayoutId,
		name: impl Into<String>,
		directive: LayoutDirective,
		container: Option<ElementId>,
	) -> Self {
		Self {
			id,
			name: name.into(),
			directive,
			container,
			members: Vec::new(),
		}
	}

	pub fn id(&self) -> &LayoutId {
		&self.id
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn directive(&self) -> &LayoutDirective {
		&self.directive
	}

	pub fn container(&self) -> Option<ElementId> {
		self.container
	}

	pub fn members(&self) -> &[NodeId] {
		&self.members
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case(LayoutDirective::Stack, "stack")]
	#[case(LayoutDirective::Row, "row")]
	#[case(LayoutDirective::Grid { columns: 3 }, "grid:3")]
	#[case(LayoutDirective::Custom { value: "masonry".to_string() }, "masonry")]
	fn test_directive_attr(#[case] directive: LayoutDirective, #[case] expected: &str) {
		assert_eq!(directive.to_attr(), expected);
	}
}
