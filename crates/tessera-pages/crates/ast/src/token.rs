//! Token definitions.

use serde::{Deserialize, Serialize};

/// A single token of a parsed template.
///
/// Reference paths are stored without their namespace prefix, so
/// `{{ state.user.name }}` becomes `StateRef("user.name")`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Token {
	/// Literal markup copied verbatim into the output.
	Literal(String),
	/// A reference into the component's props.
	PropRef(String),
	/// A reference into the component's state.
	StateRef(String),
	/// A reference into the state of the frame the component belongs to.
	FrameRef(String),
	/// A call to a helper method defined on the component.
	MethodCall {
		/// Helper name.
		name: String,
		/// Call arguments, evaluated at render time.
		args: Vec<Arg>,
	},
	/// A placeholder where child components are mounted.
	ChildSlot(usize),
	/// A reference to another named template, inlined by the template store.
	Include(String),
	/// An expression that could not be parsed. Renders as an empty string.
	Unresolved(String),
}

/// An argument of a [`Token::MethodCall`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Arg {
	/// A literal JSON value (string, number, boolean or null).
	Literal(serde_json::Value),
	/// A props path.
	Prop(String),
	/// A state path.
	State(String),
	/// A frame state path.
	Frame(String),
}

/// A parsed template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Template {
	tokens: Vec<Token>,
}

impl Template {
	/// Parses template text. Parsing never fails; see [`crate::parse`].
	pub fn parse(source: &str) -> Self {
		crate::parser::parse(source)
	}

	/// Creates a template from an already built token list.
	///
	/// Child slots are renumbered in order of appearance.
	pub fn from_tokens(tokens: Vec<Token>) -> Self {
		let mut template = Self { tokens };
		template.renumber_slots();
		template
	}

	/// Returns the tokens in order.
	pub fn tokens(&self) -> &[Token] {
		&self.tokens
	}

	/// Consumes the template, returning its tokens.
	pub fn into_tokens(self) -> Vec<Token> {
		self.tokens
	}

	/// Returns the names of all templates referenced by `Include` tokens.
	pub fn includes(&self) -> Vec<&str> {
		self.tokens
			.iter()
			.filter_map(|token| match token {
				Token::Include(name) => Some(name.as_str()),
				_ => None,
			})
			.collect()
	}

	/// Returns the number of child slots in this template.
	pub fn slot_count(&self) -> usize {
		self.tokens
			.iter()
			.filter(|token| matches!(token, Token::ChildSlot(_)))
			.count()
	}

	/// Returns true if the template has no tokens.
	pub fn is_empty(&self) -> bool {
		self.tokens.is_empty()
	}

	/// Reassigns child slot indices so they follow order of appearance.
	pub fn renumber_slots(&mut self) {
		let mut next = 0;
		for token in &mut self.tokens {
			if let Token::ChildSlot(index) = token {
				*index = next;
				next += 1;
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_from_tokens_renumbers_slots() {
		let template = Template::from_tokens(vec![
			Token::ChildSlot(7),
			Token::Literal("<hr>".to_string()),
			Token::ChildSlot(7),
		]);

		assert_eq!(template.tokens()[0], Token::ChildSlot(0));
		assert_eq!(template.tokens()[2], Token::ChildSlot(1));
		assert_eq!(template.slot_count(), 2);
	}

	#[rstest]
	fn test_includes_lists_names_in_order() {
		let template = Template::from_tokens(vec![
			Token::Include("header".to_string()),
			Token::Literal("body".to_string()),
			Token::Include("footer".to_string()),
		]);

		assert_eq!(template.includes(), vec!["header", "footer"]);
	}
}
