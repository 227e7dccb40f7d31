//! Template parser.
//!
//! The parser scans literal text for `{{ ... }}` expressions and turns each
//! expression into a typed [`Token`]. It never fails: malformed expressions
//! become [`Token::Unresolved`] and an unterminated `{{` is kept as literal text.

use crate::token::{Arg, Template, Token};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Parses template text into a [`Template`].
///
/// # Example
///
/// ```rust
/// use tessera_pages_ast::{parse, Token};
///
/// let template = parse("<li>{{ props.label }}</li>{{ @children }}");
/// assert_eq!(template.tokens().len(), 4);
/// assert_eq!(template.tokens()[3], Token::ChildSlot(0));
/// ```
pub fn parse(source: &str) -> Template {
	let mut tokens = Vec::new();
	let mut literal = String::new();
	let mut rest = source;

	while let Some(start) = rest.find(OPEN) {
		let after_open = &rest[start + OPEN.len()..];
		let Some(end) = after_open.find(CLOSE) else {
			break;
		};

		literal.push_str(&rest[..start]);
		if !literal.is_empty() {
			tokens.push(Token::Literal(std::mem::take(&mut literal)));
		}
		tokens.push(parse_expression(&after_open[..end]));
		rest = &after_open[end + CLOSE.len()..];
	}

	literal.push_str(rest);
	if !literal.is_empty() {
		tokens.push(Token::Literal(literal));
	}

	Template::from_tokens(tokens)
}

fn parse_expression(raw: &str) -> Token {
	let expr = raw.trim();
	let unresolved = || Token::Unresolved(expr.to_string());

	if let Some(directive) = expr.strip_prefix('@') {
		return parse_directive(directive).unwrap_or_else(unresolved);
	}

	if let Some(open) = expr.find('(') {
		if !expr.ends_with(')') {
			return unresolved();
		}
		let name = expr[..open].trim();
		if !is_identifier(name) {
			return unresolved();
		}
		return match parse_args(&expr[open + 1..expr.len() - 1]) {
			Some(args) => Token::MethodCall {
				name: name.to_string(),
				args,
			},
			None => unresolved(),
		};
	}

	match parse_reference(expr) {
		Some(Arg::Prop(path)) => Token::PropRef(path),
		Some(Arg::State(path)) => Token::StateRef(path),
		Some(Arg::Frame(path)) => Token::FrameRef(path),
		_ => unresolved(),
	}
}

fn parse_directive(directive: &str) -> Option<Token> {
	let mut words = directive.split_whitespace();
	let token = match (words.next()?, words.next()) {
		("children", None) => Token::ChildSlot(0),
		("include", Some(name)) if is_template_name(name) => Token::Include(name.to_string()),
		_ => return None,
	};
	// Trailing words make the directive malformed.
	words.next().is_none().then_some(token)
}

fn parse_reference(expr: &str) -> Option<Arg> {
	let (namespace, path) = expr.split_once('.')?;
	if !path.split('.').all(is_path_segment) {
		return None;
	}
	let path = path.to_string();
	match namespace {
		"props" => Some(Arg::Prop(path)),
		"state" => Some(Arg::State(path)),
		"frame" => Some(Arg::Frame(path)),
		_ => None,
	}
}

fn parse_args(inner: &str) -> Option<Vec<Arg>> {
	if inner.trim().is_empty() {
		return Some(Vec::new());
	}
	split_args(inner)?.into_iter().map(parse_arg).collect()
}

fn split_args(s: &str) -> Option<Vec<&str>> {
	let mut parts = Vec::new();
	let mut quote: Option<char> = None;
	let mut escaped = false;
	let mut start = 0;

	for (i, c) in s.char_indices() {
		if let Some(q) = quote {
			if escaped {
				escaped = false;
			} else if c == '\\' {
				escaped = true;
			} else if c == q {
				quote = None;
			}
			continue;
		}
		match c {
			'"' | '\'' => quote = Some(c),
			',' => {
				parts.push(&s[start..i]);
				start = i + 1;
			}
			_ => {}
		}
	}

	if quote.is_some() {
		return None;
	}
	parts.push(&s[start..]);
	Some(parts)
}

fn parse_arg(raw: &str) -> Option<Arg> {
	let arg = raw.trim();
	if arg.starts_with('"') || arg.starts_with('\'') {
		return parse_string_literal(arg).map(|s| Arg::Literal(serde_json::Value::String(s)));
	}
	match arg {
		"true" => return Some(Arg::Literal(serde_json::Value::Bool(true))),
		"false" => return Some(Arg::Literal(serde_json::Value::Bool(false))),
		"null" => return Some(Arg::Literal(serde_json::Value::Null)),
		_ => {}
	}
	if let Ok(int) = arg.parse::<i64>() {
		return Some(Arg::Literal(int.into()));
	}
	if arg.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '.') {
		let float = arg.parse::<f64>().ok()?;
		return serde_json::Number::from_f64(float).map(|n| Arg::Literal(n.into()));
	}
	parse_reference(arg)
}

fn parse_string_literal(arg: &str) -> Option<String> {
	let mut chars = arg.chars();
	let quote = chars.next()?;
	let mut out = String::new();
	let mut escaped = false;

	while let Some(c) = chars.next() {
		if escaped {
			out.push(c);
			escaped = false;
		} else if c == '\\' {
			escaped = true;
		} else if c == quote {
			// The closing quote must end the argument.
			return chars.next().is_none().then_some(out);
		} else {
			out.push(c);
		}
	}
	None
}

fn is_identifier(s: &str) -> bool {
	let mut chars = s.chars();
	matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
		&& chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_path_segment(s: &str) -> bool {
	!s.is_empty()
		&& s
			.chars()
			.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn is_template_name(s: &str) -> bool {
	!s.is_empty()
		&& s
			.chars()
			.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '/' | '.'))
}
