//! In-memory document model.
//!
//! A small arena-backed DOM that the render pipeline mounts markup into. It
//! supports exactly what the engine needs: replacing a container's content
//! wholesale, attribute access, ancestor/descendant queries and serialization.
//!
//! Markup is parsed with `tl`. Text and attribute values are stored as they
//! appear in the markup (entities are not decoded), so serializing a parsed
//! fragment yields equivalent markup.

use std::fmt::Write as _;

/// Handle to an element.
///
/// Slots of removed elements are recycled. The generation distinguishes a
/// recycled slot from the element that used to live there, so a handle to a
/// removed element stays dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementId {
	index: usize,
	generation: u32,
}

#[derive(Debug, Clone)]
enum Child {
	Element(ElementId),
	Text(String),
}

#[derive(Debug, Clone)]
struct ElementData {
	tag: String,
	attrs: Vec<(String, String)>,
	children: Vec<Child>,
	parent: Option<ElementId>,
}

const VOID_ELEMENTS: &[&str] = &[
	"area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
	"wbr",
];

#[derive(Debug, Clone)]
struct Slot {
	generation: u32,
	data: Option<ElementData>,
}

enum Emit<'a> {
	Open(ElementId),
	Text(&'a str),
	Close(&'a str),
}

/// An arena of elements rooted at a `<body>` element.
#[derive(Debug, Clone)]
pub struct Document {
	slots: Vec<Slot>,
	free: Vec<usize>,
	root: ElementId,
}

impl Default for Document {
	fn default() -> Self {
		Self::new()
	}
}

impl Document {
	/// Creates a document containing an empty root element.
	pub fn new() -> Self {
		let mut document = Self {
			slots: Vec::new(),
			free: Vec::new(),
			root: ElementId {
				index: 0,
				generation: 0,
			},
		};
		document.root = document.create_element("body", Vec::new());
		document
	}

	pub fn root(&self) -> ElementId {
		self.root
	}

	/// Returns true if the element exists and has not been removed.
	pub fn is_alive(&self, id: ElementId) -> bool {
		self.data(id).is_some()
	}

	/// Number of live elements, the root included.
	pub fn len(&self) -> usize {
		self.slots.len() - self.free.len()
	}

	/// Always false: the root cannot be removed.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn data(&self, id: ElementId) -> Option<&ElementData> {
		self.slots
			.get(id.index)
			.filter(|slot| slot.generation == id.generation)
			.and_then(|slot| slot.data.as_ref())
	}

	fn data_mut(&mut self, id: ElementId) -> Option<&mut ElementData> {
		self.slots
			.get_mut(id.index)
			.filter(|slot| slot.generation == id.generation)
			.and_then(|slot| slot.data.as_mut())
	}

	fn create_element(&mut self, tag: &str, attrs: Vec<(String, String)>) -> ElementId {
		let data = ElementData {
			tag: tag.to_ascii_lowercase(),
			attrs,
			children: Vec::new(),
			parent: None,
		};
		match self.free.pop() {
			Some(index) => {
				let slot = &mut self.slots[index];
				slot.data = Some(data);
				ElementId {
					index,
					generation: slot.generation,
				}
			}
			None => {
				self.slots.push(Slot {
					generation: 0,
					data: Some(data),
				});
				ElementId {
					index: self.slots.len() - 1,
					generation: 0,
				}
			}
		}
	}

	/// Appends a new element as the last child of `parent`.
	///
	/// Returns `None` if `parent` is dead.
	pub fn append_element(
		&mut self,
		parent: ElementId,
		tag: &str,
		attrs: Vec<(String, String)>,
	) -> Option<ElementId> {
		if !self.is_alive(parent) {
			return None;
		}
		let id = self.create_element(tag, attrs);
		if let Some(data) = self.data_mut(id) {
			data.parent = Some(parent);
		}
		if let Some(parent_data) = self.data_mut(parent) {
			parent_data.children.push(Child::Element(id));
		}
		Some(id)
	}

	fn append_text(&mut self, parent: ElementId, text: String) {
		if let Some(data) = self.data_mut(parent) {
			data.children.push(Child::Text(text));
		}
	}

	/// Replaces the whole content of `container` with parsed `markup`.
	///
	/// All previous descendants are removed. Returns false if `container` is dead.
	pub fn set_inner_html(&mut self, container: ElementId, markup: &str) -> bool {
		if !self.is_alive(container) {
			return false;
		}
		self.clear_children(container);

		let dom = match tl::parse(markup, tl::ParserOptions::default()) {
			Ok(dom) => dom,
			Err(e) => {
				tracing::warn!("Failed to parse markup, inserting as text: {:?}", e);
				self.append_text(container, markup.to_string());
				return true;
			}
		};
		self.import(container, dom.children(), dom.parser());
		true
	}

	fn import(&mut self, container: ElementId, roots: &[tl::NodeHandle], parser: &tl::Parser<'_>) {
		let mut stack: Vec<(ElementId, tl::NodeHandle)> =
			roots.iter().rev().map(|handle| (container, *handle)).collect();
		while let Some((parent, handle)) = stack.pop() {
			let Some(node) = handle.get(parser) else {
				continue;
			};
			match node {
				tl::Node::Tag(tag) => {
					let name = tag.name().as_utf8_str().to_string();
					let attrs = tag
						.attributes()
						.iter()
						.map(|(key, value)| {
							let key: &str = key.as_ref();
							(key.to_string(), value.map(|v| v.to_string()).unwrap_or_default())
						})
						.collect();
					let Some(element) = self.append_element(parent, &name, attrs) else {
						continue;
					};
					stack.extend(tag.children().top().as_slice().iter().rev().map(|child| (element, *child)));
				}
				tl::Node::Raw(bytes) => {
					let text = bytes.as_utf8_str();
					if !text.is_empty() {
						self.append_text(parent, text.to_string());
					}
				}
				tl::Node::Comment(_) => {}
			}
		}
	}

	fn clear_children(&mut self, id: ElementId) {
		let children = match self.data_mut(id) {
			Some(data) => std::mem::take(&mut data.children),
			None => return,
		};
		for child in children {
			if let Child::Element(element) = child {
				self.kill(element);
			}
		}
	}

	fn kill(&mut self, id: ElementId) {
		let mut stack = vec![id];
		while let Some(current) = stack.pop() {
			let Some(slot) = self
				.slots
				.get_mut(current.index)
				.filter(|slot| slot.generation == current.generation)
			else {
				continue;
			};
			if let Some(data) = slot.data.take() {
				slot.generation = slot.generation.wrapping_add(1);
				self.free.push(current.index);
				stack.extend(data.children.into_iter().filter_map(|c| match c {
					Child::Element(e) => Some(e),
					Child::Text(_) => None,
				}));
			}
		}
	}

	/// Detaches `id` from its parent and removes it with all descendants.
	///
	/// The root cannot be removed.
	pub fn remove(&mut self, id: ElementId) {
		if id == self.root {
			return;
		}
		if let Some(parent) = self.parent(id) {
			if let Some(parent_data) = self.data_mut(parent) {
				parent_data
					.children
					.retain(|c| !matches!(c, Child::Element(e) if *e == id));
			}
		}
		self.kill(id);
	}

	pub fn tag(&self, id: ElementId) -> Option<&str> {
		self.data(id).map(|d| d.tag.as_str())
	}

	pub fn parent(&self, id: ElementId) -> Option<ElementId> {
		self.data(id).and_then(|d| d.parent)
	}

	pub fn attr(&self, id: ElementId, name: &str) -> Option<&str> {
		self.data(id)?
			.attrs
			.iter()
			.find(|(key, _)| key == name)
			.map(|(_, value)| value.as_str())
	}

	pub fn has_attr(&self, id: ElementId, name: &str) -> bool {
		self.attr(id, name).is_some()
	}

	/// Sets an attribute, replacing any previous value.
	pub fn set_attr(&mut self, id: ElementId, name: &str, value: &str) {
		let Some(data) = self.data_mut(id) else {
			return;
		};
		match data.attrs.iter_mut().find(|(key, _)| key == name) {
			Some((_, existing)) => *existing = value.to_string(),
			None => data.attrs.push((name.to_string(), value.to_string())),
		}
	}

	pub fn remove_attr(&mut self, id: ElementId, name: &str) {
		if let Some(data) = self.data_mut(id) {
			data.attrs.retain(|(key, _)| key != name);
		}
	}

	/// Child elements of `id` in order.
	pub fn child_elements(&self, id: ElementId) -> Vec<ElementId> {
		self.data(id)
			.map(|d| {
				d.children
					.iter()
					.filter_map(|c| match c {
						Child::Element(e) => Some(*e),
						Child::Text(_) => None,
					})
					.collect()
			})
			.unwrap_or_default()
	}

	/// Descendant elements of `id` (excluding `id`) in document order.
	pub fn descendants(&self, id: ElementId) -> Vec<ElementId> {
		let mut out = Vec::new();
		let mut stack: Vec<ElementId> = self.child_elements(id).into_iter().rev().collect();
		while let Some(current) = stack.pop() {
			out.push(current);
			stack.extend(self.child_elements(current).into_iter().rev());
		}
		out
	}

	/// Descendants of `id` carrying attribute `name`, in document order.
	pub fn descendants_with_attr(&self, id: ElementId, name: &str) -> Vec<ElementId> {
		self.descendants(id)
			.into_iter()
			.filter(|e| self.has_attr(*e, name))
			.collect()
	}

	/// First element in the document whose attribute `name` equals `value`.
	pub fn find_by_attr(&self, name: &str, value: &str) -> Option<ElementId> {
		self.descendants(self.root)
			.into_iter()
			.find(|e| self.attr(*e, name) == Some(value))
	}

	/// Nearest element, starting at `id` itself, that carries attribute `name`.
	pub fn closest_with_attr(&self, id: ElementId, name: &str) -> Option<ElementId> {
		let mut current = Some(id);
		while let Some(element) = current {
			if self.has_attr(element, name) {
				return Some(element);
			}
			current = self.parent(element);
		}
		None
	}

	/// Returns true if `id` is `ancestor` or one of its descendants.
	pub fn contains(&self, ancestor: ElementId, id: ElementId) -> bool {
		let mut current = Some(id);
		while let Some(element) = current {
			if element == ancestor {
				return true;
			}
			current = self.parent(element);
		}
		false
	}

	/// Elements whose activation navigates by default: links with an `href` and forms.
	pub fn is_navigational(&self, id: ElementId) -> bool {
		match self.tag(id) {
			Some("a") => self.has_attr(id, "href"),
			Some("form") => true,
			_ => false,
		}
	}

	/// Serialized content of `id`.
	pub fn inner_html(&self, id: ElementId) -> String {
		let mut out = String::new();
		if let Some(data) = self.data(id) {
			let mut stack: Vec<Emit<'_>> = data.children.iter().rev().map(Self::write_child).collect();
			self.write(&mut stack, &mut out);
		}
		out
	}

	/// Serialized element including its own tag.
	pub fn outer_html(&self, id: ElementId) -> String {
		let mut out = String::new();
		self.write(&mut vec![Emit::Open(id)], &mut out);
		out
	}

	/// Concatenated text of all descendant text nodes.
	pub fn text_content(&self, id: ElementId) -> String {
		let mut out = String::new();
		let mut stack: Vec<&Child> = self
			.data(id)
			.map(|d| d.children.iter().rev().collect())
			.unwrap_or_default();
		while let Some(child) = stack.pop() {
			match child {
				Child::Text(text) => out.push_str(text),
				Child::Element(e) => {
					if let Some(data) = self.data(*e) {
						stack.extend(data.children.iter().rev());
					}
				}
			}
		}
		out
	}

	fn write_child(child: &Child) -> Emit<'_> {
		match child {
			Child::Element(e) => Emit::Open(*e),
			Child::Text(text) => Emit::Text(text),
		}
	}

	fn write<'a>(&'a self, stack: &mut Vec<Emit<'a>>, out: &mut String) {
		while let Some(item) = stack.pop() {
			let id = match item {
				Emit::Open(id) => id,
				Emit::Text(text) => {
					out.push_str(text);
					continue;
				}
				Emit::Close(tag) => {
					let _ = write!(out, "</{}>", tag);
					continue;
				}
			};
			let Some(data) = self.data(id) else {
				continue;
			};
			out.push('<');
			out.push_str(&data.tag);
			for (key, value) in &data.attrs {
				let _ = write!(out, " {}=\"{}\"", key, value.replace('"', "&quot;"));
			}
			out.push('>');
			if VOID_ELEMENTS.contains(&data.tag.as_str()) {
				continue;
			}
			stack.push(Emit::Close(&data.tag));
			stack.extend(data.children.iter().rev().map(Self::write_child));
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_set_inner_html_builds_tree() {
		let mut doc = Document::new();
		let root = doc.root();
		assert!(doc.set_inner_html(root, r#"<div id="a"><span class="x">hi</span></div>"#));

		let children = doc.child_elements(root);
		assert_eq!(children.len(), 1);
		assert_eq!(doc.tag(children[0]), Some("div"));
		assert_eq!(doc.attr(children[0], "id"), Some("a"));
		assert_eq!(doc.text_content(root), "hi");
	}

	#[rstest]
	fn test_set_inner_html_overwrites_previous_content() {
		let mut doc = Document::new();
		let root = doc.root();
		doc.set_inner_html(root, "<p>one</p>");
		let old = doc.child_elements(root)[0];

		doc.set_inner_html(root, "<p>two</p>");

		assert!(!doc.is_alive(old));
		assert_eq!(doc.inner_html(root), "<p>two</p>");
	}

	#[rstest]
	fn test_closest_and_contains() {
		let mut doc = Document::new();
		let root = doc.root();
		doc.set_inner_html(root, r#"<section data-k="1"><ul><li>x</li></ul></section>"#);
		let li = doc.descendants(root).into_iter().find(|e| doc.tag(*e) == Some("li")).unwrap();
		let section = doc.child_elements(root)[0];

		assert_eq!(doc.closest_with_attr(li, "data-k"), Some(section));
		assert!(doc.contains(section, li));
		assert!(!doc.contains(li, section));
	}

	#[rstest]
	fn test_remove_detaches_subtree() {
		let mut doc = Document::new();
		let root = doc.root();
		doc.set_inner_html(root, "<div><b>1</b></div><i>2</i>");
		let div = doc.child_elements(root)[0];
		let bold = doc.child_elements(div)[0];

		doc.remove(div);

		assert!(!doc.is_alive(div));
		assert!(!doc.is_alive(bold));
		assert_eq!(doc.inner_html(root), "<i>2</i>");
	}

	#[rstest]
	fn test_attributes_round_trip() {
		let mut doc = Document::new();
		let root = doc.root();
		let div = doc.append_element(root, "div", vec![]).unwrap();

		doc.set_attr(div, "data-x", "1");
		doc.set_attr(div, "data-x", "2");
		assert_eq!(doc.attr(div, "data-x"), Some("2"));
		assert_eq!(doc.outer_html(div), r#"<div data-x="2"></div>"#);

		doc.remove_attr(div, "data-x");
		assert!(!doc.has_attr(div, "data-x"));
	}

	#[rstest]
	#[case(r#"<a href="/next">go</a>"#, true)]
	#[case(r#"<a name="anchor">here</a>"#, false)]
	#[case(r#"<form><p>f</p></form>"#, true)]
	#[case(r#"<button>b</button>"#, false)]
	fn test_is_navigational(#[case] markup: &str, #[case] expected: bool) {
		let mut doc = Document::new();
		let root = doc.root();
		doc.set_inner_html(root, markup);
		let element = doc.child_elements(root)[0];
		assert_eq!(doc.is_navigational(element), expected);
	}

	#[rstest]
	fn test_find_by_attr_in_document_order() {
		let mut doc = Document::new();
		let root = doc.root();
		doc.set_inner_html(root, r#"<div data-n="x"><p data-n="y"></p></div><p data-n="y"></p>"#);
		let found = doc.find_by_attr("data-n", "y").unwrap();
		assert_eq!(doc.parent(found).and_then(|p| doc.attr(p, "data-n")), Some("x"));
	}

	#[rstest]
	fn test_repeated_overwrite_recycles_slots() {
		let mut doc = Document::new();
		let root = doc.root();

		for i in 0..10_000 {
			doc.set_inner_html(root, &format!("<div><span>{}</span></div>", i));
		}

		assert_eq!(doc.len(), 3);
		assert!(doc.slots.len() <= 5);
		assert_eq!(doc.text_content(root), "9999");
	}

	#[rstest]
	fn test_stale_handle_stays_dead_after_slot_reuse() {
		let mut doc = Document::new();
		let root = doc.root();
		doc.set_inner_html(root, r#"<p data-k="old"></p>"#);
		let old = doc.child_elements(root)[0];

		doc.set_inner_html(root, r#"<p data-k="new"></p>"#);
		let new = doc.child_elements(root)[0];

		assert_ne!(old, new);
		assert!(!doc.is_alive(old));
		assert_eq!(doc.attr(old, "data-k"), None);
		assert_eq!(doc.attr(new, "data-k"), Some("new"));
	}

	#[rstest]
	fn test_deeply_nested_markup_does_not_overflow() {
		let depth = 200_000;
		let markup = format!("{}x{}", "<div>".repeat(depth), "</div>".repeat(depth));
		let mut doc = Document::new();
		let root = doc.root();

		assert!(doc.set_inner_html(root, &markup));

		assert_eq!(doc.len(), depth + 1);
		assert_eq!(doc.text_content(root), "x");
		assert_eq!(doc.inner_html(root), markup);
		assert_eq!(doc.descendants(root).len(), depth);
		doc.set_inner_html(root, "");
		assert_eq!(doc.len(), 1);
	}
}
