//! Parsed template cache.

use super::TemplateSource;
use crate::error::TemplateError;
use futures::future::join_all;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tessera_pages_ast::{Template, Token};

/// Result of looking up a loaded template.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateLookup {
	/// The template with all includes inlined.
	Ready(Arc<Template>),
	/// The source reported that no template exists under this name.
	Missing,
}

/// Cache of parsed templates keyed by component name.
///
/// Loading is asynchronous (templates come from a [`TemplateSource`]);
/// lookups during rendering are synchronous and only see what was loaded.
/// Included templates are inlined when a template is loaded, so the cached
/// token streams contain no `Include` tokens and child slots are numbered
/// across the whole inlined stream.
pub struct TemplateStore {
	source: Arc<dyn TemplateSource>,
	parsed: HashMap<String, Arc<Template>>,
	resolved: HashMap<String, Arc<Template>>,
	missing: HashSet<String>,
	// include name -> templates that inline it
	dependents: HashMap<String, BTreeSet<String>>,
}

impl std::fmt::Debug for TemplateStore {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TemplateStore")
			.field("resolved", &self.resolved.keys().collect::<Vec<_>>())
			.field("missing", &self.missing)
			.finish_non_exhaustive()
	}
}

impl TemplateStore {
	pub fn new(source: Arc<dyn TemplateSource>) -> Self {
		Self {
			source,
			parsed: HashMap::new(),
			resolved: HashMap::new(),
			missing: HashSet::new(),
			dependents: HashMap::new(),
		}
	}

	/// Returns the cached template, loading it (and its includes) on a miss.
	pub async fn load(&mut self, name: &str) -> TemplateLookup {
		if let Some(lookup) = self.lookup(name) {
			return lookup;
		}

		self.fetch_closure(name).await;

		if !self.parsed.contains_key(name) {
			return TemplateLookup::Missing;
		}

		let mut tokens = Vec::new();
		let mut stack = vec![name.to_string()];
		let mut includes = BTreeSet::new();
		self.inline(name, &mut stack, &mut tokens, &mut includes);

		for include in includes {
			self.dependents
				.entry(include)
				.or_default()
				.insert(name.to_string());
		}

		let template = Arc::new(Template::from_tokens(tokens));
		self.resolved
			.insert(name.to_string(), Arc::clone(&template));
		TemplateLookup::Ready(template)
	}

	/// Loads every template in `names`.
	pub async fn load_all<'a, I>(&mut self, names: I)
	where
		I: IntoIterator<Item = &'a str>,
	{
		for name in names {
			self.load(name).await;
		}
	}

	/// Synchronous lookup. Returns `None` if `name` has not been loaded yet.
	pub fn lookup(&self, name: &str) -> Option<TemplateLookup> {
		if let Some(template) = self.resolved.get(name) {
			return Some(TemplateLookup::Ready(Arc::clone(template)));
		}
		self.missing
			.contains(name)
			.then_some(TemplateLookup::Missing)
	}

	pub fn is_cached(&self, name: &str) -> bool {
		self.resolved.contains_key(name)
	}

	/// Drops `name` from the cache along with every template that includes it.
	///
	/// Returns the invalidated names, `name` first. The next [`load`](Self::load)
	/// of any of them fetches again.
	pub fn invalidate(&mut self, name: &str) -> Vec<String> {
		let mut out = vec![name.to_string()];
		let mut queue = vec![name.to_string()];
		let mut seen: HashSet<String> = HashSet::from([name.to_string()]);

		while let Some(current) = queue.pop() {
			for dependent in self.dependents.get(&current).into_iter().flatten() {
				if seen.insert(dependent.clone()) {
					out.push(dependent.clone());
					queue.push(dependent.clone());
				}
			}
		}

		self.parsed.remove(name);
		self.missing.remove(name);
		for invalidated in &out {
			self.resolved.remove(invalidated);
		}
		tracing::debug!("Invalidated templates: {:?}", out);
		out
	}

	/// Clears the whole cache.
	pub fn clear(&mut self) {
		self.parsed.clear();
		self.resolved.clear();
		self.missing.clear();
		self.dependents.clear();
	}

	/// Fetches `name` and everything it includes, one include level at a time.
	/// Templates of the same level are fetched concurrently.
	async fn fetch_closure(&mut self, name: &str) {
		let mut wave = vec![name.to_string()];
		let mut visited = HashSet::new();

		while !wave.is_empty() {
			let mut next_wave = Vec::new();
			let mut to_fetch = Vec::new();
			for next in wave.drain(..) {
				if !visited.insert(next.clone()) || self.missing.contains(&next) {
					continue;
				}
				match self.parsed.get(&next) {
					Some(template) => {
						next_wave.extend(template.includes().into_iter().map(str::to_string));
					}
					None => to_fetch.push(next),
				}
			}

			let source = Arc::clone(&self.source);
			let results = join_all(to_fetch.iter().map(|next| source.fetch(next))).await;
			for (next, result) in to_fetch.into_iter().zip(results) {
				match result {
					Ok(text) => {
						let template = Template::parse(&text);
						next_wave.extend(template.includes().into_iter().map(str::to_string));
						self.parsed.insert(next, Arc::new(template));
					}
					Err(TemplateError::NotFound(_)) => {
						self.missing.insert(next);
					}
					Err(e) => {
						// Not cached: the next load retries.
						tracing::warn!("Failed to fetch template '{}': {}", next, e);
					}
				}
			}
			wave = next_wave;
		}
	}

	fn inline(
		&self,
		name: &str,
		stack: &mut Vec<String>,
		out: &mut Vec<Token>,
		includes: &mut BTreeSet<String>,
	) {
		let Some(template) = self.parsed.get(name) else {
			return;
		};
		for token in template.tokens() {
			let Token::Include(include) = token else {
				out.push(token.clone());
				continue;
			};
			includes.insert(include.clone());
			if stack.contains(include) {
				tracing::warn!(
					"Include cycle: '{}' includes '{}' which is already being inlined",
					name,
					include
				);
				continue;
			}
			if !self.parsed.contains_key(include) {
				tracing::warn!(
					"Template not found for include '{}' in '{}'",
					include,
					name
				);
				continue;
			}
			stack.push(include.clone());
			self.inline(include, stack, out, includes);
			stack.pop();
		}
	}
}
