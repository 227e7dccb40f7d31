//! Template sources.

use crate::error::TemplateError;
use crate::live_reload::{ChangeFeed, ChangeKind, TemplateChange};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Supplies template text by component name.
#[async_trait]
pub trait TemplateSource: Send + Sync {
	/// Fetches the template text for `name`.
	///
	/// Returns [`TemplateError::NotFound`] when no such template exists.
	async fn fetch(&self, name: &str) -> Result<String, TemplateError>;
}

/// An in-process template source.
///
/// Every insertion and removal is recorded, so the source doubles as a
/// [`ChangeFeed`] for live reload.
///
/// # Example
///
/// ```rust
/// use tessera_pages::template::MemoryTemplateSource;
///
/// let source = MemoryTemplateSource::new()
///     .with("Counter", "<span>{{ state.count }}</span>");
/// assert!(source.contains("Counter"));
/// ```
#[derive(Debug, Default)]
pub struct MemoryTemplateSource {
	templates: RwLock<HashMap<String, String>>,
	changes: Mutex<Vec<TemplateChange>>,
}

impl MemoryTemplateSource {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a template without recording a change.
	pub fn with(self, name: impl Into<String>, text: impl Into<String>) -> Self {
		self.templates.write().insert(name.into(), text.into());
		self
	}

	/// Inserts or replaces a template, recording an `added` or `modified` change.
	pub fn insert(&self, name: impl Into<String>, text: impl Into<String>) {
		let name = name.into();
		let previous = self.templates.write().insert(name.clone(), text.into());
		let kind = if previous.is_some() {
			ChangeKind::Modified
		} else {
			ChangeKind::Added
		};
		self.changes.lock().push(TemplateChange {
			kind,
			path: format!("memory://{}", name),
			name,
		});
	}

	/// Removes a template, recording a `deleted` change if it existed.
	pub fn remove(&self, name: &str) -> bool {
		let removed = self.templates.write().remove(name).is_some();
		if removed {
			self.changes.lock().push(TemplateChange {
				kind: ChangeKind::Deleted,
				path: format!("memory://{}", name),
				name: name.to_string(),
			});
		}
		removed
	}

	pub fn contains(&self, name: &str) -> bool {
		self.templates.read().contains_key(name)
	}
}

#[async_trait]
impl TemplateSource for MemoryTemplateSource {
	async fn fetch(&self, name: &str) -> Result<String, TemplateError> {
		self.templates
			.read()
			.get(name)
			.cloned()
			.ok_or_else(|| TemplateError::NotFound(name.to_string()))
	}
}

#[async_trait]
impl ChangeFeed for MemoryTemplateSource {
	async fn poll(&self) -> Result<Vec<TemplateChange>, TemplateError> {
		Ok(std::mem::take(&mut *self.changes.lock()))
	}
}

/// Template file extension used by [`FileTemplateSource`].
const TEMPLATE_EXTENSION: &str = "html";

/// Reads templates from `<root>/<name>.html`.
///
/// Names may contain `/` to address sub-directories (`partials/footer`).
/// With the `hmr` feature, [`FileTemplateSource::watch`] enables a
/// notify-backed [`ChangeFeed`].
#[derive(Debug)]
pub struct FileTemplateSource {
	root: PathBuf,
	#[cfg(feature = "hmr")]
	watcher: Mutex<Option<watch::TemplateWatcher>>,
}

impl FileTemplateSource {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self {
			root: root.into(),
			#[cfg(feature = "hmr")]
			watcher: Mutex::new(None),
		}
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	/// Path of the file backing `name`. Returns `None` for names escaping the root.
	pub fn path_for(&self, name: &str) -> Option<PathBuf> {
		if name.is_empty() || name.split('/').any(|seg| seg.is_empty() || seg == "..") {
			return None;
		}
		Some(self.root.join(format!("{}.{}", name, TEMPLATE_EXTENSION)))
	}

	/// Template name for a path under the root, if it is a template file.
	pub fn name_for(&self, path: &Path) -> Option<String> {
		let relative = path.strip_prefix(&self.root).ok()?;
		if relative.extension()? != TEMPLATE_EXTENSION {
			return None;
		}
		let stem = relative.with_extension("");
		let segments: Vec<_> = stem
			.components()
			.map(|c| c.as_os_str().to_string_lossy().into_owned())
			.collect();
		Some(segments.join("/"))
	}
}

#[async_trait]
impl TemplateSource for FileTemplateSource {
	async fn fetch(&self, name: &str) -> Result<String, TemplateError> {
		let path = self
			.path_for(name)
			.ok_or_else(|| TemplateError::NotFound(name.to_string()))?;
		match tokio::fs::read_to_string(&path).await {
			Ok(text) => Ok(text),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				Err(TemplateError::NotFound(name.to_string()))
			}
			Err(e) => Err(TemplateError::Io {
				name: name.to_string(),
				message: e.to_string(),
			}),
		}
	}
}

#[cfg(feature = "hmr")]
mod watch {
	use super::*;
	use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
	use tokio::sync::mpsc;

	/// Raw change observed by the file watcher.
	#[derive(Debug)]
	pub(super) struct RawChange {
		pub(super) kind: ChangeKind,
		pub(super) path: PathBuf,
	}

	pub(super) struct TemplateWatcher {
		_watcher: RecommendedWatcher,
		pub(super) receiver: mpsc::UnboundedReceiver<Result<RawChange, String>>,
	}

	impl std::fmt::Debug for TemplateWatcher {
		fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
			f.debug_struct("TemplateWatcher").finish_non_exhaustive()
		}
	}

	impl TemplateWatcher {
		pub(super) fn new(root: &Path) -> Result<Self, TemplateError> {
			let (tx, rx) = mpsc::unbounded_channel();

			let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
				let event = match res {
					Ok(event) => event,
					Err(e) => {
						let _ = tx.send(Err(e.to_string()));
						return;
					}
				};
				let kind = match event.kind {
					EventKind::Create(_) => ChangeKind::Added,
					EventKind::Modify(_) => ChangeKind::Modified,
					EventKind::Remove(_) => ChangeKind::Deleted,
					_ => return,
				};
				for path in event.paths {
					let _ = tx.send(Ok(RawChange { kind, path }));
				}
			})
			.map_err(|e| TemplateError::Watch(e.to_string()))?;

			watcher
				.watch(root, RecursiveMode::Recursive)
				.map_err(|e| TemplateError::Watch(e.to_string()))?;

			Ok(Self {
				_watcher: watcher,
				receiver: rx,
			})
		}
	}
}

#[cfg(feature = "hmr")]
impl FileTemplateSource {
	/// Starts watching the template directory. Calling it again is a no-op.
	pub fn watch(&self) -> Result<(), TemplateError> {
		let mut slot = self.watcher.lock();
		if slot.is_none() {
			*slot = Some(watch::TemplateWatcher::new(&self.root)?);
		}
		Ok(())
	}
}

#[cfg(feature = "hmr")]
#[async_trait]
impl ChangeFeed for FileTemplateSource {
	async fn poll(&self) -> Result<Vec<TemplateChange>, TemplateError> {
		let mut slot = self.watcher.lock();
		let Some(watcher) = slot.as_mut() else {
			return Ok(Vec::new());
		};

		let mut changes: Vec<TemplateChange> = Vec::new();
		while let Ok(received) = watcher.receiver.try_recv() {
			let raw = received.map_err(TemplateError::Watch)?;
			let Some(name) = self.name_for(&raw.path) else {
				continue;
			};
			// Editors emit bursts of events per save; keep one entry per name.
			changes.retain(|c| c.name != name);
			changes.push(TemplateChange {
				kind: raw.kind,
				path: raw.path.display().to_string(),
				name,
			});
		}
		Ok(changes)
	}
}
