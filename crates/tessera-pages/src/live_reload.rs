//! Live template reload.
//!
//! A [`ChangeFeed`] reports added, modified and deleted templates. The
//! [`LiveReloader`] polls it on an interval and hands the changes to the
//! engine, which invalidates the affected cache entries and re-renders every
//! live node using one of the changed templates.

use crate::engine::Engine;
use crate::error::TemplateError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// What happened to a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
	Added,
	Modified,
	Deleted,
}

/// One entry of a poll result: `{type, path, name}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateChange {
	#[serde(rename = "type")]
	pub kind: ChangeKind,
	pub path: String,
	pub name: String,
}

/// Source of template change notifications.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
	/// Returns the changes observed since the previous poll.
	async fn poll(&self) -> Result<Vec<TemplateChange>, TemplateError>;
}

/// Polls a [`ChangeFeed`] and applies the changes to an engine.
pub struct LiveReloader {
	feed: Arc<dyn ChangeFeed>,
	interval: Duration,
}

impl std::fmt::Debug for LiveReloader {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LiveReloader")
			.field("interval", &self.interval)
			.finish_non_exhaustive()
	}
}

impl LiveReloader {
	pub fn new(feed: Arc<dyn ChangeFeed>, interval: Duration) -> Self {
		Self { feed, interval }
	}

	pub fn interval(&self) -> Duration {
		self.interval
	}

	/// Polls once and applies the result. Returns the changes applied.
	///
	/// A failed poll is logged and yields no changes.
	pub async fn poll_once(&self, engine: &mut Engine) -> Vec<TemplateChange> {
		let changes = match self.feed.poll().await {
			Ok(changes) => changes,
			Err(e) => {
				tracing::warn!("Template change poll failed: {}", e);
				return Vec::new();
			}
		};
		if !changes.is_empty() {
			tracing::info!("Applying {} template change(s)", changes.len());
			engine.apply_template_changes(&changes).await;
		}
		changes
	}

	/// Polls on every interval tick until `shutdown` completes.
	pub async fn run_until<F>(&self, engine: &mut Engine, shutdown: F)
	where
		F: Future<Output = ()>,
	{
		let mut ticker = tokio::time::interval(self.interval);
		ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
		tokio::pin!(shutdown);

		loop {
			tokio::select! {
				_ = &mut shutdown => {
					tracing::debug!("Live reload stopped");
					break;
				}
				_ = ticker.tick() => {
					self.poll_once(engine).await;
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_change_serializes_with_type_key() {
		let change = TemplateChange {
			kind: ChangeKind::Deleted,
			path: "templates/header.html".to_string(),
			name: "header".to_string(),
		};
		assert_eq!(
			serde_json::to_value(&change).unwrap(),
			json!({ "type": "deleted", "path": "templates/header.html", "name": "header" })
		);
	}
}
