//! Engine settings.
//!
//! Settings load from TOML; every key is optional:
//!
//! ```toml
//! lazy_delay_ms = 1000
//! reload_interval_ms = 1000
//! remote_fallback = true
//! bubble_policy = "always"        # or "stop-on-handled"
//! action_endpoint = "http://localhost:8000/api/actions"
//! fallback_class = "tessera-missing"
//!
//! [hydration]
//! enabled = true
//! selective = false
//! componentIds = []
//! streaming = false
//! ```

use crate::events::BubblePolicy;
use crate::hydration::HydrationConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Errors raised while loading settings.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
	#[error("Failed to read settings file {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed to parse settings: {message}")]
	Parse { message: String },
}

/// Engine settings.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagesSettings {
	/// Delay before a `lazy` component hydrates.
	pub lazy_delay_ms: u64,
	/// Interval between live-reload polls.
	pub reload_interval_ms: u64,
	/// Send actions without a local handler to the server bridge.
	pub remote_fallback: bool,
	pub bubble_policy: BubblePolicy,
	/// Endpoint for the HTTP server bridge.
	pub action_endpoint: Option<String>,
	/// CSS class of the markup rendered for missing templates.
	pub fallback_class: String,
	/// Hydration config used until a handoff provides one.
	pub hydration: HydrationConfig,
}

impl Default for PagesSettings {
	fn default() -> Self {
		Self {
			lazy_delay_ms: 1000,
			reload_interval_ms: 1000,
			remote_fallback: true,
			bubble_policy: BubblePolicy::Always,
			action_endpoint: None,
			fallback_class: "tessera-missing".to_string(),
			hydration: HydrationConfig::default(),
		}
	}
}

impl PagesSettings {
	/// Load settings from a TOML file.
	///
	/// # Errors
	///
	/// Returns an error if the file cannot be read or parsed.
	pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
		let content = std::fs::read_to_string(path.as_ref()).map_err(|e| SettingsError::Io {
			path: path.as_ref().to_path_buf(),
			source: e,
		})?;

		Self::from_toml(&content)
	}

	/// Parse settings from a TOML string.
	pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
		toml::from_str(content).map_err(|e| SettingsError::Parse {
			message: e.to_string(),
		})
	}

	pub fn with_lazy_delay(mut self, delay: Duration) -> Self {
		self.lazy_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
		self
	}

	pub fn with_bubble_policy(mut self, policy: BubblePolicy) -> Self {
		self.bubble_policy = policy;
		self
	}

	pub fn with_remote_fallback(mut self, enabled: bool) -> Self {
		self.remote_fallback = enabled;
		self
	}

	pub fn with_hydration(mut self, config: HydrationConfig) -> Self {
		self.hydration = config;
		self
	}

	pub fn lazy_delay(&self) -> Duration {
		Duration::from_millis(self.lazy_delay_ms)
	}

	pub fn reload_interval(&self) -> Duration {
		Duration::from_millis(self.reload_interval_ms)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::component::NodeId;
	use rstest::rstest;
	use std::io::Write;

	#[rstest]
	fn test_empty_toml_uses_defaults() {
		let settings = PagesSettings::from_toml("").unwrap();
		assert_eq!(settings, PagesSettings::default());
		assert_eq!(settings.lazy_delay(), Duration::from_secs(1));
	}

	#[rstest]
	fn test_parses_all_keys() {
		let settings = PagesSettings::from_toml(
			r#"
			lazy_delay_ms = 250
			remote_fallback = false
			bubble_policy = "stop-on-handled"
			action_endpoint = "http://localhost/api/actions"

			[hydration]
			selective = true
			componentIds = ["A"]
			"#,
		)
		.unwrap();

		assert_eq!(settings.lazy_delay(), Duration::from_millis(250));
		assert!(!settings.remote_fallback);
		assert_eq!(settings.bubble_policy, BubblePolicy::StopOnHandled);
		assert_eq!(settings.action_endpoint.as_deref(), Some("http://localhost/api/actions"));
		assert_eq!(settings.hydration.component_ids, vec![NodeId::from("A")]);
		assert_eq!(settings.reload_interval_ms, 1000);
	}

	#[rstest]
	fn test_invalid_toml_is_reported() {
		let err = PagesSettings::from_toml("bubble_policy = \"sometimes\"").unwrap_err();
		assert!(matches!(err, SettingsError::Parse { .. }));
	}

	#[rstest]
	fn test_from_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "reload_interval_ms = 50").unwrap();

		let settings = PagesSettings::from_file(file.path()).unwrap();

		assert_eq!(settings.reload_interval(), Duration::from_millis(50));
		assert!(matches!(
			PagesSettings::from_file("/nonexistent/tessera.toml"),
			Err(SettingsError::Io { .. })
		));
	}
}
