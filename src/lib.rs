//! # Tessera
//!
//! A server-rendered, selectively hydrated component framework for Rust.
//!
//! Pages are built from components: a textual template plus props and
//! state. The server renders the component tree to annotated markup; the
//! client rebuilds the tree from that markup and hydrates each component
//! according to its strategy (`eager`, `lazy`, `visible`, `interactive`, or
//! critical-first).
//!
//! ## Feature Flags
//!
//! - `pages` (default): the rendering and hydration engine
//! - `http-bridge`: HTTP server bridge for remote actions
//! - `hmr`: file watching for live template reload
//! - `full`: all of the above
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tessera::prelude::*;
//!
//! # async fn example() -> Result<(), PagesError> {
//! let templates = MemoryTemplateSource::new().with("Hello", "<p>Hello, world</p>");
//! let mut engine = Engine::new(Arc::new(templates));
//! let id = engine.create_component(NewComponent::new("Hello"))?;
//! engine.run_until_idle().await;
//! assert_eq!(engine.text_of(&id).as_deref(), Some("Hello, world"));
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "pages")]
pub use tessera_pages as pages;

#[cfg(feature = "pages")]
pub use tessera_pages::{
	ComponentDef, Engine, EngineBuilder, Handoff, HydrationConfig, HydrationStrategy, NewComponent,
	NodeId, PagesError, PagesResult, PagesSettings, SsrRenderer,
};

/// Commonly used types.
#[cfg(feature = "pages")]
pub mod prelude {
	pub use tessera_pages::prelude::*;
}
