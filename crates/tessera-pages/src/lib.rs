//! Tessera Pages - component rendering and selective hydration engine
//!
//! Pages are trees of components. Each component pairs a textual template
//! with props and state; the server renders the tree to annotated markup, and
//! the client takes it over one component at a time, according to each
//! component's hydration strategy.
//!
//! ## Architecture
//!
//! - [`component`]: component nodes, definitions, frames and layouts
//! - [`registry`]: arena of live nodes keyed by id
//! - [`template`]: template sources and the parsed template cache
//! - [`render`]: template substitution and full-overwrite mounting
//! - [`dom`]: the document the engine mounts into
//! - [`hydration`]: per-node hydration state machine and the handoff payload
//! - [`events`]: delegated listeners and bubbling action dispatch
//! - [`server_bridge`]: remote actions
//! - [`scheduler`]: job queue on a virtual clock
//! - [`store`]: reducer store with middleware, bindable to components
//! - [`live_reload`]: template change feeds
//! - [`ssr`]: server-side rendering into a handoff
//! - [`engine`]: ties everything together
//!
//! ## Template Syntax
//!
//! ```text
//! <article class="card">
//!     <h2>{{ props.title }}</h2>
//!     <span>{{ state.count }}</span>
//!     <p>{{ plural(state.count, "item") }}</p>
//!     <button data-event="click" data-action="increment">+</button>
//!     {{ @children }}
//!     {{ @include card-footer }}
//! </article>
//! ```
//!
//! ## Feature Flags
//!
//! - `http-bridge`: [`server_bridge::HttpServerBridge`] on top of reqwest
//! - `hmr`: file watching for [`template::FileTemplateSource`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use tessera_pages::prelude::*;
//!
//! # async fn example() -> Result<(), PagesError> {
//! let templates = MemoryTemplateSource::new()
//!     .with("Page", "<main>{{@children}}</main>")
//!     .with("Feed", "<ul>{{state.count}} posts</ul>");
//!
//! let mut engine = Engine::new(Arc::new(templates));
//! let page = engine.create_component(NewComponent::new("Page"))?;
//! engine.create_component(
//!     NewComponent::new("Feed")
//!         .parent(page)
//!         .state(json!({ "count": 3 }))
//!         .strategy(HydrationStrategy::Visible),
//! )?;
//! engine.run_until_idle().await;
//! # Ok(())
//! # }
//! ```

pub use tessera_pages_ast as ast;

pub mod component;
pub mod dom;
pub mod engine;
pub mod error;
pub mod events;
pub mod hydration;
pub mod live_reload;
pub mod markers;
pub mod registry;
pub mod render;
pub mod scheduler;
pub mod server_bridge;
pub mod settings;
pub mod ssr;
pub mod store;
pub mod template;

pub use component::{ComponentDef, ComponentNode, HydrationStatus, HydrationStrategy, NewComponent, NodeId};
pub use engine::{Engine, EngineBuilder};
pub use error::{PagesError, PagesResult, TemplateError};
pub use hydration::{Handoff, HydrationConfig};
pub use settings::PagesSettings;
pub use ssr::SsrRenderer;

/// Commonly used types.
pub mod prelude {
	pub use crate::component::{
		ComponentDef, FrameId, HydrationStatus, HydrationStrategy, LayoutDirective, LayoutId,
		NewComponent, NodeId,
	};
	pub use crate::engine::{Engine, EngineBuilder};
	pub use crate::error::{PagesError, PagesResult};
	pub use crate::events::{BubblePolicy, EventKind, EventPayload};
	pub use crate::hydration::{Handoff, HydrationConfig};
	pub use crate::live_reload::{ChangeFeed, LiveReloader};
	pub use crate::server_bridge::{ActionRequest, ActionResponse, ServerBridge};
	pub use crate::settings::PagesSettings;
	pub use crate::ssr::SsrRenderer;
	pub use crate::store::{Action, Store};
	pub use crate::template::{FileTemplateSource, MemoryTemplateSource, TemplateSource};
}
