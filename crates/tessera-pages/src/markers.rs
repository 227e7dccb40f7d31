//! Boundary markers embedded in rendered markup.
//!
//! Every mounted component container carries these attributes so the client
//! can rebuild the component tree from server markup and locate containers
//! again after a re-render.

use std::sync::atomic::{AtomicU64, Ordering};

/// The attribute holding a component's unique id.
pub const ATTR_ID: &str = "data-tessera-id";

/// The attribute holding a component's template name.
pub const ATTR_COMPONENT: &str = "data-tessera-component";

/// The attribute holding a component's hydration strategy.
pub const ATTR_HYDRATE: &str = "data-tessera-hydrate";

/// The attribute marking a component as critical.
pub const ATTR_CRITICAL: &str = "data-tessera-critical";

/// The attribute marking a child placeholder region.
pub const ATTR_SLOT: &str = "data-tessera-slot";

/// The attribute marking a container that waits for visibility or interaction.
pub const ATTR_AWAIT: &str = "data-tessera-await";

/// The attribute naming the event kinds an element listens for.
pub const ATTR_EVENT: &str = "data-event";

/// The attribute naming the action an element dispatches.
pub const ATTR_ACTION: &str = "data-action";

/// The attribute holding a layout directive on a layout container.
pub const ATTR_LAYOUT: &str = "data-tessera-layout";

/// The attribute marking a container as a member of a layout.
pub const ATTR_LAYOUT_ITEM: &str = "data-tessera-layout-item";

static COMPONENT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generates a process-unique component id.
///
/// Ids come from a monotonic counter and are never reused.
pub fn generate_component_id() -> String {
	let id = COMPONENT_COUNTER.fetch_add(1, Ordering::SeqCst);
	format!("tc-{}", id)
}

/// Returns the markup of an empty child placeholder region.
pub(crate) fn slot_markup(index: usize) -> String {
	format!("<div {}=\"{}\"></div>", ATTR_SLOT, index)
}
