//! Hydration: deciding when server-rendered components become interactive.
//!
//! ## Strategies
//!
//! | Strategy      | Transition                                           |
//! |---------------|------------------------------------------------------|
//! | critical      | hydrated during tree construction, before all others |
//! | `eager`       | hydrated during tree construction                    |
//! | `lazy`        | scheduled, hydrated after a fixed delay              |
//! | `visible`     | scheduled, hydrated on the first visibility notice   |
//! | `interactive` | scheduled, hydrated on the first qualifying event    |
//!
//! Hydrating a node mounts its subtree and binds the event listeners of
//! every hydrated node in it. Nodes that are not hydrated still render, but
//! receive no listeners.
//!
//! The page-wide [`HydrationConfig`] travels with the server markup in a
//! [`Handoff`] payload.

mod config;
mod coordinator;
mod handoff;

pub use config::HydrationConfig;
pub use coordinator::{Arm, HydrationCoordinator, HydrationPlan, Trigger};
pub use handoff::{HANDOFF_VAR, Handoff, InitialNode};
