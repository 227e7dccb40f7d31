//! Per-node hydration state machine.

use super::HydrationConfig;
use crate::component::{ComponentNode, HydrationStatus, HydrationStrategy, NodeId};
use crate::error::{PagesError, PagesResult};
use crate::registry::Registry;
use crate::scheduler::{Job, Scheduler};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::time::Duration;

/// What arming a node decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arm {
	/// Hydrate now (critical or eager).
	Immediate,
	/// Waiting for a timer, a visibility notification or an interaction.
	Deferred,
	/// Hydration is disabled for this node by the page config.
	Blocked,
	/// Already scheduled or hydrated.
	Settled,
}

/// External trigger a scheduled node is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
	Visible,
	Interaction,
}

impl Trigger {
	/// Value of the await marker on the node's container.
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Visible => "visible",
			Self::Interaction => "interaction",
		}
	}
}

/// Result of [`HydrationCoordinator::begin`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HydrationPlan {
	/// Nodes to hydrate right away: critical nodes first, then eager nodes,
	/// each group in tree order.
	pub immediate: Vec<NodeId>,
	/// Nodes whose own strategy decides when they hydrate.
	pub deferred: Vec<NodeId>,
}

/// Decides when each node hydrates.
///
/// State machine per node: `unhydrated -> scheduled -> hydrated`. The only
/// transition into `hydrated` is [`claim`](Self::claim), which refuses a node
/// that is already hydrated. Every trigger path goes through it, so racing
/// triggers produce a single mount.
#[derive(Debug)]
pub struct HydrationCoordinator {
	config: HydrationConfig,
	allowed: HashSet<NodeId>,
	lazy_delay: Duration,
	visible: BTreeSet<NodeId>,
	interactive: BTreeSet<NodeId>,
	blocked: BTreeSet<NodeId>,
	stream: VecDeque<NodeId>,
	hydrations: HashMap<NodeId, usize>,
}

impl HydrationCoordinator {
	pub fn new(config: HydrationConfig, lazy_delay: Duration) -> Self {
		let allowed = config.component_ids.iter().cloned().collect();
		Self {
			config,
			allowed,
			lazy_delay,
			visible: BTreeSet::new(),
			interactive: BTreeSet::new(),
			blocked: BTreeSet::new(),
			stream: VecDeque::new(),
			hydrations: HashMap::new(),
		}
	}

	pub fn config(&self) -> &HydrationConfig {
		&self.config
	}

	/// Replaces the page config. Existing schedules are kept.
	pub fn configure(&mut self, config: HydrationConfig) {
		self.allowed = config.component_ids.iter().cloned().collect();
		self.config = config;
	}

	/// Whether the page config lets `id` hydrate at all.
	///
	/// With `selective` set, a node outside the allowlist never hydrates,
	/// whatever its strategy, until [`allow`](Self::allow) adds it.
	pub fn permits(&self, id: &NodeId) -> bool {
		self.config.enabled && (!self.config.selective || self.allowed.contains(id))
	}

	/// Splits the initial tree into immediate and deferred nodes.
	///
	/// Blocked nodes are recorded and appear in neither list. With
	/// `streaming` set, non-critical eager nodes are queued for
	/// [`next_streamed`](Self::next_streamed) instead of being returned as
	/// immediate.
	pub fn begin(&mut self, registry: &mut Registry, order: &[NodeId]) -> HydrationPlan {
		let mut critical = Vec::new();
		let mut eager = Vec::new();
		let mut deferred = Vec::new();

		for id in order {
			let Some(node) = registry.get(id) else {
				continue;
			};
			if node.status() != HydrationStatus::Unhydrated {
				continue;
			}
			if !self.permits(id) {
				tracing::debug!("Hydration of {} blocked by page config", id);
				self.blocked.insert(id.clone());
				continue;
			}
			if node.is_critical() {
				critical.push(id.clone());
			} else if node.strategy() == HydrationStrategy::Eager {
				eager.push(id.clone());
			} else {
				deferred.push(id.clone());
			}
		}

		if self.config.streaming {
			for id in eager.drain(..) {
				if let Some(node) = registry.get_mut(&id) {
					node.status = HydrationStatus::Scheduled;
				}
				self.stream.push_back(id);
			}
		}

		critical.extend(eager);
		HydrationPlan {
			immediate: critical,
			deferred,
		}
	}

	/// Moves an unhydrated node into its strategy's waiting state.
	pub fn arm(&mut self, node: &mut ComponentNode, scheduler: &mut Scheduler) -> Arm {
		if node.status() != HydrationStatus::Unhydrated {
			return Arm::Settled;
		}
		let id = node.id().clone();
		if !self.permits(&id) {
			self.blocked.insert(id);
			return Arm::Blocked;
		}
		if node.is_critical() {
			return Arm::Immediate;
		}
		match node.strategy() {
			HydrationStrategy::Eager => return Arm::Immediate,
			HydrationStrategy::Lazy => {
				scheduler.schedule_after(self.lazy_delay, Job::Hydrate(id));
			}
			HydrationStrategy::Visible => {
				self.visible.insert(id);
			}
			HydrationStrategy::Interactive => {
				self.interactive.insert(id);
			}
		}
		node.status = HydrationStatus::Scheduled;
		Arm::Deferred
	}

	/// Marks `node` hydrated. This is the idempotency guard in front of
	/// every mount side effect.
	pub fn claim(&mut self, node: &mut ComponentNode) -> PagesResult<()> {
		let id = node.id().clone();
		if node.status() == HydrationStatus::Hydrated {
			return Err(PagesError::DuplicateHydration(id));
		}
		if !self.permits(&id) {
			self.blocked.insert(id.clone());
			return Err(PagesError::HydrationBlocked(id));
		}
		node.status = HydrationStatus::Hydrated;
		self.visible.remove(&id);
		self.interactive.remove(&id);
		self.blocked.remove(&id);
		*self.hydrations.entry(id).or_default() += 1;
		Ok(())
	}

	/// Next node of the streaming queue, in document order.
	pub fn next_streamed(&mut self) -> Option<NodeId> {
		self.stream.pop_front()
	}

	pub fn has_streamed(&self) -> bool {
		!self.stream.is_empty()
	}

	/// Consumes a pending visibility registration.
	///
	/// Returns false if `id` was not waiting for visibility, so repeated
	/// notifications are no-ops.
	pub fn take_visible(&mut self, id: &NodeId) -> bool {
		self.visible.remove(id)
	}

	/// Consumes the interaction registrations among `chain`.
	///
	/// `chain` lists the nodes containing an interaction target. Returns the
	/// nodes that were waiting for it, outermost first.
	pub fn take_interaction(&mut self, chain: &[NodeId]) -> Vec<NodeId> {
		let mut hit: Vec<NodeId> = chain
			.iter()
			.filter(|id| self.interactive.remove(*id))
			.cloned()
			.collect();
		hit.reverse();
		hit
	}

	/// Adds `id` to the allowlist. Returns true if the node had been blocked
	/// and may now be armed.
	pub fn allow(&mut self, id: &NodeId) -> bool {
		self.allowed.insert(id.clone());
		self.permits(id) && self.blocked.remove(id)
	}

	/// Drops everything known about a destroyed node.
	pub fn forget(&mut self, id: &NodeId) {
		self.stream.retain(|queued| queued != id);
		self.visible.remove(id);
		self.interactive.remove(id);
		self.blocked.remove(id);
		self.hydrations.remove(id);
	}

	/// The trigger `id` is waiting for, if any.
	pub fn awaiting(&self, id: &NodeId) -> Option<Trigger> {
		if self.visible.contains(id) {
			Some(Trigger::Visible)
		} else if self.interactive.contains(id) {
			Some(Trigger::Interaction)
		} else {
			None
		}
	}

	pub fn is_blocked(&self, id: &NodeId) -> bool {
		self.blocked.contains(id)
	}

	/// Number of times `id` went through the hydration side effect.
	pub fn hydration_count(&self, id: &NodeId) -> usize {
		self.hydrations.get(id).copied().unwrap_or(0)
	}

	/// Nodes waiting for a visibility notification.
	pub fn visibility_targets(&self) -> Vec<NodeId> {
		self.visible.iter().cloned().collect()
	}
}
