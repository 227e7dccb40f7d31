//! The client-side engine.
//!
//! [`Engine`] owns every piece of page state: the component registry, the
//! template cache, the document, the job scheduler, the hydration
//! coordinator and the delegated listeners. All mutation goes through it, so
//! a single `&mut Engine` is the only writer at any time.
//!
//! Work is asynchronous where templates or the server bridge are involved and
//! is otherwise queued on a virtual clock. Call [`Engine::run_until_idle`] to
//! flush queued jobs, [`Engine::advance`] to move the clock forward, or
//! [`Engine::run_realtime`] to wait for timers on the tokio clock.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use tessera_pages::component::{ComponentDef, NewComponent};
//! use tessera_pages::engine::Engine;
//! use tessera_pages::template::MemoryTemplateSource;
//!
//! # async fn example() -> Result<(), tessera_pages::error::PagesError> {
//! let templates = MemoryTemplateSource::new()
//!     .with("Counter", r#"<button data-action="increment">{{state.count}}</button>"#);
//! let mut engine = Engine::builder(Arc::new(templates))
//!     .define(ComponentDef::new("Counter").on("increment", |ctx, _| {
//!         let count = ctx.state()["count"].as_i64().unwrap_or(0);
//!         ctx.set_state(json!({ "count": count + 1 }));
//!     }))
//!     .build();
//!
//! let id = engine.create_component(NewComponent::new("Counter").state(json!({ "count": 0 })))?;
//! engine.run_until_idle().await;
//! assert_eq!(engine.text_of(&id).as_deref(), Some("0"));
//! # Ok(())
//! # }
//! ```

use crate::component::{
	ComponentDef, ComponentNode, Frame, FrameId, HydrationStatus, HydrationStrategy, Layout,
	LayoutDirective, LayoutId, NewComponent, NodeId, merge_object,
};
use crate::dom::{Document, ElementId};
use crate::error::{PagesError, PagesResult};
use crate::events::{
	DispatchReport, DispatchScope, EventKind, EventPayload, ListenerRegistry, TriggerOutcome,
	dispatch_action,
};
use crate::hydration::{Arm, Handoff, HydrationCoordinator, HydrationPlan};
use crate::live_reload::TemplateChange;
use crate::markers::{
	ATTR_AWAIT, ATTR_COMPONENT, ATTR_CRITICAL, ATTR_HYDRATE, ATTR_ID, ATTR_LAYOUT,
	ATTR_LAYOUT_ITEM, generate_component_id,
};
use crate::registry::Registry;
use crate::render::{MountReport, RenderContext, Rendered};
use crate::scheduler::{Job, Scheduler};
use crate::server_bridge::ServerBridge;
use crate::settings::PagesSettings;
use crate::store::{Action, Store};
use crate::template::{TemplateSource, TemplateStore};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// Builder for [`Engine`].
pub struct EngineBuilder {
	source: Arc<dyn TemplateSource>,
	settings: PagesSettings,
	bridge: Option<Arc<dyn ServerBridge>>,
	definitions: HashMap<String, ComponentDef>,
}

impl EngineBuilder {
	pub fn new(source: Arc<dyn TemplateSource>) -> Self {
		Self {
			source,
			settings: PagesSettings::default(),
			bridge: None,
			definitions: HashMap::new(),
		}
	}

	pub fn settings(mut self, settings: PagesSettings) -> Self {
		self.settings = settings;
		self
	}

	/// Sets the bridge used for remote actions.
	pub fn bridge(mut self, bridge: Arc<dyn ServerBridge>) -> Self {
		self.bridge = Some(bridge);
		self
	}

	/// Registers a component definition. A later definition with the same
	/// name replaces the earlier one.
	pub fn define(mut self, definition: ComponentDef) -> Self {
		self.definitions
			.insert(definition.name().to_string(), definition);
		self
	}

	pub fn build(self) -> Engine {
		let Self {
			source,
			settings,
			bridge,
			definitions,
		} = self;

		#[cfg(feature = "http-bridge")]
		let bridge = bridge.or_else(|| {
			let endpoint = settings.action_endpoint.as_deref()?;
			match crate::server_bridge::HttpServerBridge::new(endpoint) {
				Ok(http) => Some(Arc::new(http) as Arc<dyn ServerBridge>),
				Err(e) => {
					tracing::warn!("Failed to create HTTP bridge for {}: {}", endpoint, e);
					None
				}
			}
		});

		let hydration =
			HydrationCoordinator::new(settings.hydration.clone(), settings.lazy_delay());

		Engine {
			settings,
			registry: Registry::new(),
			templates: TemplateStore::new(source),
			definitions,
			document: Document::new(),
			scheduler: Scheduler::new(),
			hydration,
			listeners: ListenerRegistry::new(),
			bridge,
			containers: HashMap::new(),
			render_counts: HashMap::new(),
			store: None,
			store_bindings: HashMap::new(),
		}
	}
}

/// Component rendering and hydration engine for one page.
pub struct Engine {
	settings: PagesSettings,
	registry: Registry,
	templates: TemplateStore,
	definitions: HashMap<String, ComponentDef>,
	document: Document,
	scheduler: Scheduler,
	hydration: HydrationCoordinator,
	listeners: ListenerRegistry,
	bridge: Option<Arc<dyn ServerBridge>>,
	containers: HashMap<NodeId, ElementId>,
	render_counts: HashMap<NodeId, usize>,
	store: Option<Store>,
	store_bindings: HashMap<NodeId, Vec<String>>,
}

impl std::fmt::Debug for Engine {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Engine")
			.field("components", &self.registry.len())
			.field("listeners", &self.listeners.len())
			.field("now", &self.scheduler.now())
			.field("has_bridge", &self.bridge.is_some())
			.field("has_store", &self.store.is_some())
			.finish_non_exhaustive()
	}
}

impl Engine {
	pub fn builder(source: Arc<dyn TemplateSource>) -> EngineBuilder {
		EngineBuilder::new(source)
	}

	/// Creates an engine with default settings and no bridge.
	pub fn new(source: Arc<dyn TemplateSource>) -> Self {
		EngineBuilder::new(source).build()
	}

	pub fn settings(&self) -> &PagesSettings {
		&self.settings
	}

	pub fn registry(&self) -> &Registry {
		&self.registry
	}

	pub fn document(&self) -> &Document {
		&self.document
	}

	pub fn listeners(&self) -> &ListenerRegistry {
		&self.listeners
	}

	pub fn hydration(&self) -> &HydrationCoordinator {
		&self.hydration
	}

	/// Current virtual time.
	pub fn now(&self) -> Duration {
		self.scheduler.now()
	}

	/// No queued jobs, no streamed hydrations and no pending timers.
	pub fn is_idle(&self) -> bool {
		self.scheduler.is_idle() && !self.hydration.has_streamed()
	}

	// ------------------------------------------------------------------
	// Tree construction
	// ------------------------------------------------------------------

	/// Creates a component and schedules its first render.
	///
	/// A root component gets a fresh container appended to the document.
	/// A child is rendered through its parent, since child markup lives in
	/// the parent's slots. The new node is armed for hydration right away.
	pub fn create_component(&mut self, new: NewComponent) -> PagesResult<NodeId> {
		let NewComponent {
			id,
			name,
			props,
			state,
			parent,
			strategy,
			critical,
			slices,
		} = new;
		let id = id.unwrap_or_else(|| NodeId::from(generate_component_id()));

		let mut state = state;
		if let Some(store) = &self.store {
			let patch = slice_patch(store, &slices, &state);
			merge_object(&mut state, patch);
		}
		let node = ComponentNode::new(id.clone(), name, props, state, strategy, critical);
		self.registry.insert(node, parent.as_ref())?;
		if !slices.is_empty() {
			self.store_bindings.insert(id.clone(), slices);
		}

		match parent {
			Some(parent) => self.scheduler.enqueue(Job::Render(parent)),
			None => {
				let root = self.document.root();
				if let Some(container) = self.document.append_element(root, "div", Vec::new()) {
					self.containers.insert(id.clone(), container);
				}
				self.scheduler.enqueue(Job::Render(id.clone()));
			}
		}

		self.arm(&id);
		tracing::debug!("Created component {}", id);
		Ok(id)
	}

	/// Removes a component and its subtree.
	///
	/// Pending timers and queued jobs of removed nodes are cancelled, their
	/// listeners dropped and their containers removed from the document.
	pub fn destroy(&mut self, id: &NodeId) -> PagesResult<()> {
		let container = self.container_of(id);
		let removed = self.registry.remove_subtree(id)?;

		for node in &removed {
			let removed_id = node.id();
			self.hydration.forget(removed_id);
			self.scheduler.cancel(removed_id);
			self.listeners.unbind(removed_id);
			self.containers.remove(removed_id);
			self.render_counts.remove(removed_id);
			self.store_bindings.remove(removed_id);
		}
		if let Some(container) = container {
			self.document.remove(container);
		}
		self.listeners.purge_dead(&self.document);

		tracing::debug!("Destroyed {} ({} node(s))", id, removed.len());
		Ok(())
	}

	/// Destroys every root component.
	pub fn unmount_all(&mut self) {
		let roots = self.registry.roots().to_vec();
		for root in roots {
			if let Err(e) = self.destroy(&root) {
				tracing::warn!("Failed to unmount {}: {}", root, e);
			}
		}
	}

	/// Shallow-merges `patch` into a component's state and schedules a re-render.
	pub fn set_state(&mut self, id: &NodeId, patch: Value) -> PagesResult<()> {
		let Value::Object(patch) = patch else {
			return Err(PagesError::InvalidStatePatch(id.to_string()));
		};
		let node = self
			.registry
			.get_mut(id)
			.ok_or_else(|| PagesError::ComponentNotFound(id.clone()))?;
		merge_object(node.state_mut(), patch);
		self.scheduler.enqueue(Job::Render(id.clone()));
		Ok(())
	}

	// ------------------------------------------------------------------
	// Store
	// ------------------------------------------------------------------

	/// Attaches a reducer store, replacing any previous one.
	///
	/// Components bound with [`NewComponent::bind_slice`] or
	/// [`bind_slice`](Self::bind_slice) get the current slice values merged
	/// into their state under the slice name and are re-rendered.
	pub fn attach_store(&mut self, store: Store) {
		self.store = Some(store);
		self.sync_store();
	}

	/// Detaches the store. Bound components keep their last mirrored values.
	pub fn detach_store(&mut self) -> Option<Store> {
		self.store.take()
	}

	pub fn store(&self) -> Option<&Store> {
		self.store.as_ref()
	}

	/// Binds an existing component to a store slice.
	pub fn bind_slice(&mut self, id: &NodeId, slice: impl Into<String>) -> PagesResult<()> {
		if !self.registry.contains(id) {
			return Err(PagesError::ComponentNotFound(id.clone()));
		}
		let slice = slice.into();
		let bound = self.store_bindings.entry(id.clone()).or_default();
		if !bound.contains(&slice) {
			bound.push(slice);
		}
		self.sync_store();
		Ok(())
	}

	/// Dispatches `action` through the attached store.
	///
	/// Every bound component whose slices changed gets the new values merged
	/// into its state and a re-render scheduled. Returns the new combined
	/// store state.
	pub fn dispatch_store(&mut self, action: Action) -> PagesResult<Value> {
		let store = self.store.as_mut().ok_or(PagesError::StoreNotAttached)?;
		let state = store.dispatch(action).clone();
		self.sync_store();
		Ok(state)
	}

	fn sync_store(&mut self) -> usize {
		let Some(store) = &self.store else {
			return 0;
		};
		let mut synced = 0;
		for (id, slices) in &self.store_bindings {
			let Some(node) = self.registry.get_mut(id) else {
				continue;
			};
			let patch = slice_patch(store, slices, node.state());
			if patch.is_empty() {
				continue;
			}
			merge_object(node.state_mut(), patch);
			self.scheduler.enqueue(Job::Render(id.clone()));
			synced += 1;
		}
		if synced > 0 {
			tracing::debug!("Store update scheduled {} re-render(s)", synced);
		}
		synced
	}

	// ------------------------------------------------------------------
	// Frames and layouts
	// ------------------------------------------------------------------

	pub fn create_frame(
		&mut self,
		id: impl Into<FrameId>,
		name: impl Into<String>,
		state: Value,
	) -> PagesResult<FrameId> {
		let id = id.into();
		self.registry
			.insert_frame(Frame::new(id.clone(), name, state))?;
		Ok(id)
	}

	/// Adds a component to a frame. Its next render sees the frame state.
	pub fn add_to_frame(&mut self, frame: &FrameId, id: &NodeId) -> PagesResult<()> {
		self.registry.join_frame(frame, id)?;
		self.scheduler.enqueue(Job::Render(id.clone()));
		Ok(())
	}

	/// Shallow-merges `patch` into a frame's shared state and schedules a
	/// re-render of every member.
	pub fn set_frame_state(&mut self, id: &FrameId, patch: Value) -> PagesResult<()> {
		let Value::Object(patch) = patch else {
			return Err(PagesError::InvalidStatePatch(id.to_string()));
		};
		let frame = self
			.registry
			.frame_mut(id)
			.ok_or_else(|| PagesError::FrameNotFound(id.clone()))?;
		merge_object(frame.state_mut(), patch);
		let members = frame.members().to_vec();
		for member in members {
			self.scheduler.enqueue(Job::Render(member));
		}
		Ok(())
	}

	/// Creates a layout. `container` receives the directive attribute.
	pub fn create_layout(
		&mut self,
		id: impl Into<LayoutId>,
		name: impl Into<String>,
		directive: LayoutDirective,
		container: Option<ElementId>,
	) -> PagesResult<LayoutId> {
		let id = id.into();
		self.registry
			.insert_layout(Layout::new(id.clone(), name, directive, container))?;
		self.apply_layout(&id)?;
		Ok(id)
	}

	pub fn add_to_layout(&mut self, layout: &LayoutId, id: &NodeId) -> PagesResult<()> {
		self.registry.join_layout(layout, id)?;
		self.apply_layout(layout)
	}

	/// Writes a layout's markers onto its container and member containers.
	///
	/// Members that are not mounted yet are marked when they mount.
	pub fn apply_layout(&mut self, id: &LayoutId) -> PagesResult<()> {
		let layout = self
			.registry
			.layout(id)
			.ok_or_else(|| PagesError::LayoutNotFound(id.clone()))?;

		if let Some(container) = layout.container() {
			self.document
				.set_attr(container, ATTR_LAYOUT, &layout.directive().to_attr());
		}
		let members = layout.members().to_vec();
		for member in members {
			if let Some(container) = self.container_of(&member) {
				self.document
					.set_attr(container, ATTR_LAYOUT_ITEM, id.as_str());
			}
		}
		Ok(())
	}

	// ------------------------------------------------------------------
	// Rendering
	// ------------------------------------------------------------------

	/// Renders one node's markup without mounting it.
	pub async fn render(&mut self, id: &NodeId) -> PagesResult<Rendered> {
		self.preload(id).await;
		self.render_context().render(id)
	}

	/// Mounts `id` and its subtree into `container`.
	pub async fn mount(&mut self, id: &NodeId, container: ElementId) -> PagesResult<MountReport> {
		self.preload(id).await;
		let report = {
			let ctx = RenderContext {
				registry: &self.registry,
				templates: &self.templates,
				definitions: &self.definitions,
				fallback_class: &self.settings.fallback_class,
			};
			ctx.mount(&mut self.document, id, container)?
		};
		self.after_mount(&report);
		Ok(report)
	}

	fn render_context(&self) -> RenderContext<'_> {
		RenderContext {
			registry: &self.registry,
			templates: &self.templates,
			definitions: &self.definitions,
			fallback_class: &self.settings.fallback_class,
		}
	}

	/// Loads the templates of every node in the subtree of `id`.
	async fn preload(&mut self, id: &NodeId) {
		let mut names = Vec::new();
		let mut seen = HashSet::new();
		for node_id in self.registry.subtree(id) {
			if let Some(node) = self.registry.get(&node_id) {
				if seen.insert(node.name().to_string()) {
					names.push(node.name().to_string());
				}
			}
		}
		self.templates
			.load_all(names.iter().map(String::as_str))
			.await;
	}

	fn after_mount(&mut self, report: &MountReport) {
		self.listeners.purge_dead(&self.document);

		let mut mounted = Vec::with_capacity(report.mounted.len());
		for (id, container) in &report.mounted {
			self.containers.insert(id.clone(), *container);
			*self.render_counts.entry(id.clone()).or_default() += 1;

			let hydrated = self
				.registry
				.get(id)
				.is_some_and(|node| node.status() == HydrationStatus::Hydrated);
			if hydrated {
				self.listeners
					.bind_component(&self.document, id, *container);
			}
			self.mark_await(id);
			mounted.push(id.clone());
		}

		for layout in self.registry.layouts_touching(&mounted) {
			if let Err(e) = self.apply_layout(&layout) {
				tracing::warn!("Failed to apply layout {}: {}", layout, e);
			}
		}
	}

	fn mark_await(&mut self, id: &NodeId) {
		let Some(container) = self.container_of(id) else {
			return;
		};
		match self.hydration.awaiting(id) {
			Some(trigger) => self.document.set_attr(container, ATTR_AWAIT, trigger.as_str()),
			None => self.document.remove_attr(container, ATTR_AWAIT),
		}
	}

	/// The live container of a mounted node.
	pub fn container_of(&self, id: &NodeId) -> Option<ElementId> {
		self.containers
			.get(id)
			.copied()
			.filter(|container| self.document.is_alive(*container))
			.or_else(|| self.document.find_by_attr(ATTR_ID, id.as_str()))
	}

	/// Markup currently inside a node's container.
	pub fn markup_of(&self, id: &NodeId) -> Option<String> {
		self.container_of(id)
			.map(|container| self.document.inner_html(container))
	}

	/// Text currently inside a node's container.
	pub fn text_of(&self, id: &NodeId) -> Option<String> {
		self.container_of(id)
			.map(|container| self.document.text_content(container))
	}

	/// Number of times `id` has been mounted.
	pub fn render_count(&self, id: &NodeId) -> usize {
		self.render_counts.get(id).copied().unwrap_or(0)
	}

	pub fn status(&self, id: &NodeId) -> Option<HydrationStatus> {
		self.registry.get(id).map(ComponentNode::status)
	}

	pub fn hydration_count(&self, id: &NodeId) -> usize {
		self.hydration.hydration_count(id)
	}

	// ------------------------------------------------------------------
	// Hydration
	// ------------------------------------------------------------------

	/// Takes over a server-rendered page.
	///
	/// The handoff markup becomes the document, components are rebuilt from
	/// the boundary markers (props and state from the handoff data), and
	/// every node is handed to the hydration coordinator. Critical nodes
	/// hydrate first, then eager nodes; the rest wait for their trigger.
	pub async fn hydrate_document(&mut self, handoff: &Handoff) -> PagesResult<HydrationPlan> {
		self.hydration.configure(handoff.config.clone());
		let root = self.document.root();
		self.document.set_inner_html(root, &handoff.markup);
		self.containers.clear();
		self.listeners.purge_dead(&self.document);

		for element in self.document.descendants_with_attr(root, ATTR_ID) {
			self.adopt(handoff, element);
		}

		let order = self.registry.tree_order();
		let plan = self.hydration.begin(&mut self.registry, &order);
		tracing::info!(
			"Hydrating {} node(s) immediately, {} deferred",
			plan.immediate.len(),
			plan.deferred.len()
		);

		for id in &plan.immediate {
			if let Err(e) = self.hydrate(id).await {
				tracing::warn!("Failed to hydrate {}: {}", id, e);
			}
		}
		for id in &plan.deferred {
			self.arm(id);
		}
		Ok(plan)
	}

	/// Registers the component whose container is `element`.
	fn adopt(&mut self, handoff: &Handoff, element: ElementId) {
		let Some(id) = self.document.attr(element, ATTR_ID).map(NodeId::from) else {
			return;
		};
		let Some(name) = self.document.attr(element, ATTR_COMPONENT).map(str::to_string) else {
			tracing::warn!("Component container {} has no {} marker", id, ATTR_COMPONENT);
			return;
		};
		let strategy = match self.document.attr(element, ATTR_HYDRATE) {
			Some(value) => value.parse().unwrap_or_else(|_| {
				tracing::warn!("Unknown hydration strategy '{}' on {}", value, id);
				HydrationStrategy::default()
			}),
			None => HydrationStrategy::default(),
		};
		let critical = self
			.document
			.attr(element, ATTR_CRITICAL)
			.is_some_and(|value| value != "false");

		let parent = self
			.document
			.parent(element)
			.and_then(|p| self.document.closest_with_attr(p, ATTR_ID))
			.and_then(|p| self.document.attr(p, ATTR_ID))
			.map(NodeId::from)
			.filter(|p| self.registry.contains(p));

		let (props, state) = match handoff.initial(&id) {
			Some(initial) => (initial.props.clone(), initial.state.clone()),
			None => (Value::Object(Default::default()), Value::Object(Default::default())),
		};

		let node = ComponentNode::new(id.clone(), name, props, state, strategy, critical);
		match self.registry.insert(node, parent.as_ref()) {
			Ok(()) => {
				self.containers.insert(id, element);
			}
			Err(e) => tracing::warn!("Skipping component container: {}", e),
		}
	}

	/// Hands a node to the coordinator and records what it decided.
	fn arm(&mut self, id: &NodeId) {
		let Some(node) = self.registry.get_mut(id) else {
			return;
		};
		match self.hydration.arm(node, &mut self.scheduler) {
			Arm::Immediate => self.scheduler.enqueue(Job::Hydrate(id.clone())),
			Arm::Deferred => self.mark_await(id),
			Arm::Blocked => tracing::debug!("Hydration of {} blocked by page config", id),
			Arm::Settled => {}
		}
	}

	/// Hydrates `id`: mounts its subtree and binds its listeners.
	///
	/// Returns false without side effects if the node is gone, already
	/// hydrated or blocked by the page config.
	pub async fn hydrate(&mut self, id: &NodeId) -> PagesResult<bool> {
		let Some(node) = self.registry.get_mut(id) else {
			tracing::debug!("{}", PagesError::StaleNodeMutation(id.clone()));
			return Ok(false);
		};
		if let Err(e) = self.hydration.claim(node) {
			tracing::debug!("Hydration skipped: {}", e);
			return Ok(false);
		}

		match self.container_of(id) {
			Some(container) => {
				self.mount(id, container).await?;
			}
			None => tracing::debug!("{} hydrated before its first mount", id),
		}
		tracing::debug!("Hydrated {}", id);
		Ok(true)
	}

	/// Reports that a `visible` node entered the viewport.
	///
	/// Repeated or unexpected notifications are no-ops.
	pub async fn notify_visible(&mut self, id: &NodeId) -> PagesResult<bool> {
		if !self.hydration.take_visible(id) {
			return Ok(false);
		}
		self.hydrate(id).await
	}

	/// Adds `id` to the selective-hydration allowlist and re-arms it if it
	/// had been blocked. Returns true if the node was released.
	pub async fn allow_hydration(&mut self, id: &NodeId) -> PagesResult<bool> {
		if !self.hydration.allow(id) {
			return Ok(false);
		}
		self.arm(id);
		self.run_until_idle().await;
		Ok(true)
	}

	// ------------------------------------------------------------------
	// Events
	// ------------------------------------------------------------------

	/// Delivers a DOM event to `target`.
	///
	/// Interaction kinds first hydrate every `interactive` node containing the
	/// target, outermost first. The event is not replayed into the new
	/// markup: if hydration replaced the target, nothing is dispatched.
	/// Otherwise the nearest listener for `kind` dispatches its action from
	/// the listener's owner.
	pub async fn trigger(
		&mut self,
		target: ElementId,
		kind: EventKind,
		detail: Value,
	) -> TriggerOutcome {
		let mut outcome = TriggerOutcome::default();
		if !self.document.is_alive(target) {
			return outcome;
		}

		if kind.is_interaction() {
			let chain = self.owners_of(target);
			for id in self.hydration.take_interaction(&chain) {
				match self.hydrate(&id).await {
					Ok(true) => outcome.hydrated.push(id),
					Ok(false) => {}
					Err(e) => tracing::warn!("Failed to hydrate {} on interaction: {}", id, e),
				}
			}
			if !self.document.is_alive(target) {
				return outcome;
			}
		}

		let Some((element, listener)) = self
			.listeners
			.find(&self.document, target, &kind)
			.map(|(element, listener)| (element, listener.clone()))
		else {
			return outcome;
		};
		outcome.default_prevented = self.document.is_navigational(element);

		let mut payload = EventPayload::new(kind, listener.action.clone());
		payload.target_tag = self.document.tag(target).map(str::to_string);
		payload.value = self.document.attr(target, "value").map(str::to_string);
		payload.detail = detail;

		let report = self
			.dispatch(&listener.owner, &listener.action, &payload)
			.await;
		outcome.dispatch = Some(report);
		outcome
	}

	/// Nodes whose containers hold `element`, nearest first.
	fn owners_of(&self, element: ElementId) -> Vec<NodeId> {
		let mut owners = Vec::new();
		let mut current = self.document.closest_with_attr(element, ATTR_ID);
		while let Some(container) = current {
			if let Some(id) = self.document.attr(container, ATTR_ID) {
				owners.push(NodeId::from(id));
			}
			current = self
				.document
				.parent(container)
				.and_then(|parent| self.document.closest_with_attr(parent, ATTR_ID));
		}
		owners
	}

	/// Dispatches `action` from `origin` and flushes the resulting renders.
	pub async fn dispatch(
		&mut self,
		origin: &NodeId,
		action: &str,
		payload: &EventPayload,
	) -> DispatchReport {
		let scope = DispatchScope {
			registry: &mut self.registry,
			definitions: &self.definitions,
			bridge: self.bridge.as_deref(),
			scheduler: &mut self.scheduler,
			policy: self.settings.bubble_policy,
			remote_fallback: self.settings.remote_fallback,
		};
		let report = dispatch_action(scope, origin, action, payload).await;
		self.run_until_idle().await;
		report
	}

	// ------------------------------------------------------------------
	// Scheduling
	// ------------------------------------------------------------------

	/// Runs every job queued so far plus one streamed hydration.
	///
	/// Render jobs whose ancestor is also being rendered in this tick are
	/// folded into the ancestor's render. Jobs for destroyed nodes are
	/// dropped. Returns the number of jobs run.
	pub async fn tick(&mut self) -> usize {
		let jobs = self.scheduler.drain();
		let rendering: HashSet<NodeId> = jobs
			.iter()
			.filter_map(|job| match job {
				Job::Render(id) => Some(id.clone()),
				Job::Hydrate(_) => None,
			})
			.collect();

		let mut ran = 0;
		for job in jobs {
			match job {
				Job::Render(id) => {
					if !self.registry.contains(&id) {
						tracing::debug!("{}", PagesError::StaleNodeMutation(id));
						continue;
					}
					if self
						.registry
						.ancestors(&id)
						.iter()
						.any(|ancestor| rendering.contains(ancestor))
					{
						continue;
					}
					let Some(container) = self.container_of(&id) else {
						tracing::debug!("{} is not mounted yet", id);
						continue;
					};
					if let Err(e) = self.mount(&id, container).await {
						tracing::warn!("Failed to render {}: {}", id, e);
					}
					ran += 1;
				}
				Job::Hydrate(id) => {
					if let Err(e) = self.hydrate(&id).await {
						tracing::warn!("Failed to hydrate {}: {}", id, e);
					}
					ran += 1;
				}
			}
		}

		if let Some(id) = self.hydration.next_streamed() {
			if let Err(e) = self.hydrate(&id).await {
				tracing::warn!("Failed to hydrate {}: {}", id, e);
			}
			ran += 1;
		}
		ran
	}

	/// Ticks until no job is queued. Pending timers are left alone.
	pub async fn run_until_idle(&mut self) {
		while self.scheduler.has_queued() || self.hydration.has_streamed() {
			self.tick().await;
		}
	}

	/// Moves the virtual clock forward by `by`, running every timer that
	/// falls due along the way in deadline order.
	pub async fn advance(&mut self, by: Duration) {
		let target = self.scheduler.now() + by;
		self.run_until_idle().await;
		while let Some(deadline) = self.scheduler.next_deadline() {
			if deadline > target {
				break;
			}
			let step = deadline.saturating_sub(self.scheduler.now());
			self.scheduler.advance(step);
			self.run_until_idle().await;
		}
		let rest = target.saturating_sub(self.scheduler.now());
		self.scheduler.advance(rest);
		self.run_until_idle().await;
	}

	/// Runs queued jobs and every pending timer on the virtual clock.
	pub async fn settle(&mut self) {
		self.run_until_idle().await;
		while let Some(deadline) = self.scheduler.next_deadline() {
			let step = deadline.saturating_sub(self.scheduler.now());
			self.advance(step).await;
		}
	}

	/// Like [`settle`](Self::settle), but sleeps on the tokio clock until
	/// each timer is due.
	pub async fn run_realtime(&mut self) {
		self.run_until_idle().await;
		while let Some(deadline) = self.scheduler.next_deadline() {
			let step = deadline.saturating_sub(self.scheduler.now());
			tokio::time::sleep(step).await;
			self.advance(step).await;
		}
	}

	// ------------------------------------------------------------------
	// Live reload
	// ------------------------------------------------------------------

	/// Drops changed templates from the cache and re-renders every live
	/// node that uses one of them.
	pub async fn apply_template_changes(&mut self, changes: &[TemplateChange]) {
		for change in changes {
			for name in self.templates.invalidate(&change.name) {
				for id in self.registry.named(&name) {
					self.scheduler.enqueue(Job::Render(id));
				}
			}
		}
		self.run_until_idle().await;
	}
}

/// Slice values from `store` that differ from what `state` already holds.
fn slice_patch(store: &Store, slices: &[String], state: &Value) -> Map<String, Value> {
	slices
		.iter()
		.filter_map(|slice| {
			let value = store.slice(slice)?;
			(state.get(slice) != Some(value)).then(|| (slice.clone(), value.clone()))
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::template::MemoryTemplateSource;
	use rstest::rstest;
	use serde_json::json;

	fn engine(templates: &[(&str, &str)]) -> Engine {
		let source = templates
			.iter()
			.fold(MemoryTemplateSource::new(), |s, (name, text)| s.with(*name, *text));
		Engine::new(Arc::new(source))
	}

	#[rstest]
	#[tokio::test]
	async fn test_root_component_renders_into_own_container() {
		let mut engine = engine(&[("Hello", "<p>Hello {{props.name}}</p>")]);

		let id = engine
			.create_component(NewComponent::new("Hello").props(json!({ "name": "Ada" })))
			.unwrap();
		engine.run_until_idle().await;

		assert_eq!(engine.text_of(&id).as_deref(), Some("Hello Ada"));
		assert_eq!(engine.status(&id), Some(HydrationStatus::Hydrated));
	}

	#[rstest]
	#[tokio::test]
	async fn test_set_state_rejects_non_object() {
		let mut engine = engine(&[("C", "{{state.n}}")]);
		let id = engine.create_component(NewComponent::new("C")).unwrap();

		let err = engine.set_state(&id, json!(3)).unwrap_err();

		assert_eq!(err, PagesError::InvalidStatePatch(id.to_string()));
		assert!(matches!(
			engine.set_state(&NodeId::from("ghost"), json!({})),
			Err(PagesError::ComponentNotFound(_))
		));
	}

	#[rstest]
	#[tokio::test]
	async fn test_child_renders_coalesce_into_parent() {
		let mut engine = engine(&[("P", "<main>{{@children}}</main>"), ("C", "<i>{{state.n}}</i>")]);
		let parent = engine
			.create_component(NewComponent::new("P").id("p"))
			.unwrap();
		let child = engine
			.create_component(NewComponent::new("C").id("c").parent("p").state(json!({ "n": 1 })))
			.unwrap();
		engine.run_until_idle().await;
		let parent_renders = engine.render_count(&parent);

		engine.set_state(&child, json!({ "n": 2 })).unwrap();
		engine.set_state(&parent, json!({ "x": true })).unwrap();
		engine.tick().await;

		assert_eq!(engine.render_count(&parent), parent_renders + 1);
		assert_eq!(engine.text_of(&child).as_deref(), Some("2"));
	}

	#[rstest]
	#[tokio::test]
	async fn test_advance_runs_timers_in_deadline_order() {
		let mut engine = engine(&[("L", "<p>lazy</p>")]);
		let id = engine
			.create_component(NewComponent::new("L").strategy(HydrationStrategy::Lazy))
			.unwrap();
		engine.run_until_idle().await;
		assert_eq!(engine.status(&id), Some(HydrationStatus::Scheduled));

		engine.advance(Duration::from_millis(999)).await;
		assert_eq!(engine.hydration_count(&id), 0);

		engine.advance(Duration::from_millis(1)).await;
		assert_eq!(engine.hydration_count(&id), 1);
		assert_eq!(engine.now(), Duration::from_secs(1));
		assert!(engine.is_idle());
	}

	#[rstest]
	#[tokio::test]
	async fn test_destroy_removes_container_and_listeners() {
		let mut engine = engine(&[("B", r#"<button data-action="go">go</button>"#)]);
		let id = engine.create_component(NewComponent::new("B")).unwrap();
		engine.run_until_idle().await;
		assert_eq!(engine.listeners().count_for(&id), 1);
		let container = engine.container_of(&id).unwrap();

		engine.destroy(&id).unwrap();

		assert!(!engine.document().is_alive(container));
		assert!(engine.listeners().is_empty());
		assert_eq!(engine.status(&id), None);
		assert!(matches!(engine.destroy(&id), Err(PagesError::ComponentNotFound(_))));
	}
}
