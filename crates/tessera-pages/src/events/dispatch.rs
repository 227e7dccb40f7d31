//! Action resolution and bubbling.

use super::EventPayload;
use crate::component::{ActionContext, ComponentDef, Handler, NodeId, merge_object};
use crate::error::PagesError;
use crate::registry::Registry;
use crate::scheduler::{Job, Scheduler};
use crate::server_bridge::{ActionRequest, ServerBridge};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Whether a dispatch keeps bubbling after a level handled it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BubblePolicy {
	/// Every ancestor gets a chance to handle the action (fan-out).
	#[default]
	Always,
	/// Stop at the first level that resolved a handler.
	StopOnHandled,
}

/// Result of a remote call made for one level.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteOutcome {
	/// The server accepted the action. `state_changed` is true when a state
	/// patch was merged.
	Applied { handler: String, state_changed: bool },
	/// The call failed; state is unchanged.
	Failed(PagesError),
}

/// What happened at one level of the bubbling chain.
#[derive(Debug, Clone, PartialEq)]
pub enum LevelOutcome {
	/// A local handler ran.
	Handled,
	/// The action went to the server bridge.
	Remote(RemoteOutcome),
	/// Nothing at this level handles the action.
	Unhandled,
}

impl LevelOutcome {
	pub fn is_handled(&self) -> bool {
		!matches!(self, Self::Unhandled)
	}
}

/// Per-level record of one dispatch, origin first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DispatchReport {
	pub action: String,
	pub levels: Vec<(NodeId, LevelOutcome)>,
}

impl DispatchReport {
	/// True if any level handled the action.
	pub fn handled(&self) -> bool {
		self.levels.iter().any(|(_, outcome)| outcome.is_handled())
	}

	/// Nodes that handled the action locally or remotely, origin first.
	pub fn handled_by(&self) -> Vec<&NodeId> {
		self.levels
			.iter()
			.filter(|(_, outcome)| outcome.is_handled())
			.map(|(id, _)| id)
			.collect()
	}

	pub fn outcome_at(&self, id: &NodeId) -> Option<&LevelOutcome> {
		self.levels
			.iter()
			.find(|(level, _)| level == id)
			.map(|(_, outcome)| outcome)
	}

	/// Failed remote calls.
	pub fn failures(&self) -> Vec<&PagesError> {
		self.levels
			.iter()
			.filter_map(|(_, outcome)| match outcome {
				LevelOutcome::Remote(RemoteOutcome::Failed(error)) => Some(error),
				_ => None,
			})
			.collect()
	}
}

/// Result of simulating a DOM event on an element.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TriggerOutcome {
	/// Nodes hydrated because of this event (`interactive` strategy).
	pub hydrated: Vec<NodeId>,
	/// Default navigation of a link or form was suppressed.
	pub default_prevented: bool,
	/// Dispatch performed for the listener that matched, if any.
	pub dispatch: Option<DispatchReport>,
}

/// Everything a dispatch touches, borrowed from the engine.
pub(crate) struct DispatchScope<'a> {
	pub registry: &'a mut Registry,
	pub definitions: &'a HashMap<String, ComponentDef>,
	pub bridge: Option<&'a dyn ServerBridge>,
	pub scheduler: &'a mut Scheduler,
	pub policy: BubblePolicy,
	pub remote_fallback: bool,
}

/// Dispatches `action` from `origin` up to the root.
///
/// Each level resolves the action against its own definition:
/// a local handler runs synchronously, a remote declaration calls the
/// bridge. When the origin has no handler at all and remote fallback is on,
/// the action name itself is sent to the bridge. State patches are merged
/// and schedule a re-render of the patched node.
pub(crate) async fn dispatch_action(
	scope: DispatchScope<'_>,
	origin: &NodeId,
	action: &str,
	payload: &EventPayload,
) -> DispatchReport {
	let DispatchScope {
		registry,
		definitions,
		bridge,
		scheduler,
		policy,
		remote_fallback,
	} = scope;

	let mut report = DispatchReport {
		action: action.to_string(),
		levels: Vec::new(),
	};
	if !registry.contains(origin) {
		tracing::debug!("{}", PagesError::StaleNodeMutation(origin.clone()));
		return report;
	}

	let mut chain = vec![origin.clone()];
	chain.extend(registry.ancestors(origin));

	for (depth, id) in chain.into_iter().enumerate() {
		let Some(node) = registry.get(&id) else {
			tracing::debug!("{}", PagesError::StaleNodeMutation(id));
			break;
		};
		let handler = definitions
			.get(node.name())
			.and_then(|def| def.resolve(action))
			.cloned();

		let outcome = match handler {
			Some(Handler::Local(handler)) => {
				let patch = {
					let mut ctx = ActionContext::new(&id, node.props(), node.state());
					handler(&mut ctx, payload);
					ctx.into_patch()
				};
				if !patch.is_empty() {
					if let Some(node) = registry.get_mut(&id) {
						merge_object(node.state_mut(), patch);
					}
					scheduler.enqueue(Job::Render(id.clone()));
				}
				tracing::debug!("Action '{}' handled locally by {}", action, id);
				LevelOutcome::Handled
			}
			Some(Handler::Remote(name)) => match bridge {
				Some(bridge) => {
					let outcome = call_remote(registry, bridge, scheduler, &id, &name, payload).await;
					LevelOutcome::Remote(outcome)
				}
				None => {
					let error = PagesError::RemoteActionFailure {
						component: id.clone(),
						handler: name,
						reason: "no server bridge configured".to_string(),
					};
					tracing::error!("{}", error);
					LevelOutcome::Remote(RemoteOutcome::Failed(error))
				}
			},
			None if depth == 0 && remote_fallback => match bridge {
				Some(bridge) => {
					let outcome = call_remote(registry, bridge, scheduler, &id, action, payload).await;
					LevelOutcome::Remote(outcome)
				}
				None => LevelOutcome::Unhandled,
			},
			None => LevelOutcome::Unhandled,
		};

		let stop = policy == BubblePolicy::StopOnHandled && outcome.is_handled();
		report.levels.push((id, outcome));
		if stop {
			break;
		}
	}

	if !report.handled() {
		tracing::debug!("Action '{}' from {} was not handled", action, origin);
	}
	report
}

async fn call_remote(
	registry: &mut Registry,
	bridge: &dyn ServerBridge,
	scheduler: &mut Scheduler,
	id: &NodeId,
	handler: &str,
	payload: &EventPayload,
) -> RemoteOutcome {
	let failure = |reason: String| {
		let error = PagesError::RemoteActionFailure {
			component: id.clone(),
			handler: handler.to_string(),
			reason,
		};
		tracing::error!("{}", error);
		RemoteOutcome::Failed(error)
	};

	let data = match serde_json::to_value(payload) {
		Ok(data) => data,
		Err(e) => return failure(e.to_string()),
	};
	let request = ActionRequest {
		component_id: id.clone(),
		handler: handler.to_string(),
		data,
	};

	let response = match bridge.call_action(request).await {
		Ok(response) => response,
		Err(e) => return failure(e.to_string()),
	};
	if !response.success {
		return failure(
			response
				.message
				.unwrap_or_else(|| "server reported failure".to_string()),
		);
	}

	let state_changed = match response.state {
		Some(Value::Object(patch)) => match registry.get_mut(id) {
			Some(node) => {
				merge_object(node.state_mut(), patch);
				scheduler.enqueue(Job::Render(id.clone()));
				true
			}
			None => {
				tracing::debug!("{}", PagesError::StaleNodeMutation(id.clone()));
				false
			}
		},
		Some(Value::Null) | None => false,
		Some(other) => {
			tracing::warn!("Ignoring non-object state from remote action '{}': {}", handler, other);
			false
		}
	};

	RemoteOutcome::Applied {
		handler: handler.to_string(),
		state_changed,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::component::{ComponentNode, HydrationStrategy};
	use crate::events::EventKind;
	use crate::server_bridge::{ActionResponse, BridgeError};
	use async_trait::async_trait;
	use parking_lot::Mutex;
	use rstest::rstest;
	use serde_json::json;

	#[derive(Default)]
	struct MockBridge {
		response: Option<ActionResponse>,
		calls: Mutex<Vec<ActionRequest>>,
	}

	#[async_trait]
	impl ServerBridge for MockBridge {
		async fn call_action(&self, request: ActionRequest) -> Result<ActionResponse, BridgeError> {
			self.calls.lock().push(request);
			self.response
				.clone()
				.ok_or_else(|| BridgeError::Network("connection refused".to_string()))
		}
	}

	struct World {
		registry: Registry,
		definitions: HashMap<String, ComponentDef>,
		scheduler: Scheduler,
	}

	impl World {
		/// app (App) > list (List) > item (Item)
		fn new(definitions: Vec<ComponentDef>) -> Self {
			let mut registry = Registry::new();
			for (id, name, parent) in [
				("app", "App", None),
				("list", "List", Some("app")),
				("item", "Item", Some("list")),
			] {
				let node = ComponentNode::new(
					NodeId::from(id),
					name,
					json!({}),
					json!({ "count": 0 }),
					HydrationStrategy::Eager,
					false,
				);
				registry.insert(node, parent.map(NodeId::from).as_ref()).unwrap();
			}
			Self {
				registry,
				definitions: definitions
					.into_iter()
					.map(|def| (def.name().to_string(), def))
					.collect(),
				scheduler: Scheduler::new(),
			}
		}

		async fn dispatch(
			&mut self,
			bridge: Option<&dyn ServerBridge>,
			policy: BubblePolicy,
			action: &str,
		) -> DispatchReport {
			let scope = DispatchScope {
				registry: &mut self.registry,
				definitions: &self.definitions,
				bridge,
				scheduler: &mut self.scheduler,
				policy,
				remote_fallback: true,
			};
			let payload = EventPayload::new(EventKind::Click, action);
			dispatch_action(scope, &NodeId::from("item"), action, &payload).await
		}

		fn count(&self, id: &str) -> Value {
			self.registry.get(&NodeId::from(id)).unwrap().state()["count"].clone()
		}
	}

	fn increment(name: &str, action: &str) -> ComponentDef {
		ComponentDef::new(name).on(action, |ctx, _| {
			let count = ctx.state()["count"].as_i64().unwrap_or(0);
			ctx.set_state(json!({ "count": count + 1 }));
		})
	}

	#[tokio::test]
	async fn test_always_bubble_fans_out() {
		let mut world = World::new(vec![increment("Item", "bump"), increment("App", "bump")]);

		let report = world.dispatch(None, BubblePolicy::Always, "bump").await;

		assert_eq!(report.handled_by(), vec![&NodeId::from("item"), &NodeId::from("app")]);
		assert_eq!(report.outcome_at(&NodeId::from("list")), Some(&LevelOutcome::Unhandled));
		assert_eq!(world.count("item"), json!(1));
		assert_eq!(world.count("app"), json!(1));
		assert_eq!(
			world.scheduler.drain(),
			vec![Job::Render(NodeId::from("item")), Job::Render(NodeId::from("app"))]
		);
	}

	#[tokio::test]
	async fn test_stop_on_handled_short_circuits() {
		let mut world = World::new(vec![increment("Item", "bump"), increment("App", "bump")]);

		let report = world.dispatch(None, BubblePolicy::StopOnHandled, "bump").await;

		assert_eq!(report.levels.len(), 1);
		assert_eq!(world.count("app"), json!(0));
	}

	#[tokio::test]
	async fn test_camel_case_resolution() {
		let mut world = World::new(vec![increment("List", "addItem")]);

		let report = world.dispatch(None, BubblePolicy::Always, "add-item").await;

		assert_eq!(report.handled_by(), vec![&NodeId::from("list")]);
		assert_eq!(world.count("list"), json!(1));
	}

	#[tokio::test]
	async fn test_unhandled_dispatch_leaves_state_unchanged() {
		let mut world = World::new(vec![]);

		let report = world.dispatch(None, BubblePolicy::Always, "nothing").await;

		assert!(!report.handled());
		assert_eq!(report.levels.len(), 3);
		for id in ["app", "list", "item"] {
			assert_eq!(world.count(id), json!(0));
		}
		assert!(world.scheduler.is_idle());
	}

	#[tokio::test]
	async fn test_remote_fallback_only_at_origin() {
		let mut world = World::new(vec![]);
		let bridge = MockBridge {
			response: Some(ActionResponse::with_state(json!({ "count": 5 }))),
			..Default::default()
		};

		let report = world.dispatch(Some(&bridge as &dyn ServerBridge), BubblePolicy::Always, "save").await;

		let calls = bridge.calls.lock();
		assert_eq!(calls.len(), 1);
		assert_eq!(calls[0].component_id, NodeId::from("item"));
		assert_eq!(calls[0].handler, "save");
		assert_eq!(calls[0].data["kind"], json!("click"));
		assert_eq!(world.count("item"), json!(5));
		assert_eq!(
			report.outcome_at(&NodeId::from("item")),
			Some(&LevelOutcome::Remote(RemoteOutcome::Applied {
				handler: "save".to_string(),
				state_changed: true,
			}))
		);
	}

	#[tokio::test]
	async fn test_declared_remote_handler_name_is_sent() {
		let mut world = World::new(vec![ComponentDef::new("List").remote("save", "list_save")]);
		let bridge = MockBridge {
			response: Some(ActionResponse {
				success: true,
				state: None,
				message: None,
			}),
			..Default::default()
		};

		world.dispatch(Some(&bridge as &dyn ServerBridge), BubblePolicy::Always, "save").await;

		let handlers: Vec<_> = bridge.calls.lock().iter().map(|c| c.handler.clone()).collect();
		// item falls back with the action name, list uses its declared handler
		assert_eq!(handlers, vec!["save".to_string(), "list_save".to_string()]);
	}

	#[rstest]
	#[case(None)]
	#[case(Some(ActionResponse::failure("denied")))]
	#[tokio::test]
	async fn test_remote_failure_keeps_state(#[case] response: Option<ActionResponse>) {
		let mut world = World::new(vec![ComponentDef::new("Item").remote("save", "save")]);
		let bridge = MockBridge {
			response,
			..Default::default()
		};

		let report = world.dispatch(Some(&bridge as &dyn ServerBridge), BubblePolicy::Always, "save").await;

		assert_eq!(report.failures().len(), 1);
		assert_eq!(world.count("item"), json!(0));
		assert!(world.scheduler.is_idle());
	}
}
