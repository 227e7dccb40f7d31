//! Centralized reducer-based state container.
//!
//! The combined state is a JSON object with one entry per slice; each slice
//! is owned by one reducer. A store works on its own, or attached to an
//! [`Engine`](crate::engine::Engine), where bound components mirror slices
//! into their state and re-render when a dispatch changes them.
//!
//! ```rust
//! use tessera_pages::store::{Action, Store};
//! use serde_json::json;
//!
//! let mut store = Store::new().with_reducer("counter", json!(0), |state, action| {
//!     match action.kind.as_str() {
//!         "increment" => json!(state.as_i64().unwrap_or(0) + 1),
//!         _ => state.clone(),
//!     }
//! });
//!
//! store.dispatch(Action::new("increment"));
//! assert_eq!(store.get_state()["counter"], json!(1));
//! ```
//!
//! ## Middleware
//!
//! Middleware wraps dispatch in a chain. Each link receives the action and a
//! [`Next`] continuation and returns the action to reduce, so it may rewrite
//! the action or skip the remaining links. Reducing and notifying
//! subscribers always happen once the chain returns.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A dispatched action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
	#[serde(rename = "type")]
	pub kind: String,
	#[serde(default)]
	pub payload: Value,
}

impl Action {
	pub fn new(kind: impl Into<String>) -> Self {
		Self {
			kind: kind.into(),
			payload: Value::Null,
		}
	}

	pub fn with_payload(kind: impl Into<String>, payload: Value) -> Self {
		Self {
			kind: kind.into(),
			payload,
		}
	}
}

/// Computes the next state of one slice.
pub type Reducer = Arc<dyn Fn(&Value, &Action) -> Value + Send + Sync + 'static>;

type Subscriber = Box<dyn Fn(&Value) + Send + Sync + 'static>;

/// Errors raised by [`Store`] configuration calls.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
	#[error("No reducer registered for slice '{0}'")]
	UnknownSlice(String),

	#[error("A reducer is already registered for slice '{0}'")]
	DuplicateSlice(String),
}

/// A link in the dispatch chain.
pub trait Middleware: Send + Sync {
	/// Handles `action` before it is reduced. Call `next.run(action)` to
	/// continue the chain; return the action that should be reduced.
	fn process(&self, state: &Value, action: Action, next: Next<'_>) -> Action;

	/// Called after reducers ran and subscribers were notified.
	fn after(&self, _state: &Value, _action: &Action) {}
}

/// The rest of the middleware chain.
pub struct Next<'a> {
	chain: &'a [Arc<dyn Middleware>],
	state: &'a Value,
}

impl<'a> Next<'a> {
	/// Runs the remaining middleware and returns the action to reduce.
	pub fn run(self, action: Action) -> Action {
		match self.chain.split_first() {
			Some((first, rest)) => first.process(
				self.state,
				action,
				Next {
					chain: rest,
					state: self.state,
				},
			),
			None => action,
		}
	}
}

/// Logs every dispatched action at `debug` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingMiddleware;

impl Middleware for LoggingMiddleware {
	fn process(&self, _state: &Value, action: Action, next: Next<'_>) -> Action {
		tracing::debug!("Dispatching action '{}'", action.kind);
		next.run(action)
	}

	fn after(&self, state: &Value, action: &Action) {
		tracing::debug!("State after '{}': {}", action.kind, state);
	}
}

/// Handle returned by [`Store::subscribe`].
#[must_use = "dropping the handle makes it impossible to unsubscribe"]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

/// Reducer-based state container.
pub struct Store {
	state: Value,
	reducers: BTreeMap<String, Reducer>,
	middleware: Vec<Arc<dyn Middleware>>,
	subscribers: Vec<(Subscription, Subscriber)>,
	next_subscription: u64,
}

impl std::fmt::Debug for Store {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Store")
			.field("state", &self.state)
			.field("slices", &self.reducers.keys().collect::<Vec<_>>())
			.field("middleware", &self.middleware.len())
			.field("subscribers", &self.subscribers.len())
			.finish()
	}
}

impl Default for Store {
	fn default() -> Self {
		Self::new()
	}
}

impl Store {
	pub fn new() -> Self {
		Self {
			state: Value::Object(Map::new()),
			reducers: BTreeMap::new(),
			middleware: Vec::new(),
			subscribers: Vec::new(),
			next_subscription: 0,
		}
	}

	/// Builder form of [`add_reducer`](Self::add_reducer). A duplicate slice
	/// replaces the earlier reducer.
	pub fn with_reducer<F>(mut self, slice: impl Into<String>, initial: Value, reducer: F) -> Self
	where
		F: Fn(&Value, &Action) -> Value + Send + Sync + 'static,
	{
		let slice = slice.into();
		self.set_slice(&slice, initial);
		self.reducers.insert(slice, Arc::new(reducer));
		self
	}

	pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
		self.middleware.push(middleware);
		self
	}

	/// Registers a reducer owning `slice`, with its initial state.
	pub fn add_reducer<F>(&mut self, slice: impl Into<String>, initial: Value, reducer: F) -> Result<(), StoreError>
	where
		F: Fn(&Value, &Action) -> Value + Send + Sync + 'static,
	{
		let slice = slice.into();
		if self.reducers.contains_key(&slice) {
			return Err(StoreError::DuplicateSlice(slice));
		}
		self.set_slice(&slice, initial);
		self.reducers.insert(slice, Arc::new(reducer));
		Ok(())
	}

	/// Swaps the reducer of an existing slice, keeping its current state.
	pub fn replace_reducer<F>(&mut self, slice: &str, reducer: F) -> Result<(), StoreError>
	where
		F: Fn(&Value, &Action) -> Value + Send + Sync + 'static,
	{
		match self.reducers.get_mut(slice) {
			Some(existing) => {
				*existing = Arc::new(reducer);
				Ok(())
			}
			None => Err(StoreError::UnknownSlice(slice.to_string())),
		}
	}

	/// The combined state object.
	pub fn get_state(&self) -> &Value {
		&self.state
	}

	pub fn slice(&self, name: &str) -> Option<&Value> {
		self.state.get(name)
	}

	/// Runs `action` through the middleware chain, every reducer and every
	/// subscriber, in that order. Returns the new combined state.
	pub fn dispatch(&mut self, action: Action) -> &Value {
		let action = Next {
			chain: &self.middleware,
			state: &self.state,
		}
		.run(action);

		let mut next = Map::new();
		for (slice, reducer) in &self.reducers {
			let current = self.state.get(slice).unwrap_or(&Value::Null);
			next.insert(slice.clone(), reducer(current, &action));
		}
		self.state = Value::Object(next);

		for (_, subscriber) in &self.subscribers {
			subscriber(&self.state);
		}
		for middleware in &self.middleware {
			middleware.after(&self.state, &action);
		}
		&self.state
	}

	/// Registers a listener called with the new state after every dispatch.
	pub fn subscribe<F>(&mut self, subscriber: F) -> Subscription
	where
		F: Fn(&Value) + Send + Sync + 'static,
	{
		self.next_subscription += 1;
		let handle = Subscription(self.next_subscription);
		self.subscribers.push((handle, Box::new(subscriber)));
		handle
	}

	/// Removes a subscriber. Returns false if it was already removed.
	pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
		let before = self.subscribers.len();
		self.subscribers.retain(|(handle, _)| *handle != subscription);
		self.subscribers.len() != before
	}

	fn set_slice(&mut self, slice: &str, initial: Value) {
		if let Value::Object(map) = &mut self.state {
			map.insert(slice.to_string(), initial);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use parking_lot::Mutex;
	use rstest::{fixture, rstest};
	use serde_json::json;

	fn counter(state: &Value, action: &Action) -> Value {
		let current = state.as_i64().unwrap_or(0);
		match action.kind.as_str() {
			"increment" => json!(current + 1),
			"add" => json!(current + action.payload.as_i64().unwrap_or(0)),
			_ => state.clone(),
		}
	}

	fn todos(state: &Value, action: &Action) -> Value {
		match action.kind.as_str() {
			"add_todo" => {
				let mut items = state.as_array().cloned().unwrap_or_default();
				items.push(action.payload.clone());
				Value::Array(items)
			}
			_ => state.clone(),
		}
	}

	#[fixture]
	fn store() -> Store {
		Store::new()
			.with_reducer("counter", json!(0), counter)
			.with_reducer("todos", json!([]), todos)
	}

	#[rstest]
	fn test_dispatch_runs_every_reducer(mut store: Store) {
		store.dispatch(Action::with_payload("add_todo", json!("milk")));
		store.dispatch(Action::with_payload("add", json!(3)));

		assert_eq!(store.get_state(), &json!({ "counter": 3, "todos": ["milk"] }));
	}

	#[rstest]
	fn test_subscribers_are_notified_until_unsubscribed(mut store: Store) {
		let seen = Arc::new(Mutex::new(Vec::new()));
		let sink = Arc::clone(&seen);
		let subscription = store.subscribe(move |state| sink.lock().push(state["counter"].clone()));

		store.dispatch(Action::new("increment"));
		store.dispatch(Action::new("unknown"));
		assert!(store.unsubscribe(subscription));
		assert!(!store.unsubscribe(subscription));
		store.dispatch(Action::new("increment"));

		assert_eq!(*seen.lock(), vec![json!(1), json!(1)]);
		assert_eq!(store.slice("counter"), Some(&json!(2)));
	}

	struct Rename;

	impl Middleware for Rename {
		fn process(&self, _state: &Value, action: Action, next: Next<'_>) -> Action {
			if action.kind == "inc" {
				return next.run(Action::new("increment"));
			}
			next.run(action)
		}
	}

	struct Swallow;

	impl Middleware for Swallow {
		fn process(&self, _state: &Value, action: Action, _next: Next<'_>) -> Action {
			Action::new(format!("swallowed:{}", action.kind))
		}
	}

	struct Record(Arc<Mutex<Vec<String>>>);

	impl Middleware for Record {
		fn process(&self, _state: &Value, action: Action, next: Next<'_>) -> Action {
			self.0.lock().push(action.kind.clone());
			next.run(action)
		}
	}

	#[rstest]
	fn test_middleware_can_rewrite_actions(store: Store) {
		let mut store = store
			.with_middleware(Arc::new(LoggingMiddleware))
			.with_middleware(Arc::new(Rename));

		store.dispatch(Action::new("inc"));

		assert_eq!(store.slice("counter"), Some(&json!(1)));
	}

	#[rstest]
	fn test_reduce_and_notify_run_without_next(store: Store) {
		let recorded = Arc::new(Mutex::new(Vec::new()));
		let mut store = store
			.with_middleware(Arc::new(Swallow))
			.with_middleware(Arc::new(Record(Arc::clone(&recorded))));
		let notified = Arc::new(Mutex::new(0));
		let counter = Arc::clone(&notified);
		let _subscription = store.subscribe(move |_| *counter.lock() += 1);

		store.dispatch(Action::new("increment"));

		assert!(recorded.lock().is_empty());
		assert_eq!(*notified.lock(), 1);
		assert_eq!(store.slice("counter"), Some(&json!(0)));
	}

	#[rstest]
	fn test_replace_reducer_keeps_state(mut store: Store) {
		store.dispatch(Action::new("increment"));

		store
			.replace_reducer("counter", |state, _| json!(state.as_i64().unwrap_or(0) * 10))
			.unwrap();
		store.dispatch(Action::new("anything"));

		assert_eq!(store.slice("counter"), Some(&json!(10)));
		assert_eq!(
			store.replace_reducer("missing", counter),
			Err(StoreError::UnknownSlice("missing".to_string()))
		);
	}

	#[rstest]
	fn test_add_reducer_rejects_duplicates(mut store: Store) {
		assert_eq!(
			store.add_reducer("counter", json!(0), counter),
			Err(StoreError::DuplicateSlice("counter".to_string()))
		);
		store.add_reducer("flags", json!({}), |s, _| s.clone()).unwrap();
		assert_eq!(store.slice("flags"), Some(&json!({})));
	}
}
