//! Remote action invocation.
//!
//! Actions declared as remote (or actions with no local handler, when remote
//! fallback is enabled) are sent to a single endpoint:
//!
//! ```text
//! POST <action_endpoint>
//! { "componentId": "...", "handler": "...", "data": { ...event metadata... } }
//!
//! -> { "success": true, "state": { ... }, "message": "..." }
//! ```
//!
//! A `state` object in a successful response is merged into the component's
//! state, which schedules a re-render.

use crate::component::NodeId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a remote action call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
	pub component_id: NodeId,
	pub handler: String,
	pub data: Value,
}

/// Response of a remote action call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
	pub success: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub state: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
}

impl ActionResponse {
	/// Successful response carrying a state patch.
	pub fn with_state(state: Value) -> Self {
		Self {
			success: true,
			state: Some(state),
			message: None,
		}
	}

	/// Unsuccessful response with a message.
	pub fn failure(message: impl Into<String>) -> Self {
		Self {
			success: false,
			state: None,
			message: Some(message.into()),
		}
	}
}

/// Errors raised by a [`ServerBridge`].
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
	#[error("Remote action request failed: {0}")]
	Network(String),

	#[error("Remote action endpoint returned status {status}: {body}")]
	Status { status: u16, body: String },

	#[error("Invalid remote action response: {0}")]
	Decode(String),

	#[error("No action endpoint configured")]
	NotConfigured,
}

/// Boundary to the server-side action handlers.
#[async_trait]
pub trait ServerBridge: Send + Sync {
	async fn call_action(&self, request: ActionRequest) -> Result<ActionResponse, BridgeError>;
}

#[cfg(feature = "http-bridge")]
pub use http::HttpServerBridge;

#[cfg(feature = "http-bridge")]
mod http {
	use super::*;
	use reqwest::Client;
	use std::time::Duration;

	/// [`ServerBridge`] posting JSON to an HTTP endpoint.
	///
	/// # Examples
	///
	/// ```no_run
	/// use tessera_pages::server_bridge::HttpServerBridge;
	///
	/// let bridge = HttpServerBridge::new("http://localhost:8000/api/actions").unwrap();
	/// assert_eq!(bridge.endpoint(), "http://localhost:8000/api/actions");
	/// ```
	#[derive(Debug, Clone)]
	pub struct HttpServerBridge {
		endpoint: String,
		client: Client,
	}

	impl HttpServerBridge {
		pub fn new(endpoint: impl Into<String>) -> Result<Self, BridgeError> {
			let client = Client::builder()
				.timeout(Duration::from_secs(30))
				.build()
				.map_err(|e| BridgeError::Network(e.to_string()))?;
			Ok(Self::with_client(endpoint, client))
		}

		/// Creates a bridge with a caller-provided client.
		pub fn with_client(endpoint: impl Into<String>, client: Client) -> Self {
			Self {
				endpoint: endpoint.into(),
				client,
			}
		}

		pub fn endpoint(&self) -> &str {
			&self.endpoint
		}
	}

	#[async_trait]
	impl ServerBridge for HttpServerBridge {
		async fn call_action(
			&self,
			request: ActionRequest,
		) -> Result<ActionResponse, BridgeError> {
			tracing::debug!(
				"POST {} handler={} component={}",
				self.endpoint,
				request.handler,
				request.component_id
			);

			let response = self
				.client
				.post(&self.endpoint)
				.json(&request)
				.send()
				.await
				.map_err(|e| BridgeError::Network(e.to_string()))?;

			let status = response.status();
			if !status.is_success() {
				let body = response
					.text()
					.await
					.unwrap_or_else(|_| "Unknown error".to_string());
				return Err(BridgeError::Status {
					status: status.as_u16(),
					body,
				});
			}

			response
				.json::<ActionResponse>()
				.await
				.map_err(|e| BridgeError::Decode(e.to_string()))
		}
	}
}
