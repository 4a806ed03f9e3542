use std::collections::BTreeMap;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::method::HttpMethod;
use super::request::{RequestDefinition, RequestPatch, enabled_map};
use super::response::{ApiEnvelope, DebugResult};
use crate::collections::{ApiInterface, InterfaceId};
use crate::config::ClientConfig;
use crate::error::{ApiError, ValidationError};
use crate::hooks::Hook;
use crate::tabs::DebugTicket;
use crate::testing::ValidatorRule;

/// Body of `POST /interfaces/{id}/debug/`: the overridden fields only.
#[derive(Debug, Serialize)]
struct SavedDebugPayload<'a> {
    #[serde(flatten)]
    overrides: &'a RequestPatch,
    #[serde(skip_serializing_if = "Option::is_none")]
    environment_id: Option<i64>,
}

/// Body of `POST /interfaces/quick_debug/`. Headers and params go out as
/// flat maps of the enabled entries.
#[derive(Debug, Serialize)]
struct QuickDebugPayload<'a> {
    project_id: i64,
    method: HttpMethod,
    url: &'a str,
    headers: BTreeMap<String, String>,
    params: BTreeMap<String, String>,
    body: Value,
    body_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    environment_id: Option<i64>,
    variables: &'a BTreeMap<String, Value>,
    validators: &'a [ValidatorRule],
    extract: &'a BTreeMap<String, String>,
    setup_hooks: &'a [Hook],
    teardown_hooks: &'a [Hook],
}

/// HTTP client for the execution backend's debug endpoints.
#[derive(Debug, Clone)]
pub struct DebugClient {
    client: Client,
    config: ClientConfig,
    base_url: String,
}

impl DebugClient {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = config.token.as_deref().filter(|t| !t.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|err| {
                ValidationError::InvalidField {
                    field: "token".into(),
                    reason: err.to_string(),
                }
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| ApiError::Network(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            config,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run a persisted interface, overriding any of its fields.
    pub async fn debug_saved_interface(
        &self,
        interface_id: InterfaceId,
        overrides: &RequestPatch,
        environment_id: Option<i64>,
    ) -> Result<DebugResult, ApiError> {
        overrides.validate(environment_id.is_some())?;

        let url = format!("{}/interfaces/{}/debug/", self.base_url, interface_id);
        let payload = SavedDebugPayload {
            overrides,
            environment_id,
        };
        debug!(interface_id, ?environment_id, "debugging saved interface");

        let response = self.send(self.client.post(&url).json(&payload)).await?;
        read_debug_result(response).await
    }

    /// Run an unsaved request in the scope of a project.
    pub async fn quick_debug(
        &self,
        request: &RequestDefinition,
        project_id: i64,
        environment_id: Option<i64>,
    ) -> Result<DebugResult, ApiError> {
        if project_id <= 0 {
            return Err(ValidationError::InvalidField {
                field: "project_id".into(),
                reason: "a project is required for quick debug".into(),
            }
            .into());
        }
        request.validate(environment_id.is_some())?;

        let url = format!("{}/interfaces/quick_debug/", self.base_url);
        let payload = QuickDebugPayload {
            project_id,
            method: request.method,
            url: &request.url,
            headers: enabled_map(&request.headers),
            params: enabled_map(&request.params),
            body: request.body.outgoing_content(),
            body_type: request.body.kind().as_str(),
            environment_id,
            variables: &request.variables,
            validators: &request.validators,
            extract: &request.extract,
            setup_hooks: &request.setup_hooks,
            teardown_hooks: &request.teardown_hooks,
        };
        debug!(project_id, method = %request.method, url = %request.url, "quick debug");

        let response = self.send(self.client.post(&url).json(&payload)).await?;
        read_debug_result(response).await
    }

    /// Dispatch a ticket to the saved or quick endpoint depending on whether
    /// its tab is bound to an interface.
    pub async fn execute(&self, ticket: &DebugTicket) -> Result<DebugResult, ApiError> {
        match ticket.interface_id {
            Some(interface_id) => {
                let overrides = RequestPatch::from(ticket.request.clone());
                self.debug_saved_interface(interface_id, &overrides, ticket.environment_id)
                    .await
            }
            None => {
                let project_id = ticket.project_id.ok_or_else(|| ValidationError::InvalidField {
                    field: "project_id".into(),
                    reason: "an unsaved request needs a project".into(),
                })?;
                self.quick_debug(&ticket.request, project_id, ticket.environment_id)
                    .await
            }
        }
    }

    /// Fetch a saved interface, e.g. to open it in a tab.
    pub async fn get_interface(&self, interface_id: InterfaceId) -> Result<ApiInterface, ApiError> {
        let url = format!("{}/interfaces/{}/", self.base_url, interface_id);
        let response = self.send(self.client.get(&url)).await?;
        read_data(response).await
    }

    /// Send, retrying failed connection attempts with a linearly growing
    /// delay. Anything that may have reached the backend (timeouts included)
    /// is never resent: a debug call runs the target request and its hooks.
    async fn send(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let mut attempt = 0u32;
        loop {
            let Some(request) = builder.try_clone() else {
                return builder.send().await.map_err(ApiError::from);
            };

            match request.send().await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_connect() && attempt < self.config.retries => {
                    attempt += 1;
                    let delay = self.config.retry_delay * attempt;
                    warn!(attempt, ?delay, error = %err, "backend unreachable, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(ApiError::from(err)),
            }
        }
    }
}

async fn read_debug_result(response: Response) -> Result<DebugResult, ApiError> {
    let status = response.status();
    let bytes = response.bytes().await?;

    if status.is_success() {
        let envelope: ApiEnvelope<DebugResult> =
            serde_json::from_slice(&bytes).map_err(|err| ApiError::Parse(err.to_string()))?;
        if envelope.status == "error" {
            return Ok(DebugResult::failed(envelope.describe()));
        }
        return envelope
            .data
            .ok_or_else(|| ApiError::Parse("response envelope has no data".into()));
    }

    match serde_json::from_slice::<ApiEnvelope<Value>>(&bytes).ok() {
        // The backend was reached and reported an execution failure.
        Some(envelope) if status.is_server_error() => {
            let message = envelope.describe();
            warn!(%status, %message, "backend failed to execute request");
            Ok(DebugResult::failed(message))
        }
        envelope => Err(error_for_status(status, envelope)),
    }
}

async fn read_data<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let bytes = response.bytes().await?;

    if !status.is_success() {
        let envelope = serde_json::from_slice::<ApiEnvelope<Value>>(&bytes).ok();
        return Err(error_for_status(status, envelope));
    }

    let envelope: ApiEnvelope<T> =
        serde_json::from_slice(&bytes).map_err(|err| ApiError::Parse(err.to_string()))?;
    envelope
        .data
        .ok_or_else(|| ApiError::Parse("response envelope has no data".into()))
}

fn error_for_status(status: StatusCode, envelope: Option<ApiEnvelope<Value>>) -> ApiError {
    let message = envelope
        .as_ref()
        .map(ApiEnvelope::describe)
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| format!("request failed with status {status}"));

    match status.as_u16() {
        400 => ApiError::Validation(ValidationError::Rejected {
            message,
            fields: envelope.map(|e| e.field_errors()).unwrap_or_default(),
        }),
        401 | 403 => ApiError::Unauthorized { message },
        404 => ApiError::NotFound { message },
        code => ApiError::Server {
            status: code,
            message,
        },
    }
}
