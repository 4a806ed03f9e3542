use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::collections::{ApiInterface, InterfaceId};
use crate::http::request::{RequestDefinition, RequestPatch};
use crate::http::response::DebugResult;

pub const DEFAULT_TAB_NAME: &str = "New Interface";

/// Opaque tab identifier, unique for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(String);

impl TabId {
    pub(crate) fn generate() -> Self {
        Self(format!("tab_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TabId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for TabId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Configuration pane shown for a tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigPane {
    Params,
    Headers,
    Body,
    SetupHooks,
    TeardownHooks,
    Extract,
    Validators,
    Variables,
}

/// Presentation-only state. Persisted with the tab but never sent anywhere.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabUiState {
    #[serde(default)]
    pub active_pane: Option<ConfigPane>,
}

/// One open request being edited and debugged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugTab {
    pub id: TabId,
    /// Saved interface this tab edits; `None` for an ad-hoc request.
    #[serde(default)]
    pub interface_id: Option<InterfaceId>,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub module: Option<i64>,
    #[serde(default)]
    pub request: RequestDefinition,
    /// Last result received for this tab.
    #[serde(default)]
    pub result: Option<DebugResult>,
    #[serde(default)]
    pub ui: TabUiState,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

fn default_name() -> String {
    DEFAULT_TAB_NAME.to_string()
}

impl DebugTab {
    pub(crate) fn from_seed(id: TabId, seed: TabSeed) -> Self {
        let mut request = RequestDefinition::default();
        seed.patch.apply_to(&mut request);
        let now = now_millis();
        Self {
            id,
            interface_id: seed.interface_id,
            name: seed.name.unwrap_or_else(default_name),
            module: seed.module,
            request,
            result: None,
            ui: TabUiState::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = now_millis().max(self.updated_at);
    }
}

/// Initial content of a new tab.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabSeed {
    pub interface_id: Option<InterfaceId>,
    pub name: Option<String>,
    pub module: Option<i64>,
    pub patch: RequestPatch,
}

impl TabSeed {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_patch(mut self, patch: RequestPatch) -> Self {
        self.patch = patch;
        self
    }
}

impl From<RequestPatch> for TabSeed {
    fn from(patch: RequestPatch) -> Self {
        Self {
            patch,
            ..Default::default()
        }
    }
}

impl From<&ApiInterface> for TabSeed {
    fn from(interface: &ApiInterface) -> Self {
        Self {
            interface_id: Some(interface.id),
            name: Some(interface.name.clone()),
            module: interface.module,
            patch: interface.as_patch(),
        }
    }
}

/// Tab fields outside the request. `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabMeta {
    pub name: Option<String>,
    pub module: Option<i64>,
    pub interface_id: Option<InterfaceId>,
}

/// What a debug call was issued for, captured before dispatch.
///
/// The result is recorded against `tab_id` whatever tab is active when the
/// call completes.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugTicket {
    pub tab_id: TabId,
    pub interface_id: Option<InterfaceId>,
    pub request: RequestDefinition,
    pub project_id: Option<i64>,
    pub environment_id: Option<i64>,
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::method::HttpMethod;
    use serde_json::json;

    #[test]
    fn generated_ids_are_prefixed_and_distinct() {
        let a = TabId::generate();
        let b = TabId::generate();
        assert!(a.as_str().starts_with("tab_"));
        assert_ne!(a, b);
    }

    #[test]
    fn seed_fills_request_over_defaults() {
        let seed = TabSeed::named("Login").with_patch(RequestPatch {
            method: Some(HttpMethod::Post),
            ..Default::default()
        });
        let tab = DebugTab::from_seed(TabId::from("tab_1"), seed);
        assert_eq!(tab.name, "Login");
        assert_eq!(tab.request.method, HttpMethod::Post);
        assert_eq!(tab.request.url, "");
        assert!(tab.result.is_none());
        assert_eq!(tab.created_at, tab.updated_at);
    }

    #[test]
    fn serializes_camel_case() {
        let mut tab = DebugTab::from_seed(TabId::from("tab_1"), TabSeed::default());
        tab.ui.active_pane = Some(ConfigPane::SetupHooks);
        let value = serde_json::to_value(&tab).unwrap();
        assert_eq!(value["id"], "tab_1");
        assert_eq!(value["name"], DEFAULT_TAB_NAME);
        assert_eq!(value["ui"], json!({"activePane": "setup_hooks"}));
        assert!(value.get("interfaceId").is_some());
        assert!(value.get("createdAt").is_some());
    }
}
