//! # Saved interfaces
//!
//! An interface is a named request template persisted by the backend under a
//! project and module. The client only reads them, to seed debug tabs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::hooks::Hook;
use crate::http::method::HttpMethod;
use crate::http::request::{KeyValuePair, RequestBody, RequestDefinition, RequestPatch};
use crate::testing::ValidatorRule;

/// Backend identifier of a saved interface.
pub type InterfaceId = i64;

/// A persisted interface as returned by `GET /interfaces/{id}/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiInterface {
    pub id: InterfaceId,
    pub name: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub project: Option<i64>,
    #[serde(default)]
    pub module: Option<i64>,
    #[serde(default)]
    pub headers: Vec<KeyValuePair>,
    #[serde(default)]
    pub params: Vec<KeyValuePair>,
    #[serde(default)]
    pub body: RequestBody,
    #[serde(default)]
    pub setup_hooks: Vec<Hook>,
    #[serde(default)]
    pub teardown_hooks: Vec<Hook>,
    #[serde(default)]
    pub variables: BTreeMap<String, Value>,
    #[serde(default)]
    pub validators: Vec<ValidatorRule>,
    #[serde(default)]
    pub extract: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl ApiInterface {
    /// The request part of the interface.
    pub fn request(&self) -> RequestDefinition {
        RequestDefinition {
            method: self.method,
            url: self.url.clone(),
            headers: self.headers.clone(),
            params: self.params.clone(),
            body: self.body.clone(),
            variables: self.variables.clone(),
            validators: self.validators.clone(),
            extract: self.extract.clone(),
            setup_hooks: self.setup_hooks.clone(),
            teardown_hooks: self.teardown_hooks.clone(),
        }
    }

    pub fn as_patch(&self) -> RequestPatch {
        RequestPatch::from(self.request())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_backend_interface() {
        let interface: ApiInterface = serde_json::from_value(json!({
            "id": 42,
            "name": "Get user",
            "method": "GET",
            "url": "/users/{{uid}}",
            "project": 1,
            "module": 7,
            "headers": [{"key": "Accept", "value": "application/json", "description": "", "enabled": true}],
            "params": [],
            "body": {"type": "none", "content": null},
            "setup_hooks": [],
            "teardown_hooks": [],
            "variables": {"uid": "3"},
            "validators": [{"eq": ["status_code", 200]}],
            "extract": {"name": "body.name"},
            "create_time": "2024-05-01T10:00:00Z",
            "module_info": {"id": 7, "name": "users"}
        }))
        .unwrap();

        let request = interface.request();
        assert_eq!(request.url, "/users/{{uid}}");
        assert_eq!(request.validators.len(), 1);
        assert_eq!(request.variables["uid"], json!("3"));
        assert_eq!(interface.as_patch().url.as_deref(), Some("/users/{{uid}}"));
    }
}
