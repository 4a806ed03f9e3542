use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::method::HttpMethod;
use crate::error::ValidationError;
use crate::hooks::Hook;
use crate::testing::ValidatorRule;

/// A header, query parameter or form field.
///
/// Disabled pairs stay in the definition so they can be re-enabled, but are
/// left out of anything sent as part of the actual request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValuePair {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl KeyValuePair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            description: String::new(),
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Flatten the enabled pairs into a map; later duplicates win.
pub fn enabled_map(pairs: &[KeyValuePair]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .filter(|pair| pair.enabled)
        .map(|pair| (pair.key.clone(), pair.value.clone()))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    None,
    FormData,
    UrlEncoded,
    Raw,
    Binary,
}

impl BodyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BodyKind::None => "none",
            BodyKind::FormData => "form-data",
            BodyKind::UrlEncoded => "x-www-form-urlencoded",
            BodyKind::Raw => "raw",
            BodyKind::Binary => "binary",
        }
    }

    pub fn parse(kind: &str) -> Result<Self, ValidationError> {
        match kind {
            "none" => Ok(BodyKind::None),
            "form-data" => Ok(BodyKind::FormData),
            "x-www-form-urlencoded" => Ok(BodyKind::UrlEncoded),
            "raw" => Ok(BodyKind::Raw),
            "binary" => Ok(BodyKind::Binary),
            other => Err(ValidationError::UnknownBodyType(other.to_string())),
        }
    }
}

/// Request body, tagged by kind on the wire as `{"type": ..., "content": ...}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBody", into = "RawBody")]
pub enum RequestBody {
    #[default]
    None,
    FormData(Vec<KeyValuePair>),
    UrlEncoded(Vec<KeyValuePair>),
    Raw(String),
    Binary,
}

impl RequestBody {
    /// Build a body from a kind and untyped content, rejecting content whose
    /// shape doesn't belong to the kind.
    pub fn new(kind: BodyKind, content: Value) -> Result<Self, ValidationError> {
        let mismatch = |found: &'static str| ValidationError::BodyContentMismatch {
            kind: kind.as_str().to_string(),
            found,
        };

        match (kind, content) {
            (BodyKind::None, Value::Null) => Ok(RequestBody::None),
            (BodyKind::Binary, Value::Null) => Ok(RequestBody::Binary),
            (BodyKind::Raw, Value::Null) => Ok(RequestBody::Raw(String::new())),
            (BodyKind::Raw, Value::String(text)) => Ok(RequestBody::Raw(text)),
            (BodyKind::FormData | BodyKind::UrlEncoded, Value::Null) => {
                Ok(Self::form(kind, Vec::new()))
            }
            (BodyKind::FormData | BodyKind::UrlEncoded, content @ Value::Array(_)) => {
                let pairs: Vec<KeyValuePair> = serde_json::from_value(content).map_err(|err| {
                    ValidationError::InvalidField {
                        field: "body.content".into(),
                        reason: err.to_string(),
                    }
                })?;
                Ok(Self::form(kind, pairs))
            }
            (_, content) => Err(mismatch(json_shape(&content))),
        }
    }

    fn form(kind: BodyKind, pairs: Vec<KeyValuePair>) -> Self {
        if kind == BodyKind::FormData {
            RequestBody::FormData(pairs)
        } else {
            RequestBody::UrlEncoded(pairs)
        }
    }

    pub fn kind(&self) -> BodyKind {
        match self {
            RequestBody::None => BodyKind::None,
            RequestBody::FormData(_) => BodyKind::FormData,
            RequestBody::UrlEncoded(_) => BodyKind::UrlEncoded,
            RequestBody::Raw(_) => BodyKind::Raw,
            RequestBody::Binary => BodyKind::Binary,
        }
    }

    /// Content as sent to the quick-debug endpoint: enabled form fields are
    /// flattened, raw text is passed through.
    pub fn outgoing_content(&self) -> Value {
        match self {
            RequestBody::FormData(pairs) | RequestBody::UrlEncoded(pairs) => {
                serde_json::to_value(enabled_map(pairs)).unwrap_or(Value::Null)
            }
            RequestBody::Raw(text) => Value::String(text.clone()),
            RequestBody::None | RequestBody::Binary => Value::Null,
        }
    }
}

fn json_shape(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[derive(Serialize, Deserialize)]
struct RawBody {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Value,
}

impl TryFrom<RawBody> for RequestBody {
    type Error = ValidationError;

    fn try_from(raw: RawBody) -> Result<Self, Self::Error> {
        RequestBody::new(BodyKind::parse(&raw.kind)?, raw.content)
    }
}

impl From<RequestBody> for RawBody {
    fn from(body: RequestBody) -> Self {
        let kind = body.kind().as_str().to_string();
        let content = match body {
            RequestBody::FormData(pairs) | RequestBody::UrlEncoded(pairs) => {
                serde_json::to_value(pairs).unwrap_or(Value::Null)
            }
            RequestBody::Raw(text) => Value::String(text),
            RequestBody::None | RequestBody::Binary => Value::Null,
        };
        RawBody { kind, content }
    }
}

/// Everything needed to describe one HTTP call to the execution backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestDefinition {
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub headers: Vec<KeyValuePair>,
    #[serde(default)]
    pub params: Vec<KeyValuePair>,
    #[serde(default)]
    pub body: RequestBody,
    #[serde(default)]
    pub variables: BTreeMap<String, Value>,
    #[serde(default)]
    pub validators: Vec<ValidatorRule>,
    #[serde(default)]
    pub extract: BTreeMap<String, String>,
    #[serde(default)]
    pub setup_hooks: Vec<Hook>,
    #[serde(default)]
    pub teardown_hooks: Vec<Hook>,
}

impl RequestDefinition {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            ..Default::default()
        }
    }

    /// Check everything that must hold before the definition is dispatched.
    /// A relative URL is only acceptable when an environment supplies the base.
    pub fn validate(&self, has_environment: bool) -> Result<(), ValidationError> {
        validate_url(&self.url, has_environment)?;
        validate_pairs("headers", &self.headers)?;
        validate_pairs("params", &self.params)?;
        if let RequestBody::FormData(pairs) | RequestBody::UrlEncoded(pairs) = &self.body {
            validate_pairs("body", pairs)?;
        }
        validate_extract(&self.extract)?;
        validate_hooks(&self.setup_hooks)?;
        validate_hooks(&self.teardown_hooks)
    }
}

pub fn is_absolute_url(url: &str) -> bool {
    let lower = url.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn validate_url(url: &str, has_environment: bool) -> Result<(), ValidationError> {
    if url.trim().is_empty() {
        return Err(ValidationError::EmptyUrl);
    }
    if !has_environment && !is_absolute_url(url) {
        return Err(ValidationError::RelativeUrlWithoutEnvironment(url.to_string()));
    }
    Ok(())
}

fn validate_pairs(field: &'static str, pairs: &[KeyValuePair]) -> Result<(), ValidationError> {
    match pairs
        .iter()
        .position(|pair| pair.enabled && pair.key.trim().is_empty())
    {
        Some(index) => Err(ValidationError::EmptyKey { field, index }),
        None => Ok(()),
    }
}

fn validate_extract(extract: &BTreeMap<String, String>) -> Result<(), ValidationError> {
    for (name, path) in extract {
        if name.trim().is_empty() || path.trim().is_empty() {
            return Err(ValidationError::InvalidField {
                field: "extract".into(),
                reason: format!("extraction `{name}` -> `{path}` needs a name and a path"),
            });
        }
    }
    Ok(())
}

fn validate_hooks(hooks: &[Hook]) -> Result<(), ValidationError> {
    hooks.iter().try_for_each(Hook::validate)
}

/// Partial request definition used for overrides, seeds and in-place edits.
/// Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<HttpMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<KeyValuePair>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Vec<KeyValuePair>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<RequestBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<BTreeMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validators: Option<Vec<ValidatorRule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup_hooks: Option<Vec<Hook>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teardown_hooks: Option<Vec<Hook>>,
}

impl RequestPatch {
    pub fn is_empty(&self) -> bool {
        *self == RequestPatch::default()
    }

    pub fn apply_to(self, request: &mut RequestDefinition) {
        if let Some(method) = self.method {
            request.method = method;
        }
        if let Some(url) = self.url {
            request.url = url;
        }
        if let Some(headers) = self.headers {
            request.headers = headers;
        }
        if let Some(params) = self.params {
            request.params = params;
        }
        if let Some(body) = self.body {
            request.body = body;
        }
        if let Some(variables) = self.variables {
            request.variables = variables;
        }
        if let Some(validators) = self.validators {
            request.validators = validators;
        }
        if let Some(extract) = self.extract {
            request.extract = extract;
        }
        if let Some(setup_hooks) = self.setup_hooks {
            request.setup_hooks = setup_hooks;
        }
        if let Some(teardown_hooks) = self.teardown_hooks {
            request.teardown_hooks = teardown_hooks;
        }
    }

    /// Same checks as [`RequestDefinition::validate`], applied to the fields
    /// that are present.
    pub fn validate(&self, has_environment: bool) -> Result<(), ValidationError> {
        if let Some(url) = &self.url {
            validate_url(url, has_environment)?;
        }
        if let Some(headers) = &self.headers {
            validate_pairs("headers", headers)?;
        }
        if let Some(params) = &self.params {
            validate_pairs("params", params)?;
        }
        if let Some(RequestBody::FormData(pairs) | RequestBody::UrlEncoded(pairs)) = &self.body {
            validate_pairs("body", pairs)?;
        }
        if let Some(extract) = &self.extract {
            validate_extract(extract)?;
        }
        if let Some(hooks) = &self.setup_hooks {
            validate_hooks(hooks)?;
        }
        if let Some(hooks) = &self.teardown_hooks {
            validate_hooks(hooks)?;
        }
        Ok(())
    }
}

impl From<RequestDefinition> for RequestPatch {
    fn from(request: RequestDefinition) -> Self {
        Self {
            method: Some(request.method),
            url: Some(request.url),
            headers: Some(request.headers),
            params: Some(request.params),
            body: Some(request.body),
            variables: Some(request.variables),
            validators: Some(request.validators),
            extract: Some(request.extract),
            setup_hooks: Some(request.setup_hooks),
            teardown_hooks: Some(request.teardown_hooks),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn body_rejects_content_of_wrong_shape() {
        let err = RequestBody::new(BodyKind::FormData, json!("a=1")).unwrap_err();
        assert_eq!(
            err,
            ValidationError::BodyContentMismatch {
                kind: "form-data".into(),
                found: "string"
            }
        );
        assert!(RequestBody::new(BodyKind::Raw, json!([])).is_err());
        assert!(RequestBody::new(BodyKind::None, json!("x")).is_err());
        assert!(RequestBody::new(BodyKind::Binary, json!({})).is_err());
    }

    #[test]
    fn body_deserializes_through_constructor() {
        let body: RequestBody = serde_json::from_value(json!({
            "type": "x-www-form-urlencoded",
            "content": [{"key": "user", "value": "bob"}]
        }))
        .unwrap();
        assert_eq!(body, RequestBody::UrlEncoded(vec![KeyValuePair::new("user", "bob")]));

        let bad = serde_json::from_value::<RequestBody>(json!({"type": "raw", "content": [1]}));
        assert!(bad.is_err());
        let unknown = serde_json::from_value::<RequestBody>(json!({"type": "graphql"}));
        assert!(unknown.is_err());
    }

    #[test]
    fn null_content_is_empty_for_form_and_raw() {
        assert_eq!(
            RequestBody::new(BodyKind::FormData, Value::Null).unwrap(),
            RequestBody::FormData(vec![])
        );
        assert_eq!(
            RequestBody::new(BodyKind::Raw, Value::Null).unwrap(),
            RequestBody::Raw(String::new())
        );
    }

    #[test]
    fn body_serializes_with_type_tag() {
        assert_eq!(
            serde_json::to_value(RequestBody::Raw("{\"a\":1}".into())).unwrap(),
            json!({"type": "raw", "content": "{\"a\":1}"})
        );
        assert_eq!(
            serde_json::to_value(RequestBody::None).unwrap(),
            json!({"type": "none", "content": null})
        );
    }

    #[test]
    fn disabled_pairs_are_kept_but_not_sent() {
        let pairs = vec![
            KeyValuePair::new("Accept", "application/json"),
            KeyValuePair::new("X-Debug", "1").disabled(),
        ];
        let map = enabled_map(&pairs);
        assert_eq!(map.len(), 1);
        assert_eq!(map["Accept"], "application/json");

        let body = RequestBody::FormData(pairs);
        assert_eq!(body.outgoing_content(), json!({"Accept": "application/json"}));
    }

    #[test]
    fn validate_requires_absolute_url_without_environment() {
        let request = RequestDefinition::new(HttpMethod::Get, "/users");
        assert!(matches!(
            request.validate(false),
            Err(ValidationError::RelativeUrlWithoutEnvironment(_))
        ));
        assert!(request.validate(true).is_ok());

        let absolute = RequestDefinition::new(HttpMethod::Get, "HTTPS://api.example.com/users");
        assert!(absolute.validate(false).is_ok());

        let empty = RequestDefinition::new(HttpMethod::Get, "  ");
        assert_eq!(empty.validate(true), Err(ValidationError::EmptyUrl));
    }

    #[test]
    fn validate_ignores_disabled_blank_keys() {
        let mut request = RequestDefinition::new(HttpMethod::Get, "http://localhost/");
        request.headers = vec![KeyValuePair::new("", "x").disabled()];
        assert!(request.validate(false).is_ok());

        request.params = vec![KeyValuePair::new("page", "1"), KeyValuePair::new(" ", "2")];
        assert_eq!(
            request.validate(false),
            Err(ValidationError::EmptyKey {
                field: "params",
                index: 1
            })
        );
    }

    #[test]
    fn patch_only_touches_present_fields() {
        let mut request = RequestDefinition::new(HttpMethod::Get, "http://localhost/a");
        request.extract.insert("token".into(), "body.token".into());

        RequestPatch {
            method: Some(HttpMethod::Post),
            ..Default::default()
        }
        .apply_to(&mut request);

        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.url, "http://localhost/a");
        assert_eq!(request.extract["token"], "body.token");
    }

    #[test]
    fn empty_patch_serializes_to_empty_object() {
        assert!(RequestPatch::default().is_empty());
        assert_eq!(serde_json::to_value(RequestPatch::default()).unwrap(), json!({}));
    }
}
