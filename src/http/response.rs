use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Overall outcome of one debug execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugStatus {
    /// Request ran and every validator passed.
    #[default]
    Success,
    /// Request ran but at least one validator failed.
    Failure,
    /// The backend could not execute the request (unreachable target, hook failure, ...).
    Error,
}

/// The request as the backend actually sent it, after variable substitution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestEcho {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    #[serde(default)]
    pub status_code: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<f64>,
}

/// Outcome of one validator, in the same position as the rule that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireOutcome")]
pub struct ValidationOutcome {
    pub comparator: String,
    pub check: String,
    pub expect: Value,
    pub actual: Value,
    pub result: bool,
}

/// The execution engine reports `check_value`/`expect_value` and a
/// `check_result` of `"pass"`/`"fail"` instead of a boolean.
#[derive(Deserialize)]
struct WireOutcome {
    #[serde(default)]
    comparator: String,
    #[serde(default)]
    check: String,
    #[serde(default, alias = "expect_value")]
    expect: Value,
    #[serde(default, alias = "check_value")]
    actual: Value,
    #[serde(default)]
    result: Option<bool>,
    #[serde(default)]
    check_result: Option<String>,
}

impl From<WireOutcome> for ValidationOutcome {
    fn from(wire: WireOutcome) -> Self {
        let result = wire
            .result
            .unwrap_or_else(|| wire.check_result.as_deref() == Some("pass"));
        Self {
            comparator: wire.comparator,
            check: wire.check,
            expect: wire.expect,
            actual: wire.actual,
            result,
        }
    }
}

/// What the backend reports about a hook it ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HookTrace {
    SqlCall {
        #[serde(default)]
        sql: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        db_id: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        db_key: Option<String>,
        #[serde(default)]
        var_name: String,
        #[serde(default)]
        executed: bool,
        #[serde(default)]
        value: Value,
    },
    FunctionCall {
        #[serde(default)]
        content: Value,
        #[serde(default)]
        executed: bool,
    },
    VariableDefinition {
        #[serde(default)]
        name: String,
        #[serde(default)]
        value: Value,
        #[serde(default)]
        executed: bool,
    },
    #[serde(other)]
    Other,
}

/// Result of a single debug execution, immutable once received.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireDebugResult")]
pub struct DebugResult {
    pub request: RequestEcho,
    pub response: Option<ResponseSnapshot>,
    pub validation_results: Vec<ValidationOutcome>,
    pub extracted_variables: BTreeMap<String, Value>,
    pub elapsed: f64,
    pub status: DebugStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Rows returned by SQL hooks, as the backend sent them.
    #[serde(skip_serializing_if = "Value::is_null")]
    pub sql_results: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub setup_hooks_info: Vec<HookTrace>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub teardown_hooks_info: Vec<HookTrace>,
}

impl DebugResult {
    /// A result for a backend that was reached but failed to execute.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: DebugStatus::Error,
            error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == DebugStatus::Success
    }

    pub fn failed_validations(&self) -> impl Iterator<Item = &ValidationOutcome> {
        self.validation_results.iter().filter(|outcome| !outcome.result)
    }

    /// Outcome for the validator at `index` in the request definition.
    pub fn outcome_for(&self, index: usize) -> Option<&ValidationOutcome> {
        self.validation_results.get(index)
    }
}

/// Lenient input shape: the backend omits `status` and reports `success`
/// plus optional `validation_failures` instead. An unsuccessful run with
/// failed validators is a failure; without them it is an error.
#[derive(Deserialize)]
struct WireDebugResult {
    #[serde(default)]
    request: RequestEcho,
    #[serde(default)]
    response: Option<ResponseSnapshot>,
    #[serde(default)]
    validation_results: Vec<ValidationOutcome>,
    #[serde(default)]
    extracted_variables: BTreeMap<String, Value>,
    #[serde(default)]
    elapsed: f64,
    #[serde(default)]
    status: Option<DebugStatus>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    validation_failures: Option<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    sql_results: Value,
    #[serde(default)]
    setup_hooks_info: Vec<HookTrace>,
    #[serde(default)]
    teardown_hooks_info: Vec<HookTrace>,
}

impl From<WireDebugResult> for DebugResult {
    fn from(wire: WireDebugResult) -> Self {
        let status = wire.status.unwrap_or_else(|| {
            let failed_validation = wire.validation_failures.is_some()
                || wire.validation_results.iter().any(|outcome| !outcome.result);
            if wire.error.is_some() {
                DebugStatus::Error
            } else if failed_validation {
                DebugStatus::Failure
            } else if wire.success == Some(false) {
                DebugStatus::Error
            } else {
                DebugStatus::Success
            }
        });

        Self {
            request: wire.request,
            response: wire.response,
            validation_results: wire.validation_results,
            extracted_variables: wire.extracted_variables,
            elapsed: wire.elapsed,
            status,
            error: wire.error,
            sql_results: wire.sql_results,
            setup_hooks_info: wire.setup_hooks_info,
            teardown_hooks_info: wire.teardown_hooks_info,
        }
    }
}

/// Response envelope wrapping every backend answer.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Option<BTreeMap<String, Value>>,
    /// Set instead of `message` by framework-level errors (404, 401).
    #[serde(default)]
    pub detail: Option<String>,
}

impl<T> ApiEnvelope<T> {
    /// Flatten field errors (`{"field": ["msg", ...]}`) into string lists.
    pub fn field_errors(&self) -> BTreeMap<String, Vec<String>> {
        let Some(errors) = &self.errors else {
            return BTreeMap::new();
        };
        errors
            .iter()
            .map(|(field, messages)| {
                let messages = match messages {
                    Value::Array(items) => items
                        .iter()
                        .map(|item| item.as_str().map(str::to_string).unwrap_or_else(|| item.to_string()))
                        .collect(),
                    Value::String(text) => vec![text.clone()],
                    other => vec![other.to_string()],
                };
                (field.clone(), messages)
            })
            .collect()
    }

    /// Message plus any `detail` entries, for display.
    pub fn describe(&self) -> String {
        let message = match (&self.message, &self.detail) {
            (message, Some(detail)) if message.is_empty() => detail.clone(),
            (message, _) => message.clone(),
        };
        let details = self.field_errors().remove("detail").unwrap_or_default();
        if details.is_empty() {
            message
        } else {
            format!("{message}: {}", details.join("; "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn derives_status_from_backend_flags() {
        let ok: DebugResult = serde_json::from_value(json!({
            "success": true,
            "elapsed": 12.5,
            "response": {"status_code": 200, "headers": {}, "content": {"id": 1}},
            "validation_results": [
                {"comparator": "eq", "check": "status_code", "expect": 200, "actual": 200, "result": true}
            ],
            "extracted_variables": {"user_id": 1}
        }))
        .unwrap();
        assert_eq!(ok.status, DebugStatus::Success);
        assert_eq!(ok.response.as_ref().unwrap().status_code, 200);
        assert_eq!(ok.extracted_variables["user_id"], json!(1));

        let failing: DebugResult = serde_json::from_value(json!({
            "success": true,
            "validation_results": [
                {"comparator": "eq", "check": "status_code", "expect": 200, "actual": 500, "result": false}
            ],
            "validation_failures": "status_code: 500 != 200"
        }))
        .unwrap();
        assert_eq!(failing.status, DebugStatus::Failure);
        assert_eq!(failing.failed_validations().count(), 1);
        assert_eq!(failing.outcome_for(0).unwrap().actual, json!(500));
    }

    #[test]
    fn accepts_engine_check_result_form() {
        let outcome: ValidationOutcome = serde_json::from_value(json!({
            "comparator": "equal",
            "check": "body.code",
            "check_value": 1,
            "expect_value": 0,
            "check_result": "fail"
        }))
        .unwrap();
        assert!(!outcome.result);
        assert_eq!(outcome.actual, json!(1));
        assert_eq!(outcome.expect, json!(0));
    }

    #[test]
    fn unsuccessful_run_without_failed_validators_is_an_error() {
        let result: DebugResult = serde_json::from_value(json!({"success": false})).unwrap();
        assert_eq!(result.status, DebugStatus::Error);

        let result: DebugResult = serde_json::from_value(json!({
            "success": false,
            "validation_results": [
                {"comparator": "eq", "check": "status_code", "expect": 200, "actual": 404, "result": false}
            ]
        }))
        .unwrap();
        assert_eq!(result.status, DebugStatus::Failure);
    }

    #[test]
    fn explicit_status_wins() {
        let result: DebugResult =
            serde_json::from_value(json!({"status": "error", "error": "connection refused"})).unwrap();
        assert_eq!(result.status, DebugStatus::Error);
        assert_eq!(result.error.as_deref(), Some("connection refused"));
    }

    #[test]
    fn parses_hook_traces() {
        let result: DebugResult = serde_json::from_value(json!({
            "setup_hooks_info": [
                {"type": "sql_call", "sql": "SELECT 1", "db_id": 2, "var_name": "one", "executed": true, "value": 1},
                {"type": "function_call", "content": "${login()}", "executed": true},
                {"type": "something_new"}
            ]
        }))
        .unwrap();
        assert_eq!(result.setup_hooks_info.len(), 3);
        assert!(matches!(&result.setup_hooks_info[0], HookTrace::SqlCall { var_name, .. } if var_name == "one"));
        assert_eq!(result.setup_hooks_info[2], HookTrace::Other);
    }

    #[test]
    fn null_sql_results_survive_a_round_trip() {
        let result: DebugResult =
            serde_json::from_value(json!({"success": true, "sql_results": null})).unwrap();
        assert!(result.sql_results.is_null());
        let stored = serde_json::to_value(&result).unwrap();
        assert!(stored.get("sql_results").is_none());
        let restored: DebugResult = serde_json::from_value(stored).unwrap();
        assert_eq!(restored, result);

        let rows = json!({"orders": [{"id": 1}]});
        let result: DebugResult =
            serde_json::from_value(json!({"success": true, "sql_results": rows.clone()})).unwrap();
        let restored: DebugResult = serde_json::from_str(&serde_json::to_string(&result).unwrap()).unwrap();
        assert_eq!(restored.sql_results, rows);
    }

    #[test]
    fn envelope_describe_includes_detail() {
        let envelope: ApiEnvelope<Value> = serde_json::from_value(json!({
            "status": "error",
            "code": 500,
            "message": "debug failed",
            "data": {},
            "errors": {"detail": ["Max retries exceeded"]}
        }))
        .unwrap();
        assert_eq!(envelope.describe(), "debug failed: Max retries exceeded");
    }
}
