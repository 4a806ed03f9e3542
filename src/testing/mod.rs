//! # Validators
//!
//! Declarative response checks attached to a request. Each rule is one
//! comparator applied to a `check` path (`status_code`, `body.data.id`,
//! `headers.Content-Type`, ...) and an expected value. Rules are evaluated by
//! the execution backend; this module only builds and carries them.
//!
//! On the wire a rule is a one-key object, `{"eq": ["status_code", 200]}`.
//! The `{"check", "comparator", "expect"}` form is accepted on input as well.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;

/// Comparison applied by a validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterOrEquals,
    LessThan,
    LessOrEquals,
    Contains,
    ContainedBy,
    StartsWith,
    EndsWith,
    RegexMatch,
    StringEquals,
    LengthEqual,
    LengthGreaterThan,
    LengthLessThan,
    LengthGreaterOrEquals,
    LengthLessOrEquals,
    TypeMatch,
}

impl Comparator {
    pub const ALL: [Comparator; 18] = [
        Comparator::Equal,
        Comparator::NotEqual,
        Comparator::GreaterThan,
        Comparator::GreaterOrEquals,
        Comparator::LessThan,
        Comparator::LessOrEquals,
        Comparator::Contains,
        Comparator::ContainedBy,
        Comparator::StartsWith,
        Comparator::EndsWith,
        Comparator::RegexMatch,
        Comparator::StringEquals,
        Comparator::LengthEqual,
        Comparator::LengthGreaterThan,
        Comparator::LengthLessThan,
        Comparator::LengthGreaterOrEquals,
        Comparator::LengthLessOrEquals,
        Comparator::TypeMatch,
    ];

    /// Canonical wire key.
    pub fn key(&self) -> &'static str {
        match self {
            Comparator::Equal => "eq",
            Comparator::NotEqual => "ne",
            Comparator::GreaterThan => "gt",
            Comparator::GreaterOrEquals => "ge",
            Comparator::LessThan => "lt",
            Comparator::LessOrEquals => "le",
            Comparator::Contains => "contains",
            Comparator::ContainedBy => "contained_by",
            Comparator::StartsWith => "startswith",
            Comparator::EndsWith => "endswith",
            Comparator::RegexMatch => "regex_match",
            Comparator::StringEquals => "str_eq",
            Comparator::LengthEqual => "length_equal",
            Comparator::LengthGreaterThan => "length_greater_than",
            Comparator::LengthLessThan => "length_less_than",
            Comparator::LengthGreaterOrEquals => "length_greater_or_equals",
            Comparator::LengthLessOrEquals => "length_less_or_equals",
            Comparator::TypeMatch => "type_match",
        }
    }

    /// Resolve a canonical key or one of its aliases.
    pub fn from_key(key: &str) -> Option<Self> {
        let comparator = match key {
            "eq" | "equal" | "equals" => Comparator::Equal,
            "ne" | "not_equal" => Comparator::NotEqual,
            "gt" | "greater_than" => Comparator::GreaterThan,
            "ge" | "gte" | "greater_or_equals" => Comparator::GreaterOrEquals,
            "lt" | "less_than" => Comparator::LessThan,
            "le" | "lte" | "less_or_equals" => Comparator::LessOrEquals,
            "contains" => Comparator::Contains,
            "contained_by" => Comparator::ContainedBy,
            "startswith" | "starts_with" => Comparator::StartsWith,
            "endswith" | "ends_with" => Comparator::EndsWith,
            "regex_match" => Comparator::RegexMatch,
            "str_eq" | "string_equals" => Comparator::StringEquals,
            "length_equal" | "length_equals" | "count_eq" => Comparator::LengthEqual,
            "length_greater_than" => Comparator::LengthGreaterThan,
            "length_less_than" => Comparator::LengthLessThan,
            "length_greater_or_equals" => Comparator::LengthGreaterOrEquals,
            "length_less_or_equals" => Comparator::LengthLessOrEquals,
            "type_match" => Comparator::TypeMatch,
            _ => return None,
        };
        Some(comparator)
    }
}

impl Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// A single response check: exactly one comparator, one path, one expectation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct ValidatorRule {
    comparator: Comparator,
    check: String,
    expect: Value,
}

impl ValidatorRule {
    pub fn new(
        comparator: Comparator,
        check: impl Into<String>,
        expect: impl Into<Value>,
    ) -> Result<Self, ValidationError> {
        let check = check.into();
        if check.trim().is_empty() {
            return Err(ValidationError::MalformedValidator {
                comparator: comparator.key().to_string(),
            });
        }
        Ok(Self {
            comparator,
            check,
            expect: expect.into(),
        })
    }

    /// Build a rule from a JSON object, enforcing the single-comparator rule.
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let Some(object) = value.as_object() else {
            return Err(ValidationError::MissingComparator);
        };
        if ["comparator", "check", "expect"].iter().any(|key| object.contains_key(*key)) {
            return Self::from_compat_object(object);
        }

        let mut keys = object.keys();
        let (Some(key), None) = (keys.next(), keys.next()) else {
            return Err(if object.is_empty() {
                ValidationError::MissingComparator
            } else {
                ValidationError::MultipleComparators(object.keys().cloned().collect())
            });
        };

        let comparator = Comparator::from_key(key)
            .ok_or_else(|| ValidationError::UnknownComparator(key.clone()))?;
        let malformed = || ValidationError::MalformedValidator {
            comparator: key.clone(),
        };
        let pair = object[key].as_array().ok_or_else(malformed)?;
        let [check, expect] = pair.as_slice() else {
            return Err(malformed());
        };
        let check = check.as_str().ok_or_else(malformed)?;

        Self::new(comparator, check, expect.clone())
    }

    /// `{"check", "comparator", "expect"}`. The comparator must be named and
    /// no single-key comparator may sit next to it.
    fn from_compat_object(object: &Map<String, Value>) -> Result<Self, ValidationError> {
        let mut named: Vec<String> = object
            .keys()
            .filter(|key| Comparator::from_key(key).is_some())
            .cloned()
            .collect();
        if !named.is_empty() {
            if object.contains_key("comparator") {
                named.insert(0, "comparator".to_string());
            }
            return Err(ValidationError::MultipleComparators(named));
        }

        let name = match object.get("comparator") {
            None | Some(Value::Null) => return Err(ValidationError::MissingComparator),
            Some(Value::String(name)) => name,
            Some(_) => {
                return Err(ValidationError::MalformedValidator {
                    comparator: "comparator".to_string(),
                });
            }
        };
        let comparator =
            Comparator::from_key(name).ok_or_else(|| ValidationError::UnknownComparator(name.clone()))?;
        let check = object
            .get("check")
            .and_then(Value::as_str)
            .ok_or_else(|| ValidationError::MalformedValidator {
                comparator: name.clone(),
            })?;
        let expect = object.get("expect").cloned().unwrap_or(Value::Null);
        Self::new(comparator, check, expect)
    }

    pub fn comparator(&self) -> Comparator {
        self.comparator
    }

    pub fn check(&self) -> &str {
        &self.check
    }

    pub fn expect(&self) -> &Value {
        &self.expect
    }
}

impl TryFrom<Value> for ValidatorRule {
    type Error = ValidationError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_json(&value)
    }
}

impl From<ValidatorRule> for Value {
    fn from(rule: ValidatorRule) -> Self {
        let mut object = Map::new();
        object.insert(
            rule.comparator.key().to_string(),
            Value::Array(vec![Value::String(rule.check), rule.expect]),
        );
        Value::Object(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_one_key_form() {
        let rule: ValidatorRule = serde_json::from_value(json!({"eq": ["status_code", 200]})).unwrap();
        assert_eq!(rule.comparator(), Comparator::Equal);
        assert_eq!(rule.check(), "status_code");
        assert_eq!(rule.expect(), &json!(200));
    }

    #[test]
    fn aliases_resolve_to_canonical_key() {
        let rule = ValidatorRule::from_json(&json!({"length_equals": ["body.items", 3]})).unwrap();
        assert_eq!(rule.comparator(), Comparator::LengthEqual);
        assert_eq!(Value::from(rule), json!({"length_equal": ["body.items", 3]}));

        let rule = ValidatorRule::from_json(&json!({"gte": ["body.count", 1]})).unwrap();
        assert_eq!(rule.comparator(), Comparator::GreaterOrEquals);
    }

    #[test]
    fn rejects_two_comparators() {
        let err = ValidatorRule::from_json(&json!({
            "eq": ["status_code", 200],
            "contains": ["body.msg", "ok"]
        }))
        .unwrap_err();
        assert!(matches!(err, ValidationError::MultipleComparators(keys) if keys.len() == 2));

        let err = ValidatorRule::from_json(&json!({
            "check": "status_code",
            "comparator": "eq",
            "expect": 200,
            "contains": ["body.msg", "ok"]
        }))
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::MultipleComparators(vec!["comparator".into(), "contains".into()])
        );
    }

    #[test]
    fn rejects_aliases_set_together() {
        let err = ValidatorRule::from_json(&json!({
            "length_equal": ["body.items", 3],
            "length_equals": ["body.items", 3]
        }))
        .unwrap_err();
        assert!(matches!(err, ValidationError::MultipleComparators(_)));
    }

    #[test]
    fn rejects_empty_and_unknown() {
        assert_eq!(
            ValidatorRule::from_json(&json!({})).unwrap_err(),
            ValidationError::MissingComparator
        );
        assert_eq!(
            ValidatorRule::from_json(&json!({"approx": ["a", 1]})).unwrap_err(),
            ValidationError::UnknownComparator("approx".into())
        );
        assert_eq!(
            ValidatorRule::from_json(&json!({"check": "status_code", "expect": 200})).unwrap_err(),
            ValidationError::MissingComparator
        );
        assert_eq!(
            ValidatorRule::from_json(&json!({"check": "status_code", "comparator": null})).unwrap_err(),
            ValidationError::MissingComparator
        );
    }

    #[test]
    fn rejects_malformed_pair() {
        for bad in [
            json!({"eq": "status_code"}),
            json!({"eq": ["status_code"]}),
            json!({"eq": [200, 200]}),
            json!({"eq": ["", 200]}),
        ] {
            assert!(
                matches!(ValidatorRule::from_json(&bad), Err(ValidationError::MalformedValidator { .. })),
                "accepted {bad}"
            );
        }
    }

    #[test]
    fn accepts_compat_form() {
        let rule = ValidatorRule::from_json(&json!({
            "check": "body.code",
            "comparator": "equals",
            "expect": 0
        }))
        .unwrap();
        assert_eq!(rule.comparator(), Comparator::Equal);
        assert_eq!(Value::from(rule), json!({"eq": ["body.code", 0]}));
    }

    #[test]
    fn deserialize_error_surfaces_through_serde() {
        let result: Result<Vec<ValidatorRule>, _> =
            serde_json::from_value(json!([{"eq": ["a", 1], "ne": ["b", 2]}]));
        assert!(result.is_err());
    }

    #[test]
    fn every_canonical_key_resolves_to_itself() {
        for comparator in Comparator::ALL {
            assert_eq!(Comparator::from_key(comparator.key()), Some(comparator));
        }
    }
}
