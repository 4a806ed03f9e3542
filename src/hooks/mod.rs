//! # Setup / teardown hooks
//!
//! Hooks run on the execution backend before (setup) or after (teardown) the
//! request. A hook is either a script reference understood by the backend
//! (`${refresh_token()}`, a custom function id, ...) or an SQL query run
//! against a project database whose result can be bound to a variable.
//! Hooks are declared here and never executed locally.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Database connection a SQL hook runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseRef {
    /// Database configuration id.
    Id(i64),
    /// Legacy configuration key.
    Key(String),
}

/// A query executed around the request, optionally bound to `var_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSqlHook", into = "RawSqlHook")]
pub struct SqlHook {
    database: DatabaseRef,
    sql: String,
    var_name: Option<String>,
}

impl SqlHook {
    pub fn new(
        database: DatabaseRef,
        sql: impl Into<String>,
        var_name: Option<String>,
    ) -> Result<Self, ValidationError> {
        let sql = sql.into();
        if sql.trim().is_empty() {
            return Err(ValidationError::InvalidHook("SQL hook has an empty query".into()));
        }
        if let DatabaseRef::Key(key) = &database {
            if key.trim().is_empty() {
                return Err(ValidationError::InvalidHook("SQL hook has an empty db_key".into()));
            }
        }
        let var_name = var_name.filter(|name| !name.trim().is_empty());
        Ok(Self {
            database,
            sql,
            var_name,
        })
    }

    pub fn database(&self) -> &DatabaseRef {
        &self.database
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn var_name(&self) -> Option<&str> {
        self.var_name.as_deref()
    }
}

#[derive(Serialize, Deserialize)]
struct RawSqlHook {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    db_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    db_key: Option<String>,
    sql: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    var_name: Option<String>,
}

impl TryFrom<RawSqlHook> for SqlHook {
    type Error = ValidationError;

    fn try_from(raw: RawSqlHook) -> Result<Self, Self::Error> {
        if raw.kind != "sql" {
            return Err(ValidationError::InvalidHook(format!(
                "unsupported hook type `{}`",
                raw.kind
            )));
        }
        let database = match (raw.db_id, raw.db_key) {
            (Some(id), None) => DatabaseRef::Id(id),
            (None, Some(key)) => DatabaseRef::Key(key),
            (Some(_), Some(_)) => {
                return Err(ValidationError::InvalidHook(
                    "SQL hook sets both db_id and db_key".into(),
                ));
            }
            (None, None) => {
                return Err(ValidationError::InvalidHook(
                    "SQL hook needs a db_id or db_key".into(),
                ));
            }
        };
        SqlHook::new(database, raw.sql, raw.var_name)
    }
}

impl From<SqlHook> for RawSqlHook {
    fn from(hook: SqlHook) -> Self {
        let (db_id, db_key) = match hook.database {
            DatabaseRef::Id(id) => (Some(id), None),
            DatabaseRef::Key(key) => (None, Some(key)),
        };
        RawSqlHook {
            kind: "sql".into(),
            db_id,
            db_key,
            sql: hook.sql,
            var_name: hook.var_name,
        }
    }
}

/// A setup or teardown action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Hook {
    Script(String),
    Sql(SqlHook),
}

impl Hook {
    pub fn script(reference: impl Into<String>) -> Self {
        Hook::Script(reference.into())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Hook::Script(reference) if reference.trim().is_empty() => Err(
                ValidationError::InvalidHook("script hook reference is empty".into()),
            ),
            _ => Ok(()),
        }
    }
}

impl From<SqlHook> for Hook {
    fn from(hook: SqlHook) -> Self {
        Hook::Sql(hook)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_script_and_sql_hooks() {
        let hooks: Vec<Hook> = serde_json::from_value(json!([
            "${setup_token()}",
            {"type": "sql", "db_id": 3, "sql": "SELECT id FROM users LIMIT 1", "var_name": "uid"}
        ]))
        .unwrap();

        assert_eq!(hooks[0], Hook::script("${setup_token()}"));
        let Hook::Sql(sql) = &hooks[1] else {
            panic!("expected SQL hook");
        };
        assert_eq!(sql.database(), &DatabaseRef::Id(3));
        assert_eq!(sql.var_name(), Some("uid"));
    }

    #[test]
    fn sql_hook_requires_exactly_one_database() {
        let both = json!({"type": "sql", "db_id": 1, "db_key": "main", "sql": "SELECT 1"});
        let neither = json!({"type": "sql", "sql": "SELECT 1"});
        assert!(serde_json::from_value::<SqlHook>(both).is_err());
        assert!(serde_json::from_value::<SqlHook>(neither).is_err());
    }

    #[test]
    fn sql_hook_rejects_empty_query() {
        assert!(SqlHook::new(DatabaseRef::Key("main".into()), "  ", None).is_err());
    }

    #[test]
    fn serializes_legacy_key_without_db_id() {
        let hook = SqlHook::new(DatabaseRef::Key("main".into()), "SELECT 1", None).unwrap();
        assert_eq!(
            serde_json::to_value(Hook::from(hook)).unwrap(),
            json!({"type": "sql", "db_key": "main", "sql": "SELECT 1"})
        );
    }

    #[test]
    fn empty_script_fails_validation() {
        assert!(Hook::script("").validate().is_err());
        assert!(Hook::script("${noop()}").validate().is_ok());
    }
}
