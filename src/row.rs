//! Example bindings that steer positive-test generation.
//!
//! A `Row` binds field names to example cells taken from an example
//! table: plain literals, `$name` variable references, `name.selector`
//! references into a named value set, and `@path` file contents. Generation
//! code steps a row down into nested objects so deep fields can be pinned by
//! dotted example data.

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::EngineError;
use crate::outcome::Outcome;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    entries: IndexMap<String, String>,
    variables: IndexMap<String, Value>,
    /// Named value sets for `name.selector` references.
    value_sets: IndexMap<String, IndexMap<String, Value>>,
}

impl Row {
    pub fn new() -> Self {
        Row::default()
    }

    pub fn with_entry(mut self, field: impl Into<String>, raw: impl Into<String>) -> Self {
        self.entries.insert(field.into(), raw.into());
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    pub fn with_value_set(
        mut self,
        name: impl Into<String>,
        set: IndexMap<String, Value>,
    ) -> Self {
        self.value_sets.insert(name.into(), set);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.entries.contains_key(field)
    }

    /// Resolve the example bound to `field`, dereferencing variables, value
    /// sets, and files. `None` when the row has no entry for the field.
    pub fn lookup(&self, field: &str) -> Option<Outcome<Value>> {
        let raw = self.entries.get(field)?;
        Some(self.resolve_raw(raw))
    }

    fn resolve_raw(&self, raw: &str) -> Outcome<Value> {
        if let Some(var) = raw.strip_prefix('$') {
            return match self.variables.get(var) {
                Some(v) => Outcome::Value(v.clone()),
                None => Outcome::Exception(EngineError::RowLookup(format!(
                    "variable ${var} is not defined"
                ))),
            };
        }
        if let Some(path) = raw.strip_prefix('@') {
            return match std::fs::read_to_string(path) {
                Ok(text) => Outcome::Value(parse_literal(text.trim_end())),
                Err(e) => Outcome::Exception(EngineError::RowLookup(format!(
                    "cannot read example file {path}: {e}"
                ))),
            };
        }
        if let Some((set, selector)) = split_reference(raw) {
            if let Some(values) = self.value_sets.get(set) {
                return match values.get(selector) {
                    Some(v) => Outcome::Value(v.clone()),
                    None => Outcome::Exception(EngineError::RowLookup(format!(
                        "no value {selector:?} in set {set:?}"
                    ))),
                };
            }
        }
        Outcome::Value(parse_literal(raw))
    }

    /// Narrow this row to the object bound under `field`, so nested schema
    /// traversal can keep consuming the same example data. Fields whose
    /// example is not a JSON object step down to an empty row.
    pub fn step_down_into(&self, field: &str) -> Row {
        let mut nested = Row {
            entries: IndexMap::new(),
            variables: self.variables.clone(),
            value_sets: self.value_sets.clone(),
        };
        if let Some(Outcome::Value(Value::Object(map))) = self.lookup(field) {
            for (k, v) in map {
                let raw = match &v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                nested.entries.insert(k, raw);
            }
        }
        nested
    }
}

/// `name.selector` → `(name, selector)`, only when it is not a number-ish
/// literal (so `3.14` stays a literal).
fn split_reference(raw: &str) -> Option<(&str, &str)> {
    let (head, tail) = raw.split_once('.')?;
    if head.is_empty() || tail.is_empty() {
        return None;
    }
    if head.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some((head, tail))
}

/// Parse an example cell: valid JSON stays JSON, anything else is a string.
fn parse_literal(raw: &str) -> Value {
    serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn literals_parse_as_json_or_string() {
        let row = Row::new()
            .with_entry("age", "30")
            .with_entry("name", "Jill")
            .with_entry("flag", "true");
        assert_eq!(row.lookup("age"), Some(Outcome::Value(json!(30))));
        assert_eq!(row.lookup("name"), Some(Outcome::Value(json!("Jill"))));
        assert_eq!(row.lookup("flag"), Some(Outcome::Value(json!(true))));
        assert_eq!(row.lookup("absent"), None);
    }

    #[test]
    fn variables_dereference() {
        let row = Row::new()
            .with_entry("token", "$auth")
            .with_variable("auth", json!("abc123"));
        assert_eq!(row.lookup("token"), Some(Outcome::Value(json!("abc123"))));
    }

    #[test]
    fn missing_variable_is_an_exception() {
        let row = Row::new().with_entry("token", "$nope");
        match row.lookup("token") {
            Some(Outcome::Exception(EngineError::RowLookup(msg))) => {
                assert!(msg.contains("$nope"))
            }
            other => panic!("expected exception, got {other:?}"),
        }
    }

    #[test]
    fn value_set_references_resolve_but_decimals_stay_literal() {
        let mut set = IndexMap::new();
        set.insert("admin".to_string(), json!({"role": "admin"}));
        let row = Row::new()
            .with_entry("user", "users.admin")
            .with_entry("pi", "3.14")
            .with_value_set("users", set);
        assert_eq!(
            row.lookup("user"),
            Some(Outcome::Value(json!({"role": "admin"})))
        );
        assert_eq!(row.lookup("pi"), Some(Outcome::Value(json!(3.14))));
    }

    #[test]
    fn step_down_exposes_nested_fields() {
        let row = Row::new().with_entry("address", r#"{"street": "High St", "number": 12}"#);
        let nested = row.step_down_into("address");
        assert_eq!(nested.lookup("street"), Some(Outcome::Value(json!("High St"))));
        assert_eq!(nested.lookup("number"), Some(Outcome::Value(json!(12))));
    }
}
