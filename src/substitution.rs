//! `$(...)` placeholder resolution for templated values.
//!
//! A [`Substitution`] carries the bindings available while resolving a
//! templated value (stub responses echoing request data, for instance).
//! Expressions are `$(name)` for a direct binding or `$(set.selector)` for a
//! keyed lookup into a named table.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::outcome::Outcome;
use crate::pattern::Pattern;
use crate::result::MatchFailure;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$\((.+)\)$").expect("placeholder regex"));

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Substitution {
    bindings: IndexMap<String, Value>,
    tables: IndexMap<String, IndexMap<String, Value>>,
}

impl Substitution {
    pub fn new() -> Self {
        Substitution::default()
    }

    pub fn bind(mut self, name: impl Into<String>, value: Value) -> Self {
        self.bindings.insert(name.into(), value);
        self
    }

    pub fn bind_table(
        mut self,
        name: impl Into<String>,
        table: IndexMap<String, Value>,
    ) -> Self {
        self.tables.insert(name.into(), table);
        self
    }

    /// The inner expression of a `$(...)` placeholder, if `s` is one.
    pub fn placeholder(s: &str) -> Option<&str> {
        PLACEHOLDER
            .captures(s)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }

    /// Resolve an expression. `key` is the field the value sits under, used
    /// in failure messages.
    pub fn resolve(&self, expr: &str, key: Option<&str>) -> Outcome<Value> {
        if let Some(v) = self.bindings.get(expr) {
            return Outcome::Value(v.clone());
        }
        if let Some((table, selector)) = expr.split_once('.') {
            if let Some(rows) = self.tables.get(table) {
                if let Some(v) = rows.get(selector) {
                    return Outcome::Value(v.clone());
                }
            }
        }
        let at = key.map(|k| format!(" at {k:?}")).unwrap_or_default();
        Outcome::Failure(MatchFailure::new(format!(
            "no binding for substitution $({expr}){at}"
        )))
    }

    /// Substituted values often arrive as strings even where the schema wants
    /// a number or boolean; coerce when the text parses cleanly.
    pub fn coerce(&self, value: &Value, pattern: &Pattern) -> Value {
        let Value::String(s) = value else {
            return value.clone();
        };
        match pattern {
            Pattern::Number(_) => serde_json::from_str::<serde_json::Number>(s)
                .map(Value::Number)
                .unwrap_or_else(|_| value.clone()),
            Pattern::Boolean => match s.as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => value.clone(),
            },
            Pattern::Null if s == "null" => Value::Null,
            _ => value.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::NumberPattern;
    use serde_json::json;

    #[test]
    fn placeholder_detection() {
        assert_eq!(Substitution::placeholder("$(id)"), Some("id"));
        assert_eq!(Substitution::placeholder("$(a.b)"), Some("a.b"));
        assert_eq!(Substitution::placeholder("plain"), None);
        assert_eq!(Substitution::placeholder("$()"), None);
    }

    #[test]
    fn bindings_and_tables_resolve() {
        let sub = Substitution::new().bind("id", json!(7)).bind_table("names", {
            let mut t = IndexMap::new();
            t.insert("first".to_string(), json!("Jo"));
            t
        });
        assert_eq!(sub.resolve("id", None), Outcome::Value(json!(7)));
        assert_eq!(sub.resolve("names.first", None), Outcome::Value(json!("Jo")));
        assert!(!sub.resolve("missing", Some("field")).is_value());
    }

    #[test]
    fn string_coerces_to_number_when_pattern_asks() {
        let sub = Substitution::new();
        let n = sub.coerce(&json!("42"), &Pattern::Number(NumberPattern::integer()));
        assert_eq!(n, json!(42));
        let keep = sub.coerce(&json!("forty-two"), &Pattern::Number(NumberPattern::integer()));
        assert_eq!(keep, json!("forty-two"));
    }
}
