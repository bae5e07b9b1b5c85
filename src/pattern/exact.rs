//! A pattern matching exactly one JSON value.

use ordered_float::OrderedFloat;
use serde_json::Value;

use crate::outcome::Outcome;
use crate::pattern::{type_of_value, NegativeConfig, Pattern, PatternStream};
use crate::resolver::Resolver;
use crate::result::{display_value, FailureReason, MatchFailure, MatchResult};

#[derive(Debug, Clone, PartialEq)]
pub struct ExactPattern {
    pub value: Value,
    /// Set when this exact value is the tag of a discriminated union member;
    /// mismatches then carry the discriminator reason so union matching can
    /// rank this alternative out cleanly.
    pub is_discriminator: bool,
}

impl ExactPattern {
    pub fn new(value: Value) -> Self {
        ExactPattern {
            value,
            is_discriminator: false,
        }
    }

    pub fn discriminator(value: Value) -> Self {
        ExactPattern {
            value,
            is_discriminator: true,
        }
    }

    pub fn matches(&self, value: &Value, _resolver: &Resolver) -> MatchResult {
        if values_equal(&self.value, value) {
            return MatchResult::Success;
        }
        let failure = MatchFailure::new(format!(
            "expected {}, got {}",
            display_value(&self.value),
            display_value(value)
        ));
        if self.is_discriminator {
            MatchResult::Failure(failure.with_reason(FailureReason::DiscriminatorMismatch))
        } else {
            MatchResult::Failure(failure)
        }
    }

    pub fn negative_based_on(&self, config: &NegativeConfig) -> PatternStream {
        let mut variants = Vec::new();
        if !self.value.is_null() {
            variants.push(Outcome::Value(Pattern::Null));
        }
        if config.with_data_type_negatives {
            variants.push(Outcome::Value(Pattern::Exact(ExactPattern::new(
                mutated(&self.value),
            ))));
        }
        Box::new(variants.into_iter())
    }
}

/// Numbers compare numerically so `1` and `1.0` are the same exact value.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => OrderedFloat(x) == OrderedFloat(y),
            _ => x == y,
        },
        _ => a == b,
    }
}

/// A same-type value guaranteed to differ from the original.
pub(crate) fn mutated(v: &Value) -> Value {
    match v {
        Value::Null => Value::String("not null".into()),
        Value::Bool(b) => Value::Bool(!b),
        Value::Number(n) => Value::from(n.as_f64().unwrap_or(0.0) + 1.0),
        Value::String(s) => Value::String(format!("{s}_x")),
        Value::Array(_) => Value::Array(vec![Value::String(type_of_value(v).into())]),
        Value::Object(_) => Value::Object(serde_json::Map::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn equality_is_numeric_for_numbers() {
        let r = Resolver::new();
        let p = ExactPattern::new(json!(1));
        assert!(p.matches(&json!(1.0), &r).is_success());
        assert!(!p.matches(&json!(2), &r).is_success());
    }

    #[test]
    fn discriminator_mismatch_is_tagged() {
        let r = Resolver::new();
        let p = ExactPattern::discriminator(json!("card"));
        match p.matches(&json!("wallet"), &r) {
            MatchResult::Failure(f) => {
                assert!(f.has_reason(FailureReason::DiscriminatorMismatch))
            }
            MatchResult::Success => panic!("expected failure"),
        }
    }

    #[test]
    fn negatives_never_match_the_original() {
        let r = Resolver::new();
        let p = ExactPattern::new(json!("on"));
        for variant in p.negative_based_on(&NegativeConfig::default()) {
            let pattern = variant.value().unwrap();
            if let Outcome::Value(v) = pattern.generate(&r) {
                assert!(!p.matches(&v, &r).is_success(), "{v} unexpectedly matched");
            }
        }
    }
}
