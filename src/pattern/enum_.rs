//! Closed value sets.
//!
//! An enum is a union of exact values with construction-time rules: the
//! non-null values must share one JSON type, and null membership must agree
//! with the declared nullability in both directions.

use serde_json::Value;

use crate::error::PatternError;
use crate::outcome::Outcome;
use crate::pattern::exact::{mutated, ExactPattern};
use crate::pattern::{type_of_value, NegativeConfig, Pattern, PatternStream};
use crate::resolver::Resolver;
use crate::result::{display_value, MatchFailure, MatchResult};

#[derive(Debug, Clone, PartialEq)]
pub struct EnumPattern {
    pub inner: crate::pattern::AnyOfPattern,
    pub nullable: bool,
    /// Allows mixed-type value sets; off by default.
    pub multi_type: bool,
}

impl EnumPattern {
    pub fn new(values: Vec<Value>, nullable: bool) -> Result<Self, PatternError> {
        Self::build(values, nullable, false)
    }

    pub fn multi_type(values: Vec<Value>, nullable: bool) -> Result<Self, PatternError> {
        Self::build(values, nullable, true)
    }

    fn build(values: Vec<Value>, nullable: bool, multi_type: bool) -> Result<Self, PatternError> {
        let mut non_null = values.iter().filter(|v| !v.is_null());
        if let (false, Some(first)) = (multi_type, non_null.next()) {
            for v in non_null {
                if type_of_value(v) != type_of_value(first) {
                    return Err(PatternError::EnumHeterogeneous {
                        first: type_of_value(first).to_string(),
                        second: type_of_value(v).to_string(),
                    });
                }
            }
        }
        let has_null = values.iter().any(Value::is_null);
        if nullable && !has_null {
            return Err(PatternError::EnumMissingNull);
        }
        if has_null && !nullable {
            return Err(PatternError::EnumUnexpectedNull);
        }
        let members = values
            .into_iter()
            .map(|v| Pattern::Exact(ExactPattern::new(v)))
            .collect();
        Ok(EnumPattern {
            inner: crate::pattern::AnyOfPattern::new(members),
            nullable,
            multi_type,
        })
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.inner.patterns.iter().filter_map(|p| match p {
            Pattern::Exact(e) => Some(&e.value),
            _ => None,
        })
    }

    fn allowed(&self) -> String {
        self.values()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        if self.inner.matches(value, resolver).is_success() {
            return MatchResult::Success;
        }
        MatchResult::Failure(MatchFailure::new(format!(
            "expected one of {}, got {}",
            self.allowed(),
            display_value(value)
        )))
    }

    pub fn generate(&self, resolver: &Resolver) -> Outcome<Value> {
        let candidates: Vec<&Value> = {
            let non_null: Vec<&Value> = self.values().filter(|v| !v.is_null()).collect();
            if non_null.is_empty() {
                self.values().collect()
            } else {
                non_null
            }
        };
        if candidates.is_empty() {
            return Outcome::Failure(MatchFailure::new("enum has no values to generate"));
        }
        let index = (resolver.seed as usize) % candidates.len();
        Outcome::Value(candidates[index].clone())
    }

    /// One positive variant per enum value.
    pub fn new_based_on(&self) -> PatternStream {
        let members = self.inner.patterns.clone();
        Box::new(members.into_iter().map(Outcome::Value))
    }

    pub fn negative_based_on(
        &self,
        _resolver: &Resolver,
        config: &NegativeConfig,
    ) -> PatternStream {
        let mut variants = Vec::new();
        if !self.nullable {
            variants.push(Outcome::Value(Pattern::Null));
        }
        // A same-type value outside the set; remutate until it leaves the set
        // in the degenerate case where the mutation collides with a member.
        if let Some(first) = self.values().find(|v| !v.is_null()) {
            let mut candidate = mutated(first);
            for _ in 0..self.inner.patterns.len() {
                if !self.values().any(|v| v == &candidate) {
                    break;
                }
                candidate = mutated(&candidate);
            }
            if !self.values().any(|v| v == &candidate) {
                variants.push(Outcome::Value(Pattern::Exact(ExactPattern::new(candidate))));
            }
            if config.with_data_type_negatives && matches!(first, Value::String(_)) {
                variants.push(Outcome::Value(Pattern::Boolean));
            }
        }
        Box::new(variants.into_iter())
    }

    /// Exact values and whole unions were peeled off by the dispatcher, so a
    /// remaining concrete `other` is necessarily wider than a fixed set.
    pub fn encompasses_concrete(&self, other: &Pattern) -> MatchResult {
        MatchResult::Failure(MatchFailure::new(format!(
            "an enum of fixed values cannot accept the wider {}",
            other.type_name()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn construction_enforces_homogeneity_and_null_agreement() {
        assert!(EnumPattern::new(vec![json!("a"), json!("b")], false).is_ok());
        assert!(EnumPattern::new(vec![json!("a"), json!(1)], false).is_err());
        assert!(EnumPattern::multi_type(vec![json!("a"), json!(1)], false).is_ok());
        assert!(EnumPattern::new(vec![json!("a")], true).is_err());
        assert!(EnumPattern::new(vec![json!("a"), json!(null)], false).is_err());
        assert!(EnumPattern::new(vec![json!("a"), json!(null)], true).is_ok());
    }

    #[test]
    fn membership_decides_matching() {
        let r = Resolver::new();
        let p = EnumPattern::new(vec![json!("on"), json!("off")], false).unwrap();
        assert!(p.matches(&json!("on"), &r).is_success());
        assert!(!p.matches(&json!("auto"), &r).is_success());
        assert!(!p.matches(&json!(null), &r).is_success());
    }

    #[test]
    fn nullable_enum_accepts_null() {
        let r = Resolver::new();
        let p = EnumPattern::new(vec![json!("on"), json!(null)], true).unwrap();
        assert!(p.matches(&json!(null), &r).is_success());
    }

    #[test]
    fn generation_picks_a_member_by_seed() {
        let p = EnumPattern::new(vec![json!("on"), json!("off")], false).unwrap();
        for seed in 0..4 {
            let r = Resolver::new().with_seed(seed);
            let v = p.generate(&r).value().unwrap();
            assert!(p.matches(&v, &r).is_success(), "{v}");
        }
    }

    #[test]
    fn positive_variants_cover_every_value() {
        let p = EnumPattern::new(vec![json!("on"), json!("off")], false).unwrap();
        let variants: Vec<Pattern> = p.new_based_on().filter_map(Outcome::value).collect();
        assert_eq!(variants.len(), 2);
    }

    #[test]
    fn negatives_stay_outside_the_set() {
        let r = Resolver::new();
        let p = EnumPattern::new(vec![json!("on"), json!("off")], false).unwrap();
        for variant in p.negative_based_on(&r, &NegativeConfig::default()) {
            let pattern = variant.value().unwrap();
            if let Outcome::Value(v) = pattern.generate(&r) {
                assert!(!p.matches(&v, &r).is_success(), "{v} unexpectedly matched");
            }
        }
    }
}
