//! Intersection of schemas: a value must satisfy every member.
//!
//! Object members are merged field-wise for generation and completion, since
//! generating against one member alone would ignore the keys the others
//! contribute.

use serde_json::Value;

use crate::outcome::Outcome;
use crate::pattern::{NegativeConfig, ObjectPattern, Pattern, PatternStream};
use crate::resolver::Resolver;
use crate::result::{MatchFailure, MatchResult};
use crate::row::Row;
use crate::substitution::Substitution;

#[derive(Debug, Clone, PartialEq)]
pub struct AllOfPattern {
    pub patterns: Vec<Pattern>,
}

impl AllOfPattern {
    pub fn new(patterns: Vec<Pattern>) -> Self {
        AllOfPattern { patterns }
    }

    pub fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        // The degenerate empty intersection admits exactly the empty string.
        if self.patterns.is_empty() {
            return if value == &Value::String(String::new()) {
                MatchResult::Success
            } else {
                MatchResult::Failure(resolver.mismatch("the empty string", value))
            };
        }
        let results = self
            .patterns
            .iter()
            .map(|member| member.matches(value, resolver));
        MatchResult::combine(results.collect::<Vec<_>>())
    }

    pub fn generate(&self, resolver: &Resolver) -> Outcome<Value> {
        if self.patterns.is_empty() {
            return Outcome::Value(Value::String(String::new()));
        }
        if let Some(merged) = self.json_object_pattern(resolver) {
            return merged.generate(resolver);
        }
        let mut candidate = None;
        let mut failures = Vec::new();
        for member in &self.patterns {
            match member.generate(resolver) {
                Outcome::Value(v) => {
                    if self.matches(&v, resolver).is_success() {
                        return Outcome::Value(v);
                    }
                    candidate.get_or_insert(v);
                }
                Outcome::Failure(f) => failures.push(f),
                Outcome::Exception(e) => return Outcome::Exception(e),
            }
        }
        match candidate {
            Some(v) => {
                log::warn!(
                    "allOf generation fell back to a value satisfying only one member"
                );
                Outcome::Value(v)
            }
            None => Outcome::Failure(MatchFailure::from_failures(failures)),
        }
    }

    /// One intersection per variant of the leading member, so every variant
    /// still carries the other members' constraints. Boundary exacts another
    /// member rejects are not variants of the intersection and are dropped.
    pub fn new_based_on(&self, row: &Row, resolver: &Resolver) -> PatternStream {
        if let Some(merged) = self.json_object_pattern(resolver) {
            return merged.new_based_on(row, resolver);
        }
        let Some((first, rest)) = self.patterns.split_first() else {
            return Box::new(std::iter::once(Outcome::Value(Pattern::AllOf(
                self.clone(),
            ))));
        };
        let rest = rest.to_vec();
        let resolver_for_filter = resolver.clone();
        Box::new(
            first
                .new_based_on(row, resolver)
                .filter_map(move |variant| match variant {
                    Outcome::Value(v) => {
                        if let Pattern::Exact(e) = &v {
                            if rest
                                .iter()
                                .any(|m| !m.matches(&e.value, &resolver_for_filter).is_success())
                            {
                                return None;
                            }
                        }
                        let mut members = Vec::with_capacity(rest.len() + 1);
                        members.push(v);
                        members.extend(rest.iter().cloned());
                        Some(Outcome::Value(Pattern::AllOf(AllOfPattern::new(members))))
                    }
                    other => Some(other),
                }),
        )
    }

    /// Violating any one member violates the conjunction.
    pub fn negative_based_on(
        &self,
        row: &Row,
        resolver: &Resolver,
        config: &NegativeConfig,
    ) -> PatternStream {
        let members = self.patterns.clone();
        let row = row.clone();
        let resolver = resolver.clone();
        let config = *config;
        Box::new(members.into_iter().flat_map(move |member| {
            member
                .negative_based_on(&row, &resolver, &config)
                .collect::<Vec<_>>()
        }))
    }

    /// Every member must individually accept everything `other` accepts.
    pub fn encompasses(
        &self,
        other: &Pattern,
        this_resolver: &Resolver,
        other_resolver: &Resolver,
    ) -> MatchResult {
        let results = self
            .patterns
            .iter()
            .enumerate()
            .map(|(i, member)| {
                member
                    .encompasses(other, this_resolver, other_resolver)
                    .prefixed(format!("[{i}]"))
            });
        MatchResult::combine(results.collect::<Vec<_>>())
    }

    pub fn fix_value(&self, value: &Value, resolver: &Resolver) -> Value {
        if let Some(merged) = self.json_object_pattern(resolver) {
            return merged.fix_value(value, resolver);
        }
        self.generate(resolver)
            .value()
            .unwrap_or_else(|| value.clone())
    }

    pub fn fill_in_the_blanks(
        &self,
        value: &Value,
        resolver: &Resolver,
        remove_extra_keys: bool,
    ) -> Outcome<Value> {
        if let Some(merged) = self.json_object_pattern(resolver) {
            return merged.fill_in_the_blanks(value, resolver, remove_extra_keys);
        }
        match self.patterns.first() {
            Some(first) => first.fill_in_the_blanks(value, resolver, remove_extra_keys),
            None => Outcome::from_match(self.matches(value, resolver), value.clone()),
        }
    }

    /// Placeholders are resolved by threading the value through each member
    /// in turn, so every member gets a chance to coerce its own fields.
    pub fn resolve_substitutions(
        &self,
        substitution: &Substitution,
        value: &Value,
        resolver: &Resolver,
        key: Option<&str>,
    ) -> Outcome<Value> {
        let mut current = value.clone();
        for member in &self.patterns {
            match member.resolve_substitutions(substitution, &current, resolver, key) {
                Outcome::Value(v) => current = v,
                other => return other,
            }
        }
        Outcome::Value(current)
    }

    /// The field-wise merge of every member's object shape; `None` when no
    /// member exposes one.
    pub fn json_object_pattern(&self, resolver: &Resolver) -> Option<ObjectPattern> {
        let mut merged: Option<ObjectPattern> = None;
        for member in &self.patterns {
            if let Some(obj) = member.json_object_pattern(resolver) {
                merged = Some(match merged {
                    Some(acc) => acc.merged_with(&obj),
                    None => obj,
                });
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{NumberPattern, StringPattern};
    use indexmap::IndexMap;
    use serde_json::json;

    fn object_of(fields: &[(&str, Pattern)]) -> Pattern {
        let raw: IndexMap<String, Pattern> = fields
            .iter()
            .map(|(k, p)| (k.to_string(), p.clone()))
            .collect();
        Pattern::Object(ObjectPattern::from_parts(raw).unwrap().ignoring_unexpected_keys())
    }

    #[test]
    fn all_members_must_match() {
        let r = Resolver::new();
        let p = AllOfPattern::new(vec![
            object_of(&[("id", Pattern::Number(NumberPattern::integer()))]),
            object_of(&[("name", Pattern::String(StringPattern::default()))]),
        ]);
        assert!(p.matches(&json!({"id": 1, "name": "a"}), &r).is_success());
        assert!(!p.matches(&json!({"id": 1}), &r).is_success());
        assert!(!p.matches(&json!({"name": "a"}), &r).is_success());
    }

    #[test]
    fn generation_merges_object_members() {
        let r = Resolver::new().with_seed(7);
        let p = AllOfPattern::new(vec![
            object_of(&[("id", Pattern::Number(NumberPattern::integer()))]),
            object_of(&[("name", Pattern::String(StringPattern::default()))]),
        ]);
        let v = p.generate(&r).value().unwrap();
        assert!(p.matches(&v, &r).is_success(), "{v}");
    }

    #[test]
    fn empty_intersection_admits_only_the_empty_string() {
        let r = Resolver::new();
        let p = AllOfPattern::new(Vec::new());
        assert_eq!(p.generate(&r).value().unwrap(), json!(""));
        assert!(p.matches(&json!(""), &r).is_success());
        assert!(!p.matches(&json!("x"), &r).is_success());
    }

    #[test]
    fn scalar_members_generate_through_the_cascade() {
        let r = Resolver::new().with_seed(1);
        let p = AllOfPattern::new(vec![Pattern::Number(
            NumberPattern::new(Some(5.0), Some(10.0), true).unwrap(),
        )]);
        let v = p.generate(&r).value().unwrap();
        assert!(p.matches(&v, &r).is_success(), "{v}");
    }

    #[test]
    fn positive_variants_keep_every_member_constraint() {
        let r = Resolver::new().with_seed(3);
        let p = AllOfPattern::new(vec![
            Pattern::Number(NumberPattern::new(Some(0.0), Some(100.0), true).unwrap()),
            Pattern::Number(NumberPattern::new(Some(50.0), Some(60.0), true).unwrap()),
        ]);
        let whole = Pattern::AllOf(p.clone());
        let mut seen = 0;
        for variant in p.new_based_on(&Row::new(), &r) {
            let variant = variant.value().unwrap();
            if let Some(v) = variant.generate(&r).value() {
                assert!(whole.matches(&v, &r).is_success(), "{v}");
                seen += 1;
            }
        }
        assert!(seen > 0);
    }

    #[test]
    fn encompasses_requires_every_member() {
        let r = Resolver::new();
        let p = AllOfPattern::new(vec![
            Pattern::Number(NumberPattern::float()),
            Pattern::Number(NumberPattern::new(Some(0.0), None, false).unwrap()),
        ]);
        let narrow = Pattern::Number(NumberPattern::new(Some(5.0), None, false).unwrap());
        let wide = Pattern::Number(NumberPattern::float());
        assert!(p.encompasses(&narrow, &r, &r).is_success());
        assert!(!p.encompasses(&wide, &r, &r).is_success());
    }
}
