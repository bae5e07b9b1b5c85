//! JSON object schemas: named fields with optionality, unexpected-key
//! policy, and property-count bounds.
//!
//! Field maps are built through [`ObjectPattern::from_parts`], which consumes
//! the textual conventions: a trailing `?` on a key marks it optional, and a
//! `...` key switches the pattern to ignoring unexpected keys.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use rand::Rng;
use serde_json::{Map, Value};

use crate::error::PatternError;
use crate::outcome::Outcome;
use crate::pattern::exact::ExactPattern;
use crate::pattern::{NegativeConfig, Pattern, PatternStream};
use crate::resolver::Resolver;
use crate::result::{FailureReason, MatchFailure, MatchResult};
use crate::row::Row;
use crate::substitution::Substitution;

/// Policy for keys present in the value but absent from the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnexpectedKeys {
    /// Extra keys are a mismatch.
    #[default]
    Validate,
    /// Extra keys pass through untouched.
    Ignore,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectPattern {
    /// Field name (no `?` sentinel) to field schema, in declaration order.
    pub fields: IndexMap<String, Pattern>,
    pub optional: BTreeSet<String>,
    pub unexpected_keys: UnexpectedKeys,
    pub min_properties: Option<usize>,
    pub max_properties: Option<usize>,
}

impl ObjectPattern {
    /// Build from a raw field map, consuming the `key?` and `...` sentinels.
    pub fn from_parts(raw: IndexMap<String, Pattern>) -> Result<Self, PatternError> {
        let mut fields = IndexMap::new();
        let mut optional = BTreeSet::new();
        let mut unexpected_keys = UnexpectedKeys::Validate;
        for (key, pattern) in raw {
            if key == "..." {
                unexpected_keys = UnexpectedKeys::Ignore;
                continue;
            }
            match key.strip_suffix('?') {
                Some(bare) => {
                    optional.insert(bare.to_string());
                    fields.insert(bare.to_string(), pattern);
                }
                None => {
                    fields.insert(key, pattern);
                }
            }
        }
        Ok(ObjectPattern {
            fields,
            optional,
            unexpected_keys,
            min_properties: None,
            max_properties: None,
        })
    }

    pub fn with_bounds(
        mut self,
        min_properties: Option<usize>,
        max_properties: Option<usize>,
    ) -> Result<Self, PatternError> {
        if let (Some(lo), Some(hi)) = (min_properties, max_properties) {
            if hi < lo {
                return Err(PatternError::PropertyBounds { min: lo, max: hi });
            }
        }
        let mandatory = self.fields.len() - self.optional.len();
        if let Some(hi) = max_properties {
            if mandatory > hi {
                return Err(PatternError::MandatoryExceedsMax { mandatory, max: hi });
            }
        }
        if let Some(lo) = min_properties {
            if self.unexpected_keys == UnexpectedKeys::Validate && self.fields.len() < lo {
                return Err(PatternError::NotEnoughKeys {
                    min: lo,
                    available: self.fields.len(),
                });
            }
        }
        self.min_properties = min_properties;
        self.max_properties = max_properties;
        Ok(self)
    }

    pub fn ignoring_unexpected_keys(mut self) -> Self {
        self.unexpected_keys = UnexpectedKeys::Ignore;
        self
    }

    fn is_mandatory(&self, key: &str, resolver: &Resolver) -> bool {
        !self.optional.contains(key) || resolver.all_patterns_mandatory
    }

    pub fn mandatory_keys(&self) -> impl Iterator<Item = &str> {
        self.fields
            .keys()
            .map(String::as_str)
            .filter(|k| !self.optional.contains(*k))
    }

    // ------------------------------ matches ------------------------------- //

    pub fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        let Value::Object(map) = value else {
            return MatchResult::Failure(resolver.mismatch("object", value));
        };
        let mut structural = Vec::new();
        if let Some(lo) = self.min_properties {
            if map.len() < lo {
                structural.push(MatchFailure::new(format!(
                    "object has {} properties, fewer than minProperties {lo}",
                    map.len()
                )));
            }
        }
        if let Some(hi) = self.max_properties {
            if map.len() > hi {
                structural.push(MatchFailure::new(format!(
                    "object has {} properties, more than maxProperties {hi}",
                    map.len()
                )));
            }
        }
        for key in self.fields.keys() {
            if self.is_mandatory(key, resolver) && !map.contains_key(key) {
                structural.push(
                    MatchFailure::new(resolver.messages().missing_key("key", key))
                        .with_reason(FailureReason::MissingKey)
                        .prefixed(key.clone()),
                );
            }
        }
        if self.unexpected_keys == UnexpectedKeys::Validate {
            for key in map.keys() {
                if !self.fields.contains_key(key) {
                    structural.push(
                        MatchFailure::new(resolver.messages().unexpected_key("key", key))
                            .with_reason(FailureReason::UnexpectedKey)
                            .prefixed(key.clone()),
                    );
                }
            }
        }
        let mut field_failures = Vec::new();
        for (key, pattern) in &self.fields {
            if let Some(v) = map.get(key) {
                if let MatchResult::Failure(f) = pattern.matches(v, resolver) {
                    field_failures.push(f.prefixed(key.clone()));
                }
            }
        }
        // Shape matched but a value inside failed: tag it so union matching
        // can single this alternative out as the intended one.
        if structural.is_empty() && !field_failures.is_empty() {
            return MatchResult::Failure(MatchFailure {
                breadcrumbs: Vec::new(),
                message: String::new(),
                causes: field_failures,
                reason: FailureReason::ObjectMatchOccurred,
            });
        }
        structural.extend(field_failures);
        MatchResult::from_failures(structural)
    }

    // ------------------------------ generate ------------------------------ //

    pub fn generate(&self, resolver: &Resolver) -> Outcome<Value> {
        let mut rng = resolver.rng();
        let mut out = Map::new();
        for (key, pattern) in &self.fields {
            if self.optional.contains(key) {
                continue;
            }
            match pattern.generate(resolver) {
                Outcome::Value(v) => {
                    out.insert(key.clone(), v);
                }
                Outcome::Failure(f) => return Outcome::Failure(f.prefixed(key.clone())),
                Outcome::Exception(e) => return Outcome::Exception(e),
            }
        }
        let max = self.max_properties.unwrap_or(usize::MAX);
        for (key, pattern) in &self.fields {
            if !self.optional.contains(key) || out.len() >= max {
                continue;
            }
            let below_min = out.len() < self.min_properties.unwrap_or(0);
            // Negative-mode generation keeps optional keys so a mutation in
            // one of them stays visible in the output.
            let force = resolver.all_patterns_mandatory || resolver.is_negative;
            if !below_min && !force && !rng.gen_bool(0.5) {
                continue;
            }
            match pattern.generate(resolver) {
                Outcome::Value(v) => {
                    out.insert(key.clone(), v);
                }
                // An optional field whose type cycles back is simply omitted.
                Outcome::Exception(e) if e.is_cycle() => continue,
                Outcome::Failure(f) => return Outcome::Failure(f.prefixed(key.clone())),
                Outcome::Exception(e) => return Outcome::Exception(e),
            }
        }
        Outcome::Value(Value::Object(out))
    }

    // --------------------------- test variants ----------------------------- //

    /// One base variant with every key, one field-alternate variant per extra
    /// per-field pattern, and a mandatory-keys-only variant when optional
    /// keys exist. Row entries pin fields to validated example values.
    pub fn new_based_on(&self, row: &Row, resolver: &Resolver) -> PatternStream {
        let this = self.clone();
        let row = row.clone();
        let resolver = resolver.clone();
        Box::new(std::iter::once(()).flat_map(move |_| {
            let mut out: Vec<Outcome<Pattern>> = Vec::new();
            let mut base: IndexMap<String, Pattern> = IndexMap::new();
            let mut alternates: Vec<(String, Pattern)> = Vec::new();
            let mut dropped: BTreeSet<String> = BTreeSet::new();
            for (key, pattern) in &this.fields {
                let variants = field_variants(key, pattern, &row, &resolver);
                let mut values = Vec::new();
                for v in variants {
                    match v {
                        Outcome::Value(p) => values.push(p),
                        other => out.push(other),
                    }
                }
                match values.split_first() {
                    Some((first, rest)) => {
                        base.insert(key.clone(), first.clone());
                        for alt in rest {
                            alternates.push((key.clone(), alt.clone()));
                        }
                    }
                    // A field whose type cycles has no variants; drop it.
                    None => {
                        dropped.insert(key.clone());
                    }
                }
            }
            let make = |fields: IndexMap<String, Pattern>, optional: BTreeSet<String>| {
                Pattern::Object(ObjectPattern {
                    fields,
                    optional,
                    unexpected_keys: this.unexpected_keys,
                    min_properties: this.min_properties,
                    max_properties: this.max_properties,
                })
            };
            let base_optional: BTreeSet<String> = this
                .optional
                .iter()
                .filter(|k| !dropped.contains(*k))
                .cloned()
                .collect();
            out.push(Outcome::Value(make(base.clone(), BTreeSet::new())));
            for (key, alt) in alternates {
                let mut fields = base.clone();
                fields.insert(key, alt);
                out.push(Outcome::Value(make(fields, BTreeSet::new())));
            }
            if !base_optional.is_empty() {
                let mandatory_only: IndexMap<String, Pattern> = base
                    .iter()
                    .filter(|(k, _)| !base_optional.contains(*k))
                    .map(|(k, p)| (k.clone(), p.clone()))
                    .collect();
                out.push(Outcome::Value(make(mandatory_only, BTreeSet::new())));
            }
            out
        }))
    }

    pub fn negative_based_on(
        &self,
        row: &Row,
        resolver: &Resolver,
        config: &NegativeConfig,
    ) -> PatternStream {
        let this = self.clone();
        let row = row.clone();
        let resolver = resolver.clone();
        let config = *config;
        Box::new(std::iter::once(()).flat_map(move |_| {
            let mut out: Vec<Outcome<Pattern>> = Vec::new();
            for (key, pattern) in &this.fields {
                for variant in pattern.negative_based_on(&row, &resolver, &config) {
                    match variant {
                        Outcome::Value(bad) => {
                            let mut fields = this.fields.clone();
                            fields.insert(key.clone(), bad);
                            out.push(Outcome::Value(Pattern::Object(ObjectPattern {
                                fields,
                                optional: this.optional.clone(),
                                unexpected_keys: this.unexpected_keys,
                                min_properties: this.min_properties,
                                max_properties: this.max_properties,
                            })));
                        }
                        other => out.push(other),
                    }
                }
            }
            out
        }))
    }

    // ----------------------------- encompasses ----------------------------- //

    pub fn encompasses(
        &self,
        other: &ObjectPattern,
        this_resolver: &Resolver,
        other_resolver: &Resolver,
    ) -> MatchResult {
        let mut failures = Vec::new();
        for key in self.mandatory_keys() {
            match other.fields.get(key) {
                None => failures.push(
                    MatchFailure::new(format!("mandatory key {key:?} is absent in the other schema"))
                        .with_reason(FailureReason::MissingKey)
                        .prefixed(key.to_string()),
                ),
                Some(_) if other.optional.contains(key) => failures.push(
                    MatchFailure::new(format!(
                        "key {key:?} is mandatory here but optional in the other schema"
                    ))
                    .with_reason(FailureReason::MissingKey)
                    .prefixed(key.to_string()),
                ),
                Some(_) => {}
            }
        }
        if self.unexpected_keys == UnexpectedKeys::Validate {
            for key in other.fields.keys() {
                if !self.fields.contains_key(key) {
                    failures.push(
                        MatchFailure::new(format!(
                            "key {key:?} in the other schema would be rejected here"
                        ))
                        .with_reason(FailureReason::UnexpectedKey)
                        .prefixed(key.clone()),
                    );
                }
            }
        }
        for (key, pattern) in &self.fields {
            if let Some(other_field) = other.fields.get(key) {
                if let MatchResult::Failure(f) =
                    pattern.encompasses(other_field, this_resolver, other_resolver)
                {
                    failures.push(f.prefixed(key.clone()));
                }
            }
        }
        let this_lo = self.min_properties.unwrap_or(0);
        let other_lo = other.min_properties.unwrap_or(0);
        if this_lo > other_lo {
            failures.push(MatchFailure::new(format!(
                "minProperties was tightened from {other_lo} to {this_lo}"
            )));
        }
        let this_hi = self.max_properties.unwrap_or(usize::MAX);
        let other_hi = other.max_properties.unwrap_or(usize::MAX);
        if this_hi < other_hi {
            failures.push(MatchFailure::new(format!(
                "maxProperties was tightened from {other_hi} to {this_hi}"
            )));
        }
        MatchResult::from_failures(failures)
    }

    // ------------------------------- fixing -------------------------------- //

    pub fn fix_value(&self, value: &Value, resolver: &Resolver) -> Value {
        let Value::Object(map) = value else {
            return self
                .generate(resolver)
                .value()
                .unwrap_or_else(|| value.clone());
        };
        let mut out = Map::new();
        for (key, pattern) in &self.fields {
            match map.get(key) {
                Some(v) => {
                    out.insert(key.clone(), pattern.fix_value(v, resolver));
                }
                None if !self.optional.contains(key) => {
                    if let Outcome::Value(v) = pattern.generate(resolver) {
                        out.insert(key.clone(), v);
                    }
                }
                None => {}
            }
        }
        if self.unexpected_keys == UnexpectedKeys::Ignore {
            for (key, v) in map {
                out.entry(key.clone()).or_insert_with(|| v.clone());
            }
        }
        Value::Object(out)
    }

    // -------------------------- fill in the blanks ------------------------- //

    pub fn fill_in_the_blanks(
        &self,
        value: &Value,
        resolver: &Resolver,
        remove_extra_keys: bool,
    ) -> Outcome<Value> {
        let Value::Object(map) = value else {
            return Outcome::from_match(self.matches(value, resolver), value.clone());
        };
        let mut entries: Vec<Outcome<(String, Value)>> = Vec::new();
        for (key, pattern) in &self.fields {
            match map.get(key) {
                Some(v) => entries.push(
                    pattern
                        .fill_in_the_blanks(v, resolver, remove_extra_keys)
                        .map(|filled| (key.clone(), filled))
                        .prefixed(key.clone()),
                ),
                None if self.is_mandatory(key, resolver) => entries.push(
                    pattern
                        .generate(resolver)
                        .map(|generated| (key.clone(), generated))
                        .prefixed(key.clone()),
                ),
                None => {}
            }
        }
        for (key, v) in map {
            if !self.fields.contains_key(key) && !remove_extra_keys {
                entries.push(Outcome::Value((key.clone(), v.clone())));
            }
        }
        Outcome::collect_all(entries).map(|pairs| {
            let mut out = Map::new();
            for (k, v) in pairs {
                out.insert(k, v);
            }
            Value::Object(out)
        })
    }

    // --------------------------- substitutions ----------------------------- //

    pub fn resolve_substitutions(
        &self,
        substitution: &Substitution,
        value: &Value,
        resolver: &Resolver,
    ) -> Outcome<Value> {
        let Value::Object(map) = value else {
            return Outcome::Value(value.clone());
        };
        let mut entries: Vec<Outcome<(String, Value)>> = Vec::new();
        for (key, v) in map {
            match self.fields.get(key) {
                Some(pattern) => entries.push(
                    pattern
                        .resolve_substitutions(substitution, v, resolver, Some(key))
                        .map(|resolved| (key.clone(), resolved))
                        .prefixed(key.clone()),
                ),
                None => entries.push(Outcome::Value((key.clone(), v.clone()))),
            }
        }
        Outcome::collect_all(entries).map(|pairs| {
            let mut out = Map::new();
            for (k, v) in pairs {
                out.insert(k, v);
            }
            Value::Object(out)
        })
    }

    // ------------------------------ structure ------------------------------ //

    /// Keep only the named keys; property bounds are dropped since they may
    /// no longer be satisfiable.
    pub fn retaining_keys(&self, keys: &BTreeSet<String>) -> ObjectPattern {
        ObjectPattern {
            fields: self
                .fields
                .iter()
                .filter(|(k, _)| keys.contains(*k))
                .map(|(k, p)| (k.clone(), p.clone()))
                .collect(),
            optional: self.optional.intersection(keys).cloned().collect(),
            unexpected_keys: self.unexpected_keys,
            min_properties: None,
            max_properties: None,
        }
    }

    /// Field-wise union: later fields win on conflict, but an optional field
    /// never downgrades a mandatory one.
    pub fn merged_with(&self, other: &ObjectPattern) -> ObjectPattern {
        let mut fields = self.fields.clone();
        for (key, pattern) in &other.fields {
            fields.insert(key.clone(), pattern.clone());
        }
        let optional: BTreeSet<String> = fields
            .keys()
            .filter(|k| {
                let optional_here = !self.fields.contains_key(*k) || self.optional.contains(*k);
                let optional_there =
                    !other.fields.contains_key(*k) || other.optional.contains(*k);
                optional_here && optional_there
            })
            .cloned()
            .collect();
        let unexpected_keys = if self.unexpected_keys == UnexpectedKeys::Ignore
            || other.unexpected_keys == UnexpectedKeys::Ignore
        {
            UnexpectedKeys::Ignore
        } else {
            UnexpectedKeys::Validate
        };
        ObjectPattern {
            fields,
            optional,
            unexpected_keys,
            min_properties: self.min_properties.max(other.min_properties),
            max_properties: match (self.max_properties, other.max_properties) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            },
        }
    }
}

/// Variant list for one field, honoring row pinning: a row entry is
/// validated and pinned as an exact value, and an object-valued entry steps
/// the row down so nested fields pin too.
fn field_variants(
    key: &str,
    pattern: &Pattern,
    row: &Row,
    resolver: &Resolver,
) -> Vec<Outcome<Pattern>> {
    if !row.contains(key) {
        return pattern.new_based_on(row, resolver).collect();
    }
    match row.lookup(key) {
        Some(Outcome::Value(v)) => {
            if v.is_object() && pattern.json_object_pattern(resolver).is_some() {
                return pattern
                    .new_based_on(&row.step_down_into(key), resolver)
                    .collect();
            }
            match pattern.matches(&v, resolver) {
                MatchResult::Success => {
                    vec![Outcome::Value(Pattern::Exact(ExactPattern::new(v)))]
                }
                MatchResult::Failure(f) => vec![Outcome::Failure(f.prefixed(key.to_string()))],
            }
        }
        Some(Outcome::Failure(f)) => vec![Outcome::Failure(f.prefixed(key.to_string()))],
        Some(Outcome::Exception(e)) => vec![Outcome::Exception(e)],
        None => pattern.new_based_on(row, resolver).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{NumberPattern, StringPattern};
    use serde_json::json;

    fn person() -> ObjectPattern {
        let mut raw = IndexMap::new();
        raw.insert(
            "name".to_string(),
            Pattern::String(StringPattern::default()),
        );
        raw.insert(
            "age?".to_string(),
            Pattern::Number(NumberPattern::integer()),
        );
        ObjectPattern::from_parts(raw).unwrap()
    }

    #[test]
    fn optional_sentinel_is_consumed() {
        let p = person();
        assert!(p.fields.contains_key("age"));
        assert!(p.optional.contains("age"));
        assert!(!p.optional.contains("name"));
    }

    #[test]
    fn mandatory_missing_and_unexpected_keys_fail() {
        let r = Resolver::new();
        let p = person();
        assert!(p.matches(&json!({"name": "Jo"}), &r).is_success());
        assert!(p.matches(&json!({"name": "Jo", "age": 4}), &r).is_success());
        assert!(p
            .matches(&json!({"age": 4}), &r)
            .has_reason(FailureReason::MissingKey));
        assert!(p
            .matches(&json!({"name": "Jo", "pet": "cat"}), &r)
            .has_reason(FailureReason::UnexpectedKey));
    }

    #[test]
    fn extra_keys_pass_with_ellipsis() {
        let r = Resolver::new();
        let mut raw = IndexMap::new();
        raw.insert("name".to_string(), Pattern::String(StringPattern::default()));
        raw.insert("...".to_string(), Pattern::Anything);
        let p = ObjectPattern::from_parts(raw).unwrap();
        assert!(p.matches(&json!({"name": "Jo", "pet": "cat"}), &r).is_success());
    }

    #[test]
    fn shape_match_with_bad_field_is_tagged() {
        let r = Resolver::new();
        let result = person().matches(&json!({"name": 7}), &r);
        assert!(result.has_reason(FailureReason::ObjectMatchOccurred));
        assert!(result.report().contains("name"), "{}", result.report());
    }

    #[test]
    fn impossible_bounds_fail_at_construction() {
        assert!(person().with_bounds(Some(3), Some(1)).is_err());
        assert!(person().with_bounds(None, Some(0)).is_err());
        assert!(person().with_bounds(Some(5), None).is_err());
        assert!(person().with_bounds(Some(1), Some(2)).is_ok());
    }

    #[test]
    fn generation_round_trips() {
        let p = person();
        for seed in 0..4 {
            let r = Resolver::new().with_seed(seed);
            let v = p.generate(&r).value().unwrap();
            assert!(p.matches(&v, &r).is_success(), "{v}");
        }
    }

    #[test]
    fn row_entries_pin_generated_fields() {
        let r = Resolver::new();
        let row = Row::new().with_entry("name", "Jill");
        let variants: Vec<Pattern> = person()
            .new_based_on(&row, &r)
            .filter_map(Outcome::value)
            .collect();
        assert!(!variants.is_empty());
        for variant in variants {
            let v = variant.generate(&r).value().unwrap();
            assert_eq!(v["name"], json!("Jill"), "{v}");
        }
    }

    #[test]
    fn invalid_row_entry_surfaces_as_failure() {
        let r = Resolver::new();
        let row = Row::new().with_entry("age", "not-a-number");
        let outcomes: Vec<Outcome<Pattern>> = person().new_based_on(&row, &r).collect();
        assert!(outcomes.iter().any(|o| !o.is_value()));
    }

    #[test]
    fn variant_set_includes_mandatory_only_shape() {
        let r = Resolver::new();
        let variants: Vec<Pattern> = person()
            .new_based_on(&Row::new(), &r)
            .filter_map(Outcome::value)
            .collect();
        assert!(variants.iter().any(|p| match p {
            Pattern::Object(o) => !o.fields.contains_key("age"),
            _ => false,
        }));
    }

    #[test]
    fn narrower_schema_is_encompassed() {
        let r = Resolver::new();
        let wide = person();
        let mut raw = IndexMap::new();
        raw.insert("name".to_string(), Pattern::String(StringPattern::default()));
        raw.insert("age".to_string(), Pattern::Number(NumberPattern::integer()));
        let narrow = ObjectPattern::from_parts(raw).unwrap();
        assert!(wide.encompasses(&narrow, &r, &r).is_success());
        assert!(!narrow.encompasses(&wide, &r, &r).is_success());
    }

    #[test]
    fn fill_in_the_blanks_generates_missing_mandatory_fields() {
        let r = Resolver::new();
        let p = person();
        let filled = p
            .fill_in_the_blanks(&json!({"age": 30}), &r, false)
            .value()
            .unwrap();
        assert!(filled["name"].is_string(), "{filled}");
        assert_eq!(filled["age"], json!(30));
    }

    #[test]
    fn merge_keeps_mandatory_over_optional() {
        let p = person();
        let mut raw = IndexMap::new();
        raw.insert("age".to_string(), Pattern::Number(NumberPattern::integer()));
        let q = ObjectPattern::from_parts(raw).unwrap();
        let merged = p.merged_with(&q);
        assert!(!merged.optional.contains("age"));
        assert!(!merged.optional.contains("name"));
        assert_eq!(merged.fields.len(), 2);
    }

    #[test]
    fn substitution_resolves_through_fields() {
        let r = Resolver::new();
        let sub = Substitution::new().bind("who", json!("Jan"));
        let resolved = person()
            .resolve_substitutions(&sub, &json!({"name": "$(who)"}), &r)
            .value()
            .unwrap();
        assert_eq!(resolved, json!({"name": "Jan"}));
    }
}
