//! Untagged and discriminated unions.
//!
//! An `AnyOfPattern` accepts a value when any member does. With a
//! [`Discriminator`] attached, a tag property routes directly to one member
//! and mismatch reports stay focused on that member instead of fanning out
//! across every alternative.

use indexmap::IndexMap;
use serde_json::Value;

use crate::outcome::Outcome;
use crate::pattern::object::UnexpectedKeys;
use crate::pattern::{NegativeConfig, ObjectPattern, Pattern, PatternStream};
use crate::resolver::Resolver;
use crate::result::{FailureReason, MatchFailure, MatchResult};
use crate::row::Row;
use crate::substitution::Substitution;

/// Tag-property routing for a discriminated union: maps each tag value to the
/// name of the member pattern handling it.
#[derive(Debug, Clone, PartialEq)]
pub struct Discriminator {
    pub property: String,
    pub mapping: IndexMap<String, String>,
}

impl Discriminator {
    pub fn new(property: impl Into<String>, mapping: IndexMap<String, String>) -> Self {
        Discriminator {
            property: property.into(),
            mapping,
        }
    }

    pub fn pattern_for(&self, tag: &str) -> Option<&str> {
        self.mapping.get(tag).map(String::as_str)
    }

    fn allowed(&self) -> String {
        self.mapping
            .keys()
            .map(|k| format!("{k:?}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnyOfPattern {
    pub patterns: Vec<Pattern>,
    pub discriminator: Option<Discriminator>,
}

impl AnyOfPattern {
    pub fn new(patterns: Vec<Pattern>) -> Self {
        AnyOfPattern {
            patterns,
            discriminator: None,
        }
    }

    pub fn with_discriminator(mut self, discriminator: Discriminator) -> Self {
        self.discriminator = Some(discriminator);
        self
    }

    /// The `anyOf: [null, X]` shape produced by nullable shorthand. Failures
    /// then report as X's failures, not as a union fan-out.
    fn nullable_shorthand(&self) -> Option<&Pattern> {
        if self.patterns.len() != 2 {
            return None;
        }
        match (
            self.patterns[0].is_null_like(),
            self.patterns[1].is_null_like(),
        ) {
            (true, false) => Some(&self.patterns[1]),
            (false, true) => Some(&self.patterns[0]),
            _ => None,
        }
    }

    // ------------------------------ matches ------------------------------- //

    pub fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        if let Some(d) = &self.discriminator {
            return self.matches_discriminated(d, value, resolver);
        }
        if let Some(inner) = self.nullable_shorthand() {
            if value.is_null() {
                return MatchResult::Success;
            }
            return inner.matches(value, resolver);
        }
        // The union's key vocabulary is closed: a key no alternative declares
        // is rejected even when individual alternatives tolerate extras.
        if let Some(unknown) = self.keys_outside_vocabulary(value, resolver) {
            return MatchResult::Failure(MatchFailure::from_failures(unknown));
        }
        let mut failures = Vec::new();
        for (i, member) in self.patterns.iter().enumerate() {
            match member.matches(value, resolver) {
                MatchResult::Success => return MatchResult::Success,
                MatchResult::Failure(f) => {
                    let crumb = member
                        .alias()
                        .map(|a| format!("(~~~{a} object)"))
                        .unwrap_or_else(|| format!("[{i}]"));
                    failures.push(f.prefixed(crumb));
                }
            }
        }
        // When one alternative got as far as matching the object's shape
        // (every mandatory key present), its report is the relevant one.
        let object_matches: Vec<MatchFailure> = failures
            .iter()
            .filter(|f| f.has_reason(FailureReason::ObjectMatchOccurred))
            .cloned()
            .collect();
        if !object_matches.is_empty() {
            return MatchResult::from_failures(object_matches);
        }
        MatchResult::from_failures(failures)
    }

    /// UnexpectedKey failures for object keys outside the union of every
    /// alternative's declared key set. `None` when the vocabulary is open:
    /// the value is not an object, or some alternative has no object shape
    /// to declare keys with, or every key is accounted for.
    fn keys_outside_vocabulary(
        &self,
        value: &Value,
        resolver: &Resolver,
    ) -> Option<Vec<MatchFailure>> {
        let Value::Object(map) = value else {
            return None;
        };
        let mut vocabulary: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
        for alt in self.flattened(resolver) {
            if alt.is_null_like() {
                continue;
            }
            let obj = alt.json_object_pattern(resolver)?;
            vocabulary.extend(obj.fields.keys().cloned());
        }
        let unknown: Vec<MatchFailure> = map
            .keys()
            .filter(|k| !vocabulary.contains(*k))
            .map(|k| {
                MatchFailure::new(resolver.messages().unexpected_key("key", k))
                    .with_reason(FailureReason::UnexpectedKey)
                    .prefixed(k.clone())
            })
            .collect();
        if unknown.is_empty() {
            None
        } else {
            Some(unknown)
        }
    }

    fn matches_discriminated(
        &self,
        d: &Discriminator,
        value: &Value,
        resolver: &Resolver,
    ) -> MatchResult {
        let Value::Object(map) = value else {
            return MatchResult::Failure(resolver.mismatch("object", value));
        };
        let Some(tag) = map.get(&d.property) else {
            return MatchResult::Failure(
                MatchFailure::new(
                    resolver
                        .messages()
                        .missing_key("discriminator property", &d.property),
                )
                .with_reason(FailureReason::MissingKey),
            );
        };
        let Some(tag) = tag.as_str() else {
            return MatchResult::Failure(
                MatchFailure::new(format!(
                    "discriminator property {:?} must be a string",
                    d.property
                ))
                .with_reason(FailureReason::DiscriminatorMismatch)
                .prefixed(d.property.clone()),
            );
        };
        let Some(name) = d.pattern_for(tag) else {
            return MatchResult::Failure(
                MatchFailure::new(format!(
                    "discriminator value {tag:?} is not one of {}",
                    d.allowed()
                ))
                .with_reason(FailureReason::DiscriminatorMismatch)
                .prefixed(d.property.clone()),
            );
        };
        match resolver.get_pattern(name) {
            Outcome::Value(p) => p.matches(value, resolver),
            Outcome::Failure(f) => MatchResult::Failure(f),
            Outcome::Exception(e) => MatchResult::Failure(MatchFailure::new(e.to_string())),
        }
    }

    // ------------------------------ generate ------------------------------ //

    /// Non-null members are preferred; a member that cycles is skipped in
    /// favor of its siblings, and the cycle only surfaces when every member
    /// cycles.
    pub fn generate(&self, resolver: &Resolver) -> Outcome<Value> {
        let (concrete, nulls): (Vec<&Pattern>, Vec<&Pattern>) =
            self.patterns.iter().partition(|p| !p.is_null_like());
        let mut failures = Vec::new();
        let mut cycle = None;
        for member in concrete.into_iter().chain(nulls) {
            match member.generate(resolver) {
                Outcome::Value(v) => return Outcome::Value(v),
                Outcome::Failure(f) => failures.push(f),
                Outcome::Exception(e) if e.is_cycle() => cycle = Some(e),
                Outcome::Exception(e) => return Outcome::Exception(e),
            }
        }
        if !failures.is_empty() {
            return Outcome::Failure(MatchFailure::from_failures(failures));
        }
        match cycle {
            Some(e) => Outcome::Exception(e),
            None => Outcome::Failure(MatchFailure::new("union has no alternatives to generate")),
        }
    }

    /// Generate the member selected by a discriminator tag value.
    pub fn generate_value(&self, resolver: &Resolver, tag: &str) -> Outcome<Value> {
        let Some(d) = &self.discriminator else {
            return self.generate(resolver);
        };
        match d.pattern_for(tag) {
            Some(name) => resolver.get_pattern(name).and_then(|p| p.generate(resolver)),
            None => Outcome::Failure(MatchFailure::new(format!(
                "discriminator value {tag:?} is not one of {}",
                d.allowed()
            ))),
        }
    }

    // --------------------------- test variants ----------------------------- //

    pub fn new_based_on(&self, row: &Row, resolver: &Resolver) -> PatternStream {
        let merged = self.merged_object_variant(resolver);
        let members = self.patterns.clone();
        let row = row.clone();
        let resolver = resolver.clone();
        Box::new(
            members
                .into_iter()
                .flat_map(move |member| {
                    member.new_based_on(&row, &resolver).collect::<Vec<_>>()
                })
                .chain(merged.into_iter().map(Outcome::Value)),
        )
    }

    /// When at least two members expose object shapes, an extra variant
    /// combines their fields: later members win on conflicts, except that an
    /// optional field never downgrades a mandatory one. Only offered when the
    /// members tolerate unexpected keys, since the combined value carries
    /// keys no single member declares, and never for a discriminated union,
    /// where the combined value could not carry a single valid tag.
    fn merged_object_variant(&self, resolver: &Resolver) -> Option<Pattern> {
        if self.discriminator.is_some() {
            return None;
        }
        let objects: Vec<ObjectPattern> = self
            .patterns
            .iter()
            .filter_map(|m| m.json_object_pattern(resolver))
            .collect();
        if objects.len() < 2
            || objects
                .iter()
                .any(|o| o.unexpected_keys == UnexpectedKeys::Validate)
        {
            return None;
        }
        let mut merged = objects[0].clone();
        for next in &objects[1..] {
            merged = merged.merged_with(next);
        }
        Some(Pattern::Object(merged))
    }

    pub fn negative_based_on(
        &self,
        row: &Row,
        resolver: &Resolver,
        config: &NegativeConfig,
    ) -> PatternStream {
        if let Some(inner) = self.nullable_shorthand() {
            // Null is a positive value here, so null negatives are spurious.
            return Box::new(
                inner
                    .negative_based_on(row, resolver, config)
                    .filter(|v| !matches!(v, Outcome::Value(p) if p.is_null_like())),
            );
        }
        let positives = self.patterns.clone();
        let members = self.patterns.clone();
        let row = row.clone();
        let resolver = resolver.clone();
        let config = *config;
        let mut seen: Vec<Pattern> = Vec::new();
        Box::new(
            members
                .into_iter()
                .flat_map(move |member| {
                    member
                        .negative_based_on(&row, &resolver, &config)
                        .collect::<Vec<_>>()
                })
                .filter_map(move |variant| {
                    let Outcome::Value(p) = variant else {
                        return Some(variant);
                    };
                    // A negative of one member that another member accepts is
                    // not a negative of the union.
                    if positives.contains(&p) || seen.contains(&p) {
                        return None;
                    }
                    if p.is_null_like() && positives.iter().any(Pattern::is_null_like) {
                        return None;
                    }
                    seen.push(p.clone());
                    Some(Outcome::Value(p))
                }),
        )
    }

    // ----------------------------- encompasses ----------------------------- //

    /// `other` is concrete (not a union): some member must encompass it.
    pub fn encompasses_concrete(
        &self,
        other: &Pattern,
        this_resolver: &Resolver,
        other_resolver: &Resolver,
    ) -> MatchResult {
        let mut failures = Vec::new();
        for (i, member) in self.patterns.iter().enumerate() {
            match member.encompasses(other, this_resolver, other_resolver) {
                MatchResult::Success => return MatchResult::Success,
                MatchResult::Failure(f) => {
                    let crumb = member
                        .alias()
                        .map(|a| format!("(~~~{a} object)"))
                        .unwrap_or_else(|| format!("[{i}]"));
                    failures.push(f.prefixed(crumb));
                }
            }
        }
        MatchResult::from_failures(failures)
    }

    // ------------------------------ structure ------------------------------ //

    /// Expand nested unions (and references that resolve to unions) into a
    /// flat alternative list.
    pub fn flattened(&self, resolver: &Resolver) -> Vec<Pattern> {
        let mut out = Vec::new();
        for member in &self.patterns {
            match member {
                Pattern::AnyOf(inner) => out.extend(inner.flattened(resolver)),
                Pattern::Enum(e) => out.extend(e.inner.flattened(resolver)),
                Pattern::Deferred(name) => {
                    let expanded = resolver.with_cycle_prevention(name, true, |r| {
                        match r.get_pattern(name) {
                            Outcome::Value(Pattern::AnyOf(inner)) => {
                                Outcome::Value(Some(inner.flattened(r)))
                            }
                            Outcome::Value(Pattern::Enum(e)) => {
                                Outcome::Value(Some(e.inner.flattened(r)))
                            }
                            Outcome::Value(_) => Outcome::Value(None),
                            Outcome::Failure(f) => Outcome::Failure(f),
                            Outcome::Exception(e) => Outcome::Exception(e),
                        }
                    });
                    match expanded {
                        Outcome::Value(Some(Some(inner))) => out.extend(inner),
                        _ => out.push(member.clone()),
                    }
                }
                other => out.push(other.clone()),
            }
        }
        out
    }

    // ------------------------------- fixing -------------------------------- //

    pub fn fix_value(&self, value: &Value, resolver: &Resolver) -> Value {
        if let (Some(d), Value::Object(map)) = (&self.discriminator, value) {
            if let Some(tag) = map.get(&d.property).and_then(Value::as_str) {
                match d.pattern_for(tag) {
                    Some(name) => {
                        if let Outcome::Value(p) = resolver.get_pattern(name) {
                            return p.fix_value(value, resolver);
                        }
                    }
                    // An unknown tag is repaired onto the first declared
                    // alternative rather than trial-fixed across members.
                    None => {
                        if let Some((known, name)) = d.mapping.first() {
                            let mut patched = map.clone();
                            patched.insert(d.property.clone(), Value::String(known.clone()));
                            if let Outcome::Value(p) = resolver.get_pattern(name) {
                                return p.fix_value(&Value::Object(patched), resolver);
                            }
                        }
                    }
                }
            }
        }
        let (concrete, nulls): (Vec<&Pattern>, Vec<&Pattern>) =
            self.patterns.iter().partition(|p| !p.is_null_like());
        for member in concrete.into_iter().chain(nulls) {
            let fixed = member.fix_value(value, resolver);
            if member.matches(&fixed, resolver).is_success() {
                return fixed;
            }
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
        let mut failures = Vec::new();
        let mut exception = None;
        for member in &self.patterns {
            match member.fill_in_the_blanks(value, resolver, remove_extra_keys) {
                Outcome::Value(v) => return Outcome::Value(v),
                Outcome::Failure(f) => failures.push(f),
                Outcome::Exception(e) => exception = Some(e),
            }
        }
        if !failures.is_empty() {
            return Outcome::Failure(MatchFailure::from_failures(failures));
        }
        match exception {
            Some(e) => Outcome::Exception(e),
            None => Outcome::Failure(MatchFailure::new("union has no alternatives")),
        }
    }

    pub fn resolve_substitutions(
        &self,
        substitution: &Substitution,
        value: &Value,
        resolver: &Resolver,
        key: Option<&str>,
    ) -> Outcome<Value> {
        let mut failures = Vec::new();
        let mut exception = None;
        for member in &self.patterns {
            match member.resolve_substitutions(substitution, value, resolver, key) {
                Outcome::Value(v) => return Outcome::Value(v),
                Outcome::Failure(f) => failures.push(f),
                Outcome::Exception(e) => exception = Some(e),
            }
        }
        if !failures.is_empty() {
            return Outcome::Failure(MatchFailure::from_failures(failures));
        }
        match exception {
            Some(e) => Outcome::Exception(e),
            None => Outcome::Value(value.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{NumberPattern, StringPattern};
    use serde_json::json;

    fn string_or_number() -> AnyOfPattern {
        AnyOfPattern::new(vec![
            Pattern::String(StringPattern::default()),
            Pattern::Number(NumberPattern::float()),
        ])
    }

    #[test]
    fn any_member_match_succeeds() {
        let r = Resolver::new();
        let p = string_or_number();
        assert!(p.matches(&json!("hi"), &r).is_success());
        assert!(p.matches(&json!(3), &r).is_success());
        assert!(!p.matches(&json!(true), &r).is_success());
    }

    #[test]
    fn nullable_shorthand_reports_inner_failure_directly() {
        let r = Resolver::new();
        let p = AnyOfPattern::new(vec![
            Pattern::Null,
            Pattern::Number(NumberPattern::integer()),
        ]);
        assert!(p.matches(&json!(null), &r).is_success());
        assert!(p.matches(&json!(5), &r).is_success());
        match p.matches(&json!("five"), &r) {
            MatchResult::Failure(f) => {
                assert!(f.report().contains("integer"), "{}", f.report())
            }
            MatchResult::Success => panic!("expected failure"),
        }
    }

    #[test]
    fn generation_prefers_non_null_members() {
        let r = Resolver::new();
        let p = AnyOfPattern::new(vec![
            Pattern::Null,
            Pattern::Number(NumberPattern::integer()),
        ]);
        let v = p.generate(&r).value().unwrap();
        assert!(v.is_number(), "{v}");
    }

    fn payment_union() -> (Resolver, AnyOfPattern) {
        let mut mapping = IndexMap::new();
        mapping.insert("card".to_string(), "CardPayment".to_string());
        mapping.insert("cash".to_string(), "CashPayment".to_string());
        let r = Resolver::new()
            .add_pattern(
                "CardPayment",
                Pattern::Object(
                    crate::pattern::ObjectPattern::from_parts(
                        [
                            ("type".to_string(), Pattern::Exact(
                                crate::pattern::ExactPattern::discriminator(json!("card")),
                            )),
                            ("number".to_string(), Pattern::String(StringPattern::default())),
                        ]
                        .into_iter()
                        .collect(),
                    )
                    .unwrap()
                    .ignoring_unexpected_keys(),
                ),
            )
            .add_pattern(
                "CashPayment",
                Pattern::Object(
                    crate::pattern::ObjectPattern::from_parts(
                        [("type".to_string(), Pattern::Exact(
                            crate::pattern::ExactPattern::discriminator(json!("cash")),
                        ))]
                        .into_iter()
                        .collect(),
                    )
                    .unwrap()
                    .ignoring_unexpected_keys(),
                ),
            );
        let p = AnyOfPattern::new(vec![
            Pattern::Deferred("CardPayment".into()),
            Pattern::Deferred("CashPayment".into()),
        ])
        .with_discriminator(Discriminator::new("type", mapping));
        (r, p)
    }

    #[test]
    fn discriminator_routes_by_tag() {
        let (r, p) = payment_union();

        assert!(p
            .matches(&json!({"type": "card", "number": "4111"}), &r)
            .is_success());
        assert!(p.matches(&json!({"type": "cash"}), &r).is_success());

        match p.matches(&json!({"type": "cheque"}), &r) {
            MatchResult::Failure(f) => {
                assert!(f.has_reason(FailureReason::DiscriminatorMismatch))
            }
            MatchResult::Success => panic!("expected failure"),
        }
        match p.matches(&json!({"number": "4111"}), &r) {
            MatchResult::Failure(f) => assert!(f.has_reason(FailureReason::MissingKey)),
            MatchResult::Success => panic!("expected failure"),
        }
    }

    fn open_object(key: &str) -> Pattern {
        let raw: IndexMap<String, Pattern> = [(
            format!("{key}?"),
            Pattern::String(StringPattern::default()),
        )]
        .into_iter()
        .collect();
        Pattern::Object(
            ObjectPattern::from_parts(raw)
                .unwrap()
                .ignoring_unexpected_keys(),
        )
    }

    #[test]
    fn union_rejects_keys_no_alternative_declares() {
        let r = Resolver::new();
        let p = AnyOfPattern::new(vec![open_object("a"), open_object("b")]);
        assert!(p.matches(&json!({"a": "x"}), &r).is_success());
        match p.matches(&json!({"a": "x", "c": 1}), &r) {
            MatchResult::Failure(f) => {
                assert!(f.has_reason(FailureReason::UnexpectedKey));
                assert!(f.report().contains('c'), "{}", f.report());
            }
            MatchResult::Success => panic!("expected failure"),
        }
    }

    #[test]
    fn fix_value_repairs_an_unknown_discriminator_tag() {
        let (r, p) = payment_union();
        let fixed = p.fix_value(&json!({"type": "cheque"}), &r);
        assert!(p.matches(&fixed, &r).is_success(), "{fixed}");
        assert_eq!(fixed["type"], json!("card"));
    }

    #[test]
    fn discriminated_union_offers_no_merged_variant() {
        let (r, p) = payment_union();
        let variants: Vec<Pattern> = p
            .new_based_on(&Row::new(), &r)
            .filter_map(Outcome::value)
            .collect();
        assert!(!variants.is_empty());
        for variant in &variants {
            if let Pattern::Object(o) = variant {
                let cash_tag = matches!(
                    o.fields.get("type"),
                    Some(Pattern::Exact(e)) if e.value == json!("cash")
                );
                assert!(
                    !(cash_tag && o.fields.contains_key("number")),
                    "variant mixes fields across tags"
                );
            }
        }
    }

    #[test]
    fn negatives_exclude_values_other_members_accept() {
        let r = Resolver::new();
        let p = string_or_number();
        for variant in p.negative_based_on(&Row::new(), &r, &NegativeConfig::default()) {
            let pattern = variant.value().unwrap();
            if let Outcome::Value(v) = pattern.generate(&r) {
                assert!(
                    !p.matches(&v, &r).is_success(),
                    "negative variant produced accepted value {v}"
                );
            }
        }
    }
}
