//! The pattern algebra: a closed sum type over schema shapes, plus the
//! cross-cutting operations every variant supports.
//!
//! Each operation is a total function over the variant set so a missing case
//! is a compile error, not a runtime surprise. Composite variants live in
//! submodules and delegate back through [`Pattern`] for recursion.
//!
//! Cyclic schemas are represented by name (`Pattern::Deferred`) and
//! dereferenced through the [`Resolver`]'s table, which is also where cycle
//! detection happens: a name re-entered while still in flight is a cycle.

pub mod all_of;
pub mod any_of;
pub mod enum_;
pub mod exact;
pub mod list;
pub mod object;
pub mod scalar;

use std::collections::BTreeSet;

use serde_json::Value;

use crate::outcome::Outcome;
use crate::resolver::{strip_token, Resolver};
use crate::result::{FailureReason, MatchFailure, MatchResult};
use crate::row::Row;
use crate::substitution::Substitution;

pub use all_of::AllOfPattern;
pub use any_of::{AnyOfPattern, Discriminator};
pub use enum_::EnumPattern;
pub use exact::ExactPattern;
pub use list::ListPattern;
pub use object::{ObjectPattern, UnexpectedKeys};
pub use scalar::{NumberPattern, StringFormat, StringPattern};

/// A lazy, finite, non-restartable stream of pattern variants. Callers may
/// consume a prefix only; exhausting it twice is not guaranteed to be free.
pub type PatternStream = Box<dyn Iterator<Item = Outcome<Pattern>>>;

/// Knobs for negative-variant generation.
#[derive(Debug, Clone, Copy)]
pub struct NegativeConfig {
    /// Include cross-type mutations (number→string and the like), not just
    /// constraint violations within the declared type.
    pub with_data_type_negatives: bool,
}

impl Default for NegativeConfig {
    fn default() -> Self {
        NegativeConfig {
            with_data_type_negatives: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// Matches any value at all.
    Anything,
    Null,
    Boolean,
    Number(NumberPattern),
    String(StringPattern),
    Exact(ExactPattern),
    Enum(EnumPattern),
    List(ListPattern),
    Object(ObjectPattern),
    AnyOf(AnyOfPattern),
    AllOf(AllOfPattern),
    /// A by-name reference resolved through the resolver's table; the arena
    /// representation that makes cyclic schemas expressible.
    Deferred(String),
}

impl Pattern {
    /// Builtin type tokens: `(string)`, `(integer)`, `(anyvalue)`, ...
    pub fn builtin(name: &str) -> Option<Pattern> {
        match strip_token(name) {
            "string" => Some(Pattern::String(StringPattern::default())),
            "number" => Some(Pattern::Number(NumberPattern::float())),
            "integer" => Some(Pattern::Number(NumberPattern::integer())),
            "boolean" => Some(Pattern::Boolean),
            "null" | "empty" => Some(Pattern::Null),
            "anyvalue" | "anything" => Some(Pattern::Anything),
            "date" => Some(Pattern::String(StringPattern::with_format(StringFormat::Date))),
            "datetime" => Some(Pattern::String(StringPattern::with_format(
                StringFormat::DateTime,
            ))),
            _ => None,
        }
    }

    /// The dictionary token this pattern is keyed by.
    pub fn token(&self) -> String {
        match self {
            Pattern::Anything => "(anyvalue)".into(),
            Pattern::Null => "(null)".into(),
            Pattern::Boolean => "(boolean)".into(),
            Pattern::Number(n) if n.integer => "(integer)".into(),
            Pattern::Number(_) => "(number)".into(),
            Pattern::String(s) => match s.format {
                Some(StringFormat::Date) => "(date)".into(),
                Some(StringFormat::DateTime) => "(datetime)".into(),
                None => "(string)".into(),
            },
            Pattern::Exact(_) => "(exact)".into(),
            Pattern::Enum(_) => "(enum)".into(),
            Pattern::List(_) => "(list)".into(),
            Pattern::Object(_) => "(object)".into(),
            Pattern::AnyOf(_) => "(anyOf)".into(),
            Pattern::AllOf(_) => "(allOf)".into(),
            Pattern::Deferred(name) => format!("({name})"),
        }
    }

    /// Human name used in mismatch messages.
    pub fn type_name(&self) -> String {
        match self {
            Pattern::Anything => "anything".into(),
            Pattern::Null => "null".into(),
            Pattern::Boolean => "boolean".into(),
            Pattern::Number(n) if n.integer => "integer".into(),
            Pattern::Number(_) => "number".into(),
            Pattern::String(_) => "string".into(),
            Pattern::Exact(e) => format!("exactly {}", e.value),
            Pattern::Enum(_) => "one of the enum values".into(),
            Pattern::List(_) => "array".into(),
            Pattern::Object(_) => "object".into(),
            Pattern::AnyOf(_) => "one of the alternatives".into(),
            Pattern::AllOf(_) => "all of the constraints".into(),
            Pattern::Deferred(name) => name.clone(),
        }
    }

    /// Union alias used in per-alternative breadcrumbs.
    pub fn alias(&self) -> Option<&str> {
        match self {
            Pattern::Deferred(name) => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn is_null_like(&self) -> bool {
        match self {
            Pattern::Null => true,
            Pattern::Exact(e) => e.value.is_null(),
            _ => false,
        }
    }

    /// Nullable when null is directly admissible.
    pub fn is_nullable(&self) -> bool {
        match self {
            Pattern::Anything | Pattern::Null => true,
            Pattern::Exact(e) => e.value.is_null(),
            Pattern::Enum(e) => e.nullable,
            Pattern::AnyOf(a) => a.patterns.iter().any(Pattern::is_null_like),
            _ => false,
        }
    }

    /// Wrap in a null-admitting union unless already nullable.
    pub fn to_nullable(&self) -> Pattern {
        if self.is_nullable() {
            return self.clone();
        }
        Pattern::AnyOf(AnyOfPattern::new(vec![Pattern::Null, self.clone()]))
    }

    // ------------------------------ matches ------------------------------ //

    pub fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        match self {
            Pattern::Anything => MatchResult::Success,
            Pattern::Null => {
                if value.is_null() {
                    MatchResult::Success
                } else {
                    MatchResult::Failure(resolver.mismatch("null", value))
                }
            }
            Pattern::Boolean => {
                if value.is_boolean() {
                    MatchResult::Success
                } else {
                    MatchResult::Failure(resolver.mismatch("boolean", value))
                }
            }
            Pattern::Number(p) => p.matches(value, resolver),
            Pattern::String(p) => p.matches(value, resolver),
            Pattern::Exact(p) => p.matches(value, resolver),
            Pattern::Enum(p) => p.matches(value, resolver),
            Pattern::List(p) => p.matches(value, resolver),
            Pattern::Object(p) => p.matches(value, resolver),
            Pattern::AnyOf(p) => p.matches(value, resolver),
            Pattern::AllOf(p) => p.matches(value, resolver),
            Pattern::Deferred(name) => {
                // Value-driven recursion always terminates, but the in-flight
                // set still has to grow so list matching can tell whether an
                // item type was already seen on this chain.
                let value = value.clone();
                let outcome = resolver.with_cycle_prevention(name, true, |r| {
                    match r.get_pattern(name) {
                        Outcome::Value(p) => Outcome::Value(p.matches(&value, r)),
                        Outcome::Failure(f) => Outcome::Failure(f),
                        Outcome::Exception(e) => Outcome::Exception(e),
                    }
                });
                match outcome {
                    Outcome::Value(Some(result)) => result,
                    Outcome::Value(None) => MatchResult::Success,
                    Outcome::Failure(f) => MatchResult::Failure(f),
                    Outcome::Exception(e) => {
                        MatchResult::Failure(MatchFailure::new(e.to_string()))
                    }
                }
            }
        }
    }

    // ------------------------------ generate ----------------------------- //

    pub fn generate(&self, resolver: &Resolver) -> Outcome<Value> {
        // Dictionary/explicit-example override comes first, and the example
        // must itself satisfy the pattern: generated output stays
        // self-consistent even when steered.
        if let Some(example) = resolver.resolve_example(&self.token()) {
            return match self.matches(&example, resolver) {
                MatchResult::Success => Outcome::Value(example),
                MatchResult::Failure(f) => Outcome::Failure(
                    f.prefixed(format!("dictionary example for {}", self.token())),
                ),
            };
        }
        // Strict dictionaries forbid fabricating leaf values; composites may
        // still recurse so their covered leaves resolve.
        if resolver.strict_dictionary
            && matches!(
                self,
                Pattern::Anything | Pattern::Boolean | Pattern::Number(_) | Pattern::String(_)
            )
        {
            return Outcome::Failure(MatchFailure::new(format!(
                "the dictionary has no example for {}",
                self.token()
            )));
        }
        match self {
            Pattern::Anything => scalar::generate_anything(resolver),
            Pattern::Null => Outcome::Value(Value::Null),
            Pattern::Boolean => Outcome::Value(Value::Bool(true)),
            Pattern::Number(p) => p.generate(resolver),
            Pattern::String(p) => p.generate(resolver),
            Pattern::Exact(p) => Outcome::Value(p.value.clone()),
            Pattern::Enum(p) => p.generate(resolver),
            Pattern::List(p) => p.generate(resolver),
            Pattern::Object(p) => p.generate(resolver),
            Pattern::AnyOf(p) => p.generate(resolver),
            Pattern::AllOf(p) => p.generate(resolver),
            Pattern::Deferred(name) => {
                let name_owned = name.clone();
                let outcome = resolver.with_cycle_prevention(name, false, move |r| {
                    r.get_pattern(&name_owned)
                        .and_then(|p| p.generate(r))
                });
                match outcome {
                    Outcome::Value(Some(v)) => Outcome::Value(v),
                    // Unreachable for nullable=false, kept total.
                    Outcome::Value(None) => Outcome::Value(Value::Null),
                    Outcome::Failure(f) => Outcome::Failure(f),
                    Outcome::Exception(e) => Outcome::Exception(e),
                }
            }
        }
    }

    // --------------------------- test variants ---------------------------- //

    /// Positive-test pattern variants: lazily generated, finite, ordered for
    /// readable test names.
    pub fn new_based_on(&self, row: &Row, resolver: &Resolver) -> PatternStream {
        match self {
            Pattern::Number(p) => p.new_based_on(),
            Pattern::String(p) => p.new_based_on(),
            Pattern::Enum(p) => p.new_based_on(),
            Pattern::List(p) => p.new_based_on(row, resolver),
            Pattern::Object(p) => p.new_based_on(row, resolver),
            Pattern::AnyOf(p) => p.new_based_on(row, resolver),
            Pattern::AllOf(p) => p.new_based_on(row, resolver),
            Pattern::Deferred(name) => {
                let name = name.clone();
                let resolver = resolver.clone();
                let row = row.clone();
                Box::new(std::iter::once(()).flat_map(move |_| {
                    let outcome = resolver.with_cycle_prevention(&name, false, |r| {
                        match r.get_pattern(&name) {
                            Outcome::Value(p) => Outcome::Value(
                                p.new_based_on(&row, r).collect::<Vec<_>>(),
                            ),
                            Outcome::Failure(f) => Outcome::Failure(f),
                            Outcome::Exception(e) => Outcome::Exception(e),
                        }
                    });
                    match outcome {
                        Outcome::Value(Some(items)) => items,
                        Outcome::Value(None) => Vec::new(),
                        Outcome::Failure(f) => vec![Outcome::Failure(f)],
                        Outcome::Exception(e) => vec![Outcome::Exception(e)],
                    }
                }))
            }
            // Scalars without sub-structure vary only through themselves.
            _ => Box::new(std::iter::once(Outcome::Value(self.clone()))),
        }
    }

    /// Type- and constraint-violating variants for negative testing.
    pub fn negative_based_on(
        &self,
        row: &Row,
        resolver: &Resolver,
        config: &NegativeConfig,
    ) -> PatternStream {
        match self {
            Pattern::Anything => Box::new(std::iter::empty()),
            Pattern::Null => scalar::negatives_for_null(config),
            Pattern::Boolean => scalar::negatives_for_boolean(config),
            Pattern::Number(p) => p.negative_based_on(config),
            Pattern::String(p) => p.negative_based_on(config),
            Pattern::Exact(p) => p.negative_based_on(config),
            Pattern::Enum(p) => p.negative_based_on(resolver, config),
            Pattern::List(p) => p.negative_based_on(row, resolver, config),
            Pattern::Object(p) => p.negative_based_on(row, resolver, config),
            Pattern::AnyOf(p) => p.negative_based_on(row, resolver, config),
            Pattern::AllOf(p) => p.negative_based_on(row, resolver, config),
            Pattern::Deferred(name) => {
                let name = name.clone();
                let resolver = resolver.clone();
                let row = row.clone();
                let config = *config;
                Box::new(std::iter::once(()).flat_map(move |_| {
                    let outcome = resolver.with_cycle_prevention(&name, false, |r| {
                        match r.get_pattern(&name) {
                            Outcome::Value(p) => Outcome::Value(
                                p.negative_based_on(&row, r, &config).collect::<Vec<_>>(),
                            ),
                            Outcome::Failure(f) => Outcome::Failure(f),
                            Outcome::Exception(e) => Outcome::Exception(e),
                        }
                    });
                    match outcome {
                        Outcome::Value(Some(items)) => items,
                        Outcome::Value(None) => Vec::new(),
                        Outcome::Failure(f) => vec![Outcome::Failure(f)],
                        Outcome::Exception(e) => vec![Outcome::Exception(e)],
                    }
                }))
            }
        }
    }

    // ----------------------------- encompasses ---------------------------- //

    /// Subtype check: success iff every value `other` accepts, `self` accepts.
    pub fn encompasses(
        &self,
        other: &Pattern,
        this_resolver: &Resolver,
        other_resolver: &Resolver,
    ) -> MatchResult {
        // Deferred operands resolve first, under a pair-keyed guard so a
        // mutually recursive comparison terminates coinductively.
        if let Pattern::Deferred(name) = self {
            let key = format!("encompasses:{name}<:{}", other.token());
            let other = other.clone();
            let other_resolver = other_resolver.clone();
            let name = name.clone();
            let outcome = this_resolver.with_cycle_prevention(&key, true, move |r| {
                match r.get_pattern(&name) {
                    Outcome::Value(p) => {
                        Outcome::Value(p.encompasses(&other, r, &other_resolver))
                    }
                    Outcome::Failure(f) => Outcome::Failure(f),
                    Outcome::Exception(e) => Outcome::Exception(e),
                }
            });
            return flatten_encompass(outcome);
        }
        if let Pattern::Deferred(name) = other {
            let key = format!("encompasses:{}:>{name}", self.token());
            let this = self.clone();
            let this_resolver2 = this_resolver.clone();
            let name = name.clone();
            let outcome = other_resolver.with_cycle_prevention(&key, true, move |r| {
                match r.get_pattern(&name) {
                    Outcome::Value(p) => {
                        Outcome::Value(this.encompasses(&p, &this_resolver2, r))
                    }
                    Outcome::Failure(f) => Outcome::Failure(f),
                    Outcome::Exception(e) => Outcome::Exception(e),
                }
            });
            return flatten_encompass(outcome);
        }

        // A union/enum on the other side: every alternative must be
        // encompassed individually.
        if matches!(other, Pattern::AnyOf(_) | Pattern::Enum(_)) {
            let alts = other.pattern_set(other_resolver);
            let results = alts.into_iter().enumerate().map(|(i, alt)| {
                let crumb = alt
                    .alias()
                    .map(|a| format!("(~~~{a} object)"))
                    .unwrap_or_else(|| format!("[{i}]"));
                self.encompasses(&alt, this_resolver, other_resolver)
                    .prefixed(crumb)
            });
            return MatchResult::combine(results.collect::<Vec<_>>());
        }

        // An intersection on the other side is narrower than each of its
        // members: encompassing any one member suffices.
        if let Pattern::AllOf(all) = other {
            let mut failures = Vec::new();
            for member in &all.patterns {
                match self.encompasses(member, this_resolver, other_resolver) {
                    MatchResult::Success => return MatchResult::Success,
                    MatchResult::Failure(f) => failures.push(f),
                }
            }
            return MatchResult::from_failures(failures);
        }

        // An exact value on the other side reduces to plain matching.
        if let Pattern::Exact(e) = other {
            return self.matches(&e.value, this_resolver);
        }

        match self {
            Pattern::Anything => MatchResult::Success,
            Pattern::Null => match other {
                Pattern::Null => MatchResult::Success,
                _ => encompass_mismatch(self, other),
            },
            Pattern::Boolean => match other {
                Pattern::Boolean => MatchResult::Success,
                _ => encompass_mismatch(self, other),
            },
            Pattern::Number(p) => match other {
                Pattern::Number(q) => p.encompasses(q),
                _ => encompass_mismatch(self, other),
            },
            Pattern::String(p) => match other {
                Pattern::String(q) => p.encompasses(q),
                _ => encompass_mismatch(self, other),
            },
            // An exact value on this side only accepts an equal exact value,
            // and that case was handled above; anything else is wider.
            Pattern::Exact(p) => MatchResult::Failure(MatchFailure::new(format!(
                "exact value {} cannot accept the wider {}",
                p.value,
                other.type_name()
            ))),
            Pattern::Enum(p) => p.encompasses_concrete(other),
            Pattern::List(p) => match other {
                Pattern::List(q) => p.encompasses(q, this_resolver, other_resolver),
                _ => encompass_mismatch(self, other),
            },
            Pattern::Object(p) => match other {
                Pattern::Object(q) => p.encompasses(q, this_resolver, other_resolver),
                _ => encompass_mismatch(self, other),
            },
            Pattern::AnyOf(p) => p.encompasses_concrete(other, this_resolver, other_resolver),
            Pattern::AllOf(p) => p.encompasses(other, this_resolver, other_resolver),
            Pattern::Deferred(_) => unreachable!("deferred resolved above"),
        }
    }

    // ------------------------------ fixing -------------------------------- //

    /// Best-effort coercion into a matching value, preferring minimal change.
    pub fn fix_value(&self, value: &Value, resolver: &Resolver) -> Value {
        if self.matches(value, resolver).is_success() {
            return value.clone();
        }
        match self {
            Pattern::Object(p) => p.fix_value(value, resolver),
            Pattern::List(p) => p.fix_value(value, resolver),
            Pattern::AnyOf(p) => p.fix_value(value, resolver),
            Pattern::AllOf(p) => p.fix_value(value, resolver),
            Pattern::Deferred(name) => {
                let outcome = resolver.with_cycle_prevention(name, true, |r| {
                    match r.get_pattern(name) {
                        Outcome::Value(p) => Outcome::Value(p.fix_value(value, r)),
                        Outcome::Failure(f) => Outcome::Failure(f),
                        Outcome::Exception(e) => Outcome::Exception(e),
                    }
                });
                match outcome {
                    Outcome::Value(Some(v)) => v,
                    _ => value.clone(),
                }
            }
            _ => self
                .generate(resolver)
                .value()
                .unwrap_or_else(|| value.clone()),
        }
    }

    // -------------------------- fill in the blanks ------------------------ //

    /// Complete a partial value containing pattern tokens (`"(string)"`,
    /// `"(anyvalue)"`, `"(Name)"`) into a fully concrete one.
    pub fn fill_in_the_blanks(
        &self,
        value: &Value,
        resolver: &Resolver,
        remove_extra_keys: bool,
    ) -> Outcome<Value> {
        if let Some(token) = token_of(value) {
            return self.fill_token(token, resolver);
        }
        match self {
            Pattern::Object(p) => p.fill_in_the_blanks(value, resolver, remove_extra_keys),
            Pattern::List(p) => p.fill_in_the_blanks(value, resolver, remove_extra_keys),
            Pattern::AnyOf(p) => p.fill_in_the_blanks(value, resolver, remove_extra_keys),
            Pattern::AllOf(p) => p.fill_in_the_blanks(value, resolver, remove_extra_keys),
            Pattern::Deferred(name) => {
                let outcome = resolver.with_cycle_prevention(name, false, |r| {
                    r.get_pattern(name)
                        .and_then(|p| p.fill_in_the_blanks(value, r, remove_extra_keys))
                });
                match outcome {
                    Outcome::Value(Some(v)) => Outcome::Value(v),
                    Outcome::Value(None) => Outcome::Value(Value::Null),
                    Outcome::Failure(f) => Outcome::Failure(f),
                    Outcome::Exception(e) => Outcome::Exception(e),
                }
            }
            _ => Outcome::from_match(self.matches(value, resolver), value.clone()),
        }
    }

    fn fill_token(&self, token: &str, resolver: &Resolver) -> Outcome<Value> {
        // `(anyvalue)` defers entirely to the schema at this position.
        if matches!(strip_token(token), "anyvalue" | "anything") {
            return self.generate(resolver);
        }
        if !resolver.has_pattern(token) {
            return Outcome::Failure(
                MatchFailure::new(format!("placeholder ({token}) is not a known pattern"))
                    .with_reason(FailureReason::Mismatch),
            );
        }
        resolver
            .get_pattern(token)
            .and_then(|p| p.generate(resolver))
            .and_then(|generated| {
                // The placeholder must produce something valid at this path.
                Outcome::from_match(self.matches(&generated, resolver), generated)
                    .with_detail(&format!("placeholder ({token})"))
            })
    }

    // --------------------------- substitutions ---------------------------- //

    /// Resolve `$(...)` placeholders embedded in a value, recursing through
    /// composite structure.
    pub fn resolve_substitutions(
        &self,
        substitution: &Substitution,
        value: &Value,
        resolver: &Resolver,
        key: Option<&str>,
    ) -> Outcome<Value> {
        if let Value::String(s) = value {
            if let Some(expr) = Substitution::placeholder(s) {
                return substitution.resolve(expr, key).and_then(|resolved| {
                    let coerced = substitution.coerce(&resolved, self);
                    Outcome::from_match(self.matches(&coerced, resolver), coerced)
                        .with_detail(&format!("substitution $({expr})"))
                });
            }
        }
        match self {
            Pattern::Object(p) => p.resolve_substitutions(substitution, value, resolver),
            Pattern::List(p) => p.resolve_substitutions(substitution, value, resolver),
            Pattern::AnyOf(p) => p.resolve_substitutions(substitution, value, resolver, key),
            Pattern::AllOf(p) => p.resolve_substitutions(substitution, value, resolver, key),
            Pattern::Deferred(name) => {
                let outcome = resolver.with_cycle_prevention(name, false, |r| {
                    r.get_pattern(name)
                        .and_then(|p| p.resolve_substitutions(substitution, value, r, key))
                });
                match outcome {
                    Outcome::Value(Some(v)) => Outcome::Value(v),
                    Outcome::Value(None) => Outcome::Value(value.clone()),
                    Outcome::Failure(f) => Outcome::Failure(f),
                    Outcome::Exception(e) => Outcome::Exception(e),
                }
            }
            _ => Outcome::Value(value.clone()),
        }
    }

    // ------------------------------ structure ----------------------------- //

    /// Flatten union/enum structure into the concrete alternatives considered
    /// during encompassment and negative generation.
    pub fn pattern_set(&self, resolver: &Resolver) -> Vec<Pattern> {
        match self {
            Pattern::AnyOf(p) => p.flattened(resolver),
            Pattern::Enum(p) => p.inner.flattened(resolver),
            Pattern::Deferred(name) => {
                let outcome = resolver.with_cycle_prevention(name, true, |r| {
                    match r.get_pattern(name) {
                        Outcome::Value(p) => Outcome::Value(p.pattern_set(r)),
                        Outcome::Failure(f) => Outcome::Failure(f),
                        Outcome::Exception(e) => Outcome::Exception(e),
                    }
                });
                match outcome {
                    Outcome::Value(Some(set)) => set,
                    _ => vec![self.clone()],
                }
            }
            _ => vec![self.clone()],
        }
    }

    /// The first object pattern this pattern exposes, if any; used by
    /// key-introspection operations.
    pub fn json_object_pattern(&self, resolver: &Resolver) -> Option<ObjectPattern> {
        match self {
            Pattern::Object(p) => Some(p.clone()),
            Pattern::AllOf(p) => p.json_object_pattern(resolver),
            Pattern::AnyOf(p) => p
                .patterns
                .iter()
                .find_map(|m| m.json_object_pattern(resolver)),
            Pattern::Deferred(name) => {
                let outcome = resolver.with_cycle_prevention(name, true, |r| {
                    match r.get_pattern(name) {
                        Outcome::Value(p) => Outcome::Value(p.json_object_pattern(r)),
                        Outcome::Failure(f) => Outcome::Failure(f),
                        Outcome::Exception(e) => Outcome::Exception(e),
                    }
                });
                match outcome {
                    Outcome::Value(Some(found)) => found,
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// The first discriminated union reachable through this pattern, searching
    /// nested unions, intersections, and references.
    pub fn discriminator_based_pattern(&self, resolver: &Resolver) -> Option<AnyOfPattern> {
        match self {
            Pattern::AnyOf(p) => {
                if p.discriminator.is_some() {
                    return Some(p.clone());
                }
                p.patterns
                    .iter()
                    .find_map(|m| m.discriminator_based_pattern(resolver))
            }
            Pattern::AllOf(p) => p
                .patterns
                .iter()
                .find_map(|m| m.discriminator_based_pattern(resolver)),
            Pattern::Deferred(name) => {
                let outcome = resolver.with_cycle_prevention(name, true, |r| {
                    match r.get_pattern(name) {
                        Outcome::Value(p) => Outcome::Value(p.discriminator_based_pattern(r)),
                        Outcome::Failure(f) => Outcome::Failure(f),
                        Outcome::Exception(e) => Outcome::Exception(e),
                    }
                });
                match outcome {
                    Outcome::Value(Some(found)) => found,
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// New pattern keeping only the named object keys. Non-object patterns
    /// map their members; scalars pass through.
    pub fn remove_keys_not_present_in(
        &self,
        keys: &BTreeSet<String>,
        resolver: &Resolver,
    ) -> Pattern {
        match self {
            Pattern::Object(p) => Pattern::Object(p.retaining_keys(keys)),
            Pattern::AllOf(p) => Pattern::AllOf(AllOfPattern::new(
                p.patterns
                    .iter()
                    .map(|m| m.remove_keys_not_present_in(keys, resolver))
                    .collect(),
            )),
            Pattern::AnyOf(p) => {
                let mut trimmed = p.clone();
                trimmed.patterns = p
                    .patterns
                    .iter()
                    .map(|m| m.remove_keys_not_present_in(keys, resolver))
                    .collect();
                Pattern::AnyOf(trimmed)
            }
            _ => self.clone(),
        }
    }
}

fn flatten_encompass(outcome: Outcome<Option<MatchResult>>) -> MatchResult {
    match outcome {
        Outcome::Value(Some(result)) => result,
        // Coinductive success: the comparison looped back on itself.
        Outcome::Value(None) => MatchResult::Success,
        Outcome::Failure(f) => MatchResult::Failure(f),
        Outcome::Exception(e) => MatchResult::Failure(MatchFailure::new(e.to_string())),
    }
}

fn encompass_mismatch(this: &Pattern, other: &Pattern) -> MatchResult {
    MatchResult::Failure(MatchFailure::new(format!(
        "expected {}, but the other schema allows {}",
        this.type_name(),
        other.type_name()
    )))
}

/// JSON type name for messages.
pub fn type_of_value(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// `"(Name)"` string values are pattern tokens inside partial values.
pub fn token_of(v: &Value) -> Option<&str> {
    match v {
        Value::String(s) if s.starts_with('(') && s.ends_with(')') && s.len() > 2 => {
            Some(&s[1..s.len() - 1])
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builtin_tokens_round_trip_through_type_names() {
        assert_eq!(
            Pattern::builtin("(integer)").unwrap().token(),
            "(integer)".to_string()
        );
        assert!(Pattern::builtin("frobnicate").is_none());
    }

    #[test]
    fn to_nullable_wraps_once() {
        let p = Pattern::Boolean.to_nullable();
        assert!(p.is_nullable());
        assert_eq!(p.to_nullable(), p);
    }

    #[test]
    fn token_detection_in_values() {
        assert_eq!(token_of(&json!("(string)")), Some("string"));
        assert_eq!(token_of(&json!("plain")), None);
        assert_eq!(token_of(&json!(3)), None);
    }

    #[test]
    fn deferred_matches_through_the_resolver() {
        let resolver = Resolver::new().add_pattern("Age", Pattern::Number(NumberPattern::integer()));
        let p = Pattern::Deferred("Age".into());
        assert!(p.matches(&json!(3), &resolver).is_success());
        assert!(!p.matches(&json!("three"), &resolver).is_success());
    }

    #[test]
    fn fill_token_resolves_named_patterns() {
        let resolver = Resolver::new();
        let p = Pattern::String(StringPattern::default());
        let filled = p
            .fill_in_the_blanks(&json!("(string)"), &resolver, false)
            .value()
            .unwrap();
        assert!(filled.is_string());
    }

    #[test]
    fn fill_rejects_unknown_placeholder() {
        let resolver = Resolver::new();
        let p = Pattern::String(StringPattern::default());
        let out = p.fill_in_the_blanks(&json!("(Mystery)"), &resolver, false);
        assert!(!out.is_value());
    }

    #[test]
    fn dictionary_examples_steer_generation() {
        let mut dict = indexmap::IndexMap::new();
        dict.insert("(string)".to_string(), json!("from-dictionary"));
        let resolver = Resolver::new().with_dictionary(dict);
        let generated = Pattern::String(StringPattern::default())
            .generate(&resolver)
            .value()
            .unwrap();
        assert_eq!(generated, json!("from-dictionary"));
    }

    #[test]
    fn invalid_dictionary_example_is_rejected() {
        let mut dict = indexmap::IndexMap::new();
        dict.insert("(integer)".to_string(), json!("three"));
        let resolver = Resolver::new().with_dictionary(dict);
        let out = Pattern::Number(NumberPattern::integer()).generate(&resolver);
        assert!(!out.is_value());
    }

    #[test]
    fn strict_dictionary_refuses_to_fabricate_leaves() {
        let resolver = Resolver::new().with_strict_dictionary(true);
        assert!(!Pattern::Boolean.generate(&resolver).is_value());
        assert!(Pattern::Null.generate(&resolver).is_value());
    }

    #[test]
    fn discriminated_union_is_found_through_nesting() {
        let tagged = AnyOfPattern::new(vec![Pattern::Deferred("Cat".into())])
            .with_discriminator(Discriminator::new("kind", indexmap::IndexMap::new()));
        let resolver = Resolver::new().add_pattern("Pet", Pattern::AnyOf(tagged));
        let outer = Pattern::AllOf(AllOfPattern::new(vec![
            Pattern::Anything,
            Pattern::AnyOf(AnyOfPattern::new(vec![Pattern::Deferred("Pet".into())])),
        ]));
        let found = outer.discriminator_based_pattern(&resolver);
        assert_eq!(
            found.and_then(|p| p.discriminator).map(|d| d.property),
            Some("kind".to_string())
        );
        assert!(Pattern::Boolean
            .discriminator_based_pattern(&resolver)
            .is_none());
    }

    #[test]
    fn anything_encompasses_everything() {
        let r = Resolver::new();
        assert!(Pattern::Anything
            .encompasses(&Pattern::Boolean, &r, &r)
            .is_success());
        assert!(!Pattern::Boolean
            .encompasses(&Pattern::Anything, &r, &r)
            .is_success());
    }
}
