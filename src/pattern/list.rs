//! Homogeneous arrays with optional item-count bounds.

use serde_json::Value;

use crate::error::PatternError;
use crate::outcome::Outcome;
use crate::pattern::exact::ExactPattern;
use crate::pattern::{NegativeConfig, Pattern, PatternStream};
use crate::resolver::Resolver;
use crate::result::{MatchFailure, MatchResult};
use crate::row::Row;
use crate::substitution::Substitution;

#[derive(Debug, Clone, PartialEq)]
pub struct ListPattern {
    pub item: Box<Pattern>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
}

impl ListPattern {
    pub fn new(
        item: Pattern,
        min_items: Option<usize>,
        max_items: Option<usize>,
    ) -> Result<Self, PatternError> {
        if let (Some(lo), Some(hi)) = (min_items, max_items) {
            if hi < lo {
                return Err(PatternError::ItemBounds { min: lo, max: hi });
            }
        }
        Ok(ListPattern {
            item: Box::new(item),
            min_items,
            max_items,
        })
    }

    pub fn of(item: Pattern) -> Self {
        ListPattern {
            item: Box::new(item),
            min_items: None,
            max_items: None,
        }
    }

    pub fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        let Value::Array(items) = value else {
            return MatchResult::Failure(resolver.mismatch("array", value));
        };
        if let Some(lo) = self.min_items {
            if items.len() < lo {
                return MatchResult::Failure(MatchFailure::new(format!(
                    "array has {} items, fewer than minItems {lo}",
                    items.len()
                )));
            }
        }
        if let Some(hi) = self.max_items {
            if items.len() > hi {
                return MatchResult::Failure(MatchFailure::new(format!(
                    "array has {} items, more than maxItems {hi}",
                    items.len()
                )));
            }
        }
        // In all-mandatory mode an empty array only passes for an item type
        // already being matched higher up the chain, where emptiness is what
        // terminates the recursion.
        if items.is_empty() && resolver.all_patterns_mandatory {
            if let Pattern::Deferred(name) = self.item.as_ref() {
                if !resolver.has_seen(name) {
                    return MatchResult::Failure(MatchFailure::new(format!(
                        "expected at least one {name} item, got an empty array"
                    )));
                }
            }
        }
        let results = items
            .iter()
            .enumerate()
            .map(|(i, v)| self.item.matches(v, resolver).prefixed(format!("[{i}]")));
        MatchResult::combine(results.collect::<Vec<_>>())
    }

    pub fn generate(&self, resolver: &Resolver) -> Outcome<Value> {
        let lo = self.min_items.unwrap_or(1);
        let len = lo.max(1).min(self.max_items.unwrap_or(usize::MAX));
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            match self.item.generate(resolver) {
                Outcome::Value(v) => items.push(v),
                // A cyclic item type bottoms out as the empty array when the
                // bounds allow it.
                Outcome::Exception(e)
                    if e.is_cycle() && self.min_items.unwrap_or(0) == 0 =>
                {
                    return Outcome::Value(Value::Array(Vec::new()));
                }
                Outcome::Failure(f) => return Outcome::Failure(f),
                Outcome::Exception(e) => return Outcome::Exception(e),
            }
        }
        Outcome::Value(Value::Array(items))
    }

    pub fn new_based_on(&self, row: &Row, resolver: &Resolver) -> PatternStream {
        let min_items = self.min_items;
        let max_items = self.max_items;
        Box::new(self.item.new_based_on(row, resolver).map(move |variant| {
            match variant {
                Outcome::Value(item) => Outcome::Value(Pattern::List(ListPattern {
                    item: Box::new(item),
                    min_items,
                    max_items,
                })),
                Outcome::Exception(e) if e.is_cycle() => {
                    Outcome::Value(Pattern::Exact(ExactPattern::new(Value::Array(Vec::new()))))
                }
                Outcome::Failure(f) => Outcome::Failure(f),
                Outcome::Exception(e) => Outcome::Exception(e),
            }
        }))
    }

    pub fn negative_based_on(
        &self,
        row: &Row,
        resolver: &Resolver,
        config: &NegativeConfig,
    ) -> PatternStream {
        let mut variants = vec![Outcome::Value(Pattern::Null)];
        if config.with_data_type_negatives {
            variants.push(Outcome::Value(Pattern::String(
                crate::pattern::StringPattern::default(),
            )));
        }
        let min_items = self.min_items.unwrap_or(0).max(1);
        let max_items = self.max_items;
        let bad_items = self
            .item
            .negative_based_on(row, resolver, config)
            .map(move |variant| {
                // At least one item, otherwise the empty array slips through.
                variant.map(|item| {
                    Pattern::List(ListPattern {
                        item: Box::new(item),
                        min_items: Some(min_items),
                        max_items,
                    })
                })
            });
        Box::new(variants.into_iter().chain(bad_items))
    }

    pub fn encompasses(
        &self,
        other: &ListPattern,
        this_resolver: &Resolver,
        other_resolver: &Resolver,
    ) -> MatchResult {
        let this_lo = self.min_items.unwrap_or(0);
        let other_lo = other.min_items.unwrap_or(0);
        if this_lo > other_lo {
            return MatchResult::Failure(MatchFailure::new(format!(
                "minItems was tightened from {other_lo} to {this_lo}"
            )));
        }
        let this_hi = self.max_items.unwrap_or(usize::MAX);
        let other_hi = other.max_items.unwrap_or(usize::MAX);
        if this_hi < other_hi {
            return MatchResult::Failure(MatchFailure::new(format!(
                "maxItems was tightened from {other_hi} to {this_hi}"
            )));
        }
        self.item
            .encompasses(&other.item, this_resolver, other_resolver)
            .prefixed("[]")
    }

    pub fn fix_value(&self, value: &Value, resolver: &Resolver) -> Value {
        let Value::Array(items) = value else {
            return self
                .generate(resolver)
                .value()
                .unwrap_or_else(|| value.clone());
        };
        let mut fixed: Vec<Value> = items
            .iter()
            .map(|v| self.item.fix_value(v, resolver))
            .collect();
        if let Some(lo) = self.min_items {
            while fixed.len() < lo {
                match self.item.generate(resolver) {
                    Outcome::Value(v) => fixed.push(v),
                    _ => break,
                }
            }
        }
        if let Some(hi) = self.max_items {
            fixed.truncate(hi);
        }
        Value::Array(fixed)
    }

    pub fn fill_in_the_blanks(
        &self,
        value: &Value,
        resolver: &Resolver,
        remove_extra_keys: bool,
    ) -> Outcome<Value> {
        let Value::Array(items) = value else {
            return Outcome::from_match(self.matches(value, resolver), value.clone());
        };
        let filled = items.iter().enumerate().map(|(i, v)| {
            self.item
                .fill_in_the_blanks(v, resolver, remove_extra_keys)
                .prefixed(format!("[{i}]"))
        });
        Outcome::collect_all(filled.collect::<Vec<_>>()).map(Value::Array)
    }

    pub fn resolve_substitutions(
        &self,
        substitution: &Substitution,
        value: &Value,
        resolver: &Resolver,
    ) -> Outcome<Value> {
        let Value::Array(items) = value else {
            return Outcome::Value(value.clone());
        };
        let resolved = items.iter().enumerate().map(|(i, v)| {
            self.item
                .resolve_substitutions(substitution, v, resolver, None)
                .prefixed(format!("[{i}]"))
        });
        Outcome::collect_all(resolved.collect::<Vec<_>>()).map(Value::Array)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::NumberPattern;
    use serde_json::json;

    fn numbers() -> ListPattern {
        ListPattern::of(Pattern::Number(NumberPattern::float()))
    }

    #[test]
    fn items_and_bounds_are_checked() {
        let r = Resolver::new();
        let p = ListPattern::new(Pattern::Number(NumberPattern::float()), Some(1), Some(3))
            .unwrap();
        assert!(p.matches(&json!([1, 2]), &r).is_success());
        assert!(!p.matches(&json!([]), &r).is_success());
        assert!(!p.matches(&json!([1, 2, 3, 4]), &r).is_success());
        assert!(!p.matches(&json!([1, "two"]), &r).is_success());
        assert!(!p.matches(&json!("nope"), &r).is_success());
    }

    #[test]
    fn item_failures_carry_the_index() {
        let r = Resolver::new();
        match numbers().matches(&json!([1, "two"]), &r) {
            MatchResult::Failure(f) => {
                assert!(f.report().contains("[1]"), "{}", f.report())
            }
            MatchResult::Success => panic!("expected failure"),
        }
    }

    #[test]
    fn reversed_bounds_fail_at_construction() {
        assert!(ListPattern::new(Pattern::Boolean, Some(3), Some(1)).is_err());
    }

    #[test]
    fn generation_respects_min_items() {
        let r = Resolver::new().with_seed(2);
        let p = ListPattern::new(Pattern::Number(NumberPattern::integer()), Some(2), None)
            .unwrap();
        let v = p.generate(&r).value().unwrap();
        assert!(p.matches(&v, &r).is_success(), "{v}");
        assert!(v.as_array().unwrap().len() >= 2);
    }

    #[test]
    fn cyclic_item_generates_as_empty_array() {
        let r = Resolver::new().add_pattern(
            "Tree",
            Pattern::List(ListPattern::of(Pattern::Deferred("Tree".into()))),
        );
        let v = Pattern::Deferred("Tree".into()).generate(&r).value().unwrap();
        assert_eq!(v, json!([]));
    }

    #[test]
    fn empty_array_needs_a_seen_item_type_in_mandatory_mode() {
        let r = Resolver::new()
            .add_pattern("Item", Pattern::Boolean)
            .with_mandatory_patterns(true);
        let p = ListPattern::of(Pattern::Deferred("Item".into()));
        assert!(!p.matches(&json!([]), &r).is_success());
        assert!(p.matches(&json!([true]), &r).is_success());
    }

    #[test]
    fn fill_in_the_blanks_completes_item_tokens() {
        let r = Resolver::new();
        let p = numbers();
        let filled = p
            .fill_in_the_blanks(&json!([1, "(number)"]), &r, false)
            .value()
            .unwrap();
        assert!(p.matches(&filled, &r).is_success(), "{filled}");
    }
}
