//! Property tests over randomly built pattern trees: generated values match
//! their own pattern, positive variants stay inside the pattern, negative
//! variants of scalars stay outside, and widening via nullability is
//! one-directional.

use indexmap::IndexMap;
use proptest::prelude::*;

use conform::pattern::{
    AnyOfPattern, ListPattern, NumberPattern, ObjectPattern, StringPattern,
};
use conform::{NegativeConfig, Outcome, Pattern, Resolver, Row};

fn scalar_pattern() -> impl Strategy<Value = Pattern> {
    prop_oneof![
        Just(Pattern::Boolean),
        Just(Pattern::Null),
        Just(Pattern::Number(NumberPattern::integer())),
        (0u32..100, 1u32..100).prop_map(|(lo, span)| {
            let p = NumberPattern::new(Some(lo as f64), Some((lo + span) as f64), true)
                .expect("bounds are ordered");
            Pattern::Number(p)
        }),
        (1usize..5, 1usize..10).prop_map(|(lo, span)| {
            let p = StringPattern::new(Some(lo), Some(lo + span), None, None)
                .expect("bounds are ordered");
            Pattern::String(p)
        }),
    ]
}

fn composite_pattern() -> impl Strategy<Value = Pattern> {
    scalar_pattern().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            inner.clone().prop_map(|item| {
                Pattern::List(ListPattern::new(item, Some(0), Some(3)).expect("bounds ordered"))
            }),
            prop::collection::vec(inner.clone(), 1..4)
                .prop_map(|members| Pattern::AnyOf(AnyOfPattern::new(members))),
            prop::collection::vec(("[a-d]{1,4}", inner), 1..4).prop_map(|fields| {
                let raw: IndexMap<String, Pattern> = fields.into_iter().collect();
                Pattern::Object(ObjectPattern::from_parts(raw).expect("no bounds to violate"))
            }),
        ]
    })
}

proptest! {
    #[test]
    fn generated_values_match_their_pattern(
        pattern in composite_pattern(),
        seed in 0u64..64,
    ) {
        let resolver = Resolver::new().with_seed(seed);
        if let Outcome::Value(v) = pattern.generate(&resolver) {
            let result = pattern.matches(&v, &resolver);
            prop_assert!(result.is_success(), "{v} failed:\n{}", result.report());
        }
    }

    #[test]
    fn positive_variants_stay_inside_the_pattern(
        pattern in composite_pattern(),
        seed in 0u64..16,
    ) {
        let resolver = Resolver::new().with_seed(seed);
        let row = Row::new();
        for variant in pattern.new_based_on(&row, &resolver).take(8) {
            if let Outcome::Value(p) = variant {
                if let Outcome::Value(v) = p.generate(&resolver) {
                    let result = pattern.matches(&v, &resolver);
                    prop_assert!(result.is_success(), "{v} failed:\n{}", result.report());
                }
            }
        }
    }

    #[test]
    fn scalar_negative_variants_stay_outside(
        pattern in scalar_pattern(),
        seed in 0u64..16,
    ) {
        prop_assume!(!matches!(pattern, Pattern::Null));
        let resolver = Resolver::new().with_seed(seed);
        let row = Row::new();
        let config = NegativeConfig::default();
        for variant in pattern.negative_based_on(&row, &resolver, &config).take(8) {
            if let Outcome::Value(p) = variant {
                if let Outcome::Value(v) = p.generate(&resolver) {
                    prop_assert!(
                        !pattern.matches(&v, &resolver).is_success(),
                        "negative value {v} matched {pattern:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn nullable_widening_is_one_directional(pattern in composite_pattern()) {
        let resolver = Resolver::new();
        // Null hiding anywhere in a union makes the pattern already nullable.
        prop_assume!(!pattern.pattern_set(&resolver).iter().any(Pattern::is_null_like));
        let wide = pattern.to_nullable();
        prop_assert!(wide.encompasses(&pattern, &resolver, &resolver).is_success());
        prop_assert!(!pattern.encompasses(&wide, &resolver, &resolver).is_success());
    }

    #[test]
    fn encompasses_is_reflexive_for_concrete_patterns(pattern in composite_pattern()) {
        let resolver = Resolver::new();
        let result = pattern.encompasses(&pattern, &resolver, &resolver);
        prop_assert!(result.is_success(), "{}", result.report());
    }
}
