//! Scalar patterns: numbers with interval bounds, strings with length /
//! regex / format constraints, plus the trivial null, boolean, and anything
//! shapes handled directly by the dispatcher.

use chrono::{Days, NaiveDate};
use rand::Rng;
use serde_json::Value;

use crate::error::PatternError;
use crate::outcome::Outcome;
use crate::pattern::{NegativeConfig, Pattern, PatternStream};
use crate::pattern::exact::ExactPattern;
use crate::resolver::Resolver;
use crate::result::{MatchFailure, MatchResult};

// ------------------------------- numbers ---------------------------------- //

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumberPattern {
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: bool,
    pub exclusive_maximum: bool,
    pub integer: bool,
}

impl NumberPattern {
    pub fn new(minimum: Option<f64>, maximum: Option<f64>, integer: bool) -> Result<Self, PatternError> {
        if let (Some(lo), Some(hi)) = (minimum, maximum) {
            if hi < lo {
                return Err(PatternError::NumericBounds { min: lo, max: hi });
            }
        }
        Ok(NumberPattern {
            minimum,
            maximum,
            exclusive_minimum: false,
            exclusive_maximum: false,
            integer,
        })
    }

    /// Set bound exclusivity, rejecting combinations that empty the interval
    /// (`minimum == maximum` with either bound exclusive, or an integer range
    /// squeezed past its last representable value).
    pub fn with_exclusive_bounds(
        mut self,
        exclusive_minimum: bool,
        exclusive_maximum: bool,
    ) -> Result<Self, PatternError> {
        self.exclusive_minimum = exclusive_minimum;
        self.exclusive_maximum = exclusive_maximum;
        if let (Some(lo), Some(hi)) = (self.minimum, self.maximum) {
            let empty = if self.integer {
                let lo_i = lo.ceil() as i64 + i64::from(exclusive_minimum);
                let hi_i = hi.floor() as i64 - i64::from(exclusive_maximum);
                lo_i > hi_i
            } else {
                (exclusive_minimum || exclusive_maximum) && lo >= hi
            };
            if empty {
                return Err(PatternError::EmptyRange { min: lo, max: hi });
            }
        }
        Ok(self)
    }

    pub fn integer() -> Self {
        NumberPattern {
            integer: true,
            ..NumberPattern::default()
        }
    }

    pub fn float() -> Self {
        NumberPattern::default()
    }

    fn kind(&self) -> &'static str {
        if self.integer {
            "integer"
        } else {
            "number"
        }
    }

    pub fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        let Value::Number(n) = value else {
            return MatchResult::Failure(resolver.mismatch(self.kind(), value));
        };
        if self.integer && n.as_i64().is_none() && n.as_u64().is_none() {
            return MatchResult::Failure(resolver.mismatch("integer", value));
        }
        let Some(x) = n.as_f64() else {
            return MatchResult::Failure(resolver.mismatch(self.kind(), value));
        };
        if let Some(lo) = self.minimum {
            if x < lo || (self.exclusive_minimum && x == lo) {
                return MatchResult::Failure(MatchFailure::new(format!(
                    "number {n} is below the minimum {lo}"
                )));
            }
        }
        if let Some(hi) = self.maximum {
            if x > hi || (self.exclusive_maximum && x == hi) {
                return MatchResult::Failure(MatchFailure::new(format!(
                    "number {n} is above the maximum {hi}"
                )));
            }
        }
        MatchResult::Success
    }

    pub fn generate(&self, resolver: &Resolver) -> Outcome<Value> {
        let mut rng = resolver.rng();
        let value = match (self.minimum, self.maximum) {
            (Some(lo), Some(hi)) => {
                // The midpoint is inside even when a bound is exclusive,
                // except in the degenerate lo == hi case.
                if self.integer {
                    let lo = lo.ceil() as i64 + i64::from(self.exclusive_minimum);
                    let hi = hi.floor() as i64 - i64::from(self.exclusive_maximum);
                    Value::from(lo + (hi - lo) / 2)
                } else {
                    Value::from(lo + (hi - lo) / 2.0)
                }
            }
            (Some(lo), None) => {
                let bump = rng.gen_range(0..10) as f64;
                let x = lo + bump + if self.exclusive_minimum { 1.0 } else { 0.0 };
                if self.integer {
                    Value::from(x.ceil() as i64)
                } else {
                    Value::from(x)
                }
            }
            (None, Some(hi)) => {
                let dip = rng.gen_range(0..10) as f64;
                let x = hi - dip - if self.exclusive_maximum { 1.0 } else { 0.0 };
                if self.integer {
                    Value::from(x.floor() as i64)
                } else {
                    Value::from(x)
                }
            }
            (None, None) => {
                let x = rng.gen_range(1..1000);
                if self.integer {
                    Value::from(x)
                } else {
                    Value::from(x as f64)
                }
            }
        };
        Outcome::Value(value)
    }

    /// Boundary exacts alongside the base pattern, so edge values get exercised.
    pub fn new_based_on(&self) -> PatternStream {
        let mut variants = vec![Outcome::Value(Pattern::Number(self.clone()))];
        if let Some(lo) = self.minimum {
            if !self.exclusive_minimum {
                variants.push(Outcome::Value(Pattern::Exact(ExactPattern::new(
                    number_value(lo, self.integer),
                ))));
            }
        }
        if let Some(hi) = self.maximum {
            if !self.exclusive_maximum {
                variants.push(Outcome::Value(Pattern::Exact(ExactPattern::new(
                    number_value(hi, self.integer),
                ))));
            }
        }
        Box::new(variants.into_iter())
    }

    pub fn negative_based_on(&self, config: &NegativeConfig) -> PatternStream {
        let mut variants = vec![Outcome::Value(Pattern::Null)];
        if let Some(lo) = self.minimum {
            variants.push(Outcome::Value(Pattern::Exact(ExactPattern::new(
                number_value(lo - 1.0, self.integer),
            ))));
        }
        if let Some(hi) = self.maximum {
            variants.push(Outcome::Value(Pattern::Exact(ExactPattern::new(
                number_value(hi + 1.0, self.integer),
            ))));
        }
        if config.with_data_type_negatives {
            variants.push(Outcome::Value(Pattern::Boolean));
            variants.push(Outcome::Value(Pattern::String(StringPattern::default())));
        }
        Box::new(variants.into_iter())
    }

    /// Wider-or-equal ranges accept narrower ones, never the reverse.
    pub fn encompasses(&self, other: &NumberPattern) -> MatchResult {
        if self.integer && !other.integer {
            return MatchResult::Failure(MatchFailure::new(
                "an integer schema cannot accept arbitrary numbers",
            ));
        }
        let this_lo = self.minimum.unwrap_or(f64::NEG_INFINITY);
        let other_lo = other.minimum.unwrap_or(f64::NEG_INFINITY);
        if this_lo > other_lo
            || (this_lo == other_lo && self.exclusive_minimum && !other.exclusive_minimum)
        {
            return MatchResult::Failure(MatchFailure::new(format!(
                "minimum was tightened from {other_lo} to {this_lo}"
            )));
        }
        let this_hi = self.maximum.unwrap_or(f64::INFINITY);
        let other_hi = other.maximum.unwrap_or(f64::INFINITY);
        if this_hi < other_hi
            || (this_hi == other_hi && self.exclusive_maximum && !other.exclusive_maximum)
        {
            return MatchResult::Failure(MatchFailure::new(format!(
                "maximum was tightened from {other_hi} to {this_hi}"
            )));
        }
        MatchResult::Success
    }
}

fn number_value(x: f64, integer: bool) -> Value {
    if integer || x.fract() == 0.0 {
        Value::from(x as i64)
    } else {
        Value::from(x)
    }
}

// ------------------------------- strings ---------------------------------- //

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFormat {
    Date,
    DateTime,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringPattern {
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub regex: Option<String>,
    pub format: Option<StringFormat>,
}

impl StringPattern {
    pub fn new(
        min_length: Option<usize>,
        max_length: Option<usize>,
        regex: Option<String>,
        format: Option<StringFormat>,
    ) -> Result<Self, PatternError> {
        if let (Some(lo), Some(hi)) = (min_length, max_length) {
            if hi < lo {
                return Err(PatternError::LengthBounds { min: lo, max: hi });
            }
        }
        if let Some(rx) = &regex {
            regex::Regex::new(&anchored(rx)).map_err(|e| PatternError::BadRegex {
                pattern: rx.clone(),
                message: e.to_string(),
            })?;
        }
        Ok(StringPattern {
            min_length,
            max_length,
            regex,
            format,
        })
    }

    pub fn with_format(format: StringFormat) -> Self {
        StringPattern {
            format: Some(format),
            ..StringPattern::default()
        }
    }

    pub fn with_regex(regex: impl Into<String>) -> Self {
        StringPattern {
            regex: Some(regex.into()),
            ..StringPattern::default()
        }
    }

    pub fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        let Value::String(s) = value else {
            return MatchResult::Failure(resolver.mismatch("string", value));
        };
        let len = s.chars().count();
        if let Some(lo) = self.min_length {
            if len < lo {
                return MatchResult::Failure(MatchFailure::new(format!(
                    "string of length {len} is shorter than minLength {lo}"
                )));
            }
        }
        if let Some(hi) = self.max_length {
            if len > hi {
                return MatchResult::Failure(MatchFailure::new(format!(
                    "string of length {len} is longer than maxLength {hi}"
                )));
            }
        }
        if let Some(rx) = &self.regex {
            // Validated at construction; a fresh compile cannot fail here,
            // but stay total anyway.
            match regex::Regex::new(&anchored(rx)) {
                Ok(compiled) if compiled.is_match(s) => {}
                Ok(_) => {
                    return MatchResult::Failure(MatchFailure::new(format!(
                        "string {s:?} does not match {rx:?}"
                    )))
                }
                Err(e) => return MatchResult::Failure(MatchFailure::new(e.to_string())),
            }
        }
        match self.format {
            Some(StringFormat::Date) => {
                if NaiveDate::parse_from_str(s, "%Y-%m-%d").is_err() {
                    return MatchResult::Failure(MatchFailure::new(format!(
                        "string {s:?} is not a date (yyyy-mm-dd)"
                    )));
                }
            }
            Some(StringFormat::DateTime) => {
                if chrono::DateTime::parse_from_rfc3339(s).is_err() {
                    return MatchResult::Failure(MatchFailure::new(format!(
                        "string {s:?} is not an RFC 3339 date-time"
                    )));
                }
            }
            None => {}
        }
        MatchResult::Success
    }

    pub fn generate(&self, resolver: &Resolver) -> Outcome<Value> {
        let mut rng = resolver.rng();
        match self.format {
            Some(StringFormat::Date) => {
                return Outcome::Value(Value::String(random_date(&mut rng).to_string()));
            }
            Some(StringFormat::DateTime) => {
                let date = random_date(&mut rng);
                let (h, m, s) = (
                    rng.gen_range(0..24u32),
                    rng.gen_range(0..60u32),
                    rng.gen_range(0..60u32),
                );
                return Outcome::Value(Value::String(format!("{date}T{h:02}:{m:02}:{s:02}Z")));
            }
            None => {}
        }
        if let Some(rx) = &self.regex {
            let min = self.min_length.unwrap_or(0);
            let max = self.max_length.unwrap_or(usize::MAX);
            return match resolver.provide_string(rx, min, max) {
                Ok(s) => Outcome::Value(Value::String(s)),
                Err(e) => Outcome::Exception(e),
            };
        }
        let lo = self.min_length.unwrap_or(5);
        let hi = self.max_length.unwrap_or_else(|| lo.max(10));
        let len = if hi > lo { rng.gen_range(lo..=hi) } else { lo };
        let s: String = (0..len)
            .map(|_| (b'a' + rng.gen_range(0..26u8)) as char)
            .collect();
        Outcome::Value(Value::String(s))
    }

    pub fn new_based_on(&self) -> PatternStream {
        Box::new(std::iter::once(Outcome::Value(Pattern::String(self.clone()))))
    }

    pub fn negative_based_on(&self, config: &NegativeConfig) -> PatternStream {
        let mut variants = vec![Outcome::Value(Pattern::Null)];
        if let Some(lo) = self.min_length {
            if lo > 0 {
                variants.push(Outcome::Value(Pattern::Exact(ExactPattern::new(
                    Value::String("a".repeat(lo - 1)),
                ))));
            }
        }
        if let Some(hi) = self.max_length {
            variants.push(Outcome::Value(Pattern::Exact(ExactPattern::new(
                Value::String("a".repeat(hi + 1)),
            ))));
        }
        if let Some(rx) = &self.regex {
            // A trailing underscore breaks any fully anchored match while
            // keeping the variant generatable.
            variants.push(Outcome::Value(Pattern::String(StringPattern {
                regex: Some(format!("{rx}_")),
                min_length: None,
                max_length: None,
                format: None,
            })));
        }
        if config.with_data_type_negatives {
            variants.push(Outcome::Value(Pattern::Number(NumberPattern::float())));
            variants.push(Outcome::Value(Pattern::Boolean));
        }
        Box::new(variants.into_iter())
    }

    pub fn encompasses(&self, other: &StringPattern) -> MatchResult {
        let this_lo = self.min_length.unwrap_or(0);
        let other_lo = other.min_length.unwrap_or(0);
        if this_lo > other_lo {
            return MatchResult::Failure(MatchFailure::new(format!(
                "minLength was tightened from {other_lo} to {this_lo}"
            )));
        }
        let this_hi = self.max_length.unwrap_or(usize::MAX);
        let other_hi = other.max_length.unwrap_or(usize::MAX);
        if this_hi < other_hi {
            return MatchResult::Failure(MatchFailure::new(format!(
                "maxLength was tightened from {other_hi} to {this_hi}"
            )));
        }
        if let Some(rx) = &self.regex {
            if other.regex.as_deref() != Some(rx.as_str()) {
                return MatchResult::Failure(MatchFailure::new(format!(
                    "regex {rx:?} is not guaranteed by the other schema"
                )));
            }
        }
        if let Some(fmt) = self.format {
            if other.format != Some(fmt) {
                return MatchResult::Failure(MatchFailure::new(
                    "string format is not guaranteed by the other schema",
                ));
            }
        }
        MatchResult::Success
    }
}

fn anchored(rx: &str) -> String {
    let body = rx.strip_prefix('^').unwrap_or(rx);
    let body = body.strip_suffix('$').unwrap_or(body);
    format!("^(?:{body})$")
}

fn random_date(rng: &mut impl Rng) -> NaiveDate {
    // Construction from a constant cannot fail.
    let base = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    base.checked_add_days(Days::new(rng.gen_range(0..3650)))
        .unwrap_or(base)
}

// ------------------------- anything / null / bool -------------------------- //

pub fn generate_anything(resolver: &Resolver) -> Outcome<Value> {
    let mut rng = resolver.rng();
    let s: String = (0..8)
        .map(|_| (b'a' + rng.gen_range(0..26u8)) as char)
        .collect();
    Outcome::Value(Value::String(s))
}

pub fn negatives_for_null(config: &NegativeConfig) -> PatternStream {
    if config.with_data_type_negatives {
        Box::new(
            vec![
                Outcome::Value(Pattern::String(StringPattern::default())),
                Outcome::Value(Pattern::Number(NumberPattern::float())),
                Outcome::Value(Pattern::Boolean),
            ]
            .into_iter(),
        )
    } else {
        Box::new(std::iter::empty())
    }
}

pub fn negatives_for_boolean(config: &NegativeConfig) -> PatternStream {
    let mut variants = vec![Outcome::Value(Pattern::Null)];
    if config.with_data_type_negatives {
        variants.push(Outcome::Value(Pattern::Number(NumberPattern::float())));
        variants.push(Outcome::Value(Pattern::String(StringPattern::default())));
    }
    Box::new(variants.into_iter())
}
