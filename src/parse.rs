//! Schema documents in, patterns out.
//!
//! Accepts the JSON-Schema-flavored surface syntax: `type`, `properties` /
//! `required` / `additionalProperties`, `items` with item-count bounds,
//! `enum` / `const`, `nullable`, `oneOf` / `anyOf` / `allOf` with an optional
//! `discriminator`, and `#/definitions/Name` references. Deserialization goes
//! through `serde_path_to_error` so malformed documents report the exact
//! offending path.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::error::PatternError;
use crate::pattern::{
    AllOfPattern, AnyOfPattern, Discriminator, EnumPattern, ExactPattern, ListPattern,
    NumberPattern, ObjectPattern, Pattern, StringFormat, StringPattern,
};
use crate::resolver::Resolver;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("schema is not valid JSON at {path}: {message}")]
    Json { path: String, message: String },

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error("unsupported $ref {0:?}; only #/definitions/Name is supported")]
    BadRef(String),

    #[error("discriminator mapping target {0:?} is not a #/definitions reference")]
    BadMapping(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Schema {
    // Only consulted on the document root; ignored on nested schemas.
    #[serde(default)]
    definitions: IndexMap<String, Schema>,

    #[serde(rename = "type")]
    type_: Option<String>,
    #[serde(rename = "$ref")]
    reference: Option<String>,

    properties: Option<IndexMap<String, Schema>>,
    required: Option<Vec<String>>,
    #[serde(rename = "additionalProperties")]
    additional_properties: Option<Value>,
    #[serde(rename = "minProperties")]
    min_properties: Option<usize>,
    #[serde(rename = "maxProperties")]
    max_properties: Option<usize>,

    items: Option<Box<Schema>>,
    #[serde(rename = "minItems")]
    min_items: Option<usize>,
    #[serde(rename = "maxItems")]
    max_items: Option<usize>,

    #[serde(rename = "enum")]
    enum_values: Option<Vec<Value>>,
    #[serde(rename = "const")]
    const_value: Option<Value>,
    nullable: Option<bool>,

    #[serde(rename = "oneOf")]
    one_of: Option<Vec<Schema>>,
    #[serde(rename = "anyOf")]
    any_of: Option<Vec<Schema>>,
    #[serde(rename = "allOf")]
    all_of: Option<Vec<Schema>>,
    discriminator: Option<DiscriminatorSchema>,

    pattern: Option<String>,
    format: Option<String>,
    #[serde(rename = "minLength")]
    min_length: Option<usize>,
    #[serde(rename = "maxLength")]
    max_length: Option<usize>,

    minimum: Option<f64>,
    maximum: Option<f64>,
    #[serde(rename = "exclusiveMinimum", default)]
    exclusive_minimum: bool,
    #[serde(rename = "exclusiveMaximum", default)]
    exclusive_maximum: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct DiscriminatorSchema {
    #[serde(rename = "propertyName")]
    property_name: String,
    #[serde(default)]
    mapping: IndexMap<String, String>,
}

/// A parsed document: the root pattern plus the named definitions it can
/// refer to.
#[derive(Debug, Clone)]
pub struct ParsedSchema {
    pub root: Pattern,
    pub definitions: IndexMap<String, Pattern>,
}

impl ParsedSchema {
    /// A resolver preloaded with this document's definitions.
    pub fn resolver(&self) -> Resolver {
        Resolver::new().with_patterns(self.definitions.clone())
    }
}

pub fn parse_schema(text: &str) -> Result<ParsedSchema, ParseError> {
    let mut deserializer = serde_json::Deserializer::from_str(text);
    let doc: Schema =
        serde_path_to_error::deserialize(&mut deserializer).map_err(|e| ParseError::Json {
            path: e.path().to_string(),
            message: e.inner().to_string(),
        })?;
    let mut definitions = IndexMap::new();
    for (name, schema) in &doc.definitions {
        definitions.insert(name.clone(), compile(schema)?);
    }
    Ok(ParsedSchema {
        root: compile(&doc)?,
        definitions,
    })
}

fn compile(schema: &Schema) -> Result<Pattern, ParseError> {
    let pattern = compile_core(schema)?;
    if schema.nullable == Some(true) {
        return Ok(pattern.to_nullable());
    }
    Ok(pattern)
}

fn compile_core(schema: &Schema) -> Result<Pattern, ParseError> {
    if let Some(reference) = &schema.reference {
        return Ok(Pattern::Deferred(definition_name(reference)?));
    }
    if let Some(v) = &schema.const_value {
        return Ok(Pattern::Exact(ExactPattern::new(v.clone())));
    }
    if let Some(values) = &schema.enum_values {
        let mut values = values.clone();
        let nullable = schema.nullable == Some(true) || values.iter().any(Value::is_null);
        if nullable && !values.iter().any(Value::is_null) {
            values.push(Value::Null);
        }
        let p = EnumPattern::new(values, nullable)?;
        return Ok(Pattern::Enum(p));
    }
    if let Some(members) = &schema.all_of {
        let patterns = members.iter().map(compile).collect::<Result<_, _>>()?;
        return Ok(Pattern::AllOf(AllOfPattern::new(patterns)));
    }
    if let Some(members) = schema.one_of.as_ref().or(schema.any_of.as_ref()) {
        let patterns = members.iter().map(compile).collect::<Result<_, _>>()?;
        let mut union = AnyOfPattern::new(patterns);
        if let Some(d) = &schema.discriminator {
            let mut mapping = IndexMap::new();
            for (tag, target) in &d.mapping {
                mapping.insert(tag.clone(), definition_name(target)?);
            }
            union = union.with_discriminator(Discriminator::new(&d.property_name, mapping));
        }
        return Ok(Pattern::AnyOf(union));
    }
    match schema.type_.as_deref() {
        Some("object") => compile_object(schema),
        Some("array") => {
            let item = match &schema.items {
                Some(items) => compile(items)?,
                None => Pattern::Anything,
            };
            Ok(Pattern::List(ListPattern::new(
                item,
                schema.min_items,
                schema.max_items,
            )?))
        }
        Some("string") => compile_string(schema),
        Some("number") => compile_number(schema, false),
        Some("integer") => compile_number(schema, true),
        Some("boolean") => Ok(Pattern::Boolean),
        Some("null") => Ok(Pattern::Null),
        // Bare `properties` without a type is an object by convention.
        _ if schema.properties.is_some() => compile_object(schema),
        _ => Ok(Pattern::Anything),
    }
}

fn compile_object(schema: &Schema) -> Result<Pattern, ParseError> {
    let required: Vec<&str> = schema
        .required
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(String::as_str)
        .collect();
    let mut raw = IndexMap::new();
    if let Some(properties) = &schema.properties {
        for (name, field) in properties {
            let key = if required.contains(&name.as_str()) {
                name.clone()
            } else {
                format!("{name}?")
            };
            raw.insert(key, compile(field)?);
        }
    }
    // additionalProperties: absent or false keeps the key set closed.
    let open = match &schema.additional_properties {
        Some(Value::Bool(open)) => *open,
        Some(_) => true,
        None => false,
    };
    if open {
        raw.insert("...".to_string(), Pattern::Anything);
    }
    let object = ObjectPattern::from_parts(raw)?
        .with_bounds(schema.min_properties, schema.max_properties)?;
    Ok(Pattern::Object(object))
}

fn compile_string(schema: &Schema) -> Result<Pattern, ParseError> {
    let format = match schema.format.as_deref() {
        Some("date") => Some(StringFormat::Date),
        Some("date-time") => Some(StringFormat::DateTime),
        _ => None,
    };
    let p = StringPattern::new(
        schema.min_length,
        schema.max_length,
        schema.pattern.clone(),
        format,
    )?;
    Ok(Pattern::String(p))
}

fn compile_number(schema: &Schema, integer: bool) -> Result<Pattern, ParseError> {
    let p = NumberPattern::new(schema.minimum, schema.maximum, integer)?
        .with_exclusive_bounds(schema.exclusive_minimum, schema.exclusive_maximum)?;
    Ok(Pattern::Number(p))
}

fn definition_name(reference: &str) -> Result<String, ParseError> {
    reference
        .strip_prefix("#/definitions/")
        .map(str::to_string)
        .ok_or_else(|| ParseError::BadRef(reference.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_schema_compiles_with_optionality() {
        let parsed = parse_schema(
            r#"{
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "age": {"type": "integer", "minimum": 0}
                },
                "required": ["name"]
            }"#,
        )
        .unwrap();
        let r = parsed.resolver();
        assert!(parsed
            .root
            .matches(&json!({"name": "Jo"}), &r)
            .is_success());
        assert!(!parsed.root.matches(&json!({"age": 4}), &r).is_success());
        assert!(!parsed
            .root
            .matches(&json!({"name": "Jo", "age": -1}), &r)
            .is_success());
    }

    #[test]
    fn refs_resolve_through_definitions() {
        let parsed = parse_schema(
            r##"{
                "definitions": {
                    "Id": {"type": "integer", "minimum": 1}
                },
                "type": "object",
                "properties": {"id": {"$ref": "#/definitions/Id"}},
                "required": ["id"]
            }"##,
        )
        .unwrap();
        let r = parsed.resolver();
        assert!(parsed.root.matches(&json!({"id": 3}), &r).is_success());
        assert!(!parsed.root.matches(&json!({"id": 0}), &r).is_success());
    }

    #[test]
    fn recursive_definitions_parse_and_generate() {
        let parsed = parse_schema(
            r##"{
                "definitions": {
                    "Node": {
                        "type": "object",
                        "properties": {
                            "label": {"type": "string"},
                            "next": {"$ref": "#/definitions/Node"}
                        },
                        "required": ["label"]
                    }
                },
                "$ref": "#/definitions/Node"
            }"##,
        )
        .unwrap();
        let r = parsed.resolver();
        let v = parsed.root.generate(&r).value().unwrap();
        assert!(parsed.root.matches(&v, &r).is_success(), "{v}");
    }

    #[test]
    fn discriminated_union_routes() {
        let parsed = parse_schema(
            r##"{
                "definitions": {
                    "Cat": {
                        "type": "object",
                        "properties": {"kind": {"const": "cat"}, "lives": {"type": "integer"}},
                        "required": ["kind"]
                    },
                    "Dog": {
                        "type": "object",
                        "properties": {"kind": {"const": "dog"}},
                        "required": ["kind"]
                    }
                },
                "oneOf": [
                    {"$ref": "#/definitions/Cat"},
                    {"$ref": "#/definitions/Dog"}
                ],
                "discriminator": {
                    "propertyName": "kind",
                    "mapping": {"cat": "#/definitions/Cat", "dog": "#/definitions/Dog"}
                }
            }"##,
        )
        .unwrap();
        let r = parsed.resolver();
        assert!(parsed
            .root
            .matches(&json!({"kind": "cat", "lives": 9}), &r)
            .is_success());
        assert!(!parsed.root.matches(&json!({"kind": "fox"}), &r).is_success());
    }

    #[test]
    fn nullable_wraps_in_a_union() {
        let parsed =
            parse_schema(r#"{"type": "string", "nullable": true}"#).unwrap();
        let r = parsed.resolver();
        assert!(parsed.root.matches(&json!(null), &r).is_success());
        assert!(parsed.root.matches(&json!("x"), &r).is_success());
    }

    #[test]
    fn malformed_documents_report_the_path() {
        let err = parse_schema(r#"{"type": "object", "properties": {"a": {"minLength": "x"}}}"#)
            .unwrap_err();
        match err {
            ParseError::Json { path, .. } => assert!(path.contains("properties"), "{path}"),
            other => panic!("expected Json error, got {other}"),
        }
    }

    #[test]
    fn contradictory_bounds_surface_as_pattern_errors() {
        let err = parse_schema(r#"{"type": "integer", "minimum": 9, "maximum": 3}"#).unwrap_err();
        assert!(matches!(err, ParseError::Pattern(_)));
    }

    #[test]
    fn exclusive_bounds_that_empty_the_range_are_rejected() {
        let err = parse_schema(
            r#"{"type": "integer", "minimum": 5, "maximum": 5, "exclusiveMinimum": true}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::Pattern(_)));
    }

    #[test]
    fn unknown_ref_shapes_are_rejected() {
        let err = parse_schema(r##"{"$ref": "http://elsewhere/schema"}"##).unwrap_err();
        assert!(matches!(err, ParseError::BadRef(_)));
    }
}
