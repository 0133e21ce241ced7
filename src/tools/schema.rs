//! Declarative argument schemas: validation of raw JSON and the JSON Schema served to clients.

use std::sync::OnceLock;

use jsonschema::error::ValidationErrorKind;
use jsonschema::{Draft, JSONSchema, ValidationError};
use serde_json::{json, Map, Value};

use crate::error::{GatewayError, Issue};

#[derive(Debug, Clone, Copy)]
pub enum Kind {
    Str,
    PositiveInt,
    StrList,
    PositiveIntList,
    StrMap,
    OneOf(&'static [&'static str]),
    /// A list of objects. Validation only checks the outer shape; items are validated by the tool.
    Records(&'static [Field]),
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub kind: Kind,
    pub required: bool,
    pub non_empty: bool,
    pub description: &'static str,
}

impl Field {
    pub const fn required(name: &'static str, kind: Kind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            non_empty: false,
            description,
        }
    }

    pub const fn optional(name: &'static str, kind: Kind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            non_empty: false,
            description,
        }
    }

    pub const fn non_empty(self) -> Self {
        Self {
            non_empty: true,
            ..self
        }
    }
}

/// A tool's argument schema: the field descriptors plus the JSON Schema compiled from them
/// on first use.
pub struct Schema {
    fields: &'static [Field],
    compiled: OnceLock<Result<JSONSchema, String>>,
}

impl Schema {
    pub const fn new(fields: &'static [Field]) -> Self {
        Self {
            fields,
            compiled: OnceLock::new(),
        }
    }

    /// JSON Schema served to clients by `tools/list`.
    pub fn json(&self) -> Value {
        object_schema(self.fields, true)
    }

    fn compiled(&self) -> Result<&JSONSchema, GatewayError> {
        self.compiled
            .get_or_init(|| {
                // Record lists are only checked for shape here; the tool validates each item.
                let schema = object_schema(self.fields, false);
                JSONSchema::options()
                    .with_draft(Draft::Draft7)
                    .compile(&schema)
                    .map_err(|e| e.to_string())
            })
            .as_ref()
            .map_err(|e| GatewayError::Operation(format!("Invalid argument schema: {}", e)))
    }

    /// Every issue with `args`, paths nested under `prefix`. Null arguments count as an
    /// empty object and null-valued keys as absent.
    pub fn validate_at(&self, prefix: &str, args: &Value) -> Result<Vec<Issue>, GatewayError> {
        let compiled = self.compiled()?;
        let args = without_nulls(args);
        let issues = match compiled.validate(&args) {
            Ok(()) => Vec::new(),
            Err(errors) => errors.map(|e| to_issue(prefix, e)).collect(),
        };
        Ok(issues)
    }
}

/// Null becomes `{}` and null-valued keys of an object are dropped.
pub fn without_nulls(args: &Value) -> Value {
    match args {
        Value::Null => Value::Object(Map::new()),
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn push_segment(path: &mut String, segment: &str, is_index: bool) {
    if is_index {
        path.push_str(&format!("[{}]", segment));
    } else {
        if !path.is_empty() {
            path.push('.');
        }
        path.push_str(segment);
    }
}

fn to_issue(prefix: &str, error: ValidationError<'_>) -> Issue {
    let mut path = prefix.to_string();
    for segment in error.instance_path.clone().into_vec() {
        let is_index = segment.parse::<usize>().is_ok();
        push_segment(&mut path, &segment, is_index);
    }

    match &error.kind {
        ValidationErrorKind::Required { property } => {
            let name = property
                .as_str()
                .map(String::from)
                .unwrap_or_else(|| property.to_string());
            push_segment(&mut path, &name, false);
            Issue::new(path, "is required")
        }
        _ => Issue::new(path, error.to_string()),
    }
}

fn object_schema(schema: &[Field], detailed_records: bool) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for field in schema {
        properties.insert(field.name.to_string(), property_schema(field, detailed_records));
        if field.required {
            required.push(field.name);
        }
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn property_schema(field: &Field, detailed_records: bool) -> Value {
    let mut property = match field.kind {
        Kind::Str => json!({ "type": "string" }),
        Kind::PositiveInt => json!({ "type": "integer", "minimum": 1 }),
        Kind::StrList => json!({ "type": "array", "items": { "type": "string" } }),
        Kind::PositiveIntList => {
            json!({ "type": "array", "items": { "type": "integer", "minimum": 1 } })
        }
        Kind::StrMap => json!({ "type": "object", "additionalProperties": { "type": "string" } }),
        Kind::OneOf(options) => json!({ "type": "string", "enum": options }),
        Kind::Records(fields) if detailed_records => {
            json!({ "type": "array", "items": object_schema(fields, true) })
        }
        Kind::Records(_) => json!({ "type": "array", "items": { "type": "object" } }),
    };

    if let Value::Object(map) = &mut property {
        map.insert("description".into(), json!(field.description));
        if field.non_empty {
            let key = match field.kind {
                Kind::Str => "minLength",
                Kind::StrMap => "minProperties",
                _ => "minItems",
            };
            map.insert(key.into(), json!(1));
        }
    }
    property
}
