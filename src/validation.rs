//! Input validation for tool arguments.
//!
//! Each tool façade declares a small, data-driven [`ToolInputSchema`]
//! (mirroring spec §6's "JSON Schema derived from each tool's declared
//! input shape, including enums for field selectors"). Validation failures
//! become [`crate::Error::Validation`], which both transports map to a
//! 422/invalid-params response rather than catching internally — the same
//! propagation policy the teacher's `gateway::router` applies to malformed
//! request bodies.

use serde_json::{Map, Value, json};

use crate::{Error, Result};

/// The shape a single input field is expected to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A JSON string.
    String,
    /// A JSON array of strings.
    StringArray,
    /// A JSON boolean.
    Bool,
}

/// One field of a tool's declared input shape.
#[derive(Debug, Clone, Copy)]
pub struct FieldSchema {
    /// Field name, as it appears in the `arguments` object.
    pub name: &'static str,
    /// Expected JSON shape.
    pub kind: FieldKind,
    /// Whether the field must be present.
    pub required: bool,
    /// Legal values, when the field is a closed selector (e.g.
    /// `include_fields`). `None` means any value of `kind` is accepted.
    pub enum_values: Option<&'static [&'static str]>,
}

/// A tool's full declared input shape: an ordered list of fields, rendered
/// on demand into a JSON Schema object for `list_tools` / `GET
/// /tools/registry`, and used to validate `arguments` before a façade runs.
#[derive(Debug, Clone, Copy)]
pub struct ToolInputSchema {
    /// Declared fields, in declaration order.
    pub fields: &'static [FieldSchema],
}

impl ToolInputSchema {
    /// Render this schema as a JSON Schema `object` definition.
    #[must_use]
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for field in self.fields {
            let mut prop = Map::new();
            match field.kind {
                FieldKind::String => {
                    prop.insert("type".to_string(), json!("string"));
                }
                FieldKind::StringArray => {
                    prop.insert("type".to_string(), json!("array"));
                    prop.insert("items".to_string(), json!({"type": "string"}));
                }
                FieldKind::Bool => {
                    prop.insert("type".to_string(), json!("boolean"));
                }
            }
            if let Some(values) = field.enum_values {
                let target = if field.kind == FieldKind::StringArray { "items" } else { "" };
                if target.is_empty() {
                    prop.insert("enum".to_string(), json!(values));
                } else if let Some(items) = prop.get_mut("items") {
                    items.as_object_mut().unwrap().insert("enum".to_string(), json!(values));
                }
            }
            properties.insert(field.name.to_string(), Value::Object(prop));
            if field.required {
                required.push(json!(field.name));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Validate `arguments` against this schema: every required field
    /// present, every present field matching its declared `kind`, and every
    /// enum-constrained value drawn from its legal set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] describing the first mismatch found.
    pub fn validate(&self, arguments: &Value) -> Result<()> {
        let Some(object) = arguments.as_object() else {
            return Err(Error::Validation("arguments must be a JSON object".to_string()));
        };

        for field in self.fields {
            let Some(value) = object.get(field.name) else {
                if field.required {
                    return Err(Error::Validation(format!("missing required field '{}'", field.name)));
                }
                continue;
            };
            self.validate_field(field, value)?;
        }

        Ok(())
    }

    fn validate_field(&self, field: &FieldSchema, value: &Value) -> Result<()> {
        match field.kind {
            FieldKind::String => {
                let Some(s) = value.as_str() else {
                    return Err(Error::Validation(format!("field '{}' must be a string", field.name)));
                };
                Self::check_enum(field, std::slice::from_ref(&s.to_string()))
            }
            FieldKind::Bool => {
                if value.as_bool().is_none() {
                    return Err(Error::Validation(format!("field '{}' must be a boolean", field.name)));
                }
                Ok(())
            }
            FieldKind::StringArray => {
                let Some(items) = value.as_array() else {
                    return Err(Error::Validation(format!("field '{}' must be an array of strings", field.name)));
                };
                let mut strings = Vec::with_capacity(items.len());
                for item in items {
                    let Some(s) = item.as_str() else {
                        return Err(Error::Validation(format!("field '{}' must contain only strings", field.name)));
                    };
                    strings.push(s.to_string());
                }
                Self::check_enum(field, &strings)
            }
        }
    }

    fn check_enum(field: &FieldSchema, values: &[String]) -> Result<()> {
        let Some(allowed) = field.enum_values else {
            return Ok(());
        };
        for value in values {
            if value == "all" {
                continue;
            }
            if !allowed.contains(&value.as_str()) {
                return Err(Error::Validation(format!("field '{}' has an unrecognized value '{value}'", field.name)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: ToolInputSchema = ToolInputSchema {
        fields: &[
            FieldSchema {
                name: "symbol",
                kind: FieldKind::String,
                required: true,
                enum_values: None,
            },
            FieldSchema {
                name: "include_fields",
                kind: FieldKind::StringArray,
                required: false,
                enum_values: Some(&["basic", "market", "holders"]),
            },
        ],
    };

    #[test]
    fn missing_required_field_is_rejected() {
        let err = SCHEMA.validate(&json!({})).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn wrong_type_is_rejected() {
        let err = SCHEMA.validate(&json!({"symbol": 123})).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn unrecognized_enum_value_is_rejected() {
        let err = SCHEMA.validate(&json!({"symbol": "BTC", "include_fields": ["nonsense"]})).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn all_expands_past_enum_check() {
        assert!(SCHEMA.validate(&json!({"symbol": "BTC", "include_fields": ["all"]})).is_ok());
    }

    #[test]
    fn valid_arguments_pass() {
        assert!(SCHEMA.validate(&json!({"symbol": "BTC", "include_fields": ["basic", "market"]})).is_ok());
    }

    #[test]
    fn json_schema_rendering_includes_enum_on_array_items() {
        let schema = SCHEMA.to_json_schema();
        assert_eq!(schema["properties"]["include_fields"]["items"]["enum"][0], "basic");
        assert_eq!(schema["required"][0], "symbol");
    }
}
