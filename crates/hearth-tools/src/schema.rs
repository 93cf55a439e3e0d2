//! Strict JSON-schema argument validation.
//!
//! Covers the subset of JSON Schema the tool surface declares: object
//! shells with typed properties, required lists, string enums, and
//! numeric bounds. Validation is strict about unknown fields so a
//! misspelled optional argument fails loudly instead of being
//! silently ignored. The offending field is always named.

use serde_json::Value;

use crate::error::{Result, ToolError};

/// Validate `args` against an object schema.
pub fn validate(schema: &Value, args: &Value) -> Result<()> {
    let properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .ok_or_else(|| ToolError::Execution("tool schema has no properties object".into()))?;

    let empty = Value::Object(serde_json::Map::new());
    let args = if args.is_null() { &empty } else { args };
    let args = args
        .as_object()
        .ok_or_else(|| ToolError::invalid("arguments", "expected a JSON object"))?;

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            let missing = match args.get(name) {
                None | Some(Value::Null) => true,
                Some(_) => false,
            };
            if missing {
                return Err(ToolError::invalid(name, "required argument is missing"));
            }
        }
    }

    for (name, value) in args {
        let Some(spec) = properties.get(name) else {
            return Err(ToolError::invalid(name, "unknown argument"));
        };
        if value.is_null() {
            continue;
        }
        check_value(name, spec, value)?;
    }

    Ok(())
}

fn check_value(name: &str, spec: &Value, value: &Value) -> Result<()> {
    let expected = spec.get("type").and_then(Value::as_str).unwrap_or("object");
    let matches = match expected {
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        other => {
            return Err(ToolError::Execution(format!(
                "tool schema declares unsupported type '{other}'"
            )))
        }
    };
    if !matches {
        return Err(ToolError::invalid(
            name,
            format!("expected {expected}, got {}", type_name(value)),
        ));
    }

    if let Some(domain) = spec.get("enum").and_then(Value::as_array) {
        if !domain.contains(value) {
            let allowed: Vec<&str> = domain.iter().filter_map(Value::as_str).collect();
            return Err(ToolError::invalid(
                name,
                format!("must be one of: {}", allowed.join(", ")),
            ));
        }
    }

    if let Some(number) = value.as_f64() {
        if let Some(minimum) = spec.get("minimum").and_then(Value::as_f64) {
            if number < minimum {
                return Err(ToolError::invalid(name, format!("must be at least {minimum}")));
            }
        }
        if let Some(maximum) = spec.get("maximum").and_then(Value::as_f64) {
            if number > maximum {
                return Err(ToolError::invalid(name, format!("must be at most {maximum}")));
            }
        }
    }

    if let Some(items) = spec.get("items") {
        if let Some(elements) = value.as_array() {
            for (index, element) in elements.iter().enumerate() {
                check_value(&format!("{name}[{index}]"), items, element)?;
            }
        }
    }

    Ok(())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
