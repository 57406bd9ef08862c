//! Query filter validation against the backend's filter schema.

use std::sync::OnceLock;

use serde_json::{json, Value};

use crate::error::FilterViolation;

/// JSON Schema for the `filter` parameter of record queries.
pub fn filter_schema() -> &'static Value {
    static SCHEMA: OnceLock<Value> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        json!({
            "type": "object",
            "properties": {
                "rel": { "type": "string", "enum": ["and", "or"] },
                "cond": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "field": { "type": "string" },
                            "type": { "type": "string" },
                            "method": { "type": "string" },
                            "value": {}
                        },
                        "required": ["field", "method"]
                    }
                }
            },
            "required": ["rel", "cond"]
        })
    })
}

/// Validate a query filter before it is sent.
///
/// # Errors
///
/// Returns every violation found, each with a JSON Pointer into the filter.
pub fn validate_filter(filter: &Value) -> Result<(), Vec<FilterViolation>> {
    let validator = jsonschema::validator_for(filter_schema()).map_err(|e| {
        vec![FilterViolation {
            path: String::new(),
            message: format!("filter schema is invalid: {e}"),
        }]
    })?;

    let errors: Vec<FilterViolation> = validator
        .iter_errors(filter)
        .map(|e| FilterViolation {
            path: e.instance_path.to_string(),
            message: e.to_string(),
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
