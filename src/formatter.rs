//! Wire formatting - wraps record values in the `{ "value": ... }` shape the
//! backend requires.
//!
//! | Input value | Output |
//! |-------------|--------|
//! | `null` | key omitted |
//! | object with a `value` key | unchanged |
//! | array whose first element is an object | `{ "value": [format(each)] }` |
//! | any other object | `{ "value": object }` |
//! | date | `{ "value": "<ISO-8601>" }` |
//! | anything else | `{ "value": value }` |
//!
//! Formatting an already formatted record is a no-op.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

/// Key the backend expects around every field value.
pub const VALUE_KEY: &str = "value";

/// Shape of a single field value, as far as formatting is concerned.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// String, number, boolean, or an array of non-objects.
    Scalar(Value),
    Date(DateTime<Utc>),
    /// Composite value the caller already built (address, location, ...).
    NestedRecord(Map<String, Value>),
    /// Sub-form rows.
    NestedRecordList(Vec<Value>),
    /// Already in `{ "value": ... }` form.
    AlreadyWrapped(Map<String, Value>),
}

impl FieldValue {
    /// Classify a JSON value. Returns `None` for `null`, which is omitted.
    ///
    /// JSON has no date type, so strings are never classified as dates;
    /// use [`FieldValue::Date`] directly for typed input.
    pub fn classify(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Object(map) if map.contains_key(VALUE_KEY) => {
                Some(FieldValue::AlreadyWrapped(map))
            }
            Value::Object(map) => Some(FieldValue::NestedRecord(map)),
            Value::Array(items) if items.first().is_some_and(Value::is_object) => {
                Some(FieldValue::NestedRecordList(items))
            }
            other => Some(FieldValue::Scalar(other)),
        }
    }

    /// Wire representation of this value.
    pub fn into_wire(self) -> Value {
        match self {
            FieldValue::AlreadyWrapped(map) => Value::Object(map),
            FieldValue::NestedRecordList(items) => {
                wrap(Value::Array(items.into_iter().map(format_row).collect()))
            }
            FieldValue::NestedRecord(map) => wrap(Value::Object(map)),
            FieldValue::Date(date) => wrap(Value::String(
                date.to_rfc3339_opts(SecondsFormat::Millis, true),
            )),
            FieldValue::Scalar(value) => wrap(value),
        }
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(date: DateTime<Utc>) -> Self {
        FieldValue::Date(date)
    }
}

/// Format one record for submission.
pub fn format_record(record: &Map<String, Value>) -> Map<String, Value> {
    format_fields(record.iter().map(|(k, v)| (k.clone(), v.clone())))
}

/// Format a record built from typed values.
pub fn format_typed<I>(fields: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (String, FieldValue)>,
{
    fields
        .into_iter()
        .map(|(key, value)| (key, value.into_wire()))
        .collect()
}

fn format_fields<I>(fields: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (String, Value)>,
{
    fields
        .into_iter()
        .filter_map(|(key, value)| FieldValue::classify(value).map(|v| (key, v.into_wire())))
        .collect()
}

// Non-object rows in a sub-form list are kept as they are.
fn format_row(row: Value) -> Value {
    match row {
        Value::Object(map) => Value::Object(format_fields(map)),
        other => other,
    }
}

fn wrap(value: Value) -> Value {
    let mut map = Map::with_capacity(1);
    map.insert(VALUE_KEY.to_string(), value);
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fmt(value: Value) -> Value {
        Value::Object(format_record(value.as_object().unwrap()))
    }

    #[test]
    fn scalars_are_wrapped() {
        let out = fmt(json!({
            "name": "Ada",
            "age": 36,
            "active": true,
            "tags": ["a", "b"]
        }));
        assert_eq!(
            out,
            json!({
                "name": { "value": "Ada" },
                "age": { "value": 36 },
                "active": { "value": true },
                "tags": { "value": ["a", "b"] }
            })
        );
    }

    #[test]
    fn null_values_are_omitted() {
        let out = fmt(json!({ "a": null, "b": 1 }));
        assert_eq!(out, json!({ "b": { "value": 1 } }));
    }

    #[test]
    fn wrapped_values_pass_through() {
        let input = json!({ "a": { "value": "x" }, "b": { "value": null, "extra": 1 } });
        assert_eq!(fmt(input.clone()), input);
    }

    #[test]
    fn composite_objects_wrapped_unchanged() {
        let address = json!({ "province": "Zhejiang", "city": "Hangzhou", "detail": "1 Road" });
        let out = fmt(json!({ "addr": address.clone() }));
        assert_eq!(out, json!({ "addr": { "value": address } }));
    }

    #[test]
    fn subform_rows_are_formatted_recursively() {
        let out = fmt(json!({
            "items": [
                { "sku": "A1", "qty": 2, "note": null },
                { "sku": "B2", "qty": { "value": 5 } }
            ]
        }));
        assert_eq!(
            out,
            json!({
                "items": { "value": [
                    { "sku": { "value": "A1" }, "qty": { "value": 2 } },
                    { "sku": { "value": "B2" }, "qty": { "value": 5 } }
                ]}
            })
        );
    }

    #[test]
    fn empty_array_is_a_scalar() {
        let out = fmt(json!({ "tags": [] }));
        assert_eq!(out, json!({ "tags": { "value": [] } }));
    }

    #[test]
    fn formatting_is_idempotent() {
        let input = json!({
            "name": "Ada",
            "n": 1.5,
            "addr": { "city": "Hangzhou" },
            "rows": [{ "a": 1, "b": [1, 2] }],
            "skip": null
        });
        let once = fmt(input);
        let twice = fmt(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn dates_use_iso_8601_with_millis() {
        let date = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let out = format_typed([
            ("when".to_string(), FieldValue::from(date)),
            ("n".to_string(), FieldValue::Scalar(json!(1))),
        ]);
        assert_eq!(
            Value::Object(out),
            json!({
                "when": { "value": "2023-11-14T22:13:20.000Z" },
                "n": { "value": 1 }
            })
        );
    }

    #[test]
    fn classify_variants() {
        assert_eq!(FieldValue::classify(Value::Null), None);
        assert!(matches!(
            FieldValue::classify(json!({ "value": 1 })),
            Some(FieldValue::AlreadyWrapped(_))
        ));
        assert!(matches!(
            FieldValue::classify(json!([{ "a": 1 }])),
            Some(FieldValue::NestedRecordList(_))
        ));
        assert!(matches!(
            FieldValue::classify(json!([1, { "a": 1 }])),
            Some(FieldValue::Scalar(_))
        ));
        assert!(matches!(
            FieldValue::classify(json!({ "city": "x" })),
            Some(FieldValue::NestedRecord(_))
        ));
    }
}
