//! Field matching - maps caller field names onto backend field keys.
//!
//! Each input key runs through [`CASCADE`], an ordered list of strategies.
//! The first strategy that finds a field wins; within a strategy, fields are
//! scanned in declaration order and the first qualifying one is taken.
//!
//! | Stage | Strategy |
//! |-------|----------|
//! | 1 | key equals a field label |
//! | 2 | key contains a label, or a label contains the key |
//! | 3 | key equals a backend field key |
//! | 4 | key belongs to a synonym group; a label or backend key contains one of the group's spellings |
//!
//! Keys that match nothing are kept as-is.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::MapError;
use crate::source::MetadataSource;
use crate::types::{FieldDescriptor, MappingResult, MetadataFailurePolicy};

/// A matching strategy: returns the first field it accepts for `key`.
pub type MatchStrategy = for<'a> fn(&str, &'a [FieldDescriptor]) -> Option<&'a FieldDescriptor>;

/// Matching stages in evaluation order.
pub const CASCADE: &[(&str, MatchStrategy)] = &[
    ("exact_label", match_exact_label),
    ("label_containment", match_label_containment),
    ("exact_key", match_exact_key),
    ("synonym", match_synonym),
];

/// Common field concepts and their accepted spellings.
///
/// The first element of each pair is the canonical name; it is also listed
/// among the spellings.
pub const SYNONYMS: &[(&str, &[&str])] = &[
    ("姓名", &["name", "username", "用户名", "姓名"]),
    ("电话", &["phone", "tel", "mobile", "手机", "电话"]),
    ("邮箱", &["email", "mail", "邮件", "邮箱"]),
    ("地址", &["address", "地址", "住址"]),
    ("备注", &["remark", "note", "comment", "备注", "说明"]),
];

pub fn match_exact_label<'a>(
    key: &str,
    fields: &'a [FieldDescriptor],
) -> Option<&'a FieldDescriptor> {
    fields.iter().find(|f| f.label == key)
}

/// Bidirectional substring match. Empty keys and labels never match.
pub fn match_label_containment<'a>(
    key: &str,
    fields: &'a [FieldDescriptor],
) -> Option<&'a FieldDescriptor> {
    if key.is_empty() {
        return None;
    }
    fields
        .iter()
        .filter(|f| !f.label.is_empty())
        .find(|f| f.label.contains(key) || key.contains(f.label.as_str()))
}

pub fn match_exact_key<'a>(
    key: &str,
    fields: &'a [FieldDescriptor],
) -> Option<&'a FieldDescriptor> {
    fields.iter().find(|f| f.key == key)
}

/// Synonym lookup, case-insensitive.
///
/// Groups are tried in table order; a group applies when `key` is its
/// canonical name or one of its spellings.
pub fn match_synonym<'a>(
    key: &str,
    fields: &'a [FieldDescriptor],
) -> Option<&'a FieldDescriptor> {
    let key = key.to_lowercase();
    SYNONYMS
        .iter()
        .filter(|(canonical, spellings)| *canonical == key || spellings.contains(&key.as_str()))
        .find_map(|(_, spellings)| {
            fields.iter().find(|f| {
                let label = f.label.to_lowercase();
                let field_key = f.key.to_lowercase();
                spellings
                    .iter()
                    .any(|s| label.contains(s) || field_key.contains(s))
            })
        })
}

/// Run the cascade for one input key.
///
/// Returns the matching field and the name of the stage that found it.
pub fn find_field<'a>(
    key: &str,
    fields: &'a [FieldDescriptor],
) -> Option<(&'static str, &'a FieldDescriptor)> {
    CASCADE
        .iter()
        .find_map(|(stage, strategy)| strategy(key, fields).map(|field| (*stage, field)))
}

/// Rekey `record` against already-fetched descriptors.
pub fn map_record(record: &Map<String, Value>, fields: &[FieldDescriptor]) -> MappingResult {
    let mut mapped_record = Map::new();

    for (user_key, value) in record {
        match find_field(user_key, fields) {
            Some((stage, field)) => {
                debug!(
                    input = %user_key,
                    key = %field.key,
                    label = %field.label,
                    stage,
                    "mapped field"
                );
                insert_mapped(&mut mapped_record, user_key, &field.key, value);
            }
            None => {
                debug!(input = %user_key, "field left unmapped");
                insert_mapped(&mut mapped_record, user_key, user_key, value);
            }
        }
    }

    MappingResult {
        mapped_record,
        field_info: fields.iter().map(FieldDescriptor::info).collect(),
    }
}

// Later input keys win when two of them land on the same backend key.
fn insert_mapped(record: &mut Map<String, Value>, input: &str, key: &str, value: &Value) {
    if record.insert(key.to_string(), value.clone()).is_some() {
        warn!(
            input,
            key,
            "several input fields map to the same key, keeping the last value"
        );
    }
}

/// Fetch the form's descriptors and rekey `record` against them.
///
/// With [`MetadataFailurePolicy::Passthrough`] a failed descriptor fetch
/// returns the record unchanged with empty field info.
///
/// # Errors
///
/// Returns `MapError::FieldListing` if the fetch fails under
/// [`MetadataFailurePolicy::Fail`].
pub fn map_fields<S>(
    source: &S,
    form_id: &str,
    record: &Map<String, Value>,
    credential: &str,
    app_id: Option<&str>,
    policy: MetadataFailurePolicy,
) -> Result<MappingResult, MapError>
where
    S: MetadataSource + ?Sized,
{
    match fetch_fields(source, form_id, credential, app_id, policy)? {
        Some(fields) => Ok(map_record(record, &fields)),
        None => Ok(MappingResult {
            mapped_record: record.clone(),
            field_info: Vec::new(),
        }),
    }
}

/// Fetch descriptors, applying the failure policy.
///
/// `Ok(None)` means the fetch failed and the caller should pass data through.
pub fn fetch_fields<S>(
    source: &S,
    form_id: &str,
    credential: &str,
    app_id: Option<&str>,
    policy: MetadataFailurePolicy,
) -> Result<Option<Vec<FieldDescriptor>>, MapError>
where
    S: MetadataSource + ?Sized,
{
    match source.list_fields(form_id, app_id, credential) {
        Ok(fields) => Ok(Some(fields)),
        Err(err) => match policy {
            MetadataFailurePolicy::Passthrough => {
                warn!(form = form_id, error = %err, "field mapping skipped, using original keys");
                Ok(None)
            }
            MetadataFailurePolicy::Fail => Err(MapError::FieldListing {
                form: form_id.to_string(),
                source: err,
            }),
        },
    }
}
