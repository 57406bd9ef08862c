//! Core types for form resolution and field mapping.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Length of a backend form handle (`entry_id`).
pub const FORM_HANDLE_LEN: usize = 24;

/// Hard ceiling on records per submission call.
pub const BATCH_LIMIT: usize = 100;

/// Default page size for record queries.
pub const DEFAULT_QUERY_LIMIT: u32 = 10;

/// Display name used for forms the backend returns without one.
pub const UNNAMED_FORM: &str = "Unnamed form";

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Whether `s` has the exact lexical shape of a backend form handle:
/// 24 hexadecimal characters, case-insensitive.
pub fn looks_like_form_handle(s: &str) -> bool {
    s.len() == FORM_HANDLE_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Read-only snapshot of a remote application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSummary {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Backend timestamps are passed through verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl ApplicationSummary {
    /// Decode one entry of the `app/list` response.
    ///
    /// Returns `None` for entries without an `app_id`.
    pub fn from_json(value: &Value) -> Option<Self> {
        let id = value.get("app_id").and_then(Value::as_str)?;
        Some(Self {
            id: id.to_string(),
            name: str_field(value, "name").unwrap_or_default(),
            description: str_field(value, "description"),
            created_at: timestamp_field(value, "created_time"),
            updated_at: timestamp_field(value, "updated_time"),
        })
    }
}

/// One form listed under an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSummary {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl FormSummary {
    /// Decode one entry of the `entry/list` response.
    ///
    /// The id comes from `entry_id`, falling back to `_id`. Entries with
    /// neither are skipped.
    pub fn from_json(value: &Value) -> Option<Self> {
        let id = str_field(value, "entry_id").or_else(|| str_field(value, "_id"))?;
        Some(Self {
            id,
            name: str_field(value, "name")
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| UNNAMED_FORM.to_string()),
            description: str_field(value, "description"),
            created_at: timestamp_field(value, "created_time"),
            updated_at: timestamp_field(value, "updated_time"),
        })
    }

    /// Human-readable `"name (id)"` label used in ambiguity notices.
    pub fn display_label(&self) -> String {
        format!("{} ({})", self.name, self.id)
    }
}

/// Kind of a form field, normalized from the backend widget type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    #[default]
    Text,
    Number,
    Date,
    Datetime,
    SerialNo,
    Address,
    Location,
    Image,
    File,
    Select,
    MultiSelect,
    Checkbox,
    Radio,
    User,
    Dept,
    Subform,
    Formula,
    Phone,
}

impl FieldKind {
    /// Map a backend widget type. Unknown types are treated as text.
    pub fn from_widget_type(widget_type: &str) -> Self {
        match widget_type {
            "text" | "textarea" => FieldKind::Text,
            "number" => FieldKind::Number,
            "date" => FieldKind::Date,
            "datetime" => FieldKind::Datetime,
            "sn" => FieldKind::SerialNo,
            "address" => FieldKind::Address,
            "location" => FieldKind::Location,
            "image" => FieldKind::Image,
            "file" => FieldKind::File,
            "single_select" => FieldKind::Select,
            "multiple_select" => FieldKind::MultiSelect,
            "checkbox" => FieldKind::Checkbox,
            "radio" => FieldKind::Radio,
            "user" => FieldKind::User,
            "dept" => FieldKind::Dept,
            "subform" => FieldKind::Subform,
            "formula" => FieldKind::Formula,
            "phone" => FieldKind::Phone,
            _ => FieldKind::Text,
        }
    }
}

/// Backend metadata for one form field.
///
/// `sub_fields` is only populated for [`FieldKind::Subform`], which makes
/// descriptors a tree mirroring the nested form structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Backend field key (`_widget_...`).
    pub key: String,
    /// Human-facing name.
    pub label: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_fields: Option<Vec<FieldDescriptor>>,
}

impl FieldDescriptor {
    pub fn new(key: impl Into<String>, label: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            kind,
            required: false,
            sub_fields: None,
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_sub_fields(mut self, sub_fields: Vec<FieldDescriptor>) -> Self {
        self.sub_fields = Some(sub_fields);
        self
    }

    /// Decode one backend widget, recursing into subform `items`.
    ///
    /// Returns `None` for widgets without a `name`.
    pub fn from_widget(widget: &Value) -> Option<Self> {
        let key = str_field(widget, "name")?;
        let widget_type = widget.get("type").and_then(Value::as_str).unwrap_or("");
        let kind = FieldKind::from_widget_type(widget_type);

        let sub_fields = match (kind, widget.get("items").and_then(Value::as_array)) {
            (FieldKind::Subform, Some(items)) => {
                Some(items.iter().filter_map(FieldDescriptor::from_widget).collect())
            }
            _ => None,
        };

        Some(Self {
            key,
            label: str_field(widget, "label").unwrap_or_default(),
            kind,
            required: widget
                .get("required")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            sub_fields,
        })
    }

    /// Flattened summary without sub-fields.
    pub fn info(&self) -> FieldInfo {
        FieldInfo {
            key: self.key.clone(),
            label: self.label.clone(),
            kind: self.kind,
            required: self.required,
        }
    }
}

/// Flattened field summary returned for caller-side introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub required: bool,
}

/// Outcome of form resolution.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ResolvedForm {
    /// Exact backend form handle to use for data operations.
    pub form_handle: String,
    /// Set when the identifier named an application.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    /// `"name (id)"` for every form under the application, in listing order.
    /// Only set when there was more than one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ambiguous_alternatives: Option<Vec<String>>,
}

impl ResolvedForm {
    /// Resolution result that names a form directly.
    pub fn direct(form_handle: impl Into<String>) -> Self {
        Self {
            form_handle: form_handle.into(),
            ..Self::default()
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        self.ambiguous_alternatives
            .as_ref()
            .is_some_and(|alts| alts.len() > 1)
    }

    /// Advisory text listing the alternatives, if resolution was ambiguous.
    pub fn notice(&self) -> Option<String> {
        let alternatives = self.ambiguous_alternatives.as_ref()?;
        if alternatives.len() < 2 {
            return None;
        }
        let mut notice = String::from(
            "multiple forms found under this application; the first one was used. Available forms:",
        );
        for alt in alternatives {
            notice.push_str("\n- ");
            notice.push_str(alt);
        }
        Some(notice)
    }
}

/// Record rekeyed to backend field keys, plus the form's field summary.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct MappingResult {
    pub mapped_record: Map<String, Value>,
    pub field_info: Vec<FieldInfo>,
}

/// Diagnosis of a failed remote call, ready for presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ClassifiedError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl std::fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// What to do when a metadata lookup (application list, field descriptors)
/// fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataFailurePolicy {
    /// Log and continue with the caller's identifier or record unchanged.
    #[default]
    Passthrough,
    /// Surface the lookup failure as an error.
    Fail,
}

/// Options for form resolution and field mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverOptions {
    pub metadata_failure: MetadataFailurePolicy,
    /// Treat 24-hex-character identifiers as form handles without a lookup.
    pub handle_fast_path: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            metadata_failure: MetadataFailurePolicy::Passthrough,
            handle_fast_path: true,
        }
    }
}

impl ResolverOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metadata_failure(mut self, policy: MetadataFailurePolicy) -> Self {
        self.metadata_failure = policy;
        self
    }

    pub fn handle_fast_path(mut self, enabled: bool) -> Self {
        self.handle_fast_path = enabled;
        self
    }
}

/// Application and form a data operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormTarget<'a> {
    pub app_id: &'a str,
    pub form_id: &'a str,
}

/// Optional flags for record creation. Field matching is on by default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmitOptions {
    /// Map caller field names to backend keys before formatting.
    pub auto_match: bool,
    pub transaction_id: Option<String>,
    pub data_creator: Option<String>,
    pub is_start_workflow: Option<bool>,
    pub is_start_trigger: Option<bool>,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            auto_match: true,
            transaction_id: None,
            data_creator: None,
            is_start_workflow: None,
            is_start_trigger: None,
        }
    }
}

impl SubmitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auto_match(mut self, enabled: bool) -> Self {
        self.auto_match = enabled;
        self
    }

    pub fn transaction_id(mut self, id: impl Into<String>) -> Self {
        self.transaction_id = Some(id.into());
        self
    }
}

/// Optional flags for record updates. Field matching is on by default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateOptions {
    pub auto_match: bool,
    pub transaction_id: Option<String>,
    pub is_start_trigger: Option<bool>,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            auto_match: true,
            transaction_id: None,
            is_start_trigger: None,
        }
    }
}

impl UpdateOptions {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Parameters of a record query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryOptions {
    /// Last record id of the previous page.
    pub data_id: Option<String>,
    /// Backend keys to return; all fields when empty.
    pub fields: Vec<String>,
    pub filter: Option<Value>,
    pub limit: Option<u32>,
}

/// One or more record ids for deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataIds {
    One(String),
    Many(Vec<String>),
}

impl DataIds {
    pub fn len(&self) -> usize {
        match self {
            DataIds::One(_) => 1,
            DataIds::Many(ids) => ids.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<String>> for DataIds {
    fn from(mut ids: Vec<String>) -> Self {
        if ids.len() == 1 {
            DataIds::One(ids.remove(0))
        } else {
            DataIds::Many(ids)
        }
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(String::from)
}

// Timestamps arrive as strings or epoch numbers depending on the endpoint.
fn timestamp_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
