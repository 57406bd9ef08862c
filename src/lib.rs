//! JianDaoYun Form Bridge
//!
//! Identifier resolution and field mapping for the JianDaoYun form data API.
//!
//! Callers name forms loosely (a form handle, or the id of the application
//! that contains it) and fields by their human labels. This library turns
//! both into what the backend accepts, formats record values into the
//! `{ "value": ... }` wire shape, and classifies remote failures into
//! actionable messages.
//!
//! # Example
//!
//! ```
//! use jdy_bridge::{format_record, map_record, FieldDescriptor, FieldKind};
//! use serde_json::json;
//!
//! let fields = vec![
//!     FieldDescriptor::new("_widget_1", "Name", FieldKind::Text),
//!     FieldDescriptor::new("_widget_2", "Phone", FieldKind::Phone),
//! ];
//! let record = json!({ "Name": "Ada", "tel": "555-0100" });
//!
//! let mapped = map_record(record.as_object().unwrap(), &fields);
//! let wire = format_record(&mapped.mapped_record);
//!
//! assert_eq!(
//!     serde_json::Value::Object(wire),
//!     json!({
//!         "_widget_1": { "value": "Ada" },
//!         "_widget_2": { "value": "555-0100" }
//!     })
//! );
//! ```
//!
//! # Field Matching
//!
//! | Stage | Matches when |
//! |-------|--------------|
//! | `exact_label` | label equals the caller's key |
//! | `label_containment` | label contains the key, or the key contains the label |
//! | `exact_key` | backend key equals the caller's key |
//! | `synonym` | key and label/backend key share a [`SYNONYMS`] group |
//!
//! The first stage to match wins; unmatched keys pass through unchanged.
//!
//! # Form Resolution
//!
//! A 24-hex-character identifier is used as a form handle directly. Any other
//! identifier is looked up among the credential's applications (cached for
//! five minutes); an application resolves to its first form, and the other
//! forms are reported in [`ResolvedForm::notice`]. Identifiers that match no
//! application pass through unchanged.

mod bridge;
mod cache;
mod classify;
#[cfg(feature = "remote")]
mod client;
mod error;
mod filter;
mod formatter;
mod matcher;
mod resolver;
mod source;
#[cfg(test)]
mod testing;
mod types;

pub use bridge::{CallContext, FieldsReport, FormBridge, Listing, OperationReport, SubmitReport};
pub use cache::{MetadataCache, CACHE_TTL};
pub use classify::{classify_error, suggestion_for_code, FORM_NOT_FOUND_MESSAGE, KNOWN_API_CODES};
pub use error::{ApiError, BridgeError, FilterViolation, MapError, ResolveError};
pub use filter::{filter_schema, validate_filter};
pub use formatter::{format_record, format_typed, FieldValue, VALUE_KEY};
pub use matcher::{
    fetch_fields, find_field, map_fields, map_record, match_exact_key, match_exact_label,
    match_label_containment, match_synonym, MatchStrategy, CASCADE, SYNONYMS,
};
pub use resolver::resolve_form;
pub use source::{FormApi, MetadataSource};
pub use types::{
    json_type_name, looks_like_form_handle, ApplicationSummary, ClassifiedError, DataIds,
    FieldDescriptor, FieldInfo, FieldKind, FormSummary, FormTarget, MappingResult,
    MetadataFailurePolicy, QueryOptions, ResolvedForm, ResolverOptions, SubmitOptions,
    UpdateOptions, BATCH_LIMIT, DEFAULT_QUERY_LIMIT, FORM_HANDLE_LEN, UNNAMED_FORM,
};

#[cfg(feature = "remote")]
pub use client::{ClientConfig, HttpClient, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
