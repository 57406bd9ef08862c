//! Remote-call seams.
//!
//! The resolver and matcher only need [`MetadataSource`]; the operation layer
//! needs the full [`FormApi`].

use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::types::{
    ApplicationSummary, DataIds, FieldDescriptor, FormSummary, FormTarget, QueryOptions,
    SubmitOptions, UpdateOptions,
};

/// Read-only metadata lookups.
pub trait MetadataSource {
    /// Applications visible to `credential`.
    fn list_applications(&self, credential: &str) -> Result<Vec<ApplicationSummary>, ApiError>;

    /// Forms under one application, in backend listing order.
    fn list_forms(&self, app_id: &str, credential: &str) -> Result<Vec<FormSummary>, ApiError>;

    /// Field descriptors of one form, in declaration order.
    fn list_fields(
        &self,
        form_id: &str,
        app_id: Option<&str>,
        credential: &str,
    ) -> Result<Vec<FieldDescriptor>, ApiError>;
}

/// Record-level data operations.
///
/// Records handed to these methods are already in the value-wrapped wire
/// shape produced by [`format_record`](crate::format_record).
pub trait FormApi: MetadataSource {
    /// Create one record, or several in one batch call.
    fn create_records(
        &self,
        target: FormTarget<'_>,
        records: Vec<Map<String, Value>>,
        options: &SubmitOptions,
        credential: &str,
    ) -> Result<Value, ApiError>;

    fn get_record(
        &self,
        target: FormTarget<'_>,
        data_id: &str,
        credential: &str,
    ) -> Result<Value, ApiError>;

    fn query_records(
        &self,
        target: FormTarget<'_>,
        query: &QueryOptions,
        credential: &str,
    ) -> Result<Value, ApiError>;

    fn update_record(
        &self,
        target: FormTarget<'_>,
        data_id: &str,
        record: Map<String, Value>,
        options: &UpdateOptions,
        credential: &str,
    ) -> Result<Value, ApiError>;

    fn delete_records(
        &self,
        target: FormTarget<'_>,
        ids: &DataIds,
        is_start_trigger: Option<bool>,
        credential: &str,
    ) -> Result<Value, ApiError>;

    fn upload_token(
        &self,
        target: FormTarget<'_>,
        transaction_id: &str,
        credential: &str,
    ) -> Result<Value, ApiError>;
}
