//! Data operations over loosely identified forms.
//!
//! [`FormBridge`] strings the pieces together for every operation: resolve
//! the caller's identifier, map field names, format records, make the remote
//! call, and classify the failure if there is one.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::cache::MetadataCache;
use crate::classify::classify_error;
use crate::error::{ApiError, BridgeError, MapError, ResolveError};
use crate::filter::validate_filter;
use crate::formatter::format_record;
use crate::matcher::{fetch_fields, map_fields, map_record};
use crate::resolver::resolve_form;
use crate::source::FormApi;
use crate::types::{
    json_type_name, ApplicationSummary, DataIds, FieldDescriptor, FieldInfo, FormSummary,
    FormTarget, MappingResult, QueryOptions, ResolvedForm, ResolverOptions, SubmitOptions,
    UpdateOptions, BATCH_LIMIT,
};

/// Who is calling, and which application data operations default to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    pub credential: String,
    /// Used when the form identifier doesn't resolve to an application.
    pub app_id: Option<String>,
}

impl CallContext {
    pub fn new(credential: impl Into<String>) -> Self {
        Self {
            credential: credential.into(),
            app_id: None,
        }
    }

    pub fn app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }
}

/// Result of a single-form data operation.
#[derive(Debug, Clone, Serialize)]
pub struct OperationReport {
    pub form_used: String,
    pub app_id: String,
    /// Ambiguity advisory when the identifier named a multi-form application.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    pub result: Value,
}

/// Field descriptors of a resolved form.
#[derive(Debug, Clone, Serialize)]
pub struct FieldsReport {
    pub form_used: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    pub fields: Vec<FieldDescriptor>,
}

/// Result of a record submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitReport {
    pub form_used: String,
    pub app_id: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    pub result: Value,
    pub original_data: Value,
    /// Records as sent: mapped to backend keys and value-wrapped.
    pub processed_data: Value,
    /// Present when field matching ran against fetched descriptors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_mapping: Option<Vec<FieldInfo>>,
}

/// Applications visible to a credential, or the forms of one application.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Listing {
    Applications {
        apps: Vec<ApplicationSummary>,
        total: usize,
    },
    Forms {
        app_id: String,
        forms: Vec<FormSummary>,
        total: usize,
    },
}

/// Form data operations with identifier resolution and field mapping.
#[derive(Debug)]
pub struct FormBridge<A> {
    api: A,
    cache: MetadataCache,
    options: ResolverOptions,
}

impl<A: FormApi> FormBridge<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            cache: MetadataCache::new(),
            options: ResolverOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Resolve a form or application identifier. See [`resolve_form`].
    pub fn resolve_form(
        &self,
        identifier: &str,
        credential: &str,
    ) -> Result<ResolvedForm, ResolveError> {
        resolve_form(&self.api, &self.cache, identifier, credential, &self.options)
    }

    /// Rekey `record` to the form's backend field keys. See [`map_fields`].
    pub fn map_fields(
        &self,
        form_id: &str,
        record: &Map<String, Value>,
        credential: &str,
        app_id: Option<&str>,
    ) -> Result<MappingResult, MapError> {
        map_fields(
            &self.api,
            form_id,
            record,
            credential,
            app_id,
            self.options.metadata_failure,
        )
    }

    /// List applications (through the cache), or the forms of `app_id`
    /// (always fresh).
    pub fn list_apps_and_forms(
        &self,
        credential: &str,
        app_id: Option<&str>,
    ) -> Result<Listing, BridgeError> {
        match app_id {
            Some(app_id) => {
                let forms = self
                    .api
                    .list_forms(app_id, credential)
                    .map_err(|e| remote(e, "List forms"))?;
                Ok(Listing::Forms {
                    app_id: app_id.to_string(),
                    total: forms.len(),
                    forms,
                })
            }
            None => {
                let apps = self
                    .cache
                    .fetch(&self.api, credential, self.options.metadata_failure)
                    .map_err(|e| remote(e, "List applications"))?;
                Ok(Listing::Applications {
                    total: apps.len(),
                    apps,
                })
            }
        }
    }

    /// Field descriptors of the form `form` resolves to.
    pub fn form_fields(&self, ctx: &CallContext, form: &str) -> Result<FieldsReport, BridgeError> {
        let resolved = self.resolve_form(form, &ctx.credential)?;
        let app_id = resolved.application_id.as_deref().or(ctx.app_id.as_deref());

        let fields = self
            .api
            .list_fields(&resolved.form_handle, app_id, &ctx.credential)
            .map_err(|e| remote(e, "Get form fields"))?;

        Ok(FieldsReport {
            form_used: resolved.form_handle.clone(),
            app_id: app_id.map(String::from),
            notice: resolved.notice(),
            fields,
        })
    }

    /// Submit one record (a JSON object) or a batch (an array of objects).
    ///
    /// Batches are limited to [`BATCH_LIMIT`] records; larger or empty
    /// batches are rejected before any remote call.
    pub fn submit(
        &self,
        ctx: &CallContext,
        form: &str,
        data: Value,
        options: &SubmitOptions,
    ) -> Result<SubmitReport, BridgeError> {
        let records = records_from(&data)?;
        let (resolved, app_id) = self.target(ctx, form)?;
        info!(form = %resolved.form_handle, %app_id, records = records.len(), "submitting records");

        let mut field_mapping = None;
        let mapped: Vec<Map<String, Value>> = if options.auto_match {
            match fetch_fields(
                &self.api,
                &resolved.form_handle,
                &ctx.credential,
                Some(&app_id),
                self.options.metadata_failure,
            )? {
                Some(fields) => {
                    let mapped = records
                        .iter()
                        .map(|record| map_record(record, &fields).mapped_record)
                        .collect();
                    field_mapping = Some(fields.iter().map(FieldDescriptor::info).collect());
                    mapped
                }
                None => records.clone(),
            }
        } else {
            records.clone()
        };

        let formatted: Vec<Map<String, Value>> = mapped.iter().map(format_record).collect();
        let processed_data = if data.is_array() {
            Value::Array(formatted.iter().cloned().map(Value::Object).collect())
        } else {
            formatted
                .first()
                .cloned()
                .map(Value::Object)
                .unwrap_or(Value::Null)
        };

        let target = FormTarget {
            app_id: &app_id,
            form_id: &resolved.form_handle,
        };
        let result = self
            .api
            .create_records(target, formatted, options, &ctx.credential)
            .map_err(|e| remote(e, "Submit form data"))?;

        let mut message = format!("submitted {} record(s)", records.len());
        if resolved.is_ambiguous() {
            message.push_str("; the application has several forms, the first one was used");
        }

        Ok(SubmitReport {
            form_used: resolved.form_handle.clone(),
            app_id,
            message,
            notice: resolved.notice(),
            result,
            original_data: data,
            processed_data,
            field_mapping,
        })
    }

    pub fn get_record(
        &self,
        ctx: &CallContext,
        form: &str,
        data_id: &str,
    ) -> Result<OperationReport, BridgeError> {
        let (resolved, app_id) = self.target(ctx, form)?;
        let target = FormTarget {
            app_id: &app_id,
            form_id: &resolved.form_handle,
        };
        let result = self
            .api
            .get_record(target, data_id, &ctx.credential)
            .map_err(|e| remote(e, "Get form data"))?;
        Ok(report(resolved, app_id, result))
    }

    /// Query records. `limit` must be within 1..=100 and `filter`, if given,
    /// must satisfy [`filter_schema`](crate::filter_schema).
    pub fn query(
        &self,
        ctx: &CallContext,
        form: &str,
        options: &QueryOptions,
    ) -> Result<OperationReport, BridgeError> {
        if let Some(limit) = options.limit {
            if limit == 0 || limit as usize > BATCH_LIMIT {
                return Err(BridgeError::invalid_input(format!(
                    "limit must be between 1 and {BATCH_LIMIT}, got {limit}"
                )));
            }
        }
        if let Some(filter) = &options.filter {
            validate_filter(filter).map_err(|errors| BridgeError::InvalidFilter { errors })?;
        }

        let (resolved, app_id) = self.target(ctx, form)?;
        let target = FormTarget {
            app_id: &app_id,
            form_id: &resolved.form_handle,
        };
        let result = self
            .api
            .query_records(target, options, &ctx.credential)
            .map_err(|e| remote(e, "Query form data"))?;
        Ok(report(resolved, app_id, result))
    }

    /// Update one record. `data` must be a JSON object.
    pub fn update(
        &self,
        ctx: &CallContext,
        form: &str,
        data_id: &str,
        data: &Value,
        options: &UpdateOptions,
    ) -> Result<OperationReport, BridgeError> {
        let record = data
            .as_object()
            .ok_or_else(|| {
                BridgeError::invalid_input(format!(
                    "update data must be a JSON object, got {}",
                    json_type_name(data)
                ))
            })?;
        let (resolved, app_id) = self.target(ctx, form)?;

        let mapped = if options.auto_match {
            self.map_fields(
                &resolved.form_handle,
                record,
                &ctx.credential,
                Some(&app_id),
            )?
            .mapped_record
        } else {
            record.clone()
        };

        let target = FormTarget {
            app_id: &app_id,
            form_id: &resolved.form_handle,
        };
        let result = self
            .api
            .update_record(
                target,
                data_id,
                format_record(&mapped),
                options,
                &ctx.credential,
            )
            .map_err(|e| remote(e, "Update form data"))?;
        Ok(report(resolved, app_id, result))
    }

    pub fn delete(
        &self,
        ctx: &CallContext,
        form: &str,
        ids: &DataIds,
        is_start_trigger: Option<bool>,
    ) -> Result<OperationReport, BridgeError> {
        if ids.is_empty() {
            return Err(BridgeError::invalid_input("no record ids to delete"));
        }
        let (resolved, app_id) = self.target(ctx, form)?;
        let target = FormTarget {
            app_id: &app_id,
            form_id: &resolved.form_handle,
        };
        let result = self
            .api
            .delete_records(target, ids, is_start_trigger, &ctx.credential)
            .map_err(|e| remote(e, "Delete form data"))?;
        Ok(report(resolved, app_id, result))
    }

    /// Upload tokens for file and image fields, bound to `transaction_id`.
    pub fn upload_token(
        &self,
        ctx: &CallContext,
        form: &str,
        transaction_id: &str,
    ) -> Result<OperationReport, BridgeError> {
        if transaction_id.is_empty() {
            return Err(BridgeError::invalid_input("transaction id must not be empty"));
        }
        let (resolved, app_id) = self.target(ctx, form)?;
        let target = FormTarget {
            app_id: &app_id,
            form_id: &resolved.form_handle,
        };
        let result = self
            .api
            .upload_token(target, transaction_id, &ctx.credential)
            .map_err(|e| remote(e, "Get upload token"))?;
        Ok(report(resolved, app_id, result))
    }

    /// Resolve `form` and pick the application id for the data call.
    fn target(&self, ctx: &CallContext, form: &str) -> Result<(ResolvedForm, String), BridgeError> {
        let resolved = self.resolve_form(form, &ctx.credential)?;
        let app_id = resolved
            .application_id
            .clone()
            .or_else(|| ctx.app_id.clone())
            .ok_or_else(|| {
                BridgeError::invalid_input(format!(
                    "an application id is required to use form {}",
                    resolved.form_handle
                ))
            })?;
        Ok((resolved, app_id))
    }
}

/// Split submission data into records, enforcing the batch ceiling.
fn records_from(data: &Value) -> Result<Vec<Map<String, Value>>, BridgeError> {
    match data {
        Value::Object(record) => Ok(vec![record.clone()]),
        Value::Array(items) => {
            if items.is_empty() {
                return Err(BridgeError::invalid_input("no records to submit"));
            }
            if items.len() > BATCH_LIMIT {
                return Err(BridgeError::BatchTooLarge { count: items.len() });
            }
            items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    item.as_object().cloned().ok_or_else(|| {
                        BridgeError::invalid_input(format!(
                            "record {i} is not a JSON object (got {})",
                            json_type_name(item)
                        ))
                    })
                })
                .collect()
        }
        other => Err(BridgeError::invalid_input(format!(
            "data must be a JSON object or an array of objects, got {}",
            json_type_name(other)
        ))),
    }
}

fn report(resolved: ResolvedForm, app_id: String, result: Value) -> OperationReport {
    OperationReport {
        notice: resolved.notice(),
        form_used: resolved.form_handle,
        app_id,
        result,
    }
}

fn remote(source: ApiError, context: &str) -> BridgeError {
    BridgeError::Remote {
        classified: classify_error(&source, context),
        source,
    }
}
