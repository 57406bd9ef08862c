//! In-memory metadata source for unit tests.

use std::cell::Cell;
use std::collections::HashMap;

use crate::error::ApiError;
use crate::source::MetadataSource;
use crate::types::{ApplicationSummary, FieldDescriptor, FormSummary};

pub(crate) struct FakeSource {
    pub apps: Result<Vec<ApplicationSummary>, ApiError>,
    pub forms: HashMap<String, Result<Vec<FormSummary>, ApiError>>,
    pub fields: Option<Result<Vec<FieldDescriptor>, ApiError>>,
    pub app_calls: Cell<usize>,
    pub form_calls: Cell<usize>,
    pub field_calls: Cell<usize>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            apps: Ok(Vec::new()),
            forms: HashMap::new(),
            fields: None,
            app_calls: Cell::new(0),
            form_calls: Cell::new(0),
            field_calls: Cell::new(0),
        }
    }

    pub fn with_apps(mut self, apps: Vec<ApplicationSummary>) -> Self {
        self.apps = Ok(apps);
        self
    }

    pub fn with_app_error(mut self, err: ApiError) -> Self {
        self.apps = Err(err);
        self
    }

    pub fn with_forms(mut self, app_id: &str, forms: Vec<FormSummary>) -> Self {
        self.forms.insert(app_id.to_string(), Ok(forms));
        self
    }

    pub fn with_form_error(mut self, app_id: &str, err: ApiError) -> Self {
        self.forms.insert(app_id.to_string(), Err(err));
        self
    }

    pub fn with_fields(mut self, fields: Vec<FieldDescriptor>) -> Self {
        self.fields = Some(Ok(fields));
        self
    }

    pub fn with_field_error(mut self, err: ApiError) -> Self {
        self.fields = Some(Err(err));
        self
    }

    pub fn total_calls(&self) -> usize {
        self.app_calls.get() + self.form_calls.get() + self.field_calls.get()
    }
}

impl MetadataSource for FakeSource {
    fn list_applications(&self, _credential: &str) -> Result<Vec<ApplicationSummary>, ApiError> {
        self.app_calls.set(self.app_calls.get() + 1);
        self.apps.clone()
    }

    fn list_forms(&self, app_id: &str, _credential: &str) -> Result<Vec<FormSummary>, ApiError> {
        self.form_calls.set(self.form_calls.get() + 1);
        self.forms.get(app_id).cloned().unwrap_or_else(|| Ok(Vec::new()))
    }

    fn list_fields(
        &self,
        _form_id: &str,
        _app_id: Option<&str>,
        _credential: &str,
    ) -> Result<Vec<FieldDescriptor>, ApiError> {
        self.field_calls.set(self.field_calls.get() + 1);
        self.fields.clone().unwrap_or_else(|| Ok(Vec::new()))
    }
}

pub(crate) fn app(id: &str, name: &str) -> ApplicationSummary {
    ApplicationSummary {
        id: id.to_string(),
        name: name.to_string(),
        description: None,
        created_at: None,
        updated_at: None,
    }
}

pub(crate) fn form(id: &str, name: &str) -> FormSummary {
    FormSummary {
        id: id.to_string(),
        name: name.to_string(),
        description: None,
        created_at: None,
        updated_at: None,
    }
}

pub(crate) fn transport_error() -> ApiError {
    ApiError::Transport {
        message: "connection refused".into(),
    }
}
