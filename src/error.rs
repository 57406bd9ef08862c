//! Error types for form resolution, field mapping and data operations.

use thiserror::Error;

use crate::types::{ClassifiedError, BATCH_LIMIT};

/// Failure of a single remote call.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Non-2xx transport response. `code`/`message` come from the body when
    /// the backend sent one.
    #[error("HTTP {status}{}", message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Status {
        status: u16,
        code: Option<i64>,
        message: Option<String>,
    },

    /// 2xx response whose body carries a non-zero `code`.
    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("request failed: {message}")]
    Transport { message: String },

    #[error("unexpected response: {message}")]
    InvalidResponse { message: String },
}

impl ApiError {
    /// Transport status code, if the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Numeric API error code from the response body.
    pub fn api_code(&self) -> Option<i64> {
        match self {
            ApiError::Status { code, .. } => *code,
            ApiError::Api { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// API-level message from the response body.
    pub fn api_message(&self) -> Option<&str> {
        match self {
            ApiError::Status { message, .. } => message.as_deref(),
            ApiError::Api { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn exit_code(&self) -> i32 {
        3
    }
}

/// Errors during form resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no forms found under application \"{name}\" ({app_id})")]
    NoForms { app_id: String, name: String },

    #[error("cannot list forms of application \"{name}\" ({app_id}): {source}")]
    FormListing {
        app_id: String,
        name: String,
        #[source]
        source: ApiError,
    },

    #[error("cannot list applications: {source}")]
    AppListing {
        #[source]
        source: ApiError,
    },
}

impl ResolveError {
    pub fn exit_code(&self) -> i32 {
        match self {
            ResolveError::NoForms { .. } => 2,
            ResolveError::FormListing { .. } | ResolveError::AppListing { .. } => 3,
        }
    }
}

/// Errors during field mapping.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("cannot list fields of form {form}: {source}")]
    FieldListing {
        form: String,
        #[source]
        source: ApiError,
    },
}

impl MapError {
    pub fn exit_code(&self) -> i32 {
        3
    }
}

/// A filter condition that failed schema validation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FilterViolation {
    /// JSON Pointer (RFC 6901) into the filter.
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for FilterViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Errors returned by [`FormBridge`](crate::FormBridge) operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Map(#[from] MapError),

    #[error("batch of {count} records exceeds the limit of {BATCH_LIMIT}")]
    BatchTooLarge { count: usize },

    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    #[error("invalid filter: {}", errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    InvalidFilter { errors: Vec<FilterViolation> },

    /// Remote call failed; `classified` is the presentable diagnosis.
    #[error("{classified}")]
    Remote {
        classified: ClassifiedError,
        #[source]
        source: ApiError,
    },
}

impl BridgeError {
    pub fn exit_code(&self) -> i32 {
        match self {
            BridgeError::Resolve(e) => e.exit_code(),
            BridgeError::Map(e) => e.exit_code(),
            BridgeError::BatchTooLarge { .. }
            | BridgeError::InvalidInput { .. }
            | BridgeError::InvalidFilter { .. } => 1,
            BridgeError::Remote { source, .. } => source.exit_code(),
        }
    }

    /// Remediation hint for remote failures.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            BridgeError::Remote { classified, .. } => classified.suggestion.as_deref(),
            _ => None,
        }
    }

    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        BridgeError::InvalidInput {
            message: message.into(),
        }
    }
}
