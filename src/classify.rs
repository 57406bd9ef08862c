//! Failure classification - turns remote errors into actionable messages.

use crate::error::ApiError;
use crate::types::ClassifiedError;

/// API message the backend returns (with HTTP 400) for unknown form ids.
pub const FORM_NOT_FOUND_MESSAGE: &str = "The form does not exist.";

/// Known API error codes and the suggestion attached to each.
pub const KNOWN_API_CODES: &[(i64, &str)] = &[
    (
        3005,
        "Invalid request parameters. Check the form ID, field names and data format.",
    ),
    (3000, "The form does not exist. Check that the form ID is correct."),
    (
        4000,
        "The data was rejected. Check that every field value matches the form's requirements.",
    ),
];

/// Diagnose a failed remote call made while doing `context`
/// (e.g. `"Submit form data"`).
///
/// Transport status is inspected first (403, 400, 404), then the API error
/// code, then whatever text is available.
pub fn classify_error(error: &ApiError, context: &str) -> ClassifiedError {
    let prefix = format!("{context} failed");

    match error.status() {
        Some(403) => {
            return ClassifiedError::new(format!("{prefix}: permission denied")).with_suggestion(
                "Check that the API key has access to this application and that the form ID is correct.",
            );
        }
        Some(400) => {
            let api_message = error.api_message().filter(|m| !m.is_empty());
            if api_message == Some(FORM_NOT_FOUND_MESSAGE) {
                return ClassifiedError::new(format!("{prefix}: form does not exist"))
                    .with_suggestion("Check that the form ID is correct.");
            }
            if let Some(classified) = classify_api_code(error, &prefix) {
                return classified;
            }
            return ClassifiedError::new(format!(
                "{prefix}: {}",
                api_message.unwrap_or("invalid request parameters")
            ))
            .with_suggestion("Check the request parameters.");
        }
        Some(404) => {
            return ClassifiedError::new(format!("{prefix}: resource not found"));
        }
        _ => {}
    }

    if let Some(classified) = classify_api_code(error, &prefix) {
        return classified;
    }

    ClassifiedError::new(format!("{prefix}: {}", detail(error)))
}

/// Suggestion for a known API error code.
pub fn suggestion_for_code(code: i64) -> Option<&'static str> {
    KNOWN_API_CODES
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, suggestion)| *suggestion)
}

fn classify_api_code(error: &ApiError, prefix: &str) -> Option<ClassifiedError> {
    let code = error.api_code()?;
    let suggestion = suggestion_for_code(code)?;
    let message = error.api_message().unwrap_or("unknown error");
    Some(
        ClassifiedError::new(format!("{prefix}: API error {code}: {message}"))
            .with_suggestion(suggestion),
    )
}

fn detail(error: &ApiError) -> String {
    match error {
        ApiError::Api { code, message } => format!("API error {code}: {message}"),
        ApiError::Status {
            message: Some(message),
            ..
        } if !message.is_empty() => message.clone(),
        ApiError::Status { status, .. } => format!("HTTP {status}"),
        ApiError::Transport { message } | ApiError::InvalidResponse { message }
            if !message.is_empty() =>
        {
            message.clone()
        }
        _ => "unknown error".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16, code: Option<i64>, message: Option<&str>) -> ApiError {
        ApiError::Status {
            status,
            code,
            message: message.map(String::from),
        }
    }

    #[test]
    fn forbidden_gives_permission_guidance() {
        let c = classify_error(&status(403, None, None), "Get form fields");
        assert_eq!(c.message, "Get form fields failed: permission denied");
        assert!(c.suggestion.unwrap().contains("API key"));
    }

    #[test]
    fn bad_request_for_missing_form() {
        let c = classify_error(
            &status(400, Some(3000), Some("The form does not exist.")),
            "Query form data",
        );
        assert_eq!(c.message, "Query form data failed: form does not exist");
        assert!(c.suggestion.is_some());
    }

    #[test]
    fn bad_request_with_known_code() {
        let c = classify_error(
            &status(400, Some(3005), Some("Invalid param")),
            "Submit form data",
        );
        assert_eq!(
            c.message,
            "Submit form data failed: API error 3005: Invalid param"
        );
        assert_eq!(c.suggestion.as_deref(), suggestion_for_code(3005));
    }

    #[test]
    fn bad_request_generic() {
        let c = classify_error(&status(400, None, Some("limit too large")), "Query form data");
        assert_eq!(c.message, "Query form data failed: limit too large");

        let c = classify_error(&status(400, None, None), "Query form data");
        assert_eq!(
            c.message,
            "Query form data failed: invalid request parameters"
        );
    }

    #[test]
    fn not_found() {
        let c = classify_error(&status(404, None, None), "Get form data");
        assert_eq!(c.message, "Get form data failed: resource not found");
        assert!(c.suggestion.is_none());
    }

    #[test]
    fn api_code_on_successful_transport() {
        let err = ApiError::Api {
            code: 4000,
            message: "Data submit failed".into(),
        };
        let c = classify_error(&err, "Submit form data");
        assert_eq!(
            c.message,
            "Submit form data failed: API error 4000: Data submit failed"
        );
        assert!(c.suggestion.unwrap().contains("rejected"));
    }

    #[test]
    fn unknown_api_code_falls_back() {
        let err = ApiError::Api {
            code: 8301,
            message: "Rate limited".into(),
        };
        let c = classify_error(&err, "Submit form data");
        assert_eq!(c.message, "Submit form data failed: API error 8301: Rate limited");
        assert!(c.suggestion.is_none());
    }

    #[test]
    fn transport_failure_uses_message() {
        let err = ApiError::Transport {
            message: "operation timed out".into(),
        };
        let c = classify_error(&err, "Update form data");
        assert_eq!(c.message, "Update form data failed: operation timed out");
    }

    #[test]
    fn server_error_without_body() {
        let c = classify_error(&status(502, None, None), "Delete form data");
        assert_eq!(c.message, "Delete form data failed: HTTP 502");
    }
}
