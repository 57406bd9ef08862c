//! Form resolution - turns a loose identifier into an exact form handle.

use tracing::{debug, info};

use crate::cache::MetadataCache;
use crate::error::ResolveError;
use crate::source::MetadataSource;
use crate::types::{looks_like_form_handle, FormSummary, ResolvedForm, ResolverOptions};

/// Resolve `identifier` to a form handle.
///
/// The identifier may already be a form handle, or it may be an application
/// id, in which case the application's forms are listed and the first one is
/// used. Identifiers that are neither are passed through unchanged and left
/// for the backend to reject.
///
/// # Errors
///
/// Returns `ResolveError::NoForms` if the identifier names an application
/// without forms, `ResolveError::FormListing` if the form listing fails, and
/// `ResolveError::AppListing` if the application listing fails under
/// [`MetadataFailurePolicy::Fail`](crate::MetadataFailurePolicy::Fail).
pub fn resolve_form<S>(
    source: &S,
    cache: &MetadataCache,
    identifier: &str,
    credential: &str,
    options: &ResolverOptions,
) -> Result<ResolvedForm, ResolveError>
where
    S: MetadataSource + ?Sized,
{
    if options.handle_fast_path && looks_like_form_handle(identifier) {
        debug!(identifier, "identifier has form handle shape");
        return Ok(ResolvedForm::direct(identifier));
    }

    let applications = cache
        .fetch(source, credential, options.metadata_failure)
        .map_err(|source| ResolveError::AppListing { source })?;

    let Some(app) = applications.iter().find(|app| app.id == identifier) else {
        debug!(identifier, "identifier is not a known application, passing through");
        return Ok(ResolvedForm::direct(identifier));
    };

    let forms = source
        .list_forms(&app.id, credential)
        .map_err(|source| ResolveError::FormListing {
            app_id: app.id.clone(),
            name: app.name.clone(),
            source,
        })?;

    from_form_listing(&app.id, &app.name, &forms)
}

/// Pick the form to use from an application's listing.
fn from_form_listing(
    app_id: &str,
    app_name: &str,
    forms: &[FormSummary],
) -> Result<ResolvedForm, ResolveError> {
    match forms {
        [] => Err(ResolveError::NoForms {
            app_id: app_id.to_string(),
            name: app_name.to_string(),
        }),
        [only] => Ok(ResolvedForm {
            form_handle: only.id.clone(),
            application_id: Some(app_id.to_string()),
            ambiguous_alternatives: None,
        }),
        [first, ..] => {
            info!(
                app_id,
                forms = forms.len(),
                form = %first.id,
                "application has several forms, using the first"
            );
            Ok(ResolvedForm {
                form_handle: first.id.clone(),
                application_id: Some(app_id.to_string()),
                ambiguous_alternatives: Some(
                    forms.iter().map(FormSummary::display_label).collect(),
                ),
            })
        }
    }
}
