pub mod config;
pub mod logger;

use validator::ValidationErrors;

/// Flattens validator output into a single user-facing sentence.
///
/// Fields without a custom message fall back to their error code so nothing
/// is silently dropped.
pub fn format_validation_errors(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    fields
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match e.message.as_ref() {
                Some(m) => m.to_string(),
                None => format!("{field}: {}", e.code),
            })
        })
        .collect::<Vec<_>>()
        .join("; ")
}
