//! Local input checks run before any request is sent.
//!
//! A rejected upload or grade never reaches the network and never writes
//! optimistic state.

use std::borrow::Cow;

use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::{ClientError, Result};
use crate::model::Upload;

#[derive(Debug, Clone, PartialEq)]
pub struct UploadPolicy {
    pub max_bytes: u64,
    /// Lower-case extensions without the dot; empty allows everything.
    pub allowed_extensions: Vec<String>,
}

impl UploadPolicy {
    pub fn from_config() -> Self {
        let cfg = common::config::AppConfig::global();
        Self {
            max_bytes: cfg.max_upload_bytes,
            allowed_extensions: cfg.allowed_upload_extensions.clone(),
        }
    }
}

#[derive(Debug, Validate)]
struct UploadForm {
    #[validate(length(min = 1, max = 255, message = "A file name is required"))]
    file_name: String,
    #[validate(range(min = 1, message = "The selected file is empty"))]
    size: u64,
}

#[derive(Debug, Validate)]
struct FeedbackForm {
    #[validate(length(max = 2000, message = "Feedback must be at most 2000 characters"))]
    feedback: String,
}

fn error(code: &'static str, message: String) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Owned(message))
}

fn finish(errors: ValidationErrors) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ClientError::from(errors))
    }
}

pub fn validate_upload(upload: &Upload, policy: &UploadPolicy) -> Result<()> {
    let form = UploadForm {
        file_name: upload.file_name.trim().to_string(),
        size: upload.bytes.len() as u64,
    };
    let mut errors = form.validate().err().unwrap_or_default();

    if form.size > policy.max_bytes {
        errors.add(
            "size",
            error(
                "too_large",
                format!("File exceeds the {} byte upload limit", policy.max_bytes),
            ),
        );
    }

    if !policy.allowed_extensions.is_empty() {
        let allowed = upload
            .extension()
            .is_some_and(|ext| policy.allowed_extensions.contains(&ext));
        if !allowed {
            errors.add(
                "file_name",
                error(
                    "extension",
                    format!(
                        "File type not allowed (accepted: {})",
                        policy.allowed_extensions.join(", ")
                    ),
                ),
            );
        }
    }

    finish(errors)
}

pub fn validate_grade(score: f64, max_score: f64, feedback: Option<&str>) -> Result<()> {
    let mut errors = match feedback {
        Some(text) => FeedbackForm {
            feedback: text.to_string(),
        }
            .validate()
            .err()
            .unwrap_or_default(),
        None => ValidationErrors::new(),
    };
    if !score.is_finite() || score < 0.0 || score > max_score {
        errors.add(
            "score",
            error("range", format!("Grade must be between 0 and {max_score}")),
        );
    }

    finish(errors)
}
