use thiserror::Error;

use crate::analysis::models::{UploadedDocument, PDF_MEDIA_TYPE};
use crate::config::Limits;

/// Caller-side input problems. The display text is safe to return verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("Resume file is required")]
    DocumentRequired,

    #[error("Only PDF files are allowed")]
    UnsupportedType,

    #[error("File too large (max {max})")]
    DocumentTooLarge { max: String },

    #[error("Job description is required")]
    JobDescriptionRequired,

    #[error("Job description too long")]
    JobDescriptionTooLong,
}

/// Checks presence, declared media type and size of the uploaded resume.
///
/// The type check comes before the size check, so a non-PDF is rejected
/// whatever its size.
pub fn validate_document<'a>(
    doc: Option<&'a UploadedDocument>,
    limits: &Limits,
) -> Result<&'a UploadedDocument, InputError> {
    let doc = doc.ok_or(InputError::DocumentRequired)?;

    if doc.content_type.as_deref() != Some(PDF_MEDIA_TYPE) {
        return Err(InputError::UnsupportedType);
    }

    if doc.size() > limits.max_document_bytes {
        return Err(InputError::DocumentTooLarge {
            max: format_size(limits.max_document_bytes),
        });
    }

    Ok(doc)
}

/// Renders a byte cap for user-facing messages: `5MB`, `1.5MB`, `512KB`, `1000 bytes`.
fn format_size(bytes: usize) -> String {
    const KIB: usize = 1024;
    const MIB: usize = 1024 * KIB;

    if bytes >= MIB {
        if bytes % MIB == 0 {
            format!("{}MB", bytes / MIB)
        } else {
            format!("{:.1}MB", bytes as f64 / MIB as f64)
        }
    } else if bytes >= KIB && bytes % KIB == 0 {
        format!("{}KB", bytes / KIB)
    } else {
        format!("{bytes} bytes")
    }
}

/// Trims the job description and checks its length in characters.
pub fn validate_job_description<'a>(
    text: &'a str,
    limits: &Limits,
) -> Result<&'a str, InputError> {
    let trimmed = text.trim();

    if trimmed.is_empty() {
        return Err(InputError::JobDescriptionRequired);
    }

    if trimmed.chars().count() > limits.max_job_description_chars {
        return Err(InputError::JobDescriptionTooLong);
    }

    Ok(trimmed)
}
