//! Axum route handler for the Analysis API.
//!
//! Flow: multipart form → validate → extract → analyze → JSON.
//! Each step either hands its output to the next or ends the request with an
//! `AppError`; later steps never run after a failure.

use axum::{
    extract::{Multipart, State},
    Json,
};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::analysis::models::{AnalysisResult, UploadedDocument};
use crate::analysis::validation::{validate_document, validate_job_description};
use crate::errors::AppError;
use crate::state::AppState;

const RESUME_FIELD: &str = "resume";
const JOB_DESCRIPTION_FIELD: &str = "jobDescription";

/// Raw form parts, before validation.
#[derive(Debug, Default)]
struct AnalyzeForm {
    resume: Option<UploadedDocument>,
    job_description: String,
}

/// POST /api/analyze
///
/// Multipart parts: `resume` (PDF file) and `jobDescription` (text).
/// The whole pipeline runs under `config.request_timeout`.
pub async fn handle_analyze(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AnalysisResult>, AppError> {
    let request_id = Uuid::new_v4();
    let budget = state.config.request_timeout;

    tokio::time::timeout(budget, run_analysis(state, multipart))
        .instrument(info_span!("analyze", %request_id))
        .await
        .map_err(|_| AppError::TimedOut(budget))?
        .map(Json)
}

async fn run_analysis(
    state: AppState,
    mut multipart: Multipart,
) -> Result<AnalysisResult, AppError> {
    let limits = &state.config.limits;
    let form = read_form(&mut multipart).await?;

    let doc = validate_document(form.resume.as_ref(), limits)?;
    let job_description = validate_job_description(&form.job_description, limits)?;
    info!(
        file_name = doc.file_name.as_deref().unwrap_or("<unnamed>"),
        bytes = doc.size(),
        jd_chars = job_description.chars().count(),
        "Analysis request validated"
    );

    let resume_text = state
        .extractor
        .extract_text(doc.bytes.clone())
        .await
        .map_err(|e| AppError::Extraction(e.to_string()))?;

    let extracted_chars = resume_text.chars().count();
    if extracted_chars < limits.min_extracted_chars {
        return Err(AppError::Extraction(format!(
            "only {extracted_chars} chars extracted (minimum {})",
            limits.min_extracted_chars
        )));
    }

    let result = state.analyzer.analyze(&resume_text, job_description).await?;
    info!(match_score = result.match_score, "Analysis complete");

    Ok(result)
}

/// Collects the `resume` and `jobDescription` parts; other parts are skipped.
async fn read_form(multipart: &mut Multipart) -> Result<AnalyzeForm, AppError> {
    let mut form = AnalyzeForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(RESUME_FIELD) => {
                let content_type = field.content_type().map(str::to_string);
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await?;

                // Browsers send an empty, unnamed part when no file was chosen.
                let no_file = bytes.is_empty() && file_name.as_deref().map_or(true, str::is_empty);
                if !no_file {
                    form.resume = Some(UploadedDocument {
                        bytes,
                        content_type,
                        file_name,
                    });
                }
            }
            Some(JOB_DESCRIPTION_FIELD) => {
                form.job_description = field.text().await?;
            }
            _ => {}
        }
    }

    Ok(form)
}
