use std::time::Duration;

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::analysis::analyzer::AnalyzerError;
use crate::analysis::validation::InputError;

pub const EXTRACTION_FAILED_MESSAGE: &str =
    "Could not extract enough text from the PDF. Ensure it is a valid, text-based PDF.";
pub const NOT_CONFIGURED_MESSAGE: &str = "Server is not configured for analysis (missing API key).";
pub const CREDENTIAL_REJECTED_MESSAGE: &str =
    "Server is not configured for analysis (API key rejected).";
pub const QUOTA_EXCEEDED_MESSAGE: &str =
    "AI provider quota exceeded. Check your plan and billing with the provider, then try again.";
pub const ANALYSIS_FAILED_MESSAGE: &str = "Analysis failed. Please try again.";

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    Input(#[from] InputError),

    #[error("Malformed form submission: {detail}")]
    Form { too_large: bool, detail: String },

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Analysis failed: {0}")]
    Analyzer(#[from] AnalyzerError),

    #[error("Request exceeded its {0:?} budget")]
    TimedOut(Duration),
}

impl From<MultipartError> for AppError {
    fn from(e: MultipartError) -> Self {
        AppError::Form {
            too_large: e.status() == StatusCode::PAYLOAD_TOO_LARGE,
            detail: e.body_text(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Input(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            AppError::Form { too_large, detail } => {
                tracing::warn!("Rejected multipart body: {detail}");
                let message = if *too_large {
                    "Upload too large"
                } else {
                    "Invalid form submission"
                };
                (StatusCode::BAD_REQUEST, message.to_string())
            }
            AppError::Extraction(msg) => {
                tracing::info!("Extraction rejected: {msg}");
                (StatusCode::BAD_REQUEST, EXTRACTION_FAILED_MESSAGE.to_string())
            }
            AppError::Analyzer(AnalyzerError::MissingCredential) => {
                tracing::error!("Analysis requested but OPENAI_API_KEY is not set");
                (StatusCode::SERVICE_UNAVAILABLE, NOT_CONFIGURED_MESSAGE.to_string())
            }
            AppError::Analyzer(AnalyzerError::CredentialRejected(detail)) => {
                tracing::error!("LLM provider rejected API key: {detail}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    CREDENTIAL_REJECTED_MESSAGE.to_string(),
                )
            }
            AppError::Analyzer(AnalyzerError::QuotaExceeded(detail)) => {
                tracing::warn!("LLM provider quota exceeded: {detail}");
                (StatusCode::SERVICE_UNAVAILABLE, QUOTA_EXCEEDED_MESSAGE.to_string())
            }
            AppError::Analyzer(e) => {
                tracing::error!("LLM error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ANALYSIS_FAILED_MESSAGE.to_string(),
                )
            }
            AppError::TimedOut(budget) => {
                tracing::error!("Analysis request exceeded {budget:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ANALYSIS_FAILED_MESSAGE.to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn render(err: AppError) -> (StatusCode, String) {
        let response = err.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        (status, value["error"].as_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn test_input_error_is_400_with_reason() {
        let (status, msg) = render(InputError::JobDescriptionRequired.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(msg, "Job description is required");
    }

    #[tokio::test]
    async fn test_extraction_error_hides_parser_detail() {
        let (status, msg) = render(AppError::Extraction("xref table broken".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(msg, EXTRACTION_FAILED_MESSAGE);
    }

    #[tokio::test]
    async fn test_missing_credential_is_503_mentioning_configuration() {
        let (status, msg) = render(AnalyzerError::MissingCredential.into()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(msg.contains("not configured for analysis"));
    }

    #[tokio::test]
    async fn test_quota_is_503_with_distinct_wording() {
        let (status, msg) = render(AnalyzerError::QuotaExceeded("429".into()).into()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(msg.contains("quota exceeded"));
        assert_ne!(msg, NOT_CONFIGURED_MESSAGE);
    }

    #[tokio::test]
    async fn test_credential_rejected_is_503() {
        let (status, msg) = render(AnalyzerError::CredentialRejected("401".into()).into()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(msg.contains("not configured for analysis"));
    }

    #[tokio::test]
    async fn test_upstream_failures_are_opaque_500() {
        for err in [
            AnalyzerError::MalformedOutput("missing strengths".into()),
            AnalyzerError::TransientProviderError("secret provider body".into()),
        ] {
            let (status, msg) = render(err.into()).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(msg, ANALYSIS_FAILED_MESSAGE);
        }
    }

    #[tokio::test]
    async fn test_timeout_is_opaque_500() {
        let (status, msg) = render(AppError::TimedOut(Duration::from_secs(60))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(msg, ANALYSIS_FAILED_MESSAGE);
    }
}
