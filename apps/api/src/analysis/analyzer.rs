//! Structured Analyzer — prompts the model with a bound output schema and
//! returns a validated `AnalysisResult` or a classified failure.
//!
//! `AppState` holds an `Arc<dyn Analyzer>`; `LlmAnalyzer` is the production
//! backend.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::analysis::extraction::truncate_chars;
use crate::analysis::models::AnalysisResult;
use crate::analysis::prompts::{
    analysis_output_schema, build_analysis_prompt, ANALYSIS_SCHEMA_NAME, ANALYSIS_SYSTEM,
    ANALYSIS_TEMPERATURE,
};
use crate::config::{Limits, LlmSettings};
use crate::llm_client::{FailureKind, LlmClient, OutputSchema, ProviderFailure};

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("OPENAI_API_KEY is not configured")]
    MissingCredential,

    #[error("Provider rejected the configured API key: {0}")]
    CredentialRejected(String),

    #[error("Provider quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Model output did not match the analysis schema: {0}")]
    MalformedOutput(String),

    #[error("Provider call failed: {0}")]
    TransientProviderError(String),
}

impl From<ProviderFailure> for AnalyzerError {
    fn from(failure: ProviderFailure) -> Self {
        match failure.kind {
            FailureKind::Quota => AnalyzerError::QuotaExceeded(failure.detail),
            FailureKind::Auth => AnalyzerError::CredentialRejected(failure.detail),
            FailureKind::Malformed => AnalyzerError::MalformedOutput(failure.detail),
            FailureKind::Transient => AnalyzerError::TransientProviderError(failure.detail),
        }
    }
}

#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Whether a provider credential is present. Used by the health endpoint.
    fn is_configured(&self) -> bool;

    async fn analyze(
        &self,
        resume_text: &str,
        job_description: &str,
    ) -> Result<AnalysisResult, AnalyzerError>;
}

/// Wire shape of the model's output before range checks. Unknown fields are
/// rejected so schema drift shows up as `MalformedOutput`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawAnalysis {
    match_score: i64,
    missing_keywords: Vec<String>,
    strengths: Vec<String>,
    suggested_interview_questions: Vec<String>,
}

impl TryFrom<RawAnalysis> for AnalysisResult {
    type Error = AnalyzerError;

    fn try_from(raw: RawAnalysis) -> Result<Self, Self::Error> {
        let match_score = u8::try_from(raw.match_score)
            .ok()
            .filter(|score| *score <= 100)
            .ok_or_else(|| {
                AnalyzerError::MalformedOutput(format!(
                    "matchScore {} outside 0-100",
                    raw.match_score
                ))
            })?;

        Ok(AnalysisResult {
            match_score,
            missing_keywords: raw.missing_keywords,
            strengths: raw.strengths,
            suggested_interview_questions: raw.suggested_interview_questions,
        })
    }
}

/// Analyzer backed by the chat-completions provider.
pub struct LlmAnalyzer {
    /// `None` when no credential is configured; checked before any network call.
    llm: Option<LlmClient>,
    max_resume_chars: usize,
    schema: OutputSchema,
}

impl LlmAnalyzer {
    pub fn new(settings: &LlmSettings, limits: &Limits) -> Result<Self, reqwest::Error> {
        let llm = settings
            .api_key
            .clone()
            .map(|key| LlmClient::new(key, settings))
            .transpose()?;

        Ok(Self {
            llm,
            max_resume_chars: limits.max_resume_chars,
            schema: OutputSchema {
                name: ANALYSIS_SCHEMA_NAME,
                schema: analysis_output_schema(),
            },
        })
    }

    pub fn model(&self) -> Option<&str> {
        self.llm.as_ref().map(LlmClient::model)
    }
}

/// Builds the outbound user message with the resume cut to `max_resume_chars`.
pub fn outbound_prompt(resume_text: &str, job_description: &str, max_resume_chars: usize) -> String {
    build_analysis_prompt(job_description, truncate_chars(resume_text, max_resume_chars))
}

#[async_trait]
impl Analyzer for LlmAnalyzer {
    fn is_configured(&self) -> bool {
        self.llm.is_some()
    }

    async fn analyze(
        &self,
        resume_text: &str,
        job_description: &str,
    ) -> Result<AnalysisResult, AnalyzerError> {
        let llm = self.llm.as_ref().ok_or(AnalyzerError::MissingCredential)?;

        let resume_chars = resume_text.chars().count();
        if resume_chars > self.max_resume_chars {
            info!(
                "Resume text truncated from {} to {} chars",
                resume_chars, self.max_resume_chars
            );
        }

        let prompt = outbound_prompt(resume_text, job_description, self.max_resume_chars);

        let raw: RawAnalysis = llm
            .call_structured(ANALYSIS_SYSTEM, &prompt, &self.schema, ANALYSIS_TEMPERATURE)
            .await?;

        AnalysisResult::try_from(raw)
    }
}
