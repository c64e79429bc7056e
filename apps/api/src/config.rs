use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Input and output size limits applied by the analysis pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Largest accepted resume upload, in bytes.
    pub max_document_bytes: usize,
    /// Largest accepted job description, in characters after trimming.
    pub max_job_description_chars: usize,
    /// Resume text beyond this many characters is cut before prompting.
    pub max_resume_chars: usize,
    /// Extracted text shorter than this is treated as an unreadable document.
    pub min_extracted_chars: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_document_bytes: 5 * 1024 * 1024,
            max_job_description_chars: 50_000,
            max_resume_chars: 12_000,
            min_extracted_chars: 50,
        }
    }
}

/// Settings for the upstream chat-completions provider.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// `None` is a valid runtime state: analysis requests answer 503 until a key is set.
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            timeout: Duration::from_secs(45),
        }
    }
}

/// Application configuration loaded from environment variables once at startup.
/// Business logic receives it by value and never reads the environment itself.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmSettings,
    pub limits: Limits,
    /// Wall-clock budget for a whole analysis request.
    pub request_timeout: Duration,
    /// How long a request waits for the PDF parser.
    pub extraction_timeout: Duration,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = Limits::default();
        let llm_defaults = LlmSettings::default();

        Ok(Config {
            llm: LlmSettings {
                api_key: optional_env("OPENAI_API_KEY"),
                model: optional_env("OPENAI_MODEL").unwrap_or(llm_defaults.model),
                base_url: optional_env("OPENAI_BASE_URL").unwrap_or(llm_defaults.base_url),
                timeout: Duration::from_secs(parse_env("LLM_TIMEOUT_SECS", 45)?),
            },
            limits: Limits {
                max_document_bytes: parse_env("MAX_DOCUMENT_BYTES", defaults.max_document_bytes)?,
                max_job_description_chars: parse_env(
                    "MAX_JOB_DESCRIPTION_CHARS",
                    defaults.max_job_description_chars,
                )?,
                max_resume_chars: parse_env("MAX_RESUME_CHARS", defaults.max_resume_chars)?,
                min_extracted_chars: parse_env(
                    "MIN_EXTRACTED_CHARS",
                    defaults.min_extracted_chars,
                )?,
            },
            request_timeout: Duration::from_secs(parse_env("REQUEST_TIMEOUT_SECS", 60)?),
            extraction_timeout: Duration::from_secs(parse_env("EXTRACTION_TIMEOUT_SECS", 10)?),
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Upper bound for the raw multipart body: the document cap plus room for the
    /// job description (up to 4 bytes per char) and multipart framing.
    pub fn body_limit(&self) -> usize {
        self.limits.max_document_bytes
            + self.limits.max_job_description_chars * 4
            + 64 * 1024
    }
}

/// Blank values count as unset so `OPENAI_API_KEY=` in a .env file reads as missing.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        None => Ok(default),
    }
}
