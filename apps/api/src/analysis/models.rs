use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// The only media type accepted for resume uploads.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// A resume file as received from the multipart form. Lives for one request only.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub bytes: Bytes,
    /// Declared by the client; trusted as-is, never sniffed.
    pub content_type: Option<String>,
    /// Logging only.
    pub file_name: Option<String>,
}

impl UploadedDocument {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Structured fit analysis returned to the caller as the whole response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// 0 – 100
    pub match_score: u8,
    pub missing_keywords: Vec<String>,
    pub strengths: Vec<String>,
    /// 3 – 5 by prompt convention; not enforced.
    pub suggested_interview_questions: Vec<String>,
}
