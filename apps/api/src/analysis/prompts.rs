// Prompt text and output contract for resume/job fit analysis.

use serde_json::{json, Value};

pub const ANALYSIS_SYSTEM: &str = "\
You are an expert recruiter and career coach. Analyze the candidate's resume against the job description.
Return a JSON object with:
- matchScore: integer 0-100 (overall fit)
- missingKeywords: array of important job description keywords/skills not clearly in the resume
- strengths: array of resume strengths relevant to this job
- suggestedInterviewQuestions: 3-5 interview questions (mix of strength-based and gap-based)
Be concise and actionable. Use short strings for arrays.";

/// Name under which the schema is registered with the provider.
pub const ANALYSIS_SCHEMA_NAME: &str = "resume_job_analysis";

/// Sampling temperature for analysis. Kept low for consistent scores across runs.
pub const ANALYSIS_TEMPERATURE: f32 = 0.2;

/// Builds the user message: labeled job description, then labeled resume text.
pub fn build_analysis_prompt(job_description: &str, resume_text: &str) -> String {
    format!("## Job Description\n{job_description}\n\n## Resume\n{resume_text}")
}

/// JSON schema for `AnalysisResult`, in the strict subset accepted for
/// structured outputs (every property required, no extra properties).
pub fn analysis_output_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "matchScore": {
                "type": "integer",
                "description": "Overall resume-job fit score 0-100"
            },
            "missingKeywords": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Important keywords/skills from the job description not clearly present in the resume"
            },
            "strengths": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Resume strengths relevant to the job"
            },
            "suggestedInterviewQuestions": {
                "type": "array",
                "items": { "type": "string" },
                "description": "3-5 suggested interview questions based on gaps or strengths"
            }
        },
        "required": ["matchScore", "missingKeywords", "strengths", "suggestedInterviewQuestions"],
        "additionalProperties": false
    })
}
