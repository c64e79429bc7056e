/// LLM Client — the single point of entry for chat-completion calls.
///
/// Every call is one attempt: no retries, no backoff. Failures are classified
/// here, at the call site, from the HTTP status and the provider's error
/// `code`/`type` fields, into a `ProviderFailure` tagged with a `FailureKind`.
use std::fmt;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::LlmSettings;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Provider error codes that mean the account is out of quota or credit.
const QUOTA_CODES: &[&str] = &["insufficient_quota", "billing_hard_limit_reached"];

/// What went wrong with a provider call, decided from the response itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Rate limit or billing exhaustion reported by the provider.
    Quota,
    /// The provider rejected our credential.
    Auth,
    /// The provider answered, but not with output matching the schema.
    Malformed,
    /// Network errors, timeouts, 5xx and anything else.
    Transient,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Quota => "quota",
            FailureKind::Auth => "auth",
            FailureKind::Malformed => "malformed",
            FailureKind::Transient => "transient",
        };
        f.write_str(s)
    }
}

/// Tagged result of a failed provider call. `detail` is for server logs only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} provider failure: {detail}")]
pub struct ProviderFailure {
    pub kind: FailureKind,
    pub detail: String,
}

impl ProviderFailure {
    fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// A named JSON schema passed to the model as its output contract.
#[derive(Debug, Clone)]
pub struct OutputSchema {
    pub name: &'static str,
    pub schema: Value,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
    response_format: ResponseFormat<'a>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename = "json_schema")]
struct ResponseFormat<'a> {
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'a str,
    strict: bool,
    schema: &'a Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorEnvelope {
    error: ProviderErrorBody,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    #[serde(default)]
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
    code: Option<String>,
}

/// Chat-completions client bound to one credential and model.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    timeout: Duration,
}

impl LlmClient {
    pub fn new(api_key: String, settings: &LlmSettings) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?,
            api_key,
            endpoint: format!("{}/chat/completions", settings.base_url.trim_end_matches('/')),
            model: settings.model.clone(),
            timeout: settings.timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends a system + user message pair with `schema` as the enforced output
    /// format, then deserializes the reply into `T`.
    ///
    /// The whole exchange (send + body read) is bounded by the configured timeout.
    pub async fn call_structured<T: DeserializeOwned>(
        &self,
        system: &str,
        user: &str,
        schema: &OutputSchema,
        temperature: f32,
    ) -> Result<T, ProviderFailure> {
        let request = ChatRequest {
            model: &self.model,
            temperature,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            response_format: ResponseFormat {
                json_schema: JsonSchemaFormat {
                    name: schema.name,
                    strict: true,
                    schema: &schema.schema,
                },
            },
        };

        let (status, body) = tokio::time::timeout(self.timeout, self.send(&request))
            .await
            .map_err(|_| {
                ProviderFailure::new(
                    FailureKind::Transient,
                    format!("no response within {}s", self.timeout.as_secs()),
                )
            })??;

        if !status.is_success() {
            let failure = classify_error_response(status, &body);
            warn!("LLM API returned {status}: kind={}", failure.kind);
            return Err(failure);
        }

        let text = completion_text(&body)?;
        parse_structured(&text)
    }

    async fn send(&self, request: &ChatRequest<'_>) -> Result<(StatusCode, String), ProviderFailure> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| ProviderFailure::new(FailureKind::Transient, format!("request failed: {e}")))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ProviderFailure::new(FailureKind::Transient, format!("reading response body failed: {e}"))
        })?;
        Ok((status, body))
    }
}

/// Maps a non-2xx provider response to a failure kind.
fn classify_error_response(status: StatusCode, body: &str) -> ProviderFailure {
    let parsed = serde_json::from_str::<ProviderErrorEnvelope>(body).ok();
    let detail = match &parsed {
        Some(env) => format!(
            "status {}: {} (type={:?}, code={:?})",
            status.as_u16(),
            env.error.message,
            env.error.error_type,
            env.error.code
        ),
        None => format!("status {}: {body}", status.as_u16()),
    };

    let is_quota_code = parsed.as_ref().is_some_and(|env| {
        [env.error.code.as_deref(), env.error.error_type.as_deref()]
            .into_iter()
            .flatten()
            .any(|c| QUOTA_CODES.contains(&c))
    });

    let kind = match status {
        StatusCode::TOO_MANY_REQUESTS => FailureKind::Quota,
        _ if is_quota_code => FailureKind::Quota,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FailureKind::Auth,
        _ => FailureKind::Transient,
    };

    ProviderFailure::new(kind, detail)
}

/// Pulls the assistant text out of a successful completion envelope.
fn completion_text(body: &str) -> Result<String, ProviderFailure> {
    let response: ChatResponse = serde_json::from_str(body).map_err(|e| {
        ProviderFailure::new(FailureKind::Malformed, format!("unexpected completion envelope: {e}"))
    })?;

    if let Some(usage) = &response.usage {
        debug!(
            "LLM call succeeded: prompt_tokens={}, completion_tokens={}",
            usage.prompt_tokens, usage.completion_tokens
        );
    }

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderFailure::new(FailureKind::Malformed, "completion has no choices"))?;

    if let Some(refusal) = choice.message.refusal {
        return Err(ProviderFailure::new(
            FailureKind::Malformed,
            format!("model refused: {refusal}"),
        ));
    }

    if choice.finish_reason.as_deref() == Some("length") {
        return Err(ProviderFailure::new(
            FailureKind::Malformed,
            "output truncated at token limit",
        ));
    }

    choice
        .message
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ProviderFailure::new(FailureKind::Malformed, "completion has no content"))
}

fn parse_structured<T: DeserializeOwned>(text: &str) -> Result<T, ProviderFailure> {
    serde_json::from_str(strip_json_fences(text)).map_err(|e| {
        ProviderFailure::new(FailureKind::Malformed, format!("output does not match schema: {e}"))
    })
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"));
    match inner {
        Some(rest) => rest
            .trim_start()
            .strip_suffix("```")
            .map(str::trim)
            .unwrap_or(rest.trim_start()),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Probe {
        score: u8,
    }

    fn completion(content: Value, finish_reason: &str) -> String {
        json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content, "refusal": null },
                "finish_reason": finish_reason
            }],
            "usage": { "prompt_tokens": 120, "completion_tokens": 40, "total_tokens": 160 }
        })
        .to_string()
    }

    #[test]
    fn test_insufficient_quota_429_is_quota() {
        let body = r#"{"error":{"message":"You exceeded your current quota","type":"insufficient_quota","code":"insufficient_quota"}}"#;
        let f = classify_error_response(StatusCode::TOO_MANY_REQUESTS, body);
        assert_eq!(f.kind, FailureKind::Quota);
        assert!(f.detail.contains("exceeded your current quota"));
    }

    #[test]
    fn test_rate_limit_429_is_quota() {
        let body = r#"{"error":{"message":"Rate limit reached","type":"requests","code":"rate_limit_exceeded"}}"#;
        assert_eq!(
            classify_error_response(StatusCode::TOO_MANY_REQUESTS, body).kind,
            FailureKind::Quota
        );
    }

    #[test]
    fn test_quota_code_on_other_status_is_quota() {
        let body = r#"{"error":{"message":"Billing limit","type":"invalid_request_error","code":"billing_hard_limit_reached"}}"#;
        assert_eq!(
            classify_error_response(StatusCode::BAD_REQUEST, body).kind,
            FailureKind::Quota
        );
    }

    #[test]
    fn test_401_is_auth() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error","code":"invalid_api_key"}}"#;
        assert_eq!(
            classify_error_response(StatusCode::UNAUTHORIZED, body).kind,
            FailureKind::Auth
        );
    }

    #[test]
    fn test_server_error_with_plain_body_is_transient() {
        let f = classify_error_response(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert_eq!(f.kind, FailureKind::Transient);
        assert!(f.detail.contains("502"));
    }

    #[test]
    fn test_generic_400_is_transient() {
        let body = r#"{"error":{"message":"Invalid schema","type":"invalid_request_error","code":null}}"#;
        assert_eq!(
            classify_error_response(StatusCode::BAD_REQUEST, body).kind,
            FailureKind::Transient
        );
    }

    #[test]
    fn test_completion_text_returns_content() {
        let body = completion(json!("{\"score\": 7}"), "stop");
        let text = completion_text(&body).unwrap();
        assert_eq!(parse_structured::<Probe>(&text).unwrap(), Probe { score: 7 });
    }

    #[test]
    fn test_refusal_is_malformed() {
        let body = json!({
            "choices": [{
                "message": { "content": null, "refusal": "I can't help with that." },
                "finish_reason": "stop"
            }]
        })
        .to_string();
        assert_eq!(completion_text(&body).unwrap_err().kind, FailureKind::Malformed);
    }

    #[test]
    fn test_length_cutoff_is_malformed() {
        let body = completion(json!("{\"score\": "), "length");
        assert_eq!(completion_text(&body).unwrap_err().kind, FailureKind::Malformed);
    }

    #[test]
    fn test_empty_choices_is_malformed() {
        let body = json!({ "choices": [] }).to_string();
        assert_eq!(completion_text(&body).unwrap_err().kind, FailureKind::Malformed);
    }

    #[test]
    fn test_non_json_envelope_is_malformed() {
        assert_eq!(completion_text("not json").unwrap_err().kind, FailureKind::Malformed);
    }

    #[test]
    fn test_content_not_matching_type_is_malformed() {
        let err = parse_structured::<Probe>("{\"points\": 3}").unwrap_err();
        assert_eq!(err.kind, FailureKind::Malformed);
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_request_serializes_json_schema_response_format() {
        let schema = json!({ "type": "object" });
        let request = ChatRequest {
            model: "gpt-4o-mini",
            temperature: 0.2,
            messages: [
                ChatMessage { role: "system", content: "sys" },
                ChatMessage { role: "user", content: "usr" },
            ],
            response_format: ResponseFormat {
                json_schema: JsonSchemaFormat {
                    name: "keyword_list",
                    strict: true,
                    schema: &schema,
                },
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["response_format"]["type"], "json_schema");
        assert_eq!(value["response_format"]["json_schema"]["name"], "keyword_list");
        assert_eq!(value["response_format"]["json_schema"]["strict"], true);
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "usr");
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let settings = LlmSettings {
            base_url: "http://localhost:9999/v1/".to_string(),
            ..LlmSettings::default()
        };
        let client = LlmClient::new("sk-test".to_string(), &settings).unwrap();
        assert_eq!(client.endpoint, "http://localhost:9999/v1/chat/completions");
        assert_eq!(client.model(), "gpt-4o-mini");
    }
}
