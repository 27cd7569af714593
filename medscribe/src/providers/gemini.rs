//! Gemini `generateContent` client.

use super::{Content, FunctionCall, ModelClient, ModelRequest, ModelResponse, Part, Role};
use crate::errors::ModelError;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, error};

/// Public Gemini REST endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Maximum number of body bytes kept in error messages.
const ERROR_BODY_LIMIT: usize = 2048;

/// Client for the Gemini REST API authenticated with an API key.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    endpoint: String,
    api_key: String,
    default_model: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("endpoint", &self.endpoint)
            .field("default_model", &self.default_model)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Config`] if the API key is blank or the HTTP
    /// client cannot be built.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        default_model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ModelError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ModelError::Config("API key is not set".to_string()));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ModelError::Config(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key,
            default_model: default_model.into(),
        })
    }

    fn url(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, model)
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn generate(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());
        let body = build_request_body(&request);
        debug!(model = %model, turns = request.contents.len(), tools = request.tools.len(), "Gemini request");

        let response = self
            .client
            .post(self.url(&model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let mut text = response.text().await.unwrap_or_default();
            text.truncate(floor_char_boundary(&text, ERROR_BODY_LIMIT));
            error!(status = status.as_u16(), "Gemini API error");
            return Err(ModelError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let payload: Value = response.json().await?;
        parse_response(&payload, &model)
    }
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}

/// Builds the JSON body of a `generateContent` call.
#[must_use]
pub fn build_request_body(request: &ModelRequest) -> Value {
    let mut body = Map::new();
    body.insert(
        "contents".to_string(),
        Value::Array(request.contents.iter().map(content_to_json).collect()),
    );
    if let Some(ref instruction) = request.system_instruction {
        body.insert(
            "systemInstruction".to_string(),
            json!({ "parts": [{ "text": instruction }] }),
        );
    }
    if !request.tools.is_empty() {
        let declarations: Vec<Value> = request
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.input_schema,
                })
            })
            .collect();
        body.insert(
            "tools".to_string(),
            json!([{ "functionDeclarations": declarations }]),
        );
    }
    Value::Object(body)
}

fn content_to_json(content: &Content) -> Value {
    let role = match content.role {
        Role::User => "user",
        Role::Model => "model",
    };
    let parts: Vec<Value> = content
        .parts
        .iter()
        .map(|part| match part {
            Part::Text(text) => json!({ "text": text }),
            Part::InlineData { mime_type, data } => json!({
                "inlineData": { "mimeType": mime_type, "data": BASE64.encode(data) }
            }),
            Part::FunctionCall(call) => json!({
                "functionCall": { "name": call.name, "args": call.args }
            }),
            Part::FunctionResponse { name, response } => json!({
                "functionResponse": { "name": name, "response": response }
            }),
        })
        .collect();
    json!({ "role": role, "parts": parts })
}

/// Parses a `generateContent` response body.
///
/// # Errors
///
/// Returns [`ModelError::Empty`] when there is no candidate and
/// [`ModelError::Decode`] when the candidate has an unexpected shape.
pub fn parse_response(payload: &Value, model: &str) -> Result<ModelResponse, ModelError> {
    let candidate = payload
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .ok_or(ModelError::Empty)?;

    let parts = candidate
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut text = String::new();
    let mut function_calls = Vec::new();
    for part in &parts {
        if let Some(t) = part.get("text").and_then(Value::as_str) {
            text.push_str(t);
        } else if let Some(call) = part.get("functionCall") {
            let name = call
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| ModelError::Decode("functionCall without a name".to_string()))?;
            function_calls.push(FunctionCall {
                id: call.get("id").and_then(Value::as_str).map(str::to_string),
                name: name.to_string(),
                args: call.get("args").cloned().unwrap_or_else(|| json!({})),
            });
        }
    }

    let usage = payload.get("usageMetadata");
    let token_count = |field: &str| {
        usage
            .and_then(|u| u.get(field))
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
    };

    Ok(ModelResponse {
        text,
        function_calls,
        model: payload
            .get("modelVersion")
            .and_then(Value::as_str)
            .unwrap_or(model)
            .to_string(),
        input_tokens: token_count("promptTokenCount"),
        output_tokens: token_count("candidatesTokenCount"),
        finish_reason: candidate
            .get("finishReason")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolDefinition;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_blank_key_rejected() {
        let err = GeminiClient::new(DEFAULT_ENDPOINT, " ", "m", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ModelError::Config(_)));
    }

    #[test]
    fn test_url_strips_trailing_slash() {
        let client =
            GeminiClient::new("http://localhost:9/", "k", "m", Duration::from_secs(1)).unwrap();
        assert_eq!(client.url("gemini-2.0-flash"), "http://localhost:9/models/gemini-2.0-flash:generateContent");
    }

    #[test]
    fn test_build_body_with_audio_and_tools() {
        let request = ModelRequest::new()
            .with_system_instruction("Transcribe.")
            .with_content(Content {
                role: Role::User,
                parts: vec![
                    Part::Text("go".to_string()),
                    Part::InlineData { mime_type: "audio/wav".to_string(), data: vec![1, 2, 3] },
                ],
            })
            .with_tools(vec![ToolDefinition::new("read_processing_file", "Reads")]);

        let body = build_request_body(&request);
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Transcribe.");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][1]["inlineData"]["mimeType"], "audio/wav");
        assert_eq!(body["contents"][0]["parts"][1]["inlineData"]["data"], "AQID");
        assert_eq!(
            body["tools"][0]["functionDeclarations"][0]["name"],
            "read_processing_file"
        );
    }

    #[test]
    fn test_build_body_without_tools_omits_key() {
        let body = build_request_body(&ModelRequest::new().with_content(Content::user_text("hi")));
        assert!(body.get("tools").is_none());
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn test_parse_text_and_calls() {
        let payload = json!({
            "candidates": [{
                "content": { "role": "model", "parts": [
                    { "text": "Reading " },
                    { "text": "now." },
                    { "functionCall": { "name": "read_processing_file",
                        "args": { "file_category": "Transcript", "audio_filename": "CAR0002" } } }
                ]},
                "finishReason": "STOP"
            }],
            "usageMetadata": { "promptTokenCount": 10, "candidatesTokenCount": 4 }
        });

        let response = parse_response(&payload, "gemini-2.0-flash").unwrap();
        assert_eq!(response.text, "Reading now.");
        assert_eq!(response.function_calls.len(), 1);
        assert_eq!(response.function_calls[0].args["audio_filename"], "CAR0002");
        assert_eq!(response.input_tokens, Some(10));
        assert_eq!(response.finish_reason.as_deref(), Some("STOP"));
        assert_eq!(response.model, "gemini-2.0-flash");
    }

    #[test]
    fn test_parse_no_candidates() {
        let err = parse_response(&json!({ "candidates": [] }), "m").unwrap_err();
        assert!(matches!(err, ModelError::Empty));
    }

    #[test]
    fn test_floor_char_boundary() {
        assert_eq!(floor_char_boundary("héllo", 2), 1);
        assert_eq!(floor_char_boundary("abc", 10), 3);
    }
}
