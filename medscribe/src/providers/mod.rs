//! Model capability seam.
//!
//! Everything that talks to a language model goes through [`ModelClient`].
//! Requests carry a system instruction, a conversation of [`Content`] turns
//! (text, inline audio, function calls and their responses) and the tool
//! declarations the model may call.

mod gemini;
mod retry;

pub use gemini::{GeminiClient, DEFAULT_ENDPOINT};
pub use retry::RetryConfig;

use retry::with_retry;

use crate::errors::ModelError;
use crate::tools::ToolDefinition;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The caller (user text, tool responses).
    User,
    /// The model.
    Model,
}

/// A function call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Provider-assigned call id, when the provider supplies one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The tool name.
    pub name: String,
    /// Arguments as an object or a JSON-encoded string.
    #[serde(default)]
    pub args: Value,
}

impl FunctionCall {
    /// Creates a function call without an id.
    #[must_use]
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self {
            id: None,
            name: name.into(),
            args,
        }
    }
}

/// One piece of a conversation turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    /// Plain text.
    Text(String),
    /// Binary media sent inline.
    InlineData {
        /// MIME type, e.g. `audio/mpeg`.
        mime_type: String,
        /// Raw bytes.
        data: Vec<u8>,
    },
    /// A call the model asked for.
    FunctionCall(FunctionCall),
    /// The result of a call, fed back to the model.
    FunctionResponse {
        /// The tool that produced the response.
        name: String,
        /// The JSON response.
        response: Value,
    },
}

/// A conversation turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    /// Who produced the turn.
    pub role: Role,
    /// The turn's parts, in order.
    pub parts: Vec<Part>,
}

impl Content {
    /// A user turn with a single text part.
    #[must_use]
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::Text(text.into())],
        }
    }

    /// A user turn carrying tool responses.
    #[must_use]
    pub fn tool_responses(responses: Vec<(String, Value)>) -> Self {
        Self {
            role: Role::User,
            parts: responses
                .into_iter()
                .map(|(name, response)| Part::FunctionResponse { name, response })
                .collect(),
        }
    }
}

/// A request to the model.
#[derive(Debug, Clone, Default)]
pub struct ModelRequest {
    /// Overrides the client's default model.
    pub model: Option<String>,
    /// The system instruction.
    pub system_instruction: Option<String>,
    /// Conversation turns.
    pub contents: Vec<Content>,
    /// Tools the model may call.
    pub tools: Vec<ToolDefinition>,
}

impl ModelRequest {
    /// Creates an empty request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the model name.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the system instruction.
    #[must_use]
    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    /// Appends a conversation turn.
    #[must_use]
    pub fn with_content(mut self, content: Content) -> Self {
        self.contents.push(content);
        self
    }

    /// Sets the callable tools.
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}

/// The model's answer to a request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    /// Concatenated text parts. Empty when the model only called tools.
    pub text: String,
    /// Tool calls requested by the model, in order.
    pub function_calls: Vec<FunctionCall>,
    /// The model that answered.
    pub model: String,
    /// Prompt tokens, when reported.
    pub input_tokens: Option<u32>,
    /// Completion tokens, when reported.
    pub output_tokens: Option<u32>,
    /// Provider finish reason, when reported.
    pub finish_reason: Option<String>,
}

impl ModelResponse {
    /// A text-only response.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// A response that only calls tools.
    #[must_use]
    pub fn calls(function_calls: Vec<FunctionCall>) -> Self {
        Self {
            function_calls,
            ..Self::default()
        }
    }

    /// Returns true if the model asked for tool calls.
    #[must_use]
    pub fn has_function_calls(&self) -> bool {
        !self.function_calls.is_empty()
    }

    /// Rebuilds the model turn so it can be appended to the history.
    #[must_use]
    pub fn to_content(&self) -> Content {
        let mut parts = Vec::with_capacity(self.function_calls.len() + 1);
        if !self.text.is_empty() {
            parts.push(Part::Text(self.text.clone()));
        }
        parts.extend(self.function_calls.iter().cloned().map(Part::FunctionCall));
        Content {
            role: Role::Model,
            parts,
        }
    }
}

/// Generates text, optionally grounded on audio, possibly requesting tool calls.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Sends one request and returns the model's answer.
    async fn generate(&self, request: ModelRequest) -> Result<ModelResponse, ModelError>;
}

/// Decorates a client with retries of transient failures.
pub struct RetryingModelClient {
    inner: Arc<dyn ModelClient>,
    config: RetryConfig,
}

impl RetryingModelClient {
    /// Wraps `inner` with the given retry policy.
    #[must_use]
    pub fn new(inner: Arc<dyn ModelClient>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

impl std::fmt::Debug for RetryingModelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingModelClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ModelClient for RetryingModelClient {
    async fn generate(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        let key = request.model.clone().unwrap_or_else(|| "default".to_string());
        with_retry(&self.config, &key, ModelError::is_retryable, || {
            self.inner.generate(request.clone())
        })
        .await
    }
}
