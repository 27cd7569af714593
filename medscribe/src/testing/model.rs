//! A deterministic [`ModelClient`] driven by instruction-matching rules.

use crate::core::ArtifactCategory;
use crate::errors::ModelError;
use crate::providers::{FunctionCall, ModelClient, ModelRequest, ModelResponse, Part, Role};
use crate::tools::SAVE_PROCESSING_FILE;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Produces a response for a matched request.
pub type Responder = Arc<dyn Fn(&ModelRequest) -> Result<ModelResponse, ModelError> + Send + Sync>;

struct Rule {
    needle: String,
    responder: Responder,
    delay: Option<Duration>,
}

/// Answers requests by the first rule whose needle appears in the system
/// instruction or in a user text part.
///
/// Rules inspect the request rather than keeping per-caller state, so one
/// model can serve concurrent workers. Every request is recorded.
#[derive(Default)]
pub struct ScriptedModel {
    rules: RwLock<Vec<Rule>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl std::fmt::Debug for ScriptedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedModel")
            .field("rules", &self.rules.read().len())
            .field("requests", &self.requests.lock().len())
            .finish()
    }
}

/// Number of model turns already present in a request's history.
#[must_use]
pub fn model_turns(request: &ModelRequest) -> usize {
    request
        .contents
        .iter()
        .filter(|c| c.role == Role::Model)
        .count()
}

fn mentions(request: &ModelRequest, needle: &str) -> bool {
    if request
        .system_instruction
        .as_deref()
        .is_some_and(|s| s.contains(needle))
    {
        return true;
    }
    request
        .contents
        .iter()
        .filter(|c| c.role == Role::User)
        .flat_map(|c| c.parts.iter())
        .any(|p| matches!(p, Part::Text(text) if text.contains(needle)))
}

impl ScriptedModel {
    /// Creates a model with no rules. Unmatched requests fail with `Empty`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule.
    #[must_use]
    pub fn on(self, needle: impl Into<String>, responder: Responder) -> Self {
        self.rules.write().push(Rule {
            needle: needle.into(),
            responder,
            delay: None,
        });
        self
    }

    /// Always answers `text`.
    #[must_use]
    pub fn reply(self, needle: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        self.on(needle, Arc::new(move |_| Ok(ModelResponse::text(text.clone()))))
    }

    /// Always fails with `error`.
    #[must_use]
    pub fn fail(self, needle: impl Into<String>, error: ModelError) -> Self {
        self.on(needle, Arc::new(move |_| Err(error.clone())))
    }

    /// First turn saves `content` as `category`, second turn answers `text`.
    #[must_use]
    pub fn save_then_reply(
        self,
        needle: impl Into<String>,
        session: &str,
        category: ArtifactCategory,
        content: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        let content: String = content.into();
        let call = FunctionCall::new(
            SAVE_PROCESSING_FILE,
            json!({
                "file_category": category.as_str(),
                "contents": content,
                "audio_filename": session,
            }),
        );
        let text = text.into();
        self.on(
            needle,
            Arc::new(move |request| {
                if model_turns(request) == 0 {
                    Ok(ModelResponse::calls(vec![call.clone()]))
                } else {
                    Ok(ModelResponse::text(text.clone()))
                }
            }),
        )
    }

    /// Answers `text` after sleeping for `delay`.
    #[must_use]
    pub fn slow_reply(self, needle: impl Into<String>, text: impl Into<String>, delay: Duration) -> Self {
        let text = text.into();
        self.rules.write().push(Rule {
            needle: needle.into(),
            responder: Arc::new(move |_| Ok(ModelResponse::text(text.clone()))),
            delay: Some(delay),
        });
        self
    }

    /// Returns every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().clone()
    }

    /// Returns how many requests mentioned `needle`.
    #[must_use]
    pub fn count_mentioning(&self, needle: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| mentions(r, needle))
            .count()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn generate(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        self.requests.lock().push(request.clone());
        let matched = self
            .rules
            .read()
            .iter()
            .find(|rule| mentions(&request, &rule.needle))
            .map(|rule| (rule.responder.clone(), rule.delay));

        let Some((responder, delay)) = matched else {
            return Err(ModelError::Empty);
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        responder(&request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Content;

    #[tokio::test]
    async fn test_first_matching_rule_wins() {
        let model = ScriptedModel::new()
            .reply("critic", "first")
            .reply("critic", "second");
        let request = ModelRequest::new().with_system_instruction("You are the critic.");

        let response = model.generate(request).await.unwrap();
        assert_eq!(response.text, "first");
        assert_eq!(model.count_mentioning("critic"), 1);
    }

    #[tokio::test]
    async fn test_save_then_reply_follows_history() {
        let model = ScriptedModel::new().save_then_reply(
            "template",
            "CAR0002",
            ArtifactCategory::MedicalTemplate,
            "Chief complaint: knee pain",
            "Saved.",
        );
        let mut request = ModelRequest::new().with_system_instruction("template agent");

        let first = model.generate(request.clone()).await.unwrap();
        assert_eq!(first.function_calls[0].name, SAVE_PROCESSING_FILE);
        assert_eq!(first.function_calls[0].args["audio_filename"], "CAR0002");

        request.contents.push(first.to_content());
        request.contents.push(Content::tool_responses(vec![]));
        let second = model.generate(request).await.unwrap();
        assert_eq!(second.text, "Saved.");
    }

    #[tokio::test]
    async fn test_unmatched_request_fails() {
        let model = ScriptedModel::new();
        let err = model
            .generate(ModelRequest::new().with_content(Content::user_text("hi")))
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::Empty));
    }
}
