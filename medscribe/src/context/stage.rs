//! Stage execution context.

use super::RunIdentity;
use crate::core::SessionKey;
use crate::events::{EventSink, NoOpEventSink};
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Immutable context passed to [`Stage::execute`](crate::stages::Stage::execute).
///
/// Stages hold no state between runs; everything a stage needs to know about
/// the consultation arrives here. Composers derive one child context per
/// nested stage with [`StageContext::child`].
#[derive(Clone)]
pub struct StageContext {
    run: RunIdentity,
    stage_name: String,
    filename: Option<String>,
    session_key: Option<SessionKey>,
    prompt: Option<String>,
    event_sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for StageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageContext")
            .field("run", &self.run)
            .field("stage_name", &self.stage_name)
            .field("filename", &self.filename)
            .field("session_key", &self.session_key)
            .finish_non_exhaustive()
    }
}

impl StageContext {
    /// Creates a root context for a run.
    #[must_use]
    pub fn new(run: RunIdentity, event_sink: Arc<dyn EventSink>) -> Self {
        Self {
            run,
            stage_name: "root".to_string(),
            filename: None,
            session_key: None,
            prompt: None,
            event_sink,
        }
    }

    /// Creates a root context whose events are discarded.
    #[must_use]
    pub fn detached() -> Self {
        Self::new(RunIdentity::new(), Arc::new(NoOpEventSink))
    }

    /// Sets the audio filename the run is processing.
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Sets the session key.
    #[must_use]
    pub fn with_session_key(mut self, key: SessionKey) -> Self {
        self.session_key = Some(key);
        self
    }

    /// Sets a free-text prompt (used by the follow-up worker).
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Derives the context for a nested stage.
    #[must_use]
    pub fn child(&self, stage_name: impl Into<String>) -> Self {
        Self {
            stage_name: stage_name.into(),
            ..self.clone()
        }
    }

    /// Returns the run identity.
    #[must_use]
    pub fn run(&self) -> &RunIdentity {
        &self.run
    }

    /// Returns the name of the stage this context was built for.
    #[must_use]
    pub fn stage_name(&self) -> &str {
        &self.stage_name
    }

    /// Returns the audio filename, if known.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Returns the session key, if known.
    #[must_use]
    pub fn session_key(&self) -> Option<&SessionKey> {
        self.session_key.as_ref()
    }

    /// Returns the free-text prompt, if any.
    #[must_use]
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    /// Returns the event sink.
    #[must_use]
    pub fn event_sink(&self) -> &Arc<dyn EventSink> {
        &self.event_sink
    }

    fn enrich(&self, data: Value) -> Value {
        let mut map = match data {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        map.entry("stage")
            .or_insert_with(|| json!(self.stage_name));
        map.insert(
            "pipeline_run_id".to_string(),
            json!(self.run.pipeline_run_id.to_string()),
        );
        if let Some(ref key) = self.session_key {
            map.insert("session".to_string(), json!(key.as_str()));
        }
        Value::Object(map)
    }

    /// Emits an event tagged with the stage name, run ID and session.
    pub async fn emit(&self, event_type: &str, data: Value) {
        self.event_sink
            .emit(event_type, Some(self.enrich(data)))
            .await;
    }

    /// Emits an event without awaiting.
    pub fn try_emit(&self, event_type: &str, data: Value) {
        self.event_sink.try_emit(event_type, Some(self.enrich(data)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;

    #[test]
    fn test_child_keeps_run_and_session() {
        let key = SessionKey::parse("CAR0002").unwrap();
        let root = StageContext::detached()
            .with_filename("CAR0002.mp3")
            .with_session_key(key.clone());
        let child = root.child("critic");

        assert_eq!(child.stage_name(), "critic");
        assert_eq!(child.session_key(), Some(&key));
        assert_eq!(child.filename(), Some("CAR0002.mp3"));
        assert_eq!(child.run().pipeline_run_id, root.run().pipeline_run_id);
    }

    #[tokio::test]
    async fn test_emit_enriches_data() {
        let sink = Arc::new(CollectingEventSink::new());
        let ctx = StageContext::new(RunIdentity::new(), sink.clone())
            .with_session_key(SessionKey::parse("CAR0002").unwrap())
            .child("summariser");

        ctx.emit("stage.started", json!({"attempt": 1})).await;
        ctx.try_emit("stage.completed", Value::Null);

        let events = sink.events();
        assert_eq!(events.len(), 2);
        let data = events[0].1.as_ref().unwrap();
        assert_eq!(data["stage"], "summariser");
        assert_eq!(data["session"], "CAR0002");
        assert_eq!(data["attempt"], 1);
        assert!(events[1].1.as_ref().unwrap().get("pipeline_run_id").is_some());
    }

    #[test]
    fn test_explicit_stage_field_is_kept() {
        let ctx = StageContext::detached().child("sequence");
        let data = ctx.enrich(json!({"stage": "template"}));
        assert_eq!(data["stage"], "template");
    }
}
