//! Per-conversation state held by the caller between turns.

use crate::core::SessionKey;
use crate::pipeline::PipelineReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Where a conversation is in the consultation workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No recording named yet.
    #[default]
    AwaitingFilename,
    /// The pipeline is running.
    Processing,
    /// A transcript exists; follow-up questions are answered.
    Ready,
    /// Intake failed; a new filename is needed.
    Failed,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingFilename => write!(f, "awaiting_filename"),
            Self::Processing => write!(f, "processing"),
            Self::Ready => write!(f, "ready"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One user's conversation with the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultationSession {
    /// Conversation ID, also used as the run's conversation ID.
    pub id: Uuid,
    /// The recording being discussed.
    pub filename: Option<String>,
    /// Session key of the recording, once intake succeeded.
    pub session_key: Option<SessionKey>,
    /// Current phase.
    pub phase: SessionPhase,
    /// Report of the latest pipeline run.
    pub last_report: Option<PipelineReport>,
    /// Number of user turns handled.
    pub turns: usize,
    /// When the conversation started.
    pub started_at: DateTime<Utc>,
}

impl Default for ConsultationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsultationSession {
    /// Starts a conversation with no recording.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            filename: None,
            session_key: None,
            phase: SessionPhase::AwaitingFilename,
            last_report: None,
            turns: 0,
            started_at: Utc::now(),
        }
    }

    /// Returns true once follow-up questions can be answered.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.phase == SessionPhase::Ready && self.session_key.is_some()
    }

    /// Forgets the current recording.
    pub fn reset(&mut self) {
        self.filename = None;
        self.session_key = None;
        self.phase = SessionPhase::AwaitingFilename;
        self.last_report = None;
    }
}
