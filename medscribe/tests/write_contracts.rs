//! Writer stages may only save their own artifact in their own session.

use medscribe::context::StageContext;
use medscribe::core::{ArtifactCategory, SessionKey};
use medscribe::prompts;
use medscribe::providers::Part;
use medscribe::stages::{InstructionWorker, Stage};
use medscribe::testing::{script, ScriptedModel, TestWorkspace};
use medscribe::tools::SAVE_PROCESSING_FILE;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_test::assert_ok;

const ORIGINAL: &str = "Written by its own stage.";

fn key(raw: &str) -> SessionKey {
    SessionKey::parse(raw).unwrap()
}

/// Save responses the model received, in order.
fn save_responses(model: &ScriptedModel) -> Vec<Value> {
    model
        .requests()
        .iter()
        .flat_map(|r| r.contents.iter())
        .flat_map(|c| c.parts.iter())
        .filter_map(|p| match p {
            Part::FunctionResponse { name, response } if name == SAVE_PROCESSING_FILE => {
                Some(response.clone())
            }
            _ => None,
        })
        .collect()
}

struct Case {
    needle: &'static str,
    own: ArtifactCategory,
    foreign: ArtifactCategory,
    build: fn(&TestWorkspace) -> InstructionWorker,
}

fn writer_cases() -> Vec<Case> {
    vec![
        Case {
            needle: prompts::MEDICAL_TEMPLATE,
            own: ArtifactCategory::MedicalTemplate,
            foreign: ArtifactCategory::AssessmentPlan,
            build: |ws| ws.catalog.medical_template(),
        },
        Case {
            needle: prompts::ASSESSMENT_PLANNER,
            own: ArtifactCategory::AssessmentPlan,
            foreign: ArtifactCategory::MedicalSummary,
            build: |ws| ws.catalog.assessment_planner(),
        },
        Case {
            needle: prompts::CRITIC,
            own: ArtifactCategory::CriticReview,
            foreign: ArtifactCategory::MedicalTemplate,
            build: |ws| ws.catalog.critic(),
        },
        Case {
            needle: prompts::SUMMARISER,
            own: ArtifactCategory::MedicalSummary,
            foreign: ArtifactCategory::CriticReview,
            build: |ws| ws.catalog.summariser(),
        },
    ]
}

async fn seeded(root: &std::path::Path, model: Arc<ScriptedModel>) -> TestWorkspace {
    let ws = TestWorkspace::new(root, model);
    let session = key("CAR0002");
    assert_ok!(ws.store.write(&session, ArtifactCategory::Transcript, script::TRANSCRIPT).await);
    ws
}

#[tokio::test]
async fn test_writer_cannot_save_another_category() {
    for case in writer_cases() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedModel::new().save_then_reply(
            case.needle,
            "CAR0002",
            case.foreign,
            "Overwritten.",
            script::SAVED,
        ));
        let ws = seeded(dir.path(), model.clone()).await;
        let session = key("CAR0002");
        assert_ok!(ws.store.write(&session, case.foreign, ORIGINAL).await);

        let stage = (case.build)(&ws);
        let output = stage
            .execute(&StageContext::detached().with_session_key(session.clone()))
            .await;

        assert!(output.is_success(), "{}: {:?}", stage.name(), output.error);
        assert_eq!(output.get("saved_by_model"), Some(&json!(false)), "{}", stage.name());
        let foreign = assert_ok!(ws.store.read(&session, case.foreign).await);
        assert_eq!(foreign.content, ORIGINAL, "{} clobbered {}", stage.name(), case.foreign);
        let own = assert_ok!(ws.store.read(&session, case.own).await);
        assert_eq!(own.content, script::SAVED, "{}", stage.name());

        let responses = save_responses(&model);
        assert_eq!(responses.len(), 1, "{}", stage.name());
        assert_eq!(responses[0]["success"], json!(false));
        assert_eq!(responses[0]["error_kind"], json!("InvalidCategory"));
        assert_eq!(responses[0]["file_path"], json!(""));
    }
}

#[tokio::test]
async fn test_writer_cannot_save_another_session() {
    for case in writer_cases() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedModel::new().save_then_reply(
            case.needle,
            "CAR0003",
            case.own,
            "Wrong patient.",
            script::SAVED,
        ));
        let ws = seeded(dir.path(), model.clone()).await;
        let session = key("CAR0002");

        let stage = (case.build)(&ws);
        let output = stage
            .execute(&StageContext::detached().with_session_key(session.clone()))
            .await;

        assert!(output.is_success(), "{}: {:?}", stage.name(), output.error);
        assert!(!ws.store.exists(&key("CAR0003"), case.own).await, "{}", stage.name());
        let own = assert_ok!(ws.store.read(&session, case.own).await);
        assert_eq!(own.content, script::SAVED);

        let responses = save_responses(&model);
        assert_eq!(responses.len(), 1, "{}", stage.name());
        assert_eq!(responses[0]["success"], json!(false));
        assert_eq!(responses[0]["error_kind"], json!("InvalidSessionKey"));
    }
}

#[tokio::test]
async fn test_writer_saves_its_own_artifact() {
    for case in writer_cases() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedModel::new().save_then_reply(
            case.needle,
            "CAR0002",
            case.own,
            "Own content.",
            script::SAVED,
        ));
        let ws = seeded(dir.path(), model.clone()).await;
        let session = key("CAR0002");

        let stage = (case.build)(&ws);
        let output = stage
            .execute(&StageContext::detached().with_session_key(session.clone()))
            .await;

        assert!(output.is_success(), "{}: {:?}", stage.name(), output.error);
        assert_eq!(output.get("saved_by_model"), Some(&json!(true)));
        let own = assert_ok!(ws.store.read(&session, case.own).await);
        assert_eq!(own.content, "Own content.");
        assert_eq!(save_responses(&model)[0]["success"], json!(true));
    }
}
