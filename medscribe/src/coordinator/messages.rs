//! User-facing wording: filename extraction, failure explanations and
//! pipeline summaries.

use crate::errors::ErrorKind;
use crate::pipeline::{BranchReport, PipelineReport, SequentialComposer};
use crate::stages::{AudioIntake, ASSESSMENT_PLANNER, CRITIC, SUMMARISER};
use regex::Regex;
use std::sync::OnceLock;

/// Asks for a recording.
pub const ASK_FOR_FILENAME: &str = "Which consultation recording should I process? \
Give me the filename of an .mp3 or .wav file in the upload folder, for example CAR0002.mp3.";

fn filename_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)\b[A-Za-z0-9_\-.]+\.(?:mp3|wav)\b").ok())
        .as_ref()
}

/// Finds the first `*.mp3` or `*.wav` filename in free text.
#[must_use]
pub fn extract_filename(message: &str) -> Option<String> {
    filename_pattern()?
        .find(message)
        .map(|m| m.as_str().to_string())
}

/// Turns a failure into a plain-language explanation.
#[must_use]
pub fn explain(kind: Option<ErrorKind>, detail: &str) -> String {
    match kind {
        Some(ErrorKind::DirectoryMissing) => {
            "The upload folder does not exist, so I cannot look for recordings. \
             Please check the storage settings."
                .to_string()
        }
        Some(ErrorKind::FileNotFound) => {
            "I could not find that recording in the upload folder. \
             Please check the filename and make sure the file was uploaded."
                .to_string()
        }
        Some(ErrorKind::UnsupportedFormat) => {
            "That file type is not supported. Please provide an .mp3 or .wav recording.".to_string()
        }
        Some(ErrorKind::NamespaceNotFound | ErrorKind::ArtifactNotFound) => {
            "That document has not been generated for this consultation yet.".to_string()
        }
        Some(ErrorKind::DecodingError) => {
            "A stored document is damaged and cannot be read as text.".to_string()
        }
        Some(ErrorKind::ModelFailure) => {
            "The language model could not be reached or returned nothing usable. \
             Please try again in a moment."
                .to_string()
        }
        Some(ErrorKind::IoFailure) => {
            format!("There was a problem reading or writing files ({detail}).")
        }
        Some(
            ErrorKind::InvalidCategory
            | ErrorKind::EmptySessionKey
            | ErrorKind::InvalidSessionKey
            | ErrorKind::InvalidArguments,
        ) => format!("Something went wrong inside the pipeline ({detail})."),
        None => format!("Something went wrong: {detail}"),
    }
}

/// Names a branch by what it produces.
#[must_use]
pub fn describe_branch(name: &str) -> &str {
    match name {
        SequentialComposer::TEMPLATE_SEQUENCE => "the consultation template",
        ASSESSMENT_PLANNER => "the assessment and plan",
        CRITIC => "the consultation review",
        SUMMARISER => "the patient summary",
        AudioIntake::NAME => "the transcript",
        other => other,
    }
}

fn explain_branch(report: &BranchReport) -> String {
    format!(
        "I could not produce {}: {}",
        describe_branch(&report.name),
        explain(report.error_kind, report.error.as_deref().unwrap_or_default())
    )
}

/// Renders the outcome of a pipeline run for `filename`.
#[must_use]
pub fn render_report(filename: &str, report: &PipelineReport) -> String {
    if let Some(intake) = report.intake_failure() {
        return format!("{}\n{ASK_FOR_FILENAME}", explain_branch(intake));
    }
    let Some(ref fan_out) = report.fan_out else {
        return format!("Processing of {filename} did not start.");
    };

    let mut lines = Vec::new();
    let produced: Vec<String> = fan_out
        .artifacts()
        .iter()
        .map(|record| record.category.to_string())
        .collect();
    if produced.is_empty() {
        lines.push(format!("I transcribed {filename} but could not generate any documents."));
    } else {
        lines.push(format!(
            "I transcribed {filename} and generated: {}.",
            produced.join(", ")
        ));
    }

    if let Some(review) = fan_out
        .branch(SequentialComposer::TEMPLATE_SEQUENCE)
        .filter(|b| b.is_success())
        .and_then(|b| b.text.as_deref())
    {
        lines.push(format!("Template review: {review}"));
    }
    lines.extend(fan_out.failures().map(explain_branch));
    lines.push("Ask me anything about the consultation.".to_string());
    lines.join("\n")
}
