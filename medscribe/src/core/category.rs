//! Artifact categories.

use crate::errors::ArtifactError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of text artifact persisted for a session.
///
/// Each category maps to exactly one file, `<Category>.txt`, inside the
/// session's processing directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ArtifactCategory {
    /// Speaker-labelled transcript of the call.
    Transcript,
    /// The populated consultation template.
    MedicalTemplate,
    /// Working diagnosis and clinical plan.
    AssessmentPlan,
    /// Feedback on the consultation technique.
    CriticReview,
    /// Patient-facing summary.
    MedicalSummary,
}

impl ArtifactCategory {
    /// Every category that can be read.
    pub const ALL: [Self; 5] = [
        Self::Transcript,
        Self::MedicalTemplate,
        Self::AssessmentPlan,
        Self::CriticReview,
        Self::MedicalSummary,
    ];

    /// Categories produced by generation stages and accepted by the save tool.
    pub const GENERATED: [Self; 4] = [
        Self::CriticReview,
        Self::MedicalTemplate,
        Self::AssessmentPlan,
        Self::MedicalSummary,
    ];

    /// Returns the canonical name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transcript => "Transcript",
            Self::MedicalTemplate => "MedicalTemplate",
            Self::AssessmentPlan => "AssessmentPlan",
            Self::CriticReview => "CriticReview",
            Self::MedicalSummary => "MedicalSummary",
        }
    }

    /// Returns the file name used inside a session directory.
    #[must_use]
    pub fn file_name(self) -> String {
        format!("{}.txt", self.as_str())
    }

    /// Returns true if generation stages may write this category.
    #[must_use]
    pub const fn is_generated(self) -> bool {
        !matches!(self, Self::Transcript)
    }

    /// Parses a category name accepted for reads.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::InvalidCategory`] for unknown names.
    pub fn parse_readable(name: &str) -> Result<Self, ArtifactError> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == name)
            .ok_or_else(|| ArtifactError::invalid_category(name, &names(&Self::ALL)))
    }

    /// Parses a category name accepted for generated writes.
    ///
    /// `Transcript` is rejected: only transcription produces it.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::InvalidCategory`] for unknown names and for
    /// `Transcript`.
    pub fn parse_generated(name: &str) -> Result<Self, ArtifactError> {
        Self::GENERATED
            .into_iter()
            .find(|c| c.as_str() == name)
            .ok_or_else(|| ArtifactError::invalid_category(name, &names(&Self::GENERATED)))
    }
}

fn names(categories: &[ArtifactCategory]) -> Vec<&'static str> {
    categories.iter().map(|c| c.as_str()).collect()
}

impl fmt::Display for ArtifactCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactCategory {
    type Err = ArtifactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_readable(s)
    }
}
