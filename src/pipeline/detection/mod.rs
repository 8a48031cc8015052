//! Pattern detection: infer clinical sections from a form and its answers.
//!
//! Every matcher runs on every request. Matches may overlap; the same field
//! can be evidence for more than one section.

pub mod vocabulary;
pub mod matchers;
pub mod detector;

pub use matchers::*;
pub use detector::*;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::models::{Answers, FormDefinition};

/// Clinical section kinds the pipeline knows how to recognise and render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    PatientDemographics,
    AdditionalDemographics,
    PatientVitals,
    ReviewOfSystems,
    TermsConditions,
    TermsCheckbox,
    NeckDisabilityIndex,
    OswestryDisability,
    PainAssessment,
    BodyPainDiagram,
    SensationAreasDiagram,
    InsuranceCard,
    Signature,
}

impl PatternKind {
    /// Clinical reading order of a finished document.
    pub const CANONICAL_ORDER: [PatternKind; 13] = [
        PatternKind::PatientDemographics,
        PatternKind::AdditionalDemographics,
        PatternKind::PatientVitals,
        PatternKind::ReviewOfSystems,
        PatternKind::TermsConditions,
        PatternKind::TermsCheckbox,
        PatternKind::NeckDisabilityIndex,
        PatternKind::OswestryDisability,
        PatternKind::PainAssessment,
        PatternKind::BodyPainDiagram,
        PatternKind::SensationAreasDiagram,
        PatternKind::InsuranceCard,
        PatternKind::Signature,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PatternKind::PatientDemographics => "patient_demographics",
            PatternKind::AdditionalDemographics => "additional_demographics",
            PatternKind::PatientVitals => "patient_vitals",
            PatternKind::ReviewOfSystems => "review_of_systems",
            PatternKind::TermsConditions => "terms_conditions",
            PatternKind::TermsCheckbox => "terms_checkbox",
            PatternKind::NeckDisabilityIndex => "neck_disability_index",
            PatternKind::OswestryDisability => "oswestry_disability",
            PatternKind::PainAssessment => "pain_assessment",
            PatternKind::BodyPainDiagram => "body_pain_diagram",
            PatternKind::SensationAreasDiagram => "sensation_areas_diagram",
            PatternKind::InsuranceCard => "insurance_card",
            PatternKind::Signature => "signature",
        }
    }

    /// Section heading shown in the document.
    pub fn title(self) -> &'static str {
        match self {
            PatternKind::PatientDemographics => "Patient Demographics",
            PatternKind::AdditionalDemographics => "Additional Demographics",
            PatternKind::PatientVitals => "Patient Vital Signs",
            PatternKind::ReviewOfSystems => "Review of Systems",
            PatternKind::TermsConditions => "Terms and Conditions",
            PatternKind::TermsCheckbox => "Terms and Agreements",
            PatternKind::NeckDisabilityIndex => "Neck Disability Index",
            PatternKind::OswestryDisability => "Oswestry Disability Index",
            PatternKind::PainAssessment => "Pain Assessment",
            PatternKind::BodyPainDiagram => "Body Pain Diagram",
            PatternKind::SensationAreasDiagram => "Sensation Areas Diagram",
            PatternKind::InsuranceCard => "Insurance Information",
            PatternKind::Signature => "Patient Signature",
        }
    }

    /// Position in [`Self::CANONICAL_ORDER`].
    pub fn canonical_position(self) -> usize {
        match self {
            PatternKind::PatientDemographics => 0,
            PatternKind::AdditionalDemographics => 1,
            PatternKind::PatientVitals => 2,
            PatternKind::ReviewOfSystems => 3,
            PatternKind::TermsConditions => 4,
            PatternKind::TermsCheckbox => 5,
            PatternKind::NeckDisabilityIndex => 6,
            PatternKind::OswestryDisability => 7,
            PatternKind::PainAssessment => 8,
            PatternKind::BodyPainDiagram => 9,
            PatternKind::SensationAreasDiagram => 10,
            PatternKind::InsuranceCard => 11,
            PatternKind::Signature => 12,
        }
    }

    /// Upper-case form used in render error codes (`RNDR-SIGNATURE-001`).
    pub fn code_segment(self) -> String {
        self.as_str().to_uppercase()
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatternKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PatternKind::CANONICAL_ORDER
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown pattern kind: {}", s))
    }
}

/// One matcher's finding.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternMatch {
    pub kind: PatternKind,
    /// Answer keys that make up the section. Always a subset of the answers.
    pub matched_fields: BTreeSet<String>,
    /// Matcher-specific context for the renderer.
    pub extra: serde_json::Value,
}

impl PatternMatch {
    pub fn new(kind: PatternKind, matched_fields: BTreeSet<String>) -> Self {
        Self {
            kind,
            matched_fields,
            extra: serde_json::Value::Null,
        }
    }

    pub fn with_extra(mut self, extra: serde_json::Value) -> Self {
        self.extra = extra;
        self
    }
}

/// One independent detection rule.
pub trait Matcher: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &'static str;

    /// Propose a match, or `None` when the evidence threshold is not met.
    /// Must be a pure function of its inputs.
    fn find(&self, form: &FormDefinition, answers: &Answers) -> Option<PatternMatch>;
}
