//! Built-in section renderers, one per pattern kind.

pub mod consent;
pub mod demographics;
pub mod diagrams;
pub mod disability;
pub mod insurance;
pub mod pain;
pub mod review_of_systems;
pub mod signature;
pub mod vitals;

use std::sync::Arc;

use crate::pipeline::detection::PatternKind;

use super::SectionRenderer;

/// The renderer for every kind.
pub fn default_renderers() -> Vec<(PatternKind, Arc<dyn SectionRenderer>)> {
    PatternKind::CANONICAL_ORDER
        .into_iter()
        .map(|kind| (kind, renderer_for(kind)))
        .collect()
}

fn renderer_for(kind: PatternKind) -> Arc<dyn SectionRenderer> {
    match kind {
        PatternKind::PatientDemographics => Arc::new(demographics::DemographicsRenderer),
        PatternKind::AdditionalDemographics => Arc::new(demographics::AdditionalDemographicsRenderer),
        PatternKind::PatientVitals => Arc::new(vitals::VitalsRenderer),
        PatternKind::ReviewOfSystems => Arc::new(review_of_systems::ReviewOfSystemsRenderer),
        PatternKind::TermsConditions => Arc::new(consent::TermsConditionsRenderer),
        PatternKind::TermsCheckbox => Arc::new(consent::TermsCheckboxRenderer),
        PatternKind::NeckDisabilityIndex => Arc::new(disability::DisabilityIndexRenderer::neck()),
        PatternKind::OswestryDisability => Arc::new(disability::DisabilityIndexRenderer::oswestry()),
        PatternKind::PainAssessment => Arc::new(pain::PainAssessmentRenderer),
        PatternKind::BodyPainDiagram => Arc::new(diagrams::PainDiagramRenderer),
        PatternKind::SensationAreasDiagram => Arc::new(diagrams::SensationDiagramRenderer),
        PatternKind::InsuranceCard => Arc::new(insurance::InsuranceCardRenderer),
        PatternKind::Signature => Arc::new(signature::SignatureRenderer),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use chrono::{DateTime, Utc};

    use crate::coordination::MemoryStore;
    use crate::models::{answers_from_json, FieldValue, FormDefinition};
    use crate::pipeline::detection::{PatternKind, PatternMatch};
    use crate::pipeline::render::SectionContext;
    use crate::security::{SecurityValidator, ValidatorLimits};

    /// A section context over answers sanitized the way the registry would.
    pub fn context_with_form(answers: serde_json::Value, form: serde_json::Value) -> SectionContext {
        let raw = answers_from_json(answers).expect("answers object");
        let validator = SecurityValidator::new(Arc::new(MemoryStore::new()), ValidatorLimits::default());
        SectionContext {
            answers: Arc::new(validator.sanitize_answers(&raw).sanitized),
            form: Arc::new(FormDefinition::from_document("form_1", &FieldValue::from(form))),
            request_id: "pdf_1717243200_resp_123".into(),
            generated_at: DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    pub fn context(answers: serde_json::Value) -> SectionContext {
        context_with_form(answers, serde_json::json!({}))
    }

    /// A match over every answered field.
    pub fn match_all(kind: PatternKind, ctx: &SectionContext) -> PatternMatch {
        PatternMatch::new(kind, ctx.answers.keys().cloned().collect())
    }
}
