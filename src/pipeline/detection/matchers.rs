use std::collections::{BTreeMap, BTreeSet};

use serde_json::json;

use crate::models::{Answers, FieldValue, FormDefinition, FormElement};

use super::vocabulary::{
    has_any_prefix, IndexItem, ADDITIONAL_DEMOGRAPHICS_PREFIX, CONSENT_TITLE_WORDS,
    DEMOGRAPHIC_FIELDS, INDEX_PREFIXES, NDI_ITEMS, NDI_PANEL_TITLE, NDI_PREFIXES, ODI_ITEMS,
    ODI_PANEL_TITLE, ODI_PREFIXES, PAIN_PANEL_TITLE, PANEL_FIRST_SCORED_QUESTION,
    REVIEW_OF_SYSTEMS_PREFIX, TERMS_NAME_WORDS, VITAL_SIGNS,
};
use super::{Matcher, PatternKind, PatternMatch};

/// The matcher set used by [`super::PatternDetector::new`].
pub fn default_matchers() -> Vec<Box<dyn Matcher>> {
    vec![
        // Author-tagged sections
        Box::new(SectionElementMatcher::tagged(
            "demographics_metadata",
            PatternKind::PatientDemographics,
            "patient_demographics",
        )),
        Box::new(
            SectionElementMatcher::tagged(
                "additional_demographics_metadata",
                PatternKind::AdditionalDemographics,
                "additional_demographics",
            )
            .with_companion_prefix(ADDITIONAL_DEMOGRAPHICS_PREFIX),
        ),
        Box::new(SectionElementMatcher::tagged(
            "vitals_metadata",
            PatternKind::PatientVitals,
            "patient_vitals",
        )),
        Box::new(
            SectionElementMatcher::tagged(
                "review_of_systems_metadata",
                PatternKind::ReviewOfSystems,
                "review_of_systems",
            )
            .with_companion_prefix(REVIEW_OF_SYSTEMS_PREFIX),
        ),
        Box::new(SectionElementMatcher::tagged(
            "insurance_metadata",
            PatternKind::InsuranceCard,
            "insurance_card",
        )),
        // Titled panels
        Box::new(
            SectionElementMatcher::tagged("ndi_panel", PatternKind::NeckDisabilityIndex, "neck_disability_index")
                .with_title(NDI_PANEL_TITLE)
                .with_scored_items(&NDI_ITEMS),
        ),
        Box::new(
            SectionElementMatcher::tagged("odi_panel", PatternKind::OswestryDisability, "oswestry_disability")
                .with_title(ODI_PANEL_TITLE)
                .with_scored_items(&ODI_ITEMS),
        ),
        Box::new(
            SectionElementMatcher::tagged("pain_panel", PatternKind::PainAssessment, "pain_assessment")
                .with_title(PAIN_PANEL_TITLE),
        ),
        // Field-name heuristics
        Box::new(NameSetMatcher::new(
            "demographic_names",
            PatternKind::PatientDemographics,
            DEMOGRAPHIC_FIELDS.iter().map(|(key, _)| *key).collect(),
            2,
        )),
        Box::new(NameSetMatcher::new(
            "vital_sign_names",
            PatternKind::PatientVitals,
            VITAL_SIGNS.iter().map(|v| v.key).collect(),
            2,
        )),
        Box::new(PrefixMatcher::new(
            "additional_demographics_prefix",
            PatternKind::AdditionalDemographics,
            &[ADDITIONAL_DEMOGRAPHICS_PREFIX],
            2,
        )),
        Box::new(PrefixMatcher::new(
            "ros_prefix",
            PatternKind::ReviewOfSystems,
            &[REVIEW_OF_SYSTEMS_PREFIX],
            2,
        )),
        Box::new(PrefixMatcher::new("ndi_prefix", PatternKind::NeckDisabilityIndex, NDI_PREFIXES, 5)),
        Box::new(PrefixMatcher::new("odi_prefix", PatternKind::OswestryDisability, ODI_PREFIXES, 5)),
        Box::new(KeywordMatcher::new(
            "pain_keyword",
            PatternKind::PainAssessment,
            "pain",
            1,
            INDEX_PREFIXES,
        )),
        Box::new(KeywordMatcher::new(
            "insurance_keyword",
            PatternKind::InsuranceCard,
            "insurance",
            2,
            &[],
        )),
        // Consent and signatures
        Box::new(TermsPanelMatcher),
        Box::new(TermsCheckboxMatcher),
        Box::new(SignatureMatcher),
        // Structural
        Box::new(PointDiagramMatcher::new(PointShape::PainIntensity)),
        Box::new(PointDiagramMatcher::new(PointShape::Sensation)),
    ]
}

fn answered(answers: &Answers, key: &str) -> bool {
    answers.get(key).is_some_and(|v| !v.is_blank())
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

fn is_consent_title(title: &str) -> bool {
    contains_any(&title.to_lowercase(), CONSENT_TITLE_WORDS)
}

// ═══════════════════════════════════════════════════════════
// Author-tagged and titled sections
// ═══════════════════════════════════════════════════════════

/// Sections the form author marked up: an element whose `metadata.patternType`
/// equals one of `hints`, or a container titled exactly like a known
/// questionnaire. The element and everything nested in it are the section.
pub struct SectionElementMatcher {
    name: &'static str,
    kind: PatternKind,
    hints: Vec<&'static str>,
    titles: Vec<&'static str>,
    companion_prefix: Option<&'static str>,
    scored_items: Option<&'static [IndexItem]>,
}

impl SectionElementMatcher {
    pub fn tagged(name: &'static str, kind: PatternKind, hint: &'static str) -> Self {
        Self {
            name,
            kind,
            hints: vec![hint],
            titles: Vec::new(),
            companion_prefix: None,
            scored_items: None,
        }
    }

    pub fn with_title(mut self, title: &'static str) -> Self {
        self.titles.push(title);
        self
    }

    /// Once the section is found, answers sharing this prefix belong to it too.
    pub fn with_companion_prefix(mut self, prefix: &'static str) -> Self {
        self.companion_prefix = Some(prefix);
        self
    }

    /// Map `questionN` children onto index items, starting at question 3.
    pub fn with_scored_items(mut self, items: &'static [IndexItem]) -> Self {
        self.scored_items = Some(items);
        self
    }

    fn is_section(&self, element: &FormElement) -> bool {
        let hinted = element
            .pattern_hint
            .as_deref()
            .is_some_and(|hint| self.hints.contains(&hint));
        let titled = element.is_container()
            && element.title.as_deref().is_some_and(|title| {
                self.titles.iter().any(|t| t.eq_ignore_ascii_case(title.trim()))
            });
        hinted || titled
    }
}

impl Matcher for SectionElementMatcher {
    fn name(&self) -> &'static str {
        self.name
    }

    fn find(&self, form: &FormDefinition, answers: &Answers) -> Option<PatternMatch> {
        let sections: Vec<&FormElement> = form
            .elements()
            .into_iter()
            .filter(|e| self.is_section(e))
            .collect();
        if sections.is_empty() {
            return None;
        }

        let mut fields = BTreeSet::new();
        let mut items = BTreeMap::new();
        for section in &sections {
            let names = std::iter::once(section.name.as_str()).chain(section.descendant_names());
            for name in names {
                if answers.contains_key(name) {
                    fields.insert(name.to_string());
                }
                if let Some(item) = self.scored_item_for(name) {
                    if answers.contains_key(name) {
                        items.insert(name.to_string(), item.slug);
                    }
                }
            }
        }

        if let Some(prefix) = self.companion_prefix {
            fields.extend(answers.keys().filter(|k| k.starts_with(prefix)).cloned());
        }

        if fields.is_empty() {
            return None;
        }

        let section_names: Vec<&str> = sections.iter().map(|s| s.name.as_str()).collect();
        let mut extra = json!({"evidence": "form_element", "elements": section_names});
        if !items.is_empty() {
            extra["items"] = json!(items);
        }
        Some(PatternMatch::new(self.kind, fields).with_extra(extra))
    }
}

impl SectionElementMatcher {
    fn scored_item_for(&self, name: &str) -> Option<&'static IndexItem> {
        let items = self.scored_items?;
        let number: usize = name.strip_prefix("question")?.parse().ok()?;
        let index = number.checked_sub(PANEL_FIRST_SCORED_QUESTION)?;
        items.get(index)
    }
}

// ═══════════════════════════════════════════════════════════
// Field-name heuristics
// ═══════════════════════════════════════════════════════════

/// At least `min` answered fields from a known name list.
pub struct NameSetMatcher {
    name: &'static str,
    kind: PatternKind,
    names: Vec<&'static str>,
    min: usize,
}

impl NameSetMatcher {
    pub fn new(name: &'static str, kind: PatternKind, names: Vec<&'static str>, min: usize) -> Self {
        Self {
            name,
            kind,
            names,
            min,
        }
    }
}

impl Matcher for NameSetMatcher {
    fn name(&self) -> &'static str {
        self.name
    }

    fn find(&self, _form: &FormDefinition, answers: &Answers) -> Option<PatternMatch> {
        let fields: BTreeSet<String> = self
            .names
            .iter()
            .filter(|name| answered(answers, name))
            .map(|name| name.to_string())
            .collect();
        if fields.len() < self.min {
            return None;
        }
        Some(PatternMatch::new(self.kind, fields).with_extra(json!({"evidence": "field_names"})))
    }
}

/// At least `min` answered fields sharing one of `prefixes`.
pub struct PrefixMatcher {
    name: &'static str,
    kind: PatternKind,
    prefixes: &'static [&'static str],
    min: usize,
}

impl PrefixMatcher {
    pub fn new(
        name: &'static str,
        kind: PatternKind,
        prefixes: &'static [&'static str],
        min: usize,
    ) -> Self {
        Self {
            name,
            kind,
            prefixes,
            min,
        }
    }
}

impl Matcher for PrefixMatcher {
    fn name(&self) -> &'static str {
        self.name
    }

    fn find(&self, _form: &FormDefinition, answers: &Answers) -> Option<PatternMatch> {
        let fields: BTreeSet<String> = answers
            .iter()
            .filter(|(key, value)| has_any_prefix(key, self.prefixes) && !value.is_blank())
            .map(|(key, _)| key.clone())
            .collect();
        if fields.len() < self.min {
            return None;
        }
        Some(PatternMatch::new(self.kind, fields).with_extra(json!({"evidence": "field_prefix"})))
    }
}

/// At least `min` answered fields whose name contains `keyword`.
///
/// Fields under `excluded_prefixes` and point-list values (which belong to the
/// diagram matchers) are not evidence.
pub struct KeywordMatcher {
    name: &'static str,
    kind: PatternKind,
    keyword: &'static str,
    min: usize,
    excluded_prefixes: &'static [&'static str],
}

impl KeywordMatcher {
    pub fn new(
        name: &'static str,
        kind: PatternKind,
        keyword: &'static str,
        min: usize,
        excluded_prefixes: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            kind,
            keyword,
            min,
            excluded_prefixes,
        }
    }
}

impl Matcher for KeywordMatcher {
    fn name(&self) -> &'static str {
        self.name
    }

    fn find(&self, _form: &FormDefinition, answers: &Answers) -> Option<PatternMatch> {
        let fields: BTreeSet<String> = answers
            .iter()
            .filter(|(key, value)| {
                let lower = key.to_lowercase();
                lower.contains(self.keyword)
                    && !has_any_prefix(&lower, self.excluded_prefixes)
                    && !value.is_blank()
                    && classify_points(value).is_none()
            })
            .map(|(key, _)| key.clone())
            .collect();
        if fields.len() < self.min {
            return None;
        }
        Some(
            PatternMatch::new(self.kind, fields)
                .with_extra(json!({"evidence": "keyword", "keyword": self.keyword})),
        )
    }
}

// ═══════════════════════════════════════════════════════════
// Consent, terms, signatures
// ═══════════════════════════════════════════════════════════

/// A panel tagged `terms_and_conditions`: its answered children (minus the
/// static header/content blocks) plus any acceptance or signature answers.
pub struct TermsPanelMatcher;

impl Matcher for TermsPanelMatcher {
    fn name(&self) -> &'static str {
        "terms_panel"
    }

    fn find(&self, form: &FormDefinition, answers: &Answers) -> Option<PatternMatch> {
        let panels: Vec<&FormElement> = form
            .elements()
            .into_iter()
            .filter(|e| e.pattern_hint.as_deref() == Some("terms_and_conditions"))
            .collect();
        if panels.is_empty() {
            return None;
        }

        let mut fields: BTreeSet<String> = panels
            .iter()
            .flat_map(|panel| panel.descendant_names())
            .filter(|name| !is_static_terms_block(name))
            .filter(|name| answers.contains_key(*name))
            .map(str::to_string)
            .collect();

        fields.extend(
            answers
                .keys()
                .filter(|key| !is_static_terms_block(key))
                .filter(|key| contains_any(&key.to_lowercase(), &["terms", "accept", "signature"]))
                .cloned(),
        );

        if fields.is_empty() {
            return None;
        }
        let panel_titles: Vec<&str> = panels.iter().filter_map(|p| p.title.as_deref()).collect();
        Some(
            PatternMatch::new(PatternKind::TermsConditions, fields)
                .with_extra(json!({"evidence": "form_element", "panel_titles": panel_titles})),
        )
    }
}

fn is_static_terms_block(name: &str) -> bool {
    name.starts_with("terms_header") || name.starts_with("terms_content")
}

/// Single agreement checkboxes: a checkbox or boolean named like terms,
/// agreement, or consent. Without a form, an answer of that name holding a
/// boolean or a selection list counts.
pub struct TermsCheckboxMatcher;

impl Matcher for TermsCheckboxMatcher {
    fn name(&self) -> &'static str {
        "terms_checkbox"
    }

    fn find(&self, form: &FormDefinition, answers: &Answers) -> Option<PatternMatch> {
        let is_terms_name = |name: &str| contains_any(&name.to_lowercase(), TERMS_NAME_WORDS);

        let mut fields: BTreeSet<String> = form
            .elements()
            .into_iter()
            .filter(|e| matches!(e.kind.as_str(), "checkbox" | "boolean"))
            .filter(|e| is_terms_name(&e.name) && answers.contains_key(&e.name))
            .map(|e| e.name.clone())
            .collect();

        fields.extend(
            answers
                .iter()
                .filter(|(key, value)| {
                    is_terms_name(key)
                        && matches!(value, FieldValue::Bool(_) | FieldValue::List(_))
                        && classify_points(value).is_none()
                })
                .map(|(key, _)| key.clone()),
        );

        if fields.is_empty() {
            return None;
        }
        Some(
            PatternMatch::new(PatternKind::TermsCheckbox, fields)
                .with_extra(json!({"evidence": "checkbox"})),
        )
    }
}

/// Drawn signatures (`data:image/...`) that are not part of a consent panel.
pub struct SignatureMatcher;

impl Matcher for SignatureMatcher {
    fn name(&self) -> &'static str {
        "signature"
    }

    fn find(&self, form: &FormDefinition, answers: &Answers) -> Option<PatternMatch> {
        let mut candidates = BTreeSet::new();
        let mut in_consent = BTreeSet::new();

        form.visit(&mut |element, ancestors| {
            let consent = ancestors
                .iter()
                .any(|a| a.title.as_deref().is_some_and(is_consent_title));
            if consent {
                in_consent.insert(element.name.clone());
            } else if element.kind == "signaturepad" {
                candidates.insert(element.name.clone());
            }
        });

        candidates.extend(
            answers
                .keys()
                .filter(|key| key.to_lowercase().contains("signature"))
                .cloned(),
        );

        let fields: BTreeSet<String> = candidates
            .into_iter()
            .filter(|name| !in_consent.contains(name))
            .filter(|name| {
                answers
                    .get(name)
                    .and_then(FieldValue::as_str)
                    .is_some_and(|s| s.starts_with("data:image/"))
            })
            .collect();

        if fields.is_empty() {
            return None;
        }
        Some(PatternMatch::new(PatternKind::Signature, fields).with_extra(json!({"evidence": "image"})))
    }
}

// ═══════════════════════════════════════════════════════════
// Point diagrams
// ═══════════════════════════════════════════════════════════

/// Shape of a list of diagram points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointShape {
    /// Points carry an `intensity`.
    PainIntensity,
    /// Points carry a `sensation`.
    Sensation,
}

/// Classify a value as a point list by structure alone.
///
/// A non-empty list of objects where some point has `intensity` and none has
/// `sensation` is a pain map; the reverse is a sensation map. Mixed or
/// neither is not a diagram.
pub fn classify_points(value: &FieldValue) -> Option<PointShape> {
    let items = value.as_list()?;
    if items.is_empty() {
        return None;
    }

    let mut intensity = false;
    let mut sensation = false;
    for item in items {
        let point = item.as_object()?;
        intensity |= point.contains_key("intensity");
        sensation |= point.contains_key("sensation");
    }

    match (intensity, sensation) {
        (true, false) => Some(PointShape::PainIntensity),
        (false, true) => Some(PointShape::Sensation),
        _ => None,
    }
}

pub struct PointDiagramMatcher {
    shape: PointShape,
}

impl PointDiagramMatcher {
    pub fn new(shape: PointShape) -> Self {
        Self { shape }
    }

    fn kind(&self) -> PatternKind {
        match self.shape {
            PointShape::PainIntensity => PatternKind::BodyPainDiagram,
            PointShape::Sensation => PatternKind::SensationAreasDiagram,
        }
    }
}

impl Matcher for PointDiagramMatcher {
    fn name(&self) -> &'static str {
        match self.shape {
            PointShape::PainIntensity => "pain_points",
            PointShape::Sensation => "sensation_points",
        }
    }

    fn find(&self, _form: &FormDefinition, answers: &Answers) -> Option<PatternMatch> {
        let mut counts = BTreeMap::new();
        for (key, value) in answers {
            if classify_points(value) == Some(self.shape) {
                counts.insert(key.clone(), value.as_list().map_or(0, <[FieldValue]>::len));
            }
        }
        if counts.is_empty() {
            return None;
        }

        let fields = counts.keys().cloned().collect();
        Some(
            PatternMatch::new(self.kind(), fields)
                .with_extra(json!({"evidence": "structure", "points": counts})),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::answers_from_json;
    use serde_json::json;

    fn answers(value: serde_json::Value) -> Answers {
        answers_from_json(value).unwrap()
    }

    fn form(value: serde_json::Value) -> FormDefinition {
        FormDefinition::from_document("f", &FieldValue::from(value))
    }

    fn run(matcher: &dyn Matcher, form_doc: serde_json::Value, data: serde_json::Value) -> Option<PatternMatch> {
        matcher.find(&form(form_doc), &answers(data))
    }

    fn names(m: &PatternMatch) -> Vec<&str> {
        m.matched_fields.iter().map(String::as_str).collect()
    }

    // =================================================================
    // POINT DIAGRAMS
    // =================================================================

    #[test]
    fn point_lists_classified_by_key_not_name() {
        let pain = FieldValue::from(serde_json::json!([{"x": 1, "y": 2, "intensity": 5}]));
        let sensation = FieldValue::from(serde_json::json!([{"x": 1, "y": 2, "sensation": "numb"}]));
        let mixed = FieldValue::from(serde_json::json!([{"intensity": 5}, {"sensation": "numb"}]));
        let scalars = FieldValue::from(serde_json::json!([1, 2, 3]));

        assert_eq!(classify_points(&pain), Some(PointShape::PainIntensity));
        assert_eq!(classify_points(&sensation), Some(PointShape::Sensation));
        assert_eq!(classify_points(&mixed), None);
        assert_eq!(classify_points(&scalars), None);
        assert_eq!(classify_points(&FieldValue::List(vec![])), None);
    }

    #[test]
    fn misleading_names_do_not_swap_diagrams() {
        let data = json!({
            "sensation_diagram": [{"x": 10, "y": 20, "intensity": 7}],
            "pain_diagram": [{"x": 30, "y": 40, "sensation": "tingling"}]
        });
        let pain = run(&PointDiagramMatcher::new(PointShape::PainIntensity), json!({}), data.clone()).unwrap();
        let sens = run(&PointDiagramMatcher::new(PointShape::Sensation), json!({}), data).unwrap();

        assert_eq!(pain.kind, PatternKind::BodyPainDiagram);
        assert_eq!(names(&pain), vec!["sensation_diagram"]);
        assert_eq!(sens.kind, PatternKind::SensationAreasDiagram);
        assert_eq!(names(&sens), vec!["pain_diagram"]);
    }

    // =================================================================
    // THRESHOLDS
    // =================================================================

    #[test]
    fn demographics_need_two_fields() {
        let matcher = NameSetMatcher::new(
            "demo",
            PatternKind::PatientDemographics,
            DEMOGRAPHIC_FIELDS.iter().map(|(k, _)| *k).collect(),
            2,
        );
        assert!(run(&matcher, json!({}), json!({"patient_name": "A"})).is_none());
        assert!(run(&matcher, json!({}), json!({"patient_name": "A", "dob": ""})).is_none());
        let m = run(&matcher, json!({}), json!({"patient_name": "A", "email": "a@b.c"})).unwrap();
        assert_eq!(names(&m), vec!["email", "patient_name"]);
    }

    #[test]
    fn index_prefix_needs_five_fields() {
        let matcher = PrefixMatcher::new("ndi", PatternKind::NeckDisabilityIndex, NDI_PREFIXES, 5);
        let four = json!({"ndi_a": 1, "ndi_b": 1, "ndi_c": 1, "ndi_d": 1});
        assert!(run(&matcher, json!({}), four).is_none());
        let five = json!({"ndi_a": 1, "ndi_b": 1, "ndi_c": 1, "ndi_d": 1, "ndi_e": 0});
        assert_eq!(run(&matcher, json!({}), five).unwrap().matched_fields.len(), 5);
    }

    #[test]
    fn pain_keyword_skips_index_fields_and_point_lists() {
        let matcher = KeywordMatcher::new("pain", PatternKind::PainAssessment, "pain", 1, INDEX_PREFIXES);
        let only_index = json!({"ndi_pain_intensity": 3, "pain_map": [{"intensity": 3}]});
        assert!(run(&matcher, json!({}), only_index).is_none());

        let m = run(&matcher, json!({}), json!({"neck_pain_intensity": 6, "ndi_pain_intensity": 3})).unwrap();
        assert_eq!(names(&m), vec!["neck_pain_intensity"]);
    }

    // =================================================================
    // FORM-DRIVEN
    // =================================================================

    #[test]
    fn titled_ndi_panel_maps_questions_to_items() {
        let matcher = SectionElementMatcher::tagged("ndi", PatternKind::NeckDisabilityIndex, "neck_disability_index")
            .with_title(NDI_PANEL_TITLE)
            .with_scored_items(&NDI_ITEMS);
        let form_doc = json!({"pages": [{"elements": [{
            "type": "panel", "name": "ndi", "title": "Neck Disability Index Questionnaire",
            "elements": [
                {"type": "text", "name": "question1"},
                {"type": "radiogroup", "name": "question3"},
                {"type": "radiogroup", "name": "question5"}
            ]
        }]}]});
        let m = run(&matcher, form_doc, json!({"question1": "Jo", "question3": "mild", "question5": "none"})).unwrap();

        assert_eq!(names(&m), vec!["question1", "question3", "question5"]);
        assert_eq!(m.extra["items"]["question3"], "pain_intensity");
        assert_eq!(m.extra["items"]["question5"], "lifting");
        assert!(m.extra["items"].get("question1").is_none());
    }

    #[test]
    fn metadata_section_restricted_to_answered_keys() {
        let matcher = SectionElementMatcher::tagged("vitals", PatternKind::PatientVitals, "patient_vitals");
        let form_doc = json!({"pages": [{"elements": [{
            "type": "panel", "name": "vitals_panel", "metadata": {"patternType": "patient_vitals"},
            "elements": [{"type": "text", "name": "heart_rate"}, {"type": "text", "name": "weight"}]
        }]}]});
        let m = run(&matcher, form_doc.clone(), json!({"heart_rate": 72})).unwrap();
        assert_eq!(names(&m), vec!["heart_rate"]);
        assert!(run(&matcher, form_doc, json!({"unrelated": 1})).is_none());
    }

    #[test]
    fn signature_inside_consent_panel_is_excluded() {
        let form_doc = json!({"pages": [{"elements": [
            {"type": "panel", "name": "hipaa", "title": "HIPAA Privacy Acknowledgment",
             "elements": [{"type": "signaturepad", "name": "hipaa_signature"}]},
            {"type": "signaturepad", "name": "patient_sig"}
        ]}]});
        let img = "data:image/png;base64,iVBORw0KGgo=";
        let m = run(
            &SignatureMatcher,
            form_doc,
            json!({"hipaa_signature": img, "patient_sig": img, "signature_date": "2024-01-01"}),
        )
        .unwrap();
        assert_eq!(names(&m), vec!["patient_sig"]);
    }

    #[test]
    fn terms_checkbox_from_form_or_answer_shape() {
        let form_doc = json!({"pages": [{"elements": [{"type": "checkbox", "name": "terms_agreement"}]}]});
        let m = run(&TermsCheckboxMatcher, form_doc, json!({"terms_agreement": ["agree"]})).unwrap();
        assert_eq!(names(&m), vec!["terms_agreement"]);

        let m = run(&TermsCheckboxMatcher, json!({}), json!({"consent_to_treat": true})).unwrap();
        assert_eq!(names(&m), vec!["consent_to_treat"]);

        assert!(run(&TermsCheckboxMatcher, json!({}), json!({"consent_notes": "text"})).is_none());
    }

    #[test]
    fn terms_panel_skips_static_blocks() {
        let form_doc = json!({"pages": [{"elements": [{
            "type": "panel", "name": "terms", "title": "Terms",
            "metadata": {"patternType": "terms_and_conditions"},
            "elements": [
                {"type": "html", "name": "terms_header_1"},
                {"type": "html", "name": "terms_content_1"},
                {"type": "text", "name": "printed_name"}
            ]
        }]}]});
        let m = run(
            &TermsPanelMatcher,
            form_doc,
            json!({"terms_header_1": "x", "printed_name": "Jo", "accept_terms": true}),
        )
        .unwrap();
        assert_eq!(names(&m), vec!["accept_terms", "printed_name"]);
    }
}
