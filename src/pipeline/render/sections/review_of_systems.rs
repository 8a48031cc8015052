use crate::models::FieldValue;
use crate::pipeline::detection::vocabulary::humanize;
use crate::pipeline::detection::{PatternKind, PatternMatch};
use crate::pipeline::render::{html, RenderFailure, SectionContext, SectionRenderer};

/// A body system: its heading, the field holding its symptom checklist, and
/// the prefixes of any detail questions that belong to it.
struct BodySystem {
    title: &'static str,
    checklist: &'static str,
    details: &'static [&'static str],
}

const fn system(title: &'static str, checklist: &'static str, details: &'static [&'static str]) -> BodySystem {
    BodySystem {
        title,
        checklist,
        details,
    }
}

const BODY_SYSTEMS: &[BodySystem] = &[
    system("Constitutional", "ros_constitutional", &[]),
    system("Gastrointestinal", "ros_gastrointestinal", &[]),
    system("Musculoskeletal", "ros_musculoskeletal", &[]),
    system("Endocrine", "ros_endocrine", &[]),
    system("Cardiovascular", "ros_cardiovascular", &[]),
    system("Integumentary/Skin", "ros_integumentary", &[]),
    system("Hematological/Lymphatic", "ros_hematological", &[]),
    system("Allergy/Immunologic", "ros_allergy", &[]),
    system("Respiratory", "ros_respiratory", &["ros_cpap"]),
    system("Genitourinary", "ros_genitourinary", &[]),
    system("Neurological", "ros_neurological", &[]),
    system("EENT (Eyes, Ears, Nose, Throat)", "ros_eent", &["ros_vision_corrected"]),
    system("Psychiatric", "ros_psychiatric", &[]),
    system("Head/Neck", "ros_headneck", &["ros_migraines_aura"]),
    system("Women's Health", "ros_women_symptoms", &["ros_women_"]),
    system("Men's Health", "ros_men_symptoms", &["ros_men_"]),
];

const OTHER_CONDITIONS: &str = "ros_other_conditions";

fn is_none_answer(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    lower == "none" || lower.contains("none of the above") || lower.contains("_none")
}

/// Reported items of a checklist answer, and whether the patient chose "none".
fn checklist_items(value: &FieldValue) -> (Vec<String>, bool) {
    let texts: Vec<String> = match value {
        FieldValue::List(items) => items.iter().map(FieldValue::display_text).collect(),
        other => vec![other.display_text()],
    };
    let denied = texts.iter().any(|t| is_none_answer(t));
    let reported = texts
        .into_iter()
        .filter(|t| !t.trim().is_empty() && !is_none_answer(t))
        .collect();
    (reported, denied)
}

fn detail_label(ctx: &SectionContext, field: &str) -> String {
    if ctx.form.title_of(field).is_some() {
        return ctx.label(field);
    }
    let short = field.strip_prefix("ros_").unwrap_or(field);
    let short = short
        .strip_prefix("women_")
        .or_else(|| short.strip_prefix("men_"))
        .unwrap_or(short);
    humanize(short)
}

fn belongs_to(system: &BodySystem, field: &str) -> bool {
    field == system.checklist || system.details.iter().any(|d| field.starts_with(d))
}

/// Findings grouped by body system. A system answered "none" reads as a
/// denial; systems with no answer are omitted.
pub struct ReviewOfSystemsRenderer;

impl SectionRenderer for ReviewOfSystemsRenderer {
    fn render(&self, pattern: &PatternMatch, ctx: &SectionContext) -> Result<String, RenderFailure> {
        let fields = ctx.ordered_fields(&pattern.matched_fields);
        let mut body = String::new();
        let mut reported_any = false;

        let mut render_group = |title: &str, members: &[&str], checklist: Option<&str>| {
            let mut lines = Vec::new();
            let mut denied = false;
            for field in members {
                let Some(value) = ctx.answer(field) else {
                    continue;
                };
                if Some(*field) == checklist {
                    let (items, none) = checklist_items(value);
                    denied |= none;
                    lines.extend(items.into_iter().map(|item| format!("<li>{}</li>", item)));
                } else if let Some(text) = ctx.display(field).filter(|t| !is_none_answer(t)) {
                    lines.push(format!("<li><strong>{}:</strong> {}</li>", detail_label(ctx, field), text));
                }
            }

            if !lines.is_empty() {
                body.push_str(&format!("<h4>{}</h4><ul>{}</ul>", title, lines.concat()));
                reported_any = true;
            } else if denied {
                body.push_str(&format!(
                    r#"<h4>{}</h4><p class="denial">Patient denies {} symptoms.</p>"#,
                    title,
                    title.to_lowercase()
                ));
                reported_any = true;
            }
        };

        for system in BODY_SYSTEMS {
            let mut members: Vec<&str> = fields.iter().copied().filter(|f| belongs_to(system, f)).collect();
            members.sort_by_key(|f| *f != system.checklist);
            render_group(system.title, &members, Some(system.checklist));
        }

        let ungrouped: Vec<&str> = fields
            .iter()
            .copied()
            .filter(|f| *f != OTHER_CONDITIONS && !BODY_SYSTEMS.iter().any(|s| belongs_to(s, f)))
            .collect();
        render_group("Other Findings", &ungrouped, None);

        if pattern.matched_fields.contains(OTHER_CONDITIONS) {
            render_group("Other Conditions", &[OTHER_CONDITIONS], Some(OTHER_CONDITIONS));
        }

        if !reported_any {
            body.push_str(&html::note("success", "<p>Patient denies all review of systems symptoms.</p>"));
        }

        Ok(html::section(PatternKind::ReviewOfSystems.title(), &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::render::sections::testing::{context, match_all};
    use serde_json::json;

    fn render(answers: serde_json::Value) -> String {
        let ctx = context(answers);
        ReviewOfSystemsRenderer
            .render(&match_all(PatternKind::ReviewOfSystems, &ctx), &ctx)
            .unwrap()
    }

    #[test]
    fn symptoms_grouped_by_system() {
        let html = render(json!({
            "ros_constitutional": ["fatigue", "fever"],
            "ros_respiratory": ["cough"],
            "ros_cpap": "Yes"
        }));
        assert!(html.contains("<h4>Constitutional</h4><ul><li>fatigue</li><li>fever</li></ul>"));
        assert!(html.contains("<li>cough</li><li><strong>Cpap:</strong> Yes</li>"));
        assert!(html.find("Constitutional").unwrap() < html.find("Respiratory").unwrap());
    }

    #[test]
    fn none_answers_read_as_denial() {
        let html = render(json!({
            "ros_gastrointestinal": ["None of the above"],
            "ros_neurological": "none"
        }));
        assert!(html.contains("Patient denies gastrointestinal symptoms."));
        assert!(html.contains("Patient denies neurological symptoms."));
        assert!(!html.contains("<li>"));
    }

    #[test]
    fn detail_fields_use_short_labels() {
        let html = render(json!({
            "ros_women_symptoms": ["hot flashes"],
            "ros_women_last_pap_smear": "2023-11-02"
        }));
        assert!(html.contains("<h4>Women's Health</h4><ul><li>hot flashes</li>"));
        assert!(html.contains("<strong>Last Pap Smear:</strong> 2023-11-02"));
    }

    #[test]
    fn other_conditions_and_empty_review() {
        let html = render(json!({"ros_other_conditions": "Gout"}));
        assert!(html.contains("<h4>Other Conditions</h4><ul><li>Gout</li></ul>"));

        let html = render(json!({"ros_constitutional": []}));
        assert!(html.contains("Patient denies all review of systems symptoms."));
    }
}
