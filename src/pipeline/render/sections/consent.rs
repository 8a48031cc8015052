use std::collections::BTreeSet;

use crate::models::{FieldValue, FormElement};
use crate::pipeline::detection::{PatternKind, PatternMatch};
use crate::pipeline::render::layout::format_generated_at;
use crate::pipeline::render::{html, RenderFailure, SectionContext, SectionRenderer};

use super::signature::signature_image;

const TERMS_HINT: &str = "terms_and_conditions";
const ACCEPTANCE_WORDS: &[&str] = &["accept", "agree", "acknowledge"];

/// Whether an agreement answer reads as accepted.
pub fn is_accepted(value: &FieldValue) -> bool {
    match value {
        FieldValue::Bool(b) => *b,
        FieldValue::Text(s) => matches!(
            s.trim().to_lowercase().as_str(),
            "accepted" | "true" | "yes" | "1" | "agree" | "agreed"
        ),
        FieldValue::Number(n) => *n == 1.0,
        FieldValue::List(items) => !items.is_empty(),
        _ => false,
    }
}

fn is_acceptance(element: &FormElement) -> bool {
    let name = element.name.to_lowercase();
    matches!(element.kind.as_str(), "checkbox" | "boolean")
        || ACCEPTANCE_WORDS.iter().any(|w| name.contains(w))
}

fn acceptance_cell(accepted: bool) -> &'static str {
    if accepted {
        r#"<span class="status-ok">&#10003; Accepted</span>"#
    } else {
        r#"<span class="status-abnormal">Not accepted</span>"#
    }
}

/// One answered (or unsigned) field inside a terms panel.
fn panel_row(ctx: &SectionContext, element: &FormElement) -> Option<(String, String)> {
    let name = element.name.as_str();
    if element.kind == "signaturepad" {
        let cell = ctx
            .text(name)
            .and_then(signature_image)
            .map(|src| html::image(src, "Signature", "signature-image"))
            .unwrap_or_else(|| "<em>Not signed</em>".to_string());
        return Some((ctx.label(name), cell));
    }
    if is_acceptance(element) {
        let accepted = ctx.answer(name).map(is_accepted).unwrap_or(false);
        return Some((ctx.label(name), acceptance_cell(accepted).to_string()));
    }
    let value = ctx.display(name)?;
    let lower = name.to_lowercase();
    let label = if lower.contains("date") {
        "Date:".to_string()
    } else if lower.contains("name") {
        "Printed Name:".to_string()
    } else {
        ctx.label(name)
    };
    Some((label, value))
}

/// Terms panels as the patient saw them: the authored text, then acceptance,
/// printed name, date, and signature.
pub struct TermsConditionsRenderer;

impl SectionRenderer for TermsConditionsRenderer {
    fn render(&self, pattern: &PatternMatch, ctx: &SectionContext) -> Result<String, RenderFailure> {
        let mut body = String::new();
        let mut shown = BTreeSet::new();

        let panels: Vec<&FormElement> = ctx
            .form
            .elements()
            .into_iter()
            .filter(|e| e.pattern_hint.as_deref() == Some(TERMS_HINT))
            .collect();

        for panel in panels {
            if let Some(title) = panel.title.as_deref().filter(|t| !t.trim().is_empty()) {
                body.push_str(&format!("<h4>{}</h4>", html::escape(title.trim())));
            }
            let mut rows = Vec::new();
            for element in panel.descendants() {
                if let Some(markup) = element.content.as_deref() {
                    body.push_str(r#"<div class="terms-text">"#);
                    for paragraph in html::plain_text(markup) {
                        body.push_str(&format!("<p>{}</p>", paragraph));
                    }
                    body.push_str("</div>");
                    continue;
                }
                if element.name.is_empty() || element.is_container() {
                    continue;
                }
                if let Some(row) = panel_row(ctx, element) {
                    shown.insert(element.name.clone());
                    rows.push(row);
                }
            }
            if !rows.is_empty() {
                body.push_str(&html::field_table(&rows));
            }
        }

        // Acceptance or signature answers outside any tagged panel.
        let rest: Vec<(String, String)> = ctx
            .ordered_fields(&pattern.matched_fields)
            .into_iter()
            .filter(|f| !shown.contains(*f))
            .filter_map(|field| {
                let lower = field.to_lowercase();
                if lower.contains("signature") {
                    let src = ctx.text(field).and_then(signature_image)?;
                    return Some((ctx.label(field), html::image(src, "Signature", "signature-image")));
                }
                if ACCEPTANCE_WORDS.iter().any(|w| lower.contains(w)) {
                    let accepted = ctx.answer(field).map(is_accepted).unwrap_or(false);
                    return Some((ctx.label(field), acceptance_cell(accepted).to_string()));
                }
                Some((ctx.label(field), ctx.display(field)?))
            })
            .collect();
        if !rest.is_empty() {
            body.push_str(&html::field_table(&rest));
        }

        if body.is_empty() {
            return Err(RenderFailure::NoData(PatternKind::TermsConditions.to_string()));
        }
        Ok(html::section(PatternKind::TermsConditions.title(), &body))
    }
}

/// Standalone agreement checkboxes with their status and the time recorded.
pub struct TermsCheckboxRenderer;

impl SectionRenderer for TermsCheckboxRenderer {
    fn render(&self, pattern: &PatternMatch, ctx: &SectionContext) -> Result<String, RenderFailure> {
        let rows: Vec<Vec<String>> = ctx
            .ordered_fields(&pattern.matched_fields)
            .into_iter()
            .map(|field| {
                let agreed = ctx.answers.get(field).map(is_accepted).unwrap_or(false);
                let status = if agreed {
                    r#"<span class="status-ok">&#10003; Agreed</span>"#
                } else {
                    r#"<span class="status-abnormal">Not Agreed</span>"#
                };
                vec![ctx.label(field), status.to_string()]
            })
            .collect();
        if rows.is_empty() {
            return Err(RenderFailure::NoData(PatternKind::TermsCheckbox.to_string()));
        }

        let mut body = html::table(&["Agreement Item", "Status"], &rows);
        body.push_str(&html::note(
            "info",
            &format!(
                "<p>Confirmation recorded: {}</p>",
                format_generated_at(ctx.generated_at)
            ),
        ));
        Ok(html::section(PatternKind::TermsCheckbox.title(), &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::render::sections::testing::{context, context_with_form, match_all};
    use serde_json::json;

    const SIGNATURE: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    #[test]
    fn acceptance_values() {
        assert!(is_accepted(&FieldValue::Bool(true)));
        assert!(is_accepted(&FieldValue::from("Yes")));
        assert!(is_accepted(&FieldValue::from("accepted")));
        assert!(is_accepted(&FieldValue::List(vec![FieldValue::from("agree")])));
        assert!(!is_accepted(&FieldValue::Bool(false)));
        assert!(!is_accepted(&FieldValue::from("maybe")));
        assert!(!is_accepted(&FieldValue::List(vec![])));
    }

    fn terms_form() -> serde_json::Value {
        json!({"pages": [{"elements": [{
            "type": "panel", "name": "terms", "title": "Financial Policy",
            "metadata": {"patternType": "terms_and_conditions"},
            "elements": [
                {"type": "html", "name": "terms_content_1",
                 "html": "<p>Payment is due at the time of <b>service</b>.</p><script>bad()</script>"},
                {"type": "boolean", "name": "accept_terms", "title": "I accept"},
                {"type": "text", "name": "printed_name"},
                {"type": "text", "name": "terms_date"},
                {"type": "signaturepad", "name": "terms_signature"}
            ]
        }]}]})
    }

    #[test]
    fn terms_panel_renders_text_and_acceptance() {
        let ctx = context_with_form(
            json!({
                "accept_terms": true,
                "printed_name": "Jane Roe",
                "terms_date": "2024-05-30",
                "terms_signature": SIGNATURE
            }),
            terms_form(),
        );
        let html = TermsConditionsRenderer
            .render(&match_all(PatternKind::TermsConditions, &ctx), &ctx)
            .unwrap();

        assert!(html.contains("<h4>Financial Policy</h4>"));
        assert!(html.contains("<p>Payment is due at the time of service.</p>"));
        assert!(!html.contains("<script"));
        assert!(html.contains("&#10003; Accepted"));
        assert!(html.contains("Printed Name:"));
        assert!(html.contains("Jane Roe"));
        assert!(html.contains("Date:"));
        assert!(html.contains(r#"class="signature-image""#));
        assert_eq!(html.matches("Jane Roe").count(), 1);
    }

    #[test]
    fn unsigned_and_unaccepted_panel() {
        let ctx = context_with_form(json!({"printed_name": "Jane Roe"}), terms_form());
        let html = TermsConditionsRenderer
            .render(&match_all(PatternKind::TermsConditions, &ctx), &ctx)
            .unwrap();
        assert!(html.contains("Not accepted"));
        assert!(html.contains("<em>Not signed</em>"));
    }

    #[test]
    fn answers_without_panel_still_render() {
        let ctx = context(json!({"accept_terms": "yes"}));
        let html = TermsConditionsRenderer
            .render(&match_all(PatternKind::TermsConditions, &ctx), &ctx)
            .unwrap();
        assert!(html.contains("Accept Terms"));
        assert!(html.contains("&#10003; Accepted"));
    }

    #[test]
    fn checkbox_table_with_confirmation_time() {
        let ctx = context(json!({"consent_to_treat": true, "terms_agreement": false}));
        let html = TermsCheckboxRenderer
            .render(&match_all(PatternKind::TermsCheckbox, &ctx), &ctx)
            .unwrap();
        assert!(html.contains("<th>Agreement Item</th><th>Status</th>"));
        assert!(html.contains("&#10003; Agreed"));
        assert!(html.contains("Not Agreed"));
        assert!(html.contains("Confirmation recorded: 06/01/2024 at 12:00 PM UTC"));
    }
}
