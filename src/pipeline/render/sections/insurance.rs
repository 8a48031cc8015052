use crate::pipeline::detection::{PatternKind, PatternMatch};
use crate::pipeline::render::layout::format_generated_at;
use crate::pipeline::render::{html, RenderFailure, SectionContext, SectionRenderer};

use super::signature::signature_image;

/// Known policy fields in the order a front desk reads them.
const POLICY_FIELDS: &[(&str, &str)] = &[
    ("insurance_company", "Insurance Company"),
    ("insurance_provider", "Insurance Provider"),
    ("insurance_carrier", "Insurance Carrier"),
    ("policy_number", "Policy Number"),
    ("policy_id", "Policy ID"),
    ("member_id", "Member ID"),
    ("member_number", "Member Number"),
    ("group_number", "Group Number"),
    ("group_id", "Group ID"),
    ("plan_name", "Plan Name"),
    ("plan_type", "Plan Type"),
    ("subscriber_name", "Subscriber Name"),
    ("subscriber_id", "Subscriber ID"),
    ("effective_date", "Effective Date"),
    ("expiration_date", "Expiration Date"),
    ("copay", "Co-pay"),
    ("deductible", "Deductible"),
];

const POLICY_WORDS: &[&str] = &["insurance", "policy", "member", "group", "plan", "provider", "carrier", "subscriber"];

#[derive(Debug, Default)]
struct CardImages<'a> {
    front: Option<&'a str>,
    back: Option<&'a str>,
}

impl<'a> CardImages<'a> {
    fn place(&mut self, field: &str, src: &'a str) {
        let lower = field.to_lowercase();
        let slot = if lower.contains("front") {
            &mut self.front
        } else if lower.contains("back") {
            &mut self.back
        } else if self.front.is_none() {
            &mut self.front
        } else {
            &mut self.back
        };
        slot.get_or_insert(src);
    }

    fn is_empty(&self) -> bool {
        self.front.is_none() && self.back.is_none()
    }
}

fn policy_rank(field: &str) -> usize {
    POLICY_FIELDS
        .iter()
        .position(|(key, _)| *key == field)
        .unwrap_or(POLICY_FIELDS.len())
}

/// Card photos and the policy details typed alongside them.
pub struct InsuranceCardRenderer;

impl SectionRenderer for InsuranceCardRenderer {
    fn render(&self, pattern: &PatternMatch, ctx: &SectionContext) -> Result<String, RenderFailure> {
        let mut images = CardImages::default();
        let mut details = Vec::new();

        for field in ctx.ordered_fields(&pattern.matched_fields) {
            if let Some(src) = ctx.text(field).and_then(signature_image) {
                images.place(field, src);
                continue;
            }
            let lower = field.to_lowercase();
            if !POLICY_WORDS.iter().any(|w| lower.contains(w)) {
                continue;
            }
            if let Some(value) = ctx.display(field) {
                details.push((field, value));
            }
        }
        details.sort_by_key(|(field, _)| policy_rank(field));

        if images.is_empty() && details.is_empty() {
            let body = html::empty_state("No insurance information found");
            return Ok(html::section(PatternKind::InsuranceCard.title(), &body));
        }

        let mut body = String::new();
        if !images.is_empty() {
            body.push_str("<h4>Insurance Card Images</h4><div>");
            let both = images.front.is_some() && images.back.is_some();
            for (side, src) in [("Front", images.front), ("Back", images.back)] {
                let Some(src) = src else { continue };
                let caption = if both { format!("{side} of Card") } else { "Insurance Card".to_string() };
                body.push_str(&format!(
                    "<div><h5>{}</h5>{}</div>",
                    caption,
                    html::image(src, &format!("Insurance Card {side}"), "card-image")
                ));
            }
            body.push_str("</div>");
        }

        if !details.is_empty() {
            let rows: Vec<Vec<String>> = details
                .iter()
                .map(|(field, value)| {
                    let label = POLICY_FIELDS
                        .iter()
                        .find(|(key, _)| key == field)
                        .map(|(_, label)| label.to_string())
                        .unwrap_or_else(|| ctx.label(field));
                    vec![format!("<strong>{}</strong>", label), value.clone()]
                })
                .collect();
            body.push_str("<h4>Insurance Details</h4>");
            body.push_str(&html::table(&["Information Type", "Value"], &rows));
        }

        let mut capture = String::from("<h4>Capture Information</h4>");
        if !images.is_empty() {
            let captured: Vec<&str> = [
                images.front.map(|_| "Front captured"),
                images.back.map(|_| "Back captured"),
            ]
            .into_iter()
            .flatten()
            .collect();
            capture.push_str(&format!("<p><strong>Card Images:</strong> {}</p>", captured.join(", ")));
        }
        let completeness = match details.len() {
            0 => "",
            1 => " (Minimal)",
            2 | 3 => " (Partial)",
            _ => " (Complete)",
        };
        capture.push_str(&format!(
            "<p><strong>Information Fields:</strong> {} fields captured{}</p>\
             <p><strong>Capture Time:</strong> {}</p>\
             <p><strong>Verification Required:</strong> Please verify all insurance information with \
             the patient and contact the insurance provider to confirm coverage and eligibility \
             before treatment.</p>",
            details.len(),
            completeness,
            format_generated_at(ctx.generated_at)
        ));
        body.push_str(&html::note("info", &capture));

        Ok(html::section(PatternKind::InsuranceCard.title(), &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::render::sections::testing::{context, match_all};
    use serde_json::json;

    const PNG: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    #[test]
    fn card_images_and_policy_fields() {
        let ctx = context(json!({
            "insurance_card_front": PNG,
            "insurance_card_back": PNG,
            "member_id": "XJ-1002",
            "insurance_company": "Acme Health",
            "group_number": "77"
        }));
        let html = InsuranceCardRenderer
            .render(&match_all(PatternKind::InsuranceCard, &ctx), &ctx)
            .unwrap();

        assert!(html.contains("<h5>Front of Card</h5>"));
        assert!(html.contains("<h5>Back of Card</h5>"));
        assert!(html.contains("Front captured, Back captured"));
        assert!(html.find("Insurance Company").unwrap() < html.find("Member ID").unwrap());
        assert!(html.find("Member ID").unwrap() < html.find("Group Number").unwrap());
        assert!(html.contains("3 fields captured (Partial)"));
    }

    #[test]
    fn single_image_and_invalid_data() {
        let ctx = context(json!({
            "insurance_card": PNG,
            "insurance_scan": "data:image/png;base64,",
            "policy_number": "P-1"
        }));
        let html = InsuranceCardRenderer
            .render(&match_all(PatternKind::InsuranceCard, &ctx), &ctx)
            .unwrap();
        assert!(html.contains("<h5>Insurance Card</h5>"));
        assert_eq!(html.matches("<img").count(), 1);
        assert!(html.contains("Policy Number"));
    }

    #[test]
    fn nothing_usable() {
        let ctx = context(json!({"insurance_notes": ""}));
        let html = InsuranceCardRenderer
            .render(&match_all(PatternKind::InsuranceCard, &ctx), &ctx)
            .unwrap();
        assert!(html.contains("No insurance information found"));
    }
}
