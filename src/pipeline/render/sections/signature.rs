use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::pipeline::detection::{PatternKind, PatternMatch};
use crate::pipeline::render::layout::format_generated_at;
use crate::pipeline::render::{html, RenderFailure, SectionContext, SectionRenderer};

const PURPOSE_WORDS: &[(&str, &str)] = &[
    ("consent", "Consent"),
    ("authorization", "Authorization"),
    ("agreement", "Agreement"),
    ("terms", "Terms Acceptance"),
    ("hipaa", "HIPAA Acknowledgment"),
    ("treatment", "Treatment Consent"),
    ("patient", "Patient Signature"),
    ("witness", "Witness"),
    ("guardian", "Guardian Signature"),
    ("release", "Release"),
    ("waiver", "Waiver"),
];

/// The data URL itself when `value` is an embeddable image signature: a
/// `data:image/` URL whose base64 payload decodes to at least one byte.
pub fn signature_image(value: &str) -> Option<&str> {
    let value = value.trim();
    let rest = value.strip_prefix("data:image/")?;
    let (_, payload) = rest.split_once("base64,")?;
    match STANDARD.decode(payload) {
        Ok(bytes) if !bytes.is_empty() => Some(value),
        _ => None,
    }
}

/// Who signed `field`: a companion name answer, then the patient's name.
pub fn signer_name(ctx: &SectionContext, field: &str) -> String {
    let by_field = [
        format!("{field}_name"),
        format!("{field}_signer"),
        field.replace("signature", "name"),
    ];
    by_field
        .iter()
        .filter(|candidate| candidate.as_str() != field)
        .find_map(|candidate| ctx.text(candidate))
        .or_else(|| ctx.first_text(&["patient_name", "signer_name", "name"]))
        .unwrap_or("Unknown")
        .to_string()
}

/// What the signature was for, from the words in its field name.
pub fn signature_purpose(field: &str) -> &'static str {
    let lower = field.to_lowercase();
    PURPOSE_WORDS
        .iter()
        .find(|(word, _)| lower.contains(word))
        .map(|(_, purpose)| *purpose)
        .unwrap_or("General Signature")
}

fn signed_on(ctx: &SectionContext, field: &str) -> String {
    let dated = format!("{field}_date");
    ctx.first_text(&[dated.as_str(), "signature_date", "date_signed"])
        .map(str::to_string)
        .unwrap_or_else(|| format_generated_at(ctx.generated_at))
}

/// Drawn signatures with signer, purpose, and date. Values that are not valid
/// image data are never embedded.
pub struct SignatureRenderer;

impl SectionRenderer for SignatureRenderer {
    fn render(&self, pattern: &PatternMatch, ctx: &SectionContext) -> Result<String, RenderFailure> {
        let fields = ctx.ordered_fields(&pattern.matched_fields);
        let mut blocks = Vec::new();
        let mut rejected = None;

        for field in &fields {
            let Some(value) = ctx.text(field) else {
                continue;
            };
            let Some(src) = signature_image(value) else {
                rejected.get_or_insert(*field);
                continue;
            };
            let rows = vec![
                ("Signed by".to_string(), html::escape(&signer_name(ctx, field))),
                ("Purpose".to_string(), signature_purpose(field).to_string()),
                ("Date".to_string(), signed_on(ctx, field)),
            ];
            blocks.push(format!(
                r#"<div class="signature-block"><h4>{}</h4>{}<div class="signature-line"></div>{}</div>"#,
                ctx.label(field),
                html::image(src, "Signature", "signature-image"),
                html::field_table(&rows)
            ));
        }

        if blocks.is_empty() {
            return Err(match rejected {
                Some(field) => RenderFailure::InvalidValue {
                    field: field.to_string(),
                    reason: "not a valid image data URL".to_string(),
                },
                None => RenderFailure::NoData(PatternKind::Signature.to_string()),
            });
        }

        let mut body = blocks.concat();
        body.push_str(&html::note(
            "info",
            "<p>By signing above, the signer confirms that the information provided in this form is \
             accurate and complete to the best of their knowledge. Electronic signatures carry the \
             same legal effect as handwritten signatures.</p>",
        ));
        Ok(html::section(PatternKind::Signature.title(), &body))
    }
}
