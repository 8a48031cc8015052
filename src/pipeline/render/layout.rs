//! The master document: header, patient banner, sections, footer.

use chrono::{DateTime, Utc};

use crate::models::{Answers, FieldValue, OrganizationRecord};

use super::html::escape;

const NAME_FIELDS: &[&str] = &["name", "full_name", "patient_full_name"];

/// Display name of the patient. Reads sanitized answers, so the result is
/// safe to interpolate.
pub fn patient_name(answers: &Answers) -> String {
    let text = |key: &str| {
        answers
            .get(key)
            .and_then(FieldValue::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    if let Some(name) = text("patient_name") {
        return name.to_string();
    }
    let first_last: Vec<&str> = ["first_name", "last_name"]
        .iter()
        .filter_map(|key| text(key))
        .collect();
    if !first_last.is_empty() {
        return first_last.join(" ");
    }
    NAME_FIELDS
        .iter()
        .find_map(|key| text(key))
        .unwrap_or("Patient")
        .to_string()
}

/// `06/01/2024 at 12:00 PM UTC`.
pub fn format_generated_at(ts: DateTime<Utc>) -> String {
    ts.format("%m/%d/%Y at %I:%M %p UTC").to_string()
}

/// Inputs to the master layout. `sections` are finished fragments in
/// document order.
pub struct DocumentLayout<'a> {
    pub organization: Option<&'a OrganizationRecord>,
    pub patient_name: &'a str,
    pub generated_at: DateTime<Utc>,
    pub request_id: &'a str,
    pub sections: &'a [String],
}

impl DocumentLayout<'_> {
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(
            STYLES.len() + self.sections.iter().map(String::len).sum::<usize>() + 2048,
        );
        out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
        out.push_str(&format!("<title>{} - Intake Form</title>\n", self.patient_name));
        out.push_str("<style>");
        out.push_str(STYLES);
        out.push_str("</style>\n</head>\n<body>\n");

        out.push_str(&self.header());

        out.push_str(&format!(
            r#"<div class="patient-banner"><div class="patient-name">{}</div><div class="generated">Generated {}</div></div>
"#,
            self.patient_name,
            format_generated_at(self.generated_at)
        ));

        for section in self.sections {
            out.push_str(section);
            out.push('\n');
        }

        out.push_str(&format!(
            r#"<div class="document-footer">Request: {}</div>
</body>
</html>
"#,
            escape(self.request_id)
        ));
        out
    }

    // Organization records are not sanitized; escape every field.
    fn header(&self) -> String {
        let Some(org) = self.organization.filter(|o| !o.name.trim().is_empty()) else {
            return r#"<div class="header"><div class="clinic-details"><div class="clinic-name">Patient Intake Form</div></div></div>
"#
            .to_string();
        };

        let mut contact = String::new();
        for line in [&org.phone, &org.email].into_iter().flatten() {
            contact.push_str(&format!("<div>{}</div>", escape(line)));
        }
        let address = org
            .address
            .as_deref()
            .map(|a| format!(r#"<div class="clinic-address">{}</div>"#, escape(a)))
            .unwrap_or_default();

        format!(
            r#"<div class="header"><div class="clinic-details"><div class="clinic-name">{}</div>{}</div><div class="contact-info">{}</div></div>
"#,
            escape(&org.name),
            address,
            contact
        )
    }
}

const STYLES: &str = r#"
* { margin: 0; padding: 0; box-sizing: border-box; }
@page { size: A4; margin: 0.5in; }
body { font-family: -apple-system, 'Segoe UI', Helvetica, Arial, sans-serif; color: #000; font-size: 12px; line-height: 1.5; }
.header { display: flex; justify-content: space-between; padding-bottom: 16px; margin-bottom: 16px; border-bottom: 2px solid #000; }
.clinic-name { font-size: 20px; font-weight: 800; text-transform: uppercase; }
.clinic-address, .contact-info { font-size: 12px; }
.contact-info { text-align: right; }
.patient-banner { display: flex; justify-content: space-between; align-items: baseline; margin-bottom: 24px; }
.patient-name { font-size: 16px; font-weight: 700; }
.generated { font-size: 11px; color: #555; }
.form-section { page-break-inside: avoid; margin-bottom: 24px; }
.section-bar { background: #000; padding: 10px 16px; -webkit-print-color-adjust: exact; print-color-adjust: exact; }
.section-title { color: #fff; font-size: 13px; font-weight: 700; text-transform: uppercase; letter-spacing: 0.08em; }
.content-area { padding: 16px; border: 1px solid #e0e0e0; border-top: none; }
.data-table, .field-table { width: 100%; border-collapse: collapse; font-size: 11px; }
.data-table th { text-align: left; background: #f2f2f2; padding: 6px; border-bottom: 1px solid #ccc; }
.data-table td, .field-table td { padding: 6px; border-bottom: 1px solid #eee; vertical-align: top; }
.field-label { width: 35%; font-weight: 600; }
.note { margin-top: 12px; padding: 10px; border-left: 4px solid; font-size: 11px; }
.note-info { background: #e3f2fd; border-color: #2196f3; }
.note-success { background: #f0f8f7; border-color: #38a169; }
.note-warning { background: #fff3cd; border-color: #ffc107; }
.empty-state { text-align: center; padding: 24px; color: #6c757d; font-style: italic; }
.status-abnormal { color: #c62828; font-weight: 700; }
.status-ok { color: #2e7d32; font-weight: 700; }
.denial { color: #2e7d32; font-style: italic; }
.terms-text { font-size: 10px; line-height: 1.5; margin-bottom: 10px; }
.intensity-badge { color: #fff; padding: 2px 6px; border-radius: 3px; }
.body-map { position: relative; width: 300px; height: 500px; margin: 0 auto 12px; border: 1px solid #ddd; }
.body-map .point { position: absolute; width: 22px; height: 22px; margin: -11px 0 0 -11px; border-radius: 50%; border: 2px solid #fff; color: #fff; font-size: 11px; font-weight: 700; text-align: center; line-height: 18px; }
.legend { display: flex; gap: 16px; justify-content: center; flex-wrap: wrap; margin-bottom: 12px; font-size: 11px; }
.legend-swatch { display: inline-block; width: 12px; height: 12px; border-radius: 50%; margin-right: 5px; vertical-align: middle; }
.signature-image { max-width: 240px; height: 60px; object-fit: contain; display: block; }
.signature-line { border-bottom: 1px solid #000; width: 260px; margin-top: -3px; }
.card-image { max-width: 320px; max-height: 200px; margin: 6px 12px 6px 0; border: 1px solid #ccc; border-radius: 6px; }
.section-error { background: #fff3f3; border: 2px solid #ffb3b3; padding: 16px; margin: 16px 0; }
.section-error h3 { color: #d8000c; }
.section-error .error-code { font-size: 11px; color: #999; }
.document-footer { margin-top: 24px; font-size: 10px; color: #999; text-align: right; }
"#;
