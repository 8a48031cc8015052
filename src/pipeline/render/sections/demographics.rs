use chrono::{DateTime, Datelike, NaiveDate, Utc};

use crate::pipeline::detection::vocabulary::{
    humanize, ADDITIONAL_DEMOGRAPHICS_PREFIX, DEMOGRAPHIC_FIELDS,
};
use crate::pipeline::detection::{PatternKind, PatternMatch};
use crate::pipeline::render::layout::patient_name;
use crate::pipeline::render::{html, RenderFailure, SectionContext, SectionRenderer};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// Parse a date answer in one of the formats date pickers produce.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive()))
}

/// Whole years between `born` and `on`. `None` for a birth date in the future.
pub fn age_on(born: NaiveDate, on: NaiveDate) -> Option<u32> {
    if born > on {
        return None;
    }
    let mut years = on.year() - born.year();
    if (on.month(), on.day()) < (born.month(), born.day()) {
        years -= 1;
    }
    u32::try_from(years).ok()
}

/// `5551234567` → `(555) 123-4567`; a leading US country code is dropped.
/// Anything else is returned unchanged.
pub fn format_phone(text: &str) -> String {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    let digits = match digits.len() {
        11 if digits.starts_with('1') => &digits[1..],
        _ => digits.as_str(),
    };
    if digits.len() == 10 {
        format!("({}) {}-{}", &digits[0..3], &digits[3..6], &digits[6..10])
    } else {
        text.to_string()
    }
}

fn is_date_of_birth(field: &str) -> bool {
    field.contains("birth") || field == "dob"
}

fn format_date(date: NaiveDate) -> String {
    date.format("%m/%d/%Y").to_string()
}

/// Format one demographic answer by what the field holds.
fn format_value(ctx: &SectionContext, field: &str) -> Option<String> {
    let display = ctx.display(field)?;
    let lower = field.to_lowercase();

    if is_date_of_birth(&lower) {
        if let Some(born) = parse_date(&display) {
            return Some(match age_on(born, ctx.generated_at.date_naive()) {
                Some(age) => format!("{} (Age: {})", format_date(born), age),
                None => format_date(born),
            });
        }
    }
    if lower.contains("phone") {
        return Some(format_phone(&display));
    }
    if lower.contains("email") {
        return Some(display.to_lowercase());
    }
    Some(display)
}

fn label_for(ctx: &SectionContext, field: &str) -> String {
    DEMOGRAPHIC_FIELDS
        .iter()
        .find(|(key, _)| *key == field)
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| ctx.label(field))
}

/// Patient identity and contact details, with a name/age summary.
pub struct DemographicsRenderer;

impl SectionRenderer for DemographicsRenderer {
    fn render(&self, pattern: &PatternMatch, ctx: &SectionContext) -> Result<String, RenderFailure> {
        // Known fields in their conventional order, then anything else matched.
        let mut fields: Vec<&str> = DEMOGRAPHIC_FIELDS
            .iter()
            .map(|(key, _)| *key)
            .filter(|key| pattern.matched_fields.contains(*key))
            .collect();
        fields.extend(
            ctx.ordered_fields(&pattern.matched_fields)
                .into_iter()
                .filter(|f| !DEMOGRAPHIC_FIELDS.iter().any(|(key, _)| key == f)),
        );

        let rows: Vec<(String, String)> = fields
            .iter()
            .filter_map(|field| Some((label_for(ctx, field), format_value(ctx, field)?)))
            .collect();
        if rows.is_empty() {
            return Err(RenderFailure::NoData(PatternKind::PatientDemographics.to_string()));
        }

        let mut body = html::field_table(&rows);

        let name = patient_name(&ctx.answers);
        let age = ["date_of_birth", "dob", "birth_date", "birthdate"]
            .iter()
            .find_map(|f| ctx.text(f).and_then(parse_date))
            .and_then(|born| age_on(born, ctx.generated_at.date_naive()));
        if name != "Patient" || age.is_some() {
            let mut summary = String::new();
            if name != "Patient" {
                summary.push_str(&format!("<p><strong>Patient:</strong> {}</p>", name));
            }
            if let Some(age) = age {
                summary.push_str(&format!("<p><strong>Age:</strong> {} years old</p>", age));
            }
            body.push_str(&html::note("info", &summary));
        }

        Ok(html::section(PatternKind::PatientDemographics.title(), &body))
    }
}

/// Marital status codes used by intake forms.
fn marital_status(code: &str) -> Option<&'static str> {
    match code.trim().to_uppercase().as_str() {
        "M" => Some("Married"),
        "S" => Some("Single"),
        "W" => Some("Widowed"),
        "D" => Some("Divorced"),
        "P" => Some("Separated"),
        _ => None,
    }
}

/// Supplementary details: communication preference, marital status, emergency
/// contact, referral source.
pub struct AdditionalDemographicsRenderer;

impl SectionRenderer for AdditionalDemographicsRenderer {
    fn render(&self, pattern: &PatternMatch, ctx: &SectionContext) -> Result<String, RenderFailure> {
        let mut contact_rows = Vec::new();
        let mut other_rows = Vec::new();

        for field in ctx.ordered_fields(&pattern.matched_fields) {
            let Some(mut value) = ctx.display(field) else {
                continue;
            };
            let short = field.strip_prefix(ADDITIONAL_DEMOGRAPHICS_PREFIX).unwrap_or(field);
            if short.contains("marital") {
                if let Some(status) = marital_status(&value) {
                    value = status.to_string();
                }
            }
            if short.contains("phone") {
                value = format_phone(&value);
            }

            let label = match ctx.form.title_of(field) {
                Some(_) => ctx.label(field),
                None => humanize(short),
            };
            if short.starts_with("emergency") {
                contact_rows.push((label, value));
            } else {
                other_rows.push((label, value));
            }
        }

        if contact_rows.is_empty() && other_rows.is_empty() {
            let body = html::empty_state("No additional demographic information provided.");
            return Ok(html::section(PatternKind::AdditionalDemographics.title(), &body));
        }

        let mut body = String::new();
        if !other_rows.is_empty() {
            body.push_str(&html::field_table(&other_rows));
        }
        if !contact_rows.is_empty() {
            body.push_str("<h4>Emergency Contact Information</h4>");
            body.push_str(&html::field_table(&contact_rows));
        }
        Ok(html::section(PatternKind::AdditionalDemographics.title(), &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::render::sections::testing::{context, match_all};
    use serde_json::json;

    // =================================================================
    // FORMATTING
    // =================================================================

    #[test]
    fn phone_formatting() {
        assert_eq!(format_phone("5551234567"), "(555) 123-4567");
        assert_eq!(format_phone("1-555-123-4567"), "(555) 123-4567");
        assert_eq!(format_phone("555 1234"), "555 1234");
    }

    #[test]
    fn age_counts_completed_years() {
        let on = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(age_on(NaiveDate::from_ymd_opt(1980, 1, 15).unwrap(), on), Some(44));
        assert_eq!(age_on(NaiveDate::from_ymd_opt(1980, 6, 2).unwrap(), on), Some(43));
        assert_eq!(age_on(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(), on), None);
    }

    #[test]
    fn date_formats() {
        let expected = NaiveDate::from_ymd_opt(1980, 1, 15);
        assert_eq!(parse_date("1980-01-15"), expected);
        assert_eq!(parse_date("01/15/1980"), expected);
        assert_eq!(parse_date("1980-01-15T00:00:00Z"), expected);
        assert_eq!(parse_date("next tuesday"), None);
    }

    // =================================================================
    // RENDERING
    // =================================================================

    #[test]
    fn demographics_table_and_summary() {
        let ctx = context(json!({
            "patient_name": "John Doe",
            "date_of_birth": "1980-01-15",
            "phone": "5551234567",
            "email": "John.Doe@Example.COM"
        }));
        let html = DemographicsRenderer
            .render(&match_all(PatternKind::PatientDemographics, &ctx), &ctx)
            .unwrap();

        assert!(html.contains("01/15/1980 (Age: 44)"));
        assert!(html.contains("(555) 123-4567"));
        assert!(html.contains("john.doe@example.com"));
        assert!(html.contains("<strong>Patient:</strong> John Doe"));
        assert!(html.find("Patient Name").unwrap() < html.find("Date of Birth").unwrap());
    }

    #[test]
    fn script_in_name_stays_escaped() {
        let ctx = context(json!({"patient_name": "<script>alert('x')</script>", "gender": "F"}));
        let html = DemographicsRenderer
            .render(&match_all(PatternKind::PatientDemographics, &ctx), &ctx)
            .unwrap();
        assert!(!html.contains("<script"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn rendering_is_pure() {
        let ctx = context(json!({"patient_name": "Jo", "dob": "1990-02-03"}));
        let pattern = match_all(PatternKind::PatientDemographics, &ctx);
        let first = DemographicsRenderer.render(&pattern, &ctx).unwrap();
        assert_eq!(DemographicsRenderer.render(&pattern, &ctx).unwrap(), first);
    }

    #[test]
    fn blank_demographics_fail() {
        let ctx = context(json!({"patient_name": "", "phone": null}));
        let err = DemographicsRenderer
            .render(&match_all(PatternKind::PatientDemographics, &ctx), &ctx)
            .unwrap_err();
        assert!(matches!(err, RenderFailure::NoData(_)));
    }

    #[test]
    fn additional_demographics_groups_emergency_contact() {
        let ctx = context(json!({
            "demographics_additional_marital_status": "M",
            "demographics_additional_emergency_name": "Ann Roe",
            "demographics_additional_emergency_phone": "5559876543"
        }));
        let html = AdditionalDemographicsRenderer
            .render(&match_all(PatternKind::AdditionalDemographics, &ctx), &ctx)
            .unwrap();
        assert!(html.contains("Married"));
        assert!(html.contains("Emergency Contact Information"));
        assert!(html.contains("(555) 987-6543"));
        assert!(html.find("Married").unwrap() < html.find("Emergency Contact Information").unwrap());
    }
}
