use crate::models::format_number;
use crate::pipeline::detection::vocabulary::vital_sign;
use crate::pipeline::detection::{PatternKind, PatternMatch};
use crate::pipeline::render::{html, RenderFailure, SectionContext, SectionRenderer};

const CATEGORY_ORDER: &[&str] = &["Cardiovascular", "Respiratory", "General", "Physical", "Assessment", "Other"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VitalStatus {
    Low,
    Normal,
    High,
    /// No reference range, or a non-numeric reading.
    Unassessed,
}

impl VitalStatus {
    pub fn assess(value: f64, normal: Option<(f64, f64)>) -> Self {
        match normal {
            Some((low, _)) if value < low => VitalStatus::Low,
            Some((_, high)) if value > high => VitalStatus::High,
            Some(_) => VitalStatus::Normal,
            None => VitalStatus::Unassessed,
        }
    }

    fn cell(self) -> &'static str {
        match self {
            VitalStatus::Low => r#"<span class="status-abnormal">Low</span>"#,
            VitalStatus::High => r#"<span class="status-abnormal">High</span>"#,
            VitalStatus::Normal => "Normal",
            VitalStatus::Unassessed => "",
        }
    }

    fn is_abnormal(self) -> bool {
        matches!(self, VitalStatus::Low | VitalStatus::High)
    }
}

struct Reading {
    category: &'static str,
    label: String,
    value: String,
    range: String,
    status: VitalStatus,
}

/// Vital signs grouped by body system, with units, reference ranges, and
/// out-of-range flags.
pub struct VitalsRenderer;

impl SectionRenderer for VitalsRenderer {
    fn render(&self, pattern: &PatternMatch, ctx: &SectionContext) -> Result<String, RenderFailure> {
        let mut readings = Vec::new();
        for field in ctx.ordered_fields(&pattern.matched_fields) {
            let Some(display) = ctx.display(field) else {
                continue;
            };
            let number = ctx.answer(field).and_then(|v| v.to_number());

            let reading = match vital_sign(field) {
                Some(sign) => Reading {
                    category: sign.category,
                    label: sign.name.to_string(),
                    value: match number {
                        Some(n) if sign.unit.is_empty() => format_number(n),
                        Some(n) => format!("{} {}", format_number(n), sign.unit),
                        None => display,
                    },
                    range: sign
                        .normal
                        .map(|(low, high)| {
                            format!("{}-{} {}", format_number(low), format_number(high), sign.unit)
                                .trim_end()
                                .to_string()
                        })
                        .unwrap_or_default(),
                    status: number
                        .map(|n| VitalStatus::assess(n, sign.normal))
                        .unwrap_or(VitalStatus::Unassessed),
                },
                None => Reading {
                    category: "Other",
                    label: ctx.label(field),
                    value: display,
                    range: String::new(),
                    status: VitalStatus::Unassessed,
                },
            };
            readings.push(reading);
        }

        if readings.is_empty() {
            return Err(RenderFailure::NoData(PatternKind::PatientVitals.to_string()));
        }

        let mut body = String::new();
        for category in CATEGORY_ORDER {
            let rows: Vec<Vec<String>> = readings
                .iter()
                .filter(|r| r.category == *category)
                .map(|r| vec![r.label.clone(), r.value.clone(), r.range.clone(), r.status.cell().to_string()])
                .collect();
            if rows.is_empty() {
                continue;
            }
            body.push_str(&format!("<h4>{}</h4>", category));
            body.push_str(&html::table(&["Measurement", "Value", "Normal Range", "Status"], &rows));
        }

        let abnormal: Vec<&str> = readings
            .iter()
            .filter(|r| r.status.is_abnormal())
            .map(|r| r.label.as_str())
            .collect();
        let summary = format!(
            "<p><strong>Readings:</strong> {}</p><p><strong>Abnormal Values:</strong> {}</p>",
            readings.len(),
            abnormal.len()
        );
        if abnormal.is_empty() {
            body.push_str(&html::note("success", &summary));
        } else {
            body.push_str(&html::note(
                "warning",
                &format!("{}<p><strong>Review:</strong> {}</p>", summary, abnormal.join(", ")),
            ));
        }

        Ok(html::section(PatternKind::PatientVitals.title(), &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::render::sections::testing::{context, match_all};
    use serde_json::json;

    #[test]
    fn status_against_range() {
        assert_eq!(VitalStatus::assess(55.0, Some((60.0, 100.0))), VitalStatus::Low);
        assert_eq!(VitalStatus::assess(60.0, Some((60.0, 100.0))), VitalStatus::Normal);
        assert_eq!(VitalStatus::assess(101.0, Some((60.0, 100.0))), VitalStatus::High);
        assert_eq!(VitalStatus::assess(180.0, None), VitalStatus::Unassessed);
    }

    #[test]
    fn vitals_grouped_and_flagged() {
        let ctx = context(json!({
            "heart_rate": 110,
            "blood_pressure_systolic": "128",
            "respiratory_rate": 16,
            "weight": 180
        }));
        let html = VitalsRenderer
            .render(&match_all(PatternKind::PatientVitals, &ctx), &ctx)
            .unwrap();

        assert!(html.contains("110 bpm"));
        assert!(html.contains("128 mmHg"));
        assert!(html.contains("60-100 bpm"));
        assert!(html.contains(r#"<span class="status-abnormal">High</span>"#));
        assert!(html.contains("<strong>Abnormal Values:</strong> 1"));
        assert!(html.find("Cardiovascular").unwrap() < html.find("Respiratory").unwrap());
        assert!(html.find("Respiratory").unwrap() < html.find("Physical").unwrap());
    }

    #[test]
    fn unknown_field_lands_in_other() {
        let ctx = context(json!({"heart_rate": 70, "glucose_reading": "95 mg/dL"}));
        let html = VitalsRenderer
            .render(&match_all(PatternKind::PatientVitals, &ctx), &ctx)
            .unwrap();
        assert!(html.contains("<h4>Other</h4>"));
        assert!(html.contains("Glucose Reading"));
        assert!(html.contains("95 mg/dL"));
    }

    #[test]
    fn no_readings_is_a_failure() {
        let ctx = context(json!({"heart_rate": ""}));
        assert!(VitalsRenderer
            .render(&match_all(PatternKind::PatientVitals, &ctx), &ctx)
            .is_err());
    }
}
