use std::collections::BTreeSet;

use crate::models::{format_number, FieldValue};
use crate::pipeline::detection::vocabulary::humanize;
use crate::pipeline::detection::{PatternKind, PatternMatch};
use crate::pipeline::render::{html, RenderFailure, SectionContext, SectionRenderer};

/// One body region the patient reported pain in.
#[derive(Debug, Clone, PartialEq)]
pub struct PainArea {
    pub area: String,
    pub side: String,
    pub intensity: Option<String>,
    pub frequency: Option<String>,
}

/// Frequency answers: the 0-3 scale, a percentage of the time, or free text.
pub fn frequency_label(value: &FieldValue) -> Option<String> {
    let Some(n) = value.to_number() else {
        return Some(value.display_text()).filter(|s| !s.trim().is_empty());
    };
    let label = match n {
        n if n.fract() == 0.0 && (0.0..=3.0).contains(&n) => match n as u8 {
            0 => "Occasional (0-25%)",
            1 => "Intermittent (25-50%)",
            2 => "Frequent (50-75%)",
            _ => "Constant (75-100%)",
        },
        n if n < 0.0 => return Some(format_number(n)),
        n if n < 10.0 => "Rarely",
        n if n <= 25.0 => "Occasional",
        n if n <= 50.0 => "Intermittent",
        n if n <= 75.0 => "Frequent",
        n if n <= 100.0 => "Constant",
        n => return Some(format!("{}%", format_number(n))),
    };
    Some(label.to_string())
}

/// Numeric intensities read on a 0-10 scale; anything else is shown as given.
pub fn intensity_label(value: &FieldValue) -> Option<String> {
    match value.to_number() {
        Some(n) if (0.0..=10.0).contains(&n) => Some(format!("{}/10", format_number(n.round()))),
        _ => Some(value.display_text()).filter(|s| !s.trim().is_empty()),
    }
}

fn side_label(value: &FieldValue) -> String {
    let short = |s: &str| match s.trim().to_lowercase().as_str() {
        "left" | "l" => Some("LT"),
        "right" | "r" => Some("RT"),
        "both" | "bilateral" => Some("LT RT"),
        _ => None,
    };
    match value {
        FieldValue::List(items) => {
            let mut sides: Vec<&str> = items.iter().filter_map(|i| i.as_str().and_then(short)).collect();
            sides.dedup();
            if sides.contains(&"LT RT") || (sides.contains(&"LT") && sides.contains(&"RT")) {
                "LT RT".to_string()
            } else {
                sides.concat()
            }
        }
        other => other.as_str().and_then(short).unwrap_or_default().to_string(),
    }
}

fn is_yes(value: &FieldValue) -> bool {
    match value {
        FieldValue::Bool(b) => *b,
        FieldValue::Text(s) => s.trim().eq_ignore_ascii_case("yes"),
        _ => false,
    }
}

/// Region base name of a `has_{base}_pain` / `has_headaches` presence question.
fn region_of(field: &str) -> Option<&str> {
    if field == "has_headaches" {
        return Some("headaches");
    }
    field.strip_prefix("has_")?.strip_suffix("_pain")
}

fn first_present<'a>(ctx: &'a SectionContext, names: &[String]) -> Option<(&'a FieldValue, String)> {
    names
        .iter()
        .find_map(|name| ctx.answer(name).map(|value| (value, name.clone())))
}

/// Collect reported regions, marking every field they consume.
fn pain_areas(ctx: &SectionContext, fields: &[&str], consumed: &mut BTreeSet<String>) -> Vec<PainArea> {
    let mut areas = Vec::new();

    for field in fields {
        let Some(base) = region_of(field) else {
            continue;
        };
        consumed.insert(field.to_string());
        if !ctx.answer(field).is_some_and(is_yes) {
            continue;
        }

        let mut area = PainArea {
            area: ctx
                .form
                .title_of(field)
                .filter(|t| !t.trim().is_empty())
                .map(|t| html::escape(t.trim()))
                .unwrap_or_else(|| humanize(base)),
            side: String::new(),
            intensity: None,
            frequency: None,
        };
        if let Some((value, name)) = first_present(ctx, &[format!("{base}_side")]) {
            area.side = side_label(value);
            consumed.insert(name);
        }
        let intensity = [format!("{base}_pain_intensity"), format!("{base}_intensity")];
        if let Some((value, name)) = first_present(ctx, &intensity) {
            area.intensity = intensity_label(value);
            consumed.insert(name);
        }
        let frequency = [format!("{base}_pain_frequency"), format!("{base}_frequency")];
        if let Some((value, name)) = first_present(ctx, &frequency) {
            area.frequency = frequency_label(value);
            consumed.insert(name);
        }
        areas.push(area);
    }

    // A free-text region counts once it carries a positive intensity.
    if let Some(name) = ctx.text("other_area_specify") {
        let intensity = ctx.answer("other_intensity");
        if intensity.and_then(FieldValue::to_number).is_some_and(|n| n > 0.0) {
            areas.push(PainArea {
                area: name.to_string(),
                side: ctx.answer("other_side").map(side_label).unwrap_or_default(),
                intensity: intensity.and_then(intensity_label),
                frequency: ctx.answer("other_frequency").and_then(frequency_label),
            });
        }
        for used in ["other_area_specify", "other_intensity", "other_side", "other_frequency"] {
            consumed.insert(used.to_string());
        }
    }

    areas
}

/// Reported pain regions with side, intensity, and how often it occurs, plus
/// any other pain answers.
pub struct PainAssessmentRenderer;

impl SectionRenderer for PainAssessmentRenderer {
    fn render(&self, pattern: &PatternMatch, ctx: &SectionContext) -> Result<String, RenderFailure> {
        let fields = ctx.ordered_fields(&pattern.matched_fields);
        let mut consumed = BTreeSet::new();
        let areas = pain_areas(ctx, &fields, &mut consumed);

        let other_rows: Vec<(String, String)> = fields
            .iter()
            .filter(|f| !consumed.contains(**f))
            .filter_map(|f| Some((ctx.label(f), ctx.display(f)?)))
            .collect();

        let mut body = String::new();
        if !areas.is_empty() {
            let rows: Vec<Vec<String>> = areas
                .iter()
                .map(|a| {
                    vec![
                        a.area.clone(),
                        a.side.clone(),
                        a.intensity.clone().unwrap_or_else(|| "-".into()),
                        a.frequency.clone().unwrap_or_else(|| "-".into()),
                    ]
                })
                .collect();
            body.push_str(&html::table(&["Body Area", "Side", "Severity", "Frequency"], &rows));
        }
        if !other_rows.is_empty() {
            if !areas.is_empty() {
                body.push_str("<h4>Additional Pain Information</h4>");
            }
            body.push_str(&html::field_table(&other_rows));
        }
        if body.is_empty() {
            body.push_str(&html::empty_state("No pain reported."));
            return Ok(html::section(PatternKind::PainAssessment.title(), &body));
        }

        if !areas.is_empty() {
            body.push_str(&html::note(
                "warning",
                &format!(
                    "<h4>Pain Assessment Summary</h4><p><strong>Total Pain Areas:</strong> {}</p>",
                    areas.len()
                ),
            ));
        }
        Ok(html::section(PatternKind::PainAssessment.title(), &body))
    }
}
