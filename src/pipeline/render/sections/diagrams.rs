use crate::models::FieldValue;
use crate::pipeline::detection::vocabulary::humanize;
use crate::pipeline::detection::{PatternKind, PatternMatch};
use crate::pipeline::render::{html, RenderFailure, SectionContext, SectionRenderer};

const SENSATIONS: &[(&str, &str, &str)] = &[
    ("numbness", "Numbness", "#9E9E9E"),
    ("aching", "Aching", "#FF9800"),
    ("burning", "Burning", "#F44336"),
    ("pins_and_needles", "Pins &amp; Needles", "#9C27B0"),
    ("stabbing", "Stabbing", "#FF5722"),
];
const UNKNOWN_SENSATION_COLOR: &str = "#607D8B";

/// A marked point on the body map. Coordinates are percentages of the map.
#[derive(Debug, Clone, PartialEq)]
pub struct PainPoint {
    pub x: f64,
    pub y: f64,
    pub intensity: u32,
    pub area: String,
    pub side: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensationPoint {
    pub x: f64,
    pub y: f64,
    pub sensation: String,
}

fn coordinate(point: &FieldValue, key: &str) -> f64 {
    point
        .get(key)
        .and_then(FieldValue::to_number)
        .unwrap_or(0.0)
        .clamp(0.0, 100.0)
}

fn text_of(point: &FieldValue, key: &str) -> String {
    point.get_text(key).unwrap_or_default().trim().to_string()
}

/// Numeric intensities are clamped to 0-10; words map onto the scale.
pub fn point_intensity(value: Option<&FieldValue>) -> u32 {
    let Some(value) = value else {
        return 0;
    };
    if let Some(n) = value.to_number() {
        return n.round().clamp(0.0, 10.0) as u32;
    }
    match value.as_str().map(|s| s.trim().to_lowercase()) {
        Some(s) if s.is_empty() => 0,
        Some(s) if s == "mild" => 3,
        Some(s) if s == "moderate" => 6,
        Some(s) if s == "severe" => 9,
        Some(_) => 5,
        None => 0,
    }
}

/// Colour and label of an intensity band.
pub fn intensity_band(intensity: u32) -> (&'static str, &'static str) {
    match intensity {
        0..=3 => ("#FFC107", "Mild"),
        4..=6 => ("#FF9800", "Moderate"),
        _ => ("#F44336", "Severe"),
    }
}

/// Points worth drawing: anything with a position or an intensity.
pub fn pain_points(value: &FieldValue) -> Vec<PainPoint> {
    value
        .as_list()
        .unwrap_or_default()
        .iter()
        .filter(|item| item.as_object().is_some())
        .map(|item| PainPoint {
            x: coordinate(item, "x"),
            y: coordinate(item, "y"),
            intensity: point_intensity(item.get("intensity")),
            area: text_of(item, "area"),
            side: text_of(item, "side"),
        })
        .filter(|p| p.x > 0.0 || p.y > 0.0 || p.intensity > 0)
        .collect()
}

/// Points with both a position and a named sensation.
pub fn sensation_points(value: &FieldValue) -> Vec<SensationPoint> {
    value
        .as_list()
        .unwrap_or_default()
        .iter()
        .filter(|item| item.as_object().is_some())
        .map(|item| SensationPoint {
            x: coordinate(item, "x"),
            y: coordinate(item, "y"),
            sensation: text_of(item, "sensation"),
        })
        .filter(|p| (p.x > 0.0 || p.y > 0.0) && !p.sensation.is_empty())
        .collect()
}

fn sensation_style(sensation: &str) -> (String, &'static str) {
    let key = sensation.to_lowercase().replace([' ', '-'], "_");
    match SENSATIONS.iter().find(|(k, ..)| *k == key) {
        Some((_, label, color)) => (label.to_string(), *color),
        None => (humanize(&key), UNKNOWN_SENSATION_COLOR),
    }
}

fn marker(x: f64, y: f64, color: &str, text: &str) -> String {
    format!(
        r#"<div class="point" style="left: {:.1}%; top: {:.1}%; background: {};">{}</div>"#,
        x, y, color, text
    )
}

fn legend_entry(color: &str, label: &str) -> String {
    format!(
        r#"<span class="legend-entry"><span class="legend-swatch" style="background: {};"></span>{}</span>"#,
        color, label
    )
}

/// Marked pain points on the body map, most intense first.
pub struct PainDiagramRenderer;

impl SectionRenderer for PainDiagramRenderer {
    fn render(&self, pattern: &PatternMatch, ctx: &SectionContext) -> Result<String, RenderFailure> {
        let mut points: Vec<PainPoint> = ctx
            .ordered_fields(&pattern.matched_fields)
            .into_iter()
            .filter_map(|f| ctx.answer(f))
            .flat_map(pain_points)
            .collect();
        points.sort_by(|a, b| b.intensity.cmp(&a.intensity));

        if points.is_empty() {
            let body = html::empty_state("No pain areas marked");
            return Ok(html::section(PatternKind::BodyPainDiagram.title(), &body));
        }

        let mut body = String::from(r#"<div class="body-map">"#);
        for (i, point) in points.iter().enumerate() {
            let (color, _) = intensity_band(point.intensity);
            body.push_str(&marker(point.x, point.y, color, &(i + 1).to_string()));
        }
        body.push_str("</div>");

        body.push_str(r#"<div class="legend">"#);
        for (intensity, range) in [(3, "1-3"), (6, "4-6"), (10, "7-10")] {
            let (color, label) = intensity_band(intensity);
            body.push_str(&legend_entry(color, &format!("{} ({})", label, range)));
        }
        body.push_str("</div>");

        let rows: Vec<Vec<String>> = points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let (color, label) = intensity_band(p.intensity);
                vec![
                    (i + 1).to_string(),
                    if p.area.is_empty() { "-".into() } else { p.area.clone() },
                    p.side.clone(),
                    format!(
                        r#"<span class="intensity-badge" style="background: {};">{} ({}/10)</span>"#,
                        color, label, p.intensity
                    ),
                    format!("({:.1}, {:.1})", p.x, p.y),
                ]
            })
            .collect();
        body.push_str(&html::table(&["#", "Area", "Side", "Intensity", "Position"], &rows));
        body.push_str(&html::note(
            "info",
            &format!("<p><strong>Total Pain Areas Marked:</strong> {}</p>", points.len()),
        ));

        Ok(html::section(PatternKind::BodyPainDiagram.title(), &body))
    }
}

/// Marked sensation points (numbness, burning, ...) on the body map.
pub struct SensationDiagramRenderer;

impl SectionRenderer for SensationDiagramRenderer {
    fn render(&self, pattern: &PatternMatch, ctx: &SectionContext) -> Result<String, RenderFailure> {
        let mut points: Vec<SensationPoint> = ctx
            .ordered_fields(&pattern.matched_fields)
            .into_iter()
            .filter_map(|f| ctx.answer(f))
            .flat_map(sensation_points)
            .collect();
        points.sort_by(|a, b| a.sensation.cmp(&b.sensation));

        if points.is_empty() {
            let body = html::empty_state("No sensation areas marked");
            return Ok(html::section(PatternKind::SensationAreasDiagram.title(), &body));
        }

        let mut body = String::from(r#"<div class="body-map">"#);
        for (i, point) in points.iter().enumerate() {
            let (_, color) = sensation_style(&point.sensation);
            body.push_str(&marker(point.x, point.y, color, &(i + 1).to_string()));
        }
        body.push_str("</div>");

        body.push_str(r#"<div class="legend">"#);
        for (_, label, color) in SENSATIONS {
            body.push_str(&legend_entry(color, label));
        }
        body.push_str("</div>");

        let rows: Vec<Vec<String>> = points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let (label, color) = sensation_style(&p.sensation);
                vec![
                    format!("Point {}", i + 1),
                    format!(
                        r#"<span class="intensity-badge" style="background: {};">{}</span>"#,
                        color, label
                    ),
                    format!("({:.1}, {:.1})", p.x, p.y),
                ]
            })
            .collect();
        body.push_str(&html::table(&["Point", "Sensation", "Position"], &rows));
        body.push_str(&html::note(
            "info",
            &format!("<p><strong>Total Sensation Areas Marked:</strong> {}</p>", points.len()),
        ));

        Ok(html::section(PatternKind::SensationAreasDiagram.title(), &body))
    }
}
