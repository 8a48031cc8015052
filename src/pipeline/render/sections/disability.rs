use crate::models::FieldValue;
use crate::pipeline::detection::vocabulary::{
    humanize, IndexItem, NDI_ITEMS, NDI_PREFIXES, ODI_ITEMS, ODI_PREFIXES,
};
use crate::pipeline::detection::{PatternKind, PatternMatch};
use crate::pipeline::render::{html, RenderFailure, SectionContext, SectionRenderer};

/// A standardized disability questionnaire: how its answers score and how a
/// total reads.
pub struct IndexScale {
    pub kind: PatternKind,
    pub abbreviation: &'static str,
    pub items: &'static [IndexItem],
    pub prefixes: &'static [&'static str],
    /// Highest score a single item can carry.
    pub max_item: u32,
    text_score: fn(&str) -> Option<u32>,
    /// Upper percentage bound of each band, ascending. The last band is open.
    bands: &'static [(f64, &'static str)],
    descriptions: &'static [&'static str],
}

pub static NECK_DISABILITY: IndexScale = IndexScale {
    kind: PatternKind::NeckDisabilityIndex,
    abbreviation: "NDI",
    items: &NDI_ITEMS,
    prefixes: NDI_PREFIXES,
    max_item: 4,
    text_score: ndi_text_score,
    bands: &[
        (8.0, "No disability - minimal symptoms that do not interfere with daily activities"),
        (18.0, "Mild disability - symptoms cause some interference with daily activities"),
        (34.0, "Moderate disability - symptoms cause significant interference with daily activities"),
        (52.0, "Severe disability - symptoms greatly limit daily activities"),
        (f64::INFINITY, "Complete disability - symptoms prevent most daily activities"),
    ],
    descriptions: &[
        "No difficulty/pain",
        "Mild difficulty/pain",
        "Moderate difficulty/pain",
        "Considerable difficulty/pain",
        "Unable/Severe pain",
    ],
};

pub static OSWESTRY_DISABILITY: IndexScale = IndexScale {
    kind: PatternKind::OswestryDisability,
    abbreviation: "ODI",
    items: &ODI_ITEMS,
    prefixes: ODI_PREFIXES,
    max_item: 5,
    text_score: odi_text_score,
    bands: &[
        (20.0, "Minimal disability - able to cope with most activities of daily living"),
        (40.0, "Moderate disability - experiencing more pain and difficulty sitting, lifting, and standing"),
        (60.0, "Severe disability - pain remains the main problem, but travel and work are becoming increasingly difficult"),
        (80.0, "Crippling disability - back pain impinges on all aspects of daily life and work"),
        (f64::INFINITY, "Complete disability - bed-bound or symptoms may be exaggerated"),
    ],
    descriptions: &[
        "No difficulty/normal function",
        "Slight difficulty/minimal limitation",
        "Moderate difficulty/some limitation",
        "Considerable difficulty/significant limitation",
        "Great difficulty/severe limitation",
        "Unable to perform/complete limitation",
    ],
};

/// NDI answers score 0-4; the two most severe answer levels share the top score.
fn ndi_text_score(text: &str) -> Option<u32> {
    match text {
        "no pain" | "no difficulty" | "no limitation" | "never" => Some(0),
        "mild pain" | "slight difficulty" | "minimal limitation" | "rarely" => Some(1),
        "moderate pain" | "moderate difficulty" | "some limitation" | "sometimes" => Some(2),
        "fairly severe pain" | "considerable difficulty" | "much limitation" | "often" => Some(3),
        "very severe pain" | "great difficulty" | "severe limitation" | "very often"
        | "worst possible pain" | "unable" | "complete limitation" | "always" => Some(4),
        _ => None,
    }
}

fn odi_text_score(text: &str) -> Option<u32> {
    const CONTAINS: &[(&[&str], u32)] = &[
        (&["no pain"], 0),
        (&["very mild", "minimal"], 1),
        (&["moderate"], 2),
        (&["fairly severe", "considerable"], 3),
        (&["very severe", "great difficulty"], 4),
        (&["worst", "unable", "impossible"], 5),
    ];
    if let Some((_, score)) = CONTAINS
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| text.contains(n)))
    {
        return Some(*score);
    }
    match text {
        "no difficulty" | "no problem" | "normal" => Some(0),
        "slight difficulty" | "minimal problem" | "mild limitation" => Some(1),
        "moderate difficulty" | "some problem" | "moderate limitation" => Some(2),
        "significant problem" | "major limitation" => Some(3),
        "severe problem" | "severe limitation" => Some(4),
        "complete inability" | "bed rest" => Some(5),
        _ => None,
    }
}

impl IndexScale {
    /// Score one answer, or `None` when it is out of range or unrecognized.
    pub fn score(&self, value: &FieldValue) -> Option<u32> {
        let in_range = |n: f64| {
            (n >= 0.0 && n <= f64::from(self.max_item) && n.fract() == 0.0).then_some(n as u32)
        };
        match value {
            FieldValue::Number(n) => in_range(*n),
            FieldValue::Text(text) => {
                let lower = text.trim().to_lowercase();
                if let Ok(n) = lower.parse::<f64>() {
                    return in_range(n);
                }
                if let Some(score) = (self.text_score)(&lower) {
                    return Some(score);
                }
                // "3/5"
                let (numerator, _) = lower.split_once('/')?;
                numerator.trim().parse::<f64>().ok().and_then(in_range)
            }
            _ => None,
        }
    }

    pub fn interpret(&self, percent: f64) -> &'static str {
        self.bands
            .iter()
            .find(|(upper, _)| percent <= *upper)
            .map(|(_, band)| *band)
            .unwrap_or("Unclassified")
    }

    fn describe(&self, value: &FieldValue, display: String) -> String {
        let numeric = match value {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(t) => t.trim().parse::<f64>().ok(),
            _ => None,
        };
        match numeric.filter(|n| n.fract() == 0.0 && *n >= 0.0) {
            Some(n) => match self.descriptions.get(n as usize) {
                Some(text) => format!("{} ({})", text, n as u32),
                None => display,
            },
            None => display,
        }
    }

    /// Questionnaire position and label for a field, from its prefix or from
    /// the panel question mapping the detector recorded.
    fn locate(&self, pattern: &PatternMatch, field: &str) -> Option<(usize, String)> {
        let slug = match self.prefixes.iter().find_map(|p| field.strip_prefix(p)) {
            Some(slug) => slug,
            None => pattern.extra.get("items")?.get(field)?.as_str()?,
        };
        Some(match self.items.iter().position(|item| item.slug == slug) {
            Some(i) => (i, self.items[i].label.to_string()),
            None => (self.items.len(), humanize(slug)),
        })
    }
}

/// Running total over the answered items.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IndexScore {
    pub total: u32,
    pub answered: u32,
    pub max: u32,
}

impl IndexScore {
    pub fn percent(&self) -> f64 {
        if self.max == 0 {
            0.0
        } else {
            f64::from(self.total) / f64::from(self.max) * 100.0
        }
    }
}

/// NDI or ODI table with per-item scores, the total as a percentage of the
/// answered items' maximum, and the disability band.
pub struct DisabilityIndexRenderer {
    scale: &'static IndexScale,
}

impl DisabilityIndexRenderer {
    pub fn neck() -> Self {
        Self { scale: &NECK_DISABILITY }
    }

    pub fn oswestry() -> Self {
        Self {
            scale: &OSWESTRY_DISABILITY,
        }
    }
}

impl SectionRenderer for DisabilityIndexRenderer {
    fn render(&self, pattern: &PatternMatch, ctx: &SectionContext) -> Result<String, RenderFailure> {
        let scale = self.scale;
        let mut items = Vec::new();
        let mut header = Vec::new();

        for field in ctx.ordered_fields(&pattern.matched_fields) {
            let (Some(value), Some(display)) = (ctx.answer(field), ctx.display(field)) else {
                continue;
            };
            match scale.locate(pattern, field) {
                Some((position, label)) => {
                    let score = scale.score(value);
                    items.push((position, label, scale.describe(value, display), score));
                }
                None if field == "question1" => header.push(("Patient Name".to_string(), display)),
                None if field == "question2" => header.push(("Assessment Date".to_string(), display)),
                None => {}
            }
        }
        if items.is_empty() {
            return Err(RenderFailure::NoData(scale.kind.to_string()));
        }
        items.sort_by_key(|(position, ..)| *position);

        let mut score = IndexScore::default();
        let rows: Vec<Vec<String>> = items
            .into_iter()
            .map(|(_, label, response, item_score)| {
                let cell = match item_score {
                    Some(s) => {
                        score.total += s;
                        score.answered += 1;
                        score.max += scale.max_item;
                        format!("{}/{}", s, scale.max_item)
                    }
                    None => "n/a".to_string(),
                };
                vec![label, response, cell]
            })
            .collect();

        let mut body = String::new();
        if !header.is_empty() {
            body.push_str(&html::field_table(&header));
        }
        body.push_str(&html::table(&["Question Category", "Response", "Score"], &rows));

        if score.answered == 0 {
            body.push_str(&html::note(
                "warning",
                &format!(
                    "<p>No valid {} responses found for scoring calculation.</p>",
                    scale.abbreviation
                ),
            ));
        } else {
            let percent = score.percent();
            let mut summary = format!(
                "<h4>{} Score Summary</h4>\
                 <p><strong>Total Score:</strong> {}/{} ({:.1}%)</p>\
                 <p><strong>Questions Answered:</strong> {} of {}</p>\
                 <p><strong>Interpretation:</strong> {}</p>",
                scale.abbreviation,
                score.total,
                score.max,
                percent,
                score.answered,
                scale.items.len(),
                scale.interpret(percent)
            );
            summary.push_str(&format!(
                "<p><strong>{} Disability Scale:</strong></p><ul>",
                scale.abbreviation
            ));
            let mut lower = 0.0;
            for (upper, band) in scale.bands {
                let name = band.split(" - ").next().unwrap_or(*band);
                if upper.is_finite() {
                    summary.push_str(&format!("<li>{}-{}%: {}</li>", lower, upper, name));
                    lower = upper + 1.0;
                } else {
                    summary.push_str(&format!("<li>{}-100%: {}</li>", lower, name));
                }
            }
            summary.push_str("</ul>");
            body.push_str(&html::note("success", &summary));
        }

        Ok(html::section(scale.kind.title(), &body))
    }
}
