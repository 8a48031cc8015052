//! Small HTML building blocks shared by the section renderers.
//!
//! Nothing here escapes its arguments except [`escape`]. Callers pass either
//! sanitized answer text or already-escaped form text.

use std::sync::LazyLock;

use regex::Regex;

pub use crate::security::escape_html as escape;

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag regex"));
static BLOCK_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</(p|div|li|h[1-6])>|<br\s*/?>").expect("valid block regex"));
static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,8});").expect("valid entity regex")
});

/// Character for one entity body (`amp`, `#39`, `#x2019`), if known.
fn entity_char(body: &str) -> Option<char> {
    if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
        return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
    }
    if let Some(dec) = body.strip_prefix('#') {
        return dec.parse().ok().and_then(char::from_u32);
    }
    let c = match body {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201c}',
        "rdquo" => '\u{201d}',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "hellip" => '\u{2026}',
        "copy" => '\u{a9}',
        "reg" => '\u{ae}',
        "trade" => '\u{2122}',
        "bull" => '\u{2022}',
        "middot" => '\u{b7}',
        "deg" => '\u{b0}',
        _ => return None,
    };
    Some(c)
}

/// Decode character references once. Unknown names are left as written.
pub fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &regex::Captures| match entity_char(&caps[1]) {
            Some(c) => c.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Author markup reduced to escaped plain text, one paragraph per block element.
pub fn plain_text(markup: &str) -> Vec<String> {
    let marked = BLOCK_END.replace_all(markup, "\n");
    let text = decode_entities(&TAG.replace_all(&marked, ""));
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .map(|line| escape(&line))
        .collect()
}

/// A titled section with the standard heading bar.
pub fn section(title: &str, body: &str) -> String {
    format!(
        r#"<div class="form-section">
<div class="section-bar"><div class="section-title">{title}</div></div>
<div class="content-area">
{body}
</div>
</div>
"#
    )
}

/// A table with a header row. Cells are inserted verbatim.
pub fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut out = String::from(r#"<table class="data-table"><thead><tr>"#);
    for header in headers {
        out.push_str(&format!("<th>{header}</th>"));
    }
    out.push_str("</tr></thead><tbody>");
    for row in rows {
        out.push_str("<tr>");
        for cell in row {
            out.push_str(&format!("<td>{cell}</td>"));
        }
        out.push_str("</tr>");
    }
    out.push_str("</tbody></table>");
    out
}

/// Two-column label/value table.
pub fn field_table(rows: &[(String, String)]) -> String {
    let mut out = String::from(r#"<table class="field-table"><tbody>"#);
    for (label, value) in rows {
        out.push_str(&format!(
            r#"<tr><td class="field-label">{label}</td><td class="field-value">{value}</td></tr>"#
        ));
    }
    out.push_str("</tbody></table>");
    out
}

/// A highlighted note block. `tone` selects the colour (`info`, `warning`, `success`).
pub fn note(tone: &str, body: &str) -> String {
    format!(r#"<div class="note note-{tone}">{body}</div>"#)
}

/// Muted italic text for sections with nothing to show.
pub fn empty_state(text: &str) -> String {
    format!(r#"<p class="empty-state">{text}</p>"#)
}

/// An embedded image. `src` must be a validated data URL.
pub fn image(src: &str, alt: &str, class: &str) -> String {
    format!(r#"<img class="{class}" src="{src}" alt="{alt}">"#)
}
