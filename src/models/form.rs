use super::value::FieldValue;

/// Element kinds that only group other elements.
const CONTAINER_KINDS: &[&str] = &["panel", "paneldynamic", "page"];

/// An organization-authored form, parsed leniently from its stored document.
///
/// Parsing never fails: anything that is not a list where a list is expected,
/// or not an object where an element is expected, is skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormDefinition {
    pub id: String,
    pub title: String,
    pub pages: Vec<FormPage>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormPage {
    pub name: String,
    pub elements: Vec<FormElement>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormElement {
    /// Survey element type, lowercased (`text`, `checkbox`, `panel`, `signaturepad`, ...).
    pub kind: String,
    pub name: String,
    pub title: Option<String>,
    /// `metadata.patternType` set by the form author.
    pub pattern_hint: Option<String>,
    /// Static markup of `html` elements, as authored.
    pub content: Option<String>,
    pub choices: Vec<Choice>,
    pub elements: Vec<FormElement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    pub value: String,
    pub text: String,
}

impl FormDefinition {
    /// Parse a stored form document. The survey tree may sit under
    /// `surveyJson`; without it the whole document is the tree.
    pub fn from_document(id: &str, doc: &FieldValue) -> Self {
        let tree = match doc.get("surveyJson") {
            Some(inner @ FieldValue::Object(_)) => inner,
            _ => doc,
        };

        let title = localized_text(doc.get("title"))
            .or_else(|| localized_text(tree.get("title")))
            .unwrap_or_default();

        let mut pages: Vec<FormPage> = tree
            .get("pages")
            .and_then(FieldValue::as_list)
            .unwrap_or_default()
            .iter()
            .filter(|page| page.as_object().is_some())
            .map(|page| FormPage {
                name: page.get_text("name").unwrap_or_default().to_string(),
                elements: parse_elements(page.get("elements")),
            })
            .collect();

        // Single-page surveys may put their elements at the top level.
        let top_level = parse_elements(tree.get("elements"));
        if !top_level.is_empty() {
            pages.push(FormPage {
                name: String::new(),
                elements: top_level,
            });
        }

        Self {
            id: id.to_string(),
            title,
            pages,
        }
    }

    /// Visit every element depth-first. The callback receives the element and
    /// its enclosing containers, outermost first.
    pub fn visit<'a>(&'a self, f: &mut dyn FnMut(&'a FormElement, &[&'a FormElement])) {
        let mut ancestors = Vec::new();
        for page in &self.pages {
            for element in &page.elements {
                visit_element(element, &mut ancestors, f);
            }
        }
    }

    /// All elements, depth-first.
    pub fn elements(&self) -> Vec<&FormElement> {
        let mut out = Vec::new();
        self.visit(&mut |element, _| out.push(element));
        out
    }

    pub fn find(&self, name: &str) -> Option<&FormElement> {
        self.elements().into_iter().find(|e| e.name == name)
    }

    /// Display title for a question, when the form defines one.
    pub fn title_of(&self, name: &str) -> Option<&str> {
        self.find(name).and_then(|e| e.title.as_deref())
    }

    /// Display text for a choice value of a question.
    pub fn choice_text(&self, name: &str, value: &str) -> Option<&str> {
        self.find(name)?
            .choices
            .iter()
            .find(|c| c.value == value)
            .map(|c| c.text.as_str())
    }
}

impl FormElement {
    pub fn is_container(&self) -> bool {
        CONTAINER_KINDS.contains(&self.kind.as_str()) || !self.elements.is_empty()
    }

    /// All nested elements, depth-first (not including this one).
    pub fn descendants(&self) -> Vec<&FormElement> {
        let mut out = Vec::new();
        collect_elements(&self.elements, &mut out);
        out
    }

    /// Names of all nested elements (not including this one).
    pub fn descendant_names(&self) -> Vec<&str> {
        let mut out = Vec::new();
        collect_names(&self.elements, &mut out);
        out
    }
}

fn collect_elements<'a>(elements: &'a [FormElement], out: &mut Vec<&'a FormElement>) {
    for element in elements {
        out.push(element);
        collect_elements(&element.elements, out);
    }
}

fn collect_names<'a>(elements: &'a [FormElement], out: &mut Vec<&'a str>) {
    for element in elements {
        if !element.name.is_empty() {
            out.push(&element.name);
        }
        collect_names(&element.elements, out);
    }
}

fn visit_element<'a>(
    element: &'a FormElement,
    ancestors: &mut Vec<&'a FormElement>,
    f: &mut dyn FnMut(&'a FormElement, &[&'a FormElement]),
) {
    f(element, &ancestors[..]);
    if element.elements.is_empty() {
        return;
    }
    ancestors.push(element);
    for child in &element.elements {
        visit_element(child, ancestors, f);
    }
    ancestors.pop();
}

fn parse_elements(value: Option<&FieldValue>) -> Vec<FormElement> {
    value
        .and_then(FieldValue::as_list)
        .unwrap_or_default()
        .iter()
        .filter_map(parse_element)
        .collect()
}

fn parse_element(value: &FieldValue) -> Option<FormElement> {
    value.as_object()?;
    Some(FormElement {
        kind: value
            .get_text("type")
            .map(str::to_lowercase)
            .unwrap_or_default(),
        name: value.get_text("name").unwrap_or_default().to_string(),
        title: localized_text(value.get("title")),
        pattern_hint: value
            .get("metadata")
            .and_then(|m| m.get_text("patternType"))
            .map(str::to_string),
        content: localized_text(value.get("html")),
        choices: parse_choices(value.get("choices")),
        elements: parse_elements(value.get("elements")),
    })
}

fn parse_choices(value: Option<&FieldValue>) -> Vec<Choice> {
    value
        .and_then(FieldValue::as_list)
        .unwrap_or_default()
        .iter()
        .filter_map(|choice| match choice {
            FieldValue::Object(_) => {
                let value = choice.get("value").map(FieldValue::display_text)?;
                let text = localized_text(choice.get("text")).unwrap_or_else(|| value.clone());
                Some(Choice { value, text })
            }
            FieldValue::Null => None,
            other => {
                let value = other.display_text();
                Some(Choice {
                    text: value.clone(),
                    value,
                })
            }
        })
        .collect()
}

/// Text that may be a plain string or a locale map (`{"default": .., "fr": ..}`).
fn localized_text(value: Option<&FieldValue>) -> Option<String> {
    match value? {
        FieldValue::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        FieldValue::Object(map) => map
            .get("default")
            .or_else(|| map.get("en"))
            .or_else(|| map.values().next())
            .and_then(FieldValue::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn form(doc: serde_json::Value) -> FormDefinition {
        FormDefinition::from_document("form-1", &FieldValue::from(doc))
    }

    #[test]
    fn parses_nested_survey_json() {
        let def = form(json!({
            "title": "Intake",
            "surveyJson": {
                "pages": [{
                    "name": "p1",
                    "elements": [{
                        "type": "panel",
                        "name": "demo",
                        "title": {"default": "Demographics", "es": "Demografía"},
                        "metadata": {"patternType": "patient_demographics"},
                        "elements": [
                            {"type": "text", "name": "first_name", "title": "First Name"},
                            {"type": "radiogroup", "name": "sex", "choices": [
                                {"value": "f", "text": "Female"}, "Other"
                            ]}
                        ]
                    }]
                }]
            }
        }));

        assert_eq!(def.title, "Intake");
        let panel = def.find("demo").unwrap();
        assert_eq!(panel.title.as_deref(), Some("Demographics"));
        assert_eq!(panel.pattern_hint.as_deref(), Some("patient_demographics"));
        assert_eq!(panel.descendant_names(), vec!["first_name", "sex"]);
        assert_eq!(def.choice_text("sex", "f"), Some("Female"));
        assert_eq!(def.choice_text("sex", "Other"), Some("Other"));
        assert_eq!(def.title_of("first_name"), Some("First Name"));
    }

    #[test]
    fn form_without_survey_json_uses_whole_document() {
        let def = form(json!({
            "pages": [{"elements": [{"type": "text", "name": "email"}]}],
            "elements": [{"type": "checkbox", "name": "terms_agreement"}]
        }));
        let names: Vec<_> = def.elements().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["email", "terms_agreement"]);
    }

    #[test]
    fn malformed_structures_yield_no_elements() {
        assert!(form(json!({"pages": "not a list"})).elements().is_empty());
        assert!(form(json!({"pages": [42, "x", null]})).elements().is_empty());
        assert!(form(json!({"pages": [{"elements": {"a": 1}}]})).elements().is_empty());
        assert!(form(json!([1, 2])).elements().is_empty());
    }

    #[test]
    fn visit_reports_ancestors() {
        let def = form(json!({"pages": [{"elements": [{
            "type": "panel", "name": "outer", "title": "Consent",
            "elements": [{"type": "signaturepad", "name": "sig"}]
        }]}]}));

        let mut seen = Vec::new();
        def.visit(&mut |element, ancestors| {
            seen.push((element.name.clone(), ancestors.len()));
        });
        assert_eq!(seen, vec![("outer".to_string(), 0), ("sig".to_string(), 1)]);
    }
}
