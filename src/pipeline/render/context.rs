use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};

use crate::models::{Answers, FieldValue, FormDefinition, OrganizationRecord};
use crate::pipeline::detection::vocabulary::humanize;
use crate::security::SecurityValidator;

use super::html;

/// Everything one document request renders from. Built once, shared read-only.
#[derive(Debug)]
pub struct RenderContext {
    pub response_id: String,
    pub form: Arc<FormDefinition>,
    pub organization: Option<OrganizationRecord>,
    pub request_id: String,
    pub generated_at: DateTime<Utc>,
    raw_answers: Arc<Answers>,
    sanitized: OnceLock<SanitizedView>,
}

/// Outcome of the single sanitizing pass over one request's answers.
#[derive(Debug)]
pub struct SanitizedView {
    /// Empty when `errors` is not.
    pub answers: Arc<Answers>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl RenderContext {
    pub fn new(
        response_id: impl Into<String>,
        form: FormDefinition,
        organization: Option<OrganizationRecord>,
        answers: Answers,
        request_id: impl Into<String>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            response_id: response_id.into(),
            form: Arc::new(form),
            organization,
            request_id: request_id.into(),
            generated_at,
            raw_answers: Arc::new(answers),
            sanitized: OnceLock::new(),
        }
    }

    /// Run the validator over the raw answers, at most once per request.
    /// Renderers only ever see the result of this pass.
    pub fn sanitize(&self, validator: &SecurityValidator) -> &SanitizedView {
        self.sanitized.get_or_init(|| {
            let result = validator.sanitize_answers(&self.raw_answers);
            SanitizedView {
                answers: Arc::new(result.sanitized),
                warnings: result.warnings,
                errors: result.errors,
            }
        })
    }

    /// The sanitized answers.
    pub fn sanitized_answers(&self, validator: &SecurityValidator) -> Arc<Answers> {
        Arc::clone(&self.sanitize(validator).answers)
    }

    pub fn is_sanitized(&self) -> bool {
        self.sanitized.get().is_some()
    }

    /// The view handed to renderers: sanitized answers and the form, nothing raw.
    pub fn section_context(&self, answers: Arc<Answers>) -> SectionContext {
        SectionContext {
            answers,
            form: Arc::clone(&self.form),
            request_id: self.request_id.clone(),
            generated_at: self.generated_at,
        }
    }
}

/// What a renderer may read.
#[derive(Debug, Clone)]
pub struct SectionContext {
    pub answers: Arc<Answers>,
    pub form: Arc<FormDefinition>,
    pub request_id: String,
    /// Fixed at request start, so date arithmetic stays reproducible.
    pub generated_at: DateTime<Utc>,
}

impl SectionContext {
    pub fn answer(&self, name: &str) -> Option<&FieldValue> {
        self.answers.get(name).filter(|v| !v.is_blank())
    }

    /// Trimmed non-empty text answer.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.answer(name)
            .and_then(FieldValue::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// First of `names` holding a text answer.
    pub fn first_text(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|name| self.text(name))
    }

    /// Display label for a field: the form's title when it has one, else the
    /// humanized field name. Safe to interpolate.
    pub fn label(&self, name: &str) -> String {
        match self.form.title_of(name) {
            Some(title) if !title.trim().is_empty() => html::escape(title.trim()),
            _ => humanize(name),
        }
    }

    /// Display text for an answer, mapping choice values to the form's choice
    /// text. Safe to interpolate.
    pub fn display(&self, name: &str) -> Option<String> {
        let value = self.answer(name)?;
        let text = match value {
            FieldValue::Text(s) => self.choice_or(name, s),
            FieldValue::List(items) => items
                .iter()
                .map(|item| match item {
                    FieldValue::Text(s) => self.choice_or(name, s),
                    other => other.display_text(),
                })
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", "),
            other => other.display_text(),
        };
        Some(text).filter(|t| !t.trim().is_empty())
    }

    /// `value` is already escaped; the form's choice values are raw.
    fn choice_or(&self, name: &str, value: &str) -> String {
        let text = self.form.find(name).and_then(|element| {
            element
                .choices
                .iter()
                .find(|c| html::escape(&c.value) == value)
                .map(|c| c.text.as_str())
        });
        match text {
            Some(text) => html::escape(text),
            None => value.to_string(),
        }
    }

    /// Matched fields in form order, then any the form does not declare,
    /// alphabetically.
    pub fn ordered_fields<'a>(&self, fields: impl IntoIterator<Item = &'a String>) -> Vec<&'a str> {
        let mut fields: Vec<&str> = fields.into_iter().map(String::as_str).collect();
        let positions: std::collections::HashMap<&str, usize> = self
            .form
            .elements()
            .into_iter()
            .enumerate()
            .map(|(i, e)| (e.name.as_str(), i))
            .collect();
        fields.sort_by_key(|name| (positions.get(name).copied().unwrap_or(usize::MAX), *name));
        fields
    }
}
