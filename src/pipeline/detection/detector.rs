use std::collections::BTreeMap;

use crate::models::{Answers, FormDefinition};

use super::{default_matchers, Matcher, PatternKind, PatternMatch};

/// Runs every registered matcher over a form and its answers.
pub struct PatternDetector {
    matchers: Vec<Box<dyn Matcher>>,
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternDetector {
    pub fn new() -> Self {
        Self::with_matchers(default_matchers())
    }

    pub fn with_matchers(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }

    pub fn register(&mut self, matcher: Box<dyn Matcher>) {
        self.matchers.push(matcher);
    }

    /// Detect sections. One match per kind, in canonical order.
    ///
    /// Matches of the same kind from different matchers are merged: their
    /// fields are unioned and the first matcher's context is kept, with later
    /// context keys added where absent.
    pub fn detect(&self, form: &FormDefinition, answers: &Answers) -> Vec<PatternMatch> {
        let mut merged: BTreeMap<PatternKind, PatternMatch> = BTreeMap::new();

        for matcher in &self.matchers {
            let Some(mut found) = matcher.find(form, answers) else {
                continue;
            };
            found.matched_fields.retain(|name| answers.contains_key(name));
            if found.matched_fields.is_empty() {
                continue;
            }

            tracing::debug!(
                matcher = matcher.name(),
                kind = %found.kind,
                fields = found.matched_fields.len(),
                "Pattern matched"
            );

            match merged.get_mut(&found.kind) {
                Some(existing) => merge_into(existing, found),
                None => {
                    merged.insert(found.kind, found);
                }
            }
        }

        // PatternKind's ordering is the canonical order.
        merged.into_values().collect()
    }

    pub fn detected_kinds(&self, form: &FormDefinition, answers: &Answers) -> Vec<PatternKind> {
        self.detect(form, answers).into_iter().map(|m| m.kind).collect()
    }
}

fn merge_into(existing: &mut PatternMatch, other: PatternMatch) {
    existing.matched_fields.extend(other.matched_fields);
    if existing.extra.is_null() {
        existing.extra = other.extra;
        return;
    }
    if let (Some(target), serde_json::Value::Object(source)) =
        (existing.extra.as_object_mut(), other.extra)
    {
        for (key, value) in source {
            target.entry(key).or_insert(value);
        }
    }
}
