use chrono::{DateTime, Utc};
use serde::Serialize;

use super::value::{Answers, FieldValue};

/// A submitted form response as read from the document store.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseRecord {
    pub id: String,
    /// Store field `form`. Required to render anything.
    pub form_id: Option<String>,
    /// Store field `organizationId`.
    pub organization_id: Option<String>,
    /// Store field `response_data`. `None` when absent or not an object.
    pub answers: Option<Answers>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl ResponseRecord {
    pub fn from_document(id: &str, doc: &FieldValue) -> Self {
        Self {
            id: id.to_string(),
            form_id: doc.get_text("form").map(str::to_string),
            organization_id: doc.get_text("organizationId").map(str::to_string),
            answers: doc.get("response_data").and_then(FieldValue::as_object).cloned(),
            submitted_at: match doc.get("submitted_at") {
                Some(FieldValue::Timestamp(ts)) => Some(*ts),
                Some(FieldValue::Text(s)) => DateTime::parse_from_rfc3339(s)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc)),
                _ => None,
            },
        }
    }
}

/// Organization details used for the document header.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrganizationRecord {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl OrganizationRecord {
    pub fn from_document(id: &str, doc: &FieldValue) -> Self {
        Self {
            id: id.to_string(),
            name: doc.get_text("name").unwrap_or_default().to_string(),
            email: doc.get_text("email").map(str::to_string),
            phone: doc.get_text("phone").map(str::to_string),
            address: doc.get("address").and_then(format_address),
        }
    }
}

/// Addresses are stored either as one line or as `{street, city, state, zip}`.
fn format_address(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        FieldValue::Object(_) => {
            let street = value.get_text("street");
            let locality: Vec<&str> = ["city", "state", "zip"]
                .iter()
                .filter_map(|key| value.get_text(key))
                .collect();
            let line = match (street, locality.is_empty()) {
                (Some(street), false) => format!("{}, {}", street, locality.join(" ")),
                (Some(street), true) => street.to_string(),
                (None, false) => locality.join(" "),
                (None, true) => return None,
            };
            Some(line)
        }
        _ => None,
    }
}
