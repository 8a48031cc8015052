//! Field-name vocabulary shared by the matchers and the section renderers.

/// Demographic fields in display order, with labels.
pub const DEMOGRAPHIC_FIELDS: &[(&str, &str)] = &[
    ("patient_name", "Patient Name"),
    ("full_name", "Full Name"),
    ("patient_full_name", "Full Name"),
    ("first_name", "First Name"),
    ("middle_name", "Middle Name"),
    ("last_name", "Last Name"),
    ("preferred_name", "Preferred Name"),
    ("date_of_birth", "Date of Birth"),
    ("dob", "Date of Birth"),
    ("birth_date", "Date of Birth"),
    ("birthdate", "Date of Birth"),
    ("age", "Age"),
    ("gender", "Gender"),
    ("sex", "Sex"),
    ("marital_status", "Marital Status"),
    ("phone", "Phone"),
    ("phone_number", "Phone"),
    ("mobile_phone", "Mobile Phone"),
    ("cell_phone", "Cell Phone"),
    ("home_phone", "Home Phone"),
    ("work_phone", "Work Phone"),
    ("email", "Email"),
    ("email_address", "Email"),
    ("address", "Address"),
    ("street_address", "Street Address"),
    ("address_line_2", "Address Line 2"),
    ("city", "City"),
    ("state", "State"),
    ("zip", "ZIP Code"),
    ("zip_code", "ZIP Code"),
    ("postal_code", "Postal Code"),
    ("occupation", "Occupation"),
    ("employer", "Employer"),
    ("emergency_contact", "Emergency Contact"),
    ("emergency_contact_name", "Emergency Contact"),
    ("emergency_contact_phone", "Emergency Contact Phone"),
    ("emergency_contact_relationship", "Emergency Contact Relationship"),
    ("referring_physician", "Referring Physician"),
    ("primary_care_physician", "Primary Care Physician"),
];

pub const ADDITIONAL_DEMOGRAPHICS_PREFIX: &str = "demographics_additional_";
pub const REVIEW_OF_SYSTEMS_PREFIX: &str = "ros_";

/// A vital sign field with display metadata.
#[derive(Debug, Clone, Copy)]
pub struct VitalSign {
    pub key: &'static str,
    pub name: &'static str,
    pub unit: &'static str,
    /// Inclusive normal range, when one applies to adults generally.
    pub normal: Option<(f64, f64)>,
    pub category: &'static str,
}

const fn vital(
    key: &'static str,
    name: &'static str,
    unit: &'static str,
    normal: Option<(f64, f64)>,
    category: &'static str,
) -> VitalSign {
    VitalSign {
        key,
        name,
        unit,
        normal,
        category,
    }
}

pub const VITAL_SIGNS: &[VitalSign] = &[
    vital("blood_pressure_systolic", "Blood Pressure (Systolic)", "mmHg", Some((90.0, 140.0)), "Cardiovascular"),
    vital("systolic_bp", "Blood Pressure (Systolic)", "mmHg", Some((90.0, 140.0)), "Cardiovascular"),
    vital("bp_systolic", "Blood Pressure (Systolic)", "mmHg", Some((90.0, 140.0)), "Cardiovascular"),
    vital("blood_pressure_diastolic", "Blood Pressure (Diastolic)", "mmHg", Some((60.0, 90.0)), "Cardiovascular"),
    vital("diastolic_bp", "Blood Pressure (Diastolic)", "mmHg", Some((60.0, 90.0)), "Cardiovascular"),
    vital("bp_diastolic", "Blood Pressure (Diastolic)", "mmHg", Some((60.0, 90.0)), "Cardiovascular"),
    vital("heart_rate", "Heart Rate", "bpm", Some((60.0, 100.0)), "Cardiovascular"),
    vital("pulse", "Heart Rate", "bpm", Some((60.0, 100.0)), "Cardiovascular"),
    vital("pulse_rate", "Heart Rate", "bpm", Some((60.0, 100.0)), "Cardiovascular"),
    vital("respiratory_rate", "Respiratory Rate", "breaths/min", Some((12.0, 20.0)), "Respiratory"),
    vital("respiration_rate", "Respiratory Rate", "breaths/min", Some((12.0, 20.0)), "Respiratory"),
    vital("oxygen_saturation", "Oxygen Saturation", "%", Some((95.0, 100.0)), "Respiratory"),
    vital("spo2", "Oxygen Saturation", "%", Some((95.0, 100.0)), "Respiratory"),
    vital("o2_sat", "Oxygen Saturation", "%", Some((95.0, 100.0)), "Respiratory"),
    vital("temperature", "Temperature", "°F", Some((97.8, 99.1)), "General"),
    vital("body_temperature", "Temperature", "°F", Some((97.8, 99.1)), "General"),
    vital("temp", "Temperature", "°F", Some((97.8, 99.1)), "General"),
    vital("weight", "Weight", "lbs", None, "Physical"),
    vital("body_weight", "Weight", "lbs", None, "Physical"),
    vital("height", "Height", "in", None, "Physical"),
    vital("bmi", "BMI", "", Some((18.5, 24.9)), "Physical"),
    vital("body_mass_index", "BMI", "", Some((18.5, 24.9)), "Physical"),
    vital("pain_level", "Pain Level", "/10", Some((0.0, 3.0)), "Assessment"),
    vital("pain_score", "Pain Level", "/10", Some((0.0, 3.0)), "Assessment"),
];

pub fn vital_sign(key: &str) -> Option<&'static VitalSign> {
    VITAL_SIGNS.iter().find(|v| v.key == key)
}

/// One question of a standardized disability index.
#[derive(Debug, Clone, Copy)]
pub struct IndexItem {
    pub slug: &'static str,
    pub label: &'static str,
}

/// Neck Disability Index sections, in questionnaire order.
pub const NDI_ITEMS: [IndexItem; 10] = [
    IndexItem { slug: "pain_intensity", label: "Pain Intensity" },
    IndexItem { slug: "personal_care", label: "Personal Care" },
    IndexItem { slug: "lifting", label: "Lifting" },
    IndexItem { slug: "reading", label: "Reading" },
    IndexItem { slug: "headaches", label: "Headaches" },
    IndexItem { slug: "concentration", label: "Concentration" },
    IndexItem { slug: "work", label: "Work" },
    IndexItem { slug: "driving", label: "Driving" },
    IndexItem { slug: "sleeping", label: "Sleeping" },
    IndexItem { slug: "recreation", label: "Recreation" },
];

/// Oswestry Disability Index sections, in questionnaire order.
pub const ODI_ITEMS: [IndexItem; 10] = [
    IndexItem { slug: "pain_intensity", label: "Pain Intensity" },
    IndexItem { slug: "personal_care", label: "Personal Care" },
    IndexItem { slug: "lifting", label: "Lifting" },
    IndexItem { slug: "walking", label: "Walking" },
    IndexItem { slug: "sitting", label: "Sitting" },
    IndexItem { slug: "standing", label: "Standing" },
    IndexItem { slug: "sleeping", label: "Sleeping" },
    IndexItem { slug: "sex_life", label: "Sex Life" },
    IndexItem { slug: "social_life", label: "Social Life" },
    IndexItem { slug: "traveling", label: "Traveling" },
];

pub const NDI_PREFIXES: &[&str] = &["ndi_"];
pub const ODI_PREFIXES: &[&str] = &["oswestry_", "odi_"];

/// Fields carrying any of these prefixes belong to a standardized index and
/// are never pain-assessment evidence on their own.
pub const INDEX_PREFIXES: &[&str] = &["ndi_", "oswestry_", "odi_"];

/// Index questionnaires authored as titled panels use `question3`..`question12`
/// for the ten scored items (`question1`/`question2` hold name and date).
pub const PANEL_FIRST_SCORED_QUESTION: usize = 3;

pub const NDI_PANEL_TITLE: &str = "Neck Disability Index Questionnaire";
pub const ODI_PANEL_TITLE: &str = "Oswestry Low Back Pain Disability Index";
pub const PAIN_PANEL_TITLE: &str = "Visual Analog Scale & Pain Assessment";

/// Panel titles whose signatures belong to the consent text, not the document.
pub const CONSENT_TITLE_WORDS: &[&str] = &[
    "consent",
    "acknowledgment",
    "acknowledgement",
    "financial responsibility",
    "privacy",
    "terms",
    "agreement",
    "policies",
];

pub const TERMS_NAME_WORDS: &[&str] = &["terms", "agreement", "consent"];

pub fn has_any_prefix(name: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|p| name.starts_with(p))
}

/// `snake_case_name` → `Snake Case Name`.
pub fn humanize(name: &str) -> String {
    name.split(['_', '-'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
