//! Section validation and conversion to the canonical submission.
//!
//! Every violation is recorded with the path of the offending field; nothing
//! short-circuits, so the caller sees the whole list at once.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::models::ConsentType;
use crate::utils::lenient::as_bool;
use crate::utils::{digits_only, format_phone};

use super::raw::{RawChild, RawConsents, RawContact, RawGuardian, RawHousehold, RawSubmission};
use super::submission::{
    ChildInput, ConsentDecision, EmergencyContactInput, GuardianInput, HouseholdInput,
    RegistrationSubmission,
};

/// Minimum digits in a usable phone number
const MIN_PHONE_DIGITS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub path: String,
    pub message: String,
}

/// Every problem found in one submission, one message per field path.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Error)]
#[error("Invalid registration: {}", summarize(.issues))]
pub struct ValidationErrors {
    pub issues: Vec<FieldIssue>,
}

fn summarize(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("{} {}", issue.path, issue.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationErrors {
    /// Record an issue; a second issue on the same path is dropped
    pub fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        let path = path.into();
        if self.issues.iter().any(|issue| issue.path == path) {
            return;
        }
        self.issues.push(FieldIssue {
            path,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn message_for(&self, path: &str) -> Option<&str> {
        self.issues
            .iter()
            .find(|issue| issue.path == path)
            .map(|issue| issue.message.as_str())
    }
}

// ============================================================================
// Field rules
// ============================================================================

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(errors: &mut ValidationErrors, path: &str, value: Option<String>) -> String {
    match clean(value) {
        Some(v) => v,
        None => {
            errors.push(path, "is required");
            String::new()
        }
    }
}

fn phone(errors: &mut ValidationErrors, path: &str, value: Option<String>) -> String {
    let Some(raw) = clean(value) else {
        errors.push(path, "is required");
        return String::new();
    };
    if digits_only(&raw).len() < MIN_PHONE_DIGITS {
        errors.push(path, format!("must have at least {} digits", MIN_PHONE_DIGITS));
    }
    format_phone(&raw)
}

/// Deliberately shallow: one `@`, a non-empty local part, a dotted domain
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

fn email(errors: &mut ValidationErrors, path: &str, value: Option<String>) -> Option<String> {
    let email = clean(value)?;
    if !is_valid_email(&email) {
        errors.push(path, "is not a valid email address");
    }
    Some(email)
}

fn iso_date(errors: &mut ValidationErrors, path: &str, value: Option<String>) -> Option<NaiveDate> {
    let Some(raw) = clean(value) else {
        errors.push(path, "is required");
        return None;
    };
    match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            errors.push(path, "must be a date in YYYY-MM-DD format");
            None
        }
    }
}

// ============================================================================
// Sections
// ============================================================================

fn guardian(errors: &mut ValidationErrors, index: usize, raw: RawGuardian) -> GuardianInput {
    let path = |field: &str| format!("guardians[{}].{}", index, field);
    GuardianInput {
        first_name: required(errors, &path("first_name"), raw.first_name),
        last_name: required(errors, &path("last_name"), raw.last_name),
        phone: phone(errors, &path("phone"), raw.phone),
        email: email(errors, &path("email"), raw.email),
        relationship: clean(raw.relationship).unwrap_or_else(|| "guardian".to_string()),
        is_primary: raw.is_primary.unwrap_or(false),
    }
}

fn guardians(errors: &mut ValidationErrors, raw: Option<Vec<RawGuardian>>) -> Vec<GuardianInput> {
    let raw = raw.unwrap_or_default();
    if raw.is_empty() {
        errors.push("guardians", "at least one guardian is required");
        return Vec::new();
    }
    let mut list: Vec<GuardianInput> = raw
        .into_iter()
        .enumerate()
        .map(|(i, g)| guardian(errors, i, g))
        .collect();

    // Exactly one primary: the first flagged one, else the first listed
    let primary = list.iter().position(|g| g.is_primary).unwrap_or(0);
    for (i, g) in list.iter_mut().enumerate() {
        g.is_primary = i == primary;
    }
    list
}

fn emergency_contact(errors: &mut ValidationErrors, raw: Option<RawContact>) -> EmergencyContactInput {
    let raw = raw.unwrap_or_else(|| {
        errors.push("emergency_contact", "is required");
        RawContact::default()
    });
    let missing = errors.message_for("emergency_contact").is_some();
    let mut sub = ValidationErrors::default();
    let contact = EmergencyContactInput {
        first_name: required(&mut sub, "emergency_contact.first_name", raw.first_name),
        last_name: required(&mut sub, "emergency_contact.last_name", raw.last_name),
        phone: phone(&mut sub, "emergency_contact.phone", raw.phone),
        relationship: clean(raw.relationship).unwrap_or_default(),
    };
    // A missing section is one issue, not one per field
    if !missing {
        for issue in sub.issues {
            errors.push(issue.path, issue.message);
        }
    }
    contact
}

fn child(errors: &mut ValidationErrors, index: usize, raw: RawChild) -> Option<ChildInput> {
    let path = |field: &str| format!("children[{}].{}", index, field);
    let first_name = required(errors, &path("first_name"), raw.first_name);
    let last_name = required(errors, &path("last_name"), raw.last_name);
    let date_of_birth = iso_date(errors, &path("date_of_birth"), raw.date_of_birth)?;
    Some(ChildInput {
        child_id: clean(raw.child_id),
        first_name,
        last_name,
        date_of_birth,
        grade: clean(raw.grade),
        allergies: clean(raw.allergies),
        medical_notes: clean(raw.medical_notes),
        special_needs: raw.special_needs.unwrap_or(false),
        ministry_selections: raw.ministry_selections.map(|s| s.selected()).unwrap_or_default(),
        interest_selections: raw.interest_selections.map(|s| s.selected()).unwrap_or_default(),
        custom_data: raw.custom_data.unwrap_or_default(),
    })
}

fn children(errors: &mut ValidationErrors, raw: Option<Vec<RawChild>>) -> Vec<ChildInput> {
    let raw = raw.unwrap_or_default();
    if raw.is_empty() {
        errors.push("children", "at least one child is required");
        return Vec::new();
    }
    raw.into_iter()
        .enumerate()
        .filter_map(|(i, c)| child(errors, i, c))
        .collect()
}

fn household(raw: Option<RawHousehold>, guardians: &[GuardianInput]) -> HouseholdInput {
    let raw = raw.unwrap_or_default();
    let primary = guardians.iter().find(|g| g.is_primary);
    let name = clean(raw.name)
        .or_else(|| primary.map(|g| g.last_name.clone()).filter(|n| !n.is_empty()))
        .unwrap_or_else(|| "Household".to_string());
    HouseholdInput {
        household_id: clean(raw.household_id),
        name,
        address_line1: clean(raw.address_line1),
        address_line2: clean(raw.address_line2),
        city: clean(raw.city),
        state: clean(raw.state),
        zip: clean(raw.zip),
        preferred_scripture_translation: clean(raw.preferred_scripture_translation),
        primary_email: clean(raw.primary_email).or_else(|| primary.and_then(|g| g.email.clone())),
        primary_phone: clean(raw.primary_phone)
            .map(|p| format_phone(&p))
            .or_else(|| primary.map(|g| g.phone.clone()).filter(|p| !p.is_empty())),
    }
}

/// Consents keyed by (type, custom key); a later answer replaces an earlier one.
fn consents(
    errors: &mut ValidationErrors,
    raw: Option<RawConsents>,
    liability_flag: Option<bool>,
    photo_flag: Option<bool>,
) -> Vec<ConsentDecision> {
    let mut decisions: BTreeMap<(String, Option<String>), ConsentDecision> = BTreeMap::new();
    let mut record = |decision: ConsentDecision| {
        let key = (decision.consent_type.as_str().to_string(), decision.custom_key.clone());
        decisions.insert(key, decision);
    };
    let flag = |consent_type: ConsentType, custom_key: Option<String>, accepted: bool| ConsentDecision {
        consent_type,
        custom_key,
        accepted,
        text: None,
    };

    if let Some(accepted) = liability_flag {
        record(flag(ConsentType::Liability, None, accepted));
    }
    if let Some(accepted) = photo_flag {
        record(flag(ConsentType::PhotoRelease, None, accepted));
    }

    match raw {
        None => {}
        Some(RawConsents::Flags(flags)) => {
            for (key, value) in flags {
                let accepted = as_bool(&value).unwrap_or(false);
                match ConsentType::parse(&key) {
                    Some(ConsentType::Custom) | None => {
                        record(flag(ConsentType::Custom, Some(key), accepted))
                    }
                    Some(known) => record(flag(known, None, accepted)),
                }
            }
        }
        Some(RawConsents::List(entries)) => {
            for (i, entry) in entries.into_iter().enumerate() {
                let type_path = format!("consents[{}].type", i);
                let Some(raw_type) = clean(entry.consent_type) else {
                    errors.push(type_path, "is required");
                    continue;
                };
                let Some(consent_type) = ConsentType::parse(&raw_type) else {
                    errors.push(type_path, "must be one of liability, photo_release, custom");
                    continue;
                };
                let custom_key = clean(entry.custom_key);
                if consent_type == ConsentType::Custom && custom_key.is_none() {
                    errors.push(format!("consents[{}].custom_key", i), "is required for custom consents");
                    continue;
                }
                record(ConsentDecision {
                    consent_type,
                    custom_key: if consent_type == ConsentType::Custom { custom_key } else { None },
                    accepted: entry.accepted.unwrap_or(false),
                    text: clean(entry.text),
                });
            }
        }
    }

    let list: Vec<ConsentDecision> = decisions.into_values().collect();
    let liability_accepted = list
        .iter()
        .any(|c| c.consent_type == ConsentType::Liability && c.accepted);
    if !liability_accepted {
        errors.push("consents.liability", "must be accepted");
    }
    list
}

/// Validate a key-normalized submission.
pub fn validate(raw: RawSubmission) -> Result<RegistrationSubmission, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let guardians = guardians(&mut errors, raw.guardians);
    let emergency_contact = emergency_contact(&mut errors, raw.emergency_contact);
    let children = children(&mut errors, raw.children);
    let consents = consents(&mut errors, raw.consents, raw.liability, raw.photo_release);
    let household = household(raw.household, &guardians);

    if !errors.is_empty() {
        return Err(errors);
    }

    let signer_name = clean(raw.signer_name)
        .or_else(|| guardians.iter().find(|g| g.is_primary).map(GuardianInput::full_name));

    Ok(RegistrationSubmission {
        household,
        guardians,
        emergency_contact,
        children,
        consents,
        signer_name,
    })
}
