//! Canonical normalization of registration submissions.
//!
//! A submission is arbitrary JSON from a form, an import or an older client.
//! `normalize_submission` rewrites its keys to snake_case (folding older field
//! names into current ones), reads it into a
//! loose shape, validates every section and returns either the canonical
//! `RegistrationSubmission` or every problem found as one `ValidationErrors`.
//! Nothing here touches storage.

mod keys;
mod raw;
mod submission;
mod validate;

use serde_json::Value;
use tracing::debug;

pub use keys::{has_legacy_keys, normalize_keys, DATA_MAP_KEYS};
pub use submission::{
    ChildInput, ConsentDecision, EmergencyContactInput, GuardianInput, HouseholdInput,
    RegistrationSubmission,
};
pub use validate::{is_valid_email, FieldIssue, ValidationErrors};

use keys::fold_aliases;
use raw::RawSubmission;

/// Validate and convert a raw submission.
pub fn normalize_submission(raw: Value) -> Result<RegistrationSubmission, ValidationErrors> {
    let normalized = fold_aliases(normalize_keys(raw));
    let shaped: RawSubmission = serde_json::from_value(normalized).map_err(|e| {
        let mut errors = ValidationErrors::default();
        errors.push("$", format!("malformed submission: {}", e));
        errors
    })?;

    let submission = validate::validate(shaped)?;
    debug!(
        guardians = submission.guardians.len(),
        children = submission.children.len(),
        update = submission.household.household_id.is_some(),
        "Normalized submission"
    );
    Ok(submission)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConsentType;
    use serde_json::json;

    fn legacy_payload() -> Value {
        json!({
            "household": {
                "addressLine1": "123 Main",
                "city": "Springfield",
                "preferredScriptureTranslation": "NIV"
            },
            "guardians": [{
                "firstName": "Ada",
                "lastName": "Lovelace",
                "mobilePhone": "555.123.4567",
                "email": "ada@example.com",
                "isPrimary": true
            }],
            "emergencyContact": {
                "firstName": "Charles",
                "lastName": "Babbage",
                "phone": "555-765-4321",
                "relationship": "friend"
            },
            "children": [{
                "firstName": "Anne",
                "lastName": "Lovelace",
                "dob": "2016-05-01",
                "grade": "3rd",
                "ministrySelections": {"choirJoy": true, "bible-bee": "true", "art": false},
                "customData": {"shirtSize": "M"}
            }],
            "consents": {"liability": true, "photoRelease": false}
        })
    }

    #[test]
    fn test_legacy_payload_normalizes_without_legacy_keys() {
        let submission = normalize_submission(legacy_payload()).unwrap();
        let out = serde_json::to_string(&submission).unwrap();
        assert!(!out.contains("photoRelease"));
        assert!(!out.contains("preferredScriptureTranslation"));
        assert!(!out.contains("firstName"));

        assert_eq!(submission.household.name, "Lovelace");
        assert_eq!(submission.household.preferred_scripture_translation.as_deref(), Some("NIV"));
        assert_eq!(submission.household.primary_phone.as_deref(), Some("(555) 123-4567"));
        assert_eq!(submission.guardians[0].phone, "(555) 123-4567");
        assert_eq!(submission.signer_name.as_deref(), Some("Ada Lovelace"));

        let child = &submission.children[0];
        assert_eq!(child.ministry_selections, vec!["bible-bee", "choirJoy"]);
        assert_eq!(child.custom_data.get("shirtSize"), Some(&json!("M")));

        let photo = submission
            .consents
            .iter()
            .find(|c| c.consent_type == ConsentType::PhotoRelease)
            .unwrap();
        assert!(!photo.accepted);
    }

    #[test]
    fn test_every_violation_reported() {
        let raw = json!({
            "guardians": [{"firstName": "", "lastName": "Lovelace", "phone": "555-1234", "email": "not-an-email"}],
            "children": [{"firstName": "Anne", "lastName": "Lovelace", "dob": "05/01/2016"}],
            "consents": [{"type": "waiver", "accepted": true}]
        });
        let errors = normalize_submission(raw).unwrap_err();
        assert_eq!(errors.message_for("guardians[0].first_name"), Some("is required"));
        assert_eq!(
            errors.message_for("guardians[0].phone"),
            Some("must have at least 10 digits")
        );
        assert_eq!(errors.message_for("guardians[0].email"), Some("is not a valid email address"));
        assert_eq!(errors.message_for("emergency_contact"), Some("is required"));
        assert!(errors.message_for("emergency_contact.first_name").is_none());
        assert_eq!(
            errors.message_for("children[0].date_of_birth"),
            Some("must be a date in YYYY-MM-DD format")
        );
        assert!(errors.message_for("consents[0].type").is_some());
        assert_eq!(errors.message_for("consents.liability"), Some("must be accepted"));
    }

    #[test]
    fn test_consent_list_with_custom_entries() {
        let mut raw = legacy_payload();
        raw["consents"] = json!([
            {"type": "liability", "accepted": true},
            {"type": "custom", "customKey": "group_photo", "accepted": true, "text": "Group photos"},
            {"type": "custom", "accepted": true}
        ]);
        let errors = normalize_submission(raw.clone()).unwrap_err();
        assert_eq!(
            errors.message_for("consents[2].custom_key"),
            Some("is required for custom consents")
        );

        raw["consents"].as_array_mut().unwrap().pop();
        let submission = normalize_submission(raw).unwrap();
        let custom = submission
            .consents
            .iter()
            .find(|c| c.consent_type == ConsentType::Custom)
            .unwrap();
        assert_eq!(custom.custom_key.as_deref(), Some("group_photo"));
        assert_eq!(custom.text.as_deref(), Some("Group photos"));
    }

    #[test]
    fn test_old_and_new_field_names_together() {
        let mut raw = legacy_payload();
        raw["children"][0]["dateOfBirth"] = json!("2016-06-02");
        raw["guardians"][0]["phone"] = json!("555-987-6543");
        let submission = normalize_submission(raw).unwrap();
        assert_eq!(submission.children[0].date_of_birth.to_string(), "2016-06-02");
        assert_eq!(submission.guardians[0].phone, "(555) 987-6543");
    }

    #[test]
    fn test_missing_sections() {
        let errors = normalize_submission(json!({"liability": true})).unwrap_err();
        assert!(errors.message_for("guardians").is_some());
        assert!(errors.message_for("children").is_some());
        assert!(errors.message_for("consents.liability").is_none());

        let errors = normalize_submission(json!({"guardians": "nope"})).unwrap_err();
        assert!(errors.message_for("$").is_some());
    }
}
