//! Canonical registration submission, produced only by validation.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

use crate::models::{
    ChildPatch, ConsentType, HouseholdPatch, NewChild, NewEmergencyContact, NewGuardian,
    NewHousehold,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrationSubmission {
    pub household: HouseholdInput,
    pub guardians: Vec<GuardianInput>,
    pub emergency_contact: EmergencyContactInput,
    pub children: Vec<ChildInput>,
    pub consents: Vec<ConsentDecision>,
    pub signer_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HouseholdInput {
    /// Present when editing an existing household
    pub household_id: Option<String>,
    pub name: String,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub preferred_scripture_translation: Option<String>,
    pub primary_email: Option<String>,
    pub primary_phone: Option<String>,
}

impl HouseholdInput {
    pub fn to_new(&self) -> NewHousehold {
        NewHousehold {
            name: self.name.clone(),
            address_line1: self.address_line1.clone(),
            address_line2: self.address_line2.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            zip: self.zip.clone(),
            preferred_scripture_translation: self.preferred_scripture_translation.clone(),
            primary_email: self.primary_email.clone(),
            primary_phone: self.primary_phone.clone(),
        }
    }

    /// Every field, so an edit clears what the new submission leaves out
    pub fn to_patch(&self) -> HouseholdPatch {
        HouseholdPatch {
            name: Some(self.name.clone()),
            address_line1: Some(self.address_line1.clone()),
            address_line2: Some(self.address_line2.clone()),
            city: Some(self.city.clone()),
            state: Some(self.state.clone()),
            zip: Some(self.zip.clone()),
            preferred_scripture_translation: Some(self.preferred_scripture_translation.clone()),
            primary_email: Some(self.primary_email.clone()),
            primary_phone: Some(self.primary_phone.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardianInput {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub relationship: String,
    pub is_primary: bool,
}

impl GuardianInput {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn to_new(&self, household_id: &str) -> NewGuardian {
        NewGuardian {
            household_id: household_id.to_string(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone: self.phone.clone(),
            email: self.email.clone(),
            relationship: self.relationship.clone(),
            is_primary: self.is_primary,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmergencyContactInput {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub relationship: String,
}

impl EmergencyContactInput {
    pub fn to_new(&self, household_id: &str) -> NewEmergencyContact {
        NewEmergencyContact {
            household_id: household_id.to_string(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone: self.phone.clone(),
            relationship: self.relationship.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChildInput {
    /// Present when the child already exists in this household
    pub child_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub grade: Option<String>,
    pub allergies: Option<String>,
    pub medical_notes: Option<String>,
    pub special_needs: bool,
    /// Ministry codes or ids selected for enrollment
    pub ministry_selections: Vec<String>,
    /// Ministry codes or ids selected as interest only
    pub interest_selections: Vec<String>,
    /// Answers keyed by custom question id
    pub custom_data: BTreeMap<String, Value>,
}

impl ChildInput {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn to_new(&self, household_id: &str) -> NewChild {
        NewChild {
            household_id: household_id.to_string(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            date_of_birth: Some(self.date_of_birth),
            grade: self.grade.clone(),
            allergies: self.allergies.clone(),
            medical_notes: self.medical_notes.clone(),
            special_needs: self.special_needs,
            is_active: true,
        }
    }

    /// Full replacement of the child's details; also reactivates
    pub fn to_patch(&self) -> ChildPatch {
        ChildPatch {
            first_name: Some(self.first_name.clone()),
            last_name: Some(self.last_name.clone()),
            date_of_birth: Some(Some(self.date_of_birth)),
            grade: Some(self.grade.clone()),
            allergies: Some(self.allergies.clone()),
            medical_notes: Some(self.medical_notes.clone()),
            special_needs: Some(self.special_needs),
            is_active: Some(true),
        }
    }
}

/// One consent answer; becomes a `Consent` on each child's registration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsentDecision {
    #[serde(rename = "type")]
    pub consent_type: ConsentType,
    pub custom_key: Option<String>,
    pub accepted: bool,
    pub text: Option<String>,
}
