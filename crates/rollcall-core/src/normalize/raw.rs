//! Loose shape of an incoming submission, after key normalization.
//!
//! Every scalar is read leniently so one oddly typed field becomes a
//! validation issue for that field instead of a parse failure for the whole
//! document.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::utils::lenient::{as_bool, lenient_opt_bool, lenient_opt_string};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawSubmission {
    pub household: Option<RawHousehold>,
    pub guardians: Option<Vec<RawGuardian>>,
    pub emergency_contact: Option<RawContact>,
    pub children: Option<Vec<RawChild>>,
    pub consents: Option<RawConsents>,
    /// Legacy top-level consent flags
    #[serde(deserialize_with = "lenient_opt_bool")]
    pub liability: Option<bool>,
    #[serde(deserialize_with = "lenient_opt_bool")]
    pub photo_release: Option<bool>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub signer_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawHousehold {
    #[serde(deserialize_with = "lenient_opt_string")]
    pub household_id: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub address_line1: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub address_line2: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub city: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub state: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub zip: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub preferred_scripture_translation: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub primary_email: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub primary_phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawGuardian {
    #[serde(deserialize_with = "lenient_opt_string")]
    pub first_name: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub last_name: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub phone: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub email: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub relationship: Option<String>,
    #[serde(deserialize_with = "lenient_opt_bool")]
    pub is_primary: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawContact {
    #[serde(deserialize_with = "lenient_opt_string")]
    pub first_name: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub last_name: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub phone: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub relationship: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawChild {
    #[serde(deserialize_with = "lenient_opt_string")]
    pub child_id: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub first_name: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub last_name: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub date_of_birth: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub grade: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub allergies: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub medical_notes: Option<String>,
    #[serde(deserialize_with = "lenient_opt_bool")]
    pub special_needs: Option<bool>,
    pub ministry_selections: Option<RawSelections>,
    pub interest_selections: Option<RawSelections>,
    pub custom_data: Option<BTreeMap<String, Value>>,
}

/// Selections arrive as `{ key: true }` flags or a plain list of keys.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawSelections {
    List(Vec<String>),
    Flags(BTreeMap<String, Value>),
}

impl RawSelections {
    /// Selected keys, in submission order for lists and key order for flags
    pub fn selected(&self) -> Vec<String> {
        match self {
            RawSelections::List(keys) => keys
                .iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
            RawSelections::Flags(flags) => flags
                .iter()
                .filter(|(_, value)| as_bool(value).unwrap_or(false))
                .map(|(key, _)| key.clone())
                .collect(),
        }
    }
}

/// Consents arrive as a list of entries or as legacy `{ liability: true }` flags.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawConsents {
    List(Vec<RawConsent>),
    Flags(BTreeMap<String, Value>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawConsent {
    #[serde(rename = "type", deserialize_with = "lenient_opt_string")]
    pub consent_type: Option<String>,
    #[serde(deserialize_with = "lenient_opt_bool")]
    pub accepted: Option<bool>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub custom_key: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub text: Option<String>,
}
