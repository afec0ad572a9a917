use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::{EntityKind, Record};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct RegistrationCycle {
    pub id: String,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RegistrationCycle {
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start_date <= day && day <= self.end_date
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewRegistrationCycle {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistrationCyclePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl Record for RegistrationCycle {
    type Draft = NewRegistrationCycle;
    type Patch = RegistrationCyclePatch;
    const KIND: EntityKind = EntityKind::RegistrationCycle;

    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "snake_case")]
pub enum ConsentType {
    Liability,
    PhotoRelease,
    Custom,
}

impl ConsentType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "liability" => Some(ConsentType::Liability),
            "photo_release" | "photoRelease" => Some(ConsentType::PhotoRelease),
            "custom" => Some(ConsentType::Custom),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsentType::Liability => "liability",
            ConsentType::PhotoRelease => "photo_release",
            ConsentType::Custom => "custom",
        }
    }
}

impl std::fmt::Display for ConsentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One consent decision recorded on a registration.
/// A declined consent is kept with `accepted_at` unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Consent {
    #[serde(rename = "type")]
    pub consent_type: ConsentType,
    /// Key of a group or custom consent, e.g. `choir_communications`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_key: Option<String>,
    #[serde(default)]
    pub accepted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub signer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Consent {
    pub fn is_accepted(&self) -> bool {
        self.accepted_at.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    #[default]
    Active,
    Pending,
    Withdrawn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Registration {
    pub id: String,
    pub child_id: String,
    pub cycle_id: String,
    #[serde(default)]
    pub status: RegistrationStatus,
    #[serde(default)]
    pub consents: Vec<Consent>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Registration {
    pub fn consent(&self, consent_type: ConsentType) -> Option<&Consent> {
        self.consents.iter().find(|c| c.consent_type == consent_type)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewRegistration {
    pub child_id: String,
    pub cycle_id: String,
    pub status: RegistrationStatus,
    pub consents: Vec<Consent>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistrationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RegistrationStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consents: Option<Vec<Consent>>,
}

impl Record for Registration {
    type Draft = NewRegistration;
    type Patch = RegistrationPatch;
    const KIND: EntityKind = EntityKind::Registration;

    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
