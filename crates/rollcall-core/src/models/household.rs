use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::{EntityKind, Record};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Household {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address_line1: Option<String>,
    #[serde(default)]
    pub address_line2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub preferred_scripture_translation: Option<String>,
    #[serde(default)]
    pub primary_email: Option<String>,
    #[serde(default)]
    pub primary_phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Household {
    pub fn address(&self) -> Option<String> {
        let addr1 = self.address_line1.as_deref().unwrap_or("").trim();
        let city = self.city.as_deref().unwrap_or("");
        let state = self.state.as_deref().unwrap_or("");
        let zip = self.zip.as_deref().unwrap_or("");

        if addr1.is_empty() && city.is_empty() {
            return None;
        }

        Some(format!("{}, {}, {} {}", addr1, city, state, zip).trim().to_string())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NewHousehold {
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

#[derive(Debug, Clone, Default, Serialize)]
pub struct HouseholdPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_line1: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_line2: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_scripture_translation: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_email: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_phone: Option<Option<String>>,
}

impl Record for Household {
    type Draft = NewHousehold;
    type Patch = HouseholdPatch;
    const KIND: EntityKind = EntityKind::Household;

    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Guardian {
    pub id: String,
    pub household_id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    pub relationship: String,
    #[serde(default)]
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Guardian {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NewGuardian {
    pub household_id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub relationship: String,
    pub is_primary: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GuardianPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_primary: Option<bool>,
}

impl Record for Guardian {
    type Draft = NewGuardian;
    type Patch = GuardianPatch;
    const KIND: EntityKind = EntityKind::Guardian;

    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct EmergencyContact {
    pub id: String,
    pub household_id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub relationship: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NewEmergencyContact {
    pub household_id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub relationship: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EmergencyContactPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
}

impl Record for EmergencyContact {
    type Draft = NewEmergencyContact;
    type Patch = EmergencyContactPatch;
    const KIND: EntityKind = EntityKind::EmergencyContact;

    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn household(address_line1: Option<&str>, city: Option<&str>) -> Household {
        let now = Utc::now();
        Household {
            id: "h1".to_string(),
            name: "Rivera".to_string(),
            address_line1: address_line1.map(String::from),
            address_line2: None,
            city: city.map(String::from),
            state: Some("IL".to_string()),
            zip: Some("62701".to_string()),
            preferred_scripture_translation: None,
            primary_email: None,
            primary_phone: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_address_formatting() {
        let h = household(Some("123 Main"), Some("Springfield"));
        assert_eq!(h.address().as_deref(), Some("123 Main, Springfield, IL 62701"));
    }

    #[test]
    fn test_address_missing() {
        assert_eq!(household(None, None).address(), None);
    }
}
