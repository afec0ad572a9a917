use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::grade::grade_code;
use crate::storage::{EntityKind, Record};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Child {
    pub id: String,
    pub household_id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub allergies: Option<String>,
    #[serde(default)]
    pub medical_notes: Option<String>,
    #[serde(default)]
    pub special_needs: bool,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl Child {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn display_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_name)
    }

    /// Age in whole years on the given day
    pub fn age_on(&self, on: NaiveDate) -> Option<i32> {
        self.date_of_birth.map(|dob| {
            let mut age = on.year() - dob.year();
            if (on.month(), on.day()) < (dob.month(), dob.day()) {
                age -= 1;
            }
            age
        })
    }

    pub fn grade_code(&self) -> Option<u8> {
        self.grade.as_deref().and_then(grade_code)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NewChild {
    pub household_id: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub grade: Option<String>,
    pub allergies: Option<String>,
    pub medical_notes: Option<String>,
    pub special_needs: bool,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ChildPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<Option<NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allergies: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medical_notes: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_needs: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl ChildPatch {
    pub fn deactivate() -> Self {
        Self {
            is_active: Some(false),
            ..Default::default()
        }
    }
}

impl Record for Child {
    type Draft = NewChild;
    type Patch = ChildPatch;
    const KIND: EntityKind = EntityKind::Child;

    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
