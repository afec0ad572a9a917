use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::storage::{EntityKind, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentType {
    #[default]
    Enrolled,
    InterestOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    #[default]
    Text,
    Boolean,
    Select,
}

/// A ministry-specific question asked at registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct CustomQuestion {
    pub id: String,
    pub label: String,
    #[serde(default, rename = "type")]
    pub kind: QuestionKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct TimeSlot {
    pub id: String,
    pub day: String,
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Ministry {
    pub id: String,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub min_age: Option<u8>,
    #[serde(default)]
    pub max_age: Option<u8>,
    #[serde(default)]
    pub min_grade: Option<u8>,
    #[serde(default)]
    pub max_grade: Option<u8>,
    #[serde(default)]
    pub enrollment_type: EnrollmentType,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub custom_questions: Vec<CustomQuestion>,
    #[serde(default)]
    pub time_slots: Vec<TimeSlot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl Ministry {
    /// Whether an age satisfies this ministry's declared bounds.
    /// An unknown age only passes a ministry with no bounds.
    pub fn accepts_age(&self, age: Option<i32>) -> bool {
        if self.min_age.is_none() && self.max_age.is_none() {
            return true;
        }
        let Some(age) = age else {
            return false;
        };
        let above_min = self.min_age.map_or(true, |min| age >= i32::from(min));
        let below_max = self.max_age.map_or(true, |max| age <= i32::from(max));
        above_min && below_max
    }

    pub fn defines_question(&self, question_id: &str) -> bool {
        self.custom_questions.iter().any(|q| q.id == question_id)
    }

    pub fn is_interest_only(&self) -> bool {
        self.enrollment_type == EnrollmentType::InterestOnly
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NewMinistry {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub min_age: Option<u8>,
    pub max_age: Option<u8>,
    pub min_grade: Option<u8>,
    pub max_grade: Option<u8>,
    pub enrollment_type: EnrollmentType,
    pub is_active: bool,
    pub custom_questions: Vec<CustomQuestion>,
    pub time_slots: Vec<TimeSlot>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MinistryPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_age: Option<Option<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_age: Option<Option<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrollment_type: Option<EnrollmentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_questions: Option<Vec<CustomQuestion>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_slots: Option<Vec<TimeSlot>>,
}

impl Record for Ministry {
    type Draft = NewMinistry;
    type Patch = MinistryPatch;
    const KIND: EntityKind = EntityKind::Ministry;

    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    #[default]
    Enrolled,
    Interest,
    Withdrawn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct MinistryEnrollment {
    pub id: String,
    pub child_id: String,
    pub ministry_id: String,
    pub cycle_id: String,
    #[serde(default)]
    pub status: EnrollmentStatus,
    #[serde(default)]
    pub custom_fields: BTreeMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewMinistryEnrollment {
    pub child_id: String,
    pub ministry_id: String,
    pub cycle_id: String,
    pub status: EnrollmentStatus,
    pub custom_fields: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MinistryEnrollmentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EnrollmentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_fields: Option<BTreeMap<String, Value>>,
}

impl Record for MinistryEnrollment {
    type Draft = NewMinistryEnrollment;
    type Patch = MinistryEnrollmentPatch;
    const KIND: EntityKind = EntityKind::MinistryEnrollment;

    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
