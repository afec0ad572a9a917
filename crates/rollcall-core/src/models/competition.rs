use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::{EntityKind, Record};

/// A Bible Bee year, linked to the registration cycle whose enrollments feed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct CompetitionCycle {
    pub id: String,
    pub cycle_id: String,
    pub name: String,
    #[serde(default)]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewCompetitionCycle {
    pub cycle_id: String,
    pub name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CompetitionCyclePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl Record for CompetitionCycle {
    type Draft = NewCompetitionCycle;
    type Patch = CompetitionCyclePatch;
    const KIND: EntityKind = EntityKind::CompetitionCycle;

    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// A grade band within a competition cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Division {
    pub id: String,
    pub competition_cycle_id: String,
    pub name: String,
    pub min_grade: u8,
    pub max_grade: u8,
    /// Number of scriptures a child in this division must memorize
    #[serde(default)]
    pub minimum_required: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Division {
    pub fn contains_grade(&self, code: u8) -> bool {
        self.min_grade <= code && code <= self.max_grade
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewDivision {
    pub competition_cycle_id: String,
    pub name: String,
    pub min_grade: u8,
    pub max_grade: u8,
    pub minimum_required: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DivisionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_grade: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_grade: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_required: Option<u32>,
}

impl Record for Division {
    type Draft = NewDivision;
    type Patch = DivisionPatch;
    const KIND: EntityKind = EntityKind::Division;

    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// Administrator placement that always wins over automatic assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct EnrollmentOverride {
    pub id: String,
    pub competition_cycle_id: String,
    pub child_id: String,
    pub division_id: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewEnrollmentOverride {
    pub competition_cycle_id: String,
    pub child_id: String,
    pub division_id: String,
    pub reason: Option<String>,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EnrollmentOverridePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub division_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<Option<String>>,
}

impl Record for EnrollmentOverride {
    type Draft = NewEnrollmentOverride;
    type Patch = EnrollmentOverridePatch;
    const KIND: EntityKind = EntityKind::EnrollmentOverride;

    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// A child's division placement for one competition cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Enrollment {
    pub id: String,
    pub competition_cycle_id: String,
    pub child_id: String,
    pub division_id: String,
    #[serde(default)]
    pub auto_enrolled: bool,
    pub enrolled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewEnrollment {
    pub competition_cycle_id: String,
    pub child_id: String,
    pub division_id: String,
    pub auto_enrolled: bool,
    pub enrolled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EnrollmentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub division_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_enrolled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrolled_at: Option<DateTime<Utc>>,
}

impl Record for Enrollment {
    type Draft = NewEnrollment;
    type Patch = EnrollmentPatch;
    const KIND: EntityKind = EntityKind::Enrollment;

    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Scripture {
    pub id: String,
    pub competition_cycle_id: String,
    pub reference: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewScripture {
    pub competition_cycle_id: String,
    pub reference: String,
    pub text: Option<String>,
    pub sort_order: i32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScripturePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i32>,
}

impl Record for Scripture {
    type Draft = NewScripture;
    type Patch = ScripturePatch;
    const KIND: EntityKind = EntityKind::Scripture;

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
pub enum ScriptureStatus {
    #[default]
    Assigned,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct StudentScripture {
    pub id: String,
    pub competition_cycle_id: String,
    pub child_id: String,
    pub scripture_id: String,
    #[serde(default)]
    pub status: ScriptureStatus,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewStudentScripture {
    pub competition_cycle_id: String,
    pub child_id: String,
    pub scripture_id: String,
    pub status: ScriptureStatus,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StudentScripturePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ScriptureStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Option<DateTime<Utc>>>,
}

impl Record for StudentScripture {
    type Draft = NewStudentScripture;
    type Patch = StudentScripturePatch;
    const KIND: EntityKind = EntityKind::StudentScripture;

    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
