//! Check-in and incident history. These rows reference children by id and are
//! the reason edited households deactivate children instead of deleting them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::{EntityKind, Record};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Attendance {
    pub id: String,
    pub child_id: String,
    pub event_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub timeslot_id: Option<String>,
    pub check_in_at: DateTime<Utc>,
    #[serde(default)]
    pub check_out_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub picked_up_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewAttendance {
    pub child_id: String,
    pub event_id: String,
    pub date: NaiveDate,
    pub timeslot_id: Option<String>,
    pub check_in_at: DateTime<Utc>,
    pub check_out_at: Option<DateTime<Utc>>,
    pub picked_up_by: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AttendancePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_out_at: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picked_up_by: Option<Option<String>>,
}

impl Record for Attendance {
    type Draft = NewAttendance;
    type Patch = AttendancePatch;
    const KIND: EntityKind = EntityKind::Attendance;

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
pub enum IncidentSeverity {
    #[default]
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Incident {
    pub id: String,
    pub child_id: String,
    pub child_name: String,
    pub reported_by: String,
    pub description: String,
    #[serde(default)]
    pub severity: IncidentSeverity,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub admin_acknowledged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewIncident {
    pub child_id: String,
    pub child_name: String,
    pub reported_by: String,
    pub description: String,
    pub severity: IncidentSeverity,
    pub occurred_at: DateTime<Utc>,
    pub admin_acknowledged_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IncidentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<IncidentSeverity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_acknowledged_at: Option<Option<DateTime<Utc>>>,
}

impl Record for Incident {
    type Draft = NewIncident;
    type Patch = IncidentPatch;
    const KIND: EntityKind = EntityKind::Incident;

    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
