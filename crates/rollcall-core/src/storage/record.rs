//! Entity metadata shared by both adapters.
//!
//! `Record` ties a canonical model type to its draft and patch types and to an
//! `EntityKind`. The kind carries the collection schema: which fields are
//! indexed, which may be filtered on, and which are covered by free-text search.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{Result, StorageError};

/// A stored entity in canonical form.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Data supplied on create; the adapter adds `id` and timestamps
    type Draft: Serialize + Send + Sync;
    /// Partial data supplied on update; fields serialized as absent are untouched
    type Patch: Serialize + Send + Sync;

    const KIND: EntityKind;

    fn id(&self) -> &str;
    fn updated_at(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    Household,
    Guardian,
    EmergencyContact,
    Child,
    RegistrationCycle,
    Registration,
    Ministry,
    MinistryEnrollment,
    CompetitionCycle,
    Division,
    EnrollmentOverride,
    Enrollment,
    Scripture,
    StudentScripture,
    Attendance,
    Incident,
}

/// Declared shape of one named collection.
#[derive(Debug)]
pub struct CollectionSchema {
    pub name: &'static str,
    /// Single-field indexes
    pub indexes: &'static [&'static str],
    /// Compound indexes, resolved by scan with string-coerced comparison
    pub compound_indexes: &'static [&'static [&'static str]],
    /// Fields accepted as equality filters
    pub filterable: &'static [&'static str],
    /// Fields covered by free-text search
    pub searchable: &'static [&'static str],
}

impl EntityKind {
    pub const ALL: [EntityKind; 16] = [
        EntityKind::Household,
        EntityKind::Guardian,
        EntityKind::EmergencyContact,
        EntityKind::Child,
        EntityKind::RegistrationCycle,
        EntityKind::Registration,
        EntityKind::Ministry,
        EntityKind::MinistryEnrollment,
        EntityKind::CompetitionCycle,
        EntityKind::Division,
        EntityKind::EnrollmentOverride,
        EntityKind::Enrollment,
        EntityKind::Scripture,
        EntityKind::StudentScripture,
        EntityKind::Attendance,
        EntityKind::Incident,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Household => "Household",
            EntityKind::Guardian => "Guardian",
            EntityKind::EmergencyContact => "EmergencyContact",
            EntityKind::Child => "Child",
            EntityKind::RegistrationCycle => "RegistrationCycle",
            EntityKind::Registration => "Registration",
            EntityKind::Ministry => "Ministry",
            EntityKind::MinistryEnrollment => "MinistryEnrollment",
            EntityKind::CompetitionCycle => "CompetitionCycle",
            EntityKind::Division => "Division",
            EntityKind::EnrollmentOverride => "EnrollmentOverride",
            EntityKind::Enrollment => "Enrollment",
            EntityKind::Scripture => "Scripture",
            EntityKind::StudentScripture => "StudentScripture",
            EntityKind::Attendance => "Attendance",
            EntityKind::Incident => "Incident",
        }
    }

    pub fn schema(&self) -> &'static CollectionSchema {
        match self {
            EntityKind::Household => &CollectionSchema {
                name: "households",
                indexes: &["name", "primary_email"],
                compound_indexes: &[],
                filterable: &["name", "primary_email", "primary_phone", "city", "zip", "preferred_scripture_translation"],
                searchable: &["name", "primary_email", "primary_phone", "address_line1", "city"],
            },
            EntityKind::Guardian => &CollectionSchema {
                name: "guardians",
                indexes: &["household_id", "email", "phone"],
                compound_indexes: &[&["last_name", "first_name"]],
                filterable: &["household_id", "email", "phone", "is_primary", "first_name", "last_name"],
                searchable: &["first_name", "last_name", "email", "phone"],
            },
            EntityKind::EmergencyContact => &CollectionSchema {
                name: "emergency_contacts",
                indexes: &["household_id"],
                compound_indexes: &[],
                filterable: &["household_id"],
                searchable: &["first_name", "last_name", "phone"],
            },
            EntityKind::Child => &CollectionSchema {
                name: "children",
                indexes: &["household_id", "is_active"],
                compound_indexes: &[&["last_name", "first_name"]],
                filterable: &["household_id", "is_active", "grade", "first_name", "last_name", "date_of_birth"],
                searchable: &["first_name", "last_name"],
            },
            EntityKind::RegistrationCycle => &CollectionSchema {
                name: "registration_cycles",
                indexes: &["is_active"],
                compound_indexes: &[],
                filterable: &["is_active", "name"],
                searchable: &["name"],
            },
            EntityKind::Registration => &CollectionSchema {
                name: "registrations",
                indexes: &["child_id", "cycle_id"],
                compound_indexes: &[&["child_id", "cycle_id"]],
                filterable: &["child_id", "cycle_id", "status"],
                searchable: &[],
            },
            EntityKind::Ministry => &CollectionSchema {
                name: "ministries",
                indexes: &["code", "is_active"],
                compound_indexes: &[],
                filterable: &["code", "is_active", "enrollment_type"],
                searchable: &["name", "code", "description"],
            },
            EntityKind::MinistryEnrollment => &CollectionSchema {
                name: "ministry_enrollments",
                indexes: &["child_id", "ministry_id", "cycle_id"],
                compound_indexes: &[&["ministry_id", "cycle_id"], &["child_id", "cycle_id"]],
                filterable: &["child_id", "ministry_id", "cycle_id", "status"],
                searchable: &[],
            },
            EntityKind::CompetitionCycle => &CollectionSchema {
                name: "competition_cycles",
                indexes: &["cycle_id", "is_active"],
                compound_indexes: &[],
                filterable: &["cycle_id", "is_active"],
                searchable: &["name"],
            },
            EntityKind::Division => &CollectionSchema {
                name: "divisions",
                indexes: &["competition_cycle_id"],
                compound_indexes: &[],
                filterable: &["competition_cycle_id", "name"],
                searchable: &["name"],
            },
            EntityKind::EnrollmentOverride => &CollectionSchema {
                name: "enrollment_overrides",
                indexes: &["competition_cycle_id", "child_id"],
                compound_indexes: &[&["competition_cycle_id", "child_id"]],
                filterable: &["competition_cycle_id", "child_id", "division_id"],
                searchable: &["reason"],
            },
            EntityKind::Enrollment => &CollectionSchema {
                name: "enrollments",
                indexes: &["competition_cycle_id", "child_id"],
                compound_indexes: &[&["competition_cycle_id", "child_id"]],
                filterable: &["competition_cycle_id", "child_id", "division_id", "auto_enrolled"],
                searchable: &[],
            },
            EntityKind::Scripture => &CollectionSchema {
                name: "scriptures",
                indexes: &["competition_cycle_id"],
                compound_indexes: &[],
                filterable: &["competition_cycle_id"],
                searchable: &["reference", "text"],
            },
            EntityKind::StudentScripture => &CollectionSchema {
                name: "student_scriptures",
                indexes: &["child_id", "competition_cycle_id"],
                compound_indexes: &[&["competition_cycle_id", "child_id"]],
                filterable: &["competition_cycle_id", "child_id", "scripture_id", "status"],
                searchable: &[],
            },
            EntityKind::Attendance => &CollectionSchema {
                name: "attendance",
                indexes: &["child_id", "event_id", "date"],
                compound_indexes: &[&["event_id", "date"]],
                filterable: &["child_id", "event_id", "date", "timeslot_id"],
                searchable: &[],
            },
            EntityKind::Incident => &CollectionSchema {
                name: "incidents",
                indexes: &["child_id"],
                compound_indexes: &[],
                filterable: &["child_id", "severity"],
                searchable: &["child_name", "description", "reported_by"],
            },
        }
    }

    pub fn collection(&self) -> &'static str {
        self.schema().name
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generate a new record id
pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current time at the microsecond precision both backends persist.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Timestamp for an update: now, or one microsecond past the prior value when
/// the clock has not moved past it.
pub(crate) fn next_timestamp(prior: DateTime<Utc>) -> DateTime<Utc> {
    let now = now();
    if now > prior {
        now
    } else {
        prior + Duration::microseconds(1)
    }
}

fn to_object(kind: EntityKind, value: Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StorageError::invalid_data(
            kind,
            format!("expected an object, got {}", other),
        )),
    }
}

/// Build a full record from a draft, a fresh id and a creation timestamp.
/// `created_at` and `updated_at` are identical on creation.
pub(crate) fn materialize<E: Record>(id: &str, at: DateTime<Utc>, draft: &E::Draft) -> Result<E> {
    let mut map = to_object(E::KIND, serde_json::to_value(draft)?)?;
    let stamp = serde_json::to_value(at)?;
    map.insert("id".to_string(), Value::String(id.to_string()));
    map.insert("created_at".to_string(), stamp.clone());
    map.insert("updated_at".to_string(), stamp);
    serde_json::from_value(Value::Object(map))
        .map_err(|e| StorageError::invalid_data(E::KIND, e.to_string()))
}

/// Merge a patch into a record, advancing `updated_at`.
/// `id` and `created_at` cannot be patched.
pub(crate) fn apply_patch<E: Record>(current: &E, patch: &E::Patch) -> Result<E> {
    let mut map = to_object(E::KIND, serde_json::to_value(current)?)?;
    let changes = to_object(E::KIND, serde_json::to_value(patch)?)?;
    for (key, value) in changes {
        if matches!(key.as_str(), "id" | "created_at" | "updated_at") {
            continue;
        }
        map.insert(key, value);
    }
    map.insert(
        "updated_at".to_string(),
        serde_json::to_value(next_timestamp(current.updated_at()))?,
    );
    serde_json::from_value(Value::Object(map))
        .map_err(|e| StorageError::invalid_data(E::KIND, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Household, HouseholdPatch, NewHousehold};

    #[test]
    fn test_materialize_sets_identical_timestamps() {
        let at = now();
        let draft = NewHousehold {
            name: "Lovelace".to_string(),
            address_line1: Some("123 Main".to_string()),
            ..Default::default()
        };
        let h: Household = materialize("h1", at, &draft).expect("materialize household");
        assert_eq!(h.id, "h1");
        assert_eq!(h.created_at, h.updated_at);
        assert_eq!(h.address_line1.as_deref(), Some("123 Main"));
    }

    #[test]
    fn test_apply_patch_advances_and_clears() {
        let at = now() + Duration::hours(1); // clock behind the stored value
        let draft = NewHousehold {
            name: "Lovelace".to_string(),
            city: Some("London".to_string()),
            ..Default::default()
        };
        let h: Household = materialize("h1", at, &draft).expect("materialize household");
        let patch = HouseholdPatch {
            name: Some("Byron".to_string()),
            city: Some(None),
            ..Default::default()
        };
        let updated = apply_patch(&h, &patch).expect("apply patch");
        assert_eq!(updated.name, "Byron");
        assert_eq!(updated.city, None);
        assert_eq!(updated.created_at, h.created_at);
        assert!(updated.updated_at > h.updated_at);
    }

    #[test]
    fn test_schemas_filter_their_indexes() {
        for kind in EntityKind::ALL {
            let schema = kind.schema();
            for field in schema.indexes {
                assert!(schema.filterable.contains(field), "{} index {} not filterable", kind, field);
            }
            for compound in schema.compound_indexes {
                for field in compound.iter() {
                    assert!(schema.filterable.contains(field), "{} compound {} not filterable", kind, field);
                }
            }
        }
    }
}
