//! Bible Bee division assignment.
//!
//! There is no stored assignment state. `AssignmentEngine::preview` recomputes
//! every placement from the current children, divisions and overrides, and
//! `AssignmentEngine::commit` writes back the rows an administrator accepted.
//!
//! Precedence for a child, highest first:
//! 1. an `EnrollmentOverride` for (child, cycle) places the child as given
//! 2. an unreadable grade leaves the child `unknown_grade`
//! 3. exactly one division containing the grade code is `proposed`
//! 4. none, or several overlapping divisions, leave the child `unassigned`

mod commit;
mod preview;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::MinistryCodes;
use crate::storage::StorageAdapter;

/// Child lookups in flight at once during preview
const MAX_CONCURRENT_LOOKUPS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "snake_case")]
pub enum PlacementStatus {
    Override,
    Proposed,
    Unassigned,
    UnknownGrade,
}

impl PlacementStatus {
    /// Whether commit writes an enrollment for this row
    pub fn is_placement(&self) -> bool {
        matches!(self, PlacementStatus::Override | PlacementStatus::Proposed)
    }
}

/// Data-quality findings attached to a preview row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Several divisions contain the child's grade code
    OverlappingDivisions { division_ids: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct PreviewRow {
    pub child_id: String,
    pub child_name: String,
    pub grade: Option<String>,
    pub grade_code: Option<u8>,
    pub status: PlacementStatus,
    pub division_id: Option<String>,
    pub division_name: Option<String>,
    /// Override reason, when the status is `override`
    pub reason: Option<String>,
    pub diagnostic: Option<Diagnostic>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct PreviewCounts {
    pub proposed: usize,
    pub overrides: usize,
    pub unassigned: usize,
    pub unknown_grade: usize,
}

impl PreviewCounts {
    fn tally(rows: &[PreviewRow]) -> Self {
        let mut counts = Self::default();
        for row in rows {
            match row.status {
                PlacementStatus::Proposed => counts.proposed += 1,
                PlacementStatus::Override => counts.overrides += 1,
                PlacementStatus::Unassigned => counts.unassigned += 1,
                PlacementStatus::UnknownGrade => counts.unknown_grade += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Preview {
    pub competition_cycle_id: String,
    pub rows: Vec<PreviewRow>,
    pub counts: PreviewCounts,
}

impl Preview {
    pub fn row(&self, child_id: &str) -> Option<&PreviewRow> {
        self.rows.iter().find(|r| r.child_id == child_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct CommitError {
    pub child_id: String,
    pub message: String,
}

/// What a commit wrote. Each placement lands in exactly one count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct CommitSummary {
    /// New automatic enrollments
    pub enrolled: usize,
    /// Existing enrollments moved to a proposed division
    pub updated: usize,
    /// New enrollments from an override
    pub overrides_applied: usize,
    /// Existing enrollments moved to an override's division
    pub overrides_updated: usize,
    /// Placements already in place
    pub unchanged: usize,
    /// Unassigned or unknown-grade rows
    pub skipped: usize,
    pub errors: Vec<CommitError>,
}

impl CommitSummary {
    /// Number of enrollments created or changed
    pub fn written(&self) -> usize {
        self.enrolled + self.updated + self.overrides_applied + self.overrides_updated
    }
}

pub struct AssignmentEngine {
    store: Arc<dyn StorageAdapter>,
    codes: MinistryCodes,
}

impl AssignmentEngine {
    pub fn new(store: Arc<dyn StorageAdapter>, codes: MinistryCodes) -> Self {
        Self { store, codes }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use chrono::NaiveDate;

    use super::AssignmentEngine;
    use crate::config::MinistryCodes;
    use crate::models::{
        ChildPatch, Enrollment, EnrollmentStatus, NewChild, NewCompetitionCycle, NewDivision,
        NewEnrollmentOverride, NewMinistry, NewMinistryEnrollment, NewRegistrationCycle,
    };
    use crate::storage::{EmbeddedStore, ListQuery, StorageAdapter};

    /// A competition cycle with its ministry, ready for children.
    pub struct Cohort {
        pub store: Arc<dyn StorageAdapter>,
        pub cycle_id: String,
        pub competition_id: String,
        pub ministry_id: String,
    }

    impl Cohort {
        pub async fn new() -> Self {
            let store: Arc<dyn StorageAdapter> = Arc::new(EmbeddedStore::in_memory());
            let cycle = store
                .registration_cycles()
                .create(NewRegistrationCycle {
                    name: "2025".to_string(),
                    start_date: NaiveDate::from_ymd_opt(2025, 8, 1).unwrap(),
                    end_date: NaiveDate::from_ymd_opt(2026, 5, 31).unwrap(),
                    is_active: true,
                })
                .await
                .unwrap();
            let ministry = store
                .ministries()
                .create(NewMinistry {
                    code: MinistryCodes::default().competition,
                    name: "Bible Bee".to_string(),
                    is_active: true,
                    ..Default::default()
                })
                .await
                .unwrap();
            let competition = store
                .competition_cycles()
                .create(NewCompetitionCycle {
                    cycle_id: cycle.id.clone(),
                    name: "Bible Bee 2025".to_string(),
                    is_active: true,
                })
                .await
                .unwrap();
            Self {
                store,
                cycle_id: cycle.id,
                competition_id: competition.id,
                ministry_id: ministry.id,
            }
        }

        pub fn engine(&self) -> AssignmentEngine {
            AssignmentEngine::new(self.store.clone(), MinistryCodes::default())
        }

        pub async fn division(&self, name: &str, min_grade: u8, max_grade: u8) -> String {
            self.store
                .divisions()
                .create(NewDivision {
                    competition_cycle_id: self.competition_id.clone(),
                    name: name.to_string(),
                    min_grade,
                    max_grade,
                    minimum_required: 10,
                })
                .await
                .unwrap()
                .id
        }

        pub async fn child(&self, first_name: &str, grade: &str) -> String {
            self.enrolled_child(first_name, grade, EnrollmentStatus::Enrolled)
                .await
        }

        pub async fn interested_child(&self, first_name: &str, grade: &str) -> String {
            self.enrolled_child(first_name, grade, EnrollmentStatus::Interest)
                .await
        }

        async fn enrolled_child(&self, first_name: &str, grade: &str, status: EnrollmentStatus) -> String {
            let child = self
                .store
                .children()
                .create(NewChild {
                    household_id: "hh-1".to_string(),
                    first_name: first_name.to_string(),
                    last_name: "Tester".to_string(),
                    grade: Some(grade.to_string()),
                    is_active: true,
                    ..Default::default()
                })
                .await
                .unwrap();
            self.store
                .ministry_enrollments()
                .create(NewMinistryEnrollment {
                    child_id: child.id.clone(),
                    ministry_id: self.ministry_id.clone(),
                    cycle_id: self.cycle_id.clone(),
                    status,
                    custom_fields: BTreeMap::new(),
                })
                .await
                .unwrap();
            child.id
        }

        pub async fn deactivate(&self, child_id: &str) {
            self.store
                .children()
                .update(child_id, ChildPatch::deactivate())
                .await
                .unwrap();
        }

        pub async fn override_to(&self, child_id: &str, division_id: &str, reason: &str) {
            self.store
                .enrollment_overrides()
                .create(NewEnrollmentOverride {
                    competition_cycle_id: self.competition_id.clone(),
                    child_id: child_id.to_string(),
                    division_id: division_id.to_string(),
                    reason: Some(reason.to_string()),
                    created_by: Some("director".to_string()),
                })
                .await
                .unwrap();
        }

        pub async fn enrollments(&self) -> Vec<Enrollment> {
            self.store
                .enrollments()
                .list(&ListQuery::new().eq("competition_cycle_id", self.competition_id.as_str()))
                .await
                .unwrap()
        }
    }
}
