//! Per-entity lifecycle policy.
//!
//! Deleting is not uniform across entities. Every entity's own `delete` is a
//! hard delete, but a household edit treats each related entity differently.
//! This table is the single place that records how.

use crate::storage::EntityKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePolicy {
    /// Updated in place, never removed by an edit
    Retain,
    /// All rows for the household deleted and recreated from the submission
    ReplaceAll,
    /// Rows missing from the submission get `is_active = false`
    Deactivate,
    /// Cycle-scoped rows for an edited child deleted and recreated
    Recreate,
    /// Written only by the assignment engine or an administrator
    EngineManaged,
    /// Append-only history referencing children; never touched by an edit
    History,
}

impl EntityKind {
    /// How a household edit treats rows of this kind
    pub fn on_household_edit(&self) -> LifecyclePolicy {
        match self {
            EntityKind::Household
            | EntityKind::RegistrationCycle
            | EntityKind::Ministry
            | EntityKind::CompetitionCycle
            | EntityKind::Division
            | EntityKind::Scripture => LifecyclePolicy::Retain,
            EntityKind::Guardian | EntityKind::EmergencyContact => LifecyclePolicy::ReplaceAll,
            EntityKind::Child => LifecyclePolicy::Deactivate,
            EntityKind::Registration | EntityKind::MinistryEnrollment => LifecyclePolicy::Recreate,
            EntityKind::EnrollmentOverride
            | EntityKind::Enrollment
            | EntityKind::StudentScripture => LifecyclePolicy::EngineManaged,
            EntityKind::Attendance | EntityKind::Incident => LifecyclePolicy::History,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_children_are_deactivated_not_deleted() {
        assert_eq!(EntityKind::Child.on_household_edit(), LifecyclePolicy::Deactivate);
    }

    #[test]
    fn test_contacts_replaced_and_cycle_rows_recreated() {
        assert_eq!(EntityKind::Guardian.on_household_edit(), LifecyclePolicy::ReplaceAll);
        assert_eq!(EntityKind::EmergencyContact.on_household_edit(), LifecyclePolicy::ReplaceAll);
        assert_eq!(EntityKind::Registration.on_household_edit(), LifecyclePolicy::Recreate);
        assert_eq!(EntityKind::MinistryEnrollment.on_household_edit(), LifecyclePolicy::Recreate);
    }

    #[test]
    fn test_placements_untouched_by_edits() {
        assert_eq!(EntityKind::Enrollment.on_household_edit(), LifecyclePolicy::EngineManaged);
        assert_eq!(EntityKind::EnrollmentOverride.on_household_edit(), LifecyclePolicy::EngineManaged);
        assert_eq!(EntityKind::Attendance.on_household_edit(), LifecyclePolicy::History);
    }
}
