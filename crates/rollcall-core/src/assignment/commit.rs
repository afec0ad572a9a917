use std::collections::HashMap;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::{AssignmentEngine, CommitError, CommitSummary, PlacementStatus, PreviewRow};
use crate::error::Result;
use crate::models::{Enrollment, EnrollmentPatch, NewEnrollment};
use crate::storage::ListQuery;

/// How one row was written.
enum Outcome {
    Created,
    Updated,
    Unchanged,
}

impl AssignmentEngine {
    /// Write the `override` and `proposed` rows of a preview.
    ///
    /// An existing enrollment for (child, cycle) is updated in place, never
    /// duplicated; one already in the target division with the same auto flag
    /// is left alone. A failing child is recorded in `errors` and the rest of
    /// the batch continues.
    pub async fn commit(&self, competition_cycle_id: &str, rows: &[PreviewRow]) -> Result<CommitSummary> {
        let mut existing: HashMap<String, Enrollment> = HashMap::new();
        for enrollment in self
            .store
            .enrollments()
            .list(&ListQuery::new().eq("competition_cycle_id", competition_cycle_id))
            .await?
        {
            if existing.contains_key(&enrollment.child_id) {
                warn!(
                    child_id = %enrollment.child_id,
                    enrollment_id = %enrollment.id,
                    "Duplicate competition enrollment, keeping the first"
                );
                continue;
            }
            existing.insert(enrollment.child_id.clone(), enrollment);
        }

        let mut summary = CommitSummary::default();
        for row in rows {
            if !row.status.is_placement() {
                summary.skipped += 1;
                continue;
            }
            let Some(division_id) = row.division_id.as_deref() else {
                summary.errors.push(CommitError {
                    child_id: row.child_id.clone(),
                    message: format!("{} row has no division", status_label(row.status)),
                });
                continue;
            };

            let is_override = row.status == PlacementStatus::Override;
            let current = existing.get(&row.child_id);
            let outcome = self
                .place(competition_cycle_id, &row.child_id, division_id, !is_override, current)
                .await;
            match outcome {
                Ok((outcome, enrollment)) => {
                    match outcome {
                        Outcome::Created if is_override => summary.overrides_applied += 1,
                        Outcome::Created => summary.enrolled += 1,
                        Outcome::Updated if is_override => summary.overrides_updated += 1,
                        Outcome::Updated => summary.updated += 1,
                        Outcome::Unchanged => summary.unchanged += 1,
                    }
                    // A later row for the same child must see this write
                    existing.insert(row.child_id.clone(), enrollment);
                }
                Err(e) => {
                    warn!(child_id = %row.child_id, error = %e, "Placement failed");
                    summary.errors.push(CommitError {
                        child_id: row.child_id.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            competition_cycle_id = competition_cycle_id,
            enrolled = summary.enrolled,
            updated = summary.updated,
            overrides_applied = summary.overrides_applied,
            overrides_updated = summary.overrides_updated,
            unchanged = summary.unchanged,
            skipped = summary.skipped,
            errors = summary.errors.len(),
            "Assignment commit"
        );
        Ok(summary)
    }

    async fn place(
        &self,
        competition_cycle_id: &str,
        child_id: &str,
        division_id: &str,
        auto_enrolled: bool,
        current: Option<&Enrollment>,
    ) -> Result<(Outcome, Enrollment)> {
        match current {
            Some(enrollment)
                if enrollment.division_id == division_id
                    && enrollment.auto_enrolled == auto_enrolled =>
            {
                Ok((Outcome::Unchanged, enrollment.clone()))
            }
            Some(enrollment) => {
                let moved = self
                    .store
                    .enrollments()
                    .update(
                        &enrollment.id,
                        EnrollmentPatch {
                            division_id: Some(division_id.to_string()),
                            auto_enrolled: Some(auto_enrolled),
                            enrolled_at: Some(Utc::now()),
                        },
                    )
                    .await?;
                debug!(child_id = child_id, division_id = division_id, "Moved enrollment");
                Ok((Outcome::Updated, moved))
            }
            None => {
                let created = self
                    .store
                    .enrollments()
                    .create(NewEnrollment {
                        competition_cycle_id: competition_cycle_id.to_string(),
                        child_id: child_id.to_string(),
                        division_id: division_id.to_string(),
                        auto_enrolled,
                        enrolled_at: Utc::now(),
                    })
                    .await?;
                debug!(child_id = child_id, division_id = division_id, "Created enrollment");
                Ok((Outcome::Created, created))
            }
        }
    }
}

fn status_label(status: PlacementStatus) -> &'static str {
    match status {
        PlacementStatus::Override => "override",
        PlacementStatus::Proposed => "proposed",
        PlacementStatus::Unassigned => "unassigned",
        PlacementStatus::UnknownGrade => "unknown_grade",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::test_support::Cohort;

    #[tokio::test]
    async fn test_commit_is_idempotent() {
        let cohort = Cohort::new().await;
        cohort.division("Primary", 0, 2).await;
        cohort.division("Elementary", 3, 5).await;
        cohort.child("Ann", "K").await;
        cohort.child("Ben", "4th").await;
        cohort.child("Cal", "banana").await;
        let engine = cohort.engine();

        let preview = engine.preview(&cohort.competition_id).await.unwrap();
        let first = engine.commit(&cohort.competition_id, &preview.rows).await.unwrap();
        assert_eq!(first.enrolled, 2);
        assert_eq!(first.skipped, 1);
        assert!(first.errors.is_empty());

        let placed = cohort.enrollments().await;
        let preview = engine.preview(&cohort.competition_id).await.unwrap();
        let second = engine.commit(&cohort.competition_id, &preview.rows).await.unwrap();
        assert_eq!(second.written(), 0);
        assert_eq!(second.unchanged, 2);
        assert_eq!(cohort.enrollments().await, placed);
    }

    #[tokio::test]
    async fn test_override_moves_existing_enrollment() {
        let cohort = Cohort::new().await;
        cohort.division("Primary", 0, 2).await;
        let elementary = cohort.division("Elementary", 3, 5).await;
        let ann = cohort.child("Ann", "1st").await;
        let engine = cohort.engine();

        let preview = engine.preview(&cohort.competition_id).await.unwrap();
        engine.commit(&cohort.competition_id, &preview.rows).await.unwrap();

        cohort.override_to(&ann, &elementary, "sibling cohort").await;
        let preview = engine.preview(&cohort.competition_id).await.unwrap();
        let summary = engine.commit(&cohort.competition_id, &preview.rows).await.unwrap();
        assert_eq!(summary.overrides_updated, 1);
        assert_eq!(summary.enrolled, 0);

        let enrollments = cohort.enrollments().await;
        assert_eq!(enrollments.len(), 1);
        assert_eq!(enrollments[0].division_id, elementary);
        assert!(!enrollments[0].auto_enrolled);
    }

    #[tokio::test]
    async fn test_row_without_division_is_an_error() {
        let cohort = Cohort::new().await;
        let ann = cohort.child("Ann", "1st").await;
        let row = PreviewRow {
            child_id: ann.clone(),
            child_name: "Ann".to_string(),
            grade: Some("1st".to_string()),
            grade_code: Some(1),
            status: PlacementStatus::Proposed,
            division_id: None,
            division_name: None,
            reason: None,
            diagnostic: None,
        };
        let summary = cohort
            .engine()
            .commit(&cohort.competition_id, &[row])
            .await
            .unwrap();
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].child_id, ann);
        assert!(cohort.enrollments().await.is_empty());
    }

    #[tokio::test]
    async fn test_repeated_child_rows_share_one_enrollment() {
        let cohort = Cohort::new().await;
        let primary = cohort.division("Primary", 0, 2).await;
        let elementary = cohort.division("Elementary", 3, 5).await;
        let ann = cohort.child("Ann", "1st").await;
        let row = |division_id: &str| PreviewRow {
            child_id: ann.clone(),
            child_name: "Ann".to_string(),
            grade: Some("1st".to_string()),
            grade_code: Some(1),
            status: PlacementStatus::Proposed,
            division_id: Some(division_id.to_string()),
            division_name: None,
            reason: None,
            diagnostic: None,
        };

        let summary = cohort
            .engine()
            .commit(&cohort.competition_id, &[row(&primary), row(&elementary), row(&elementary)])
            .await
            .unwrap();
        assert_eq!(summary.enrolled, 1);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.unchanged, 1);

        let enrollments = cohort.enrollments().await;
        assert_eq!(enrollments.len(), 1);
        assert_eq!(enrollments[0].division_id, elementary);
    }
}
