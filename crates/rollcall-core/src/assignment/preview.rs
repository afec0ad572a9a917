use std::collections::{HashMap, HashSet};

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use super::{
    AssignmentEngine, Diagnostic, PlacementStatus, Preview, PreviewCounts, PreviewRow,
    MAX_CONCURRENT_LOOKUPS,
};
use crate::error::{Result, StorageError};
use crate::models::{Child, Division, EnrollmentOverride, EnrollmentStatus};
use crate::storage::{EntityKind, ListQuery};

impl AssignmentEngine {
    /// Compute a placement for every active child enrolled in the
    /// competition ministry under the cycle's registration cycle.
    pub async fn preview(&self, competition_cycle_id: &str) -> Result<Preview> {
        let competition = self
            .store
            .competition_cycles()
            .get(competition_cycle_id)
            .await?
            .ok_or_else(|| StorageError::not_found(EntityKind::CompetitionCycle, competition_cycle_id))?;

        let children = self.participants(&competition.cycle_id).await?;
        let divisions = self
            .store
            .divisions()
            .list(&ListQuery::new().eq("competition_cycle_id", competition_cycle_id))
            .await?;
        let overrides = latest_overrides(
            self.store
                .enrollment_overrides()
                .list(&ListQuery::new().eq("competition_cycle_id", competition_cycle_id))
                .await?,
        );

        let mut rows: Vec<PreviewRow> = children
            .iter()
            .map(|child| place(child, &divisions, overrides.get(child.id.as_str())))
            .collect();
        rows.sort_by(|a, b| a.child_name.cmp(&b.child_name).then_with(|| a.child_id.cmp(&b.child_id)));

        let counts = PreviewCounts::tally(&rows);
        debug!(
            competition_cycle_id = competition_cycle_id,
            rows = rows.len(),
            proposed = counts.proposed,
            overrides = counts.overrides,
            unassigned = counts.unassigned,
            unknown_grade = counts.unknown_grade,
            "Assignment preview"
        );

        Ok(Preview {
            competition_cycle_id: competition_cycle_id.to_string(),
            rows,
            counts,
        })
    }

    /// Active children with an `enrolled` competition ministry enrollment.
    async fn participants(&self, cycle_id: &str) -> Result<Vec<Child>> {
        let ministry = self
            .store
            .ministries()
            .list(&ListQuery::new().eq("code", self.codes.competition.as_str()))
            .await?
            .into_iter()
            .next();
        let Some(ministry) = ministry else {
            warn!(code = %self.codes.competition, "Competition ministry not configured");
            return Ok(Vec::new());
        };

        let enrollments = self
            .store
            .ministry_enrollments()
            .list(
                &ListQuery::new()
                    .eq("ministry_id", ministry.id.as_str())
                    .eq("cycle_id", cycle_id),
            )
            .await?;

        let mut seen = HashSet::new();
        let child_ids: Vec<String> = enrollments
            .into_iter()
            .filter(|e| e.status == EnrollmentStatus::Enrolled)
            .map(|e| e.child_id)
            .filter(|id| seen.insert(id.clone()))
            .collect();

        let repo = self.store.children();
        let lookups: Vec<Result<Option<Child>>> = stream::iter(child_ids)
            .map(move |id| async move { repo.get(&id).await })
            .buffered(MAX_CONCURRENT_LOOKUPS)
            .collect()
            .await;

        let mut children = Vec::with_capacity(lookups.len());
        for lookup in lookups {
            match lookup? {
                Some(child) if child.is_active => children.push(child),
                Some(child) => debug!(child_id = %child.id, "Skipping inactive child"),
                None => debug!("Skipping enrollment for a deleted child"),
            }
        }
        Ok(children)
    }
}

/// Most recently updated override per child.
fn latest_overrides(overrides: Vec<EnrollmentOverride>) -> HashMap<String, EnrollmentOverride> {
    let mut latest: HashMap<String, EnrollmentOverride> = HashMap::new();
    for o in overrides {
        match latest.get(&o.child_id) {
            Some(current) if current.updated_at >= o.updated_at => {}
            _ => {
                latest.insert(o.child_id.clone(), o);
            }
        }
    }
    latest
}

fn place(child: &Child, divisions: &[Division], override_: Option<&EnrollmentOverride>) -> PreviewRow {
    let grade_code = child.grade_code();
    let mut row = PreviewRow {
        child_id: child.id.clone(),
        child_name: child.display_name(),
        grade: child.grade.clone(),
        grade_code,
        status: PlacementStatus::Unassigned,
        division_id: None,
        division_name: None,
        reason: None,
        diagnostic: None,
    };

    if let Some(o) = override_ {
        row.status = PlacementStatus::Override;
        row.division_name = divisions
            .iter()
            .find(|d| d.id == o.division_id)
            .map(|d| d.name.clone());
        row.division_id = Some(o.division_id.clone());
        row.reason = o.reason.clone();
        return row;
    }

    let Some(code) = grade_code else {
        row.status = PlacementStatus::UnknownGrade;
        return row;
    };

    let matching: Vec<&Division> = divisions.iter().filter(|d| d.contains_grade(code)).collect();
    match matching.as_slice() {
        [] => {}
        [division] => {
            row.status = PlacementStatus::Proposed;
            row.division_id = Some(division.id.clone());
            row.division_name = Some(division.name.clone());
        }
        several => {
            let division_ids: Vec<String> = several.iter().map(|d| d.id.clone()).collect();
            warn!(
                child_id = %child.id,
                grade_code = code,
                divisions = ?division_ids,
                "Overlapping divisions, leaving child unassigned"
            );
            row.diagnostic = Some(Diagnostic::OverlappingDivisions { division_ids });
        }
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::test_support::Cohort;

    #[tokio::test]
    async fn test_division_determinism() {
        let cohort = Cohort::new().await;
        cohort.division("Primary", 0, 2).await;
        cohort.division("Elementary", 3, 5).await;
        cohort.division("Middle", 6, 8).await;

        let mut expected = HashMap::new();
        for code in 0..=12u8 {
            let id = cohort.child(&format!("Kid{:02}", code), &code.to_string()).await;
            expected.insert(id, code);
        }

        let preview = cohort.engine().preview(&cohort.competition_id).await.unwrap();
        assert_eq!(preview.rows.len(), 13);
        for row in &preview.rows {
            let code = expected[&row.child_id];
            let division = match code {
                0..=2 => Some("Primary"),
                3..=5 => Some("Elementary"),
                6..=8 => Some("Middle"),
                _ => None,
            };
            match division {
                Some(name) => {
                    assert_eq!(row.status, PlacementStatus::Proposed, "code {}", code);
                    assert_eq!(row.division_name.as_deref(), Some(name));
                }
                None => {
                    assert_eq!(row.status, PlacementStatus::Unassigned, "code {}", code);
                    assert!(row.diagnostic.is_none());
                }
            }
        }
        assert_eq!(preview.counts.proposed, 9);
        assert_eq!(preview.counts.unassigned, 4);
    }

    #[tokio::test]
    async fn test_overlap_is_unassigned_with_diagnostic() {
        let cohort = Cohort::new().await;
        let a = cohort.division("Primary", 0, 3).await;
        let b = cohort.division("Elementary", 3, 5).await;
        let child = cohort.child("Overlap", "3rd grade").await;

        let preview = cohort.engine().preview(&cohort.competition_id).await.unwrap();
        let row = preview.row(&child).unwrap();
        assert_eq!(row.status, PlacementStatus::Unassigned);
        assert!(row.division_id.is_none());
        match &row.diagnostic {
            Some(Diagnostic::OverlappingDivisions { division_ids }) => {
                assert!(division_ids.contains(&a) && division_ids.contains(&b));
            }
            None => panic!("expected an overlap diagnostic"),
        }
    }

    #[tokio::test]
    async fn test_override_beats_unknown_grade() {
        let cohort = Cohort::new().await;
        let division = cohort.division("Primary", 0, 2).await;
        let child = cohort.child("Mystery", "banana").await;
        cohort.override_to(&child, &division, "placed by director").await;

        let preview = cohort.engine().preview(&cohort.competition_id).await.unwrap();
        let row = preview.row(&child).unwrap();
        assert_eq!(row.status, PlacementStatus::Override);
        assert_eq!(row.division_id.as_deref(), Some(division.as_str()));
        assert_eq!(row.reason.as_deref(), Some("placed by director"));
    }

    #[tokio::test]
    async fn test_skips_inactive_and_interest_only() {
        let cohort = Cohort::new().await;
        cohort.division("Primary", 0, 2).await;
        let active = cohort.child("Active", "1st").await;
        let inactive = cohort.child("Gone", "1st").await;
        cohort.deactivate(&inactive).await;
        cohort.interested_child("Curious", "2nd").await;

        let preview = cohort.engine().preview(&cohort.competition_id).await.unwrap();
        assert_eq!(preview.rows.len(), 1);
        assert_eq!(preview.rows[0].child_id, active);
    }

    #[tokio::test]
    async fn test_unknown_competition_cycle() {
        let cohort = Cohort::new().await;
        let err = cohort.engine().preview("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
