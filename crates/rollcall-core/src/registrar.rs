//! Registration write path.
//!
//! `Registrar::register` takes a validated `RegistrationSubmission` and writes
//! the household, its people, the cycle's registrations and ministry
//! enrollments inside one `transaction`. Competition placement and scripture
//! assignment run after the commit and never fail the registration.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::MinistryCodes;
use crate::error::{Result, StorageError};
use crate::models::{
    Child, ChildPatch, Consent, EnrollmentPatch, EnrollmentStatus, Ministry,
    NewEnrollment, NewMinistryEnrollment, NewRegistration, RegistrationCycle,
    RegistrationStatus,
};
use crate::normalize::{normalize_submission, ChildInput, RegistrationSubmission, ValidationErrors};
use crate::scripture::ScriptureAssigner;
use crate::storage::{transaction, ListQuery, StorageAdapter};

#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Registration cycle not found: {0}")]
    UnknownCycle(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrationOutcome {
    pub household_id: String,
    /// Child ids in submission order
    pub child_ids: Vec<String>,
    pub is_update: bool,
    pub deactivated_child_ids: Vec<String>,
    pub warnings: Vec<String>,
}

/// Result of the transactional part of a registration.
struct Written {
    household_id: String,
    children: Vec<Child>,
    is_update: bool,
    deactivated: Vec<String>,
    /// Children who selected the competition ministry
    competitors: Vec<Child>,
    warnings: Vec<String>,
}

enum CompetitionStep {
    Enrolled { division: String },
    Skipped(String),
}

pub struct Registrar {
    store: Arc<dyn StorageAdapter>,
    scripture: Arc<dyn ScriptureAssigner>,
    codes: MinistryCodes,
}

impl Registrar {
    pub fn new(
        store: Arc<dyn StorageAdapter>,
        scripture: Arc<dyn ScriptureAssigner>,
        codes: MinistryCodes,
    ) -> Self {
        Self {
            store,
            scripture,
            codes,
        }
    }

    /// Normalize a raw JSON submission, then register it.
    pub async fn register_raw(
        &self,
        raw: Value,
        cycle_id: &str,
    ) -> std::result::Result<RegistrationOutcome, RegistrationError> {
        let submission = normalize_submission(raw)?;
        self.register(&submission, cycle_id).await
    }

    pub async fn register(
        &self,
        submission: &RegistrationSubmission,
        cycle_id: &str,
    ) -> std::result::Result<RegistrationOutcome, RegistrationError> {
        let cycle = self
            .store
            .registration_cycles()
            .get(cycle_id)
            .await?
            .ok_or_else(|| RegistrationError::UnknownCycle(cycle_id.to_string()))?;
        let ministries: Vec<Ministry> = self
            .store
            .ministries()
            .list(&ListQuery::new())
            .await?
            .into_iter()
            .filter(|m| m.is_active)
            .collect();

        let written: Written = transaction(
            self.store.as_ref(),
            self.write(submission, &cycle, &ministries),
        )
        .await?;

        let mut warnings = written.warnings;
        for child in &written.competitors {
            match self.enroll_competition(child, &cycle.id).await {
                Ok(CompetitionStep::Enrolled { division }) => {
                    debug!(child_id = %child.id, division = %division, "Competition enrollment");
                }
                Ok(CompetitionStep::Skipped(reason)) => {
                    warn!(child_id = %child.id, reason = %reason, "Competition enrollment skipped");
                    warnings.push(format!("{}: {}", child.full_name(), reason));
                }
                Err(e) => {
                    warn!(child_id = %child.id, error = %e, "Competition enrollment failed");
                    warnings.push(format!(
                        "{}: competition enrollment failed: {}",
                        child.full_name(),
                        e
                    ));
                }
            }
        }

        info!(
            household_id = %written.household_id,
            children = written.children.len(),
            update = written.is_update,
            deactivated = written.deactivated.len(),
            backend = self.store.backend_name(),
            "Registration saved"
        );

        Ok(RegistrationOutcome {
            household_id: written.household_id,
            child_ids: written.children.into_iter().map(|c| c.id).collect(),
            is_update: written.is_update,
            deactivated_child_ids: written.deactivated,
            warnings,
        })
    }

    async fn write(
        &self,
        submission: &RegistrationSubmission,
        cycle: &RegistrationCycle,
        ministries: &[Ministry],
    ) -> Result<Written> {
        let (household_id, is_update) = self.save_household(submission).await?;

        for guardian in &submission.guardians {
            self.store
                .guardians()
                .create(guardian.to_new(&household_id))
                .await?;
        }
        self.store
            .emergency_contacts()
            .create(submission.emergency_contact.to_new(&household_id))
            .await?;

        let existing = if is_update {
            self.store
                .children()
                .list(&ListQuery::new().eq("household_id", household_id.as_str()))
                .await?
        } else {
            Vec::new()
        };

        let mut children = Vec::with_capacity(submission.children.len());
        for input in &submission.children {
            let child = match find_existing(&existing, input) {
                Some(current) => {
                    self.store
                        .children()
                        .update(&current.id, input.to_patch())
                        .await?
                }
                None => self.store.children().create(input.to_new(&household_id)).await?,
            };
            children.push(child);
        }

        let kept: HashSet<&str> = children.iter().map(|c| c.id.as_str()).collect();
        let mut deactivated = Vec::new();
        for child in existing
            .iter()
            .filter(|c| c.is_active && !kept.contains(c.id.as_str()))
        {
            self.store
                .children()
                .update(&child.id, ChildPatch::deactivate())
                .await?;
            debug!(child_id = %child.id, "Deactivated child missing from submission");
            deactivated.push(child.id.clone());
        }

        let consents = consents_for(submission);
        let mut warnings = Vec::new();
        let mut competitors = Vec::new();
        for (child, input) in children.iter().zip(&submission.children) {
            self.clear_cycle_rows(&child.id, &cycle.id).await?;
            self.store
                .registrations()
                .create(NewRegistration {
                    child_id: child.id.clone(),
                    cycle_id: cycle.id.clone(),
                    status: RegistrationStatus::Active,
                    consents: consents.clone(),
                })
                .await?;

            let competing = self
                .enroll_ministries(child, input, cycle, ministries, &mut warnings)
                .await?;
            if competing {
                competitors.push(child.clone());
            }
        }

        Ok(Written {
            household_id,
            children,
            is_update,
            deactivated,
            competitors,
            warnings,
        })
    }

    /// Create the household, or update it and drop its guardians and contact.
    async fn save_household(&self, submission: &RegistrationSubmission) -> Result<(String, bool)> {
        let input = &submission.household;
        let current = match input.household_id.as_deref() {
            Some(id) => self.store.households().get(id).await?,
            None => None,
        };

        let Some(current) = current else {
            if let Some(id) = input.household_id.as_deref() {
                warn!(household_id = id, "Household not found, creating a new one");
            }
            let created = self.store.households().create(input.to_new()).await?;
            return Ok((created.id, false));
        };

        self.store
            .households()
            .update(&current.id, input.to_patch())
            .await?;

        let by_household = ListQuery::new().eq("household_id", current.id.as_str());
        for guardian in self.store.guardians().list(&by_household).await? {
            self.store.guardians().delete(&guardian.id).await?;
        }
        for contact in self.store.emergency_contacts().list(&by_household).await? {
            self.store.emergency_contacts().delete(&contact.id).await?;
        }
        Ok((current.id, true))
    }

    async fn clear_cycle_rows(&self, child_id: &str, cycle_id: &str) -> Result<()> {
        let query = ListQuery::new()
            .eq("child_id", child_id)
            .eq("cycle_id", cycle_id);
        for registration in self.store.registrations().list(&query).await? {
            self.store.registrations().delete(&registration.id).await?;
        }
        for enrollment in self.store.ministry_enrollments().list(&query).await? {
            self.store.ministry_enrollments().delete(&enrollment.id).await?;
        }
        Ok(())
    }

    /// Write the child's ministry enrollments for the cycle.
    /// Returns whether the competition ministry was among them.
    async fn enroll_ministries(
        &self,
        child: &Child,
        input: &ChildInput,
        cycle: &RegistrationCycle,
        ministries: &[Ministry],
        warnings: &mut Vec<String>,
    ) -> Result<bool> {
        let age = child.age_on(cycle.start_date);
        let mut enrolled: HashSet<&str> = HashSet::new();
        let mut competing = false;

        match find_ministry(ministries, &self.codes.default_program) {
            Some(ministry) => {
                self.create_enrollment(child, input, ministry, &cycle.id, EnrollmentStatus::Enrolled)
                    .await?;
                enrolled.insert(ministry.id.as_str());
            }
            None => {
                warn!(code = %self.codes.default_program, "Default program ministry not configured");
                warnings.push(format!(
                    "Default program ministry '{}' is not configured",
                    self.codes.default_program
                ));
            }
        }

        let selections = input
            .ministry_selections
            .iter()
            .map(|key| (key, false))
            .chain(input.interest_selections.iter().map(|key| (key, true)));

        for (key, interest) in selections {
            let Some(ministry) = find_ministry(ministries, key) else {
                warn!(child_id = %child.id, ministry = %key, "Unknown ministry selected");
                warnings.push(format!("{}: unknown ministry '{}'", child.full_name(), key));
                continue;
            };
            if enrolled.contains(ministry.id.as_str()) {
                continue;
            }
            if !ministry.accepts_age(age) {
                warn!(
                    child_id = %child.id,
                    ministry = %ministry.code,
                    age = ?age,
                    "Child outside ministry age range"
                );
                warnings.push(age_warning(child, ministry, cycle.start_date));
                continue;
            }

            let status = if interest || ministry.is_interest_only() {
                EnrollmentStatus::Interest
            } else {
                EnrollmentStatus::Enrolled
            };
            self.create_enrollment(child, input, ministry, &cycle.id, status)
                .await?;
            enrolled.insert(ministry.id.as_str());

            if ministry.code == self.codes.competition && status == EnrollmentStatus::Enrolled {
                competing = true;
            }
        }
        Ok(competing)
    }

    async fn create_enrollment(
        &self,
        child: &Child,
        input: &ChildInput,
        ministry: &Ministry,
        cycle_id: &str,
        status: EnrollmentStatus,
    ) -> Result<()> {
        let custom_fields = input
            .custom_data
            .iter()
            .filter(|(question, _)| ministry.defines_question(question))
            .map(|(question, answer)| (question.clone(), answer.clone()))
            .collect();
        self.store
            .ministry_enrollments()
            .create(NewMinistryEnrollment {
                child_id: child.id.clone(),
                ministry_id: ministry.id.clone(),
                cycle_id: cycle_id.to_string(),
                status,
                custom_fields,
            })
            .await?;
        Ok(())
    }

    /// Place a child directly into the division matching their grade, or the
    /// one an override pins them to.
    async fn enroll_competition(&self, child: &Child, cycle_id: &str) -> Result<CompetitionStep> {
        let competition = self
            .store
            .competition_cycles()
            .list(&ListQuery::new().eq("cycle_id", cycle_id).eq("is_active", true))
            .await?
            .into_iter()
            .next();
        let Some(competition) = competition else {
            return Ok(CompetitionStep::Skipped(
                "no active competition cycle".to_string(),
            ));
        };

        let divisions = self
            .store
            .divisions()
            .list(&ListQuery::new().eq("competition_cycle_id", competition.id.as_str()))
            .await?;
        let pinned = self
            .store
            .enrollment_overrides()
            .list(
                &ListQuery::new()
                    .eq("competition_cycle_id", competition.id.as_str())
                    .eq("child_id", child.id.as_str()),
            )
            .await?
            .into_iter()
            .max_by_key(|o| o.updated_at);

        let division = match pinned {
            Some(pin) => match divisions.iter().find(|d| d.id == pin.division_id) {
                Some(division) => division,
                None => {
                    return Ok(CompetitionStep::Skipped(format!(
                        "override division {} does not exist",
                        pin.division_id
                    )))
                }
            },
            None => {
                let Some(code) = child.grade_code() else {
                    return Ok(CompetitionStep::Skipped(format!(
                        "grade '{}' is not recognized",
                        child.grade.as_deref().unwrap_or_default()
                    )));
                };
                let matching: Vec<_> = divisions.iter().filter(|d| d.contains_grade(code)).collect();
                match matching.as_slice() {
                    [division] => *division,
                    [] => {
                        return Ok(CompetitionStep::Skipped(format!(
                            "no division for grade code {}",
                            code
                        )))
                    }
                    _ => {
                        return Ok(CompetitionStep::Skipped(format!(
                            "{} divisions overlap grade code {}",
                            matching.len(),
                            code
                        )))
                    }
                }
            }
        };

        let existing = self
            .store
            .enrollments()
            .list(
                &ListQuery::new()
                    .eq("competition_cycle_id", competition.id.as_str())
                    .eq("child_id", child.id.as_str()),
            )
            .await?;
        match existing.first() {
            Some(current) if current.division_id == division.id && !current.auto_enrolled => {
                debug!(child_id = %child.id, division = %division.name, "Competition placement unchanged");
            }
            Some(current) => {
                self.store
                    .enrollments()
                    .update(
                        &current.id,
                        EnrollmentPatch {
                            division_id: Some(division.id.clone()),
                            auto_enrolled: Some(false),
                            enrolled_at: Some(Utc::now()),
                        },
                    )
                    .await?;
            }
            None => {
                self.store
                    .enrollments()
                    .create(NewEnrollment {
                        competition_cycle_id: competition.id.clone(),
                        child_id: child.id.clone(),
                        division_id: division.id.clone(),
                        auto_enrolled: false,
                        enrolled_at: Utc::now(),
                    })
                    .await?;
            }
        }

        if let Err(e) = self.scripture.assign(&competition.id, &child.id).await {
            warn!(child_id = %child.id, error = %e, "Scripture assignment failed");
        }

        Ok(CompetitionStep::Enrolled {
            division: division.name.clone(),
        })
    }
}

fn consents_for(submission: &RegistrationSubmission) -> Vec<Consent> {
    let now = Utc::now();
    submission
        .consents
        .iter()
        .map(|decision| Consent {
            consent_type: decision.consent_type,
            custom_key: decision.custom_key.clone(),
            accepted_at: decision.accepted.then_some(now),
            signer_name: submission.signer_name.clone(),
            text: decision.text.clone(),
        })
        .collect()
}

/// Match by id first, then by name and date of birth.
fn find_existing<'a>(existing: &'a [Child], input: &ChildInput) -> Option<&'a Child> {
    if let Some(id) = input.child_id.as_deref() {
        if let Some(child) = existing.iter().find(|c| c.id == id) {
            return Some(child);
        }
    }
    existing.iter().find(|c| {
        c.first_name.eq_ignore_ascii_case(&input.first_name)
            && c.last_name.eq_ignore_ascii_case(&input.last_name)
            && c.date_of_birth == Some(input.date_of_birth)
    })
}

fn find_ministry<'a>(ministries: &'a [Ministry], key: &str) -> Option<&'a Ministry> {
    ministries.iter().find(|m| m.code == key || m.id == key)
}

fn age_warning(child: &Child, ministry: &Ministry, on: NaiveDate) -> String {
    let age = child
        .age_on(on)
        .map_or_else(|| "unknown".to_string(), |a| a.to_string());
    format!(
        "{} (age {} on {}) is outside the age range for {}",
        child.full_name(),
        age,
        on,
        ministry.name
    )
}
