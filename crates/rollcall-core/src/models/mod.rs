//! Canonical domain model.
//!
//! Every stored entity carries an adapter-generated `id` plus `created_at` /
//! `updated_at` timestamps. Each entity has a draft type (the data supplied on
//! create) and a patch type (the partial data supplied on update); patch
//! fields left `None` are untouched, and nullable fields use `Option<Option<T>>`
//! so that `Some(None)` clears them.
//!
//! - `Household`, `Guardian`, `EmergencyContact`: the family unit
//! - `Child`: a registered child
//! - `RegistrationCycle`, `Registration`, `Consent`: the enrollment period and its paperwork
//! - `Ministry`, `MinistryEnrollment`: programs and who is in them
//! - `CompetitionCycle`, `Division`, `EnrollmentOverride`, `Enrollment`: Bible Bee placement
//! - `Scripture`, `StudentScripture`: memorization assignments
//! - `Attendance`, `Incident`: check-in history kept across household edits

pub mod activity;
pub mod child;
pub mod competition;
pub mod household;
pub mod ministry;
pub mod registration;

pub use activity::{
    Attendance, AttendancePatch, Incident, IncidentPatch, IncidentSeverity, NewAttendance,
    NewIncident,
};
pub use child::{Child, ChildPatch, NewChild};
pub use competition::{
    CompetitionCycle, CompetitionCyclePatch, Division, DivisionPatch, Enrollment,
    EnrollmentOverride, EnrollmentOverridePatch, EnrollmentPatch, NewCompetitionCycle,
    NewDivision, NewEnrollment, NewEnrollmentOverride, NewScripture, NewStudentScripture,
    Scripture, ScripturePatch, ScriptureStatus, StudentScripture, StudentScripturePatch,
};
pub use household::{
    EmergencyContact, EmergencyContactPatch, Guardian, GuardianPatch, Household, HouseholdPatch,
    NewEmergencyContact, NewGuardian, NewHousehold,
};
pub use ministry::{
    CustomQuestion, EnrollmentStatus, EnrollmentType, Ministry, MinistryEnrollment,
    MinistryEnrollmentPatch, MinistryPatch, NewMinistry, NewMinistryEnrollment, QuestionKind,
    TimeSlot,
};
pub use registration::{
    Consent, ConsentType, NewRegistration, NewRegistrationCycle, Registration,
    RegistrationCycle, RegistrationCyclePatch, RegistrationPatch, RegistrationStatus,
};
