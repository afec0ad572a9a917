//! Row types for the remote schema and their conversions to and from the
//! canonical model.
//!
//! Each table has its own primary-key column name, a few columns named
//! differently from the canonical field, and in some cases a legacy column
//! that must be written alongside the canonical one because older readers
//! still use it. On read the canonical column wins and the legacy one is the
//! fallback.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::models::{
    Attendance, Child, CompetitionCycle, Consent, CustomQuestion, Division, EmergencyContact,
    Enrollment, EnrollmentOverride, EnrollmentStatus, EnrollmentType, Guardian, Household,
    Incident, IncidentSeverity, Ministry, MinistryEnrollment, Registration, RegistrationCycle,
    RegistrationStatus, Scripture, ScriptureStatus, StudentScripture, TimeSlot,
};
use crate::storage::Record;

use crate::utils::lenient::{
    lenient_bool, lenient_i32, lenient_opt_bool, lenient_opt_string, lenient_opt_u8, lenient_u32,
    lenient_u8, parse_date,
};

use super::codec::{decode_json, encode_json};

/// A canonical entity stored in a remote table.
pub trait RemoteRecord: Record {
    type Row: Serialize + DeserializeOwned + Send + Sync;

    const TABLE: &'static str;
    const PRIMARY_KEY: &'static str;
    /// (canonical field, column) pairs where the names differ
    const RENAMED: &'static [(&'static str, &'static str)] = &[];
    /// (column, legacy column) pairs written with the same value
    const LEGACY: &'static [(&'static str, &'static str)] = &[];

    fn to_row(&self) -> Result<Self::Row>;
    fn from_row(row: Self::Row) -> Result<Self>;

    /// Column holding a canonical field
    fn column(field: &str) -> &str {
        if field == "id" {
            return Self::PRIMARY_KEY;
        }
        Self::RENAMED
            .iter()
            .find(|(canonical, _)| *canonical == field)
            .map(|(_, column)| *column)
            .unwrap_or(field)
    }

    fn legacy_column(column: &str) -> Option<&'static str> {
        Self::LEGACY
            .iter()
            .find(|(current, _)| *current == column)
            .map(|(_, legacy)| *legacy)
    }
}

/// Older rows may lack `updated_at`; they read as never updated.
fn updated_or_created(created_at: DateTime<Utc>, updated_at: Option<DateTime<Utc>>) -> DateTime<Utc> {
    updated_at.unwrap_or(created_at)
}

// ============================================================================
// Households
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HouseholdRow {
    pub household_id: String,
    pub name: String,
    #[serde(default)]
    pub address_line1: Option<String>,
    #[serde(default)]
    pub address_line2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub zip: Option<String>,
    #[serde(default)]
    pub preferred_scripture_translation: Option<String>,
    #[serde(default, rename = "preferredScriptureTranslation")]
    pub preferred_scripture_translation_legacy: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RemoteRecord for Household {
    type Row = HouseholdRow;
    const TABLE: &'static str = "households";
    const PRIMARY_KEY: &'static str = "household_id";
    const RENAMED: &'static [(&'static str, &'static str)] =
        &[("primary_email", "email"), ("primary_phone", "phone")];
    const LEGACY: &'static [(&'static str, &'static str)] =
        &[("preferred_scripture_translation", "preferredScriptureTranslation")];

    fn to_row(&self) -> Result<HouseholdRow> {
        Ok(HouseholdRow {
            household_id: self.id.clone(),
            name: self.name.clone(),
            address_line1: self.address_line1.clone(),
            address_line2: self.address_line2.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            zip: self.zip.clone(),
            preferred_scripture_translation: self.preferred_scripture_translation.clone(),
            preferred_scripture_translation_legacy: self.preferred_scripture_translation.clone(),
            email: self.primary_email.clone(),
            phone: self.primary_phone.clone(),
            created_at: self.created_at,
            updated_at: Some(self.updated_at),
        })
    }

    fn from_row(row: HouseholdRow) -> Result<Self> {
        Ok(Household {
            id: row.household_id,
            name: row.name,
            address_line1: row.address_line1,
            address_line2: row.address_line2,
            city: row.city,
            state: row.state,
            zip: row.zip,
            preferred_scripture_translation: row
                .preferred_scripture_translation
                .or(row.preferred_scripture_translation_legacy),
            primary_email: row.email,
            primary_phone: row.phone,
            updated_at: updated_or_created(row.created_at, row.updated_at),
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardianRow {
    pub guardian_id: String,
    pub household_id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub mobile_phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub relationship: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RemoteRecord for Guardian {
    type Row = GuardianRow;
    const TABLE: &'static str = "guardians";
    const PRIMARY_KEY: &'static str = "guardian_id";
    const RENAMED: &'static [(&'static str, &'static str)] = &[("phone", "mobile_phone")];

    fn to_row(&self) -> Result<GuardianRow> {
        Ok(GuardianRow {
            guardian_id: self.id.clone(),
            household_id: self.household_id.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            mobile_phone: Some(self.phone.clone()),
            email: self.email.clone(),
            relationship: Some(self.relationship.clone()),
            is_primary: self.is_primary,
            created_at: self.created_at,
            updated_at: Some(self.updated_at),
        })
    }

    fn from_row(row: GuardianRow) -> Result<Self> {
        Ok(Guardian {
            id: row.guardian_id,
            household_id: row.household_id,
            first_name: row.first_name,
            last_name: row.last_name,
            phone: row.mobile_phone.unwrap_or_default(),
            email: row.email,
            relationship: row.relationship.unwrap_or_default(),
            is_primary: row.is_primary,
            updated_at: updated_or_created(row.created_at, row.updated_at),
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyContactRow {
    pub contact_id: String,
    pub household_id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub mobile_phone: Option<String>,
    #[serde(default)]
    pub relationship: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RemoteRecord for EmergencyContact {
    type Row = EmergencyContactRow;
    const TABLE: &'static str = "emergency_contacts";
    const PRIMARY_KEY: &'static str = "contact_id";
    const RENAMED: &'static [(&'static str, &'static str)] = &[("phone", "mobile_phone")];

    fn to_row(&self) -> Result<EmergencyContactRow> {
        Ok(EmergencyContactRow {
            contact_id: self.id.clone(),
            household_id: self.household_id.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            mobile_phone: Some(self.phone.clone()),
            relationship: Some(self.relationship.clone()),
            created_at: self.created_at,
            updated_at: Some(self.updated_at),
        })
    }

    fn from_row(row: EmergencyContactRow) -> Result<Self> {
        Ok(EmergencyContact {
            id: row.contact_id,
            household_id: row.household_id,
            first_name: row.first_name,
            last_name: row.last_name,
            phone: row.mobile_phone.unwrap_or_default(),
            relationship: row.relationship.unwrap_or_default(),
            updated_at: updated_or_created(row.created_at, row.updated_at),
            created_at: row.created_at,
        })
    }
}

// ============================================================================
// Children
// ============================================================================

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildRow {
    pub child_id: String,
    pub household_id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub dob: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub grade: Option<String>,
    #[serde(default)]
    pub allergies: Option<String>,
    #[serde(default)]
    pub medical_notes: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub special_needs: bool,
    #[serde(default = "default_true", deserialize_with = "lenient_bool")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RemoteRecord for Child {
    type Row = ChildRow;
    const TABLE: &'static str = "children";
    const PRIMARY_KEY: &'static str = "child_id";
    const RENAMED: &'static [(&'static str, &'static str)] = &[("date_of_birth", "dob")];

    fn to_row(&self) -> Result<ChildRow> {
        Ok(ChildRow {
            child_id: self.id.clone(),
            household_id: self.household_id.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            dob: self.date_of_birth.map(|d| d.format("%Y-%m-%d").to_string()),
            grade: self.grade.clone(),
            allergies: self.allergies.clone(),
            medical_notes: self.medical_notes.clone(),
            special_needs: self.special_needs,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: Some(self.updated_at),
        })
    }

    fn from_row(row: ChildRow) -> Result<Self> {
        Ok(Child {
            id: row.child_id,
            household_id: row.household_id,
            first_name: row.first_name,
            last_name: row.last_name,
            date_of_birth: parse_date(row.dob.as_deref()),
            grade: row.grade,
            allergies: row.allergies,
            medical_notes: row.medical_notes,
            special_needs: row.special_needs,
            is_active: row.is_active,
            updated_at: updated_or_created(row.created_at, row.updated_at),
            created_at: row.created_at,
        })
    }
}

// ============================================================================
// Registration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationCycleRow {
    pub cycle_id: String,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RemoteRecord for RegistrationCycle {
    type Row = RegistrationCycleRow;
    const TABLE: &'static str = "registration_cycles";
    const PRIMARY_KEY: &'static str = "cycle_id";

    fn to_row(&self) -> Result<RegistrationCycleRow> {
        Ok(RegistrationCycleRow {
            cycle_id: self.id.clone(),
            name: self.name.clone(),
            start_date: self.start_date,
            end_date: self.end_date,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: Some(self.updated_at),
        })
    }

    fn from_row(row: RegistrationCycleRow) -> Result<Self> {
        Ok(RegistrationCycle {
            id: row.cycle_id,
            name: row.name,
            start_date: row.start_date,
            end_date: row.end_date,
            is_active: row.is_active,
            updated_at: updated_or_created(row.created_at, row.updated_at),
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationRow {
    pub registration_id: String,
    pub child_id: String,
    pub cycle_id: String,
    #[serde(default)]
    pub status: RegistrationStatus,
    /// JSON text on write; native JSON tolerated on read
    #[serde(default)]
    pub consents: Option<Value>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RemoteRecord for Registration {
    type Row = RegistrationRow;
    const TABLE: &'static str = "registrations";
    const PRIMARY_KEY: &'static str = "registration_id";

    fn to_row(&self) -> Result<RegistrationRow> {
        Ok(RegistrationRow {
            registration_id: self.id.clone(),
            child_id: self.child_id.clone(),
            cycle_id: self.cycle_id.clone(),
            status: self.status,
            consents: Some(Value::String(encode_json(&self.consents)?)),
            created_at: self.created_at,
            updated_at: Some(self.updated_at),
        })
    }

    fn from_row(row: RegistrationRow) -> Result<Self> {
        let consents: Vec<Consent> = decode_json(Self::KIND, "consents", row.consents)?;
        Ok(Registration {
            id: row.registration_id,
            child_id: row.child_id,
            cycle_id: row.cycle_id,
            status: row.status,
            consents,
            updated_at: updated_or_created(row.created_at, row.updated_at),
            created_at: row.created_at,
        })
    }
}

// ============================================================================
// Ministries
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinistryRow {
    pub ministry_id: String,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_u8")]
    pub min_age: Option<u8>,
    #[serde(default, deserialize_with = "lenient_opt_u8")]
    pub max_age: Option<u8>,
    #[serde(default, deserialize_with = "lenient_opt_u8")]
    pub min_grade: Option<u8>,
    #[serde(default, deserialize_with = "lenient_opt_u8")]
    pub max_grade: Option<u8>,
    #[serde(default)]
    pub enrollment_type: EnrollmentType,
    #[serde(default, deserialize_with = "lenient_opt_bool")]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub custom_questions: Option<Value>,
    #[serde(default)]
    pub time_slots: Option<Value>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RemoteRecord for Ministry {
    type Row = MinistryRow;
    const TABLE: &'static str = "ministries";
    const PRIMARY_KEY: &'static str = "ministry_id";

    fn to_row(&self) -> Result<MinistryRow> {
        Ok(MinistryRow {
            ministry_id: self.id.clone(),
            code: self.code.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            min_age: self.min_age,
            max_age: self.max_age,
            min_grade: self.min_grade,
            max_grade: self.max_grade,
            enrollment_type: self.enrollment_type,
            is_active: Some(self.is_active),
            custom_questions: Some(Value::String(encode_json(&self.custom_questions)?)),
            time_slots: Some(Value::String(encode_json(&self.time_slots)?)),
            created_at: self.created_at,
            updated_at: Some(self.updated_at),
        })
    }

    fn from_row(row: MinistryRow) -> Result<Self> {
        let custom_questions: Vec<CustomQuestion> =
            decode_json(Self::KIND, "custom_questions", row.custom_questions)?;
        let time_slots: Vec<TimeSlot> = decode_json(Self::KIND, "time_slots", row.time_slots)?;
        Ok(Ministry {
            id: row.ministry_id,
            code: row.code,
            name: row.name,
            description: row.description,
            min_age: row.min_age,
            max_age: row.max_age,
            min_grade: row.min_grade,
            max_grade: row.max_grade,
            enrollment_type: row.enrollment_type,
            is_active: row.is_active.unwrap_or(true),
            custom_questions,
            time_slots,
            updated_at: updated_or_created(row.created_at, row.updated_at),
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinistryEnrollmentRow {
    pub enrollment_id: String,
    pub child_id: String,
    pub ministry_id: String,
    pub cycle_id: String,
    #[serde(default)]
    pub status: EnrollmentStatus,
    #[serde(default)]
    pub custom_fields: Option<Value>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RemoteRecord for MinistryEnrollment {
    type Row = MinistryEnrollmentRow;
    const TABLE: &'static str = "ministry_enrollments";
    const PRIMARY_KEY: &'static str = "enrollment_id";

    fn to_row(&self) -> Result<MinistryEnrollmentRow> {
        Ok(MinistryEnrollmentRow {
            enrollment_id: self.id.clone(),
            child_id: self.child_id.clone(),
            ministry_id: self.ministry_id.clone(),
            cycle_id: self.cycle_id.clone(),
            status: self.status,
            custom_fields: Some(Value::String(encode_json(&self.custom_fields)?)),
            created_at: self.created_at,
            updated_at: Some(self.updated_at),
        })
    }

    fn from_row(row: MinistryEnrollmentRow) -> Result<Self> {
        Ok(MinistryEnrollment {
            id: row.enrollment_id,
            child_id: row.child_id,
            ministry_id: row.ministry_id,
            cycle_id: row.cycle_id,
            status: row.status,
            custom_fields: decode_json(Self::KIND, "custom_fields", row.custom_fields)?,
            updated_at: updated_or_created(row.created_at, row.updated_at),
            created_at: row.created_at,
        })
    }
}

// ============================================================================
// Bible Bee
// ============================================================================

/// Competition tables key their cycle as `bible_bee_cycle_id`; older readers
/// still use `year_id`, so both are written.
const COMPETITION_RENAMED: &[(&str, &str)] = &[("competition_cycle_id", "bible_bee_cycle_id")];
const COMPETITION_LEGACY: &[(&str, &str)] = &[("bible_bee_cycle_id", "year_id")];

fn competition_cycle(current: Option<String>, legacy: Option<String>) -> String {
    current.or(legacy).unwrap_or_default()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitionCycleRow {
    pub id: String,
    pub cycle_id: String,
    pub name: String,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RemoteRecord for CompetitionCycle {
    type Row = CompetitionCycleRow;
    const TABLE: &'static str = "bible_bee_cycles";
    const PRIMARY_KEY: &'static str = "id";

    fn to_row(&self) -> Result<CompetitionCycleRow> {
        Ok(CompetitionCycleRow {
            id: self.id.clone(),
            cycle_id: self.cycle_id.clone(),
            name: self.name.clone(),
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: Some(self.updated_at),
        })
    }

    fn from_row(row: CompetitionCycleRow) -> Result<Self> {
        Ok(CompetitionCycle {
            id: row.id,
            cycle_id: row.cycle_id,
            name: row.name,
            is_active: row.is_active,
            updated_at: updated_or_created(row.created_at, row.updated_at),
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DivisionRow {
    pub id: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub bible_bee_cycle_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub year_id: Option<String>,
    pub name: String,
    #[serde(default, deserialize_with = "lenient_u8")]
    pub min_grade: u8,
    #[serde(default, deserialize_with = "lenient_u8")]
    pub max_grade: u8,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub minimum_required: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RemoteRecord for Division {
    type Row = DivisionRow;
    const TABLE: &'static str = "divisions";
    const PRIMARY_KEY: &'static str = "id";
    const RENAMED: &'static [(&'static str, &'static str)] = COMPETITION_RENAMED;
    const LEGACY: &'static [(&'static str, &'static str)] = COMPETITION_LEGACY;

    fn to_row(&self) -> Result<DivisionRow> {
        Ok(DivisionRow {
            id: self.id.clone(),
            bible_bee_cycle_id: Some(self.competition_cycle_id.clone()),
            year_id: Some(self.competition_cycle_id.clone()),
            name: self.name.clone(),
            min_grade: self.min_grade,
            max_grade: self.max_grade,
            minimum_required: self.minimum_required,
            created_at: self.created_at,
            updated_at: Some(self.updated_at),
        })
    }

    fn from_row(row: DivisionRow) -> Result<Self> {
        Ok(Division {
            id: row.id,
            competition_cycle_id: competition_cycle(row.bible_bee_cycle_id, row.year_id),
            name: row.name,
            min_grade: row.min_grade,
            max_grade: row.max_grade,
            minimum_required: row.minimum_required,
            updated_at: updated_or_created(row.created_at, row.updated_at),
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentOverrideRow {
    pub id: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub bible_bee_cycle_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub year_id: Option<String>,
    pub child_id: String,
    pub division_id: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RemoteRecord for EnrollmentOverride {
    type Row = EnrollmentOverrideRow;
    const TABLE: &'static str = "enrollment_overrides";
    const PRIMARY_KEY: &'static str = "id";
    const RENAMED: &'static [(&'static str, &'static str)] = COMPETITION_RENAMED;
    const LEGACY: &'static [(&'static str, &'static str)] = COMPETITION_LEGACY;

    fn to_row(&self) -> Result<EnrollmentOverrideRow> {
        Ok(EnrollmentOverrideRow {
            id: self.id.clone(),
            bible_bee_cycle_id: Some(self.competition_cycle_id.clone()),
            year_id: Some(self.competition_cycle_id.clone()),
            child_id: self.child_id.clone(),
            division_id: self.division_id.clone(),
            reason: self.reason.clone(),
            created_by: self.created_by.clone(),
            created_at: self.created_at,
            updated_at: Some(self.updated_at),
        })
    }

    fn from_row(row: EnrollmentOverrideRow) -> Result<Self> {
        Ok(EnrollmentOverride {
            id: row.id,
            competition_cycle_id: competition_cycle(row.bible_bee_cycle_id, row.year_id),
            child_id: row.child_id,
            division_id: row.division_id,
            reason: row.reason,
            created_by: row.created_by,
            updated_at: updated_or_created(row.created_at, row.updated_at),
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentRow {
    pub id: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub bible_bee_cycle_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub year_id: Option<String>,
    pub child_id: String,
    pub division_id: String,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub auto_enrolled: bool,
    #[serde(default)]
    pub enrolled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RemoteRecord for Enrollment {
    type Row = EnrollmentRow;
    const TABLE: &'static str = "bible_bee_enrollments";
    const PRIMARY_KEY: &'static str = "id";
    const RENAMED: &'static [(&'static str, &'static str)] = COMPETITION_RENAMED;
    const LEGACY: &'static [(&'static str, &'static str)] = COMPETITION_LEGACY;

    fn to_row(&self) -> Result<EnrollmentRow> {
        Ok(EnrollmentRow {
            id: self.id.clone(),
            bible_bee_cycle_id: Some(self.competition_cycle_id.clone()),
            year_id: Some(self.competition_cycle_id.clone()),
            child_id: self.child_id.clone(),
            division_id: self.division_id.clone(),
            auto_enrolled: self.auto_enrolled,
            enrolled_at: Some(self.enrolled_at),
            created_at: self.created_at,
            updated_at: Some(self.updated_at),
        })
    }

    fn from_row(row: EnrollmentRow) -> Result<Self> {
        Ok(Enrollment {
            id: row.id,
            competition_cycle_id: competition_cycle(row.bible_bee_cycle_id, row.year_id),
            child_id: row.child_id,
            division_id: row.division_id,
            auto_enrolled: row.auto_enrolled,
            enrolled_at: row.enrolled_at.unwrap_or(row.created_at),
            updated_at: updated_or_created(row.created_at, row.updated_at),
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptureRow {
    pub id: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub bible_bee_cycle_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub year_id: Option<String>,
    pub reference: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RemoteRecord for Scripture {
    type Row = ScriptureRow;
    const TABLE: &'static str = "scriptures";
    const PRIMARY_KEY: &'static str = "id";
    const RENAMED: &'static [(&'static str, &'static str)] = COMPETITION_RENAMED;
    const LEGACY: &'static [(&'static str, &'static str)] = COMPETITION_LEGACY;

    fn to_row(&self) -> Result<ScriptureRow> {
        Ok(ScriptureRow {
            id: self.id.clone(),
            bible_bee_cycle_id: Some(self.competition_cycle_id.clone()),
            year_id: Some(self.competition_cycle_id.clone()),
            reference: self.reference.clone(),
            text: self.text.clone(),
            sort_order: self.sort_order,
            created_at: self.created_at,
            updated_at: Some(self.updated_at),
        })
    }

    fn from_row(row: ScriptureRow) -> Result<Self> {
        Ok(Scripture {
            id: row.id,
            competition_cycle_id: competition_cycle(row.bible_bee_cycle_id, row.year_id),
            reference: row.reference,
            text: row.text,
            sort_order: row.sort_order,
            updated_at: updated_or_created(row.created_at, row.updated_at),
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentScriptureRow {
    pub id: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub bible_bee_cycle_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub year_id: Option<String>,
    pub child_id: String,
    pub scripture_id: String,
    #[serde(default)]
    pub status: ScriptureStatus,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RemoteRecord for StudentScripture {
    type Row = StudentScriptureRow;
    const TABLE: &'static str = "student_scriptures";
    const PRIMARY_KEY: &'static str = "id";
    const RENAMED: &'static [(&'static str, &'static str)] = COMPETITION_RENAMED;
    const LEGACY: &'static [(&'static str, &'static str)] = COMPETITION_LEGACY;

    fn to_row(&self) -> Result<StudentScriptureRow> {
        Ok(StudentScriptureRow {
            id: self.id.clone(),
            bible_bee_cycle_id: Some(self.competition_cycle_id.clone()),
            year_id: Some(self.competition_cycle_id.clone()),
            child_id: self.child_id.clone(),
            scripture_id: self.scripture_id.clone(),
            status: self.status,
            completed_at: self.completed_at,
            created_at: self.created_at,
            updated_at: Some(self.updated_at),
        })
    }

    fn from_row(row: StudentScriptureRow) -> Result<Self> {
        Ok(StudentScripture {
            id: row.id,
            competition_cycle_id: competition_cycle(row.bible_bee_cycle_id, row.year_id),
            child_id: row.child_id,
            scripture_id: row.scripture_id,
            status: row.status,
            completed_at: row.completed_at,
            updated_at: updated_or_created(row.created_at, row.updated_at),
            created_at: row.created_at,
        })
    }
}

// ============================================================================
// Check-in history
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRow {
    pub attendance_id: String,
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
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RemoteRecord for Attendance {
    type Row = AttendanceRow;
    const TABLE: &'static str = "attendance";
    const PRIMARY_KEY: &'static str = "attendance_id";

    fn to_row(&self) -> Result<AttendanceRow> {
        Ok(AttendanceRow {
            attendance_id: self.id.clone(),
            child_id: self.child_id.clone(),
            event_id: self.event_id.clone(),
            date: self.date,
            timeslot_id: self.timeslot_id.clone(),
            check_in_at: self.check_in_at,
            check_out_at: self.check_out_at,
            picked_up_by: self.picked_up_by.clone(),
            created_at: self.created_at,
            updated_at: Some(self.updated_at),
        })
    }

    fn from_row(row: AttendanceRow) -> Result<Self> {
        Ok(Attendance {
            id: row.attendance_id,
            child_id: row.child_id,
            event_id: row.event_id,
            date: row.date,
            timeslot_id: row.timeslot_id,
            check_in_at: row.check_in_at,
            check_out_at: row.check_out_at,
            picked_up_by: row.picked_up_by,
            updated_at: updated_or_created(row.created_at, row.updated_at),
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentRow {
    pub incident_id: String,
    pub child_id: String,
    #[serde(default)]
    pub child_name: String,
    #[serde(default)]
    pub reported_by: String,
    pub description: String,
    #[serde(default)]
    pub severity: IncidentSeverity,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub admin_acknowledged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RemoteRecord for Incident {
    type Row = IncidentRow;
    const TABLE: &'static str = "incidents";
    const PRIMARY_KEY: &'static str = "incident_id";

    fn to_row(&self) -> Result<IncidentRow> {
        Ok(IncidentRow {
            incident_id: self.id.clone(),
            child_id: self.child_id.clone(),
            child_name: self.child_name.clone(),
            reported_by: self.reported_by.clone(),
            description: self.description.clone(),
            severity: self.severity,
            occurred_at: self.occurred_at,
            admin_acknowledged_at: self.admin_acknowledged_at,
            created_at: self.created_at,
            updated_at: Some(self.updated_at),
        })
    }

    fn from_row(row: IncidentRow) -> Result<Self> {
        Ok(Incident {
            id: row.incident_id,
            child_id: row.child_id,
            child_name: row.child_name,
            reported_by: row.reported_by,
            description: row.description,
            severity: row.severity,
            occurred_at: row.occurred_at,
            admin_acknowledged_at: row.admin_acknowledged_at,
            updated_at: updated_or_created(row.created_at, row.updated_at),
            created_at: row.created_at,
        })
    }
}
