use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Care-unit category a case is routed to and a hospital reports beds for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceType {
    #[serde(rename = "NICU")]
    Nicu,
    #[serde(rename = "PICU")]
    Picu,
    #[serde(rename = "ICU")]
    Icu,
}

impl ServiceType {
    pub const ALL: [ServiceType; 3] = [ServiceType::Nicu, ServiceType::Picu, ServiceType::Icu];

    pub const fn as_str(self) -> &'static str {
        match self {
            ServiceType::Nicu => "NICU",
            ServiceType::Picu => "PICU",
            ServiceType::Icu => "ICU",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "NICU" => Some(ServiceType::Nicu),
            "PICU" => Some(ServiceType::Picu),
            "ICU" => Some(ServiceType::Icu),
            _ => None,
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator-visible progress of a referral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaseStatus {
    Received,
    Reviewed,
    Admitted,
    Assigned,
}

impl CaseStatus {
    pub const fn label(self) -> &'static str {
        match self {
            CaseStatus::Received => "Received",
            CaseStatus::Reviewed => "Reviewed",
            CaseStatus::Admitted => "Admitted",
            CaseStatus::Assigned => "Assigned",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "received" => Some(CaseStatus::Received),
            "reviewed" => Some(CaseStatus::Reviewed),
            "admitted" => Some(CaseStatus::Admitted),
            "assigned" => Some(CaseStatus::Assigned),
            _ => None,
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Language used for every user-facing string the engine produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    Arabic,
    English,
}

impl Locale {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ar" | "arabic" => Some(Locale::Arabic),
            "en" | "english" => Some(Locale::English),
            _ => None,
        }
    }
}

/// Case identifier, always stored uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CaseId(pub String);

impl CaseId {
    /// Lookup form of a user supplied identifier: trimmed and uppercased.
    pub fn normalize(raw: &str) -> Self {
        CaseId(raw.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hospital identity, derived from the hospital's login principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HospitalId(pub String);

impl HospitalId {
    pub fn new(raw: &str) -> Self {
        HospitalId(raw.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HospitalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw referral form as submitted by the referring party. Missing fields deserialize to empty
/// values so intake validation can name them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseSubmission {
    pub patient_name: String,
    pub date_of_birth: String,
    pub contact_phone: String,
    pub other_contact_phone: Option<String>,
    pub contact_email: String,
    pub referring_hospital: String,
    pub has_insurance: bool,
    pub medical_report_url: Option<String>,
    pub identity_document_url: Option<String>,
}

/// Who a case was bound to, by whom and when. The three values only ever exist together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub assigned_to: String,
    pub assigned_by: String,
    pub assigned_at: DateTime<Utc>,
}

/// Durable record of one referral.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: CaseId,
    pub patient_name: String,
    pub date_of_birth: NaiveDate,
    pub service_type: ServiceType,
    pub status: CaseStatus,
    pub admin_note: String,
    pub submitted_at: DateTime<Utc>,
    pub assignment: Option<Assignment>,
    pub contact_phone: String,
    pub other_contact_phone: Option<String>,
    pub contact_email: String,
    pub referring_hospital: String,
    pub has_insurance: bool,
    pub medical_report_url: Option<String>,
    pub identity_document_url: Option<String>,
}

impl CaseRecord {
    pub fn to_document(&self) -> CaseDocument {
        let (assigned_to, assigned_by, assigned_at) = match &self.assignment {
            Some(assignment) => (
                Some(assignment.assigned_to.clone()),
                Some(assignment.assigned_by.clone()),
                Some(assignment.assigned_at),
            ),
            None => (None, None, None),
        };

        CaseDocument {
            id: Some(self.id.0.clone()),
            patient_name: Some(self.patient_name.clone()),
            date_of_birth: Some(self.date_of_birth),
            service_type: Some(self.service_type),
            status: Some(self.status),
            admin_note: Some(self.admin_note.clone()),
            submitted_at: Some(self.submitted_at),
            assigned_to,
            assigned_by,
            assigned_at,
            contact_phone: Some(self.contact_phone.clone()),
            other_contact_phone: self.other_contact_phone.clone(),
            contact_email: Some(self.contact_email.clone()),
            referring_hospital: Some(self.referring_hospital.clone()),
            has_insurance: Some(self.has_insurance),
            medical_report_url: self.medical_report_url.clone(),
            identity_document_url: self.identity_document_url.clone(),
        }
    }

    pub fn status_view(&self) -> CaseStatusView {
        CaseStatusView {
            case_number: self.id.clone(),
            patient_name: self.patient_name.clone(),
            submitted_at: self.submitted_at,
            service_type: self.service_type,
            status: self.status,
            last_update_note: (!self.admin_note.is_empty()).then(|| self.admin_note.clone()),
            assigned_to: self
                .assignment
                .as_ref()
                .map(|assignment| assignment.assigned_to.clone()),
        }
    }
}

/// Public progress view returned to the referring party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseStatusView {
    pub case_number: CaseId,
    pub patient_name: String,
    pub submitted_at: DateTime<Utc>,
    pub service_type: ServiceType,
    pub status: CaseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
}

/// Schema-less stored form of a case. Every field may be absent; [`CaseDocument::decode`] is
/// the only way back to a [`CaseRecord`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseDocument {
    pub id: Option<String>,
    pub patient_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub service_type: Option<ServiceType>,
    pub status: Option<CaseStatus>,
    pub admin_note: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub assigned_to: Option<String>,
    pub assigned_by: Option<String>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub contact_phone: Option<String>,
    pub other_contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub referring_hospital: Option<String>,
    pub has_insurance: Option<bool>,
    pub medical_report_url: Option<String>,
    pub identity_document_url: Option<String>,
}

/// A stored case document lacked a field the record model requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("stored case document is missing `{field}`")]
pub struct IncompleteDocument {
    pub field: &'static str,
}

impl CaseDocument {
    pub fn decode(self) -> Result<CaseRecord, IncompleteDocument> {
        fn required<T>(value: Option<T>, field: &'static str) -> Result<T, IncompleteDocument> {
            value.ok_or(IncompleteDocument { field })
        }

        let id = required(self.id, "id")?;
        let patient_name = required(
            self.patient_name.filter(|name| !name.trim().is_empty()),
            "patient_name",
        )?;
        let date_of_birth = required(self.date_of_birth, "date_of_birth")?;
        let service_type = required(self.service_type, "service_type")?;
        let status = required(self.status, "status")?;
        let submitted_at = required(self.submitted_at, "submitted_at")?;

        let assignment = match (self.assigned_to, self.assigned_by, self.assigned_at) {
            (None, None, None) => None,
            (Some(assigned_to), Some(assigned_by), Some(assigned_at)) => Some(Assignment {
                assigned_to,
                assigned_by,
                assigned_at,
            }),
            _ => return Err(IncompleteDocument { field: "assignment" }),
        };

        Ok(CaseRecord {
            id: CaseId::normalize(&id),
            patient_name,
            date_of_birth,
            service_type,
            status,
            admin_note: self.admin_note.unwrap_or_default(),
            submitted_at,
            assignment,
            contact_phone: self.contact_phone.unwrap_or_default(),
            other_contact_phone: self.other_contact_phone,
            contact_email: self.contact_email.unwrap_or_default(),
            referring_hospital: self.referring_hospital.unwrap_or_default(),
            has_insurance: self.has_insurance.unwrap_or(false),
            medical_report_url: self.medical_report_url,
            identity_document_url: self.identity_document_url,
        })
    }
}

/// Partial admin update; omitted fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseUpdate {
    pub status: Option<CaseStatus>,
    pub admin_note: Option<String>,
}

impl CaseUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.admin_note.is_none()
    }
}

/// Bed availability per unit type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BedCounts {
    pub nicu: u32,
    pub picu: u32,
    pub icu: u32,
}

impl BedCounts {
    pub fn for_unit(&self, unit: ServiceType) -> u32 {
        match unit {
            ServiceType::Nicu => self.nicu,
            ServiceType::Picu => self.picu,
            ServiceType::Icu => self.icu,
        }
    }

    fn slot(&mut self, unit: ServiceType) -> &mut u32 {
        match unit {
            ServiceType::Nicu => &mut self.nicu,
            ServiceType::Picu => &mut self.picu,
            ServiceType::Icu => &mut self.icu,
        }
    }

    /// Take one bed of `unit`; false when none are free.
    pub fn take(&mut self, unit: ServiceType) -> bool {
        let slot = self.slot(unit);
        if *slot == 0 {
            return false;
        }
        *slot -= 1;
        true
    }

    pub fn give_back(&mut self, unit: ServiceType) {
        let slot = self.slot(unit);
        *slot = slot.saturating_add(1);
    }

    pub fn total(&self) -> u64 {
        u64::from(self.nicu) + u64::from(self.picu) + u64::from(self.icu)
    }
}

/// Signed bed counts as reported by a hospital, validated before they reach a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BedCountsUpdate {
    pub nicu: i64,
    pub picu: i64,
    pub icu: i64,
}

impl BedCountsUpdate {
    /// Returns the counts, or the first unit whose value is negative or out of range.
    pub fn validate(self) -> Result<BedCounts, ServiceType> {
        let convert = |value: i64, unit: ServiceType| u32::try_from(value).map_err(|_| unit);
        Ok(BedCounts {
            nicu: convert(self.nicu, ServiceType::Nicu)?,
            picu: convert(self.picu, ServiceType::Picu)?,
            icu: convert(self.icu, ServiceType::Icu)?,
        })
    }
}

impl From<BedCounts> for BedCountsUpdate {
    fn from(counts: BedCounts) -> Self {
        Self {
            nicu: i64::from(counts.nicu),
            picu: i64::from(counts.picu),
            icu: i64::from(counts.icu),
        }
    }
}

/// A hospital's current capacity snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HospitalRecord {
    pub id: HospitalId,
    pub name: String,
    pub beds: BedCounts,
    pub last_updated: DateTime<Utc>,
}
