use chrono::{DateTime, Utc};

use super::domain::{
    Assignment, BedCounts, CaseDocument, CaseId, CaseStatus, HospitalId, HospitalRecord,
    ServiceType,
};

/// Field changes applied to one stored case as a single atomic write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CasePatch {
    pub status: Option<CaseStatus>,
    pub admin_note: Option<String>,
    pub assignment: Option<Assignment>,
    /// Refuse the write with `Conflict` when the stored case already carries an assignment.
    pub require_unassigned: bool,
}

impl CasePatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.admin_note.is_none() && self.assignment.is_none()
    }

    /// Whether `document` satisfies the patch's precondition.
    pub fn permits(&self, document: &CaseDocument) -> bool {
        !self.require_unassigned
            || (document.assigned_to.is_none()
                && document.assigned_by.is_none()
                && document.assigned_at.is_none())
    }

    /// Apply to a stored document. Assignment fields are written together or not at all.
    pub fn apply_to(&self, document: &mut CaseDocument) {
        if let Some(status) = self.status {
            document.status = Some(status);
        }
        if let Some(note) = &self.admin_note {
            document.admin_note = Some(note.clone());
        }
        if let Some(assignment) = &self.assignment {
            document.assigned_to = Some(assignment.assigned_to.clone());
            document.assigned_by = Some(assignment.assigned_by.clone());
            document.assigned_at = Some(assignment.assigned_at);
        }
    }
}

/// Case storage. Implementations serialize writes per record.
pub trait CaseRepository: Send + Sync {
    /// Store a new document; `Conflict` if the id is taken.
    fn insert(&self, id: &CaseId, document: CaseDocument) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &CaseId) -> Result<Option<CaseDocument>, RepositoryError>;
    /// Apply `patch` atomically; `NotFound` if the id is unknown, `Conflict` if the stored
    /// document fails [`CasePatch::permits`]. The check and the write share one critical section.
    fn patch(&self, id: &CaseId, patch: &CasePatch) -> Result<(), RepositoryError>;
    /// Every stored document in insertion order.
    fn all(&self) -> Result<Vec<(CaseId, CaseDocument)>, RepositoryError>;
}

/// Hospital storage. Implementations serialize writes per record.
pub trait HospitalRepository: Send + Sync {
    fn fetch(&self, id: &HospitalId) -> Result<Option<HospitalRecord>, RepositoryError>;
    /// Store `record` only if no record with its id exists; an existing record is kept as is.
    fn insert_if_absent(&self, record: HospitalRecord) -> Result<(), RepositoryError>;
    /// Overwrite all bed counts; `NotFound` if the id is unknown.
    fn overwrite_beds(
        &self,
        id: &HospitalId,
        beds: BedCounts,
        at: DateTime<Utc>,
    ) -> Result<HospitalRecord, RepositoryError>;
    /// Take one free bed of `unit`. `Ok(None)` when the hospital has none left.
    fn reserve_bed(
        &self,
        id: &HospitalId,
        unit: ServiceType,
        at: DateTime<Utc>,
    ) -> Result<Option<HospitalRecord>, RepositoryError>;
    /// Undo a reservation.
    fn release_bed(
        &self,
        id: &HospitalId,
        unit: ServiceType,
        at: DateTime<Utc>,
    ) -> Result<HospitalRecord, RepositoryError>;
    fn all(&self) -> Result<Vec<HospitalRecord>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
