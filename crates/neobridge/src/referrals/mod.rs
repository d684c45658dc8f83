//! Referral intake, case lifecycle, hospital bed capacity and case assignment.
//!
//! Components are composed leaf-first: the age arithmetic and service-type classifier feed case
//! creation, the capacity ledger owns hospital records, and the assignment coordinator binds the
//! two together. Storage is reached only through the traits in [`repository`], so every
//! component receives its store handle explicitly.

pub mod age;
pub mod assignment;
pub mod capacity;
pub mod cases;
pub mod classifier;
pub mod domain;
pub mod error;
pub mod identifier;
pub(crate) mod intake;
pub mod memory;
pub mod refresh;
pub mod repository;
pub mod router;

#[cfg(test)]
mod tests;

pub use age::{calculate_age, AgeBreakdown};
pub use assignment::{AssignmentCoordinator, AssignmentPolicy};
pub use capacity::HospitalCapacityLedger;
pub use cases::{CaseFilter, CaseLifecycleManager};
pub use classifier::{
    AdvisoryClassifier, AdvisoryError, AdvisoryRequest, AdvisoryResponse, AssessmentSource,
    ServiceTypeAssessment, ServiceTypeClassifier, ServiceTypeDetector,
};
pub use domain::{
    Assignment, BedCounts, BedCountsUpdate, CaseDocument, CaseId, CaseRecord, CaseStatus,
    CaseStatusView, CaseSubmission, CaseUpdate, HospitalId, HospitalRecord, Locale, ServiceType,
};
pub use error::ReferralError;
pub use identifier::CaseIdGenerator;
pub use memory::{InMemoryCaseRepository, InMemoryHospitalRepository};
pub use refresh::PeriodicRefresh;
pub use repository::{CasePatch, CaseRepository, HospitalRepository, RepositoryError};
pub use router::{referral_router, ReferralState};
