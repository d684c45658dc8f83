use std::sync::Arc;
use std::time::Duration;

use axum::response::Response;
use chrono::{DateTime, Days, Local, NaiveDate, Utc};
use serde_json::Value;

use crate::config::ReferralConfig;
use crate::referrals::classifier::{
    AdvisoryClassifier, AdvisoryError, AdvisoryRequest, AdvisoryResponse, ServiceTypeDetector,
};
use crate::referrals::domain::{
    BedCounts, CaseDocument, CaseId, CaseStatus, CaseSubmission, HospitalId, HospitalRecord,
    Locale, ServiceType,
};
use crate::referrals::memory::{InMemoryCaseRepository, InMemoryHospitalRepository};
use crate::referrals::repository::{
    CasePatch, CaseRepository, HospitalRepository, RepositoryError,
};
use crate::referrals::{referral_router, AssignmentPolicy, ReferralState};

pub(super) type MemoryState = ReferralState<InMemoryCaseRepository, InMemoryHospitalRepository>;

pub(super) fn today() -> NaiveDate {
    Utc::now().with_timezone(&Local).date_naive()
}

pub(super) fn days_ago(days: u64) -> NaiveDate {
    today().checked_sub_days(Days::new(days)).expect("valid date")
}

pub(super) fn submission_born(date_of_birth: NaiveDate) -> CaseSubmission {
    CaseSubmission {
        patient_name: "Layla Hassan".to_string(),
        date_of_birth: date_of_birth.format("%Y-%m-%d").to_string(),
        contact_phone: "+966500000001".to_string(),
        other_contact_phone: None,
        contact_email: "family@example.com".to_string(),
        referring_hospital: "King Fahd General".to_string(),
        has_insurance: true,
        medical_report_url: Some("https://files.example.com/report.pdf".to_string()),
        identity_document_url: None,
    }
}

/// Ten-day-old patient, which always classifies as NICU.
pub(super) fn submission() -> CaseSubmission {
    submission_born(days_ago(10))
}

pub(super) fn referral_config(locale: Locale, policy: AssignmentPolicy) -> ReferralConfig {
    ReferralConfig {
        locale,
        assignment_policy: policy,
        ..ReferralConfig::default()
    }
}

pub(super) fn build_state(
    locale: Locale,
    policy: AssignmentPolicy,
) -> (
    MemoryState,
    Arc<InMemoryCaseRepository>,
    Arc<InMemoryHospitalRepository>,
) {
    build_state_with(locale, policy, InMemoryHospitalRepository::default())
}

pub(super) fn build_state_with(
    locale: Locale,
    policy: AssignmentPolicy,
    hospitals: InMemoryHospitalRepository,
) -> (
    MemoryState,
    Arc<InMemoryCaseRepository>,
    Arc<InMemoryHospitalRepository>,
) {
    let case_store = Arc::new(InMemoryCaseRepository::default());
    let hospital_store = Arc::new(hospitals);
    let state = ReferralState::build(
        case_store.clone(),
        hospital_store.clone(),
        ServiceTypeDetector::deterministic(locale),
        &referral_config(locale, policy),
    );
    (state, case_store, hospital_store)
}

/// State over an arbitrary case store and the given hospitals.
pub(super) fn build_state_over<C: CaseRepository + 'static>(
    case_store: Arc<C>,
    policy: AssignmentPolicy,
    hospitals: InMemoryHospitalRepository,
) -> (
    ReferralState<C, InMemoryHospitalRepository>,
    Arc<InMemoryHospitalRepository>,
) {
    let hospital_store = Arc::new(hospitals);
    let state = ReferralState::build(
        case_store,
        hospital_store.clone(),
        ServiceTypeDetector::deterministic(Locale::English),
        &referral_config(Locale::English, policy),
    );
    (state, hospital_store)
}

pub(super) fn router_for(state: MemoryState) -> axum::Router {
    referral_router(state)
}

pub(super) fn hospital(id: &str, name: &str, beds: BedCounts) -> HospitalRecord {
    HospitalRecord {
        id: HospitalId::new(id),
        name: name.to_string(),
        beds,
        last_updated: Utc::now(),
    }
}

/// Complete stored document with a controlled submission time.
pub(super) fn stored_document(
    id: &str,
    patient_name: &str,
    service_type: ServiceType,
    status: CaseStatus,
    submitted_at: DateTime<Utc>,
) -> CaseDocument {
    CaseDocument {
        id: Some(id.to_string()),
        patient_name: Some(patient_name.to_string()),
        date_of_birth: NaiveDate::from_ymd_opt(2020, 5, 17),
        service_type: Some(service_type),
        status: Some(status),
        admin_note: Some(String::new()),
        submitted_at: Some(submitted_at),
        contact_phone: Some("+966500000002".to_string()),
        contact_email: Some("ward@example.com".to_string()),
        referring_hospital: Some("Al Noor".to_string()),
        has_insurance: Some(false),
        ..CaseDocument::default()
    }
}

/// Document missing its birth date, as left behind by an older intake form.
pub(super) fn insert_incomplete_document(store: &InMemoryCaseRepository, id: &str) {
    let document = CaseDocument {
        id: Some(id.to_string()),
        patient_name: Some("Legacy Entry".to_string()),
        service_type: Some(ServiceType::Picu),
        status: Some(CaseStatus::Received),
        submitted_at: Some(Utc::now()),
        ..CaseDocument::default()
    };
    store
        .insert(&CaseId(id.to_string()), document)
        .expect("insert document");
}

pub(super) struct UnavailableCaseRepository;

impl CaseRepository for UnavailableCaseRepository {
    fn insert(&self, _id: &CaseId, _document: CaseDocument) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &CaseId) -> Result<Option<CaseDocument>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn patch(&self, _id: &CaseId, _patch: &CasePatch) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn all(&self) -> Result<Vec<(CaseId, CaseDocument)>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// Reads and inserts work; every case write fails.
#[derive(Default)]
pub(super) struct WriteFailingCaseRepository {
    inner: InMemoryCaseRepository,
}

impl CaseRepository for WriteFailingCaseRepository {
    fn insert(&self, id: &CaseId, document: CaseDocument) -> Result<(), RepositoryError> {
        self.inner.insert(id, document)
    }

    fn fetch(&self, id: &CaseId) -> Result<Option<CaseDocument>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn patch(&self, _id: &CaseId, _patch: &CasePatch) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("write timed out".to_string()))
    }

    fn all(&self) -> Result<Vec<(CaseId, CaseDocument)>, RepositoryError> {
        self.inner.all()
    }
}

/// Reads return the case as it looked before any assignment, as a second operator who loaded it
/// earlier would see it. Writes go to the real store.
#[derive(Default)]
pub(super) struct StaleReadCaseRepository {
    inner: InMemoryCaseRepository,
}

impl CaseRepository for StaleReadCaseRepository {
    fn insert(&self, id: &CaseId, document: CaseDocument) -> Result<(), RepositoryError> {
        self.inner.insert(id, document)
    }

    fn fetch(&self, id: &CaseId) -> Result<Option<CaseDocument>, RepositoryError> {
        Ok(self.inner.fetch(id)?.map(|document| CaseDocument {
            status: Some(CaseStatus::Received),
            assigned_to: None,
            assigned_by: None,
            assigned_at: None,
            ..document
        }))
    }

    fn patch(&self, id: &CaseId, patch: &CasePatch) -> Result<(), RepositoryError> {
        self.inner.patch(id, patch)
    }

    fn all(&self) -> Result<Vec<(CaseId, CaseDocument)>, RepositoryError> {
        self.inner.all()
    }
}

/// Every identifier is already taken.
pub(super) struct SaturatedCaseRepository;

impl CaseRepository for SaturatedCaseRepository {
    fn insert(&self, _id: &CaseId, _document: CaseDocument) -> Result<(), RepositoryError> {
        Err(RepositoryError::Conflict)
    }

    fn fetch(&self, _id: &CaseId) -> Result<Option<CaseDocument>, RepositoryError> {
        Ok(None)
    }

    fn patch(&self, _id: &CaseId, _patch: &CasePatch) -> Result<(), RepositoryError> {
        Err(RepositoryError::NotFound)
    }

    fn all(&self) -> Result<Vec<(CaseId, CaseDocument)>, RepositoryError> {
        Ok(Vec::new())
    }
}

pub(super) struct UnavailableHospitalRepository;

impl HospitalRepository for UnavailableHospitalRepository {
    fn fetch(&self, _id: &HospitalId) -> Result<Option<HospitalRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn insert_if_absent(&self, _record: HospitalRecord) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn overwrite_beds(
        &self,
        _id: &HospitalId,
        _beds: BedCounts,
        _at: DateTime<Utc>,
    ) -> Result<HospitalRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn reserve_bed(
        &self,
        _id: &HospitalId,
        _unit: ServiceType,
        _at: DateTime<Utc>,
    ) -> Result<Option<HospitalRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn release_bed(
        &self,
        _id: &HospitalId,
        _unit: ServiceType,
        _at: DateTime<Utc>,
    ) -> Result<HospitalRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn all(&self) -> Result<Vec<HospitalRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// Scripted advisory classifier.
pub(super) enum StubAdvisor {
    Reply {
        service_type: &'static str,
        justification: &'static str,
    },
    Fail,
    Slow(Duration),
}

impl AdvisoryClassifier for StubAdvisor {
    fn advise(&self, _request: &AdvisoryRequest) -> Result<AdvisoryResponse, AdvisoryError> {
        match self {
            StubAdvisor::Reply {
                service_type,
                justification,
            } => Ok(AdvisoryResponse {
                service_type: service_type.to_string(),
                justification: justification.to_string(),
            }),
            StubAdvisor::Fail => Err(AdvisoryError::Unavailable("connection refused".to_string())),
            StubAdvisor::Slow(delay) => {
                std::thread::sleep(*delay);
                Ok(AdvisoryResponse {
                    service_type: "NICU".to_string(),
                    justification: "late reply".to_string(),
                })
            }
        }
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
