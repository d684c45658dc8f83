use std::sync::Arc;

use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::classifier::ServiceTypeClassifier;
use super::domain::{
    CaseId, CaseRecord, CaseStatus, CaseStatusView, CaseSubmission, CaseUpdate, ServiceType,
};
use super::error::ReferralError;
use super::identifier::CaseIdGenerator;
use super::intake::IntakeGuard;
use super::repository::{CasePatch, CaseRepository, RepositoryError};

/// Attempts at finding an unused identifier before giving up.
pub const MAX_ID_ATTEMPTS: usize = 16;

/// Optional criteria for listing cases; all supplied criteria must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseFilter {
    pub service_type: Option<ServiceType>,
    pub status: Option<CaseStatus>,
    pub search: Option<String>,
}

impl CaseFilter {
    pub fn matches(&self, record: &CaseRecord) -> bool {
        if self.service_type.is_some_and(|unit| unit != record.service_type) {
            return false;
        }
        if self.status.is_some_and(|status| status != record.status) {
            return false;
        }

        let query = match self.search.as_deref().map(str::trim) {
            Some(query) if !query.is_empty() => query.to_lowercase(),
            _ => return true,
        };

        record.id.as_str().to_lowercase().contains(&query)
            || record.patient_name.to_lowercase().contains(&query)
            || record
                .submitted_at
                .with_timezone(&Local)
                .format("%Y-%m-%d")
                .to_string()
                .contains(&query)
    }
}

/// Owns case creation, admin field updates and queries.
pub struct CaseLifecycleManager<C> {
    repository: Arc<C>,
    generator: Arc<CaseIdGenerator>,
    guard: IntakeGuard,
}

impl<C> CaseLifecycleManager<C>
where
    C: CaseRepository + 'static,
{
    pub fn new(repository: Arc<C>) -> Self {
        Self::with_generator(repository, Arc::new(CaseIdGenerator::new()))
    }

    pub fn with_generator(repository: Arc<C>, generator: Arc<CaseIdGenerator>) -> Self {
        Self {
            repository,
            generator,
            guard: IntakeGuard,
        }
    }

    /// Validate, classify and persist a new referral with status `Received`.
    pub fn create(&self, submission: CaseSubmission) -> Result<CaseRecord, ReferralError> {
        let submitted_at = Utc::now();
        let today = submitted_at.with_timezone(&Local).date_naive();

        let validated = self.guard.validate(submission, today)?;
        let service_type = ServiceTypeClassifier::classify(validated.age.in_months());

        let mut record = CaseRecord {
            id: CaseId(String::new()),
            patient_name: validated.patient_name,
            date_of_birth: validated.date_of_birth,
            service_type,
            status: CaseStatus::Received,
            admin_note: String::new(),
            submitted_at,
            assignment: None,
            contact_phone: validated.contact_phone,
            other_contact_phone: validated.other_contact_phone,
            contact_email: validated.contact_email,
            referring_hospital: validated.referring_hospital,
            has_insurance: validated.has_insurance,
            medical_report_url: validated.medical_report_url,
            identity_document_url: validated.identity_document_url,
        };

        for attempt in 1..=MAX_ID_ATTEMPTS {
            record.id = self.generator.generate(service_type, today);
            match self.repository.insert(&record.id, record.to_document()) {
                Ok(()) => {
                    info!(case_id = %record.id, %service_type, "case received");
                    return Ok(record);
                }
                Err(RepositoryError::Conflict) => {
                    debug!(case_id = %record.id, attempt, "case id collision; regenerating");
                }
                Err(err) => {
                    return Err(ReferralError::from_repository(err, || {
                        ReferralError::BackendUnavailable("case store rejected insert".into())
                    }))
                }
            }
        }

        warn!(%service_type, %today, "case identifier space exhausted");
        Err(ReferralError::IdSpaceExhausted {
            attempts: MAX_ID_ATTEMPTS,
        })
    }

    /// Apply the supplied fields only. An empty update succeeds without touching storage.
    ///
    /// Status is taken as given; no transition rules are enforced here.
    pub fn update(&self, case_id: &str, update: CaseUpdate) -> Result<(), ReferralError> {
        if update.is_empty() {
            return Ok(());
        }

        let id = CaseId::normalize(case_id);
        let patch = CasePatch {
            status: update.status,
            admin_note: update.admin_note,
            ..CasePatch::default()
        };
        self.repository.patch(&id, &patch).map_err(|err| {
            ReferralError::from_repository(err, || ReferralError::case_not_found(id.0.clone()))
        })?;

        info!(case_id = %id, status = ?patch.status, "case updated");
        Ok(())
    }

    pub fn get(&self, case_id: &str) -> Result<CaseRecord, ReferralError> {
        let id = CaseId::normalize(case_id);
        if id.as_str().is_empty() {
            return Err(ReferralError::case_not_found(id.0));
        }

        let document = self
            .repository
            .fetch(&id)
            .map_err(|err| {
                ReferralError::from_repository(err, || ReferralError::case_not_found(id.0.clone()))
            })?
            .ok_or_else(|| ReferralError::case_not_found(id.0.clone()))?;

        document.decode().map_err(|defect| {
            warn!(case_id = %id, field = defect.field, "stored case is incomplete");
            ReferralError::IncompleteRecord {
                id: id.0.clone(),
                field: defect.field,
            }
        })
    }

    /// Public progress view for the referring party.
    pub fn status(&self, case_id: &str) -> Result<CaseStatusView, ReferralError> {
        self.get(case_id).map(|record| record.status_view())
    }

    /// Matching cases, newest first; equal timestamps keep insertion order.
    ///
    /// Undecodable documents are skipped and an unavailable store yields an empty list.
    pub fn list(&self, filter: &CaseFilter) -> Vec<CaseRecord> {
        let documents = match self.repository.all() {
            Ok(documents) => documents,
            Err(err) => {
                error!(error = %err, "case listing unavailable");
                return Vec::new();
            }
        };

        let mut records: Vec<CaseRecord> = documents
            .into_iter()
            .filter_map(|(id, document)| match document.decode() {
                Ok(record) => Some(record),
                Err(defect) => {
                    warn!(case_id = %id, field = defect.field, "skipping incomplete case");
                    None
                }
            })
            .filter(|record| filter.matches(record))
            .collect();

        records.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        records
    }

    pub(crate) fn repository(&self) -> &Arc<C> {
        &self.repository
    }
}
