use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::capacity::HospitalCapacityLedger;
use super::cases::CaseLifecycleManager;
use super::domain::{Assignment, CaseRecord, CaseStatus, HospitalId};
use super::error::ReferralError;
use super::repository::{CasePatch, CaseRepository, HospitalRepository, RepositoryError};

/// How an assignment interacts with the hospital's bed counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssignmentPolicy {
    /// Record the assignment only; bed counts stay as the hospital reported them.
    #[default]
    RecordOnly,
    /// Take one bed of the case's unit type before recording the assignment.
    ReserveBed,
}

impl AssignmentPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "record-only" | "record_only" => Some(AssignmentPolicy::RecordOnly),
            "reserve-bed" | "reserve_bed" => Some(AssignmentPolicy::ReserveBed),
            _ => None,
        }
    }
}

/// Binds cases to hospitals.
pub struct AssignmentCoordinator<C, H> {
    cases: Arc<CaseLifecycleManager<C>>,
    ledger: Arc<HospitalCapacityLedger<H>>,
    policy: AssignmentPolicy,
}

impl<C, H> AssignmentCoordinator<C, H>
where
    C: CaseRepository + 'static,
    H: HospitalRepository + 'static,
{
    pub fn new(
        cases: Arc<CaseLifecycleManager<C>>,
        ledger: Arc<HospitalCapacityLedger<H>>,
        policy: AssignmentPolicy,
    ) -> Self {
        Self {
            cases,
            ledger,
            policy,
        }
    }

    pub fn policy(&self) -> AssignmentPolicy {
        self.policy
    }

    /// Mark the case `Assigned` to `hospital_id` on behalf of `actor`.
    ///
    /// Status and the three assignment fields are written as one patch. Unknown hospitals are
    /// not provisioned here. Under [`AssignmentPolicy::ReserveBed`] the write only lands if the
    /// stored case is still unassigned; a case assigned concurrently after the bed was taken
    /// gets the bed back and fails with `AlreadyAssigned`.
    pub fn assign(
        &self,
        case_id: &str,
        hospital_id: &str,
        actor: &str,
    ) -> Result<CaseRecord, ReferralError> {
        let actor = actor.trim();
        if actor.is_empty() {
            return Err(ReferralError::Validation {
                field: "assigned_by",
            });
        }

        let hospital = self.ledger.find(hospital_id)?;
        let mut record = self.cases.get(case_id)?;

        let assigned_at = Utc::now();
        let reserved = match self.policy {
            AssignmentPolicy::RecordOnly => false,
            AssignmentPolicy::ReserveBed => {
                if record.assignment.is_some() {
                    return Err(ReferralError::AlreadyAssigned(record.id.0.clone()));
                }
                let taken = self
                    .ledger
                    .repository()
                    .reserve_bed(&hospital.id, record.service_type, assigned_at)
                    .map_err(|err| {
                        ReferralError::from_repository(err, || {
                            ReferralError::hospital_not_found(hospital.id.0.clone())
                        })
                    })?;
                if taken.is_none() {
                    return Err(ReferralError::NoCapacity {
                        hospital: hospital.id.0.clone(),
                        unit: record.service_type,
                    });
                }
                true
            }
        };

        let assignment = Assignment {
            assigned_to: hospital.name.clone(),
            assigned_by: actor.to_string(),
            assigned_at,
        };
        let patch = CasePatch {
            status: Some(CaseStatus::Assigned),
            admin_note: None,
            assignment: Some(assignment.clone()),
            require_unassigned: reserved,
        };

        if let Err(err) = self.cases.repository().patch(&record.id, &patch) {
            if reserved {
                self.release(&record, &hospital.id);
            }
            let id = record.id.0.clone();
            return Err(match err {
                RepositoryError::Conflict if reserved => ReferralError::AlreadyAssigned(id),
                other => {
                    ReferralError::from_repository(other, || ReferralError::case_not_found(id))
                }
            });
        }

        info!(
            case_id = %record.id,
            hospital_id = %hospital.id,
            assigned_by = actor,
            policy = ?self.policy,
            "case assigned"
        );

        record.status = CaseStatus::Assigned;
        record.assignment = Some(assignment);
        Ok(record)
    }

    fn release(&self, record: &CaseRecord, hospital_id: &HospitalId) {
        let released =
            self.ledger
                .repository()
                .release_bed(hospital_id, record.service_type, Utc::now());
        if let Err(err) = released {
            error!(
                case_id = %record.id,
                %hospital_id,
                error = %err,
                "failed to release reserved bed after aborted assignment"
            );
        }
    }
}
