use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};

use super::domain::{BedCounts, BedCountsUpdate, HospitalId, HospitalRecord, Locale};
use super::error::ReferralError;
use super::repository::HospitalRepository;

/// Per-hospital bed counts. Hospitals are provisioned on first access.
pub struct HospitalCapacityLedger<H> {
    repository: Arc<H>,
    locale: Locale,
}

impl<H> HospitalCapacityLedger<H>
where
    H: HospitalRepository + 'static,
{
    pub fn new(repository: Arc<H>, locale: Locale) -> Self {
        Self { repository, locale }
    }

    /// Fetch a hospital, provisioning a zero-bed record when none exists yet.
    pub fn get(&self, hospital_id: &str) -> Result<HospitalRecord, ReferralError> {
        let id = checked_id(hospital_id)?;
        if let Some(record) = self.fetch(&id)? {
            return Ok(record);
        }

        let provisioned = HospitalRecord {
            name: self.default_name(&id),
            id: id.clone(),
            beds: BedCounts::default(),
            last_updated: Utc::now(),
        };
        self.repository
            .insert_if_absent(provisioned)
            .map_err(|err| ReferralError::from_repository(err, || provisioning_failed(&id)))?;

        match self.fetch(&id)? {
            Some(record) => {
                info!(hospital_id = %id, name = %record.name, "provisioned hospital record");
                Ok(record)
            }
            None => Err(provisioning_failed(&id)),
        }
    }

    /// Fetch a hospital without provisioning it.
    pub fn find(&self, hospital_id: &str) -> Result<HospitalRecord, ReferralError> {
        let id = checked_id(hospital_id)?;
        self.fetch(&id)?
            .ok_or_else(|| ReferralError::hospital_not_found(id.0.clone()))
    }

    /// Overwrite all three bed counts. Concurrent writers resolve as last writer wins.
    pub fn update(
        &self,
        hospital_id: &str,
        counts: BedCountsUpdate,
    ) -> Result<HospitalRecord, ReferralError> {
        let beds = counts.validate().map_err(|unit| {
            ReferralError::InvalidInput(format!(
                "{unit} bed count must be between 0 and {}",
                u32::MAX
            ))
        })?;

        let current = self.get(hospital_id)?;
        let updated = self
            .repository
            .overwrite_beds(&current.id, beds, Utc::now())
            .map_err(|err| {
                ReferralError::from_repository(err, || {
                    ReferralError::hospital_not_found(current.id.0.clone())
                })
            })?;

        info!(
            hospital_id = %updated.id,
            nicu = updated.beds.nicu,
            picu = updated.beds.picu,
            icu = updated.beds.icu,
            "hospital bed counts updated"
        );
        Ok(updated)
    }

    /// All hospitals ordered by name. Storage failures degrade to an empty list.
    pub fn list(&self) -> Vec<HospitalRecord> {
        let mut records = match self.repository.all() {
            Ok(records) => records,
            Err(err) => {
                error!(error = %err, "hospital listing unavailable");
                return Vec::new();
            }
        };
        records.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        records
    }

    pub(crate) fn repository(&self) -> &Arc<H> {
        &self.repository
    }

    fn fetch(&self, id: &HospitalId) -> Result<Option<HospitalRecord>, ReferralError> {
        self.repository.fetch(id).map_err(|err| {
            ReferralError::from_repository(err, || ReferralError::hospital_not_found(id.0.clone()))
        })
    }

    fn default_name(&self, id: &HospitalId) -> String {
        match self.locale {
            Locale::Arabic => format!("مستشفى {id}"),
            Locale::English => format!("Hospital {id}"),
        }
    }
}

fn checked_id(raw: &str) -> Result<HospitalId, ReferralError> {
    let id = HospitalId::new(raw);
    if id.as_str().is_empty() {
        return Err(ReferralError::Validation {
            field: "hospital_id",
        });
    }
    Ok(id)
}

fn provisioning_failed(id: &HospitalId) -> ReferralError {
    ReferralError::ProvisioningFailed(id.0.clone())
}
