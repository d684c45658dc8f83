//! Process-local stores. Each collection lives behind one mutex, so every write to a record
//! happens inside a single critical section.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::domain::{
    BedCounts, CaseDocument, CaseId, HospitalId, HospitalRecord, ServiceType,
};
use super::repository::{CasePatch, CaseRepository, HospitalRepository, RepositoryError};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
}

#[derive(Default)]
struct CaseTable {
    order: Vec<CaseId>,
    documents: HashMap<CaseId, CaseDocument>,
}

#[derive(Default, Clone)]
pub struct InMemoryCaseRepository {
    table: Arc<Mutex<CaseTable>>,
}

impl CaseRepository for InMemoryCaseRepository {
    fn insert(&self, id: &CaseId, document: CaseDocument) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.table)?;
        if guard.documents.contains_key(id) {
            return Err(RepositoryError::Conflict);
        }
        guard.order.push(id.clone());
        guard.documents.insert(id.clone(), document);
        Ok(())
    }

    fn fetch(&self, id: &CaseId) -> Result<Option<CaseDocument>, RepositoryError> {
        let guard = lock(&self.table)?;
        Ok(guard.documents.get(id).cloned())
    }

    fn patch(&self, id: &CaseId, patch: &CasePatch) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.table)?;
        let document = guard
            .documents
            .get_mut(id)
            .ok_or(RepositoryError::NotFound)?;
        if !patch.permits(document) {
            return Err(RepositoryError::Conflict);
        }
        patch.apply_to(document);
        Ok(())
    }

    fn all(&self) -> Result<Vec<(CaseId, CaseDocument)>, RepositoryError> {
        let guard = lock(&self.table)?;
        Ok(guard
            .order
            .iter()
            .filter_map(|id| {
                guard
                    .documents
                    .get(id)
                    .map(|document| (id.clone(), document.clone()))
            })
            .collect())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryHospitalRepository {
    records: Arc<Mutex<HashMap<HospitalId, HospitalRecord>>>,
}

impl InMemoryHospitalRepository {
    /// Store seeded with existing hospitals, e.g. from an onboarding export.
    pub fn with_hospitals(records: impl IntoIterator<Item = HospitalRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();
        Self {
            records: Arc::new(Mutex::new(records)),
        }
    }
}

impl HospitalRepository for InMemoryHospitalRepository {
    fn fetch(&self, id: &HospitalId) -> Result<Option<HospitalRecord>, RepositoryError> {
        let guard = lock(&self.records)?;
        Ok(guard.get(id).cloned())
    }

    fn insert_if_absent(&self, record: HospitalRecord) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.records)?;
        guard.entry(record.id.clone()).or_insert(record);
        Ok(())
    }

    fn overwrite_beds(
        &self,
        id: &HospitalId,
        beds: BedCounts,
        at: DateTime<Utc>,
    ) -> Result<HospitalRecord, RepositoryError> {
        let mut guard = lock(&self.records)?;
        let record = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        record.beds = beds;
        record.last_updated = at;
        Ok(record.clone())
    }

    fn reserve_bed(
        &self,
        id: &HospitalId,
        unit: ServiceType,
        at: DateTime<Utc>,
    ) -> Result<Option<HospitalRecord>, RepositoryError> {
        let mut guard = lock(&self.records)?;
        let record = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if !record.beds.take(unit) {
            return Ok(None);
        }
        record.last_updated = at;
        Ok(Some(record.clone()))
    }

    fn release_bed(
        &self,
        id: &HospitalId,
        unit: ServiceType,
        at: DateTime<Utc>,
    ) -> Result<HospitalRecord, RepositoryError> {
        let mut guard = lock(&self.records)?;
        let record = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        record.beds.give_back(unit);
        record.last_updated = at;
        Ok(record.clone())
    }

    fn all(&self) -> Result<Vec<HospitalRecord>, RepositoryError> {
        let guard = lock(&self.records)?;
        Ok(guard.values().cloned().collect())
    }
}
