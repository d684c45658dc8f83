use std::sync::Mutex;

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::domain::{CaseId, ServiceType};

const SUFFIX_RANGE: std::ops::RangeInclusive<u16> = 1000..=9999;

/// Produces `<SERVICE_TYPE>-<YYYYMMDD>-<NNNN>` identifiers. Uniqueness is left to the store.
pub struct CaseIdGenerator {
    rng: Mutex<StdRng>,
}

impl Default for CaseIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl CaseIdGenerator {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Reproducible sequence, for tests and demos.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn generate(&self, service_type: ServiceType, created_on: NaiveDate) -> CaseId {
        let suffix = {
            let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            rng.gen_range(SUFFIX_RANGE)
        };
        let id = CaseId(format!(
            "{}-{}-{suffix:04}",
            service_type.as_str(),
            created_on.format("%Y%m%d")
        ));
        debug_assert!(is_well_formed(id.as_str()), "malformed case id {id}");
        id
    }
}

/// True when `id` has the persisted `^(NICU|PICU|ICU)-\d{8}-\d{4}$` shape.
pub(crate) fn is_well_formed(id: &str) -> bool {
    let mut parts = id.split('-');
    let (Some(unit), Some(date), Some(suffix), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    let digits = |segment: &str, len: usize| {
        segment.len() == len && segment.bytes().all(|byte| byte.is_ascii_digit())
    };

    matches!(unit, "NICU" | "PICU" | "ICU") && digits(date, 8) && digits(suffix, 4)
}
