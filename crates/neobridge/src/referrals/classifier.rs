use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::domain::{Locale, ServiceType};
use crate::config::ReferralConfig;

/// Upper bound of the pediatric band: 18 years.
const PEDIATRIC_LIMIT_MONTHS: f64 = 216.0;
const NEONATAL_LIMIT_MONTHS: f64 = 1.0;
/// Advisory calls that may hold blocking threads at once, timed-out ones included.
const ADVISORY_CALLS_IN_FLIGHT: usize = 8;

/// Deterministic age band rule. This is the source of truth for every classification.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceTypeClassifier;

impl ServiceTypeClassifier {
    pub fn classify(age_in_months: f64) -> ServiceType {
        let age = sanitize_age(age_in_months);
        if age < NEONATAL_LIMIT_MONTHS {
            ServiceType::Nicu
        } else if age <= PEDIATRIC_LIMIT_MONTHS {
            ServiceType::Picu
        } else {
            ServiceType::Icu
        }
    }

    /// Fixed justification for a band, used whenever the advisory service cannot be trusted.
    pub fn fallback_justification(service_type: ServiceType, locale: Locale) -> &'static str {
        match (locale, service_type) {
            (Locale::Arabic, ServiceType::Nicu) => {
                "تم التعيين إلى NICU بناءً على العمر (أقل من شهر)."
            }
            (Locale::Arabic, ServiceType::Picu) => {
                "تم التعيين إلى PICU بناءً على العمر (بين شهر و 18 عامًا)."
            }
            (Locale::Arabic, ServiceType::Icu) => {
                "تم التعيين إلى ICU بناءً على العمر (أكبر من 18 عامًا)."
            }
            (Locale::English, ServiceType::Nicu) => {
                "Assigned to NICU based on age (under one month)."
            }
            (Locale::English, ServiceType::Picu) => {
                "Assigned to PICU based on age (between one month and 18 years)."
            }
            (Locale::English, ServiceType::Icu) => {
                "Assigned to ICU based on age (over 18 years)."
            }
        }
    }
}

fn sanitize_age(age_in_months: f64) -> f64 {
    if age_in_months.is_finite() && age_in_months > 0.0 {
        age_in_months
    } else {
        0.0
    }
}

/// Request sent to the advisory classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryRequest {
    pub age_in_months: f64,
}

/// Raw advisory reply. Kept loosely typed so malformed replies can be detected and discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisoryResponse {
    pub service_type: String,
    pub justification: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AdvisoryError {
    #[error("advisory classifier unavailable: {0}")]
    Unavailable(String),
    #[error("advisory classifier returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// External natural-language classifier consulted for a justification string only.
///
/// `advise` runs on tokio's blocking pool. A call that outlives the detector's wait is not
/// interrupted: it keeps its thread until it returns, so implementations should bound their own
/// network timeouts. The detector stops consulting the advisor while the in-flight limit is held
/// by such calls and answers from the age bands instead.
pub trait AdvisoryClassifier: Send + Sync {
    fn advise(&self, request: &AdvisoryRequest) -> Result<AdvisoryResponse, AdvisoryError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentSource {
    Advisory,
    Fallback,
}

/// Classification plus the justification shown to the referring party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceTypeAssessment {
    pub service_type: ServiceType,
    pub justification: String,
    pub source: AssessmentSource,
}

/// Pairs the deterministic rule with an optional advisory classifier under a bounded wait.
#[derive(Clone)]
pub struct ServiceTypeDetector {
    advisor: Option<Arc<dyn AdvisoryClassifier>>,
    timeout: Duration,
    locale: Locale,
    in_flight: Arc<Semaphore>,
}

impl ServiceTypeDetector {
    pub fn new(advisor: Arc<dyn AdvisoryClassifier>, timeout: Duration, locale: Locale) -> Self {
        Self {
            advisor: Some(advisor),
            timeout,
            locale,
            in_flight: Arc::new(Semaphore::new(ADVISORY_CALLS_IN_FLIGHT)),
        }
    }

    /// Replace the number of advisory calls that may be outstanding at once.
    pub fn with_call_limit(mut self, limit: usize) -> Self {
        self.in_flight = Arc::new(Semaphore::new(limit));
        self
    }

    /// Consult `advisor` when one is configured, bounded by the configured wait.
    pub fn from_config(
        advisor: Option<Arc<dyn AdvisoryClassifier>>,
        config: &ReferralConfig,
    ) -> Self {
        match advisor {
            Some(advisor) => Self::new(advisor, config.advisory_timeout, config.locale),
            None => Self::deterministic(config.locale),
        }
    }

    pub fn has_advisor(&self) -> bool {
        self.advisor.is_some()
    }

    /// Detector that always answers from the deterministic rule.
    pub fn deterministic(locale: Locale) -> Self {
        Self {
            advisor: None,
            timeout: Duration::ZERO,
            locale,
            in_flight: Arc::new(Semaphore::new(0)),
        }
    }

    pub async fn detect(&self, age_in_months: f64) -> ServiceTypeAssessment {
        let service_type = ServiceTypeClassifier::classify(age_in_months);

        match self.consult(sanitize_age(age_in_months)).await {
            Some(response) => match accept(&response, service_type) {
                Ok(justification) => ServiceTypeAssessment {
                    service_type,
                    justification,
                    source: AssessmentSource::Advisory,
                },
                Err(reason) => {
                    warn!(
                        %service_type,
                        advised = %response.service_type,
                        reason,
                        "discarding advisory classification"
                    );
                    self.fallback(service_type)
                }
            },
            None => self.fallback(service_type),
        }
    }

    async fn consult(&self, age_in_months: f64) -> Option<AdvisoryResponse> {
        let advisor = self.advisor.clone()?;
        let Ok(permit) = self.in_flight.clone().try_acquire_owned() else {
            warn!("advisory classifier saturated by unfinished calls; using age bands");
            return None;
        };
        let request = AdvisoryRequest { age_in_months };
        let call = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            advisor.advise(&request)
        });

        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(Ok(response))) => Some(response),
            Ok(Ok(Err(err))) => {
                warn!(error = %err, "advisory classifier failed; using age bands");
                None
            }
            Ok(Err(join_error)) => {
                warn!(error = %join_error, "advisory classifier task aborted; using age bands");
                None
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "advisory classifier timed out; using age bands"
                );
                None
            }
        }
    }

    fn fallback(&self, service_type: ServiceType) -> ServiceTypeAssessment {
        debug!(%service_type, "using fallback justification");
        ServiceTypeAssessment {
            service_type,
            justification: ServiceTypeClassifier::fallback_justification(service_type, self.locale)
                .to_string(),
            source: AssessmentSource::Fallback,
        }
    }
}

fn accept(response: &AdvisoryResponse, expected: ServiceType) -> Result<String, &'static str> {
    let advised = ServiceType::parse(&response.service_type).ok_or("unknown service type")?;
    if advised != expected {
        return Err("disagrees with age bands");
    }
    let justification = response.justification.trim();
    if justification.is_empty() {
        return Err("empty justification");
    }
    Ok(justification.to_string())
}
