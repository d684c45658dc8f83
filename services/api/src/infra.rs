use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use neobridge::config::ReferralConfig;
use neobridge::referrals::{
    AssignmentPolicy, CaseFilter, CaseStatus, InMemoryCaseRepository, InMemoryHospitalRepository,
    Locale, PeriodicRefresh, ReferralState, ServiceTypeDetector,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

pub(crate) type InMemoryReferralState =
    ReferralState<InMemoryCaseRepository, InMemoryHospitalRepository>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Referral components over process-local stores. No advisory classifier is wired in, so
/// service-type justifications come from the age bands.
pub(crate) fn in_memory_referral_state(config: &ReferralConfig) -> InMemoryReferralState {
    ReferralState::build(
        Arc::new(InMemoryCaseRepository::default()),
        Arc::new(InMemoryHospitalRepository::default()),
        ServiceTypeDetector::from_config(None, config),
        config,
    )
}

/// Periodically re-reads the dashboard queries and logs a snapshot.
pub(crate) fn spawn_dashboard_refresh(
    state: InMemoryReferralState,
    config: &ReferralConfig,
) -> PeriodicRefresh {
    PeriodicRefresh::spawn(
        "dashboard",
        config.capacity_refresh_interval,
        move || {
            let cases = state.cases.list(&CaseFilter::default());
            let awaiting = cases
                .iter()
                .filter(|record| record.status != CaseStatus::Assigned)
                .count();
            let hospitals = state.ledger.list();
            let free_beds: u64 = hospitals.iter().map(|record| record.beds.total()).sum();

            info!(
                cases = cases.len(),
                awaiting_assignment = awaiting,
                hospitals = hospitals.len(),
                free_beds,
                "dashboard snapshot refreshed"
            );
        },
    )
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn parse_locale(raw: &str) -> Result<Locale, String> {
    Locale::parse(raw).ok_or_else(|| format!("unsupported locale '{raw}' (expected ar or en)"))
}

pub(crate) fn parse_policy(raw: &str) -> Result<AssignmentPolicy, String> {
    AssignmentPolicy::parse(raw).ok_or_else(|| {
        format!("unsupported assignment policy '{raw}' (expected record-only or reserve-bed)")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use neobridge::referrals::BedCountsUpdate;
    use std::time::Duration;

    #[test]
    fn argument_parsers_accept_known_values() {
        assert_eq!(
            parse_date("2025-02-28"),
            Ok(NaiveDate::from_ymd_opt(2025, 2, 28).expect("valid"))
        );
        assert!(parse_date("28/02/2025").is_err());
        assert_eq!(parse_locale("EN"), Ok(Locale::English));
        assert!(parse_locale("fr").is_err());
        assert_eq!(parse_policy("reserve-bed"), Ok(AssignmentPolicy::ReserveBed));
        assert!(parse_policy("first-come").is_err());
    }

    #[tokio::test]
    async fn dashboard_refresh_runs_against_shared_state() {
        let config = ReferralConfig {
            capacity_refresh_interval: Duration::from_millis(10),
            ..ReferralConfig::default()
        };
        let state = in_memory_referral_state(&config);
        state
            .ledger
            .update(
                "h-1",
                BedCountsUpdate {
                    nicu: 1,
                    picu: 0,
                    icu: 0,
                },
            )
            .expect("seeded");

        let refresh = spawn_dashboard_refresh(state.clone(), &config);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!refresh.is_finished());
        refresh.cancel().await;
    }
}
