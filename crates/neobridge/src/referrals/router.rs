use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, warn};

use super::age::calculate_age;
use super::assignment::AssignmentCoordinator;
use super::capacity::HospitalCapacityLedger;
use super::cases::{CaseFilter, CaseLifecycleManager};
use super::classifier::{AssessmentSource, ServiceTypeDetector};
use super::domain::{
    BedCountsUpdate, CaseStatus, CaseSubmission, CaseUpdate, Locale, ServiceType,
};
use super::error::ReferralError;
use super::intake::parse_birth_date;
use super::repository::{CaseRepository, HospitalRepository};
use crate::config::ReferralConfig;

/// Shared handles for the referral endpoints.
pub struct ReferralState<C, H> {
    pub cases: Arc<CaseLifecycleManager<C>>,
    pub ledger: Arc<HospitalCapacityLedger<H>>,
    pub assignments: Arc<AssignmentCoordinator<C, H>>,
    pub detector: Arc<ServiceTypeDetector>,
    pub locale: Locale,
}

impl<C, H> Clone for ReferralState<C, H> {
    fn clone(&self) -> Self {
        Self {
            cases: Arc::clone(&self.cases),
            ledger: Arc::clone(&self.ledger),
            assignments: Arc::clone(&self.assignments),
            detector: Arc::clone(&self.detector),
            locale: self.locale,
        }
    }
}

impl<C, H> ReferralState<C, H>
where
    C: CaseRepository + 'static,
    H: HospitalRepository + 'static,
{
    /// Wire every component over the given stores.
    pub fn build(
        case_store: Arc<C>,
        hospital_store: Arc<H>,
        detector: ServiceTypeDetector,
        config: &ReferralConfig,
    ) -> Self {
        let cases = Arc::new(CaseLifecycleManager::new(case_store));
        let ledger = Arc::new(HospitalCapacityLedger::new(hospital_store, config.locale));
        let assignments = Arc::new(AssignmentCoordinator::new(
            cases.clone(),
            ledger.clone(),
            config.assignment_policy,
        ));

        Self {
            cases,
            ledger,
            assignments,
            detector: Arc::new(detector),
            locale: config.locale,
        }
    }
}

/// Router builder exposing the operator, hospital and referring-party endpoints.
pub fn referral_router<C, H>(state: ReferralState<C, H>) -> Router
where
    C: CaseRepository + 'static,
    H: HospitalRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/cases",
            post(create_case_handler::<C, H>).get(list_cases_handler::<C, H>),
        )
        .route(
            "/api/v1/cases/:case_id",
            get(get_case_handler::<C, H>).patch(update_case_handler::<C, H>),
        )
        .route(
            "/api/v1/cases/:case_id/status",
            get(case_status_handler::<C, H>),
        )
        .route(
            "/api/v1/cases/:case_id/assignment",
            post(assign_case_handler::<C, H>),
        )
        .route("/api/v1/hospitals", get(list_hospitals_handler::<C, H>))
        .route(
            "/api/v1/hospitals/:hospital_id",
            get(get_hospital_handler::<C, H>),
        )
        .route(
            "/api/v1/hospitals/:hospital_id/beds",
            put(update_beds_handler::<C, H>),
        )
        .route(
            "/api/v1/service-type",
            post(detect_service_type_handler::<C, H>),
        )
        .with_state(state)
}

pub(crate) fn error_response(err: ReferralError, locale: Locale) -> Response {
    let status = err.status_code();
    if status.is_server_error() {
        error!(error = %err, kind = err.kind(), "referral request failed");
    } else {
        warn!(error = %err, kind = err.kind(), "referral request rejected");
    }

    let payload = json!({
        "error": err.kind(),
        "message": err.user_message(locale),
    });
    (status, Json(payload)).into_response()
}

/// Unwrap an extracted body, answering malformed JSON with the localized error payload.
fn json_body<T>(
    payload: Result<Json<T>, JsonRejection>,
    locale: Locale,
) -> Result<T, Response> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        error_response(ReferralError::InvalidInput(rejection.body_text()), locale)
    })
}

fn query_params<T>(
    query: Result<Query<T>, QueryRejection>,
    locale: Locale,
) -> Result<T, Response> {
    query.map(|Query(value)| value).map_err(|rejection| {
        error_response(ReferralError::InvalidInput(rejection.body_text()), locale)
    })
}

pub(crate) async fn create_case_handler<C, H>(
    State(state): State<ReferralState<C, H>>,
    payload: Result<Json<CaseSubmission>, JsonRejection>,
) -> Response
where
    C: CaseRepository + 'static,
    H: HospitalRepository + 'static,
{
    let submission = match json_body(payload, state.locale) {
        Ok(submission) => submission,
        Err(response) => return response,
    };
    match state.cases.create(submission) {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(err) => error_response(err, state.locale),
    }
}

/// Raw list query; `all` or an empty value disables a criterion.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ListCasesQuery {
    service_type: Option<String>,
    status: Option<String>,
    search: Option<String>,
}

impl ListCasesQuery {
    fn into_filter(self) -> Result<CaseFilter, ReferralError> {
        fn criterion<T>(
            raw: Option<String>,
            parse: impl Fn(&str) -> Option<T>,
            name: &str,
        ) -> Result<Option<T>, ReferralError> {
            match raw.as_deref().map(str::trim) {
                None | Some("") => Ok(None),
                Some(value) if value.eq_ignore_ascii_case("all") => Ok(None),
                Some(value) => parse(value)
                    .map(Some)
                    .ok_or_else(|| ReferralError::InvalidInput(format!("unknown {name} '{value}'"))),
            }
        }

        Ok(CaseFilter {
            service_type: criterion(self.service_type, ServiceType::parse, "service type")?,
            status: criterion(self.status, CaseStatus::parse, "status")?,
            search: self.search,
        })
    }
}

pub(crate) async fn list_cases_handler<C, H>(
    State(state): State<ReferralState<C, H>>,
    query: Result<Query<ListCasesQuery>, QueryRejection>,
) -> Response
where
    C: CaseRepository + 'static,
    H: HospitalRepository + 'static,
{
    let query = match query_params(query, state.locale) {
        Ok(query) => query,
        Err(response) => return response,
    };
    match query.into_filter() {
        Ok(filter) => (StatusCode::OK, Json(state.cases.list(&filter))).into_response(),
        Err(err) => error_response(err, state.locale),
    }
}

pub(crate) async fn get_case_handler<C, H>(
    State(state): State<ReferralState<C, H>>,
    Path(case_id): Path<String>,
) -> Response
where
    C: CaseRepository + 'static,
    H: HospitalRepository + 'static,
{
    match state.cases.get(&case_id) {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(err) => error_response(err, state.locale),
    }
}

pub(crate) async fn update_case_handler<C, H>(
    State(state): State<ReferralState<C, H>>,
    Path(case_id): Path<String>,
    payload: Result<Json<CaseUpdate>, JsonRejection>,
) -> Response
where
    C: CaseRepository + 'static,
    H: HospitalRepository + 'static,
{
    let update = match json_body(payload, state.locale) {
        Ok(update) => update,
        Err(response) => return response,
    };
    let result = state
        .cases
        .update(&case_id, update)
        .and_then(|()| state.cases.get(&case_id));
    match result {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(err) => error_response(err, state.locale),
    }
}

pub(crate) async fn case_status_handler<C, H>(
    State(state): State<ReferralState<C, H>>,
    Path(case_id): Path<String>,
) -> Response
where
    C: CaseRepository + 'static,
    H: HospitalRepository + 'static,
{
    match state.cases.status(&case_id) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => error_response(err, state.locale),
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssignmentRequest {
    pub hospital_id: String,
    pub assigned_by: String,
}

pub(crate) async fn assign_case_handler<C, H>(
    State(state): State<ReferralState<C, H>>,
    Path(case_id): Path<String>,
    payload: Result<Json<AssignmentRequest>, JsonRejection>,
) -> Response
where
    C: CaseRepository + 'static,
    H: HospitalRepository + 'static,
{
    let request = match json_body(payload, state.locale) {
        Ok(request) => request,
        Err(response) => return response,
    };
    match state
        .assignments
        .assign(&case_id, &request.hospital_id, &request.assigned_by)
    {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(err) => error_response(err, state.locale),
    }
}

pub(crate) async fn list_hospitals_handler<C, H>(
    State(state): State<ReferralState<C, H>>,
) -> Response
where
    C: CaseRepository + 'static,
    H: HospitalRepository + 'static,
{
    (StatusCode::OK, Json(state.ledger.list())).into_response()
}

pub(crate) async fn get_hospital_handler<C, H>(
    State(state): State<ReferralState<C, H>>,
    Path(hospital_id): Path<String>,
) -> Response
where
    C: CaseRepository + 'static,
    H: HospitalRepository + 'static,
{
    match state.ledger.get(&hospital_id) {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(err) => error_response(err, state.locale),
    }
}

pub(crate) async fn update_beds_handler<C, H>(
    State(state): State<ReferralState<C, H>>,
    Path(hospital_id): Path<String>,
    payload: Result<Json<BedCountsUpdate>, JsonRejection>,
) -> Response
where
    C: CaseRepository + 'static,
    H: HospitalRepository + 'static,
{
    let counts = match json_body(payload, state.locale) {
        Ok(counts) => counts,
        Err(response) => return response,
    };
    match state.ledger.update(&hospital_id, counts) {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(err) => error_response(err, state.locale),
    }
}

/// Either a birth date or a precomputed age in months.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct DetectServiceTypeRequest {
    date_of_birth: Option<String>,
    age_in_months: Option<f64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct DetectServiceTypeResponse {
    service_type: ServiceType,
    justification: String,
    source: AssessmentSource,
    age_in_months: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    age_display: Option<String>,
}

pub(crate) async fn detect_service_type_handler<C, H>(
    State(state): State<ReferralState<C, H>>,
    payload: Result<Json<DetectServiceTypeRequest>, JsonRejection>,
) -> Response
where
    C: CaseRepository + 'static,
    H: HospitalRepository + 'static,
{
    let request = match json_body(payload, state.locale) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let (age_in_months, age_display) = match (request.date_of_birth, request.age_in_months) {
        (Some(raw), _) => {
            let today = Utc::now().with_timezone(&Local).date_naive();
            match parse_birth_date(&raw).and_then(|dob| calculate_age(dob, today)) {
                Some(age) => (age.in_months(), Some(age.display(state.locale))),
                None => {
                    return error_response(
                        ReferralError::Validation {
                            field: "date_of_birth",
                        },
                        state.locale,
                    )
                }
            }
        }
        (None, Some(months)) if months.is_finite() && months >= 0.0 => (months, None),
        _ => {
            return error_response(
                ReferralError::InvalidInput("age_in_months or date_of_birth required".into()),
                state.locale,
            )
        }
    };

    let assessment = state.detector.detect(age_in_months).await;
    let payload = DetectServiceTypeResponse {
        service_type: assessment.service_type,
        justification: assessment.justification,
        source: assessment.source,
        age_in_months,
        age_display,
    };
    (StatusCode::OK, Json(payload)).into_response()
}
