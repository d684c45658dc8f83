use super::common::*;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::referrals::classifier::ServiceTypeDetector;
use crate::referrals::domain::{BedCounts, Locale};
use crate::referrals::memory::InMemoryHospitalRepository;
use crate::referrals::router::{get_case_handler, list_hospitals_handler};
use crate::referrals::{AssignmentPolicy, ReferralState};

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn create_route_returns_created_record() {
    let (state, _, _) = build_state(Locale::Arabic, AssignmentPolicy::RecordOnly);
    let router = router_for(state);

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/api/v1/cases",
            serde_json::to_value(submission()).unwrap(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["service_type"], "NICU");
    assert_eq!(payload["status"], "Received");
    assert!(payload["id"].as_str().unwrap().starts_with("NICU-"));
}

#[tokio::test]
async fn create_route_reports_invalid_field_in_arabic_by_default() {
    let (state, _, _) = build_state(Locale::Arabic, AssignmentPolicy::RecordOnly);
    let router = router_for(state);
    let mut incomplete = submission();
    incomplete.contact_phone.clear();

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/api/v1/cases",
            serde_json::to_value(incomplete).unwrap(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], "validation_error");
    assert!(payload["message"]
        .as_str()
        .unwrap()
        .contains("رقم هاتف التواصل"));
}

#[tokio::test]
async fn status_route_returns_public_view() {
    let (state, _, _) = build_state(Locale::English, AssignmentPolicy::RecordOnly);
    let record = state.cases.create(submission()).expect("case created");
    let router = router_for(state);

    let uri = format!(
        "/api/v1/cases/{}/status",
        record.id.as_str().to_lowercase()
    );
    let response = router.oneshot(get_request(&uri)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["case_number"], record.id.as_str());
    assert_eq!(payload["status"], "Received");
    assert!(payload.get("assigned_to").is_none());
    assert!(payload.get("contact_phone").is_none());
}

#[tokio::test]
async fn unknown_case_is_not_found_with_localized_message() {
    let (state, _, _) = build_state(Locale::English, AssignmentPolicy::RecordOnly);
    let router = router_for(state);

    let response = router
        .oneshot(get_request("/api/v1/cases/NICU-20250101-9999"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], "not_found");
    assert!(payload["message"]
        .as_str()
        .unwrap()
        .starts_with("No case was found"));
}

#[tokio::test]
async fn patch_route_returns_updated_record() {
    let (state, _, _) = build_state(Locale::Arabic, AssignmentPolicy::RecordOnly);
    let record = state.cases.create(submission()).expect("case created");
    let router = router_for(state);

    let response = router
        .oneshot(json_request(
            Method::PATCH,
            &format!("/api/v1/cases/{}", record.id),
            json!({ "status": "Reviewed", "admin_note": "Reviewed by on-call" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], "Reviewed");
    assert_eq!(payload["admin_note"], "Reviewed by on-call");
}

#[tokio::test]
async fn list_route_filters_and_rejects_unknown_criteria() {
    let (state, _, _) = build_state(Locale::Arabic, AssignmentPolicy::RecordOnly);
    state.cases.create(submission()).expect("case created");

    let all = router_for(state.clone())
        .oneshot(get_request("/api/v1/cases?service_type=all&status=received"))
        .await
        .unwrap();
    assert_eq!(all.status(), StatusCode::OK);
    assert_eq!(read_json_body(all).await.as_array().unwrap().len(), 1);

    let none = router_for(state.clone())
        .oneshot(get_request("/api/v1/cases?service_type=ICU"))
        .await
        .unwrap();
    assert_eq!(none.status(), StatusCode::OK);
    assert!(read_json_body(none).await.as_array().unwrap().is_empty());

    let invalid = router_for(state)
        .oneshot(get_request("/api/v1/cases?status=closed"))
        .await
        .unwrap();
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json_body(invalid).await["error"], "invalid_input");
}

#[tokio::test]
async fn hospital_routes_provision_and_update_counts() {
    let (state, _, _) = build_state(Locale::English, AssignmentPolicy::RecordOnly);

    let provisioned = router_for(state.clone())
        .oneshot(get_request("/api/v1/hospitals/h-7"))
        .await
        .unwrap();
    assert_eq!(provisioned.status(), StatusCode::OK);
    let payload = read_json_body(provisioned).await;
    assert_eq!(payload["name"], "Hospital h-7");
    assert_eq!(payload["beds"], json!({ "nicu": 0, "picu": 0, "icu": 0 }));

    let rejected = router_for(state.clone())
        .oneshot(json_request(
            Method::PUT,
            "/api/v1/hospitals/h-7/beds",
            json!({ "nicu": -1, "picu": 0, "icu": 0 }),
        ))
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);

    let updated = router_for(state.clone())
        .oneshot(json_request(
            Method::PUT,
            "/api/v1/hospitals/h-7/beds",
            json!({ "nicu": 3, "picu": 1, "icu": 0 }),
        ))
        .await
        .unwrap();
    assert_eq!(updated.status(), StatusCode::OK);
    assert_eq!(read_json_body(updated).await["beds"]["nicu"], 3);

    let listed = router_for(state)
        .oneshot(get_request("/api/v1/hospitals"))
        .await
        .unwrap();
    assert_eq!(read_json_body(listed).await.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn assignment_route_binds_case_to_known_hospital() {
    let hospitals = InMemoryHospitalRepository::with_hospitals([hospital(
        "h-1",
        "Al Noor",
        BedCounts::default(),
    )]);
    let (state, _, _) = build_state_with(Locale::Arabic, AssignmentPolicy::RecordOnly, hospitals);
    let record = state.cases.create(submission()).expect("case created");

    let unknown = router_for(state.clone())
        .oneshot(json_request(
            Method::POST,
            &format!("/api/v1/cases/{}/assignment", record.id),
            json!({ "hospital_id": "h-404", "assigned_by": "operator" }),
        ))
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    let assigned = router_for(state)
        .oneshot(json_request(
            Method::POST,
            &format!("/api/v1/cases/{}/assignment", record.id),
            json!({ "hospital_id": "h-1", "assigned_by": "operator" }),
        ))
        .await
        .unwrap();
    assert_eq!(assigned.status(), StatusCode::OK);
    let payload = read_json_body(assigned).await;
    assert_eq!(payload["status"], "Assigned");
    assert_eq!(payload["assignment"]["assigned_to"], "Al Noor");
}

#[tokio::test]
async fn service_type_route_accepts_birth_date_or_months() {
    let (state, _, _) = build_state(Locale::English, AssignmentPolicy::RecordOnly);

    let from_birth = router_for(state.clone())
        .oneshot(json_request(
            Method::POST,
            "/api/v1/service-type",
            json!({ "date_of_birth": days_ago(10).format("%Y-%m-%d").to_string() }),
        ))
        .await
        .unwrap();
    assert_eq!(from_birth.status(), StatusCode::OK);
    let payload = read_json_body(from_birth).await;
    assert_eq!(payload["service_type"], "NICU");
    assert_eq!(payload["source"], "fallback");
    assert_eq!(payload["age_display"], "10 days");

    let from_months = router_for(state.clone())
        .oneshot(json_request(
            Method::POST,
            "/api/v1/service-type",
            json!({ "age_in_months": 240.0 }),
        ))
        .await
        .unwrap();
    let payload = read_json_body(from_months).await;
    assert_eq!(payload["service_type"], "ICU");
    assert!(payload.get("age_display").is_none());

    let missing = router_for(state)
        .oneshot(json_request(Method::POST, "/api/v1/service-type", json!({})))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn handlers_report_unavailable_backends() {
    let state = ReferralState::build(
        Arc::new(UnavailableCaseRepository),
        Arc::new(UnavailableHospitalRepository),
        ServiceTypeDetector::deterministic(Locale::Arabic),
        &referral_config(Locale::Arabic, AssignmentPolicy::RecordOnly),
    );

    let response = get_case_handler::<UnavailableCaseRepository, UnavailableHospitalRepository>(
        State(state.clone()),
        Path("NICU-20250101-1234".to_string()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(read_json_body(response).await["error"], "backend_unavailable");

    let listed = list_hospitals_handler::<UnavailableCaseRepository, UnavailableHospitalRepository>(
        State(state),
    )
    .await;
    assert_eq!(listed.status(), StatusCode::OK);
    assert!(read_json_body(listed).await.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_bodies_get_the_localized_error_payload() {
    let (state, _, _) = build_state(Locale::English, AssignmentPolicy::RecordOnly);

    let wrong_type = router_for(state.clone())
        .oneshot(json_request(
            Method::PUT,
            "/api/v1/hospitals/h-7/beds",
            json!({ "nicu": "three", "picu": 0, "icu": 0 }),
        ))
        .await
        .unwrap();
    assert_eq!(wrong_type.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(wrong_type).await;
    assert_eq!(payload["error"], "invalid_input");
    assert_eq!(
        payload["message"],
        "The submitted values are invalid. Please check them and try again."
    );

    let broken = router_for(state.clone())
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/cases")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"patient_name\": "))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(broken.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json_body(broken).await["error"], "invalid_input");

    let untyped = router_for(state)
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/service-type")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(untyped.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json_body(untyped).await["error"], "invalid_input");
}
