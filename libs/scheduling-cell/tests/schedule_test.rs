use assert_matches::assert_matches;
use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scheduling_cell::models::*;
use scheduling_cell::services::schedule::ScheduleService;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

fn schedule_service(server: &MockServer) -> ScheduleService {
    let config = TestConfig::with_url(&server.uri()).to_app_config();
    ScheduleService::new(&config)
}

fn upsert_request(day_of_week: i32, start: &str, end: &str) -> UpsertScheduleRequest {
    UpsertScheduleRequest {
        clinic_id: None,
        day_of_week,
        start_time: start.to_string(),
        end_time: end.to_string(),
        slot_duration_minutes: Some(30),
    }
}

#[tokio::test]
async fn upsert_rejects_out_of_range_weekday() {
    let server = MockServer::start().await;
    let service = schedule_service(&server);

    let result = service
        .upsert_schedule(Uuid::new_v4(), upsert_request(7, "09:00", "12:00"), "token")
        .await;

    assert_matches!(result, Err(SchedulingError::InvalidInput(_)));
}

#[tokio::test]
async fn upsert_rejects_malformed_time() {
    let server = MockServer::start().await;
    let service = schedule_service(&server);

    let result = service
        .upsert_schedule(Uuid::new_v4(), upsert_request(1, "quarter past", "12:00"), "token")
        .await;

    assert_matches!(result, Err(SchedulingError::InvalidInput(_)));
}

#[tokio::test]
async fn upsert_rejects_inverted_window() {
    let server = MockServer::start().await;
    let service = schedule_service(&server);

    let result = service
        .upsert_schedule(Uuid::new_v4(), upsert_request(1, "12:00", "09:00"), "token")
        .await;

    assert_matches!(result, Err(SchedulingError::InvalidInput(_)));
}

#[tokio::test]
async fn upsert_creates_when_no_active_row() {
    let server = MockServer::start().await;
    let professional_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_templates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/availability_templates"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::template_row(
                &professional_id.to_string(),
                None,
                1,
                "09:00:00",
                "12:00:00",
                30
            )
        ])))
        .mount(&server)
        .await;

    let service = schedule_service(&server);
    let result = service
        .upsert_schedule(professional_id, upsert_request(1, "09:00", "12:00"), "token")
        .await;

    let template = result.unwrap();
    assert_eq!(template.day_of_week, 1);
    assert!(template.is_active);
}

#[tokio::test]
async fn upsert_patches_existing_active_row() {
    let server = MockServer::start().await;
    let professional_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_templates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::template_row(
                &professional_id.to_string(),
                None,
                1,
                "09:00:00",
                "12:00:00",
                30
            )
        ])))
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/availability_templates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::template_row(
                &professional_id.to_string(),
                None,
                1,
                "08:00:00",
                "13:00:00",
                30
            )
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let service = schedule_service(&server);
    let result = service
        .upsert_schedule(professional_id, upsert_request(1, "08:00", "13:00"), "token")
        .await;

    let template = result.unwrap();
    assert_eq!(template.start_time.format("%H:%M").to_string(), "08:00");
}

#[tokio::test]
async fn deactivate_foreign_template_is_denied() {
    let server = MockServer::start().await;
    let owner = Uuid::new_v4();
    let intruder = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_templates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::template_row(
                &owner.to_string(),
                None,
                1,
                "09:00:00",
                "12:00:00",
                30
            )
        ])))
        .mount(&server)
        .await;

    let service = schedule_service(&server);
    let result = service
        .deactivate_schedule(intruder, Uuid::new_v4(), "token")
        .await;

    assert_matches!(result, Err(SchedulingError::AccessDenied));
}

fn exception_request(kind: ExceptionKind) -> CreateExceptionRequest {
    CreateExceptionRequest {
        clinic_id: None,
        exception_date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
        kind,
        start_time: None,
        end_time: None,
        reason: None,
    }
}

#[tokio::test]
async fn reduced_hours_requires_a_window() {
    let server = MockServer::start().await;
    let service = schedule_service(&server);

    let result = service
        .create_exception(Uuid::new_v4(), exception_request(ExceptionKind::ReducedHours), "token")
        .await;

    assert_matches!(result, Err(SchedulingError::InvalidInput(_)));
}

#[tokio::test]
async fn reduced_hours_window_must_be_ordered() {
    let server = MockServer::start().await;
    let service = schedule_service(&server);

    let mut request = exception_request(ExceptionKind::ReducedHours);
    request.start_time = Some("14:00".to_string());
    request.end_time = Some("10:00".to_string());

    let result = service
        .create_exception(Uuid::new_v4(), request, "token")
        .await;

    assert_matches!(result, Err(SchedulingError::InvalidInput(_)));
}

#[tokio::test]
async fn blocked_exception_must_not_carry_times() {
    let server = MockServer::start().await;
    let service = schedule_service(&server);

    let mut request = exception_request(ExceptionKind::Blocked);
    request.start_time = Some("09:00".to_string());

    let result = service
        .create_exception(Uuid::new_v4(), request, "token")
        .await;

    assert_matches!(result, Err(SchedulingError::InvalidInput(_)));
}

#[tokio::test]
async fn blocked_exception_is_created() {
    let server = MockServer::start().await;
    let professional_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/availability_exceptions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::exception_row(
                &professional_id.to_string(),
                "2026-01-05",
                "BLOCKED",
                Some("Conference")
            )
        ])))
        .mount(&server)
        .await;

    let service = schedule_service(&server);
    let mut request = exception_request(ExceptionKind::Blocked);
    request.reason = Some("Conference".to_string());

    let result = service
        .create_exception(professional_id, request, "token")
        .await;

    let exception = result.unwrap();
    assert_eq!(exception.kind, ExceptionKind::Blocked);
}

#[tokio::test]
async fn delete_foreign_exception_is_denied() {
    let server = MockServer::start().await;
    let owner = Uuid::new_v4();
    let intruder = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_exceptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::exception_row(
                &owner.to_string(),
                "2026-01-05",
                "HOLIDAY",
                None
            )
        ])))
        .mount(&server)
        .await;

    let service = schedule_service(&server);
    let result = service
        .delete_exception(intruder, Uuid::new_v4(), "token")
        .await;

    assert_matches!(result, Err(SchedulingError::AccessDenied));
}
