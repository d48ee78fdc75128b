use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scheduling_cell::models::*;
use scheduling_cell::services::lifecycle::{validate_transition, LifecycleService};
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

#[test]
fn scheduled_admits_every_closing_transition() {
    for next in [
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::NoShow,
    ] {
        assert!(validate_transition(AppointmentStatus::Scheduled, next).is_ok());
    }
}

#[test]
fn terminal_states_admit_nothing() {
    for current in [
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::NoShow,
    ] {
        for next in [
            AppointmentStatus::Scheduled,
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
            AppointmentStatus::NoShow,
        ] {
            assert_matches!(
                validate_transition(current, next),
                Err(SchedulingError::InvalidTransition(_))
            );
        }
    }
}

#[test]
fn scheduled_to_scheduled_is_invalid_input() {
    assert_matches!(
        validate_transition(AppointmentStatus::Scheduled, AppointmentStatus::Scheduled),
        Err(SchedulingError::InvalidInput(_))
    );
}

fn lifecycle_service(server: &MockServer) -> LifecycleService {
    let config = TestConfig::with_url(&server.uri()).to_app_config();
    LifecycleService::new(&config)
}

async fn mount_appointment(server: &MockServer, professional_id: Uuid, status: &str) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                &professional_id.to_string(),
                &Uuid::new_v4().to_string(),
                "2026-01-05T10:00:00",
                "2026-01-05T10:30:00",
                status
            )
        ])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn completing_scheduled_appointment_succeeds() {
    let server = MockServer::start().await;
    let professional_id = Uuid::new_v4();

    mount_appointment(&server, professional_id, "SCHEDULED").await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                &professional_id.to_string(),
                &Uuid::new_v4().to_string(),
                "2026-01-05T10:00:00",
                "2026-01-05T10:30:00",
                "COMPLETED"
            )
        ])))
        .mount(&server)
        .await;

    let service = lifecycle_service(&server);
    let result = service
        .update_status(
            professional_id,
            Uuid::new_v4(),
            UpdateStatusRequest {
                status: AppointmentStatus::Completed,
                visit_id: Some(Uuid::new_v4()),
            },
            "token",
        )
        .await;

    assert_eq!(result.unwrap().status, AppointmentStatus::Completed);
}

#[tokio::test]
async fn cancelled_appointment_cannot_be_completed() {
    let server = MockServer::start().await;
    let professional_id = Uuid::new_v4();

    mount_appointment(&server, professional_id, "CANCELLED").await;

    let service = lifecycle_service(&server);
    let result = service
        .update_status(
            professional_id,
            Uuid::new_v4(),
            UpdateStatusRequest {
                status: AppointmentStatus::Completed,
                visit_id: None,
            },
            "token",
        )
        .await;

    assert_matches!(result, Err(SchedulingError::InvalidTransition(_)));
}

#[tokio::test]
async fn status_endpoint_refuses_cancellation() {
    let server = MockServer::start().await;
    let service = lifecycle_service(&server);

    let result = service
        .update_status(
            Uuid::new_v4(),
            Uuid::new_v4(),
            UpdateStatusRequest {
                status: AppointmentStatus::Cancelled,
                visit_id: None,
            },
            "token",
        )
        .await;

    assert_matches!(result, Err(SchedulingError::InvalidInput(_)));
}

#[tokio::test]
async fn visit_link_requires_completed_status() {
    let server = MockServer::start().await;
    let service = lifecycle_service(&server);

    let result = service
        .update_status(
            Uuid::new_v4(),
            Uuid::new_v4(),
            UpdateStatusRequest {
                status: AppointmentStatus::NoShow,
                visit_id: Some(Uuid::new_v4()),
            },
            "token",
        )
        .await;

    assert_matches!(result, Err(SchedulingError::InvalidInput(_)));
}

#[tokio::test]
async fn foreign_appointment_is_access_denied() {
    let server = MockServer::start().await;
    let owner = Uuid::new_v4();
    let intruder = Uuid::new_v4();

    mount_appointment(&server, owner, "SCHEDULED").await;

    let service = lifecycle_service(&server);
    let result = service
        .update_status(
            intruder,
            Uuid::new_v4(),
            UpdateStatusRequest {
                status: AppointmentStatus::Completed,
                visit_id: None,
            },
            "token",
        )
        .await;

    assert_matches!(result, Err(SchedulingError::AccessDenied));
}

#[tokio::test]
async fn cancelling_scheduled_appointment_records_reason() {
    let server = MockServer::start().await;
    let professional_id = Uuid::new_v4();

    mount_appointment(&server, professional_id, "SCHEDULED").await;

    let mut cancelled_row = MockSupabaseResponses::appointment_row(
        &professional_id.to_string(),
        &Uuid::new_v4().to_string(),
        "2026-01-05T10:00:00",
        "2026-01-05T10:30:00",
        "CANCELLED",
    );
    cancelled_row["cancellation_reason"] = json!("Family emergency");
    cancelled_row["cancelled_at"] = json!("2026-01-04T18:00:00");

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([cancelled_row])))
        .mount(&server)
        .await;

    let service = lifecycle_service(&server);
    let result = service
        .cancel(
            professional_id,
            Uuid::new_v4(),
            CancelAppointmentRequest {
                reason: Some("Family emergency".to_string()),
            },
            "token",
        )
        .await;

    let appointment = result.unwrap();
    assert_eq!(appointment.status, AppointmentStatus::Cancelled);
    assert_eq!(appointment.cancellation_reason.as_deref(), Some("Family emergency"));
}

#[tokio::test]
async fn double_cancel_is_rejected() {
    let server = MockServer::start().await;
    let professional_id = Uuid::new_v4();

    mount_appointment(&server, professional_id, "CANCELLED").await;

    let service = lifecycle_service(&server);
    let result = service
        .cancel(
            professional_id,
            Uuid::new_v4(),
            CancelAppointmentRequest { reason: None },
            "token",
        )
        .await;

    assert_matches!(result, Err(SchedulingError::InvalidTransition(_)));
}

#[tokio::test]
async fn missing_appointment_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let service = lifecycle_service(&server);
    let result = service
        .cancel(
            Uuid::new_v4(),
            Uuid::new_v4(),
            CancelAppointmentRequest { reason: None },
            "token",
        )
        .await;

    assert_matches!(result, Err(SchedulingError::NotFound));
}
