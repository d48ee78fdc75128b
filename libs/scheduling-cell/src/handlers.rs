// libs/scheduling-cell/src/handlers.rs
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    CancelAppointmentRequest, CreateAppointmentRequest, CreateExceptionRequest,
    SchedulingError, UpdateStatusRequest, UpsertScheduleRequest,
};
use crate::services::booking::BookingService;
use crate::services::lifecycle::LifecycleService;
use crate::services::schedule::ScheduleService;
use crate::services::slots::SlotService;
use crate::SchedulerState;

fn to_app_error(err: SchedulingError) -> AppError {
    match err {
        SchedulingError::NotFound => AppError::NotFound("Resource not found".to_string()),
        SchedulingError::AccessDenied => AppError::Forbidden("Access denied".to_string()),
        SchedulingError::Conflict => {
            AppError::Conflict("Time slot no longer available".to_string())
        }
        SchedulingError::InvalidInput(msg) => AppError::BadRequest(msg),
        SchedulingError::InvalidTransition(status) => {
            AppError::BadRequest(format!("Appointment is already {}", status))
        }
        SchedulingError::Database(msg) => AppError::Database(msg),
    }
}

fn professional_id(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id)
        .map_err(|_| AppError::BadRequest("Invalid user identifier".to_string()))
}

#[derive(Debug, Deserialize)]
pub struct AppointmentListQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub clinic_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct AvailableSlotsQuery {
    pub date: NaiveDate,
    pub duration: Option<i32>,
    pub clinic_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ExceptionListQuery {
    pub date: Option<NaiveDate>,
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<SchedulerState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let professional_id = professional_id(&user)?;
    let service = BookingService::new(&state.config, Arc::clone(&state.booking_locks));

    let appointments = service
        .list_appointments(
            professional_id,
            query.start_date,
            query.end_date,
            query.clinic_id,
            auth.token(),
        )
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "count": appointments.len(),
        "appointments": appointments
    })))
}

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<SchedulerState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<AvailableSlotsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let professional_id = professional_id(&user)?;
    let service = SlotService::new(&state.config);

    let slots = service
        .get_available_slots(
            professional_id,
            query.date,
            query.duration,
            query.clinic_id,
            auth.token(),
        )
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "date": query.date,
        "count": slots.len(),
        "slots": slots
    })))
}

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<SchedulerState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let professional_id = professional_id(&user)?;
    let service = BookingService::new(&state.config, Arc::clone(&state.booking_locks));

    let appointment = service
        .create_appointment(professional_id, request, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "appointment": appointment
        })),
    ))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<SchedulerState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let professional_id = professional_id(&user)?;
    let service = BookingService::new(&state.config, Arc::clone(&state.booking_locks));

    let appointment = service
        .get_appointment(appointment_id, auth.token())
        .await
        .map_err(to_app_error)?;

    if appointment.professional_id != professional_id {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<Arc<SchedulerState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let professional_id = professional_id(&user)?;
    let service = LifecycleService::new(&state.config);

    let appointment = service
        .update_status(professional_id, appointment_id, request, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<SchedulerState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let professional_id = professional_id(&user)?;
    let service = LifecycleService::new(&state.config);

    let appointment = service
        .cancel(professional_id, appointment_id, request, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment cancelled successfully",
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn get_schedule(
    State(state): State<Arc<SchedulerState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, AppError> {
    let professional_id = professional_id(&user)?;
    let service = ScheduleService::new(&state.config);

    let templates = service
        .get_schedule(professional_id, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "count": templates.len(),
        "schedule": templates
    })))
}

#[axum::debug_handler]
pub async fn upsert_schedule(
    State(state): State<Arc<SchedulerState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpsertScheduleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let professional_id = professional_id(&user)?;
    let service = ScheduleService::new(&state.config);

    let template = service
        .upsert_schedule(professional_id, request, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "template": template
    })))
}

#[axum::debug_handler]
pub async fn deactivate_schedule(
    State(state): State<Arc<SchedulerState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(template_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let professional_id = professional_id(&user)?;
    let service = ScheduleService::new(&state.config);

    let template = service
        .deactivate_schedule(professional_id, template_id, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Schedule deactivated",
        "template": template
    })))
}

#[axum::debug_handler]
pub async fn list_exceptions(
    State(state): State<Arc<SchedulerState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<ExceptionListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let professional_id = professional_id(&user)?;
    let service = ScheduleService::new(&state.config);

    let exceptions = service
        .list_exceptions(professional_id, query.date, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "count": exceptions.len(),
        "exceptions": exceptions
    })))
}

#[axum::debug_handler]
pub async fn create_exception(
    State(state): State<Arc<SchedulerState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateExceptionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let professional_id = professional_id(&user)?;
    let service = ScheduleService::new(&state.config);

    let exception = service
        .create_exception(professional_id, request, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "exception": exception
        })),
    ))
}

#[axum::debug_handler]
pub async fn delete_exception(
    State(state): State<Arc<SchedulerState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(exception_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let professional_id = professional_id(&user)?;
    let service = ScheduleService::new(&state.config);

    service
        .delete_exception(professional_id, exception_id, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Exception deleted"
    })))
}
