// libs/scheduling-cell/src/services/lifecycle.rs
use chrono::Local;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    Appointment, AppointmentStatus, CancelAppointmentRequest, SchedulingError,
    UpdateStatusRequest,
};
use crate::services::fmt_ts;

/// Gate on the status machine: SCHEDULED is the only state that admits
/// a transition, and every other state is terminal.
pub fn validate_transition(
    current: AppointmentStatus,
    next: AppointmentStatus,
) -> Result<(), SchedulingError> {
    if current.is_terminal() {
        return Err(SchedulingError::InvalidTransition(current));
    }
    match next {
        AppointmentStatus::Completed
        | AppointmentStatus::Cancelled
        | AppointmentStatus::NoShow => Ok(()),
        AppointmentStatus::Scheduled => Err(SchedulingError::InvalidInput(
            "Appointment is already scheduled".to_string(),
        )),
    }
}

pub struct LifecycleService {
    supabase: Arc<SupabaseClient>,
}

impl LifecycleService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Close out an appointment as COMPLETED or NO_SHOW. Cancellation has
    /// its own endpoint so it can carry a reason.
    pub async fn update_status(
        &self,
        professional_id: Uuid,
        appointment_id: Uuid,
        request: UpdateStatusRequest,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        match request.status {
            AppointmentStatus::Completed | AppointmentStatus::NoShow => {}
            AppointmentStatus::Cancelled => {
                return Err(SchedulingError::InvalidInput(
                    "Use the cancel endpoint to cancel an appointment".to_string(),
                ));
            }
            AppointmentStatus::Scheduled => {
                return Err(SchedulingError::InvalidInput(
                    "Cannot move an appointment back to scheduled".to_string(),
                ));
            }
        }

        if request.visit_id.is_some() && request.status != AppointmentStatus::Completed {
            return Err(SchedulingError::InvalidInput(
                "A visit can only be linked when completing an appointment".to_string(),
            ));
        }

        let appointment = self.fetch_owned(professional_id, appointment_id, auth_token).await?;
        validate_transition(appointment.status, request.status)?;

        let mut update = json!({
            "status": request.status,
            "updated_at": fmt_ts(Local::now().naive_local())
        });
        if let Some(visit_id) = request.visit_id {
            update["visit_id"] = json!(visit_id);
        }

        let updated = self.patch(appointment_id, update, auth_token).await?;
        info!(
            "Appointment {} moved to {} by professional {}",
            appointment_id, updated.status, professional_id
        );
        Ok(updated)
    }

    /// Cancel a scheduled appointment, freeing its interval for rebooking.
    pub async fn cancel(
        &self,
        professional_id: Uuid,
        appointment_id: Uuid,
        request: CancelAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let appointment = self.fetch_owned(professional_id, appointment_id, auth_token).await?;
        validate_transition(appointment.status, AppointmentStatus::Cancelled)?;

        let now = fmt_ts(Local::now().naive_local());
        let update = json!({
            "status": AppointmentStatus::Cancelled,
            "cancellation_reason": request.reason,
            "cancelled_at": now.clone(),
            "updated_at": now
        });

        let cancelled = self.patch(appointment_id, update, auth_token).await?;
        info!(
            "Appointment {} cancelled by professional {}",
            appointment_id, professional_id
        );
        Ok(cancelled)
    }

    async fn fetch_owned(
        &self,
        professional_id: Uuid,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        let row = result.into_iter().next().ok_or(SchedulingError::NotFound)?;
        let appointment: Appointment = serde_json::from_value(row)
            .map_err(|e| SchedulingError::Database(format!("Failed to parse appointment: {}", e)))?;

        if appointment.professional_id != professional_id {
            warn!(
                "Professional {} attempted to modify appointment {} they do not own",
                professional_id, appointment_id
            );
            return Err(SchedulingError::AccessDenied);
        }

        Ok(appointment)
    }

    async fn patch(
        &self,
        appointment_id: Uuid,
        update: Value,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(update),
                Some(headers),
            )
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| SchedulingError::Database("Failed to update appointment".to_string()))?;

        serde_json::from_value(row)
            .map_err(|e| SchedulingError::Database(format!("Failed to parse appointment: {}", e)))
    }
}
