// libs/scheduling-cell/src/services/schedule.rs
use chrono::{Local, NaiveDate, NaiveTime};
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    AvailabilityException, AvailabilityTemplate, CreateExceptionRequest, ExceptionKind,
    SchedulingError, UpsertScheduleRequest, DEFAULT_SLOT_DURATION_MINUTES,
};
use crate::services::{clinic_filter, fmt_ts};

pub struct ScheduleService {
    supabase: Arc<SupabaseClient>,
}

impl ScheduleService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Replace-in-place upsert: at most one active template per
    /// (professional, clinic, weekday). An existing active row is patched,
    /// never duplicated.
    pub async fn upsert_schedule(
        &self,
        professional_id: Uuid,
        request: UpsertScheduleRequest,
        auth_token: &str,
    ) -> Result<AvailabilityTemplate, SchedulingError> {
        if !(0..=6).contains(&request.day_of_week) {
            return Err(SchedulingError::InvalidInput(
                "Day of week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
            ));
        }

        let start_time = parse_time(&request.start_time)?;
        let end_time = parse_time(&request.end_time)?;
        if start_time >= end_time {
            return Err(SchedulingError::InvalidInput(
                "Schedule must end after it starts".to_string(),
            ));
        }

        let slot_duration = request
            .slot_duration_minutes
            .unwrap_or(DEFAULT_SLOT_DURATION_MINUTES);
        if slot_duration <= 0 {
            return Err(SchedulingError::InvalidInput(
                "Slot duration must be positive".to_string(),
            ));
        }

        let now = fmt_ts(Local::now().naive_local());
        let existing = self
            .find_active_template(
                professional_id,
                request.clinic_id,
                request.day_of_week,
                auth_token,
            )
            .await?;

        if let Some(template) = existing {
            debug!(
                "Updating template {} for professional {} weekday {}",
                template.id, professional_id, request.day_of_week
            );
            let update = json!({
                "start_time": start_time.format("%H:%M:%S").to_string(),
                "end_time": end_time.format("%H:%M:%S").to_string(),
                "slot_duration_minutes": slot_duration,
                "updated_at": now
            });
            let path = format!("/rest/v1/availability_templates?id=eq.{}", template.id);
            return self.write_template(Method::PATCH, &path, update, auth_token).await;
        }

        info!(
            "Creating template for professional {} weekday {}",
            professional_id, request.day_of_week
        );
        let insert = json!({
            "professional_id": professional_id,
            "clinic_id": request.clinic_id,
            "day_of_week": request.day_of_week,
            "start_time": start_time.format("%H:%M:%S").to_string(),
            "end_time": end_time.format("%H:%M:%S").to_string(),
            "slot_duration_minutes": slot_duration,
            "is_active": true,
            "created_at": now.clone(),
            "updated_at": now
        });
        self.write_template(Method::POST, "/rest/v1/availability_templates", insert, auth_token)
            .await
    }

    /// All active templates for one professional, weekday then start order.
    pub async fn get_schedule(
        &self,
        professional_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<AvailabilityTemplate>, SchedulingError> {
        let path = format!(
            "/rest/v1/availability_templates?professional_id=eq.{}&is_active=eq.true&order=day_of_week.asc,start_time.asc",
            professional_id
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<AvailabilityTemplate>, _>>()
            .map_err(|e| SchedulingError::Database(format!("Failed to parse templates: {}", e)))
    }

    /// Soft delete: the row is kept for history, the weekday stops
    /// producing slots.
    pub async fn deactivate_schedule(
        &self,
        professional_id: Uuid,
        template_id: Uuid,
        auth_token: &str,
    ) -> Result<AvailabilityTemplate, SchedulingError> {
        let path = format!("/rest/v1/availability_templates?id=eq.{}", template_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        let row = result.into_iter().next().ok_or(SchedulingError::NotFound)?;
        let template: AvailabilityTemplate = serde_json::from_value(row)
            .map_err(|e| SchedulingError::Database(format!("Failed to parse template: {}", e)))?;

        if template.professional_id != professional_id {
            return Err(SchedulingError::AccessDenied);
        }

        let update = json!({
            "is_active": false,
            "updated_at": fmt_ts(Local::now().naive_local())
        });
        info!("Deactivating template {} for professional {}", template_id, professional_id);
        self.write_template(Method::PATCH, &path, update, auth_token).await
    }

    /// Exceptions are append-only; REDUCED_HOURS must carry a window and
    /// the other kinds must not.
    pub async fn create_exception(
        &self,
        professional_id: Uuid,
        request: CreateExceptionRequest,
        auth_token: &str,
    ) -> Result<AvailabilityException, SchedulingError> {
        let window = match request.kind {
            ExceptionKind::ReducedHours => {
                let (start_raw, end_raw) = match (&request.start_time, &request.end_time) {
                    (Some(s), Some(e)) => (s, e),
                    _ => {
                        return Err(SchedulingError::InvalidInput(
                            "Reduced hours require both start and end times".to_string(),
                        ));
                    }
                };
                let start = parse_time(start_raw)?;
                let end = parse_time(end_raw)?;
                if start >= end {
                    return Err(SchedulingError::InvalidInput(
                        "Reduced hours must end after they start".to_string(),
                    ));
                }
                Some((start, end))
            }
            ExceptionKind::Blocked | ExceptionKind::Holiday => {
                if request.start_time.is_some() || request.end_time.is_some() {
                    return Err(SchedulingError::InvalidInput(format!(
                        "A {} exception does not take a time window",
                        request.kind
                    )));
                }
                None
            }
        };

        let exception_data = json!({
            "professional_id": professional_id,
            "clinic_id": request.clinic_id,
            "exception_date": request.exception_date,
            "kind": request.kind,
            "start_time": window.map(|(s, _)| s.format("%H:%M:%S").to_string()),
            "end_time": window.map(|(_, e)| e.format("%H:%M:%S").to_string()),
            "reason": request.reason,
            "created_at": fmt_ts(Local::now().naive_local())
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/availability_exceptions",
                Some(auth_token),
                Some(exception_data),
                Some(headers),
            )
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| SchedulingError::Database("Failed to create exception".to_string()))?;

        info!(
            "Created {} exception on {} for professional {}",
            request.kind, request.exception_date, professional_id
        );

        serde_json::from_value(row)
            .map_err(|e| SchedulingError::Database(format!("Failed to parse exception: {}", e)))
    }

    pub async fn list_exceptions(
        &self,
        professional_id: Uuid,
        date: Option<NaiveDate>,
        auth_token: &str,
    ) -> Result<Vec<AvailabilityException>, SchedulingError> {
        let mut path = format!(
            "/rest/v1/availability_exceptions?professional_id=eq.{}&order=exception_date.asc",
            professional_id
        );
        if let Some(date) = date {
            path.push_str(&format!("&exception_date=eq.{}", date));
        }

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<AvailabilityException>, _>>()
            .map_err(|e| SchedulingError::Database(format!("Failed to parse exceptions: {}", e)))
    }

    /// Correction path for an immutable exception: delete, then recreate.
    pub async fn delete_exception(
        &self,
        professional_id: Uuid,
        exception_id: Uuid,
        auth_token: &str,
    ) -> Result<(), SchedulingError> {
        let path = format!("/rest/v1/availability_exceptions?id=eq.{}", exception_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        let row = result.into_iter().next().ok_or(SchedulingError::NotFound)?;
        let exception: AvailabilityException = serde_json::from_value(row)
            .map_err(|e| SchedulingError::Database(format!("Failed to parse exception: {}", e)))?;

        if exception.professional_id != professional_id {
            return Err(SchedulingError::AccessDenied);
        }

        // Ask for the deleted rows back so the response stays a JSON array.
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );
        let _: Vec<Value> = self
            .supabase
            .request_with_headers(Method::DELETE, &path, Some(auth_token), None, Some(headers))
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        info!("Deleted exception {} for professional {}", exception_id, professional_id);
        Ok(())
    }

    async fn find_active_template(
        &self,
        professional_id: Uuid,
        clinic_id: Option<Uuid>,
        day_of_week: i32,
        auth_token: &str,
    ) -> Result<Option<AvailabilityTemplate>, SchedulingError> {
        let path = format!(
            "/rest/v1/availability_templates?professional_id=eq.{}&{}&day_of_week=eq.{}&is_active=eq.true&limit=1",
            professional_id,
            clinic_filter(clinic_id),
            day_of_week
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        match result.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map(Some)
                .map_err(|e| SchedulingError::Database(format!("Failed to parse template: {}", e))),
            None => Ok(None),
        }
    }

    async fn write_template(
        &self,
        method: Method,
        path: &str,
        body: Value,
        auth_token: &str,
    ) -> Result<AvailabilityTemplate, SchedulingError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(method, path, Some(auth_token), Some(body), Some(headers))
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| SchedulingError::Database("Failed to write template".to_string()))?;

        serde_json::from_value(row)
            .map_err(|e| SchedulingError::Database(format!("Failed to parse template: {}", e)))
    }
}

/// Accepts "HH:MM" and "HH:MM:SS".
fn parse_time(raw: &str) -> Result<NaiveTime, SchedulingError> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| SchedulingError::InvalidInput(format!("Malformed time: {}", raw)))
}
