// libs/scheduling-cell/src/services/slots.rs
use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, Weekday};
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    Appointment, AvailabilityException, AvailabilityTemplate, AvailableSlot,
    ExceptionKind, SchedulingError, DEFAULT_SLOT_DURATION_MINUTES,
    MAX_SLOT_DURATION_MINUTES,
};
use crate::services::{clinic_filter, fmt_ts};

/// Candidate walk over fetched rows. Pure so the slot arithmetic is
/// testable without a store: callers pass "now" in the same naive local
/// basis as the schedule itself.
pub fn compute_slots(
    templates: &[AvailabilityTemplate],
    exceptions: &[AvailabilityException],
    appointments: &[Appointment],
    date: NaiveDate,
    duration_minutes: i32,
    now: NaiveDateTime,
) -> Vec<AvailableSlot> {
    // BLOCKED wins over everything else on the date, including
    // coexisting REDUCED_HOURS/HOLIDAY rows.
    if exceptions.iter().any(|e| e.kind == ExceptionKind::Blocked) {
        return vec![];
    }

    let duration = Duration::minutes(duration_minutes as i64);
    let mut slots = Vec::new();

    for template in templates {
        if !template.is_active {
            continue;
        }

        let window_end = date.and_time(template.end_time);
        let mut cursor = date.and_time(template.start_time);

        // Step by the caller-supplied duration, not the template's own
        // slot_duration_minutes.
        while cursor + duration <= window_end {
            let candidate = AvailableSlot {
                start_at: cursor,
                end_at: cursor + duration,
            };

            let occupied = appointments.iter().any(|apt| {
                apt.status.blocks_slot()
                    && apt.overlaps(candidate.start_at, candidate.end_at)
            });

            if !occupied && candidate.start_at >= now {
                slots.push(candidate);
            }

            cursor += duration;
        }
    }

    slots.sort_by(|a, b| a.start_at.cmp(&b.start_at));
    slots
}

pub struct SlotService {
    supabase: Arc<SupabaseClient>,
}

impl SlotService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Bookable slots for one professional on one date, chronological and
    /// non-overlapping. No templates for the weekday is an empty result,
    /// not an error.
    pub async fn get_available_slots(
        &self,
        professional_id: Uuid,
        date: NaiveDate,
        duration_minutes: Option<i32>,
        clinic_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<AvailableSlot>, SchedulingError> {
        let duration = duration_minutes.unwrap_or(DEFAULT_SLOT_DURATION_MINUTES);
        if duration <= 0 {
            return Err(SchedulingError::InvalidInput(
                "Slot duration must be positive".to_string(),
            ));
        }
        if duration > MAX_SLOT_DURATION_MINUTES {
            return Err(SchedulingError::InvalidInput(format!(
                "Slot duration must not exceed {} minutes",
                MAX_SLOT_DURATION_MINUTES
            )));
        }

        debug!(
            "Calculating available slots for professional {} on {} ({} min)",
            professional_id, date, duration
        );

        let day_of_week = match date.weekday() {
            Weekday::Sun => 0,
            Weekday::Mon => 1,
            Weekday::Tue => 2,
            Weekday::Wed => 3,
            Weekday::Thu => 4,
            Weekday::Fri => 5,
            Weekday::Sat => 6,
        };

        let templates = self
            .get_templates_for_day(professional_id, clinic_id, day_of_week, auth_token)
            .await?;
        if templates.is_empty() {
            debug!("No active template for weekday {}, returning empty", day_of_week);
            return Ok(vec![]);
        }

        let exceptions = self
            .get_exceptions_for_date(professional_id, clinic_id, date, auth_token)
            .await?;
        if exceptions.iter().any(|e| e.kind == ExceptionKind::Blocked) {
            debug!("Date {} is blocked by exception, returning empty", date);
            return Ok(vec![]);
        }

        let appointments = self
            .get_appointments_for_date(professional_id, date, auth_token)
            .await?;

        let now = Local::now().naive_local();
        Ok(compute_slots(&templates, &exceptions, &appointments, date, duration, now))
    }

    async fn get_templates_for_day(
        &self,
        professional_id: Uuid,
        clinic_id: Option<Uuid>,
        day_of_week: i32,
        auth_token: &str,
    ) -> Result<Vec<AvailabilityTemplate>, SchedulingError> {
        let path = format!(
            "/rest/v1/availability_templates?professional_id=eq.{}&{}&day_of_week=eq.{}&is_active=eq.true&order=start_time.asc",
            professional_id,
            clinic_filter(clinic_id),
            day_of_week
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

    async fn get_exceptions_for_date(
        &self,
        professional_id: Uuid,
        clinic_id: Option<Uuid>,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<AvailabilityException>, SchedulingError> {
        let path = format!(
            "/rest/v1/availability_exceptions?professional_id=eq.{}&{}&exception_date=eq.{}",
            professional_id,
            clinic_filter(clinic_id),
            date
        );

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

    async fn get_appointments_for_date(
        &self,
        professional_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let start_of_day = date.and_hms_opt(0, 0, 0)
            .ok_or_else(|| SchedulingError::InvalidInput("Malformed date".to_string()))?;
        let end_of_day = date.and_hms_opt(23, 59, 59)
            .ok_or_else(|| SchedulingError::InvalidInput("Malformed date".to_string()))?;

        let path = format!(
            "/rest/v1/appointments?professional_id=eq.{}&start_at=gte.{}&start_at=lte.{}&status=not.in.(CANCELLED,NO_SHOW)&order=start_at.asc",
            professional_id,
            urlencoding::encode(&fmt_ts(start_of_day)),
            urlencoding::encode(&fmt_ts(end_of_day))
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| SchedulingError::Database(format!("Failed to parse appointments: {}", e)))
    }
}
