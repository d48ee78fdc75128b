// libs/scheduling-cell/src/services/booking.rs
use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use reqwest::Method;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    Appointment, AppointmentStatus, CreateAppointmentRequest, SchedulingError,
    DEFAULT_APPOINTMENT_SOURCE, DEFAULT_SLOT_DURATION_MINUTES,
};
use crate::services::access::{BabyAccess, SupabaseBabyAccess};
use crate::services::fmt_ts;

/// Per-professional serialization of the overlap check + insert pair.
/// Double-booking only ever happens within one professional's stream, so
/// one owned mutex per professional is enough; the registry lives in
/// shared state and is held across the whole create path.
pub struct BookingLocks {
    locks: StdMutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl BookingLocks {
    pub fn new() -> Self {
        Self {
            locks: StdMutex::new(HashMap::new()),
        }
    }

    pub async fn acquire(&self, professional_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(map.entry(professional_id).or_default())
        };
        lock.lock_owned().await
    }
}

impl Default for BookingLocks {
    fn default() -> Self {
        Self::new()
    }
}

pub struct BookingService {
    supabase: Arc<SupabaseClient>,
    access: Arc<dyn BabyAccess>,
    locks: Arc<BookingLocks>,
}

impl BookingService {
    pub fn new(config: &AppConfig, locks: Arc<BookingLocks>) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        let access = Arc::new(SupabaseBabyAccess::new(Arc::clone(&supabase)));

        Self {
            supabase,
            access,
            locks,
        }
    }

    /// Injection seam for tests and alternative access backends.
    pub fn with_access(
        supabase: Arc<SupabaseClient>,
        access: Arc<dyn BabyAccess>,
        locks: Arc<BookingLocks>,
    ) -> Self {
        Self {
            supabase,
            access,
            locks,
        }
    }

    /// Validate and commit a new appointment, enforcing the per-professional
    /// non-overlap invariant at commit time.
    pub async fn create_appointment(
        &self,
        professional_id: Uuid,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        info!(
            "Booking appointment for baby {} with professional {}",
            request.baby_id, professional_id
        );

        let duration = request
            .duration_minutes
            .unwrap_or(DEFAULT_SLOT_DURATION_MINUTES);
        if duration <= 0 {
            return Err(SchedulingError::InvalidInput(
                "Appointment duration must be positive".to_string(),
            ));
        }

        let start_at = request.start_at;
        let end_at = request
            .end_at
            .unwrap_or(start_at + Duration::minutes(duration as i64));
        if end_at <= start_at {
            return Err(SchedulingError::InvalidInput(
                "Appointment must end after it starts".to_string(),
            ));
        }

        // Clinical link precondition, fail closed: a lookup error denies.
        match self
            .access
            .can_manage_baby(professional_id, request.baby_id, auth_token)
            .await
        {
            Ok(true) => {}
            Ok(false) => return Err(SchedulingError::AccessDenied),
            Err(e) => {
                warn!("Access check failed, denying booking: {}", e);
                return Err(SchedulingError::AccessDenied);
            }
        }

        // Serialize check + insert for this professional's stream.
        let _guard = self.locks.acquire(professional_id).await;

        let conflicting = self
            .find_overlapping(professional_id, start_at, end_at, auth_token)
            .await?;
        if !conflicting.is_empty() {
            warn!(
                "Booking conflict for professional {}: {} overlapping appointments",
                professional_id,
                conflicting.len()
            );
            return Err(SchedulingError::Conflict);
        }

        let title = match request.title {
            Some(title) => title,
            None => {
                let baby_name = self.get_baby_name(request.baby_id, auth_token).await?;
                format!("{} - Consulta", baby_name)
            }
        };

        let now = Local::now().naive_local();
        let appointment_data = json!({
            "baby_id": request.baby_id,
            "professional_id": professional_id,
            "clinic_id": request.clinic_id,
            "start_at": fmt_ts(start_at),
            "end_at": fmt_ts(end_at),
            "duration_minutes": (end_at - start_at).num_minutes(),
            "kind": request.kind.unwrap_or_default(),
            "status": AppointmentStatus::Scheduled,
            "title": title,
            "notes": request.notes,
            "booked_by_user_id": request.booked_by_user_id,
            "source": request.source.unwrap_or_else(|| DEFAULT_APPOINTMENT_SOURCE.to_string()),
            "created_at": fmt_ts(now),
            "updated_at": fmt_ts(now)
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
                "/rest/v1/appointments",
                Some(auth_token),
                Some(appointment_data),
                Some(headers),
            )
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| SchedulingError::Database("Failed to create appointment".to_string()))?;

        let appointment: Appointment = serde_json::from_value(row)
            .map_err(|e| SchedulingError::Database(format!("Failed to parse appointment: {}", e)))?;

        info!("Appointment {} booked for professional {}", appointment.id, professional_id);
        Ok(appointment)
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        debug!("Fetching appointment: {}", appointment_id);

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        let row = result.into_iter().next().ok_or(SchedulingError::NotFound)?;

        serde_json::from_value(row)
            .map_err(|e| SchedulingError::Database(format!("Failed to parse appointment: {}", e)))
    }

    /// Ledger projection for one professional over a date range, with an
    /// optional clinic filter.
    pub async fn list_appointments(
        &self,
        professional_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
        clinic_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        if end_date < start_date {
            return Err(SchedulingError::InvalidInput(
                "End date must not precede start date".to_string(),
            ));
        }

        let range_start = start_date.and_hms_opt(0, 0, 0)
            .ok_or_else(|| SchedulingError::InvalidInput("Malformed date".to_string()))?;
        let range_end = end_date.and_hms_opt(23, 59, 59)
            .ok_or_else(|| SchedulingError::InvalidInput("Malformed date".to_string()))?;

        let mut path = format!(
            "/rest/v1/appointments?professional_id=eq.{}&start_at=gte.{}&start_at=lte.{}&order=start_at.asc",
            professional_id,
            urlencoding::encode(&fmt_ts(range_start)),
            urlencoding::encode(&fmt_ts(range_end))
        );
        if let Some(clinic) = clinic_id {
            path.push_str(&format!("&clinic_id=eq.{}", clinic));
        }

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

    async fn find_overlapping(
        &self,
        professional_id: Uuid,
        start_at: NaiveDateTime,
        end_at: NaiveDateTime,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        // Half-open interval intersection: existing.start < end AND
        // existing.end > start. Cancelled and no-show rows free the slot.
        let path = format!(
            "/rest/v1/appointments?professional_id=eq.{}&start_at=lt.{}&end_at=gt.{}&status=not.in.(CANCELLED,NO_SHOW)",
            professional_id,
            urlencoding::encode(&fmt_ts(end_at)),
            urlencoding::encode(&fmt_ts(start_at))
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

    async fn get_baby_name(
        &self,
        baby_id: Uuid,
        auth_token: &str,
    ) -> Result<String, SchedulingError> {
        let path = format!("/rest/v1/babies?id=eq.{}&select=id,name", baby_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        let row = result.into_iter().next().ok_or(SchedulingError::NotFound)?;

        row.get("name")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| SchedulingError::Database("Baby row missing name".to_string()))
    }
}
