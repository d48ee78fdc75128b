// libs/scheduling-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;

// ==============================================================================
// AVAILABILITY MODELS
// ==============================================================================

/// Recurring weekly working hours for one professional at one clinic.
/// `clinic_id = None` is the "no clinic" bucket and is never merged with
/// named clinics. At most one active row exists per
/// (professional, clinic, weekday); upserts replace in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityTemplate {
    pub id: Uuid,
    pub professional_id: Uuid,
    pub clinic_id: Option<Uuid>,
    pub day_of_week: i32, // 0 = Sunday .. 6 = Saturday
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_duration_minutes: i32,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExceptionKind {
    Blocked,
    ReducedHours,
    Holiday,
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExceptionKind::Blocked => write!(f, "BLOCKED"),
            ExceptionKind::ReducedHours => write!(f, "REDUCED_HOURS"),
            ExceptionKind::Holiday => write!(f, "HOLIDAY"),
        }
    }
}

/// Date-specific override of a template. Immutable once created; the
/// correction path is delete + recreate. Several rows may exist for the
/// same date, and any BLOCKED row suppresses the whole date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityException {
    pub id: Uuid,
    pub professional_id: Uuid,
    pub clinic_id: Option<Uuid>,
    pub exception_date: NaiveDate,
    pub kind: ExceptionKind,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub reason: Option<String>,
    pub created_at: NaiveDateTime,
}

/// A candidate bookable interval derived from a template. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableSlot {
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
}

// ==============================================================================
// APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    /// Terminal statuses admit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed
                | AppointmentStatus::Cancelled
                | AppointmentStatus::NoShow
        )
    }

    /// Whether an appointment in this status still occupies its interval
    /// for conflict purposes.
    pub fn blocks_slot(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::NoShow)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "SCHEDULED"),
            AppointmentStatus::Completed => write!(f, "COMPLETED"),
            AppointmentStatus::Cancelled => write!(f, "CANCELLED"),
            AppointmentStatus::NoShow => write!(f, "NO_SHOW"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentKind {
    Consultation,
    FollowUp,
    Vaccine,
    Assessment,
}

impl Default for AppointmentKind {
    fn default() -> Self {
        AppointmentKind::Consultation
    }
}

/// A committed row in the appointment ledger. Times are immutable after
/// creation; cancel-and-recreate is the correction path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub baby_id: Uuid,
    pub professional_id: Uuid,
    pub clinic_id: Option<Uuid>,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    pub duration_minutes: i32,
    pub kind: AppointmentKind,
    pub status: AppointmentStatus,
    pub title: String,
    pub notes: Option<String>,
    pub booked_by_user_id: Option<Uuid>,
    pub source: String,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<NaiveDateTime>,
    pub visit_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Appointment {
    /// Half-open interval overlap; abutting appointments do not overlap.
    pub fn overlaps(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        self.start_at < end && self.end_at > start
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub baby_id: Uuid,
    pub clinic_id: Option<Uuid>,
    pub start_at: NaiveDateTime,
    pub end_at: Option<NaiveDateTime>,
    pub duration_minutes: Option<i32>,
    pub kind: Option<AppointmentKind>,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub booked_by_user_id: Option<Uuid>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
    pub visit_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

/// Template times arrive as "HH:MM" strings so malformed input surfaces
/// as InvalidInput instead of a deserialization error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertScheduleRequest {
    pub clinic_id: Option<Uuid>,
    pub day_of_week: i32,
    pub start_time: String,
    pub end_time: String,
    pub slot_duration_minutes: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateExceptionRequest {
    pub clinic_id: Option<Uuid>,
    pub exception_date: NaiveDate,
    pub kind: ExceptionKind,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub reason: Option<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

pub const DEFAULT_SLOT_DURATION_MINUTES: i32 = 30;
/// A slot can never outlast the day it is generated for.
pub const MAX_SLOT_DURATION_MINUTES: i32 = 24 * 60;
pub const DEFAULT_APPOINTMENT_SOURCE: &str = "APP";

#[derive(Debug, Clone, thiserror::Error)]
pub enum SchedulingError {
    #[error("Resource not found")]
    NotFound,

    #[error("Access denied")]
    AccessDenied,

    #[error("Time slot conflicts with an existing appointment")]
    Conflict,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cannot transition out of status {0}")]
    InvalidTransition(AppointmentStatus),

    #[error("Database error: {0}")]
    Database(String),
}
