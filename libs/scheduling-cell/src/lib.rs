pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

use std::sync::Arc;

use shared_config::AppConfig;

use crate::services::booking::BookingLocks;

/// Shared state for the scheduling cell. The booking lock registry must
/// outlive individual requests, so it lives here rather than inside a
/// per-request service instance.
pub struct SchedulerState {
    pub config: AppConfig,
    pub booking_locks: Arc<BookingLocks>,
}

impl SchedulerState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            booking_locks: Arc::new(BookingLocks::new()),
        }
    }
}
