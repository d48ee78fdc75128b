// libs/scheduling-cell/src/router.rs
use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::SchedulerState;

/// All scheduling routes, bearer-authenticated. Mounted by the API under
/// `/appointments`.
pub fn scheduling_routes(state: Arc<SchedulerState>) -> Router {
    let auth_state = Arc::new(state.config.clone());

    Router::new()
        .route(
            "/",
            get(handlers::list_appointments).post(handlers::create_appointment),
        )
        .route("/available-slots", get(handlers::get_available_slots))
        .route(
            "/schedule",
            get(handlers::get_schedule).post(handlers::upsert_schedule),
        )
        .route(
            "/schedule/{template_id}/deactivate",
            post(handlers::deactivate_schedule),
        )
        .route(
            "/exceptions",
            get(handlers::list_exceptions).post(handlers::create_exception),
        )
        .route("/exceptions/{exception_id}", delete(handlers::delete_exception))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route(
            "/{appointment_id}/status",
            patch(handlers::update_appointment_status),
        )
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .layer(middleware::from_fn_with_state(auth_state, auth_middleware))
        .with_state(state)
}
