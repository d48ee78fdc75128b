use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use scheduling_cell::router::scheduling_routes;
use scheduling_cell::SchedulerState;

pub fn create_router(state: Arc<SchedulerState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Ninar API is running!" }))
        .nest("/appointments", scheduling_routes(state))
}
