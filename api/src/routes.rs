use axum::{
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Create the main application router with all routes and middleware
#[tracing::instrument(skip(state))]
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let reminder_routes = Router::new()
        .route("/api/reminders", post(handlers::reminders::create_reminder))
        .route(
            "/api/reminders/:id/activate",
            put(handlers::reminders::activate_reminder),
        )
        .route(
            "/api/reminders/:id/deactivate",
            put(handlers::reminders::deactivate_reminder),
        )
        .route("/api/scheduler/jobs", get(handlers::scheduler::list_jobs));

    let user_routes = Router::new().route("/api/users", post(handlers::users::register_user));

    let operational_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::metrics_handler));

    Router::new()
        .merge(reminder_routes)
        .merge(user_routes)
        .merge(operational_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
