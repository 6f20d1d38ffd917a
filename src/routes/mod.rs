pub mod corrections;
pub mod network;
pub mod submissions;
pub mod sync;

use axum::routing::{get, post, put};
use axum::Router;

use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        // Submissions
        .route(
            "/api/v1/submissions",
            get(submissions::list).post(submissions::create),
        )
        .route("/api/v1/submissions/{id}", get(submissions::get))
        .route(
            "/api/v1/submissions/{id}/form-data",
            put(submissions::update_form_data),
        )
        .route("/api/v1/submissions/{id}/retry", post(submissions::retry))
        // Sync
        .route("/api/v1/sync", post(sync::run))
        .route("/api/v1/notifications", get(sync::notifications))
        // Network
        .route("/api/v1/network", get(network::get).put(network::set))
        // Corrections
        .route("/api/v1/corrections", post(corrections::analyze))
        .route("/api/v1/corrections/accept", post(corrections::accept))
}
