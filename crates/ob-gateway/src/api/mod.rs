pub mod admin;
pub mod auth;
pub mod responses;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the full HTTP surface: `/v1/responses*` behind the bearer-token
/// gate, the operational endpoints public.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/v1/responses", axum::routing::post(responses::create))
        .route(
            "/v1/responses/:id",
            get(responses::retrieve).delete(responses::remove),
        )
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), auth::require_bearer));

    let public = Router::new()
        .route("/healthz", get(admin::healthz))
        .route("/version", get(admin::version))
        .route("/metrics", get(admin::metrics));

    protected
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
