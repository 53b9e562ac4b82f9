//! Routes
//!
//! - `GET    /routes/calculate?start&end[&format=geojson]` - safest route
//! - `POST   /routes/recalculate?start&end`                - mark hazards, then route
//! - `PUT    /routes/node/{id}/unsafe|safe`                - node safety
//! - `PUT    /routes/edge/{id}/blocked|unblocked`          - road blockage
//! - `GET    /routes/nodes/all|safe|area`                  - node listings
//! - `POST   /routes/nodes`, `PATCH|DELETE /routes/nodes/{id}` - node admin
//! - `GET|POST /routes/edges`, `DELETE /routes/edges/{id}` - edge admin
//! - `POST   /routes/evacuation?userLocation`              - ranked shelter routes
//! - `GET    /routes/nearest-shelter?latitude&longitude`   - nearest usable shelter
//! - `DELETE /routes/cache/cleanup`                        - drop expired routes
//! - `GET|POST /routes/network/status`                     - status, POST also broadcasts
//! - `GET    /routes/events`                               - SSE change feed

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{delete, get, patch, post, put};
use haven_core::RouteService;
use tokio::sync::watch;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;

mod events;
mod routes;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RouteService>,
    shutdown: watch::Receiver<bool>,
}

impl AppState {
    pub fn new(service: Arc<RouteService>) -> Self {
        let (_, shutdown) = watch::channel(false);
        Self { service, shutdown }
    }

    /// Ends long-lived responses such as the change feed once `true` is sent
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Resolves when shutdown is signalled, never if it cannot be
    fn shutdown_requested(&self) -> impl Future<Output = ()> + Send + 'static + use<> {
        let mut shutdown = self.shutdown.clone();
        async move {
            let signalled = shutdown.wait_for(|stop| *stop).await.is_ok();
            if !signalled {
                std::future::pending::<()>().await;
            }
        }
    }
}

pub fn router(state: AppState, config: &ServerConfig) -> Router {
    let api = Router::new()
        .route("/calculate", get(routes::calculate))
        .route("/recalculate", post(routes::recalculate))
        .route("/node/{id}/unsafe", put(routes::mark_node_unsafe))
        .route("/node/{id}/safe", put(routes::mark_node_safe))
        .route("/edge/{id}/blocked", put(routes::block_edge))
        .route("/edge/{id}/unblocked", put(routes::unblock_edge))
        .route("/nodes", post(routes::create_node))
        .route("/nodes/all", get(routes::all_nodes))
        .route("/nodes/safe", get(routes::safe_nodes))
        .route("/nodes/area", get(routes::nodes_in_area))
        .route(
            "/nodes/{id}",
            patch(routes::update_node).delete(routes::remove_node),
        )
        .route("/edges", get(routes::all_edges).post(routes::create_edge))
        .route("/edges/{id}", delete(routes::remove_edge))
        .route("/evacuation", post(routes::evacuation_routes))
        .route("/nearest-shelter", get(routes::nearest_shelter))
        .route("/cache/cleanup", delete(routes::cleanup_cache))
        .route(
            "/network/status",
            get(routes::network_status).post(routes::publish_network_status),
        )
        .route("/events", get(events::change_feed));

    Router::new()
        .route("/health", get(routes::health))
        .nest("/routes", api)
        .with_state(state)
        .layer(ConcurrencyLimitLayer::new(config.concurrency_limit.max(1)))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout(),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
