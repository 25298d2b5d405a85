use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::state::SharedState;

pub mod auth;
mod clients;
mod error;
pub mod events;
mod jobs;
mod list_syncs;
mod media;
mod metadata;
mod observability;
mod recommendations;
mod system;
pub mod types;
mod validation;

pub use error::ApiError;
pub use types::*;

use tokio::sync::RwLock;

pub use crate::domain::events::NotificationEvent;

use crate::services::{ClientService, MediaService, SystemService};
use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Arc<RwLock<Config>> {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn event_bus(&self) -> &tokio::sync::broadcast::Sender<NotificationEvent> {
        &self.shared.event_bus
    }

    #[must_use]
    pub fn client_service(&self) -> &Arc<dyn ClientService> {
        &self.shared.client_service
    }

    #[must_use]
    pub fn media_service(&self) -> &Arc<dyn MediaService> {
        &self.shared.media_service
    }

    #[must_use]
    pub fn system_service(&self) -> &Arc<dyn SystemService> {
        &self.shared.system_service
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub async fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config().read().await.server.cors_allowed_origins.clone();

    let protected_routes = create_protected_router(state.clone());

    let api_router = Router::new()
        .merge(protected_routes)
        .route("/system/health/live", get(system::health_live))
        .route("/system/health/ready", get(system::health_ready))
        .route("/metrics", get(observability::get_metrics))
        .with_state(state.clone());

    let cors_layer = if cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::security_headers_middleware))
        .layer(middleware::from_fn(observability::logging_middleware))
}

fn create_protected_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/system/status", get(system::get_status))
        .route(
            "/system/config",
            get(system::get_config).put(system::update_config),
        )
        .route(
            "/clients",
            get(clients::list_clients).post(clients::create_client),
        )
        .route(
            "/clients/{id}",
            get(clients::get_client)
                .put(clients::update_client)
                .delete(clients::delete_client),
        )
        .route("/clients/{id}/test", post(clients::test_client))
        .route("/clients/{id}/playlists", get(clients::list_playlists))
        .route("/media", get(media::list_media))
        .route(
            "/media/{id}",
            get(media::get_media).delete(media::delete_media),
        )
        .route("/metadata/search", get(metadata::search))
        .route(
            "/recommendations",
            get(recommendations::list_recommendations),
        )
        .route(
            "/recommendations/refresh",
            post(recommendations::refresh_recommendations),
        )
        .route(
            "/list-syncs",
            get(list_syncs::list_list_syncs).post(list_syncs::create_list_sync),
        )
        .route(
            "/list-syncs/{id}",
            axum::routing::delete(list_syncs::delete_list_sync),
        )
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/{id}", get(jobs::get_job))
        .route("/jobs/media-sync", post(jobs::trigger_media_sync))
        .route("/jobs/list-sync", post(jobs::trigger_list_sync))
        .route("/jobs/recommendations", post(jobs::trigger_recommendations))
        .merge(events::router())
        .layer(middleware::from_fn_with_state(
            state,
            auth::auth_middleware,
        ))
}
