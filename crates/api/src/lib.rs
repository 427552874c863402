//! HTTP API server for the object counter.
//!
//! Exposes image upload endpoints that detect and count objects, a read
//! endpoint over the cumulative counts, and health/metrics endpoints.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue, header};
use axum::routing::{get, post};
use count_store::{CountRepository, InMemoryCountStore, MongoCountStore, PostgresCountStore};
use counter::{
    CountDetectedObjects, DetectObjects, FakeObjectDetector, LabelMap, ObjectDetector,
    TfServingDetector,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use config::{Config, DetectorConfig, StorageConfig};
use error::StartupError;
use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let body_limit = state.max_upload_bytes;

    let metrics_router = Router::new()
        .route("/metrics", get(routes::health::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/object-count",
            post(routes::counts::count).get(routes::counts::totals),
        )
        .route("/object-detection", post(routes::detections::detect))
        .with_state(state)
        .merge(metrics_router)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(security_header(
            header::CONTENT_SECURITY_POLICY,
            "default-src 'self'",
        ))
        .layer(security_header(header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
        .layer(security_header(header::X_XSS_PROTECTION, "1; mode=block"))
        .layer(security_header(header::X_FRAME_OPTIONS, "DENY"))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

fn security_header(name: HeaderName, value: &'static str) -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(name, HeaderValue::from_static(value))
}

/// Creates application state from an already constructed detector and
/// repository.
pub fn create_state(
    detector: Arc<dyn ObjectDetector>,
    repository: Arc<dyn CountRepository>,
    backend: &'static str,
    max_upload_bytes: usize,
) -> Arc<AppState> {
    Arc::new(AppState {
        count_objects: CountDetectedObjects::new(detector.clone(), repository),
        detect_objects: DetectObjects::new(detector),
        backend,
        max_upload_bytes,
    })
}

/// Builds the detector and repository selected by `config`.
///
/// Database backends are connected and their schema or indexes are
/// prepared before the state is returned.
pub async fn build_state(config: &Config) -> Result<Arc<AppState>, StartupError> {
    let detector: Arc<dyn ObjectDetector> = match &config.detector {
        DetectorConfig::Fake => Arc::new(FakeObjectDetector::new()),
        DetectorConfig::TfServing { serving, label_map } => {
            let labels = match label_map {
                Some(path) => LabelMap::load(path)?,
                None => LabelMap::coco(),
            };
            tracing::info!(
                url = %serving.predict_url(),
                labels = labels.len(),
                "using TF Serving detector"
            );
            Arc::new(TfServingDetector::new(serving, labels)?)
        }
    };

    let repository: Arc<dyn CountRepository> = match &config.storage {
        StorageConfig::Memory => Arc::new(InMemoryCountStore::new()),
        StorageConfig::MongoDb { url, database } => {
            let store = MongoCountStore::connect(url, database).await?;
            if !store.is_replica_set().await? {
                return Err(StartupError::ReplicaSetRequired);
            }
            store.ensure_indexes().await?;
            Arc::new(store)
        }
        StorageConfig::Postgres { url } => {
            let store = PostgresCountStore::connect(url).await?;
            store.run_migrations().await?;
            Arc::new(store)
        }
    };

    let backend = config.storage.backend_name();
    tracing::info!(backend, environment = ?config.environment, "count repository ready");

    Ok(create_state(detector, repository, backend, config.max_upload_bytes))
}
