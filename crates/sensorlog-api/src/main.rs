// Sensorlog API server
// Decision: Read-only API over the device registry and event partitions;
// ingestion happens in the collector, both share the same Postgres tables.

mod common;
mod config;
mod devices;
mod services;

use anyhow::{Context, Result};
use axum::{routing::get, Json, Router};
use sensorlog_core::{Device, QueryRequest};
use sensorlog_storage::{create_db_event_store, Database};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::ApiConfig;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        devices::list_devices,
        devices::get_device,
        devices::search_events,
        devices::count_events,
    ),
    components(schemas(Device, QueryRequest)),
    tags(
        (name = "devices", description = "Device registry endpoints"),
        (name = "events", description = "Device event history endpoints")
    ),
    info(
        title = "Sensorlog API",
        version = "0.1.0",
        description = "API for listing devices and querying their event history",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sensorlog_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("sensorlog-api starting...");

    let config = ApiConfig::from_env()?;

    // Initialize database
    let db = Database::from_url(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    db.ensure_schema()
        .await
        .context("Failed to prepare database schema")?;
    tracing::info!("Connected to database");

    let devices_state = devices::AppState::new(Arc::new(create_db_event_store(db)));

    if !config.api_prefix.is_empty() {
        tracing::info!(prefix = %config.api_prefix, "API prefix configured");
    }

    let app = build_app(devices::routes(devices_state), &config.api_prefix);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("Listening on {}", config.addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Assemble health check, prefixed API routes, Swagger UI and tracing
fn build_app(api_routes: Router, api_prefix: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(build_router_with_prefix(api_routes, api_prefix))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
}

/// Build router with optional API prefix (extracted for testing)
fn build_router_with_prefix<S: Clone + Send + Sync + 'static>(
    api_routes: Router<S>,
    api_prefix: &str,
) -> Router<S> {
    if api_prefix.is_empty() {
        api_routes
    } else {
        Router::new().nest(api_prefix, api_routes)
    }
}
