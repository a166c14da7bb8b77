//! Case Study Backend - library for app logic and testing

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod render;
pub mod routes;
pub mod sections;

use axum::{
    http::{HeaderName, HeaderValue, Method},
    middleware,
    routing::{get, patch, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::routes::{case_studies, health, sections as section_routes, AppState};
use crate::sections::{MemorySectionStore, PgSectionStore, SectionStore, SessionRegistry};

/// CORS from ALLOWED_ORIGINS (comma-separated) or FRONTEND_ORIGIN,
/// falling back to the local frontend dev server.
pub fn configure_cors() -> CorsLayer {
    let allowed_origins = std::env::var("ALLOWED_ORIGINS")
        .ok()
        .map(|s| {
            s.split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect::<Vec<HeaderValue>>()
        })
        .filter(|origins| !origins.is_empty())
        .or_else(|| {
            std::env::var("FRONTEND_ORIGIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(|origin| vec![origin])
        })
        .unwrap_or_else(|| {
            vec![
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("http://127.0.0.1:3000"),
            ]
        });

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            HeaderName::from_static(section_routes::SESSION_HEADER),
        ])
        .allow_credentials(true)
}

/// Build the application router over `state`.
pub fn create_app(state: AppState) -> Router {
    let cors = configure_cors();

    Router::new()
        .route("/api/auth/login", post(routes::auth::login))
        .route("/api/auth/verify", post(routes::auth::verify_token))
        .route("/api/auth/logout", post(routes::auth::logout))
        .route("/api/case-studies", get(case_studies::list_case_studies))
        .route("/api/case-studies/{slug}", get(case_studies::get_case_study))
        .route(
            "/api/admin/case-studies",
            post(case_studies::create_case_study),
        )
        .route(
            "/api/admin/case-studies/{case_study}",
            patch(case_studies::update_case_study).delete(case_studies::delete_case_study),
        )
        .route(
            "/api/admin/case-studies/{case_study}/preview",
            get(case_studies::preview_case_study),
        )
        .route(
            "/api/admin/case-studies/{case_study}/sections",
            get(section_routes::list_sections).post(section_routes::add_section),
        )
        .route(
            "/api/admin/case-studies/{case_study}/sections/sync",
            post(section_routes::sync_sections),
        )
        .route(
            "/api/admin/case-studies/{case_study}/sections/revert",
            post(section_routes::revert_sections),
        )
        .route(
            "/api/admin/case-studies/{case_study}/sections/{section_id}",
            patch(section_routes::update_section).delete(section_routes::delete_section),
        )
        .route(
            "/api/admin/case-studies/{case_study}/sections/{section_id}/publish",
            post(section_routes::publish_section),
        )
        .route(
            "/api/admin/case-studies/{case_study}/sections/{section_id}/move",
            post(section_routes::move_section),
        )
        .route(
            "/api/admin/case-studies/{case_study}/open-sections",
            get(section_routes::get_open_sections).put(section_routes::put_open_sections),
        )
        .route("/health", get(health::health_ping))
        .route("/health/detailed", get(health::health_detailed))
        .route("/health/database", get(health::health_database))
        .route("/health/ready", get(health::health_ready))
        .with_state(state)
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        // 2 MB cap on request bodies
        .layer(RequestBodyLimitLayer::new(2 * 1024 * 1024))
        .layer(cors)
}

/// Run the server (used by main).
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Dropping these stops the background log writers.
    let _log_guards = logging::init();

    health::init_start_time();

    let config = AppConfig::from_env();
    let problems = config.production_errors();
    if !problems.is_empty() {
        for problem in &problems {
            tracing::error!("FATAL: {}", problem);
        }
        return Err(problems.join("; ").into());
    }
    if config.is_production()
        && (config.admin_email.is_empty() || config.admin_email == "admin@example.com")
    {
        tracing::warn!("SECURITY: ADMIN_EMAIL is using an insecure default");
    }

    let mut section_store: Option<Arc<dyn SectionStore>> = None;
    if config.database_configured {
        match db::init_pool(None).await {
            Ok(pool) => {
                if let Err(e) = db::run_migrations(&pool).await {
                    tracing::error!("Failed to run database migrations: {}", e);
                }
                section_store = Some(Arc::new(PgSectionStore::new(pool)));
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to initialize database pool: {}. Continuing without database.",
                    e
                );
            }
        }
    } else if config.is_production() {
        tracing::warn!("DATABASE_URL not set. Section editing is unavailable.");
    } else {
        tracing::info!(
            "DATABASE_URL not set. Keeping sections in memory; they are lost on restart."
        );
        section_store = Some(Arc::new(MemorySectionStore::new()));
    }

    let sessions =
        SessionRegistry::with_limits(config.session_idle_ttl, config.max_editor_sessions);
    let app = create_app(AppState::with_sessions(section_store, sessions));

    let addr = config.bind_addr()?;
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
