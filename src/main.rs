//! Campus sync service
//!
//! Offline-first sync of the shared timetable sheet with background change
//! detection and local notifications.

mod api;
mod auth;
mod cache;
mod config;
mod db;
mod errors;
mod models;
mod notifier;
mod schedule;
mod scheduler;
mod sheets;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use chrono::{Local, NaiveDateTime};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cache::ResourceCache;
use config::{Config, LogFormat};
use db::{KeyValueStore, Repository};
use notifier::Notifier;
use schedule::TimePolicy;
use scheduler::{BackgroundHost, BackgroundOptions, PeriodicScheduler, TokioBackgroundHost};
use sheets::{HttpSheetSource, SheetSource};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<ResourceCache>,
    pub notifier: Arc<Notifier>,
    pub scheduler: Arc<PeriodicScheduler>,
    pub repo: Arc<Repository>,
    pub config: Arc<Config>,
    /// Local wall clock used for "today" and "now".
    pub now: fn() -> NaiveDateTime,
}

pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Wire the cache, notifier and scheduler around one repository.
pub fn build_state(
    config: Config,
    repo: Arc<Repository>,
    source: Arc<dyn SheetSource>,
    host: Arc<dyn BackgroundHost>,
) -> AppState {
    let store: Arc<dyn KeyValueStore> = repo.clone();
    let cache = ResourceCache::new(source, store.clone());
    let notifier = Arc::new(Notifier::new(
        cache.clone(),
        store,
        repo.clone(),
        TimePolicy::from_strict(config.strict_times),
    ));
    let options = BackgroundOptions {
        minimum_interval: config.poll_interval,
        ..BackgroundOptions::default()
    };
    let scheduler = Arc::new(PeriodicScheduler::new(host, notifier.clone(), options));

    AppState {
        cache: Arc::new(cache),
        notifier,
        scheduler,
        repo,
        config: Arc::new(config),
        now: local_now,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let json = config.log_format == LogFormat::Json;
    tracing_subscriber::registry()
        .with(env_filter)
        .with((!json).then(tracing_subscriber::fmt::layer))
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .init();

    tracing::info!("Starting campus sync service");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Sheet: {}/{}", config.sheet_base_url, config.sheet_id);
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::debug!("Log format: {}", config.log_format);

    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (CAMPUS_API_PSK). Authentication is disabled!");
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    let source = Arc::new(HttpSheetSource::new(
        &config.sheet_base_url,
        &config.sheet_id,
        config.http_timeout,
    )?);
    let host = Arc::new(TokioBackgroundHost::new(config.background_policy));

    let bind_addr = config.bind_addr;
    let state = build_state(config, repo, source, host);

    // Re-arm the periodic tick on every start
    match state.scheduler.register().await {
        Ok(registration) => tracing::info!("Background task: {:?}", registration),
        Err(e) => tracing::warn!("Continuing without background notifications: {}", e),
    }

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let psk = state.config.api_psk.clone();

    let api_routes = Router::new()
        // Tabs
        .route("/resources/{kind}", get(api::get_resource))
        // Timetable
        .route("/schedule/today", get(api::get_today_schedule))
        .route("/schedule/current", get(api::get_current_session))
        .route("/schedule/week", get(api::get_week_schedule))
        // Alerts and shared todos
        .route("/alerts", get(api::get_alerts))
        .route("/todos/shared", get(api::get_shared_todos))
        // Notifier
        .route("/notifier/tick", post(api::run_tick))
        .route("/notifications", get(api::list_notifications))
        // Background registration
        .route(
            "/background",
            get(api::get_background_status)
                .post(api::register_background)
                .delete(api::unregister_background),
        )
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
