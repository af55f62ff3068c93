//! Anchorchat server - chat orchestration for embedded support widgets.
//!
//! This binary serves the public chat API consumed by the widget script
//! tenants embed on their storefronts.
//!
//! # Architecture
//!
//! - Axum web framework serving a JSON API
//! - `OpenAI` chat completions with function calling
//! - WooCommerce / Shopify adapters for live product and order data
//! - `PostgreSQL` with pgvector for conversations and semantic content search

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use sentry::integrations::tracing as sentry_tracing;
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use anchorchat_server::commerce::CachingCommerceResolver;
use anchorchat_server::config::ServerConfig;
use anchorchat_server::db::{self, ConversationRepository, TenantRepository};
use anchorchat_server::model::OpenAiClient;
use anchorchat_server::routes;
use anchorchat_server::search::{EmbeddingClient, PgSemanticIndex};
use anchorchat_server::services::{ChatService, RateLimitService};
use anchorchat_server::state::AppState;

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ServerConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
            traces_sample_rate: config.sentry_traces_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = ServerConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Initialize tracing with EnvFilter and Sentry integration
    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "anchorchat_server=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    // Initialize database connection pool
    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");
    tracing::info!("Database pool created");

    // NOTE: Migrations are NOT run automatically on startup.
    // Run them explicitly via: cargo run -p anchorchat-cli -- migrate

    let (app, addr) = build_app(config, pool);

    // Start server
    tracing::info!("chat server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

/// Wire services and build the router.
fn build_app(config: ServerConfig, pool: PgPool) -> (Router, std::net::SocketAddr) {
    let addr = config.socket_addr();

    let store = Arc::new(ConversationRepository::new(pool.clone()));
    let tenants = Arc::new(TenantRepository::new(pool.clone()));
    let model = Arc::new(OpenAiClient::new(&config.openai));
    let resolver = Arc::new(CachingCommerceResolver::new());
    let embeddings = EmbeddingClient::new(&config.openai.api_key, &config.openai.embedding_model);
    let index = Arc::new(PgSemanticIndex::new(embeddings, pool.clone()));
    let rate_limit = Arc::new(RateLimitService::new(
        config.rate_limit.per_minute,
        config.rate_limit.burst,
    ));

    let chat = Arc::new(ChatService::new(
        store.clone(),
        tenants,
        model,
        resolver,
        index,
        rate_limit,
    ));

    let state = AppState::new(config, chat, store);

    let router = routes::router(state)
        .route("/health/ready", get(readiness).with_state(pool))
        // Widget runs on tenant storefronts, so any origin may call the API
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    (router, addr)
}

/// Readiness health check endpoint.
///
/// Verifies database connectivity before returning OK.
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(pool): State<PgPool>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(&pool).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
