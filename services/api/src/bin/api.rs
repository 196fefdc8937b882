//! services/api/src/bin/api.rs

use axum::{
    http::{header::{ACCEPT, CONTENT_TYPE}, HeaderValue, Method},
    Router,
};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use stories_api::{
    adapters::{DbAdapter, MockStoriesRemote},
    config::Config,
    error::ApiError,
    web::{self, rest::ApiDoc, state::AppState},
};
use stories_core::feed::StoryFeed;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize the Story Feed ---
    let remote = Arc::new(MockStoriesRemote::from_config(&config.remote)?);
    let feed = Arc::new(StoryFeed::new(remote, config.page_size));
    info!(
        page_size = config.page_size,
        delay_ms = config.remote.delay.as_millis() as u64,
        error_rate = config.remote.error_rate,
        "Story feed ready"
    );

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        config: config.clone(),
        feed,
        interactions: db_adapter,
    });

    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("http://localhost:3000"))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    let app = Router::new()
        .merge(web::router(app_state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
