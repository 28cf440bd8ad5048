//! Main Entrypoint for the Concierge API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Loading the assistant's system prompt.
//! 3. Initializing shared services (call registry and Twilio client).
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use concierge_api::{config::Config, router::create_router, state::AppState};
use concierge_core::{
    call_control::{CallControl, TwilioCallControl},
    registry::{DEFAULT_CAPACITY, SessionRegistry},
};
use std::{net::SocketAddr, path::Path, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C; shutting down.");
        return;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// Reads `system_prompt.md` from the prompts directory.
fn load_system_prompt(prompts_path: &Path) -> anyhow::Result<String> {
    let path = prompts_path.join("system_prompt.md");
    let prompt = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read system prompt from {}", path.display()))?;
    anyhow::ensure!(
        !prompt.trim().is_empty(),
        "System prompt at {} is empty",
        path.display()
    );
    Ok(prompt.trim().to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    let system_prompt = Arc::new(load_system_prompt(&config.prompts_path)?);

    // --- 3. Initialize Shared Services ---
    let http_client = reqwest::Client::builder()
        .user_agent(concat!("concierge-api/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;
    let call_control: Arc<dyn CallControl> = Arc::new(TwilioCallControl::new(
        http_client.clone(),
        config.twilio_api_base.clone(),
        config.twilio_account_sid.clone(),
        config.twilio_auth_token.clone(),
    ));
    let registry = Arc::new(SessionRegistry::new(config.registry_ttl, DEFAULT_CAPACITY));

    let app_state = Arc::new(AppState {
        config: Arc::new(config.clone()),
        registry,
        call_control,
        http_client,
        system_prompt,
    });

    // --- 4. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 5. Start Server ---
    info!(
        bind_address = %config.bind_address,
        media_stream_url = %config.media_stream_url,
        voice = %config.voice,
        silence_timeout_secs = config.silence_timeout.as_secs(),
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
