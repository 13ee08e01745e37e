//! # Phone Survey - Main Application Entry Point
//!
//! This is the main entry point for the phone survey webhook server.
//! A voice platform calls the webhook at every step of a phone call; the server
//! answers with the next instruction (ask a question, record the answer, say goodbye)
//! and keeps survey progress in SQLite.
//!
//! ## Key Rust Concepts Used:
//! - **async/await**: The HTTP server is asynchronous
//! - **web::block**: SQLite calls are blocking, so they run on a separate thread pool
//! - **Result<T, E>**: Startup errors bubble up with `?` and end the process with a message
//! - **trait objects**: The resolver talks to `dyn ParticipantStore`, not to SQLite directly
//!
//! ## Application Architecture:
//! - **config**: Application configuration (TOML files + environment variables)
//! - **questions**: The ordered question bank, loaded once
//! - **store**: Participant/response persistence
//! - **resolver**: The call-step state machine
//! - **flow**: Call flow JSON builder
//! - **report**: Answers paired with questions for the admin view
//! - **voice_api**: Authenticated recording fetches from the voice platform
//! - **state**: Shared application state and metrics
//! - **health**: Health and metrics endpoints
//! - **middleware**: Request logging and metrics
//! - **handlers**: HTTP request handlers
//! - **error**: Error types and HTTP error responses

mod config;
mod error;
mod flow;
mod handlers;
mod health;
mod middleware;
mod questions;
mod report;
mod resolver;
mod state;
mod store;
mod voice_api;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::{Context, Result};
use config::AppConfig;
use questions::QuestionBank;
use resolver::CallStepResolver;
use state::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use store::{ParticipantStore, SqliteParticipantStore};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use voice_api::VoiceApiClient;

/// Global shutdown signal, set by the signal handler task.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

/// The main application entry point.
///
/// ## What this function does:
/// 1. **Loads configuration** from files and environment variables
/// 2. **Sets up logging**
/// 3. **Loads the question bank** and **opens the participant store**
/// 4. **Configures the HTTP server** with middleware and routes
/// 5. **Handles graceful shutdown** when receiving system signals
///
/// Everything built here is immutable for the rest of the process; the
/// participant store is the only thing requests write to.
#[actix_web::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting phone-survey v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);

    let questions = QuestionBank::load(&config.survey.questions_path)?;
    info!(
        "Loaded {} survey questions from {}",
        questions.len(),
        config.survey.questions_path
    );

    let store = SqliteParticipantStore::open(&config.survey.database_path)
        .with_context(|| format!("Failed to open database {}", config.survey.database_path))?;
    if config.survey.create_schema {
        store.init_schema().context("Failed to create survey tables")?;
    }
    info!("Participant store ready at {}", config.survey.database_path);

    if config.voice.api_key.is_none() {
        info!("No voice API key configured, recording playback is disabled");
    }
    let voice_api = VoiceApiClient::new(&config.voice)?;

    let resolver = CallStepResolver::new(Arc::new(store), questions);
    let app_state = AppState::new(config.clone(), resolver, voice_api);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    setup_signal_handlers();

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            // Middleware executes in reverse order for responses
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(middleware::MetricsMiddleware)
            .wrap(middleware::RequestLogging)
            .configure(handlers::configure_routes)
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    // Whichever finishes first: the server (usually an error) or a shutdown signal
    tokio::select! {
        result = server_task => {
            match result {
                Ok(server_result) => {
                    if let Err(e) = server_result {
                        error!("Server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Server task error: {}", e);
                }
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Initialize the tracing (logging) system for the application.
///
/// ## Environment Variables:
/// - `RUST_LOG`: Controls what gets logged (e.g., "debug", "phone_survey=debug")
/// - If not set, defaults to "phone_survey=debug,actix_web=info"
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "phone_survey=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("Failed to initialize tracing")?;

    Ok(())
}

/// Set up signal handlers for graceful shutdown (SIGTERM and SIGINT).
///
/// In-flight webhook requests are allowed to finish, so a call never loses an
/// answer that was already being stored.
fn setup_signal_handlers() {
    tokio::spawn(async {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) = match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            (Err(e), _) | (_, Err(e)) => {
                error!("Failed to install signal handlers: {}", e);
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }

        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

/// Wait for the shutdown signal to be set, checking every 100ms.
async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
