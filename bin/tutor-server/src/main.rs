//! tutor-server – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables.
//! 2. Initialise tracing (pretty or JSON, stdout or a daily log file).
//! 3. Render the system instruction from its versioned template.
//! 4. Build shared state and start the rate-limit sweeper.
//! 5. Build the Axum router and serve it with graceful shutdown.

mod config;
mod error;
mod limiter;
mod middleware;
mod prompt;
mod relay;
mod routes;
mod schemas;
mod state;
mod upstream;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::config::Config;
use crate::prompt::PromptTemplate;
use crate::state::AppState;
use crate::upstream::GeminiBackend;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = Config::from_env();

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    // Held until exit so buffered file logs are flushed.
    let _log_guard = init_tracing(&cfg);

    info!(version = env!("CARGO_PKG_VERSION"), "tutor-server starting");

    // ── 3. System instruction ──────────────────────────────────────────────────
    let template = match &cfg.prompt_file {
        Some(path) => PromptTemplate::from_file(path)?,
        None => PromptTemplate::builtin(),
    };
    let system_prompt = template
        .render(&cfg.end_marker)
        .with_context(|| format!("rendering prompt {}", template.name()))?;
    info!(
        prompt = template.name(),
        prompt_version = template.version(),
        end_marker = %cfg.end_marker,
        "system instruction ready"
    );

    if std::env::var_os("GEMINI_API_KEY").is_none() {
        warn!("GEMINI_API_KEY is not set; every solve request will fail upstream");
    }

    // ── 4. Shared application state ────────────────────────────────────────────
    let addr: SocketAddr = cfg
        .bind_address
        .parse()
        .with_context(|| format!("invalid TUTOR_BIND address {:?}", cfg.bind_address))?;
    info!(
        model = %cfg.model,
        rate_window_secs = cfg.rate_window.as_secs(),
        rate_max_requests = cfg.rate_max_requests,
        trust_forwarded = cfg.trust_forwarded,
        "configuration loaded"
    );

    let state = Arc::new(AppState::new(
        cfg,
        Arc::new(GeminiBackend::new()),
        system_prompt,
    ));
    let sweeper = state.limiter.spawn_sweeper();

    // ── 5. HTTP server with graceful shutdown ──────────────────────────────────
    let app = routes::build(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.abort();
    info!("tutor-server stopped");
    Ok(())
}

/// Install the global subscriber.  Returns the file writer guard, if any.
fn init_tracing(cfg: &Config) -> Option<WorkerGuard> {
    // Warn loudly if the configured filter does not parse.
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: TUTOR_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let (writer, guard) = match &cfg.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "tutor-server.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stdout), None),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(writer)
        .with_ansi(cfg.log_dir.is_none())
        .with_target(true)
        .with_thread_ids(true);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    guard
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; draining in-flight streams");
}
