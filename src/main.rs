use axum::{Router, extract::Extension, routing::post};
use class_selection::account::service::AccountService;
use class_selection::api::handlers::{AppState, handle_api};
use class_selection::api::protocol::ENDPOINT_API;
use class_selection::config::ServerConfig;
use class_selection::course::service::CourseService;
use class_selection::session::service::SessionService;
use std::fs::OpenOptions;
use std::sync::Mutex;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let config = match ServerConfig::from_args(&args) {
        Ok(config) => config,
        Err(e) => {
            let program = args.first().map_or("class_selection", String::as_str);
            eprintln!("{}", e);
            eprintln!(
                "Usage: {} [--bind <addr:port>] [--data-dir <path>] [--log-file <path>] [--log-level <level>]",
                program
            );
            std::process::exit(1);
        }
    };

    match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_max_level(config.log_level)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_max_level(config.log_level)
                .init();
        }
    }

    tracing::info!("System starting...");

    // 1. Services, restored from the last snapshot:
    std::fs::create_dir_all(&config.data_dir)?;
    let accounts = AccountService::open(&config.data_dir)?;
    let courses = CourseService::open(&config.data_dir)?;
    let sessions = SessionService::new();
    tracing::info!("All systems initialized from {}", config.data_dir.display());

    // 2. HTTP Router:
    let state = AppState::new(accounts.clone(), courses.clone(), sessions);
    let app = Router::new()
        .route(ENDPOINT_API, post(handle_api))
        .layer(Extension(state));

    // 3. Serve until a shutdown signal arrives:
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("HTTP server listening on {}", config.bind_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("Server gracefully stopped.");

    // 4. Final snapshot:
    let stored_accounts = accounts.store_snapshot(&config.data_dir);
    let stored_courses = courses.store_snapshot(&config.data_dir);
    if stored_accounts.is_err() || stored_courses.is_err() {
        tracing::error!("Shutdown completed with snapshot failures");
        std::process::exit(1);
    }
    tracing::info!("All systems closed.");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::warn!("Shutdown signal received. Starting graceful shutdown...");
}
