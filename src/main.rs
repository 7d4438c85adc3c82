//! Civic Reports - citizen report tracking service
//!
//! Serves the JSON API under `/api/v1` and, when built, the admin SPA.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

use civic_reports::{
    api,
    config::{LogFormat, LogTarget, LoggingConfig},
    db, middleware,
    services::AuthService,
    AppConfig, AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        print_help();
        return Ok(());
    }

    if args.iter().any(|arg| arg == "--version" || arg == "-V") {
        println!("Civic Reports {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    if let Some(pos) = args.iter().position(|arg| arg == "--init-config") {
        let path = args
            .get(pos + 1)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("config.yaml"));
        AppConfig::create_default_config(&path)
            .with_context(|| format!("Failed to write {:?}", path))?;
        println!("Wrote default configuration to {:?}", path);
        return Ok(());
    }

    // Logging depends on the configuration, so load it first
    let config = AppConfig::load().context("Failed to load configuration")?;

    // Dropping the guard stops the file writer
    let _log_guard = init_logging(&config.logging);

    info!(version = env!("CARGO_PKG_VERSION"), "Civic Reports starting up");

    info!("Initializing database connection");
    let db = db::init_pool(&config.database)
        .await
        .context("Failed to initialize database")?;

    if let Some(admin) = AuthService::new(db.clone())
        .bootstrap_admin(&config.auth)
        .await
        .context("Failed to create bootstrap administrator")?
    {
        info!(username = %admin.username, "Created bootstrap administrator");
    }

    if config.geocoding.enabled {
        info!(base_url = %config.geocoding.base_url, "Geocoding enabled");
    } else {
        info!("Geocoding is disabled");
    }

    let state = AppState::new(config.clone(), db).context("Failed to initialize services")?;
    let app = create_router(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address configuration")?;

    info!("Starting HTTP server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("HTTP server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Initialize the logging/tracing infrastructure
fn init_logging(
    log_config: &LoggingConfig,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_config.level));

    let (file_writer, guard) = match log_config.target {
        LogTarget::Console => (None, None),
        LogTarget::File | LogTarget::Both => {
            let (writer, guard) = create_file_writer(log_config);
            (Some(writer), Some(guard))
        }
    };
    let to_console = log_config.target != LogTarget::File;

    // Each optional layer is `None` when its output is not wanted
    match log_config.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(to_console.then(|| fmt::layer().json().with_target(true)))
                .with(
                    file_writer
                        .map(|writer| fmt::layer().json().with_target(true).with_writer(writer)),
                )
                .init();
        }
        LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(to_console.then(|| fmt::layer().compact().with_target(false)))
                .with(file_writer.map(|writer| {
                    fmt::layer()
                        .compact()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(writer)
                }))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(to_console.then(|| {
                    fmt::layer()
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false)
                }))
                .with(file_writer.map(|writer| {
                    fmt::layer()
                        .with_target(true)
                        .with_ansi(false)
                        .with_writer(writer)
                }))
                .init();
        }
    }

    guard
}

/// Create a file writer with optional daily rotation
fn create_file_writer(
    log_config: &LoggingConfig,
) -> (
    tracing_appender::non_blocking::NonBlocking,
    tracing_appender::non_blocking::WorkerGuard,
) {
    if let Err(e) = std::fs::create_dir_all(&log_config.log_dir) {
        eprintln!(
            "Warning: Failed to create log directory {:?}: {}",
            log_config.log_dir, e
        );
    }

    let rotation = if log_config.daily_rotation {
        tracing_appender::rolling::Rotation::DAILY
    } else {
        tracing_appender::rolling::Rotation::NEVER
    };

    let mut builder = tracing_appender::rolling::Builder::new()
        .rotation(rotation)
        .filename_prefix(&log_config.log_prefix)
        .filename_suffix("log");
    if log_config.max_log_files > 0 {
        builder = builder.max_log_files(log_config.max_log_files);
    }

    match builder.build(&log_config.log_dir) {
        Ok(appender) => tracing_appender::non_blocking(appender),
        Err(e) => {
            eprintln!("Warning: Failed to open log file, logging to stderr: {}", e);
            tracing_appender::non_blocking(std::io::stderr())
        }
    }
}

/// Create the application router with all routes and middleware
fn create_router(state: AppState, config: &AppConfig) -> Router {
    // Only needed when the SPA is served from another origin during development
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let login_limit = middleware::RateLimitState::new(middleware::login_rate_limit_config());
    middleware::rate_limit::spawn_rate_limit_cleanup(login_limit.clone());

    let api_router = Router::new()
        .nest("/api/v1", api::routes(state.clone(), login_limit))
        .layer(axum::middleware::from_fn(
            middleware::api_cache_control_middleware,
        ))
        .with_state(state);

    let router = match config.server.static_dir {
        Some(ref static_dir) if config.server.serve_frontend && static_dir.exists() => {
            info!("Serving frontend from {:?}", static_dir);
            let index_file = static_dir.join("index.html");
            if index_file.exists() {
                // Client-side routes such as /admin/reportes/{id} fall back to index.html
                api_router.fallback_service(
                    ServeDir::new(static_dir).not_found_service(ServeFile::new(&index_file)),
                )
            } else {
                warn!("index.html not found in {:?}, SPA fallback disabled", static_dir);
                api_router.fallback_service(ServeDir::new(static_dir))
            }
        }
        _ => {
            info!("Frontend not served");
            api_router
        }
    };

    router
        .layer(axum::middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(CompressionLayer::new())
        .layer(trace_layer)
        .layer(cors)
}

fn print_help() {
    println!(
        r#"Civic Reports {}

USAGE:
    civic-reports [OPTIONS]

OPTIONS:
    -h, --help                 Print this help message
    -V, --version              Print version information
    --init-config [PATH]       Write a default configuration file
                               (default: ./config.yaml) and exit

ENVIRONMENT:
    CIVIC_CONFIG               Path to configuration file
    CIVIC_HOST, CIVIC_PORT     Listen address
    DATABASE_URL               SQLite database URL
    JWT_SECRET                 Token signing secret (32+ characters)
    CIVIC_ADMIN_PASSWORD       Password for the first administrator
    CIVIC_GEOCODING_URL        Nominatim base URL
    CIVIC_LOG_FORMAT           pretty, json or compact
    RUST_LOG                   Log filter

CONFIGURATION:
    The application looks for configuration files in the following order:
    1. Path specified by CIVIC_CONFIG
    2. ./config.yaml
    3. ./config/config.yaml
    4. /etc/civic-reports/config.yaml
    5. <user config dir>/civic-reports/config.yaml"#,
        env!("CARGO_PKG_VERSION")
    );
}
