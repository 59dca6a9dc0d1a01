use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use doorlock_server::{configure_routes, AppState, Settings};
use dotenv::dotenv;
use std::net::TcpListener;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(60);

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    // Load configuration
    let config = Settings::new().context("failed to load configuration")?;
    info!("Configuration loaded successfully ({} mode)", config.environment);
    info!(
        "Actuator: {:?}, auto-lock after {}ms",
        config.actuator.kind, config.lock.auto_lock_delay_ms
    );

    let state = AppState::new(config.clone())?;

    // Put the bolt in a known position before serving anything
    if let Err(e) = state.lock.initialize().await {
        error!("Initial lock sequence failed, starting in fault state: {}", e);
    }

    // Auto-lock driver
    let auto_lock_state = state.clone();
    let poll = Duration::from_millis(config.lock.poll_interval_ms.max(10));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll);
        loop {
            ticker.tick().await;
            if let Err(e) = auto_lock_state.lock.check_auto_lock().await {
                error!("Auto-lock failed: {}", e);
            }
        }
    });

    // Session and lockout table cleanup
    let housekeeping_state = state.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(HOUSEKEEPING_INTERVAL).await;
            let (sessions, records) = housekeeping_state.housekeeping().await;
            if sessions > 0 || records > 0 {
                info!("Housekeeping removed {} sessions and {} idle client records", sessions, records);
            }
        }
    });

    // Create and bind TCP listener
    let listener = TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))?;
    info!("Door lock server listening on {}:{}", config.server.host, config.server.port);
    if config.server.trusted_ips.is_empty() {
        warn!("No trusted_ips configured, accepting requests from any address");
    }

    let state = web::Data::new(state);
    let cors_config = config.cors.clone();

    HttpServer::new(move || {
        let cors = if cors_config.enabled {
            let cors = if cors_config.allow_any_origin {
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
            } else {
                // Same-origin page only
                Cors::default()
                    .allowed_methods(vec!["GET", "POST"])
                    .allowed_headers(vec!["Authorization", "Content-Type"])
            };
            cors.max_age(cors_config.max_age as usize)
        } else {
            Cors::permissive()
        };

        App::new()
            .wrap(cors)
            .app_data(state.clone())
            .configure(configure_routes)
    })
    .listen(listener)?
    .workers(config.server.workers.max(1) as usize)
    .run()
    .await?;

    Ok(())
}
