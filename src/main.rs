//! Main entry point for the newsflow backend.
//!
//! Loads settings, opens the SQLite store, and serves the `/api` scope
//! behind CORS, compression, request logging and a per-IP rate limit.

use actix_cors::Cors;
use actix_web::{App, HttpServer, http::header, middleware::Compress, web};
use dotenv::dotenv;
use newsflow_server::{
    AppState, RateLimit, Settings, db, get_subscriber, handlers, init_subscriber, rate_limit,
    telemetry::{NewsRootSpan, RequestLoggingMiddleware},
};
use tracing_actix_web::TracingLogger;

/// Main entry point. Configures and runs the Actix Web server.
///
/// - Loads environment variables from `.env`.
/// - Opens the database and applies migrations.
/// - Starts the session and rate-limit housekeeping task.
/// - Serves until the process receives Ctrl-C.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let subscriber = get_subscriber("newsflow".to_string(), "info".to_string(), std::io::stdout);
    init_subscriber(subscriber)?;

    let settings = Settings::from_env()?;
    let bind_addr = (settings.host.clone(), settings.port);
    let frontend_url = settings.frontend_url.clone();
    let cleanup_interval = settings.session_cleanup_interval;

    let app_state = AppState::new(settings).await?;

    match db::table_stats(&app_state.db).await {
        Ok(stats) => tracing::info!(?stats, "Database ready"),
        Err(e) => tracing::warn!(error = %e, "Could not read table statistics"),
    }

    let rate_limit = RateLimit::new(
        app_state.settings.rate_limit_max,
        app_state.settings.rate_limit_window,
    )
    .trust_proxy(app_state.settings.trust_proxy);

    let housekeeping_db = app_state.db.clone();
    let limiter = rate_limit.limiter();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cleanup_interval);
        loop {
            ticker.tick().await;
            if let Err(e) = db::cleanup_expired_sessions(&housekeeping_db).await {
                tracing::error!(error = %e, "Session cleanup failed");
            }
            rate_limit::prune(&limiter);
        }
    });

    tracing::info!(host = %bind_addr.0, port = bind_addr.1, "Server listening");

    let state = web::Data::new(app_state);
    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend_url)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(state.clone())
            .wrap(RequestLoggingMiddleware::new())
            .wrap(Compress::default())
            .wrap(cors)
            .wrap(TracingLogger::<NewsRootSpan>::new())
            .service(handlers::api_scope().wrap(rate_limit.clone()))
    })
    .bind(bind_addr)?
    .run();

    let srv_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Shutdown signal received");
            srv_handle.stop(true).await;
        }
        res = server_task => {
            match res {
                Ok(Err(e)) => tracing::error!(error = %e, "Server exited with error"),
                Err(e) => tracing::error!(error = %e, "Server task failed"),
                Ok(Ok(())) => {}
            }
        }
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}
