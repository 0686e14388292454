use std::sync::Arc;

use axum::routing::{delete, get, patch, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use zapa::handlers::{admin_handlers, auth_handlers, integration_handlers, llm_config_handlers, message_handlers};
use zapa::webhook::{self, WebhookState};
use zapa::{config::Config, supervisor, AppState};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,zapa=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_line_number(true).init();

    let config = Config::from_env().expect("invalid configuration");
    let port = config.port;
    let cors_origins = config.cors_origins.clone();
    let webhook_secret = config.webhook_secret.clone();

    let bootstrapped = match supervisor::bootstrap(config).await {
        Ok(b) => b,
        Err(e) => {
            tracing::error!(error = %e, "startup failed, exiting");
            std::process::exit(1);
        }
    };
    let state = bootstrapped.state;

    let webhook_state = Arc::new(WebhookState::new(
        state.users.clone(),
        state.messages.clone(),
        state.sessions.clone(),
        state.agent_pool.clone(),
        state.config.webhook_base_url.clone(),
        webhook_secret,
        bootstrapped.system_user_id,
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    for worker_id in 0..state.config.worker_count.max(1) {
        tokio::spawn(supervisor::run_outbound_worker(state.clone(), worker_id, shutdown_rx.clone()));
    }
    tokio::spawn(supervisor::run_health_probe(state.clone(), shutdown_rx.clone()));

    let public_routes = Router::new()
        .route("/api/v1/auth/request-code", post(auth_handlers::request_code))
        .route("/api/v1/auth/verify", post(auth_handlers::verify))
        .route("/api/v1/auth/me", get(auth_handlers::me))
        .route("/api/v1/messages", get(message_handlers::list))
        .route("/api/v1/messages/stats", get(message_handlers::stats))
        .route("/api/v1/llm-config", get(llm_config_handlers::list).put(llm_config_handlers::put))
        .route("/api/v1/llm-config/{id}", delete(llm_config_handlers::delete))
        .route("/api/v1/llm-config/test", post(llm_config_handlers::test))
        .with_state(state.clone());

    let admin_routes = Router::new()
        .route("/admin/auth/login", post(admin_handlers::login))
        .route("/admin/users", get(admin_handlers::list_users))
        .route(
            "/admin/users/{id}",
            get(admin_handlers::get_user).patch(admin_handlers::update_user).delete(admin_handlers::delete_user),
        )
        .route("/admin/integration/health", get(integration_handlers::health))
        .route("/admin/integration/reinitialize", post(integration_handlers::reinitialize))
        .route("/admin/integration/queue/stats", get(integration_handlers::queue_stats))
        .route("/admin/integration/queue/clear-failed", post(integration_handlers::queue_clear_failed))
        .route("/admin/integration/queue/requeue-failed", post(integration_handlers::queue_requeue_failed))
        .with_state(state.clone());

    let webhook_routes =
        Router::new().route("/webhooks/whatsapp", post(webhook::handle_webhook)).with_state(webhook_state);

    let cors = CorsLayer::new()
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST, axum::http::Method::PATCH, axum::http::Method::DELETE])
        .allow_origin(AllowOrigin::list(cors_origins.iter().filter_map(|o| o.parse().ok())))
        .allow_headers([axum::http::header::CONTENT_TYPE, axum::http::header::AUTHORIZATION])
        .allow_credentials(true);

    let app = Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .merge(webhook_routes)
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::new().level(Level::INFO)).on_response(DefaultOnResponse::new().level(Level::INFO)))
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await.expect("failed to bind listener");
    tracing::info!(port, "zapa listening");

    let server = axum::serve(listener, app.into_make_service()).with_graceful_shutdown(shutdown_signal());
    if let Err(e) = server.await {
        tracing::error!(error = %e, "server error");
    }

    let _ = shutdown_tx.send(true);
    tracing::info!("shutdown complete");
}

async fn health_check() -> &'static str {
    "OK"
}

async fn shutdown_signal() {
    let ctrl_c = async { tokio::signal::ctrl_c().await.expect("failed to install ctrl+c handler") };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).expect("failed to install signal handler").recv().await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received");
}
