mod middleware;
mod proxy;
mod routes;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::http::Method;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::routing::{get, post};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use onhub_store::local::LocalStore;

use crate::routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "onhub_server=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let api_key = std::env::var("ONHUB_API_KEY").unwrap_or_default();
    if api_key.is_empty() {
        eprintln!("FATAL: ONHUB_API_KEY is unset.");
        eprintln!("       Clients authenticate with this key in the X-OnHub-Key header.");
        eprintln!("       Set it in your .env file and restart.");
        std::process::exit(1);
    }

    let host = std::env::var("ONHUB_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("ONHUB_PORT")
        .unwrap_or_else(|_| "8090".into())
        .parse()?;
    let db_path: PathBuf = std::env::var("ONHUB_DB_PATH")
        .unwrap_or_else(|_| "onhub.db".into())
        .into();
    let admin_user = std::env::var("ONHUB_ADMIN_USER").unwrap_or_else(|_| "admin".into());
    let admin_password = std::env::var("ONHUB_ADMIN_PASSWORD").unwrap_or_else(|_| "123456".into());

    let store = Arc::new(LocalStore::open(&db_path)?);

    let state = AppState {
        store,
        api_key,
        admin_user,
        admin_password,
        http: reqwest::Client::new(),
    };

    // CORS — permissive; browser clients connect from arbitrary origins and
    // the proxy route exists precisely to answer preflights
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            middleware::API_KEY_HEADER_NAME,
        ])
        .allow_credentials(false);

    let app = Router::new()
        .nest("/wp-json/onhub/v1", routes::api_router(state.clone()))
        .route("/health", get(routes::health))
        .route("/api/wp-proxy", post(proxy::wp_proxy))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("OnHub server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
