use super::handlers::{
    handle_create_post, handle_get_review, handle_health, handle_list_reviews, handle_next,
    handle_now, handle_resume,
};
use super::{AppState, MAX_BODY_SIZE, REQUEST_TIMEOUT_SECS};
use anyhow::{Context, Result};
use axum::{
    Router,
    http::StatusCode,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Serve the gateway until `shutdown` is cancelled.
pub async fn run_gateway(
    host: &str,
    port: u16,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .context("parse gateway bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("bind gateway socket")?;
    let actual_port = listener
        .local_addr()
        .context("get gateway listener local address")?
        .port();

    print_gateway_banner(&format!("{host}:{actual_port}"), state.publisher.is_some());

    let app = build_app(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("serve HTTP gateway")?;

    Ok(())
}

fn print_gateway_banner(display_addr: &str, publisher_enabled: bool) {
    println!("Gateway listening on {display_addr}");
    println!("  GET  /health");
    println!("  GET  /next");
    println!("  GET  /now");
    println!("  POST /posts");
    println!("  GET  /reviews");
    println!("  GET  /reviews/{{id}}");
    println!("  POST /reviews/{{id}}");
    if !publisher_enabled {
        println!("  No uploader command configured; /now is disabled");
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/next", get(handle_next))
        .route("/now", get(handle_now))
        .route("/posts", post(handle_create_post))
        .route("/reviews", get(handle_list_reviews))
        .route("/reviews/{id}", get(handle_get_review).post(handle_resume))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
}
