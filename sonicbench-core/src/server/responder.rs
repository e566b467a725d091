// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! The disposable HTTP responder.
//!
//! Answers every method and path with `200 OK` and a fixed short body.

use std::future::Future;
use std::net::SocketAddr;

use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
    Router,
};
use tower_http::trace::TraceLayer;

use crate::types::Port;

/// Body returned for every request.
pub const RESPONSE_BODY: &str = "Hello, World!\r\n";

/// Router with a single fallback handler.
pub fn router() -> Router {
    Router::new()
        .fallback(respond)
        .layer(TraceLayer::new_for_http())
}

async fn respond() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain")],
        RESPONSE_BODY,
    )
}

/// Bind `0.0.0.0:port`.
pub async fn bind(port: Port) -> std::io::Result<tokio::net::TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port.value()));
    tokio::net::TcpListener::bind(addr).await
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve_on<F>(listener: tokio::net::TcpListener, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Responder listening on http://{}", addr);
    }
    axum::serve(listener, router())
        .with_graceful_shutdown(shutdown)
        .await
}

/// Bind and serve until `shutdown` resolves.
pub async fn serve<F>(port: Port, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = bind(port).await?;
    serve_on(listener, shutdown).await
}
