//! Shared helpers for integration tests

#![allow(dead_code)]

use axum::Router;
use std::sync::Arc;
use toolwire_core::{HttpTransport, SessionStore};

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server");
    });
    format!("http://{addr}")
}

pub fn transport(base_url: &str) -> (HttpTransport, Arc<SessionStore>) {
    let session = Arc::new(SessionStore::in_memory());
    (HttpTransport::new(base_url, session.clone()), session)
}

pub fn params(value: serde_json::Value) -> toolwire_core::Params {
    value.as_object().cloned().unwrap_or_default()
}
