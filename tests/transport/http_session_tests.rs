// HTTP transport tests against a local axum server
//
// Session affinity, request shapes and error statuses.

#[path = "../common/mod.rs"]
mod common;

use axum::Router;
use axum::extract::{Json, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use common::{params, spawn_server, transport};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::tempdir;
use toolwire_core::infrastructure::transport::OutboundCall;
use toolwire_core::{
    EndpointDescriptor, FileSessionBackend, HttpTransport, SessionStore, StreamFrame, Transport,
    TransportError, TransportOutcome,
};

fn session_header(headers: &HeaderMap) -> Value {
    headers
        .get("x-session-id")
        .and_then(|value| value.to_str().ok())
        .map_or(Value::Null, |value| Value::String(value.to_string()))
}

async fn echo(headers: HeaderMap, Json(body): Json<Value>) -> ([(&'static str, &'static str); 1], Json<Value>) {
    (
        [("x-session-id", "srv-1")],
        Json(json!({
            "received_session": session_header(&headers),
            "client": headers.get("x-client").and_then(|v| v.to_str().ok()),
            "body": body,
        })),
    )
}

async fn search(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    Json(json!({ "query": query }))
}

async fn failing() -> (StatusCode, &'static str) {
    (StatusCode::SERVICE_UNAVAILABLE, "model loading")
}

fn router() -> Router {
    Router::new()
        .route("/echo", post(echo))
        .route("/search", get(search))
        .route("/fail", post(failing))
}

async fn call(
    transport: &HttpTransport,
    endpoint: &EndpointDescriptor,
    path: &str,
    body: Value,
) -> Result<TransportOutcome, TransportError> {
    let params = params(body);
    let mut ignore = |_frame: StreamFrame| {};
    transport
        .execute(
            OutboundCall {
                endpoint,
                path,
                params: &params,
            },
            &mut ignore,
        )
        .await
}

#[tokio::test]
async fn server_assigned_session_is_sent_back() {
    let base_url = spawn_server(router()).await;
    let (transport, session) = transport(&base_url);
    let endpoint = EndpointDescriptor::post("/echo");

    let first = call(&transport, &endpoint, "/echo", json!({"input": "hi"}))
        .await
        .expect("first call");
    assert_eq!(
        first,
        TransportOutcome::Reply(json!({
            "received_session": null,
            "client": null,
            "body": {"input": "hi"},
        }))
    );
    assert_eq!(session.current().as_deref(), Some("srv-1"));

    let second = call(&transport, &endpoint, "echo", json!({})).await.expect("second call");
    let TransportOutcome::Reply(reply) = second else {
        panic!("expected a single-shot reply");
    };
    assert_eq!(reply["received_session"], json!("srv-1"));
}

#[tokio::test]
async fn session_token_is_persisted_to_disk() {
    let base_url = spawn_server(router()).await;
    let dir = tempdir().expect("tempdir");
    let session = Arc::new(SessionStore::new(Arc::new(FileSessionBackend::new(dir.path()))));
    let transport = HttpTransport::new(base_url.as_str(), session);

    call(&transport, &EndpointDescriptor::post("/echo"), "/echo", json!({}))
        .await
        .expect("call");

    let restarted = SessionStore::new(Arc::new(FileSessionBackend::new(dir.path())));
    assert_eq!(restarted.load().as_deref(), Some("srv-1"));
}

#[tokio::test]
async fn global_and_endpoint_headers_are_sent() {
    let base_url = spawn_server(router()).await;
    let (transport, _) = transport(&format!("{base_url}/"));
    let transport = transport.with_headers(vec![("x-client".into(), "toolwire".into())]);

    let outcome = call(&transport, &EndpointDescriptor::post("/echo"), "/echo", json!({}))
        .await
        .expect("call");
    let TransportOutcome::Reply(reply) = outcome else {
        panic!("expected a single-shot reply");
    };
    assert_eq!(reply["client"], json!("toolwire"));
}

#[tokio::test]
async fn get_endpoints_send_query_parameters() {
    let base_url = spawn_server(router()).await;
    let (transport, _) = transport(&base_url);

    let outcome = call(
        &transport,
        &EndpointDescriptor::get("/search"),
        "/search",
        json!({"q": "llama", "limit": 3}),
    )
    .await
    .expect("call");
    assert_eq!(
        outcome,
        TransportOutcome::Reply(json!({"query": {"q": "llama", "limit": "3"}}))
    );
}

#[tokio::test]
async fn request_and_response_transforms_shape_the_exchange() {
    let base_url = spawn_server(router()).await;
    let (transport, _) = transport(&base_url);
    let endpoint = EndpointDescriptor::post("/echo")
        .with_request_transform(|params| json!({"prompt": params["input"]}))
        .with_response_transform(|reply| reply["body"]["prompt"].clone());

    let outcome = call(&transport, &endpoint, "/echo", json!({"input": "draw a cat"}))
        .await
        .expect("call");
    assert_eq!(outcome, TransportOutcome::Reply(json!("draw a cat")));
}

#[tokio::test]
async fn error_status_carries_body() {
    let base_url = spawn_server(router()).await;
    let (transport, _) = transport(&base_url);

    let err = call(&transport, &EndpointDescriptor::post("/fail"), "/fail", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TransportError::Status { status: 503, ref body, .. } if body == "model loading"
    ));
}

#[tokio::test]
async fn unreachable_backend_is_a_network_error() {
    let (transport, _) = transport("http://127.0.0.1:9");
    let err = call(&transport, &EndpointDescriptor::post("/echo"), "/echo", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Network { .. }));
}
