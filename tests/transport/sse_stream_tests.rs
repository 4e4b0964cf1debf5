// Streaming transport tests
//
// The server writes SSE frames in deliberately awkward chunks: frames split
// mid-payload, several frames per chunk, multibyte characters cut in half.

#[path = "../common/mod.rs"]
mod common;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::routing::post;
use common::{spawn_server, transport};
use futures::stream;
use serde_json::json;
use std::convert::Infallible;
use toolwire_core::infrastructure::transport::OutboundCall;
use toolwire_core::{
    EndpointDescriptor, Params, StreamFrame, StreamOutcome, Transport, TransportOutcome,
};

fn chunked(chunks: Vec<Vec<u8>>) -> Body {
    Body::from_stream(stream::iter(
        chunks.into_iter().map(|chunk| Ok::<_, Infallible>(Bytes::from(chunk))),
    ))
}

fn router() -> Router {
    let accented = "data: {\"content\": \"été\"}\n".as_bytes().to_vec();
    let (head, tail) = accented.split_at(20);
    let (head, tail) = (head.to_vec(), tail.to_vec());

    Router::new()
        .route(
            "/progress",
            post(|| async {
                chunked(vec![
                    b"data: {\"progress\": 0.25, \"status\": \"loading\"}\n\ndata: {\"prog".to_vec(),
                    b"ress\": 1.0}\n\n".to_vec(),
                    b"data: {'content': 'ready'}\n".to_vec(),
                    b"data: not json\n".to_vec(),
                    b": keep-alive\n".to_vec(),
                    b"data: [DONE]\n".to_vec(),
                    b"data: {\"content\": \"ignored\"}\n".to_vec(),
                ])
            }),
        )
        .route(
            "/openai",
            post(move || {
                let head = head.clone();
                let tail = tail.clone();
                async move {
                    chunked(vec![
                        b"data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\r\n".to_vec(),
                        b"data: {\"choices\":[{\"delta\":{\"content\":\"Bon\"}}]}\r\n".to_vec(),
                        b"data: {\"choices\":[{\"delta\":{\"content\":\"jour\"}}]}\r\n".to_vec(),
                        head,
                        tail,
                        b"data: [DONE]\r\n".to_vec(),
                    ])
                }
            }),
        )
        .route(
            "/truncated",
            post(|| async {
                chunked(vec![
                    b"data: {\"content\": \"partial\"}\n".to_vec(),
                    b"data: {\"content\": \"tail\"}".to_vec(),
                ])
            }),
        )
}

async fn collect(
    base_url: &str,
    endpoint: EndpointDescriptor,
) -> (Vec<StreamFrame>, StreamOutcome) {
    let (transport, _) = transport(base_url);
    let params = Params::new();
    let mut frames = Vec::new();
    let mut sink = |frame: StreamFrame| frames.push(frame);
    let outcome = transport
        .execute(
            OutboundCall {
                endpoint: &endpoint,
                path: &endpoint.path,
                params: &params,
            },
            &mut sink,
        )
        .await
        .expect("stream call");
    let TransportOutcome::Stream(outcome) = outcome else {
        panic!("expected a streaming outcome");
    };
    (frames, outcome)
}

#[tokio::test]
async fn frames_are_reassembled_across_reads() {
    let base_url = spawn_server(router()).await;
    let (frames, outcome) = collect(&base_url, EndpointDescriptor::post("/progress").streaming()).await;

    assert_eq!(
        frames,
        vec![
            StreamFrame::Progress {
                value: 0.25,
                status: Some("loading".into())
            },
            StreamFrame::Progress {
                value: 1.0,
                status: None
            },
            StreamFrame::Delta("ready".into()),
        ]
    );
    assert_eq!(
        outcome,
        StreamOutcome {
            completed: true,
            delivered: 3,
            dropped: 1,
            skipped: 0,
        }
    );
}

#[tokio::test]
async fn chunk_transform_extracts_openai_deltas() {
    let base_url = spawn_server(router()).await;
    let endpoint = EndpointDescriptor::post("/openai")
        .streaming()
        .with_chunk_transform(|chunk| {
            chunk
                .pointer("/choices/0/delta/content")
                .and_then(|value| value.as_str())
                .map(str::to_string)
        });
    let (frames, outcome) = collect(&base_url, endpoint).await;

    assert_eq!(
        frames,
        vec![
            StreamFrame::Delta("Bon".into()),
            StreamFrame::Delta("jour".into()),
            StreamFrame::Delta("été".into()),
        ]
    );
    assert!(outcome.completed);
    assert_eq!(outcome.skipped, 1);
}

#[tokio::test]
async fn stream_without_sentinel_is_reported_incomplete() {
    let base_url = spawn_server(router()).await;
    let (frames, outcome) = collect(&base_url, EndpointDescriptor::post("/truncated").streaming()).await;

    assert_eq!(
        frames,
        vec![
            StreamFrame::Delta("partial".into()),
            StreamFrame::Delta("tail".into()),
        ]
    );
    assert!(!outcome.completed);
}

#[tokio::test]
async fn classify_matches_backend_shapes() {
    assert_eq!(
        StreamFrame::classify(json!({"error": "out of memory"})),
        StreamFrame::Error("out of memory".into())
    );
    assert_eq!(
        StreamFrame::classify(json!({"status": "queued"})),
        StreamFrame::Status("queued".into())
    );
    assert_eq!(
        StreamFrame::classify(json!({"id": 7})),
        StreamFrame::Payload(json!({"id": 7}))
    );
}
