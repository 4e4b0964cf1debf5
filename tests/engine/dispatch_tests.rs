// End-to-end dispatch tests
//
// Catalog from TOML, real HTTP transport against a local axum server, and
// conversations persisted by the file store.

#[path = "../common/mod.rs"]
mod common;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::{Json, Path};
use axum::http::HeaderMap;
use axum::routing::post;
use common::{params, spawn_server};
use futures::stream;
use serde_json::{Value, json};
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;
use toolwire_core::config::parse_config;
use toolwire_core::{
    ActionEngine, ActionKind, ConversationStore, DispatchError, DispatchOutcome, HttpTransport,
    MessageStatus, Notifier, NoticeKind, SessionStore, TransformRegistry,
};
use toolwire_session::FileConversationStore;

#[derive(Default)]
struct Requests {
    bodies: Mutex<Vec<Value>>,
}

fn router(requests: Arc<Requests>) -> Router {
    let chat = {
        let requests = requests.clone();
        move |headers: HeaderMap, Json(body): Json<Value>| {
            let requests = requests.clone();
            async move {
                let first_contact = headers.get("x-session-id").is_none();
                requests.bodies.lock().unwrap().push(body);
                let frames = vec![
                    "data: {\"choices\":[{\"delta\":{\"content\":\"Bon\"}}]}\n",
                    "data: {\"choices\":[{\"delta\":{\"content\":\"jour\"}}]}\n",
                    "data: [DONE]\n",
                ];
                let body = Body::from_stream(stream::iter(
                    frames
                        .into_iter()
                        .map(|frame| Ok::<_, Infallible>(Bytes::from_static(frame.as_bytes()))),
                ));
                let session = if first_contact { "sess-42" } else { "" };
                ([("x-session-id", session)], body)
            }
        }
    };
    let load = {
        let requests = requests.clone();
        move |Path(model): Path<String>| {
            let requests = requests.clone();
            async move {
                requests.bodies.lock().unwrap().push(json!({"loaded": model}));
                Json(json!({"status": "ok"}))
            }
        }
    };

    Router::new()
        .route("/chat/{conversation_id}", post(chat))
        .route("/models/{model}/load", post(load))
        .route(
            "/broken",
            post(|| async { (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "kaboom") }),
        )
}

fn catalog_toml(base_url: &str) -> String {
    format!(
        r#"
base_url = "{base_url}"

[[tools]]
id = "chat"

[[tools.fields]]
name = "model"
kind = "choice"
required = true
on_select = "load_model"

[[tools.actions]]
type = "send"
requires_input = true
endpoint = {{ path = "/chat/{{conversation_id}}", stream = true, chunk = "openai_delta" }}

[[tools.actions]]
type = "generate"
api_error = "Génération impossible."
endpoint = {{ path = "/broken" }}

[tools.api.load_model]
path = "/models/{{model}}/load"
"#
    )
}

#[derive(Default)]
struct Notices(Mutex<Vec<String>>);

impl Notifier for Notices {
    fn notify(&self, _kind: NoticeKind, message: &str, _permanent: bool) {
        self.0.lock().unwrap().push(message.to_string());
    }
}

struct Setup {
    engine: ActionEngine,
    storage: Arc<FileConversationStore>,
    session: Arc<SessionStore>,
    requests: Arc<Requests>,
    notices: Arc<Notices>,
    _dir: tempfile::TempDir,
}

async fn setup() -> Setup {
    let requests = Arc::new(Requests::default());
    let base_url = spawn_server(router(requests.clone())).await;
    let config = parse_config(&catalog_toml(&base_url), &TransformRegistry::with_builtins())
        .expect("catalog");

    let dir = tempdir().expect("tempdir");
    let storage = Arc::new(FileConversationStore::new(dir.path().join("conversations")));
    let session = Arc::new(SessionStore::in_memory());
    let transport = HttpTransport::new(config.settings.base_url.clone(), session.clone());
    let notices = Arc::new(Notices::default());
    let engine = ActionEngine::new(Arc::new(config.catalog), Arc::new(transport), storage.clone())
        .with_notifier(notices.clone())
        .with_options(config.settings.engine_options());

    Setup {
        engine,
        storage,
        session,
        requests,
        notices,
        _dir: dir,
    }
}

#[tokio::test]
async fn streamed_reply_is_folded_and_persisted() {
    let s = setup().await;
    s.engine.update_config("chat", params(json!({"model": "mistral"})));
    s.engine.set_input("chat", "Dis bonjour");

    let outcome = s
        .engine
        .dispatch("chat", ActionKind::Send, Default::default())
        .await
        .expect("dispatch");

    let DispatchOutcome::Completed {
        conversation_id,
        reply,
        completed,
    } = outcome
    else {
        panic!("expected a completed conversation action");
    };
    assert_eq!(reply, "Bonjour");
    assert!(completed);

    let messages = s.engine.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].content, "Dis bonjour");
    assert_eq!(messages[0].status, MessageStatus::Sent);
    assert_eq!(messages[1].content, "Bonjour");

    let stored = s.storage.load_conversation(&conversation_id).await.expect("stored");
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].status, MessageStatus::Sent);
    assert_eq!(stored[1].content, "Bonjour");

    let bodies = s.requests.bodies.lock().unwrap().clone();
    assert_eq!(bodies[0]["input"], json!("Dis bonjour"));
    assert_eq!(bodies[0]["model"], json!("mistral"));
    assert_eq!(bodies[0]["conversation_id"], json!(conversation_id));

    assert_eq!(s.session.current().as_deref(), Some("sess-42"));
    assert!(!s.engine.is_generating());
}

#[tokio::test]
async fn follow_up_keeps_conversation_and_session() {
    let s = setup().await;
    s.engine.update_config("chat", params(json!({"model": "mistral"})));

    s.engine.set_input("chat", "un");
    s.engine.dispatch("chat", ActionKind::Send, Default::default()).await.expect("first");
    s.engine.set_input("chat", "deux");
    s.engine.dispatch("chat", ActionKind::Send, Default::default()).await.expect("second");

    let id = s.engine.conversation_id().expect("conversation id");
    assert_eq!(s.storage.load_conversation(&id).await.unwrap().len(), 4);
    assert_eq!(s.storage.list_conversations().await.unwrap().len(), 1);
    assert_eq!(s.session.current().as_deref(), Some("sess-42"));
}

#[tokio::test]
async fn missing_model_never_reaches_the_server() {
    let s = setup().await;
    s.engine.set_input("chat", "hello");

    let err = s
        .engine
        .dispatch("chat", ActionKind::Send, Default::default())
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::Validation(_)));
    assert!(s.requests.bodies.lock().unwrap().is_empty());
    let state = s.engine.tool_state("chat").unwrap();
    assert_eq!(state.errors["model"], "Ce champ est requis");
}

#[tokio::test]
async fn selecting_a_model_loads_it() {
    let s = setup().await;
    let reply = s
        .engine
        .select("chat", "model", json!("llama3"))
        .await
        .expect("select");

    assert_eq!(reply, Some(json!({"status": "ok"})));
    assert_eq!(
        s.requests.bodies.lock().unwrap().clone(),
        vec![json!({"loaded": "llama3"})]
    );
}

#[tokio::test]
async fn server_error_marks_message_failed() {
    let s = setup().await;
    s.engine.update_config("chat", params(json!({"model": "mistral"})));
    s.engine.set_input("chat", "dessine");

    let err = s
        .engine
        .dispatch("chat", ActionKind::Generate, Default::default())
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::Transport(_)));
    assert_eq!(s.engine.messages()[0].status, MessageStatus::Failed);
    let conversation_id = s.engine.conversation_id().expect("saved before sending");
    let stored = s.storage.load_conversation(&conversation_id).await.expect("stored");
    assert_eq!(stored[0].status, MessageStatus::Failed);
    assert_eq!(
        s.notices.0.lock().unwrap().clone(),
        vec!["Génération impossible.".to_string()]
    );
    assert_eq!(s.engine.metrics().failures, 1);
}
