//! Periodic side-channel actions
//!
//! Metrics and log panels refresh by re-running an action on a fixed
//! interval. Failures are logged and the next tick tries again.

use crate::application::engine::{ActionEngine, DispatchError};
use crate::domain::catalog::ActionKind;
use crate::domain::types::Params;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Aborts the polling task when stopped or dropped.
#[derive(Debug)]
pub struct PollHandle {
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn stop(self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Runs `kind` for `tool_id` every `every`, handing each reply to
/// `on_result`. The first run happens immediately.
pub fn spawn_poller<F>(
    engine: Arc<ActionEngine>,
    tool_id: impl Into<String>,
    kind: ActionKind,
    every: Duration,
    mut on_result: F,
) -> PollHandle
where
    F: FnMut(Result<Value, DispatchError>) + Send + 'static,
{
    let tool_id = tool_id.into();
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        debug!(tool = tool_id.as_str(), action = %kind, ?every, "Poller started");
        loop {
            ticker.tick().await;
            let result = engine.execute_quiet(&tool_id, kind, Params::new()).await;
            if let Err(err) = &result {
                warn!(tool = tool_id.as_str(), action = %kind, error = %err, "Poll failed");
            }
            on_result(result);
        }
    });
    PollHandle { task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{ConversationStore, StorageError};
    use crate::domain::catalog::{Catalog, EndpointDescriptor, ToolDefinition};
    use crate::domain::types::{ChatMessage, MessageStatus};
    use crate::infrastructure::transport::{
        FrameSink, OutboundCall, Transport, TransportError, TransportOutcome,
    };
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    struct CountingTransport {
        calls: AtomicU64,
    }

    #[async_trait]
    impl Transport for CountingTransport {
        async fn execute(
            &self,
            _call: OutboundCall<'_>,
            _on_frame: FrameSink<'_>,
        ) -> Result<TransportOutcome, TransportError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(TransportOutcome::Reply(json!({"tick": n})))
        }
    }

    struct NoStore;

    #[async_trait]
    impl ConversationStore for NoStore {
        async fn save_message(
            &self,
            _conversation_id: Option<&str>,
            _message: &ChatMessage,
            _tool_id: &str,
            _tool_config: &Params,
        ) -> Result<String, StorageError> {
            Ok("unused".into())
        }

        async fn load_conversation(&self, id: &str) -> Result<Vec<ChatMessage>, StorageError> {
            Err(StorageError::NotFound { id: id.into() })
        }

        async fn delete_conversation(&self, _id: &str) -> Result<(), StorageError> {
            Ok(())
        }

        async fn update_status(
            &self,
            _conversation_id: &str,
            _message_id: &str,
            _status: MessageStatus,
        ) -> Result<(), StorageError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn polls_until_stopped() {
        let catalog = Arc::new(Catalog::new([ToolDefinition::new("llm")
            .with_api(ActionKind::Metrics, EndpointDescriptor::get("/metrics"))]));
        let transport = Arc::new(CountingTransport::default());
        let engine = Arc::new(ActionEngine::new(catalog, transport.clone(), Arc::new(NoStore)));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let handle = spawn_poller(
            engine,
            "llm",
            ActionKind::Metrics,
            Duration::from_secs(5),
            move |result| sink.lock().unwrap().push(result.ok()),
        );

        tokio::time::sleep(Duration::from_secs(11)).await;
        handle.stop();
        let polled = transport.calls.load(Ordering::SeqCst);
        assert_eq!(polled, 3);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(transport.calls.load(Ordering::SeqCst), polled);
        assert_eq!(seen.lock().unwrap()[0], Some(json!({"tick": 1})));
    }
}
