//! Chat session controller.
//!
//! `ChatSession` runs one turn at a time: it starts the turn in the
//! conversation store, opens the event stream through a [`ChatTransport`],
//! and feeds decoded frames to the store strictly in arrival order.

use std::sync::Arc;

use amm_core::conversation::{Conversation, Turn};
use amm_core::stream::{Frame, FrameDecoder};
use amm_core::{AmmError, Result};
use amm_interaction::{ChatRequest, ChatTransport};
use futures::StreamExt;
use tokio::sync::{Mutex, RwLock, watch};
use tokio_util::sync::CancellationToken;

/// How a call to [`ChatSession::send_message`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Nothing was sent: the text was blank or a turn was already running.
    Ignored,
    /// The stream ended normally.
    Completed,
    /// The turn was cancelled by [`ChatSession::clear_chat`].
    Cancelled,
}

struct InFlight {
    generation: u64,
    token: CancellationToken,
}

/// Controller owning the conversation state of a single chat.
///
/// # Thread Safety
///
/// The conversation lives behind a `RwLock`. Every mutation (a batch of
/// frames, turn start/end, reset) happens under one write-lock acquisition,
/// so readers never observe a half-applied frame. Lock order is always
/// `state` before `in_flight`.
pub struct ChatSession<T: ChatTransport> {
    transport: Arc<T>,
    state: Arc<RwLock<Conversation>>,
    in_flight: Arc<Mutex<Option<InFlight>>>,
    revision: Arc<watch::Sender<u64>>,
}

impl<T: ChatTransport + 'static> ChatSession<T> {
    /// Creates a session with an empty conversation.
    pub fn new(transport: T) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            transport: Arc::new(transport),
            state: Arc::new(RwLock::new(Conversation::new())),
            in_flight: Arc::new(Mutex::new(None)),
            revision: Arc::new(revision),
        }
    }

    /// Returns a copy of the current conversation.
    pub async fn snapshot(&self) -> Conversation {
        self.state.read().await.clone()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Receiver notified after every state change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Sends a user message and consumes the streamed answer.
    ///
    /// Returns `SendOutcome::Ignored` when `text` is blank or a turn is
    /// already in flight; no request is made in that case.
    ///
    /// The turn runs on its own task so the conversation is always marked
    /// idle at the end, even if this future is dropped.
    ///
    /// # Errors
    ///
    /// Returns the transport error that ended the turn. The same error is
    /// recorded as the conversation error. Cancellation is not an error.
    pub async fn send_message(&self, text: &str) -> Result<SendOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(SendOutcome::Ignored);
        }

        let (turn, request, token) = {
            let mut state = self.state.write().await;
            if state.is_loading() {
                tracing::debug!(target: "chat_session", "Turn already in flight, ignoring message");
                return Ok(SendOutcome::Ignored);
            }

            let turn = state.start_turn(text);
            let request = ChatRequest::new(text, state.conversation_id());
            let token = CancellationToken::new();
            *self.in_flight.lock().await = Some(InFlight {
                generation: turn.generation(),
                token: token.clone(),
            });
            (turn, request, token)
        };
        self.notify();

        tracing::info!(
            target: "chat_session",
            conversation_id = %request.conversation_id,
            "Turn {} started",
            turn.generation()
        );

        let worker = self.worker();
        let task_turn = turn.clone();
        let handle = tokio::spawn(async move {
            let result = worker.run(&task_turn, &request, &token).await;
            worker.finish(&task_turn, result).await
        });

        match handle.await {
            Ok(outcome) => outcome,
            Err(join_err) => {
                let err = AmmError::internal(format!("Chat turn task failed: {join_err}"));
                self.worker().finish(&turn, Err(err)).await
            }
        }
    }

    /// Cancels the in-flight turn, if any, and starts a new conversation.
    pub async fn clear_chat(&self) {
        {
            let mut state = self.state.write().await;
            if let Some(in_flight) = self.in_flight.lock().await.take() {
                tracing::info!(
                    target: "chat_session",
                    "Cancelling turn {} on clear",
                    in_flight.generation
                );
                in_flight.token.cancel();
            }
            state.reset();
        }
        self.notify();
    }

    fn worker(&self) -> TurnWorker<T> {
        TurnWorker {
            transport: Arc::clone(&self.transport),
            state: Arc::clone(&self.state),
            in_flight: Arc::clone(&self.in_flight),
            revision: Arc::clone(&self.revision),
        }
    }

    fn notify(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }
}

/// The parts of a session a spawned turn needs.
struct TurnWorker<T: ChatTransport> {
    transport: Arc<T>,
    state: Arc<RwLock<Conversation>>,
    in_flight: Arc<Mutex<Option<InFlight>>>,
    revision: Arc<watch::Sender<u64>>,
}

impl<T: ChatTransport> TurnWorker<T> {
    async fn run(&self, turn: &Turn, request: &ChatRequest, token: &CancellationToken) -> Result<()> {
        let mut body = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(AmmError::Cancelled),
            opened = self.transport.open_chat_stream(request) => opened?,
        };

        let mut decoder = FrameDecoder::new();
        loop {
            let chunk = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(AmmError::Cancelled),
                chunk = body.next() => chunk,
            };

            match chunk {
                Some(chunk) => {
                    let frames = decoder.push(chunk?);
                    self.apply(turn, token, &frames).await?;
                }
                None => {
                    let tail: Vec<Frame> = decoder.finish().into_iter().collect();
                    self.apply(turn, token, &tail).await?;
                    return Ok(());
                }
            }
        }
    }

    /// Applies frames in order, stopping as soon as the turn is cancelled
    /// or superseded.
    async fn apply(&self, turn: &Turn, token: &CancellationToken, frames: &[Frame]) -> Result<()> {
        if frames.is_empty() {
            return Ok(());
        }

        {
            let mut state = self.state.write().await;
            for frame in frames {
                if token.is_cancelled() || !state.apply_frame(turn, frame) {
                    return Err(AmmError::Cancelled);
                }
            }
        }
        self.revision.send_modify(|revision| *revision += 1);
        Ok(())
    }

    /// Ends the turn and maps its result to the caller-facing outcome.
    async fn finish(&self, turn: &Turn, result: Result<()>) -> Result<SendOutcome> {
        let outcome = {
            let mut state = self.state.write().await;
            let current = state.is_current(turn);

            let outcome = match result {
                Ok(()) if current => Ok(SendOutcome::Completed),
                Ok(()) | Err(AmmError::Cancelled) => Ok(SendOutcome::Cancelled),
                Err(err) if !current => {
                    tracing::debug!(target: "chat_session", "Dropping error from stale turn: {}", err);
                    Ok(SendOutcome::Cancelled)
                }
                Err(err) => {
                    tracing::warn!(target: "chat_session", "Turn {} failed: {}", turn.generation(), err);
                    state.fail_turn(turn, err.user_message());
                    Err(err)
                }
            };
            state.end_turn(turn);

            let mut in_flight = self.in_flight.lock().await;
            if in_flight
                .as_ref()
                .is_some_and(|f| f.generation == turn.generation())
            {
                *in_flight = None;
            }
            outcome
        };
        self.revision.send_modify(|revision| *revision += 1);

        tracing::info!(target: "chat_session", "Turn {} finished: {:?}", turn.generation(), outcome);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amm_core::conversation::SkillStatus;
    use amm_interaction::ByteStream;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Replays a fixed body, or fails to open with a fixed error.
    struct ScriptedTransport {
        response: std::result::Result<Vec<Vec<u8>>, AmmError>,
        requests: StdMutex<Vec<ChatRequest>>,
    }

    impl ScriptedTransport {
        fn chunks(chunks: &[&str]) -> Self {
            Self {
                response: Ok(chunks.iter().map(|c| c.as_bytes().to_vec()).collect()),
                requests: StdMutex::new(Vec::new()),
            }
        }

        fn failing(err: AmmError) -> Self {
            Self {
                response: Err(err),
                requests: StdMutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn open_chat_stream(&self, request: &ChatRequest) -> Result<ByteStream> {
            self.requests.lock().unwrap().push(request.clone());
            let chunks = self.response.clone()?;
            Ok(Box::pin(futures::stream::iter(chunks.into_iter().map(Ok))))
        }
    }

    /// Delivers body chunks as the test pushes them through a channel.
    struct GatedTransport {
        body: StdMutex<Option<mpsc::UnboundedReceiver<Result<Vec<u8>>>>>,
    }

    impl GatedTransport {
        fn new() -> (Self, mpsc::UnboundedSender<Result<Vec<u8>>>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let transport = Self {
                body: StdMutex::new(Some(rx)),
            };
            (transport, tx)
        }
    }

    #[async_trait]
    impl ChatTransport for GatedTransport {
        async fn open_chat_stream(&self, _request: &ChatRequest) -> Result<ByteStream> {
            let rx = self
                .body
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| AmmError::internal("stream already opened"))?;
            let body = futures::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            });
            Ok(Box::pin(body))
        }
    }

    fn message_chunk(content: &str) -> Result<Vec<u8>> {
        Ok(format!("event: message\ndata: {}\n\n", serde_json::json!({ "content": content })).into_bytes())
    }

    async fn wait_until<T, F>(session: &ChatSession<T>, predicate: F)
    where
        T: ChatTransport + 'static,
        F: Fn(&Conversation) -> bool,
    {
        let mut changes = session.subscribe();
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if predicate(&*session.state.read().await) {
                    return;
                }
                changes.changed().await.expect("session dropped");
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_blank_messages_are_ignored() {
        let session = ChatSession::new(ScriptedTransport::chunks(&[]));

        assert_eq!(session.send_message("").await.unwrap(), SendOutcome::Ignored);
        assert_eq!(session.send_message("   ").await.unwrap(), SendOutcome::Ignored);

        assert!(session.transport().requests().is_empty());
        assert!(session.snapshot().await.messages().is_empty());
    }

    #[tokio::test]
    async fn test_streamed_deltas_build_reply() {
        let session = ChatSession::new(ScriptedTransport::chunks(&[
            "event: message\ndata: {\"content\": \"Hel\"}\n\nevent: mes",
            "sage\ndata: {\"content\": \"lo\"}\n",
            "\nevent: message\ndata: {\"content\": \" world\"}\n\n",
        ]));

        let outcome = session.send_message("hi").await.unwrap();
        assert_eq!(outcome, SendOutcome::Completed);

        let state = session.snapshot().await;
        assert_eq!(state.messages()[1].content, "Hello world");
        assert!(!state.is_loading());
    }

    #[tokio::test]
    async fn test_request_carries_conversation_id() {
        let session = ChatSession::new(ScriptedTransport::chunks(&[]));
        session.send_message("  Is CNC-001 operational? ").await.unwrap();

        let requests = session.transport().requests();
        let state = session.snapshot().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].message, "Is CNC-001 operational?");
        assert_eq!(requests[0].conversation_id, state.conversation_id());
    }

    #[tokio::test]
    async fn test_http_failure_surfaces_error_and_ends_turn() {
        let session = ChatSession::new(ScriptedTransport::failing(AmmError::http_status(
            500,
            "internal error",
        )));

        let err = session.send_message("hello").await.unwrap_err();
        assert!(matches!(err, AmmError::HttpStatus { status: 500, .. }));

        let state = session.snapshot().await;
        assert_eq!(state.error(), Some("Chat request failed (HTTP 500)"));
        assert!(!state.is_loading());
        assert_eq!(state.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_server_error_event_keeps_consuming_stream() {
        let session = ChatSession::new(ScriptedTransport::chunks(&[
            "event: error\ndata: {\"message\": \"skill timed out\"}\n\n",
            "event: message\ndata: {\"content\": \"Partial answer\"}\n\n",
        ]));

        let outcome = session.send_message("status").await.unwrap();
        assert_eq!(outcome, SendOutcome::Completed);

        let state = session.snapshot().await;
        assert_eq!(state.error(), Some("skill timed out"));
        assert_eq!(state.messages()[1].content, "Partial answer");
        assert!(!state.is_loading());
    }

    #[tokio::test]
    async fn test_stream_interruption_keeps_partial_reply() {
        let (transport, tx) = GatedTransport::new();
        let session = Arc::new(ChatSession::new(transport));
        let running = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.send_message("status of WO-2001").await })
        };

        tx.send(message_chunk("WO-2001 is ")).unwrap();
        tx.send(Err(AmmError::transport("connection reset"))).unwrap();

        let err = running.await.unwrap().unwrap_err();
        assert!(err.is_transport());

        let state = session.snapshot().await;
        assert_eq!(state.messages()[1].content, "WO-2001 is ");
        assert_eq!(state.error(), Some("connection reset"));
        assert!(!state.is_loading());
    }

    #[tokio::test]
    async fn test_second_message_rejected_while_loading() {
        let (transport, tx) = GatedTransport::new();
        let session = Arc::new(ChatSession::new(transport));
        let running = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.send_message("first").await })
        };
        wait_until(&session, |c| c.is_loading()).await;

        assert_eq!(session.send_message("second").await.unwrap(), SendOutcome::Ignored);
        assert_eq!(session.snapshot().await.messages().len(), 2);

        drop(tx);
        assert_eq!(running.await.unwrap().unwrap(), SendOutcome::Completed);
        assert!(!session.snapshot().await.is_loading());
    }

    #[tokio::test]
    async fn test_clear_chat_mid_stream_discards_late_frames() {
        let (transport, tx) = GatedTransport::new();
        let session = Arc::new(ChatSession::new(transport));
        let running = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.send_message("status of WO-2001").await })
        };

        tx.send(Ok(concat!(
            "event: skill_start\n",
            "data: {\"skill_name\": \"work_order_lookup\", \"display_name\": \"Work Order Lookup\", \"icon\": \"📋\", \"input\": \"WO-2001\", \"timestamp\": \"t0\"}\n\n",
        )
        .as_bytes()
        .to_vec()))
        .unwrap();
        tx.send(message_chunk("WO-2001 is ")).unwrap();
        wait_until(&session, |c| {
            c.messages().get(1).is_some_and(|m| m.content == "WO-2001 is ")
        })
        .await;
        let old_id = session.snapshot().await.conversation_id().to_string();

        session.clear_chat().await;
        let _ = tx.send(message_chunk("in progress."));

        assert_eq!(running.await.unwrap().unwrap(), SendOutcome::Cancelled);

        let state = session.snapshot().await;
        assert_ne!(state.conversation_id(), old_id);
        assert!(state.messages().is_empty());
        assert!(state.skill_steps().is_empty());
        assert!(state.error().is_none());
        assert!(!state.is_loading());
    }

    #[tokio::test]
    async fn test_clear_while_idle_resets_conversation() {
        let session = ChatSession::new(ScriptedTransport::chunks(&[concat!(
            "event: skill_start\ndata: {\"skill_name\": \"knowledge_base\"}\n\n",
            "event: skill_result\ndata: {\"skill_name\": \"knowledge_base\", \"output\": {\"sop\": \"SOP-12\"}}\n\n",
        )]));
        session.send_message("PPE requirements?").await.unwrap();
        assert_eq!(
            session.snapshot().await.skill_steps()[0].status,
            SkillStatus::Completed
        );

        session.clear_chat().await;
        let state = session.snapshot().await;
        assert!(state.messages().is_empty());
        assert!(state.skill_steps().is_empty());
    }
}
