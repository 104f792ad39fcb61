//! DeliveryOrchestrator: runs persona turns in the background.
//!
//! A turn moves through `Idle -> HistoryFetched -> Generating ->
//! Delivering(i/n) -> Done`. Fragments are persisted one by one with a fixed
//! pause between them so the client's poller sees them arrive like typed
//! messages. A failure to persist one fragment is logged and the loop moves
//! on; nothing here is retried.
//!
//! Turns for the same conversation run one at a time, in the order they
//! were queued; turns for different conversations run concurrently.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use marianna_types::chat::NewMessage;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::chat::repository::ConversationStore;
use crate::persona::generator::PersonaResponder;
use crate::persona::media::MediaSource;

use super::queue::{TurnQueue, TurnRequest};

/// Where a turn currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    HistoryFetched,
    Generating,
    Delivering { index: usize, total: usize },
    Done,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnState::Idle => write!(f, "idle"),
            TurnState::HistoryFetched => write!(f, "history_fetched"),
            TurnState::Generating => write!(f, "generating"),
            TurnState::Delivering { index, total } => write!(f, "delivering({index}/{total})"),
            TurnState::Done => write!(f, "done"),
        }
    }
}

/// Outcome of one turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnReport {
    /// Fragments persisted.
    pub delivered: usize,
    /// Fragments that failed to persist.
    pub failed: usize,
}

/// Runs turns against a store using a persona responder.
pub struct DeliveryOrchestrator<S: ConversationStore, M: MediaSource> {
    store: Arc<S>,
    responder: PersonaResponder<M>,
    delay: Duration,
    /// Completion signal of the newest claimed turn per conversation.
    /// An entry is removed when its turn finishes with nobody queued behind it.
    tails: DashMap<Uuid, (u64, oneshot::Receiver<()>)>,
    next_slot: AtomicU64,
}

impl<S, M> DeliveryOrchestrator<S, M>
where
    S: ConversationStore + 'static,
    M: MediaSource + 'static,
{
    pub fn new(store: Arc<S>, responder: PersonaResponder<M>, delay: Duration) -> Self {
        Self {
            store,
            responder,
            delay,
            tails: DashMap::new(),
            next_slot: AtomicU64::new(0),
        }
    }

    /// Spawn the dispatcher task.
    ///
    /// Returns the submit handle and the worker handle used for shutdown.
    pub fn start(self, capacity: usize) -> (TurnQueue, DeliveryWorker) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(dispatch(Arc::new(self), rx, cancel.clone()));

        info!(capacity, "delivery worker started");
        (TurnQueue::new(tx), DeliveryWorker { cancel, handle })
    }

    /// Run one turn to completion, waiting for any earlier turn of the same
    /// conversation first.
    pub async fn run_turn(&self, turn: &TurnRequest) -> TurnReport {
        let slot = self.claim_slot(turn.conversation_id);
        self.run_in_slot(slot, turn).await
    }

    /// Take the next place in a conversation's turn order.
    ///
    /// Synchronous, so the dispatcher fixes the order before spawning.
    fn claim_slot(&self, conversation_id: Uuid) -> TurnSlot {
        let (done, next) = oneshot::channel();
        let seq = self.next_slot.fetch_add(1, Ordering::Relaxed);
        let previous = self
            .tails
            .insert(conversation_id, (seq, next))
            .map(|(_, previous)| previous);
        TurnSlot {
            conversation_id,
            seq,
            previous,
            done,
        }
    }

    async fn run_in_slot(&self, slot: TurnSlot, turn: &TurnRequest) -> TurnReport {
        let TurnSlot {
            conversation_id,
            seq,
            previous,
            done,
        } = slot;

        // Resolves when the earlier turn drops its sender, including on panic.
        if let Some(previous) = previous {
            let _ = previous.await;
        }
        let report = self.deliver(turn).await;

        drop(done);
        self.tails
            .remove_if(&conversation_id, |_, (tail, _)| *tail == seq);
        report
    }

    async fn deliver(&self, turn: &TurnRequest) -> TurnReport {
        let conversation_id = turn.conversation_id;
        let log_state = |state: TurnState| {
            debug!(conversation_id = %conversation_id, state = %state, "turn state");
        };
        log_state(TurnState::Idle);

        let history = match self.store.list_messages(&conversation_id).await {
            Ok(messages) => messages
                .into_iter()
                .take_while(|m| m.id != turn.message_id)
                .collect::<Vec<_>>(),
            Err(e) => {
                warn!(conversation_id = %conversation_id, error = %e, "failed to fetch history, replying without context");
                Vec::new()
            }
        };
        log_state(TurnState::HistoryFetched);

        log_state(TurnState::Generating);
        let fragments = self
            .responder
            .respond(&turn.content, &history, turn.media.as_ref())
            .await;

        let total = fragments.len();
        let mut report = TurnReport::default();
        for (i, fragment) in fragments.into_iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.delay).await;
            }
            log_state(TurnState::Delivering { index: i + 1, total });

            match self
                .store
                .append_message(NewMessage::ai_fragment(conversation_id, fragment, None))
                .await
            {
                Ok(message) => {
                    report.delivered += 1;
                    debug!(conversation_id = %conversation_id, message_id = %message.id, "fragment delivered");
                }
                Err(e) => {
                    report.failed += 1;
                    error!(conversation_id = %conversation_id, fragment = i + 1, error = %e, "failed to persist fragment");
                }
            }
        }

        log_state(TurnState::Done);
        info!(
            conversation_id = %conversation_id,
            delivered = report.delivered,
            failed = report.failed,
            "turn complete"
        );
        report
    }
}

async fn dispatch<S, M>(
    orchestrator: Arc<DeliveryOrchestrator<S, M>>,
    mut rx: mpsc::Receiver<TurnRequest>,
    cancel: CancellationToken,
) where
    S: ConversationStore + 'static,
    M: MediaSource + 'static,
{
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            Some(result) = in_flight.join_next(), if !in_flight.is_empty() => log_join(result),
            next = rx.recv() => match next {
                Some(turn) => spawn_turn(&mut in_flight, &orchestrator, turn),
                None => break,
            },
        }
    }

    // Stop accepting, then finish whatever was already queued or running.
    rx.close();
    while let Some(turn) = rx.recv().await {
        spawn_turn(&mut in_flight, &orchestrator, turn);
    }
    let pending = in_flight.len();
    if pending > 0 {
        info!(pending, "waiting for in-flight turns");
    }
    while let Some(result) = in_flight.join_next().await {
        log_join(result);
    }
    info!("delivery worker stopped");
}

fn spawn_turn<S, M>(
    in_flight: &mut JoinSet<TurnReport>,
    orchestrator: &Arc<DeliveryOrchestrator<S, M>>,
    turn: TurnRequest,
) where
    S: ConversationStore + 'static,
    M: MediaSource + 'static,
{
    let slot = orchestrator.claim_slot(turn.conversation_id);
    let orchestrator = Arc::clone(orchestrator);
    in_flight.spawn(async move { orchestrator.run_in_slot(slot, &turn).await });
}

fn log_join(result: Result<TurnReport, tokio::task::JoinError>) {
    if let Err(e) = result {
        error!(error = %e, "turn task panicked");
    }
}

/// A turn's place in its conversation's order.
struct TurnSlot {
    conversation_id: Uuid,
    seq: u64,
    /// Completes once the turn queued just before this one has finished.
    previous: Option<oneshot::Receiver<()>>,
    /// Dropped when this turn finishes, releasing the next one.
    done: oneshot::Sender<()>,
}

/// Handle to the running dispatcher.
pub struct DeliveryWorker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl DeliveryWorker {
    /// Stop accepting turns, drain the queue, and wait for in-flight turns.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            error!(error = %e, "delivery dispatcher panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    use marianna_types::chat::{Conversation, Message, Sender};
    use marianna_types::error::RepositoryError;
    use marianna_types::llm::{CompletionRequest, CompletionResponse, LlmError, Usage};
    use marianna_types::persona::PersonaPolicy;
    use tokio::time::Instant;

    use crate::chat::memory::InMemoryConversationStore;
    use crate::delivery::queue::QueueError;
    use crate::llm::box_provider::BoxLlmProvider;
    use crate::llm::provider::LlmProvider;
    use crate::persona::media::NoMedia;

    const DELAY: Duration = Duration::from_millis(2000);

    /// Replies `"<content> A 😊\n<content> B 💜"` to whatever the user wrote.
    struct EchoPersona {
        fail: bool,
        prompts: Arc<StdMutex<Vec<String>>>,
    }

    impl EchoPersona {
        fn new() -> Self {
            Self {
                fail: false,
                prompts: Arc::new(StdMutex::new(Vec::new())),
            }
        }
    }

    impl LlmProvider for EchoPersona {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(
            &self,
            request: &CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            let prompt = request.messages[0].content.clone();
            self.prompts.lock().unwrap().push(prompt.clone());
            if self.fail {
                return Err(LlmError::Overloaded("busy".to_string()));
            }
            tokio::time::sleep(Duration::from_millis(10)).await;

            let said = prompt
                .split("щойно написала: \"")
                .nth(1)
                .and_then(|rest| rest.split('"').next())
                .unwrap_or_default()
                .to_string();
            Ok(CompletionResponse {
                content: format!("{said} A 😊\n{said} B 💜"),
                model: request.model.clone(),
                finish_reason: Some("STOP".to_string()),
                usage: Usage::default(),
            })
        }
    }

    /// In-memory store that records when (in tokio time) each message landed.
    struct TimedStore {
        inner: InMemoryConversationStore,
        appended_at: StdMutex<Vec<(Instant, Sender)>>,
    }

    impl TimedStore {
        fn new() -> Self {
            Self {
                inner: InMemoryConversationStore::new(),
                appended_at: StdMutex::new(Vec::new()),
            }
        }

        fn ai_instants(&self) -> Vec<Instant> {
            self.appended_at
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, sender)| *sender == Sender::Ai)
                .map(|(at, _)| *at)
                .collect()
        }
    }

    impl ConversationStore for TimedStore {
        async fn list_conversations(&self) -> Result<Vec<Conversation>, RepositoryError> {
            self.inner.list_conversations().await
        }

        async fn get_conversation(&self, id: &Uuid) -> Result<Option<Conversation>, RepositoryError> {
            self.inner.get_conversation(id).await
        }

        async fn create_conversation(&self, title: &str) -> Result<Conversation, RepositoryError> {
            self.inner.create_conversation(title).await
        }

        async fn delete_conversation(&self, id: &Uuid) -> Result<(), RepositoryError> {
            self.inner.delete_conversation(id).await
        }

        async fn list_messages(&self, conversation_id: &Uuid) -> Result<Vec<Message>, RepositoryError> {
            self.inner.list_messages(conversation_id).await
        }

        async fn append_message(&self, message: NewMessage) -> Result<Message, RepositoryError> {
            let stored = self.inner.append_message(message).await?;
            self.appended_at
                .lock()
                .unwrap()
                .push((Instant::now(), stored.sender));
            Ok(stored)
        }

        async fn add_reaction(&self, id: &Uuid, token: &str) -> Result<Option<Message>, RepositoryError> {
            self.inner.add_reaction(id, token).await
        }

        async fn remove_reaction(&self, id: &Uuid, token: &str) -> Result<Option<Message>, RepositoryError> {
            self.inner.remove_reaction(id, token).await
        }

        async fn count_conversations(&self) -> Result<u64, RepositoryError> {
            self.inner.count_conversations().await
        }

        async fn count_messages(&self) -> Result<u64, RepositoryError> {
            self.inner.count_messages().await
        }
    }

    fn quiet_policy(third_fragment_probability: f64) -> PersonaPolicy {
        PersonaPolicy {
            third_fragment_probability,
            ..PersonaPolicy::default()
        }
    }

    fn orchestrator(
        store: Arc<TimedStore>,
        provider: EchoPersona,
        policy: PersonaPolicy,
    ) -> DeliveryOrchestrator<TimedStore, NoMedia> {
        orchestrator_with_delay(store, provider, policy, DELAY)
    }

    fn orchestrator_with_delay(
        store: Arc<TimedStore>,
        provider: EchoPersona,
        policy: PersonaPolicy,
        delay: Duration,
    ) -> DeliveryOrchestrator<TimedStore, NoMedia> {
        let responder = PersonaResponder::new(
            BoxLlmProvider::new(provider),
            NoMedia,
            policy,
            "test-model",
            Duration::from_secs(60),
        );
        DeliveryOrchestrator::new(store, responder, delay)
    }

    async fn user_turn(store: &TimedStore, conversation_id: Uuid, content: &str) -> TurnRequest {
        let message = store
            .append_message(NewMessage {
                conversation_id,
                content: content.to_string(),
                sender: Sender::User,
                media: None,
                ai_avatar: None,
                reply_to_id: None,
            })
            .await
            .unwrap();
        TurnRequest {
            conversation_id,
            message_id: message.id,
            content: message.content,
            media: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fragments_are_paced_by_delay() {
        let store = Arc::new(TimedStore::new());
        let conv = store.create_conversation("pace").await.unwrap();
        let turn = user_turn(&store, conv.id, "привіт").await;

        let report = orchestrator(Arc::clone(&store), EchoPersona::new(), quiet_policy(1.0))
            .run_turn(&turn)
            .await;
        assert_eq!(report, TurnReport { delivered: 3, failed: 0 });

        let instants = store.ai_instants();
        assert_eq!(instants.len(), 3);
        for pair in instants.windows(2) {
            assert!(pair[1] - pair[0] >= DELAY);
        }

        let messages = store.list_messages(&conv.id).await.unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1].content, "привіт A 😊");
        assert_eq!(messages[2].content, "привіт B 💜");
        assert!(messages[1..].iter().all(|m| m.sender == Sender::Ai && m.ai_avatar.is_none()));
        for pair in messages.windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_generation_failure_delivers_fallback_burst() {
        let store = Arc::new(TimedStore::new());
        let conv = store.create_conversation("fallback").await.unwrap();
        let turn = user_turn(&store, conv.id, "привіт").await;

        let mut provider = EchoPersona::new();
        provider.fail = true;
        let report = orchestrator(Arc::clone(&store), provider, quiet_policy(0.0))
            .run_turn(&turn)
            .await;

        assert_eq!(report.delivered, 2);
        let messages = store.list_messages(&conv.id).await.unwrap();
        let ai: Vec<&str> = messages[1..].iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            ai,
            vec![
                "Вибач, у мене зараз проблеми... 😔",
                "Але я завжди бажаю тобі щастя! 💜"
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_excludes_triggering_message() {
        let store = Arc::new(TimedStore::new());
        let conv = store.create_conversation("context").await.unwrap();
        user_turn(&store, conv.id, "раніше").await;
        let turn = user_turn(&store, conv.id, "зараз").await;

        let provider = EchoPersona::new();
        let prompts = Arc::clone(&provider.prompts);
        orchestrator(Arc::clone(&store), provider, quiet_policy(0.0))
            .run_turn(&turn)
            .await;

        let prompt = prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("Віолета: раніше"));
        assert!(!prompt.contains("Віолета: зараз"));
        assert!(prompt.contains("Віолета щойно написала: \"зараз\""));
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_stops_before_later_messages() {
        let store = Arc::new(TimedStore::new());
        let conv = store.create_conversation("context").await.unwrap();
        user_turn(&store, conv.id, "раніше").await;
        let turn = user_turn(&store, conv.id, "зараз").await;
        user_turn(&store, conv.id, "пізніше").await;

        let provider = EchoPersona::new();
        let prompts = Arc::clone(&provider.prompts);
        orchestrator(Arc::clone(&store), provider, quiet_policy(0.0))
            .run_turn(&turn)
            .await;

        let prompt = prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("Віолета: раніше"));
        assert!(!prompt.contains("пізніше"));
        assert!(prompt.contains("Віолета щойно написала: \"зараз\""));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deleted_conversation_fragments_fail_without_panic() {
        let store = Arc::new(TimedStore::new());
        let conv = store.create_conversation("gone").await.unwrap();
        let turn = user_turn(&store, conv.id, "привіт").await;
        store.delete_conversation(&conv.id).await.unwrap();

        let report = orchestrator(Arc::clone(&store), EchoPersona::new(), quiet_policy(0.0))
            .run_turn(&turn)
            .await;

        assert_eq!(report, TurnReport { delivered: 0, failed: 2 });
        assert!(store.list_messages(&conv.id).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_conversation_turns_do_not_interleave() {
        let store = Arc::new(TimedStore::new());
        let conv = store.create_conversation("serial").await.unwrap();
        let first = user_turn(&store, conv.id, "one").await;
        let second = user_turn(&store, conv.id, "two").await;

        let (queue, worker) =
            orchestrator(Arc::clone(&store), EchoPersona::new(), quiet_policy(0.0)).start(8);
        queue.submit(first).unwrap();
        queue.submit(second).unwrap();
        worker.shutdown().await;

        let ai: Vec<String> = store
            .list_messages(&conv.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|m| m.sender == Sender::Ai)
            .map(|m| m.content)
            .collect();
        assert_eq!(ai, vec!["one A 😊", "one B 💜", "two A 😊", "two B 💜"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_conversation_turns_keep_queue_order_across_threads() {
        let store = Arc::new(TimedStore::new());
        let mut conversations = Vec::new();
        let mut turns = Vec::new();
        for i in 0..200 {
            let conv = store.create_conversation(&format!("order {i}")).await.unwrap();
            turns.push(user_turn(&store, conv.id, "one").await);
            turns.push(user_turn(&store, conv.id, "two").await);
            conversations.push(conv.id);
        }

        let (queue, worker) = orchestrator_with_delay(
            Arc::clone(&store),
            EchoPersona::new(),
            quiet_policy(0.0),
            Duration::from_millis(1),
        )
        .start(turns.len());
        for turn in turns {
            queue.submit(turn).unwrap();
        }
        worker.shutdown().await;

        for id in conversations {
            let ai: Vec<String> = store
                .list_messages(&id)
                .await
                .unwrap()
                .into_iter()
                .filter(|m| m.sender == Sender::Ai)
                .map(|m| m.content)
                .collect();
            assert_eq!(ai, vec!["one A 😊", "one B 💜", "two A 😊", "two B 💜"]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_conversations_run_concurrently() {
        let store = Arc::new(TimedStore::new());
        let a = store.create_conversation("a").await.unwrap();
        let b = store.create_conversation("b").await.unwrap();
        let turn_a = user_turn(&store, a.id, "a").await;
        let turn_b = user_turn(&store, b.id, "b").await;

        let started = Instant::now();
        let (queue, worker) =
            orchestrator(Arc::clone(&store), EchoPersona::new(), quiet_policy(0.0)).start(8);
        queue.submit(turn_a).unwrap();
        queue.submit(turn_b).unwrap();
        worker.shutdown().await;

        assert_eq!(store.ai_instants().len(), 4);
        // Two sequential turns would need at least two full delays.
        assert!(started.elapsed() < DELAY * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drains_queue_and_closes_it() {
        let store = Arc::new(TimedStore::new());
        let conv = store.create_conversation("drain").await.unwrap();
        let turn = user_turn(&store, conv.id, "привіт").await;

        let (queue, worker) =
            orchestrator(Arc::clone(&store), EchoPersona::new(), quiet_policy(0.0)).start(8);
        queue.submit(turn.clone()).unwrap();
        worker.shutdown().await;

        assert_eq!(store.list_messages(&conv.id).await.unwrap().len(), 3);
        assert!(matches!(queue.submit(turn), Err(QueueError::Closed)));
    }

    #[test]
    fn test_turn_state_display() {
        assert_eq!(TurnState::Delivering { index: 2, total: 3 }.to_string(), "delivering(2/3)");
        assert_eq!(TurnState::HistoryFetched.to_string(), "history_fetched");
    }
}
