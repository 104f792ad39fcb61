//! Pending-turn queue.

use marianna_types::chat::MediaRef;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

/// A user message awaiting a persona reply.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub conversation_id: Uuid,
    /// The stored user message that triggered the turn.
    pub message_id: Uuid,
    pub content: String,
    pub media: Option<MediaRef>,
}

/// Errors from submitting a turn.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Too many turns are already waiting.
    #[error("turn queue is full (conversation {0})")]
    Full(Uuid),

    /// The delivery worker has shut down.
    #[error("turn queue is closed")]
    Closed,
}

/// Cloneable submit handle for the delivery worker.
#[derive(Debug, Clone)]
pub struct TurnQueue {
    sender: mpsc::Sender<TurnRequest>,
}

impl TurnQueue {
    pub(crate) fn new(sender: mpsc::Sender<TurnRequest>) -> Self {
        Self { sender }
    }

    /// Enqueue a turn without waiting.
    ///
    /// Fails immediately when the queue is full or the worker is gone; the
    /// caller's already-stored user message is unaffected either way.
    pub fn submit(&self, turn: TurnRequest) -> Result<(), QueueError> {
        let conversation_id = turn.conversation_id;
        self.sender.try_send(turn).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::Full(conversation_id),
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })
    }

    /// Number of turns that can still be queued.
    pub fn remaining_capacity(&self) -> usize {
        self.sender.capacity()
    }
}
