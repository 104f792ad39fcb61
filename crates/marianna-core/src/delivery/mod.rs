//! Background delivery of persona replies.
//!
//! - `TurnQueue`: cloneable handle the request path submits turns through
//! - `DeliveryOrchestrator`: runs one turn (history, generation, paced persistence)
//! - `DeliveryWorker`: handle to the dispatcher task, used for graceful shutdown

pub mod orchestrator;
pub mod queue;
