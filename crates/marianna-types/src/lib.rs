//! Shared domain types for Marianna.
//!
//! This crate contains the core domain types used across the service:
//! conversations, messages, LLM request shapes, the persona policy record,
//! application configuration, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
pub mod persona;
