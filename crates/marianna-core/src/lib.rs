//! Business logic and port (trait) definitions for Marianna.
//!
//! This crate defines the "ports" that the infrastructure layer implements
//! (conversation store, LLM provider, media source) together with the
//! persona engine and the background delivery orchestrator. It depends only
//! on `marianna-types` -- never on `marianna-infra` or any database/IO crate.

pub mod chat;
pub mod delivery;
pub mod llm;
pub mod persona;
