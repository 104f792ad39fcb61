//! Google Gemini provider implementation.
//!
//! [`GeminiProvider`] implements the
//! [`LlmProvider`](marianna_core::llm::provider::LlmProvider) trait for the
//! Gemini `generateContent` REST endpoint.

pub mod client;
pub mod types;

pub use client::GeminiProvider;
