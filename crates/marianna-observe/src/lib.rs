//! Observability for Marianna: tracing subscriber setup and GenAI span
//! attribute names.

pub mod genai_attrs;
pub mod tracing_setup;
