//! Infrastructure layer for Marianna.
//!
//! Contains implementations of the ports defined in `marianna-core`:
//! SQLite conversation storage, the Gemini text generator, and the uploads
//! directory (media persistence and inline loading), plus config loading.

pub mod config;
pub mod filesystem;
pub mod llm;
pub mod media;
pub mod sqlite;
