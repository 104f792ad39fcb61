//! HTTP/REST API layer for Marianna.
//!
//! Axum-based JSON API under `/api/`, static media under `/uploads/`,
//! permissive CORS for the browser client.

pub mod error;
pub mod handlers;
pub mod router;
