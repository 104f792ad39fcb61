//! Conversation persistence port and the chat service built on top of it.

pub mod box_store;
pub mod memory;
pub mod repository;
pub mod service;
