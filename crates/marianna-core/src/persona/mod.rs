//! The persona: prompt assembly, response fragmentation, and the responder
//! that turns one user message into a burst of short chat messages.

pub mod emoji;
pub mod fragment;
pub mod generator;
pub mod media;
pub mod prompt;
