//! Uploaded media: validation, persistence, and inline loading for the
//! generator.

pub mod uploads;

pub use uploads::UploadDir;
