//! MediaSource trait: loads an attached media file for inlining into a
//! generator request.

use marianna_types::chat::MediaRef;
use marianna_types::llm::InlineData;

/// Port for reading previously uploaded media.
///
/// Implemented in marianna-infra by the uploads directory.
pub trait MediaSource: Send + Sync {
    /// Load `media` as inline data.
    ///
    /// Returns `Ok(None)` when the reference is not something the generator
    /// can consume inline (not an image, not a local upload, file missing).
    fn load_inline(
        &self,
        media: &MediaRef,
    ) -> impl std::future::Future<Output = std::io::Result<Option<InlineData>>> + Send;
}

/// A media source that never has anything to offer.
///
/// Handy for callers that run text-only.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMedia;

impl MediaSource for NoMedia {
    async fn load_inline(&self, _media: &MediaRef) -> std::io::Result<Option<InlineData>> {
        Ok(None)
    }
}
