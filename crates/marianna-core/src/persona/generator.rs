//! PersonaResponder: one user message in, one burst of persona messages out.
//!
//! Generation failures of any kind (provider error, timeout, missing key)
//! are absorbed here and turned into the policy's fallback burst, so the
//! delivery layer always has something to deliver.

use std::time::Duration;

use marianna_observe::genai_attrs::{
    GEN_AI_RESPONSE_FINISH_REASONS, GEN_AI_USAGE_INPUT_TOKENS, GEN_AI_USAGE_OUTPUT_TOKENS,
    OP_CHAT,
};
use marianna_types::chat::{MediaRef, Message};
use marianna_types::llm::{CompletionRequest, LlmError, Message as LlmMessage};
use marianna_types::persona::PersonaPolicy;
use tracing::{Instrument, debug, field, info_span, warn};

use crate::llm::box_provider::BoxLlmProvider;

use super::fragment::FragmentEngine;
use super::media::MediaSource;
use super::prompt::PromptBuilder;

/// Produces persona reply bursts using an LLM provider.
pub struct PersonaResponder<M: MediaSource> {
    provider: BoxLlmProvider,
    media: M,
    policy: PersonaPolicy,
    model: String,
    timeout: Duration,
}

impl<M: MediaSource> PersonaResponder<M> {
    pub fn new(
        provider: BoxLlmProvider,
        media: M,
        policy: PersonaPolicy,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            media,
            policy,
            model: model.into(),
            timeout,
        }
    }

    pub fn policy(&self) -> &PersonaPolicy {
        &self.policy
    }

    /// Generate a reply burst for `user_text`.
    ///
    /// `history` is the conversation preceding the message being answered.
    /// Never fails: on any generation error the fallback burst is returned.
    /// The result always holds 1..=4 non-empty fragments.
    pub async fn respond(
        &self,
        user_text: &str,
        history: &[Message],
        media: Option<&MediaRef>,
    ) -> Vec<String> {
        let engine = FragmentEngine::new(&self.policy);

        match self.generate(user_text, history, media).await {
            Ok(raw) if raw.trim().is_empty() => {
                debug!("generator returned no text, using stand-in reply");
                engine.fragment(&self.policy.empty_response_text, &mut rand::rng())
            }
            Ok(raw) => engine.fragment(&raw, &mut rand::rng()),
            Err(e) => {
                warn!(
                    provider = self.provider.name(),
                    error = %e,
                    "generation failed, sending fallback burst"
                );
                engine.fallback()
            }
        }
    }

    async fn generate(
        &self,
        user_text: &str,
        history: &[Message],
        media: Option<&MediaRef>,
    ) -> Result<String, LlmError> {
        let prompt = PromptBuilder::new(&self.policy).build(history, user_text, media);
        let mut message = LlmMessage::user(prompt);

        if let Some(media) = media {
            match self.media.load_inline(media).await {
                Ok(Some(inline)) => message.attachments.push(inline),
                Ok(None) => debug!(url = %media.url, "media not inlined"),
                Err(e) => warn!(url = %media.url, error = %e, "failed to read media, continuing text-only"),
            }
        }

        let request = CompletionRequest {
            model: self.model.clone(),
            messages: vec![message],
            system: None,
            max_tokens: None,
            temperature: None,
        };

        let span = info_span!(
            "gen_ai.chat",
            gen_ai.operation.name = OP_CHAT,
            gen_ai.provider.name = self.provider.name(),
            gen_ai.request.model = %request.model,
            gen_ai.usage.input_tokens = field::Empty,
            gen_ai.usage.output_tokens = field::Empty,
            gen_ai.response.finish_reasons = field::Empty,
        );

        let response = tokio::time::timeout(self.timeout, self.provider.complete(&request))
            .instrument(span.clone())
            .await
            .map_err(|_| LlmError::Timeout(self.timeout.as_secs()))??;

        span.record(GEN_AI_USAGE_INPUT_TOKENS, response.usage.input_tokens);
        span.record(GEN_AI_USAGE_OUTPUT_TOKENS, response.usage.output_tokens);
        if let Some(reason) = &response.finish_reason {
            span.record(GEN_AI_RESPONSE_FINISH_REASONS, reason.as_str());
        }

        Ok(response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use marianna_types::chat::MediaKind;
    use marianna_types::llm::{CompletionResponse, InlineData, Usage};

    use crate::llm::provider::LlmProvider;
    use crate::persona::emoji::has_expressive_symbol;
    use crate::persona::media::NoMedia;

    /// Scripted provider that records every request it receives.
    struct ScriptedProvider {
        reply: Result<String, fn() -> LlmError>,
        delay: Option<Duration>,
        seen: Arc<Mutex<Vec<CompletionRequest>>>,
    }

    impl ScriptedProvider {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                delay: None,
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn failing(err: fn() -> LlmError) -> Self {
            Self {
                reply: Err(err),
                delay: None,
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            request: &CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            self.seen.lock().unwrap().push(request.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.reply {
                Ok(text) => Ok(CompletionResponse {
                    content: text.clone(),
                    model: request.model.clone(),
                    finish_reason: Some("STOP".to_string()),
                    usage: Usage {
                        input_tokens: 10,
                        output_tokens: 5,
                    },
                }),
                Err(make) => Err(make()),
            }
        }
    }

    struct FixedMedia;

    impl MediaSource for FixedMedia {
        async fn load_inline(&self, _media: &MediaRef) -> std::io::Result<Option<InlineData>> {
            Ok(Some(InlineData {
                mime_type: "image/png".to_string(),
                data: vec![0x89, 0x50, 0x4e, 0x47],
            }))
        }
    }

    struct BrokenMedia;

    impl MediaSource for BrokenMedia {
        async fn load_inline(&self, _media: &MediaRef) -> std::io::Result<Option<InlineData>> {
            Err(std::io::Error::other("disk on fire"))
        }
    }

    fn responder<M: MediaSource>(provider: ScriptedProvider, media: M) -> PersonaResponder<M> {
        PersonaResponder::new(
            BoxLlmProvider::new(provider),
            media,
            PersonaPolicy {
                third_fragment_probability: 0.0,
                ..PersonaPolicy::default()
            },
            "gemini-2.5-flash",
            Duration::from_secs(60),
        )
    }

    fn image() -> MediaRef {
        MediaRef {
            url: "/uploads/photo.png".to_string(),
            kind: MediaKind::Image,
        }
    }

    #[tokio::test]
    async fn test_respond_splits_reply_lines() {
        let burst = responder(ScriptedProvider::replying("Привіт 😊\nЯк ти? 💜"), NoMedia)
            .respond("привіт", &[], None)
            .await;
        assert_eq!(burst, vec!["Привіт 😊".to_string(), "Як ти? 💜".to_string()]);
    }

    #[tokio::test]
    async fn test_provider_failure_yields_fallback() {
        let responder = responder(
            ScriptedProvider::failing(|| LlmError::AuthenticationFailed),
            NoMedia,
        );
        let burst = responder.respond("привіт", &[], None).await;
        assert_eq!(burst, responder.policy().fallback_fragments);
    }

    #[tokio::test]
    async fn test_empty_reply_uses_stand_in_text() {
        let burst = responder(ScriptedProvider::replying("   "), NoMedia)
            .respond("привіт", &[], None)
            .await;
        assert!(burst[0].starts_with("Вибач, я не можу відповісти зараз"));
        assert!(burst.iter().all(|f| has_expressive_symbol(f)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_yields_fallback() {
        let mut provider = ScriptedProvider::replying("занадто пізно 😊");
        provider.delay = Some(Duration::from_secs(120));
        let responder = responder(provider, NoMedia);

        let burst = responder.respond("привіт", &[], None).await;
        assert_eq!(burst, responder.policy().fallback_fragments);
    }

    #[tokio::test]
    async fn test_media_is_inlined_before_prompt() {
        let provider = ScriptedProvider::replying("Гарне фото 😊\nДуже 💜");
        let seen = Arc::clone(&provider.seen);
        let media = image();

        responder(provider, FixedMedia)
            .respond("", &[], Some(&media))
            .await;

        let requests = seen.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let message = &requests[0].messages[0];
        assert_eq!(message.attachments.len(), 1);
        assert_eq!(message.attachments[0].mime_type, "image/png");
        assert!(message.content.contains("також надіслала медіафайл: /uploads/photo.png"));
        assert_eq!(requests[0].model, "gemini-2.5-flash");
    }

    #[tokio::test]
    async fn test_unreadable_media_falls_back_to_text_only() {
        let provider = ScriptedProvider::replying("Ой 😊\nНе бачу фото 💜");
        let seen = Arc::clone(&provider.seen);
        let media = image();

        let burst = responder(provider, BrokenMedia)
            .respond("дивись", &[], Some(&media))
            .await;

        assert_eq!(burst.len(), 2);
        assert!(seen.lock().unwrap()[0].messages[0].attachments.is_empty());
    }
}
