//! LLM provider implementations.
//!
//! Contains the Gemini implementation of the [`LlmProvider`] trait defined
//! in `marianna-core`, plus a factory producing a [`BoxLlmProvider`] from
//! configuration.
//!
//! [`LlmProvider`]: marianna_core::llm::provider::LlmProvider

pub mod gemini;

use marianna_core::llm::box_provider::BoxLlmProvider;
use marianna_types::config::GeneratorConfig;
use marianna_types::llm::LlmError;
use secrecy::SecretString;

use self::gemini::GeminiProvider;

/// Create the generator provider from configuration.
///
/// A missing API key still yields a provider; its calls fail with
/// [`LlmError::AuthenticationFailed`], which the persona turns into the
/// fallback burst.
pub fn create_provider(
    config: &GeneratorConfig,
    api_key: Option<SecretString>,
) -> Result<BoxLlmProvider, LlmError> {
    if api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY is not set; every persona reply will be the fallback burst");
    }
    let provider = GeminiProvider::new(api_key, config.model.clone())?
        .with_base_url(config.base_url.clone());
    Ok(BoxLlmProvider::new(provider))
}
